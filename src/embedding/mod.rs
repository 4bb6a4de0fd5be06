pub mod hashing;
pub mod http;
pub mod provider;

pub use hashing::HashingEmbedder;
pub use http::HttpEmbedder;
pub use provider::Embedder;
