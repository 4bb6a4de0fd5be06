pub mod filters;
pub mod lint;
pub mod normalize;

pub use filters::clean_generated_script;
pub use lint::{lint_script, ScriptLint};
pub use normalize::normalize;
