pub mod machine;
pub mod runner;
pub mod services;
pub mod types;


pub use machine::{decide, AttemptOutcome, Transition, ACCEPTANCE_THRESHOLD, MAX_RETRIES};
pub use runner::{GenerationLoop, LoopPolicy};
pub use services::{ComparatorService, GenerationService};
pub use types::{AcceptedScript, ExhaustedReport, GenerationAttempt, GenerationJob, ValidationVerdict};
