//! Command generation and candidate management.

mod generator;
mod option;

pub use generator::{GenerationError, Generator, PipelineStage, SafetyMode};
pub use option::CandidateOption;
