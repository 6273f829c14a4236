//! Article classification for the weekly digest.
//!
//! Articles are sent to a chat model in batches. Anything the model cannot
//! settle is classified by keyword scores or, if that is switched off, put in
//! the catch-all category.

pub mod keyword;
pub mod llm;
pub mod model;
pub mod orchestrator;
pub mod prompt;

pub use llm::{build_provider, ChatProvider};
pub use model::{BatchClassifier, BatchOutcome, ModelClassifier};
pub use orchestrator::{Orchestrator, OrchestratorSettings};
