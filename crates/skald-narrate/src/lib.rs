//! Combat narration pipeline: retrieval-augmented prompt assembly, the LLM
//! round trip, and deterministic fallback text when anything goes wrong.

pub mod context;
pub mod orchestrator;
pub mod prompt;

pub use context::RetrievalCoordinator;
pub use orchestrator::{NarrateError, NarrationOrchestrator};
