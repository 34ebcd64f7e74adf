//! Query orchestration: the staged pipeline from raw text to response

pub mod orchestrator;

pub use orchestrator::QueryOrchestrator;
