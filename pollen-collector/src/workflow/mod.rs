//! Ingestion runs: orchestration and reporting

pub mod orchestrator;
pub mod report;

pub use orchestrator::{sanity_check, IngestOrchestrator, Sources};
pub use report::{Branch, BranchFailure, BranchReport, RunReport, RunStatus};
