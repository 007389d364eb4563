//! Post-call finalization running off the request path

mod finalize;
mod runner;

pub use finalize::FinalizeWorkflow;
pub use runner::{WorkflowError, WorkflowRecord, WorkflowRunner, WorkflowStatus};
