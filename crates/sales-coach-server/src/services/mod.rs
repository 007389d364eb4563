pub mod coach;
pub mod llm_service;
pub mod parser;
pub mod prompts;
pub mod session;
pub mod workflow;

pub use coach::{ChatService, MemoryExtractor};
pub use llm_service::{LlmProvider, LlmService};
pub use session::{SessionStore, StateBackend};
pub use workflow::{FinalizeWorkflow, WorkflowRunner};
