pub mod chat;
pub mod session;

pub use chat::ChatMessage;
pub use session::{ActionItem, ActionOwner, AgentState, DealMemory, FinalResult, Message, Role};
