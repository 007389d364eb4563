//! Live-call coaching: chat turns and periodic deal-memory extraction

mod chat;
mod memory;

pub use chat::{parse_chat_reply, ChatService, ParsedReply};
pub use memory::MemoryExtractor;
