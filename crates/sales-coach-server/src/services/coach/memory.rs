use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::models::{AgentState, ChatMessage};
use crate::services::llm_service::LlmProvider;
use crate::services::parser;
use crate::services::prompts;
use crate::services::session::SessionHandle;

const EXTRACTION_MAX_TOKENS: usize = 768;

/// Re-summarizes the conversation into deal memory.
pub struct MemoryExtractor {
    llm: Arc<dyn LlmProvider>,
    transcript_window: usize,
}

impl MemoryExtractor {
    pub fn new(llm: Arc<dyn LlmProvider>, transcript_window: usize) -> Self {
        Self { llm, transcript_window }
    }

    /// Ask the model for updated notes. `None` when the call or the parse fails.
    pub async fn extract(&self, state: &AgentState) -> Option<Map<String, Value>> {
        let messages = vec![
            ChatMessage::system(prompts::MEMORY_SYSTEM_PROMPT),
            ChatMessage::user(prompts::memory_request(
                &state.deal_memory,
                &state.rolling_summary,
                state.recent_messages(self.transcript_window),
            )),
        ];

        let raw = match self
            .llm
            .generate_with(&messages, EXTRACTION_MAX_TOKENS, 0.0)
            .await
        {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Memory extraction call failed: {:#}", e);
                return None;
            }
        };

        let parsed = parser::parse_json_object(&raw, prompts::MEMORY_TAG);
        if parsed.is_none() {
            warn!("Memory extraction output had no parseable JSON object");
            debug!("Unparseable extraction output: {}", raw);
        }
        parsed
    }

    /// Extract and merge into the session. Returns whether anything was merged.
    pub async fn refresh(&self, session: &mut SessionHandle) -> bool {
        let Some(extracted) = self.extract(session.state()).await else {
            return false;
        };

        session.merge_deal_memory(&extracted);
        info!(
            "Deal memory refreshed for session {} at turn {}",
            session.session_id(),
            session.state().user_turn_count
        );
        true
    }
}
