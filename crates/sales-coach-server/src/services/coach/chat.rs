use anyhow::{Context, Result};
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

use super::memory::MemoryExtractor;
use crate::config::ChatConfig;
use crate::models::chat::ChatResponse;
use crate::models::{AgentState, ChatMessage, Role};
use crate::services::llm_service::LlmProvider;
use crate::services::parser;
use crate::services::prompts;
use crate::services::session::SessionStore;

/// Reply and follow-ups recovered from one chat completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedReply {
    pub reply: String,
    pub follow_ups: Vec<String>,
}

/// Parse a chat completion.
///
/// Tagged JSON first, then the first `{...}` span; text with no usable
/// object becomes the reply itself. Follow-ups are replaced by the defaults
/// unless exactly two strings came back.
pub fn parse_chat_reply(raw: &str) -> ParsedReply {
    let default_follow_ups = || {
        prompts::DEFAULT_FOLLOW_UPS
            .iter()
            .map(|s| s.to_string())
            .collect::<Vec<_>>()
    };

    let Some(obj) = parser::parse_json_object(raw, prompts::CHAT_TAG) else {
        let text = raw.trim();
        let reply = if text.is_empty() { prompts::DEFAULT_REPLY } else { text };
        return ParsedReply {
            reply: reply.to_string(),
            follow_ups: default_follow_ups(),
        };
    };

    let reply = obj
        .get("reply")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(prompts::DEFAULT_REPLY)
        .to_string();

    let follow_ups = obj
        .get("followUps")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect::<Vec<_>>()
        })
        .filter(|items| items.len() == 2)
        .unwrap_or_else(default_follow_ups);

    ParsedReply { reply, follow_ups }
}

/// Handles one user message end to end for a session.
pub struct ChatService {
    store: Arc<SessionStore>,
    llm: Arc<dyn LlmProvider>,
    extractor: MemoryExtractor,
    config: ChatConfig,
}

impl ChatService {
    pub fn new(store: Arc<SessionStore>, llm: Arc<dyn LlmProvider>, config: ChatConfig) -> Self {
        let extractor = MemoryExtractor::new(llm.clone(), config.history_window);
        Self { store, llm, extractor, config }
    }

    /// Never fails: any error inside the turn yields the apologetic response.
    pub async fn handle_message(&self, session_id: &str, message: &str) -> ChatResponse {
        let start_time = Instant::now();

        match self.run_turn(session_id, message).await {
            Ok(response) => {
                info!(
                    "Chat turn {} for session {} completed in {}ms",
                    response.user_turn_count,
                    session_id,
                    start_time.elapsed().as_millis()
                );
                response
            }
            Err(e) => {
                error!("Chat turn failed for session {}: {:#}", session_id, e);
                self.fallback_response(session_id).await
            }
        }
    }

    async fn run_turn(&self, session_id: &str, message: &str) -> Result<ChatResponse> {
        let mut session = self
            .store
            .open(session_id)
            .await
            .context("Failed to open session")?;

        let turn = session.append_user_message(message);
        debug!("Session {} turn {}", session_id, turn);

        let prompt = self.build_prompt(session.state());
        let raw = self
            .llm
            .generate(&prompt)
            .await
            .context("Chat model call failed")?;

        let parsed = parse_chat_reply(&raw);
        session.append_assistant_message(parsed.reply.clone());

        if self.is_extraction_turn(turn) {
            self.extractor.refresh(&mut session).await;
        }

        session.save().await.context("Failed to persist session")?;

        let state = session.state();
        Ok(ChatResponse {
            reply: parsed.reply,
            follow_ups: parsed.follow_ups,
            deal_memory: state.deal_memory.clone(),
            rolling_summary: state.rolling_summary.clone(),
            user_turn_count: state.user_turn_count,
        })
    }

    fn is_extraction_turn(&self, turn: u64) -> bool {
        let interval = self.config.extraction_interval;
        interval > 0 && turn > 0 && turn % interval == 0
    }

    /// System instruction plus context, then the most recent history window.
    pub fn build_prompt(&self, state: &AgentState) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(self.config.history_window + 1);
        messages.push(ChatMessage::system(format!(
            "{}\n\n{}",
            prompts::CHAT_SYSTEM_PROMPT,
            prompts::chat_context(&state.rolling_summary, &state.deal_memory)
        )));

        messages.extend(
            state
                .recent_messages(self.config.history_window)
                .iter()
                .map(|m| match m.role {
                    Role::User => ChatMessage::user(m.content.clone()),
                    Role::Assistant => ChatMessage::assistant(m.content.clone()),
                }),
        );

        messages
    }

    /// Reports what is actually persisted; the failed turn itself is not saved.
    async fn fallback_response(&self, session_id: &str) -> ChatResponse {
        let state = match self.store.get_state(session_id).await {
            Ok(state) => state,
            Err(e) => {
                warn!("Could not re-read session {} for fallback: {}", session_id, e);
                AgentState::default()
            }
        };

        ChatResponse {
            reply: prompts::APOLOGY_REPLY.to_string(),
            follow_ups: Vec::new(),
            deal_memory: state.deal_memory,
            rolling_summary: state.rolling_summary,
            user_turn_count: state.user_turn_count,
        }
    }
}
