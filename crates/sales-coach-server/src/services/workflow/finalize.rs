use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::models::{ActionItem, ChatMessage, FinalResult, Message};
use crate::services::llm_service::LlmProvider;
use crate::services::parser;
use crate::services::prompts;
use crate::services::session::{SessionStore, StoreError};

const SUMMARY_MAX_TOKENS: usize = 512;
const ACTION_ITEMS_MAX_TOKENS: usize = 512;
const EMAIL_MAX_TOKENS: usize = 400;

/// Summary bullets, action items and follow-up email for a finished call.
///
/// Steps run in order against the full transcript. A failed step yields an
/// empty value and the next step still runs; only loading the session and
/// writing the result can fail the workflow. The result is dropped when the
/// session is reset while the steps run.
pub struct FinalizeWorkflow {
    store: Arc<SessionStore>,
    llm: Arc<dyn LlmProvider>,
}

impl FinalizeWorkflow {
    pub fn new(store: Arc<SessionStore>, llm: Arc<dyn LlmProvider>) -> Self {
        Self { store, llm }
    }

    /// Finalize the conversation `conversation_id` (captured when the call
    /// ended). `Ok(None)` when the session was reset before the result could
    /// be written.
    pub async fn run(
        &self,
        session_id: &str,
        conversation_id: Option<Uuid>,
    ) -> Result<Option<FinalResult>, StoreError> {
        let state = self.store.get_state(session_id).await?;
        if state.conversation_id != conversation_id {
            warn!("Session {} was reset before finalization started", session_id);
            return Ok(None);
        }
        let transcript = &state.messages;
        info!(
            "Finalizing session {} ({} messages)",
            session_id,
            transcript.len()
        );

        let mut summary_bullets = self.summarize(transcript).await;
        summary_bullets.truncate(FinalResult::MAX_SUMMARY_BULLETS);

        let action_items = self.action_items(transcript, &summary_bullets).await;
        let followup_email = self.followup_email(&summary_bullets, &action_items).await;

        let result = FinalResult {
            summary_bullets,
            action_items,
            followup_email,
        };

        if !self
            .store
            .set_final(session_id, conversation_id, result.clone())
            .await?
        {
            return Ok(None);
        }
        info!(
            "Session {} finalized: {} bullets, {} action items",
            session_id,
            result.summary_bullets.len(),
            result.action_items.len()
        );
        Ok(Some(result))
    }

    async fn summarize(&self, transcript: &[Message]) -> Vec<String> {
        let messages = vec![
            ChatMessage::system(prompts::SUMMARY_SYSTEM_PROMPT),
            ChatMessage::user(prompts::summary_request(transcript)),
        ];

        let raw = match self.llm.generate_with(&messages, SUMMARY_MAX_TOKENS, 0.2).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Summary step failed: {:#}", e);
                return Vec::new();
            }
        };

        match parser::parse_json_array(&raw, prompts::CHAT_TAG) {
            Some(items) => items
                .iter()
                .filter_map(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
            None => {
                warn!("Summary step returned no JSON array");
                Vec::new()
            }
        }
    }

    async fn action_items(&self, transcript: &[Message], bullets: &[String]) -> Vec<ActionItem> {
        let messages = vec![
            ChatMessage::system(prompts::ACTION_ITEMS_SYSTEM_PROMPT),
            ChatMessage::user(prompts::action_items_request(transcript, bullets)),
        ];

        let raw = match self
            .llm
            .generate_with(&messages, ACTION_ITEMS_MAX_TOKENS, 0.2)
            .await
        {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Action items step failed: {:#}", e);
                return Vec::new();
            }
        };

        match parser::parse_json_array(&raw, prompts::CHAT_TAG) {
            Some(items) => items.iter().filter_map(ActionItem::from_value).collect(),
            None => {
                warn!("Action items step returned no JSON array");
                Vec::new()
            }
        }
    }

    async fn followup_email(&self, bullets: &[String], items: &[ActionItem]) -> String {
        let messages = vec![
            ChatMessage::system(prompts::EMAIL_SYSTEM_PROMPT),
            ChatMessage::user(prompts::email_request(bullets, items)),
        ];

        match self.llm.generate_with(&messages, EMAIL_MAX_TOKENS, 0.5).await {
            Ok(raw) => raw.trim().to_string(),
            Err(e) => {
                warn!("Follow-up email step failed: {:#}", e);
                String::new()
            }
        }
    }
}
