//! Prompt templates and fixed fallback copy.

use crate::models::{ActionItem, ActionOwner, DealMemory, Message};

pub const CHAT_TAG: &str = "json";
pub const MEMORY_TAG: &str = "memory";

pub const DEFAULT_REPLY: &str = "Thanks for sharing that. Could you tell me a little more about \
what you're hoping to achieve so I can point you in the right direction?";

pub const DEFAULT_FOLLOW_UPS: [&str; 2] = [
    "What is the biggest challenge your team is facing right now?",
    "What would a successful outcome look like for you?",
];

pub const APOLOGY_REPLY: &str =
    "Sorry, I ran into a problem generating a response. Please try again in a moment.";

pub const CHAT_SYSTEM_PROMPT: &str = r#"You are an experienced B2B sales coach acting as the sales rep on a live discovery call.

Goals:
- Answer the customer's question directly and honestly
- Uncover pain points, budget, timeline, decision process and objections
- Keep the conversation moving toward a concrete next step

Response format (MANDATORY):
Return ONLY a JSON object wrapped in <json></json> tags, exactly like:
<json>{"reply": "...", "followUps": ["...", "..."]}</json>

Rules:
- "reply": 2-4 sentences, conversational, no markdown
- "followUps": exactly 2 short discovery questions the rep could ask next
- No text outside the tags"#;

pub const MEMORY_SYSTEM_PROMPT: &str = r#"You maintain structured deal notes for a sales conversation.

Given the current notes, the running summary and the latest transcript, return the UPDATED notes.
Keep facts that are still true, add new ones, and never invent details that were not said.

Return ONLY a JSON object wrapped in <memory></memory> tags with exactly these keys:
<memory>{
  "customerName": string or null,
  "company": string or null,
  "industry": string or null,
  "painPoints": [string],
  "budget": string or null,
  "timeline": string or null,
  "objections": [string],
  "nextSteps": [string],
  "rollingSummary": "3-5 sentence summary of the whole conversation so far"
}</memory>"#;

pub const SUMMARY_SYSTEM_PROMPT: &str = r#"You summarize completed sales calls for the rep's CRM notes.

Return ONLY a JSON array of at most 6 short bullet strings wrapped in <json></json> tags, e.g.
<json>["Customer is evaluating three vendors", "Budget approved for Q3"]</json>"#;

pub const ACTION_ITEMS_SYSTEM_PROMPT: &str = r#"You extract follow-up action items from a completed sales call.

Return ONLY a JSON array wrapped in <json></json> tags. Each element must be
{"owner": "Rep" | "Customer", "item": "concrete action"}, e.g.
<json>[{"owner": "Rep", "item": "Send pricing for 50 seats"}]</json>
Return <json>[]</json> if there are no action items."#;

pub const EMAIL_SYSTEM_PROMPT: &str = r#"You write follow-up emails from a sales rep to a customer after a call.

Write 120-180 words of plain text: greeting, short recap, the agreed next steps, and a friendly close.
No subject line, no markdown, no placeholders in brackets."#;

pub fn render_transcript(messages: &[Message]) -> String {
    if messages.is_empty() {
        return "(no messages yet)".to_string();
    }

    messages
        .iter()
        .map(|m| {
            let speaker = match m.role {
                crate::models::Role::User => "Customer",
                crate::models::Role::Assistant => "Rep",
            };
            format!("{}: {}", speaker, m.content)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn render_memory(memory: &DealMemory) -> String {
    serde_json::to_string_pretty(memory).unwrap_or_else(|_| "{}".to_string())
}

fn or_none(summary: &str) -> &str {
    if summary.trim().is_empty() {
        "(none yet)"
    } else {
        summary
    }
}

/// Context block sent ahead of the recent history on every chat turn.
pub fn chat_context(rolling_summary: &str, memory: &DealMemory) -> String {
    format!(
        "CONVERSATION SUMMARY:\n{}\n\nDEAL MEMORY:\n{}",
        or_none(rolling_summary),
        render_memory(memory)
    )
}

pub fn memory_request(memory: &DealMemory, rolling_summary: &str, recent: &[Message]) -> String {
    format!(
        "CURRENT NOTES:\n{}\n\nRUNNING SUMMARY:\n{}\n\nRECENT TRANSCRIPT:\n{}",
        render_memory(memory),
        or_none(rolling_summary),
        render_transcript(recent)
    )
}

pub fn summary_request(transcript: &[Message]) -> String {
    format!("FULL TRANSCRIPT:\n{}", render_transcript(transcript))
}

pub fn action_items_request(transcript: &[Message], bullets: &[String]) -> String {
    format!(
        "CALL SUMMARY:\n{}\n\nFULL TRANSCRIPT:\n{}",
        render_bullets(bullets),
        render_transcript(transcript)
    )
}

pub fn email_request(bullets: &[String], items: &[ActionItem]) -> String {
    let items_text = if items.is_empty() {
        "(none)".to_string()
    } else {
        items
            .iter()
            .map(|a| {
                let owner = match a.owner {
                    ActionOwner::Rep => "Rep",
                    ActionOwner::Customer => "Customer",
                };
                format!("- [{}] {}", owner, a.item)
            })
            .collect::<Vec<_>>()
            .join("\n")
    };

    format!(
        "CALL SUMMARY:\n{}\n\nACTION ITEMS:\n{}",
        render_bullets(bullets),
        items_text
    )
}

fn render_bullets(bullets: &[String]) -> String {
    if bullets.is_empty() {
        return "(none)".to_string();
    }
    bullets.iter().map(|b| format!("- {}", b)).collect::<Vec<_>>().join("\n")
}
