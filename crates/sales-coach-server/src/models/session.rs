use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Who authored a transcript message.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "user" => Some(Self::User),
            "assistant" => Some(Self::Assistant),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }
}

/// Sales facts accumulated across a session.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct DealMemory {
    pub customer_name: Option<String>,
    pub company: Option<String>,
    pub industry: Option<String>,
    pub pain_points: Vec<String>,
    pub budget: Option<String>,
    pub timeline: Option<String>,
    pub objections: Vec<String>,
    pub next_steps: Vec<String>,
}

impl DealMemory {
    /// Overwrite-if-present merge of a model extraction.
    ///
    /// Scalar fields take a new value only when the extraction carries a
    /// non-empty string; list fields only when it carries an array holding
    /// at least one string. Anything else keeps the prior value.
    pub fn merge_extraction(&mut self, extracted: &Map<String, Value>) {
        merge_string(&mut self.customer_name, extracted, "customerName");
        merge_string(&mut self.company, extracted, "company");
        merge_string(&mut self.industry, extracted, "industry");
        merge_list(&mut self.pain_points, extracted, "painPoints");
        merge_string(&mut self.budget, extracted, "budget");
        merge_string(&mut self.timeline, extracted, "timeline");
        merge_list(&mut self.objections, extracted, "objections");
        merge_list(&mut self.next_steps, extracted, "nextSteps");
    }

    /// Build from a possibly partial or legacy record.
    pub fn from_value(value: &Value) -> Self {
        let mut memory = Self::default();
        if let Some(obj) = value.as_object() {
            memory.merge_extraction(obj);
        }
        memory
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

fn merge_string(slot: &mut Option<String>, obj: &Map<String, Value>, key: &str) {
    if let Some(s) = string_field(obj, key) {
        *slot = Some(s);
    }
}

fn merge_list(slot: &mut Vec<String>, obj: &Map<String, Value>, key: &str) {
    if let Some(items) = string_list_field(obj, key) {
        *slot = items;
    }
}

/// Non-empty trimmed string at `key`, if present and of string type.
pub(crate) fn string_field(obj: &Map<String, Value>, key: &str) -> Option<String> {
    obj.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// String elements of the array at `key`; `None` unless at least one survives.
pub(crate) fn string_list_field(obj: &Map<String, Value>, key: &str) -> Option<Vec<String>> {
    let items: Vec<String> = obj
        .get(key)?
        .as_array()?
        .iter()
        .filter_map(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();

    if items.is_empty() {
        None
    } else {
        Some(items)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ActionOwner {
    Rep,
    Customer,
}

impl ActionOwner {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "rep" => Some(Self::Rep),
            "customer" => Some(Self::Customer),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ActionItem {
    pub owner: ActionOwner,
    pub item: String,
}

impl ActionItem {
    /// Accepts `{owner, item}` objects with a known owner and non-empty item.
    pub fn from_value(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        let owner = obj.get("owner").and_then(Value::as_str).and_then(ActionOwner::parse)?;
        let item = string_field(obj, "item")?;
        Some(Self { owner, item })
    }
}

/// Post-call output written by the finalization workflow.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct FinalResult {
    pub summary_bullets: Vec<String>,
    pub action_items: Vec<ActionItem>,
    pub followup_email: String,
}

impl FinalResult {
    pub const MAX_SUMMARY_BULLETS: usize = 6;

    fn from_value(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        let mut summary_bullets = string_list_field(obj, "summaryBullets").unwrap_or_default();
        summary_bullets.truncate(Self::MAX_SUMMARY_BULLETS);
        let action_items = obj
            .get("actionItems")
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(ActionItem::from_value).collect())
            .unwrap_or_default();
        let followup_email = obj
            .get("followupEmail")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        Some(Self { summary_bullets, action_items, followup_email })
    }
}

/// Complete persisted state of one coaching session.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct AgentState {
    pub messages: Vec<Message>,
    pub deal_memory: DealMemory,
    pub rolling_summary: String,
    pub user_turn_count: u64,
    #[serde(rename = "final", skip_serializing_if = "Option::is_none")]
    pub final_result: Option<FinalResult>,
    /// Assigned on first save and dropped by reset, so it identifies one
    /// conversation across resets of the same session id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<Uuid>,
}

impl AgentState {
    /// Load a persisted record field by field.
    ///
    /// Missing or ill-typed fields fall back to their defaults, malformed
    /// messages are skipped, and a non-object record yields the default state.
    pub fn from_persisted(value: &Value) -> Self {
        let Some(obj) = value.as_object() else {
            return Self::default();
        };

        let messages = obj
            .get("messages")
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(message_from_value).collect())
            .unwrap_or_default();

        let deal_memory = obj.get("dealMemory").map(DealMemory::from_value).unwrap_or_default();

        let rolling_summary = obj
            .get("rollingSummary")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        let user_turn_count = obj.get("userTurnCount").and_then(Value::as_u64).unwrap_or(0);

        let final_result = obj.get("final").and_then(FinalResult::from_value);

        let conversation_id = obj
            .get("conversationId")
            .and_then(Value::as_str)
            .and_then(|s| Uuid::parse_str(s).ok());

        Self {
            messages,
            deal_memory,
            rolling_summary,
            user_turn_count,
            final_result,
            conversation_id,
        }
    }

    pub fn to_persisted(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|_| Value::Object(Map::new()))
    }

    /// The last `window` messages, oldest first.
    pub fn recent_messages(&self, window: usize) -> &[Message] {
        let start = self.messages.len().saturating_sub(window);
        &self.messages[start..]
    }
}

fn message_from_value(value: &Value) -> Option<Message> {
    let obj = value.as_object()?;
    let role = obj.get("role").and_then(Value::as_str).and_then(Role::parse)?;
    let content = obj.get("content").and_then(Value::as_str)?.to_string();
    Some(Message { role, content })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn populated_memory() -> DealMemory {
        DealMemory {
            customer_name: Some("Dana".to_string()),
            company: Some("Acme".to_string()),
            pain_points: vec!["manual reporting".to_string()],
            objections: vec!["price".to_string()],
            ..Default::default()
        }
    }

    #[test]
    fn test_merge_empty_extraction_is_noop() {
        let mut memory = populated_memory();
        memory.merge_extraction(&Map::new());
        assert_eq!(memory, populated_memory());
    }

    #[test]
    fn test_merge_ignores_ill_typed_fields() {
        let mut memory = populated_memory();
        let extraction = json!({
            "customerName": 42,
            "company": "",
            "painPoints": "not a list",
            "objections": [],
            "nextSteps": [1, 2, null],
        });
        memory.merge_extraction(extraction.as_object().unwrap());
        assert_eq!(memory, populated_memory());
    }

    #[test]
    fn test_merge_prefers_new_values() {
        let mut memory = populated_memory();
        let extraction = json!({
            "company": "Acme Corp",
            "budget": "$50k",
            "nextSteps": ["send proposal", 7, "book demo"],
        });
        memory.merge_extraction(extraction.as_object().unwrap());

        assert_eq!(memory.company.as_deref(), Some("Acme Corp"));
        assert_eq!(memory.budget.as_deref(), Some("$50k"));
        assert_eq!(memory.next_steps, vec!["send proposal", "book demo"]);
        // Omitted fields keep their prior values
        assert_eq!(memory.customer_name.as_deref(), Some("Dana"));
        assert_eq!(memory.pain_points, vec!["manual reporting"]);
    }

    #[test]
    fn test_load_legacy_record_fills_defaults() {
        let legacy = json!({
            "messages": [
                {"role": "user", "content": "hi"},
                {"role": "system", "content": "dropped"},
                {"content": "no role"},
                {"role": "assistant", "content": "hello"}
            ],
            "userTurnCount": "three",
        });

        let state = AgentState::from_persisted(&legacy);
        assert_eq!(state.messages, vec![Message::user("hi"), Message::assistant("hello")]);
        assert_eq!(state.user_turn_count, 0);
        assert!(state.deal_memory.is_empty());
        assert!(state.rolling_summary.is_empty());
        assert!(state.final_result.is_none());
    }

    #[test]
    fn test_load_non_object_is_default() {
        assert_eq!(AgentState::from_persisted(&json!([1, 2, 3])), AgentState::default());
        assert_eq!(AgentState::from_persisted(&Value::Null), AgentState::default());
    }

    #[test]
    fn test_persisted_round_trip_keeps_final() {
        let state = AgentState {
            messages: vec![Message::user("What's your pricing?")],
            deal_memory: populated_memory(),
            rolling_summary: "Dana asked about pricing.".to_string(),
            user_turn_count: 1,
            final_result: Some(FinalResult {
                summary_bullets: vec!["Pricing discussed".to_string()],
                action_items: vec![ActionItem {
                    owner: ActionOwner::Rep,
                    item: "Send quote".to_string(),
                }],
                followup_email: "Hi Dana".to_string(),
            }),
            conversation_id: Some(Uuid::new_v4()),
        };

        let persisted = state.to_persisted();
        assert!(persisted.get("final").is_some());
        assert!(persisted["conversationId"].is_string());
        assert_eq!(AgentState::from_persisted(&persisted), state);
    }

    #[test]
    fn test_final_is_omitted_when_absent() {
        let persisted = AgentState::default().to_persisted();
        assert!(persisted.get("final").is_none());
        assert_eq!(persisted["userTurnCount"], json!(0));
    }

    #[test]
    fn test_action_item_owner_is_case_insensitive() {
        let item = ActionItem::from_value(&json!({"owner": "customer", "item": "Share budget"}));
        assert_eq!(item.map(|i| i.owner), Some(ActionOwner::Customer));
        assert!(ActionItem::from_value(&json!({"owner": "Manager", "item": "x"})).is_none());
        assert!(ActionItem::from_value(&json!({"owner": "Rep", "item": "  "})).is_none());
    }

    #[test]
    fn test_recent_messages_window() {
        let mut state = AgentState::default();
        for i in 0..12 {
            state.messages.push(Message::user(format!("m{}", i)));
        }
        let recent = state.recent_messages(10);
        assert_eq!(recent.len(), 10);
        assert_eq!(recent[0].content, "m2");
        assert_eq!(AgentState::default().recent_messages(10).len(), 0);
    }
}
