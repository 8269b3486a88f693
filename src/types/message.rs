//! Conversation message types
//!
//! Messages and items as presented to readers of a session snapshot.
//! Assistant messages move one way, from a streaming text accumulator to a
//! finalized list of items.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Timestamp type used throughout the session model
pub type Timestamp = DateTime<Utc>;

/// Lenient timestamp decoding for server payloads
///
/// Accepts RFC 3339 strings as well as epoch milliseconds.
pub(crate) mod timestamp {
    use chrono::{DateTime, Utc};
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Millis(i64),
        Fractional(f64),
        Text(String),
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Raw::deserialize(deserializer)? {
            Raw::Millis(ms) => DateTime::from_timestamp_millis(ms)
                .ok_or_else(|| D::Error::custom(format!("timestamp out of range: {ms}"))),
            #[allow(clippy::cast_possible_truncation)]
            Raw::Fractional(ms) => DateTime::from_timestamp_millis(ms as i64)
                .ok_or_else(|| D::Error::custom(format!("timestamp out of range: {ms}"))),
            Raw::Text(text) => DateTime::parse_from_rfc3339(&text)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(D::Error::custom),
        }
    }
}

/// A tool invocation blocked by the session's permission mode
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PermissionDenial {
    pub tool_name: String,
    pub tool_use_id: String,
    #[serde(default)]
    pub tool_input: Value,
}

/// Structured content of one assistant output item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ItemContent {
    /// Plain assistant text
    Text { text: String },
    /// Reasoning output
    Thinking {
        #[serde(alias = "thinking")]
        text: String,
    },
    /// Tool invocation requested by the assistant
    ToolCall {
        tool_use_id: String,
        name: String,
        #[serde(default)]
        input: Value,
    },
    /// Result of a tool invocation
    ToolResult {
        tool_use_id: String,
        #[serde(default)]
        content: Value,
        #[serde(default)]
        is_error: bool,
    },
}

/// A finalized unit of assistant output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredItem {
    pub id: String,
    #[serde(default = "Utc::now", deserialize_with = "timestamp::deserialize")]
    pub created_at: Timestamp,
    pub item: ItemContent,
}

impl StoredItem {
    pub fn new(id: impl Into<String>, item: ItemContent) -> Self {
        Self {
            id: id.into(),
            created_at: Utc::now(),
            item,
        }
    }

    /// Text carried by this item, if it is a text or thinking item
    pub fn text(&self) -> Option<&str> {
        match &self.item {
            ItemContent::Text { text } | ItemContent::Thinking { text } => Some(text),
            _ => None,
        }
    }
}

/// Message typed by the user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserMessage {
    pub id: String,
    pub created_at: Timestamp,
    pub content: String,
}

impl UserMessage {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            created_at: Utc::now(),
            content: content.into(),
        }
    }
}

/// Body of an assistant message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum AssistantBody {
    /// Text deltas are still arriving
    Streaming { text: String },
    /// Closed; holds the ordered items
    Finalized { items: Vec<StoredItem> },
}

/// Message produced by the assistant during one turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssistantMessage {
    pub id: String,
    pub created_at: Timestamp,
    pub turn_id: String,
    pub body: AssistantBody,
}

impl AssistantMessage {
    /// Start a streaming message seeded with its first delta
    pub fn streaming(id: impl Into<String>, turn_id: impl Into<String>, seed: &str) -> Self {
        Self {
            id: id.into(),
            created_at: Utc::now(),
            turn_id: turn_id.into(),
            body: AssistantBody::Streaming {
                text: seed.to_string(),
            },
        }
    }

    /// Create an empty finalized message that items are appended to
    pub fn finalized(id: impl Into<String>, turn_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            created_at: Utc::now(),
            turn_id: turn_id.into(),
            body: AssistantBody::Finalized { items: Vec::new() },
        }
    }

    pub fn is_streaming(&self) -> bool {
        matches!(self.body, AssistantBody::Streaming { .. })
    }

    /// Accumulated text while streaming
    pub fn streaming_text(&self) -> Option<&str> {
        match &self.body {
            AssistantBody::Streaming { text } => Some(text),
            AssistantBody::Finalized { .. } => None,
        }
    }

    /// Finalized items; empty while streaming
    pub fn items(&self) -> &[StoredItem] {
        match &self.body {
            AssistantBody::Streaming { .. } => &[],
            AssistantBody::Finalized { items } => items,
        }
    }

    /// Append a text delta. Returns false if the message is already finalized.
    pub fn push_delta(&mut self, delta: &str) -> bool {
        match &mut self.body {
            AssistantBody::Streaming { text } => {
                text.push_str(delta);
                true
            }
            AssistantBody::Finalized { .. } => false,
        }
    }

    /// Append a finalized item. Returns false if the message is still streaming.
    pub fn push_item(&mut self, item: StoredItem) -> bool {
        match &mut self.body {
            AssistantBody::Finalized { items } => {
                items.push(item);
                true
            }
            AssistantBody::Streaming { .. } => false,
        }
    }

    /// Close a streaming message
    ///
    /// Accumulated text becomes a single text item; a message with no text
    /// finalizes to an empty item list. No-op when already finalized.
    pub fn finalize(&mut self) {
        if let AssistantBody::Streaming { text } = &mut self.body {
            let text = std::mem::take(text);
            let items = if text.is_empty() {
                Vec::new()
            } else {
                vec![StoredItem::new(
                    format!("{}:text", self.id),
                    ItemContent::Text { text },
                )]
            };
            self.body = AssistantBody::Finalized { items };
        }
    }
}

/// One entry in a session's history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum ChatMessage {
    User(UserMessage),
    Assistant(AssistantMessage),
}

impl ChatMessage {
    pub fn id(&self) -> &str {
        match self {
            ChatMessage::User(msg) => &msg.id,
            ChatMessage::Assistant(msg) => &msg.id,
        }
    }

    pub fn created_at(&self) -> Timestamp {
        match self {
            ChatMessage::User(msg) => msg.created_at,
            ChatMessage::Assistant(msg) => msg.created_at,
        }
    }

    pub fn is_user(&self) -> bool {
        matches!(self, ChatMessage::User(_))
    }

    pub fn is_streaming(&self) -> bool {
        self.as_assistant().is_some_and(AssistantMessage::is_streaming)
    }

    pub fn as_user(&self) -> Option<&UserMessage> {
        match self {
            ChatMessage::User(msg) => Some(msg),
            ChatMessage::Assistant(_) => None,
        }
    }

    pub fn as_assistant(&self) -> Option<&AssistantMessage> {
        match self {
            ChatMessage::Assistant(msg) => Some(msg),
            ChatMessage::User(_) => None,
        }
    }

    pub fn as_assistant_mut(&mut self) -> Option<&mut AssistantMessage> {
        match self {
            ChatMessage::Assistant(msg) => Some(msg),
            ChatMessage::User(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_stored_item_from_wire() {
        let item: StoredItem = serde_json::from_value(json!({
            "id": "i1",
            "created_at": "2025-01-02T03:04:05Z",
            "item": {"type": "tool_call", "tool_use_id": "tu1", "name": "Bash", "input": {"command": "ls"}}
        }))
        .unwrap();

        assert_eq!(item.id, "i1");
        assert_eq!(item.created_at.to_rfc3339(), "2025-01-02T03:04:05+00:00");
        assert_eq!(
            item.item,
            ItemContent::ToolCall {
                tool_use_id: "tu1".to_string(),
                name: "Bash".to_string(),
                input: json!({"command": "ls"}),
            }
        );
    }

    #[test]
    fn test_stored_item_epoch_millis_and_defaults() {
        let item: StoredItem = serde_json::from_value(json!({
            "id": "i2",
            "created_at": 1_700_000_000_000_i64,
            "item": {"type": "tool_result", "tool_use_id": "tu1"}
        }))
        .unwrap();

        assert_eq!(item.created_at.timestamp_millis(), 1_700_000_000_000);
        assert_eq!(
            item.item,
            ItemContent::ToolResult {
                tool_use_id: "tu1".to_string(),
                content: Value::Null,
                is_error: false,
            }
        );

        let before = Utc::now();
        let item: StoredItem = serde_json::from_value(json!({
            "id": "i3",
            "item": {"type": "thinking", "thinking": "hmm"}
        }))
        .unwrap();
        assert!(item.created_at >= before);
        assert_eq!(item.text(), Some("hmm"));
    }

    #[test]
    fn test_streaming_to_finalized_is_one_way() {
        let mut msg = AssistantMessage::streaming("r1:stream", "r1", "He");
        assert!(msg.push_delta("llo"));
        assert_eq!(msg.streaming_text(), Some("Hello"));
        assert!(msg.items().is_empty());

        msg.finalize();
        assert!(!msg.is_streaming());
        assert_eq!(msg.streaming_text(), None);
        assert_eq!(msg.items().len(), 1);
        assert_eq!(msg.items()[0].text(), Some("Hello"));

        assert!(!msg.push_delta("!"));
        msg.finalize();
        assert_eq!(msg.items().len(), 1);
    }

    #[test]
    fn test_finalize_empty_stream_has_no_items() {
        let mut msg = AssistantMessage::streaming("r1:stream", "r1", "");
        msg.finalize();
        assert!(msg.items().is_empty());
    }

    #[test]
    fn test_push_item_requires_finalized() {
        let mut streaming = AssistantMessage::streaming("r1:stream", "r1", "x");
        let item = StoredItem::new("i", ItemContent::Text { text: "x".into() });
        assert!(!streaming.push_item(item.clone()));

        let mut finalized = AssistantMessage::finalized("r1:items", "r1");
        assert!(finalized.push_item(item));
        assert_eq!(finalized.items().len(), 1);
    }

    #[test]
    fn test_chat_message_serialization_shape() {
        let msg = ChatMessage::Assistant(AssistantMessage::streaming("m", "r1", "hi"));
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["role"], "assistant");
        assert_eq!(value["body"]["state"], "streaming");
        assert_eq!(value["body"]["text"], "hi");
        assert!(msg.is_streaming());
    }
}
