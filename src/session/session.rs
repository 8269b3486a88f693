//! Session state
//!
//! A session is one conversation thread on the server. Its state is written
//! only by the engine; readers receive it through snapshots.

use serde::{Deserialize, Serialize};

use crate::types::{ChatMessage, PermissionDenial, Timestamp, UserMessage};

use super::PermissionMode;

/// One conversation thread
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Server-assigned thread id, never changes
    pub thread_id: String,
    pub created_at: Timestamp,
    pub working_directory: String,
    pub permission_mode: PermissionMode,
    /// Turn currently running, if any
    pub active_turn_id: Option<String>,
    /// Conversation history in arrival order
    pub messages: Vec<ChatMessage>,
    pub has_permission_denial: bool,
    /// Content to re-send after a denial is approved
    pub last_blocked_content: Option<String>,
    pub permission_denials: Option<Vec<PermissionDenial>>,
    /// Message of the most recent `turn/error`
    pub last_error: Option<String>,
    /// Number of turns that ended, by completion or error
    pub completed_turns: u64,
}

impl Session {
    /// Create an empty session
    pub fn new(
        thread_id: impl Into<String>,
        created_at: Timestamp,
        working_directory: impl Into<String>,
        permission_mode: PermissionMode,
    ) -> Self {
        Self {
            thread_id: thread_id.into(),
            created_at,
            working_directory: working_directory.into(),
            permission_mode,
            active_turn_id: None,
            messages: Vec::new(),
            has_permission_denial: false,
            last_blocked_content: None,
            permission_denials: None,
            last_error: None,
            completed_turns: 0,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active_turn_id.is_some()
    }

    pub fn is_streaming(&self) -> bool {
        self.messages.iter().any(ChatMessage::is_streaming)
    }

    /// Optimistic user append for a send
    ///
    /// The content also becomes the retry candidate and prior denial flags
    /// are cleared. Returns the id of the appended message.
    pub fn push_user_message(&mut self, content: &str) -> String {
        self.last_blocked_content = Some(content.to_string());
        self.clear_denials();

        let msg = UserMessage::new(content);
        let id = msg.id.clone();
        self.messages.push(ChatMessage::User(msg));
        id
    }

    /// Concatenated text of the assistant output, finalized or streaming
    pub fn assistant_text(&self) -> String {
        let mut out = String::new();
        for msg in self.messages.iter().filter_map(ChatMessage::as_assistant) {
            if let Some(text) = msg.streaming_text() {
                out.push_str(text);
                continue;
            }
            for item in msg.items() {
                if let Some(text) = item.text() {
                    out.push_str(text);
                }
            }
        }
        out
    }
}
