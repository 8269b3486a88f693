//! Permission modes and the denial tracker
//!
//! Denials are session state, not errors: the server reports a blocked
//! tool invocation, the session records it, and the user either approves
//! (usually with a more permissive mode) or dismisses it.

use serde::{Deserialize, Serialize};

use crate::types::{ChatMessage, PermissionDenial};

use super::Session;

/// Permission mode for tool execution
///
/// Controls how tool calls requiring elevated trust are handled by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PermissionMode {
    /// Default mode - prompt for dangerous operations
    #[default]
    Default,
    /// Auto-approve file edits
    AcceptEdits,
    /// Bypass all permission checks (dangerous)
    BypassPermissions,
    /// Never prompt; anything not pre-approved is denied
    DontAsk,
}

impl PermissionMode {
    pub const ALL: [PermissionMode; 4] = [
        Self::Default,
        Self::AcceptEdits,
        Self::BypassPermissions,
        Self::DontAsk,
    ];

    /// Parse from the wire name
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "default" => Some(Self::Default),
            "acceptEdits" => Some(Self::AcceptEdits),
            "bypassPermissions" => Some(Self::BypassPermissions),
            "dontAsk" => Some(Self::DontAsk),
            _ => None,
        }
    }

    /// Wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::AcceptEdits => "acceptEdits",
            Self::BypassPermissions => "bypassPermissions",
            Self::DontAsk => "dontAsk",
        }
    }

    /// Check if this mode auto-approves edits
    pub fn auto_approve_edits(&self) -> bool {
        matches!(self, Self::AcceptEdits | Self::BypassPermissions)
    }
}

impl std::fmt::Display for PermissionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PermissionMode {
    type Err = crate::types::ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| crate::types::ClientError::invalid_mode(s))
    }
}

impl Session {
    /// Record a denial report, replacing any previous one
    ///
    /// `last_blocked_content` falls back to the most recent user message
    /// when nothing was recorded by a send.
    pub fn record_denials(&mut self, denials: Vec<PermissionDenial>) {
        self.has_permission_denial = true;
        self.permission_denials = Some(denials);

        if self.last_blocked_content.is_none() {
            self.last_blocked_content = self
                .messages
                .iter()
                .rev()
                .find_map(ChatMessage::as_user)
                .map(|msg| msg.content.clone());
        }
    }

    /// Clear the denial flags; `last_blocked_content` is kept
    pub fn clear_denials(&mut self) {
        self.has_permission_denial = false;
        self.permission_denials = None;
    }

    /// Local side of an approval: new mode, denial flags cleared
    pub fn approve(&mut self, mode: PermissionMode) {
        self.permission_mode = mode;
        self.clear_denials();
    }

    /// Denials currently pending user action
    pub fn pending_denials(&self) -> &[PermissionDenial] {
        self.permission_denials.as_deref().unwrap_or_default()
    }
}
