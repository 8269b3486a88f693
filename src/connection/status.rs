//! Connection status and the close-code policy

use serde::Serialize;

use crate::transport::{ABNORMAL_CLOSURE, CloseInfo, NORMAL_CLOSURE};

/// Shown when the server could not be reached and gave no reason
pub const UNREACHABLE_MESSAGE: &str =
    "Unable to reach the server. Check the address and that the server is running.";

/// Lifecycle of the single connection
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ConnectionStatus {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Error { message: String },
}

impl ConnectionStatus {
    pub fn error(message: impl Into<String>) -> Self {
        ConnectionStatus::Error {
            message: message.into(),
        }
    }

    /// Status after the transport reported a closure
    pub fn from_close(info: &CloseInfo) -> Self {
        match (info.code, info.reason.as_deref()) {
            (NORMAL_CLOSURE, _) => ConnectionStatus::Disconnected,
            (ABNORMAL_CLOSURE, None) => ConnectionStatus::error(UNREACHABLE_MESSAGE),
            (_, Some(reason)) => ConnectionStatus::error(reason),
            (code, None) => ConnectionStatus::error(format!("Connection closed (code {code})")),
        }
    }

    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionStatus::Connected)
    }

    pub fn is_connecting(&self) -> bool {
        matches!(self, ConnectionStatus::Connecting)
    }

    /// True for the states a connect attempt can end in
    pub fn is_settled(&self) -> bool {
        !self.is_connecting()
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            ConnectionStatus::Error { message } => Some(message),
            _ => None,
        }
    }
}

impl std::fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionStatus::Disconnected => f.write_str("disconnected"),
            ConnectionStatus::Connecting => f.write_str("connecting"),
            ConnectionStatus::Connected => f.write_str("connected"),
            ConnectionStatus::Error { message } => write!(f, "error: {message}"),
        }
    }
}
