//! Server-pushed notifications
//!
//! The set of notifications is closed: anything not listed here is reported
//! as [`NotificationError::Unknown`] rather than silently dropped.

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

use crate::types::{PermissionDenial, StoredItem};

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TurnStarted {
    pub thread_id: String,
    pub turn_id: String,
}

/// Incremental output fragment
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Delta {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub text: Option<String>,
}

impl Delta {
    /// Text of a `text` delta; other kinds yield `None`
    pub fn as_text(&self) -> Option<&str> {
        if self.kind == "text" {
            self.text.as_deref()
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ItemProgress {
    pub turn_id: String,
    pub delta: Delta,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ItemCreated {
    pub turn_id: String,
    pub item: StoredItem,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PermissionDenied {
    pub thread_id: String,
    #[serde(default)]
    pub denials: Vec<PermissionDenial>,
}

/// Payload of both `turn/completed` and `turn/error`
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct TurnEnded {
    #[serde(default)]
    pub thread_id: Option<String>,
    #[serde(default)]
    pub turn_id: Option<String>,
    #[serde(default)]
    pub error: Option<Value>,
    #[serde(default)]
    pub message: Option<String>,
}

impl TurnEnded {
    /// Human-readable error text, if the server sent any
    pub fn error_message(&self) -> Option<String> {
        match &self.error {
            Some(Value::String(text)) => Some(text.clone()),
            Some(Value::Null) | None => self.message.clone(),
            Some(other) => Some(
                other
                    .get("message")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .unwrap_or_else(|| other.to_string()),
            ),
        }
    }
}

/// A notification the client understands
#[derive(Debug, Clone, PartialEq)]
pub enum ServerNotification {
    Initialized,
    TurnStarted(TurnStarted),
    ItemProgress(ItemProgress),
    ItemCreated(ItemCreated),
    PermissionDenied(PermissionDenied),
    TurnCompleted(TurnEnded),
    TurnError(TurnEnded),
}

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("Unknown notification method: {0}")]
    Unknown(String),

    #[error("Invalid params for {method}: {source}")]
    Invalid {
        method: String,
        #[source]
        source: serde_json::Error,
    },
}

impl ServerNotification {
    pub fn parse(method: &str, params: Value) -> Result<Self, NotificationError> {
        Ok(match method {
            "initialized" => ServerNotification::Initialized,
            "turn/started" => ServerNotification::TurnStarted(decode(method, params)?),
            "item/progress" => ServerNotification::ItemProgress(decode(method, params)?),
            "item/created" => ServerNotification::ItemCreated(decode(method, params)?),
            "turn/permission_denied" => {
                ServerNotification::PermissionDenied(decode(method, params)?)
            }
            "turn/completed" => ServerNotification::TurnCompleted(decode(method, params)?),
            "turn/error" => ServerNotification::TurnError(decode(method, params)?),
            other => return Err(NotificationError::Unknown(other.to_string())),
        })
    }

    /// Wire method name
    pub fn method(&self) -> &'static str {
        match self {
            ServerNotification::Initialized => "initialized",
            ServerNotification::TurnStarted(_) => "turn/started",
            ServerNotification::ItemProgress(_) => "item/progress",
            ServerNotification::ItemCreated(_) => "item/created",
            ServerNotification::PermissionDenied(_) => "turn/permission_denied",
            ServerNotification::TurnCompleted(_) => "turn/completed",
            ServerNotification::TurnError(_) => "turn/error",
        }
    }
}

fn decode<T: DeserializeOwned>(method: &str, params: Value) -> Result<T, NotificationError> {
    // absent params decode like an empty object
    let params = if params.is_null() {
        Value::Object(serde_json::Map::new())
    } else {
        params
    };
    serde_json::from_value(params).map_err(|source| NotificationError::Invalid {
        method: method.to_string(),
        source,
    })
}
