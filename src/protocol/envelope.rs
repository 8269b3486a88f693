//! JSON-RPC 2.0 envelopes
//!
//! Outbound requests are serialized from [`RpcRequest`]. Inbound frames are
//! classified by which of `id` and `method` they carry.

use serde::Serialize;
use serde_json::Value;

pub const JSONRPC_VERSION: &str = "2.0";

/// Outbound call envelope
#[derive(Debug, Serialize)]
pub struct RpcRequest<'a> {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: &'a str,
    pub params: &'a Value,
}

impl<'a> RpcRequest<'a> {
    pub fn new(id: u64, method: &'a str, params: &'a Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            method,
            params,
        }
    }

    pub fn to_text(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// A classified inbound frame
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// Reply to one of our calls; `Err` holds the verbatim error payload
    Response {
        id: u64,
        outcome: Result<Value, Value>,
    },
    /// Server-pushed event
    Notification { method: String, params: Value },
    /// Server-to-client call; this protocol has none
    Request { id: Value, method: String },
}

/// Why an inbound frame was discarded
#[derive(Debug, Clone, PartialEq)]
pub enum Malformed {
    NotJson(String),
    NotAnObject,
    NoIdOrMethod,
    BadId(Value),
}

impl std::fmt::Display for Malformed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Malformed::NotJson(err) => write!(f, "not JSON: {err}"),
            Malformed::NotAnObject => f.write_str("not a JSON object"),
            Malformed::NoIdOrMethod => f.write_str("missing both id and method"),
            Malformed::BadId(id) => write!(f, "unusable id {id}"),
        }
    }
}

/// Classify one text frame
pub fn classify(text: &str) -> Result<Inbound, Malformed> {
    let mut value: Value =
        serde_json::from_str(text).map_err(|e| Malformed::NotJson(e.to_string()))?;
    let obj = value.as_object_mut().ok_or(Malformed::NotAnObject)?;

    let method = obj
        .get("method")
        .and_then(Value::as_str)
        .map(str::to_string);
    let id = obj.remove("id").filter(|id| !id.is_null());

    match (id, method) {
        (Some(id), Some(method)) => Ok(Inbound::Request { id, method }),
        (None, Some(method)) => {
            let params = obj.remove("params").unwrap_or(Value::Null);
            Ok(Inbound::Notification { method, params })
        }
        (Some(id), None) => {
            let id = id.as_u64().ok_or(Malformed::BadId(id))?;
            let outcome = match obj.remove("error") {
                Some(error) if !error.is_null() => Err(error),
                _ => Ok(obj.remove("result").unwrap_or(Value::Null)),
            };
            Ok(Inbound::Response { id, outcome })
        }
        (None, None) => Err(Malformed::NoIdOrMethod),
    }
}
