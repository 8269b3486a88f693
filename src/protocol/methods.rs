//! Client-to-server methods
//!
//! Each method is a marker type implementing [`RpcMethod`], tying the wire
//! name to its params and result types.

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::session::PermissionMode;
use crate::types::{Timestamp, timestamp};

/// A typed JSON-RPC method
pub trait RpcMethod {
    const NAME: &'static str;
    type Params: Serialize;
    type Result: DeserializeOwned;
}

/// Client identity sent with `initialize`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientInfo {
    pub name: String,
    pub version: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InitializeParams {
    pub client: ClientInfo,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreadStartParams {
    pub cwd: String,
    pub permission_mode: PermissionMode,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ThreadStartResult {
    pub thread_id: String,
    #[serde(default = "Utc::now", deserialize_with = "timestamp::deserialize")]
    pub created_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnStartParams {
    pub thread_id: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TurnStartResult {
    pub turn_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnInterruptParams {
    pub thread_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalRespondParams {
    pub thread_id: String,
    pub approved: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permission_mode: Option<PermissionMode>,
}

#[derive(Debug)]
pub struct Initialize;
#[derive(Debug)]
pub struct ThreadStart;
#[derive(Debug)]
pub struct TurnStart;
#[derive(Debug)]
pub struct TurnInterrupt;
#[derive(Debug)]
pub struct ApprovalRespond;

impl RpcMethod for Initialize {
    const NAME: &'static str = "initialize";
    type Params = InitializeParams;
    type Result = Value;
}

impl RpcMethod for ThreadStart {
    const NAME: &'static str = "thread/start";
    type Params = ThreadStartParams;
    type Result = ThreadStartResult;
}

impl RpcMethod for TurnStart {
    const NAME: &'static str = "turn/start";
    type Params = TurnStartParams;
    type Result = TurnStartResult;
}

impl RpcMethod for TurnInterrupt {
    const NAME: &'static str = "turn/interrupt";
    type Params = TurnInterruptParams;
    type Result = Value;
}

impl RpcMethod for ApprovalRespond {
    const NAME: &'static str = "approval/respond";
    type Params = ApprovalRespondParams;
    type Result = Value;
}
