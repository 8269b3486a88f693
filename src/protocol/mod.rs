//! Wire protocol
//!
//! JSON-RPC 2.0 envelopes, typed client methods and typed server
//! notifications.

mod envelope;
pub mod methods;
mod notification;

pub use envelope::{Inbound, JSONRPC_VERSION, Malformed, RpcRequest, classify};
pub use methods::{
    ApprovalRespondParams, ClientInfo, InitializeParams, RpcMethod, ThreadStartParams,
    ThreadStartResult, TurnInterruptParams, TurnStartParams, TurnStartResult,
};
pub use notification::{
    Delta, ItemCreated, ItemProgress, NotificationError, PermissionDenied, ServerNotification,
    TurnEnded, TurnStarted,
};
