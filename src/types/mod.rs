//! Public types for the agent-link client
//!
//! This module contains the shared types used across the crate.

mod config;
mod error;
mod message;

pub use config::{
    ClientConfig, ClientSettings, DEFAULT_CALL_TIMEOUT, DEFAULT_CLIENT_NAME,
    DEFAULT_CONNECT_TIMEOUT, DEFAULT_HANDSHAKE_TIMEOUT,
};
pub use error::{ClientError, ErrorCode, Result, RpcError};
pub(crate) use message::timestamp;
pub use message::{
    AssistantBody, AssistantMessage, ChatMessage, ItemContent, PermissionDenial, StoredItem,
    Timestamp, UserMessage,
};
