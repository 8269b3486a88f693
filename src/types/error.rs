//! Error types for the agent-link client

use serde_json::Value;
use thiserror::Error;

/// Client error codes
///
/// Standard JSON-RPC error codes plus client-specific codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Standard JSON-RPC errors (-32xxx)
    /// Parse error: Invalid JSON
    ParseError = -32700,
    /// Invalid request: Not a valid request object
    InvalidRequest = -32600,
    /// Method not found
    MethodNotFound = -32601,
    /// Invalid params
    InvalidParams = -32602,
    /// Internal error
    InternalError = -32603,

    // Client-specific errors (-32000 to -32099)
    /// Session not found
    SessionNotFound = -32001,
    /// Session already exists
    SessionAlreadyExists = -32002,
    /// Not connected to the server
    NotConnected = -32003,
    /// Invalid permission mode
    InvalidMode = -32005,
    /// Connection failed or closed
    ConnectionFailed = -32007,
    /// Call timed out
    Timeout = -32011,
    /// Server reported an error for a call
    ServerError = -32012,
}

impl ErrorCode {
    /// Get the error code value
    pub fn code(self) -> i32 {
        self as i32
    }
}

/// Error payload of a JSON-RPC response, kept verbatim
///
/// The `error` member of a response may be any JSON value. When it has the
/// conventional `{code, message, data}` shape those fields are exposed,
/// otherwise the payload's JSON text serves as the message.
#[derive(Debug, Clone, PartialEq)]
pub struct RpcError {
    payload: Value,
}

impl RpcError {
    pub fn from_payload(payload: Value) -> Self {
        Self { payload }
    }

    /// The raw payload as received
    pub fn payload(&self) -> &Value {
        &self.payload
    }

    pub fn code(&self) -> Option<i64> {
        self.payload.get("code").and_then(Value::as_i64)
    }

    pub fn message(&self) -> String {
        match &self.payload {
            Value::String(message) => message.clone(),
            other => other
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| other.to_string()),
        }
    }

    pub fn data(&self) -> Option<&Value> {
        self.payload.get("data")
    }
}

impl std::fmt::Display for RpcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.code() {
            Some(code) => write!(f, "RPC error {}: {}", code, self.message()),
            None => write!(f, "RPC error: {}", self.message()),
        }
    }
}

impl std::error::Error for RpcError {}

/// Main error type for the client
#[derive(Debug, Error)]
pub enum ClientError {
    // === Connection errors ===
    /// No usable connection
    #[error("Not connected")]
    NotConnected,

    /// The connection went away while the call was outstanding
    #[error("Connection closed: {0}")]
    ConnectionClosed(String),

    /// Connection or handshake failed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    // === Call errors ===
    /// Call exceeded its deadline
    #[error("Request timed out after {elapsed_ms}ms: {method}")]
    Timeout { method: String, elapsed_ms: u64 },

    /// Server answered the call with an error payload
    #[error("{0}")]
    Rpc(RpcError),

    // === Session errors ===
    /// Session not found
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// Session already exists
    #[error("Session already exists: {0}")]
    SessionAlreadyExists(String),

    /// Invalid permission mode
    #[error("Invalid permission mode: {0}")]
    InvalidMode(String),

    /// No blocked content recorded for the session
    #[error("Nothing to retry for session: {0}")]
    NothingToRetry(String),

    // === External errors ===
    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // === Generic errors ===
    /// The engine task is gone
    #[error("Client engine has stopped")]
    EngineStopped,

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type for the client
pub type Result<T> = std::result::Result<T, ClientError>;

impl ClientError {
    /// Get the error code for this error
    pub fn error_code(&self) -> ErrorCode {
        match self {
            ClientError::NotConnected => ErrorCode::NotConnected,
            ClientError::ConnectionClosed(_) => ErrorCode::ConnectionFailed,
            ClientError::ConnectionFailed(_) => ErrorCode::ConnectionFailed,
            ClientError::Timeout { .. } => ErrorCode::Timeout,
            ClientError::Rpc(_) => ErrorCode::ServerError,
            ClientError::SessionNotFound(_) => ErrorCode::SessionNotFound,
            ClientError::SessionAlreadyExists(_) => ErrorCode::SessionAlreadyExists,
            ClientError::InvalidMode(_) => ErrorCode::InvalidMode,
            ClientError::NothingToRetry(_) => ErrorCode::InvalidParams,
            ClientError::Json(_) => ErrorCode::ParseError,
            ClientError::Io(_) => ErrorCode::InternalError,
            ClientError::EngineStopped => ErrorCode::InternalError,
            ClientError::Internal(_) => ErrorCode::InternalError,
        }
    }

    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ClientError::NotConnected
                | ClientError::ConnectionClosed(_)
                | ClientError::ConnectionFailed(_)
                | ClientError::Timeout { .. }
        )
    }

    /// Check if this error came from the transport rather than the server
    pub fn is_transport_error(&self) -> bool {
        matches!(
            self,
            ClientError::NotConnected
                | ClientError::ConnectionClosed(_)
                | ClientError::ConnectionFailed(_)
        )
    }

    /// Check if this error is a client error (caused by invalid input)
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ClientError::SessionNotFound(_)
                | ClientError::SessionAlreadyExists(_)
                | ClientError::InvalidMode(_)
                | ClientError::NothingToRetry(_)
        )
    }

    /// The server's error payload, if this is a call-level error
    pub fn rpc_error(&self) -> Option<&RpcError> {
        match self {
            ClientError::Rpc(err) => Some(err),
            _ => None,
        }
    }

    // === Constructor helpers ===

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        ClientError::Internal(msg.into())
    }

    /// Create a session not found error
    pub fn session_not_found(thread_id: impl Into<String>) -> Self {
        ClientError::SessionNotFound(thread_id.into())
    }

    /// Create a session already exists error
    pub fn session_already_exists(thread_id: impl Into<String>) -> Self {
        ClientError::SessionAlreadyExists(thread_id.into())
    }

    /// Create an invalid mode error
    pub fn invalid_mode(mode: impl Into<String>) -> Self {
        ClientError::InvalidMode(mode.into())
    }

    /// Create a connection closed error
    pub fn connection_closed(reason: impl Into<String>) -> Self {
        ClientError::ConnectionClosed(reason.into())
    }

    /// Create a connection failed error
    pub fn connection_failed(msg: impl Into<String>) -> Self {
        ClientError::ConnectionFailed(msg.into())
    }

    /// Create a timeout error
    pub fn timeout(method: impl Into<String>, elapsed_ms: u64) -> Self {
        ClientError::Timeout {
            method: method.into(),
            elapsed_ms,
        }
    }

    /// Create a call-level error from a response's error payload
    pub fn rpc(payload: Value) -> Self {
        ClientError::Rpc(RpcError::from_payload(payload))
    }
}
