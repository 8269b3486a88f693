//! Error tracing extensions
//!
//! Log a [`ClientError`] with its code, classification and source chain.

use std::error::Error as StdError;

use crate::types::ClientError;

/// Extension trait for logging errors with context
pub trait ErrorTraceExt {
    /// Log at error level with error code, retryable flag and source chain
    fn trace_error(&self) -> &Self;
}

impl ErrorTraceExt for ClientError {
    fn trace_error(&self) -> &Self {
        let error_code = self.error_code();

        let mut error_chain = Vec::new();
        let mut current_source = self.source();
        while let Some(source) = current_source {
            error_chain.push(source.to_string());
            current_source = source.source();
        }

        tracing::error!(
            error = %self,
            error_code = error_code.code(),
            error_code_name = ?error_code,
            is_retryable = self.is_retryable(),
            is_transport_error = self.is_transport_error(),
            is_client_error = self.is_client_error(),
            rpc_code = ?self.rpc_error().and_then(|e| e.code()),
            error_chain = ?error_chain,
            "Operation failed"
        );

        self
    }
}

/// Extension trait for `Result`s
pub trait ResultTraceExt<T> {
    /// Log the error, if any, and pass the result through
    fn trace_context(self) -> Self;
}

impl<T> ResultTraceExt<T> for Result<T, ClientError> {
    fn trace_context(self) -> Self {
        if let Err(e) = &self {
            e.trace_error();
        }
        self
    }
}
