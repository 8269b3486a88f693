//! Call dispatcher
//!
//! Owns the pending-call table. Every call settles exactly once: by its
//! response, by its timer, or by connection loss, whichever the engine
//! observes first. Timers run as spawned sleeps that report the call id back
//! to the engine; an expiry for a call that already settled is ignored.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, trace, warn};

use crate::protocol::RpcRequest;
use crate::session::{PermissionMode, Session};
use crate::transport::Link;
use crate::types::{ClientError, Result};

/// Process-wide correlation id counter
static NEXT_CALL_ID: AtomicU64 = AtomicU64::new(1);

/// Allocate a fresh correlation id; never reused within the process
pub fn next_call_id() -> u64 {
    NEXT_CALL_ID.fetch_add(1, Ordering::Relaxed)
}

/// Where a call's outcome goes
#[derive(Debug)]
pub enum Completion {
    /// A caller awaiting the result
    Caller(oneshot::Sender<Result<Value>>),
    /// Applied by the engine itself, in the step that settles the call
    Engine(EngineCall),
}

/// Calls whose outcome changes engine state
#[derive(Debug)]
pub enum EngineCall {
    /// The `initialize` handshake
    Handshake,
    /// `thread/start`; the session is stored before the caller hears back
    ThreadStart {
        cwd: String,
        mode: PermissionMode,
        reply: oneshot::Sender<Result<Arc<Session>>>,
    },
}

/// An engine-owned call together with its outcome
pub type Settled = (EngineCall, Result<Value>);

impl Completion {
    /// Deliver `result`, handing engine-owned calls back
    fn settle(self, result: Result<Value>) -> Option<Settled> {
        match self {
            Completion::Caller(tx) => {
                if tx.send(result).is_err() {
                    trace!("Caller dropped before settlement");
                }
                None
            }
            Completion::Engine(call) => Some((call, result)),
        }
    }
}

#[derive(Debug)]
struct PendingCall {
    method: String,
    started_at: Instant,
    completion: Completion,
    timer: JoinHandle<()>,
}

impl PendingCall {
    fn elapsed_ms(&self) -> u64 {
        u64::try_from(self.started_at.elapsed().as_millis()).unwrap_or(u64::MAX)
    }
}

/// Correlates outbound calls with inbound responses
///
/// Methods that settle a call return the engine-owned calls among those
/// settled, for the engine to apply.
#[derive(Debug)]
pub struct CallDispatcher {
    pending: HashMap<u64, PendingCall>,
    expiries: mpsc::UnboundedSender<u64>,
}

impl CallDispatcher {
    /// `expiries` receives the id of every call whose timer fires
    pub fn new(expiries: mpsc::UnboundedSender<u64>) -> Self {
        Self {
            pending: HashMap::new(),
            expiries,
        }
    }

    /// Send a call over `link` and register it
    ///
    /// If the frame cannot be sent the call settles at once with
    /// `NotConnected` and nothing is registered.
    pub fn call(
        &mut self,
        link: &Link,
        method: &str,
        params: Value,
        timeout: Duration,
        completion: Completion,
    ) -> Option<Settled> {
        let id = next_call_id();
        let text = match RpcRequest::new(id, method, &params).to_text() {
            Ok(text) => text,
            Err(e) => return completion.settle(Err(e.into())),
        };

        trace!(direction = "out", frame = %text, "wire");
        if let Err(e) = link.send_text(text) {
            debug!(id, method, "Transport gone, call not sent");
            return completion.settle(Err(e));
        }

        let expiries = self.expiries.clone();
        let timer = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            if expiries.send(id).is_err() {
                trace!(id, "Engine gone before call timer fired");
            }
        });

        debug!(id, method, timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX), "Call sent");
        self.pending.insert(
            id,
            PendingCall {
                method: method.to_string(),
                started_at: Instant::now(),
                completion,
                timer,
            },
        );
        None
    }

    /// Settle the call matching a response
    ///
    /// `outcome` is the response's result, or its verbatim error payload.
    pub fn on_response(&mut self, id: u64, outcome: std::result::Result<Value, Value>) -> Option<Settled> {
        let Some(call) = self.pending.remove(&id) else {
            debug!(id, "Response for unknown call ignored");
            return None;
        };
        call.timer.abort();

        let elapsed_ms = call.elapsed_ms();
        let result = match outcome {
            Ok(value) => {
                debug!(id, method = %call.method, elapsed_ms, "Call resolved");
                Ok(value)
            }
            Err(payload) => {
                let err = ClientError::rpc(payload);
                debug!(id, method = %call.method, elapsed_ms, error = %err, "Call rejected");
                Err(err)
            }
        };
        call.completion.settle(result)
    }

    /// Settle a call whose timer fired, if it is still outstanding
    pub fn on_expired(&mut self, id: u64) -> Option<Settled> {
        let call = self.pending.remove(&id)?;
        let elapsed_ms = call.elapsed_ms();
        warn!(id, method = %call.method, elapsed_ms, "Call timed out");
        call.completion
            .settle(Err(ClientError::timeout(call.method, elapsed_ms)))
    }

    /// Reject every outstanding call and clear the table
    pub fn fail_all(&mut self, reason: &str) -> Vec<Settled> {
        if !self.pending.is_empty() {
            debug!(count = self.pending.len(), reason, "Failing outstanding calls");
        }

        self.pending
            .drain()
            .filter_map(|(_, call)| {
                call.timer.abort();
                call.completion
                    .settle(Err(ClientError::connection_closed(reason)))
            })
            .collect()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn is_pending(&self, id: u64) -> bool {
        self.pending.contains_key(&id)
    }
}

impl Drop for CallDispatcher {
    fn drop(&mut self) {
        for (_, call) in self.pending.drain() {
            call.timer.abort();
        }
    }
}
