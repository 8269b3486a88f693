//! The engine task
//!
//! One task owns the connection, the pending-call table and the session
//! store. Commands from client handles, transport events and timer expiries
//! are handled one at a time in arrival order, so no state is ever touched
//! concurrently. After every change a fresh snapshot is published.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;

use crate::connection::{CallDispatcher, Completion, ConnectionStatus, EngineCall};
use crate::protocol::methods::{Initialize, ThreadStart};
use crate::protocol::{
    ClientInfo, Inbound, InitializeParams, NotificationError, RpcMethod, ServerNotification,
    ThreadStartParams, ThreadStartResult, classify,
};
use crate::router;
use crate::session::{PermissionMode, Session, SessionStore};
use crate::transport::{Connector, Link, TransportEvent};
use crate::types::{ClientConfig, ClientError, Result};

use super::snapshot::ClientSnapshot;

/// Local change to one session
#[derive(Debug)]
pub(crate) enum SessionEdit {
    /// Optimistic user message for a send
    AppendUser { content: String },
    /// Approval: new mode, denial flags cleared
    Approve { mode: PermissionMode },
    /// Mode change only
    SetMode { mode: PermissionMode },
    /// Denial flags cleared, nothing else
    Dismiss,
}

/// Requests from client handles
#[derive(Debug)]
pub(crate) enum Command {
    Connect {
        address: String,
        reply: oneshot::Sender<()>,
    },
    Disconnect {
        reply: oneshot::Sender<()>,
    },
    Call {
        method: String,
        params: Value,
        reply: oneshot::Sender<Result<Value>>,
    },
    /// `thread/start`, with the session stored when the response is handled
    CreateSession {
        cwd: String,
        mode: PermissionMode,
        reply: oneshot::Sender<Result<Arc<Session>>>,
    },
    EditSession {
        thread_id: String,
        edit: SessionEdit,
        reply: oneshot::Sender<Result<()>>,
    },
    RemoveSession {
        thread_id: String,
        reply: oneshot::Sender<Option<Arc<Session>>>,
    },
}

pub(crate) struct Engine {
    config: ClientConfig,
    connector: Arc<dyn Connector>,
    commands: mpsc::UnboundedReceiver<Command>,
    expiries: mpsc::UnboundedReceiver<u64>,
    dispatcher: CallDispatcher,
    store: SessionStore,
    link: Option<Link>,
    /// Transport reported open for the current link
    link_open: bool,
    status: ConnectionStatus,
    snapshots: watch::Sender<ClientSnapshot>,
    shutdown: CancellationToken,
}

impl Engine {
    pub(crate) fn new(
        config: ClientConfig,
        connector: Arc<dyn Connector>,
        commands: mpsc::UnboundedReceiver<Command>,
        snapshots: watch::Sender<ClientSnapshot>,
        shutdown: CancellationToken,
    ) -> Self {
        let (expiry_tx, expiry_rx) = mpsc::unbounded_channel();
        Self {
            config,
            connector,
            commands,
            expiries: expiry_rx,
            dispatcher: CallDispatcher::new(expiry_tx),
            store: SessionStore::new(),
            link: None,
            link_open: false,
            status: ConnectionStatus::Disconnected,
            snapshots,
            shutdown,
        }
    }

    pub(crate) async fn run(mut self) {
        tracing::debug!("Engine started");

        loop {
            let changed = tokio::select! {
                biased;
                () = self.shutdown.cancelled() => break,
                command = self.commands.recv() => match command {
                    Some(command) => self.handle_command(command),
                    None => break,
                },
                event = next_transport_event(&mut self.link) => self.handle_transport_event(event),
                Some(id) = self.expiries.recv() => self.handle_expiry(id),
            };

            if changed {
                self.publish();
            }
        }

        self.stop();
        tracing::debug!("Engine stopped");
    }

    fn publish(&self) {
        self.snapshots.send_replace(ClientSnapshot {
            status: self.status.clone(),
            sessions: self.store.share(),
        });
    }

    fn set_status(&mut self, status: ConnectionStatus) -> bool {
        if self.status == status {
            return false;
        }
        tracing::info!(from = %self.status, to = %status, "Connection status changed");
        self.status = status;
        true
    }

    /// Close the current link and reject everything sent over it
    fn drop_link(&mut self, reason: &str) {
        if let Some(link) = self.link.take() {
            tracing::debug!(address = %link.address(), reason, "Closing connection");
            link.close();
        }
        self.link_open = false;
        self.reject_pending(reason);
    }

    /// Reject every outstanding call; the caller sets the status
    fn reject_pending(&mut self, reason: &str) {
        for (call, outcome) in self.dispatcher.fail_all(reason) {
            // a pending handshake dies with its link
            if !matches!(call, EngineCall::Handshake) {
                self.complete(call, outcome);
            }
        }
    }

    fn stop(&mut self) {
        self.drop_link("Client shut down");
        self.set_status(ConnectionStatus::Disconnected);
        self.publish();
    }

    fn handle_command(&mut self, command: Command) -> bool {
        match command {
            Command::Connect { address, reply } => {
                let changed = self.handle_connect(address);
                // publish before the caller starts watching for the outcome
                if changed {
                    self.publish();
                }
                send_reply(reply, ());
                false
            }
            Command::Disconnect { reply } => {
                self.handle_disconnect();
                self.publish();
                send_reply(reply, ());
                false
            }
            Command::Call {
                method,
                params,
                reply,
            } => self.handle_call(method, params, reply),
            Command::CreateSession { cwd, mode, reply } => {
                self.handle_create_session(cwd, mode, reply)
            }
            Command::EditSession {
                thread_id,
                edit,
                reply,
            } => {
                let result = self.store.update(&thread_id, |session| apply_edit(session, edit));
                if result.is_ok() {
                    self.publish();
                }
                send_reply(reply, result);
                false
            }
            Command::RemoveSession { thread_id, reply } => {
                let removed = self.store.remove(&thread_id);
                if removed.is_some() {
                    tracing::info!(thread_id = %thread_id, "Session removed");
                    self.publish();
                }
                send_reply(reply, removed);
                false
            }
        }
    }

    #[tracing::instrument(name = "connect", skip(self))]
    fn handle_connect(&mut self, address: String) -> bool {
        let same_target = self
            .link
            .as_ref()
            .is_some_and(|link| link.address() == address);
        if same_target && matches!(self.status, ConnectionStatus::Connecting | ConnectionStatus::Connected) {
            tracing::debug!("Already connecting or connected, ignoring");
            return false;
        }

        self.drop_link("Connection replaced");
        tracing::info!("Opening connection");
        self.link = Some(self.connector.open(&address, self.config.connect_timeout));
        self.set_status(ConnectionStatus::Connecting);
        true
    }

    #[tracing::instrument(name = "disconnect", skip(self))]
    fn handle_disconnect(&mut self) {
        self.drop_link("Disconnected");
        let cleared = self.store.len();
        self.store.clear();
        tracing::info!(cleared, "Disconnected, sessions cleared");
        self.set_status(ConnectionStatus::Disconnected);
    }

    fn handle_call(
        &mut self,
        method: String,
        params: Value,
        reply: oneshot::Sender<Result<Value>>,
    ) -> bool {
        let Some(link) = self.link.as_ref().filter(|_| self.link_open) else {
            tracing::debug!(method = %method, "Call rejected, not connected");
            send_reply(reply, Err(ClientError::NotConnected));
            return false;
        };

        self.dispatcher.call(
            link,
            &method,
            params,
            self.config.call_timeout,
            Completion::Caller(reply),
        );
        false
    }

    fn handle_create_session(
        &mut self,
        cwd: String,
        mode: PermissionMode,
        reply: oneshot::Sender<Result<Arc<Session>>>,
    ) -> bool {
        let Some(link) = self.link.as_ref().filter(|_| self.link_open) else {
            tracing::debug!(cwd = %cwd, "Session creation rejected, not connected");
            send_reply(reply, Err(ClientError::NotConnected));
            return false;
        };

        let params = ThreadStartParams {
            cwd: cwd.clone(),
            permission_mode: mode,
        };
        let params = match serde_json::to_value(params) {
            Ok(params) => params,
            Err(e) => {
                send_reply(reply, Err(e.into()));
                return false;
            }
        };
        let settled = self.dispatcher.call(
            link,
            ThreadStart::NAME,
            params,
            self.config.call_timeout,
            Completion::Engine(EngineCall::ThreadStart { cwd, mode, reply }),
        );
        match settled {
            Some((call, outcome)) => self.complete(call, outcome),
            None => false,
        }
    }

    /// Apply the outcome of an engine-owned call
    fn complete(&mut self, call: EngineCall, outcome: Result<Value>) -> bool {
        match call {
            EngineCall::Handshake => self.finish_handshake(outcome),
            EngineCall::ThreadStart { cwd, mode, reply } => {
                let result = outcome
                    .and_then(|value| Ok(serde_json::from_value::<ThreadStartResult>(value)?))
                    .and_then(|started| {
                        let session =
                            Session::new(started.thread_id, started.created_at, cwd, mode);
                        self.store.insert(session)
                    });
                let changed = result.is_ok();
                match &result {
                    Ok(session) => {
                        tracing::info!(thread_id = %session.thread_id, "Session created");
                    }
                    Err(e) => tracing::debug!(error = %e, "Session creation failed"),
                }
                send_reply(reply, result);
                changed
            }
        }
    }

    fn handle_transport_event(&mut self, event: TransportEvent) -> bool {
        match event {
            TransportEvent::Opened => self.handle_opened(),
            TransportEvent::Message(text) => self.handle_frame(&text),
            TransportEvent::Closed(info) => {
                let address = self.link.take().map(|link| link.address().to_string());
                self.link_open = false;
                tracing::info!(
                    address = ?address,
                    code = info.code,
                    reason = ?info.reason,
                    "Connection closed"
                );
                self.reject_pending("Connection closed");
                self.set_status(ConnectionStatus::from_close(&info))
            }
        }
    }

    /// Transport is open; start the handshake
    fn handle_opened(&mut self) -> bool {
        let Some(link) = self.link.as_ref() else {
            return false;
        };
        self.link_open = true;
        tracing::debug!(address = %link.address(), "Transport open, sending initialize");

        let params = InitializeParams {
            client: ClientInfo {
                name: self.config.client_name.clone(),
                version: self.config.client_version.clone(),
            },
        };
        let settled = match serde_json::to_value(params) {
            Ok(params) => self.dispatcher.call(
                link,
                Initialize::NAME,
                params,
                self.config.handshake_timeout,
                Completion::Engine(EngineCall::Handshake),
            ),
            Err(e) => Some((EngineCall::Handshake, Err(e.into()))),
        };

        match settled {
            Some((call, outcome)) => self.complete(call, outcome),
            None => false,
        }
    }

    fn finish_handshake(&mut self, outcome: Result<Value>) -> bool {
        match outcome {
            Ok(_) => {
                tracing::info!("Handshake complete");
                self.set_status(ConnectionStatus::Connected)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Handshake failed");
                self.drop_link("Handshake failed");
                self.set_status(ConnectionStatus::error(format!("Handshake failed: {e}")))
            }
        }
    }

    fn handle_frame(&mut self, text: &str) -> bool {
        tracing::trace!(direction = "in", frame = %text, "wire");

        match classify(text) {
            Ok(Inbound::Response { id, outcome }) => match self.dispatcher.on_response(id, outcome) {
                Some((call, outcome)) => self.complete(call, outcome),
                None => false,
            },
            Ok(Inbound::Notification { method, params }) => {
                match ServerNotification::parse(&method, params) {
                    Ok(notification) => router::route(&mut self.store, notification),
                    Err(NotificationError::Unknown(method)) => {
                        tracing::debug!(method = %method, "Ignoring unknown notification");
                        false
                    }
                    Err(e @ NotificationError::Invalid { .. }) => {
                        tracing::warn!(error = %e, "Discarding malformed notification");
                        false
                    }
                }
            }
            Ok(Inbound::Request { id, method }) => {
                tracing::debug!(id = %id, method = %method, "Discarding server request");
                false
            }
            Err(reason) => {
                tracing::debug!(reason = %reason, "Discarding malformed frame");
                false
            }
        }
    }

    fn handle_expiry(&mut self, id: u64) -> bool {
        match self.dispatcher.on_expired(id) {
            Some((call, outcome)) => self.complete(call, outcome),
            None => false,
        }
    }
}

fn apply_edit(session: &mut Session, edit: SessionEdit) {
    match edit {
        SessionEdit::AppendUser { content } => {
            session.push_user_message(&content);
        }
        SessionEdit::Approve { mode } => session.approve(mode),
        SessionEdit::SetMode { mode } => session.permission_mode = mode,
        SessionEdit::Dismiss => session.clear_denials(),
    }
}

/// Answer a caller; one that stopped waiting is not an error
fn send_reply<T>(reply: oneshot::Sender<T>, value: T) {
    if reply.send(value).is_err() {
        tracing::trace!("Caller went away before the reply");
    }
}

async fn next_transport_event(link: &mut Option<Link>) -> TransportEvent {
    match link {
        Some(link) => link.next_event().await,
        None => std::future::pending().await,
    }
}
