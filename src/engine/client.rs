//! Presentation-facing client handle
//!
//! `AgentClient` is a cheap, cloneable handle to the engine task. Most
//! operations that combine a local change with a call run here, in the
//! caller's task, as a sequence of engine commands. Session creation is the
//! exception: its store insert must land in the same engine step as the
//! `thread/start` response. The engine itself never waits on the network.

use std::sync::Arc;

use futures::Stream;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::connection::ConnectionStatus;
use crate::protocol::methods::{ApprovalRespond, ThreadStart, TurnInterrupt, TurnStart};
use crate::protocol::{
    ApprovalRespondParams, RpcMethod, ThreadStartParams, ThreadStartResult, TurnInterruptParams,
    TurnStartParams, TurnStartResult,
};
use crate::session::{PermissionMode, Session};
use crate::transport::{Connector, WebSocketConnector};
use crate::types::{ClientConfig, ClientError, Result};

use super::core::{Command, Engine, SessionEdit};
use super::snapshot::ClientSnapshot;

/// Handle to a running client engine
#[derive(Debug, Clone)]
pub struct AgentClient {
    commands: mpsc::UnboundedSender<Command>,
    snapshots: watch::Receiver<ClientSnapshot>,
    shutdown: CancellationToken,
    config: Arc<ClientConfig>,
}

impl AgentClient {
    /// Start an engine task using `connector` for transport
    ///
    /// Must be called from within a tokio runtime. The engine stops when
    /// [`shutdown`](Self::shutdown) is called or the last handle is dropped.
    pub fn spawn(config: ClientConfig, connector: Arc<dyn Connector>) -> Self {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (snapshot_tx, snapshot_rx) = watch::channel(ClientSnapshot::default());
        let shutdown = CancellationToken::new();

        let engine = Engine::new(
            config.clone(),
            connector,
            command_rx,
            snapshot_tx,
            shutdown.clone(),
        );
        tokio::spawn(
            engine
                .run()
                .instrument(tracing::info_span!("engine", client = %config.client_name)),
        );

        Self {
            commands: command_tx,
            snapshots: snapshot_rx,
            shutdown,
            config: Arc::new(config),
        }
    }

    /// Start an engine over WebSocket
    pub fn websocket(config: ClientConfig) -> Self {
        Self::spawn(config, Arc::new(WebSocketConnector::new()))
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn send(&self, command: Command) -> Result<()> {
        if self.shutdown.is_cancelled() {
            return Err(ClientError::EngineStopped);
        }
        self.commands
            .send(command)
            .map_err(|_| ClientError::EngineStopped)
    }

    async fn request<T>(&self, build: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T> {
        let (tx, rx) = oneshot::channel();
        self.send(build(tx))?;
        rx.await.map_err(|_| ClientError::EngineStopped)
    }

    // === Connection ===

    /// Start connecting to `address`
    ///
    /// Returns once the engine has acted on the request; the outcome shows up
    /// in [`status`](Self::status). Connecting again to the address already
    /// being connected to is a no-op.
    pub async fn connect(&self, address: impl Into<String>) -> Result<()> {
        let address = address.into();
        self.request(|reply| Command::Connect { address, reply }).await
    }

    /// Connect and wait until the handshake settles
    #[tracing::instrument(skip(self, address), fields(address))]
    pub async fn connect_and_wait(&self, address: impl Into<String>) -> Result<()> {
        let address = address.into();
        tracing::Span::current().record("address", address.as_str());

        self.connect(address).await?;

        let bound = self.config.handshake_timeout + self.config.connect_timeout;
        let mut snapshots = self.subscribe();
        let settled = tokio::time::timeout(
            bound,
            snapshots.wait_for(|snapshot| snapshot.status.is_settled()),
        )
        .await
        .map_err(|_| {
            ClientError::timeout("connect", u64::try_from(bound.as_millis()).unwrap_or(u64::MAX))
        })?
        .map_err(|_| ClientError::EngineStopped)?
        .status
        .clone();

        match settled {
            ConnectionStatus::Connected => Ok(()),
            ConnectionStatus::Error { message } => Err(ClientError::ConnectionFailed(message)),
            other => Err(ClientError::connection_failed(other.to_string())),
        }
    }

    /// Close the connection and drop every session
    pub async fn disconnect(&self) -> Result<()> {
        self.request(|reply| Command::Disconnect { reply }).await
    }

    /// Stop the engine
    ///
    /// Outstanding calls reject with `ConnectionClosed`; every later
    /// operation fails with `EngineStopped`.
    pub fn shutdown(&self) {
        tracing::debug!("Client shutdown requested");
        self.shutdown.cancel();
    }

    // === Calls ===

    /// Raw JSON-RPC call
    pub async fn call(&self, method: impl Into<String>, params: Value) -> Result<Value> {
        let method = method.into();
        self.request(|reply| Command::Call {
            method,
            params,
            reply,
        })
        .await?
    }

    /// Call with typed params and result
    pub async fn call_typed<M: RpcMethod>(&self, params: M::Params) -> Result<M::Result> {
        let params = serde_json::to_value(params)?;
        let result = self.call(M::NAME, params).await?;
        Ok(serde_json::from_value(result)?)
    }

    pub async fn thread_start(&self, params: ThreadStartParams) -> Result<ThreadStartResult> {
        self.call_typed::<ThreadStart>(params).await
    }

    pub async fn turn_start(&self, params: TurnStartParams) -> Result<TurnStartResult> {
        self.call_typed::<TurnStart>(params).await
    }

    pub async fn turn_interrupt(&self, params: TurnInterruptParams) -> Result<Value> {
        self.call_typed::<TurnInterrupt>(params).await
    }

    pub async fn approval_respond(&self, params: ApprovalRespondParams) -> Result<Value> {
        self.call_typed::<ApprovalRespond>(params).await
    }

    // === Session operations ===

    async fn edit(&self, thread_id: &str, edit: SessionEdit) -> Result<()> {
        let thread_id = thread_id.to_string();
        self.request(|reply| Command::EditSession {
            thread_id,
            edit,
            reply,
        })
        .await?
    }

    /// Open a new thread on the server and track it locally
    #[tracing::instrument(skip(self, working_directory), fields(cwd))]
    pub async fn create_session(
        &self,
        working_directory: impl Into<String>,
        permission_mode: PermissionMode,
    ) -> Result<Arc<Session>> {
        let cwd = working_directory.into();
        tracing::Span::current().record("cwd", cwd.as_str());

        self.request(|reply| Command::CreateSession {
            cwd,
            mode: permission_mode,
            reply,
        })
        .await?
    }

    /// Append a user message and start a turn
    ///
    /// The user message stays in the history even if `turn/start` fails.
    /// Without an explicit `model`, the configured default is used.
    #[tracing::instrument(skip(self, content, model))]
    pub async fn send_message(
        &self,
        thread_id: &str,
        content: &str,
        model: Option<String>,
    ) -> Result<TurnStartResult> {
        self.edit(
            thread_id,
            SessionEdit::AppendUser {
                content: content.to_string(),
            },
        )
        .await?;

        let result = self
            .turn_start(TurnStartParams {
                thread_id: thread_id.to_string(),
                content: content.to_string(),
                model: model.or_else(|| self.config.model.clone()),
            })
            .await;
        match &result {
            Ok(started) => tracing::debug!(turn_id = %started.turn_id, "Turn start accepted"),
            Err(e) => tracing::warn!(error = %e, "turn/start failed, message kept"),
        }
        result
    }

    /// Ask the server to stop the running turn
    ///
    /// Advisory only: the session stays active until the server reports the
    /// turn ended.
    #[tracing::instrument(skip(self))]
    pub async fn interrupt_turn(&self, thread_id: &str) -> Result<()> {
        self.turn_interrupt(TurnInterruptParams {
            thread_id: thread_id.to_string(),
        })
        .await
        .map(drop)
    }

    /// Best-effort `approval/respond`; failures are logged and swallowed
    async fn respond_approval(&self, thread_id: &str, mode: PermissionMode) {
        let params = ApprovalRespondParams {
            thread_id: thread_id.to_string(),
            approved: true,
            permission_mode: Some(mode),
        };
        if let Err(e) = self.approval_respond(params).await {
            tracing::warn!(
                thread_id,
                method = ApprovalRespond::NAME,
                error = %e,
                "Ignoring failed approval response"
            );
        }
    }

    /// Approve the blocked tools under `mode` and clear the denial
    ///
    /// The caller re-sends the blocked content afterwards, see
    /// [`retry_blocked`](Self::retry_blocked).
    #[tracing::instrument(skip(self))]
    pub async fn approve_permission(&self, thread_id: &str, mode: PermissionMode) -> Result<()> {
        self.require_session(thread_id)?;
        self.respond_approval(thread_id, mode).await;
        self.edit(thread_id, SessionEdit::Approve { mode }).await
    }

    /// Switch the session's permission mode
    #[tracing::instrument(skip(self))]
    pub async fn change_permission_mode(
        &self,
        thread_id: &str,
        mode: PermissionMode,
    ) -> Result<()> {
        self.require_session(thread_id)?;
        self.respond_approval(thread_id, mode).await;
        self.edit(thread_id, SessionEdit::SetMode { mode }).await
    }

    /// Dismiss a denial locally; nothing is sent
    pub async fn dismiss_permission(&self, thread_id: &str) -> Result<()> {
        self.edit(thread_id, SessionEdit::Dismiss).await
    }

    /// Re-send the content that was blocked by the last denial
    #[tracing::instrument(skip(self, model))]
    pub async fn retry_blocked(
        &self,
        thread_id: &str,
        model: Option<String>,
    ) -> Result<TurnStartResult> {
        let session = self.require_session(thread_id)?;
        let content = session
            .last_blocked_content
            .clone()
            .ok_or_else(|| ClientError::NothingToRetry(thread_id.to_string()))?;
        self.send_message(thread_id, &content, model).await
    }

    /// Remove a session, interrupting its turn first if one is running
    #[tracing::instrument(skip(self))]
    pub async fn delete_session(&self, thread_id: &str) -> Result<()> {
        let session = self.require_session(thread_id)?;

        if session.is_active()
            && let Err(e) = self.interrupt_turn(thread_id).await
        {
            tracing::warn!(
                thread_id,
                method = TurnInterrupt::NAME,
                error = %e,
                "Ignoring failed interrupt before delete"
            );
        }

        let id = thread_id.to_string();
        self.request(|reply| Command::RemoveSession {
            thread_id: id,
            reply,
        })
        .await?
        .map(drop)
        .ok_or_else(|| ClientError::session_not_found(thread_id))
    }

    // === Read access ===

    pub fn status(&self) -> ConnectionStatus {
        self.snapshots.borrow().status.clone()
    }

    pub fn snapshot(&self) -> ClientSnapshot {
        self.snapshots.borrow().clone()
    }

    pub fn session(&self, thread_id: &str) -> Option<Arc<Session>> {
        self.snapshots.borrow().session(thread_id)
    }

    fn require_session(&self, thread_id: &str) -> Result<Arc<Session>> {
        self.session(thread_id)
            .ok_or_else(|| ClientError::session_not_found(thread_id))
    }

    /// All sessions, oldest first
    pub fn sessions(&self) -> Vec<Arc<Session>> {
        self.snapshots.borrow().sessions()
    }

    pub fn subscribe(&self) -> watch::Receiver<ClientSnapshot> {
        self.snapshots.clone()
    }

    /// Stream of snapshots, starting with the current one
    ///
    /// Intermediate states may be coalesced when the reader falls behind.
    pub fn updates(&self) -> impl Stream<Item = ClientSnapshot> + Send + 'static {
        let mut snapshots = self.subscribe();
        async_stream::stream! {
            snapshots.mark_changed();
            while snapshots.changed().await.is_ok() {
                let snapshot = snapshots.borrow_and_update().clone();
                yield snapshot;
            }
        }
    }

    /// Wait until a snapshot satisfies `predicate`
    pub async fn wait_for<F>(&self, mut predicate: F) -> Result<ClientSnapshot>
    where
        F: FnMut(&ClientSnapshot) -> bool,
    {
        let mut snapshots = self.subscribe();
        let snapshot = snapshots
            .wait_for(|snapshot| predicate(snapshot))
            .await
            .map_err(|_| ClientError::EngineStopped)?;
        Ok(snapshot.clone())
    }
}
