//! agent-link
//!
//! Client-side protocol engine for conversational agent servers that speak
//! JSON-RPC 2.0 over a persistent WebSocket connection.
//!
//! ## Features
//!
//! - Connection lifecycle with an `initialize` handshake and close-code mapping
//! - Request/response correlation with per-call timeouts
//! - Server notifications routed into per-session chat history, with live
//!   streaming text assembled from deltas
//! - Permission-denial tracking with approve, dismiss and retry
//! - Immutable snapshots of the whole client state for any UI to render
//!
//! ## Quick Start
//!
//! ```no_run
//! use agent_link::{AgentClient, ClientConfig, PermissionMode};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = AgentClient::websocket(ClientConfig::load());
//!     client.connect_and_wait("ws://127.0.0.1:8765").await?;
//!
//!     let session = client.create_session("/work", PermissionMode::Default).await?;
//!     client.send_message(&session.thread_id, "hello", None).await?;
//!
//!     let snapshot = client
//!         .wait_for(|s| s.session(&session.thread_id).is_some_and(|s| s.completed_turns > 0))
//!         .await?;
//!     if let Some(session) = snapshot.session(&session.thread_id) {
//!         println!("{}", session.assistant_text());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Environment Variables
//!
//! - `AGENT_LINK_URL`: Server address
//! - `AGENT_LINK_CLIENT_NAME`: Name sent in the handshake
//! - `AGENT_LINK_CALL_TIMEOUT_MS`: Deadline for ordinary calls (default: 30000)
//! - `AGENT_LINK_HANDSHAKE_TIMEOUT_MS`: Deadline for `initialize` (default: 60000)
//! - `AGENT_LINK_CONNECT_TIMEOUT_MS`: Deadline for opening the socket (default: 10000)
//! - `AGENT_LINK_PERMISSION_MODE`: Mode for new sessions
//! - `AGENT_LINK_MODEL`: Model passed with `turn/start`
//!
//! Environment variables override `~/.agent-link/settings.json`, which
//! overrides the defaults.

pub mod cli;
pub mod connection;
pub mod engine;
pub mod logging;
pub mod protocol;
pub mod router;
pub mod runner;
pub mod session;
pub mod transport;
pub mod types;

pub use connection::ConnectionStatus;
pub use engine::{AgentClient, ClientSnapshot};
pub use logging::shutdown_otel;
pub use runner::{RunOutcome, run_with_cli};
pub use session::{PermissionMode, Session};
pub use types::{ClientConfig, ClientError, Result};
