//! One-shot runner behind the `agent-link` binary
//!
//! Connect, open a session, send one prompt, wait for the turn to end and
//! print what the assistant said.

use anyhow::Context;
use tokio_util::sync::CancellationToken;

use crate::cli::Cli;
use crate::engine::{AgentClient, ClientSnapshot};
use crate::logging::{ResultTraceExt, init_logging};
use crate::session::{PermissionMode, Session};
use crate::types::ClientConfig;

/// How a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Handshake only, no prompt given
    Connected,
    /// Turn completed
    Completed,
    /// Turn ended with an error
    TurnFailed,
    /// Tools were blocked by the permission mode
    Denied,
    /// Stopped by a signal
    Interrupted,
}

impl RunOutcome {
    pub fn exit_code(self) -> i32 {
        match self {
            RunOutcome::Connected | RunOutcome::Completed => 0,
            RunOutcome::TurnFailed => 1,
            RunOutcome::Denied => 2,
            RunOutcome::Interrupted => 130,
        }
    }
}

/// Apply CLI overrides to the loaded configuration
fn apply_cli(mut config: ClientConfig, cli: &Cli) -> ClientConfig {
    if let Some(url) = &cli.url {
        config.server_url = Some(url.clone());
    }
    if let Some(model) = &cli.model {
        config.model = Some(model.clone());
    }
    if let Some(mode) = cli.mode {
        config.default_permission_mode = mode;
    }
    config
}

/// Run with CLI arguments until the turn ends or `shutdown` fires
pub async fn run_with_cli(cli: &Cli, shutdown: CancellationToken) -> anyhow::Result<RunOutcome> {
    init_logging(cli)?;

    {
        let startup_span = tracing::info_span!(
            "startup",
            version = %env!("CARGO_PKG_VERSION"),
            pid = %std::process::id(),
            diagnostic = %cli.is_diagnostic(),
        );
        let _enter = startup_span.enter();
        if cli.is_diagnostic() {
            tracing::info!(log_path = %cli.log_path().display(), "Diagnostic mode enabled");
        }
        tracing::info!("agent-link starting");
    }

    let config = apply_cli(ClientConfig::load(), cli);
    let url = config
        .server_url
        .clone()
        .context("No server address; pass --url or set AGENT_LINK_URL")?;

    let client = AgentClient::websocket(config);
    let outcome = tokio::select! {
        outcome = drive(&client, cli, &url) => outcome,
        () = shutdown.cancelled() => {
            tracing::info!("Interrupted, shutting down");
            Ok(RunOutcome::Interrupted)
        }
    };
    client.shutdown();
    outcome
}

#[tracing::instrument(name = "run", skip_all, fields(url = %url))]
async fn drive(client: &AgentClient, cli: &Cli, url: &str) -> anyhow::Result<RunOutcome> {
    client
        .connect_and_wait(url)
        .await
        .trace_context()
        .with_context(|| format!("Failed to connect to {url}"))?;

    let Some(prompt) = cli.prompt.as_deref() else {
        let status = client.status();
        if cli.json {
            println!("{}", serde_json::to_string_pretty(&status)?);
        } else {
            println!("{status} ({url})");
        }
        return Ok(RunOutcome::Connected);
    };

    let cwd = match &cli.cwd {
        Some(dir) => dir.clone(),
        None => std::env::current_dir().context("Failed to read the current directory")?,
    };
    let mode = client.config().default_permission_mode;

    let session = client
        .create_session(cwd.display().to_string(), mode)
        .await
        .trace_context()
        .context("Failed to create a session")?;
    let thread_id = session.thread_id.clone();
    let turns_before = session.completed_turns;

    client
        .send_message(&thread_id, prompt, None)
        .await
        .trace_context()
        .context("Failed to start the turn")?;

    let snapshot = client
        .wait_for(|snapshot| turn_settled(snapshot, &thread_id, turns_before))
        .await?;

    if !snapshot.status.is_connected() {
        anyhow::bail!("Connection lost before the turn ended: {}", snapshot.status);
    }
    let session = snapshot
        .session(&thread_id)
        .with_context(|| format!("Session {thread_id} disappeared"))?;

    report(&session, cli.json, mode)
}

/// The turn is over, blocked, or the connection is gone
fn turn_settled(snapshot: &ClientSnapshot, thread_id: &str, turns_before: u64) -> bool {
    if !snapshot.status.is_connected() {
        return true;
    }
    snapshot
        .session(thread_id)
        .is_none_or(|s| s.completed_turns > turns_before || s.has_permission_denial)
}

fn report(session: &Session, json: bool, mode: PermissionMode) -> anyhow::Result<RunOutcome> {
    if json {
        println!("{}", serde_json::to_string_pretty(session)?);
    } else {
        let text = session.assistant_text();
        if !text.is_empty() {
            println!("{text}");
        }
    }

    let outcome = outcome_of(session);
    match outcome {
        RunOutcome::Denied => {
            eprintln!("Blocked by permission mode '{mode}':");
            for denial in session.pending_denials() {
                eprintln!("  {} ({})", denial.tool_name, denial.tool_input);
            }
            eprintln!("Re-run with --mode acceptEdits or --mode bypassPermissions to allow them.");
        }
        RunOutcome::TurnFailed => {
            if let Some(error) = &session.last_error {
                eprintln!("Turn failed: {error}");
            }
        }
        _ => {}
    }
    Ok(outcome)
}

fn outcome_of(session: &Session) -> RunOutcome {
    if session.has_permission_denial {
        RunOutcome::Denied
    } else if session.last_error.is_some() {
        RunOutcome::TurnFailed
    } else {
        RunOutcome::Completed
    }
}
