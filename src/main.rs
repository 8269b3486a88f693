//! agent-link binary
//!
//! Run with: cargo run -- --url ws://127.0.0.1:8765 "your prompt"
//!
//! For help: cargo run -- --help

use std::io::IsTerminal;

use agent_link::{cli::Cli, run_with_cli, shutdown_otel};
use clap::Parser;
use tokio::signal;
use tokio_util::sync::CancellationToken;

/// Resolve on SIGINT or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            eprintln!("Failed to listen for SIGINT: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                eprintln!("Failed to register SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => eprintln!("Received SIGINT, shutting down..."),
        () = terminate => eprintln!("Received SIGTERM, shutting down..."),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let shutdown = CancellationToken::new();
    let signals = tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            shutdown_signal().await;
            shutdown.cancel();
        }
    });

    let result = run_with_cli(&cli, shutdown).await;
    signals.abort();

    // Flush pending spans
    shutdown_otel();

    match result {
        Ok(outcome) => {
            let code = outcome.exit_code();
            if code != 0 {
                std::process::exit(code);
            }
            Ok(())
        }
        Err(e) => {
            eprintln!("Error: {e:#}");
            if std::io::stdin().is_terminal() {
                eprintln!("\nFor debugging, run with --diagnostic to log to a file.");
                eprintln!("Or use -v/-vv/-vvv for more verbose logging.");
            }
            std::process::exit(1);
        }
    }
}
