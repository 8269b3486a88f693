//! Command-line interface definitions

use std::path::PathBuf;

use clap::Parser;

use crate::session::PermissionMode;

const DEFAULT_SERVICE_NAME: &str = "agent-link";

/// agent-link - talk to a conversational agent server over JSON-RPC
#[derive(Parser, Debug, Clone)]
#[command(name = "agent-link")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Prompt to send; without one, only connect and report the status
    #[arg(value_name = "PROMPT")]
    pub prompt: Option<String>,

    /// Server address (e.g. ws://127.0.0.1:8765)
    #[arg(long, value_name = "URL", env = "AGENT_LINK_URL")]
    pub url: Option<String>,

    /// Working directory for the new session (defaults to the current directory)
    #[arg(long, value_name = "DIR")]
    pub cwd: Option<PathBuf>,

    /// Permission mode for the new session
    #[arg(long, value_name = "MODE", value_parser = parse_mode)]
    pub mode: Option<PermissionMode>,

    /// Model to request for the turn
    #[arg(long, value_name = "MODEL")]
    pub model: Option<String>,

    /// Print the final session as JSON instead of the assistant text
    #[arg(long)]
    pub json: bool,

    /// Enable diagnostic mode (auto-log to temp file)
    #[arg(short, long)]
    pub diagnostic: bool,

    /// Log directory (implies diagnostic mode)
    #[arg(short = 'l', long, value_name = "DIR")]
    pub log_dir: Option<PathBuf>,

    /// Log file name (implies diagnostic mode)
    #[arg(short = 'f', long, value_name = "FILE")]
    pub log_file: Option<String>,

    /// Emit log lines as JSON
    #[arg(long)]
    pub log_json: bool,

    /// Increase logging verbosity (-v, -vv)
    /// Note: RUST_LOG env var takes priority over this flag
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (only errors)
    /// Note: RUST_LOG env var takes priority over this flag
    #[arg(short, long)]
    pub quiet: bool,

    /// OpenTelemetry OTLP endpoint (e.g., http://localhost:4317)
    /// Accepted but ignored unless built with the otel feature.
    #[arg(long, value_name = "URL", env = "OTEL_EXPORTER_OTLP_ENDPOINT")]
    pub otel_endpoint: Option<String>,

    /// OpenTelemetry service name
    #[arg(long, value_name = "NAME", default_value = DEFAULT_SERVICE_NAME)]
    pub otel_service_name: String,
}

fn parse_mode(value: &str) -> Result<PermissionMode, String> {
    PermissionMode::parse(value).ok_or_else(|| {
        let known: Vec<_> = PermissionMode::ALL.iter().map(|m| m.as_str()).collect();
        format!("unknown mode '{value}', expected one of: {}", known.join(", "))
    })
}

impl Default for Cli {
    fn default() -> Self {
        Self {
            prompt: None,
            url: None,
            cwd: None,
            mode: None,
            model: None,
            json: false,
            diagnostic: false,
            log_dir: None,
            log_file: None,
            log_json: false,
            verbose: 0,
            quiet: false,
            otel_endpoint: None,
            otel_service_name: DEFAULT_SERVICE_NAME.to_string(),
        }
    }
}

impl Cli {
    /// Diagnostic mode: `--diagnostic`, `--log-dir` or `--log-file`
    pub fn is_diagnostic(&self) -> bool {
        self.diagnostic || self.log_dir.is_some() || self.log_file.is_some()
    }

    /// Get the log level based on CLI arguments
    ///
    /// - `--quiet`: ERROR
    /// - default: WARN
    /// - `-v`: INFO
    /// - `-vv`: DEBUG
    /// - `-vvv` or more: TRACE
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else {
            match self.verbose {
                0 => tracing::Level::WARN,
                1 => tracing::Level::INFO,
                2 => tracing::Level::DEBUG,
                _ => tracing::Level::TRACE,
            }
        }
    }

    /// Get the log file path for diagnostic mode
    ///
    /// Defaults to `agent-link-{timestamp}.log` in the system temp directory.
    pub fn log_path(&self) -> PathBuf {
        let dir = self.log_dir.clone().unwrap_or_else(std::env::temp_dir);

        let filename = self.log_file.clone().unwrap_or_else(|| {
            let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
            format!("agent-link-{timestamp}.log")
        });

        dir.join(filename)
    }
}
