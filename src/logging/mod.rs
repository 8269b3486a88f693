//! Logging setup for the binary
//!
//! Installs a `tracing-subscriber` registry with an `EnvFilter`, a `fmt`
//! layer writing to stderr or a diagnostic file, and optionally an OTLP
//! exporter when built with the `otel` feature.

mod error_ext;

pub use error_ext::{ErrorTraceExt, ResultTraceExt};

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

use crate::cli::Cli;

#[cfg(feature = "otel")]
use opentelemetry::global;
#[cfg(feature = "otel")]
use opentelemetry::trace::TracerProvider;
#[cfg(feature = "otel")]
use opentelemetry_otlp::WithExportConfig;
#[cfg(feature = "otel")]
use opentelemetry_sdk::trace::SdkTracerProvider;

#[cfg(feature = "otel")]
static OTEL_PROVIDER: std::sync::OnceLock<SdkTracerProvider> = std::sync::OnceLock::new();

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Flush and stop the OTLP exporter
///
/// Call before exit so buffered spans reach the collector.
#[cfg(feature = "otel")]
pub fn shutdown_otel() {
    if let Some(provider) = OTEL_PROVIDER.get() {
        tracing::info!("Shutting down OpenTelemetry provider...");
        if let Err(e) = provider.shutdown() {
            eprintln!("Failed to shutdown OpenTelemetry provider: {e:?}");
        } else {
            tracing::info!("OpenTelemetry provider shutdown complete");
        }
    }
}

/// No-op without the `otel` feature
#[cfg(not(feature = "otel"))]
pub fn shutdown_otel() {}

#[cfg(feature = "otel")]
fn init_otel(endpoint: &str, service_name: &str) -> anyhow::Result<SdkTracerProvider> {
    use opentelemetry_sdk::Resource;

    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build()?;

    let provider = SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .with_resource(
            Resource::builder()
                .with_service_name(service_name.to_owned())
                .build(),
        )
        .build();

    global::set_tracer_provider(provider.clone());
    Ok(provider)
}

#[cfg(feature = "otel")]
fn otel_layer(cli: &Cli) -> anyhow::Result<Option<BoxedLayer>> {
    let Some(endpoint) = cli.otel_endpoint.as_deref() else {
        return Ok(None);
    };
    let service_name = &cli.otel_service_name;
    eprintln!("OpenTelemetry enabled: endpoint={endpoint}, service={service_name}");

    let provider = init_otel(endpoint, service_name)?;
    let tracer = provider.tracer("agent-link");
    drop(OTEL_PROVIDER.set(provider));

    Ok(Some(
        tracing_opentelemetry::layer().with_tracer(tracer).boxed(),
    ))
}

#[cfg(not(feature = "otel"))]
#[allow(clippy::unnecessary_wraps)]
fn otel_layer(cli: &Cli) -> anyhow::Result<Option<BoxedLayer>> {
    if cli.otel_endpoint.is_some() {
        eprintln!("--otel-endpoint specified but the otel feature is not enabled, ignoring");
    }
    Ok(None)
}

/// Build the filter
///
/// Priority: `RUST_LOG` > CLI flags (`-q`, `-v`, `-vv`)
pub fn build_env_filter(cli: &Cli) -> EnvFilter {
    if let Ok(rust_log) = std::env::var("RUST_LOG") {
        if !rust_log.is_empty() {
            return EnvFilter::new(rust_log);
        }
    }
    EnvFilter::new(cli.log_level().to_string().to_lowercase())
}

fn fmt_layer<W>(cli: &Cli, writer: W) -> BoxedLayer
where
    W: for<'w> tracing_subscriber::fmt::MakeWriter<'w> + Send + Sync + 'static,
{
    let layer = tracing_subscriber::fmt::layer()
        .with_writer(writer)
        .with_ansi(false);
    if cli.log_json {
        layer.json().boxed()
    } else {
        layer.boxed()
    }
}

fn install(cli: &Cli, fmt: BoxedLayer) -> anyhow::Result<()> {
    let mut layers = vec![fmt];
    if let Some(otel) = otel_layer(cli)? {
        layers.push(otel);
    }
    tracing_subscriber::registry()
        .with(layers)
        .with(build_env_filter(cli))
        .try_init()?;
    Ok(())
}

/// Diagnostic mode: write to a log file
fn init_logging_to_file(cli: &Cli) -> anyhow::Result<()> {
    let log_path = cli.log_path();
    if let Some(parent) = log_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = std::fs::File::create(&log_path)?;

    // stdout carries the result, so the location goes to stderr
    eprintln!("Diagnostic mode: logging to {}", log_path.display());

    install(cli, fmt_layer(cli, std::sync::Mutex::new(file)))
}

fn init_logging_to_stderr(cli: &Cli) -> anyhow::Result<()> {
    install(cli, fmt_layer(cli, std::io::stderr))
}

/// Install the global subscriber according to the CLI flags
pub fn init_logging(cli: &Cli) -> anyhow::Result<()> {
    if cli.is_diagnostic() {
        init_logging_to_file(cli)
    } else {
        init_logging_to_stderr(cli)
    }
}
