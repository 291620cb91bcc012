//! Logging and trace export.
//!
//! All output goes to stderr so the wrapped command owns stdout.
//!
//! ## Environment Variables
//!
//! * `GIT_STATUS_WRAPPER_LOG` - log filter, e.g. `debug` or `wrapper=trace`
//! * `RUST_LOG` - fallback filter
//! * `GIT_STATUS_WRAPPER_LOG_FORMAT` - `json` or `text`, when `--log-format` is absent
//! * `OTEL_EXPORTER_OTLP_ENDPOINT` - when set, spans are also exported over OTLP/gRPC

use std::io;

use anyhow::{Context, Result};
use opentelemetry::trace::TracerProvider as _;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::trace::{Tracer, TracerProvider};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::cli::LogFormat;

const LOG_FILTER_VAR: &str = "GIT_STATUS_WRAPPER_LOG";
const LOG_FORMAT_VAR: &str = "GIT_STATUS_WRAPPER_LOG_FORMAT";
const OTLP_ENDPOINT_VAR: &str = "OTEL_EXPORTER_OTLP_ENDPOINT";

/// Keeps the trace exporter alive; call [`shutdown`](Self::shutdown) before exit.
pub struct Observability {
    provider: Option<TracerProvider>,
}

impl Observability {
    /// Flushes pending spans.
    pub fn shutdown(self) {
        if let Some(provider) = self.provider {
            if let Err(e) = provider.shutdown() {
                eprintln!("failed to flush traces: {e}");
            }
        }
    }
}

/// Installs the global subscriber.
pub fn init(format: Option<LogFormat>) -> Result<Observability> {
    let format = format.unwrap_or_else(|| format_from_env(std::env::var(LOG_FORMAT_VAR).ok()));
    let filter = create_env_filter(std::env::var(LOG_FILTER_VAR).ok());

    let provider = match std::env::var(OTLP_ENDPOINT_VAR) {
        Ok(endpoint) if !endpoint.trim().is_empty() => Some(otlp_provider(&endpoint)?),
        _ => None,
    };
    let tracer: Option<Tracer> = provider.as_ref().map(|p| p.tracer("git-status-wrapper"));

    match format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_span_events(fmt::format::FmtSpan::NEW | fmt::format::FmtSpan::CLOSE)
                    .with_writer(io::stderr),
            )
            .with(tracer.map(|t| tracing_opentelemetry::layer().with_tracer(t)))
            .try_init(),
        LogFormat::Text => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(false).with_writer(io::stderr))
            .with(tracer.map(|t| tracing_opentelemetry::layer().with_tracer(t)))
            .try_init(),
    }
    .context("Failed to install the log subscriber")?;

    tracing::debug!(?format, otlp = provider.is_some(), "Logging initialized");
    Ok(Observability { provider })
}

fn otlp_provider(endpoint: &str) -> Result<TracerProvider> {
    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build()
        .with_context(|| format!("Failed to build OTLP exporter for {endpoint}"))?;
    let provider = TracerProvider::builder()
        .with_batch_exporter(exporter, opentelemetry_sdk::runtime::Tokio)
        .build();
    opentelemetry::global::set_tracer_provider(provider.clone());
    Ok(provider)
}

fn format_from_env(value: Option<String>) -> LogFormat {
    match value.as_deref().map(str::trim) {
        Some(v) if v.eq_ignore_ascii_case("json") => LogFormat::Json,
        _ => LogFormat::Text,
    }
}

/// Filter from `GIT_STATUS_WRAPPER_LOG`, then `RUST_LOG`, then `info`.
fn create_env_filter(spec: Option<String>) -> EnvFilter {
    match spec {
        Some(spec) => EnvFilter::try_new(&spec).unwrap_or_else(|_| {
            eprintln!("invalid {LOG_FILTER_VAR} '{spec}', using 'info'");
            EnvFilter::new("info")
        }),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_defaults_to_text() {
        assert_eq!(format_from_env(None), LogFormat::Text);
        assert_eq!(format_from_env(Some("yaml".into())), LogFormat::Text);
        assert_eq!(format_from_env(Some(" JSON ".into())), LogFormat::Json);
    }

    #[test]
    fn invalid_filter_falls_back_to_info() {
        let filter = create_env_filter(Some("wrapper=loudest".into()));
        assert_eq!(filter.to_string(), "info");
    }

    #[test]
    fn explicit_filter_is_used() {
        let filter = create_env_filter(Some("wrapper=debug".into()));
        assert_eq!(filter.to_string(), "wrapper=debug");
    }
}
