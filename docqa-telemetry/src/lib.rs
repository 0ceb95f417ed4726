//! Logging setup for the docqa services.
//!
//! Installs a global `tracing` subscriber with an [`EnvFilter`] (default
//! `info`, overridable through `RUST_LOG`) and either a human-readable or a
//! JSON formatter. [`capture`] provides an in-memory layer used to assert on
//! emitted events.
//!
//! ```rust,no_run
//! docqa_telemetry::init_telemetry("docqa-server", docqa_telemetry::LogFormat::Json)?;
//! # Ok::<(), docqa_telemetry::TelemetryError>(())
//! ```

pub mod capture;

pub use capture::{CaptureLayer, CapturedEvent, EventCapture};

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

/// Filter directive used when `RUST_LOG` is unset or invalid.
pub const DEFAULT_FILTER: &str = "info";

/// Output format of the global subscriber.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable lines with targets.
    #[default]
    Pretty,
    /// One JSON object per line, flattening event fields.
    Json,
}

#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    #[error("failed to install tracing subscriber: {0}")]
    Init(String),
}

/// Build the filter from `RUST_LOG`, falling back to [`DEFAULT_FILTER`].
pub fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

fn fmt_layer(format: LogFormat) -> Box<dyn Layer<Registry> + Send + Sync> {
    match format {
        LogFormat::Pretty => tracing_subscriber::fmt::layer().with_target(true).boxed(),
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .flatten_event(true)
            .with_current_span(true)
            .boxed(),
    }
}

/// Install the global subscriber for `service_name`.
///
/// # Errors
///
/// Returns [`TelemetryError::Init`] if a global subscriber is already set.
pub fn init_telemetry(service_name: &str, format: LogFormat) -> Result<(), TelemetryError> {
    tracing_subscriber::registry()
        .with(fmt_layer(format))
        .with(env_filter())
        .try_init()
        .map_err(|e| TelemetryError::Init(e.to_string()))?;

    tracing::info!(service.name = service_name, ?format, "telemetry initialized");
    Ok(())
}

/// Install the global subscriber and also record every event into `capture`.
///
/// # Errors
///
/// Returns [`TelemetryError::Init`] if a global subscriber is already set.
pub fn init_with_capture(
    service_name: &str,
    format: LogFormat,
    capture: EventCapture,
) -> Result<(), TelemetryError> {
    tracing_subscriber::registry()
        .with(fmt_layer(format))
        .with(CaptureLayer::new(capture))
        .with(env_filter())
        .try_init()
        .map_err(|e| TelemetryError::Init(e.to_string()))?;

    tracing::info!(service.name = service_name, ?format, "telemetry initialized");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_format_is_pretty() {
        assert_eq!(LogFormat::default(), LogFormat::Pretty);
    }

    #[test]
    fn global_init_happens_once() {
        let capture = EventCapture::new();
        init_with_capture("telemetry-test", LogFormat::Json, capture.clone()).unwrap();

        let err = init_telemetry("telemetry-test", LogFormat::Pretty).unwrap_err();
        assert!(matches!(err, TelemetryError::Init(_)));
        assert_eq!(capture.with_message("telemetry initialized").len(), 1);
    }
}
