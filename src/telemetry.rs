//! Tracing and metrics bootstrap for the binary entrypoint.

use std::sync::Once;

use metrics::{Unit, describe_counter};
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use tracing_error::ErrorLayer;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

static METRIC_DESCRIPTIONS: Once = Once::new();

#[derive(Debug, Error)]
#[error("failed to install tracing subscriber: {0}")]
pub struct TelemetryError(String);

/// Install a global tracing subscriber. Library code never calls this; the
/// hosting application or the CLI does, once.
pub fn init() -> Result<(), TelemetryError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt::layer().compact().with_target(true))
        .try_init()
        .map_err(|err| TelemetryError(err.to_string()))
}

fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "stampa_render_total",
            Unit::Count,
            "Total number of completed render passes."
        );
        describe_counter!(
            "stampa_render_warning_total",
            Unit::Count,
            "Total number of backend warnings escalated to errors."
        );
        describe_counter!(
            "stampa_response_bytes_total",
            Unit::Bytes,
            "Total PDF bytes handed to HTTP responses."
        );
    });
}
