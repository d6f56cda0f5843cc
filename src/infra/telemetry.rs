use std::sync::Once;

use metrics::{Unit, describe_counter, describe_gauge};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Installs the global tracing subscriber and describes the ledger metrics.
///
/// Logs go to stderr so `invoke` and `history` output stays parseable.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .with_writer(std::io::stderr)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .compact()
            .with_target(true)
            .with_writer(std::io::stderr)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .try_init()
        .map_err(|err| {
            InfraError::telemetry(format!("failed to install tracing subscriber: {err}"))
        })
}

fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "marquee_invocations_total",
            Unit::Count,
            "Contract invocations by contract, operation and outcome."
        );
        describe_counter!(
            "marquee_commit_conflicts_total",
            Unit::Count,
            "Transactions refused because their read set changed before commit."
        );
        describe_counter!(
            "marquee_scan_skipped_total",
            Unit::Count,
            "Records skipped during range scans, by reason."
        );
        describe_counter!(
            "marquee_events_published_total",
            Unit::Count,
            "Committed ledger events handed to the event queue."
        );
        describe_counter!(
            "marquee_events_dropped_total",
            Unit::Count,
            "Committed events discarded because the event queue was full."
        );
        describe_gauge!(
            "marquee_event_queue_len",
            Unit::Count,
            "Committed events waiting to be drained."
        );
    });
}
