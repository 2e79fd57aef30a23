use std::sync::Once;

use metrics::{Unit, describe_counter};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install a global tracing subscriber using the provided logging settings.
///
/// Logs go to stderr so command output on stdout stays machine-readable.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .compact()
            .with_writer(std::io::stderr)
            .with_target(true)
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
            "inkpress_posts_created_total",
            Unit::Count,
            "Total number of posts created through the pipeline."
        );
        describe_counter!(
            "inkpress_posts_updated_total",
            Unit::Count,
            "Total number of posts updated through the pipeline."
        );
        describe_counter!(
            "inkpress_posts_deleted_total",
            Unit::Count,
            "Total number of posts deleted through the pipeline."
        );
        describe_counter!(
            "inkpress_pipeline_failures_total",
            Unit::Count,
            "Total number of failed pipeline operations, labelled by failure kind."
        );
        describe_counter!(
            "inkpress_blob_delete_failures_total",
            Unit::Count,
            "Total number of blob deletions that failed and were skipped."
        );
        describe_counter!(
            "inkpress_tag_create_races_total",
            Unit::Count,
            "Total number of tag creations lost to a concurrent writer."
        );
    });
}
