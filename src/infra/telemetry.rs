use std::sync::Once;

use metrics::{Unit, describe_counter, describe_histogram};
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
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(true).boxed(),
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

pub fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "storefront_cache_hit_total",
            Unit::Count,
            "Listing reads served from the cache."
        );
        describe_counter!(
            "storefront_cache_miss_total",
            Unit::Count,
            "Listing reads that fell through to the database and were cached."
        );
        describe_counter!(
            "storefront_cache_bypass_total",
            Unit::Count,
            "Listing reads that skipped the cache because it was disabled or unreachable."
        );
        describe_counter!(
            "storefront_cache_error_total",
            Unit::Count,
            "Cache store failures absorbed by the read-through path, labelled by operation."
        );
        describe_counter!(
            "storefront_cache_version_bump_total",
            Unit::Count,
            "Successful cache version bumps after committed mutations."
        );
        describe_histogram!(
            "storefront_product_list_ms",
            Unit::Milliseconds,
            "Product listing latency in milliseconds, labelled by cache status."
        );
    });
}
