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

pub const CACHE_HIT_TOTAL: &str = "yatube_cache_hit_total";
pub const CACHE_MISS_TOTAL: &str = "yatube_cache_miss_total";
pub const CACHE_EVICT_TOTAL: &str = "yatube_cache_evict_total";
pub const CACHE_EXPIRED_TOTAL: &str = "yatube_cache_expired_total";
pub const CACHE_CLEAR_TOTAL: &str = "yatube_cache_clear_total";
pub const POSTS_CREATED_TOTAL: &str = "yatube_posts_created_total";
pub const FOLLOW_EDGES_CREATED_TOTAL: &str = "yatube_follow_edges_created_total";
pub const FOLLOW_EDGES_REMOVED_TOTAL: &str = "yatube_follow_edges_removed_total";

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

fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            CACHE_HIT_TOTAL,
            Unit::Count,
            "Responses served from the response cache."
        );
        describe_counter!(
            CACHE_MISS_TOTAL,
            Unit::Count,
            "Cacheable requests that had to be rendered."
        );
        describe_counter!(
            CACHE_EVICT_TOTAL,
            Unit::Count,
            "Response-cache entries evicted due to capacity."
        );
        describe_counter!(
            CACHE_EXPIRED_TOTAL,
            Unit::Count,
            "Response-cache entries dropped after their TTL."
        );
        describe_counter!(
            CACHE_CLEAR_TOTAL,
            Unit::Count,
            "Explicit clears of the response cache."
        );
        describe_counter!(POSTS_CREATED_TOTAL, Unit::Count, "Posts created.");
        describe_counter!(
            FOLLOW_EDGES_CREATED_TOTAL,
            Unit::Count,
            "Follow edges created."
        );
        describe_counter!(
            FOLLOW_EDGES_REMOVED_TOTAL,
            Unit::Count,
            "Follow edges removed."
        );
    });
}
