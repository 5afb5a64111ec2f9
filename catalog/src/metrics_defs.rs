//! Metrics definitions for upstream catalog access.

use shared::metrics_defs::{MetricDef, MetricType};

pub const UPSTREAM_ATTEMPTS: MetricDef = MetricDef {
    name: "upstream.attempts",
    metric_type: MetricType::Counter,
    description: "Number of individual HTTP attempts made against the upstream catalog",
};

pub const UPSTREAM_RETRIES: MetricDef = MetricDef {
    name: "upstream.retries",
    metric_type: MetricType::Counter,
    description: "Number of attempts that were retries of a failed attempt",
};

pub const UPSTREAM_EXHAUSTED: MetricDef = MetricDef {
    name: "upstream.exhausted",
    metric_type: MetricType::Counter,
    description: "Number of fetches that failed on every attempt",
};

pub const UPSTREAM_REQUEST_DURATION: MetricDef = MetricDef {
    name: "upstream.request.duration",
    metric_type: MetricType::Histogram,
    description: "Duration of a single upstream attempt in seconds. Tagged with outcome.",
};

pub const ALL_METRICS: &[MetricDef] = &[
    UPSTREAM_ATTEMPTS,
    UPSTREAM_RETRIES,
    UPSTREAM_EXHAUSTED,
    UPSTREAM_REQUEST_DURATION,
];
