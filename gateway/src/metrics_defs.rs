use shared::metrics_defs::{MetricDef, MetricType};

pub const REQUEST_DURATION: MetricDef = MetricDef {
    name: "request.duration",
    metric_type: MetricType::Histogram,
    description: "Request duration in seconds. Tagged with status, endpoint.",
};

pub const REQUESTS_INFLIGHT: MetricDef = MetricDef {
    name: "requests.inflight",
    metric_type: MetricType::Gauge,
    description: "Number of requests currently being processed",
};

pub const REQUESTS_RATE_LIMITED: MetricDef = MetricDef {
    name: "requests.rate_limited",
    metric_type: MetricType::Counter,
    description: "Number of requests rejected by the per-client rate limit",
};

pub const RESOLVE_DURATION: MetricDef = MetricDef {
    name: "resolve.duration",
    metric_type: MetricType::Histogram,
    description: "Time to resolve a record by id in seconds, including enrichment",
};

pub const RESOLVE_OUTCOME: MetricDef = MetricDef {
    name: "resolve.outcome",
    metric_type: MetricType::Counter,
    description: "Resolutions by outcome. Tagged with outcome (found, not_found).",
};

pub const RESOLVE_SOURCE_FAILURES: MetricDef = MetricDef {
    name: "resolve.source_failures",
    metric_type: MetricType::Counter,
    description: "List sources skipped during fan-out. Tagged with source.",
};

pub const RESOLVE_ENRICHMENT: MetricDef = MetricDef {
    name: "resolve.enrichment",
    metric_type: MetricType::Counter,
    description: "Enrichment lookups by result. Tagged with result (merged, empty, failed).",
};

pub const ALL_METRICS: &[MetricDef] = &[
    REQUEST_DURATION,
    REQUESTS_INFLIGHT,
    REQUESTS_RATE_LIMITED,
    RESOLVE_DURATION,
    RESOLVE_OUTCOME,
    RESOLVE_SOURCE_FAILURES,
    RESOLVE_ENRICHMENT,
];
