use lazy_static::lazy_static;
use prometheus::{Counter, Encoder, Histogram, HistogramOpts, Opts, Registry, TextEncoder};
use tracing::warn;

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();
    pub static ref QUERIES_TOTAL: Counter = Counter::with_opts(Opts::new(
        "remo_dashboard_queries_total",
        "Total dashboard queries served"
    ))
    .unwrap();
    pub static ref SERIES_LOADS_TOTAL: Counter = Counter::with_opts(Opts::new(
        "remo_series_loads_total",
        "Total series loads from the store"
    ))
    .unwrap();
    pub static ref SERIES_LOAD_FAILURES_TOTAL: Counter = Counter::with_opts(Opts::new(
        "remo_series_load_failures_total",
        "Total series loads that failed"
    ))
    .unwrap();
    pub static ref CACHE_HITS_TOTAL: Counter = Counter::with_opts(Opts::new(
        "remo_series_cache_hits_total",
        "Total queries answered from the series cache"
    ))
    .unwrap();
    pub static ref QUERY_LATENCY_SECONDS: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "remo_dashboard_query_latency_seconds",
            "Time taken to answer a dashboard query"
        )
        .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5])
    )
    .unwrap();
}

pub fn init_metrics() {
    let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(QUERIES_TOTAL.clone()),
        Box::new(SERIES_LOADS_TOTAL.clone()),
        Box::new(SERIES_LOAD_FAILURES_TOTAL.clone()),
        Box::new(CACHE_HITS_TOTAL.clone()),
        Box::new(QUERY_LATENCY_SECONDS.clone()),
    ];

    for collector in collectors {
        if let Err(e) = REGISTRY.register(collector) {
            warn!("Failed to register metric: {}", e);
        }
    }
}

pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        warn!("Failed to encode metrics: {}", e);
    }
    String::from_utf8(buffer).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gather_includes_registered_metrics() {
        init_metrics();
        QUERIES_TOTAL.inc();

        let text = gather_metrics();

        assert!(text.contains("remo_dashboard_queries_total"));
    }
}
