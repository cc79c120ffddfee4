//! Executor metrics and tracing helpers.
//!
//! A single process-wide registry with three instruments; the executor
//! records every statement through [`BuoyMetrics::record_query_duration`]
//! and [`BuoyMetrics::record_query_error`]. Scrape endpoints are the
//! application's concern — [`BuoyMetrics::registry`] is public for that.

#[cfg(feature = "metrics")]
use once_cell::sync::Lazy;
#[cfg(feature = "metrics")]
use prometheus::{Histogram, HistogramOpts, IntCounter, Registry};

#[cfg(feature = "metrics")]
pub static METRICS: Lazy<BuoyMetrics> = Lazy::new(BuoyMetrics::init);

#[cfg(feature = "metrics")]
pub struct BuoyMetrics {
    pub registry: Registry,
    pub queries_total: IntCounter,
    pub query_errors_total: IntCounter,
    pub query_duration: Histogram,
}

#[cfg(feature = "metrics")]
impl BuoyMetrics {
    pub fn init() -> Self {
        let registry = Registry::new();

        let queries_total = IntCounter::new("buoy_queries_total", "Total statements executed")
            .expect("failed to build queries counter");

        let query_errors_total = IntCounter::new(
            "buoy_query_errors_total",
            "Statements that returned an error",
        )
        .expect("failed to build query errors counter");

        let query_duration = Histogram::with_opts(HistogramOpts::new(
            "buoy_query_duration_seconds",
            "Duration of statements",
        ))
        .expect("failed to build query duration histogram");

        registry
            .register(Box::new(queries_total.clone()))
            .expect("failed to register queries counter");
        registry
            .register(Box::new(query_errors_total.clone()))
            .expect("failed to register query errors counter");
        registry
            .register(Box::new(query_duration.clone()))
            .expect("failed to register query duration histogram");

        Self {
            registry,
            queries_total,
            query_errors_total,
            query_duration,
        }
    }

    pub fn record_query_duration(&self, elapsed: std::time::Duration) {
        self.queries_total.inc();
        self.query_duration.observe(elapsed.as_secs_f64());
    }

    pub fn record_query_error(&self) {
        self.query_errors_total.inc();
    }
}

#[cfg(feature = "tracing")]
pub mod tracing_helpers {
    use tracing::{info_span, Span};

    pub fn execute_query_span(query: &str) -> Span {
        info_span!("buoy_execute_query", query = %query)
    }

    pub fn acquire_connection_span() -> Span {
        info_span!("buoy_acquire_connection")
    }
}

#[cfg(all(test, feature = "metrics"))]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_record() {
        let before = METRICS.queries_total.get();
        METRICS.record_query_duration(std::time::Duration::from_millis(5));
        assert_eq!(METRICS.queries_total.get(), before + 1);

        let errors_before = METRICS.query_errors_total.get();
        METRICS.record_query_error();
        assert_eq!(METRICS.query_errors_total.get(), errors_before + 1);
    }
}
