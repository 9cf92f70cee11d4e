//! Metrics module
//!
//! Aggregation engine and the service that feeds it from the repository.

pub mod aggregate;
pub mod service;

pub use aggregate::{
    aggregate_sources, aggregate_totals, aggregate_trend, detect_revenue_anomalies, AnomalyPoint,
    MetricsTotals, RevenueTrendPoint, SourceBreakdownPoint,
};
pub use service::{MetricsReport, MetricsService};
