//! Metrics Service
//!
//! Reads a tenant's financial rows through the repository port and hands
//! them to the aggregation engine. Each call issues exactly one read.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use super::aggregate::{
    aggregate_sources, aggregate_totals, aggregate_trend, detect_revenue_anomalies, AnomalyPoint,
    MetricsTotals, RevenueTrendPoint, SourceBreakdownPoint,
};
use crate::domain::MetricsFilters;
use crate::repository::{FinancialRecordRepository, RepositoryResult};

/// Row cap for trend reads when no `months` window is given
pub const TREND_ROW_LIMIT: i64 = 500;

/// Row cap for source breakdown reads
pub const SOURCE_ROW_LIMIT: i64 = 1000;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsReport {
    pub trend: Vec<RevenueTrendPoint>,
    pub totals: MetricsTotals,
}

#[derive(Clone)]
pub struct MetricsService {
    records: Arc<dyn FinancialRecordRepository>,
}

impl MetricsService {
    pub fn new(records: Arc<dyn FinancialRecordRepository>) -> Self {
        Self { records }
    }

    /// Monthly trend and totals
    pub async fn get_metrics(
        &self,
        tenant_id: Uuid,
        filters: &MetricsFilters,
    ) -> RepositoryResult<MetricsReport> {
        let limit = match filters.months {
            Some(_) => None,
            None => Some(TREND_ROW_LIMIT),
        };
        let query = filters.to_query(tenant_id, Utc::now()).with_limit(limit);
        let rows = self.records.find_records(&query).await?;

        let trend = aggregate_trend(&rows);
        let totals = aggregate_totals(&trend);

        tracing::debug!(
            tenant_id = %tenant_id,
            rows = rows.len(),
            months = trend.len(),
            "Metrics aggregated"
        );

        Ok(MetricsReport { trend, totals })
    }

    pub async fn get_source_breakdown(
        &self,
        tenant_id: Uuid,
        filters: &MetricsFilters,
    ) -> RepositoryResult<Vec<SourceBreakdownPoint>> {
        let query = filters
            .to_query(tenant_id, Utc::now())
            .with_limit(Some(SOURCE_ROW_LIMIT));
        let rows = self.records.find_records(&query).await?;

        Ok(aggregate_sources(&rows))
    }

    /// Revenue outliers over the same trend `get_metrics` would return
    pub async fn get_anomalies(
        &self,
        tenant_id: Uuid,
        filters: &MetricsFilters,
    ) -> RepositoryResult<Vec<AnomalyPoint>> {
        let report = self.get_metrics(tenant_id, filters).await?;
        let anomalies = detect_revenue_anomalies(&report.trend);

        if !anomalies.is_empty() {
            tracing::info!(
                tenant_id = %tenant_id,
                anomalies = anomalies.len(),
                "Revenue anomalies detected"
            );
        }

        Ok(anomalies)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{DataSource, NewFinancialRecord};
    use crate::repository::InMemoryRepository;
    use chrono::TimeZone;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    async fn seeded(rows: &[(i32, u32, u32, Decimal, Decimal, DataSource)]) -> (MetricsService, Uuid) {
        let repo = Arc::new(InMemoryRepository::new());
        let tenant = repo.add_tenant("tenant-1", "Tenant 1").await;
        let records: Vec<NewFinancialRecord> = rows
            .iter()
            .map(|(y, m, d, revenue, expenses, source)| {
                let start = Utc.with_ymd_and_hms(*y, *m, *d, 0, 0, 0).unwrap();
                NewFinancialRecord::new(tenant.id, start, start, *revenue, *expenses, *source)
            })
            .collect();
        repo.insert_records(&records).await.unwrap();

        (MetricsService::new(repo), tenant.id)
    }

    #[tokio::test]
    async fn test_metrics_apply_tenant_and_source_filters() {
        let (service, tenant_id) = seeded(&[
            (2025, 1, 1, dec!(100), dec!(40), DataSource::Erp),
            (2025, 1, 15, dec!(200), dec!(50), DataSource::Erp),
            (2025, 1, 20, dec!(999), dec!(1), DataSource::Bank),
        ])
        .await;

        let filters = MetricsFilters {
            source: Some(DataSource::Erp),
            ..Default::default()
        };
        let report = service.get_metrics(tenant_id, &filters).await.unwrap();

        assert_eq!(report.trend.len(), 1);
        assert_eq!(
            report.totals,
            MetricsTotals {
                revenue: dec!(300),
                expenses: dec!(90),
                net_profit: dec!(210),
            }
        );

        let other = service
            .get_metrics(Uuid::new_v4(), &MetricsFilters::default())
            .await
            .unwrap();
        assert!(other.trend.is_empty());
        assert_eq!(other.totals, MetricsTotals::default());
    }

    #[tokio::test]
    async fn test_source_breakdown() {
        let (service, tenant_id) = seeded(&[
            (2025, 1, 1, dec!(300), dec!(180), DataSource::Pos),
            (2025, 2, 1, dec!(150), dec!(90), DataSource::Erp),
        ])
        .await;

        let sources = service
            .get_source_breakdown(tenant_id, &MetricsFilters::default())
            .await
            .unwrap();

        assert_eq!(sources.len(), 2);
        assert_eq!(sources[0].source, DataSource::Pos);
    }

    #[tokio::test]
    async fn test_anomalies_from_trend() {
        let (service, tenant_id) = seeded(&[
            (2025, 1, 1, dec!(100), dec!(50), DataSource::Erp),
            (2025, 2, 1, dec!(110), dec!(55), DataSource::Erp),
            (2025, 3, 1, dec!(500), dec!(120), DataSource::Erp),
            (2025, 4, 1, dec!(90), dec!(45), DataSource::Erp),
        ])
        .await;

        let anomalies = service
            .get_anomalies(tenant_id, &MetricsFilters::default())
            .await
            .unwrap();

        assert_eq!(anomalies.len(), 1);
        assert_eq!(anomalies[0].period, "2025-03");
    }
}
