//! Aggregation engine
//!
//! Pure functions turning raw financial rows into trend, totals,
//! source-breakdown and anomaly views. None of them fail: empty or
//! insufficient input yields empty or zeroed output.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::domain::{DataSource, FinancialRecord};

/// Fewer trend points than this never produce anomalies
pub const MIN_ANOMALY_POINTS: usize = 3;

/// Minimum |z-score| for a month to be flagged
pub const ANOMALY_THRESHOLD: f64 = 1.5;

/// Per-month sums for one tenant. `period` is `YYYY-MM`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RevenueTrendPoint {
    pub period: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub revenue: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub expenses: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub net_profit: Decimal,
}

impl RevenueTrendPoint {
    fn empty(period: String) -> Self {
        Self {
            period,
            revenue: Decimal::ZERO,
            expenses: Decimal::ZERO,
            net_profit: Decimal::ZERO,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsTotals {
    #[serde(with = "rust_decimal::serde::float")]
    pub revenue: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub expenses: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub net_profit: Decimal,
}

/// Per-source sums plus the number of contributing rows.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceBreakdownPoint {
    pub source: DataSource,
    #[serde(with = "rust_decimal::serde::float")]
    pub revenue: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub expenses: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub net_profit: Decimal,
    pub records: u64,
}

/// A month whose revenue deviates from the mean by at least
/// `ANOMALY_THRESHOLD` standard deviations.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnomalyPoint {
    pub period: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub revenue: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub net_profit: Decimal,
    /// z-score rounded to two decimals
    pub deviation: f64,
}

/// Calendar month of a period start, `YYYY-MM` in UTC.
pub fn month_key(period_start: &DateTime<Utc>) -> String {
    period_start.format("%Y-%m").to_string()
}

/// Group rows by month of period start and sum their financials.
///
/// Output is ascending by `period`; for `YYYY-MM` keys lexicographic order
/// is chronological order.
pub fn aggregate_trend(rows: &[FinancialRecord]) -> Vec<RevenueTrendPoint> {
    let mut buckets: BTreeMap<String, RevenueTrendPoint> = BTreeMap::new();

    for row in rows {
        let period = month_key(&row.period_start);
        let point = buckets
            .entry(period.clone())
            .or_insert_with(|| RevenueTrendPoint::empty(period));
        point.revenue += row.revenue;
        point.expenses += row.expenses;
        point.net_profit += row.net_profit;
    }

    buckets.into_values().collect()
}

pub fn aggregate_totals(trend: &[RevenueTrendPoint]) -> MetricsTotals {
    trend
        .iter()
        .fold(MetricsTotals::default(), |mut totals, point| {
            totals.revenue += point.revenue;
            totals.expenses += point.expenses;
            totals.net_profit += point.net_profit;
            totals
        })
}

/// Group rows by source, descending by summed revenue.
///
/// Sources with equal revenue keep declaration order (ERP, POS, MANUAL, BANK).
pub fn aggregate_sources(rows: &[FinancialRecord]) -> Vec<SourceBreakdownPoint> {
    let mut buckets: BTreeMap<DataSource, SourceBreakdownPoint> = BTreeMap::new();

    for row in rows {
        let point = buckets
            .entry(row.source)
            .or_insert_with(|| SourceBreakdownPoint {
                source: row.source,
                revenue: Decimal::ZERO,
                expenses: Decimal::ZERO,
                net_profit: Decimal::ZERO,
                records: 0,
            });
        point.revenue += row.revenue;
        point.expenses += row.expenses;
        point.net_profit += row.net_profit;
        point.records += 1;
    }

    let mut points: Vec<SourceBreakdownPoint> = buckets.into_values().collect();
    points.sort_by(|a, b| b.revenue.cmp(&a.revenue));
    points
}

/// Flag months whose revenue z-score magnitude is at least
/// `ANOMALY_THRESHOLD`, using the population standard deviation.
///
/// Returns nothing for fewer than `MIN_ANOMALY_POINTS` points or when every
/// month has the same revenue. Output is descending by |z|; exact ties keep
/// chronological order.
pub fn detect_revenue_anomalies(trend: &[RevenueTrendPoint]) -> Vec<AnomalyPoint> {
    if trend.len() < MIN_ANOMALY_POINTS {
        return Vec::new();
    }

    // Exact check on decimals: float means of equal values can drift off zero.
    let first = trend[0].revenue;
    if trend.iter().all(|point| point.revenue == first) {
        return Vec::new();
    }

    let revenues: Vec<f64> = trend
        .iter()
        .map(|point| point.revenue.to_f64().unwrap_or(0.0))
        .collect();
    let count = revenues.len() as f64;
    let mean = revenues.iter().sum::<f64>() / count;
    let variance = revenues
        .iter()
        .map(|revenue| (revenue - mean).powi(2))
        .sum::<f64>()
        / count;
    let std_dev = variance.sqrt();

    if std_dev == 0.0 || !std_dev.is_finite() {
        return Vec::new();
    }

    let mut anomalies: Vec<AnomalyPoint> = trend
        .iter()
        .zip(revenues)
        .map(|(point, revenue)| AnomalyPoint {
            period: point.period.clone(),
            revenue: point.revenue,
            net_profit: point.net_profit,
            deviation: round2((revenue - mean) / std_dev),
        })
        .filter(|point| point.deviation.abs() >= ANOMALY_THRESHOLD)
        .collect();

    anomalies.sort_by(|a, b| b.deviation.abs().total_cmp(&a.deviation.abs()));
    anomalies
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn row(year: i32, month: u32, day: u32, revenue: Decimal, expenses: Decimal, source: DataSource) -> FinancialRecord {
        let start = Utc.with_ymd_and_hms(year, month, day, 0, 0, 0).unwrap();
        FinancialRecord {
            id: Uuid::new_v4(),
            tenant_id: Uuid::nil(),
            period_start: start,
            period_end: start,
            revenue,
            expenses,
            net_profit: revenue - expenses,
            source,
            created_at: start,
        }
    }

    fn trend_of(revenues: &[Decimal]) -> Vec<RevenueTrendPoint> {
        revenues
            .iter()
            .enumerate()
            .map(|(i, revenue)| RevenueTrendPoint {
                period: format!("2025-{:02}", i + 1),
                revenue: *revenue,
                expenses: Decimal::ZERO,
                net_profit: *revenue,
            })
            .collect()
    }

    // =========================================================================
    // aggregate_trend / aggregate_totals
    // =========================================================================

    #[test]
    fn test_trend_merges_rows_in_same_month() {
        let rows = vec![
            row(2025, 1, 1, dec!(100), dec!(40), DataSource::Erp),
            row(2025, 1, 15, dec!(200), dec!(50), DataSource::Pos),
        ];

        let trend = aggregate_trend(&rows);
        assert_eq!(trend.len(), 1);
        assert_eq!(trend[0].period, "2025-01");
        assert_eq!(trend[0].revenue, dec!(300));
        assert_eq!(trend[0].expenses, dec!(90));
        assert_eq!(trend[0].net_profit, dec!(210));

        let totals = aggregate_totals(&trend);
        assert_eq!(
            totals,
            MetricsTotals {
                revenue: dec!(300),
                expenses: dec!(90),
                net_profit: dec!(210),
            }
        );
    }

    #[test]
    fn test_trend_is_chronological() {
        let rows = vec![
            row(2025, 11, 1, dec!(1), dec!(0), DataSource::Erp),
            row(2024, 12, 1, dec!(1), dec!(0), DataSource::Erp),
            row(2025, 2, 1, dec!(1), dec!(0), DataSource::Erp),
        ];

        let periods: Vec<String> = aggregate_trend(&rows).into_iter().map(|p| p.period).collect();
        assert_eq!(periods, vec!["2024-12", "2025-02", "2025-11"]);
    }

    #[test]
    fn test_empty_input_yields_empty_output() {
        assert!(aggregate_trend(&[]).is_empty());
        assert!(aggregate_sources(&[]).is_empty());
        assert_eq!(aggregate_totals(&[]), MetricsTotals::default());
        assert!(detect_revenue_anomalies(&[]).is_empty());
    }

    // =========================================================================
    // aggregate_sources
    // =========================================================================

    #[test]
    fn test_sources_sorted_by_revenue_desc() {
        let rows = vec![
            row(2025, 1, 1, dec!(300), dec!(180), DataSource::Pos),
            row(2025, 2, 1, dec!(150), dec!(90), DataSource::Erp),
            row(2025, 3, 1, dec!(100), dec!(90), DataSource::Erp),
            row(2025, 3, 1, dec!(500), dec!(10), DataSource::Bank),
        ];

        let sources = aggregate_sources(&rows);
        let order: Vec<DataSource> = sources.iter().map(|p| p.source).collect();
        assert_eq!(order, vec![DataSource::Bank, DataSource::Pos, DataSource::Erp]);

        let erp = sources.iter().find(|p| p.source == DataSource::Erp).unwrap();
        assert_eq!(erp.records, 2);
        assert_eq!(erp.revenue, dec!(250));
        assert_eq!(erp.net_profit, dec!(70));
    }

    // =========================================================================
    // detect_revenue_anomalies
    // =========================================================================

    #[test]
    fn test_single_spike_is_flagged() {
        let trend = trend_of(&[dec!(100), dec!(110), dec!(520), dec!(90)]);

        let anomalies = detect_revenue_anomalies(&trend);
        assert_eq!(anomalies.len(), 1);
        assert_eq!(anomalies[0].period, "2025-03");
        assert_eq!(anomalies[0].revenue, dec!(520));
        assert_eq!(anomalies[0].deviation, 1.73);
    }

    #[test]
    fn test_fewer_than_three_points_yield_nothing() {
        let trend = trend_of(&[dec!(1), dec!(1000000)]);
        assert!(detect_revenue_anomalies(&trend).is_empty());
    }

    #[test]
    fn test_zero_variance_yields_nothing() {
        let trend = trend_of(&[dec!(0.1), dec!(0.1), dec!(0.1), dec!(0.1)]);
        assert!(detect_revenue_anomalies(&trend).is_empty());
    }

    #[test]
    fn test_anomalies_sorted_by_magnitude() {
        let mut revenues = vec![dec!(100); 20];
        revenues.push(dec!(0));
        revenues.push(dec!(300));
        let trend = trend_of(&revenues);

        let anomalies = detect_revenue_anomalies(&trend);
        assert_eq!(anomalies.len(), 2);
        assert_eq!(anomalies[0].revenue, dec!(300));
        assert!(anomalies[0].deviation > 0.0);
        assert_eq!(anomalies[1].revenue, dec!(0));
        assert!(anomalies[1].deviation < 0.0);
        assert!(anomalies[0].deviation.abs() >= anomalies[1].deviation.abs());
    }

    #[test]
    fn test_serializes_money_as_numbers() {
        let trend = trend_of(&[dec!(12.5)]);
        let json = serde_json::to_value(&trend[0]).unwrap();
        assert_eq!(json["revenue"], serde_json::json!(12.5));
        assert_eq!(json["netProfit"], serde_json::json!(12.5));
    }

    // =========================================================================
    // Properties
    // =========================================================================

    fn arb_row() -> impl Strategy<Value = FinancialRecord> {
        (
            2020i32..2027,
            1u32..=12,
            1u32..=28,
            0i64..50_000_000,
            0i64..50_000_000,
            0usize..4,
        )
            .prop_map(|(year, month, day, revenue, expenses, source)| {
                row(
                    year,
                    month,
                    day,
                    Decimal::new(revenue, 2),
                    Decimal::new(expenses, 2),
                    DataSource::ALL[source],
                )
            })
    }

    proptest! {
        #[test]
        fn prop_totals_equal_direct_sum(rows in prop::collection::vec(arb_row(), 0..60)) {
            let totals = aggregate_totals(&aggregate_trend(&rows));
            let revenue: Decimal = rows.iter().map(|r| r.revenue).sum();
            let expenses: Decimal = rows.iter().map(|r| r.expenses).sum();
            let net_profit: Decimal = rows.iter().map(|r| r.net_profit).sum();

            prop_assert_eq!(totals.revenue, revenue);
            prop_assert_eq!(totals.expenses, expenses);
            prop_assert_eq!(totals.net_profit, net_profit);
        }

        #[test]
        fn prop_trend_has_one_point_per_month(rows in prop::collection::vec(arb_row(), 0..60)) {
            let trend = aggregate_trend(&rows);
            let mut months: Vec<String> = rows.iter().map(|r| month_key(&r.period_start)).collect();
            months.sort();
            months.dedup();

            let periods: Vec<String> = trend.into_iter().map(|p| p.period).collect();
            prop_assert_eq!(periods, months);
        }

        #[test]
        fn prop_source_counts_cover_all_rows(rows in prop::collection::vec(arb_row(), 0..60)) {
            let sources = aggregate_sources(&rows);
            let total: u64 = sources.iter().map(|p| p.records).sum();
            prop_assert_eq!(total, rows.len() as u64);

            for point in &sources {
                let expected = rows.iter().filter(|r| r.source == point.source).count() as u64;
                prop_assert_eq!(point.records, expected);
            }
        }

        #[test]
        fn prop_constant_revenue_has_no_anomalies(value in 0i64..1_000_000, len in 0usize..24) {
            let trend = trend_of(&vec![Decimal::new(value, 2); len]);
            prop_assert!(detect_revenue_anomalies(&trend).is_empty());
        }
    }
}
