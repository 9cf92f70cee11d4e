//! Financial records
//!
//! Tenant-scoped rows produced by ingestion and uploads. Read-only to the
//! metrics engine.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Origin system of a financial record.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    sqlx::Type,
    async_graphql::Enum,
)]
#[serde(rename_all = "UPPERCASE")]
#[sqlx(type_name = "data_source", rename_all = "UPPERCASE")]
pub enum DataSource {
    Erp,
    Pos,
    Manual,
    Bank,
}

impl DataSource {
    pub const ALL: [DataSource; 4] = [
        DataSource::Erp,
        DataSource::Pos,
        DataSource::Manual,
        DataSource::Bank,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DataSource::Erp => "ERP",
            DataSource::Pos => "POS",
            DataSource::Manual => "MANUAL",
            DataSource::Bank => "BANK",
        }
    }
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown data source: {0}")]
pub struct UnknownDataSource(pub String);

impl FromStr for DataSource {
    type Err = UnknownDataSource;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DataSource::ALL
            .into_iter()
            .find(|source| source.as_str() == s)
            .ok_or_else(|| UnknownDataSource(s.to_string()))
    }
}

/// A persisted financial row.
///
/// `net_profit = revenue - expenses` holds at write time and is not
/// re-checked on read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct FinancialRecord {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    pub revenue: Decimal,
    pub expenses: Decimal,
    pub net_profit: Decimal,
    pub source: DataSource,
    pub created_at: DateTime<Utc>,
}

/// Insert payload for a financial row. Net profit is derived, never supplied.
#[derive(Debug, Clone, PartialEq)]
pub struct NewFinancialRecord {
    pub tenant_id: Uuid,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    pub revenue: Decimal,
    pub expenses: Decimal,
    pub net_profit: Decimal,
    pub source: DataSource,
}

impl NewFinancialRecord {
    pub fn new(
        tenant_id: Uuid,
        period_start: DateTime<Utc>,
        period_end: DateTime<Utc>,
        revenue: Decimal,
        expenses: Decimal,
        source: DataSource,
    ) -> Self {
        Self {
            tenant_id,
            period_start,
            period_end,
            revenue,
            expenses,
            net_profit: revenue - expenses,
            source,
        }
    }

    /// Materialize into a stored record with a fresh id.
    pub fn into_record(self, created_at: DateTime<Utc>) -> FinancialRecord {
        FinancialRecord {
            id: Uuid::new_v4(),
            tenant_id: self.tenant_id,
            period_start: self.period_start,
            period_end: self.period_end,
            revenue: self.revenue,
            expenses: self.expenses,
            net_profit: self.net_profit,
            source: self.source,
            created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    #[test]
    fn test_data_source_round_trip() {
        for source in DataSource::ALL {
            assert_eq!(source.as_str().parse::<DataSource>().unwrap(), source);
        }
        assert!("UNKNOWN".parse::<DataSource>().is_err());
        assert!("erp".parse::<DataSource>().is_err());
    }

    #[test]
    fn test_new_record_derives_net_profit() {
        let start = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2025, 1, 31, 0, 0, 0).unwrap();
        let record = NewFinancialRecord::new(
            Uuid::new_v4(),
            start,
            end,
            dec!(1500.25),
            dec!(900.10),
            DataSource::Pos,
        );

        assert_eq!(record.net_profit, dec!(600.15));

        let stored = record.clone().into_record(Utc::now());
        assert_eq!(stored.net_profit, record.net_profit);
        assert_eq!(stored.source, DataSource::Pos);
    }

    #[test]
    fn test_data_source_serde() {
        let json = serde_json::to_string(&DataSource::Manual).unwrap();
        assert_eq!(json, "\"MANUAL\"");
    }
}
