//! Metrics filters
//!
//! Query filters shared by the REST and GraphQL surfaces. Invalid filter
//! payloads never fail a request: the whole filter set falls back to the
//! defaults instead.

use std::collections::HashMap;

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::financial::DataSource;

/// Inclusive bounds of the `months` filter
pub const MIN_MONTHS: u32 = 1;
pub const MAX_MONTHS: u32 = 36;

/// Validated filter set. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetricsFilters {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub months: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<DataSource>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
}

/// Parse raw query-string pairs into filters.
///
/// A single invalid field (months outside 1-36 or not integral, unknown
/// source) drops the whole set to `MetricsFilters::default()`.
pub fn parse_filters(query: &HashMap<String, String>) -> MetricsFilters {
    try_parse_filters(query).unwrap_or_default()
}

fn try_parse_filters(query: &HashMap<String, String>) -> Option<MetricsFilters> {
    let months = match query.get("months") {
        Some(raw) => Some(parse_months(raw)?),
        None => None,
    };

    let source = match query.get("source") {
        Some(raw) => Some(raw.parse::<DataSource>().ok()?),
        None => None,
    };

    Some(MetricsFilters {
        months,
        source,
        from: query.get("from").cloned(),
        to: query.get("to").cloned(),
    })
}

/// Numeric coercion: "12" and "12.0" are accepted, "12.5" is not.
fn parse_months(raw: &str) -> Option<u32> {
    let value: f64 = raw.trim().parse().ok()?;
    if value.fract() != 0.0 || !(MIN_MONTHS as f64..=MAX_MONTHS as f64).contains(&value) {
        return None;
    }
    Some(value as u32)
}

impl MetricsFilters {
    /// Validate typed input (GraphQL) with the same rules as `parse_filters`.
    pub fn from_input(
        months: Option<i32>,
        source: Option<DataSource>,
        from: Option<String>,
        to: Option<String>,
    ) -> Self {
        let months = match months {
            Some(value) if (MIN_MONTHS as i32..=MAX_MONTHS as i32).contains(&value) => {
                Some(value as u32)
            }
            Some(_) => return Self::default(),
            None => None,
        };

        Self {
            months,
            source,
            from,
            to,
        }
    }

    /// Build the repository query for `tenant_id`, evaluating relative
    /// windows against `now`.
    ///
    /// An explicit `from` wins over the `months` window. Unparsable dates are
    /// ignored rather than rejected.
    pub fn to_query(&self, tenant_id: Uuid, now: DateTime<Utc>) -> RecordQuery {
        let window_start = self.months.and_then(|months| month_window_start(now, months));
        let from = self.from.as_deref().and_then(parse_date).or(window_start);
        let to = self.to.as_deref().and_then(parse_date);

        RecordQuery {
            tenant_id,
            source: self.source,
            from,
            to,
            limit: None,
        }
    }
}

/// First day of the month `months - 1` months before `now`.
fn month_window_start(now: DateTime<Utc>, months: u32) -> Option<DateTime<Utc>> {
    let index = now.year() * 12 + now.month0() as i32 - (months as i32 - 1);
    let year = index.div_euclid(12);
    let month = index.rem_euclid(12) as u32 + 1;
    let date = NaiveDate::from_ymd_opt(year, month, 1)?;
    Some(Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0)?))
}

/// Accepts RFC 3339 timestamps, naive `YYYY-MM-DDTHH:MM:SS` (read as UTC)
/// and plain `YYYY-MM-DD` dates (UTC midnight).
pub fn parse_date(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed.with_timezone(&Utc));
    }

    if let Ok(parsed) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S") {
        return Some(Utc.from_utc_datetime(&parsed));
    }

    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// Repository-level selection of financial rows for one tenant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordQuery {
    pub tenant_id: Uuid,
    pub source: Option<DataSource>,
    /// Inclusive lower bound on period start
    pub from: Option<DateTime<Utc>>,
    /// Inclusive upper bound on period start
    pub to: Option<DateTime<Utc>>,
    /// Row cap; `None` reads every matching row
    pub limit: Option<i64>,
}

impl RecordQuery {
    pub fn for_tenant(tenant_id: Uuid) -> Self {
        Self {
            tenant_id,
            source: None,
            from: None,
            to: None,
            limit: None,
        }
    }

    pub fn with_limit(mut self, limit: Option<i64>) -> Self {
        self.limit = limit;
        self
    }
}
