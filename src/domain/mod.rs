//! Domain module
//!
//! Core domain types shared by the metrics engine, tenancy and auth layers.

pub mod context;
pub mod filters;
pub mod financial;
pub mod tenant;

pub use context::{Role, UserContext};
pub use filters::{parse_filters, MetricsFilters, RecordQuery};
pub use financial::{DataSource, FinancialRecord, NewFinancialRecord};
pub use tenant::{NewReportArchive, ReportArchive, Tenant, TenantContext};
