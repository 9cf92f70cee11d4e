//! Repository module
//!
//! Persistence ports for tenants, financial records and report archives,
//! with a Postgres adapter and an in-memory double.

pub mod error;
pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::{
    FinancialRecord, NewFinancialRecord, NewReportArchive, RecordQuery, ReportArchive, Tenant,
};

pub use error::{RepositoryError, RepositoryResult};
pub use memory::InMemoryRepository;
pub use postgres::PgRepository;

/// Display name given to a lazily created default tenant
pub const DEFAULT_TENANT_NAME: &str = "Default Tenant";

/// Most recent report archives returned by a listing
pub const REPORT_LIST_LIMIT: i64 = 100;

#[async_trait]
pub trait TenantRepository: Send + Sync {
    /// Find a tenant whose id or slug equals `hint`
    async fn find_by_hint(&self, hint: &str) -> RepositoryResult<Option<Tenant>>;

    async fn find_by_slug(&self, slug: &str) -> RepositoryResult<Option<Tenant>>;

    /// Any tenant, used as the last-resort fallback
    async fn find_first(&self) -> RepositoryResult<Option<Tenant>>;

    /// Insert `slug` if absent and return the stored tenant either way
    async fn upsert(&self, slug: &str, name: &str) -> RepositoryResult<Tenant>;

    /// All tenants ordered by name
    async fn list(&self) -> RepositoryResult<Vec<Tenant>>;
}

#[async_trait]
pub trait FinancialRecordRepository: Send + Sync {
    /// Rows matching `query`, ascending by period start
    async fn find_records(&self, query: &RecordQuery) -> RepositoryResult<Vec<FinancialRecord>>;

    async fn insert_records(&self, records: &[NewFinancialRecord]) -> RepositoryResult<u64>;
}

#[async_trait]
pub trait ReportArchiveRepository: Send + Sync {
    async fn create_report(&self, report: NewReportArchive) -> RepositoryResult<ReportArchive>;

    /// Reports of one tenant, newest first
    async fn list_reports(&self, tenant_id: Uuid) -> RepositoryResult<Vec<ReportArchive>>;

    async fn find_report(&self, tenant_id: Uuid, id: Uuid)
        -> RepositoryResult<Option<ReportArchive>>;
}

/// Full persistence surface of the service.
#[async_trait]
pub trait Repository: TenantRepository + FinancialRecordRepository + ReportArchiveRepository {
    /// Connectivity check for health reporting
    async fn ping(&self) -> RepositoryResult<()>;
}
