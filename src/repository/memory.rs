//! In-memory Repository
//!
//! Process-local implementation of every persistence port. Used by tests and
//! by local runs without Postgres. Can simulate an un-migrated schema.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    FinancialRecordRepository, ReportArchiveRepository, Repository, RepositoryError,
    RepositoryResult, TenantRepository, REPORT_LIST_LIMIT,
};
use crate::domain::{
    FinancialRecord, NewFinancialRecord, NewReportArchive, RecordQuery, ReportArchive, Tenant,
};

#[derive(Debug, Default)]
struct MemoryState {
    tenants: Vec<Tenant>,
    records: Vec<FinancialRecord>,
    reports: Vec<ReportArchive>,
}

#[derive(Debug, Default)]
pub struct InMemoryRepository {
    state: RwLock<MemoryState>,
    schema_missing: AtomicBool,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call fail as if no table existed.
    pub fn set_schema_missing(&self, missing: bool) {
        self.schema_missing.store(missing, Ordering::SeqCst);
    }

    /// Insert a tenant with a fresh id and return it.
    pub async fn add_tenant(&self, slug: &str, name: &str) -> Tenant {
        let tenant = Tenant {
            id: Uuid::new_v4(),
            slug: slug.to_string(),
            name: name.to_string(),
        };
        self.state.write().await.tenants.push(tenant.clone());
        tenant
    }

    pub async fn tenant_count(&self) -> usize {
        self.state.read().await.tenants.len()
    }

    fn check_schema(&self) -> RepositoryResult<()> {
        if self.schema_missing.load(Ordering::SeqCst) {
            return Err(RepositoryError::SchemaMissing(
                "relation does not exist".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl TenantRepository for InMemoryRepository {
    async fn find_by_hint(&self, hint: &str) -> RepositoryResult<Option<Tenant>> {
        self.check_schema()?;
        let state = self.state.read().await;
        Ok(state.tenants.iter().find(|t| t.matches_hint(hint)).cloned())
    }

    async fn find_by_slug(&self, slug: &str) -> RepositoryResult<Option<Tenant>> {
        self.check_schema()?;
        let state = self.state.read().await;
        Ok(state.tenants.iter().find(|t| t.slug == slug).cloned())
    }

    async fn find_first(&self) -> RepositoryResult<Option<Tenant>> {
        self.check_schema()?;
        Ok(self.state.read().await.tenants.first().cloned())
    }

    async fn upsert(&self, slug: &str, name: &str) -> RepositoryResult<Tenant> {
        self.check_schema()?;
        let mut state = self.state.write().await;
        if let Some(existing) = state.tenants.iter().find(|t| t.slug == slug) {
            return Ok(existing.clone());
        }

        let tenant = Tenant {
            id: Uuid::new_v4(),
            slug: slug.to_string(),
            name: name.to_string(),
        };
        state.tenants.push(tenant.clone());
        Ok(tenant)
    }

    async fn list(&self) -> RepositoryResult<Vec<Tenant>> {
        self.check_schema()?;
        let mut tenants = self.state.read().await.tenants.clone();
        tenants.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(tenants)
    }
}

#[async_trait]
impl FinancialRecordRepository for InMemoryRepository {
    async fn find_records(&self, query: &RecordQuery) -> RepositoryResult<Vec<FinancialRecord>> {
        self.check_schema()?;
        let state = self.state.read().await;

        let mut records: Vec<FinancialRecord> = state
            .records
            .iter()
            .filter(|r| r.tenant_id == query.tenant_id)
            .filter(|r| query.source.map_or(true, |source| r.source == source))
            .filter(|r| query.from.map_or(true, |from| r.period_start >= from))
            .filter(|r| query.to.map_or(true, |to| r.period_start <= to))
            .cloned()
            .collect();

        records.sort_by_key(|r| r.period_start);
        if let Some(limit) = query.limit {
            records.truncate(limit.max(0) as usize);
        }

        Ok(records)
    }

    async fn insert_records(&self, records: &[NewFinancialRecord]) -> RepositoryResult<u64> {
        self.check_schema()?;
        let now = Utc::now();
        let mut state = self.state.write().await;
        state
            .records
            .extend(records.iter().cloned().map(|r| r.into_record(now)));
        Ok(records.len() as u64)
    }
}

#[async_trait]
impl ReportArchiveRepository for InMemoryRepository {
    async fn create_report(&self, report: NewReportArchive) -> RepositoryResult<ReportArchive> {
        self.check_schema()?;
        let stored = ReportArchive {
            id: Uuid::new_v4(),
            tenant_id: report.tenant_id,
            file_name: report.file_name,
            storage_key: report.storage_key,
            uploaded_by: report.uploaded_by,
            created_at: Utc::now(),
        };
        self.state.write().await.reports.push(stored.clone());
        Ok(stored)
    }

    async fn list_reports(&self, tenant_id: Uuid) -> RepositoryResult<Vec<ReportArchive>> {
        self.check_schema()?;
        let mut reports: Vec<ReportArchive> = self
            .state
            .read()
            .await
            .reports
            .iter()
            .filter(|r| r.tenant_id == tenant_id)
            .cloned()
            .collect();
        reports.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        reports.truncate(REPORT_LIST_LIMIT as usize);
        Ok(reports)
    }

    async fn find_report(
        &self,
        tenant_id: Uuid,
        id: Uuid,
    ) -> RepositoryResult<Option<ReportArchive>> {
        self.check_schema()?;
        let state = self.state.read().await;
        Ok(state
            .reports
            .iter()
            .find(|r| r.tenant_id == tenant_id && r.id == id)
            .cloned())
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn ping(&self) -> RepositoryResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DataSource;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn record(tenant_id: Uuid, month: u32, source: DataSource) -> NewFinancialRecord {
        let start = Utc.with_ymd_and_hms(2025, month, 1, 0, 0, 0).unwrap();
        NewFinancialRecord::new(tenant_id, start, start, dec!(100), dec!(40), source)
    }

    #[tokio::test]
    async fn test_find_records_filters_by_tenant_source_and_window() {
        let repo = InMemoryRepository::new();
        let tenant = repo.add_tenant("t1", "Tenant 1").await;
        let other = repo.add_tenant("t2", "Tenant 2").await;

        repo.insert_records(&[
            record(tenant.id, 3, DataSource::Erp),
            record(tenant.id, 1, DataSource::Pos),
            record(tenant.id, 2, DataSource::Erp),
            record(other.id, 2, DataSource::Erp),
        ])
        .await
        .unwrap();

        let all = repo
            .find_records(&RecordQuery::for_tenant(tenant.id))
            .await
            .unwrap();
        assert_eq!(all.len(), 3);
        assert!(all.windows(2).all(|w| w[0].period_start <= w[1].period_start));

        let mut query = RecordQuery::for_tenant(tenant.id);
        query.source = Some(DataSource::Erp);
        query.from = Some(Utc.with_ymd_and_hms(2025, 2, 1, 0, 0, 0).unwrap());
        query.to = Some(Utc.with_ymd_and_hms(2025, 2, 28, 0, 0, 0).unwrap());
        let filtered = repo.find_records(&query).await.unwrap();
        assert_eq!(filtered.len(), 1);

        let capped = repo
            .find_records(&RecordQuery::for_tenant(tenant.id).with_limit(Some(2)))
            .await
            .unwrap();
        assert_eq!(capped.len(), 2);
    }

    #[tokio::test]
    async fn test_upsert_is_idempotent() {
        let repo = InMemoryRepository::new();
        let first = repo.upsert("tenant-1", "Default Tenant").await.unwrap();
        let second = repo.upsert("tenant-1", "Other name").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(repo.tenant_count().await, 1);
    }

    #[tokio::test]
    async fn test_schema_missing_simulation() {
        let repo = InMemoryRepository::new();
        repo.set_schema_missing(true);

        let err = repo.list().await.unwrap_err();
        assert!(err.is_schema_missing());
    }

    #[tokio::test]
    async fn test_reports_scoped_to_tenant() {
        let repo = InMemoryRepository::new();
        let tenant_a = Uuid::new_v4();
        let tenant_b = Uuid::new_v4();

        let stored = repo
            .create_report(NewReportArchive {
                tenant_id: tenant_a,
                file_name: "q1.csv".to_string(),
                storage_key: "local://a/q1.csv".to_string(),
                uploaded_by: "user-1".to_string(),
            })
            .await
            .unwrap();

        assert_eq!(repo.list_reports(tenant_a).await.unwrap().len(), 1);
        assert!(repo.list_reports(tenant_b).await.unwrap().is_empty());
        assert!(repo.find_report(tenant_b, stored.id).await.unwrap().is_none());
        assert_eq!(
            repo.find_report(tenant_a, stored.id).await.unwrap(),
            Some(stored)
        );
    }

    #[tokio::test]
    async fn test_report_listing_is_capped() {
        let repo = InMemoryRepository::new();
        let tenant_id = Uuid::new_v4();

        for i in 0..=REPORT_LIST_LIMIT {
            repo.create_report(NewReportArchive {
                tenant_id,
                file_name: format!("r{}.csv", i),
                storage_key: format!("local://t/r{}.csv", i),
                uploaded_by: "user-1".to_string(),
            })
            .await
            .unwrap();
        }

        let reports = repo.list_reports(tenant_id).await.unwrap();
        assert_eq!(reports.len() as i64, REPORT_LIST_LIMIT);
        assert!(reports.windows(2).all(|w| w[0].created_at >= w[1].created_at));
    }
}
