//! Postgres Repository
//!
//! sqlx-backed implementation of the persistence ports. Queries are checked
//! at runtime so the crate builds without a live database.

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::{
    FinancialRecordRepository, ReportArchiveRepository, Repository, RepositoryResult,
    TenantRepository, REPORT_LIST_LIMIT,
};
use crate::domain::{
    FinancialRecord, NewFinancialRecord, NewReportArchive, RecordQuery, ReportArchive, Tenant,
};

/// Rows per multi-value INSERT
const INSERT_BATCH_SIZE: usize = 500;

#[derive(Debug, Clone)]
pub struct PgRepository {
    pool: PgPool,
}

impl PgRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl TenantRepository for PgRepository {
    async fn find_by_hint(&self, hint: &str) -> RepositoryResult<Option<Tenant>> {
        let tenant = sqlx::query_as::<_, Tenant>(
            r#"
            SELECT id, slug, name
            FROM tenants
            WHERE id::text = $1 OR slug = $1
            LIMIT 1
            "#,
        )
        .bind(hint)
        .fetch_optional(&self.pool)
        .await?;

        Ok(tenant)
    }

    async fn find_by_slug(&self, slug: &str) -> RepositoryResult<Option<Tenant>> {
        let tenant = sqlx::query_as::<_, Tenant>("SELECT id, slug, name FROM tenants WHERE slug = $1")
            .bind(slug)
            .fetch_optional(&self.pool)
            .await?;

        Ok(tenant)
    }

    async fn find_first(&self) -> RepositoryResult<Option<Tenant>> {
        let tenant = sqlx::query_as::<_, Tenant>(
            "SELECT id, slug, name FROM tenants ORDER BY created_at ASC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;

        Ok(tenant)
    }

    async fn upsert(&self, slug: &str, name: &str) -> RepositoryResult<Tenant> {
        // The no-op update makes RETURNING yield the existing row on conflict.
        let tenant = sqlx::query_as::<_, Tenant>(
            r#"
            INSERT INTO tenants (slug, name, realm_id)
            VALUES ($1, $2, $1)
            ON CONFLICT (slug) DO UPDATE SET slug = EXCLUDED.slug
            RETURNING id, slug, name
            "#,
        )
        .bind(slug)
        .bind(name)
        .fetch_one(&self.pool)
        .await?;

        tracing::info!(tenant_id = %tenant.id, slug = %tenant.slug, "Tenant upserted");

        Ok(tenant)
    }

    async fn list(&self) -> RepositoryResult<Vec<Tenant>> {
        let tenants = sqlx::query_as::<_, Tenant>("SELECT id, slug, name FROM tenants ORDER BY name ASC")
            .fetch_all(&self.pool)
            .await?;

        Ok(tenants)
    }
}

#[async_trait]
impl FinancialRecordRepository for PgRepository {
    async fn find_records(&self, query: &RecordQuery) -> RepositoryResult<Vec<FinancialRecord>> {
        // LIMIT NULL reads every row.
        let records = sqlx::query_as::<_, FinancialRecord>(
            r#"
            SELECT id, tenant_id, period_start, period_end, revenue, expenses, net_profit, source, created_at
            FROM financial_records
            WHERE tenant_id = $1
              AND ($2::data_source IS NULL OR source = $2)
              AND ($3::timestamptz IS NULL OR period_start >= $3)
              AND ($4::timestamptz IS NULL OR period_start <= $4)
            ORDER BY period_start ASC
            LIMIT $5
            "#,
        )
        .bind(query.tenant_id)
        .bind(query.source)
        .bind(query.from)
        .bind(query.to)
        .bind(query.limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    async fn insert_records(&self, records: &[NewFinancialRecord]) -> RepositoryResult<u64> {
        let mut tx = self.pool.begin().await?;
        let mut inserted = 0u64;

        for chunk in records.chunks(INSERT_BATCH_SIZE) {
            let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
                "INSERT INTO financial_records (tenant_id, period_start, period_end, revenue, expenses, net_profit, source) ",
            );
            builder.push_values(chunk, |mut row, record| {
                row.push_bind(record.tenant_id)
                    .push_bind(record.period_start)
                    .push_bind(record.period_end)
                    .push_bind(record.revenue)
                    .push_bind(record.expenses)
                    .push_bind(record.net_profit)
                    .push_bind(record.source);
            });

            inserted += builder.build().execute(&mut *tx).await?.rows_affected();
        }

        tx.commit().await?;

        tracing::debug!(inserted = inserted, "Financial records inserted");

        Ok(inserted)
    }
}

#[async_trait]
impl ReportArchiveRepository for PgRepository {
    async fn create_report(&self, report: NewReportArchive) -> RepositoryResult<ReportArchive> {
        let stored = sqlx::query_as::<_, ReportArchive>(
            r#"
            INSERT INTO report_archives (tenant_id, file_name, storage_key, uploaded_by)
            VALUES ($1, $2, $3, $4)
            RETURNING id, tenant_id, file_name, storage_key, uploaded_by, created_at
            "#,
        )
        .bind(report.tenant_id)
        .bind(&report.file_name)
        .bind(&report.storage_key)
        .bind(&report.uploaded_by)
        .fetch_one(&self.pool)
        .await?;

        Ok(stored)
    }

    async fn list_reports(&self, tenant_id: Uuid) -> RepositoryResult<Vec<ReportArchive>> {
        let reports = sqlx::query_as::<_, ReportArchive>(
            r#"
            SELECT id, tenant_id, file_name, storage_key, uploaded_by, created_at
            FROM report_archives
            WHERE tenant_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(tenant_id)
        .bind(REPORT_LIST_LIMIT)
        .fetch_all(&self.pool)
        .await?;

        Ok(reports)
    }

    async fn find_report(
        &self,
        tenant_id: Uuid,
        id: Uuid,
    ) -> RepositoryResult<Option<ReportArchive>> {
        let report = sqlx::query_as::<_, ReportArchive>(
            r#"
            SELECT id, tenant_id, file_name, storage_key, uploaded_by, created_at
            FROM report_archives
            WHERE tenant_id = $1 AND id = $2
            "#,
        )
        .bind(tenant_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(report)
    }
}

#[async_trait]
impl Repository for PgRepository {
    async fn ping(&self) -> RepositoryResult<()> {
        crate::db::verify_connection(&self.pool).await?;
        Ok(())
    }
}
