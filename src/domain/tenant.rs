//! Tenants and report archives

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An isolated customer account. All financial data is scoped to one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Tenant {
    pub id: Uuid,
    pub slug: String,
    pub name: String,
}

impl Tenant {
    /// True when `hint` names this tenant by id or by slug.
    pub fn matches_hint(&self, hint: &str) -> bool {
        self.slug == hint || self.id.to_string() == hint
    }
}

/// Tenant resolved for the current request. Immutable once attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantContext {
    tenant: Tenant,
}

impl TenantContext {
    pub fn new(tenant: Tenant) -> Self {
        Self { tenant }
    }

    pub fn id(&self) -> Uuid {
        self.tenant.id
    }
}

/// Metadata row for an uploaded report file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ReportArchive {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub file_name: String,
    pub storage_key: String,
    pub uploaded_by: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewReportArchive {
    pub tenant_id: Uuid,
    pub file_name: String,
    pub storage_key: String,
    pub uploaded_by: String,
}
