//! Tenant Resolver
//!
//! Resolution order: explicit hint (id or slug), then the configured default
//! slug, then any tenant, then a freshly created default tenant. In
//! `required` auth mode an unmatched hint or a missing hint is rejected
//! instead of falling back.

use std::sync::Arc;

use crate::config::AuthMode;
use crate::domain::Tenant;
use crate::repository::{RepositoryError, TenantRepository, DEFAULT_TENANT_NAME};

#[derive(Debug, thiserror::Error)]
pub enum TenantError {
    #[error("Invalid tenant context")]
    NotFound,

    #[error("Tenant schema is not migrated: {0}")]
    SchemaNotMigrated(String),

    #[error(transparent)]
    Repository(RepositoryError),
}

impl From<RepositoryError> for TenantError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::SchemaMissing(detail) => TenantError::SchemaNotMigrated(detail),
            other => TenantError::Repository(other),
        }
    }
}

#[derive(Clone)]
pub struct TenantResolver {
    tenants: Arc<dyn TenantRepository>,
    default_slug: String,
    mode: AuthMode,
}

impl TenantResolver {
    pub fn new(tenants: Arc<dyn TenantRepository>, default_slug: impl Into<String>, mode: AuthMode) -> Self {
        Self {
            tenants,
            default_slug: default_slug.into(),
            mode,
        }
    }

    pub async fn resolve(&self, hint: Option<&str>) -> Result<Tenant, TenantError> {
        let hint = hint.map(str::trim).filter(|h| !h.is_empty());

        if let Some(hint) = hint {
            if let Some(tenant) = self.tenants.find_by_hint(hint).await? {
                return Ok(tenant);
            }
            tracing::debug!(hint = %hint, "Tenant hint matched nothing");
        }

        if self.mode == AuthMode::Required {
            return Err(TenantError::NotFound);
        }

        if let Some(tenant) = self.tenants.find_by_slug(&self.default_slug).await? {
            return Ok(tenant);
        }

        if let Some(tenant) = self.tenants.find_first().await? {
            return Ok(tenant);
        }

        let tenant = self
            .tenants
            .upsert(&self.default_slug, DEFAULT_TENANT_NAME)
            .await?;
        tracing::info!(tenant_id = %tenant.id, slug = %tenant.slug, "Created default tenant");

        Ok(tenant)
    }
}
