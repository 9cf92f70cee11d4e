//! Shared application state

use std::sync::Arc;

use crate::auth::{Authenticator, IdentityProviderClient};
use crate::config::Config;
use crate::metrics::MetricsService;
use crate::ratelimit::RateLimiterRegistry;
use crate::repository::Repository;
use crate::storage::ReportStorage;
use crate::tenancy::TenantResolver;

use super::graphql::{build_schema, FinIntelSchema};

/// Everything a handler or middleware needs. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub repository: Arc<dyn Repository>,
    pub metrics: MetricsService,
    pub tenants: TenantResolver,
    pub authenticator: Authenticator,
    pub limiter: RateLimiterRegistry,
    pub storage: Arc<dyn ReportStorage>,
    pub identity: IdentityProviderClient,
    pub schema: FinIntelSchema,
}

impl AppState {
    /// Wire the services around one repository implementation.
    pub fn new<R>(
        config: Config,
        repository: Arc<R>,
        authenticator: Authenticator,
        limiter: RateLimiterRegistry,
        storage: Arc<dyn ReportStorage>,
        http: reqwest::Client,
    ) -> Self
    where
        R: Repository + 'static,
    {
        let metrics = MetricsService::new(repository.clone());
        let tenants = TenantResolver::new(
            repository.clone(),
            config.default_tenant_slug.clone(),
            config.auth_mode,
        );
        let identity = IdentityProviderClient::new(http, &config);
        let schema = build_schema(metrics.clone());

        Self {
            config: Arc::new(config),
            repository,
            metrics,
            tenants,
            authenticator,
            limiter,
            storage,
            identity,
            schema,
        }
    }
}
