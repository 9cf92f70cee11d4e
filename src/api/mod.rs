//! API module
//!
//! HTTP API endpoints, middleware and router assembly.

pub mod graphql;
pub mod middleware;
pub mod routes;
pub mod state;

use axum::{
    extract::DefaultBodyLimit,
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use crate::domain::Role;

use self::middleware::AllowedRoles;
pub use self::state::AppState;

/// Limit for JSON and other non-upload bodies
pub const JSON_BODY_LIMIT: usize = 1024 * 1024;

/// Room for multipart boundaries and part headers on top of the file itself
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Roles allowed to download archived reports
pub const DOWNLOAD_ROLES: &[Role] = &[Role::Owner, Role::Cfo, Role::Analyst];

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    let upload_limit = state.config.max_upload_bytes + MULTIPART_OVERHEAD;

    // Layers run in reverse order of addition:
    // auth -> rate_limit -> tenant -> handler
    let v1 = Router::new()
        .route("/financial/metrics", get(routes::get_metrics))
        .route("/financial/metrics/sources", get(routes::get_source_breakdown))
        .route("/financial/metrics/anomalies", get(routes::get_anomalies))
        .route("/reports", get(routes::list_reports))
        .route(
            "/reports/upload",
            post(routes::upload_report).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route(
            "/reports/:report_id/download",
            get(routes::download_report).layer(from_fn_with_state(
                AllowedRoles(DOWNLOAD_ROLES),
                middleware::authorize,
            )),
        )
        .layer(from_fn_with_state(state.clone(), middleware::resolve_tenant))
        .layer(from_fn_with_state(state.clone(), middleware::rate_limit))
        .layer(from_fn_with_state(state.clone(), middleware::authenticate_by_mode));

    let tenants = Router::new()
        .route("/api/tenants", get(routes::list_tenants))
        .route_layer(from_fn_with_state(state.clone(), middleware::rate_limit))
        .route_layer(from_fn_with_state(state.clone(), middleware::require_auth));

    let graphql = Router::new()
        .route("/graphql", post(graphql::graphql_handler))
        .route_layer(from_fn_with_state(state.clone(), middleware::resolve_tenant))
        .route_layer(from_fn_with_state(state.clone(), middleware::require_auth));

    Router::new()
        // Health check (no auth)
        .route("/health", get(routes::health_check))
        .route("/api/auth/token", post(routes::password_token))
        .route("/api/oidc/token", post(routes::oidc_token))
        .merge(tenants)
        .merge(graphql)
        .nest("/api/v1", v1)
        .layer(from_fn(middleware::logging_middleware))
        .layer(from_fn(middleware::security_headers))
        .layer(DefaultBodyLimit::max(JSON_BODY_LIMIT))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .with_state(state)
}
