//! API Middleware
//!
//! Authentication, rate limiting, tenant resolution, role checks, security
//! headers and request logging.

use std::net::SocketAddr;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{header, HeaderMap, HeaderName, HeaderValue, Request},
    middleware::Next,
    response::Response,
};

use crate::auth::{AuthOutcome, TENANT_HEADER};
use crate::config::AuthMode;
use crate::domain::{Role, TenantContext, UserContext};
use crate::error::AppError;
use crate::ratelimit::{endpoint_budget, limiter_key, Decision};

use super::state::AppState;

// =========================================================================
// Authentication
// =========================================================================

/// Reject requests without a valid bearer token.
pub async fn require_auth(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    authenticate(&state, request, next, true).await
}

/// Accept anonymous requests; a token that is present must still be valid.
pub async fn optional_auth(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    authenticate(&state, request, next, false).await
}

/// `require_auth` or `optional_auth` depending on the configured mode.
pub async fn authenticate_by_mode(
    state: State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    match state.authenticator.mode() {
        AuthMode::Required => require_auth(state, request, next).await,
        AuthMode::Optional => optional_auth(state, request, next).await,
    }
}

async fn authenticate(
    state: &AppState,
    request: Request<Body>,
    next: Next,
    required: bool,
) -> Result<Response, AppError> {
    let (mut parts, body) = request.into_parts();

    match state.authenticator.authenticate(&parts).await {
        AuthOutcome::Authenticated(user) => {
            parts.extensions.insert(user);
        }
        AuthOutcome::Missing if !required => {}
        AuthOutcome::Missing => return Err(AppError::Unauthorized),
        AuthOutcome::Invalid(_) if required => return Err(AppError::Unauthorized),
        AuthOutcome::Invalid(_) => return Err(AppError::InvalidToken),
    }

    Ok(next.run(Request::from_parts(parts, body)).await)
}

// =========================================================================
// Rate Limiting
// =========================================================================

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
}

/// Per tenant, client address and endpoint budget.
pub async fn rate_limit(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let tenant = header_str(request.headers(), TENANT_HEADER)
        .map(str::to_string)
        .or_else(|| {
            request
                .extensions()
                .get::<UserContext>()
                .and_then(|user| user.tenant_id.clone())
        })
        .unwrap_or_else(|| "anonymous".to_string());

    let ip = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string());

    let path = request.uri().path();
    let key = limiter_key(&tenant, &ip, request.method().as_str(), path);
    let budget = endpoint_budget(path);

    match state.limiter.check(&key, budget).await {
        Decision::Allowed => Ok(next.run(request).await),
        Decision::Limited { retry_after_secs } => {
            tracing::warn!(key = %key, points = budget.points, "Rate limit exceeded");
            Err(AppError::RateLimited { retry_after_secs })
        }
    }
}

// =========================================================================
// Tenant Resolution
// =========================================================================

/// Attach the request's `TenantContext`. The hint is the authenticated
/// user's tenant when there is one, else the `x-tenant-id` header.
pub async fn resolve_tenant(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let user_hint = request
        .extensions()
        .get::<UserContext>()
        .and_then(|user| user.tenant_id.clone());
    let hint = user_hint.or_else(|| header_str(request.headers(), TENANT_HEADER).map(str::to_string));

    let tenant = state.tenants.resolve(hint.as_deref()).await?;

    if let Some(user) = request.extensions_mut().get_mut::<UserContext>() {
        user.tenant_id = Some(tenant.id.to_string());
    }
    request.extensions_mut().insert(TenantContext::new(tenant));

    Ok(next.run(request).await)
}

// =========================================================================
// Authorization
// =========================================================================

/// Roles admitted by an `authorize` layer
#[derive(Debug, Clone, Copy)]
pub struct AllowedRoles(pub &'static [Role]);

pub fn check_role(user: Option<&UserContext>, allowed: &[Role]) -> Result<(), AppError> {
    match user {
        None => Err(AppError::Unauthorized),
        Some(user) if user.has_any_role(allowed) => Ok(()),
        Some(user) => {
            tracing::debug!(sub = %user.sub, role = %user.role, "Role not permitted");
            Err(AppError::Forbidden)
        }
    }
}

pub async fn authorize(
    State(AllowedRoles(allowed)): State<AllowedRoles>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    check_role(request.extensions().get::<UserContext>(), allowed)?;
    Ok(next.run(request).await)
}

// =========================================================================
// Security Headers
// =========================================================================

const SECURITY_HEADERS: &[(&str, &str)] = &[
    (
        "content-security-policy",
        "default-src 'self'; img-src 'self' data:; base-uri 'self'; font-src 'self' https: data:; \
         form-action 'self'; frame-ancestors 'self'; object-src 'none'; script-src 'self'; \
         script-src-attr 'none'; style-src 'self' https: 'unsafe-inline'; upgrade-insecure-requests",
    ),
    ("cross-origin-opener-policy", "same-origin"),
    ("cross-origin-resource-policy", "same-site"),
    ("origin-agent-cluster", "?1"),
    ("referrer-policy", "no-referrer"),
    ("strict-transport-security", "max-age=15552000; includeSubDomains"),
    ("x-content-type-options", "nosniff"),
    ("x-dns-prefetch-control", "off"),
    ("x-download-options", "noopen"),
    ("x-frame-options", "SAMEORIGIN"),
    ("x-permitted-cross-domain-policies", "none"),
    ("x-xss-protection", "0"),
];

pub async fn security_headers(request: Request<Body>, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();

    for (name, value) in SECURITY_HEADERS {
        headers.insert(
            HeaderName::from_static(*name),
            HeaderValue::from_static(*value),
        );
    }
    headers.remove(header::SERVER);

    response
}

// =========================================================================
// Request Logging
// =========================================================================

/// Headers that should be masked in logs
const SENSITIVE_HEADERS: &[&str] = &["authorization", "cookie", "set-cookie", "x-api-key"];

/// Mask sensitive headers for logging
pub fn mask_headers_for_logging(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .map(|(name, value)| {
            let masked_value = if SENSITIVE_HEADERS.contains(&name.as_str()) {
                "[REDACTED]".to_string()
            } else {
                value.to_str().unwrap_or("[invalid utf8]").to_string()
            };
            (name.to_string(), masked_value)
        })
        .collect()
}

/// Request logging middleware
pub async fn logging_middleware(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let headers = mask_headers_for_logging(request.headers());
    let request_id = header_str(request.headers(), "x-request-id")
        .unwrap_or_default()
        .to_string();

    let start = std::time::Instant::now();

    tracing::info!(
        method = %method,
        uri = %uri,
        request_id = %request_id,
        headers = ?headers,
        "Incoming request"
    );

    let response = next.run(request).await;

    tracing::info!(
        method = %method,
        uri = %uri,
        status = %response.status(),
        duration_ms = %start.elapsed().as_millis(),
        request_id = %request_id,
        "Request completed"
    );

    response
}
