//! Common test utilities
//!
//! Builds the full router over the in-memory repository, an HMAC token
//! verifier and process-local rate limiting.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, Response},
    Router,
};
use chrono::{TimeZone, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use rust_decimal::Decimal;
use serde_json::Value;
use sqlx::postgres::{PgPool, PgPoolOptions};
use tempfile::TempDir;

use finintel::api::{build_router, AppState};
use finintel::auth::{Audience, Authenticator, StaticKeyVerifier, TokenClaims, TokenVerifier};
use finintel::config::Config;
use finintel::domain::{DataSource, NewFinancialRecord, Tenant};
use finintel::ratelimit::RateLimiterRegistry;
use finintel::repository::{FinancialRecordRepository, InMemoryRepository};
use finintel::storage::LocalReportStorage;

pub const SECRET: &[u8] = b"integration-test-secret";
pub const ISSUER: &str = "http://localhost:8080/realms/finintel";
pub const AUDIENCE: &str = "finintel-api";
pub const BOUNDARY: &str = "finintel-test-boundary";

pub struct TestApp {
    pub router: Router,
    pub repo: Arc<InMemoryRepository>,
    pub default_tenant: Tenant,
    pub acme: Tenant,
    // Dropped with the app; removes stored uploads.
    _uploads: TempDir,
}

impl TestApp {
    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        use tower::util::ServiceExt;
        self.router.clone().oneshot(request).await.unwrap()
    }
}

fn config(upload_dir: &str, overrides: &[(&str, &str)]) -> Config {
    let mut vars: HashMap<String, String> = [
        ("DATABASE_URL", "postgres://localhost/unused"),
        ("JWT_ISSUER", ISSUER),
        ("JWT_AUDIENCE", AUDIENCE),
        (
            "KEYCLOAK_JWKS_URI",
            "http://keycloak:8080/realms/finintel/protocol/openid-connect/certs",
        ),
        // Nothing listens on the discard port.
        ("KEYCLOAK_TOKEN_URL", "http://127.0.0.1:9/token"),
        ("LOCAL_UPLOAD_DIR", upload_dir),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();

    for (key, value) in overrides {
        vars.insert(key.to_string(), value.to_string());
    }

    Config::from_lookup(|key| vars.get(key).cloned()).unwrap()
}

/// Pool against `DATABASE_URL`. The schema must already be migrated.
pub async fn setup_test_db() -> PgPool {
    dotenvy::dotenv().ok();
    let database_url = std::env::var("DATABASE_URL")
        .expect("DATABASE_URL must be set for tests");

    PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .expect("Failed to connect to DB")
}

/// App in `optional` auth mode with tenants `tenant-1` and `acme`.
pub async fn spawn_app() -> TestApp {
    spawn_app_with(&[]).await
}

pub async fn spawn_app_with(overrides: &[(&str, &str)]) -> TestApp {
    spawn_app_with_verifier(overrides, Arc::new(StaticKeyVerifier::hmac(SECRET))).await
}

pub async fn spawn_app_with_verifier(
    overrides: &[(&str, &str)],
    verifier: Arc<dyn TokenVerifier>,
) -> TestApp {
    let uploads = tempfile::tempdir().unwrap();
    let config = config(uploads.path().to_str().unwrap(), overrides);

    let repo = Arc::new(InMemoryRepository::new());
    let default_tenant = repo.add_tenant("tenant-1", "Tenant 1").await;
    let acme = repo.add_tenant("acme", "Acme Corp").await;

    let authenticator = Authenticator::new(verifier, &config);
    let storage = Arc::new(LocalReportStorage::new(uploads.path()));

    let state = AppState::new(
        config,
        repo.clone(),
        authenticator,
        RateLimiterRegistry::in_memory(),
        storage,
        reqwest::Client::new(),
    );

    TestApp {
        router: build_router(state),
        repo,
        default_tenant,
        acme,
        _uploads: uploads,
    }
}

/// Insert one row per `(year, month, revenue, expenses, source)`.
pub async fn seed_records(
    repo: &InMemoryRepository,
    tenant: &Tenant,
    rows: &[(i32, u32, i64, i64, DataSource)],
) {
    let records: Vec<NewFinancialRecord> = rows
        .iter()
        .map(|(year, month, revenue, expenses, source)| {
            let start = Utc.with_ymd_and_hms(*year, *month, 1, 0, 0, 0).unwrap();
            NewFinancialRecord::new(
                tenant.id,
                start,
                start,
                Decimal::from(*revenue),
                Decimal::from(*expenses),
                *source,
            )
        })
        .collect();
    repo.insert_records(&records).await.unwrap();
}

pub fn claims(sub: &str) -> TokenClaims {
    TokenClaims {
        sub: Some(sub.to_string()),
        iss: Some(ISSUER.to_string()),
        aud: Some(Audience::One(AUDIENCE.to_string())),
        exp: Some(Utc::now().timestamp() as u64 + 3600),
        ..Default::default()
    }
}

pub fn sign(claims: &TokenClaims) -> String {
    encode(&Header::default(), claims, &EncodingKey::from_secret(SECRET)).unwrap()
}

/// Signed token for `sub` with an optional direct role and tenant claim.
pub fn token(sub: &str, role: Option<&str>, tenant: Option<&str>) -> String {
    let mut claims = claims(sub);
    claims.role = role.map(str::to_string);
    claims.tenant_id = tenant.map(str::to_string);
    sign(&claims)
}

pub fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::empty()).unwrap()
}

pub fn post_json(uri: &str, token: Option<&str>, body: &Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

/// Multipart upload with a single part named `field`.
pub fn upload(
    token: Option<&str>,
    field: &str,
    file_name: &str,
    content_type: &str,
    data: &[u8],
) -> Request<Body> {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\nContent-Type: {content_type}\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    let mut builder = Request::builder()
        .method("POST")
        .uri("/api/v1/reports/upload")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        );
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::from(body)).unwrap()
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    to_bytes(response.into_body(), usize::MAX).await.unwrap().to_vec()
}

pub async fn body_json(response: Response<Body>) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}
