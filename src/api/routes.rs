//! API Routes
//!
//! HTTP endpoint handlers.

use std::collections::HashMap;

use axum::{
    extract::{Extension, Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::{CodeExchangeToken, PasswordGrantToken};
use crate::domain::{parse_filters, NewReportArchive, ReportArchive, Tenant, TenantContext, UserContext};
use crate::error::{AppError, AppResult};
use crate::metrics::{AnomalyPoint, MetricsReport, SourceBreakdownPoint};
use crate::storage::{content_type_for, is_allowed_content_type, sanitize_file_name, ReportUpload};

use super::state::AppState;

// =========================================================================
// Request/Response types
// =========================================================================

#[derive(Debug, Serialize)]
pub struct SourcesResponse {
    pub sources: Vec<SourceBreakdownPoint>,
}

#[derive(Debug, Serialize)]
pub struct AnomaliesResponse {
    pub anomalies: Vec<AnomalyPoint>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub storage_key: String,
}

#[derive(Debug, Serialize)]
pub struct ReportsResponse {
    pub reports: Vec<ReportArchive>,
}

#[derive(Debug, Serialize)]
pub struct TenantsResponse {
    pub tenants: Vec<Tenant>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PasswordTokenRequest {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeExchangeRequest {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub code_verifier: Option<String>,
    #[serde(default)]
    pub redirect_uri: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub api: &'static str,
    pub postgres: &'static str,
    pub redis: &'static str,
    pub timestamp: String,
}

fn status_label(ok: bool) -> &'static str {
    if ok {
        "ok"
    } else {
        "down"
    }
}

// =========================================================================
// Financial metrics
// =========================================================================

/// GET /api/v1/financial/metrics
pub async fn get_metrics(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    Query(query): Query<HashMap<String, String>>,
) -> AppResult<Json<MetricsReport>> {
    let report = state
        .metrics
        .get_metrics(tenant.id(), &parse_filters(&query))
        .await?;
    Ok(Json(report))
}

/// GET /api/v1/financial/metrics/sources
pub async fn get_source_breakdown(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    Query(query): Query<HashMap<String, String>>,
) -> AppResult<Json<SourcesResponse>> {
    let sources = state
        .metrics
        .get_source_breakdown(tenant.id(), &parse_filters(&query))
        .await?;
    Ok(Json(SourcesResponse { sources }))
}

/// GET /api/v1/financial/metrics/anomalies
pub async fn get_anomalies(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    Query(query): Query<HashMap<String, String>>,
) -> AppResult<Json<AnomaliesResponse>> {
    let anomalies = state
        .metrics
        .get_anomalies(tenant.id(), &parse_filters(&query))
        .await?;
    Ok(Json(AnomaliesResponse { anomalies }))
}

// =========================================================================
// Reports
// =========================================================================

/// POST /api/v1/reports/upload
pub async fn upload_report(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    user: Option<Extension<UserContext>>,
    mut multipart: Multipart,
) -> AppResult<(StatusCode, Json<UploadResponse>)> {
    let uploaded_by = user
        .map(|Extension(user)| user.sub)
        .unwrap_or_else(|| "system".to_string());

    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::InvalidRequest(e.body_text()))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let file_name = field.file_name().unwrap_or("upload").to_string();
        let content_type = field.content_type().unwrap_or_default().to_string();
        if !is_allowed_content_type(&content_type) {
            return Err(AppError::UnsupportedFileType);
        }

        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::InvalidRequest(e.body_text()))?;
        if bytes.len() > state.config.max_upload_bytes {
            return Err(AppError::InvalidRequest("File too large".to_string()));
        }

        upload = Some(ReportUpload {
            tenant_id: tenant.id(),
            file_name,
            content_type,
            bytes: bytes.to_vec(),
            uploaded_by: uploaded_by.clone(),
        });
        break;
    }

    let upload = upload.ok_or(AppError::MissingFile)?;
    let storage_key = state.storage.store(&upload).await?;

    state
        .repository
        .create_report(NewReportArchive {
            tenant_id: upload.tenant_id,
            file_name: upload.file_name,
            storage_key: storage_key.clone(),
            uploaded_by,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(UploadResponse { storage_key })))
}

/// GET /api/v1/reports
pub async fn list_reports(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
) -> AppResult<Json<ReportsResponse>> {
    let reports = state.repository.list_reports(tenant.id()).await?;
    Ok(Json(ReportsResponse { reports }))
}

/// GET /api/v1/reports/:report_id/download
pub async fn download_report(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    Path(report_id): Path<Uuid>,
) -> AppResult<Response> {
    let report = state
        .repository
        .find_report(tenant.id(), report_id)
        .await?
        .ok_or_else(|| AppError::ReportNotFound(report_id.to_string()))?;

    let bytes = state.storage.read(&report.storage_key).await?;

    let disposition = format!(
        "attachment; filename=\"{}\"",
        sanitize_file_name(&report.file_name)
    );

    Ok((
        [
            (header::CONTENT_TYPE, content_type_for(&report.file_name).to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response())
}

// =========================================================================
// Tenants
// =========================================================================

/// GET /api/tenants
pub async fn list_tenants(State(state): State<AppState>) -> AppResult<Json<TenantsResponse>> {
    let tenants = match state.repository.list().await {
        Ok(tenants) => tenants,
        Err(e) if e.is_schema_missing() => {
            tracing::warn!("Tenant table missing, returning empty list");
            Vec::new()
        }
        Err(e) => return Err(e.into()),
    };

    Ok(Json(TenantsResponse { tenants }))
}

// =========================================================================
// Identity provider token endpoints
// =========================================================================

/// POST /api/auth/token
pub async fn password_token(
    State(state): State<AppState>,
    body: Option<Json<PasswordTokenRequest>>,
) -> AppResult<Json<PasswordGrantToken>> {
    let Json(body) = body.unwrap_or_default();

    let token = state
        .identity
        .password_grant(body.username.as_deref(), body.password.as_deref())
        .await?;
    Ok(Json(token))
}

/// POST /api/oidc/token
pub async fn oidc_token(
    State(state): State<AppState>,
    body: Option<Json<CodeExchangeRequest>>,
) -> AppResult<Json<CodeExchangeToken>> {
    let Json(body) = body.unwrap_or_default();

    let required = |value: Option<String>| value.filter(|v| !v.is_empty());
    let (Some(code), Some(code_verifier), Some(redirect_uri)) = (
        required(body.code),
        required(body.code_verifier),
        required(body.redirect_uri),
    ) else {
        return Err(AppError::InvalidRequest(
            "Missing code, codeVerifier, or redirectUri".to_string(),
        ));
    };

    let token = state
        .identity
        .exchange_code(&code, &code_verifier, &redirect_uri)
        .await?;
    Ok(Json(token))
}

// =========================================================================
// Health
// =========================================================================

/// GET /health. Always 200; dependency state is reported in the body.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let postgres = state.repository.ping().await.is_ok();
    let redis = state.limiter.primary_healthy().await;

    Json(HealthResponse {
        api: "ok",
        postgres: status_label(postgres),
        redis: status_label(redis),
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    })
}
