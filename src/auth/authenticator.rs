//! Request authentication
//!
//! Turns a bearer token into a `UserContext`. Signature checks are delegated
//! to a `TokenVerifier`; issuer, audience and tenant rules live here.

use std::sync::Arc;

use axum::http::request::Parts;
use axum::http::{header, HeaderMap};

use super::claims::{map_role, TokenClaims};
use super::verifier::{AuthError, TokenVerifier};
use crate::config::{AuthMode, Config};
use crate::domain::UserContext;

pub const TENANT_HEADER: &str = "x-tenant-id";

const CERTS_SUFFIX: &str = "/protocol/openid-connect/certs";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
    Authenticated(UserContext),
    /// No bearer token on the request
    Missing,
    /// A token was present but could not be verified
    Invalid(String),
}

/// Token value of an `Authorization: Bearer ...` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Issuer seen when tokens are minted on the provider's internal address.
pub fn internal_issuer(jwks_uri: &str) -> String {
    jwks_uri
        .strip_suffix(CERTS_SUFFIX)
        .unwrap_or(jwks_uri)
        .to_string()
}

#[derive(Clone)]
pub struct Authenticator {
    verifier: Arc<dyn TokenVerifier>,
    issuer: String,
    internal_issuer: String,
    audience: String,
    default_tenant: String,
    mode: AuthMode,
    debug: bool,
}

impl Authenticator {
    pub fn new(verifier: Arc<dyn TokenVerifier>, config: &Config) -> Self {
        Self {
            verifier,
            issuer: config.jwt_issuer.clone(),
            internal_issuer: internal_issuer(&config.jwks_uri),
            audience: config.jwt_audience.clone(),
            default_tenant: config.default_tenant_slug.clone(),
            mode: config.auth_mode,
            debug: config.auth_debug,
        }
    }

    pub fn mode(&self) -> AuthMode {
        self.mode
    }

    /// Takes the request head only, so the body never crosses an await.
    pub async fn authenticate(&self, request: &Parts) -> AuthOutcome {
        let headers = &request.headers;

        let Some(token) = bearer_token(headers) else {
            self.debug_auth(request, "missing bearer token");
            return AuthOutcome::Missing;
        };

        let claims = match self.verifier.verify(token).await {
            Ok(claims) => claims,
            // Unverifiable is invalid; the outage itself is logged here.
            Err(AuthError::KeySetUnavailable(reason)) => {
                tracing::error!(reason = %reason, "Signing keys unavailable");
                return AuthOutcome::Invalid(format!("key set unavailable: {}", reason));
            }
            Err(err) => {
                let reason = err.to_string();
                self.debug_auth(request, &reason);
                return AuthOutcome::Invalid(reason);
            }
        };

        match self.check_claims(claims, headers) {
            Ok(user) => {
                if user.tenant_id.is_none() {
                    self.debug_auth(request, "no tenant in token or header");
                }
                AuthOutcome::Authenticated(user)
            }
            Err(reason) => {
                self.debug_auth(request, &reason);
                AuthOutcome::Invalid(reason)
            }
        }
    }

    fn check_claims(&self, claims: TokenClaims, headers: &HeaderMap) -> Result<UserContext, String> {
        let Some(sub) = claims.sub.clone().filter(|s| !s.is_empty()) else {
            return Err("token missing sub claim".to_string());
        };

        let issuer = claims.iss.as_deref().unwrap_or_default();
        if issuer != self.issuer && issuer != self.internal_issuer {
            return Err(format!(
                "issuer mismatch token={} expected={} internal={}",
                issuer, self.issuer, self.internal_issuer
            ));
        }

        let audience_ok = claims
            .aud
            .as_ref()
            .is_some_and(|aud| aud.contains(&self.audience))
            || claims.azp.as_deref() == Some(self.audience.as_str());
        if !audience_ok {
            return Err(format!(
                "audience mismatch token={} azp={} expected={}",
                claims.audience_list().join(","),
                claims.azp.as_deref().unwrap_or_default(),
                self.audience
            ));
        }

        let header_tenant = headers
            .get(TENANT_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let fallback = match self.mode {
            AuthMode::Optional => Some(self.default_tenant.clone()),
            AuthMode::Required => None,
        };
        let tenant = claims
            .tenant_id
            .clone()
            .or_else(|| claims.tenant.clone())
            .or(header_tenant)
            .or(fallback);

        let mut user = UserContext::new(sub, map_role(&claims));
        user.tenant_id = tenant;
        user.email = claims.email;

        Ok(user)
    }

    fn debug_auth(&self, request: &Parts, reason: &str) {
        if !self.debug {
            return;
        }
        tracing::warn!(
            method = %request.method,
            path = %request.uri.path(),
            tenant_header = request
                .headers
                .get(TENANT_HEADER)
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default(),
            "auth: {}",
            reason
        );
    }
}
