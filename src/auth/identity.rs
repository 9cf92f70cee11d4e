//! Identity provider token endpoint client
//!
//! Password grant for the demo login and the authorization-code + PKCE
//! exchange for the browser client.

use serde::{Deserialize, Serialize};

use crate::config::Config;

#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    /// The provider answered but refused to issue a token
    #[error("{0}")]
    Rejected(String),

    #[error("Unable to reach identity provider: {0}")]
    Unreachable(String),
}

/// Raw token endpoint payload
#[derive(Debug, Default, Deserialize)]
struct ProviderTokenResponse {
    access_token: Option<String>,
    refresh_token: Option<String>,
    id_token: Option<String>,
    expires_in: Option<u64>,
    token_type: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

impl ProviderTokenResponse {
    fn rejection(&self, fallback: &str) -> IdentityError {
        let detail = self
            .error_description
            .clone()
            .or_else(|| self.error.clone())
            .unwrap_or_else(|| fallback.to_string());
        IdentityError::Rejected(detail)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordGrantToken {
    pub access_token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeExchangeToken {
    pub access_token: String,
    pub refresh_token: String,
    pub id_token: String,
    pub token_type: String,
    pub expires_in: u64,
}

#[derive(Clone)]
pub struct IdentityProviderClient {
    http: reqwest::Client,
    token_url: String,
    client_id: String,
    client_secret: String,
    oidc_client_id: String,
    demo_username: String,
    demo_password: String,
}

impl IdentityProviderClient {
    pub fn new(http: reqwest::Client, config: &Config) -> Self {
        Self {
            http,
            token_url: config.token_url.clone(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            oidc_client_id: config.oidc_client_id.clone(),
            demo_username: config.demo_username.clone(),
            demo_password: config.demo_password.clone(),
        }
    }

    /// Resource-owner password grant. Blank credentials fall back to the
    /// configured demo account.
    pub async fn password_grant(
        &self,
        username: Option<&str>,
        password: Option<&str>,
    ) -> Result<PasswordGrantToken, IdentityError> {
        let username = username
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .unwrap_or(&self.demo_username);
        let password = password
            .filter(|p| !p.trim().is_empty())
            .unwrap_or(&self.demo_password);

        let form = [
            ("grant_type", "password"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("username", username),
            ("password", password),
        ];

        let (ok, payload) = self.post_form(&form).await?;
        match payload.access_token.clone() {
            Some(access_token) if ok => Ok(PasswordGrantToken {
                access_token,
                expires_in: payload.expires_in,
                token_type: payload.token_type,
            }),
            _ => Err(payload.rejection("Token request failed")),
        }
    }

    pub async fn exchange_code(
        &self,
        code: &str,
        code_verifier: &str,
        redirect_uri: &str,
    ) -> Result<CodeExchangeToken, IdentityError> {
        let mut form = vec![
            ("grant_type", "authorization_code"),
            ("client_id", self.oidc_client_id.as_str()),
            ("code", code),
            ("code_verifier", code_verifier),
            ("redirect_uri", redirect_uri),
        ];
        if !self.client_secret.is_empty() {
            form.push(("client_secret", self.client_secret.as_str()));
        }

        let (ok, payload) = self.post_form(&form).await?;
        match payload.access_token.clone() {
            Some(access_token) if ok => Ok(CodeExchangeToken {
                access_token,
                refresh_token: payload.refresh_token.unwrap_or_default(),
                id_token: payload.id_token.unwrap_or_default(),
                token_type: payload.token_type.unwrap_or_else(|| "Bearer".to_string()),
                expires_in: payload.expires_in.unwrap_or(0),
            }),
            _ => Err(payload.rejection("OIDC token exchange failed")),
        }
    }

    /// POST a form to the token endpoint. An unparsable body counts as empty.
    async fn post_form(
        &self,
        form: &[(&str, &str)],
    ) -> Result<(bool, ProviderTokenResponse), IdentityError> {
        let response = self
            .http
            .post(&self.token_url)
            .form(form)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, url = %self.token_url, "Token endpoint unreachable");
                IdentityError::Unreachable(e.to_string())
            })?;

        let ok = response.status().is_success();
        let payload = response
            .json::<ProviderTokenResponse>()
            .await
            .unwrap_or_default();

        if !ok {
            tracing::warn!(error = ?payload.error, "Token endpoint refused request");
        }

        Ok((ok, payload))
    }
}
