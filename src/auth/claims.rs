//! Bearer token claims

use serde::{Deserialize, Serialize};

use crate::domain::Role;

/// `aud` is either a single string or a list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Audience {
    One(String),
    Many(Vec<String>),
}

impl Audience {
    pub fn contains(&self, audience: &str) -> bool {
        match self {
            Audience::One(aud) => aud == audience,
            Audience::Many(list) => list.iter().any(|aud| aud == audience),
        }
    }

    pub fn to_list(&self) -> Vec<String> {
        match self {
            Audience::One(aud) => vec![aud.clone()],
            Audience::Many(list) => list.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RealmAccess {
    #[serde(default)]
    pub roles: Vec<String>,
}

/// Claims the service reads from an access token. Everything is optional
/// at decode time; the authenticator decides what is mandatory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<Audience>,

    /// Authorized party; accepted in place of a matching audience
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub azp: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub realm_access: Option<RealmAccess>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<u64>,
}

impl TokenClaims {
    pub fn audience_list(&self) -> Vec<String> {
        self.aud.as_ref().map(Audience::to_list).unwrap_or_default()
    }
}

/// Role for a set of claims: a recognised `role` claim wins, then the first
/// known role (in `Role::ALL` order) among the realm roles, else `VIEWER`.
pub fn map_role(claims: &TokenClaims) -> Role {
    if let Some(role) = claims.role.as_deref().and_then(|r| r.parse().ok()) {
        return role;
    }

    let realm_roles = claims
        .realm_access
        .as_ref()
        .map(|access| access.roles.as_slice())
        .unwrap_or_default();

    Role::ALL
        .into_iter()
        .find(|role| realm_roles.iter().any(|r| r == role.as_str()))
        .unwrap_or(Role::Viewer)
}
