//! Request user context
//!
//! Identity attached to a request once its bearer token has been validated.
//! Lives for exactly one request.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Tenant-level role carried by a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    Owner,
    Cfo,
    Analyst,
    Viewer,
}

impl Role {
    /// Known roles in claim-matching priority order.
    pub const ALL: [Role; 4] = [Role::Owner, Role::Cfo, Role::Analyst, Role::Viewer];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Owner => "OWNER",
            Role::Cfo => "CFO",
            Role::Analyst => "ANALYST",
            Role::Viewer => "VIEWER",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown role: {0}")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|role| role.as_str() == s)
            .ok_or_else(|| UnknownRole(s.to_string()))
    }
}

/// Authenticated caller of the current request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserContext {
    /// Token subject
    pub sub: String,

    /// Tenant hint from the token, replaced by the canonical tenant id
    /// once tenant resolution has run
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,

    pub role: Role,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl UserContext {
    pub fn new(sub: impl Into<String>, role: Role) -> Self {
        Self {
            sub: sub.into(),
            tenant_id: None,
            role,
            email: None,
        }
    }

    #[cfg(test)]
    pub fn with_tenant(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }

    #[cfg(test)]
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn has_any_role(&self, allowed: &[Role]) -> bool {
        allowed.contains(&self.role)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_builder() {
        let context = UserContext::new("user-1", Role::Analyst)
            .with_tenant("tenant-1")
            .with_email("a@example.com");

        assert_eq!(context.sub, "user-1");
        assert_eq!(context.tenant_id.as_deref(), Some("tenant-1"));
        assert_eq!(context.email.as_deref(), Some("a@example.com"));
        assert!(context.has_any_role(&[Role::Owner, Role::Analyst]));
        assert!(!context.has_any_role(&[Role::Owner, Role::Cfo]));
    }

    #[test]
    fn test_role_parsing_is_exact() {
        assert_eq!("CFO".parse::<Role>().unwrap(), Role::Cfo);
        assert!("cfo".parse::<Role>().is_err());
        assert!("ADMIN".parse::<Role>().is_err());
    }

    #[test]
    fn test_role_serde_uses_upper_case() {
        let json = serde_json::to_string(&Role::Viewer).unwrap();
        assert_eq!(json, "\"VIEWER\"");
    }
}
