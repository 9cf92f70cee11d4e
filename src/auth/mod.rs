//! Authentication module
//!
//! Bearer token verification, claim checks and the identity provider
//! token endpoint client.

pub mod authenticator;
pub mod claims;
pub mod identity;
pub mod verifier;

pub use authenticator::{bearer_token, AuthOutcome, Authenticator, TENANT_HEADER};
pub use claims::{map_role, Audience, RealmAccess, TokenClaims};
pub use identity::{CodeExchangeToken, IdentityError, IdentityProviderClient, PasswordGrantToken};
pub use verifier::{AuthError, JwksVerifier, StaticKeyVerifier, TokenVerifier};
