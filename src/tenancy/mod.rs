//! Tenant resolution
//!
//! Maps a request's tenant hint onto a stored tenant.

pub mod resolver;

pub use resolver::{TenantError, TenantResolver};
