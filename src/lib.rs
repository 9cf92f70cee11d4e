//! FinIntel Library
//!
//! Re-exports modules for integration testing and the binaries.

pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod jobs;
pub mod metrics;
pub mod ratelimit;
pub mod repository;
pub mod storage;
pub mod tenancy;

pub use config::Config;
pub use error::{AppError, AppResult};
