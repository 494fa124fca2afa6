//! # API Shared
//!
//! Shared definitions for the Swasth case API.
//!
//! Contains:
//! - Wire types (`wire` module) exchanged between the device-side submission pipeline and the
//!   review backend, with OpenAPI schemas
//! - Shared services like `HealthService`
//!
//! Used by `swasth-core` (outbound client) and `api-rest` (backend).

pub mod health;
pub mod wire;

pub use health::HealthService;
pub use wire::*;

/// API version reported by the health endpoint.
pub const API_VERSION: &str = env!("CARGO_PKG_VERSION");
