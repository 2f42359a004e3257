//! # API Shared
//!
//! Shared utilities and definitions for the clinic APIs.
//!
//! Contains:
//! - Request/response types with OpenAPI schemas (`dto` module)
//! - Shared services like `HealthService`
//! - Actor identification from request headers
//!
//! Used by `api-rest` and `clinic-cli` so both present records the same way.

pub mod auth;
pub mod dto;
pub mod health;

pub use auth::{parse_actor_id, AuthError, ACTOR_HEADER};
pub use health::HealthService;
