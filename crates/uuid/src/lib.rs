//! Identifier and sharded-path utilities.
//!
//! Clinic records are stored under sharded directories derived from a UUID. To keep path
//! derivation deterministic, storage identifiers use a *canonical* UUID representation:
//! **32 lowercase hexadecimal characters** (no hyphens).
//!
//! This crate provides:
//! - [`ShardableUuid`], a wrapper that guarantees the canonical format once constructed.
//! - [`TimestampId`], a time-prefixed identifier used for append-only audit entries.
//!
//! ## Sharded directory layout
//! For a canonical UUID `u`, records live under:
//! `parent_dir/<u[0..2]>/<u[2..4]>/<u>/`
//!
//! Example:
//! `clinic_data/submissions/55/0e/550e8400e29b41d4a716446655440000/`

mod service;

pub use service::{ShardableUuid, TimestampId, Uuid};

/// Error type for identifier operations.
#[derive(Debug, thiserror::Error)]
pub enum UuidError {
    /// Invalid input provided
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Result type for identifier operations.
pub type UuidResult<T> = Result<T, UuidError>;
