//! Actor identification.
//!
//! Every request that acts on clinic data names its caller in the [`ACTOR_HEADER`] header as a
//! canonical user id. Verifying that the caller really is that user is the job of whatever sits
//! in front of the API.

use clinic_core::ShardableUuid;

/// Header carrying the acting user's id.
pub const ACTOR_HEADER: &str = "x-user-id";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("missing {ACTOR_HEADER} header")]
    Missing,
    #[error("malformed {ACTOR_HEADER} header: {0}")]
    Malformed(String),
    #[error("unknown user {0}")]
    UnknownUser(String),
}

/// Parses the raw header value into a user id.
///
/// # Errors
///
/// [`AuthError::Missing`] for an absent or blank value, [`AuthError::Malformed`] when the value
/// is not a canonical id.
pub fn parse_actor_id(raw: Option<&str>) -> Result<ShardableUuid, AuthError> {
    let raw = raw.map(str::trim).filter(|v| !v.is_empty()).ok_or(AuthError::Missing)?;
    ShardableUuid::parse(raw).map_err(|_| AuthError::Malformed(raw.to_owned()))
}
