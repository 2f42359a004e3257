use clinic_uuid::ShardableUuid;

use crate::nric::NricError;

/// Coarse classification of a [`ClinicError`], used by callers (HTTP layer, CLI) to decide how
/// to present a failure without matching on every variant.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed input (bad digit count, empty rejection reason, unknown enum value).
    InvalidArgument,
    /// The requested transition is not valid from the current status.
    InvalidState,
    /// The actor lacks the role or clinic permission.
    Forbidden,
    NotFound,
    /// Uniqueness violation or a concurrent modification lost the race.
    Conflict,
    /// Storage or serialisation failure; never caused by the caller.
    Internal,
}

#[derive(Debug, thiserror::Error)]
pub enum ClinicError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("invalid state: {0}")]
    InvalidState(String),
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("invalid NRIC/FIN: {0}")]
    Nric(#[from] NricError),
    #[error("invalid text: {0}")]
    Text(#[from] clinic_types::TextError),
    #[error("invalid identifier: {0}")]
    Uuid(#[from] clinic_uuid::UuidError),

    #[error("failed to create storage directory: {0}")]
    StorageDirCreation(std::io::Error),
    #[error("failed to write record file: {0}")]
    FileWrite(std::io::Error),
    #[error("failed to read record file: {0}")]
    FileRead(std::io::Error),
    #[error("failed to serialize record: {0}")]
    Serialization(serde_json::Error),
    #[error("failed to deserialize record: {0}")]
    Deserialization(serde_json::Error),
    #[error("seed file schema mismatch at {path}: {message}")]
    SeedSchema { path: String, message: String },
    #[error("storage lock poisoned")]
    LockPoisoned,

    /// The status change was persisted but its audit entry was not. The record and its audit
    /// trail now disagree and an operator has to reconcile them.
    #[error("audit append failed for submission {submission_id} after status was persisted: {source}")]
    AuditAppendFailed {
        submission_id: ShardableUuid,
        #[source]
        source: Box<ClinicError>,
    },
}

impl ClinicError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ClinicError::InvalidArgument(_)
            | ClinicError::Nric(_)
            | ClinicError::Text(_)
            | ClinicError::Uuid(_)
            | ClinicError::SeedSchema { .. } => ErrorKind::InvalidArgument,
            ClinicError::InvalidState(_) => ErrorKind::InvalidState,
            ClinicError::Forbidden(_) => ErrorKind::Forbidden,
            ClinicError::NotFound { .. } => ErrorKind::NotFound,
            ClinicError::Conflict(_) => ErrorKind::Conflict,
            ClinicError::StorageDirCreation(_)
            | ClinicError::FileWrite(_)
            | ClinicError::FileRead(_)
            | ClinicError::Serialization(_)
            | ClinicError::Deserialization(_)
            | ClinicError::LockPoisoned
            | ClinicError::AuditAppendFailed { .. } => ErrorKind::Internal,
        }
    }

    pub(crate) fn not_found(kind: &'static str, id: impl std::fmt::Display) -> Self {
        ClinicError::NotFound {
            kind,
            id: id.to_string(),
        }
    }
}

pub type ClinicResult<T> = std::result::Result<T, ClinicError>;
