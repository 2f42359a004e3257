//! Constants used throughout the clinic core crate.
//!
//! Path and filename constants live here so the file store and its tests agree on layout.

/// Directory name for clinic records.
pub const CLINICS_DIR_NAME: &str = "clinics";

/// Directory name for user records.
pub const USERS_DIR_NAME: &str = "users";

/// Directory name for submission records.
pub const SUBMISSIONS_DIR_NAME: &str = "submissions";

/// Default directory for clinic data when no explicit directory is configured.
pub const DEFAULT_CLINIC_DATA_DIR: &str = "clinic_data";

/// Filename of a clinic record inside its sharded directory.
pub const CLINIC_JSON_FILENAME: &str = "clinic.json";

/// Filename of a user record inside its sharded directory.
pub const USER_JSON_FILENAME: &str = "user.json";

/// Filename of a submission record inside its sharded directory.
pub const SUBMISSION_JSON_FILENAME: &str = "submission.json";

/// Append-only audit trail, one JSON entry per line, next to `submission.json`.
pub const AUDIT_LOG_FILENAME: &str = "audit.jsonl";

/// Upper bound on the serialised size of a submission's free-form exam data.
pub const DEFAULT_MAX_FORM_DATA_BYTES: usize = 64 * 1024;
