//! Storage seams for clinics, users, submissions and audit entries.
//!
//! Services are handed a store rather than reaching for a process-wide client. Two backends
//! ship with the crate:
//! - [`MemoryStore`]: maps behind a single lock, for tests and throwaway servers.
//! - [`FileStore`]: JSON records in sharded directories under the configured data directory.
//!
//! ## Transaction boundary
//!
//! A lifecycle step changes the submission *and* appends exactly one audit entry.
//! [`SubmissionStore::insert_submission`] and [`SubmissionStore::commit_transition`] take both
//! halves together so a backend can make them atomic. Backends that cannot must report a failed
//! audit append after a successful record write as [`ClinicError::AuditAppendFailed`].
//!
//! `commit_transition` is also where concurrent transitions on one submission are serialised:
//! the write is refused with [`ClinicError::Conflict`] unless the stored version still equals
//! the version the caller loaded.

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use crate::config::{CoreConfig, StoreKind};
use crate::model::{AuditLogEntry, Clinic, NewAuditEntry, Submission, SubmissionFilter, User};
use crate::{ClinicError, ClinicResult};
use clinic_types::EmailAddress;
use clinic_uuid::ShardableUuid;
use std::sync::Arc;

pub trait UserStore: Send + Sync {
    fn insert_clinic(&self, clinic: &Clinic) -> ClinicResult<()>;

    fn load_clinic(&self, id: &ShardableUuid) -> ClinicResult<Clinic>;

    fn list_clinics(&self) -> ClinicResult<Vec<Clinic>>;

    /// Fails with [`ClinicError::Conflict`] if another user already has the same email.
    fn insert_user(&self, user: &User) -> ClinicResult<()>;

    fn load_user(&self, id: &ShardableUuid) -> ClinicResult<User>;

    fn find_user_by_email(&self, email: &EmailAddress) -> ClinicResult<Option<User>>;

    /// All users, or only those of `clinic_id` when given.
    fn list_users(&self, clinic_id: Option<&ShardableUuid>) -> ClinicResult<Vec<User>>;
}

pub trait SubmissionStore: Send + Sync {
    /// Stores a new submission and its `created` audit entry.
    fn insert_submission(
        &self,
        submission: &Submission,
        audit: NewAuditEntry,
    ) -> ClinicResult<AuditLogEntry>;

    /// Replaces a submission whose stored version is `expected_version` and appends `audit`.
    fn commit_transition(
        &self,
        expected_version: u64,
        submission: &Submission,
        audit: NewAuditEntry,
    ) -> ClinicResult<AuditLogEntry>;

    fn load_submission(&self, id: &ShardableUuid) -> ClinicResult<Submission>;

    /// Matching submissions, newest first.
    fn list_submissions(&self, filter: &SubmissionFilter) -> ClinicResult<Vec<Submission>>;

    /// The audit trail of one submission, oldest first.
    fn list_audit_entries(&self, submission_id: &ShardableUuid)
        -> ClinicResult<Vec<AuditLogEntry>>;
}

/// A backend that serves both halves; what the HTTP layer and CLI hold.
pub trait ClinicStore: UserStore + SubmissionStore {}

impl<T: UserStore + SubmissionStore> ClinicStore for T {}

/// Opens the backend selected by `cfg`.
///
/// # Errors
///
/// Returns [`ClinicError::StorageDirCreation`] if the file store's directories cannot be created.
pub fn open_store(cfg: &CoreConfig) -> ClinicResult<Arc<dyn ClinicStore>> {
    match cfg.store_kind() {
        StoreKind::Memory => Ok(Arc::new(MemoryStore::new())),
        StoreKind::File => Ok(Arc::new(FileStore::open(cfg)?)),
    }
}

fn newest_first(submissions: &mut [Submission]) {
    submissions.sort_by(|a, b| {
        b.created_date
            .cmp(&a.created_date)
            .then_with(|| b.id.cmp(&a.id))
    });
}

fn version_conflict(submission: &Submission, expected: u64, found: u64) -> ClinicError {
    ClinicError::Conflict(format!(
        "submission {} was modified concurrently (expected version {expected}, found {found})",
        submission.id
    ))
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::model::{
        AuditEventType, Clinic, ExamType, NewAuditEntry, Role, Submission, SubmissionStatus, User,
    };
    use crate::nric::Nric;
    use chrono::Utc;
    use clinic_types::{EmailAddress, NonEmptyText};
    use clinic_uuid::ShardableUuid;

    pub fn clinic(name: &str) -> Clinic {
        Clinic {
            id: ShardableUuid::new(),
            name: NonEmptyText::new(name).unwrap(),
            hci_code: None,
            created_date: Utc::now(),
        }
    }

    pub fn nurse(clinic: &Clinic) -> User {
        let id = ShardableUuid::new();
        User {
            id,
            name: NonEmptyText::new("Nurse Lim").unwrap(),
            email: EmailAddress::parse(format!("nurse-{id}@clinic.sg")).unwrap(),
            role: Role::Nurse,
            clinic_id: Some(clinic.id),
            created_date: Utc::now(),
        }
    }

    pub fn submission(creator: &User) -> Submission {
        let now = Utc::now();
        Submission {
            id: ShardableUuid::new(),
            clinic_id: creator.clinic_id.expect("creator has clinic"),
            created_by: creator.id,
            approved_by: None,
            exam_type: ExamType::WorkPermit,
            patient_name: NonEmptyText::new("Juan Dela Cruz").unwrap(),
            patient_nric: Nric::parse("G1234567X").unwrap(),
            form_data: serde_json::json!({ "height_cm": 170 }),
            status: SubmissionStatus::Draft,
            rejected_reason: None,
            approved_date: None,
            submitted_date: None,
            created_date: now,
            updated_date: now,
            version: 1,
        }
    }

    pub fn audit(actor: &User) -> NewAuditEntry {
        NewAuditEntry {
            user_id: actor.id,
            event_type: AuditEventType::Created,
            changes: serde_json::json!({ "status": "draft" }),
            timestamp: Utc::now(),
        }
    }
}
