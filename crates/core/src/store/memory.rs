use super::{newest_first, version_conflict, SubmissionStore, UserStore};
use crate::model::{AuditLogEntry, Clinic, NewAuditEntry, Submission, SubmissionFilter, User};
use crate::{ClinicError, ClinicResult};
use clinic_types::EmailAddress;
use clinic_uuid::{ShardableUuid, TimestampId};
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Default)]
struct State {
    clinics: HashMap<ShardableUuid, Clinic>,
    users: HashMap<ShardableUuid, User>,
    submissions: HashMap<ShardableUuid, Submission>,
    audit: HashMap<ShardableUuid, Vec<AuditLogEntry>>,
}

impl State {
    fn append_audit(&mut self, submission_id: ShardableUuid, entry: NewAuditEntry) -> AuditLogEntry {
        let trail = self.audit.entry(submission_id).or_default();
        let id = TimestampId::generate(trail.last().map(|e| &e.id));
        let entry = AuditLogEntry::from_new(id, submission_id, entry);
        trail.push(entry.clone());
        entry
    }
}

/// Process-local store. Record and audit writes happen under one write lock, so they are atomic.
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> ClinicResult<RwLockReadGuard<'_, State>> {
        self.state.read().map_err(|_| ClinicError::LockPoisoned)
    }

    fn write(&self) -> ClinicResult<RwLockWriteGuard<'_, State>> {
        self.state.write().map_err(|_| ClinicError::LockPoisoned)
    }
}

impl UserStore for MemoryStore {
    fn insert_clinic(&self, clinic: &Clinic) -> ClinicResult<()> {
        let mut state = self.write()?;
        if state.clinics.contains_key(&clinic.id) {
            return Err(ClinicError::Conflict(format!("clinic {} already exists", clinic.id)));
        }
        state.clinics.insert(clinic.id, clinic.clone());
        Ok(())
    }

    fn load_clinic(&self, id: &ShardableUuid) -> ClinicResult<Clinic> {
        self.read()?
            .clinics
            .get(id)
            .cloned()
            .ok_or_else(|| ClinicError::not_found("clinic", id))
    }

    fn list_clinics(&self) -> ClinicResult<Vec<Clinic>> {
        let mut clinics: Vec<Clinic> = self.read()?.clinics.values().cloned().collect();
        clinics.sort_by(|a, b| a.name.as_str().cmp(b.name.as_str()));
        Ok(clinics)
    }

    fn insert_user(&self, user: &User) -> ClinicResult<()> {
        let mut state = self.write()?;
        if state.users.values().any(|u| u.email == user.email) {
            return Err(ClinicError::Conflict(format!(
                "a user with email {} already exists",
                user.email
            )));
        }
        state.users.insert(user.id, user.clone());
        Ok(())
    }

    fn load_user(&self, id: &ShardableUuid) -> ClinicResult<User> {
        self.read()?
            .users
            .get(id)
            .cloned()
            .ok_or_else(|| ClinicError::not_found("user", id))
    }

    fn find_user_by_email(&self, email: &EmailAddress) -> ClinicResult<Option<User>> {
        Ok(self
            .read()?
            .users
            .values()
            .find(|u| &u.email == email)
            .cloned())
    }

    fn list_users(&self, clinic_id: Option<&ShardableUuid>) -> ClinicResult<Vec<User>> {
        let mut users: Vec<User> = self
            .read()?
            .users
            .values()
            .filter(|u| clinic_id.map_or(true, |c| u.in_clinic(c)))
            .cloned()
            .collect();
        users.sort_by(|a, b| a.email.as_str().cmp(b.email.as_str()));
        Ok(users)
    }
}

impl SubmissionStore for MemoryStore {
    fn insert_submission(
        &self,
        submission: &Submission,
        audit: NewAuditEntry,
    ) -> ClinicResult<AuditLogEntry> {
        let mut state = self.write()?;
        if state.submissions.contains_key(&submission.id) {
            return Err(ClinicError::Conflict(format!(
                "submission {} already exists",
                submission.id
            )));
        }
        state.submissions.insert(submission.id, submission.clone());
        Ok(state.append_audit(submission.id, audit))
    }

    fn commit_transition(
        &self,
        expected_version: u64,
        submission: &Submission,
        audit: NewAuditEntry,
    ) -> ClinicResult<AuditLogEntry> {
        let mut state = self.write()?;
        let stored = state
            .submissions
            .get_mut(&submission.id)
            .ok_or_else(|| ClinicError::not_found("submission", submission.id))?;

        if stored.version != expected_version {
            return Err(version_conflict(submission, expected_version, stored.version));
        }

        *stored = submission.clone();
        Ok(state.append_audit(submission.id, audit))
    }

    fn load_submission(&self, id: &ShardableUuid) -> ClinicResult<Submission> {
        self.read()?
            .submissions
            .get(id)
            .cloned()
            .ok_or_else(|| ClinicError::not_found("submission", id))
    }

    fn list_submissions(&self, filter: &SubmissionFilter) -> ClinicResult<Vec<Submission>> {
        let mut submissions: Vec<Submission> = self
            .read()?
            .submissions
            .values()
            .filter(|s| filter.matches(s))
            .cloned()
            .collect();
        newest_first(&mut submissions);
        Ok(submissions)
    }

    fn list_audit_entries(
        &self,
        submission_id: &ShardableUuid,
    ) -> ClinicResult<Vec<AuditLogEntry>> {
        let state = self.read()?;
        if !state.submissions.contains_key(submission_id) {
            return Err(ClinicError::not_found("submission", submission_id));
        }
        Ok(state.audit.get(submission_id).cloned().unwrap_or_default())
    }
}
