//! JSON-on-disk store.
//!
//! ## Storage Layout
//!
//! ```text
//! <data_dir>/
//!   clinics/<s1>/<s2>/<uuid>/clinic.json
//!   users/<s1>/<s2>/<uuid>/user.json
//!   submissions/<s1>/<s2>/<uuid>/
//!     submission.json   # current state, replaced via temp file + rename
//!     audit.jsonl       # append-only, one AuditLogEntry per line
//! ```
//!
//! where `s1` and `s2` are the first four hex characters of the UUID.
//!
//! Writers take a store-wide mutex, which serialises the version check and the write for every
//! record. It does not coordinate separate processes sharing a data directory.

use super::{newest_first, version_conflict, SubmissionStore, UserStore};
use crate::config::CoreConfig;
use crate::constants::{
    AUDIT_LOG_FILENAME, CLINIC_JSON_FILENAME, SUBMISSION_JSON_FILENAME, USER_JSON_FILENAME,
};
use crate::model::{AuditLogEntry, Clinic, NewAuditEntry, Submission, SubmissionFilter, User};
use crate::{ClinicError, ClinicResult};
use clinic_types::EmailAddress;
use clinic_uuid::{ShardableUuid, TimestampId};
use serde::{de::DeserializeOwned, Serialize};
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

pub struct FileStore {
    clinics_dir: PathBuf,
    users_dir: PathBuf,
    submissions_dir: PathBuf,
    write_lock: Mutex<()>,
}

impl FileStore {
    /// Opens (creating if needed) the record directories under `cfg.data_dir()`.
    ///
    /// # Errors
    ///
    /// Returns [`ClinicError::StorageDirCreation`] if a directory cannot be created.
    pub fn open(cfg: &CoreConfig) -> ClinicResult<Self> {
        let store = Self {
            clinics_dir: cfg.clinics_dir(),
            users_dir: cfg.users_dir(),
            submissions_dir: cfg.submissions_dir(),
            write_lock: Mutex::new(()),
        };

        for dir in [&store.clinics_dir, &store.users_dir, &store.submissions_dir] {
            fs::create_dir_all(dir).map_err(ClinicError::StorageDirCreation)?;
        }

        tracing::debug!("opened file store at {}", cfg.data_dir().display());
        Ok(store)
    }

    fn lock(&self) -> ClinicResult<MutexGuard<'_, ()>> {
        self.write_lock.lock().map_err(|_| ClinicError::LockPoisoned)
    }

    fn submission_dir(&self, id: &ShardableUuid) -> PathBuf {
        id.sharded_dir(&self.submissions_dir)
    }

    fn append_or_flag(
        &self,
        dir: &Path,
        submission_id: ShardableUuid,
        last: Option<&TimestampId>,
        audit: NewAuditEntry,
    ) -> ClinicResult<AuditLogEntry> {
        let entry = AuditLogEntry::from_new(TimestampId::generate(last), submission_id, audit);
        match append_audit(dir, &entry) {
            Ok(()) => Ok(entry),
            Err(source) => Err(ClinicError::AuditAppendFailed {
                submission_id,
                source: Box::new(source),
            }),
        }
    }
}

fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> ClinicResult<()> {
    let json = serde_json::to_vec_pretty(value).map_err(ClinicError::Serialization)?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json).map_err(ClinicError::FileWrite)?;
    fs::rename(&tmp, path).map_err(ClinicError::FileWrite)
}

fn read_json<T: DeserializeOwned>(
    path: &Path,
    kind: &'static str,
    id: &ShardableUuid,
) -> ClinicResult<T> {
    match fs::read_to_string(path) {
        Ok(contents) => serde_json::from_str(&contents).map_err(ClinicError::Deserialization),
        Err(e) if e.kind() == ErrorKind::NotFound => Err(ClinicError::not_found(kind, id)),
        Err(e) => Err(ClinicError::FileRead(e)),
    }
}

/// Creates a record's sharded directory and writes its JSON file, removing the directory again
/// if the write fails.
fn create_record<T: Serialize>(
    base: &Path,
    id: &ShardableUuid,
    filename: &str,
    kind: &str,
    value: &T,
) -> ClinicResult<PathBuf> {
    let dir = id.sharded_dir(base);
    if dir.exists() {
        return Err(ClinicError::Conflict(format!("{kind} {id} already exists")));
    }
    fs::create_dir_all(&dir).map_err(ClinicError::StorageDirCreation)?;

    if let Err(e) = write_json_atomic(&dir.join(filename), value) {
        if let Err(cleanup) = fs::remove_dir_all(&dir) {
            tracing::error!(
                "failed to remove partially written {kind} {}: {cleanup}",
                dir.display()
            );
        }
        return Err(e);
    }

    Ok(dir)
}

/// Reads every `<base>/<s1>/<s2>/<id>/<filename>`, skipping unreadable or unparsable records.
fn walk_records<T: DeserializeOwned>(base: &Path, filename: &str) -> Vec<T> {
    let mut records = Vec::new();

    let s1_iter = match fs::read_dir(base) {
        Ok(it) => it,
        Err(_) => return records,
    };

    for s1 in s1_iter.flatten() {
        let s1_path = s1.path();
        if !s1_path.is_dir() {
            continue;
        }

        let s2_iter = match fs::read_dir(&s1_path) {
            Ok(it) => it,
            Err(_) => continue,
        };

        for s2 in s2_iter.flatten() {
            let s2_path = s2.path();
            if !s2_path.is_dir() {
                continue;
            }

            let id_iter = match fs::read_dir(&s2_path) {
                Ok(it) => it,
                Err(_) => continue,
            };

            for id_ent in id_iter.flatten() {
                let record_path = id_ent.path().join(filename);
                if !record_path.is_file() {
                    continue;
                }

                match fs::read_to_string(&record_path)
                    .map_err(|e| e.to_string())
                    .and_then(|c| serde_json::from_str::<T>(&c).map_err(|e| e.to_string()))
                {
                    Ok(record) => records.push(record),
                    Err(e) => {
                        tracing::warn!("skipping unreadable record {}: {e}", record_path.display())
                    }
                }
            }
        }
    }

    records
}

fn append_audit(dir: &Path, entry: &AuditLogEntry) -> ClinicResult<()> {
    let mut line = serde_json::to_vec(entry).map_err(ClinicError::Serialization)?;
    line.push(b'\n');

    let path = dir.join(AUDIT_LOG_FILENAME);
    let mut file = OpenOptions::new()
        .create(true)
        .read(true)
        .append(true)
        .open(&path)
        .map_err(ClinicError::FileWrite)?;

    let mut existing = Vec::new();
    file.read_to_end(&mut existing)
        .map_err(ClinicError::FileRead)?;
    let intact = intact_len(&existing);
    if intact < existing.len() {
        tracing::warn!("dropping torn trailing line from {}", path.display());
        file.set_len(intact as u64).map_err(ClinicError::FileWrite)?;
    }

    let written = file
        .write_all(&line)
        .and_then(|()| file.sync_data());
    if let Err(e) = written {
        // Leave the log ending on a complete line.
        if let Err(trunc) = file.set_len(intact as u64) {
            tracing::warn!("failed to trim {} after write error: {}", path.display(), trunc);
        }
        return Err(ClinicError::FileWrite(e));
    }
    Ok(())
}

/// Length of the log up to and including its last newline.
fn intact_len(contents: &[u8]) -> usize {
    contents
        .iter()
        .rposition(|&b| b == b'\n')
        .map_or(0, |pos| pos + 1)
}

fn read_audit(dir: &Path) -> ClinicResult<Vec<AuditLogEntry>> {
    let path = dir.join(AUDIT_LOG_FILENAME);
    let contents = match fs::read(&path) {
        Ok(c) => c,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(ClinicError::FileRead(e)),
    };

    // An unterminated last line is an interrupted append; the next append trims it.
    let intact = intact_len(&contents);
    if intact < contents.len() {
        tracing::warn!("ignoring torn trailing line in {}", path.display());
    }
    let text = std::str::from_utf8(&contents[..intact])
        .map_err(|e| ClinicError::FileRead(std::io::Error::new(ErrorKind::InvalidData, e)))?;

    text.lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| serde_json::from_str(l).map_err(ClinicError::Deserialization))
        .collect()
}

impl UserStore for FileStore {
    fn insert_clinic(&self, clinic: &Clinic) -> ClinicResult<()> {
        let _guard = self.lock()?;
        create_record(
            &self.clinics_dir,
            &clinic.id,
            CLINIC_JSON_FILENAME,
            "clinic",
            clinic,
        )?;
        Ok(())
    }

    fn load_clinic(&self, id: &ShardableUuid) -> ClinicResult<Clinic> {
        read_json(
            &id.sharded_dir(&self.clinics_dir).join(CLINIC_JSON_FILENAME),
            "clinic",
            id,
        )
    }

    fn list_clinics(&self) -> ClinicResult<Vec<Clinic>> {
        let mut clinics: Vec<Clinic> = walk_records(&self.clinics_dir, CLINIC_JSON_FILENAME);
        clinics.sort_by(|a, b| a.name.as_str().cmp(b.name.as_str()));
        Ok(clinics)
    }

    fn insert_user(&self, user: &User) -> ClinicResult<()> {
        let _guard = self.lock()?;
        let existing: Vec<User> = walk_records(&self.users_dir, USER_JSON_FILENAME);
        if existing.iter().any(|u| u.email == user.email) {
            return Err(ClinicError::Conflict(format!(
                "a user with email {} already exists",
                user.email
            )));
        }
        create_record(&self.users_dir, &user.id, USER_JSON_FILENAME, "user", user)?;
        Ok(())
    }

    fn load_user(&self, id: &ShardableUuid) -> ClinicResult<User> {
        read_json(
            &id.sharded_dir(&self.users_dir).join(USER_JSON_FILENAME),
            "user",
            id,
        )
    }

    fn find_user_by_email(&self, email: &EmailAddress) -> ClinicResult<Option<User>> {
        Ok(walk_records::<User>(&self.users_dir, USER_JSON_FILENAME)
            .into_iter()
            .find(|u| &u.email == email))
    }

    fn list_users(&self, clinic_id: Option<&ShardableUuid>) -> ClinicResult<Vec<User>> {
        let mut users: Vec<User> = walk_records::<User>(&self.users_dir, USER_JSON_FILENAME)
            .into_iter()
            .filter(|u| clinic_id.map_or(true, |c| u.in_clinic(c)))
            .collect();
        users.sort_by(|a, b| a.email.as_str().cmp(b.email.as_str()));
        Ok(users)
    }
}

impl SubmissionStore for FileStore {
    fn insert_submission(
        &self,
        submission: &Submission,
        audit: NewAuditEntry,
    ) -> ClinicResult<AuditLogEntry> {
        let _guard = self.lock()?;
        let dir = create_record(
            &self.submissions_dir,
            &submission.id,
            SUBMISSION_JSON_FILENAME,
            "submission",
            submission,
        )?;
        self.append_or_flag(&dir, submission.id, None, audit)
    }

    fn commit_transition(
        &self,
        expected_version: u64,
        submission: &Submission,
        audit: NewAuditEntry,
    ) -> ClinicResult<AuditLogEntry> {
        let _guard = self.lock()?;
        let dir = self.submission_dir(&submission.id);
        let path = dir.join(SUBMISSION_JSON_FILENAME);

        let stored: Submission = read_json(&path, "submission", &submission.id)?;
        if stored.version != expected_version {
            return Err(version_conflict(submission, expected_version, stored.version));
        }

        // Read the trail before writing so an unreadable trail aborts the whole transition.
        let trail = read_audit(&dir)?;

        write_json_atomic(&path, submission)?;
        self.append_or_flag(
            &dir,
            submission.id,
            trail.last().map(|e| &e.id),
            audit,
        )
    }

    fn load_submission(&self, id: &ShardableUuid) -> ClinicResult<Submission> {
        read_json(
            &self.submission_dir(id).join(SUBMISSION_JSON_FILENAME),
            "submission",
            id,
        )
    }

    fn list_submissions(&self, filter: &SubmissionFilter) -> ClinicResult<Vec<Submission>> {
        let mut submissions: Vec<Submission> =
            walk_records::<Submission>(&self.submissions_dir, SUBMISSION_JSON_FILENAME)
                .into_iter()
                .filter(|s| filter.matches(s))
                .collect();
        newest_first(&mut submissions);
        Ok(submissions)
    }

    fn list_audit_entries(
        &self,
        submission_id: &ShardableUuid,
    ) -> ClinicResult<Vec<AuditLogEntry>> {
        let dir = self.submission_dir(submission_id);
        if !dir.join(SUBMISSION_JSON_FILENAME).is_file() {
            return Err(ClinicError::not_found("submission", submission_id));
        }
        read_audit(&dir)
    }
}
