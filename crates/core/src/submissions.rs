//! Submission service: the lifecycle rules wired to a store.
//!
//! Each mutating operation loads the submission, asks [`SubmissionLifecycle`] whether the step
//! is allowed, applies the resulting [`Transition`] and commits the record together with one
//! audit entry. A commit that persisted the record but lost its audit entry is logged and
//! returned as [`ClinicError::AuditAppendFailed`].

use crate::config::CoreConfig;
use crate::lifecycle::{CreateMode, SubmissionLifecycle, Transition};
use crate::model::{
    AuditLogEntry, ExamType, NewAuditEntry, Submission, SubmissionFilter, SubmissionStatus, User,
};
use crate::nric::Nric;
use crate::store::SubmissionStore;
use crate::validation::validate_form_data;
use crate::{ClinicError, ClinicResult};
use chrono::{DateTime, Utc};
use clinic_types::NonEmptyText;
use clinic_uuid::ShardableUuid;
use serde_json::{json, Map, Value};
use std::sync::Arc;

/// Contents of a new submission.
#[derive(Clone, Debug)]
pub struct NewSubmission {
    pub exam_type: ExamType,
    pub patient_name: NonEmptyText,
    pub patient_nric: Nric,
    pub form_data: Value,
}

/// Edits to a draft. `None` leaves the field unchanged.
#[derive(Clone, Debug, Default)]
pub struct SubmissionPatch {
    pub exam_type: Option<ExamType>,
    pub patient_name: Option<NonEmptyText>,
    pub patient_nric: Option<Nric>,
    pub form_data: Option<Value>,
}

impl SubmissionPatch {
    pub fn is_empty(&self) -> bool {
        self.exam_type.is_none()
            && self.patient_name.is_none()
            && self.patient_nric.is_none()
            && self.form_data.is_none()
    }

    /// Applies the patch and returns the changed fields for the audit entry. The NRIC is
    /// recorded masked.
    fn apply(self, submission: &mut Submission) -> Map<String, Value> {
        let mut changes = Map::new();
        if let Some(exam_type) = self.exam_type {
            changes.insert("exam_type".into(), json!(exam_type));
            submission.exam_type = exam_type;
        }
        if let Some(name) = self.patient_name {
            changes.insert("patient_name".into(), json!(name));
            submission.patient_name = name;
        }
        if let Some(nric) = self.patient_nric {
            changes.insert("patient_nric".into(), json!(nric.masked()));
            submission.patient_nric = nric;
        }
        if let Some(form_data) = self.form_data {
            changes.insert("form_data".into(), form_data.clone());
            submission.form_data = form_data;
        }
        changes
    }
}

#[derive(Clone, Debug)]
pub struct SubmissionService<S: ?Sized> {
    cfg: Arc<CoreConfig>,
    store: Arc<S>,
}

impl<S: SubmissionStore + ?Sized> SubmissionService<S> {
    pub fn new(cfg: Arc<CoreConfig>, store: Arc<S>) -> Self {
        Self { cfg, store }
    }

    /// Creates a submission in the actor's clinic.
    ///
    /// The starting status follows [`SubmissionLifecycle::create`].
    ///
    /// # Errors
    ///
    /// - [`ClinicError::Forbidden`] for admins, or for a nurse/doctor without a clinic.
    /// - [`ClinicError::InvalidArgument`] if `form_data` is not an object or is too large.
    pub fn create(
        &self,
        actor: &User,
        new: NewSubmission,
        mode: CreateMode,
    ) -> ClinicResult<Submission> {
        let now = Utc::now();
        let transition = SubmissionLifecycle::create(actor, mode, now)?;
        let clinic_id = actor.clinic_id.ok_or_else(|| {
            ClinicError::Forbidden("user is not assigned to a clinic".into())
        })?;
        validate_form_data(&new.form_data, self.cfg.max_form_data_bytes())?;

        let mut submission = Submission {
            id: ShardableUuid::new(),
            clinic_id,
            created_by: actor.id,
            approved_by: None,
            exam_type: new.exam_type,
            patient_name: new.patient_name,
            patient_nric: new.patient_nric,
            form_data: new.form_data,
            status: SubmissionStatus::Draft,
            rejected_reason: None,
            approved_date: None,
            submitted_date: None,
            created_date: now,
            updated_date: now,
            version: 1,
        };
        transition.apply(&mut submission, now);

        let mut changes = transition.changes();
        changes.insert("exam_type".into(), json!(submission.exam_type));
        changes.insert("patient_nric".into(), json!(submission.patient_nric.masked()));

        let audit = audit_entry(actor, &transition, changes, now);
        self.store
            .insert_submission(&submission, audit)
            .inspect_err(log_audit_failure)?;

        tracing::info!(
            submission = %submission.id,
            actor = %actor.id,
            status = %submission.status,
            "submission created"
        );
        Ok(submission)
    }

    /// Loads a submission the actor may see: admins see everything, others their own clinic.
    ///
    /// # Errors
    ///
    /// [`ClinicError::NotFound`] if missing, [`ClinicError::Forbidden`] if in another clinic.
    pub fn get(&self, actor: &User, id: &ShardableUuid) -> ClinicResult<Submission> {
        let submission = self.store.load_submission(id)?;
        ensure_visible(actor, &submission)?;
        Ok(submission)
    }

    /// Lists submissions visible to the actor, newest first.
    ///
    /// The clinic in `filter` is overridden with the actor's own clinic unless the actor is an
    /// admin.
    pub fn list(&self, actor: &User, mut filter: SubmissionFilter) -> ClinicResult<Vec<Submission>> {
        if !actor.is_admin() {
            let clinic_id = actor.clinic_id.ok_or_else(|| {
                ClinicError::Forbidden("user is not assigned to a clinic".into())
            })?;
            filter.clinic_id = Some(clinic_id);
        }
        self.store.list_submissions(&filter)
    }

    /// Edits a draft.
    ///
    /// # Errors
    ///
    /// As for [`SubmissionLifecycle::update`]; [`ClinicError::InvalidArgument`] for an empty
    /// patch or invalid form data.
    pub fn update(
        &self,
        actor: &User,
        id: &ShardableUuid,
        patch: SubmissionPatch,
    ) -> ClinicResult<Submission> {
        let current = self.get(actor, id)?;
        let transition = SubmissionLifecycle::update(&current, actor)?;

        if patch.is_empty() {
            return Err(ClinicError::InvalidArgument("nothing to update".into()));
        }
        if let Some(form_data) = &patch.form_data {
            validate_form_data(form_data, self.cfg.max_form_data_bytes())?;
        }

        let now = Utc::now();
        let mut next = current.clone();
        let mut changes = patch.apply(&mut next);
        changes.extend(transition.changes());
        transition.apply(&mut next, now);

        self.commit(actor, &current, next, &transition, changes, now)
    }

    /// Files a draft; see [`SubmissionLifecycle::submit`].
    pub fn submit(
        &self,
        actor: &User,
        id: &ShardableUuid,
        route_for_approval: bool,
    ) -> ClinicResult<Submission> {
        let current = self.get(actor, id)?;
        let now = Utc::now();
        let transition = SubmissionLifecycle::submit(&current, actor, route_for_approval, now)?;
        self.apply_transition(actor, current, transition, now)
    }

    /// Approves a pending submission; see [`SubmissionLifecycle::approve`].
    pub fn approve(&self, actor: &User, id: &ShardableUuid) -> ClinicResult<Submission> {
        let current = self.store.load_submission(id)?;
        let now = Utc::now();
        let transition = SubmissionLifecycle::approve(&current, actor, now)?;
        self.apply_transition(actor, current, transition, now)
    }

    /// Rejects a pending submission; see [`SubmissionLifecycle::reject`].
    pub fn reject(&self, actor: &User, id: &ShardableUuid, reason: &str) -> ClinicResult<Submission> {
        let current = self.store.load_submission(id)?;
        let now = Utc::now();
        let transition = SubmissionLifecycle::reject(&current, actor, reason)?;
        self.apply_transition(actor, current, transition, now)
    }

    /// The audit trail of a submission the actor may see, oldest first.
    pub fn audit_trail(&self, actor: &User, id: &ShardableUuid) -> ClinicResult<Vec<AuditLogEntry>> {
        self.get(actor, id)?;
        self.store.list_audit_entries(id)
    }

    fn apply_transition(
        &self,
        actor: &User,
        current: Submission,
        transition: Transition,
        now: DateTime<Utc>,
    ) -> ClinicResult<Submission> {
        let mut next = current.clone();
        transition.apply(&mut next, now);
        let changes = transition.changes();
        self.commit(actor, &current, next, &transition, changes, now)
    }

    fn commit(
        &self,
        actor: &User,
        current: &Submission,
        mut next: Submission,
        transition: &Transition,
        changes: Map<String, Value>,
        now: DateTime<Utc>,
    ) -> ClinicResult<Submission> {
        next.version = current.version + 1;
        let audit = audit_entry(actor, transition, changes, now);

        self.store
            .commit_transition(current.version, &next, audit)
            .inspect_err(log_audit_failure)?;

        tracing::info!(
            submission = %next.id,
            actor = %actor.id,
            from = %current.status,
            to = %next.status,
            event = %transition.event,
            "submission transition committed"
        );
        Ok(next)
    }
}

fn audit_entry(
    actor: &User,
    transition: &Transition,
    changes: Map<String, Value>,
    now: DateTime<Utc>,
) -> NewAuditEntry {
    NewAuditEntry {
        user_id: actor.id,
        event_type: transition.event,
        changes: Value::Object(changes),
        timestamp: now,
    }
}

fn ensure_visible(actor: &User, submission: &Submission) -> ClinicResult<()> {
    if actor.is_admin() || actor.in_clinic(&submission.clinic_id) {
        Ok(())
    } else {
        Err(ClinicError::Forbidden(
            "submission belongs to another clinic".into(),
        ))
    }
}

fn log_audit_failure(err: &ClinicError) {
    if let ClinicError::AuditAppendFailed {
        submission_id,
        source,
    } = err
    {
        tracing::error!(
            submission = %submission_id,
            "status persisted without its audit entry: {source}"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreKind;
    use crate::model::{AuditEventType, Role};
    use crate::store::{MemoryStore, SubmissionStore};
    use clinic_types::EmailAddress;
    use std::path::PathBuf;

    struct Fixture {
        service: SubmissionService<MemoryStore>,
        store: Arc<MemoryStore>,
        nurse: User,
        doctor: User,
        admin: User,
        outsider: User,
    }

    fn user(role: Role, clinic_id: Option<ShardableUuid>) -> User {
        let id = ShardableUuid::new();
        User {
            id,
            name: NonEmptyText::new(format!("{role} {id}")).unwrap(),
            email: EmailAddress::parse(format!("{role}-{id}@clinic.sg")).unwrap(),
            role,
            clinic_id,
            created_date: Utc::now(),
        }
    }

    fn fixture() -> Fixture {
        let cfg = Arc::new(CoreConfig::new(PathBuf::new(), StoreKind::Memory).unwrap());
        let store = Arc::new(MemoryStore::new());
        let clinic = ShardableUuid::new();
        Fixture {
            service: SubmissionService::new(cfg, store.clone()),
            store,
            nurse: user(Role::Nurse, Some(clinic)),
            doctor: user(Role::Doctor, Some(clinic)),
            admin: user(Role::Admin, None),
            outsider: user(Role::Doctor, Some(ShardableUuid::new())),
        }
    }

    fn new_submission() -> NewSubmission {
        NewSubmission {
            exam_type: ExamType::SixMonthlyMdw,
            patient_name: NonEmptyText::new("Maria Santos").unwrap(),
            patient_nric: Nric::parse("F1234567N").unwrap(),
            form_data: json!({ "pregnancy_test": "negative" }),
        }
    }

    #[test]
    fn routed_nurse_submission_is_pending_with_created_audit() {
        let f = fixture();
        let s = f
            .service
            .create(&f.nurse, new_submission(), CreateMode::routed())
            .unwrap();
        assert_eq!(s.status, SubmissionStatus::PendingApproval);
        assert_eq!(s.approved_by, None);

        let trail = f.service.audit_trail(&f.nurse, &s.id).unwrap();
        assert_eq!(trail.len(), 1);
        assert_eq!(trail[0].event_type, AuditEventType::Created);
        assert_eq!(trail[0].user_id, f.nurse.id);
        assert_eq!(trail[0].changes["status"], json!("pending_approval"));
        assert_eq!(trail[0].changes["patient_nric"], json!("F****567N"));
    }

    #[test]
    fn doctor_submission_is_submitted_immediately() {
        let f = fixture();
        let s = f
            .service
            .create(&f.doctor, new_submission(), CreateMode::routed())
            .unwrap();
        assert_eq!(s.status, SubmissionStatus::Submitted);
        assert_eq!(s.approved_by, Some(f.doctor.id));
        assert!(s.approved_date.is_some());
        assert_eq!(s.approved_date, s.submitted_date);
    }

    #[test]
    fn approve_then_approve_again_fails() {
        let f = fixture();
        let s = f
            .service
            .create(&f.nurse, new_submission(), CreateMode::routed())
            .unwrap();

        let approved = f.service.approve(&f.doctor, &s.id).unwrap();
        assert_eq!(approved.status, SubmissionStatus::Submitted);
        assert_eq!(approved.approved_by, Some(f.doctor.id));
        assert_eq!(approved.version, 2);

        let err = f.service.approve(&f.doctor, &s.id).expect_err("second approval");
        assert!(matches!(err, ClinicError::InvalidState(_)));

        let trail = f.service.audit_trail(&f.doctor, &s.id).unwrap();
        let events: Vec<_> = trail.iter().map(|e| e.event_type).collect();
        assert_eq!(events, vec![AuditEventType::Created, AuditEventType::Approved]);
    }

    #[test]
    fn reject_keeps_exact_reason_and_requires_one() {
        let f = fixture();
        let s = f
            .service
            .create(&f.nurse, new_submission(), CreateMode::routed())
            .unwrap();

        let err = f.service.reject(&f.doctor, &s.id, "").expect_err("empty reason");
        assert!(matches!(err, ClinicError::InvalidArgument(_)));
        assert_eq!(f.service.audit_trail(&f.doctor, &s.id).unwrap().len(), 1);

        let rejected = f
            .service
            .reject(&f.doctor, &s.id, "Weight not recorded")
            .unwrap();
        assert_eq!(rejected.status, SubmissionStatus::Rejected);
        assert_eq!(
            rejected.rejected_reason.as_ref().map(NonEmptyText::as_str),
            Some("Weight not recorded")
        );
        assert_eq!(
            f.store.load_submission(&s.id).unwrap().status,
            SubmissionStatus::Rejected
        );
    }

    #[test]
    fn review_from_other_clinic_is_forbidden() {
        let f = fixture();
        let s = f
            .service
            .create(&f.nurse, new_submission(), CreateMode::routed())
            .unwrap();
        assert!(matches!(
            f.service.approve(&f.outsider, &s.id),
            Err(ClinicError::Forbidden(_))
        ));
        assert!(matches!(
            f.service.get(&f.outsider, &s.id),
            Err(ClinicError::Forbidden(_))
        ));
    }

    #[test]
    fn draft_update_then_submit() {
        let f = fixture();
        let s = f
            .service
            .create(&f.nurse, new_submission(), CreateMode::draft())
            .unwrap();
        assert_eq!(s.status, SubmissionStatus::Draft);

        let patch = SubmissionPatch {
            patient_name: Some(NonEmptyText::new("Maria C. Santos").unwrap()),
            ..SubmissionPatch::default()
        };
        let updated = f.service.update(&f.nurse, &s.id, patch).unwrap();
        assert_eq!(updated.status, SubmissionStatus::Draft);
        assert_eq!(updated.patient_name.as_str(), "Maria C. Santos");

        let submitted = f.service.submit(&f.nurse, &s.id, true).unwrap();
        assert_eq!(submitted.status, SubmissionStatus::PendingApproval);

        let trail = f.service.audit_trail(&f.nurse, &s.id).unwrap();
        let events: Vec<_> = trail.iter().map(|e| e.event_type).collect();
        assert_eq!(
            events,
            vec![
                AuditEventType::Created,
                AuditEventType::Updated,
                AuditEventType::Submitted
            ]
        );
        assert_eq!(trail[1].changes["patient_name"], json!("Maria C. Santos"));
    }

    #[test]
    fn update_of_submitted_is_invalid_state_even_for_admin() {
        let f = fixture();
        let s = f
            .service
            .create(&f.doctor, new_submission(), CreateMode::direct())
            .unwrap();
        let patch = SubmissionPatch {
            exam_type: Some(ExamType::WorkPermit),
            ..SubmissionPatch::default()
        };
        for actor in [&f.doctor, &f.admin] {
            let err = f
                .service
                .update(actor, &s.id, patch.clone())
                .expect_err("submitted is frozen");
            assert!(matches!(err, ClinicError::InvalidState(_)));
        }

        // Visibility is checked before status.
        assert!(matches!(
            f.service.update(&f.outsider, &s.id, patch),
            Err(ClinicError::Forbidden(_))
        ));
    }

    #[test]
    fn update_by_other_clinician_is_forbidden() {
        let f = fixture();
        let s = f
            .service
            .create(&f.nurse, new_submission(), CreateMode::draft())
            .unwrap();
        let patch = SubmissionPatch {
            form_data: Some(json!({ "notes": "edited" })),
            ..SubmissionPatch::default()
        };
        assert!(matches!(
            f.service.update(&f.doctor, &s.id, patch.clone()),
            Err(ClinicError::Forbidden(_))
        ));
        assert!(f.service.update(&f.admin, &s.id, patch).is_ok());
    }

    #[test]
    fn empty_patch_and_bad_form_data_are_invalid_arguments() {
        let f = fixture();
        let s = f
            .service
            .create(&f.nurse, new_submission(), CreateMode::draft())
            .unwrap();
        assert!(matches!(
            f.service.update(&f.nurse, &s.id, SubmissionPatch::default()),
            Err(ClinicError::InvalidArgument(_))
        ));

        let mut bad = new_submission();
        bad.form_data = json!(["not", "an", "object"]);
        assert!(matches!(
            f.service.create(&f.nurse, bad, CreateMode::draft()),
            Err(ClinicError::InvalidArgument(_))
        ));
    }

    #[test]
    fn form_data_over_configured_limit_is_rejected() {
        let f = fixture();
        let cfg = CoreConfig::new(PathBuf::new(), StoreKind::Memory)
            .unwrap()
            .with_max_form_data_bytes(32);
        let service = SubmissionService::new(Arc::new(cfg), f.store.clone());

        let mut big = new_submission();
        big.form_data = json!({ "remarks": "x".repeat(64) });
        assert!(matches!(
            service.create(&f.nurse, big, CreateMode::draft()),
            Err(ClinicError::InvalidArgument(_))
        ));
        assert!(service
            .create(&f.nurse, new_submission(), CreateMode::draft())
            .is_ok());
    }

    #[test]
    fn admin_cannot_create_but_lists_everything() {
        let f = fixture();
        assert!(matches!(
            f.service.create(&f.admin, new_submission(), CreateMode::direct()),
            Err(ClinicError::Forbidden(_))
        ));

        f.service
            .create(&f.nurse, new_submission(), CreateMode::routed())
            .unwrap();
        let outsider_nurse = user(Role::Nurse, f.outsider.clinic_id);
        f.service
            .create(&outsider_nurse, new_submission(), CreateMode::routed())
            .unwrap();

        assert_eq!(
            f.service
                .list(&f.admin, SubmissionFilter::default())
                .unwrap()
                .len(),
            2
        );
        assert_eq!(
            f.service
                .list(&f.doctor, SubmissionFilter::default())
                .unwrap()
                .len(),
            1
        );

        let pending = SubmissionFilter {
            status: Some(SubmissionStatus::PendingApproval),
            ..SubmissionFilter::default()
        };
        assert_eq!(f.service.list(&f.outsider, pending).unwrap().len(), 1);
    }

    /// Persists the record through the inner store and then reports a lost audit entry.
    struct LosesAudit(MemoryStore);

    impl SubmissionStore for LosesAudit {
        fn insert_submission(
            &self,
            submission: &Submission,
            audit: NewAuditEntry,
        ) -> ClinicResult<AuditLogEntry> {
            self.0.insert_submission(submission, audit)
        }

        fn commit_transition(
            &self,
            expected_version: u64,
            submission: &Submission,
            audit: NewAuditEntry,
        ) -> ClinicResult<AuditLogEntry> {
            self.0.commit_transition(expected_version, submission, audit)?;
            Err(ClinicError::AuditAppendFailed {
                submission_id: submission.id,
                source: Box::new(ClinicError::FileWrite(std::io::Error::other("disk full"))),
            })
        }

        fn load_submission(&self, id: &ShardableUuid) -> ClinicResult<Submission> {
            self.0.load_submission(id)
        }

        fn list_submissions(&self, filter: &SubmissionFilter) -> ClinicResult<Vec<Submission>> {
            self.0.list_submissions(filter)
        }

        fn list_audit_entries(
            &self,
            submission_id: &ShardableUuid,
        ) -> ClinicResult<Vec<AuditLogEntry>> {
            self.0.list_audit_entries(submission_id)
        }
    }

    #[test]
    fn lost_audit_entry_is_surfaced_not_swallowed() {
        let f = fixture();
        let cfg = Arc::new(CoreConfig::new(PathBuf::new(), StoreKind::Memory).unwrap());
        let service = SubmissionService::new(cfg, Arc::new(LosesAudit(MemoryStore::new())));

        let s = service
            .create(&f.nurse, new_submission(), CreateMode::routed())
            .unwrap();
        let err = service.approve(&f.doctor, &s.id).expect_err("audit lost");
        assert!(matches!(err, ClinicError::AuditAppendFailed { .. }));
    }
}
