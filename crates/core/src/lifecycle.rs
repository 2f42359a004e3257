//! Submission approval lifecycle.
//!
//! ```text
//!            create(draft)                submit / create(nurse, routed)
//!   (none) ───────────────► draft ─────────────────────────────► pending_approval
//!     │                     │  ▲ update                            │        │
//!     │                     └──┘                           approve │        │ reject
//!     │ create(doctor | unrouted)                                  ▼        ▼
//!     └──────────────────────────────────────────────────────► submitted  rejected
//! ```
//!
//! Every function here is pure: it inspects the actor and the current record and returns a
//! [`Transition`] describing the new status, the fields to set and the audit event to append.
//! Applying the transition and persisting it together with its audit entry is the caller's job
//! (see [`crate::submissions::SubmissionService`]).

use crate::model::{AuditEventType, Role, Submission, SubmissionStatus, User};
use crate::{ClinicError, ClinicResult};
use chrono::{DateTime, Utc};
use clinic_types::NonEmptyText;
use clinic_uuid::ShardableUuid;
use serde_json::{json, Map, Value};

/// How a new submission should enter the lifecycle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CreateMode {
    /// Save without submitting. Takes precedence over routing.
    pub save_as_draft: bool,
    /// Ask a doctor to approve first. Only honoured for nurses.
    pub route_for_approval: bool,
}

impl CreateMode {
    pub fn draft() -> Self {
        Self {
            save_as_draft: true,
            route_for_approval: false,
        }
    }

    pub fn routed() -> Self {
        Self {
            save_as_draft: false,
            route_for_approval: true,
        }
    }

    pub fn direct() -> Self {
        Self::default()
    }
}

/// Approval stamp written when a submission lands on `submitted`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Approval {
    pub approved_by: ShardableUuid,
    pub approved_date: DateTime<Utc>,
    pub submitted_date: DateTime<Utc>,
}

/// The outcome of a permitted lifecycle step.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transition {
    pub status: SubmissionStatus,
    pub approval: Option<Approval>,
    pub rejected_reason: Option<NonEmptyText>,
    pub event: AuditEventType,
}

impl Transition {
    fn to(status: SubmissionStatus, event: AuditEventType) -> Self {
        Self {
            status,
            approval: None,
            rejected_reason: None,
            event,
        }
    }

    fn submitted_by(actor: &User, now: DateTime<Utc>, event: AuditEventType) -> Self {
        Self {
            status: SubmissionStatus::Submitted,
            approval: Some(Approval {
                approved_by: actor.id,
                approved_date: now,
                submitted_date: now,
            }),
            rejected_reason: None,
            event,
        }
    }

    /// Writes the transition's fields onto `submission`. Fields the transition does not own are
    /// left untouched, so an earlier rejection reason is never cleared.
    pub fn apply(&self, submission: &mut Submission, now: DateTime<Utc>) {
        submission.status = self.status;
        if let Some(approval) = &self.approval {
            submission.approved_by = Some(approval.approved_by);
            submission.approved_date = Some(approval.approved_date);
            submission.submitted_date = Some(approval.submitted_date);
        }
        if let Some(reason) = &self.rejected_reason {
            submission.rejected_reason = Some(reason.clone());
        }
        submission.updated_date = now;
    }

    /// The field changes as a JSON object, for the audit entry.
    pub fn changes(&self) -> Map<String, Value> {
        let mut changes = Map::new();
        changes.insert("status".into(), json!(self.status));
        if let Some(approval) = &self.approval {
            changes.insert("approved_by".into(), json!(approval.approved_by));
            changes.insert("approved_date".into(), json!(approval.approved_date));
            changes.insert("submitted_date".into(), json!(approval.submitted_date));
        }
        if let Some(reason) = &self.rejected_reason {
            changes.insert("rejected_reason".into(), json!(reason));
        }
        changes
    }
}

/// Where a non-draft submission goes when `actor` files it.
fn filing_transition(
    actor: &User,
    route_for_approval: bool,
    now: DateTime<Utc>,
    event: AuditEventType,
) -> Transition {
    if actor.role == Role::Nurse && route_for_approval {
        Transition::to(SubmissionStatus::PendingApproval, event)
    } else {
        Transition::submitted_by(actor, now, event)
    }
}

fn require_reviewer(submission: &Submission, actor: &User, action: &str) -> ClinicResult<()> {
    if actor.role != Role::Doctor {
        return Err(ClinicError::Forbidden(format!(
            "only doctors can {action} submissions"
        )));
    }
    if !actor.in_clinic(&submission.clinic_id) {
        return Err(ClinicError::Forbidden(format!(
            "cannot {action} a submission from another clinic"
        )));
    }
    if submission.status != SubmissionStatus::PendingApproval {
        return Err(ClinicError::InvalidState(format!(
            "cannot {action} a submission that is {}",
            submission.status
        )));
    }
    Ok(())
}

/// Namespace for the lifecycle rules.
pub struct SubmissionLifecycle;

impl SubmissionLifecycle {
    /// Status a brand-new submission starts in.
    ///
    /// - draft flag set: `draft`
    /// - doctor, or nurse without routing: `submitted`, approved by the actor
    /// - nurse with routing: `pending_approval`
    ///
    /// # Errors
    ///
    /// [`ClinicError::Forbidden`] for admins, who do not file exams.
    pub fn create(actor: &User, mode: CreateMode, now: DateTime<Utc>) -> ClinicResult<Transition> {
        if !matches!(actor.role, Role::Nurse | Role::Doctor) {
            return Err(ClinicError::Forbidden(
                "only nurses and doctors can create submissions".into(),
            ));
        }

        if mode.save_as_draft {
            return Ok(Transition::to(
                SubmissionStatus::Draft,
                AuditEventType::Created,
            ));
        }

        Ok(filing_transition(
            actor,
            mode.route_for_approval,
            now,
            AuditEventType::Created,
        ))
    }

    /// Permission to edit the contents of a submission. The status stays `draft`.
    ///
    /// # Errors
    ///
    /// - [`ClinicError::InvalidState`] unless the submission is a draft, checked before the
    ///   actor so that submitted records are reported as such to everyone.
    /// - [`ClinicError::Forbidden`] unless the actor created it or is an admin.
    pub fn update(submission: &Submission, actor: &User) -> ClinicResult<Transition> {
        if submission.status.is_terminal() {
            return Err(ClinicError::InvalidState(format!(
                "cannot edit {} submission",
                submission.status
            )));
        }
        if submission.status != SubmissionStatus::Draft {
            return Err(ClinicError::InvalidState(format!(
                "cannot edit a submission that is {}",
                submission.status
            )));
        }

        if submission.created_by != actor.id && !actor.is_admin() {
            return Err(ClinicError::Forbidden(
                "only the creator or an admin can edit this submission".into(),
            ));
        }

        Ok(Transition::to(
            SubmissionStatus::Draft,
            AuditEventType::Updated,
        ))
    }

    /// Boolean form of [`SubmissionLifecycle::update`].
    pub fn can_update(submission: &Submission, actor: &User) -> bool {
        Self::update(submission, actor).is_ok()
    }

    /// Files a draft, using the same routing rule as [`SubmissionLifecycle::create`].
    ///
    /// # Errors
    ///
    /// - [`ClinicError::InvalidState`] unless the submission is a draft.
    /// - [`ClinicError::Forbidden`] unless the actor created it.
    pub fn submit(
        submission: &Submission,
        actor: &User,
        route_for_approval: bool,
        now: DateTime<Utc>,
    ) -> ClinicResult<Transition> {
        if submission.status != SubmissionStatus::Draft {
            return Err(ClinicError::InvalidState(format!(
                "only drafts can be submitted, this submission is {}",
                submission.status
            )));
        }
        if submission.created_by != actor.id {
            return Err(ClinicError::Forbidden(
                "only the creator can submit a draft".into(),
            ));
        }

        Ok(filing_transition(
            actor,
            route_for_approval,
            now,
            AuditEventType::Submitted,
        ))
    }

    /// A doctor of the same clinic approves a pending submission.
    ///
    /// # Errors
    ///
    /// - [`ClinicError::Forbidden`] for non-doctors and for doctors of another clinic.
    /// - [`ClinicError::InvalidState`] unless the submission is `pending_approval`.
    pub fn approve(
        submission: &Submission,
        actor: &User,
        now: DateTime<Utc>,
    ) -> ClinicResult<Transition> {
        require_reviewer(submission, actor, "approve")?;
        Ok(Transition::submitted_by(
            actor,
            now,
            AuditEventType::Approved,
        ))
    }

    /// A doctor of the same clinic rejects a pending submission with a reason.
    ///
    /// # Errors
    ///
    /// As for [`SubmissionLifecycle::approve`], plus [`ClinicError::InvalidArgument`] when the
    /// reason is empty or whitespace.
    pub fn reject(submission: &Submission, actor: &User, reason: &str) -> ClinicResult<Transition> {
        require_reviewer(submission, actor, "reject")?;
        let reason = NonEmptyText::new(reason).map_err(|_| {
            ClinicError::InvalidArgument("a rejection reason is required".into())
        })?;

        Ok(Transition {
            status: SubmissionStatus::Rejected,
            approval: None,
            rejected_reason: Some(reason),
            event: AuditEventType::Rejected,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ExamType;
    use crate::nric::Nric;
    use chrono::TimeZone;
    use clinic_types::EmailAddress;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 9, 30, 0).unwrap()
    }

    fn user(role: Role, clinic: Option<ShardableUuid>) -> User {
        User {
            id: ShardableUuid::new(),
            name: NonEmptyText::new(format!("{role} user")).unwrap(),
            email: EmailAddress::parse(format!("{}@clinic.sg", ShardableUuid::new())).unwrap(),
            role,
            clinic_id: clinic,
            created_date: now(),
        }
    }

    fn submission(creator: &User, status: SubmissionStatus) -> Submission {
        Submission {
            id: ShardableUuid::new(),
            clinic_id: creator.clinic_id.expect("creator has clinic"),
            created_by: creator.id,
            approved_by: None,
            exam_type: ExamType::SixMonthlyMdw,
            patient_name: NonEmptyText::new("Siti Aminah").unwrap(),
            patient_nric: Nric::parse("S1234567D").unwrap(),
            form_data: json!({}),
            status,
            rejected_reason: None,
            approved_date: None,
            submitted_date: None,
            created_date: now(),
            updated_date: now(),
            version: 1,
        }
    }

    struct Clinic {
        nurse: User,
        doctor: User,
        admin: User,
    }

    fn clinic() -> Clinic {
        let id = ShardableUuid::new();
        Clinic {
            nurse: user(Role::Nurse, Some(id)),
            doctor: user(Role::Doctor, Some(id)),
            admin: user(Role::Admin, None),
        }
    }

    #[test]
    fn nurse_routed_create_goes_to_pending_approval() {
        let c = clinic();
        let t = SubmissionLifecycle::create(&c.nurse, CreateMode::routed(), now()).unwrap();
        assert_eq!(t.status, SubmissionStatus::PendingApproval);
        assert_eq!(t.approval, None);
        assert_eq!(t.event, AuditEventType::Created);
    }

    #[test]
    fn doctor_create_is_submitted_regardless_of_routing() {
        let c = clinic();
        for mode in [CreateMode::routed(), CreateMode::direct()] {
            let t = SubmissionLifecycle::create(&c.doctor, mode, now()).unwrap();
            assert_eq!(t.status, SubmissionStatus::Submitted);
            let approval = t.approval.expect("approval stamp");
            assert_eq!(approval.approved_by, c.doctor.id);
            assert_eq!(approval.approved_date, now());
            assert_eq!(approval.submitted_date, now());
        }
    }

    #[test]
    fn nurse_unrouted_create_is_submitted_and_self_approved() {
        let c = clinic();
        let t = SubmissionLifecycle::create(&c.nurse, CreateMode::direct(), now()).unwrap();
        assert_eq!(t.status, SubmissionStatus::Submitted);
        assert_eq!(t.approval.unwrap().approved_by, c.nurse.id);
    }

    #[test]
    fn draft_flag_wins_over_routing() {
        let c = clinic();
        let mode = CreateMode {
            save_as_draft: true,
            route_for_approval: true,
        };
        for actor in [&c.nurse, &c.doctor] {
            let t = SubmissionLifecycle::create(actor, mode, now()).unwrap();
            assert_eq!(t.status, SubmissionStatus::Draft);
            assert_eq!(t.event, AuditEventType::Created);
        }
    }

    #[test]
    fn admin_cannot_create() {
        let c = clinic();
        let err = SubmissionLifecycle::create(&c.admin, CreateMode::direct(), now())
            .expect_err("admin create");
        assert!(matches!(err, ClinicError::Forbidden(_)));
    }

    #[test]
    fn approve_stamps_doctor_and_dates() {
        let c = clinic();
        let s = submission(&c.nurse, SubmissionStatus::PendingApproval);
        let t = SubmissionLifecycle::approve(&s, &c.doctor, now()).unwrap();
        assert_eq!(t.status, SubmissionStatus::Submitted);
        assert_eq!(t.event, AuditEventType::Approved);
        assert_eq!(t.approval.unwrap().approved_by, c.doctor.id);
    }

    #[test]
    fn approving_twice_is_invalid_state() {
        let c = clinic();
        let mut s = submission(&c.nurse, SubmissionStatus::PendingApproval);
        let t = SubmissionLifecycle::approve(&s, &c.doctor, now()).unwrap();
        t.apply(&mut s, now());

        let err = SubmissionLifecycle::approve(&s, &c.doctor, now()).expect_err("second approve");
        assert!(matches!(err, ClinicError::InvalidState(_)));
    }

    #[test]
    fn non_doctors_cannot_review() {
        let c = clinic();
        let s = submission(&c.nurse, SubmissionStatus::PendingApproval);
        for actor in [&c.nurse, &c.admin] {
            assert!(matches!(
                SubmissionLifecycle::approve(&s, actor, now()),
                Err(ClinicError::Forbidden(_))
            ));
            assert!(matches!(
                SubmissionLifecycle::reject(&s, actor, "blurry x-ray"),
                Err(ClinicError::Forbidden(_))
            ));
        }
    }

    #[test]
    fn doctors_from_other_clinics_cannot_review() {
        let c = clinic();
        let other = user(Role::Doctor, Some(ShardableUuid::new()));
        let s = submission(&c.nurse, SubmissionStatus::PendingApproval);
        assert!(matches!(
            SubmissionLifecycle::approve(&s, &other, now()),
            Err(ClinicError::Forbidden(_))
        ));
        assert!(matches!(
            SubmissionLifecycle::reject(&s, &other, "wrong patient"),
            Err(ClinicError::Forbidden(_))
        ));
    }

    #[test]
    fn review_requires_pending_approval() {
        let c = clinic();
        for status in [
            SubmissionStatus::Draft,
            SubmissionStatus::Submitted,
            SubmissionStatus::Rejected,
        ] {
            let s = submission(&c.nurse, status);
            assert!(matches!(
                SubmissionLifecycle::approve(&s, &c.doctor, now()),
                Err(ClinicError::InvalidState(_))
            ));
            assert!(matches!(
                SubmissionLifecycle::reject(&s, &c.doctor, "late"),
                Err(ClinicError::InvalidState(_))
            ));
        }
    }

    #[test]
    fn reject_requires_a_reason() {
        let c = clinic();
        let s = submission(&c.nurse, SubmissionStatus::PendingApproval);
        for reason in ["", "   "] {
            let err = SubmissionLifecycle::reject(&s, &c.doctor, reason).expect_err("no reason");
            assert!(matches!(err, ClinicError::InvalidArgument(_)));
        }
    }

    #[test]
    fn reject_records_exact_reason() {
        let c = clinic();
        let mut s = submission(&c.nurse, SubmissionStatus::PendingApproval);
        let t = SubmissionLifecycle::reject(&s, &c.doctor, "Chest X-ray result missing").unwrap();
        assert_eq!(t.status, SubmissionStatus::Rejected);
        assert_eq!(t.event, AuditEventType::Rejected);

        t.apply(&mut s, now());
        assert_eq!(
            s.rejected_reason.as_ref().map(NonEmptyText::as_str),
            Some("Chest X-ray result missing")
        );
        assert_eq!(s.approved_by, None);
    }

    #[test]
    fn update_on_submitted_is_invalid_state_for_everyone() {
        let c = clinic();
        let s = submission(&c.nurse, SubmissionStatus::Submitted);
        for actor in [&c.nurse, &c.doctor, &c.admin] {
            let err = SubmissionLifecycle::update(&s, actor).expect_err("submitted is frozen");
            assert!(
                matches!(&err, ClinicError::InvalidState(msg) if msg == "cannot edit submitted submission")
            );
            assert!(!SubmissionLifecycle::can_update(&s, actor));
        }
    }

    #[test]
    fn update_of_draft_is_limited_to_creator_and_admin() {
        let c = clinic();
        let s = submission(&c.nurse, SubmissionStatus::Draft);

        let t = SubmissionLifecycle::update(&s, &c.nurse).unwrap();
        assert_eq!(t.status, SubmissionStatus::Draft);
        assert_eq!(t.event, AuditEventType::Updated);
        assert!(SubmissionLifecycle::can_update(&s, &c.admin));

        let err = SubmissionLifecycle::update(&s, &c.doctor).expect_err("not creator");
        assert!(matches!(err, ClinicError::Forbidden(_)));
    }

    #[test]
    fn update_rejects_pending_and_rejected() {
        let c = clinic();
        for status in [SubmissionStatus::PendingApproval, SubmissionStatus::Rejected] {
            let s = submission(&c.nurse, status);
            assert!(matches!(
                SubmissionLifecycle::update(&s, &c.nurse),
                Err(ClinicError::InvalidState(_))
            ));
        }

        let rejected = submission(&c.nurse, SubmissionStatus::Rejected);
        let err = SubmissionLifecycle::update(&rejected, &c.admin).expect_err("rejected is final");
        assert_eq!(err.to_string(), "invalid state: cannot edit rejected submission");
    }

    #[test]
    fn submit_draft_follows_routing_rule() {
        let c = clinic();
        let s = submission(&c.nurse, SubmissionStatus::Draft);
        let routed = SubmissionLifecycle::submit(&s, &c.nurse, true, now()).unwrap();
        assert_eq!(routed.status, SubmissionStatus::PendingApproval);
        assert_eq!(routed.event, AuditEventType::Submitted);

        let direct = SubmissionLifecycle::submit(&s, &c.nurse, false, now()).unwrap();
        assert_eq!(direct.status, SubmissionStatus::Submitted);

        let doctor_draft = submission(&c.doctor, SubmissionStatus::Draft);
        let t = SubmissionLifecycle::submit(&doctor_draft, &c.doctor, true, now()).unwrap();
        assert_eq!(t.status, SubmissionStatus::Submitted);
    }

    #[test]
    fn submit_requires_creator_and_draft() {
        let c = clinic();
        let s = submission(&c.nurse, SubmissionStatus::Draft);
        assert!(matches!(
            SubmissionLifecycle::submit(&s, &c.admin, false, now()),
            Err(ClinicError::Forbidden(_))
        ));

        let pending = submission(&c.nurse, SubmissionStatus::PendingApproval);
        assert!(matches!(
            SubmissionLifecycle::submit(&pending, &c.nurse, false, now()),
            Err(ClinicError::InvalidState(_))
        ));
    }

    #[test]
    fn changes_describe_only_owned_fields() {
        let c = clinic();
        let s = submission(&c.nurse, SubmissionStatus::PendingApproval);

        let approved = SubmissionLifecycle::approve(&s, &c.doctor, now()).unwrap();
        let changes = approved.changes();
        assert_eq!(changes["status"], json!("submitted"));
        assert_eq!(changes["approved_by"], json!(c.doctor.id.to_string()));
        assert!(!changes.contains_key("rejected_reason"));

        let rejected = SubmissionLifecycle::reject(&s, &c.doctor, "illegible").unwrap();
        let changes = rejected.changes();
        assert_eq!(changes["status"], json!("rejected"));
        assert_eq!(changes["rejected_reason"], json!("illegible"));
        assert!(!changes.contains_key("approved_by"));
    }
}
