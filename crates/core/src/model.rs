//! Domain records: clinics, users, submissions and their audit entries.
//!
//! Role, status, exam type and audit event are closed enumerations so that values outside the
//! known set cannot be stored or passed through the lifecycle.

use crate::nric::Nric;
use crate::ClinicError;
use chrono::{DateTime, Utc};
use clinic_types::{EmailAddress, NonEmptyText};
use clinic_uuid::{ShardableUuid, TimestampId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Generates `as_str`, `Display` and a `FromStr` that accepts exactly the serialised names.
macro_rules! string_enum {
    ($ty:ident, $what:literal, { $($variant:ident => $name:literal),+ $(,)? }) => {
        impl $ty {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($ty::$variant => $name,)+
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = ClinicError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim() {
                    $($name => Ok($ty::$variant),)+
                    other => Err(ClinicError::InvalidArgument(format!(
                        concat!("unknown ", $what, " '{}'"),
                        other
                    ))),
                }
            }
        }
    };
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Nurse,
    Doctor,
    Admin,
}

string_enum!(Role, "role", {
    Nurse => "nurse",
    Doctor => "doctor",
    Admin => "admin",
});

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    /// Unsubmitted and freely editable by its creator.
    Draft,
    /// Routed by a nurse to a doctor of the same clinic for review.
    PendingApproval,
    Submitted,
    Rejected,
}

string_enum!(SubmissionStatus, "submission status", {
    Draft => "draft",
    PendingApproval => "pending_approval",
    Submitted => "submitted",
    Rejected => "rejected",
});

impl SubmissionStatus {
    /// No transition leaves a terminal status.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SubmissionStatus::Submitted | SubmissionStatus::Rejected)
    }
}

/// The government exam forms a clinic files.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExamType {
    /// Six-monthly medical exam for migrant domestic workers.
    SixMonthlyMdw,
    /// Full medical exam for work permit holders.
    WorkPermit,
    /// Medical exam for drivers aged 65 and above.
    AgedDrivers,
}

string_enum!(ExamType, "exam type", {
    SixMonthlyMdw => "six_monthly_mdw",
    WorkPermit => "work_permit",
    AgedDrivers => "aged_drivers",
});

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditEventType {
    Created,
    Updated,
    Submitted,
    Approved,
    Rejected,
}

string_enum!(AuditEventType, "audit event", {
    Created => "created",
    Updated => "updated",
    Submitted => "submitted",
    Approved => "approved",
    Rejected => "rejected",
});

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Clinic {
    pub id: ShardableUuid,
    pub name: NonEmptyText,
    /// Healthcare institution code issued by the licensing authority.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hci_code: Option<NonEmptyText>,
    pub created_date: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: ShardableUuid,
    pub name: NonEmptyText,
    pub email: EmailAddress,
    pub role: Role,
    /// Always set for nurses and doctors; admins may be clinic-less.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clinic_id: Option<ShardableUuid>,
    pub created_date: DateTime<Utc>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// True if this user belongs to `clinic_id`.
    pub fn in_clinic(&self, clinic_id: &ShardableUuid) -> bool {
        self.clinic_id.as_ref() == Some(clinic_id)
    }
}

/// One medical examination record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    pub id: ShardableUuid,
    pub clinic_id: ShardableUuid,
    pub created_by: ShardableUuid,
    #[serde(default)]
    pub approved_by: Option<ShardableUuid>,
    pub exam_type: ExamType,
    pub patient_name: NonEmptyText,
    pub patient_nric: Nric,
    /// Exam-specific answers; always a JSON object.
    pub form_data: serde_json::Value,
    pub status: SubmissionStatus,
    /// Set on rejection and retained afterwards.
    #[serde(default)]
    pub rejected_reason: Option<NonEmptyText>,
    #[serde(default)]
    pub approved_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub submitted_date: Option<DateTime<Utc>>,
    pub created_date: DateTime<Utc>,
    pub updated_date: DateTime<Utc>,
    /// Incremented on every persisted change; storage rejects writes based on a stale value.
    pub version: u64,
}

/// Audit entry as handed to storage, before it is assigned an id.
#[derive(Clone, Debug, PartialEq)]
pub struct NewAuditEntry {
    pub user_id: ShardableUuid,
    pub event_type: AuditEventType,
    pub changes: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

/// Append-only record of a state-changing event on a submission.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub id: TimestampId,
    pub submission_id: ShardableUuid,
    pub user_id: ShardableUuid,
    pub event_type: AuditEventType,
    pub changes: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

impl AuditLogEntry {
    pub fn from_new(id: TimestampId, submission_id: ShardableUuid, entry: NewAuditEntry) -> Self {
        Self {
            id,
            submission_id,
            user_id: entry.user_id,
            event_type: entry.event_type,
            changes: entry.changes,
            timestamp: entry.timestamp,
        }
    }
}

/// Narrowing criteria for submission listings. `None` fields match everything.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SubmissionFilter {
    pub clinic_id: Option<ShardableUuid>,
    pub status: Option<SubmissionStatus>,
    pub created_by: Option<ShardableUuid>,
}

impl SubmissionFilter {
    pub fn matches(&self, submission: &Submission) -> bool {
        self.clinic_id
            .as_ref()
            .map_or(true, |c| &submission.clinic_id == c)
            && self.status.map_or(true, |s| submission.status == s)
            && self
                .created_by
                .as_ref()
                .map_or(true, |u| &submission.created_by == u)
    }
}
