//! Wire types for the clinic APIs.
//!
//! Identifiers are canonical 32-character hex strings and timestamps are RFC 3339. Request types
//! carry plain strings; `into_domain` conversions run the core validators so that every entry
//! point rejects bad input the same way.

use clinic_core::{
    AuditLogEntry, Clinic, ClinicError, ClinicResult, CreateMode, EmailAddress, ExamType,
    NewClinic, NewSubmission, NewUser, NonEmptyText, Nric, Role, ShardableUuid, Submission,
    SubmissionFilter, SubmissionPatch, SubmissionStatus, User,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::{IntoParams, ToSchema};

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthRes {
    pub ok: bool,
    pub message: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorRes {
    /// Machine-readable category, e.g. `forbidden`.
    pub error: String,
    pub message: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct NricValidateReq {
    pub nric: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct NricValidateRes {
    pub valid: bool,
    /// Upper-cased form when valid.
    pub nric: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct CreateClinicReq {
    pub name: String,
    #[serde(default)]
    pub hci_code: Option<String>,
}

impl CreateClinicReq {
    pub fn into_domain(self) -> ClinicResult<NewClinic> {
        Ok(NewClinic {
            name: NonEmptyText::new(&self.name)?,
            hci_code: non_blank(self.hci_code)?,
        })
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ClinicRes {
    pub id: String,
    pub name: String,
    pub hci_code: Option<String>,
    pub created_date: String,
}

impl From<Clinic> for ClinicRes {
    fn from(c: Clinic) -> Self {
        Self {
            id: c.id.to_string(),
            name: c.name.into_inner(),
            hci_code: c.hci_code.map(NonEmptyText::into_inner),
            created_date: c.created_date.to_rfc3339(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct CreateUserReq {
    pub name: String,
    pub email: String,
    /// `nurse`, `doctor` or `admin`.
    pub role: String,
    #[serde(default)]
    pub clinic_id: Option<String>,
}

impl CreateUserReq {
    pub fn into_domain(self) -> ClinicResult<NewUser> {
        Ok(NewUser {
            name: NonEmptyText::new(&self.name)?,
            email: EmailAddress::parse(&self.email)?,
            role: self.role.parse::<Role>()?,
            clinic_id: self.clinic_id.as_deref().map(ShardableUuid::parse).transpose()?,
        })
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct UserRes {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: String,
    pub clinic_id: Option<String>,
    pub created_date: String,
}

impl From<User> for UserRes {
    fn from(u: User) -> Self {
        Self {
            id: u.id.to_string(),
            name: u.name.into_inner(),
            email: u.email.as_str().to_owned(),
            role: u.role.to_string(),
            clinic_id: u.clinic_id.map(|c| c.to_string()),
            created_date: u.created_date.to_rfc3339(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct CreateSubmissionReq {
    /// `six_monthly_mdw`, `work_permit` or `aged_drivers`.
    pub exam_type: String,
    pub patient_name: String,
    pub patient_nric: String,
    #[schema(value_type = Object)]
    pub form_data: Value,
    /// Keep as a draft; takes precedence over `route_for_approval`.
    #[serde(default)]
    pub save_as_draft: bool,
    /// Nurses only: send to a doctor for approval instead of submitting directly.
    #[serde(default)]
    pub route_for_approval: bool,
}

impl CreateSubmissionReq {
    pub fn into_domain(self) -> ClinicResult<(NewSubmission, CreateMode)> {
        let mode = CreateMode {
            save_as_draft: self.save_as_draft,
            route_for_approval: self.route_for_approval,
        };
        let new = NewSubmission {
            exam_type: self.exam_type.parse::<ExamType>()?,
            patient_name: NonEmptyText::new(&self.patient_name)?,
            patient_nric: Nric::parse(&self.patient_nric)?,
            form_data: self.form_data,
        };
        Ok((new, mode))
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct UpdateSubmissionReq {
    #[serde(default)]
    pub exam_type: Option<String>,
    #[serde(default)]
    pub patient_name: Option<String>,
    #[serde(default)]
    pub patient_nric: Option<String>,
    #[serde(default)]
    #[schema(value_type = Option<Object>)]
    pub form_data: Option<Value>,
}

impl UpdateSubmissionReq {
    pub fn into_domain(self) -> ClinicResult<SubmissionPatch> {
        Ok(SubmissionPatch {
            exam_type: self.exam_type.as_deref().map(str::parse::<ExamType>).transpose()?,
            patient_name: self.patient_name.map(NonEmptyText::new).transpose()?,
            patient_nric: self.patient_nric.as_deref().map(Nric::parse).transpose()?,
            form_data: self.form_data,
        })
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct SubmitReq {
    #[serde(default)]
    pub route_for_approval: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct RejectReq {
    /// Required; an absent or blank reason is refused by the lifecycle.
    #[serde(default)]
    pub reason: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct SubmissionRes {
    pub id: String,
    pub clinic_id: String,
    pub created_by: String,
    pub approved_by: Option<String>,
    pub exam_type: String,
    pub patient_name: String,
    pub patient_nric: String,
    #[schema(value_type = Object)]
    pub form_data: Value,
    pub status: String,
    pub rejected_reason: Option<String>,
    pub approved_date: Option<String>,
    pub submitted_date: Option<String>,
    pub created_date: String,
    pub updated_date: String,
    pub version: u64,
}

impl From<Submission> for SubmissionRes {
    fn from(s: Submission) -> Self {
        Self {
            id: s.id.to_string(),
            clinic_id: s.clinic_id.to_string(),
            created_by: s.created_by.to_string(),
            approved_by: s.approved_by.map(|id| id.to_string()),
            exam_type: s.exam_type.to_string(),
            patient_name: s.patient_name.into_inner(),
            patient_nric: s.patient_nric.as_str().to_owned(),
            form_data: s.form_data,
            status: s.status.to_string(),
            rejected_reason: s.rejected_reason.map(NonEmptyText::into_inner),
            approved_date: s.approved_date.map(|d| d.to_rfc3339()),
            submitted_date: s.submitted_date.map(|d| d.to_rfc3339()),
            created_date: s.created_date.to_rfc3339(),
            updated_date: s.updated_date.to_rfc3339(),
            version: s.version,
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListSubmissionsQuery {
    /// Only submissions in this status.
    pub status: Option<String>,
    /// Only submissions created by this user id.
    pub created_by: Option<String>,
    /// Admins only: restrict to one clinic.
    pub clinic_id: Option<String>,
}

impl ListSubmissionsQuery {
    pub fn into_domain(self) -> ClinicResult<SubmissionFilter> {
        Ok(SubmissionFilter {
            clinic_id: parse_id(self.clinic_id)?,
            status: self
                .status
                .as_deref()
                .map(str::parse::<SubmissionStatus>)
                .transpose()?,
            created_by: parse_id(self.created_by)?,
        })
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct AuditEntryRes {
    pub id: String,
    pub submission_id: String,
    pub user_id: String,
    pub event_type: String,
    #[schema(value_type = Object)]
    pub changes: Value,
    pub timestamp: String,
}

impl From<AuditLogEntry> for AuditEntryRes {
    fn from(e: AuditLogEntry) -> Self {
        Self {
            id: e.id.to_string(),
            submission_id: e.submission_id.to_string(),
            user_id: e.user_id.to_string(),
            event_type: e.event_type.to_string(),
            changes: e.changes,
            timestamp: e.timestamp.to_rfc3339(),
        }
    }
}

fn non_blank(value: Option<String>) -> ClinicResult<Option<NonEmptyText>> {
    match value {
        Some(v) if v.trim().is_empty() => Ok(None),
        Some(v) => Ok(Some(NonEmptyText::new(v)?)),
        None => Ok(None),
    }
}

fn parse_id(value: Option<String>) -> ClinicResult<Option<ShardableUuid>> {
    value
        .as_deref()
        .map(ShardableUuid::parse)
        .transpose()
        .map_err(ClinicError::from)
}
