//! # Clinic Core
//!
//! Core business logic for the clinic medical-exam submission system.
//!
//! This crate contains the domain rules and storage:
//! - NRIC/FIN checksum validation and generation ([`nric`])
//! - The submission lifecycle state machine ([`lifecycle`]) and its audit trail
//! - Clinic, user and submission services over a pluggable store ([`store`])
//! - JSON storage in sharded directories under `CLINIC_DATA_DIR`
//!
//! **No API concerns**: authentication, HTTP servers and command-line handling belong in
//! `api-rest`, `api-shared` and `clinic-cli`.

pub mod config;
pub mod constants;
pub mod error;
pub mod lifecycle;
pub mod model;
pub mod nric;
pub mod seed;
pub mod store;
pub mod submissions;
pub mod users;
pub mod validation;

pub use clinic_types::{EmailAddress, NonEmptyText, TextError};
pub use clinic_uuid::{ShardableUuid, TimestampId};

pub use config::{CoreConfig, StoreKind};
pub use error::{ClinicError, ClinicResult, ErrorKind};
pub use lifecycle::{CreateMode, SubmissionLifecycle, Transition};
pub use model::{
    AuditEventType, AuditLogEntry, Clinic, ExamType, Role, Submission, SubmissionFilter,
    SubmissionStatus, User,
};
pub use nric::{Nric, NricChecksum, NricError, NricPrefix};
pub use seed::{Seed, SeedReport};
pub use store::{open_store, ClinicStore, FileStore, MemoryStore, SubmissionStore, UserStore};
pub use submissions::{NewSubmission, SubmissionPatch, SubmissionService};
pub use users::{NewClinic, NewUser, UserService};
