//! Bootstrap data loaded from YAML.
//!
//! A fresh deployment has no admin, so nobody could create the first clinic or user through
//! the API. A seed file lists clinics and users; applying it is idempotent: clinics are matched
//! by name and users by email, and existing ones are left alone.
//!
//! ```yaml
//! clinics:
//!   - name: Orchard Family Clinic
//!     hci_code: 12M3456
//! users:
//!   - name: Dr Tan
//!     email: tan@orchard.sg
//!     role: doctor
//!     clinic: Orchard Family Clinic
//! ```

use crate::model::{Clinic, Role};
use crate::store::UserStore;
use crate::users::{NewClinic, NewUser, UserService};
use crate::{ClinicError, ClinicResult};
use clinic_types::{EmailAddress, NonEmptyText};
use serde::Deserialize;
use std::collections::HashMap;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SeedWire {
    #[serde(default)]
    clinics: Vec<ClinicWire>,
    #[serde(default)]
    users: Vec<UserWire>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ClinicWire {
    name: String,
    #[serde(default)]
    hci_code: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct UserWire {
    name: String,
    email: String,
    role: String,
    #[serde(default)]
    clinic: Option<String>,
}

#[derive(Clone, Debug)]
pub struct SeedUser {
    pub name: NonEmptyText,
    pub email: EmailAddress,
    pub role: Role,
    /// Name of a clinic in the same file or already stored.
    pub clinic: Option<NonEmptyText>,
}

#[derive(Clone, Debug)]
pub struct SeedFile {
    pub clinics: Vec<NewClinic>,
    pub users: Vec<SeedUser>,
}

/// What [`Seed::apply`] did.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub clinics_created: usize,
    pub clinics_existing: usize,
    pub users_created: usize,
    pub users_skipped: usize,
}

/// Seed file operations.
///
/// This is a zero-sized type used for namespacing. All methods are associated functions.
pub struct Seed;

impl Seed {
    /// Parse a seed file from YAML text.
    ///
    /// Schema errors carry a best-effort path to the failing field (e.g. `users[1].role`).
    ///
    /// # Errors
    ///
    /// - [`ClinicError::SeedSchema`] if the YAML does not match the schema, including unknown keys.
    /// - [`ClinicError::Text`] for empty names or malformed emails.
    /// - [`ClinicError::InvalidArgument`] for an unknown role.
    pub fn parse(yaml_text: &str) -> ClinicResult<SeedFile> {
        let deserializer = serde_yaml::Deserializer::from_str(yaml_text);

        let wire = match serde_path_to_error::deserialize::<_, SeedWire>(deserializer) {
            Ok(parsed) => parsed,
            Err(err) => {
                let path = err.path().to_string();
                let source = err.into_inner();
                let path = if path.is_empty() { "<root>".to_owned() } else { path };
                return Err(ClinicError::SeedSchema {
                    path,
                    message: source.to_string(),
                });
            }
        };

        wire_to_domain(wire)
    }

    /// Creates the clinics and users in `seed` that do not exist yet.
    ///
    /// # Errors
    ///
    /// [`ClinicError::InvalidArgument`] if a user names a clinic that is neither in the file nor
    /// stored; storage errors are propagated. Work done before the error is kept.
    pub fn apply<S: UserStore + ?Sized>(
        users: &UserService<S>,
        seed: SeedFile,
    ) -> ClinicResult<SeedReport> {
        let store = users.store();
        let mut report = SeedReport::default();
        let mut by_name: HashMap<String, Clinic> = store
            .list_clinics()?
            .into_iter()
            .map(|c| (c.name.as_str().to_owned(), c))
            .collect();

        for clinic in seed.clinics {
            if by_name.contains_key(clinic.name.as_str()) {
                report.clinics_existing += 1;
                continue;
            }
            let created = users.bootstrap_clinic(clinic)?;
            tracing::info!(clinic = %created.id, name = %created.name, "seeded clinic");
            by_name.insert(created.name.as_str().to_owned(), created);
            report.clinics_created += 1;
        }

        for user in seed.users {
            if store.find_user_by_email(&user.email)?.is_some() {
                tracing::warn!(email = %user.email, "seed user already exists, skipping");
                report.users_skipped += 1;
                continue;
            }

            let clinic_id = match &user.clinic {
                Some(name) => Some(
                    by_name
                        .get(name.as_str())
                        .map(|c| c.id)
                        .ok_or_else(|| {
                            ClinicError::InvalidArgument(format!(
                                "seed user {} refers to unknown clinic '{name}'",
                                user.email
                            ))
                        })?,
                ),
                None => None,
            };

            let created = users.bootstrap_user(NewUser {
                name: user.name,
                email: user.email,
                role: user.role,
                clinic_id,
            })?;
            tracing::info!(user = %created.id, role = %created.role, "seeded user");
            report.users_created += 1;
        }

        Ok(report)
    }
}

fn wire_to_domain(wire: SeedWire) -> ClinicResult<SeedFile> {
    let clinics = wire
        .clinics
        .into_iter()
        .map(|c| -> ClinicResult<NewClinic> {
            Ok(NewClinic {
                name: NonEmptyText::new(&c.name)?,
                hci_code: c.hci_code.map(NonEmptyText::new).transpose()?,
            })
        })
        .collect::<ClinicResult<Vec<_>>>()?;

    let users = wire
        .users
        .into_iter()
        .map(|u| -> ClinicResult<SeedUser> {
            Ok(SeedUser {
                name: NonEmptyText::new(&u.name)?,
                email: EmailAddress::parse(&u.email)?,
                role: u.role.parse()?,
                clinic: u.clinic.map(NonEmptyText::new).transpose()?,
            })
        })
        .collect::<ClinicResult<Vec<_>>>()?;

    Ok(SeedFile { clinics, users })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use std::sync::Arc;

    const SEED: &str = r#"
clinics:
  - name: Orchard Family Clinic
    hci_code: 12M3456
users:
  - name: Site Admin
    email: admin@orchard.sg
    role: admin
  - name: Dr Tan
    email: Tan@Orchard.sg
    role: doctor
    clinic: Orchard Family Clinic
  - name: Nurse Lim
    email: lim@orchard.sg
    role: nurse
    clinic: Orchard Family Clinic
"#;

    #[test]
    fn parse_and_apply_is_idempotent() {
        let store = Arc::new(MemoryStore::new());
        let users = UserService::new(store.clone());

        let report = Seed::apply(&users, Seed::parse(SEED).unwrap()).unwrap();
        assert_eq!(
            report,
            SeedReport {
                clinics_created: 1,
                clinics_existing: 0,
                users_created: 3,
                users_skipped: 0,
            }
        );

        let again = Seed::apply(&users, Seed::parse(SEED).unwrap()).unwrap();
        assert_eq!(again.clinics_existing, 1);
        assert_eq!(again.users_skipped, 3);

        let doctor = store
            .find_user_by_email(&EmailAddress::parse("tan@orchard.sg").unwrap())
            .unwrap()
            .expect("doctor seeded");
        assert_eq!(doctor.role, Role::Doctor);
        assert!(doctor.clinic_id.is_some());
    }

    #[test]
    fn unknown_key_reports_path() {
        let yaml = "users:\n  - name: A\n    email: a@b.sg\n    role: nurse\n    ward: 3\n";
        match Seed::parse(yaml) {
            Err(ClinicError::SeedSchema { path, .. }) => assert!(path.starts_with("users[0]")),
            other => panic!("expected schema error, got {other:?}"),
        }
    }

    #[test]
    fn unknown_role_and_clinic_are_rejected() {
        let bad_role = "users:\n  - name: A\n    email: a@b.sg\n    role: pharmacist\n";
        assert!(matches!(
            Seed::parse(bad_role),
            Err(ClinicError::InvalidArgument(_))
        ));

        let store = Arc::new(MemoryStore::new());
        let users = UserService::new(store.clone());
        let orphan = "users:\n  - name: A\n    email: a@b.sg\n    role: nurse\n    clinic: Nowhere\n";
        assert!(matches!(
            Seed::apply(&users, Seed::parse(orphan).unwrap()),
            Err(ClinicError::InvalidArgument(_))
        ));
    }
}
