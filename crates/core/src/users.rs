//! Clinic and user administration.

use crate::model::{Clinic, Role, User};
use crate::store::UserStore;
use crate::{ClinicError, ClinicResult};
use chrono::Utc;
use clinic_types::{EmailAddress, NonEmptyText};
use clinic_uuid::ShardableUuid;
use std::sync::Arc;

#[derive(Clone, Debug)]
pub struct NewClinic {
    pub name: NonEmptyText,
    pub hci_code: Option<NonEmptyText>,
}

#[derive(Clone, Debug)]
pub struct NewUser {
    pub name: NonEmptyText,
    pub email: EmailAddress,
    pub role: Role,
    pub clinic_id: Option<ShardableUuid>,
}

#[derive(Clone, Debug)]
pub struct UserService<S: ?Sized> {
    store: Arc<S>,
}

impl<S: UserStore + ?Sized> UserService<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub(crate) fn store(&self) -> &S {
        &self.store
    }

    /// Resolves the caller of a request. Unknown ids surface as [`ClinicError::NotFound`].
    pub fn resolve_actor(&self, id: &ShardableUuid) -> ClinicResult<User> {
        self.store.load_user(id)
    }

    pub fn create_clinic(&self, actor: &User, new: NewClinic) -> ClinicResult<Clinic> {
        require_admin(actor, "create clinics")?;
        let clinic = self.bootstrap_clinic(new)?;
        tracing::info!(clinic = %clinic.id, actor = %actor.id, "clinic created");
        Ok(clinic)
    }

    /// Admins see every clinic; everyone else sees only their own.
    pub fn list_clinics(&self, actor: &User) -> ClinicResult<Vec<Clinic>> {
        if actor.is_admin() {
            return self.store.list_clinics();
        }
        match &actor.clinic_id {
            Some(id) => Ok(vec![self.store.load_clinic(id)?]),
            None => Ok(Vec::new()),
        }
    }

    /// Creates a user account.
    ///
    /// # Errors
    ///
    /// - [`ClinicError::Forbidden`] unless the actor is an admin.
    /// - [`ClinicError::InvalidArgument`] if a nurse or doctor has no clinic, the clinic does not
    ///   exist, or an admin is given a clinic.
    /// - [`ClinicError::Conflict`] if the email is already registered.
    pub fn create_user(&self, actor: &User, new: NewUser) -> ClinicResult<User> {
        require_admin(actor, "create users")?;
        let user = self.bootstrap_user(new)?;
        tracing::info!(user = %user.id, role = %user.role, actor = %actor.id, "user created");
        Ok(user)
    }

    pub fn list_users(&self, actor: &User, clinic_id: Option<&ShardableUuid>) -> ClinicResult<Vec<User>> {
        require_admin(actor, "list users")?;
        self.store.list_users(clinic_id)
    }

    /// Users may read their own account and colleagues in the same clinic; admins read anyone.
    pub fn get_user(&self, actor: &User, id: &ShardableUuid) -> ClinicResult<User> {
        let user = self.store.load_user(id)?;
        let colleague = matches!(&user.clinic_id, Some(c) if actor.in_clinic(c));
        if actor.is_admin() || actor.id == user.id || colleague {
            Ok(user)
        } else {
            Err(ClinicError::Forbidden("user belongs to another clinic".into()))
        }
    }

    /// Inserts a clinic without an acting admin. Used by seeding.
    pub fn bootstrap_clinic(&self, new: NewClinic) -> ClinicResult<Clinic> {
        let clinic = Clinic {
            id: ShardableUuid::new(),
            name: new.name,
            hci_code: new.hci_code,
            created_date: Utc::now(),
        };
        self.store.insert_clinic(&clinic)?;
        Ok(clinic)
    }

    /// Inserts a user without an acting admin. Used by seeding.
    pub fn bootstrap_user(&self, new: NewUser) -> ClinicResult<User> {
        match (new.role, &new.clinic_id) {
            (Role::Admin, Some(_)) => {
                return Err(ClinicError::InvalidArgument(
                    "admins are not assigned to a clinic".into(),
                ));
            }
            (Role::Nurse | Role::Doctor, None) => {
                return Err(ClinicError::InvalidArgument(format!(
                    "a {} must be assigned to a clinic",
                    new.role
                )));
            }
            (_, Some(clinic_id)) => {
                self.store.load_clinic(clinic_id).map_err(|e| match e {
                    ClinicError::NotFound { .. } => {
                        ClinicError::InvalidArgument(format!("clinic {clinic_id} does not exist"))
                    }
                    other => other,
                })?;
            }
            (Role::Admin, None) => {}
        }

        let user = User {
            id: ShardableUuid::new(),
            name: new.name,
            email: new.email,
            role: new.role,
            clinic_id: new.clinic_id,
            created_date: Utc::now(),
        };
        self.store.insert_user(&user)?;
        Ok(user)
    }
}

fn require_admin(actor: &User, action: &str) -> ClinicResult<()> {
    if actor.is_admin() {
        Ok(())
    } else {
        Err(ClinicError::Forbidden(format!("only admins can {action}")))
    }
}
