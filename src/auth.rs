// src/auth.rs
//
// Credential checks and the per-day login session. Secrets are compared
// verbatim against the stored credential; there is no token layer, a login
// just establishes which office the employee works from today.

use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use crate::clock::Clock;
use crate::model::*;
use crate::store::{RecordStore, StoreError};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub struct AuthService {
    store: Arc<RecordStore>,
    clock: Arc<dyn Clock>,
}

impl AuthService {
    pub fn new(store: Arc<RecordStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Checks the secret against the stored credential and returns the
    /// matching employee. Unknown email and wrong secret are
    /// indistinguishable to the caller.
    pub fn authenticate(&self, email: &str, secret: &str) -> Result<Employee, AuthError> {
        let credential = self
            .store
            .credential(email)
            .ok_or(AuthError::InvalidCredentials)?;
        if credential.secret != secret {
            warn!("Failed login attempt for {}", email);
            return Err(AuthError::InvalidCredentials);
        }
        self.store
            .employee_by_email(email)
            .ok_or(AuthError::InvalidCredentials)
    }

    /// Opens (or overwrites) today's session with the office the employee
    /// logged in from.
    pub fn open_daily_session(&self, employee_id: &str, office: Office) -> Result<DailySession, AuthError> {
        let employee = self.store.employee(employee_id)?;
        let session = DailySession {
            employee_id: employee.id,
            date: self.clock.now().date(),
            office,
        };
        self.store.put_daily_session(session.clone());
        info!(
            "Daily session opened for {} at {:?}",
            session.employee_id, session.office
        );
        Ok(session)
    }

    // --- Remember Me ---

    pub fn save_credentials(&self, credential: Credential) {
        self.store.set_remembered(Some(credential));
    }

    pub fn forget_credentials(&self) {
        self.store.set_remembered(None);
    }

    pub fn saved_credentials(&self) -> Option<Credential> {
        self.store.remembered()
    }

    /// Replaces the secret for an existing credential. Returns false when no
    /// credential exists for the email; nothing is created in that case.
    pub fn update_password(&self, email: &str, new_secret: &str) -> bool {
        match self.store.credential(email) {
            Some(mut credential) => {
                credential.secret = new_secret.to_string();
                self.store.put_credential(credential);
                info!("Password updated for {}", email);
                true
            }
            None => false,
        }
    }
}
