//! User registration and lookup.

use super::core::Ledger;
use super::results::LedgerError;
use crate::challenge::{User, ValidationError};
use crate::types::{Role, UserId};
use tracing::{debug, info};

impl Ledger {
    /// Register a user. Email uniqueness is exact (case-sensitive, as stored).
    pub fn register_user(
        &self,
        email: &str,
        name: &str,
        credential: &str,
        role: Role,
    ) -> Result<User, LedgerError> {
        for (field, value) in [("email", email), ("name", name), ("credential", credential)] {
            if value.trim().is_empty() {
                return Err(ValidationError::Empty(field).into());
            }
        }

        let mut users = self.users.write();
        if users.values().any(|u| u.email == email) {
            return Err(LedgerError::EmailTaken(email.to_string()));
        }

        let now = self.clock.now();
        let user = User {
            id: self.ids.next_user(),
            email: email.to_string(),
            name: name.to_string(),
            credential: credential.to_string(),
            role,
            created_at: now,
            updated_at: now,
        };
        users.insert(user.id, user.clone());

        info!(user_id = %user.id, email = %user.email, "user registered");
        Ok(user)
    }

    /// Refresh `updated_at` after the authenticator accepted a login.
    pub fn touch_user(&self, id: UserId) -> Result<User, LedgerError> {
        let mut users = self.users.write();
        let user = users.get_mut(&id).ok_or(LedgerError::UserNotFound(id))?;
        user.updated_at = self.clock.now();
        debug!(user_id = %id, "user touched");
        Ok(user.clone())
    }

    pub fn user(&self, id: UserId) -> Option<User> {
        self.users.read().get(&id).cloned()
    }

    pub fn user_by_email(&self, email: &str) -> Option<User> {
        self.users.read().values().find(|u| u.email == email).cloned()
    }

    /// Every user, highest id first. Backs the admin user table.
    pub fn all_users(&self) -> Vec<User> {
        let mut out: Vec<User> = self.users.read().values().cloned().collect();
        out.sort_by(|a, b| b.id.cmp(&a.id));
        out
    }
}
