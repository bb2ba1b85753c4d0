//! Challenge creation, listing and patching.

use super::core::{ChallengeBook, Ledger};
use super::results::LedgerError;
use crate::challenge::{Challenge, NewChallenge};
use crate::patch::ChallengePatch;
use crate::types::{ChallengeId, UserId};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info, warn};

impl Ledger {
    /// Open a new active challenge for an existing user.
    pub fn create_challenge(&self, params: NewChallenge) -> Result<Challenge, LedgerError> {
        params.validate()?;
        if !self.user_exists(params.user_id) {
            return Err(LedgerError::UserNotFound(params.user_id));
        }

        let opening = params.current_balance.unwrap_or(params.initial_balance);
        let challenge = Challenge::new(
            self.ids.next_challenge(),
            params.user_id,
            params.initial_balance,
            opening,
            params.limits,
            self.clock.now(),
        );

        self.books
            .write()
            .insert(challenge.id, Arc::new(Mutex::new(ChallengeBook::new(challenge.clone()))));

        info!(
            challenge_id = %challenge.id,
            user_id = %challenge.user_id,
            initial_balance = %challenge.initial_balance,
            "challenge created"
        );
        Ok(challenge)
    }

    pub fn challenge(&self, id: ChallengeId) -> Option<Challenge> {
        self.book(id).map(|book| book.lock().challenge.clone())
    }

    /// Newest first. a user without challenges gets an empty list.
    pub fn challenges_for_user(&self, user_id: UserId) -> Vec<Challenge> {
        let mut out: Vec<Challenge> = self
            .all_books()
            .iter()
            .filter_map(|book| {
                let book = book.lock();
                (book.challenge.user_id == user_id).then(|| book.challenge.clone())
            })
            .collect();

        // ids are monotonic so they break created_at ties in creation order
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        debug!(user_id = %user_id, count = out.len(), "challenges listed");
        out
    }

    /// Every challenge across all users, highest id first.
    pub fn all_challenges(&self) -> Vec<Challenge> {
        let mut out: Vec<Challenge> = self
            .all_books()
            .iter()
            .map(|book| book.lock().challenge.clone())
            .collect();
        out.sort_by(|a, b| b.id.cmp(&a.id));
        out
    }

    /// Apply an allow-listed patch under the challenge's lock.
    pub fn update_challenge(
        &self,
        id: ChallengeId,
        patch: &ChallengePatch,
    ) -> Result<Challenge, LedgerError> {
        if patch.is_empty() {
            return Err(LedgerError::invalid("no fields to update"));
        }

        let book = self.book(id).ok_or(LedgerError::ChallengeNotFound(id))?;
        let mut book = book.lock();

        if book.challenge.is_terminal() {
            warn!(challenge_id = %id, status = %book.challenge.status, "patch on closed challenge rejected");
            return Err(LedgerError::ChallengeClosed {
                id,
                status: book.challenge.status,
            });
        }

        patch.apply_to(&mut book.challenge);
        book.challenge.updated_at = self.clock.now();

        info!(challenge_id = %id, fields = ?patch.fields(), status = %book.challenge.status, "challenge updated");
        Ok(book.challenge.clone())
    }
}
