//! Plain-data image of the whole ledger, and rebuilding a ledger from one.

use super::core::{ChallengeBook, Ledger};
use super::results::LedgerError;
use crate::challenge::{Challenge, Trade, User};
use crate::clock::Clock;
use crate::ids::IdAllocator;
use crate::types::{ChallengeId, UserId};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::info;

pub const SNAPSHOT_VERSION: u32 = 1;

/// Normalized like the tables it replaces: users, challenges, trades, plus the id
/// high-water mark.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub version: u32,
    pub next_id: u64,
    pub users: Vec<User>,
    pub challenges: Vec<Challenge>,
    pub trades: Vec<Trade>,
}

impl Default for LedgerSnapshot {
    fn default() -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            next_id: 1,
            users: Vec::new(),
            challenges: Vec::new(),
            trades: Vec::new(),
        }
    }
}

impl LedgerSnapshot {
    pub fn is_empty(&self) -> bool {
        self.users.is_empty() && self.challenges.is_empty() && self.trades.is_empty()
    }

    fn max_id(&self) -> u64 {
        let users = self.users.iter().map(|u| u.id.0);
        let challenges = self.challenges.iter().map(|c| c.id.0);
        let trades = self.trades.iter().map(|t| t.id.0);
        users.chain(challenges).chain(trades).max().unwrap_or(0)
    }
}

impl Ledger {
    /// Capture everything. Each book is read under its own lock, so no record is torn.
    pub fn snapshot(&self) -> LedgerSnapshot {
        let mut challenges = Vec::new();
        let mut trades = Vec::new();
        // books before users: users are never removed, so every owner captured here
        // is still present when the user table is read next
        for book in self.all_books() {
            let book = book.lock();
            challenges.push(book.challenge.clone());
            trades.extend(book.trades.iter().cloned());
        }
        let mut users: Vec<User> = self.users.read().values().cloned().collect();

        users.sort_by_key(|u| u.id);
        challenges.sort_by_key(|c| c.id);
        trades.sort_by_key(|t| t.id);

        LedgerSnapshot {
            version: SNAPSHOT_VERSION,
            // read last so it covers every id captured above
            next_id: self.ids.peek(),
            users,
            challenges,
            trades,
        }
    }

    /// Rebuild from a snapshot, checking every foreign key on the way in.
    pub fn from_snapshot(snapshot: LedgerSnapshot, clock: Arc<dyn Clock>) -> Result<Self, LedgerError> {
        let mut seen_ids = HashSet::new();
        let mut check_unique = |id: u64| {
            if seen_ids.insert(id) {
                Ok(())
            } else {
                Err(LedgerError::Integrity(format!("id {id} appears more than once")))
            }
        };

        let mut users: HashMap<UserId, User> = HashMap::new();
        let mut emails = HashSet::new();
        for user in &snapshot.users {
            check_unique(user.id.0)?;
            if !emails.insert(user.email.clone()) {
                return Err(LedgerError::Integrity(format!("email {:?} registered twice", user.email)));
            }
            users.insert(user.id, user.clone());
        }

        let mut books: HashMap<ChallengeId, ChallengeBook> = HashMap::new();
        for challenge in &snapshot.challenges {
            check_unique(challenge.id.0)?;
            if !users.contains_key(&challenge.user_id) {
                return Err(LedgerError::Integrity(format!(
                    "challenge {} belongs to unknown user {}",
                    challenge.id, challenge.user_id
                )));
            }
            books.insert(challenge.id, ChallengeBook::new(challenge.clone()));
        }

        for trade in &snapshot.trades {
            check_unique(trade.id.0)?;
            let book = books
                .get_mut(&trade.challenge_id)
                .filter(|book| book.challenge.user_id == trade.user_id)
                .ok_or_else(|| LedgerError::orphan_trade(trade.id, trade.challenge_id))?;
            book.trades.push(trade.clone());
        }

        let ids = IdAllocator::starting_at(snapshot.next_id);
        ids.resume_after(snapshot.max_id());

        info!(
            users = users.len(),
            challenges = books.len(),
            trades = snapshot.trades.len(),
            next_id = ids.peek(),
            "ledger restored"
        );

        Ok(Self {
            ids,
            clock,
            users: RwLock::new(users),
            books: RwLock::new(
                books
                    .into_iter()
                    .map(|(id, book)| (id, Arc::new(Mutex::new(book))))
                    .collect(),
            ),
        })
    }
}
