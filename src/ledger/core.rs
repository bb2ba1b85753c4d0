// 8.0 ledger/core.rs: the ledger struct. holds users, challenge books, the id sequence and the clock.
//
// locking: the challenge map sits behind an RwLock that is only held long enough to find or
// insert a book. each book has its own mutex; every balance read-evaluate-write happens under it.
// no operation ever holds two book locks.

use crate::challenge::{Challenge, Trade, User};
use crate::clock::{Clock, SystemClock};
use crate::ids::IdAllocator;
use crate::types::{ChallengeId, Timestamp, UserId};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;

/// One challenge plus the trades recorded against it. the unit of locking.
#[derive(Debug, Clone)]
pub(super) struct ChallengeBook {
    pub(super) challenge: Challenge,
    pub(super) trades: Vec<Trade>,
}

impl ChallengeBook {
    pub(super) fn new(challenge: Challenge) -> Self {
        Self {
            challenge,
            trades: Vec::new(),
        }
    }
}

pub(super) type SharedBook = Arc<Mutex<ChallengeBook>>;

/** 8.1: main ledger struct. all live account state is owned here */
#[derive(Debug)]
pub struct Ledger {
    pub(super) ids: IdAllocator,
    pub(super) clock: Arc<dyn Clock>,
    pub(super) users: RwLock<HashMap<UserId, User>>,
    pub(super) books: RwLock<HashMap<ChallengeId, SharedBook>>,
}

impl Ledger {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            ids: IdAllocator::new(),
            clock,
            users: RwLock::new(HashMap::new()),
            books: RwLock::new(HashMap::new()),
        }
    }

    pub fn with_system_clock() -> Self {
        Self::new(Arc::new(SystemClock))
    }

    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    pub fn ids(&self) -> &IdAllocator {
        &self.ids
    }

    pub fn user_count(&self) -> usize {
        self.users.read().len()
    }

    pub fn challenge_count(&self) -> usize {
        self.books.read().len()
    }

    // clone the handle out so the map lock is released before the book is locked
    pub(super) fn book(&self, id: ChallengeId) -> Option<SharedBook> {
        self.books.read().get(&id).cloned()
    }

    pub(super) fn all_books(&self) -> Vec<SharedBook> {
        self.books.read().values().cloned().collect()
    }

    pub(super) fn user_exists(&self, id: UserId) -> bool {
        self.users.read().contains_key(&id)
    }
}

impl Default for Ledger {
    fn default() -> Self {
        Self::with_system_clock()
    }
}
