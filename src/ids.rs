//! Shared identifier sequence.
//!
//! Users, challenges and trades draw from one counter so an id is unique across all
//! three tables. Survives restarts by resuming past the highest persisted value.

use crate::types::{ChallengeId, TradeId, UserId};
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug)]
pub struct IdAllocator {
    next: AtomicU64,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::starting_at(1)
    }

    pub fn starting_at(first: u64) -> Self {
        Self {
            next: AtomicU64::new(first.max(1)),
        }
    }

    /// Strictly greater than every value handed out before, from any thread.
    pub fn next(&self) -> u64 {
        self.next.fetch_add(1, Ordering::SeqCst)
    }

    /// High-water mark: the value the next call would return.
    pub fn peek(&self) -> u64 {
        self.next.load(Ordering::SeqCst)
    }

    /// Make sure nothing at or below `max_seen` is ever issued. never moves backwards.
    pub fn resume_after(&self, max_seen: u64) {
        self.next.fetch_max(max_seen.saturating_add(1), Ordering::SeqCst);
    }

    pub fn next_user(&self) -> UserId {
        UserId(self.next())
    }

    pub fn next_challenge(&self) -> ChallengeId {
        ChallengeId(self.next())
    }

    pub fn next_trade(&self) -> TradeId {
        TradeId(self.next())
    }
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::new()
    }
}
