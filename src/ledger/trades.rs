//! Trade recording and history.

use super::core::Ledger;
use super::results::LedgerError;
use crate::challenge::{NewTrade, Trade, ValidationError};
use crate::risk;
use crate::types::{ChallengeId, UserId};
use tracing::{debug, info, warn};

impl Ledger {
    /// Record one trade against an active challenge.
    ///
    /// Resolve, closed-check, evaluate and write all happen under the challenge's lock,
    /// so two trades can never be evaluated against the same stale balance.
    pub fn record_trade(&self, request: NewTrade) -> Result<Trade, LedgerError> {
        let price = request.validate()?;

        let book = self
            .book(request.challenge_id)
            .ok_or(LedgerError::ChallengeNotFound(request.challenge_id))?;
        let mut book = book.lock();

        // someone else's challenge looks exactly like a missing one
        if book.challenge.user_id != request.user_id {
            return Err(LedgerError::ChallengeNotFound(request.challenge_id));
        }

        if book.challenge.is_terminal() {
            warn!(
                challenge_id = %request.challenge_id,
                status = %book.challenge.status,
                "trade on closed challenge rejected"
            );
            return Err(LedgerError::ChallengeClosed {
                id: request.challenge_id,
                status: book.challenge.status,
            });
        }

        let now = self.clock.now();
        // nothing is written until the arithmetic is known to fit
        let new_balance = book
            .challenge
            .current_balance
            .checked_add(request.pnl)
            .ok_or(ValidationError::OutOfRange("balance"))?;
        let assessment = risk::assess(&book.challenge, new_balance, now)?;

        let trade = Trade {
            id: self.ids.next_trade(),
            user_id: request.user_id,
            challenge_id: request.challenge_id,
            symbol: request.symbol,
            side: request.side,
            price,
            quantity: request.quantity,
            pnl: request.pnl,
            timestamp: now,
        };

        book.challenge.settle(new_balance, assessment.status, now);
        book.trades.push(trade.clone());

        match assessment.breach {
            Some(breach) => info!(
                challenge_id = %trade.challenge_id,
                trade_id = %trade.id,
                balance = %new_balance,
                status = %assessment.status,
                %breach,
                "challenge closed by trade"
            ),
            None => debug!(
                challenge_id = %trade.challenge_id,
                trade_id = %trade.id,
                pnl = %trade.pnl,
                balance = %new_balance,
                daily_loss = %assessment.daily_loss,
                "trade recorded"
            ),
        }

        Ok(trade)
    }

    /// Every trade the user made, across all their challenges. newest first.
    pub fn trades_for_user(&self, user_id: UserId) -> Vec<Trade> {
        let mut out: Vec<Trade> = Vec::new();
        for book in self.all_books() {
            let book = book.lock();
            if book.challenge.user_id == user_id {
                out.extend(book.trades.iter().cloned());
            }
        }
        sort_newest_first(&mut out);
        out
    }

    pub fn trades_for_challenge(&self, challenge_id: ChallengeId) -> Vec<Trade> {
        let mut out = self
            .book(challenge_id)
            .map(|book| book.lock().trades.clone())
            .unwrap_or_default();
        sort_newest_first(&mut out);
        out
    }
}

fn sort_newest_first(trades: &mut [Trade]) {
    trades.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.id.cmp(&a.id)));
}
