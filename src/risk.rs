//! Challenge risk rules.
//!
//! Decides what a proposed balance means for a challenge: still active, passed (profit
//! target reached) or failed (a loss limit breached). Pure functions; the ledger applies
//! the result.
//!
//! Daily loss is bucketed per UTC calendar day. The bucket opens at the balance held
//! before the first trade of that day, so `daily_loss = opening_balance - proposed`.

use crate::challenge::{require_positive, Challenge, ValidationError};
use crate::types::{ChallengeStatus, Money, Timestamp};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The three limits every challenge is created with. All positive magnitudes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskLimits {
    /// Largest loss tolerated within one UTC trading day.
    pub max_daily_loss: Money,
    /// Largest loss tolerated against the initial balance.
    pub max_total_loss: Money,
    /// Gain over the initial balance that passes the challenge.
    pub profit_target: Money,
}

impl RiskLimits {
    pub fn new(max_daily_loss: Money, max_total_loss: Money, profit_target: Money) -> Self {
        Self {
            max_daily_loss,
            max_total_loss,
            profit_target,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        require_positive("max_daily_loss", self.max_daily_loss)?;
        require_positive("max_total_loss", self.max_total_loss)?;
        require_positive("profit_target", self.profit_target)
    }
}

/// Which rule closed the challenge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Breach {
    TotalLoss,
    DailyLoss,
    ProfitTarget,
}

impl fmt::Display for Breach {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Breach::TotalLoss => f.write_str("max total loss reached"),
            Breach::DailyLoss => f.write_str("max daily loss reached"),
            Breach::ProfitTarget => f.write_str("profit target reached"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RiskAssessment {
    /// initial - proposed. positive when the account is down since inception.
    pub total_loss: Money,
    /// day opening - proposed. positive when the account is down today.
    pub daily_loss: Money,
    /// proposed - initial.
    pub profit: Money,
    pub status: ChallengeStatus,
    pub breach: Option<Breach>,
}

/// Full breakdown for a proposed balance at instant `now`. fails only when a
/// difference does not fit in a decimal.
pub fn assess(
    challenge: &Challenge,
    proposed_balance: Money,
    now: Timestamp,
) -> Result<RiskAssessment, ValidationError> {
    let limits = challenge.limits();
    let day_opening = challenge.day_opening_balance(now.trading_day());

    let total_loss = challenge
        .initial_balance
        .checked_sub(proposed_balance)
        .ok_or(ValidationError::OutOfRange("total loss"))?;
    let daily_loss = day_opening
        .checked_sub(proposed_balance)
        .ok_or(ValidationError::OutOfRange("daily loss"))?;
    let profit = proposed_balance
        .checked_sub(challenge.initial_balance)
        .ok_or(ValidationError::OutOfRange("profit"))?;

    // order matters: a loss breach wins over anything else
    let breach = if total_loss >= limits.max_total_loss {
        Some(Breach::TotalLoss)
    } else if daily_loss >= limits.max_daily_loss {
        Some(Breach::DailyLoss)
    } else if profit >= limits.profit_target {
        Some(Breach::ProfitTarget)
    } else {
        None
    };

    let status = match breach {
        Some(Breach::TotalLoss) | Some(Breach::DailyLoss) => ChallengeStatus::Failed,
        Some(Breach::ProfitTarget) => ChallengeStatus::Passed,
        None => ChallengeStatus::Active,
    };

    Ok(RiskAssessment {
        total_loss,
        daily_loss,
        profit,
        status,
        breach,
    })
}

/// Status a challenge would have after moving to `proposed_balance` at `now`.
pub fn evaluate(
    challenge: &Challenge,
    proposed_balance: Money,
    now: Timestamp,
) -> Result<ChallengeStatus, ValidationError> {
    assess(challenge, proposed_balance, now).map(|a| a.status)
}
