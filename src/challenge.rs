//! Challenge, trade and user records.
//!
//! These are plain data: the ledger owns the live copies and hands out clones. A trade
//! refers to its challenge by id only.

use crate::risk::RiskLimits;
use crate::types::{
    ChallengeId, ChallengeStatus, Money, Price, Role, Side, Timestamp, TradeId, UserId,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub name: String,
    /// Produced and checked by the external authenticator; opaque here.
    pub credential: String,
    #[serde(default)]
    pub role: Role,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl User {
    pub fn profile(&self) -> UserProfile {
        UserProfile {
            id: self.id,
            email: self.email.clone(),
            name: self.name.clone(),
            role: self.role,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// What callers get to see of a user: everything but the credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: UserId,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Balance the challenge held when its current UTC trading day opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayAnchor {
    pub day: NaiveDate,
    pub opening_balance: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Challenge {
    pub id: ChallengeId,
    pub user_id: UserId,
    pub initial_balance: Money,
    pub current_balance: Money,
    pub status: ChallengeStatus,
    pub max_daily_loss: Money,
    pub max_total_loss: Money,
    pub profit_target: Money,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    // None until the first trade lands
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day_anchor: Option<DayAnchor>,
}

impl Challenge {
    pub fn new(
        id: ChallengeId,
        user_id: UserId,
        initial_balance: Money,
        opening_balance: Money,
        limits: RiskLimits,
        now: Timestamp,
    ) -> Self {
        Self {
            id,
            user_id,
            initial_balance,
            current_balance: opening_balance,
            status: ChallengeStatus::Active,
            max_daily_loss: limits.max_daily_loss,
            max_total_loss: limits.max_total_loss,
            profit_target: limits.profit_target,
            created_at: now,
            updated_at: now,
            day_anchor: None,
        }
    }

    pub fn limits(&self) -> RiskLimits {
        RiskLimits {
            max_daily_loss: self.max_daily_loss,
            max_total_loss: self.max_total_loss,
            profit_target: self.profit_target,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Reference balance for daily loss on `day`. a day with no trades yet opens at
    /// whatever the account holds right now.
    pub fn day_opening_balance(&self, day: NaiveDate) -> Money {
        match self.day_anchor {
            Some(anchor) if anchor.day == day => anchor.opening_balance,
            _ => self.current_balance,
        }
    }

    /// Write the outcome of one trade. the anchor rolls before the balance moves so a
    /// new day opens at the pre-trade balance.
    pub fn settle(&mut self, new_balance: Money, new_status: ChallengeStatus, now: Timestamp) {
        let day = now.trading_day();
        let opening = self.day_opening_balance(day);
        self.day_anchor = Some(DayAnchor {
            day,
            opening_balance: opening,
        });
        self.current_balance = new_balance;
        self.status = new_status;
        self.updated_at = now;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trade {
    pub id: TradeId,
    pub user_id: UserId,
    pub challenge_id: ChallengeId,
    pub symbol: String,
    #[serde(rename = "type")]
    pub side: Side,
    pub price: Price,
    pub quantity: u64,
    pub pnl: Money,
    pub timestamp: Timestamp,
}

/// Parameters for a fresh challenge. `current_balance` defaults to `initial_balance`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewChallenge {
    pub user_id: UserId,
    pub initial_balance: Money,
    pub current_balance: Option<Money>,
    pub limits: RiskLimits,
}

impl NewChallenge {
    pub fn new(user_id: UserId, initial_balance: Money, limits: RiskLimits) -> Self {
        Self {
            user_id,
            initial_balance,
            current_balance: None,
            limits,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        require_positive("initial_balance", self.initial_balance)?;
        if let Some(current) = self.current_balance {
            require_positive("current_balance", current)?;
        }
        self.limits.validate()
    }
}

/// A trade as submitted, before it has an id or a timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTrade {
    pub user_id: UserId,
    pub challenge_id: ChallengeId,
    pub symbol: String,
    pub side: Side,
    pub price: Decimal,
    pub quantity: u64,
    pub pnl: Money,
}

impl NewTrade {
    pub fn validate(&self) -> Result<Price, ValidationError> {
        if self.symbol.trim().is_empty() {
            return Err(ValidationError::Empty("symbol"));
        }
        if self.quantity == 0 {
            return Err(ValidationError::ZeroQuantity);
        }
        Price::new(self.price).ok_or(ValidationError::NonPositive {
            field: "price",
            value: self.price,
        })
    }
}

pub(crate) fn require_positive(field: &'static str, amount: Money) -> Result<(), ValidationError> {
    if amount.is_positive() {
        Ok(())
    } else {
        Err(ValidationError::NonPositive {
            field,
            value: amount.value(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("{field} must be strictly positive, got {value}")]
    NonPositive { field: &'static str, value: Decimal },

    #[error("{0} must not be empty")]
    Empty(&'static str),

    #[error("quantity must be a positive integer")]
    ZeroQuantity,

    #[error("{0} is out of the representable range")]
    OutOfRange(&'static str),

    #[error("{0}")]
    Malformed(String),
}
