//! Partial challenge updates.
//!
//! Callers patch a challenge with camelCase field names. [`CHALLENGE_FIELDS`] is the one
//! place that maps them to internal fields; parsing and rendering both go through it.

use crate::challenge::{Challenge, ValidationError};
use crate::types::{ChallengeStatus, Money};
use rust_decimal::Decimal;
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChallengeField {
    InitialBalance,
    CurrentBalance,
    MaxDailyLoss,
    MaxTotalLoss,
    ProfitTarget,
    Status,
}

/// External name -> internal field. the allow-list for patches.
pub const CHALLENGE_FIELDS: &[(&str, ChallengeField)] = &[
    ("initialBalance", ChallengeField::InitialBalance),
    ("currentBalance", ChallengeField::CurrentBalance),
    ("maxDailyLoss", ChallengeField::MaxDailyLoss),
    ("maxTotalLoss", ChallengeField::MaxTotalLoss),
    ("profitTarget", ChallengeField::ProfitTarget),
    ("status", ChallengeField::Status),
];

// always dropped, even in strict mode: clients echo the id back in the body
const IGNORED_KEYS: &[&str] = &["id"];

impl ChallengeField {
    pub fn from_external(name: &str) -> Option<Self> {
        CHALLENGE_FIELDS
            .iter()
            .find(|(external, _)| *external == name)
            .map(|(_, field)| *field)
    }

    pub fn external_name(&self) -> &'static str {
        CHALLENGE_FIELDS
            .iter()
            .find(|(_, field)| field == self)
            .map(|(external, _)| *external)
            .unwrap_or("unknown")
    }

    pub fn internal_name(&self) -> &'static str {
        match self {
            ChallengeField::InitialBalance => "initial_balance",
            ChallengeField::CurrentBalance => "current_balance",
            ChallengeField::MaxDailyLoss => "max_daily_loss",
            ChallengeField::MaxTotalLoss => "max_total_loss",
            ChallengeField::ProfitTarget => "profit_target",
            ChallengeField::Status => "status",
        }
    }

    // limits and the initial balance are magnitudes; the running balance may be anything
    fn requires_positive(&self) -> bool {
        !matches!(self, ChallengeField::CurrentBalance | ChallengeField::Status)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChallengePatch {
    pub initial_balance: Option<Money>,
    pub current_balance: Option<Money>,
    pub max_daily_loss: Option<Money>,
    pub max_total_loss: Option<Money>,
    pub profit_target: Option<Money>,
    pub status: Option<ChallengeStatus>,
}

impl ChallengePatch {
    pub fn is_empty(&self) -> bool {
        self.fields().is_empty()
    }

    /// Fields this patch touches, in table order.
    pub fn fields(&self) -> Vec<ChallengeField> {
        CHALLENGE_FIELDS
            .iter()
            .map(|(_, field)| *field)
            .filter(|field| self.touches(*field))
            .collect()
    }

    fn touches(&self, field: ChallengeField) -> bool {
        match field {
            ChallengeField::InitialBalance => self.initial_balance.is_some(),
            ChallengeField::CurrentBalance => self.current_balance.is_some(),
            ChallengeField::MaxDailyLoss => self.max_daily_loss.is_some(),
            ChallengeField::MaxTotalLoss => self.max_total_loss.is_some(),
            ChallengeField::ProfitTarget => self.profit_target.is_some(),
            ChallengeField::Status => self.status.is_some(),
        }
    }

    /// Parse an external body. Unknown keys are skipped unless `strict`.
    pub fn from_external(body: &Map<String, Value>, strict: bool) -> Result<Self, ValidationError> {
        let mut patch = ChallengePatch::default();
        for (key, value) in body {
            if IGNORED_KEYS.contains(&key.as_str()) {
                continue;
            }
            let Some(field) = ChallengeField::from_external(key) else {
                if strict {
                    return Err(ValidationError::Malformed(format!("unknown field {key:?}")));
                }
                continue;
            };
            patch.set(field, value)?;
        }
        Ok(patch)
    }

    fn set(&mut self, field: ChallengeField, value: &Value) -> Result<(), ValidationError> {
        if field == ChallengeField::Status {
            let raw = value.as_str().ok_or_else(|| {
                ValidationError::Malformed("status must be a string".to_string())
            })?;
            let status = raw
                .parse::<ChallengeStatus>()
                .map_err(|e| ValidationError::Malformed(e.to_string()))?;
            self.status = Some(status);
            return Ok(());
        }

        let amount = parse_money(field, value)?;
        if field.requires_positive() && !amount.is_positive() {
            return Err(ValidationError::NonPositive {
                field: field.internal_name(),
                value: amount.value(),
            });
        }
        let slot = match field {
            ChallengeField::InitialBalance => &mut self.initial_balance,
            ChallengeField::CurrentBalance => &mut self.current_balance,
            ChallengeField::MaxDailyLoss => &mut self.max_daily_loss,
            ChallengeField::MaxTotalLoss => &mut self.max_total_loss,
            ChallengeField::ProfitTarget => &mut self.profit_target,
            ChallengeField::Status => return Ok(()),
        };
        *slot = Some(amount);
        Ok(())
    }

    /// Render back under external names. inverse of `from_external`.
    pub fn to_external(&self) -> Map<String, Value> {
        let mut out = Map::new();
        for field in self.fields() {
            let value = match field {
                ChallengeField::Status => self.status.map(|s| Value::from(s.as_str())),
                ChallengeField::InitialBalance => self.initial_balance.map(money_value),
                ChallengeField::CurrentBalance => self.current_balance.map(money_value),
                ChallengeField::MaxDailyLoss => self.max_daily_loss.map(money_value),
                ChallengeField::MaxTotalLoss => self.max_total_loss.map(money_value),
                ChallengeField::ProfitTarget => self.profit_target.map(money_value),
            };
            if let Some(value) = value {
                out.insert(field.external_name().to_string(), value);
            }
        }
        out
    }

    /// Write every touched field onto `challenge`. no re-evaluation happens here.
    pub fn apply_to(&self, challenge: &mut Challenge) {
        if let Some(v) = self.initial_balance {
            challenge.initial_balance = v;
        }
        if let Some(v) = self.current_balance {
            challenge.current_balance = v;
        }
        if let Some(v) = self.max_daily_loss {
            challenge.max_daily_loss = v;
        }
        if let Some(v) = self.max_total_loss {
            challenge.max_total_loss = v;
        }
        if let Some(v) = self.profit_target {
            challenge.profit_target = v;
        }
        if let Some(v) = self.status {
            challenge.status = v;
        }
    }
}

fn parse_money(field: ChallengeField, value: &Value) -> Result<Money, ValidationError> {
    serde_json::from_value::<Decimal>(value.clone())
        .map(Money::new)
        .map_err(|_| {
            ValidationError::Malformed(format!(
                "{} must be a number, got {value}",
                field.external_name()
            ))
        })
}

// decimals travel as strings so nothing is lost
fn money_value(amount: Money) -> Value {
    Value::from(amount.value().to_string())
}
