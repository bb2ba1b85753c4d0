// 7.0 config.rs: service settings in one place. storage location, patch strictness,
// and the challenge every new user starts with.

use anyhow::Context;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::challenge::NewChallenge;
use crate::risk::RiskLimits;
use crate::types::{Money, UserId};

/** 7.1: the challenge template handed out at registration */
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChallengeTemplate {
    // Starting capital
    pub initial_balance: Decimal,
    // Loss allowed within one UTC day
    pub max_daily_loss: Decimal,
    // Loss allowed against the initial balance
    pub max_total_loss: Decimal,
    // Gain that passes the challenge
    pub profit_target: Decimal,
}

impl Default for ChallengeTemplate {
    fn default() -> Self {
        Self {
            initial_balance: dec!(10000),
            max_daily_loss: dec!(500),
            max_total_loss: dec!(1000),
            profit_target: dec!(1000),
        }
    }
}

impl ChallengeTemplate {
    pub fn initial_balance(&self) -> Money {
        Money::new(self.initial_balance)
    }

    pub fn limits(&self) -> RiskLimits {
        RiskLimits::new(
            Money::new(self.max_daily_loss),
            Money::new(self.max_total_loss),
            Money::new(self.profit_target),
        )
    }

    pub fn for_user(&self, user_id: UserId) -> NewChallenge {
        NewChallenge::new(user_id, self.initial_balance(), self.limits())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let amounts = [
            ("initial_balance", self.initial_balance),
            ("max_daily_loss", self.max_daily_loss),
            ("max_total_loss", self.max_total_loss),
            ("profit_target", self.profit_target),
        ];
        for (field, value) in amounts {
            if value <= Decimal::ZERO {
                return Err(ConfigError::InvalidTemplate {
                    reason: format!("{field} must be positive, got {value}"),
                });
            }
        }

        // a daily limit above the total limit can never trigger
        if self.max_daily_loss > self.max_total_loss {
            return Err(ConfigError::InvalidTemplate {
                reason: "max_daily_loss exceeds max_total_loss".to_string(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    // Where the snapshot document lives
    pub data_file: PathBuf,
    // Reject unknown keys in challenge patches instead of skipping them
    pub strict_patch_fields: bool,
    // Open one challenge from `default_challenge` for every new user, and at login
    // for any user left without one
    pub seed_challenge_on_register: bool,
    pub default_challenge: ChallengeTemplate,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            data_file: PathBuf::from("users_data.json"),
            strict_patch_fields: false,
            seed_challenge_on_register: true,
            default_challenge: ChallengeTemplate::default(),
        }
    }
}

impl ServiceConfig {
    /// Read a TOML file. every key is optional.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::from_toml(&content).with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        let config: ServiceConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    // Preset for tests and the simulator: strict patches, no auto-seeded challenge
    pub fn strict() -> Self {
        Self {
            strict_patch_fields: true,
            seed_challenge_on_register: false,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.default_challenge.validate()?;

        if self.data_file.as_os_str().is_empty() {
            return Err(ConfigError::InvalidStorage {
                reason: "data_file is empty".to_string(),
            });
        }

        Ok(())
    }
}

// Configuration validation errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid default challenge: {reason}")]
    InvalidTemplate { reason: String },
    #[error("invalid storage settings: {reason}")]
    InvalidStorage { reason: String },
}
