// 8.0.2: errors for ledger operations.

use crate::challenge::ValidationError;
use crate::types::{ChallengeId, ChallengeStatus, TradeId, UserId};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    #[error("Invalid parameter: {0}")]
    InvalidParameter(#[from] ValidationError),

    #[error("User {0} not found")]
    UserNotFound(UserId),

    #[error("Challenge {0} not found")]
    ChallengeNotFound(ChallengeId),

    #[error("Challenge {id} is {status} and accepts no further changes")]
    ChallengeClosed { id: ChallengeId, status: ChallengeStatus },

    #[error("Email {0:?} is already registered")]
    EmailTaken(String),

    #[error("Snapshot integrity: {0}")]
    Integrity(String),
}

impl LedgerError {
    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        LedgerError::InvalidParameter(ValidationError::Malformed(reason.into()))
    }

    pub(crate) fn orphan_trade(trade: TradeId, challenge: ChallengeId) -> Self {
        LedgerError::Integrity(format!(
            "trade {trade} references challenge {challenge} which is missing or owned by another user"
        ))
    }
}
