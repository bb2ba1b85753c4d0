//! Request and response shapes the transport layer exchanges with the service.
//!
//! Requests use the external camelCase names. Money fields accept JSON numbers or
//! numeric strings.

use crate::challenge::{Challenge, UserProfile};
use crate::ledger::LedgerError;
use crate::persistence::StoreError;
use crate::types::{ChallengeId, Role, Side, UserId};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterUserRequest {
    pub email: String,
    pub name: String,
    // the authenticator hands us its hash under the old form field name
    #[serde(alias = "password", alias = "passwordHash")]
    pub credential: String,
    #[serde(default)]
    pub role: Option<Role>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateChallengeRequest {
    pub user_id: UserId,
    pub initial_balance: Decimal,
    #[serde(default)]
    pub current_balance: Option<Decimal>,
    pub max_daily_loss: Decimal,
    pub max_total_loss: Decimal,
    pub profit_target: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordTradeRequest {
    pub user_id: UserId,
    pub challenge_id: ChallengeId,
    pub symbol: String,
    #[serde(rename = "type")]
    pub side: Side,
    pub price: Decimal,
    pub quantity: u64,
    #[serde(default)]
    pub pnl: Option<Decimal>,
}

/// Deserialize a request body; any shape problem is an invalid parameter.
pub fn parse_request<T: DeserializeOwned>(body: Value) -> Result<T, ApiError> {
    serde_json::from_value(body)
        .map_err(|e| ApiError::new(ErrorCode::InvalidParameter, format!("malformed request: {e}")))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    InvalidParameter,
    NotFound,
    ChallengeClosed,
    Conflict,
    PersistenceUnavailable,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorCode::InvalidParameter => "INVALID_PARAMETER",
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::ChallengeClosed => "CHALLENGE_CLOSED",
            ErrorCode::Conflict => "CONFLICT",
            ErrorCode::PersistenceUnavailable => "PERSISTENCE_UNAVAILABLE",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{code}: {message}")]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        let code = match &err {
            LedgerError::InvalidParameter(_) => ErrorCode::InvalidParameter,
            LedgerError::UserNotFound(_) | LedgerError::ChallengeNotFound(_) => ErrorCode::NotFound,
            LedgerError::ChallengeClosed { .. } => ErrorCode::ChallengeClosed,
            LedgerError::EmailTaken(_) => ErrorCode::Conflict,
            LedgerError::Integrity(_) => ErrorCode::PersistenceUnavailable,
        };
        ApiError::new(code, err.to_string())
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError::new(ErrorCode::PersistenceUnavailable, err.to_string())
    }
}

/// `{success, ...}` envelope for mutating operations. listings are bare arrays.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub challenge: Option<Challenge>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<UserProfile>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<ErrorCode>,
}

impl ApiResponse {
    pub fn ok() -> Self {
        Self {
            success: true,
            challenge: None,
            user: None,
            error: None,
            code: None,
        }
    }

    pub fn with_challenge(challenge: Challenge) -> Self {
        Self {
            challenge: Some(challenge),
            ..Self::ok()
        }
    }

    pub fn with_user(user: UserProfile) -> Self {
        Self {
            user: Some(user),
            ..Self::ok()
        }
    }

    pub fn failure(err: ApiError) -> Self {
        Self {
            success: false,
            challenge: None,
            user: None,
            error: Some(err.message),
            code: Some(err.code),
        }
    }

    /// Collapse a service result into the envelope.
    pub fn from_result<T>(result: Result<T, ApiError>, wrap: impl FnOnce(T) -> Self) -> Self {
        match result {
            Ok(value) => wrap(value),
            Err(err) => Self::failure(err),
        }
    }
}
