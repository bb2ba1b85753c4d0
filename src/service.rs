//! Account service: the operation surface the transport layer calls.
//!
//! Every mutating call runs the ledger operation, then flushes. A failed flush is
//! reported as `PERSISTENCE_UNAVAILABLE`; the in-memory change is kept and the next
//! successful flush carries it.

use crate::api::{
    parse_request, ApiError, ApiResponse, CreateChallengeRequest, ErrorCode, RecordTradeRequest,
    RegisterUserRequest,
};
use crate::challenge::{Challenge, NewChallenge, NewTrade, Trade, UserProfile};
use crate::clock::{Clock, SystemClock};
use crate::config::{ConfigError, ServiceConfig};
use crate::ledger::Ledger;
use crate::patch::ChallengePatch;
use crate::persistence::{Persister, SnapshotFileStore, Store, StoreError};
use crate::risk::RiskLimits;
use crate::types::{ChallengeId, Money, UserId};
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};

/// Why a service could not be opened.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug)]
pub struct AccountService {
    ledger: Arc<Ledger>,
    persister: Arc<Persister>,
    config: ServiceConfig,
    // serializes the "has no challenge yet" check with the seeding create
    seeding: Mutex<()>,
}

impl AccountService {
    /// Open against the snapshot file named in `config`.
    pub fn open(config: ServiceConfig) -> Result<Self, ServiceError> {
        let store = SnapshotFileStore::new(config.data_file.clone());
        Self::with_store(config, store, Arc::new(SystemClock))
    }

    pub fn with_store(
        config: ServiceConfig,
        store: impl Store + 'static,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ServiceError> {
        config.validate()?;
        let persister = Persister::new(store);
        let ledger = persister.open_ledger(clock)?;
        info!(
            users = ledger.user_count(),
            challenges = ledger.challenge_count(),
            strict_patch_fields = config.strict_patch_fields,
            "account service ready"
        );
        Ok(Self {
            ledger: Arc::new(ledger),
            persister: Arc::new(persister),
            config,
            seeding: Mutex::new(()),
        })
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    fn persist(&self) -> Result<(), ApiError> {
        self.persister.flush(&self.ledger).map_err(|e| {
            warn!(error = %e, "mutation applied in memory but not persisted");
            ApiError::from(e)
        })
    }

    /// Register a user and, if configured, open their starter challenge.
    pub fn register_user(&self, req: RegisterUserRequest) -> Result<UserProfile, ApiError> {
        // the template is checked first so a bad one cannot leave a user without a challenge
        if self.config.seed_challenge_on_register {
            self.config
                .default_challenge
                .validate()
                .map_err(|e| ApiError::new(ErrorCode::InvalidParameter, e.to_string()))?;
        }

        let user = self.ledger.register_user(
            &req.email,
            &req.name,
            &req.credential,
            req.role.unwrap_or_default(),
        )?;

        if self.config.seed_challenge_on_register {
            self.seed_if_empty(user.id)?;
        }

        self.persist()?;
        Ok(user.profile())
    }

    /// Called once the external authenticator accepted a login. A user left without
    /// any challenge gets the starter one again.
    pub fn record_login(&self, user_id: UserId) -> Result<UserProfile, ApiError> {
        let user = self.ledger.touch_user(user_id)?;
        if self.config.seed_challenge_on_register {
            self.seed_if_empty(user_id)?;
        }
        self.persist()?;
        Ok(user.profile())
    }

    fn seed_if_empty(&self, user_id: UserId) -> Result<Option<Challenge>, ApiError> {
        let _guard = self.seeding.lock();
        if !self.ledger.challenges_for_user(user_id).is_empty() {
            return Ok(None);
        }
        let challenge = self
            .ledger
            .create_challenge(self.config.default_challenge.for_user(user_id))?;
        info!(user_id = %user_id, challenge_id = %challenge.id, "starter challenge opened at login");
        Ok(Some(challenge))
    }

    /// Every user, highest id first. Credentials never leave the ledger.
    pub fn list_users(&self) -> Vec<UserProfile> {
        self.ledger.all_users().iter().map(|u| u.profile()).collect()
    }

    /// Every challenge across all users, highest id first.
    pub fn list_all_challenges(&self) -> Vec<Challenge> {
        self.ledger.all_challenges()
    }

    pub fn create_challenge(&self, req: CreateChallengeRequest) -> Result<Challenge, ApiError> {
        let params = NewChallenge {
            user_id: req.user_id,
            initial_balance: Money::new(req.initial_balance),
            current_balance: req.current_balance.map(Money::new),
            limits: RiskLimits::new(
                Money::new(req.max_daily_loss),
                Money::new(req.max_total_loss),
                Money::new(req.profit_target),
            ),
        };
        let challenge = self.ledger.create_challenge(params)?;
        self.persist()?;
        Ok(challenge)
    }

    pub fn list_challenges(&self, user_id: UserId) -> Vec<Challenge> {
        self.ledger.challenges_for_user(user_id)
    }

    pub fn list_trades(&self, user_id: UserId) -> Vec<Trade> {
        self.ledger.trades_for_user(user_id)
    }

    /// Patch a challenge from an external body. An empty patch fails before storage is touched.
    pub fn update_challenge(
        &self,
        challenge_id: ChallengeId,
        body: &Value,
    ) -> Result<Challenge, ApiError> {
        let fields = body.as_object().ok_or_else(|| {
            ApiError::new(ErrorCode::InvalidParameter, "update body must be a JSON object")
        })?;
        let patch = ChallengePatch::from_external(fields, self.config.strict_patch_fields)
            .map_err(|e| ApiError::new(ErrorCode::InvalidParameter, e.to_string()))?;
        if patch.is_empty() {
            return Err(ApiError::new(ErrorCode::InvalidParameter, "no fields to update"));
        }

        let challenge = self.ledger.update_challenge(challenge_id, &patch)?;
        self.persist()?;
        Ok(challenge)
    }

    pub fn record_trade(&self, req: RecordTradeRequest) -> Result<Trade, ApiError> {
        let trade = self.ledger.record_trade(NewTrade {
            user_id: req.user_id,
            challenge_id: req.challenge_id,
            symbol: req.symbol,
            side: req.side,
            price: req.price,
            quantity: req.quantity,
            pnl: req.pnl.map(Money::new).unwrap_or_default(),
        })?;
        self.persist()?;
        Ok(trade)
    }

    // wire entry points: raw JSON in, envelope out

    pub fn handle_register(&self, body: Value) -> ApiResponse {
        let result = parse_request(body).and_then(|req| self.register_user(req));
        ApiResponse::from_result(result, ApiResponse::with_user)
    }

    pub fn handle_create_challenge(&self, body: Value) -> ApiResponse {
        let result = parse_request(body).and_then(|req| self.create_challenge(req));
        ApiResponse::from_result(result, ApiResponse::with_challenge)
    }

    pub fn handle_update_challenge(&self, challenge_id: ChallengeId, body: &Value) -> ApiResponse {
        ApiResponse::from_result(self.update_challenge(challenge_id, body), |_| ApiResponse::ok())
    }

    pub fn handle_record_trade(&self, body: Value) -> ApiResponse {
        let result = parse_request(body).and_then(|req| self.record_trade(req));
        ApiResponse::from_result(result, |_| ApiResponse::ok())
    }
}
