// challenge-core: account state engine for prop-trading evaluation challenges.
// every trade moves a challenge balance and is judged against its loss limits and
// profit target in the same critical section. state is snapshotted to storage after
// each mutation.
//
// file map (search X.0 for structs, X.1+ for logic):
//   1.x  types.rs: primitives: ids, Money, Price, Side, ChallengeStatus, Timestamp
//   2.x  ids.rs: one id sequence shared by users, challenges, trades
//   2.1  clock.rs: wall clock seam (system or manual)
//   3.x  challenge.rs: User, Challenge, Trade records and creation params
//   4.x  risk.rs: loss limits, profit target, UTC day bucketing
//   5.x  patch.rs: external field table and partial challenge updates
//   6.x  persistence.rs: Store trait, snapshot file, in-memory store, flush ordering
//   7.x  config.rs: storage path, patch strictness, default challenge template
//   8.x  ledger/: users, challenges, trades, snapshots under per-challenge locks
//   9.x  api.rs: request/response shapes and error codes
//   9.1  service.rs: operation surface: mutate, then flush

// core state
pub mod challenge;
pub mod clock;
pub mod ids;
pub mod ledger;
pub mod risk;
pub mod types;

// boundary
pub mod api;
pub mod config;
pub mod patch;
pub mod persistence;
pub mod service;

// re exports for convenience
pub use challenge::*;
pub use clock::{Clock, ManualClock, SystemClock};
pub use ids::IdAllocator;
pub use ledger::{Ledger, LedgerError, LedgerSnapshot, SNAPSHOT_VERSION};
pub use risk::*;
pub use types::*;
pub use api::{ApiError, ApiResponse, CreateChallengeRequest, ErrorCode, RecordTradeRequest, RegisterUserRequest};
pub use config::{ChallengeTemplate, ConfigError, ServiceConfig};
pub use patch::{ChallengeField, ChallengePatch, CHALLENGE_FIELDS};
pub use persistence::{MemoryStore, Persister, SnapshotFileStore, Store, StoreError};
pub use service::{AccountService, ServiceError};
