//! Account ledger: the authoritative in-memory state.

mod challenges;
mod core;
mod results;
mod snapshot;
mod trades;
mod users;

pub use self::core::Ledger;
pub use results::LedgerError;
pub use snapshot::{LedgerSnapshot, SNAPSHOT_VERSION};
