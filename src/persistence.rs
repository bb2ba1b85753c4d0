//! Durable ledger state.
//!
//! A [`Store`] keeps whole-ledger snapshots. [`SnapshotFileStore`] rewrites one JSON
//! document per flush (temp file, fsync, rename), so a reader or a crash sees either the
//! previous document or the new one. [`Persister`] orders flushes and captures the
//! snapshot inside that order, so the last document written always holds every mutation
//! that finished before it started.

use crate::clock::Clock;
use crate::ledger::{Ledger, LedgerError, LedgerSnapshot, SNAPSHOT_VERSION};
use parking_lot::Mutex;
use std::fmt::Debug;
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("snapshot could not be (de)serialized: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("storage unavailable: {0}")]
    Unavailable(String),

    #[error("snapshot version {found} is not supported (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },

    #[error("stored state is inconsistent: {0}")]
    Corrupt(#[from] LedgerError),
}

pub trait Store: Send + Sync + Debug {
    /// Last flushed snapshot, or `None` when nothing was ever stored.
    fn load(&self) -> Result<Option<LedgerSnapshot>, StoreError>;

    /// Durably replace the stored snapshot. Must not return before the data is safe.
    fn flush(&self, snapshot: &LedgerSnapshot) -> Result<(), StoreError>;
}

fn check_version(snapshot: &LedgerSnapshot) -> Result<(), StoreError> {
    if snapshot.version == SNAPSHOT_VERSION {
        Ok(())
    } else {
        Err(StoreError::UnsupportedVersion {
            found: snapshot.version,
            expected: SNAPSHOT_VERSION,
        })
    }
}

/// One JSON document on disk.
#[derive(Debug, Clone)]
pub struct SnapshotFileStore {
    path: PathBuf,
}

impl SnapshotFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "ledger".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl Store for SnapshotFileStore {
    fn load(&self) -> Result<Option<LedgerSnapshot>, StoreError> {
        let raw = match fs::read(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let snapshot: LedgerSnapshot = serde_json::from_slice(&raw)?;
        check_version(&snapshot)?;
        Ok(Some(snapshot))
    }

    fn flush(&self, snapshot: &LedgerSnapshot) -> Result<(), StoreError> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }

        let bytes = serde_json::to_vec_pretty(snapshot)?;
        let tmp = self.temp_path();
        {
            let mut file = File::create(&tmp)?;
            file.write_all(&bytes)?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

/// In-process store. Can be switched off to simulate an unreachable backend.
#[derive(Debug, Default)]
pub struct MemoryStore {
    snapshot: Mutex<Option<LedgerSnapshot>>,
    unavailable: AtomicBool,
    flushes: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_snapshot(snapshot: LedgerSnapshot) -> Self {
        let store = Self::default();
        *store.snapshot.lock() = Some(snapshot);
        store
    }

    pub fn set_available(&self, available: bool) {
        self.unavailable.store(!available, Ordering::SeqCst);
    }

    /// Successful flushes so far.
    pub fn flush_count(&self) -> usize {
        self.flushes.load(Ordering::SeqCst)
    }

    pub fn stored(&self) -> Option<LedgerSnapshot> {
        self.snapshot.lock().clone()
    }

    fn ensure_available(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable("memory store switched off".to_string()))
        } else {
            Ok(())
        }
    }
}

impl Store for MemoryStore {
    fn load(&self) -> Result<Option<LedgerSnapshot>, StoreError> {
        self.ensure_available()?;
        let snapshot = self.snapshot.lock().clone();
        if let Some(snapshot) = &snapshot {
            check_version(snapshot)?;
        }
        Ok(snapshot)
    }

    fn flush(&self, snapshot: &LedgerSnapshot) -> Result<(), StoreError> {
        self.ensure_available()?;
        *self.snapshot.lock() = Some(snapshot.clone());
        self.flushes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// lets a caller keep its own handle on the store (tests poke MemoryStore through it)
impl<S: Store + ?Sized> Store for Arc<S> {
    fn load(&self) -> Result<Option<LedgerSnapshot>, StoreError> {
        (**self).load()
    }

    fn flush(&self, snapshot: &LedgerSnapshot) -> Result<(), StoreError> {
        (**self).flush(snapshot)
    }
}

/// Owns the store and serializes flushes.
#[derive(Debug)]
pub struct Persister {
    store: Box<dyn Store>,
    order: Mutex<()>,
}

impl Persister {
    pub fn new(store: impl Store + 'static) -> Self {
        Self {
            store: Box::new(store),
            order: Mutex::new(()),
        }
    }

    /// Restore the ledger, or start (and immediately persist) an empty one.
    pub fn open_ledger(&self, clock: Arc<dyn Clock>) -> Result<Ledger, StoreError> {
        match self.store.load()? {
            Some(snapshot) => Ok(Ledger::from_snapshot(snapshot, clock)?),
            None => {
                info!("no stored ledger state, starting empty");
                let ledger = Ledger::new(clock);
                self.flush(&ledger)?;
                Ok(ledger)
            }
        }
    }

    /// Capture and write the ledger's current state.
    pub fn flush(&self, ledger: &Ledger) -> Result<(), StoreError> {
        let _order = self.order.lock();
        let snapshot = ledger.snapshot();
        match self.store.flush(&snapshot) {
            Ok(()) => {
                debug!(
                    challenges = snapshot.challenges.len(),
                    trades = snapshot.trades.len(),
                    next_id = snapshot.next_id,
                    "ledger flushed"
                );
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "ledger flush failed");
                Err(e)
            }
        }
    }
}
