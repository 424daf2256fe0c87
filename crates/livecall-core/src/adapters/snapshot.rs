//! JSON file persistence: the server's state snapshot and the client's
//! session cache.
//!
//! Writes go to a temporary sibling file which is synced and then renamed
//! over the target, so readers only ever see a complete document.

use std::fs::{self, File};
use std::io::Write;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::Context;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::application::market::MarketService;
use crate::application::ports::SessionCache;
use crate::domain::account::{AccountId, AccountRecord};
use crate::domain::billing::Credits;
use crate::domain::error::MarketResult;
use crate::domain::session::Session;

use super::account_store::InMemoryAccountStore;
use super::ledger::InMemoryLedger;

/// A JSON document on disk, replaced atomically on every save.
pub struct AtomicJsonFile<T> {
    path: PathBuf,
    _marker: PhantomData<T>,
}

impl<T> AtomicJsonFile<T>
where
    T: Serialize + DeserializeOwned,
{
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            _marker: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `None` when the file is missing or blank.
    pub fn load(&self) -> anyhow::Result<Option<T>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let text = fs::read_to_string(&self.path)
            .with_context(|| format!("reading {}", self.path.display()))?;
        if text.trim().is_empty() {
            return Ok(None);
        }
        let data = serde_json::from_str(&text)
            .with_context(|| format!("parsing {}", self.path.display()))?;
        Ok(Some(data))
    }

    pub fn save(&self, data: &T) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_vec_pretty(data)?;

        let tmp_path = self.temp_path()?;
        let mut tmp = File::create(&tmp_path)
            .with_context(|| format!("creating {}", tmp_path.display()))?;
        tmp.write_all(&json)?;
        tmp.sync_all()?;
        drop(tmp);

        fs::rename(&tmp_path, &self.path)
            .with_context(|| format!("replacing {}", self.path.display()))?;
        debug!(path = %self.path.display(), bytes = json.len(), "Saved");
        Ok(())
    }

    pub fn remove(&self) -> anyhow::Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("removing {}", self.path.display())),
        }
    }

    fn temp_path(&self) -> anyhow::Result<PathBuf> {
        let name = self
            .path
            .file_name()
            .with_context(|| format!("{} has no file name", self.path.display()))?;
        let mut tmp_name = name.to_os_string();
        tmp_name.push(".tmp");
        Ok(self.path.with_file_name(tmp_name))
    }
}

// ---------------------------------------------------------------------------
// Server state
// ---------------------------------------------------------------------------

/// Everything the shared store needs to come back after a restart.
///
/// Id counters are implied: the next account id follows the highest stored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub accounts: Vec<AccountRecord>,
    pub balances: Vec<(AccountId, Credits)>,
}

impl MarketSnapshot {
    /// Rebuild the in-memory adapters. Payers without a stored balance get
    /// `opening_balance` on first access, as usual.
    pub fn into_adapters(
        self,
        opening_balance: Credits,
    ) -> MarketResult<(InMemoryAccountStore, InMemoryLedger)> {
        let store = InMemoryAccountStore::from_records(self.accounts)?;
        let ledger = InMemoryLedger::from_balances(opening_balance, self.balances);
        Ok((store, ledger))
    }
}

pub type SnapshotFile = AtomicJsonFile<MarketSnapshot>;

/// Writes the service state to a [`SnapshotFile`] after each mutation.
pub struct StatePersister {
    file: SnapshotFile,
    service: Arc<MarketService>,
    write_lock: Mutex<()>,
}

impl StatePersister {
    pub fn new(file: SnapshotFile, service: Arc<MarketService>) -> Self {
        Self {
            file,
            service,
            write_lock: Mutex::new(()),
        }
    }

    /// Export and save. Concurrent callers are serialized so the file always
    /// ends up holding the state seen by the last writer.
    pub fn save(&self) -> anyhow::Result<()> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| anyhow::anyhow!("snapshot lock poisoned"))?;
        let (accounts, balances) = self.service.export_state()?;
        self.file.save(&MarketSnapshot { accounts, balances })
    }
}

// ---------------------------------------------------------------------------
// Client session cache
// ---------------------------------------------------------------------------

/// [`SessionCache`] backed by one JSON file per client.
pub struct FileSessionCache {
    file: AtomicJsonFile<Session>,
}

impl FileSessionCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            file: AtomicJsonFile::new(path),
        }
    }
}

impl SessionCache for FileSessionCache {
    fn load(&self) -> anyhow::Result<Option<Session>> {
        self.file.load()
    }

    fn store(&self, session: &Session) -> anyhow::Result<()> {
        self.file.save(session)
    }

    fn clear(&self) -> anyhow::Result<()> {
        self.file.remove()
    }
}
