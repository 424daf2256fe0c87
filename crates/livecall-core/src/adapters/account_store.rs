//! In-memory [`AccountStore`] adapter with per-record locking.
//!
//! The index (id order + handle lookup) sits behind one `RwLock`; each record
//! has its own `Mutex`. Record mutations hold the index read lock so a
//! concurrent removal cannot slip in between lookup and write.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use tracing::debug;

use crate::application::ports::AccountStore;
use crate::domain::account::{Account, AccountId, AccountRecord, NewAccount, SecretHash};
use crate::domain::error::{MarketError, MarketResult};

#[derive(Default)]
struct StoreIndex {
    /// Keyed by id, which is monotonic, so iteration is registration order.
    records: BTreeMap<AccountId, Arc<Mutex<AccountRecord>>>,
    by_handle: HashMap<String, AccountId>,
}

pub struct InMemoryAccountStore {
    index: RwLock<StoreIndex>,
    next_id: AtomicU64,
}

fn poisoned<T>(_: T) -> MarketError {
    MarketError::storage("account store lock poisoned")
}

impl InMemoryAccountStore {
    pub fn new() -> Self {
        Self {
            index: RwLock::new(StoreIndex::default()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Rebuild a store from persisted records.
    pub fn from_records(records: Vec<AccountRecord>) -> MarketResult<Self> {
        let mut index = StoreIndex::default();
        let mut max_id = 0;
        for record in records {
            let id = record.account.id;
            let handle = record.account.handle.clone();
            if index.by_handle.insert(handle.clone(), id).is_some() {
                return Err(MarketError::storage(format!(
                    "duplicate handle '{handle}' in persisted state"
                )));
            }
            max_id = max_id.max(id.0);
            index.records.insert(id, Arc::new(Mutex::new(record)));
        }
        Ok(Self {
            index: RwLock::new(index),
            next_id: AtomicU64::new(max_id + 1),
        })
    }
}

impl Default for InMemoryAccountStore {
    fn default() -> Self {
        Self::new()
    }
}

impl AccountStore for InMemoryAccountStore {
    fn insert(&self, account: NewAccount, secret: SecretHash) -> MarketResult<Account> {
        let mut index = self.index.write().map_err(poisoned)?;
        if index.by_handle.contains_key(&account.handle) {
            return Err(MarketError::DuplicateIdentity {
                handle: account.handle,
            });
        }

        let id = AccountId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let account = account.into_account(id);
        index.by_handle.insert(account.handle.clone(), id);
        index.records.insert(
            id,
            Arc::new(Mutex::new(AccountRecord {
                account: account.clone(),
                secret,
            })),
        );
        debug!(%id, role = %account.role, "Account inserted");
        Ok(account)
    }

    fn get(&self, id: AccountId) -> MarketResult<Option<Account>> {
        let index = self.index.read().map_err(poisoned)?;
        match index.records.get(&id) {
            Some(record) => Ok(Some(record.lock().map_err(poisoned)?.account.clone())),
            None => Ok(None),
        }
    }

    fn find_by_handle(&self, handle: &str) -> MarketResult<Option<AccountRecord>> {
        let index = self.index.read().map_err(poisoned)?;
        let Some(id) = index.by_handle.get(handle) else {
            return Ok(None);
        };
        match index.records.get(id) {
            Some(record) => Ok(Some(record.lock().map_err(poisoned)?.clone())),
            None => Ok(None),
        }
    }

    fn list(&self) -> MarketResult<Vec<Account>> {
        let index = self.index.read().map_err(poisoned)?;
        index
            .records
            .values()
            .map(|r| -> MarketResult<Account> { Ok(r.lock().map_err(poisoned)?.account.clone()) })
            .collect()
    }

    fn update(
        &self,
        id: AccountId,
        apply: &mut (dyn FnMut(&mut Account) -> MarketResult<()> + Send),
    ) -> MarketResult<Account> {
        let index = self.index.read().map_err(poisoned)?;
        let record = index
            .records
            .get(&id)
            .ok_or_else(|| MarketError::not_found("account", id))?;
        let mut record = record.lock().map_err(poisoned)?;

        let mut draft = record.account.clone();
        apply(&mut draft)?;
        if draft.id != id || draft.handle != record.account.handle {
            return Err(MarketError::storage("identity fields are immutable"));
        }
        record.account = draft.clone();
        Ok(draft)
    }

    fn remove_if(
        &self,
        id: AccountId,
        predicate: &(dyn Fn(&Account) -> MarketResult<bool> + Sync),
    ) -> MarketResult<Option<Account>> {
        let mut index = self.index.write().map_err(poisoned)?;
        let Some(record) = index.records.get(&id).cloned() else {
            return Ok(None);
        };
        let account = record.lock().map_err(poisoned)?.account.clone();
        if !predicate(&account)? {
            return Ok(None);
        }
        index.records.remove(&id);
        index.by_handle.remove(&account.handle);
        debug!(%id, "Account removed");
        Ok(Some(account))
    }

    fn export(&self) -> MarketResult<Vec<AccountRecord>> {
        let index = self.index.read().map_err(poisoned)?;
        index
            .records
            .values()
            .map(|r| -> MarketResult<AccountRecord> { Ok(r.lock().map_err(poisoned)?.clone()) })
            .collect()
    }
}
