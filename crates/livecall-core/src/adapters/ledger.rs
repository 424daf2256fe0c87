//! In-memory [`BalanceLedger`] adapter.
//!
//! One `Mutex<Credits>` per payer. The sufficiency check and the debit happen
//! under the same guard, so no other mutation of that payer's balance can
//! interleave.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::SystemTime;

use tracing::info;

use crate::application::ports::BalanceLedger;
use crate::domain::account::AccountId;
use crate::domain::billing::{Credits, Receipt, ReceiptId};
use crate::domain::error::{MarketError, MarketResult};

pub struct InMemoryLedger {
    balances: RwLock<HashMap<AccountId, Arc<Mutex<Credits>>>>,
    /// Balance a payer is given the first time the ledger sees them.
    opening_balance: Credits,
    next_receipt: AtomicU64,
}

fn poisoned<T>(_: T) -> MarketError {
    MarketError::storage("ledger lock poisoned")
}

impl InMemoryLedger {
    pub fn new(opening_balance: Credits) -> Self {
        Self {
            balances: RwLock::new(HashMap::new()),
            opening_balance,
            next_receipt: AtomicU64::new(1),
        }
    }

    pub fn from_balances(
        opening_balance: Credits,
        balances: impl IntoIterator<Item = (AccountId, Credits)>,
    ) -> Self {
        let balances = balances
            .into_iter()
            .map(|(id, amount)| (id, Arc::new(Mutex::new(amount))))
            .collect();
        Self {
            balances: RwLock::new(balances),
            opening_balance,
            next_receipt: AtomicU64::new(1),
        }
    }

    /// Per-payer slot, created at the opening balance on first access.
    fn slot(&self, payer: AccountId) -> MarketResult<Arc<Mutex<Credits>>> {
        if let Some(slot) = self.balances.read().map_err(poisoned)?.get(&payer) {
            return Ok(Arc::clone(slot));
        }
        let mut balances = self.balances.write().map_err(poisoned)?;
        let slot = balances
            .entry(payer)
            .or_insert_with(|| Arc::new(Mutex::new(self.opening_balance)));
        Ok(Arc::clone(slot))
    }
}

impl BalanceLedger for InMemoryLedger {
    fn balance(&self, payer: AccountId) -> MarketResult<Credits> {
        let slot = self.slot(payer)?;
        let balance = *slot.lock().map_err(poisoned)?;
        Ok(balance)
    }

    fn reserve_and_debit(&self, payer: AccountId, amount: Credits) -> MarketResult<Receipt> {
        let slot = self.slot(payer)?;
        let mut balance = slot.lock().map_err(poisoned)?;

        let remaining = balance
            .checked_sub(amount)
            .ok_or(MarketError::InsufficientFunds {
                required: amount,
                available: *balance,
            })?;
        *balance = remaining;

        let receipt = Receipt {
            id: ReceiptId(self.next_receipt.fetch_add(1, Ordering::Relaxed)),
            payer,
            amount,
            balance_after: remaining,
            issued_at: SystemTime::now(),
        };
        info!(%payer, amount, balance_after = remaining, "Debited");
        Ok(receipt)
    }

    fn credit(&self, payer: AccountId, amount: Credits) -> MarketResult<Credits> {
        let slot = self.slot(payer)?;
        let mut balance = slot.lock().map_err(poisoned)?;
        *balance = balance
            .checked_add(amount)
            .ok_or_else(|| MarketError::storage("balance overflow"))?;
        info!(%payer, amount, balance = *balance, "Credited");
        Ok(*balance)
    }

    fn export(&self) -> MarketResult<Vec<(AccountId, Credits)>> {
        let balances = self.balances.read().map_err(poisoned)?;
        let mut out = balances
            .iter()
            .map(|(id, slot)| -> MarketResult<(AccountId, Credits)> {
                Ok((*id, *slot.lock().map_err(poisoned)?))
            })
            .collect::<MarketResult<Vec<_>>>()?;
        out.sort_by_key(|(id, _)| *id);
        Ok(out)
    }
}
