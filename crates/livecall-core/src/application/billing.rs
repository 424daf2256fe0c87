//! Payer balance operations and the shared active-call registry.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use tracing::{debug, info};

use crate::domain::account::{Account, AccountId, Role};
use crate::domain::billing::{Credits, Receipt};
use crate::domain::error::{MarketError, MarketResult};

use super::ports::BalanceLedger;

pub struct BillingUseCase {
    ledger: Arc<dyn BalanceLedger>,
    /// Payers holding a call lease: debited, not yet ended.
    active_calls: Mutex<HashSet<AccountId>>,
}

fn require_payer(actor: &Account, payer: AccountId) -> MarketResult<()> {
    if actor.role != Role::Payer {
        return Err(MarketError::unauthorized(format!(
            "{} accounts have no balance",
            actor.role
        )));
    }
    if actor.id != payer {
        return Err(MarketError::unauthorized(format!(
            "{} cannot spend the balance of {payer}",
            actor.id
        )));
    }
    Ok(())
}

impl BillingUseCase {
    pub fn new(ledger: Arc<dyn BalanceLedger>) -> Self {
        Self {
            ledger,
            active_calls: Mutex::new(HashSet::new()),
        }
    }

    pub fn balance(&self, actor: &Account) -> MarketResult<Credits> {
        require_payer(actor, actor.id)?;
        self.ledger.balance(actor.id)
    }

    /// Credit funds the payment collaborator has confirmed.
    pub fn confirm_funds(&self, actor: &Account, amount: Credits) -> MarketResult<Credits> {
        require_payer(actor, actor.id)?;
        let balance = self.ledger.credit(actor.id, amount)?;
        info!(payer = %actor.id, amount, balance, "Funds confirmed");
        Ok(balance)
    }

    /// `amount` is priced by the caller; only sufficiency is checked here.
    pub fn reserve_and_debit(
        &self,
        actor: &Account,
        payer: AccountId,
        amount: Credits,
    ) -> MarketResult<Receipt> {
        require_payer(actor, payer)?;
        self.ledger.reserve_and_debit(payer, amount)
    }

    /// Take the payer's call lease and debit the call price.
    ///
    /// Fails with `CallInProgress` while another lease is held, from any
    /// client. A failed debit gives the lease back.
    pub fn begin_call(
        &self,
        actor: &Account,
        payer: AccountId,
        amount: Credits,
    ) -> MarketResult<Receipt> {
        require_payer(actor, payer)?;
        if !self.active_calls.lock().map_err(poisoned)?.insert(payer) {
            return Err(MarketError::CallInProgress(payer));
        }
        match self.ledger.reserve_and_debit(payer, amount) {
            Ok(receipt) => {
                info!(%payer, amount, balance = receipt.balance_after, "Call lease taken");
                Ok(receipt)
            }
            Err(e) => {
                self.release_call(payer);
                Err(e)
            }
        }
    }

    /// Give the lease back once the call has ended. Ending a call that holds
    /// no lease is a no-op.
    pub fn end_call(&self, actor: &Account, payer: AccountId) -> MarketResult<()> {
        require_payer(actor, payer)?;
        self.release_call(payer);
        Ok(())
    }

    /// Drop a lease without an actor, e.g. when the owning connection is gone.
    pub fn release_call(&self, payer: AccountId) -> bool {
        let released = self
            .active_calls
            .lock()
            .map(|mut active| active.remove(&payer))
            .unwrap_or(false);
        if released {
            debug!(%payer, "Call lease released");
        }
        released
    }

    pub fn has_active_call(&self, payer: AccountId) -> bool {
        self.active_calls
            .lock()
            .map(|active| active.contains(&payer))
            .unwrap_or(false)
    }
}

fn poisoned<T>(_: T) -> MarketError {
    MarketError::storage("call registry lock poisoned")
}
