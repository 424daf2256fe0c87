//! Balance ledger value types.

use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use super::account::AccountId;

/// Whole currency units. Unsigned, so a balance can never be negative.
pub type Credits = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReceiptId(pub u64);

/// Proof of a successful debit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub id: ReceiptId,
    pub payer: AccountId,
    pub amount: Credits,
    pub balance_after: Credits,
    pub issued_at: SystemTime,
}
