//! Call purchase and call lifecycle types.
//!
//! Pure data. The state machine that drives them lives in
//! `application::call_session`.

use std::fmt;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use super::account::{Account, AccountId};
use super::billing::{Credits, Receipt};
use super::error::MarketError;

/// Client-local identifier for one call attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CallId(pub u64);

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "call-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Offer
// ---------------------------------------------------------------------------

/// What a payer is about to buy. Lives only for the purchase flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallOffer {
    pub payer: AccountId,
    pub provider: AccountId,
    pub provider_name: String,
    pub duration_minutes: u32,
    pub unit_rate: Credits,
    pub total_cost: Credits,
}

impl CallOffer {
    /// Price a call against the provider's current rate.
    pub fn price(
        payer: AccountId,
        provider: &Account,
        duration_minutes: u32,
        offered_durations: &[u32],
    ) -> Result<Self, MarketError> {
        if !offered_durations.contains(&duration_minutes) {
            return Err(MarketError::InvalidDuration {
                minutes: duration_minutes,
            });
        }
        let total_cost = provider
            .rate
            .checked_mul(Credits::from(duration_minutes))
            .ok_or_else(|| MarketError::InvalidTransition("call cost overflows".into()))?;

        Ok(Self {
            payer,
            provider: provider.id,
            provider_name: provider.display_name.clone(),
            duration_minutes,
            unit_rate: provider.rate,
            total_cost,
        })
    }

    pub fn budget_seconds(&self) -> u64 {
        u64::from(self.duration_minutes) * 60
    }
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CallPhase {
    Idle,
    Offered,
    Paid,
    Active,
    Ended,
}

/// Which side of the call asked for it to stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Party {
    Payer,
    Provider,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EndReason {
    TimeExpired,
    HungUp(Party),
    CaptureFailed,
    /// The owning handle was dropped while the call was still running.
    TornDown,
}

/// Lifecycle notifications consumed by the call UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CallEvent {
    Offered(CallOffer),
    Paid(Receipt),
    Active { budget_seconds: u64 },
    TimeExpired,
    Ended(CallSummary),
    CaptureFailed { reason: String, charged: Credits },
}

/// Final record of a call once it reaches `Ended`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallSummary {
    pub call_id: CallId,
    pub payer: AccountId,
    pub provider: AccountId,
    pub started_at: Option<SystemTime>,
    pub budget_seconds: u64,
    pub remaining_seconds: u64,
    pub charged: Credits,
    pub reason: EndReason,
}

impl CallSummary {
    pub fn elapsed_seconds(&self) -> u64 {
        self.budget_seconds - self.remaining_seconds
    }
}

/// `MM:SS` rendering of a second count.
pub fn format_clock(seconds: u64) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::account::{NewAccount, Role};

    fn provider(rate: Credits) -> Account {
        let mut acct = NewAccount {
            handle: "01711111111".into(),
            display_name: "Rina".into(),
            role: Role::Provider,
            rate,
        }
        .into_account(AccountId(2));
        acct.approved = true;
        acct.online = true;
        acct
    }

    #[test]
    fn five_minutes_at_one_hundred_costs_five_hundred() {
        let offer = CallOffer::price(AccountId(1), &provider(100), 5, &[5, 10, 15]).unwrap();
        assert_eq!(offer.total_cost, 500);
        assert_eq!(offer.budget_seconds(), 300);
        assert_eq!(offer.unit_rate, 100);
    }

    #[test]
    fn unlisted_duration_is_rejected() {
        let err = CallOffer::price(AccountId(1), &provider(100), 7, &[5, 10, 15]).unwrap_err();
        assert_eq!(err, MarketError::InvalidDuration { minutes: 7 });
    }

    #[test]
    fn clock_format() {
        assert_eq!(format_clock(300), "05:00");
        assert_eq!(format_clock(61), "01:01");
        assert_eq!(format_clock(0), "00:00");
    }
}
