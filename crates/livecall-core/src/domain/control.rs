//! Request/response messages exchanged with the shared store server.
//!
//! These travel over the reliable QUIC bidirectional stream, encoded as CBOR.
//! Pure data, no I/O.

use serde::{Deserialize, Serialize};

use super::account::{
    Account, AccountId, ApprovalState, MarketStats, MediaId, MediaItem, MediaKind, Registration,
};
use super::billing::{Credits, Receipt};
use super::error::MarketError;
use super::session::Session;

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum MarketRequest {
    // -- Accounts --
    Register {
        registration: Registration,
    },
    Authenticate {
        handle: String,
        secret: String,
    },
    Logout {
        session: Session,
    },
    Me {
        session: Session,
    },

    // -- Discovery --
    ListDiscoverable {
        filter: Option<String>,
    },
    Showcase {
        filter: Option<String>,
    },
    CallableProvider {
        provider: AccountId,
    },

    // -- Admin --
    PendingProviders {
        session: Session,
    },
    ApprovedProviders {
        session: Session,
    },
    Payers {
        session: Session,
    },
    Stats {
        session: Session,
    },
    Approve {
        session: Session,
        provider: AccountId,
    },
    Reject {
        session: Session,
        provider: AccountId,
    },

    // -- Provider self-service --
    SetOnline {
        session: Session,
        provider: AccountId,
        online: bool,
    },
    SetRate {
        session: Session,
        provider: AccountId,
        rate: Credits,
    },
    AddMedia {
        session: Session,
        provider: AccountId,
        locator: String,
        kind: MediaKind,
    },
    RemoveMedia {
        session: Session,
        provider: AccountId,
        media: MediaId,
    },

    // -- Ledger --
    Balance {
        session: Session,
    },
    ConfirmFunds {
        session: Session,
        amount: Credits,
    },
    ReserveAndDebit {
        session: Session,
        payer: AccountId,
        amount: Credits,
    },

    // -- Calls --
    BeginCall {
        session: Session,
        payer: AccountId,
        amount: Credits,
    },
    EndCall {
        session: Session,
        payer: AccountId,
    },
}

impl MarketRequest {
    /// True when a successful response means durable state changed.
    pub fn mutates_state(&self) -> bool {
        matches!(
            self,
            Self::Register { .. }
                | Self::Approve { .. }
                | Self::Reject { .. }
                | Self::SetOnline { .. }
                | Self::SetRate { .. }
                | Self::AddMedia { .. }
                | Self::RemoveMedia { .. }
                | Self::Balance { .. }
                | Self::ConfirmFunds { .. }
                | Self::ReserveAndDebit { .. }
                | Self::BeginCall { .. }
        )
    }

    /// Payer whose call lease this request takes (`Some(true)`) or gives
    /// back (`Some(false)`).
    pub fn call_lease(&self) -> Option<(AccountId, bool)> {
        match self {
            Self::BeginCall { payer, .. } => Some((*payer, true)),
            Self::EndCall { payer, .. } => Some((*payer, false)),
            _ => None,
        }
    }

    /// Name used in logs; never includes secrets.
    pub fn op_name(&self) -> &'static str {
        match self {
            Self::Register { .. } => "register",
            Self::Authenticate { .. } => "authenticate",
            Self::Logout { .. } => "logout",
            Self::Me { .. } => "me",
            Self::ListDiscoverable { .. } => "list_discoverable",
            Self::Showcase { .. } => "showcase",
            Self::CallableProvider { .. } => "callable_provider",
            Self::PendingProviders { .. } => "pending_providers",
            Self::ApprovedProviders { .. } => "approved_providers",
            Self::Payers { .. } => "payers",
            Self::Stats { .. } => "stats",
            Self::Approve { .. } => "approve",
            Self::Reject { .. } => "reject",
            Self::SetOnline { .. } => "set_online",
            Self::SetRate { .. } => "set_rate",
            Self::AddMedia { .. } => "add_media",
            Self::RemoveMedia { .. } => "remove_media",
            Self::Balance { .. } => "balance",
            Self::ConfirmFunds { .. } => "confirm_funds",
            Self::ReserveAndDebit { .. } => "reserve_and_debit",
            Self::BeginCall { .. } => "begin_call",
            Self::EndCall { .. } => "end_call",
        }
    }
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum MarketResponse {
    Done,
    Account(Account),
    Accounts(Vec<Account>),
    Session(Session),
    Approval(ApprovalState),
    Media(MediaItem),
    Stats(MarketStats),
    Credits(Credits),
    Receipt(Receipt),
    Error(MarketError),
}

impl MarketResponse {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Done => "done",
            Self::Account(_) => "account",
            Self::Accounts(_) => "accounts",
            Self::Session(_) => "session",
            Self::Approval(_) => "approval",
            Self::Media(_) => "media",
            Self::Stats(_) => "stats",
            Self::Credits(_) => "credits",
            Self::Receipt(_) => "receipt",
            Self::Error(_) => "error",
        }
    }
}
