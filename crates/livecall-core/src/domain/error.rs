//! Typed failures returned by every marketplace operation.
//!
//! Serializable so a failure raised inside the shared store server reaches the
//! client process with the same variant it was raised with.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::account::AccountId;
use super::billing::Credits;

#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarketError {
    #[error("an account with handle '{handle}' already exists")]
    DuplicateIdentity { handle: String },

    /// Unknown handle and wrong secret are deliberately indistinguishable.
    #[error("invalid handle or secret")]
    InvalidCredentials,

    #[error("provider account is awaiting admin approval")]
    PendingApproval,

    #[error("not authorized: {0}")]
    Unauthorized(String),

    #[error("rate {amount} is outside the allowed range {min}..={max}")]
    InvalidRate { amount: Credits, min: Credits, max: Credits },

    #[error("insufficient funds: {required} required, {available} available")]
    InsufficientFunds { required: Credits, available: Credits },

    /// Media capture failed after the call was paid for. `charged` is gone.
    #[error("media capture failed ({reason}); {charged} already charged and not refunded")]
    CaptureFailed { reason: String, charged: Credits },

    #[error("invalid registration: {0}")]
    InvalidRegistration(String),

    #[error("{minutes} minutes is not an offered call duration")]
    InvalidDuration { minutes: u32 },

    #[error("provider {0} is not available for calls")]
    ProviderUnavailable(AccountId),

    #[error("payer {0} already has a call in progress")]
    CallInProgress(AccountId),

    #[error("invalid transition: {0}")]
    InvalidTransition(String),

    #[error("{entity} '{id}' not found")]
    NotFound { entity: String, id: String },

    #[error("storage error: {0}")]
    Storage(String),

    #[error("transport error: {0}")]
    Transport(String),
}

impl MarketError {
    pub fn unauthorized(reason: impl Into<String>) -> Self {
        Self::Unauthorized(reason.into())
    }

    pub fn not_found(entity: &str, id: impl ToString) -> Self {
        Self::NotFound {
            entity: entity.to_string(),
            id: id.to_string(),
        }
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage(message.into())
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }

    /// Short machine-readable kind, used by `onAuthResult` consumers.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::DuplicateIdentity { .. } => "duplicate_identity",
            Self::InvalidCredentials => "invalid_credentials",
            Self::PendingApproval => "pending_approval",
            Self::Unauthorized(_) => "unauthorized",
            Self::InvalidRate { .. } => "invalid_rate",
            Self::InsufficientFunds { .. } => "insufficient_funds",
            Self::CaptureFailed { .. } => "capture_failed",
            Self::InvalidRegistration(_) => "invalid_registration",
            Self::InvalidDuration { .. } => "invalid_duration",
            Self::ProviderUnavailable(_) => "provider_unavailable",
            Self::CallInProgress(_) => "call_in_progress",
            Self::InvalidTransition(_) => "invalid_transition",
            Self::NotFound { .. } => "not_found",
            Self::Storage(_) => "storage",
            Self::Transport(_) => "transport",
        }
    }
}

pub type MarketResult<T> = Result<T, MarketError>;
