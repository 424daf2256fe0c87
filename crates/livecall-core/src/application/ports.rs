//! Port traits (interfaces) that use cases depend on.
//!
//! Adapters implement these traits; use cases never reference Quinn, files,
//! or hashing crates directly.

use async_trait::async_trait;

use crate::domain::account::{
    Account, AccountId, AccountRecord, ApprovalState, MarketStats, MediaId, MediaItem, MediaKind,
    NewAccount, Registration, Role, SecretHash,
};
use crate::domain::billing::{Credits, Receipt};
use crate::domain::call::{CallEvent, CallId};
use crate::domain::control::{MarketRequest, MarketResponse};
use crate::domain::error::MarketResult;
use crate::domain::session::Session;

// ---------------------------------------------------------------------------
// Account store
// ---------------------------------------------------------------------------

/// Durable mapping of accounts keyed by identity.
///
/// Every method is atomic with respect to every other method touching the
/// same record. `update` closures run against a copy while the record is
/// locked; the copy is written back only if the closure succeeds.
pub trait AccountStore: Send + Sync {
    /// Insert a new account. Fails with `DuplicateIdentity` before any write
    /// if the handle is taken.
    fn insert(&self, account: NewAccount, secret: SecretHash) -> MarketResult<Account>;

    fn get(&self, id: AccountId) -> MarketResult<Option<Account>>;

    /// Look up the record (including the secret hash) behind a handle.
    fn find_by_handle(&self, handle: &str) -> MarketResult<Option<AccountRecord>>;

    /// All accounts in registration order.
    fn list(&self) -> MarketResult<Vec<Account>>;

    /// Atomically read-modify-write one record. `NotFound` if absent.
    fn update(
        &self,
        id: AccountId,
        apply: &mut (dyn FnMut(&mut Account) -> MarketResult<()> + Send),
    ) -> MarketResult<Account>;

    /// Atomically delete a record if `predicate` approves it. Returns the
    /// removed account, or `None` if it was already gone or the predicate
    /// declined.
    fn remove_if(
        &self,
        id: AccountId,
        predicate: &(dyn Fn(&Account) -> MarketResult<bool> + Sync),
    ) -> MarketResult<Option<Account>>;

    fn has_role(&self, role: Role) -> MarketResult<bool> {
        Ok(self.list()?.iter().any(|a| a.role == role))
    }

    /// Full copy of every record, for persistence.
    fn export(&self) -> MarketResult<Vec<AccountRecord>>;
}

// ---------------------------------------------------------------------------
// Balance ledger
// ---------------------------------------------------------------------------

/// One non-negative balance per payer.
pub trait BalanceLedger: Send + Sync {
    fn balance(&self, payer: AccountId) -> MarketResult<Credits>;

    /// Check and debit as one step. On `InsufficientFunds` nothing changes.
    fn reserve_and_debit(&self, payer: AccountId, amount: Credits) -> MarketResult<Receipt>;

    /// Add confirmed funds; returns the new balance.
    fn credit(&self, payer: AccountId, amount: Credits) -> MarketResult<Credits>;

    fn export(&self) -> MarketResult<Vec<(AccountId, Credits)>>;
}

// ---------------------------------------------------------------------------
// Secrets
// ---------------------------------------------------------------------------

pub trait SecretHasher: Send + Sync {
    fn hash(&self, secret: &str) -> MarketResult<SecretHash>;

    /// False for a wrong secret and for a hash this hasher cannot parse.
    fn verify(&self, secret: &str, hash: &SecretHash) -> bool;
}

// ---------------------------------------------------------------------------
// Current-identity cache (client side)
// ---------------------------------------------------------------------------

/// Keeps the current session across process restarts of one client.
pub trait SessionCache: Send + Sync {
    fn load(&self) -> anyhow::Result<Option<Session>>;
    fn store(&self, session: &Session) -> anyhow::Result<()>;
    fn clear(&self) -> anyhow::Result<()>;
}

// ---------------------------------------------------------------------------
// Media capture
// ---------------------------------------------------------------------------

/// Camera/microphone acquisition, owned by the media layer.
#[async_trait]
pub trait MediaCapture: Send + Sync {
    /// Acquire local capture for a call. May fail after the call is paid for.
    async fn acquire(&self, call: CallId) -> anyhow::Result<Box<dyn CaptureHandle>>;
}

/// Held for as long as the call is active.
///
/// Implementors must also release on `Drop`; the engine calls
/// [`CaptureHandle::release`] explicitly on every normal exit path.
pub trait CaptureHandle: Send {
    fn set_audio_enabled(&mut self, enabled: bool);
    fn set_video_enabled(&mut self, enabled: bool);
    fn release(self: Box<Self>);
}

// ---------------------------------------------------------------------------
// App events (UI bridge)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
    Success { account: AccountId, role: Role },
    Failure { kind: &'static str },
}

/// Emits events toward the presentation layer.
#[async_trait]
pub trait AppEvents: Send + Sync {
    async fn on_auth_result(&self, handle: &str, outcome: AuthOutcome);
    async fn on_approval_changed(&self, provider: AccountId, state: ApprovalState);
    async fn on_call_lifecycle(&self, call: CallId, event: &CallEvent);

    /// Simulated "someone wants to call you" nudge. Optional.
    async fn on_incoming_call_hint(&self, _provider: AccountId) {}
}

// ---------------------------------------------------------------------------
// Marketplace API
// ---------------------------------------------------------------------------

/// Everything a client process can ask of the shared marketplace.
///
/// Implemented in-process by `MarketService` and remotely by the QUIC client,
/// with identical semantics.
#[async_trait]
pub trait MarketApi: Send + Sync {
    // -- Accounts --
    async fn register(&self, registration: Registration) -> MarketResult<Account>;
    async fn authenticate(&self, handle: &str, secret: &str) -> MarketResult<Session>;
    async fn logout(&self, session: &Session) -> MarketResult<()>;
    /// Fresh copy of the caller's own record.
    async fn me(&self, session: &Session) -> MarketResult<Account>;

    // -- Discovery --
    async fn list_discoverable(&self, filter: Option<String>) -> MarketResult<Vec<Account>>;
    async fn showcase(&self, filter: Option<String>) -> MarketResult<Vec<Account>>;
    async fn callable_provider(&self, provider: AccountId) -> MarketResult<Account>;

    // -- Admin --
    async fn pending_providers(&self, session: &Session) -> MarketResult<Vec<Account>>;
    async fn approved_providers(&self, session: &Session) -> MarketResult<Vec<Account>>;
    async fn payers(&self, session: &Session) -> MarketResult<Vec<Account>>;
    async fn stats(&self, session: &Session) -> MarketResult<MarketStats>;
    async fn approve(&self, session: &Session, provider: AccountId) -> MarketResult<ApprovalState>;
    async fn reject(&self, session: &Session, provider: AccountId) -> MarketResult<ApprovalState>;

    // -- Provider self-service --
    async fn set_online(
        &self,
        session: &Session,
        provider: AccountId,
        online: bool,
    ) -> MarketResult<Account>;
    async fn set_rate(
        &self,
        session: &Session,
        provider: AccountId,
        rate: Credits,
    ) -> MarketResult<Account>;
    async fn add_media(
        &self,
        session: &Session,
        provider: AccountId,
        locator: String,
        kind: MediaKind,
    ) -> MarketResult<MediaItem>;
    async fn remove_media(
        &self,
        session: &Session,
        provider: AccountId,
        media: MediaId,
    ) -> MarketResult<()>;

    // -- Ledger --
    async fn balance(&self, session: &Session) -> MarketResult<Credits>;
    async fn confirm_funds(&self, session: &Session, amount: Credits) -> MarketResult<Credits>;
    async fn reserve_and_debit(
        &self,
        session: &Session,
        payer: AccountId,
        amount: Credits,
    ) -> MarketResult<Receipt>;

    // -- Calls --
    /// Debit a call and hold the payer's single call lease until
    /// [`MarketApi::end_call`]. A second lease fails with `CallInProgress`.
    async fn begin_call(
        &self,
        session: &Session,
        payer: AccountId,
        amount: Credits,
    ) -> MarketResult<Receipt>;
    async fn end_call(&self, session: &Session, payer: AccountId) -> MarketResult<()>;
}

// ---------------------------------------------------------------------------
// ControlCodec (serialization)
// ---------------------------------------------------------------------------

/// Encodes / decodes control messages to/from bytes (e.g. CBOR).
pub trait ControlCodec: Send + Sync {
    fn encode_request(&self, msg: &MarketRequest) -> anyhow::Result<Vec<u8>>;
    fn decode_request(&self, data: &[u8]) -> anyhow::Result<MarketRequest>;
    fn encode_response(&self, msg: &MarketResponse) -> anyhow::Result<Vec<u8>>;
    fn decode_response(&self, data: &[u8]) -> anyhow::Result<MarketResponse>;
}
