//! `MarketService`: the in-process [`MarketApi`] that owns the shared store
//! and ledger, issues session tokens and routes each call to its use case.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::config::MarketConfig;
use crate::domain::account::{
    Account, AccountId, AccountRecord, ApprovalState, MarketStats, MediaId, MediaItem, MediaKind,
    Registration,
};
use crate::domain::billing::{Credits, Receipt};
use crate::domain::error::{MarketError, MarketResult};
use crate::domain::session::{Session, SessionToken};

use super::accounts::AccountsUseCase;
use super::approval::ApprovalUseCase;
use super::billing::BillingUseCase;
use super::ports::{AccountStore, AppEvents, BalanceLedger, MarketApi, SecretHasher};
use super::presence::PresenceUseCase;

pub struct MarketService {
    store: Arc<dyn AccountStore>,
    ledger: Arc<dyn BalanceLedger>,
    accounts: AccountsUseCase,
    approval: ApprovalUseCase,
    presence: PresenceUseCase,
    billing: BillingUseCase,
    /// Live tokens. Lost on restart, which forces clients to log in again.
    tokens: RwLock<HashMap<SessionToken, TokenEntry>>,
    session_ttl: Duration,
}

struct TokenEntry {
    account: AccountId,
    last_used: Instant,
}

fn poisoned<T>(_: T) -> MarketError {
    MarketError::storage("session registry lock poisoned")
}

impl MarketService {
    pub fn new(
        config: &MarketConfig,
        store: Arc<dyn AccountStore>,
        ledger: Arc<dyn BalanceLedger>,
        hasher: Arc<dyn SecretHasher>,
        app_events: Arc<dyn AppEvents>,
    ) -> Self {
        Self {
            accounts: AccountsUseCase::new(
                Arc::clone(&store),
                hasher,
                Arc::clone(&app_events),
                config.pricing.clone(),
            ),
            approval: ApprovalUseCase::new(Arc::clone(&store), app_events),
            presence: PresenceUseCase::new(Arc::clone(&store), config.pricing.clone()),
            billing: BillingUseCase::new(Arc::clone(&ledger)),
            store,
            ledger,
            tokens: RwLock::new(HashMap::new()),
            session_ttl: Duration::from_secs(config.security.session_ttl_secs),
        }
    }

    pub fn accounts(&self) -> &AccountsUseCase {
        &self.accounts
    }

    /// Full copy of accounts (with secret hashes) and balances.
    pub fn export_state(&self) -> MarketResult<(Vec<AccountRecord>, Vec<(AccountId, Credits)>)> {
        Ok((self.store.export()?, self.ledger.export()?))
    }

    /// Give back a payer's call lease without a session, for a client
    /// connection that went away mid-call.
    pub fn release_call(&self, payer: AccountId) -> bool {
        self.billing.release_call(payer)
    }

    pub fn has_active_call(&self, payer: AccountId) -> bool {
        self.billing.has_active_call(payer)
    }

    /// Revoke every token idle for longer than the session TTL. Returns how
    /// many were dropped.
    pub fn sweep_expired_sessions(&self) -> MarketResult<usize> {
        let now = Instant::now();
        let mut tokens = self.tokens.write().map_err(poisoned)?;
        let before = tokens.len();
        tokens.retain(|_, entry| now.duration_since(entry.last_used) <= self.session_ttl);
        let swept = before - tokens.len();
        if swept > 0 {
            debug!(swept, live = tokens.len(), "Expired sessions swept");
        }
        Ok(swept)
    }

    /// Resolve a presented session to the caller's live record.
    ///
    /// The role snapshot inside `session` is ignored; only the live record
    /// decides what the caller may do. Each successful lookup renews the
    /// token's idle timer.
    fn actor(&self, session: &Session) -> MarketResult<Account> {
        let id = {
            let mut tokens = self.tokens.write().map_err(poisoned)?;
            let now = Instant::now();
            let found = tokens
                .get(&session.token)
                .map(|entry| (entry.account, entry.last_used));
            match found {
                Some((_, last_used)) if now.duration_since(last_used) > self.session_ttl => {
                    tokens.remove(&session.token);
                    return Err(MarketError::unauthorized("session expired"));
                }
                Some((id, _)) if id == session.account_id() => {
                    if let Some(entry) = tokens.get_mut(&session.token) {
                        entry.last_used = now;
                    }
                    id
                }
                _ => return Err(MarketError::unauthorized("session is not valid")),
            }
        };
        match self.store.get(id)? {
            Some(account) => Ok(account),
            None => {
                self.tokens.write().map_err(poisoned)?.remove(&session.token);
                Err(MarketError::unauthorized("account no longer exists"))
            }
        }
    }
}

#[async_trait]
impl MarketApi for MarketService {
    async fn register(&self, registration: Registration) -> MarketResult<Account> {
        self.accounts.register(registration).await
    }

    async fn authenticate(&self, handle: &str, secret: &str) -> MarketResult<Session> {
        let account = self.accounts.authenticate(handle, secret).await?;
        let token = SessionToken::generate();
        self.tokens
            .write()
            .map_err(poisoned)?
            .insert(
                token.clone(),
                TokenEntry {
                    account: account.id,
                    last_used: Instant::now(),
                },
            );
        info!(id = %account.id, role = %account.role, "Session opened");
        Ok(Session { token, account })
    }

    async fn logout(&self, session: &Session) -> MarketResult<()> {
        let removed = self.tokens.write().map_err(poisoned)?.remove(&session.token);
        debug!(id = %session.account_id(), known = removed.is_some(), "Session closed");
        Ok(())
    }

    async fn me(&self, session: &Session) -> MarketResult<Account> {
        self.actor(session)
    }

    async fn list_discoverable(&self, filter: Option<String>) -> MarketResult<Vec<Account>> {
        self.accounts.list_discoverable(filter.as_deref())
    }

    async fn showcase(&self, filter: Option<String>) -> MarketResult<Vec<Account>> {
        self.accounts.showcase(filter.as_deref())
    }

    async fn callable_provider(&self, provider: AccountId) -> MarketResult<Account> {
        self.accounts.callable_provider(provider)
    }

    async fn pending_providers(&self, session: &Session) -> MarketResult<Vec<Account>> {
        self.approval.pending_providers(&self.actor(session)?)
    }

    async fn approved_providers(&self, session: &Session) -> MarketResult<Vec<Account>> {
        self.approval.approved_providers(&self.actor(session)?)
    }

    async fn payers(&self, session: &Session) -> MarketResult<Vec<Account>> {
        self.approval.payers(&self.actor(session)?)
    }

    async fn stats(&self, session: &Session) -> MarketResult<MarketStats> {
        self.approval.stats(&self.actor(session)?)
    }

    async fn approve(&self, session: &Session, provider: AccountId) -> MarketResult<ApprovalState> {
        let actor = self.actor(session)?;
        self.approval.approve(&actor, provider).await
    }

    async fn reject(&self, session: &Session, provider: AccountId) -> MarketResult<ApprovalState> {
        let actor = self.actor(session)?;
        self.approval.reject(&actor, provider).await
    }

    async fn set_online(
        &self,
        session: &Session,
        provider: AccountId,
        online: bool,
    ) -> MarketResult<Account> {
        self.presence
            .set_online(&self.actor(session)?, provider, online)
    }

    async fn set_rate(
        &self,
        session: &Session,
        provider: AccountId,
        rate: Credits,
    ) -> MarketResult<Account> {
        self.presence.set_rate(&self.actor(session)?, provider, rate)
    }

    async fn add_media(
        &self,
        session: &Session,
        provider: AccountId,
        locator: String,
        kind: MediaKind,
    ) -> MarketResult<MediaItem> {
        self.presence
            .add_media(&self.actor(session)?, provider, locator, kind)
    }

    async fn remove_media(
        &self,
        session: &Session,
        provider: AccountId,
        media: MediaId,
    ) -> MarketResult<()> {
        self.presence
            .remove_media(&self.actor(session)?, provider, media)
    }

    async fn balance(&self, session: &Session) -> MarketResult<Credits> {
        self.billing.balance(&self.actor(session)?)
    }

    async fn confirm_funds(&self, session: &Session, amount: Credits) -> MarketResult<Credits> {
        self.billing.confirm_funds(&self.actor(session)?, amount)
    }

    async fn reserve_and_debit(
        &self,
        session: &Session,
        payer: AccountId,
        amount: Credits,
    ) -> MarketResult<Receipt> {
        self.billing
            .reserve_and_debit(&self.actor(session)?, payer, amount)
    }

    async fn begin_call(
        &self,
        session: &Session,
        payer: AccountId,
        amount: Credits,
    ) -> MarketResult<Receipt> {
        self.billing
            .begin_call(&self.actor(session)?, payer, amount)
    }

    async fn end_call(&self, session: &Session, payer: AccountId) -> MarketResult<()> {
        self.billing.end_call(&self.actor(session)?, payer)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::adapters::account_store::InMemoryAccountStore;
    use crate::adapters::crypto::secret::Sha256SecretHasher;
    use crate::adapters::events::TracingAppEvents;
    use crate::adapters::ledger::InMemoryLedger;
    use crate::domain::account::Gender;

    /// Service over fresh in-memory adapters with a bootstrapped admin.
    pub(crate) fn service() -> MarketService {
        let config = MarketConfig::default();
        let service = MarketService::new(
            &config,
            Arc::new(InMemoryAccountStore::new()),
            Arc::new(InMemoryLedger::new(config.billing.opening_balance)),
            Arc::new(Sha256SecretHasher),
            Arc::new(TracingAppEvents),
        );
        service.accounts().bootstrap_admin(&config.admin).unwrap();
        service
    }

    pub(crate) fn registration(handle: &str, name: &str, gender: Gender) -> Registration {
        Registration {
            handle: handle.into(),
            secret: "pw".into(),
            display_name: name.into(),
            gender,
        }
    }

    pub(crate) async fn admin(service: &MarketService) -> Session {
        service.authenticate("admin", "admin123").await.unwrap()
    }

    /// Registered, approved, online provider with its open session.
    pub(crate) async fn live_provider(
        service: &MarketService,
        handle: &str,
        rate: Credits,
    ) -> Session {
        let account = service
            .register(registration(handle, handle, Gender::Female))
            .await
            .unwrap();
        let admin = admin(service).await;
        service.approve(&admin, account.id).await.unwrap();
        let session = service.authenticate(handle, "pw").await.unwrap();
        service.set_online(&session, account.id, true).await.unwrap();
        service.set_rate(&session, account.id, rate).await.unwrap();
        session
    }

    pub(crate) async fn payer(service: &MarketService, handle: &str) -> Session {
        service
            .register(registration(handle, handle, Gender::Male))
            .await
            .unwrap();
        service.authenticate(handle, "pw").await.unwrap()
    }

    #[tokio::test]
    async fn rejected_provider_no_longer_authenticates() {
        let service = service();
        let provider = service
            .register(registration("01710000000", "Mitu", Gender::Female))
            .await
            .unwrap();
        assert_eq!(
            service.authenticate("01710000000", "pw").await.unwrap_err(),
            MarketError::PendingApproval
        );

        let admin = admin(&service).await;
        service.reject(&admin, provider.id).await.unwrap();
        assert_eq!(
            service.authenticate("01710000000", "pw").await.unwrap_err(),
            MarketError::InvalidCredentials
        );
    }

    #[tokio::test]
    async fn live_role_wins_over_session_snapshot() {
        let service = service();
        let mut forged = payer(&service, "0181").await;
        forged.account.role = crate::domain::account::Role::Admin;
        assert!(matches!(
            service.stats(&forged).await,
            Err(MarketError::Unauthorized(_))
        ));
    }

    #[tokio::test]
    async fn token_must_match_the_account() {
        let service = service();
        let a = payer(&service, "a").await;
        let b = payer(&service, "b").await;
        let mixed = Session {
            token: a.token.clone(),
            account: b.account.clone(),
        };
        assert!(matches!(
            service.balance(&mixed).await,
            Err(MarketError::Unauthorized(_))
        ));
    }

    #[tokio::test]
    async fn logout_revokes_the_token() {
        let service = service();
        let session = payer(&service, "0181").await;
        assert!(service.me(&session).await.is_ok());
        service.logout(&session).await.unwrap();
        assert!(matches!(
            service.me(&session).await,
            Err(MarketError::Unauthorized(_))
        ));
    }

    #[tokio::test]
    async fn presence_changes_reach_discovery_at_once() {
        let service = service();
        let provider = live_provider(&service, "mitu", 100).await;
        assert_eq!(service.list_discoverable(None).await.unwrap().len(), 1);

        service
            .set_online(&provider, provider.account_id(), false)
            .await
            .unwrap();
        assert!(service.list_discoverable(None).await.unwrap().is_empty());
        assert_eq!(service.showcase(None).await.unwrap().len(), 1);
        assert_eq!(
            service
                .callable_provider(provider.account_id())
                .await
                .unwrap_err(),
            MarketError::ProviderUnavailable(provider.account_id())
        );
    }

    #[tokio::test]
    async fn export_contains_hashes_and_balances() {
        let service = service();
        let session = payer(&service, "0181").await;
        service.confirm_funds(&session, 100).await.unwrap();

        let (accounts, balances) = service.export_state().unwrap();
        assert_eq!(accounts.len(), 2);
        assert!(accounts.iter().all(|r| r.secret.0.starts_with("sha256$")));
        assert_eq!(balances, vec![(session.account_id(), 600)]);
    }

    #[tokio::test(start_paused = true)]
    async fn idle_session_expires() {
        let service = service();
        let ttl = Duration::from_secs(MarketConfig::default().security.session_ttl_secs);
        let session = payer(&service, "0181").await;

        tokio::time::advance(ttl - Duration::from_secs(1)).await;
        assert!(service.me(&session).await.is_ok());

        // Use renews the idle timer.
        tokio::time::advance(ttl - Duration::from_secs(1)).await;
        assert!(service.me(&session).await.is_ok());

        tokio::time::advance(ttl + Duration::from_secs(1)).await;
        assert_eq!(
            service.me(&session).await.unwrap_err(),
            MarketError::unauthorized("session expired")
        );
        assert_eq!(
            service.me(&session).await.unwrap_err(),
            MarketError::unauthorized("session is not valid")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn sweep_drops_only_idle_tokens() {
        let service = service();
        let ttl = Duration::from_secs(MarketConfig::default().security.session_ttl_secs);
        let idle = payer(&service, "idle").await;
        tokio::time::advance(ttl / 2).await;
        let fresh = payer(&service, "fresh").await;

        tokio::time::advance(ttl / 2 + Duration::from_secs(1)).await;
        assert_eq!(service.sweep_expired_sessions().unwrap(), 1);
        assert!(service.me(&fresh).await.is_ok());
        assert!(matches!(
            service.me(&idle).await,
            Err(MarketError::Unauthorized(_))
        ));
    }

    #[tokio::test]
    async fn call_lease_is_shared_and_released() {
        let service = service();
        let session = payer(&service, "0181").await;
        let id = session.account_id();

        service.begin_call(&session, id, 100).await.unwrap();
        assert!(service.has_active_call(id));
        assert_eq!(
            service.begin_call(&session, id, 100).await.unwrap_err(),
            MarketError::CallInProgress(id)
        );
        assert!(service.release_call(id));
        service.begin_call(&session, id, 100).await.unwrap();
        service.end_call(&session, id).await.unwrap();
        assert!(!service.has_active_call(id));
        assert_eq!(service.balance(&session).await.unwrap(), 300);
    }
}
