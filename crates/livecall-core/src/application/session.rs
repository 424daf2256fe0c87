//! Session Manager: the one authenticated identity of a client process.
//!
//! The current session is mirrored into a [`SessionCache`] so it survives a
//! restart of the client; `restore` revalidates it against the market before
//! trusting it again.

use std::sync::{Arc, RwLock};

use tracing::{info, warn};

use crate::domain::error::{MarketError, MarketResult};
use crate::domain::session::{Capability, Session};

use super::ports::{MarketApi, SessionCache};

pub struct SessionManager {
    api: Arc<dyn MarketApi>,
    cache: Arc<dyn SessionCache>,
    current: RwLock<Option<Session>>,
}

fn poisoned<T>(_: T) -> MarketError {
    MarketError::storage("session lock poisoned")
}

impl SessionManager {
    pub fn new(api: Arc<dyn MarketApi>, cache: Arc<dyn SessionCache>) -> Self {
        Self {
            api,
            cache,
            current: RwLock::new(None),
        }
    }

    pub fn api(&self) -> &Arc<dyn MarketApi> {
        &self.api
    }

    /// Authenticate and make the result the current session, replacing any
    /// previous one.
    pub async fn login(&self, handle: &str, secret: &str) -> MarketResult<Session> {
        let session = self.api.authenticate(handle, secret).await?;
        if let Err(e) = self.cache.store(&session) {
            warn!("Failed to persist session: {e:#}");
        }
        let previous = self
            .current
            .write()
            .map_err(poisoned)?
            .replace(session.clone());
        if let Some(previous) = previous {
            if let Err(e) = self.api.logout(&previous).await {
                warn!(id = %previous.account_id(), "Remote logout of previous session failed: {e}");
            }
        }
        info!(id = %session.account_id(), role = %session.role(), "Logged in");
        Ok(session)
    }

    /// Revoke the token remotely and forget it locally. Local teardown
    /// happens even if the market cannot be reached.
    pub async fn logout(&self) -> MarketResult<()> {
        let Some(session) = self.current.write().map_err(poisoned)?.take() else {
            return Ok(());
        };
        if let Err(e) = self.cache.clear() {
            warn!("Failed to clear cached session: {e:#}");
        }
        if let Err(e) = self.api.logout(&session).await {
            warn!("Remote logout failed: {e}");
        }
        info!(id = %session.account_id(), "Logged out");
        Ok(())
    }

    pub fn current(&self) -> Option<Session> {
        self.current.read().ok().and_then(|s| s.clone())
    }

    /// Reload the cached session, refreshed with the live account record.
    /// A session the market no longer accepts is discarded.
    pub async fn restore(&self) -> MarketResult<Option<Session>> {
        let cached = match self.cache.load() {
            Ok(cached) => cached,
            Err(e) => {
                warn!("Ignoring unreadable session cache: {e:#}");
                None
            }
        };
        let Some(mut session) = cached else {
            return Ok(None);
        };

        match self.api.me(&session).await {
            Ok(account) => {
                session.account = account;
                if let Err(e) = self.cache.store(&session) {
                    warn!("Failed to persist session: {e:#}");
                }
                *self.current.write().map_err(poisoned)? = Some(session.clone());
                info!(id = %session.account_id(), "Session restored");
                Ok(Some(session))
            }
            Err(MarketError::Unauthorized(reason)) => {
                info!(reason, "Cached session rejected");
                if let Err(e) = self.cache.clear() {
                    warn!("Failed to clear cached session: {e:#}");
                }
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// The current session, provided its role grants `capability`.
    pub fn require(&self, capability: Capability) -> MarketResult<Session> {
        let session = self
            .current()
            .ok_or_else(|| MarketError::unauthorized("not logged in"))?;
        if !session.can(capability) {
            return Err(MarketError::unauthorized(format!(
                "{} accounts cannot {capability:?}",
                session.role()
            )));
        }
        Ok(session)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::application::market::tests::{live_provider, registration, service};
    use crate::domain::account::Gender;

    #[derive(Default)]
    struct MemoryCache(Mutex<Option<Session>>);

    impl SessionCache for MemoryCache {
        fn load(&self) -> anyhow::Result<Option<Session>> {
            Ok(self.0.lock().unwrap().clone())
        }
        fn store(&self, session: &Session) -> anyhow::Result<()> {
            *self.0.lock().unwrap() = Some(session.clone());
            Ok(())
        }
        fn clear(&self) -> anyhow::Result<()> {
            *self.0.lock().unwrap() = None;
            Ok(())
        }
    }

    #[tokio::test]
    async fn login_logout_cycle() {
        let api = Arc::new(service());
        api.register(registration("0181", "Rafi", Gender::Male))
            .await
            .unwrap();
        let cache = Arc::new(MemoryCache::default());
        let manager = SessionManager::new(api.clone(), cache.clone());

        assert!(manager.current().is_none());
        let session = manager.login("0181", "pw").await.unwrap();
        assert_eq!(manager.current(), Some(session.clone()));
        assert_eq!(cache.load().unwrap(), Some(session.clone()));
        assert!(manager.require(Capability::PlaceCall).is_ok());
        assert!(matches!(
            manager.require(Capability::ApproveProviders),
            Err(MarketError::Unauthorized(_))
        ));

        manager.logout().await.unwrap();
        assert!(manager.current().is_none());
        assert!(cache.load().unwrap().is_none());
        assert!(api.me(&session).await.is_err());
    }

    #[tokio::test]
    async fn second_login_revokes_the_previous_token() {
        let api = Arc::new(service());
        api.register(registration("0181", "Rafi", Gender::Male))
            .await
            .unwrap();
        let manager = SessionManager::new(api.clone(), Arc::new(MemoryCache::default()));

        let first = manager.login("0181", "pw").await.unwrap();
        let second = manager.login("0181", "pw").await.unwrap();
        assert_ne!(first.token, second.token);
        assert_eq!(manager.current(), Some(second.clone()));
        assert!(matches!(
            api.me(&first).await,
            Err(MarketError::Unauthorized(_))
        ));
        assert!(api.me(&second).await.is_ok());
    }

    #[tokio::test]
    async fn failed_login_keeps_no_session() {
        let manager = SessionManager::new(
            Arc::new(service()),
            Arc::new(MemoryCache::default()),
        );
        assert_eq!(
            manager.login("nobody", "pw").await.unwrap_err(),
            MarketError::InvalidCredentials
        );
        assert!(manager.current().is_none());
    }

    #[tokio::test]
    async fn restore_refreshes_the_role_snapshot() {
        let api = Arc::new(service());
        let provider = live_provider(&api, "mitu", 120).await;
        let cache = Arc::new(MemoryCache::default());
        let mut stale = provider.clone();
        stale.account.online = false;
        cache.store(&stale).unwrap();

        let manager = SessionManager::new(api, cache);
        let restored = manager.restore().await.unwrap().unwrap();
        assert!(restored.account.online);
        assert_eq!(restored.account.rate, 120);
        assert_eq!(manager.current(), Some(restored));
    }

    #[tokio::test]
    async fn restore_discards_revoked_sessions() {
        let api = Arc::new(service());
        api.register(registration("0181", "Rafi", Gender::Male))
            .await
            .unwrap();
        let session = api.authenticate("0181", "pw").await.unwrap();
        api.logout(&session).await.unwrap();

        let cache = Arc::new(MemoryCache::default());
        cache.store(&session).unwrap();
        let manager = SessionManager::new(api, cache.clone());

        assert!(manager.restore().await.unwrap().is_none());
        assert!(manager.current().is_none());
        assert!(cache.load().unwrap().is_none());
    }
}
