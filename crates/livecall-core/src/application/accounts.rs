//! Registration, authentication and discovery use case.

use std::sync::Arc;

use tracing::{debug, info};

use crate::config::{AdminConfig, PricingConfig};
use crate::domain::account::{Account, AccountId, NewAccount, Registration, Role, SecretHash};
use crate::domain::error::{MarketError, MarketResult};

use super::ports::{AccountStore, AppEvents, AuthOutcome, SecretHasher};

pub struct AccountsUseCase {
    store: Arc<dyn AccountStore>,
    hasher: Arc<dyn SecretHasher>,
    app_events: Arc<dyn AppEvents>,
    pricing: PricingConfig,
}

impl AccountsUseCase {
    pub fn new(
        store: Arc<dyn AccountStore>,
        hasher: Arc<dyn SecretHasher>,
        app_events: Arc<dyn AppEvents>,
        pricing: PricingConfig,
    ) -> Self {
        Self {
            store,
            hasher,
            app_events,
            pricing,
        }
    }

    /// Create the admin account unless one already exists.
    ///
    /// Returns `None` when the store already had an admin.
    pub fn bootstrap_admin(&self, admin: &AdminConfig) -> MarketResult<Option<Account>> {
        if self.store.has_role(Role::Admin)? {
            debug!("Admin already present");
            return Ok(None);
        }
        let secret = self.hasher.hash(&admin.secret)?;
        let account = self.store.insert(
            NewAccount {
                handle: admin.handle.trim().to_string(),
                display_name: admin.name.clone(),
                role: Role::Admin,
                rate: 0,
            },
            secret,
        )?;
        info!(id = %account.id, handle = %account.handle, "Admin bootstrapped");
        Ok(Some(account))
    }

    pub async fn register(&self, registration: Registration) -> MarketResult<Account> {
        let handle = registration.handle.trim().to_string();
        let result = self.try_register(&handle, registration).await;
        match &result {
            Ok(account) => {
                info!(id = %account.id, role = %account.role, "Registered");
                self.app_events
                    .on_auth_result(
                        &handle,
                        AuthOutcome::Success {
                            account: account.id,
                            role: account.role,
                        },
                    )
                    .await;
            }
            Err(e) => {
                self.app_events
                    .on_auth_result(&handle, AuthOutcome::Failure { kind: e.kind() })
                    .await
            }
        }
        result
    }

    async fn try_register(&self, handle: &str, registration: Registration) -> MarketResult<Account> {
        registration.validate()?;
        let role = registration.gender.role();
        let rate = match role {
            Role::Provider => self.pricing.default_rate,
            _ => 0,
        };
        // Cheap duplicate check before paying for the hash; the store re-checks
        // under its own lock.
        if self.store.find_by_handle(handle)?.is_some() {
            return Err(MarketError::DuplicateIdentity {
                handle: handle.to_string(),
            });
        }
        let secret = self.hash_off_runtime(registration.secret).await?;
        self.store.insert(
            NewAccount {
                handle: handle.to_string(),
                display_name: registration.display_name.trim().to_string(),
                role,
                rate,
            },
            secret,
        )
    }

    /// Unknown handle and wrong secret are indistinguishable. An unapproved
    /// provider is reported as `PendingApproval`, but only once the secret
    /// has been verified.
    pub async fn authenticate(&self, handle: &str, secret: &str) -> MarketResult<Account> {
        let handle = handle.trim();
        let result = self.try_authenticate(handle, secret).await;
        let outcome = match &result {
            Ok(account) => AuthOutcome::Success {
                account: account.id,
                role: account.role,
            },
            Err(e) => AuthOutcome::Failure { kind: e.kind() },
        };
        self.app_events.on_auth_result(handle, outcome).await;
        result
    }

    async fn try_authenticate(&self, handle: &str, secret: &str) -> MarketResult<Account> {
        let record = self
            .store
            .find_by_handle(handle)?
            .ok_or(MarketError::InvalidCredentials)?;
        if !self.verify_off_runtime(secret.to_string(), record.secret).await? {
            return Err(MarketError::InvalidCredentials);
        }
        if record.account.is_pending_provider() {
            return Err(MarketError::PendingApproval);
        }
        Ok(record.account)
    }

    // Hashing runs on the blocking pool.
    async fn hash_off_runtime(&self, secret: String) -> MarketResult<SecretHash> {
        let hasher = Arc::clone(&self.hasher);
        tokio::task::spawn_blocking(move || hasher.hash(&secret))
            .await
            .map_err(|e| MarketError::storage(format!("hashing task failed: {e}")))?
    }

    async fn verify_off_runtime(&self, secret: String, hash: SecretHash) -> MarketResult<bool> {
        let hasher = Arc::clone(&self.hasher);
        tokio::task::spawn_blocking(move || hasher.verify(&secret, &hash))
            .await
            .map_err(|e| MarketError::storage(format!("verification task failed: {e}")))
    }

    pub fn get(&self, id: AccountId) -> MarketResult<Account> {
        self.store
            .get(id)?
            .ok_or_else(|| MarketError::not_found("account", id))
    }

    /// Approved and online providers, in registration order.
    pub fn list_discoverable(&self, filter: Option<&str>) -> MarketResult<Vec<Account>> {
        Ok(self
            .store
            .list()?
            .into_iter()
            .filter(|a| a.is_discoverable() && a.name_matches(filter))
            .collect())
    }

    /// Every approved provider, online or not.
    pub fn showcase(&self, filter: Option<&str>) -> MarketResult<Vec<Account>> {
        Ok(self
            .store
            .list()?
            .into_iter()
            .filter(|a| a.role == Role::Provider && a.approved && a.name_matches(filter))
            .collect())
    }

    pub fn callable_provider(&self, provider: AccountId) -> MarketResult<Account> {
        match self.store.get(provider)? {
            Some(account) if account.is_discoverable() => Ok(account),
            _ => Err(MarketError::ProviderUnavailable(provider)),
        }
    }
}
