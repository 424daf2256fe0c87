//! Provider approval workflow: `Pending -> Approved` or `Pending -> Removed`.
//!
//! Every listing here reads the store directly; nothing is cached between an
//! admin looking at the queue and acting on it.

use std::sync::Arc;

use tracing::info;

use crate::domain::account::{Account, AccountId, ApprovalState, MarketStats, Role};
use crate::domain::error::{MarketError, MarketResult};

use super::ports::{AccountStore, AppEvents};

pub struct ApprovalUseCase {
    store: Arc<dyn AccountStore>,
    app_events: Arc<dyn AppEvents>,
}

fn require_admin(actor: &Account) -> MarketResult<()> {
    if actor.role == Role::Admin {
        Ok(())
    } else {
        Err(MarketError::unauthorized(format!(
            "{} accounts cannot manage approvals",
            actor.role
        )))
    }
}

impl ApprovalUseCase {
    pub fn new(store: Arc<dyn AccountStore>, app_events: Arc<dyn AppEvents>) -> Self {
        Self { store, app_events }
    }

    /// Idempotent: approving an approved provider changes nothing and emits
    /// nothing.
    pub async fn approve(&self, actor: &Account, provider: AccountId) -> MarketResult<ApprovalState> {
        require_admin(actor)?;
        let mut changed = false;
        self.store.update(provider, &mut |account| {
            if account.role != Role::Provider {
                return Err(MarketError::InvalidTransition(format!(
                    "{} is not a provider",
                    account.id
                )));
            }
            changed = !account.approved;
            account.approved = true;
            Ok(())
        })?;

        if changed {
            info!(%provider, admin = %actor.id, "Provider approved");
            self.app_events
                .on_approval_changed(provider, ApprovalState::Approved)
                .await;
        }
        Ok(ApprovalState::Approved)
    }

    /// Deletes a pending provider outright. A second rejection of the same
    /// provider finds nothing and succeeds.
    pub async fn reject(&self, actor: &Account, provider: AccountId) -> MarketResult<ApprovalState> {
        require_admin(actor)?;
        let removed = self.store.remove_if(provider, &|account| {
            match (account.role, account.approved) {
                (Role::Provider, false) => Ok(true),
                (Role::Provider, true) => Err(MarketError::InvalidTransition(format!(
                    "{} is already approved",
                    account.id
                ))),
                _ => Err(MarketError::InvalidTransition(format!(
                    "{} is not a provider",
                    account.id
                ))),
            }
        })?;

        if removed.is_some() {
            info!(%provider, admin = %actor.id, "Provider rejected and removed");
            self.app_events
                .on_approval_changed(provider, ApprovalState::Removed)
                .await;
        }
        Ok(ApprovalState::Removed)
    }

    pub fn pending_providers(&self, actor: &Account) -> MarketResult<Vec<Account>> {
        self.providers_where(actor, |a| !a.approved)
    }

    pub fn approved_providers(&self, actor: &Account) -> MarketResult<Vec<Account>> {
        self.providers_where(actor, |a| a.approved)
    }

    pub fn payers(&self, actor: &Account) -> MarketResult<Vec<Account>> {
        require_admin(actor)?;
        Ok(self
            .store
            .list()?
            .into_iter()
            .filter(|a| a.role == Role::Payer)
            .collect())
    }

    pub fn stats(&self, actor: &Account) -> MarketResult<MarketStats> {
        require_admin(actor)?;
        Ok(MarketStats::tally(&self.store.list()?))
    }

    fn providers_where(
        &self,
        actor: &Account,
        keep: impl Fn(&Account) -> bool,
    ) -> MarketResult<Vec<Account>> {
        require_admin(actor)?;
        Ok(self
            .store
            .list()?
            .into_iter()
            .filter(|a| a.role == Role::Provider && keep(a))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::account_store::InMemoryAccountStore;
    use crate::adapters::events::{AppEvent, ChannelAppEvents};
    use crate::domain::account::{NewAccount, SecretHash};

    struct Fixture {
        uc: ApprovalUseCase,
        store: Arc<InMemoryAccountStore>,
        rx: tokio::sync::mpsc::UnboundedReceiver<AppEvent>,
        admin: Account,
        payer: Account,
        provider: Account,
    }

    fn insert(store: &InMemoryAccountStore, handle: &str, role: Role) -> Account {
        store
            .insert(
                NewAccount {
                    handle: handle.into(),
                    display_name: handle.into(),
                    role,
                    rate: if role == Role::Provider { 100 } else { 0 },
                },
                SecretHash("x".into()),
            )
            .unwrap()
    }

    fn fixture() -> Fixture {
        let store = Arc::new(InMemoryAccountStore::new());
        let (events, rx) = ChannelAppEvents::new();
        let admin = insert(&store, "admin", Role::Admin);
        let payer = insert(&store, "0181", Role::Payer);
        let provider = insert(&store, "0171", Role::Provider);
        Fixture {
            uc: ApprovalUseCase::new(store.clone(), Arc::new(events)),
            store,
            rx,
            admin,
            payer,
            provider,
        }
    }

    #[tokio::test]
    async fn approve_is_idempotent() {
        let mut f = fixture();
        assert_eq!(
            f.uc.approve(&f.admin, f.provider.id).await.unwrap(),
            ApprovalState::Approved
        );
        assert_eq!(
            f.uc.approve(&f.admin, f.provider.id).await.unwrap(),
            ApprovalState::Approved
        );
        assert!(f.store.get(f.provider.id).unwrap().unwrap().approved);

        assert_eq!(
            f.rx.recv().await,
            Some(AppEvent::Approval {
                provider: f.provider.id,
                state: ApprovalState::Approved
            })
        );
        assert!(f.rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn reject_removes_and_is_idempotent() {
        let f = fixture();
        f.uc.reject(&f.admin, f.provider.id).await.unwrap();
        assert!(f.store.get(f.provider.id).unwrap().is_none());
        assert!(f.store.find_by_handle("0171").unwrap().is_none());
        assert_eq!(
            f.uc.reject(&f.admin, f.provider.id).await.unwrap(),
            ApprovalState::Removed
        );
    }

    #[tokio::test]
    async fn approved_provider_cannot_be_rejected() {
        let f = fixture();
        f.uc.approve(&f.admin, f.provider.id).await.unwrap();
        let err = f.uc.reject(&f.admin, f.provider.id).await.unwrap_err();
        assert!(matches!(err, MarketError::InvalidTransition(_)));
        assert!(f.store.get(f.provider.id).unwrap().is_some());
    }

    #[tokio::test]
    async fn only_admins_may_decide() {
        let f = fixture();
        for actor in [&f.payer, &f.provider] {
            assert!(matches!(
                f.uc.approve(actor, f.provider.id).await,
                Err(MarketError::Unauthorized(_))
            ));
            assert!(matches!(
                f.uc.reject(actor, f.provider.id).await,
                Err(MarketError::Unauthorized(_))
            ));
            assert!(matches!(
                f.uc.stats(actor),
                Err(MarketError::Unauthorized(_))
            ));
        }
        assert!(!f.store.get(f.provider.id).unwrap().unwrap().approved);
    }

    #[tokio::test]
    async fn payers_and_admins_are_not_approval_targets() {
        let f = fixture();
        assert!(matches!(
            f.uc.approve(&f.admin, f.payer.id).await,
            Err(MarketError::InvalidTransition(_))
        ));
        assert!(matches!(
            f.uc.reject(&f.admin, f.admin.id).await,
            Err(MarketError::InvalidTransition(_))
        ));
    }

    #[tokio::test]
    async fn listings_reflect_live_state() {
        let f = fixture();
        assert_eq!(f.uc.pending_providers(&f.admin).unwrap().len(), 1);
        assert!(f.uc.approved_providers(&f.admin).unwrap().is_empty());

        f.uc.approve(&f.admin, f.provider.id).await.unwrap();
        assert!(f.uc.pending_providers(&f.admin).unwrap().is_empty());
        assert_eq!(f.uc.approved_providers(&f.admin).unwrap().len(), 1);
        assert_eq!(f.uc.payers(&f.admin).unwrap()[0].id, f.payer.id);

        let stats = f.uc.stats(&f.admin).unwrap();
        assert_eq!(
            stats,
            MarketStats {
                total_payers: 1,
                total_providers: 1,
                pending_approvals: 0,
                online_providers: 0,
            }
        );
    }
}
