//! Provider self-service: presence, per-minute rate and media gallery.
//!
//! Every mutation goes through one store update, so discovery sees it on the
//! very next read.

use std::sync::Arc;

use tracing::info;

use crate::config::PricingConfig;
use crate::domain::account::{Account, AccountId, MediaId, MediaItem, MediaKind, Role};
use crate::domain::billing::Credits;
use crate::domain::error::{MarketError, MarketResult};

use super::ports::AccountStore;

pub struct PresenceUseCase {
    store: Arc<dyn AccountStore>,
    pricing: PricingConfig,
}

/// A provider may only touch its own record.
fn require_self(actor: &Account, provider: AccountId) -> MarketResult<()> {
    if actor.role != Role::Provider {
        return Err(MarketError::unauthorized(format!(
            "{} accounts have no presence",
            actor.role
        )));
    }
    if actor.id != provider {
        return Err(MarketError::unauthorized(format!(
            "{} cannot modify {provider}",
            actor.id
        )));
    }
    Ok(())
}

impl PresenceUseCase {
    pub fn new(store: Arc<dyn AccountStore>, pricing: PricingConfig) -> Self {
        Self { store, pricing }
    }

    pub fn set_online(
        &self,
        actor: &Account,
        provider: AccountId,
        online: bool,
    ) -> MarketResult<Account> {
        require_self(actor, provider)?;
        let account = self.store.update(provider, &mut |a| {
            a.online = online;
            Ok(())
        })?;
        info!(%provider, online, "Presence changed");
        Ok(account)
    }

    /// Out-of-range rates fail with `InvalidRate` and leave the old rate.
    pub fn set_rate(
        &self,
        actor: &Account,
        provider: AccountId,
        rate: Credits,
    ) -> MarketResult<Account> {
        require_self(actor, provider)?;
        if !self.pricing.rate_in_bounds(rate) {
            return Err(MarketError::InvalidRate {
                amount: rate,
                min: self.pricing.min_rate,
                max: self.pricing.max_rate,
            });
        }
        let account = self.store.update(provider, &mut |a| {
            a.rate = rate;
            Ok(())
        })?;
        info!(%provider, rate, "Rate changed");
        Ok(account)
    }

    pub fn add_media(
        &self,
        actor: &Account,
        provider: AccountId,
        locator: String,
        kind: MediaKind,
    ) -> MarketResult<MediaItem> {
        require_self(actor, provider)?;
        let mut added = None;
        self.store.update(provider, &mut |a| {
            added = Some(a.push_media(locator.clone(), kind));
            Ok(())
        })?;
        let item = added.ok_or_else(|| MarketError::storage("gallery update was not applied"))?;
        info!(%provider, media = %item.id, ?kind, "Media added");
        Ok(item)
    }

    pub fn remove_media(
        &self,
        actor: &Account,
        provider: AccountId,
        media: MediaId,
    ) -> MarketResult<()> {
        require_self(actor, provider)?;
        self.store.update(provider, &mut |a| {
            let before = a.gallery.len();
            a.gallery.retain(|m| m.id != media);
            if a.gallery.len() == before {
                return Err(MarketError::not_found("media", media));
            }
            Ok(())
        })?;
        info!(%provider, %media, "Media removed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::account_store::InMemoryAccountStore;
    use crate::domain::account::{NewAccount, SecretHash};

    fn setup() -> (PresenceUseCase, Arc<InMemoryAccountStore>, Account, Account) {
        let store = Arc::new(InMemoryAccountStore::new());
        let insert = |handle: &str, role| {
            store
                .insert(
                    NewAccount {
                        handle: handle.into(),
                        display_name: handle.into(),
                        role,
                        rate: 100,
                    },
                    SecretHash("x".into()),
                )
                .unwrap()
        };
        let mitu = insert("mitu", Role::Provider);
        let nila = insert("nila", Role::Provider);
        (
            PresenceUseCase::new(store.clone(), PricingConfig::default()),
            store,
            mitu,
            nila,
        )
    }

    #[test]
    fn presence_is_visible_immediately() {
        let (uc, store, mitu, _) = setup();
        store
            .update(mitu.id, &mut |a| {
                a.approved = true;
                Ok(())
            })
            .unwrap();
        uc.set_online(&mitu, mitu.id, true).unwrap();
        assert!(store.get(mitu.id).unwrap().unwrap().is_discoverable());
        uc.set_online(&mitu, mitu.id, false).unwrap();
        assert!(!store.get(mitu.id).unwrap().unwrap().is_discoverable());
    }

    #[test]
    fn rate_bounds_are_enforced() {
        let (uc, store, mitu, _) = setup();
        assert_eq!(uc.set_rate(&mitu, mitu.id, 50).unwrap().rate, 50);
        assert_eq!(uc.set_rate(&mitu, mitu.id, 1000).unwrap().rate, 1000);
        for bad in [0, 49, 1001] {
            let err = uc.set_rate(&mitu, mitu.id, bad).unwrap_err();
            assert_eq!(
                err,
                MarketError::InvalidRate {
                    amount: bad,
                    min: 50,
                    max: 1000
                }
            );
        }
        assert_eq!(store.get(mitu.id).unwrap().unwrap().rate, 1000);
    }

    #[test]
    fn cross_account_mutation_is_unauthorized() {
        let (uc, store, mitu, nila) = setup();
        assert!(matches!(
            uc.set_online(&mitu, nila.id, true),
            Err(MarketError::Unauthorized(_))
        ));
        assert!(matches!(
            uc.set_rate(&mitu, nila.id, 200),
            Err(MarketError::Unauthorized(_))
        ));
        let after = store.get(nila.id).unwrap().unwrap();
        assert!(!after.online);
        assert_eq!(after.rate, 100);
    }

    #[test]
    fn gallery_add_and_remove() {
        let (uc, store, mitu, _) = setup();
        let photo = uc
            .add_media(&mitu, mitu.id, "img/1.jpg".into(), MediaKind::Photo)
            .unwrap();
        let video = uc
            .add_media(&mitu, mitu.id, "vid/1.mp4".into(), MediaKind::Video)
            .unwrap();
        assert_ne!(photo.id, video.id);

        uc.remove_media(&mitu, mitu.id, photo.id).unwrap();
        let gallery = store.get(mitu.id).unwrap().unwrap().gallery;
        assert_eq!(gallery, vec![video]);

        assert!(matches!(
            uc.remove_media(&mitu, mitu.id, photo.id),
            Err(MarketError::NotFound { .. })
        ));
    }

    #[test]
    fn removed_newest_item_id_is_not_handed_out_again() {
        let (uc, store, mitu, _) = setup();
        uc.add_media(&mitu, mitu.id, "img/1.jpg".into(), MediaKind::Photo)
            .unwrap();
        let newest = uc
            .add_media(&mitu, mitu.id, "img/2.jpg".into(), MediaKind::Photo)
            .unwrap();
        uc.remove_media(&mitu, mitu.id, newest.id).unwrap();

        let next = uc
            .add_media(&mitu, mitu.id, "img/3.jpg".into(), MediaKind::Photo)
            .unwrap();
        assert_ne!(next.id, newest.id);
        let ids: Vec<_> = store
            .get(mitu.id)
            .unwrap()
            .unwrap()
            .gallery
            .iter()
            .map(|m| m.id)
            .collect();
        assert_eq!(ids.len(), 2);
        assert!(!ids.contains(&newest.id));
    }
}
