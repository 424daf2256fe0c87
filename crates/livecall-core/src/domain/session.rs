//! The authenticated identity held by one client process.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::account::{Account, AccountId, Role};

/// Opaque bearer token issued on successful authentication.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionToken(pub String);

impl SessionToken {
    pub fn generate() -> Self {
        Self(format!("{:032x}", rand::random::<u128>()))
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = &self.0[..self.0.len().min(6)];
        write!(f, "SessionToken({prefix}...)")
    }
}

/// What a role is allowed to do. Derived, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Capability {
    Discover,
    PlaceCall,
    ManageBalance,
    ManagePresence,
    ManageGallery,
    ApproveProviders,
    ViewStats,
}

impl Role {
    pub fn capabilities(self) -> &'static [Capability] {
        match self {
            Role::Payer => &[
                Capability::Discover,
                Capability::PlaceCall,
                Capability::ManageBalance,
            ],
            Role::Provider => &[Capability::ManagePresence, Capability::ManageGallery],
            Role::Admin => &[Capability::ApproveProviders, Capability::ViewStats],
        }
    }
}

/// Current identity plus the role snapshot taken at login.
///
/// The snapshot drives local UI decisions only; the hosting service re-reads
/// the live record on every privileged call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub token: SessionToken,
    pub account: Account,
}

impl Session {
    pub fn account_id(&self) -> AccountId {
        self.account.id
    }

    pub fn role(&self) -> Role {
        self.account.role
    }

    pub fn can(&self, capability: Capability) -> bool {
        self.role().capabilities().contains(&capability)
    }
}
