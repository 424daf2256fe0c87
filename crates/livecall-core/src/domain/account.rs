//! Account identifiers, roles, and the account record itself.
//!
//! These are **pure data**: no I/O, no locking.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::billing::Credits;
use super::error::MarketError;

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// Store-assigned account identifier. Monotonic, so it also encodes
/// registration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AccountId(pub u64);

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifies one item in a provider's media gallery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MediaId(pub u64);

impl fmt::Display for MediaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Roles and registration attributes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Payer,
    Provider,
    Admin,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Role::Payer => "payer",
            Role::Provider => "provider",
            Role::Admin => "admin",
        })
    }
}

/// Attribute declared at registration; the role is derived from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gender {
    Female,
    Male,
}

impl Gender {
    /// Female registrants become providers, everyone else pays.
    pub fn role(self) -> Role {
        match self {
            Gender::Female => Role::Provider,
            Gender::Male => Role::Payer,
        }
    }
}

impl FromStr for Gender {
    type Err = MarketError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "female" | "f" => Ok(Gender::Female),
            "male" | "m" => Ok(Gender::Male),
            other => Err(MarketError::InvalidRegistration(format!(
                "unknown gender '{other}'"
            ))),
        }
    }
}

/// Where a provider sits in the approval workflow. `Removed` is never stored:
/// a rejected account is deleted outright.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApprovalState {
    Pending,
    Approved,
    Removed,
}

// ---------------------------------------------------------------------------
// Media gallery
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MediaKind {
    Photo,
    Video,
}

impl FromStr for MediaKind {
    type Err = MarketError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "photo" | "image" => Ok(MediaKind::Photo),
            "video" => Ok(MediaKind::Video),
            other => Err(MarketError::InvalidRegistration(format!(
                "unknown media kind '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaItem {
    pub id: MediaId,
    /// Opaque reference understood by the media layer (URL, blob key, ...).
    pub locator: String,
    pub kind: MediaKind,
}

// ---------------------------------------------------------------------------
// Account
// ---------------------------------------------------------------------------

/// Public view of an account. Never carries the secret.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    /// Unique login handle (phone number in practice).
    pub handle: String,
    pub display_name: String,
    pub role: Role,
    pub approved: bool,
    pub online: bool,
    /// Price per minute. Zero for anyone who is not a provider.
    pub rate: Credits,
    pub gallery: Vec<MediaItem>,
    /// Last media id handed out; ids are never reused after removal.
    #[serde(default)]
    pub last_media_id: u64,
}

impl Account {
    pub fn approval(&self) -> ApprovalState {
        if self.approved {
            ApprovalState::Approved
        } else {
            ApprovalState::Pending
        }
    }

    pub fn is_pending_provider(&self) -> bool {
        self.role == Role::Provider && !self.approved
    }

    /// Only approved providers that are online may be shown to payers.
    pub fn is_discoverable(&self) -> bool {
        self.role == Role::Provider && self.approved && self.online
    }

    /// Case-insensitive substring match on the display name.
    pub fn name_matches(&self, filter: Option<&str>) -> bool {
        match filter.map(str::trim) {
            None | Some("") => true,
            Some(f) => self
                .display_name
                .to_lowercase()
                .contains(&f.to_lowercase()),
        }
    }

    pub(crate) fn push_media(&mut self, locator: String, kind: MediaKind) -> MediaItem {
        let newest = self.gallery.iter().map(|m| m.id.0).max().unwrap_or(0);
        self.last_media_id = self.last_media_id.max(newest) + 1;
        let item = MediaItem {
            id: MediaId(self.last_media_id),
            locator,
            kind,
        };
        self.gallery.push(item.clone());
        item
    }
}

/// A registration request as submitted by the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Registration {
    pub handle: String,
    pub secret: String,
    pub display_name: String,
    pub gender: Gender,
}

impl Registration {
    /// Reject blank fields before anything is hashed or written.
    pub fn validate(&self) -> Result<(), MarketError> {
        if self.handle.trim().is_empty() {
            return Err(MarketError::InvalidRegistration("handle is empty".into()));
        }
        if self.display_name.trim().is_empty() {
            return Err(MarketError::InvalidRegistration("name is empty".into()));
        }
        if self.secret.is_empty() {
            return Err(MarketError::InvalidRegistration("secret is empty".into()));
        }
        Ok(())
    }
}

/// Fields of a new account before the store assigns its id.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub handle: String,
    pub display_name: String,
    pub role: Role,
    pub rate: Credits,
}

impl NewAccount {
    /// Payers and admins are approved on creation; providers wait for an admin.
    pub fn into_account(self, id: AccountId) -> Account {
        let approved = self.role != Role::Provider;
        Account {
            id,
            handle: self.handle,
            display_name: self.display_name,
            role: self.role,
            approved,
            online: false,
            rate: self.rate,
            gallery: Vec::new(),
            last_media_id: 0,
        }
    }
}

// ---------------------------------------------------------------------------
// Stored secret
// ---------------------------------------------------------------------------

/// Encoded secret hash (PHC string or `sha256$salt$digest`).
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretHash(pub String);

impl fmt::Debug for SecretHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretHash(***)")
    }
}

/// What the store actually keeps per account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountRecord {
    pub account: Account,
    pub secret: SecretHash,
}

/// Headline numbers for the admin dashboard.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketStats {
    pub total_payers: usize,
    pub total_providers: usize,
    pub pending_approvals: usize,
    /// Providers flagged online, approved or not.
    pub online_providers: usize,
}

impl MarketStats {
    pub fn tally<'a>(accounts: impl IntoIterator<Item = &'a Account>) -> Self {
        let mut stats = Self::default();
        for acct in accounts {
            match acct.role {
                Role::Payer => stats.total_payers += 1,
                Role::Provider => {
                    stats.total_providers += 1;
                    if !acct.approved {
                        stats.pending_approvals += 1;
                    }
                    if acct.online {
                        stats.online_providers += 1;
                    }
                }
                Role::Admin => {}
            }
        }
        stats
    }
}
