//! TOML configuration shared by the server and the CLI.
//!
//! Every field has a default, so an empty file (or no file) is valid.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::domain::billing::Credits;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketConfig {
    pub pricing: PricingConfig,
    pub billing: BillingConfig,
    pub admin: AdminConfig,
    pub security: SecurityConfig,
    pub server: ServerConfig,
    pub client: ClientConfig,
    pub notifications: NotificationConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PricingConfig {
    pub min_rate: Credits,
    pub max_rate: Credits,
    /// Rate a provider starts with at registration.
    pub default_rate: Credits,
    pub durations_minutes: Vec<u32>,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            min_rate: 50,
            max_rate: 1000,
            default_rate: 100,
            durations_minutes: vec![5, 10, 15],
        }
    }
}

impl PricingConfig {
    pub fn rate_in_bounds(&self, rate: Credits) -> bool {
        (self.min_rate..=self.max_rate).contains(&rate)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BillingConfig {
    /// Balance a payer sees on first access.
    pub opening_balance: Credits,
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            opening_balance: 500,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdminConfig {
    pub handle: String,
    pub secret: String,
    pub name: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            handle: "admin".into(),
            secret: "admin123".into(),
            name: "Admin".into(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HasherKind {
    #[default]
    Argon2,
    Sha256,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    pub hasher: HasherKind,
    /// A session token unused for this long is revoked.
    pub session_ttl_secs: u64,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            hasher: HasherKind::default(),
            session_ttl_secs: 24 * 60 * 60,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: SocketAddr,
    /// JSON snapshot of accounts and balances. In-memory only when unset.
    pub state_file: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], 4433)),
            state_file: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub server_addr: SocketAddr,
    pub server_name: String,
    pub session_file: PathBuf,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_addr: SocketAddr::from(([127, 0, 0, 1], 4433)),
            server_name: "localhost".into(),
            session_file: PathBuf::from(".livecall-session.json"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    pub enabled: bool,
    pub interval_secs: u64,
    pub probability: f64,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_secs: 15,
            probability: 0.05,
        }
    }
}

impl MarketConfig {
    pub fn from_toml_str(text: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(text).context("parsing config")?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path`, or fall back to defaults when the file is missing.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        let p = &self.pricing;
        if p.min_rate == 0 {
            anyhow::bail!("pricing.min_rate must be positive");
        }
        if !(p.min_rate <= p.default_rate && p.default_rate <= p.max_rate) {
            anyhow::bail!(
                "pricing.default_rate {} must lie within {}..={}",
                p.default_rate,
                p.min_rate,
                p.max_rate
            );
        }
        if p.durations_minutes.is_empty() || p.durations_minutes.contains(&0) {
            anyhow::bail!("pricing.durations_minutes must be non-empty and non-zero");
        }
        if !(0.0..=1.0).contains(&self.notifications.probability) {
            anyhow::bail!("notifications.probability must be within [0, 1]");
        }
        if self.security.session_ttl_secs == 0 {
            anyhow::bail!("security.session_ttl_secs must be positive");
        }
        if self.notifications.interval_secs == 0 {
            anyhow::bail!("notifications.interval_secs must be positive");
        }
        Ok(())
    }
}
