//! Simulated "someone wants to call you" hints for an online provider.
//!
//! Decoupled from call sessions: it only ever emits
//! [`AppEvents::on_incoming_call_hint`].

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant};
use tracing::debug;

use crate::config::NotificationConfig;
use crate::domain::account::AccountId;

use super::ports::AppEvents;

pub struct IncomingCallHints {
    app_events: Arc<dyn AppEvents>,
    interval: Duration,
    probability: f64,
}

impl IncomingCallHints {
    pub fn new(app_events: Arc<dyn AppEvents>, config: &NotificationConfig) -> Self {
        Self {
            app_events,
            interval: Duration::from_secs(config.interval_secs),
            probability: config.probability.clamp(0.0, 1.0),
        }
    }

    /// Start rolling for `provider`. Stops when the returned guard is dropped.
    pub fn spawn(self, provider: AccountId) -> HintsGuard {
        HintsGuard {
            task: tokio::spawn(self.run(provider)),
        }
    }

    async fn run(self, provider: AccountId) {
        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        loop {
            ticker.tick().await;
            let fire = rand::thread_rng().gen_bool(self.probability);
            if fire {
                debug!(%provider, "Incoming call hint");
                self.app_events.on_incoming_call_hint(provider).await;
            }
        }
    }
}

/// Aborts the hint loop on drop.
pub struct HintsGuard {
    task: JoinHandle<()>,
}

impl Drop for HintsGuard {
    fn drop(&mut self) {
        self.task.abort();
    }
}
