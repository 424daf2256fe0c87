//! [`AppEvents`] sinks that do not need a UI: structured logs and a channel.

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::application::ports::{AppEvents, AuthOutcome};
use crate::domain::account::{AccountId, ApprovalState};
use crate::domain::call::{CallEvent, CallId};

/// Logs every event. Used by the server, where nobody is watching a screen.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAppEvents;

#[async_trait]
impl AppEvents for TracingAppEvents {
    async fn on_auth_result(&self, handle: &str, outcome: AuthOutcome) {
        match outcome {
            AuthOutcome::Success { account, role } => {
                info!(handle, %account, %role, "Authenticated")
            }
            AuthOutcome::Failure { kind } => warn!(handle, kind, "Authentication failed"),
        }
    }

    async fn on_approval_changed(&self, provider: AccountId, state: ApprovalState) {
        info!(%provider, ?state, "Approval changed");
    }

    async fn on_call_lifecycle(&self, call: CallId, event: &CallEvent) {
        match event {
            CallEvent::CaptureFailed { reason, charged } => {
                warn!(%call, reason, charged, "Capture failed after payment")
            }
            other => info!(%call, event = ?other, "Call event"),
        }
    }

    async fn on_incoming_call_hint(&self, provider: AccountId) {
        info!(%provider, "Incoming call hint");
    }
}

/// Owned copy of an [`AppEvents`] callback.
#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    Auth {
        handle: String,
        outcome: AuthOutcome,
    },
    Approval {
        provider: AccountId,
        state: ApprovalState,
    },
    Call {
        call: CallId,
        event: CallEvent,
    },
    IncomingCallHint {
        provider: AccountId,
    },
}

/// Forwards every event into an unbounded channel.
///
/// Sends after the receiver is gone are dropped.
#[derive(Clone)]
pub struct ChannelAppEvents {
    tx: mpsc::UnboundedSender<AppEvent>,
}

impl ChannelAppEvents {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<AppEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn send(&self, event: AppEvent) {
        let _ = self.tx.send(event);
    }
}

#[async_trait]
impl AppEvents for ChannelAppEvents {
    async fn on_auth_result(&self, handle: &str, outcome: AuthOutcome) {
        self.send(AppEvent::Auth {
            handle: handle.to_string(),
            outcome,
        });
    }

    async fn on_approval_changed(&self, provider: AccountId, state: ApprovalState) {
        self.send(AppEvent::Approval { provider, state });
    }

    async fn on_call_lifecycle(&self, call: CallId, event: &CallEvent) {
        self.send(AppEvent::Call {
            call,
            event: event.clone(),
        });
    }

    async fn on_incoming_call_hint(&self, provider: AccountId) {
        self.send(AppEvent::IncomingCallHint { provider });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn channel_sink_preserves_order() {
        let (events, mut rx) = ChannelAppEvents::new();
        events
            .on_approval_changed(AccountId(2), ApprovalState::Approved)
            .await;
        events
            .on_call_lifecycle(CallId(1), &CallEvent::TimeExpired)
            .await;

        assert_eq!(
            rx.recv().await,
            Some(AppEvent::Approval {
                provider: AccountId(2),
                state: ApprovalState::Approved
            })
        );
        assert_eq!(
            rx.recv().await,
            Some(AppEvent::Call {
                call: CallId(1),
                event: CallEvent::TimeExpired
            })
        );
    }

    #[tokio::test]
    async fn closed_receiver_is_ignored() {
        let (events, rx) = ChannelAppEvents::new();
        drop(rx);
        events.on_incoming_call_hint(AccountId(1)).await;
    }
}
