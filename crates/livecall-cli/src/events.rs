//! ConsoleAppEvents: implements the [`AppEvents`] port by printing to stdout.

use async_trait::async_trait;

use livecall_core::application::ports::{AppEvents, AuthOutcome};
use livecall_core::domain::account::{AccountId, ApprovalState};
use livecall_core::domain::call::{format_clock, CallEvent, CallId, EndReason, Party};

#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleAppEvents;

fn describe_end(reason: &EndReason) -> &'static str {
    match reason {
        EndReason::TimeExpired => "time is up",
        EndReason::HungUp(Party::Payer) => "you hung up",
        EndReason::HungUp(Party::Provider) => "the provider hung up",
        EndReason::CaptureFailed => "camera or microphone unavailable",
        EndReason::TornDown => "call closed",
    }
}

#[async_trait]
impl AppEvents for ConsoleAppEvents {
    async fn on_auth_result(&self, handle: &str, outcome: AuthOutcome) {
        match outcome {
            AuthOutcome::Success { role, .. } => println!("Signed in as {handle} ({role})"),
            AuthOutcome::Failure { kind } => println!("Sign-in failed for {handle}: {kind}"),
        }
    }

    async fn on_approval_changed(&self, provider: AccountId, state: ApprovalState) {
        println!("Provider {provider} is now {state:?}");
    }

    async fn on_call_lifecycle(&self, _call: CallId, event: &CallEvent) {
        match event {
            CallEvent::Offered(offer) => println!(
                "{} min with {} at {}/min: {} credits",
                offer.duration_minutes, offer.provider_name, offer.unit_rate, offer.total_cost
            ),
            CallEvent::Paid(receipt) => println!(
                "Paid {} credits, balance {}",
                receipt.amount, receipt.balance_after
            ),
            CallEvent::Active { budget_seconds } => {
                println!("Connected, {} on the clock", format_clock(*budget_seconds))
            }
            CallEvent::TimeExpired => println!("Time expired"),
            CallEvent::Ended(summary) => println!(
                "Call ended after {} ({})",
                format_clock(summary.elapsed_seconds()),
                describe_end(&summary.reason)
            ),
            CallEvent::CaptureFailed { reason, charged } => println!(
                "Could not start media: {reason}. {charged} credits were charged"
            ),
        }
    }

    async fn on_incoming_call_hint(&self, _provider: AccountId) {
        println!("Someone may be about to call you");
    }
}
