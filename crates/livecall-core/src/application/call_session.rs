//! Call Session Engine.
//!
//! `Idle -> Offered -> Paid -> Active -> Ended`, one instance per call:
//!
//! - [`CallSessionEngine::offer`] prices a call against a callable provider
//!   (`Offered`).
//! - [`CallSession::start`] debits the payer (`Paid`), acquires media capture
//!   and spawns the countdown (`Active`).
//! - The countdown task owns the capture handle and ends the call on expiry,
//!   on hang-up, or when the [`ActiveCall`] handle is dropped. The capture
//!   handle is released on each of those paths.
//!
//! A payer holds at most one call between debit and `Ended`. The market
//! enforces this with a call lease taken by `begin_call` and returned by
//! `end_call`; the engine's own payer slot only rejects a second call from
//! the same process before any round trip.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::domain::account::AccountId;
use crate::domain::billing::Receipt;
use crate::domain::call::{
    CallEvent, CallId, CallOffer, CallPhase, CallSummary, EndReason, Party,
};
use crate::domain::error::{MarketError, MarketResult};
use crate::domain::session::{Capability, Session};

use super::ports::{AppEvents, CaptureHandle, MarketApi, MediaCapture};

const TICK: Duration = Duration::from_secs(1);

struct EngineInner {
    api: Arc<dyn MarketApi>,
    capture: Arc<dyn MediaCapture>,
    app_events: Arc<dyn AppEvents>,
    durations_minutes: Vec<u32>,
    active_payers: Mutex<HashSet<AccountId>>,
    next_call: AtomicU64,
}

/// Creates call sessions for one client process.
#[derive(Clone)]
pub struct CallSessionEngine {
    inner: Arc<EngineInner>,
}

impl CallSessionEngine {
    pub fn new(
        api: Arc<dyn MarketApi>,
        capture: Arc<dyn MediaCapture>,
        app_events: Arc<dyn AppEvents>,
        durations_minutes: Vec<u32>,
    ) -> Self {
        Self {
            inner: Arc::new(EngineInner {
                api,
                capture,
                app_events,
                durations_minutes,
                active_payers: Mutex::new(HashSet::new()),
                next_call: AtomicU64::new(1),
            }),
        }
    }

    pub fn durations_minutes(&self) -> &[u32] {
        &self.inner.durations_minutes
    }

    pub fn has_active_call(&self, payer: AccountId) -> bool {
        self.inner
            .active_payers
            .lock()
            .map(|set| set.contains(&payer))
            .unwrap_or(false)
    }

    /// `Idle -> Offered`. Nothing is charged yet.
    pub async fn offer(
        &self,
        session: &Session,
        provider: AccountId,
        duration_minutes: u32,
    ) -> MarketResult<CallSession> {
        if !session.can(Capability::PlaceCall) {
            return Err(MarketError::unauthorized(format!(
                "{} accounts cannot place calls",
                session.role()
            )));
        }
        let provider = self.inner.api.callable_provider(provider).await?;
        let offer = CallOffer::price(
            session.account_id(),
            &provider,
            duration_minutes,
            &self.inner.durations_minutes,
        )?;

        let id = CallId(self.inner.next_call.fetch_add(1, Ordering::Relaxed));
        info!(call = %id, payer = %offer.payer, provider = %offer.provider, cost = offer.total_cost, "Call offered");
        self.inner
            .app_events
            .on_call_lifecycle(id, &CallEvent::Offered(offer.clone()))
            .await;

        Ok(CallSession {
            id,
            session: session.clone(),
            offer,
            engine: Arc::clone(&self.inner),
        })
    }
}

// ---------------------------------------------------------------------------
// Offered call
// ---------------------------------------------------------------------------

/// A priced, unpaid call. Dropping it returns to `Idle` with no effect.
pub struct CallSession {
    id: CallId,
    session: Session,
    offer: CallOffer,
    engine: Arc<EngineInner>,
}

impl CallSession {
    pub fn id(&self) -> CallId {
        self.id
    }

    pub fn offer(&self) -> &CallOffer {
        &self.offer
    }

    pub fn phase(&self) -> CallPhase {
        CallPhase::Offered
    }

    /// `Offered -> Paid -> Active`.
    ///
    /// A failed debit leaves the balance untouched. A capture failure after
    /// the debit ends the call immediately and reports `CaptureFailed` with
    /// the amount already charged.
    pub async fn start(self) -> MarketResult<ActiveCall> {
        let Self {
            id,
            session,
            offer,
            engine,
        } = self;

        let slot = PayerSlot::claim(&engine, offer.payer)?;
        engine.api.callable_provider(offer.provider).await?;

        let receipt = engine
            .api
            .begin_call(&session, offer.payer, offer.total_cost)
            .await?;
        info!(call = %id, amount = receipt.amount, balance = receipt.balance_after, "Call paid");
        engine
            .app_events
            .on_call_lifecycle(id, &CallEvent::Paid(receipt.clone()))
            .await;

        let capture = match engine.capture.acquire(id).await {
            Ok(capture) => capture,
            Err(e) => {
                let reason = format!("{e:#}");
                warn!(call = %id, reason, charged = offer.total_cost, "Capture failed");
                end_call_lease(engine.api.as_ref(), &session, id, offer.payer).await;
                drop(slot);
                engine
                    .app_events
                    .on_call_lifecycle(
                        id,
                        &CallEvent::CaptureFailed {
                            reason: reason.clone(),
                            charged: offer.total_cost,
                        },
                    )
                    .await;
                let summary = CallSummary {
                    call_id: id,
                    payer: offer.payer,
                    provider: offer.provider,
                    started_at: None,
                    budget_seconds: offer.budget_seconds(),
                    remaining_seconds: offer.budget_seconds(),
                    charged: offer.total_cost,
                    reason: EndReason::CaptureFailed,
                };
                engine
                    .app_events
                    .on_call_lifecycle(id, &CallEvent::Ended(summary))
                    .await;
                return Err(MarketError::CaptureFailed {
                    reason,
                    charged: offer.total_cost,
                });
            }
        };

        let budget = offer.budget_seconds();
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (remaining_tx, remaining_rx) = watch::channel(budget);
        let (phase_tx, phase_rx) = watch::channel(CallPhase::Active);

        info!(call = %id, budget, "Call active");
        engine
            .app_events
            .on_call_lifecycle(id, &CallEvent::Active { budget_seconds: budget })
            .await;

        let countdown = Countdown {
            id,
            offer: offer.clone(),
            started_at: SystemTime::now(),
            capture,
            commands: commands_rx,
            remaining: remaining_tx,
            phase: phase_tx,
            app_events: Arc::clone(&engine.app_events),
            api: Arc::clone(&engine.api),
            session,
            slot,
        };
        let task = tokio::spawn(countdown.run());

        Ok(ActiveCall {
            id,
            offer,
            receipt,
            commands: commands_tx,
            remaining: remaining_rx,
            phase: phase_rx,
            task,
        })
    }
}

// ---------------------------------------------------------------------------
// Active call
// ---------------------------------------------------------------------------

#[derive(Debug)]
enum CallCommand {
    HangUp(Party),
    Audio(bool),
    Video(bool),
}

/// Handle to a running call. Dropping it tears the call down.
pub struct ActiveCall {
    id: CallId,
    offer: CallOffer,
    receipt: Receipt,
    commands: mpsc::UnboundedSender<CallCommand>,
    remaining: watch::Receiver<u64>,
    phase: watch::Receiver<CallPhase>,
    task: JoinHandle<CallSummary>,
}

impl ActiveCall {
    pub fn id(&self) -> CallId {
        self.id
    }

    pub fn offer(&self) -> &CallOffer {
        &self.offer
    }

    pub fn receipt(&self) -> &Receipt {
        &self.receipt
    }

    pub fn remaining_seconds(&self) -> u64 {
        *self.remaining.borrow()
    }

    /// Follows the countdown; the last value stays put once the call ends.
    pub fn watch_remaining(&self) -> watch::Receiver<u64> {
        self.remaining.clone()
    }

    pub fn phase(&self) -> CallPhase {
        *self.phase.borrow()
    }

    pub fn set_audio_enabled(&self, enabled: bool) {
        let _ = self.commands.send(CallCommand::Audio(enabled));
    }

    pub fn set_video_enabled(&self, enabled: bool) {
        let _ = self.commands.send(CallCommand::Video(enabled));
    }

    /// `Active -> Ended` on request of either party. On a call that already
    /// expired this just returns the existing summary.
    pub async fn hang_up(self, party: Party) -> MarketResult<CallSummary> {
        let _ = self.commands.send(CallCommand::HangUp(party));
        self.wait().await
    }

    /// Wait for the call to end by itself.
    pub async fn wait(self) -> MarketResult<CallSummary> {
        let Self { task, commands, .. } = self;
        let summary = task
            .await
            .map_err(|e| MarketError::InvalidTransition(format!("countdown task failed: {e}")))?;
        drop(commands);
        Ok(summary)
    }
}

// ---------------------------------------------------------------------------
// Countdown task
// ---------------------------------------------------------------------------

struct Countdown {
    id: CallId,
    offer: CallOffer,
    started_at: SystemTime,
    capture: Box<dyn CaptureHandle>,
    commands: mpsc::UnboundedReceiver<CallCommand>,
    remaining: watch::Sender<u64>,
    phase: watch::Sender<CallPhase>,
    app_events: Arc<dyn AppEvents>,
    api: Arc<dyn MarketApi>,
    session: Session,
    slot: PayerSlot,
}

impl Countdown {
    async fn run(mut self) -> CallSummary {
        let mut ticker = interval_at(Instant::now() + TICK, TICK);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Burst);
        let mut remaining = self.offer.budget_seconds();

        let reason = loop {
            tokio::select! {
                _ = ticker.tick() => {
                    remaining = remaining.saturating_sub(1);
                    self.remaining.send_replace(remaining);
                    if remaining == 0 {
                        info!(call = %self.id, "Call time expired");
                        self.app_events
                            .on_call_lifecycle(self.id, &CallEvent::TimeExpired)
                            .await;
                        break EndReason::TimeExpired;
                    }
                }
                command = self.commands.recv() => match command {
                    Some(CallCommand::HangUp(party)) => break EndReason::HungUp(party),
                    Some(CallCommand::Audio(enabled)) => {
                        debug!(call = %self.id, enabled, "Audio toggled");
                        self.capture.set_audio_enabled(enabled);
                    }
                    Some(CallCommand::Video(enabled)) => {
                        debug!(call = %self.id, enabled, "Video toggled");
                        self.capture.set_video_enabled(enabled);
                    }
                    None => break EndReason::TornDown,
                },
            }
        };
        drop(ticker);

        let Self {
            id,
            offer,
            started_at,
            capture,
            phase,
            app_events,
            api,
            session,
            slot,
            ..
        } = self;
        capture.release();
        end_call_lease(api.as_ref(), &session, id, offer.payer).await;
        drop(slot);
        phase.send_replace(CallPhase::Ended);

        let summary = CallSummary {
            call_id: id,
            payer: offer.payer,
            provider: offer.provider,
            started_at: Some(started_at),
            budget_seconds: offer.budget_seconds(),
            remaining_seconds: remaining,
            charged: offer.total_cost,
            reason,
        };
        info!(call = %id, reason = ?summary.reason, elapsed = summary.elapsed_seconds(), "Call ended");
        app_events
            .on_call_lifecycle(id, &CallEvent::Ended(summary.clone()))
            .await;
        summary
    }
}

// ---------------------------------------------------------------------------
// One call per payer
// ---------------------------------------------------------------------------

async fn end_call_lease(api: &dyn MarketApi, session: &Session, id: CallId, payer: AccountId) {
    if let Err(e) = api.end_call(session, payer).await {
        warn!(call = %id, %payer, "Failed to end call lease: {e}");
    }
}

/// Marks a payer busy until dropped.
struct PayerSlot {
    engine: Arc<EngineInner>,
    payer: AccountId,
}

impl PayerSlot {
    fn claim(engine: &Arc<EngineInner>, payer: AccountId) -> MarketResult<Self> {
        let mut active = engine
            .active_payers
            .lock()
            .map_err(|_| MarketError::storage("call registry lock poisoned"))?;
        if !active.insert(payer) {
            return Err(MarketError::CallInProgress(payer));
        }
        Ok(Self {
            engine: Arc::clone(engine),
            payer,
        })
    }
}

impl Drop for PayerSlot {
    fn drop(&mut self) {
        if let Ok(mut active) = self.engine.active_payers.lock() {
            active.remove(&self.payer);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use async_trait::async_trait;

    use super::*;
    use crate::adapters::events::{AppEvent, ChannelAppEvents};
    use crate::application::market::tests::{live_provider, payer, service};
    use crate::application::market::MarketService;

    #[derive(Default)]
    struct CaptureLog {
        acquired: AtomicUsize,
        released: AtomicUsize,
        audio: Mutex<Vec<bool>>,
        video: Mutex<Vec<bool>>,
    }

    struct ScriptedCapture {
        fail: bool,
        log: Arc<CaptureLog>,
    }

    struct ScriptedHandle {
        log: Arc<CaptureLog>,
    }

    impl CaptureHandle for ScriptedHandle {
        fn set_audio_enabled(&mut self, enabled: bool) {
            self.log.audio.lock().unwrap().push(enabled);
        }
        fn set_video_enabled(&mut self, enabled: bool) {
            self.log.video.lock().unwrap().push(enabled);
        }
        fn release(self: Box<Self>) {
            self.log.released.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl MediaCapture for ScriptedCapture {
        async fn acquire(&self, _call: CallId) -> anyhow::Result<Box<dyn CaptureHandle>> {
            if self.fail {
                anyhow::bail!("camera unavailable");
            }
            self.log.acquired.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(ScriptedHandle {
                log: Arc::clone(&self.log),
            }))
        }
    }

    struct Fixture {
        api: Arc<MarketService>,
        engine: CallSessionEngine,
        log: Arc<CaptureLog>,
        events: mpsc::UnboundedReceiver<AppEvent>,
        payer: Session,
        provider: Session,
    }

    async fn fixture(capture_fails: bool) -> Fixture {
        let api = Arc::new(service());
        let provider = live_provider(&api, "mitu", 100).await;
        let payer = payer(&api, "rafi").await;
        let log = Arc::new(CaptureLog::default());
        let (app_events, events) = ChannelAppEvents::new();
        let engine = CallSessionEngine::new(
            api.clone(),
            Arc::new(ScriptedCapture {
                fail: capture_fails,
                log: Arc::clone(&log),
            }),
            Arc::new(app_events),
            vec![5, 10, 15],
        );
        Fixture {
            api,
            engine,
            log,
            events,
            payer,
            provider,
        }
    }

    fn drain_call_events(rx: &mut mpsc::UnboundedReceiver<AppEvent>) -> Vec<CallEvent> {
        let mut out = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let AppEvent::Call { event, .. } = event {
                out.push(event);
            }
        }
        out
    }

    #[tokio::test(start_paused = true)]
    async fn paid_call_runs_out_after_its_budget() {
        let mut f = fixture(false).await;
        let offer = f
            .engine
            .offer(&f.payer, f.provider.account_id(), 5)
            .await
            .unwrap();
        assert_eq!(offer.offer().total_cost, 500);

        let call = offer.start().await.unwrap();
        assert_eq!(call.receipt().balance_after, 0);
        assert_eq!(f.api.balance(&f.payer).await.unwrap(), 0);
        assert_eq!(call.offer().budget_seconds(), 300);
        assert_eq!(call.remaining_seconds(), 300);
        assert_eq!(call.phase(), CallPhase::Active);
        assert!(f.engine.has_active_call(f.payer.account_id()));

        let remaining = call.watch_remaining();
        let summary = call.wait().await.unwrap();
        assert_eq!(summary.reason, EndReason::TimeExpired);
        assert_eq!(summary.remaining_seconds, 0);
        assert_eq!(summary.elapsed_seconds(), 300);
        assert_eq!(*remaining.borrow(), 0);

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(*remaining.borrow(), 0);
        assert_eq!(f.log.released.load(Ordering::SeqCst), 1);
        assert!(!f.engine.has_active_call(f.payer.account_id()));

        let events = drain_call_events(&mut f.events);
        assert!(matches!(events[0], CallEvent::Offered(_)));
        assert!(matches!(events[1], CallEvent::Paid(_)));
        assert_eq!(events[2], CallEvent::Active { budget_seconds: 300 });
        assert_eq!(events[3], CallEvent::TimeExpired);
        assert!(matches!(events[4], CallEvent::Ended(_)));
        assert_eq!(events.len(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn insufficient_funds_creates_no_call() {
        let mut f = fixture(false).await;
        f.api
            .reserve_and_debit(&f.payer, f.payer.account_id(), 450)
            .await
            .unwrap();

        let offer = f
            .engine
            .offer(&f.payer, f.provider.account_id(), 5)
            .await
            .unwrap();
        let err = offer.start().await.err().unwrap();
        assert_eq!(
            err,
            MarketError::InsufficientFunds {
                required: 500,
                available: 50
            }
        );
        assert_eq!(f.api.balance(&f.payer).await.unwrap(), 50);
        assert!(!f.engine.has_active_call(f.payer.account_id()));
        assert_eq!(f.log.acquired.load(Ordering::SeqCst), 0);

        let events = drain_call_events(&mut f.events);
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], CallEvent::Offered(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn hang_up_stops_the_countdown() {
        let f = fixture(false).await;
        let call = f
            .engine
            .offer(&f.payer, f.provider.account_id(), 5)
            .await
            .unwrap()
            .start()
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(10_500)).await;
        assert_eq!(call.remaining_seconds(), 290);

        let remaining = call.watch_remaining();
        let summary = call.hang_up(Party::Provider).await.unwrap();
        assert_eq!(summary.reason, EndReason::HungUp(Party::Provider));
        assert_eq!(summary.remaining_seconds, 290);
        assert_eq!(summary.charged, 500);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(*remaining.borrow(), 290);
        assert_eq!(f.log.released.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn capture_failure_ends_the_call_without_refund() {
        let mut f = fixture(true).await;
        let err = f
            .engine
            .offer(&f.payer, f.provider.account_id(), 5)
            .await
            .unwrap()
            .start()
            .await
            .err()
            .unwrap();

        match err {
            MarketError::CaptureFailed { reason, charged } => {
                assert!(reason.contains("camera unavailable"));
                assert_eq!(charged, 500);
            }
            other => panic!("unexpected error {other}"),
        }
        assert_eq!(f.api.balance(&f.payer).await.unwrap(), 0);
        assert!(!f.engine.has_active_call(f.payer.account_id()));

        let events = drain_call_events(&mut f.events);
        assert!(matches!(events[1], CallEvent::Paid(_)));
        assert!(matches!(events[2], CallEvent::CaptureFailed { charged: 500, .. }));
        match &events[3] {
            CallEvent::Ended(summary) => {
                assert_eq!(summary.reason, EndReason::CaptureFailed);
                assert_eq!(summary.started_at, None);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn one_call_per_payer() {
        let f = fixture(false).await;
        f.api.confirm_funds(&f.payer, 1_000).await.unwrap();
        let first = f
            .engine
            .offer(&f.payer, f.provider.account_id(), 5)
            .await
            .unwrap()
            .start()
            .await
            .unwrap();

        let second = f
            .engine
            .offer(&f.payer, f.provider.account_id(), 5)
            .await
            .unwrap();
        assert_eq!(
            second.start().await.err().unwrap(),
            MarketError::CallInProgress(f.payer.account_id())
        );
        assert_eq!(f.api.balance(&f.payer).await.unwrap(), 1_000);

        first.hang_up(Party::Payer).await.unwrap();
        let third = f
            .engine
            .offer(&f.payer, f.provider.account_id(), 10)
            .await
            .unwrap();
        assert!(third.start().await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn second_engine_cannot_start_a_concurrent_call() {
        let f = fixture(false).await;
        f.api.confirm_funds(&f.payer, 1_000).await.unwrap();
        let (other_events, _other_rx) = ChannelAppEvents::new();
        let other = CallSessionEngine::new(
            f.api.clone(),
            Arc::new(ScriptedCapture {
                fail: false,
                log: Arc::new(CaptureLog::default()),
            }),
            Arc::new(other_events),
            vec![5, 10, 15],
        );

        let first = f
            .engine
            .offer(&f.payer, f.provider.account_id(), 5)
            .await
            .unwrap()
            .start()
            .await
            .unwrap();
        assert!(f.api.has_active_call(f.payer.account_id()));

        let second = other
            .offer(&f.payer, f.provider.account_id(), 5)
            .await
            .unwrap();
        assert_eq!(
            second.start().await.err().unwrap(),
            MarketError::CallInProgress(f.payer.account_id())
        );
        assert_eq!(f.api.balance(&f.payer).await.unwrap(), 1_000);
        assert!(!other.has_active_call(f.payer.account_id()));

        first.hang_up(Party::Payer).await.unwrap();
        assert!(!f.api.has_active_call(f.payer.account_id()));
        let retry = other
            .offer(&f.payer, f.provider.account_id(), 5)
            .await
            .unwrap()
            .start()
            .await
            .unwrap();
        assert_eq!(retry.receipt().balance_after, 500);
        retry.hang_up(Party::Payer).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn capture_failure_returns_the_call_lease() {
        let f = fixture(true).await;
        f.engine
            .offer(&f.payer, f.provider.account_id(), 5)
            .await
            .unwrap()
            .start()
            .await
            .err()
            .unwrap();
        assert!(!f.api.has_active_call(f.payer.account_id()));
    }

    #[tokio::test(start_paused = true)]
    async fn hang_up_after_expiry_returns_the_expired_summary() {
        let f = fixture(false).await;
        let call = f
            .engine
            .offer(&f.payer, f.provider.account_id(), 5)
            .await
            .unwrap()
            .start()
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_secs(301)).await;
        assert_eq!(call.phase(), CallPhase::Ended);
        assert_eq!(call.remaining_seconds(), 0);

        let summary = call.hang_up(Party::Payer).await.unwrap();
        assert_eq!(summary.reason, EndReason::TimeExpired);
        assert_eq!(summary.remaining_seconds, 0);
        assert_eq!(f.log.released.load(Ordering::SeqCst), 1);
        assert!(!f.api.has_active_call(f.payer.account_id()));
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_handle_tears_down() {
        let f = fixture(false).await;
        let call = f
            .engine
            .offer(&f.payer, f.provider.account_id(), 5)
            .await
            .unwrap()
            .start()
            .await
            .unwrap();
        let remaining = call.watch_remaining();
        drop(call);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(f.log.released.load(Ordering::SeqCst), 1);
        assert_eq!(*remaining.borrow(), 300);
        assert!(!f.engine.has_active_call(f.payer.account_id()));
        assert!(!f.api.has_active_call(f.payer.account_id()));
    }

    #[tokio::test(start_paused = true)]
    async fn toggles_reach_the_capture_handle() {
        let f = fixture(false).await;
        let call = f
            .engine
            .offer(&f.payer, f.provider.account_id(), 5)
            .await
            .unwrap()
            .start()
            .await
            .unwrap();
        call.set_audio_enabled(false);
        call.set_video_enabled(false);
        call.set_audio_enabled(true);
        call.hang_up(Party::Payer).await.unwrap();

        assert_eq!(*f.log.audio.lock().unwrap(), vec![false, true]);
        assert_eq!(*f.log.video.lock().unwrap(), vec![false]);
    }

    #[tokio::test]
    async fn offers_are_validated() {
        let f = fixture(false).await;
        assert_eq!(
            f.engine
                .offer(&f.payer, f.provider.account_id(), 7)
                .await
                .err()
                .unwrap(),
            MarketError::InvalidDuration { minutes: 7 }
        );
        assert!(matches!(
            f.engine
                .offer(&f.provider, f.provider.account_id(), 5)
                .await
                .err()
                .unwrap(),
            MarketError::Unauthorized(_)
        ));

        f.api
            .set_online(&f.provider, f.provider.account_id(), false)
            .await
            .unwrap();
        assert_eq!(
            f.engine
                .offer(&f.payer, f.provider.account_id(), 5)
                .await
                .err()
                .unwrap(),
            MarketError::ProviderUnavailable(f.provider.account_id())
        );
    }
}
