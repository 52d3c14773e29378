//! The overlay's consumer side: handlers that feed the state machines, the
//! sweep and extrapolation timers, and the view handed to rendering.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use coach_proto::{AdviceEvent, PlayerIdentity, PullDebrief, StateSnapshot};
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, trace};

use crate::audio::AudioEngine;
use crate::clock::Clock;
use crate::state::{
    AdviceCardStore, ConnectionHealthMonitor, DebriefPanel, EXTRAPOLATION_TICK, HealthIndicators,
    IdentityBadge, PullTimeline, SWEEP_INTERVAL, SnapshotExtrapolator, TimelineMarker,
};
use crate::transport::{HandlerRegistry, Handlers, Subscription, TransportAdapter};

#[derive(Debug, Default)]
struct OverlayState {
    cards: AdviceCardStore,
    pull_clock: SnapshotExtrapolator,
    health: ConnectionHealthMonitor,
    timeline: PullTimeline,
    debrief: DebriefPanel,
    identity: IdentityBadge,
}

/// Everything the render layer is fed, captured at one instant.
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayView {
    pub now_ms: u64,
    pub cards: Vec<AdviceEvent>,
    pub pull_clock_ms: u64,
    pub in_combat: bool,
    pub encounter_name: Option<String>,
    pub gcd_gap_ms: u64,
    pub avoidable_count: u32,
    pub interrupt_count: u32,
    pub health: HealthIndicators,
    pub wow_path: String,
    pub identity: Option<String>,
    pub timeline: Vec<TimelineMarker>,
    pub debrief: Option<PullDebrief>,
}

pub struct Overlay {
    state: Arc<Mutex<OverlayState>>,
    clock: Arc<dyn Clock>,
    subscription: Subscription,
    timers: Vec<JoinHandle<()>>,
    unmounted: AtomicBool,
}

impl Overlay {
    /// Subscribes to every overlay channel and starts the local timers.
    /// Must be called from within a tokio runtime.
    pub fn mount(adapter: &TransportAdapter, audio: Arc<AudioEngine>, clock: Arc<dyn Clock>) -> Self {
        let state = Arc::new(Mutex::new(OverlayState::default()));
        let registry = Arc::new(HandlerRegistry::new(handlers(&state, audio, &clock)));
        let subscription = adapter.mount(registry);

        let timers = vec![
            tokio::spawn(sweep_loop(Arc::clone(&state), Arc::clone(&clock))),
            tokio::spawn(extrapolation_loop(Arc::clone(&state), Arc::clone(&clock))),
        ];
        debug!(target = "coach.overlay", "overlay mounted");

        Self {
            state,
            clock,
            subscription,
            timers,
            unmounted: AtomicBool::new(false),
        }
    }

    pub fn subscription(&self) -> &Subscription {
        &self.subscription
    }

    pub fn view(&self) -> OverlayView {
        let now_ms = self.clock.now_ms();
        let state = self.state.lock();
        let snapshot = state.pull_clock.snapshot().cloned().unwrap_or_default();
        OverlayView {
            now_ms,
            cards: state.cards.live_cards(now_ms),
            pull_clock_ms: state.pull_clock.displayed_ms(),
            in_combat: snapshot.in_combat,
            encounter_name: snapshot.encounter_name,
            gcd_gap_ms: snapshot.gcd_gap_ms,
            avoidable_count: snapshot.avoidable_count,
            interrupt_count: snapshot.interrupt_count,
            health: state.health.indicators(),
            wow_path: state.health.wow_path().to_owned(),
            identity: state.identity.label(),
            timeline: state.timeline.markers().to_vec(),
            debrief: state.debrief.visible(now_ms).cloned(),
        }
    }

    /// Stops delivery and timers. Safe to call more than once.
    pub fn unmount(&self) {
        if self.unmounted.swap(true, Ordering::AcqRel) {
            return;
        }
        self.subscription.teardown();
        for timer in &self.timers {
            timer.abort();
        }
        debug!(target = "coach.overlay", "overlay unmounted");
    }

    pub fn is_unmounted(&self) -> bool {
        self.unmounted.load(Ordering::Acquire)
    }
}

impl Drop for Overlay {
    fn drop(&mut self) {
        self.unmount();
    }
}

fn handlers(
    state: &Arc<Mutex<OverlayState>>,
    audio: Arc<AudioEngine>,
    clock: &Arc<dyn Clock>,
) -> Handlers {
    let on_advice = {
        let state = Arc::clone(state);
        move |event: AdviceEvent| {
            let severity = event.severity;
            let key = event.key.clone();
            let accepted = {
                let mut state = state.lock();
                let at_pull_ms = state.pull_clock.displayed_ms();
                let outcome = state.cards.ingest(event);
                if outcome.is_accepted() {
                    state.timeline.mark(&key, severity, at_pull_ms);
                }
                trace!(target = "coach.overlay", key = %key, outcome = ?outcome, "advice ingested");
                outcome.is_accepted()
            };
            // Audio runs outside the state lock.
            if accepted {
                audio.play_for(severity);
            }
        }
    };
    let on_snapshot = {
        let state = Arc::clone(state);
        let clock = Arc::clone(clock);
        move |snapshot: StateSnapshot| {
            let now_ms = clock.now_ms();
            let mut state = state.lock();
            if state.timeline.observe_snapshot(&snapshot) {
                debug!(target = "coach.overlay", encounter = ?snapshot.encounter_name, "new pull");
            }
            state.pull_clock.apply(snapshot, now_ms);
        }
    };
    let on_connection = {
        let state = Arc::clone(state);
        move |status| state.lock().health.apply(status)
    };
    let on_identity = {
        let state = Arc::clone(state);
        move |identity: PlayerIdentity| state.lock().identity.apply(identity)
    };
    let on_debrief = {
        let state = Arc::clone(state);
        let clock = Arc::clone(clock);
        move |debrief: PullDebrief| {
            let now_ms = clock.now_ms();
            state.lock().debrief.apply(debrief, now_ms);
        }
    };

    Handlers::new()
        .on_advice(on_advice)
        .on_snapshot(on_snapshot)
        .on_connection(on_connection)
        .on_identity(on_identity)
        .on_debrief(on_debrief)
}

async fn sweep_loop(state: Arc<Mutex<OverlayState>>, clock: Arc<dyn Clock>) {
    let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        let now_ms = clock.now_ms();
        let mut state = state.lock();
        let expired = state.cards.sweep(now_ms);
        state.debrief.sweep(now_ms);
        if expired > 0 {
            trace!(target = "coach.overlay", expired, "advice cards expired");
        }
    }
}

async fn extrapolation_loop(state: Arc<Mutex<OverlayState>>, clock: Arc<dyn Clock>) {
    let mut ticker = tokio::time::interval(EXTRAPOLATION_TICK);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        let now_ms = clock.now_ms();
        state.lock().pull_clock.tick(now_ms);
    }
}
