#![allow(dead_code)]

use std::sync::Arc;

use coach_bus::{ListenPolicy, LocalBus, PushSource};
use coach_overlay::backend::InMemoryBackend;
use coach_overlay::clock::{Clock, MonotonicClock};
use coach_overlay::command::CommandClient;
use coach_overlay::transport::TransportAdapter;
use coach_proto::{AdviceEvent, ConnectionStatus, Severity, StateSnapshot};
use parking_lot::Mutex;

pub const EPOCH_MS: u64 = 1_700_000_000_000;

pub struct Harness {
    pub clock: Arc<dyn Clock>,
    pub bus: Arc<LocalBus>,
    pub backend: Arc<InMemoryBackend>,
    pub adapter: TransportAdapter,
}

/// In-memory backend whose push bus answers `listen` per `policy`. Must be
/// built inside the test runtime so the clock follows paused time.
pub fn harness(policy: ListenPolicy) -> Harness {
    let clock: Arc<dyn Clock> = Arc::new(MonotonicClock::starting_at(EPOCH_MS));
    let bus = Arc::new(LocalBus::with_policy(policy));
    let backend = Arc::new(InMemoryBackend::with_bus(Arc::clone(&bus), Arc::clone(&clock)));
    let client: Arc<dyn CommandClient> = backend.clone();
    let push: Arc<dyn PushSource> = bus.clone();
    let adapter = TransportAdapter::new(client, Some(push));
    Harness {
        clock,
        bus,
        backend,
        adapter,
    }
}

pub fn advice(key: &str, severity: Severity, timestamp_ms: u64) -> AdviceEvent {
    AdviceEvent {
        key: key.into(),
        title: key.replace('_', " "),
        message: format!("{key} fired"),
        severity,
        kv: vec![("pull".into(), "1".into())],
        timestamp_ms,
    }
}

pub fn combat(pull_elapsed_ms: u64) -> StateSnapshot {
    StateSnapshot {
        pull_elapsed_ms,
        gcd_gap_ms: 250,
        avoidable_count: 1,
        interrupt_count: 2,
        in_combat: true,
        encounter_name: Some("Training Dummy".into()),
    }
}

pub fn connected() -> ConnectionStatus {
    ConnectionStatus {
        log_tailing: true,
        addon_connected: true,
        wow_path: "/games/wow".into(),
    }
}

/// Collects every value a handler receives.
#[derive(Clone)]
pub struct Recorder<T> {
    seen: Arc<Mutex<Vec<T>>>,
}

impl<T: Clone + Send + 'static> Recorder<T> {
    pub fn new() -> Self {
        Self {
            seen: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn handler(&self) -> impl Fn(T) + Send + Sync + 'static {
        let seen = Arc::clone(&self.seen);
        move |value| seen.lock().push(value)
    }

    pub fn values(&self) -> Vec<T> {
        self.seen.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.seen.lock().len()
    }
}
