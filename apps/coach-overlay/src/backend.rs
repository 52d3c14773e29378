//! In-process backend: the managed state a coaching engine exposes to the
//! overlay, answering commands from memory and mirroring every update onto a
//! [`LocalBus`] for push delivery.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use coach_bus::LocalBus;
use coach_proto::{
    ADVICE_QUEUE_CAP, AdviceEvent, ConnectionStatus, EVENT_ADVICE, EVENT_CONNECTION, EVENT_DEBRIEF,
    EVENT_IDENTITY, EVENT_STATE, PlayerIdentity, PullDebrief, PullOutcome, Severity, StateSnapshot,
};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, warn};

use crate::clock::Clock;
use crate::command::{CommandClient, CommandError, CommandResult};

const EVENT_LOG_CAP: usize = 200;

/// Ring-buffered diagnostic lines for the settings event feed.
#[derive(Debug, Default)]
struct EventLogQueue {
    inner: VecDeque<String>,
}

impl EventLogQueue {
    fn push(&mut self, entry: String) {
        self.inner.push_back(entry);
        if self.inner.len() > EVENT_LOG_CAP {
            self.inner.pop_front();
        }
    }

    fn drain(&mut self) -> Vec<String> {
        self.inner.drain(..).collect()
    }
}

#[derive(Debug, Default)]
struct BackendState {
    snapshot: StateSnapshot,
    connection: ConnectionStatus,
    advice: VecDeque<AdviceEvent>,
    event_log: EventLogQueue,
    prev_in_combat: bool,
    prev_encounter: Option<String>,
}

pub struct InMemoryBackend {
    bus: Arc<LocalBus>,
    clock: Arc<dyn Clock>,
    inner: Mutex<BackendState>,
    faulted: AtomicBool,
}

impl InMemoryBackend {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self::with_bus(Arc::new(LocalBus::new()), clock)
    }

    pub fn with_bus(bus: Arc<LocalBus>, clock: Arc<dyn Clock>) -> Self {
        Self {
            bus,
            clock,
            inner: Mutex::new(BackendState::default()),
            faulted: AtomicBool::new(false),
        }
    }

    pub fn bus(&self) -> Arc<LocalBus> {
        Arc::clone(&self.bus)
    }

    /// While faulted every command fails, as a crashed or restarting backend would.
    pub fn set_faulted(&self, faulted: bool) {
        self.faulted.store(faulted, Ordering::SeqCst);
    }

    pub fn publish_advice(&self, advice: AdviceEvent) {
        {
            let mut state = self.inner.lock();
            state.advice.push_back(advice.clone());
            if state.advice.len() > ADVICE_QUEUE_CAP {
                state.advice.pop_front();
            }
            let tag = match advice.severity {
                Severity::Good => "GOOD",
                Severity::Warn => "WARN",
                Severity::Bad => "BAD",
            };
            state.event_log.push(format!(
                "[{}] {} {}: {}",
                format_hms(advice.timestamp_ms),
                tag,
                advice.title,
                advice.message
            ));
        }
        self.emit(EVENT_ADVICE, &advice);
    }

    pub fn publish_snapshot(&self, snapshot: StateSnapshot) {
        {
            let now = format_hms(self.clock.now_ms());
            let mut state = self.inner.lock();
            if !state.prev_in_combat && snapshot.in_combat {
                let name = snapshot.encounter_name.as_deref().unwrap_or("Open World");
                state
                    .event_log
                    .push(format!("[{now}] Combat started: {name}"));
            }
            if state.prev_in_combat && !snapshot.in_combat {
                state.event_log.push(format!("[{now}] Combat ended"));
            }
            if snapshot.encounter_name.is_some() && snapshot.encounter_name != state.prev_encounter {
                if let Some(encounter) = snapshot.encounter_name.as_deref() {
                    state.event_log.push(format!("[{now}] Encounter: {encounter}"));
                }
            }
            state.prev_in_combat = snapshot.in_combat;
            state.prev_encounter = snapshot.encounter_name.clone();
            state.snapshot = snapshot.clone();
        }
        self.emit(EVENT_STATE, &snapshot);
    }

    pub fn publish_connection(&self, status: ConnectionStatus) {
        debug!(
            log_tailing = status.log_tailing,
            addon = status.addon_connected,
            path = %status.wow_path,
            "backend connection status"
        );
        {
            let now = format_hms(self.clock.now_ms());
            let mut state = self.inner.lock();
            let changed = state.connection.log_tailing != status.log_tailing
                || state.connection.addon_connected != status.addon_connected;
            state.connection = status.clone();
            if changed {
                let log = if status.log_tailing {
                    "Log connected"
                } else {
                    "Log disconnected"
                };
                let addon = if status.addon_connected {
                    " · Addon connected"
                } else {
                    ""
                };
                state.event_log.push(format!("[{now}] {log}{addon}"));
            }
        }
        self.emit(EVENT_CONNECTION, &status);
    }

    /// Identity is push-only; there is no command to poll it.
    pub fn publish_identity(&self, identity: PlayerIdentity) {
        self.emit(EVENT_IDENTITY, &identity);
    }

    /// Debriefs are push-only; a pull-summary line also lands in the event log.
    pub fn publish_debrief(&self, debrief: PullDebrief) {
        {
            let now = format_hms(self.clock.now_ms());
            let outcome = match debrief.outcome {
                PullOutcome::Kill => "kill",
                PullOutcome::Wipe => "wipe",
                PullOutcome::Unknown => "unknown",
            };
            self.inner.lock().event_log.push(format!(
                "[{now}] Pull #{} {} {}s, {} advice, {} avoidable",
                debrief.pull_number,
                outcome,
                debrief.pull_elapsed_ms / 1000,
                debrief.total_advice_fired,
                debrief.avoidable_count
            ));
        }
        self.emit(EVENT_DEBRIEF, &debrief);
    }

    fn emit<T: Serialize>(&self, topic: &str, payload: &T) {
        match serde_json::to_vec(payload) {
            Ok(bytes) => self.bus.publish(topic, Bytes::from(bytes)),
            Err(err) => warn!(topic, error = %err, "failed to encode push payload"),
        }
    }

    fn ensure_available(&self) -> CommandResult<()> {
        if self.faulted.load(Ordering::SeqCst) {
            Err(CommandError::Unavailable("in-memory backend faulted".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl CommandClient for InMemoryBackend {
    async fn get_connection_status(&self) -> CommandResult<ConnectionStatus> {
        self.ensure_available()?;
        Ok(self.inner.lock().connection.clone())
    }

    async fn get_state_snapshot(&self) -> CommandResult<StateSnapshot> {
        self.ensure_available()?;
        Ok(self.inner.lock().snapshot.clone())
    }

    async fn drain_advice_queue(&self) -> CommandResult<Vec<AdviceEvent>> {
        self.ensure_available()?;
        Ok(self.inner.lock().advice.drain(..).collect())
    }

    async fn drain_event_log(&self) -> CommandResult<Vec<String>> {
        self.ensure_available()?;
        Ok(self.inner.lock().event_log.drain())
    }
}

/// Formats a Unix-epoch millisecond timestamp as `HH:MM:SS` (UTC).
pub fn format_hms(ts_ms: u64) -> String {
    let total_secs = (ts_ms / 1000) % 86_400;
    let h = total_secs / 3600;
    let m = (total_secs % 3600) / 60;
    let s = total_secs % 60;
    format!("{h:02}:{m:02}:{s:02}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn backend() -> InMemoryBackend {
        InMemoryBackend::new(Arc::new(ManualClock::new(3_723_000)))
    }

    fn advice(key: &str, ts: u64) -> AdviceEvent {
        AdviceEvent {
            key: key.into(),
            title: "Title".into(),
            message: "message".into(),
            severity: Severity::Warn,
            kv: Vec::new(),
            timestamp_ms: ts,
        }
    }

    #[tokio::test]
    async fn drain_advice_is_at_most_once() {
        let backend = backend();
        backend.publish_advice(advice("gcd_gap", 1_000));
        backend.publish_advice(advice("avoidable_repeat", 1_200));

        let first = backend.drain_advice_queue().await.expect("drain");
        assert_eq!(first.len(), 2);
        assert_eq!(first[0].key, "gcd_gap");

        let second = backend.drain_advice_queue().await.expect("drain");
        assert!(second.is_empty());
    }

    #[tokio::test]
    async fn advice_queue_is_ring_buffered() {
        let backend = backend();
        for i in 0..(ADVICE_QUEUE_CAP as u64 + 5) {
            backend.publish_advice(advice(&format!("k{i}"), i));
        }
        let drained = backend.drain_advice_queue().await.expect("drain");
        assert_eq!(drained.len(), ADVICE_QUEUE_CAP);
        assert_eq!(drained[0].key, "k5");
    }

    #[tokio::test]
    async fn connection_changes_are_logged_once() {
        let backend = backend();
        let status = ConnectionStatus {
            log_tailing: true,
            addon_connected: false,
            wow_path: "C:/wow/Logs".into(),
        };
        backend.publish_connection(status.clone());
        backend.publish_connection(status);

        let lines = backend.drain_event_log().await.expect("drain log");
        assert_eq!(lines, vec!["[01:02:03] Log connected".to_string()]);
        let current = backend.get_connection_status().await.expect("status");
        assert!(current.log_tailing);
    }

    #[tokio::test]
    async fn combat_transitions_reach_event_log() {
        let backend = backend();
        backend.publish_snapshot(StateSnapshot {
            in_combat: true,
            pull_elapsed_ms: 100,
            encounter_name: Some("Broodtwister".into()),
            ..StateSnapshot::default()
        });
        backend.publish_snapshot(StateSnapshot::default());

        let lines = backend.drain_event_log().await.expect("drain log");
        assert_eq!(
            lines,
            vec![
                "[01:02:03] Combat started: Broodtwister".to_string(),
                "[01:02:03] Encounter: Broodtwister".to_string(),
                "[01:02:03] Combat ended".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn faulted_backend_fails_commands() {
        let backend = backend();
        backend.set_faulted(true);
        assert!(matches!(
            backend.get_state_snapshot().await,
            Err(CommandError::Unavailable(_))
        ));
        backend.set_faulted(false);
        assert!(backend.get_state_snapshot().await.is_ok());
    }

    #[test]
    fn formats_hms() {
        assert_eq!(format_hms(0), "00:00:00");
        assert_eq!(format_hms(3_723_000), "01:02:03");
        assert_eq!(format_hms(86_400_000 + 61_000), "00:01:01");
    }
}
