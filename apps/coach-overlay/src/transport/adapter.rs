//! Per-channel delivery over an unreliable push mechanism.
//!
//! Every channel with a handler gets a push attempt raced against
//! [`PUSH_TIMEOUT`] and, independently, a fixed-cadence poll of the command
//! client. Polling runs whether or not push succeeds: a host can deny push by
//! hanging rather than failing, so push success is never proof of delivery.
//! A channel with a handler therefore sees at least one invocation within its
//! poll interval (plus command latency) of backend state becoming available.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use coach_bus::PushSource;
use coach_proto::Channel;
use parking_lot::Mutex;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::command::CommandClient;
use crate::transport::registry::{Delivery, HandlerRegistry};
use crate::transport::throttle::FailureThrottle;

pub const PUSH_TIMEOUT: Duration = Duration::from_millis(3_000);
pub const CONNECTION_POLL_INTERVAL: Duration = Duration::from_millis(1_000);
pub const SNAPSHOT_POLL_INTERVAL: Duration = Duration::from_millis(300);
pub const ADVICE_POLL_INTERVAL: Duration = Duration::from_millis(500);
pub const EVENT_LOG_POLL_INTERVAL: Duration = Duration::from_millis(1_000);

/// Fixed poll cadence for a channel; `None` for push-only channels.
pub fn poll_interval(channel: Channel) -> Option<Duration> {
    match channel {
        Channel::Connection => Some(CONNECTION_POLL_INTERVAL),
        Channel::Snapshot => Some(SNAPSHOT_POLL_INTERVAL),
        Channel::Advice => Some(ADVICE_POLL_INTERVAL),
        Channel::EventLog => Some(EVENT_LOG_POLL_INTERVAL),
        Channel::Identity | Channel::Debrief => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushState {
    /// No push source configured, or the channel has no push topic.
    NotRequested,
    Pending,
    Live,
    TimedOut,
    Failed,
    /// The listener ended, either by teardown or because the source closed.
    Closed,
}

type PushStates = Arc<Mutex<BTreeMap<Channel, PushState>>>;

#[derive(Clone)]
pub struct TransportAdapter {
    client: Arc<dyn CommandClient>,
    push: Option<Arc<dyn PushSource>>,
}

impl TransportAdapter {
    pub fn new(client: Arc<dyn CommandClient>, push: Option<Arc<dyn PushSource>>) -> Self {
        Self { client, push }
    }

    /// Starts delivery for every channel the registry has a handler for.
    ///
    /// Never waits: push attempts and pollers run as tasks on the current
    /// tokio runtime. Must be called from within a runtime.
    pub fn mount(&self, registry: Arc<HandlerRegistry>) -> Subscription {
        let push_states: PushStates = Arc::new(Mutex::new(BTreeMap::new()));
        let throttle = Arc::new(FailureThrottle::new());
        let mut tasks = Vec::new();
        let mut channels = Vec::new();

        for channel in Channel::ALL {
            if !registry.wants(channel) {
                continue;
            }
            channels.push(channel);

            match (&self.push, channel.push_topic()) {
                (Some(source), Some(topic)) => {
                    push_states.lock().insert(channel, PushState::Pending);
                    tasks.push(tokio::spawn(run_push(
                        channel,
                        topic,
                        Arc::clone(source),
                        Arc::clone(&registry),
                        Arc::clone(&push_states),
                    )));
                }
                _ => {
                    push_states.lock().insert(channel, PushState::NotRequested);
                }
            }

            if let Some(every) = poll_interval(channel) {
                tasks.push(tokio::spawn(run_poller(
                    channel,
                    every,
                    Arc::clone(&self.client),
                    Arc::clone(&registry),
                    Arc::clone(&throttle),
                )));
            }
        }

        info!(
            target = "coach.transport",
            channels = ?channels,
            push = self.push.is_some(),
            "transport mounted"
        );

        Subscription {
            registry,
            push_states,
            tasks: Mutex::new(tasks),
            torn_down: AtomicBool::new(false),
        }
    }
}

/// Live delivery for one mount. Torn down exactly once, explicitly or on drop.
pub struct Subscription {
    registry: Arc<HandlerRegistry>,
    push_states: PushStates,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    torn_down: AtomicBool,
}

impl Subscription {
    pub fn registry(&self) -> &Arc<HandlerRegistry> {
        &self.registry
    }

    pub fn push_state(&self, channel: Channel) -> Option<PushState> {
        self.push_states.lock().get(&channel).copied()
    }

    /// Timers and listeners still running for this mount.
    pub fn live_tasks(&self) -> usize {
        self.tasks
            .lock()
            .iter()
            .filter(|handle| !handle.is_finished())
            .count()
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down.load(Ordering::Acquire)
    }

    /// Stops every timer and push listener. After this returns no handler
    /// runs again for this mount, including for commands still in flight.
    pub fn teardown(&self) {
        if self.torn_down.swap(true, Ordering::AcqRel) {
            return;
        }
        self.registry.close();
        let tasks: Vec<JoinHandle<()>> = self.tasks.lock().drain(..).collect();
        for handle in &tasks {
            handle.abort();
        }
        for state in self.push_states.lock().values_mut() {
            if matches!(*state, PushState::Pending | PushState::Live) {
                *state = PushState::Closed;
            }
        }
        debug!(target = "coach.transport", tasks = tasks.len(), "transport torn down");
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.teardown();
    }
}

fn set_push_state(states: &PushStates, channel: Channel, state: PushState) {
    states.lock().insert(channel, state);
}

async fn run_push(
    channel: Channel,
    topic: &'static str,
    source: Arc<dyn PushSource>,
    registry: Arc<HandlerRegistry>,
    states: PushStates,
) {
    let mut rx = match tokio::time::timeout(PUSH_TIMEOUT, source.listen(topic)).await {
        Ok(Ok(rx)) => {
            set_push_state(&states, channel, PushState::Live);
            debug!(target = "coach.transport", channel = %channel, topic, "push subscription live");
            rx
        }
        Ok(Err(err)) => {
            set_push_state(&states, channel, PushState::Failed);
            warn!(
                target = "coach.transport",
                channel = %channel,
                topic,
                error = %err,
                "push subscription failed; polling only"
            );
            return;
        }
        Err(_) => {
            set_push_state(&states, channel, PushState::TimedOut);
            warn!(
                target = "coach.transport",
                channel = %channel,
                topic,
                timeout_ms = PUSH_TIMEOUT.as_millis() as u64,
                "push subscription timed out; polling only"
            );
            return;
        }
    };

    loop {
        match rx.recv().await {
            Ok(message) => match Delivery::decode(channel, &message.payload) {
                Ok(delivery) => {
                    registry.dispatch(delivery);
                }
                Err(err) => {
                    warn!(
                        target = "coach.transport",
                        channel = %channel,
                        error = %err,
                        "dropping undecodable push payload"
                    );
                }
            },
            Err(RecvError::Lagged(skipped)) => {
                debug!(target = "coach.transport", channel = %channel, skipped, "push listener lagged");
            }
            Err(RecvError::Closed) => {
                set_push_state(&states, channel, PushState::Closed);
                debug!(target = "coach.transport", channel = %channel, "push source closed");
                break;
            }
        }
    }
}

/// Whether a later poll response may overwrite an earlier one. Point-in-time
/// values are superseded; drained batches are not and always land.
fn is_latest_value(channel: Channel) -> bool {
    matches!(channel, Channel::Connection | Channel::Snapshot)
}

/// Orders responses of one poller by the tick that issued them.
#[derive(Debug, Default)]
struct PollSequence {
    issued: AtomicU64,
    /// Tick number of the newest response handed to the registry.
    delivered: Mutex<u64>,
}

impl PollSequence {
    fn next(&self) -> u64 {
        self.issued.fetch_add(1, Ordering::Relaxed) + 1
    }
}

/// Fires one command per tick. A tick never waits for the previous command,
/// so a slow backend can produce overlapping invocations; the in-flight set
/// is owned here and aborted with this task.
async fn run_poller(
    channel: Channel,
    every: Duration,
    client: Arc<dyn CommandClient>,
    registry: Arc<HandlerRegistry>,
    throttle: Arc<FailureThrottle>,
) {
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut in_flight = JoinSet::new();
    let sequence = Arc::new(PollSequence::default());

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                in_flight.spawn(poll_once(
                    channel,
                    sequence.next(),
                    Arc::clone(&sequence),
                    Arc::clone(&client),
                    Arc::clone(&registry),
                    Arc::clone(&throttle),
                ));
            }
            Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => {
                if let Err(err) = joined {
                    if err.is_panic() {
                        warn!(target = "coach.transport", channel = %channel, "poll task panicked");
                    }
                }
            }
        }
    }
}

async fn poll_once(
    channel: Channel,
    tick: u64,
    sequence: Arc<PollSequence>,
    client: Arc<dyn CommandClient>,
    registry: Arc<HandlerRegistry>,
    throttle: Arc<FailureThrottle>,
) {
    let result = match channel {
        Channel::Connection => client
            .get_connection_status()
            .await
            .map(|status| vec![Delivery::Connection(status)]),
        Channel::Snapshot => client
            .get_state_snapshot()
            .await
            .map(|snapshot| vec![Delivery::Snapshot(snapshot)]),
        Channel::Advice => client
            .drain_advice_queue()
            .await
            .map(|batch| batch.into_iter().map(Delivery::Advice).collect()),
        Channel::EventLog => client
            .drain_event_log()
            .await
            .map(|lines| lines.into_iter().map(Delivery::EventLog).collect()),
        Channel::Identity | Channel::Debrief => return,
    };

    match result {
        Ok(deliveries) => {
            // Held across dispatch so two responses cannot interleave.
            let mut delivered = sequence.delivered.lock();
            if is_latest_value(channel) && tick < *delivered {
                debug!(
                    target = "coach.transport",
                    channel = %channel,
                    tick,
                    newest = *delivered,
                    "dropping stale poll response"
                );
                return;
            }
            *delivered = (*delivered).max(tick);
            // The whole batch lands before this task ends.
            for delivery in deliveries {
                registry.dispatch(delivery);
            }
        }
        Err(err) => {
            if throttle.should_warn(channel) {
                warn!(target = "coach.transport", channel = %channel, error = %err, "poll failed; retrying next tick");
            } else {
                debug!(target = "coach.transport", channel = %channel, error = %err, "poll failed");
            }
        }
    }
}
