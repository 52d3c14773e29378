use std::collections::HashMap;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;
use thiserror::Error;
use tokio::sync::broadcast;

/// Messages a listener may fall behind by before it lags.
pub const TOPIC_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusMessage {
    pub topic: String,
    pub payload: Bytes,
}

#[derive(Debug, Error)]
pub enum BusError {
    #[error("bus channel closed")]
    Closed,
    #[error("listen on {0} denied by host")]
    Denied(String),
    #[error("bus transport error: {0}")]
    Transport(String),
}

pub type BusResult<T> = Result<T, BusError>;

/// Backend-initiated delivery of payloads per topic.
///
/// `listen` is allowed to hang forever: some hosts neither grant nor reject a
/// subscription. Callers must race it against a timer.
#[async_trait]
pub trait PushSource: Send + Sync {
    async fn listen(&self, topic: &str) -> BusResult<broadcast::Receiver<BusMessage>>;
}

/// How a [`LocalBus`] answers `listen` for a topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ListenPolicy {
    #[default]
    Granted,
    /// Never resolves, like a capability check that silently swallows the call.
    Hang,
    Deny,
}

/// In-memory push bus for tests, demos and in-process backends.
#[derive(Debug, Default)]
pub struct LocalBus {
    topics: RwLock<HashMap<String, broadcast::Sender<BusMessage>>>,
    default_policy: RwLock<ListenPolicy>,
    policies: RwLock<HashMap<String, ListenPolicy>>,
}

impl LocalBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_policy(policy: ListenPolicy) -> Self {
        let bus = Self::default();
        *bus.default_policy.write() = policy;
        bus
    }

    pub fn set_policy(&self, topic: &str, policy: ListenPolicy) {
        self.policies.write().insert(topic.to_string(), policy);
    }

    fn policy_for(&self, topic: &str) -> ListenPolicy {
        self.policies
            .read()
            .get(topic)
            .copied()
            .unwrap_or(*self.default_policy.read())
    }

    fn sender_for(&self, topic: &str) -> broadcast::Sender<BusMessage> {
        let mut guard = self.topics.write();
        guard
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(TOPIC_CAPACITY).0)
            .clone()
    }

    /// Publishes to live listeners. Having no listener is not an error: push
    /// delivery is best-effort and the polled path covers the gap.
    pub fn publish(&self, topic: &str, payload: Bytes) {
        let sender = self.sender_for(topic);
        let _ = sender.send(BusMessage {
            topic: topic.to_string(),
            payload,
        });
    }

    pub fn listener_count(&self, topic: &str) -> usize {
        self.topics
            .read()
            .get(topic)
            .map(|sender| sender.receiver_count())
            .unwrap_or(0)
    }
}

#[async_trait]
impl PushSource for LocalBus {
    async fn listen(&self, topic: &str) -> BusResult<broadcast::Receiver<BusMessage>> {
        match self.policy_for(topic) {
            ListenPolicy::Granted => Ok(self.sender_for(topic).subscribe()),
            ListenPolicy::Deny => Err(BusError::Denied(topic.to_string())),
            ListenPolicy::Hang => std::future::pending().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn local_bus_round_trip() {
        let bus = LocalBus::new();
        let mut sub = bus.listen("coach:advice").await.expect("listen ok");
        bus.publish("coach:advice", Bytes::from_static(b"ping"));
        let msg = sub.recv().await.expect("receive ok");
        assert_eq!(msg.topic, "coach:advice");
        assert_eq!(msg.payload, Bytes::from_static(b"ping"));
    }

    #[tokio::test]
    async fn denied_topic_fails_fast() {
        let bus = LocalBus::new();
        bus.set_policy("coach:state", ListenPolicy::Deny);
        let err = bus.listen("coach:state").await.expect_err("denied");
        assert!(matches!(err, BusError::Denied(topic) if topic == "coach:state"));
        assert!(bus.listen("coach:advice").await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn hanging_topic_never_resolves() {
        let bus = LocalBus::with_policy(ListenPolicy::Hang);
        let outcome = tokio::time::timeout(Duration::from_secs(60), bus.listen("coach:state")).await;
        assert!(outcome.is_err());
    }

    #[tokio::test]
    async fn dropping_receiver_unsubscribes() {
        let bus = LocalBus::new();
        let rx = bus.listen("coach:connection").await.expect("listen ok");
        assert_eq!(bus.listener_count("coach:connection"), 1);
        drop(rx);
        assert_eq!(bus.listener_count("coach:connection"), 0);
        bus.publish("coach:connection", Bytes::from_static(b"{}"));
    }
}
