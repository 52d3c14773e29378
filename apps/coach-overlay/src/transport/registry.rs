//! Latest-handler cell between delivery and consumers.
//!
//! Delivery tasks are spawned once per mount and hold the registry, never the
//! callbacks themselves, so a consumer can swap callbacks at any time and the
//! next delivery uses the newest set.

use std::sync::Arc;

use coach_proto::{AdviceEvent, Channel, ConnectionStatus, PlayerIdentity, PullDebrief, StateSnapshot};
use parking_lot::RwLock;

pub type Callback<T> = Arc<dyn Fn(T) + Send + Sync>;

/// One value travelling from the transport to a consumer.
#[derive(Debug, Clone, PartialEq)]
pub enum Delivery {
    Connection(ConnectionStatus),
    Snapshot(StateSnapshot),
    Advice(AdviceEvent),
    Identity(PlayerIdentity),
    Debrief(PullDebrief),
    EventLog(String),
}

impl Delivery {
    pub fn channel(&self) -> Channel {
        match self {
            Delivery::Connection(_) => Channel::Connection,
            Delivery::Snapshot(_) => Channel::Snapshot,
            Delivery::Advice(_) => Channel::Advice,
            Delivery::Identity(_) => Channel::Identity,
            Delivery::Debrief(_) => Channel::Debrief,
            Delivery::EventLog(_) => Channel::EventLog,
        }
    }

    /// Decodes one push payload for `channel`.
    pub fn decode(channel: Channel, payload: &[u8]) -> Result<Delivery, serde_json::Error> {
        Ok(match channel {
            Channel::Connection => Delivery::Connection(serde_json::from_slice(payload)?),
            Channel::Snapshot => Delivery::Snapshot(serde_json::from_slice(payload)?),
            Channel::Advice => Delivery::Advice(serde_json::from_slice(payload)?),
            Channel::Identity => Delivery::Identity(serde_json::from_slice(payload)?),
            Channel::Debrief => Delivery::Debrief(serde_json::from_slice(payload)?),
            Channel::EventLog => Delivery::EventLog(serde_json::from_slice(payload)?),
        })
    }
}

#[derive(Clone, Default)]
pub struct Handlers {
    pub on_connection: Option<Callback<ConnectionStatus>>,
    pub on_snapshot: Option<Callback<StateSnapshot>>,
    pub on_advice: Option<Callback<AdviceEvent>>,
    pub on_identity: Option<Callback<PlayerIdentity>>,
    pub on_debrief: Option<Callback<PullDebrief>>,
    pub on_event_log: Option<Callback<String>>,
}

impl Handlers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_connection(mut self, f: impl Fn(ConnectionStatus) + Send + Sync + 'static) -> Self {
        self.on_connection = Some(Arc::new(f));
        self
    }

    pub fn on_snapshot(mut self, f: impl Fn(StateSnapshot) + Send + Sync + 'static) -> Self {
        self.on_snapshot = Some(Arc::new(f));
        self
    }

    pub fn on_advice(mut self, f: impl Fn(AdviceEvent) + Send + Sync + 'static) -> Self {
        self.on_advice = Some(Arc::new(f));
        self
    }

    pub fn on_identity(mut self, f: impl Fn(PlayerIdentity) + Send + Sync + 'static) -> Self {
        self.on_identity = Some(Arc::new(f));
        self
    }

    pub fn on_debrief(mut self, f: impl Fn(PullDebrief) + Send + Sync + 'static) -> Self {
        self.on_debrief = Some(Arc::new(f));
        self
    }

    pub fn on_event_log(mut self, f: impl Fn(String) + Send + Sync + 'static) -> Self {
        self.on_event_log = Some(Arc::new(f));
        self
    }

    pub fn wants(&self, channel: Channel) -> bool {
        match channel {
            Channel::Connection => self.on_connection.is_some(),
            Channel::Snapshot => self.on_snapshot.is_some(),
            Channel::Advice => self.on_advice.is_some(),
            Channel::Identity => self.on_identity.is_some(),
            Channel::Debrief => self.on_debrief.is_some(),
            Channel::EventLog => self.on_event_log.is_some(),
        }
    }
}

impl std::fmt::Debug for Handlers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let wanted: Vec<Channel> = Channel::ALL
            .into_iter()
            .filter(|channel| self.wants(*channel))
            .collect();
        f.debug_struct("Handlers").field("channels", &wanted).finish()
    }
}

#[derive(Debug)]
pub struct HandlerRegistry {
    current: RwLock<Handlers>,
    /// `true` while deliveries may run. Held for reading across each callback
    /// so `close` returns only once no callback is in progress.
    open: RwLock<bool>,
}

impl HandlerRegistry {
    pub fn new(handlers: Handlers) -> Self {
        Self {
            current: RwLock::new(handlers),
            open: RwLock::new(true),
        }
    }

    /// Swaps in a new handler set; the next delivery on every channel uses it.
    pub fn replace(&self, handlers: Handlers) {
        *self.current.write() = handlers;
    }

    pub fn wants(&self, channel: Channel) -> bool {
        self.current.read().wants(channel)
    }

    /// Stops all further deliveries. Must not be called from inside a handler,
    /// and neither may `dispatch`: both would wait on the read guard the
    /// running handler's dispatch still holds.
    pub fn close(&self) {
        *self.open.write() = false;
    }

    /// Safe to call from a handler, even while `close` is waiting.
    pub fn is_closed(&self) -> bool {
        // A plain read queues behind a waiting writer and would deadlock
        // against the guard this thread's dispatch already holds.
        !*self.open.read_recursive()
    }

    /// Invokes the current handler for the delivery's channel. Returns whether
    /// a handler ran.
    pub fn dispatch(&self, delivery: Delivery) -> bool {
        let open = self.open.read();
        if !*open {
            return false;
        }
        // Clone the callback out so a handler may call `replace`.
        let handlers = self.current.read().clone();
        match delivery {
            Delivery::Connection(value) => invoke(handlers.on_connection, value),
            Delivery::Snapshot(value) => invoke(handlers.on_snapshot, value),
            Delivery::Advice(value) => invoke(handlers.on_advice, value),
            Delivery::Identity(value) => invoke(handlers.on_identity, value),
            Delivery::Debrief(value) => invoke(handlers.on_debrief, value),
            Delivery::EventLog(value) => invoke(handlers.on_event_log, value),
        }
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::new(Handlers::default())
    }
}

fn invoke<T>(callback: Option<Callback<T>>, value: T) -> bool {
    match callback {
        Some(callback) => {
            callback(value);
            true
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn status(log_tailing: bool) -> ConnectionStatus {
        ConnectionStatus {
            log_tailing,
            addon_connected: false,
            wow_path: String::new(),
        }
    }

    #[test]
    fn dispatch_uses_latest_handlers() {
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));

        let registry = HandlerRegistry::new(Handlers::new().on_connection({
            let first = first.clone();
            move |_| {
                first.fetch_add(1, Ordering::SeqCst);
            }
        }));
        assert!(registry.dispatch(Delivery::Connection(status(true))));

        registry.replace(Handlers::new().on_connection({
            let second = second.clone();
            move |_| {
                second.fetch_add(1, Ordering::SeqCst);
            }
        }));
        assert!(registry.dispatch(Delivery::Connection(status(false))));

        assert_eq!(first.load(Ordering::SeqCst), 1);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn closed_registry_drops_deliveries() {
        let hits = Arc::new(AtomicUsize::new(0));
        let registry = HandlerRegistry::new(Handlers::new().on_event_log({
            let hits = hits.clone();
            move |_| {
                hits.fetch_add(1, Ordering::SeqCst);
            }
        }));
        registry.close();
        assert!(registry.is_closed());
        assert!(!registry.dispatch(Delivery::EventLog("late".into())));
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn handler_may_replace_itself() {
        let registry = Arc::new(HandlerRegistry::new(Handlers::new()));
        let hits = Arc::new(AtomicUsize::new(0));
        let handlers = Handlers::new().on_event_log({
            let registry = Arc::downgrade(&registry);
            let hits = hits.clone();
            move |_| {
                hits.fetch_add(1, Ordering::SeqCst);
                if let Some(registry) = registry.upgrade() {
                    registry.replace(Handlers::new());
                }
            }
        });
        registry.replace(handlers);

        assert!(registry.dispatch(Delivery::EventLog("one".into())));
        assert!(!registry.dispatch(Delivery::EventLog("two".into())));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn handler_can_check_closed_while_close_waits() {
        use std::sync::atomic::AtomicBool;
        use std::sync::mpsc;
        use std::time::Duration;

        let registry = Arc::new(HandlerRegistry::new(Handlers::new()));
        let (entered_tx, entered_rx) = mpsc::channel::<()>();
        let (go_tx, go_rx) = mpsc::channel::<()>();
        let seen_closed = Arc::new(AtomicBool::new(true));
        let handlers = Handlers::new().on_event_log({
            let registry = Arc::downgrade(&registry);
            let entered_tx = parking_lot::Mutex::new(entered_tx);
            let go_rx = parking_lot::Mutex::new(go_rx);
            let seen_closed = seen_closed.clone();
            move |_| {
                entered_tx.lock().send(()).expect("signal entry");
                go_rx.lock().recv().expect("wait for closer");
                if let Some(registry) = registry.upgrade() {
                    seen_closed.store(registry.is_closed(), Ordering::SeqCst);
                }
            }
        });
        registry.replace(handlers);

        let dispatcher = std::thread::spawn({
            let registry = registry.clone();
            move || registry.dispatch(Delivery::EventLog("line".into()))
        });
        entered_rx.recv().expect("handler entered");
        let closer = std::thread::spawn({
            let registry = registry.clone();
            move || registry.close()
        });
        // Let the closer park on the write lock before the handler reads.
        std::thread::sleep(Duration::from_millis(50));
        go_tx.send(()).expect("release handler");

        assert!(dispatcher.join().expect("dispatcher"));
        closer.join().expect("closer");
        assert!(!seen_closed.load(Ordering::SeqCst));
        assert!(registry.is_closed());
    }

    #[test]
    fn missing_handler_is_not_wanted() {
        let registry = HandlerRegistry::new(Handlers::new().on_advice(|_| {}));
        assert!(registry.wants(Channel::Advice));
        assert!(!registry.wants(Channel::Snapshot));
        assert!(!registry.dispatch(Delivery::Snapshot(StateSnapshot::default())));
    }

    #[test]
    fn decodes_push_payload_per_channel() {
        let payload = br#"{"log_tailing":true,"addon_connected":true,"wow_path":"/wow"}"#;
        let delivery = Delivery::decode(Channel::Connection, payload).expect("decode");
        assert_eq!(delivery.channel(), Channel::Connection);
        assert!(Delivery::decode(Channel::Snapshot, b"not json").is_err());
    }
}
