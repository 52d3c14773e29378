//! Settings window consumer: connection diagnostics, player identity, and the
//! scrolling backend event feed. Mounts its own subscription beside the
//! overlay's.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::state::{ConnectionHealthMonitor, EventFeed, HealthIndicators, IdentityBadge};
use crate::transport::{HandlerRegistry, Handlers, Subscription, TransportAdapter};

#[derive(Debug, Default)]
struct SettingsState {
    health: ConnectionHealthMonitor,
    identity: IdentityBadge,
    feed: EventFeed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingsView {
    pub health: HealthIndicators,
    pub wow_path: String,
    pub identity: Option<String>,
    pub feed: Vec<String>,
}

pub struct SettingsPanel {
    state: Arc<Mutex<SettingsState>>,
    subscription: Subscription,
}

impl SettingsPanel {
    pub fn mount(adapter: &TransportAdapter) -> Self {
        let state = Arc::new(Mutex::new(SettingsState::default()));
        let handlers = Handlers::new()
            .on_connection({
                let state = Arc::clone(&state);
                move |status| state.lock().health.apply(status)
            })
            .on_identity({
                let state = Arc::clone(&state);
                move |identity| state.lock().identity.apply(identity)
            })
            .on_event_log({
                let state = Arc::clone(&state);
                move |line| state.lock().feed.push(line)
            });
        let subscription = adapter.mount(Arc::new(HandlerRegistry::new(handlers)));
        Self { state, subscription }
    }

    pub fn subscription(&self) -> &Subscription {
        &self.subscription
    }

    pub fn view(&self) -> SettingsView {
        let state = self.state.lock();
        SettingsView {
            health: state.health.indicators(),
            wow_path: state.health.wow_path().to_owned(),
            identity: state.identity.label(),
            feed: state.feed.lines(),
        }
    }

    /// Feed lines that arrived after `mark`, and the mark to pass next time.
    pub fn feed_since(&self, mark: u64) -> (Vec<String>, u64) {
        let state = self.state.lock();
        (state.feed.since(mark), state.feed.appended())
    }

    pub fn unmount(&self) {
        self.subscription.teardown();
    }
}
