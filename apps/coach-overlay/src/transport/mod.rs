mod adapter;
mod registry;
mod throttle;

pub use adapter::{
    ADVICE_POLL_INTERVAL, CONNECTION_POLL_INTERVAL, EVENT_LOG_POLL_INTERVAL, PUSH_TIMEOUT,
    PushState, SNAPSHOT_POLL_INTERVAL, Subscription, TransportAdapter, poll_interval,
};
pub use registry::{Callback, Delivery, HandlerRegistry, Handlers};
