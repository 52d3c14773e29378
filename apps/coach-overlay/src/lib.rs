//! Client-side delivery layer for the combat coaching overlay.
//!
//! [`transport`] moves backend values to consumers over push and polling,
//! [`state`] holds the consumer-side state machines, and [`overlay`] and
//! [`settings`] wire the two together for each window.

pub mod audio;
pub mod backend;
pub mod clock;
pub mod command;
pub mod config;
pub mod logging;
pub mod overlay;
pub mod push;
pub mod settings;
pub mod state;
pub mod transport;

pub use overlay::{Overlay, OverlayView};
pub use settings::{SettingsPanel, SettingsView};
pub use transport::{HandlerRegistry, Handlers, Subscription, TransportAdapter};
