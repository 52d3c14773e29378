//! Consumer-side state machines. All of them are synchronous and take the
//! current time as an argument; the overlay owns the timers.

mod cards;
mod debrief;
mod event_feed;
mod health;
mod identity;
mod pull_clock;
mod timeline;

pub use cards::{AdviceCardStore, CARD_TTL_MS, IngestOutcome, MAX_CARDS, SWEEP_INTERVAL};
pub use debrief::{DEBRIEF_DISPLAY_MS, DebriefPanel, summary as debrief_summary};
pub use event_feed::{EventFeed, MAX_FEED_LINES};
pub use health::{ConnectionHealthMonitor, HealthIndicators};
pub use identity::IdentityBadge;
pub use pull_clock::{EXTRAPOLATION_TICK, SnapshotExtrapolator};
pub use timeline::{MAX_MARKERS, PullTimeline, TimelineMarker};
