use coach_proto::{Severity, StateSnapshot};

pub const MAX_MARKERS: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimelineMarker {
    pub key: String,
    pub severity: Severity,
    /// Pull-relative position of the marker.
    pub at_pull_ms: u64,
}

/// Advice markers along the current pull.
#[derive(Debug, Default)]
pub struct PullTimeline {
    markers: Vec<TimelineMarker>,
    in_combat: bool,
    last_elapsed_ms: u64,
}

impl PullTimeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tracks pull boundaries. A new pull starts on combat entry or when the
    /// elapsed time goes backwards mid-combat. Returns whether markers were
    /// cleared.
    pub fn observe_snapshot(&mut self, snapshot: &StateSnapshot) -> bool {
        let new_pull = snapshot.in_combat
            && (!self.in_combat || snapshot.pull_elapsed_ms < self.last_elapsed_ms);
        if new_pull {
            self.markers.clear();
        }
        self.in_combat = snapshot.in_combat;
        self.last_elapsed_ms = snapshot.pull_elapsed_ms;
        new_pull
    }

    pub fn mark(&mut self, key: &str, severity: Severity, at_pull_ms: u64) {
        if self.markers.len() >= MAX_MARKERS {
            self.markers.remove(0);
        }
        self.markers.push(TimelineMarker {
            key: key.to_owned(),
            severity,
            at_pull_ms,
        });
    }

    pub fn markers(&self) -> &[TimelineMarker] {
        &self.markers
    }
}
