//! Running pull clock interpolated between sparse snapshots.

use std::time::Duration;

use coach_proto::StateSnapshot;

pub const EXTRAPOLATION_TICK: Duration = Duration::from_millis(200);

#[derive(Debug, Default)]
pub struct SnapshotExtrapolator {
    latest: Option<Arrival>,
    displayed_ms: u64,
}

#[derive(Debug)]
struct Arrival {
    snapshot: StateSnapshot,
    at_ms: u64,
}

impl SnapshotExtrapolator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a snapshot and the local time it arrived.
    ///
    /// A snapshot reporting the same elapsed time and combat flag as the one
    /// held keeps the first arrival time, so push and poll delivering the same
    /// value (or only new counters) do not rewind the clock. The
    /// displayed value moves down only when the snapshot reports a smaller
    /// elapsed time than the previous one, or combat has ended.
    pub fn apply(&mut self, snapshot: StateSnapshot, arrival_ms: u64) {
        if let Some(prev) = self.latest.as_mut() {
            if prev.snapshot.pull_elapsed_ms == snapshot.pull_elapsed_ms
                && prev.snapshot.in_combat == snapshot.in_combat
            {
                prev.snapshot = snapshot;
                return;
            }
        }
        let restarted = match &self.latest {
            Some(prev) => snapshot.pull_elapsed_ms < prev.snapshot.pull_elapsed_ms,
            None => true,
        };
        let hold = !restarted && snapshot.in_combat && snapshot.pull_elapsed_ms > 0;
        self.displayed_ms = if hold {
            self.displayed_ms.max(snapshot.pull_elapsed_ms)
        } else {
            snapshot.pull_elapsed_ms
        };
        self.latest = Some(Arrival {
            snapshot,
            at_ms: arrival_ms,
        });
    }

    /// What the clock should read at `now_ms`, without recording it.
    ///
    /// Out of combat the backend value is shown verbatim so the clock never
    /// runs past a real reset.
    pub fn value_at(&self, now_ms: u64) -> u64 {
        match &self.latest {
            Some(Arrival { snapshot, at_ms })
                if snapshot.in_combat && snapshot.pull_elapsed_ms > 0 =>
            {
                snapshot.pull_elapsed_ms + now_ms.saturating_sub(*at_ms)
            }
            Some(Arrival { snapshot, .. }) => snapshot.pull_elapsed_ms,
            None => 0,
        }
    }

    /// Advances the displayed value. Between two snapshots it never decreases,
    /// even if `now_ms` does.
    pub fn tick(&mut self, now_ms: u64) -> u64 {
        let next = self.value_at(now_ms);
        self.displayed_ms = if self.is_extrapolating() {
            self.displayed_ms.max(next)
        } else {
            next
        };
        self.displayed_ms
    }

    pub fn displayed_ms(&self) -> u64 {
        self.displayed_ms
    }

    pub fn snapshot(&self) -> Option<&StateSnapshot> {
        self.latest.as_ref().map(|arrival| &arrival.snapshot)
    }

    fn is_extrapolating(&self) -> bool {
        self.latest
            .as_ref()
            .is_some_and(|arrival| arrival.snapshot.in_combat && arrival.snapshot.pull_elapsed_ms > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snap(pull_elapsed_ms: u64, in_combat: bool) -> StateSnapshot {
        StateSnapshot {
            pull_elapsed_ms,
            in_combat,
            ..StateSnapshot::default()
        }
    }

    #[test]
    fn extrapolates_in_combat() {
        let mut clock = SnapshotExtrapolator::new();
        clock.apply(snap(5_000, true), 100_000);
        assert_eq!(clock.tick(100_800), 5_800);
        assert_eq!(clock.displayed_ms(), 5_800);
    }

    #[test]
    fn holds_verbatim_out_of_combat() {
        let mut clock = SnapshotExtrapolator::new();
        clock.apply(snap(42_000, false), 100_000);
        assert_eq!(clock.tick(110_000), 42_000);
    }

    #[test]
    fn zero_elapsed_is_not_extrapolated() {
        let mut clock = SnapshotExtrapolator::new();
        clock.apply(snap(0, true), 100_000);
        assert_eq!(clock.tick(101_000), 0);
    }

    #[test]
    fn never_decreases_between_snapshots() {
        let mut clock = SnapshotExtrapolator::new();
        clock.apply(snap(1_000, true), 50_000);
        let mut last = 0;
        for now in (50_000..53_000).step_by(200) {
            let value = clock.tick(now);
            assert!(value >= last);
            last = value;
        }
        // A wall clock stepping backwards does not pull the display down.
        assert_eq!(clock.tick(49_000), last);
    }

    #[test]
    fn new_pull_resets_downward() {
        let mut clock = SnapshotExtrapolator::new();
        clock.apply(snap(90_000, true), 10_000);
        assert_eq!(clock.tick(12_000), 92_000);

        clock.apply(snap(400, true), 12_100);
        assert_eq!(clock.displayed_ms(), 400);
        assert_eq!(clock.tick(12_300), 600);
    }

    #[test]
    fn redelivered_snapshot_keeps_first_arrival() {
        let mut clock = SnapshotExtrapolator::new();
        clock.apply(snap(5_000, true), 100_000);
        clock.apply(snap(5_000, true), 100_300);
        clock.apply(snap(5_000, true), 100_600);
        assert_eq!(clock.tick(100_800), 5_800);

        let counters_only = StateSnapshot {
            avoidable_count: 2,
            ..snap(5_000, true)
        };
        clock.apply(counters_only, 100_900);
        assert_eq!(clock.tick(101_000), 6_000);
        assert_eq!(clock.snapshot().map(|s| s.avoidable_count), Some(2));
    }

    #[test]
    fn lagging_snapshot_does_not_pull_display_back() {
        let mut clock = SnapshotExtrapolator::new();
        clock.apply(snap(5_000, true), 100_000);
        assert_eq!(clock.tick(101_000), 6_000);

        // Backend caught up only partially; the display holds until it passes.
        clock.apply(snap(5_500, true), 101_000);
        assert_eq!(clock.displayed_ms(), 6_000);
        assert_eq!(clock.tick(101_200), 6_000);
        assert_eq!(clock.tick(101_700), 6_200);
    }

    #[test]
    fn combat_end_shows_backend_value() {
        let mut clock = SnapshotExtrapolator::new();
        clock.apply(snap(5_000, true), 100_000);
        clock.tick(102_000);
        clock.apply(snap(6_100, false), 102_100);
        assert_eq!(clock.displayed_ms(), 6_100);
        assert_eq!(clock.tick(105_000), 6_100);
    }

    #[test]
    fn nothing_received_reads_zero() {
        let mut clock = SnapshotExtrapolator::new();
        assert_eq!(clock.tick(1_000), 0);
        assert!(clock.snapshot().is_none());
    }
}
