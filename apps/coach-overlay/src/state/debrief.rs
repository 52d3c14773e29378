use coach_proto::{PullDebrief, PullOutcome};

pub const DEBRIEF_DISPLAY_MS: u64 = 10_000;

/// Post-pull summary shown briefly after a kill or wipe.
#[derive(Debug, Default)]
pub struct DebriefPanel {
    shown: Option<(PullDebrief, u64)>,
}

impl DebriefPanel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, debrief: PullDebrief, arrival_ms: u64) {
        self.shown = Some((debrief, arrival_ms));
    }

    /// Clears the panel once its display window has passed. Returns whether
    /// anything was cleared.
    pub fn sweep(&mut self, now_ms: u64) -> bool {
        match &self.shown {
            Some((_, at)) if now_ms.saturating_sub(*at) >= DEBRIEF_DISPLAY_MS => {
                self.shown = None;
                true
            }
            _ => false,
        }
    }

    pub fn visible(&self, now_ms: u64) -> Option<&PullDebrief> {
        self.shown
            .as_ref()
            .filter(|(_, at)| now_ms.saturating_sub(*at) < DEBRIEF_DISPLAY_MS)
            .map(|(debrief, _)| debrief)
    }
}

/// One-line summary, e.g. `Pull #3 wipe 2:05, 7 advice, 2 avoidable`.
pub fn summary(debrief: &PullDebrief) -> String {
    let outcome = match debrief.outcome {
        PullOutcome::Kill => "kill",
        PullOutcome::Wipe => "wipe",
        PullOutcome::Unknown => "ended",
    };
    let secs = debrief.pull_elapsed_ms / 1_000;
    format!(
        "Pull #{} {} {}:{:02}, {} advice, {} avoidable",
        debrief.pull_number,
        outcome,
        secs / 60,
        secs % 60,
        debrief.total_advice_fired,
        debrief.avoidable_count
    )
}
