//! The "now" feed: a short, deduplicated, self-expiring list of advice cards.

use std::collections::VecDeque;
use std::time::Duration;

use coach_bus::TOPIC_CAPACITY;
use coach_proto::{ADVICE_QUEUE_CAP, AdviceEvent};

pub const MAX_CARDS: usize = 3;
pub const CARD_TTL_MS: u64 = 30_000;
pub const SWEEP_INTERVAL: Duration = Duration::from_millis(1_000);

/// How many already-ingested events are remembered so a second delivery path
/// cannot replay one. Covers a full drain plus a full push buffer.
const SEEN_MEMORY: usize = ADVICE_QUEUE_CAP + TOPIC_CAPACITY;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    /// New key, prepended.
    Inserted,
    /// A card with the same key was replaced and moved to the front.
    Replaced,
    /// This exact event was already ingested; nothing changed.
    Duplicate,
}

impl IngestOutcome {
    pub fn is_accepted(self) -> bool {
        !matches!(self, IngestOutcome::Duplicate)
    }
}

/// Cards ordered most-recent-first. At most [`MAX_CARDS`] entries and at most
/// one per key.
#[derive(Debug, Default)]
pub struct AdviceCardStore {
    cards: VecDeque<AdviceEvent>,
    seen: VecDeque<AdviceEvent>,
}

impl AdviceCardStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ingest(&mut self, event: AdviceEvent) -> IngestOutcome {
        if self.seen.contains(&event) {
            return IngestOutcome::Duplicate;
        }
        self.seen.push_back(event.clone());
        if self.seen.len() > SEEN_MEMORY {
            self.seen.pop_front();
        }

        let outcome = match self.cards.iter().position(|card| card.key == event.key) {
            Some(index) => {
                self.cards.remove(index);
                IngestOutcome::Replaced
            }
            None => IngestOutcome::Inserted,
        };
        self.cards.push_front(event);
        self.cards.truncate(MAX_CARDS);
        outcome
    }

    /// Drops every card aged [`CARD_TTL_MS`] or more. Returns how many went.
    pub fn sweep(&mut self, now_ms: u64) -> usize {
        let before = self.cards.len();
        self.cards.retain(|card| is_fresh(card, now_ms));
        before - self.cards.len()
    }

    /// Cards still inside the TTL at `now_ms`, most recent first.
    pub fn live_cards(&self, now_ms: u64) -> Vec<AdviceEvent> {
        self.cards
            .iter()
            .filter(|card| is_fresh(card, now_ms))
            .cloned()
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AdviceEvent> {
        self.cards.iter()
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }
}

fn is_fresh(card: &AdviceEvent, now_ms: u64) -> bool {
    now_ms.saturating_sub(card.timestamp_ms) < CARD_TTL_MS
}
