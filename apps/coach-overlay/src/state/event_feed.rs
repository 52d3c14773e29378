use std::collections::VecDeque;

pub const MAX_FEED_LINES: usize = 200;

/// Scrolling backend log for the settings window. Oldest lines fall off.
#[derive(Debug, Default)]
pub struct EventFeed {
    lines: VecDeque<String>,
    /// Lines ever pushed, including dropped ones.
    appended: u64,
}

impl EventFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, line: String) {
        if self.lines.len() >= MAX_FEED_LINES {
            self.lines.pop_front();
        }
        self.lines.push_back(line);
        self.appended += 1;
    }

    pub fn appended(&self) -> u64 {
        self.appended
    }

    /// Retained lines pushed after the `appended` count `mark` was read.
    pub fn since(&self, mark: u64) -> Vec<String> {
        let fresh = self.appended.saturating_sub(mark).min(self.lines.len() as u64) as usize;
        self.lines.iter().skip(self.lines.len() - fresh).cloned().collect()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}
