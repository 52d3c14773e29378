use std::collections::HashMap;
use std::time::Duration;

use coach_proto::Channel;
use parking_lot::Mutex;
use tokio::time::Instant;

const POLL_FAILURE_WARN_INTERVAL: Duration = Duration::from_secs(10);

/// Rate limit for per-channel poll failure warnings. A backend that is down
/// fails every tick; one warning per interval is enough, the rest go to debug.
#[derive(Debug, Default)]
pub struct FailureThrottle {
    last_warned: Mutex<HashMap<Channel, Instant>>,
}

impl FailureThrottle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn should_warn(&self, channel: Channel) -> bool {
        let mut guard = self.last_warned.lock();
        let now = Instant::now();
        if let Some(last) = guard.get(&channel) {
            if now.duration_since(*last) < POLL_FAILURE_WARN_INTERVAL {
                return false;
            }
        }
        guard.insert(channel, now);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn warns_once_per_interval_per_channel() {
        let throttle = FailureThrottle::new();
        assert!(throttle.should_warn(Channel::Snapshot));
        assert!(!throttle.should_warn(Channel::Snapshot));
        assert!(throttle.should_warn(Channel::Advice));

        tokio::time::advance(POLL_FAILURE_WARN_INTERVAL).await;
        assert!(throttle.should_warn(Channel::Snapshot));
    }
}
