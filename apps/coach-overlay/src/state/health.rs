use coach_proto::ConnectionStatus;

/// The two header indicators.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HealthIndicators {
    pub log_active: bool,
    pub addon_connected: bool,
}

/// Last-value-wins view of backend connection health. Absence of a fresh
/// value keeps the last known one; nothing here times out.
#[derive(Debug, Default)]
pub struct ConnectionHealthMonitor {
    current: ConnectionStatus,
}

impl ConnectionHealthMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, status: ConnectionStatus) {
        self.current = status;
    }

    pub fn indicators(&self) -> HealthIndicators {
        HealthIndicators {
            log_active: self.current.log_tailing,
            addon_connected: self.current.addon_connected,
        }
    }

    pub fn wow_path(&self) -> &str {
        &self.current.wow_path
    }

    pub fn status(&self) -> &ConnectionStatus {
        &self.current
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_disconnected() {
        let monitor = ConnectionHealthMonitor::new();
        assert_eq!(monitor.indicators(), HealthIndicators::default());
        assert_eq!(monitor.wow_path(), "");
    }

    #[test]
    fn last_value_wins() {
        let mut monitor = ConnectionHealthMonitor::new();
        monitor.apply(ConnectionStatus {
            log_tailing: true,
            addon_connected: true,
            wow_path: "/games/wow".into(),
        });
        monitor.apply(ConnectionStatus {
            log_tailing: true,
            addon_connected: false,
            wow_path: "/games/wow".into(),
        });
        assert_eq!(
            monitor.indicators(),
            HealthIndicators {
                log_active: true,
                addon_connected: false,
            }
        );
        assert_eq!(monitor.wow_path(), "/games/wow");
    }
}
