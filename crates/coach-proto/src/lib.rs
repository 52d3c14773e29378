//! Shared payload definitions for backend ↔ overlay communication.
//! Kept in a dedicated crate so the backend can emit exactly the shapes the
//! overlay decodes without pulling in the client runtime.

use serde::{Deserialize, Serialize};

pub const EVENT_ADVICE: &str = "coach:advice";
pub const EVENT_STATE: &str = "coach:state";
pub const EVENT_CONNECTION: &str = "coach:connection";
pub const EVENT_IDENTITY: &str = "coach:identity";
pub const EVENT_DEBRIEF: &str = "coach:debrief";

pub const CMD_GET_CONNECTION_STATUS: &str = "get_connection_status";
pub const CMD_GET_STATE_SNAPSHOT: &str = "get_state_snapshot";
pub const CMD_DRAIN_ADVICE_QUEUE: &str = "drain_advice_queue";
pub const CMD_DRAIN_EVENT_LOG: &str = "drain_event_log";

/// Most advice events the backend holds between drains; older ones are dropped.
pub const ADVICE_QUEUE_CAP: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Good,
    Warn,
    Bad,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Good => "good",
            Severity::Warn => "warn",
            Severity::Bad => "bad",
        }
    }
}

/// One advisory produced by the backend rule engine.
///
/// `key` names the logical advisory (e.g. `gcd_gap`) and repeats across
/// occurrences; `timestamp_ms` is assigned by the producer and only moves
/// forward within one backend session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdviceEvent {
    pub key: String,
    pub title: String,
    pub message: String,
    pub severity: Severity,
    /// Label/value pairs in display order.
    #[serde(default)]
    pub kv: Vec<(String, String)>,
    pub timestamp_ms: u64,
}

/// Backend-authoritative combat state at the moment it was produced.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub pull_elapsed_ms: u64,
    pub gcd_gap_ms: u64,
    pub avoidable_count: u32,
    pub interrupt_count: u32,
    pub in_combat: bool,
    #[serde(default)]
    pub encounter_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionStatus {
    pub log_tailing: bool,
    pub addon_connected: bool,
    #[serde(default)]
    pub wow_path: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PullOutcome {
    Kill,
    Wipe,
    Unknown,
}

/// End-of-pull summary, pushed once per kill or wipe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullDebrief {
    pub pull_number: u32,
    pub pull_elapsed_ms: u64,
    pub outcome: PullOutcome,
    pub avoidable_count: u32,
    pub interrupt_count: u32,
    pub total_advice_fired: u32,
    pub gcd_gap_count: u32,
}

/// Player identity written by the companion add-on on login or spec change.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerIdentity {
    pub guid: String,
    pub name: String,
    pub realm: String,
    pub class: String,
    pub spec: String,
    pub version: String,
}

impl PlayerIdentity {
    pub fn is_known(&self) -> bool {
        !self.guid.is_empty()
    }
}

/// Logical delivery channels between backend and overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Channel {
    Connection,
    Snapshot,
    Advice,
    Identity,
    Debrief,
    EventLog,
}

impl Channel {
    pub const ALL: [Channel; 6] = [
        Channel::Connection,
        Channel::Snapshot,
        Channel::Advice,
        Channel::Identity,
        Channel::Debrief,
        Channel::EventLog,
    ];

    /// Push topic for the channel, if the backend emits one.
    pub fn push_topic(self) -> Option<&'static str> {
        match self {
            Channel::Connection => Some(EVENT_CONNECTION),
            Channel::Snapshot => Some(EVENT_STATE),
            Channel::Advice => Some(EVENT_ADVICE),
            Channel::Identity => Some(EVENT_IDENTITY),
            Channel::Debrief => Some(EVENT_DEBRIEF),
            Channel::EventLog => None,
        }
    }

    /// Backend command standing in for push delivery, if any.
    pub fn poll_command(self) -> Option<&'static str> {
        match self {
            Channel::Connection => Some(CMD_GET_CONNECTION_STATUS),
            Channel::Snapshot => Some(CMD_GET_STATE_SNAPSHOT),
            Channel::Advice => Some(CMD_DRAIN_ADVICE_QUEUE),
            Channel::EventLog => Some(CMD_DRAIN_EVENT_LOG),
            Channel::Identity | Channel::Debrief => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Channel::Connection => "connection",
            Channel::Snapshot => "snapshot",
            Channel::Advice => "advice",
            Channel::Identity => "identity",
            Channel::Debrief => "debrief",
            Channel::EventLog => "event_log",
        }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advice_decodes_backend_json() {
        let raw = serde_json::json!({
            "key": "gcd_gap",
            "title": "GCD gap",
            "message": "2.4s idle",
            "severity": "warn",
            "kv": [["gap", "2.4s"], ["target", "1.5s"]],
            "timestamp_ms": 1000
        });
        let advice: AdviceEvent = serde_json::from_value(raw).expect("decode advice");
        assert_eq!(advice.severity, Severity::Warn);
        assert_eq!(advice.kv[0], ("gap".to_string(), "2.4s".to_string()));
        assert_eq!(advice.kv[1].0, "target");
    }

    #[test]
    fn snapshot_tolerates_missing_encounter() {
        let raw = serde_json::json!({
            "pull_elapsed_ms": 5000,
            "gcd_gap_ms": 0,
            "avoidable_count": 1,
            "interrupt_count": 2,
            "in_combat": true
        });
        let snap: StateSnapshot = serde_json::from_value(raw).expect("decode snapshot");
        assert!(snap.encounter_name.is_none());
        assert!(snap.in_combat);
    }

    #[test]
    fn event_log_has_no_push_topic() {
        assert!(Channel::Identity.push_topic().is_some());
        assert!(Channel::EventLog.push_topic().is_none());
        assert_eq!(Channel::Advice.push_topic(), Some("coach:advice"));
    }
}
