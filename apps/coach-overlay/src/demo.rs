//! Scripted session for `--demo`: a short pull with a few advisories, a wipe,
//! and a quiet stretch, repeated until shutdown.

use std::sync::Arc;
use std::time::Duration;

use coach_overlay::backend::InMemoryBackend;
use coach_overlay::clock::Clock;
use coach_proto::{
    AdviceEvent, ConnectionStatus, PlayerIdentity, PullDebrief, PullOutcome, Severity,
    StateSnapshot,
};
use tokio::task::JoinHandle;
use tracing::info;

const STEP: Duration = Duration::from_millis(1_000);
const PULL_SECS: u64 = 40;
const REST_SECS: u64 = 15;

pub fn spawn(backend: Arc<InMemoryBackend>, clock: Arc<dyn Clock>) -> JoinHandle<()> {
    tokio::spawn(async move {
        backend.publish_connection(ConnectionStatus {
            log_tailing: true,
            addon_connected: true,
            wow_path: "/games/World of Warcraft/_retail_".into(),
        });
        backend.publish_identity(PlayerIdentity {
            guid: "Player-1084-0A1B2C3D".into(),
            name: "Ashvane".into(),
            realm: "Silvermoon".into(),
            class: "Mage".into(),
            spec: "Frost".into(),
            version: "demo".into(),
        });

        let mut ticker = tokio::time::interval(STEP);
        let mut pull_number = 0u32;
        loop {
            pull_number += 1;
            info!(pull = pull_number, "demo pull starting");
            let mut advice_fired = 0u32;
            let mut avoidable = 0u32;
            for second in 0..PULL_SECS {
                ticker.tick().await;
                let now_ms = clock.now_ms();
                if let Some(advice) = scripted_advice(second, now_ms) {
                    advice_fired += 1;
                    if advice.key == "avoidable_repeat" {
                        avoidable += 1;
                    }
                    backend.publish_advice(advice);
                }
                backend.publish_snapshot(StateSnapshot {
                    pull_elapsed_ms: second * 1_000,
                    gcd_gap_ms: 180 + (second % 7) * 40,
                    avoidable_count: avoidable,
                    interrupt_count: (second / 12) as u32,
                    in_combat: true,
                    encounter_name: Some("Demo Dummy".into()),
                });
            }

            backend.publish_snapshot(StateSnapshot {
                pull_elapsed_ms: PULL_SECS * 1_000,
                avoidable_count: avoidable,
                in_combat: false,
                encounter_name: Some("Demo Dummy".into()),
                ..StateSnapshot::default()
            });
            backend.publish_debrief(PullDebrief {
                pull_number,
                pull_elapsed_ms: PULL_SECS * 1_000,
                outcome: PullOutcome::Wipe,
                avoidable_count: avoidable,
                interrupt_count: (PULL_SECS / 12) as u32,
                total_advice_fired: advice_fired,
                gcd_gap_count: advice_fired.saturating_sub(avoidable),
            });
            for _ in 0..REST_SECS {
                ticker.tick().await;
            }
        }
    })
}

fn scripted_advice(second: u64, now_ms: u64) -> Option<AdviceEvent> {
    let (key, title, message, severity) = match second {
        6 => ("gcd_gap", "GCD gap", "1.4s idle between casts", Severity::Warn),
        11 => ("gcd_gap", "GCD gap", "2.1s idle between casts", Severity::Bad),
        17 => ("avoidable_repeat", "Avoidable damage", "Stood in Frost Pool again", Severity::Bad),
        24 => ("interrupt_miss", "Interrupt", "Shadow Bolt went off", Severity::Warn),
        31 => ("cooldown_drift", "Cooldown", "Icy Veins back on time", Severity::Good),
        _ => return None,
    };
    Some(AdviceEvent {
        key: key.into(),
        title: title.into(),
        message: message.into(),
        severity,
        kv: vec![("t".into(), format!("{second}s"))],
        timestamp_ms: now_ms,
    })
}
