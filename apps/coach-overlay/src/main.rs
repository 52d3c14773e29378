mod demo;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use coach_bus::PushSource;
use coach_overlay::audio::{AudioEngine, TracingAudioBackend};
use coach_overlay::backend::InMemoryBackend;
use coach_overlay::clock::{Clock, SystemClock};
use coach_overlay::command::{CommandClient, HttpCommandClient};
use coach_overlay::config::Cli;
use coach_overlay::logging;
use coach_overlay::push::WsPushSource;
use coach_overlay::state::debrief_summary;
use coach_overlay::{Overlay, SettingsPanel, TransportAdapter};
use tracing::{debug, info};

const VIEW_LOG_INTERVAL: Duration = Duration::from_secs(1);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init(&cli.logging.to_config()).context("initialise logging")?;

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let mut producer = None;
    let adapter = if cli.demo {
        let backend = Arc::new(InMemoryBackend::new(Arc::clone(&clock)));
        let bus: Arc<dyn PushSource> = backend.bus();
        producer = Some(demo::spawn(Arc::clone(&backend), Arc::clone(&clock)));
        let client: Arc<dyn CommandClient> = backend;
        info!("running against scripted demo backend");
        TransportAdapter::new(client, Some(bus))
    } else {
        let client: Arc<dyn CommandClient> = Arc::new(
            HttpCommandClient::new(cli.backend_url.clone()).context("build backend client")?,
        );
        let push = cli
            .push_url
            .as_deref()
            .map(|url| Arc::new(WsPushSource::new(url)) as Arc<dyn PushSource>);
        info!(
            backend = %cli.backend_url,
            push = %cli.push_url.as_deref().unwrap_or("unset"),
            "starting coach-overlay"
        );
        TransportAdapter::new(client, push)
    };

    let audio = Arc::new(AudioEngine::new(
        Arc::new(TracingAudioBackend),
        cli.audio.to_settings(),
    ));
    let overlay = Overlay::mount(&adapter, audio, Arc::clone(&clock));
    let settings = SettingsPanel::mount(&adapter);

    let mut ticker = tokio::time::interval(VIEW_LOG_INTERVAL);
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);
    let mut feed_mark = 0u64;
    loop {
        tokio::select! {
            res = &mut shutdown => {
                res.context("wait for ctrl-c")?;
                info!("shutdown requested");
                break;
            }
            _ = ticker.tick() => {
                let view = overlay.view();
                let cards: Vec<String> = view
                    .cards
                    .iter()
                    .map(|card| format!("[{}] {}: {}", card.severity.as_str(), card.title, card.message))
                    .collect();
                info!(
                    pull_ms = view.pull_clock_ms,
                    in_combat = view.in_combat,
                    encounter = %view.encounter_name.as_deref().unwrap_or("-"),
                    gcd_gap_ms = view.gcd_gap_ms,
                    avoidable = view.avoidable_count,
                    interrupts = view.interrupt_count,
                    log = view.health.log_active,
                    addon = view.health.addon_connected,
                    player = %view.identity.as_deref().unwrap_or("-"),
                    markers = view.timeline.len(),
                    cards = ?cards,
                    "overlay"
                );
                if let Some(debrief) = &view.debrief {
                    info!(summary = %debrief_summary(debrief), "debrief");
                }
                let (lines, mark) = settings.feed_since(feed_mark);
                for line in lines {
                    debug!(target = "coach.feed", "{line}");
                }
                feed_mark = mark;
            }
        }
    }

    settings.unmount();
    overlay.unmount();
    if let Some(producer) = producer {
        producer.abort();
    }
    Ok(())
}
