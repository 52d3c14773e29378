use clap::{Args, Parser, builder::BoolishValueParser};
use std::path::PathBuf;

use crate::audio::AudioSettings;
use crate::logging::{LogConfig, LogLevel};

#[derive(Parser, Debug)]
#[command(
    name = "coach-overlay",
    about = "Headless client for the combat coaching overlay",
    version
)]
pub struct Cli {
    #[arg(
        long,
        env = "COACH_BACKEND_URL",
        default_value = "http://127.0.0.1:7420",
        help = "Base URL the backend answers commands on"
    )]
    pub backend_url: String,

    #[arg(
        long,
        env = "COACH_PUSH_URL",
        value_name = "URL",
        help = "WebSocket base URL for push events; polling only when unset"
    )]
    pub push_url: Option<String>,

    #[arg(
        long,
        env = "COACH_DEMO",
        value_parser = BoolishValueParser::new(),
        default_value_t = false,
        help = "Run against an in-process backend fed by a scripted session"
    )]
    pub demo: bool,

    #[command(flatten)]
    pub logging: LoggingArgs,

    #[command(flatten)]
    pub audio: AudioArgs,
}

#[derive(Args, Debug, Clone)]
pub struct LoggingArgs {
    #[arg(
        long = "log-level",
        value_enum,
        env = "COACH_LOG_LEVEL",
        default_value_t = LogLevel::Warn,
        help = "Minimum log level (error, warn, info, debug, trace)"
    )]
    pub level: LogLevel,

    #[arg(
        long = "log-file",
        value_name = "PATH",
        env = "COACH_LOG_FILE",
        help = "Write structured logs to the specified file"
    )]
    pub file: Option<PathBuf>,
}

impl LoggingArgs {
    pub fn to_config(&self) -> LogConfig {
        LogConfig {
            level: self.level,
            file: self.file.clone(),
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct AudioArgs {
    #[arg(
        long = "audio",
        env = "COACH_AUDIO",
        value_parser = BoolishValueParser::new(),
        default_value_t = true,
        action = clap::ArgAction::Set,
        help = "Play a cue when new advice arrives"
    )]
    pub enabled: bool,

    #[arg(
        long = "audio-volume",
        env = "COACH_AUDIO_VOLUME",
        default_value_t = 0.6,
        value_parser = parse_volume,
        help = "Cue volume between 0.0 and 1.0"
    )]
    pub volume: f32,
}

impl AudioArgs {
    pub fn to_settings(&self) -> AudioSettings {
        AudioSettings {
            enabled: self.enabled,
            volume: self.volume,
        }
    }
}

fn parse_volume(raw: &str) -> Result<f32, String> {
    let volume: f32 = raw
        .parse()
        .map_err(|_| format!("`{raw}` is not a number"))?;
    if (0.0..=1.0).contains(&volume) {
        Ok(volume)
    } else {
        Err(format!("volume {volume} is outside 0.0..=1.0"))
    }
}
