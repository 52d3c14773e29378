//! Audio cues for accepted advice.
//!
//! [`AudioEngine`] is the one owner of the output context. It is shared as an
//! `Arc` by everything that plays cues, opens the context on first use,
//! resumes it if the platform suspended it, and reopens it if it was closed.

use std::sync::Arc;

use coach_proto::Severity;
use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextState {
    Running,
    Suspended,
    Closed,
}

/// A short tone pattern.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cue {
    pub frequency_hz: f32,
    pub duration_ms: u32,
    pub pulses: u8,
}

/// Severity to tone table. Higher severity is lower, longer, and repeated.
pub fn cue_for(severity: Severity) -> Cue {
    match severity {
        Severity::Good => Cue {
            frequency_hz: 880.0,
            duration_ms: 120,
            pulses: 1,
        },
        Severity::Warn => Cue {
            frequency_hz: 660.0,
            duration_ms: 180,
            pulses: 2,
        },
        Severity::Bad => Cue {
            frequency_hz: 440.0,
            duration_ms: 250,
            pulses: 3,
        },
    }
}

#[derive(Debug, Error)]
pub enum AudioError {
    #[error("audio output unavailable: {0}")]
    Unavailable(String),
    #[error("audio context closed")]
    Closed,
    #[error("playback failed: {0}")]
    Playback(String),
}

/// A live output context.
pub trait AudioContext: Send {
    fn state(&self) -> ContextState;
    fn resume(&mut self) -> Result<(), AudioError>;
    fn play(&mut self, cue: &Cue, volume: f32) -> Result<(), AudioError>;
}

/// Opens output contexts.
pub trait AudioBackend: Send + Sync {
    fn open(&self) -> Result<Box<dyn AudioContext>, AudioError>;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AudioSettings {
    pub enabled: bool,
    /// 0.0 ..= 1.0
    pub volume: f32,
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            volume: 0.6,
        }
    }
}

pub struct AudioEngine {
    backend: Arc<dyn AudioBackend>,
    settings: Mutex<AudioSettings>,
    context: Mutex<Option<Box<dyn AudioContext>>>,
}

impl AudioEngine {
    pub fn new(backend: Arc<dyn AudioBackend>, settings: AudioSettings) -> Self {
        Self {
            backend,
            settings: Mutex::new(settings),
            context: Mutex::new(None),
        }
    }

    pub fn settings(&self) -> AudioSettings {
        *self.settings.lock()
    }

    pub fn set_settings(&self, settings: AudioSettings) {
        *self.settings.lock() = settings;
    }

    /// Plays the cue for `severity`. Returns whether a cue was played;
    /// failures are logged and never surface to the caller.
    pub fn play_for(&self, severity: Severity) -> bool {
        let settings = self.settings();
        if !settings.enabled || settings.volume <= 0.0 {
            debug!(target = "coach.audio", severity = severity.as_str(), "audio muted");
            return false;
        }
        let cue = cue_for(severity);
        match self.play(&cue, settings.volume.min(1.0)) {
            Ok(()) => true,
            Err(err) => {
                warn!(
                    target = "coach.audio",
                    severity = severity.as_str(),
                    error = %err,
                    "audio cue failed"
                );
                false
            }
        }
    }

    fn play(&self, cue: &Cue, volume: f32) -> Result<(), AudioError> {
        let mut guard = self.context.lock();
        let reopen = guard
            .as_ref()
            .is_none_or(|ctx| ctx.state() == ContextState::Closed);
        if reopen {
            if guard.is_some() {
                debug!(target = "coach.audio", "audio context closed; reopening");
            }
            *guard = Some(self.backend.open()?);
        }
        let ctx = guard.as_mut().ok_or(AudioError::Closed)?;
        if ctx.state() == ContextState::Suspended {
            ctx.resume()?;
        }
        ctx.play(cue, volume)
    }
}

impl std::fmt::Debug for AudioEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioEngine")
            .field("settings", &self.settings())
            .field("open", &self.context.lock().is_some())
            .finish()
    }
}

/// Headless output: every cue becomes an `info!` line.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAudioBackend;

struct TracingContext;

impl AudioContext for TracingContext {
    fn state(&self) -> ContextState {
        ContextState::Running
    }

    fn resume(&mut self) -> Result<(), AudioError> {
        Ok(())
    }

    fn play(&mut self, cue: &Cue, volume: f32) -> Result<(), AudioError> {
        info!(
            target = "coach.audio",
            frequency_hz = cue.frequency_hz,
            duration_ms = cue.duration_ms,
            pulses = cue.pulses,
            volume,
            "cue"
        );
        Ok(())
    }
}

impl AudioBackend for TracingAudioBackend {
    fn open(&self) -> Result<Box<dyn AudioContext>, AudioError> {
        Ok(Box::new(TracingContext))
    }
}
