//! Platform audio sources
//!
//! `AudioSource` is the engine-facing face of the underlying media
//! subsystem: bind a locator, start/stop audible output, report position.
//! Decoding and device handling stay behind this trait; the engine never
//! sees them.
//!
//! The shipped backend is rodio: one `Sink` per load, all sinks feeding the
//! process-wide output mixer, slot gain carried on `Sink::set_volume`.

use crate::error::{Error, Result};
use rodio::mixer::Mixer;
use rodio::{Decoder, Sink, Source};
use std::fs::File;
use std::io::BufReader;
use std::time::Duration;

/// Result of a playback start request
///
/// Starting playback is best-effort: when the platform refuses (no output
/// device, suspended context), the request resolves to `Blocked` rather
/// than an error, and the caller observes a not-playing state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayOutcome {
    /// Audible playback started
    Started,
    /// Platform refused playback; source remains stopped
    Blocked,
}

impl PlayOutcome {
    pub fn is_playing(self) -> bool {
        matches!(self, PlayOutcome::Started)
    }
}

/// A platform playback source bound to one slot
///
/// Implementations must absorb platform quirks: `play` never fails loudly,
/// `seek` reports refusal through its return value, and `ended` is level-
/// triggered (it stays true once the bound material is exhausted).
pub trait AudioSource: Send + Sync {
    /// Bind `locator` as the slot's material, resetting position to zero
    fn load(&mut self, locator: &str) -> Result<()>;

    /// Start audible playback
    fn play(&mut self) -> PlayOutcome;

    /// Stop audible playback, keeping position
    fn pause(&mut self);

    /// Best-effort seek; returns false when the source cannot seek
    fn seek(&mut self, seconds: f64) -> bool;

    /// Set output volume in [0, 1]
    fn set_volume(&mut self, volume: f32);

    /// Current playback position in seconds
    fn position(&self) -> f64;

    /// Total duration in seconds, when known
    fn duration(&self) -> Option<f64>;

    /// Whether the bound material has been exhausted
    fn ended(&self) -> bool;
}

/// rodio-backed source
///
/// Holds a `Mixer` handle rather than the output stream itself; the stream
/// is owned by the binary and must outlive the engine. When no output
/// device could be opened the source still loads and probes material, but
/// every `play` resolves to `Blocked`.
pub struct RodioSource {
    mixer: Option<Mixer>,
    sink: Option<Sink>,
    duration: Option<f64>,
    volume: f32,
}

impl RodioSource {
    /// Create a source feeding `mixer`; `None` models an unavailable output
    pub fn new(mixer: Option<Mixer>) -> Self {
        Self {
            mixer,
            sink: None,
            duration: None,
            volume: 0.0,
        }
    }
}

impl AudioSource for RodioSource {
    fn load(&mut self, locator: &str) -> Result<()> {
        if let Some(old) = self.sink.take() {
            old.stop();
        }
        self.duration = None;

        let file = File::open(locator)
            .map_err(|e| Error::Load(format!("cannot open '{}': {}", locator, e)))?;
        let decoder = Decoder::new(BufReader::new(file))
            .map_err(|e| Error::Load(format!("cannot decode '{}': {}", locator, e)))?;
        self.duration = decoder.total_duration().map(|d| d.as_secs_f64());

        if let Some(mixer) = &self.mixer {
            let sink = Sink::connect_new(mixer);
            sink.pause();
            sink.set_volume(self.volume);
            sink.append(decoder);
            self.sink = Some(sink);
        }
        Ok(())
    }

    fn play(&mut self) -> PlayOutcome {
        match &self.sink {
            Some(sink) => {
                sink.play();
                PlayOutcome::Started
            }
            None => PlayOutcome::Blocked,
        }
    }

    fn pause(&mut self) {
        if let Some(sink) = &self.sink {
            sink.pause();
        }
    }

    fn seek(&mut self, seconds: f64) -> bool {
        match &self.sink {
            Some(sink) => sink.try_seek(Duration::from_secs_f64(seconds.max(0.0))).is_ok(),
            None => false,
        }
    }

    fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, 1.0);
        if let Some(sink) = &self.sink {
            sink.set_volume(self.volume);
        }
    }

    fn position(&self) -> f64 {
        self.sink
            .as_ref()
            .map_or(0.0, |sink| sink.get_pos().as_secs_f64())
    }

    fn duration(&self) -> Option<f64> {
        self.duration
    }

    fn ended(&self) -> bool {
        self.sink.as_ref().map_or(false, |sink| sink.empty())
    }
}

// ========================================
// Test source
// ========================================
