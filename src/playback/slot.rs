//! Audio slot identity, status, and gain ramping
//!
//! The engine owns exactly two slots for its lifetime. Each slot binds a
//! platform source and carries a gain in [0, 1]. Gain changes are either
//! immediate or linear ramps evaluated lazily against the clock, so a ramp
//! preempted mid-flight restarts from its live value rather than an assumed
//! endpoint.

use crate::playback::source::AudioSource;
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::time::{Duration, Instant};

/// Identity of one of the two playback slots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotId {
    A,
    B,
}

impl SlotId {
    /// The other slot
    pub fn other(self) -> SlotId {
        match self {
            SlotId::A => SlotId::B,
            SlotId::B => SlotId::A,
        }
    }

    /// Stable array index for slot storage
    pub(crate) fn index(self) -> usize {
        match self {
            SlotId::A => 0,
            SlotId::B => 1,
        }
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlotId::A => write!(f, "a"),
            SlotId::B => write!(f, "b"),
        }
    }
}

/// Lifecycle status of a slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotStatus {
    /// No source bound yet
    Empty,
    /// Source bound, not yet started
    Loaded,
    /// Audibly playing
    Playing,
    /// Source bound and stopped
    Paused,
    /// Last load failed; slot unusable until reloaded
    Errored,
}

/// Linear gain ramp between two levels
///
/// Evaluated lazily: `value_at` interpolates against the clock instead of
/// mutating per tick, so concurrent readers always observe the same value
/// for the same instant.
#[derive(Debug, Clone, Copy)]
pub struct GainRamp {
    from: f32,
    to: f32,
    started_at: Instant,
    duration: Duration,
}

impl GainRamp {
    pub fn new(from: f32, to: f32, started_at: Instant, duration: Duration) -> Self {
        Self {
            from: from.clamp(0.0, 1.0),
            to: to.clamp(0.0, 1.0),
            started_at,
            duration,
        }
    }

    /// Gain value at `now`, clamped to the ramp endpoints
    pub fn value_at(&self, now: Instant) -> f32 {
        if self.duration.is_zero() || now >= self.started_at + self.duration {
            return self.to;
        }
        if now <= self.started_at {
            return self.from;
        }
        let progress =
            now.duration_since(self.started_at).as_secs_f32() / self.duration.as_secs_f32();
        self.from + (self.to - self.from) * progress.clamp(0.0, 1.0)
    }

    /// Whether the ramp has reached its endpoint at `now`
    pub fn is_settled(&self, now: Instant) -> bool {
        self.duration.is_zero() || now >= self.started_at + self.duration
    }

    pub fn target(&self) -> f32 {
        self.to
    }
}

/// Gain state of a slot: a resting level or an in-flight ramp
#[derive(Debug, Clone, Copy)]
pub enum Gain {
    Level(f32),
    Ramp(GainRamp),
}

impl Gain {
    /// Current gain value at `now`
    pub fn value_at(&self, now: Instant) -> f32 {
        match self {
            Gain::Level(v) => *v,
            Gain::Ramp(ramp) => ramp.value_at(now),
        }
    }

    /// The value the gain will rest at once settled
    pub fn target(&self) -> f32 {
        match self {
            Gain::Level(v) => *v,
            Gain::Ramp(ramp) => ramp.target(),
        }
    }

    /// Begin a transition to `value`
    ///
    /// With a ramp duration the transition starts from the *live* value at
    /// `now`, not the previous target, so preempting an unfinished ramp never
    /// produces a gain step.
    pub fn set(&mut self, value: f32, ramp: Option<Duration>, now: Instant) {
        match ramp {
            None => *self = Gain::Level(value.clamp(0.0, 1.0)),
            Some(duration) => {
                let from = self.value_at(now);
                *self = Gain::Ramp(GainRamp::new(from, value, now, duration));
            }
        }
    }

    /// Immediately rest at `value`, discarding any ramp
    pub fn snap(&mut self, value: f32) {
        *self = Gain::Level(value.clamp(0.0, 1.0));
    }

    /// Whether a ramp is still in flight at `now`
    pub fn is_ramping(&self, now: Instant) -> bool {
        match self {
            Gain::Level(_) => false,
            Gain::Ramp(ramp) => !ramp.is_settled(now),
        }
    }
}

/// One playback slot: bound source, status, and gain
///
/// Identity is positional: the engine stores its two slots indexed by
/// [`SlotId::index`].
pub(crate) struct AudioSlot {
    pub(crate) source: Box<dyn AudioSource + Send>,
    pub(crate) status: SlotStatus,
    pub(crate) gain: Gain,
    /// Locator last bound, kept for restart-by-reload
    pub(crate) locator: Option<String>,
    pub(crate) duration_hint: Option<f64>,
}

impl AudioSlot {
    pub(crate) fn new(source: Box<dyn AudioSource + Send>, initial_gain: f32) -> Self {
        Self {
            source,
            status: SlotStatus::Empty,
            gain: Gain::Level(initial_gain.clamp(0.0, 1.0)),
            locator: None,
            duration_hint: None,
        }
    }

    /// Push the current gain value into the bound source
    pub(crate) fn apply_gain(&mut self, now: Instant) {
        let value = self.gain.value_at(now);
        self.source.set_volume(value);
    }

    /// Whether the slot holds a playable source
    pub(crate) fn is_playable(&self) -> bool {
        matches!(
            self.status,
            SlotStatus::Loaded | SlotStatus::Playing | SlotStatus::Paused
        )
    }

    /// Duration of the bound source, falling back to the catalog hint
    pub(crate) fn duration(&self) -> Option<f64> {
        self.source.duration().or(self.duration_hint)
    }
}

// ========================================
// Tests
// ========================================
