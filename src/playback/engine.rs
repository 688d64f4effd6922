//! Crossfading dual-slot engine
//!
//! Owns exactly two playback slots. One is the active slot, the source of
//! truth for position and lyric sync, while the other stands by for the
//! next track. `crossfade_to` exchanges gain between them with linear ramps
//! and schedules a deferred completion that pauses the outgoing slot and
//! flips the active designation.
//!
//! # Scheduling discipline
//!
//! At most one completion task exists at any time. Every command that would
//! conflict with it (another crossfade, an immediate swap, reloading the
//! fade target, pausing) cancels it first: the task handle is aborted and
//! the generation counter bumped, so even a completion already past its
//! timer is discarded when it reaches the engine. Two completions can never
//! both flip the active slot.
//!
//! # Failure discipline
//!
//! Environmental failures never cross the public surface as errors: a bad
//! source marks its slot errored and emits `LoadError`, a refused playback
//! start resolves to `PlayOutcome::Blocked`, a refused seek is dropped.
//! `Err` returns are reserved for contract violations: operating on the
//! active slot where an inactive one is required, or fading to a slot with
//! nothing loaded.

use crate::error::{Error, Result};
use crate::events::{EventBus, PlayerEvent};
use crate::playback::slot::{AudioSlot, SlotId, SlotStatus};
use crate::playback::source::{AudioSource, PlayOutcome};
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep, Duration, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Options for [`CrossfadeEngine::load_into`]
#[derive(Debug, Clone, Copy, Default)]
pub struct LoadOptions {
    /// Seek to `position_seconds` after binding (best-effort)
    pub preserve_position: bool,
    pub position_seconds: f64,
    /// Expected duration when the backend cannot probe one
    pub duration_hint: Option<f64>,
}

/// Engine timing configuration
#[derive(Debug, Clone, Copy)]
pub struct EngineConfig {
    /// Margin between the gain ramps settling and the slot swap firing
    pub swap_margin: Duration,
    /// Poll interval for position and end-of-track detection
    pub tick_interval: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            swap_margin: Duration::from_millis(50),
            tick_interval: Duration::from_millis(200),
        }
    }
}

/// The single outstanding crossfade completion
struct PendingSwap {
    operation_id: Uuid,
    target: SlotId,
    generation: u64,
    handle: JoinHandle<()>,
}

struct EngineInner {
    slots: [AudioSlot; 2],
    active: SlotId,
    pending: Option<PendingSwap>,
    /// Bumped on every preemption; stale completions compare against it
    generation: u64,
    running: bool,
}

impl EngineInner {
    fn slot(&self, id: SlotId) -> &AudioSlot {
        &self.slots[id.index()]
    }

    fn slot_mut(&mut self, id: SlotId) -> &mut AudioSlot {
        &mut self.slots[id.index()]
    }

    /// Slot that position, duration, and time updates are read from
    ///
    /// Normally the active slot. During a crossfade window the destination
    /// is already logically current, so reads follow it and the fading-out
    /// slot's notifications are suppressed.
    fn reporting_slot(&self) -> SlotId {
        self.pending
            .as_ref()
            .map(|p| p.target)
            .unwrap_or(self.active)
    }

    /// Abort and discard any pending completion; always bumps the generation
    fn cancel_pending(&mut self, bus: &EventBus) {
        self.generation += 1;
        if let Some(pending) = self.pending.take() {
            pending.handle.abort();
            debug!("Crossfade {} cancelled", pending.operation_id);
            bus.emit_lossy(PlayerEvent::CrossfadeCancelled {
                operation_id: pending.operation_id,
                timestamp: Utc::now(),
            });
        }
    }

    /// Resolve a pending crossfade right now: the timer is discarded and the
    /// destination becomes active immediately
    fn settle_pending(&mut self, bus: &EventBus) {
        let Some(pending) = self.pending.take() else {
            return;
        };
        pending.handle.abort();
        self.generation += 1;
        let target = pending.target;
        self.finish_swap(target, Instant::now());
        debug!(
            "Crossfade {} settled early; slot {} active",
            pending.operation_id, target
        );
        bus.emit_lossy(PlayerEvent::CrossfadeCompleted {
            operation_id: pending.operation_id,
            active: target,
            timestamp: Utc::now(),
        });
    }

    /// Pause the outgoing slot, snap gains to rest, flip active to `target`
    fn finish_swap(&mut self, target: SlotId, now: Instant) {
        let old = self.active;
        {
            let old_slot = self.slot_mut(old);
            old_slot.source.pause();
            if old_slot.status == SlotStatus::Playing {
                old_slot.status = SlotStatus::Paused;
            }
            old_slot.gain.snap(0.0);
            old_slot.apply_gain(now);
        }

        self.active = target;
        let new_slot = self.slot_mut(target);
        new_slot.gain.snap(1.0);
        new_slot.apply_gain(now);
    }
}

/// Dual-slot engine with crossfade scheduling
///
/// Cheap to clone: clones share the same slots and pending state.
#[derive(Clone)]
pub struct CrossfadeEngine {
    inner: Arc<RwLock<EngineInner>>,
    bus: EventBus,
    config: EngineConfig,
}

impl CrossfadeEngine {
    /// Create an engine over two platform sources
    ///
    /// Slot `a` starts active at gain 1, slot `b` standby at gain 0.
    pub fn new(
        sources: [Box<dyn AudioSource + Send>; 2],
        bus: EventBus,
        config: EngineConfig,
    ) -> Self {
        let [source_a, source_b] = sources;
        let inner = EngineInner {
            slots: [
                AudioSlot::new(source_a, 1.0),
                AudioSlot::new(source_b, 0.0),
            ],
            active: SlotId::A,
            pending: None,
            generation: 0,
            running: false,
        };

        Self {
            inner: Arc::new(RwLock::new(inner)),
            bus,
            config,
        }
    }

    /// Start the background tick loop
    pub async fn start(&self) {
        {
            let mut inner = self.inner.write().await;
            if inner.running {
                return;
            }
            inner.running = true;
        }

        let engine = self.clone();
        tokio::spawn(async move {
            let mut tick = interval(engine.config.tick_interval);
            loop {
                tick.tick().await;
                if !engine.inner.read().await.running {
                    debug!("Engine tick loop stopping");
                    break;
                }
                engine.tick().await;
            }
        });
    }

    /// Stop the tick loop, cancel any pending swap, silence both slots
    pub async fn stop(&self) {
        let mut inner = self.inner.write().await;
        inner.running = false;
        inner.cancel_pending(&self.bus);
        for slot in &mut inner.slots {
            slot.source.pause();
            if slot.status == SlotStatus::Playing {
                slot.status = SlotStatus::Paused;
            }
        }
    }

    /// Bind a track to an inactive slot
    ///
    /// Returns `Ok(true)` when the slot is ready, `Ok(false)` when the load
    /// failed (slot errored, `LoadError` emitted). Loading into the active
    /// slot is a contract violation.
    pub async fn load_into(
        &self,
        slot: SlotId,
        locator: &str,
        options: LoadOptions,
    ) -> Result<bool> {
        let mut inner = self.inner.write().await;
        if slot == inner.active {
            return Err(Error::SlotActive(slot));
        }

        // Replacing the material of an in-flight fade target preempts the fade.
        if inner.pending.as_ref().map(|p| p.target) == Some(slot) {
            inner.cancel_pending(&self.bus);
        }

        let slot_ref = inner.slot_mut(slot);
        match slot_ref.source.load(locator) {
            Ok(()) => {
                slot_ref.status = SlotStatus::Loaded;
                slot_ref.locator = Some(locator.to_string());
                slot_ref.duration_hint = options.duration_hint;
                if options.preserve_position && options.position_seconds > 0.0 {
                    if !slot_ref.source.seek(options.position_seconds) {
                        debug!(
                            "Seek to {:.1}s refused on slot {}; starting from zero",
                            options.position_seconds, slot
                        );
                    }
                }
                debug!("Slot {} loaded: {}", slot, locator);
                Ok(true)
            }
            Err(e) => {
                slot_ref.status = SlotStatus::Errored;
                slot_ref.locator = None;
                warn!("Load into slot {} failed: {}", slot, e);
                self.bus.emit_lossy(PlayerEvent::LoadError {
                    slot,
                    message: e.to_string(),
                    timestamp: Utc::now(),
                });
                Ok(false)
            }
        }
    }

    /// Start audible playback of the current slot
    pub async fn play(&self) -> PlayOutcome {
        let mut inner = self.inner.write().await;
        let slot_id = inner.reporting_slot();
        let slot = inner.slot_mut(slot_id);
        if !slot.is_playable() {
            return PlayOutcome::Blocked;
        }
        let outcome = slot.source.play();
        slot.status = if outcome.is_playing() {
            SlotStatus::Playing
        } else {
            SlotStatus::Paused
        };
        outcome
    }

    /// Pause playback
    ///
    /// A pause during a crossfade window resolves the fade immediately (the
    /// pause is authoritative): the pending completion is consumed, the
    /// destination becomes active, then everything stops.
    pub async fn pause(&self) {
        let mut inner = self.inner.write().await;
        inner.settle_pending(&self.bus);
        let active = inner.active;
        let slot = inner.slot_mut(active);
        slot.source.pause();
        if slot.status == SlotStatus::Playing {
            slot.status = SlotStatus::Paused;
        }
    }

    /// Restart the current slot's material from zero
    ///
    /// Seeks when the source allows it; otherwise rebinds the remembered
    /// locator (an exhausted source may refuse to rewind).
    pub async fn restart_active(&self) -> PlayOutcome {
        let mut inner = self.inner.write().await;
        let slot_id = inner.reporting_slot();
        let slot = inner.slot_mut(slot_id);

        if !slot.source.seek(0.0) {
            let Some(locator) = slot.locator.clone() else {
                return PlayOutcome::Blocked;
            };
            if let Err(e) = slot.source.load(&locator) {
                slot.status = SlotStatus::Errored;
                warn!("Restart reload of slot {} failed: {}", slot_id, e);
                self.bus.emit_lossy(PlayerEvent::LoadError {
                    slot: slot_id,
                    message: e.to_string(),
                    timestamp: Utc::now(),
                });
                return PlayOutcome::Blocked;
            }
        }

        let outcome = slot.source.play();
        slot.status = if outcome.is_playing() {
            SlotStatus::Playing
        } else {
            SlotStatus::Paused
        };
        outcome
    }

    /// Resolve any pending crossfade immediately
    ///
    /// Used before a command that needs a free standby slot while a fade is
    /// still in its window: the destination becomes active now, the timer is
    /// discarded, and the outgoing slot falls silent.
    pub async fn settle_crossfade(&self) {
        let mut inner = self.inner.write().await;
        inner.settle_pending(&self.bus);
    }

    /// Set a slot's gain, immediately or as a linear ramp
    pub async fn set_gain(&self, slot: SlotId, value: f32, ramp: Option<Duration>) {
        let now = Instant::now();
        let mut inner = self.inner.write().await;
        let slot_ref = inner.slot_mut(slot);
        slot_ref.gain.set(value, ramp, now);
        slot_ref.apply_gain(now);
    }

    /// Best-effort seek on the current slot; refusal is reported, not fatal
    pub async fn seek_to(&self, seconds: f64) -> bool {
        let mut inner = self.inner.write().await;
        let slot_id = inner.reporting_slot();
        inner.slot_mut(slot_id).source.seek(seconds.max(0.0))
    }

    /// Synchronously hand audibility to `target` without a fade
    ///
    /// The previous active slot is paused and silenced; `target` rests at
    /// gain 1 but is not started; the caller decides whether to play.
    pub async fn swap_immediate(&self, target: SlotId) -> Result<()> {
        let mut inner = self.inner.write().await;
        if target == inner.active {
            return Err(Error::SlotActive(target));
        }
        if !inner.slot(target).is_playable() {
            return Err(Error::SlotNotLoaded(target));
        }

        inner.cancel_pending(&self.bus);
        inner.finish_swap(target, Instant::now());
        debug!("Immediate swap to slot {}", target);
        Ok(())
    }

    /// Begin a crossfade to `target` over `duration`
    ///
    /// `target` must already be loaded and inactive. Both ramps start from
    /// each slot's live gain value, so a crossfade issued mid-fade bends the
    /// curves instead of stepping them. The returned outcome reports whether
    /// the destination actually started playing.
    pub async fn crossfade_to(&self, target: SlotId, duration: Duration) -> Result<PlayOutcome> {
        let now = Instant::now();
        let mut inner = self.inner.write().await;
        if target == inner.active {
            return Err(Error::SlotActive(target));
        }
        if !inner.slot(target).is_playable() {
            return Err(Error::SlotNotLoaded(target));
        }

        inner.cancel_pending(&self.bus);
        let from = inner.active;

        // Incoming first, so both slots are audible through the ramp.
        let target_slot = inner.slot_mut(target);
        let outcome = target_slot.source.play();
        target_slot.status = if outcome.is_playing() {
            SlotStatus::Playing
        } else {
            SlotStatus::Paused
        };
        target_slot.gain.set(1.0, Some(duration), now);
        target_slot.apply_gain(now);

        let from_slot = inner.slot_mut(from);
        from_slot.gain.set(0.0, Some(duration), now);
        from_slot.apply_gain(now);

        let operation_id = Uuid::new_v4();
        let generation = inner.generation;
        info!(
            "Crossfade {} started: {} -> {} over {:.0?}",
            operation_id, from, target, duration
        );
        self.bus.emit_lossy(PlayerEvent::CrossfadeStarted {
            operation_id,
            from,
            to: target,
            duration_seconds: duration.as_secs_f64(),
            timestamp: Utc::now(),
        });

        let engine = self.clone();
        let delay = duration + self.config.swap_margin;
        let handle = tokio::spawn(async move {
            sleep(delay).await;
            engine.complete_crossfade(generation).await;
        });
        inner.pending = Some(PendingSwap {
            operation_id,
            target,
            generation,
            handle,
        });

        Ok(outcome)
    }

    /// Deferred completion body; discards itself when preempted
    async fn complete_crossfade(&self, generation: u64) {
        let mut inner = self.inner.write().await;
        let Some(pending) = inner.pending.take_if(|p| p.generation == generation) else {
            debug!("Stale crossfade completion discarded");
            return;
        };

        inner.finish_swap(pending.target, Instant::now());
        info!(
            "Crossfade {} completed; slot {} active",
            pending.operation_id, pending.target
        );
        self.bus.emit_lossy(PlayerEvent::CrossfadeCompleted {
            operation_id: pending.operation_id,
            active: pending.target,
            timestamp: Utc::now(),
        });
    }

    /// One engine poll: push ramped gains, report position, detect end
    ///
    /// Driven by the background loop started in [`start`](Self::start);
    /// callable directly for deterministic tests.
    pub async fn tick(&self) {
        let now = Instant::now();
        let mut inner = self.inner.write().await;

        for slot in &mut inner.slots {
            slot.apply_gain(now);
        }

        let slot_id = inner.reporting_slot();
        let slot = inner.slot_mut(slot_id);
        if slot.status != SlotStatus::Playing {
            return;
        }

        let position = slot.source.position();
        let duration = slot.duration();
        self.bus.emit_lossy(PlayerEvent::TimeUpdate {
            position,
            duration,
            timestamp: Utc::now(),
        });

        if slot.source.ended() {
            slot.source.pause();
            slot.status = SlotStatus::Paused;
            debug!("Slot {} reached end of material", slot_id);
            self.bus.emit_lossy(PlayerEvent::Ended {
                timestamp: Utc::now(),
            });
        }
    }

    // ----------------------------------------
    // Read accessors
    // ----------------------------------------

    /// The designated active slot (the fade source during a crossfade window)
    pub async fn active_slot(&self) -> SlotId {
        self.inner.read().await.active
    }

    /// The slot a new track should be loaded into
    pub async fn standby_slot(&self) -> SlotId {
        let inner = self.inner.read().await;
        inner.reporting_slot().other()
    }

    /// Position of the logically current slot, in seconds
    pub async fn position(&self) -> f64 {
        let inner = self.inner.read().await;
        inner.slot(inner.reporting_slot()).source.position()
    }

    /// Duration of the logically current slot's material
    pub async fn duration(&self) -> Option<f64> {
        let inner = self.inner.read().await;
        inner.slot(inner.reporting_slot()).duration()
    }

    /// Whether the logically current slot is audibly playing
    pub async fn is_playing(&self) -> bool {
        let inner = self.inner.read().await;
        inner.slot(inner.reporting_slot()).status == SlotStatus::Playing
    }

    /// Whether a crossfade completion is still pending
    pub async fn crossfade_in_progress(&self) -> bool {
        self.inner.read().await.pending.is_some()
    }

    pub async fn slot_status(&self, slot: SlotId) -> SlotStatus {
        self.inner.read().await.slot(slot).status
    }

    /// Live gain value of a slot
    pub async fn gain(&self, slot: SlotId) -> f32 {
        let now = Instant::now();
        self.inner.read().await.slot(slot).gain.value_at(now)
    }
}

// ========================================
// Tests
// ========================================
