//! Playback state machine
//!
//! Top-level orchestrator: user intents come in, engine commands go out,
//! and every state-affecting transition lands in the session store. The
//! machine is in one of four states: Idle, Loading, Playing, Paused. A
//! crossfade is not a state here: the engine tracks it, and the machine
//! treats the destination track as logically current for its whole window.
//!
//! Sequencing rules:
//! - next: random-but-different under shuffle; sequential modulo catalog
//!   length otherwise, except that wrapping past the end with repeat off
//!   stops playback instead of silently looping.
//! - previous: restarts the current track when more than a few seconds in,
//!   otherwise steps back one, never with a crossfade, so back-skips snap.
//! - ended: repeat-one restarts in place; anything else follows `next`.
//! - load errors never auto-advance.

use crate::catalog::{Catalog, Track};
use crate::config::PlaybackConfig;
use crate::error::{Error, Result};
use crate::events::{EventBus, PlayerEvent};
use crate::lyrics::LyricTimeline;
use crate::playback::engine::{CrossfadeEngine, LoadOptions};
use crate::playback::slot::SlotId;
use crate::playback::source::PlayOutcome;
use crate::session::{PlaybackSession, RepeatMode, SessionStore};
use chrono::Utc;
use rand::Rng;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info, warn};

/// Machine state exposed to the control surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlState {
    Idle,
    Loading,
    Playing,
    Paused,
}

/// Point-in-time snapshot for the status endpoint
#[derive(Debug, Clone, Serialize)]
pub struct PlayerStatus {
    pub state: ControlState,
    pub current_index: usize,
    pub title: String,
    pub artist: String,
    pub position_seconds: f64,
    pub duration_seconds: Option<f64>,
    pub is_playing: bool,
    pub shuffle_enabled: bool,
    pub repeat_mode: RepeatMode,
    pub crossfade_active: bool,
    pub lyric_line: Option<usize>,
    pub lyric_text: Option<String>,
}

/// How a track change should be performed
#[derive(Debug, Clone, Copy)]
struct ChangeOptions {
    crossfade: bool,
    play: bool,
    preserve_position: bool,
    position_seconds: f64,
}

impl ChangeOptions {
    fn user_select(crossfade: bool) -> Self {
        Self {
            crossfade,
            play: true,
            preserve_position: false,
            position_seconds: 0.0,
        }
    }
}

/// Playback state machine over the crossfade engine
///
/// Cheap to clone; clones share all state.
#[derive(Clone)]
pub struct PlayerController {
    engine: CrossfadeEngine,
    catalog: Arc<Catalog>,
    store: SessionStore,
    bus: EventBus,
    config: PlaybackConfig,
    session: Arc<RwLock<PlaybackSession>>,
    state: Arc<RwLock<ControlState>>,
    timeline: Arc<RwLock<LyricTimeline>>,
    lyric_line: Arc<RwLock<Option<usize>>>,
    running: Arc<RwLock<bool>>,
}

impl PlayerController {
    pub fn new(
        engine: CrossfadeEngine,
        catalog: Arc<Catalog>,
        store: SessionStore,
        bus: EventBus,
        config: PlaybackConfig,
    ) -> Self {
        Self {
            engine,
            catalog,
            store,
            bus,
            config,
            session: Arc::new(RwLock::new(PlaybackSession::default())),
            state: Arc::new(RwLock::new(ControlState::Idle)),
            timeline: Arc::new(RwLock::new(LyricTimeline::empty())),
            lyric_line: Arc::new(RwLock::new(None)),
            running: Arc::new(RwLock::new(false)),
        }
    }

    /// Start the engine tick loop and the controller's event loop
    pub async fn start(&self) {
        {
            let mut running = self.running.write().await;
            if *running {
                return;
            }
            *running = true;
        }

        self.engine.start().await;

        let controller = self.clone();
        tokio::spawn(async move {
            let mut rx = controller.bus.subscribe();
            loop {
                if !*controller.running.read().await {
                    debug!("Controller event loop stopping");
                    break;
                }
                match rx.recv().await {
                    Ok(event) => controller.dispatch(event).await,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("Controller event loop lagged; {} events skipped", skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
    }

    /// Persist the session and silence the engine
    pub async fn shutdown(&self) {
        info!("Controller shutting down");
        *self.running.write().await = false;
        self.persist().await;
        self.engine.stop().await;
    }

    /// Restore the persisted session and load its track
    ///
    /// Missing or malformed snapshots fall back to track zero, paused. The
    /// recovered index is clamped into catalog bounds; playback resumes at
    /// the stored position when the snapshot said it was playing.
    pub async fn restore(&self) -> Result<()> {
        let stored = self.store.load().await;
        let had_snapshot = stored.is_some();
        let snapshot = stored.unwrap_or_default().clamped_to(self.catalog.len());

        {
            let mut session = self.session.write().await;
            session.shuffle_enabled = snapshot.shuffle_enabled;
            session.repeat_mode = snapshot.repeat_mode;
        }

        self.change_track(
            snapshot.current_index,
            ChangeOptions {
                crossfade: false,
                play: snapshot.is_playing,
                preserve_position: true,
                position_seconds: snapshot.position_seconds,
            },
        )
        .await?;

        if had_snapshot {
            info!(
                "Session restored: track {} at {:.1}s",
                snapshot.current_index, snapshot.position_seconds
            );
            self.bus.emit_lossy(PlayerEvent::SessionRestored {
                index: snapshot.current_index,
                position_seconds: snapshot.position_seconds,
                playing: snapshot.is_playing,
                timestamp: Utc::now(),
            });
        }
        Ok(())
    }

    // ----------------------------------------
    // User intents
    // ----------------------------------------

    /// Select a track by catalog index
    ///
    /// Selecting the track already playing reloads and restarts it; an
    /// explicit re-selection is a request to hear it from the top.
    pub async fn select_track(&self, index: usize, crossfade: bool) -> Result<bool> {
        if index >= self.catalog.len() {
            return Err(Error::TrackOutOfRange {
                index,
                len: self.catalog.len(),
            });
        }
        self.change_track(index, ChangeOptions::user_select(crossfade))
            .await
    }

    /// Start or resume playback
    pub async fn play(&self) -> PlayOutcome {
        let outcome = self.engine.play().await;
        let playing = outcome.is_playing();
        self.session.write().await.is_playing = playing;
        self.set_state(if playing {
            ControlState::Playing
        } else {
            ControlState::Paused
        })
        .await;
        self.persist().await;
        self.bus.emit_lossy(PlayerEvent::PlaybackStateChanged {
            playing,
            timestamp: Utc::now(),
        });
        outcome
    }

    /// Pause playback
    pub async fn pause(&self) {
        self.engine.pause().await;
        self.session.write().await.is_playing = false;
        self.set_state(ControlState::Paused).await;
        self.persist().await;
        self.bus.emit_lossy(PlayerEvent::PlaybackStateChanged {
            playing: false,
            timestamp: Utc::now(),
        });
    }

    /// Advance to the next track
    ///
    /// Wrapping past the last track with repeat off stops playback instead
    /// of looping; every other advance plays with a crossfade.
    pub async fn next_track(&self) -> Result<()> {
        let (next, stop) = {
            let session = self.session.read().await;
            self.pick_next(&session)
        };

        if stop {
            debug!("End of catalog with repeat off; stopping");
            self.pause().await;
            return Ok(());
        }

        self.change_track(next, ChangeOptions::user_select(true))
            .await?;
        Ok(())
    }

    /// Step to the previous track, or restart the current one
    ///
    /// More than a few seconds in, a back-press means "from the top" and
    /// only rewinds. Otherwise it moves to the previous index, without a
    /// crossfade, so back-skips feel immediate.
    pub async fn prev_track(&self) -> Result<()> {
        if self.engine.position().await > self.config.restart_window_seconds {
            self.engine.seek_to(0.0).await;
            self.session.write().await.position_seconds = 0.0;
            debug!("Restarting current track from the top");
            return Ok(());
        }

        let prev = {
            let session = self.session.read().await;
            let len = self.catalog.len();
            if session.shuffle_enabled {
                self.random_other(session.current_index, len)
            } else {
                (session.current_index + len - 1) % len
            }
        };

        self.change_track(prev, ChangeOptions::user_select(false))
            .await?;
        Ok(())
    }

    /// Seek the current track to a percentage of its duration
    pub async fn seek_to_percent(&self, percent: f64) -> Result<()> {
        let Some(duration) = self.engine.duration().await else {
            debug!("Seek ignored: duration unknown");
            return Ok(());
        };

        let target = duration * percent.clamp(0.0, 100.0) / 100.0;
        if self.engine.seek_to(target).await {
            self.session.write().await.position_seconds = target;
            self.persist().await;
        }
        Ok(())
    }

    /// Toggle shuffle
    pub async fn toggle_shuffle(&self) -> bool {
        let enabled = {
            let mut session = self.session.write().await;
            session.shuffle_enabled = !session.shuffle_enabled;
            session.shuffle_enabled
        };
        self.persist().await;
        self.bus.emit_lossy(PlayerEvent::ShuffleChanged {
            enabled,
            timestamp: Utc::now(),
        });
        enabled
    }

    /// Cycle repeat off -> one -> all -> off
    pub async fn cycle_repeat(&self) -> RepeatMode {
        let mode = {
            let mut session = self.session.write().await;
            session.repeat_mode = session.repeat_mode.cycle();
            session.repeat_mode
        };
        self.persist().await;
        self.bus.emit_lossy(PlayerEvent::RepeatChanged {
            mode,
            timestamp: Utc::now(),
        });
        mode
    }

    // ----------------------------------------
    // Engine event reactions
    // ----------------------------------------

    /// Active slot finished its material
    pub async fn on_ended(&self) -> Result<()> {
        let repeat = self.session.read().await.repeat_mode;

        if repeat == RepeatMode::One {
            debug!("Repeat one: restarting current track");
            let outcome = self.engine.restart_active().await;
            self.session.write().await.position_seconds = 0.0;
            if !outcome.is_playing() {
                warn!("Repeat-one restart did not resume playback");
            }
            return Ok(());
        }

        self.next_track().await
    }

    /// A slot load failed; stay put and leave the error surfaced
    pub async fn on_load_error(&self, slot: SlotId, message: &str) {
        warn!("Load error on slot {} surfaced: {}", slot, message);
    }

    /// Position report from the engine: track session position, sync lyrics
    pub async fn on_time_update(&self, position: f64) {
        self.session.write().await.position_seconds = position;

        let line = self.timeline.read().await.current_line(position);
        let changed = {
            let mut current = self.lyric_line.write().await;
            if *current != line {
                *current = line;
                true
            } else {
                false
            }
        };

        if changed {
            let text = match line {
                Some(index) => self
                    .timeline
                    .read()
                    .await
                    .get(index)
                    .map(|l| l.text.clone()),
                None => None,
            };
            self.bus.emit_lossy(PlayerEvent::LyricLineChanged {
                line,
                text,
                timestamp: Utc::now(),
            });
        }
    }

    // ----------------------------------------
    // Read accessors
    // ----------------------------------------

    /// Snapshot for the control surface
    pub async fn status(&self) -> PlayerStatus {
        let session = self.session.read().await.clone();
        let track = self.catalog.get(session.current_index);
        let lyric_line = *self.lyric_line.read().await;
        let lyric_text = match lyric_line {
            Some(index) => self
                .timeline
                .read()
                .await
                .get(index)
                .map(|l| l.text.clone()),
            None => None,
        };

        PlayerStatus {
            state: *self.state.read().await,
            current_index: session.current_index,
            title: track.map(|t| t.title.clone()).unwrap_or_default(),
            artist: track.map(|t| t.artist.clone()).unwrap_or_default(),
            position_seconds: self.engine.position().await,
            duration_seconds: self.engine.duration().await,
            is_playing: self.engine.is_playing().await,
            shuffle_enabled: session.shuffle_enabled,
            repeat_mode: session.repeat_mode,
            crossfade_active: self.engine.crossfade_in_progress().await,
            lyric_line,
            lyric_text,
        }
    }

    /// Current session snapshot
    pub async fn session(&self) -> PlaybackSession {
        self.session.read().await.clone()
    }

    /// Subscribe to the player event stream
    pub fn subscribe_events(&self) -> broadcast::Receiver<PlayerEvent> {
        self.bus.subscribe()
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    // ----------------------------------------
    // Internals
    // ----------------------------------------

    async fn dispatch(&self, event: PlayerEvent) {
        match event {
            PlayerEvent::TimeUpdate { position, .. } => self.on_time_update(position).await,
            PlayerEvent::Ended { .. } => {
                if let Err(e) = self.on_ended().await {
                    warn!("End-of-track transition failed: {}", e);
                }
            }
            PlayerEvent::LoadError { slot, message, .. } => {
                self.on_load_error(slot, &message).await;
            }
            _ => {}
        }
    }

    /// Load `index` into the standby slot and hand audibility over
    ///
    /// Returns `Ok(false)` when the load failed: the machine stays on its
    /// current material and the error has already been surfaced as an event.
    async fn change_track(&self, index: usize, options: ChangeOptions) -> Result<bool> {
        let track = self
            .catalog
            .get(index)
            .ok_or(Error::TrackOutOfRange {
                index,
                len: self.catalog.len(),
            })?
            .clone();

        let previous_state = *self.state.read().await;
        self.set_state(ControlState::Loading).await;

        // A fade still in its window would leave no free standby slot;
        // resolve it now and fade from its destination instead.
        self.engine.settle_crossfade().await;

        let was_playing = self.engine.is_playing().await;
        let target = self.engine.standby_slot().await;
        let loaded = self
            .engine
            .load_into(
                target,
                &track.locator,
                LoadOptions {
                    preserve_position: options.preserve_position,
                    position_seconds: options.position_seconds,
                    duration_hint: track.duration_hint,
                },
            )
            .await?;

        if !loaded {
            // Stay on current material; the LoadError event is the report.
            self.set_state(previous_state).await;
            return Ok(false);
        }

        self.rebuild_timeline(&track).await;

        let fade = options.crossfade && was_playing && !self.config.crossfade().is_zero();
        if fade {
            self.engine.crossfade_to(target, self.config.crossfade()).await?;
        } else {
            self.engine.swap_immediate(target).await?;
        }

        let playing = if options.play || was_playing {
            self.engine.play().await.is_playing()
        } else {
            false
        };

        {
            let mut session = self.session.write().await;
            session.current_index = index;
            session.position_seconds = if options.preserve_position {
                options.position_seconds
            } else {
                0.0
            };
            session.is_playing = playing;
        }
        *self.lyric_line.write().await = None;
        self.set_state(if playing {
            ControlState::Playing
        } else {
            ControlState::Paused
        })
        .await;

        self.persist().await;
        info!("Track {} current: {}", index, track.title);
        self.bus.emit_lossy(PlayerEvent::TrackChanged {
            index,
            title: track.title.clone(),
            timestamp: Utc::now(),
        });

        Ok(true)
    }

    /// Decide the next index; `true` in the second slot means stop instead
    fn pick_next(&self, session: &PlaybackSession) -> (usize, bool) {
        let len = self.catalog.len();
        if session.shuffle_enabled {
            return (self.random_other(session.current_index, len), false);
        }

        let next = (session.current_index + 1) % len;
        if next == 0 && session.repeat_mode == RepeatMode::Off {
            return (0, true);
        }
        (next, false)
    }

    /// Uniform random index different from `current` (same index for a
    /// single-track catalog)
    fn random_other(&self, current: usize, len: usize) -> usize {
        if len <= 1 {
            return current;
        }
        let mut rng = rand::thread_rng();
        loop {
            let candidate = rng.gen_range(0..len);
            if candidate != current {
                return candidate;
            }
        }
    }

    async fn rebuild_timeline(&self, track: &Track) {
        let timeline = LyricTimeline::parse(&track.lyrics);
        if timeline.is_empty() && !track.lyrics.trim().is_empty() {
            debug!("Track '{}' lyrics carry no timestamps", track.title);
        }
        *self.timeline.write().await = timeline;
    }

    async fn set_state(&self, state: ControlState) {
        *self.state.write().await = state;
    }

    /// Persist the session with the engine's live position folded in
    async fn persist(&self) {
        let snapshot = {
            let mut session = self.session.write().await;
            session.position_seconds = self.engine.position().await;
            session.clone()
        };
        self.store.save(&snapshot).await;
    }
}

// ========================================
// Tests
// ========================================
