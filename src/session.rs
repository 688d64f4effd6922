//! Playback session snapshot and persistence
//!
//! The session is the unit persisted across restarts: current track index,
//! position, play state, shuffle, repeat. It is written on every
//! state-affecting transition and on teardown, and restored at startup.
//! The store may be unavailable; every failure path degrades to "no prior
//! session" rather than surfacing an error.

use crate::db::settings::{get_setting, set_setting};
use serde::{Deserialize, Serialize};
use sqlx::{Pool, Sqlite};
use tracing::{debug, warn};

/// Settings key under which the serialized session lives
const SESSION_KEY: &str = "player_session";

/// Repeat mode, stored on the wire as 0 (off), 1 (one), 2 (all)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum RepeatMode {
    Off,
    One,
    All,
}

impl RepeatMode {
    /// Advance off -> one -> all -> off
    pub fn cycle(self) -> Self {
        match self {
            RepeatMode::Off => RepeatMode::One,
            RepeatMode::One => RepeatMode::All,
            RepeatMode::All => RepeatMode::Off,
        }
    }
}

impl Default for RepeatMode {
    fn default() -> Self {
        RepeatMode::Off
    }
}

impl From<RepeatMode> for u8 {
    fn from(mode: RepeatMode) -> u8 {
        match mode {
            RepeatMode::Off => 0,
            RepeatMode::One => 1,
            RepeatMode::All => 2,
        }
    }
}

impl TryFrom<u8> for RepeatMode {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(RepeatMode::Off),
            1 => Ok(RepeatMode::One),
            2 => Ok(RepeatMode::All),
            other => Err(format!("invalid repeat mode {}", other)),
        }
    }
}

/// Persisted playback session snapshot
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PlaybackSession {
    pub current_index: usize,
    pub position_seconds: f64,
    pub is_playing: bool,
    pub shuffle_enabled: bool,
    pub repeat_mode: RepeatMode,
}

impl PlaybackSession {
    /// Clamp the recovered index into catalog bounds
    ///
    /// A snapshot can outlive the catalog that produced it (tracks removed
    /// between runs); the index is pulled back to the last valid entry.
    pub fn clamped_to(mut self, catalog_len: usize) -> Self {
        if catalog_len == 0 {
            self.current_index = 0;
        } else if self.current_index >= catalog_len {
            self.current_index = catalog_len - 1;
        }
        if !self.position_seconds.is_finite() || self.position_seconds < 0.0 {
            self.position_seconds = 0.0;
        }
        self
    }
}

/// Session store over the settings table
///
/// Constructed `unavailable` when the database could not be opened; every
/// operation then degrades silently, matching a store that disappears at
/// runtime.
#[derive(Clone)]
pub struct SessionStore {
    pool: Option<Pool<Sqlite>>,
}

impl SessionStore {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool: Some(pool) }
    }

    /// A store that drops every save and restores nothing
    pub fn unavailable() -> Self {
        Self { pool: None }
    }

    pub fn is_available(&self) -> bool {
        self.pool.is_some()
    }

    /// Restore the persisted session, `None` when absent or malformed
    pub async fn load(&self) -> Option<PlaybackSession> {
        let pool = self.pool.as_ref()?;

        let raw = match get_setting::<String>(pool, SESSION_KEY).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!("Session restore skipped: {}", e);
                return None;
            }
        };

        match serde_json::from_str::<PlaybackSession>(&raw) {
            Ok(session) => Some(session),
            Err(e) => {
                warn!("Discarding malformed session snapshot: {}", e);
                None
            }
        }
    }

    /// Persist the session; failures are logged and the save skipped
    pub async fn save(&self, session: &PlaybackSession) {
        let Some(pool) = self.pool.as_ref() else {
            debug!("Session store unavailable; save skipped");
            return;
        };

        let raw = match serde_json::to_string(session) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Session serialization failed: {}", e);
                return;
            }
        };

        if let Err(e) = set_setting(pool, SESSION_KEY, raw).await {
            warn!("Session save skipped: {}", e);
        }
    }
}

// ========================================
// Tests
// ========================================
