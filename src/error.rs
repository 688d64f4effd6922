//! Error types for segue
//!
//! Defines the crate error taxonomy using thiserror. Environmental failures
//! (bad sources, blocked playback, unreachable settings store) are absorbed
//! close to where they occur and surfaced as events or observable state;
//! `Error` values returned from public operations indicate contract
//! violations or unrecoverable setup problems.

use crate::playback::slot::SlotId;
use thiserror::Error;

/// Main error type for segue
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration file loading errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Track catalog errors (missing file, empty catalog)
    #[error("Catalog error: {0}")]
    Catalog(String),

    /// Database connection or query errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Source binding failure (bad locator or undecodable data)
    #[error("Audio load error: {0}")]
    Load(String),

    /// Operation targeted the active slot where an inactive one is required
    #[error("Slot {0} is the active slot")]
    SlotActive(SlotId),

    /// Crossfade or swap requested into a slot with no playable source
    #[error("Slot {0} has no loaded source")]
    SlotNotLoaded(SlotId),

    /// Track index outside catalog bounds
    #[error("Track index {index} out of range (catalog has {len} tracks)")]
    TrackOutOfRange { index: usize, len: usize },

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Other errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Convenience Result type using the segue Error
pub type Result<T> = std::result::Result<T, Error>;
