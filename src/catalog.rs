//! Track catalog
//!
//! An ordered, immutable list of tracks loaded once at startup from a TOML
//! file. The player core only ever reads it; indices into the catalog are
//! the currency of track selection.

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::Path;

/// One catalog entry
#[derive(Debug, Clone, Deserialize)]
pub struct Track {
    pub title: String,

    #[serde(default)]
    pub artist: String,

    /// Path or URL handed to the audio backend
    pub locator: String,

    /// Raw `[MM:SS]`-tagged lyric text, empty when none
    #[serde(default)]
    pub lyrics: String,

    /// Expected duration in seconds, used when the backend cannot probe one
    #[serde(default)]
    pub duration_hint: Option<f64>,
}

/// Ordered track list, immutable for the session
#[derive(Debug, Clone, Deserialize)]
pub struct Catalog {
    tracks: Vec<Track>,
}

impl Catalog {
    /// Load the catalog from a TOML file with `[[tracks]]` entries
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| Error::Catalog(format!("cannot read '{}': {}", path.display(), e)))?;
        let catalog: Catalog = toml::from_str(&raw)
            .map_err(|e| Error::Catalog(format!("cannot parse '{}': {}", path.display(), e)))?;
        catalog.ensure_non_empty()
    }

    /// Build a catalog from in-memory tracks
    pub fn from_tracks(tracks: Vec<Track>) -> Result<Self> {
        Catalog { tracks }.ensure_non_empty()
    }

    fn ensure_non_empty(self) -> Result<Self> {
        if self.tracks.is_empty() {
            return Err(Error::Catalog("catalog has no tracks".to_string()));
        }
        Ok(self)
    }

    pub fn get(&self, index: usize) -> Option<&Track> {
        self.tracks.get(index)
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Fold any index into catalog bounds
    pub fn wrap(&self, index: usize) -> usize {
        index % self.tracks.len()
    }
}

// ========================================
// Tests
// ========================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_from_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
            [[tracks]]
            title = "Umgane Wami"
            artist = "0teazy"
            locator = "music/umgane-wami.mp3"
            lyrics = "[00:00]Intro line"

            [[tracks]]
            title = "Peace Release"
            locator = "music/peace-release.mp3"
            duration_hint = 201.5
            "#
        )
        .unwrap();

        let catalog = Catalog::load(file.path()).unwrap();
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.get(0).unwrap().title, "Umgane Wami");
        assert_eq!(catalog.get(1).unwrap().artist, "");
        assert_eq!(catalog.get(1).unwrap().duration_hint, Some(201.5));
    }

    #[test]
    fn test_empty_catalog_rejected() {
        assert!(Catalog::from_tracks(vec![]).is_err());

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "tracks = []").unwrap();
        assert!(Catalog::load(file.path()).is_err());
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let err = Catalog::load(Path::new("/nonexistent/catalog.toml")).unwrap_err();
        assert!(matches!(err, Error::Catalog(_)));
    }

    #[test]
    fn test_wrap_folds_into_bounds() {
        let catalog = Catalog::from_tracks(vec![
            Track {
                title: "a".into(),
                artist: String::new(),
                locator: "a.mp3".into(),
                lyrics: String::new(),
                duration_hint: None,
            },
            Track {
                title: "b".into(),
                artist: String::new(),
                locator: "b.mp3".into(),
                lyrics: String::new(),
                duration_hint: None,
            },
        ])
        .unwrap();

        assert_eq!(catalog.wrap(0), 0);
        assert_eq!(catalog.wrap(2), 0);
        assert_eq!(catalog.wrap(5), 1);
    }
}
