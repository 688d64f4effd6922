//! Shared test fixtures: a scriptable audio source and player builders

#![allow(dead_code)]

use segue::catalog::{Catalog, Track};
use segue::config::PlaybackConfig;
use segue::db::init::open_in_memory;
use segue::error::{Error, Result};
use segue::events::EventBus;
use segue::playback::{
    AudioSource, CrossfadeEngine, EngineConfig, PlayOutcome, PlayerController,
};
use segue::session::SessionStore;
use std::sync::{Arc, Mutex};

#[derive(Debug, Default)]
pub struct FakeState {
    pub locator: Option<String>,
    pub playing: bool,
    pub position: f64,
    pub duration: Option<f64>,
    pub volume: f32,
    pub ended: bool,
    pub loads: usize,
    pub seeks: Vec<f64>,
    pub fail_load: bool,
    pub block_play: bool,
    pub refuse_seek: bool,
}

/// Shared handle for scripting and inspecting a [`FakeSource`]
#[derive(Clone)]
pub struct FakeHandle(Arc<Mutex<FakeState>>);

impl FakeHandle {
    pub fn with<R>(&self, f: impl FnOnce(&mut FakeState) -> R) -> R {
        f(&mut self.0.lock().unwrap())
    }

    pub fn set_position(&self, seconds: f64) {
        self.with(|s| s.position = seconds);
    }

    pub fn mark_ended(&self) {
        self.with(|s| s.ended = true);
    }

    pub fn is_playing(&self) -> bool {
        self.with(|s| s.playing)
    }

    pub fn locator(&self) -> Option<String> {
        self.with(|s| s.locator.clone())
    }
}

pub struct FakeSource(Arc<Mutex<FakeState>>);

pub fn fake_pair() -> (FakeSource, FakeHandle) {
    let state = Arc::new(Mutex::new(FakeState {
        duration: Some(180.0),
        ..FakeState::default()
    }));
    (FakeSource(Arc::clone(&state)), FakeHandle(state))
}

impl AudioSource for FakeSource {
    fn load(&mut self, locator: &str) -> Result<()> {
        let mut s = self.0.lock().unwrap();
        s.loads += 1;
        if s.fail_load {
            return Err(Error::Load(format!(
                "scripted load failure for '{}'",
                locator
            )));
        }
        s.locator = Some(locator.to_string());
        s.position = 0.0;
        s.playing = false;
        s.ended = false;
        Ok(())
    }

    fn play(&mut self) -> PlayOutcome {
        let mut s = self.0.lock().unwrap();
        if s.block_play {
            s.playing = false;
            PlayOutcome::Blocked
        } else {
            s.playing = true;
            PlayOutcome::Started
        }
    }

    fn pause(&mut self) {
        self.0.lock().unwrap().playing = false;
    }

    fn seek(&mut self, seconds: f64) -> bool {
        let mut s = self.0.lock().unwrap();
        if s.refuse_seek {
            return false;
        }
        s.seeks.push(seconds);
        s.position = seconds.max(0.0);
        s.ended = false;
        true
    }

    fn set_volume(&mut self, volume: f32) {
        self.0.lock().unwrap().volume = volume.clamp(0.0, 1.0);
    }

    fn position(&self) -> f64 {
        self.0.lock().unwrap().position
    }

    fn duration(&self) -> Option<f64> {
        self.0.lock().unwrap().duration
    }

    fn ended(&self) -> bool {
        self.0.lock().unwrap().ended
    }
}

/// A small catalog; track 0 carries timestamped lyrics
pub fn catalog(len: usize) -> Arc<Catalog> {
    let tracks = (0..len)
        .map(|i| Track {
            title: format!("Track {}", i),
            artist: "0teazy".to_string(),
            locator: format!("track-{}.mp3", i),
            lyrics: if i == 0 {
                "[00:00]Intro line\n[00:12]First verse line".to_string()
            } else {
                String::new()
            },
            duration_hint: Some(180.0),
        })
        .collect();
    Arc::new(Catalog::from_tracks(tracks).unwrap())
}

/// Full player over fake sources and an in-memory settings store
pub async fn player(len: usize) -> (PlayerController, FakeHandle, FakeHandle, SessionStore) {
    let store = SessionStore::new(open_in_memory().await.unwrap());
    let (controller, handle_a, handle_b) = player_with_store(len, store.clone());
    (controller, handle_a, handle_b, store)
}

/// Player sharing an existing store (for restart scenarios)
pub fn player_with_store(
    len: usize,
    store: SessionStore,
) -> (PlayerController, FakeHandle, FakeHandle) {
    let bus = EventBus::new(256);
    let (source_a, handle_a) = fake_pair();
    let (source_b, handle_b) = fake_pair();
    let engine = CrossfadeEngine::new(
        [Box::new(source_a), Box::new(source_b)],
        bus.clone(),
        EngineConfig::default(),
    );
    let controller = PlayerController::new(
        engine,
        catalog(len),
        store,
        bus,
        PlaybackConfig::default(),
    );
    (controller, handle_a, handle_b)
}
