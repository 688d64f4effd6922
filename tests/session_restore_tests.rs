//! Session persistence across player restarts
//!
//! Builds a player, drives it, then builds a fresh player over the same
//! settings store; the second player must come back where the first left
//! off, with malformed or missing snapshots degrading to defaults.

mod helpers;

use helpers::{player, player_with_store};
use segue::db::init::open_in_memory;
use segue::db::settings::set_setting;
use segue::playback::ControlState;
use segue::session::{PlaybackSession, RepeatMode, SessionStore};

#[tokio::test]
async fn restart_resumes_track_position_and_modes() {
    let (first, _, handle_b, store) = player(3).await;

    first.select_track(2, false).await.unwrap();
    first.toggle_shuffle().await;
    first.cycle_repeat().await; // one
    handle_b.set_position(37.5);
    first.pause().await; // persists with live position

    // "Restart": a new player over the same store.
    let (second, _, handle_b2) = player_with_store(3, store);
    second.restore().await.unwrap();

    let session = second.session().await;
    assert_eq!(session.current_index, 2);
    assert_eq!(session.position_seconds, 37.5);
    assert!(session.shuffle_enabled);
    assert_eq!(session.repeat_mode, RepeatMode::One);
    assert!(!session.is_playing);

    // Material reloaded at the stored position, paused.
    assert_eq!(handle_b2.locator().unwrap(), "track-2.mp3");
    assert_eq!(handle_b2.with(|s| s.position), 37.5);
    assert!(!handle_b2.is_playing());
}

#[tokio::test]
async fn restart_resumes_playback_when_it_was_playing() {
    let (first, _, _, store) = player(3).await;

    first.select_track(1, false).await.unwrap(); // persists as playing

    let (second, _, handle_b2) = player_with_store(3, store);
    second.restore().await.unwrap();

    assert!(second.session().await.is_playing);
    assert!(handle_b2.is_playing());
    assert_eq!(second.status().await.state, ControlState::Playing);
}

#[tokio::test]
async fn snapshot_index_clamps_when_catalog_shrinks() {
    let store = SessionStore::new(open_in_memory().await.unwrap());
    store
        .save(&PlaybackSession {
            current_index: 7,
            position_seconds: 12.0,
            is_playing: false,
            shuffle_enabled: false,
            repeat_mode: RepeatMode::All,
        })
        .await;

    let (player, _, _) = player_with_store(3, store);
    player.restore().await.unwrap();

    let session = player.session().await;
    assert_eq!(session.current_index, 2, "clamped to last valid index");
    assert_eq!(session.repeat_mode, RepeatMode::All);
}

#[tokio::test]
async fn malformed_snapshot_falls_back_to_defaults() {
    let pool = open_in_memory().await.unwrap();
    set_setting(&pool, "player_session", "][ not json").await.unwrap();

    let (player, _, handle_b) = player_with_store(3, SessionStore::new(pool));
    player.restore().await.unwrap();

    let status = player.status().await;
    assert_eq!(status.current_index, 0);
    assert_eq!(status.state, ControlState::Paused);
    assert!(!status.shuffle_enabled);
    assert_eq!(status.repeat_mode, RepeatMode::Off);
    assert_eq!(handle_b.locator().unwrap(), "track-0.mp3");
}

#[tokio::test]
async fn unavailable_store_still_plays() {
    let (player, _, handle_b) = player_with_store(3, SessionStore::unavailable());

    player.restore().await.unwrap();
    player.select_track(1, false).await.unwrap();
    player.toggle_shuffle().await;

    // Every save silently skipped; playback unaffected.
    assert!(handle_b.is_playing());
    assert!(player.session().await.shuffle_enabled);
}
