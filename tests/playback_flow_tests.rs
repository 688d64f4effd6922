//! End-to-end playback flows through the public API
//!
//! Exercises the state machine and the crossfade engine together: track
//! sequencing, crossfade lifecycle, end-of-track transitions, and lyric
//! sync, all against scriptable fake sources.

mod helpers;

use helpers::{player, player_with_store};
use segue::events::PlayerEvent;
use segue::playback::ControlState;
use segue::session::{RepeatMode, SessionStore};
use tokio::time::Duration;

/// Let spawned timer tasks run after the paused clock moved
async fn settle() {
    for _ in 0..5 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test(start_paused = true)]
async fn crossfade_between_tracks_completes_cleanly() {
    // No settings store here: a database round-trip inside select would park
    // the paused runtime and auto-advance straight past the fade window.
    let (controller, handle_a, handle_b) = player_with_store(3, SessionStore::unavailable());
    let mut rx = controller.subscribe_events();

    controller.select_track(0, false).await.unwrap();
    assert!(handle_b.is_playing(), "first select plays from the standby slot");

    controller.select_track(1, true).await.unwrap();
    assert!(
        controller.status().await.crossfade_active,
        "second select crossfades"
    );
    assert!(handle_a.is_playing(), "incoming slot audible");
    assert!(handle_b.is_playing(), "outgoing slot still audible mid-fade");

    // Poll the spawned completion task so its timer arms against the paused
    // clock before we advance virtual time past the fade window.
    settle().await;

    tokio::time::advance(Duration::from_millis(1100)).await;
    settle().await;

    let status = controller.status().await;
    assert!(!status.crossfade_active, "no completion task remains");
    assert_eq!(status.current_index, 1);
    assert!(handle_a.is_playing());
    assert!(!handle_b.is_playing(), "outgoing slot paused after completion");

    let mut kinds = Vec::new();
    while let Ok(event) = rx.try_recv() {
        kinds.push(event.kind().to_string());
    }
    assert!(kinds.contains(&"CrossfadeStarted".to_string()));
    assert!(kinds.contains(&"CrossfadeCompleted".to_string()));
}

#[tokio::test]
async fn sequential_next_walks_the_catalog() {
    let (controller, _, _, _) = player(3).await;

    controller.select_track(0, false).await.unwrap();
    controller.next_track().await.unwrap();
    assert_eq!(controller.session().await.current_index, 1);
    controller.next_track().await.unwrap();
    assert_eq!(controller.session().await.current_index, 2);
}

#[tokio::test]
async fn end_of_catalog_stops_without_wrapping() {
    let (controller, _, _, _) = player(3).await;

    controller.select_track(2, false).await.unwrap();
    controller.next_track().await.unwrap();

    let status = controller.status().await;
    assert_eq!(status.current_index, 2);
    assert!(!status.is_playing);
    assert_eq!(status.state, ControlState::Paused);
}

#[tokio::test]
async fn repeat_all_wraps_past_the_end() {
    let (controller, _, _, _) = player(3).await;

    controller.cycle_repeat().await;
    controller.cycle_repeat().await;
    assert_eq!(controller.session().await.repeat_mode, RepeatMode::All);

    controller.select_track(2, false).await.unwrap();
    controller.next_track().await.unwrap();

    let status = controller.status().await;
    assert_eq!(status.current_index, 0);
    assert!(status.is_playing);
}

#[tokio::test]
async fn ended_with_repeat_one_restarts_in_place() {
    let (controller, _, handle_b, _) = player(3).await;

    controller.select_track(1, false).await.unwrap();
    controller.cycle_repeat().await; // one
    handle_b.set_position(178.0);

    controller.on_ended().await.unwrap();

    let session = controller.session().await;
    assert_eq!(session.current_index, 1);
    assert_eq!(session.position_seconds, 0.0);
    assert!(session.is_playing);
    assert!(handle_b.is_playing());
}

#[tokio::test]
async fn previous_restarts_or_steps_back_on_the_window() {
    let (controller, _, handle_b, _) = player(3).await;

    controller.select_track(1, false).await.unwrap();

    // Past the window: rewind in place.
    handle_b.set_position(5.0);
    controller.prev_track().await.unwrap();
    assert_eq!(controller.session().await.current_index, 1);
    assert_eq!(handle_b.with(|s| s.position), 0.0);

    // Inside the window: step back a track.
    handle_b.set_position(1.0);
    controller.prev_track().await.unwrap();
    assert_eq!(controller.session().await.current_index, 0);
}

#[tokio::test]
async fn lyric_line_tracks_position_both_directions() {
    let (controller, _, _, _) = player(3).await;

    // Track 0 lyrics: 0s "Intro line", 12s "First verse line".
    controller.select_track(0, false).await.unwrap();

    controller.on_time_update(3.0).await;
    assert_eq!(controller.status().await.lyric_text.as_deref(), Some("Intro line"));

    controller.on_time_update(20.0).await;
    assert_eq!(
        controller.status().await.lyric_text.as_deref(),
        Some("First verse line")
    );

    // Backward seek re-resolves with no cursor to unwind.
    controller.on_time_update(3.0).await;
    assert_eq!(controller.status().await.lyric_text.as_deref(), Some("Intro line"));
}

#[tokio::test]
async fn blocked_playback_is_observable_not_fatal() {
    let (controller, _, handle_b, _) = player(3).await;
    handle_b.with(|s| s.block_play = true);

    controller.select_track(1, false).await.unwrap();

    let status = controller.status().await;
    assert!(!status.is_playing);
    assert_eq!(status.state, ControlState::Paused);
}

#[tokio::test]
async fn load_failure_keeps_current_track_and_emits_event() {
    let (controller, handle_a, _, _) = player(3).await;
    let mut rx = controller.subscribe_events();

    controller.select_track(0, false).await.unwrap();
    handle_a.with(|s| s.fail_load = true);

    let selected = controller.select_track(1, false).await.unwrap();
    assert!(!selected);
    assert_eq!(controller.session().await.current_index, 0);

    let mut saw_load_error = false;
    while let Ok(event) = rx.try_recv() {
        if matches!(event, PlayerEvent::LoadError { .. }) {
            saw_load_error = true;
        }
    }
    assert!(saw_load_error);
}

#[tokio::test(start_paused = true)]
async fn engine_loop_drives_time_and_end_transitions() {
    let (controller, _, handle_b) = player_with_store(3, SessionStore::unavailable());
    controller.start().await;

    controller.select_track(0, false).await.unwrap();
    handle_b.set_position(42.0);

    // One tick interval: a TimeUpdate flows through the controller into the
    // session position.
    tokio::time::advance(Duration::from_millis(250)).await;
    settle().await;
    assert_eq!(controller.session().await.position_seconds, 42.0);

    // Material runs out: the event loop advances to the next track.
    handle_b.mark_ended();
    tokio::time::advance(Duration::from_millis(250)).await;
    settle().await;
    tokio::time::advance(Duration::from_millis(250)).await;
    settle().await;

    assert_eq!(controller.session().await.current_index, 1);
    controller.shutdown().await;
}
