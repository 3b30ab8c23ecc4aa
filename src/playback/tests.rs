use super::*;
use crate::audio::RecordingAudio;
use crate::keymap::KeyMap;
use crate::sheet::TokenKind;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::time::{sleep, Instant};

fn engine_with(sheet: &str, audio: Arc<RecordingAudio>) -> PlaybackEngine {
    let engine = PlaybackEngine::new(
        Arc::new(KeyMap::standard().clone()),
        audio,
        DEFAULT_PAUSE_POLL,
        Handle::current(),
    );
    engine.load(sheet);
    engine.set_bpm(100);
    engine
}

fn note(label: char) -> String {
    KeyMap::standard().note_for_label(label).unwrap().to_string()
}

/// (milliseconds since `start`, note name) for every trigger.
fn timeline(audio: &RecordingAudio, start: Instant) -> Vec<(u128, String)> {
    audio
        .played()
        .into_iter()
        .map(|(at, n)| (at.duration_since(start).as_millis(), n.to_string()))
        .collect()
}

#[test]
fn test_token_delay_asymmetry() {
    assert_eq!(token_delay(&TokenKind::Single('a'), 100), Duration::from_millis(150));
    assert_eq!(token_delay(&TokenKind::Chord(vec!['a']), 100), Duration::from_millis(300));
    assert_eq!(token_delay(&TokenKind::Malformed, 100), Duration::from_millis(300));
    assert_eq!(token_delay(&TokenKind::Chord(vec![]), 300), Duration::from_millis(100));
    assert_eq!(token_delay(&TokenKind::Single('a'), 120), Duration::from_millis(125));
}

#[tokio::test(start_paused = true)]
async fn test_playback_timing() {
    let audio = Arc::new(RecordingAudio::new());
    let engine = engine_with("ab[cd]e", audio.clone());
    let start = Instant::now();

    engine.play();
    assert_eq!(engine.state(), PlaybackState::Playing);

    sleep(Duration::from_millis(320)).await;
    // The chord is sounding
    assert_eq!(engine.highlight(), Some(Highlight { start: 2, end: 6 }));
    assert_eq!(engine.cursor(), 2);

    sleep(Duration::from_millis(680)).await;
    assert_eq!(
        timeline(&audio, start),
        vec![
            (0, note('a')),
            (150, note('b')),
            (300, note('c')),
            (300, note('d')),
            (600, note('e')),
        ]
    );
    assert_eq!(engine.state(), PlaybackState::Idle);
    assert_eq!(engine.cursor(), 0);
    assert_eq!(engine.highlight(), None);
}

#[tokio::test(start_paused = true)]
async fn test_returns_to_idle_after_last_wait() {
    let audio = Arc::new(RecordingAudio::new());
    let engine = engine_with("ab[cd]e", audio.clone());

    engine.play();
    sleep(Duration::from_millis(740)).await;
    assert_eq!(engine.state(), PlaybackState::Playing);
    assert_eq!(engine.highlight(), Some(Highlight { start: 6, end: 7 }));

    sleep(Duration::from_millis(20)).await;
    assert_eq!(engine.state(), PlaybackState::Idle);
    assert_eq!(engine.cursor(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_pause_freezes_cursor_after_current_token() {
    let audio = Arc::new(RecordingAudio::new());
    let engine = engine_with("ab[cd]e", audio.clone());
    let start = Instant::now();

    engine.play();
    // Inside the wait that follows `b`
    sleep(Duration::from_millis(175)).await;
    assert!(engine.pause());
    assert_eq!(engine.state(), PlaybackState::Paused);
    assert_eq!(engine.highlight(), None);
    // `b` counts as played the moment the pause lands
    assert_eq!(engine.cursor(), 2);

    // and the cursor stays put across the engine's next checks
    sleep(Duration::from_millis(60)).await;
    assert_eq!(engine.cursor(), 2);

    sleep(Duration::from_millis(175)).await;
    assert_eq!(engine.cursor(), 2);
    assert_eq!(engine.highlight(), None);
    assert_eq!(audio.notes(), vec![note('a'), note('b')]);

    engine.resume();
    sleep(Duration::from_millis(1000)).await;
    assert_eq!(
        timeline(&audio, start),
        vec![
            (0, note('a')),
            (150, note('b')),
            (450, note('c')),
            (450, note('d')),
            (750, note('e')),
        ]
    );
    assert_eq!(engine.state(), PlaybackState::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_pause_when_not_playing() {
    let audio = Arc::new(RecordingAudio::new());
    let engine = engine_with("ab", audio);
    assert!(!engine.pause());
    assert_eq!(engine.state(), PlaybackState::Idle);

    // Resume only acts on a paused engine
    engine.resume();
    assert_eq!(engine.state(), PlaybackState::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_restart_cancels_run() {
    let audio = Arc::new(RecordingAudio::new());
    let engine = engine_with("ab[cd]e", audio.clone());

    engine.play();
    sleep(Duration::from_millis(175)).await;
    engine.restart();
    assert_eq!(engine.state(), PlaybackState::Idle);
    assert_eq!(engine.cursor(), 0);
    assert_eq!(engine.highlight(), None);

    engine.restart();
    assert_eq!(engine.state(), PlaybackState::Idle);

    sleep(Duration::from_millis(1000)).await;
    assert_eq!(audio.notes(), vec![note('a'), note('b')]);

    // A fresh run plays the whole sheet once, with nothing left over from the old one
    audio.clear();
    engine.play();
    sleep(Duration::from_millis(1000)).await;
    assert_eq!(
        audio.notes(),
        vec![note('a'), note('b'), note('c'), note('d'), note('e')]
    );
}

#[tokio::test(start_paused = true)]
async fn test_restart_while_paused() {
    let audio = Arc::new(RecordingAudio::new());
    let engine = engine_with("abc", audio.clone());

    engine.play();
    sleep(Duration::from_millis(160)).await;
    engine.pause();
    sleep(Duration::from_millis(100)).await;
    engine.restart();
    assert_eq!(engine.status().state, PlaybackState::Idle);
    assert_eq!(engine.status().cursor, 0);

    sleep(Duration::from_millis(500)).await;
    assert_eq!(audio.notes(), vec![note('a'), note('b')]);
}

#[tokio::test(start_paused = true)]
async fn test_play_on_empty_sheet_stays_idle() {
    let audio = Arc::new(RecordingAudio::new());
    let engine = engine_with("", audio.clone());
    engine.play();
    assert_eq!(engine.state(), PlaybackState::Idle);
    sleep(Duration::from_millis(100)).await;
    assert!(audio.notes().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_play_while_playing_is_noop() {
    let audio = Arc::new(RecordingAudio::new());
    let engine = engine_with("ab", audio.clone());
    engine.play();
    sleep(Duration::from_millis(10)).await;
    engine.play();
    sleep(Duration::from_millis(500)).await;
    assert_eq!(audio.notes(), vec![note('a'), note('b')]);
}

#[tokio::test(start_paused = true)]
async fn test_sheet_change_pauses_and_clamps_cursor() {
    let audio = Arc::new(RecordingAudio::new());
    let engine = engine_with("ab[cd]e", audio.clone());

    engine.play();
    sleep(Duration::from_millis(175)).await;
    engine.sheet_changed("ab[cd]ef");
    assert_eq!(engine.state(), PlaybackState::Paused);
    assert_eq!(engine.highlight(), None);
    assert_eq!(engine.cursor(), 2);

    sleep(Duration::from_millis(100)).await;
    assert_eq!(engine.cursor(), 2);

    // Shrinking the sheet below the cursor pulls the cursor back
    engine.sheet_changed("a");
    assert_eq!(engine.cursor(), 1);
    assert_eq!(engine.state(), PlaybackState::Paused);

    // Resuming past the end simply finishes
    engine.play();
    sleep(Duration::from_millis(100)).await;
    assert_eq!(engine.state(), PlaybackState::Idle);
    assert_eq!(engine.cursor(), 0);
    assert_eq!(audio.notes(), vec![note('a'), note('b')]);
}

#[tokio::test(start_paused = true)]
async fn test_sheet_change_while_idle_keeps_state() {
    let audio = Arc::new(RecordingAudio::new());
    let engine = engine_with("ab", audio);
    engine.sheet_changed("abc");
    assert_eq!(engine.state(), PlaybackState::Idle);
    assert_eq!(engine.sheet_text(), "abc");
}

#[tokio::test(start_paused = true)]
async fn test_load_restarts() {
    let audio = Arc::new(RecordingAudio::new());
    let engine = engine_with("abc", audio.clone());

    engine.play();
    sleep(Duration::from_millis(160)).await;
    engine.load("t");
    assert_eq!(engine.state(), PlaybackState::Idle);
    assert_eq!(engine.cursor(), 0);

    sleep(Duration::from_millis(500)).await;
    assert_eq!(audio.notes(), vec![note('a'), note('b')]);
}

#[tokio::test(start_paused = true)]
async fn test_tempo_read_for_every_token() {
    let audio = Arc::new(RecordingAudio::new());
    let engine = engine_with("abc", audio.clone());
    let start = Instant::now();

    engine.play();
    sleep(Duration::from_millis(75)).await;
    engine.set_bpm(300);
    sleep(Duration::from_millis(500)).await;

    assert_eq!(
        timeline(&audio, start),
        vec![(0, note('a')), (150, note('b')), (200, note('c'))]
    );
    assert_eq!(engine.status().bpm, 300);
}

#[tokio::test(start_paused = true)]
async fn test_unknown_and_malformed_tokens_are_silent() {
    let audio = Arc::new(RecordingAudio::new());
    // '#' has no key, '[' is never closed
    let engine = engine_with("#[t", audio.clone());
    let start = Instant::now();

    engine.play();
    sleep(Duration::from_millis(1000)).await;
    assert_eq!(timeline(&audio, start), vec![(450, note('t'))]);
    assert_eq!(engine.state(), PlaybackState::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_audio_not_ready_does_not_stop_playback() {
    let audio = Arc::new(RecordingAudio::not_ready());
    let engine = engine_with("ab[cd]", audio.clone());

    engine.play();
    sleep(Duration::from_millis(200)).await;
    assert_eq!(engine.cursor(), 1);
    assert_eq!(engine.highlight(), Some(Highlight { start: 1, end: 2 }));

    sleep(Duration::from_millis(500)).await;
    assert_eq!(engine.state(), PlaybackState::Idle);
    assert!(audio.notes().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_play_from_end_starts_over() {
    let audio = Arc::new(RecordingAudio::new());
    let engine = engine_with("ab", audio.clone());

    engine.play();
    sleep(Duration::from_millis(400)).await;
    assert_eq!(engine.state(), PlaybackState::Idle);

    engine.play();
    sleep(Duration::from_millis(400)).await;
    assert_eq!(
        audio.notes(),
        vec![note('a'), note('b'), note('a'), note('b')]
    );
}

#[tokio::test(start_paused = true)]
async fn test_subscribe_sees_finish() {
    let audio = Arc::new(RecordingAudio::new());
    let engine = engine_with("t[uo]", audio.clone());

    engine.play();
    let mut state = engine.subscribe();
    assert_eq!(*state.borrow_and_update(), PlaybackState::Playing);
    state.changed().await.unwrap();
    assert_eq!(*state.borrow(), PlaybackState::Idle);
    assert_eq!(audio.notes(), vec!["C4", "E4", "G4"]);
}

#[tokio::test(start_paused = true)]
async fn test_shrinking_sheet_mid_wait_clamps_sounding_token_end() {
    let audio = Arc::new(RecordingAudio::new());
    let engine = engine_with("a[cd]e", audio.clone());

    engine.play();
    // The chord is sounding; its end (5) lies past the new text
    sleep(Duration::from_millis(200)).await;
    engine.sheet_changed("a[c");
    assert_eq!(engine.state(), PlaybackState::Paused);
    assert_eq!(engine.cursor(), 3);

    sleep(Duration::from_millis(100)).await;
    assert_eq!(engine.cursor(), 3);
    assert_eq!(audio.notes(), vec![note('a'), note('c'), note('d')]);
}
