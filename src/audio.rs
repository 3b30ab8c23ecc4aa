//! # Audio Engine
//!
//! The piano never synthesises sound itself. It hands notes to an
//! [`AudioEngine`], which may still be loading samples when the first notes
//! arrive. [`play_note`] is the only way the rest of the crate sounds a note,
//! and it quietly drops the note while the engine is not ready.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::time::Instant;

use crate::keymap::Note;

/// Something that can sound notes.
///
/// Implementations are called with internal locks held and must not call back
/// into the piano.
pub trait AudioEngine: Send + Sync {
    /// Whether samples are loaded and notes can be played.
    fn is_ready(&self) -> bool;

    /// Start the output (browsers and some hosts need a user gesture first).
    fn ensure_started(&self);

    /// Start the attack of a note.
    fn trigger(&self, note: &Note);
}

/// Sound a note if the engine is ready.
pub fn play_note(audio: &dyn AudioEngine, note: &Note) {
    if !audio.is_ready() {
        log::debug!("audio not ready, dropping {}", note);
        return;
    }
    audio.ensure_started();
    log::trace!("trigger {}", note);
    audio.trigger(note);
}

/// Writes each note to the log. Used by the command-line player.
#[derive(Debug, Default)]
pub struct LogAudio;

impl AudioEngine for LogAudio {
    fn is_ready(&self) -> bool {
        true
    }

    fn ensure_started(&self) {}

    fn trigger(&self, note: &Note) {
        log::info!("♪ {}", note);
    }
}

/// Remembers every note it was asked to play and when.
#[derive(Debug)]
pub struct RecordingAudio {
    ready: AtomicBool,
    started: AtomicBool,
    played: Mutex<Vec<(Instant, Note)>>,
}

impl RecordingAudio {
    pub fn new() -> Self {
        Self {
            ready: AtomicBool::new(true),
            started: AtomicBool::new(false),
            played: Mutex::new(Vec::new()),
        }
    }

    /// An engine that is still loading.
    pub fn not_ready() -> Self {
        let audio = Self::new();
        audio.set_ready(false);
        audio
    }

    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }

    pub fn was_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    pub fn played(&self) -> Vec<(Instant, Note)> {
        self.played.lock().clone()
    }

    /// Note names in the order they were played.
    pub fn notes(&self) -> Vec<String> {
        self.played.lock().iter().map(|(_, n)| n.to_string()).collect()
    }

    pub fn clear(&self) {
        self.played.lock().clear();
    }
}

impl Default for RecordingAudio {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioEngine for RecordingAudio {
    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    fn ensure_started(&self) {
        self.started.store(true, Ordering::SeqCst);
    }

    fn trigger(&self, note: &Note) {
        self.played.lock().push((Instant::now(), *note));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_not_ready_drops_note() {
        let audio = RecordingAudio::not_ready();
        let note: Note = "C4".parse().unwrap();
        play_note(&audio, &note);
        assert!(audio.notes().is_empty());
        assert!(!audio.was_started());

        audio.set_ready(true);
        play_note(&audio, &note);
        assert_eq!(audio.notes(), vec!["C4"]);
        assert!(audio.was_started());
    }
}
