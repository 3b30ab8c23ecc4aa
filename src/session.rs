//! # Piano Session
//!
//! Connects input events, the recorded sheet, tempo and playback.
//!
//! ```text
//! key_down / pointer_down
//!     │  label -> note (KeyMap), play it now
//!     v
//! ChordBuffer ──(window closes)──> sheet += "t" or "[otu]" ──> PlaybackEngine
//!                                                                    │
//!                       replace_sheet / edit_sheet ─────────────────>│
//!                       tempo_commit / tempo_step ──── bpm ─────────>│
//! ```
//!
//! Rules that live here rather than in the components:
//! - A note played by hand pauses playback.
//! - Held keys are tracked per physical key code, so key repeat and a second
//!   press of an already held key are ignored.
//! - Edit mode blocks note input and restarts playback when toggled.
//! - Focusing the tempo field pauses playback; committing resumes it only if
//!   the focus was what paused it. Play and resume are ignored until then.
//!
//! The session owns the sheet text and the engine keeps a copy. The copy is
//! only ever written while the session's sheet lock is held, and locks are
//! taken sheet before engine, never the other way round.

use parking_lot::Mutex;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tokio::runtime::Handle;

use crate::audio::{play_note, AudioEngine};
use crate::chord::{ChordBuffer, ChordSink};
use crate::config::PianoConfig;
use crate::error::PianoError;
use crate::keymap::KeyMap;
use crate::playback::{PlaybackEngine, PlaybackStatus};
use crate::sheet::Sheet;
use crate::tempo::TempoController;

const POINTER_CODE_PREFIX: &str = "pointer:";

/// Everything the presentation layer draws.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PianoSnapshot {
    pub sheet: String,
    pub playback: PlaybackStatus,
    pub tempo_text: String,
    pub tempo_editing: bool,
    pub pressed: Vec<char>,
    pub editing: bool,
}

#[derive(Default)]
struct InputState {
    // physical key code -> label
    held: HashMap<String, char>,
    editing: bool,
    resume_after_tempo: bool,
}

pub struct Piano {
    keymap: Arc<KeyMap>,
    audio: Arc<dyn AudioEngine>,
    engine: Arc<PlaybackEngine>,
    chords: ChordBuffer,
    sheet: Arc<Mutex<Sheet>>,
    tempo: Mutex<TempoController>,
    input: Mutex<InputState>,
}

impl Piano {
    /// Build a piano. Must be called from inside a tokio runtime.
    pub fn new(config: &PianoConfig, audio: Arc<dyn AudioEngine>) -> Result<Self, PianoError> {
        config.validate()?;
        let runtime = Handle::try_current().map_err(|_| PianoError::NoRuntime)?;
        let keymap = Arc::new(KeyMap::build(&config.keymap)?);
        let tempo = TempoController::new(config.tempo);

        let engine = Arc::new(PlaybackEngine::new(
            Arc::clone(&keymap),
            Arc::clone(&audio),
            config.pause_poll(),
            runtime.clone(),
        ));
        engine.set_bpm(tempo.bpm());

        let sheet = Arc::new(Mutex::new(Sheet::new()));
        let sink: ChordSink = {
            let sheet = Arc::clone(&sheet);
            let engine = Arc::clone(&engine);
            Arc::new(move |token: String| {
                let mut sheet = sheet.lock();
                sheet.push_str(&token);
                engine.sheet_changed(&sheet.to_string());
            })
        };

        Ok(Self {
            keymap,
            audio,
            engine,
            chords: ChordBuffer::new(config.chord_window(), sink, runtime),
            sheet,
            tempo: Mutex::new(tempo),
            input: Mutex::new(InputState::default()),
        })
    }

    pub fn keymap(&self) -> &KeyMap {
        &self.keymap
    }

    pub fn playback(&self) -> &PlaybackEngine {
        &self.engine
    }

    // --- input ---

    /// A physical key went down. `code` identifies the key itself, `label`
    /// is the character it produced.
    pub fn key_down(&self, code: &str, label: char, repeat: bool) {
        let mut input = self.input.lock();
        if input.editing || repeat || input.held.contains_key(code) {
            return;
        }
        if !self.sound_by_hand(label) {
            return;
        }
        input.held.insert(code.to_string(), label);
        drop(input);
        self.chords.press(label);
    }

    pub fn key_up(&self, code: &str) {
        let released = self.input.lock().held.remove(code);
        if let Some(label) = released {
            self.chords.release(label);
        }
    }

    /// A key on the on-screen keyboard was clicked or touched.
    pub fn pointer_down(&self, label: char) {
        let mut input = self.input.lock();
        if input.editing || !self.sound_by_hand(label) {
            return;
        }
        input
            .held
            .insert(format!("{}{}", POINTER_CODE_PREFIX, label), label);
        drop(input);
        self.chords.press(label);
    }

    pub fn pointer_up(&self, label: char) {
        self.key_up(&format!("{}{}", POINTER_CODE_PREFIX, label));
    }

    /// Forget every held key, e.g. when focus moves away from the keyboard.
    pub fn release_all_keys(&self) {
        let released: Vec<char> = self.input.lock().held.drain().map(|(_, l)| l).collect();
        for label in released {
            self.chords.release(label);
        }
    }

    /// Labels currently held down, for key highlighting.
    pub fn pressed_labels(&self) -> BTreeSet<char> {
        self.input.lock().held.values().copied().collect()
    }

    /// Play a label's note immediately. Returns false for labels with no key.
    fn sound_by_hand(&self, label: char) -> bool {
        let Some(note) = self.keymap.note_for_label(label) else {
            return false;
        };
        if self.engine.pause() {
            log::debug!("manual note {} paused playback", note);
        }
        play_note(self.audio.as_ref(), &note);
        true
    }

    // --- sheet ---

    pub fn sheet_text(&self) -> String {
        self.sheet.lock().to_string()
    }

    /// Swap in a whole new sheet, e.g. pasted text. Playback restarts.
    pub fn replace_sheet(&self, text: &str) {
        let mut sheet = self.sheet.lock();
        *sheet = Sheet::from(text);
        self.engine.load(text);
        drop(sheet);
        log::info!("sheet replaced ({} characters)", text.chars().count());
    }

    /// Apply a user edit. Only allowed in edit mode; returns whether it was applied.
    pub fn edit_sheet(&self, text: &str) -> bool {
        if !self.is_editing() {
            return false;
        }
        let mut sheet = self.sheet.lock();
        *sheet = Sheet::from(text);
        self.engine.sheet_changed(text);
        true
    }

    pub fn clear_sheet(&self) {
        self.replace_sheet("");
    }

    // --- edit mode ---

    pub fn is_editing(&self) -> bool {
        self.input.lock().editing
    }

    pub fn set_editing(&self, editing: bool) {
        if self.is_editing() == editing {
            return;
        }
        if editing {
            self.chords.flush_now();
            self.release_all_keys();
        }
        self.input.lock().editing = editing;
        self.engine.restart();
        log::info!("edit mode {}", if editing { "on" } else { "off" });
    }

    pub fn toggle_editing(&self) {
        self.set_editing(!self.is_editing());
    }

    // --- playback ---

    /// Start or continue playback. Ignored while the tempo field has focus.
    pub fn play(&self) {
        if self.tempo_held() {
            return;
        }
        self.engine.play();
    }

    pub fn pause(&self) -> bool {
        self.engine.pause()
    }

    pub fn resume(&self) {
        if self.tempo_held() {
            return;
        }
        self.engine.resume();
    }

    fn tempo_held(&self) -> bool {
        let held = self.tempo.lock().is_editing();
        if held {
            log::debug!("playback request ignored while the tempo is being edited");
        }
        held
    }

    pub fn restart(&self) {
        self.engine.restart();
    }

    // --- tempo ---

    pub fn bpm(&self) -> u16 {
        self.tempo.lock().bpm()
    }

    /// The tempo field gained focus: hold playback until the value is committed.
    pub fn tempo_focus(&self) {
        self.tempo.lock().focus();
        self.release_all_keys();
        let paused = self.engine.pause();
        let mut input = self.input.lock();
        input.resume_after_tempo = input.resume_after_tempo || paused;
    }

    /// Raw text typed into the tempo field. Returns false if it was refused.
    pub fn tempo_input(&self, text: &str) -> bool {
        self.tempo.lock().input(text)
    }

    /// The tempo field lost focus or Enter was pressed.
    pub fn tempo_commit(&self) -> u16 {
        let bpm = self.tempo.lock().commit();
        self.engine.set_bpm(bpm);
        let resume = std::mem::take(&mut self.input.lock().resume_after_tempo);
        if resume {
            self.engine.resume();
        }
        bpm
    }

    pub fn tempo_step_up(&self) -> u16 {
        let bpm = self.tempo.lock().step_up();
        self.engine.set_bpm(bpm);
        bpm
    }

    pub fn tempo_step_down(&self) -> u16 {
        let bpm = self.tempo.lock().step_down();
        self.engine.set_bpm(bpm);
        bpm
    }

    pub fn snapshot(&self) -> PianoSnapshot {
        let (tempo_text, tempo_editing) = {
            let tempo = self.tempo.lock();
            (tempo.raw().to_string(), tempo.is_editing())
        };
        PianoSnapshot {
            sheet: self.sheet_text(),
            playback: self.engine.status(),
            tempo_text,
            tempo_editing,
            pressed: self.pressed_labels().into_iter().collect(),
            editing: self.is_editing(),
        }
    }

    /// Close any chord still waiting for its window.
    pub fn flush_chord(&self) {
        self.chords.flush_now();
    }
}
