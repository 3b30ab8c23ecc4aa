pub mod audio;
pub mod chord;
pub mod config;
pub mod error;
pub mod keymap;
pub mod playback;
pub mod session;
pub mod sheet;
pub mod tempo;

pub use audio::{play_note, AudioEngine, LogAudio, RecordingAudio};
pub use chord::{ChordBuffer, ChordSink};
pub use config::PianoConfig;
pub use error::*;
pub use keymap::{KeyBinding, KeyColor, KeyMap, KeyMapConfig, Note, PitchClass};
pub use playback::{Highlight, PlaybackEngine, PlaybackState, PlaybackStatus};
pub use session::{Piano, PianoSnapshot};
pub use sheet::{decode, encode, encode_chord, Sheet, Token, TokenKind};
pub use tempo::{TempoConfig, TempoController};

/// Decode sheet text and attach the note each label plays.
///
/// Labels with no key come back as `None`. Useful for showing a sheet without
/// playing it.
pub fn resolve(text: &str, keymap: &KeyMap) -> Vec<(Token, Vec<Option<Note>>)> {
    decode(text)
        .into_iter()
        .map(|token| {
            let notes = token
                .labels()
                .iter()
                .map(|&label| keymap.note_for_label(label))
                .collect();
            (token, notes)
        })
        .collect()
}
