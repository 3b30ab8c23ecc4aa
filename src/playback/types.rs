//! Playback state types shared with the presentation layer.

use serde::Serialize;
use std::time::Duration;

use crate::sheet::TokenKind;

/// Where the sequencer is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackState {
    Idle,
    Playing,
    Paused,
}

/// Character range of the token currently sounding, `start..end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Highlight {
    pub start: usize,
    pub end: usize,
}

/// Everything a renderer needs to draw playback progress.
///
/// # Fields
/// - `state`: idle, playing or paused
/// - `cursor`: character index of the next token to play
/// - `highlight`: span of the token sounding right now, if any
/// - `bpm`: tempo used for the next token
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackStatus {
    pub state: PlaybackState,
    pub cursor: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub highlight: Option<Highlight>,
    pub bpm: u16,
}

/// How long to wait after sounding a token before moving on.
///
/// A beat of `30000 / bpm` milliseconds (an eighth note) follows chords and
/// unclosed brackets. Single notes wait half of that.
///
/// ```
/// use std::time::Duration;
/// use vpiano::playback::token_delay;
/// use vpiano::TokenKind;
///
/// assert_eq!(token_delay(&TokenKind::Chord(vec!['a', 'b']), 100), Duration::from_millis(300));
/// assert_eq!(token_delay(&TokenKind::Single('a'), 100), Duration::from_millis(150));
/// ```
pub fn token_delay(kind: &TokenKind, bpm: u16) -> Duration {
    let beat_micros = 30_000_000 / u64::from(bpm.max(1));
    match kind {
        TokenKind::Single(_) => Duration::from_micros(beat_micros / 2),
        TokenKind::Chord(_) | TokenKind::Malformed => Duration::from_micros(beat_micros),
    }
}
