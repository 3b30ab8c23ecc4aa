//! # Playback Module
//!
//! Plays the recorded sheet back token by token, in time, while telling the
//! presentation layer which token is sounding.
//!
//! ## Sub-modules
//! - `types` - PlaybackState, Highlight, PlaybackStatus and the per-token delay
//! - `engine` - The PlaybackEngine state machine and its playback task
//!
//! ## States
//! ```text
//!            play()                      end of sheet
//!   Idle ─────────────> Playing ───────────────────────> Idle
//!    ^                  │    ^
//!    │ restart()        │    │ play() / resume()
//!    │ (from any state) v    │
//!    └──────────────── Paused
//!                  pause(), sheet edited,
//!                  note played by hand
//! ```
//!
//! ## Timing
//! After sounding a token the engine waits before moving the cursor:
//! - chord or unclosed `[`: `30000 / bpm` ms
//! - single character: half of that
//!
//! At 100 BPM, `ab[cd]e` sounds `a` at 0 ms, `b` at 150 ms, `c`+`d` at 300 ms
//! and `e` at 600 ms, then returns to Idle at 750 ms. The tempo is read again
//! for every token, so a tempo change applies from the next token.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use vpiano::playback::{PlaybackEngine, PlaybackState, DEFAULT_PAUSE_POLL};
//! use vpiano::{KeyMap, RecordingAudio};
//!
//! # tokio::runtime::Builder::new_current_thread().enable_time().build().unwrap().block_on(async {
//! let audio = Arc::new(RecordingAudio::new());
//! let engine = PlaybackEngine::new(
//!     Arc::new(KeyMap::standard().clone()),
//!     audio.clone(),
//!     DEFAULT_PAUSE_POLL,
//!     tokio::runtime::Handle::current(),
//! );
//! engine.load("t[uo]");
//! engine.set_bpm(300);
//! engine.play();
//!
//! let mut state = engine.subscribe();
//! while *state.borrow_and_update() != PlaybackState::Idle {
//!     state.changed().await.unwrap();
//! }
//! assert_eq!(audio.notes(), vec!["C4", "E4", "G4"]);
//! # });
//! ```

mod engine;
mod types;

#[cfg(test)]
mod tests;

pub use engine::{PlaybackEngine, DEFAULT_PAUSE_POLL};
pub use types::{token_delay, Highlight, PlaybackState, PlaybackStatus};
