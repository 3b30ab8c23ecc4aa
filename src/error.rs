//! # Error Types
//!
//! Errors that can stop the piano from being built or configured.
//!
//! Runtime problems while playing (unbalanced brackets, characters with no key,
//! an audio engine that has not finished loading, bad tempo text) are never
//! reported through this type. They are recovered where they happen and only
//! show up in the log.
//!
//! ## Usage
//! ```rust
//! use vpiano::{KeyMap, KeyMapConfig, PianoError};
//!
//! let config = KeyMapConfig {
//!     white_labels: vec!['a', 'b'],
//!     ..KeyMapConfig::default()
//! };
//! match KeyMap::build(&config) {
//!     Err(PianoError::LabelPoolExhausted { needed, available, .. }) => {
//!         assert!(needed > available);
//!     }
//!     other => panic!("unexpected: {:?}", other.map(|_| ())),
//! }
//! ```

use thiserror::Error;

use crate::keymap::KeyColor;

#[derive(Error, Debug)]
pub enum PianoError {
    /// A label pool is shorter than the number of notes of its colour.
    ///
    /// # Example
    /// ```
    /// # use vpiano::{KeyColor, PianoError};
    /// let err = PianoError::LabelPoolExhausted {
    ///     color: KeyColor::Black,
    ///     needed: 25,
    ///     available: 20,
    /// };
    /// assert_eq!(err.to_string(), "Not enough black key labels: need 25, have 20");
    /// ```
    #[error("Not enough {color} key labels: need {needed}, have {available}")]
    LabelPoolExhausted {
        color: KeyColor,
        needed: usize,
        available: usize,
    },

    /// Two notes would be bound to the same label.
    #[error("Label '{0}' is assigned to more than one key")]
    DuplicateLabel(char),

    /// The octave list produced no notes.
    #[error("Key map has no octaves")]
    EmptyCatalog,

    /// YAML configuration could not be parsed.
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    /// Configuration parsed but holds values the piano cannot run with.
    #[error("Invalid configuration value: {0}")]
    InvalidConfig(String),

    /// The piano schedules timers and must be created inside a tokio runtime.
    #[error("No tokio runtime is running")]
    NoRuntime,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
