//! # Configuration
//!
//! Piano settings read from YAML. Every key is optional and defaults to the
//! reference keyboard:
//!
//! ```yaml
//! octaves: [2, 3, 4, 5, 6]
//! white-labels: "1234567890qwertyuiopasdfghjklzxcvbnm"
//! black-labels: "!@$%^*(QWETYIOPSDGHJLZCVB"
//! chord-window-ms: 50
//! pause-poll-ms: 50
//! tempo:
//!   min: 100
//!   max: 300
//!   step: 25
//!   initial: 100
//! ```

use serde::Deserialize;
use std::time::Duration;

use crate::error::PianoError;
use crate::keymap::KeyMapConfig;
use crate::tempo::TempoConfig;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct PianoConfig {
    #[serde(flatten)]
    pub keymap: KeyMapConfig,
    pub chord_window_ms: u64,
    pub pause_poll_ms: u64,
    pub tempo: TempoConfig,
}

impl Default for PianoConfig {
    fn default() -> Self {
        Self {
            keymap: KeyMapConfig::default(),
            chord_window_ms: 50,
            pause_poll_ms: 50,
            tempo: TempoConfig::default(),
        }
    }
}

impl PianoConfig {
    /// Parse and validate a YAML document.
    pub fn from_yaml(content: &str) -> Result<Self, PianoError> {
        let config: PianoConfig = if content.trim().is_empty() {
            PianoConfig::default()
        } else {
            serde_yaml::from_str(content).map_err(|e| PianoError::ConfigError(e.to_string()))?
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), PianoError> {
        if self.chord_window_ms == 0 {
            return Err(PianoError::InvalidConfig(
                "chord-window-ms must be greater than 0".to_string(),
            ));
        }
        if self.pause_poll_ms == 0 {
            return Err(PianoError::InvalidConfig(
                "pause-poll-ms must be greater than 0".to_string(),
            ));
        }
        let tempo = &self.tempo;
        if tempo.min == 0 || tempo.min > tempo.max {
            return Err(PianoError::InvalidConfig(format!(
                "tempo range {}..={} is empty",
                tempo.min, tempo.max
            )));
        }
        if tempo.initial < tempo.min || tempo.initial > tempo.max {
            return Err(PianoError::InvalidConfig(format!(
                "initial tempo {} is outside {}..={}",
                tempo.initial, tempo.min, tempo.max
            )));
        }
        if tempo.step == 0 {
            return Err(PianoError::InvalidConfig(
                "tempo step must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    pub fn chord_window(&self) -> Duration {
        Duration::from_millis(self.chord_window_ms)
    }

    pub fn pause_poll(&self) -> Duration {
        Duration::from_millis(self.pause_poll_ms)
    }
}
