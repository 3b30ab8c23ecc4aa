//! # Tempo Controller
//!
//! Keeps the tempo the user is typing apart from the tempo playback uses.
//!
//! The raw text only ever holds digits and may be empty or out of range while
//! the user types. Nothing reaches the effective BPM until [`TempoController::commit`],
//! which clamps into `[min, max]` and falls back to `min` for empty input.

use serde::Deserialize;

pub const MIN_BPM: u16 = 100;
pub const MAX_BPM: u16 = 300;
pub const BPM_STEP: u16 = 25;

/// Tempo limits and starting value.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct TempoConfig {
    pub min: u16,
    pub max: u16,
    pub step: u16,
    pub initial: u16,
}

impl Default for TempoConfig {
    fn default() -> Self {
        Self {
            min: MIN_BPM,
            max: MAX_BPM,
            step: BPM_STEP,
            initial: MIN_BPM,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TempoController {
    config: TempoConfig,
    bpm: u16,
    raw: String,
    editing: bool,
}

impl TempoController {
    pub fn new(config: TempoConfig) -> Self {
        let bpm = clamp_bpm(config.initial, &config);
        Self {
            config,
            bpm,
            raw: bpm.to_string(),
            editing: false,
        }
    }

    /// The tempo playback runs at.
    pub fn bpm(&self) -> u16 {
        self.bpm
    }

    /// The text in the tempo field.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn is_editing(&self) -> bool {
        self.editing
    }

    pub fn config(&self) -> &TempoConfig {
        &self.config
    }

    /// The tempo field gained focus.
    pub fn focus(&mut self) {
        self.editing = true;
    }

    /// Replace the raw text. Anything other than digits is refused and the
    /// previous text is kept.
    pub fn input(&mut self, text: &str) -> bool {
        if !text.chars().all(|c| c.is_ascii_digit()) {
            log::debug!("tempo input rejected: {:?}", text);
            return false;
        }
        self.raw = text.to_string();
        true
    }

    /// Apply the raw text (field lost focus or Enter was pressed).
    pub fn commit(&mut self) -> u16 {
        let requested = parse_bpm(&self.raw, &self.config);
        self.bpm = clamp_bpm(requested, &self.config);
        self.raw = self.bpm.to_string();
        self.editing = false;
        log::info!("tempo set to {} bpm", self.bpm);
        self.bpm
    }

    pub fn step_up(&mut self) -> u16 {
        self.set(self.bpm.saturating_add(self.config.step))
    }

    pub fn step_down(&mut self) -> u16 {
        self.set(self.bpm.saturating_sub(self.config.step))
    }

    fn set(&mut self, bpm: u16) -> u16 {
        self.bpm = clamp_bpm(bpm, &self.config);
        self.raw = self.bpm.to_string();
        self.bpm
    }
}

impl Default for TempoController {
    fn default() -> Self {
        Self::new(TempoConfig::default())
    }
}

/// Clamp a tempo into the configured range.
pub fn clamp_bpm(bpm: u16, config: &TempoConfig) -> u16 {
    bpm.clamp(config.min, config.max)
}

fn parse_bpm(raw: &str, config: &TempoConfig) -> u16 {
    if raw.is_empty() {
        return config.min;
    }
    match raw.parse::<u32>() {
        Ok(value) => value.min(u16::MAX as u32) as u16,
        // Only digits get this far, so a parse failure means overflow
        Err(_) if raw.chars().all(|c| c.is_ascii_digit()) => config.max,
        Err(_) => config.min,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn committed(text: &str) -> u16 {
        let mut tempo = TempoController::default();
        tempo.focus();
        assert!(tempo.input(text));
        tempo.commit()
    }

    #[test]
    fn test_commit_clamps() {
        assert_eq!(committed("50"), 100);
        assert_eq!(committed("500"), 300);
        assert_eq!(committed(""), 100);
        assert_eq!(committed("180"), 180);
        assert_eq!(committed("100"), 100);
        assert_eq!(committed("300"), 300);
        assert_eq!(committed("0"), 100);
        assert_eq!(committed("99999999999999"), 300);
    }

    #[test]
    fn test_non_digit_input_rejected() {
        let mut tempo = TempoController::default();
        tempo.focus();
        assert!(tempo.input("12"));
        assert!(!tempo.input("12a"));
        assert!(!tempo.input("-5"));
        assert!(!tempo.input("1.5"));
        assert_eq!(tempo.raw(), "12");
    }

    #[test]
    fn test_raw_is_decoupled_until_commit() {
        let mut tempo = TempoController::default();
        tempo.focus();
        tempo.input("2");
        assert_eq!(tempo.bpm(), 100);
        tempo.input("25");
        tempo.input("250");
        assert_eq!(tempo.bpm(), 100);
        assert!(tempo.is_editing());

        assert_eq!(tempo.commit(), 250);
        assert_eq!(tempo.raw(), "250");
        assert!(!tempo.is_editing());
    }

    #[test]
    fn test_commit_normalises_raw_text() {
        let mut tempo = TempoController::default();
        tempo.input("007");
        tempo.commit();
        assert_eq!(tempo.raw(), "100");
    }

    #[test]
    fn test_steps_clamp() {
        let mut tempo = TempoController::default();
        assert_eq!(tempo.step_down(), 100);
        assert_eq!(tempo.step_up(), 125);
        for _ in 0..20 {
            tempo.step_up();
        }
        assert_eq!(tempo.bpm(), 300);
        assert_eq!(tempo.raw(), "300");
    }

    #[test]
    fn test_initial_is_clamped() {
        let tempo = TempoController::new(TempoConfig {
            initial: 20,
            ..TempoConfig::default()
        });
        assert_eq!(tempo.bpm(), 100);
    }
}
