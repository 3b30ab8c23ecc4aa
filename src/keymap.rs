//! # Key Map
//!
//! Static table binding every note of the piano to one input label.
//!
//! ## Catalog
//! For each configured octave (ascending) the 12 chromatic pitch classes are
//! emitted in order `C C# D ... B`, then one extra `C` one octave above the
//! last one closes the range. With the reference octaves `2..=6` that gives
//! 61 notes, `C2` to `C7`.
//!
//! ## Labels
//! Natural notes take labels from the white pool in catalog order, sharps take
//! labels from the black pool in catalog order. The pools are plain ordered
//! lists so the assignment is deterministic:
//!
//! ```text
//! C2 -> '1'   C#2 -> '!'   D2 -> '2'   D#2 -> '@'   E2 -> '3'   F2 -> '4' ...
//! ```
//!
//! The table is built in one pure function ([`KeyMap::build`]); the reference
//! table is memoised behind [`KeyMap::standard`].

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use crate::error::PianoError;
use crate::sheet::{CHORD_CLOSE, CHORD_OPEN};

pub const DEFAULT_OCTAVES: [u8; 5] = [2, 3, 4, 5, 6];
pub const DEFAULT_WHITE_LABELS: &str = "1234567890qwertyuiopasdfghjklzxcvbnm";
pub const DEFAULT_BLACK_LABELS: &str = "!@$%^*(QWETYIOPSDGHJLZCVB";

/// The twelve chromatic pitch classes, sharps spelled as sharps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum PitchClass {
    C,
    CSharp,
    D,
    DSharp,
    E,
    F,
    FSharp,
    G,
    GSharp,
    A,
    ASharp,
    B,
}

impl PitchClass {
    pub const ALL: [PitchClass; 12] = [
        PitchClass::C,
        PitchClass::CSharp,
        PitchClass::D,
        PitchClass::DSharp,
        PitchClass::E,
        PitchClass::F,
        PitchClass::FSharp,
        PitchClass::G,
        PitchClass::GSharp,
        PitchClass::A,
        PitchClass::ASharp,
        PitchClass::B,
    ];

    pub fn is_sharp(self) -> bool {
        matches!(
            self,
            PitchClass::CSharp
                | PitchClass::DSharp
                | PitchClass::FSharp
                | PitchClass::GSharp
                | PitchClass::ASharp
        )
    }

    pub fn name(self) -> &'static str {
        match self {
            PitchClass::C => "C",
            PitchClass::CSharp => "C#",
            PitchClass::D => "D",
            PitchClass::DSharp => "D#",
            PitchClass::E => "E",
            PitchClass::F => "F",
            PitchClass::FSharp => "F#",
            PitchClass::G => "G",
            PitchClass::GSharp => "G#",
            PitchClass::A => "A",
            PitchClass::ASharp => "A#",
            PitchClass::B => "B",
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        PitchClass::ALL.into_iter().find(|p| p.name() == name)
    }
}

/// A pitch on the keyboard, e.g. `C#4`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Note {
    pub octave: u8,
    pub pitch: PitchClass,
}

impl Note {
    pub fn new(pitch: PitchClass, octave: u8) -> Self {
        Self { octave, pitch }
    }

    /// MIDI note number (C4 = 60).
    pub fn midi(&self) -> u8 {
        let pc = PitchClass::ALL
            .iter()
            .position(|p| *p == self.pitch)
            .unwrap_or(0) as u16;
        ((self.octave as u16 + 1) * 12 + pc).min(127) as u8
    }
}

impl fmt::Display for Note {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.pitch.name(), self.octave)
    }
}

impl FromStr for Note {
    type Err = String;

    /// Parse a note name like `C4` or `F#2`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let split = s
            .find(|c: char| c.is_ascii_digit())
            .ok_or_else(|| format!("Missing octave in note '{}'", s))?;
        let (name, octave) = s.split_at(split);
        let pitch =
            PitchClass::from_name(name).ok_or_else(|| format!("Unknown pitch '{}'", name))?;
        let octave = octave
            .parse::<u8>()
            .map_err(|_| format!("Invalid octave in note '{}'", s))?;
        Ok(Note::new(pitch, octave))
    }
}

impl Serialize for Note {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Key colour on the keyboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyColor {
    White,
    Black,
}

impl fmt::Display for KeyColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyColor::White => write!(f, "white"),
            KeyColor::Black => write!(f, "black"),
        }
    }
}

/// One key: a note, the input label that plays it, and its colour.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeyBinding {
    pub note: Note,
    pub label: char,
    pub color: KeyColor,
}

/// Inputs to [`KeyMap::build`].
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct KeyMapConfig {
    pub octaves: Vec<u8>,
    #[serde(deserialize_with = "label_pool")]
    pub white_labels: Vec<char>,
    #[serde(deserialize_with = "label_pool")]
    pub black_labels: Vec<char>,
}

impl Default for KeyMapConfig {
    fn default() -> Self {
        Self {
            octaves: DEFAULT_OCTAVES.to_vec(),
            white_labels: DEFAULT_WHITE_LABELS.chars().collect(),
            black_labels: DEFAULT_BLACK_LABELS.chars().collect(),
        }
    }
}

/// Label pools are written as a single string in YAML.
fn label_pool<'de, D>(deserializer: D) -> Result<Vec<char>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    Ok(s.chars().collect())
}

/// Bidirectional note/label table.
#[derive(Debug, Clone)]
pub struct KeyMap {
    bindings: Vec<KeyBinding>,
    by_label: HashMap<char, usize>,
    by_note: HashMap<Note, usize>,
}

impl KeyMap {
    /// Build the catalog and assign labels.
    ///
    /// # Errors
    /// - [`PianoError::EmptyCatalog`] if no octaves are configured
    /// - [`PianoError::LabelPoolExhausted`] if either pool runs out
    /// - [`PianoError::DuplicateLabel`] if a label would be used twice
    /// - [`PianoError::InvalidConfig`] if a label is a chord bracket
    pub fn build(config: &KeyMapConfig) -> Result<Self, PianoError> {
        let catalog = build_catalog(&config.octaves)?;

        let needed_white = catalog.iter().filter(|n| !n.pitch.is_sharp()).count();
        let needed_black = catalog.len() - needed_white;
        check_pool(KeyColor::White, needed_white, &config.white_labels)?;
        check_pool(KeyColor::Black, needed_black, &config.black_labels)?;

        let mut white = config.white_labels.iter();
        let mut black = config.black_labels.iter();
        let mut bindings = Vec::with_capacity(catalog.len());
        let mut by_label = HashMap::with_capacity(catalog.len());
        let mut by_note = HashMap::with_capacity(catalog.len());

        for note in catalog {
            let (color, pool) = if note.pitch.is_sharp() {
                (KeyColor::Black, &mut black)
            } else {
                (KeyColor::White, &mut white)
            };
            // Pool sizes were checked above
            let Some(&label) = pool.next() else {
                return Err(PianoError::LabelPoolExhausted {
                    color,
                    needed: bindings.len() + 1,
                    available: bindings.len(),
                });
            };
            if label == CHORD_OPEN || label == CHORD_CLOSE {
                return Err(PianoError::InvalidConfig(format!(
                    "'{}' is reserved for chords and cannot label a key",
                    label
                )));
            }
            if by_label.insert(label, bindings.len()).is_some() {
                return Err(PianoError::DuplicateLabel(label));
            }
            by_note.insert(note, bindings.len());
            bindings.push(KeyBinding { note, label, color });
        }

        Ok(Self {
            bindings,
            by_label,
            by_note,
        })
    }

    /// The reference 61-key table, built on first use.
    pub fn standard() -> &'static KeyMap {
        static STANDARD: OnceLock<KeyMap> = OnceLock::new();
        STANDARD.get_or_init(|| {
            KeyMap::build(&KeyMapConfig::default())
                .unwrap_or_else(|e| panic!("reference key map is invalid: {}", e))
        })
    }

    /// All bindings in catalog (ascending pitch) order.
    pub fn bindings(&self) -> &[KeyBinding] {
        &self.bindings
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn binding_for_label(&self, label: char) -> Option<&KeyBinding> {
        self.by_label.get(&label).map(|&i| &self.bindings[i])
    }

    pub fn note_for_label(&self, label: char) -> Option<Note> {
        self.binding_for_label(label).map(|b| b.note)
    }

    /// Index of a note in the catalog.
    pub fn position(&self, note: &Note) -> Option<usize> {
        self.by_note.get(note).copied()
    }

    pub fn white_keys(&self) -> impl Iterator<Item = &KeyBinding> {
        self.bindings.iter().filter(|b| b.color == KeyColor::White)
    }

    pub fn black_keys(&self) -> impl Iterator<Item = &KeyBinding> {
        self.bindings.iter().filter(|b| b.color == KeyColor::Black)
    }

    /// Number of white keys that come before `note`.
    ///
    /// Black keys are drawn between white keys, so a renderer places each
    /// black key at an offset derived from this count.
    pub fn white_keys_before(&self, note: &Note) -> Option<usize> {
        let position = self.position(note)?;
        Some(
            self.bindings[..position]
                .iter()
                .filter(|b| b.color == KeyColor::White)
                .count(),
        )
    }
}

fn build_catalog(octaves: &[u8]) -> Result<Vec<Note>, PianoError> {
    let top = *octaves.last().ok_or(PianoError::EmptyCatalog)?;
    let closing = top
        .checked_add(1)
        .ok_or_else(|| PianoError::InvalidConfig(format!("octave {} is too high", top)))?;

    let mut notes: Vec<Note> = octaves
        .iter()
        .flat_map(|&octave| PitchClass::ALL.into_iter().map(move |p| Note::new(p, octave)))
        .collect();
    notes.push(Note::new(PitchClass::C, closing));

    if notes.windows(2).any(|w| w[0] >= w[1]) {
        return Err(PianoError::InvalidConfig(
            "octaves must be strictly ascending".to_string(),
        ));
    }
    Ok(notes)
}

fn check_pool(color: KeyColor, needed: usize, pool: &[char]) -> Result<(), PianoError> {
    if pool.len() < needed {
        return Err(PianoError::LabelPoolExhausted {
            color,
            needed,
            available: pool.len(),
        });
    }
    Ok(())
}
