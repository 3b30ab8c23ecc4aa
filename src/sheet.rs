//! # Sheet Notation
//!
//! The sheet is plain text recorded from the keyboard:
//!
//! ```text
//! tyu[tuo]p      t, y, u one after another, then t+u+o together, then p
//! ```
//!
//! - A single note is its bare label character.
//! - A chord of two or more notes is `[` + labels + `]`.
//!
//! Decoding never fails. A `[` with no `]` after it is read as a one-character
//! [`TokenKind::Malformed`] token, and a character with no key is still a token
//! that just makes no sound. All positions are character indices, not byte
//! offsets, so multi-byte text pasted into the sheet cannot split a character.

use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use std::ops::Range;

pub const CHORD_OPEN: char = '[';
pub const CHORD_CLOSE: char = ']';

/// What a decoded token plays.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "labels", rename_all = "lowercase")]
pub enum TokenKind {
    /// One label character (may have no key bound to it)
    Single(char),
    /// Labels between `[` and `]`, played together
    Chord(Vec<char>),
    /// A `[` that is never closed
    Malformed,
}

/// One unit of playback and the characters it covers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Token {
    #[serde(flatten)]
    pub kind: TokenKind,
    pub span: Range<usize>,
}

impl Token {
    /// Labels to sound for this token, in written order.
    pub fn labels(&self) -> &[char] {
        match &self.kind {
            TokenKind::Single(c) => std::slice::from_ref(c),
            TokenKind::Chord(labels) => labels,
            TokenKind::Malformed => &[],
        }
    }
}

/// Sheet text stored as characters so cursor arithmetic is by character.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sheet {
    chars: Vec<char>,
}

impl Sheet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.chars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }

    pub fn push_str(&mut self, text: &str) {
        self.chars.extend(text.chars());
    }

    pub fn token_at(&self, index: usize) -> Option<Token> {
        token_at(&self.chars, index)
    }

    pub fn tokens(&self) -> Tokens<'_> {
        Tokens {
            chars: &self.chars,
            index: 0,
        }
    }
}

impl From<&str> for Sheet {
    fn from(text: &str) -> Self {
        Self {
            chars: text.chars().collect(),
        }
    }
}

impl fmt::Display for Sheet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.chars.iter().try_for_each(|c| write!(f, "{}", c))
    }
}

/// Iterator over the tokens of a sheet, left to right.
pub struct Tokens<'a> {
    chars: &'a [char],
    index: usize,
}

impl Iterator for Tokens<'_> {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        let token = token_at(self.chars, self.index)?;
        self.index = token.span.end;
        Some(token)
    }
}

/// Decode the token starting at `index`.
///
/// Returns `None` only at or past the end of the text. The returned span always
/// starts at `index` and is at least one character long, so a caller that
/// advances to `span.end` always makes progress.
pub fn token_at(chars: &[char], index: usize) -> Option<Token> {
    let c = *chars.get(index)?;

    if c != CHORD_OPEN {
        return Some(Token {
            kind: TokenKind::Single(c),
            span: index..index + 1,
        });
    }

    match chars[index + 1..].iter().position(|&ch| ch == CHORD_CLOSE) {
        Some(offset) => {
            let close = index + 1 + offset;
            Some(Token {
                kind: TokenKind::Chord(chars[index + 1..close].to_vec()),
                span: index..close + 1,
            })
        }
        None => Some(Token {
            kind: TokenKind::Malformed,
            span: index..index + 1,
        }),
    }
}

/// Decode a whole sheet.
pub fn decode(text: &str) -> Vec<Token> {
    let chars: Vec<char> = text.chars().collect();
    Tokens {
        chars: &chars,
        index: 0,
    }
    .collect()
}

/// Write a set of simultaneously pressed labels as a sheet token.
///
/// `BTreeSet` iterates in character order, which is the canonical chord order.
/// An empty set encodes to nothing.
pub fn encode_chord(labels: &BTreeSet<char>) -> String {
    match labels.len() {
        0 => String::new(),
        1 => labels.iter().collect(),
        _ => {
            let mut out = String::with_capacity(labels.len() + 2);
            out.push(CHORD_OPEN);
            out.extend(labels.iter());
            out.push(CHORD_CLOSE);
            out
        }
    }
}

/// Write decoded tokens back out as sheet text.
pub fn encode(tokens: &[Token]) -> String {
    let mut out = String::new();
    for token in tokens {
        match &token.kind {
            TokenKind::Single(c) => out.push(*c),
            TokenKind::Chord(labels) => {
                out.push(CHORD_OPEN);
                out.extend(labels.iter());
                out.push(CHORD_CLOSE);
            }
            TokenKind::Malformed => out.push(CHORD_OPEN),
        }
    }
    out
}
