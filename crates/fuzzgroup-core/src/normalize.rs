//! Comparison keys derived from raw cell values
//!
//! Every selected column of every row is reduced to a normalized key:
//! whitespace and hyphens removed, then lower-cased. Nulls become the empty
//! string, which is a valid key like any other.

use crate::row::Value;

/// Canonical comparison form of a raw string.
pub fn normalize(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .flat_map(char::to_lowercase)
        .collect()
}

/// Canonical comparison form of a cell value. Null normalizes to "".
pub fn normalize_value(value: &Value) -> String {
    normalize(&value.key_text())
}

/// A normalized key with its character count precomputed for the length guard.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Key {
    pub text: String,
    pub chars: usize,
}

impl Key {
    pub fn new(text: String) -> Self {
        let chars = text.chars().count();
        Self { text, chars }
    }

    pub fn from_value(value: &Value) -> Self {
        Self::new(normalize_value(value))
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// First, middle and last tokens of a personal-name value.
///
/// Tokens are split on whitespace from the raw value and then normalized
/// individually. `middle` is only present for values of three or more tokens.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NameTokens {
    pub first: String,
    pub middle: Option<String>,
    pub last: String,
}

impl NameTokens {
    /// Extract tokens from a raw value. Returns `None` when nothing is left.
    pub fn from_raw(raw: &str) -> Option<Self> {
        let tokens: Vec<String> = raw
            .split_whitespace()
            .map(normalize)
            .filter(|t| !t.is_empty())
            .collect();

        let first = tokens.first()?.clone();
        let last = tokens.last()?.clone();
        let middle = if tokens.len() >= 3 {
            Some(tokens[1].clone())
        } else {
            None
        };

        Some(Self {
            first,
            middle,
            last,
        })
    }

    pub fn from_value(value: &Value) -> Option<Self> {
        Self::from_raw(&value.key_text())
    }
}
