//! Pairwise matching predicate
//!
//! Platform-specific implementations:
//! - Native: SIMD substring search via memchr
//! - Fallback: `str::contains`
//!
//! Two rows match when any selected column matches. A column matches on:
//!
//! 1. Bounded edit distance (length delta and Levenshtein both within limits)
//! 2. Substring containment in either direction
//! 3. Name tokens (first equal, and last or middle equal) for name columns

use serde::{Deserialize, Serialize};
use strsim::levenshtein;

use crate::normalize::{Key, NameTokens};

/// Thresholds for the edit-distance branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchConfig {
    /// Maximum Levenshtein distance between normalized keys
    pub max_edit_distance: usize,
    /// Maximum difference in character count, checked before edit distance
    pub max_length_delta: usize,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            max_edit_distance: 2,
            max_length_delta: 2,
        }
    }
}

/// Why two keys were judged equivalent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchReason {
    EditDistance(usize),
    Containment,
    Name,
}

/// Edit-distance branch. The length guard runs first so long strings with
/// very different lengths never reach the O(n*m) distance computation.
#[inline]
pub fn edit_distance_match(a: &Key, b: &Key, config: &MatchConfig) -> Option<usize> {
    if a.chars.abs_diff(b.chars) > config.max_length_delta {
        return None;
    }
    if a.text == b.text {
        return Some(0);
    }
    let distance = levenshtein(&a.text, &b.text);
    (distance <= config.max_edit_distance).then_some(distance)
}

/// Containment branch: the shorter key occurs inside the longer one.
///
/// The empty key is deliberately not contained in anything, even though it
/// is a substring of every string. Empty keys (null cells) still reach each
/// other and very short keys through [`edit_distance_match`].
#[inline]
pub fn containment_match(a: &Key, b: &Key) -> bool {
    let (short, long) = if a.text.len() <= b.text.len() {
        (a, b)
    } else {
        (b, a)
    };
    if short.is_empty() {
        return false;
    }
    contains(&long.text, &short.text)
}

#[cfg(feature = "simd")]
#[inline]
fn contains(haystack: &str, needle: &str) -> bool {
    memchr::memmem::find(haystack.as_bytes(), needle.as_bytes()).is_some()
}

#[cfg(not(feature = "simd"))]
#[inline]
fn contains(haystack: &str, needle: &str) -> bool {
    haystack.contains(needle)
}

/// Name branch: first tokens equal AND (last tokens equal OR middle tokens equal).
#[inline]
pub fn name_match(a: &NameTokens, b: &NameTokens) -> bool {
    if a.first != b.first {
        return false;
    }
    if a.last == b.last {
        return true;
    }
    matches!((&a.middle, &b.middle), (Some(x), Some(y)) if x == y)
}

/// Apply the key branches in order, returning the first that links the pair.
pub fn key_match(a: &Key, b: &Key, config: &MatchConfig) -> Option<MatchReason> {
    if let Some(distance) = edit_distance_match(a, b, config) {
        return Some(MatchReason::EditDistance(distance));
    }
    if containment_match(a, b) {
        return Some(MatchReason::Containment);
    }
    None
}

/// Per-row comparison material for the selected columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowKeys {
    /// One normalized key per selected column
    pub keys: Vec<Key>,
    /// Name tokens for name columns, `None` elsewhere or when the value is blank
    pub names: Vec<Option<NameTokens>>,
}

impl RowKeys {
    /// Normalized key texts, used to order rows for representative selection.
    pub fn key_tuple(&self) -> impl Iterator<Item = &str> + '_ {
        self.keys.iter().map(|k| k.text.as_str())
    }
}

/// Row-level predicate: OR across columns.
///
/// The candidate generator computes the same relation over distinct values;
/// this direct form backs tests and single-pair checks.
pub fn rows_match(a: &RowKeys, b: &RowKeys, config: &MatchConfig) -> Option<MatchReason> {
    for (ka, kb) in a.keys.iter().zip(&b.keys) {
        if let Some(reason) = key_match(ka, kb, config) {
            return Some(reason);
        }
    }
    for (na, nb) in a.names.iter().zip(&b.names) {
        if let (Some(na), Some(nb)) = (na, nb) {
            if name_match(na, nb) {
                return Some(MatchReason::Name);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::normalize;

    fn key(raw: &str) -> Key {
        Key::new(normalize(raw))
    }

    #[test]
    fn test_edit_distance_within_bounds() {
        let config = MatchConfig::default();
        assert_eq!(edit_distance_match(&key("smith"), &key("smyth"), &config), Some(1));
        assert_eq!(edit_distance_match(&key("Smith"), &key("SMITH"), &config), Some(0));
    }

    #[test]
    fn test_length_guard_blocks_edit_distance() {
        let config = MatchConfig {
            max_edit_distance: 100,
            max_length_delta: 2,
        };
        // Distance is 6, which the relaxed threshold would accept
        assert_eq!(
            edit_distance_match(&key("smith"), &key("smithsonian"), &config),
            None
        );
    }

    #[test]
    fn test_smithsonian_links_only_by_containment() {
        let config = MatchConfig::default();
        assert_eq!(
            key_match(&key("smith"), &key("smithsonian"), &config),
            Some(MatchReason::Containment)
        );
    }

    #[test]
    fn test_containment_both_directions() {
        assert!(containment_match(&key("Ivanov"), &key("Ivanova Maria")));
        assert!(containment_match(&key("Ivanova Maria"), &key("Ivanov")));
        assert!(!containment_match(&key("Petrov"), &key("Ivanova")));
    }

    #[test]
    fn test_empty_key_is_not_contained() {
        assert!(!containment_match(&key(""), &key("anything")));
        // Two empty keys still match through edit distance
        let config = MatchConfig::default();
        assert_eq!(key_match(&key(""), &key(""), &config), Some(MatchReason::EditDistance(0)));
    }

    #[test]
    fn test_name_match() {
        let a = NameTokens::from_raw("Petrov Ivan Sergeevich").unwrap();
        let b = NameTokens::from_raw("Petrov Ivan S.").unwrap();
        let c = NameTokens::from_raw("Petrov Oleg Sergeevich").unwrap();
        let d = NameTokens::from_raw("Sidorov Ivan Sergeevich").unwrap();

        assert!(name_match(&a, &b)); // middle equal
        assert!(name_match(&a, &c)); // last equal
        assert!(!name_match(&a, &d)); // first differs
        assert!(!name_match(&b, &c));
    }

    #[test]
    fn test_key_match_is_symmetric() {
        let config = MatchConfig::default();
        let samples = ["smith", "smyth", "smithsonian", "", "ab", "Ivan Petrov", "ivanpetrov"];
        for a in samples {
            for b in samples {
                assert_eq!(
                    key_match(&key(a), &key(b), &config),
                    key_match(&key(b), &key(a), &config),
                    "asymmetric for {:?} / {:?}",
                    a,
                    b
                );
            }
        }
    }
}
