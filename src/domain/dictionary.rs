//! Dictionary word lists as a source of candidate names.
//!
//! A word list has one term per line. Lines may carry extra comma-separated
//! fields after the term; only the first field is used. Blank lines and lines
//! starting with `#` are skipped.

use std::collections::HashSet;

/// Longest DNS label.
pub const MAX_LABEL_LEN: usize = 63;

/// Terms read from a word list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dictionary {
    /// Valid terms, lowercased, first occurrence order, no duplicates.
    pub terms: Vec<String>,
    /// `(line number, line)` of every line that is not a valid label.
    pub rejected: Vec<(usize, String)>,
}

impl Dictionary {
    pub fn parse(text: &str) -> Self {
        let mut seen = HashSet::new();
        let mut dictionary = Self::default();

        for (index, line) in text.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            let term = trimmed
                .split(',')
                .next()
                .unwrap_or_default()
                .trim()
                .to_ascii_lowercase();

            if !is_label(&term) {
                dictionary.rejected.push((index + 1, line.to_string()));
                continue;
            }
            if seen.insert(term.clone()) {
                dictionary.terms.push(term);
            }
        }

        dictionary
    }

    /// Every concatenation of two terms (a term with itself included) that is
    /// still a valid label, without duplicates.
    pub fn pairs(&self) -> Vec<String> {
        let mut seen = HashSet::new();

        self.terms
            .iter()
            .flat_map(|a| self.terms.iter().map(move |b| format!("{a}{b}")))
            .filter(|name| name.len() <= MAX_LABEL_LEN)
            .filter(|name| seen.insert(name.clone()))
            .collect()
    }
}

/// `a-z`, `0-9` and `-`, at most [`MAX_LABEL_LEN`] long, no leading or
/// trailing `-`.
pub fn is_label(term: &str) -> bool {
    !term.is_empty()
        && term.len() <= MAX_LABEL_LEN
        && !term.starts_with('-')
        && !term.ends_with('-')
        && term
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
}
