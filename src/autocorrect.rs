//! Spelling correction for typed commands
//!
//! Each whitespace-separated token of the input is compared against a fixed
//! vocabulary using normalized Levenshtein similarity. A token is replaced
//! only when its best match scores strictly above the threshold.
//!
//! Voice transcripts never go through here.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Default similarity a token must exceed before it is replaced
pub const DEFAULT_THRESHOLD: f64 = 0.7;

/// Token-level spelling corrector over a command vocabulary
#[derive(Clone, Debug)]
pub struct SpellCorrector {
    /// Known words; ordered so ties resolve the same way every run
    vocabulary: BTreeSet<String>,
    /// Similarity a match must strictly exceed
    threshold: f64,
    /// Whether correction is enabled
    enabled: bool,
}

/// A single token correction
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    /// Position of the token in the input
    pub index: usize,
    /// Token as typed
    pub original: String,
    /// Vocabulary word it would be replaced with
    pub replacement: String,
    /// Similarity score (0.0 - 1.0)
    pub score: f64,
}

impl SpellCorrector {
    /// Create a corrector over `words` with the default threshold
    pub fn new<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::with_threshold(words, DEFAULT_THRESHOLD)
    }

    pub fn with_threshold<I, S>(words: I, threshold: f64) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            vocabulary: words
                .into_iter()
                .map(|w| w.as_ref().trim().to_lowercase())
                .filter(|w| !w.is_empty())
                .collect(),
            threshold,
            enabled: true,
        }
    }

    /// Enable or disable correction
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Add a word to the vocabulary
    pub fn add_word(&mut self, word: &str) {
        let word = word.trim().to_lowercase();
        if !word.is_empty() {
            self.vocabulary.insert(word);
        }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn vocabulary(&self) -> impl Iterator<Item = &str> {
        self.vocabulary.iter().map(|s| s.as_str())
    }

    /// Correct every token of `input`, joining the result with single spaces
    pub fn correct(&self, input: &str) -> String {
        if !self.enabled {
            return input.to_string();
        }

        let suggestions = self.suggest(input);
        input
            .split_whitespace()
            .enumerate()
            .map(|(i, token)| {
                suggestions
                    .iter()
                    .find(|s| s.index == i)
                    .map(|s| s.replacement.as_str())
                    .unwrap_or(token)
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Tokens of `input` that would be replaced, in input order
    pub fn suggest(&self, input: &str) -> Vec<Suggestion> {
        if !self.enabled {
            return vec![];
        }

        input
            .split_whitespace()
            .enumerate()
            .filter_map(|(index, token)| {
                let lowered = token.to_lowercase();
                let (word, score) = self.best_match(&lowered)?;
                // An exact hit keeps the token as typed, case included
                if score <= self.threshold || word == lowered {
                    return None;
                }
                Some(Suggestion {
                    index,
                    original: token.to_string(),
                    replacement: word.to_string(),
                    score,
                })
            })
            .collect()
    }

    fn best_match(&self, token: &str) -> Option<(&str, f64)> {
        let mut best: Option<(&str, f64)> = None;
        for word in &self.vocabulary {
            let score = similarity(token, word);
            if best.map_or(true, |(_, s)| score > s) {
                best = Some((word.as_str(), score));
            }
        }
        best
    }
}

/// Similarity used for correction, 1.0 for identical strings
pub fn similarity(a: &str, b: &str) -> f64 {
    strsim::normalized_levenshtein(a, b)
}

/// One-shot correction without building a [`SpellCorrector`]
pub fn correct(input: &str, vocabulary: &BTreeSet<String>, threshold: f64) -> String {
    SpellCorrector::with_threshold(vocabulary, threshold).correct(input)
}
