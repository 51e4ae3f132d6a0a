//! Intent resolution
//!
//! Three ways to land on an intent:
//! - phrase mode for corrected typed sentences ("create catalog sales")
//! - keyword mode for voice transcripts and quick picks
//! - selection by id from the dropdown
//!
//! Matching is case-insensitive substring containment on whitespace-normalized
//! text, so "catalogs" or "insights." still hit. The catalog is walked in
//! order and the first hit wins.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::intents::{Intent, IntentCatalog};

/// How a transcript is matched against the catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolveMode {
    Phrase,
    Keyword,
}

/// Lower-case and collapse runs of whitespace
pub fn normalize(text: &str) -> String {
    text.split_whitespace()
        .map(|w| w.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Containment of `needle` in already-normalized `haystack`
fn contains_phrase(haystack: &str, needle: &str) -> bool {
    let needle = normalize(needle);
    !needle.is_empty() && haystack.contains(&needle)
}

pub struct IntentResolver<'a> {
    catalog: &'a IntentCatalog,
}

impl<'a> IntentResolver<'a> {
    pub fn new(catalog: &'a IntentCatalog) -> Self {
        Self { catalog }
    }

    pub fn resolve(&self, transcript: &str, mode: ResolveMode) -> Option<&'a Intent> {
        match mode {
            ResolveMode::Phrase => self.resolve_phrase(transcript),
            ResolveMode::Keyword => self.resolve_keywords(transcript),
        }
    }

    /// First intent whose distinguishing phrase starts or appears in the sentence
    pub fn resolve_phrase(&self, transcript: &str) -> Option<&'a Intent> {
        let text = normalize(transcript);
        let hit = self
            .catalog
            .iter()
            .find(|intent| intent.phrases.iter().any(|p| contains_phrase(&text, p)));
        debug!(mode = "phrase", transcript = %text, intent = ?hit.map(|i| &i.id), "resolved");
        hit
    }

    /// First intent with any keyword present in the transcript
    pub fn resolve_keywords(&self, transcript: &str) -> Option<&'a Intent> {
        let text = normalize(transcript);
        let hit = self
            .catalog
            .iter()
            .find(|intent| intent.keywords.iter().any(|k| contains_phrase(&text, k)));
        debug!(mode = "keyword", transcript = %text, intent = ?hit.map(|i| &i.id), "resolved");
        hit
    }

    /// Dropdown selection: exact id lookup
    pub fn resolve_selection(&self, intent_id: &str) -> Option<&'a Intent> {
        self.catalog.get(intent_id.trim())
    }
}
