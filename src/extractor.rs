//! Parameter extraction
//!
//! Slots are filled from free text by a declarative table of
//! `(intent id, parameter) -> rule` entries. Rules for the same slot are
//! tried in table order and the first one that yields a value wins.
//!
//! Values are taken as written. Privilege lists are not split and JSON
//! payloads are not parsed here; the dispatcher does that at the point of use.

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::intents::{Intent, ParameterBag};

/// Words that introduce another slot and so are never a value themselves
const STOPWORDS: &[&str] = &[
    "a", "an", "and", "as", "called", "catalog", "columns", "comment", "for", "from", "in",
    "into", "metadata", "named", "of", "on", "schema", "table", "the", "to", "with",
];

/// What to take once a label has been found
#[derive(Clone, Debug, PartialEq)]
pub enum Capture {
    /// Next token, trailing punctuation and quotes stripped
    Word,
    /// A quoted string, or everything up to the end of the input
    Text,
    /// Everything up to the first of these words (or the end)
    Until(Vec<String>),
    /// A balanced JSON array/object, or the next token if there is none
    Json,
}

/// How one slot is located in the transcript
#[derive(Clone, Debug)]
pub enum ExtractionRule {
    /// Text following a label phrase, e.g. `name sales`
    Labeled { label: Regex, capture: Capture },
    /// First capture group of a raw pattern
    Pattern(Regex),
}

impl ExtractionRule {
    /// Build a labeled rule; multi-word labels tolerate any whitespace run
    pub fn labeled(label: &str, capture: Capture) -> Result<Self, regex::Error> {
        let words: Vec<String> = label.split_whitespace().map(regex::escape).collect();
        let label = Regex::new(&format!(r"(?i)\b{}\b\s*[:=]?\s*", words.join(r"\s+")))?;
        Ok(ExtractionRule::Labeled { label, capture })
    }

    pub fn pattern(pattern: &str) -> Result<Self, regex::Error> {
        Ok(ExtractionRule::Pattern(Regex::new(pattern)?))
    }

    /// Apply the rule, `None` when nothing usable matched
    pub fn apply(&self, text: &str) -> Option<String> {
        match self {
            ExtractionRule::Labeled { label, capture } => label
                .find_iter(text)
                .filter_map(|m| capture_value(&text[m.end()..], capture))
                .find(|v| !is_stopword(v)),
            ExtractionRule::Pattern(re) => re
                .captures(text)
                .and_then(|c| c.get(1))
                .map(|m| clean_word(m.as_str()))
                .filter(|v| !v.is_empty()),
        }
    }
}

fn is_stopword(value: &str) -> bool {
    STOPWORDS.contains(&value.to_lowercase().as_str())
}

fn clean_word(word: &str) -> String {
    word.trim_end_matches([',', ';', '.', '!', '?'])
        .trim_matches(['"', '\''])
        .to_string()
}

fn capture_value(rest: &str, capture: &Capture) -> Option<String> {
    let rest = rest.trim_start();
    if rest.is_empty() {
        return None;
    }
    let value = match capture {
        Capture::Word => clean_word(rest.split_whitespace().next()?),
        Capture::Text => quoted(rest).unwrap_or_else(|| rest.trim_end().to_string()),
        Capture::Until(stops) => {
            let lowered: Vec<String> = rest.split_whitespace().map(|w| w.to_lowercase()).collect();
            let end = lowered
                .iter()
                .position(|w| stops.iter().any(|s| s == w))
                .unwrap_or(lowered.len());
            rest.split_whitespace().take(end).collect::<Vec<_>>().join(" ")
        }
        Capture::Json => balanced_json(rest)
            .or_else(|| rest.split_whitespace().next().map(str::to_string))?,
    };
    let value = value.trim().to_string();
    (!value.is_empty()).then_some(value)
}

fn quoted(text: &str) -> Option<String> {
    let quote = text.chars().next().filter(|c| *c == '"' || *c == '\'')?;
    let body = &text[1..];
    body.find(quote).map(|end| body[..end].to_string())
}

/// Slice out a bracket-balanced JSON value starting at the first character
fn balanced_json(text: &str) -> Option<String> {
    let open = text.chars().next().filter(|c| *c == '[' || *c == '{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in text.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '[' | '{' => depth += 1,
            ']' | '}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(text[..=i].to_string());
                }
            }
            _ => {}
        }
    }
    // Unbalanced: hand the raw tail over and let the dispatcher reject it
    trace!(open = %open, "unbalanced json payload");
    Some(text.trim_end().to_string())
}

/// Ambient values a page supplies when the user leaves them out
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PageContext {
    /// Catalog currently open on the page
    pub catalog: Option<String>,
    /// Schema currently open on the page
    pub schema: Option<String>,
}

impl PageContext {
    pub fn with_catalog(catalog: &str) -> Self {
        Self {
            catalog: Some(catalog.to_string()),
            schema: None,
        }
    }

    pub fn schema(mut self, schema: &str) -> Self {
        self.schema = Some(schema.to_string());
        self
    }

    /// Default for a parameter name, if the page has one
    pub fn default_for(&self, param: &str) -> Option<&str> {
        match param {
            "catalogName" => self.catalog.as_deref(),
            "schemaName" => self.schema.as_deref(),
            _ => None,
        }
    }
}

#[derive(Clone, Debug)]
struct TableEntry {
    intent_id: String,
    param: String,
    rule: ExtractionRule,
}

/// Declarative `(intent, parameter) -> rule` table
#[derive(Clone, Debug, Default)]
pub struct ExtractionTable {
    entries: Vec<TableEntry>,
}

impl ExtractionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rule(mut self, intent_id: &str, param: &str, rule: ExtractionRule) -> Self {
        self.entries.push(TableEntry {
            intent_id: intent_id.to_string(),
            param: param.to_string(),
            rule,
        });
        self
    }

    /// Shorthand for one labeled rule per label, in order
    pub fn labeled(
        mut self,
        intent_id: &str,
        param: &str,
        labels: &[&str],
        capture: Capture,
    ) -> Result<Self, regex::Error> {
        for label in labels {
            self = self.rule(intent_id, param, ExtractionRule::labeled(label, capture.clone())?);
        }
        Ok(self)
    }

    pub fn pattern(self, intent_id: &str, param: &str, pattern: &str) -> Result<Self, regex::Error> {
        Ok(self.rule(intent_id, param, ExtractionRule::pattern(pattern)?))
    }

    /// Rules registered for one slot, in trial order
    pub fn rules_for<'a>(
        &'a self,
        intent_id: &'a str,
        param: &'a str,
    ) -> impl Iterator<Item = &'a ExtractionRule> + 'a {
        self.entries
            .iter()
            .filter(move |e| e.intent_id == intent_id && e.param == param)
            .map(|e| &e.rule)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub struct ParameterExtractor<'a> {
    table: &'a ExtractionTable,
    context: &'a PageContext,
}

impl<'a> ParameterExtractor<'a> {
    pub fn new(table: &'a ExtractionTable, context: &'a PageContext) -> Self {
        Self { table, context }
    }

    /// Fill a bag for `intent` from one pass over `transcript`
    ///
    /// Slots with no match and no page default stay unset.
    pub fn extract(&self, intent: &Intent, transcript: &str) -> ParameterBag {
        let mut bag = ParameterBag::new();
        for spec in &intent.parameters {
            let value = self
                .table
                .rules_for(&intent.id, &spec.name)
                .find_map(|rule| rule.apply(transcript))
                .or_else(|| self.context.default_for(&spec.name).map(str::to_string));
            if let Some(value) = value {
                bag.set(&spec.name, value);
            }
        }
        trace!(intent = %intent.id, params = ?bag, "extracted");
        bag
    }
}
