//! Intent definitions
//!
//! An intent is a named administrative action plus the parameters it needs.
//! Each page owns an ordered [`IntentCatalog`]; order matters because the
//! resolver picks the first match.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// A parameter slot declared by an intent
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ParamSpec {
    /// Parameter name, e.g. `catalogName`
    pub name: String,
    /// Whether the command can run without it
    #[serde(default = "default_true")]
    pub required: bool,
    /// Hint shown in help text and the selection form
    #[serde(default)]
    pub placeholder: Option<String>,
}

fn default_true() -> bool {
    true
}

impl ParamSpec {
    pub fn required(name: &str) -> Self {
        Self {
            name: name.to_string(),
            required: true,
            placeholder: None,
        }
    }

    pub fn optional(name: &str) -> Self {
        Self {
            name: name.to_string(),
            required: false,
            placeholder: None,
        }
    }

    pub fn with_placeholder(mut self, placeholder: &str) -> Self {
        self.placeholder = Some(placeholder.to_string());
        self
    }
}

/// An administrative action the console understands
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Intent {
    /// Stable id, e.g. `create_catalog`
    pub id: String,
    /// Human-readable label
    pub label: String,
    /// Distinguishing phrases for typed sentences ("create catalog")
    #[serde(default)]
    pub phrases: Vec<String>,
    /// Keywords for dropdown and voice matching
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Declared parameters, in display order
    #[serde(default)]
    pub parameters: Vec<ParamSpec>,
}

impl Intent {
    pub fn new(id: &str, label: &str) -> Self {
        Self {
            id: id.to_string(),
            label: label.to_string(),
            phrases: vec![],
            keywords: vec![],
            parameters: vec![],
        }
    }

    pub fn phrases(mut self, phrases: &[&str]) -> Self {
        self.phrases = phrases.iter().map(|p| p.to_string()).collect();
        self
    }

    pub fn keywords(mut self, keywords: &[&str]) -> Self {
        self.keywords = keywords.iter().map(|k| k.to_string()).collect();
        self
    }

    pub fn param(mut self, spec: ParamSpec) -> Self {
        self.parameters.push(spec);
        self
    }

    pub fn param_spec(&self, name: &str) -> Option<&ParamSpec> {
        self.parameters.iter().find(|p| p.name == name)
    }

    /// One-line description used by the help listing
    pub fn usage(&self) -> String {
        if self.parameters.is_empty() {
            return self.label.clone();
        }
        let params: Vec<String> = self
            .parameters
            .iter()
            .map(|p| {
                if p.required {
                    p.name.clone()
                } else {
                    format!("{} (optional)", p.name)
                }
            })
            .collect();
        format!("{}: {}", self.label, params.join(", "))
    }
}

/// Ordered list of intents owned by one page
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IntentCatalog {
    intents: Vec<Intent>,
}

impl IntentCatalog {
    pub fn new(intents: Vec<Intent>) -> Self {
        Self { intents }
    }

    /// Parse a catalog from a YAML list of intents
    pub fn from_yaml(content: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(content)
    }

    /// Load a catalog from a YAML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        let content = fs::read_to_string(path)?;
        Ok(Self::from_yaml(&content)?)
    }

    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }

    pub fn get(&self, id: &str) -> Option<&Intent> {
        self.intents.iter().find(|i| i.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Intent> {
        self.intents.iter()
    }

    pub fn len(&self) -> usize {
        self.intents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.intents.is_empty()
    }

    /// Every distinct word in phrases and keywords, lower-cased
    pub fn vocabulary(&self) -> Vec<String> {
        let mut words: Vec<String> = self
            .intents
            .iter()
            .flat_map(|i| i.phrases.iter().chain(i.keywords.iter()))
            .flat_map(|p| p.split_whitespace())
            .map(|w| w.to_lowercase())
            .collect();
        words.sort();
        words.dedup();
        words
    }
}

/// Parameter values for the one command in flight
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParameterBag {
    values: BTreeMap<String, String>,
}

impl ParameterBag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(|v| v.as_str())
    }

    /// Value with surrounding whitespace removed, `None` when blank
    pub fn get_trimmed(&self, name: &str) -> Option<&str> {
        self.get(name).map(str::trim).filter(|v| !v.is_empty())
    }

    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        self.values.insert(name.to_string(), value.into());
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.values.remove(name)
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ParameterBag {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self {
            values: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> IntentCatalog {
        IntentCatalog::new(vec![
            Intent::new("create_schema", "Create Schema")
                .phrases(&["create schema"])
                .keywords(&["create schema", "new schema"])
                .param(ParamSpec::required("name"))
                .param(ParamSpec::required("catalogName"))
                .param(ParamSpec::optional("comment")),
            Intent::new("analyze_workspace", "Analyze Workspace").keywords(&["analyze"]),
        ])
    }

    #[test]
    fn test_lookup_and_order() {
        let catalog = sample();
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.iter().next().map(|i| i.id.as_str()), Some("create_schema"));
        assert!(catalog.get("analyze_workspace").is_some());
        assert!(catalog.get("drop_everything").is_none());
    }

    #[test]
    fn test_usage_marks_optional() {
        let catalog = sample();
        let intent = catalog.get("create_schema").unwrap();
        assert_eq!(
            intent.usage(),
            "Create Schema: name, catalogName, comment (optional)"
        );
        assert_eq!(catalog.get("analyze_workspace").unwrap().usage(), "Analyze Workspace");
    }

    #[test]
    fn test_vocabulary_is_deduped() {
        let vocab = sample().vocabulary();
        assert_eq!(vocab, vec!["analyze", "create", "new", "schema"]);
    }

    #[test]
    fn test_yaml_defaults_required() {
        let yaml = r#"
- id: delete_catalog
  label: Delete Catalog
  keywords: ["delete catalog"]
  parameters:
    - name: name
    - name: force
      required: false
"#;
        let catalog = IntentCatalog::from_yaml(yaml).unwrap();
        let intent = catalog.get("delete_catalog").unwrap();
        assert!(intent.param_spec("name").unwrap().required);
        assert!(!intent.param_spec("force").unwrap().required);
        assert!(intent.phrases.is_empty());
    }

    #[test]
    fn test_bag_trimmed_values() {
        let mut bag: ParameterBag = [("name", "  s1 "), ("comment", "   ")].into_iter().collect();
        assert_eq!(bag.get_trimmed("name"), Some("s1"));
        assert_eq!(bag.get_trimmed("comment"), None);
        assert!(bag.contains("comment"));
        bag.clear();
        assert!(bag.is_empty());
    }

    #[test]
    fn test_yaml_round_trip_preserves_order() {
        let catalog = sample();
        let yaml = catalog.to_yaml().unwrap();
        assert_eq!(IntentCatalog::from_yaml(&yaml).unwrap(), catalog);
    }
}
