//! Label-type vocabulary

use labeler_types::{default_label_types, Settings};

/// Ordered list of label types offered to the operator
///
/// Passed explicitly to whatever builds label drafts; there is no global
/// default state.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelVocabulary {
    types: Vec<String>,
}

impl Default for LabelVocabulary {
    fn default() -> Self {
        Self {
            types: default_label_types(),
        }
    }
}

impl LabelVocabulary {
    /// Build from a configured list; blanks are dropped and an empty list
    /// falls back to the built-in vocabulary
    pub fn new<I, S>(types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut cleaned: Vec<String> = Vec::new();
        for t in types {
            let t: String = t.into();
            let t = t.trim();
            if !t.is_empty() && !cleaned.iter().any(|c| c == t) {
                cleaned.push(t.to_string());
            }
        }

        if cleaned.is_empty() {
            tracing::debug!("vocabulary: no label types configured, using defaults");
            return Self::default();
        }
        Self { types: cleaned }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.label_types.iter().cloned())
    }

    /// First entry, used to prefill new labels
    pub fn default_type(&self) -> &str {
        self.types.first().map(String::as_str).unwrap_or("label")
    }

    pub fn contains(&self, label_type: &str) -> bool {
        self.types.iter().any(|t| t == label_type)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.types.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}
