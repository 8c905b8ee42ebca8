use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

/// One catalog value that the fuzzy index can recognize.
///
/// `value` is either a string or a number. Identifier entries (product codes,
/// internal ids) are only matchable through their synonyms when they have any.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogEntry {
    pub entity: String,
    pub value: Value,
    #[serde(default)]
    pub synonyms: Vec<String>,
    #[serde(default)]
    pub is_identifier: bool,
}

impl CatalogEntry {
    pub fn new(entity: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            entity: entity.into(),
            value: value.into(),
            synonyms: Vec::new(),
            is_identifier: false,
        }
    }

    pub fn with_synonyms<I, S>(mut self, synonyms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.synonyms = synonyms.into_iter().map(Into::into).collect();
        self
    }

    pub fn identifier(mut self) -> Self {
        self.is_identifier = true;
        self
    }

    /// The value rendered as matchable text.
    pub fn value_text(&self) -> String {
        match &self.value {
            Value::String(s) => s.clone(),
            Value::Null => String::new(),
            other => other.to_string(),
        }
    }

    /// Every surface text the index should learn for this entry.
    pub fn texts(&self) -> Vec<String> {
        if self.is_identifier && !self.synonyms.is_empty() {
            return self.synonyms.clone();
        }
        std::iter::once(self.value_text())
            .chain(self.synonyms.iter().cloned())
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Detection output
// ---------------------------------------------------------------------------

/// A near-tie reading of a detected entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityAlternative {
    pub value: Value,
    pub score: f64,
}

/// A typed, scored span of the input text.
///
/// `start..end` is a half-open byte range over the text the caller passed in;
/// both ends always fall on char boundaries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedEntity {
    pub entity: String,
    pub value: Value,
    pub text: String,
    pub start: usize,
    pub end: usize,
    pub score: f64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub alternatives: Vec<EntityAlternative>,
}

impl DetectedEntity {
    pub fn new(
        entity: impl Into<String>,
        value: impl Into<Value>,
        text: impl Into<String>,
        start: usize,
        end: usize,
    ) -> Self {
        Self {
            entity: entity.into(),
            value: value.into(),
            text: text.into(),
            start,
            end,
            score: 1.0,
            alternatives: Vec::new(),
        }
    }

    pub fn with_score(mut self, score: f64) -> Self {
        self.score = score;
        self
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    /// Half-open interval intersection.
    pub fn overlaps(&self, other: &DetectedEntity) -> bool {
        self.start < other.end && self.end > other.start
    }

    pub fn same_span(&self, other: &DetectedEntity) -> bool {
        self.start == other.start && self.end == other.end
    }

    /// Move the span by `offset` bytes (window → original text coordinates).
    pub fn shifted(mut self, offset: usize) -> Self {
        self.start += offset;
        self.end += offset;
        self
    }
}

impl fmt::Display for DetectedEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}[{}..{}]={} ({:.4})",
            self.entity, self.start, self.end, self.value, self.score
        )
    }
}
