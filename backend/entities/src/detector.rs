//! Detector kinds, raw detector output and per-detector options.

use std::fmt;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use parley_core::{DetectedEntity, EntityAlternative};
use serde_json::Value;

// ---------------------------------------------------------------------------
// Raw hits
// ---------------------------------------------------------------------------

/// What a detector reports for one match.
///
/// A hit needs either `text` (located case-insensitively in the text the
/// detector was given) or both `start` and `end` (byte offsets into that
/// text). `value` defaults to the matched text, `score` to 1.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntityHit {
    pub text: Option<String>,
    pub start: Option<usize>,
    pub end: Option<usize>,
    pub value: Option<Value>,
    pub score: Option<f64>,
    pub alternatives: Vec<EntityAlternative>,
}

impl EntityHit {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn span(start: usize, end: usize) -> Self {
        Self {
            start: Some(start),
            end: Some(end),
            ..Self::default()
        }
    }

    pub fn with_value(mut self, value: impl Into<Value>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn with_score(mut self, score: f64) -> Self {
        self.score = Some(score);
        self
    }

    pub fn with_alternatives(mut self, alternatives: Vec<EntityAlternative>) -> Self {
        self.alternatives = alternatives;
        self
    }
}

// ---------------------------------------------------------------------------
// Function detectors
// ---------------------------------------------------------------------------

/// A detector implemented in code.
///
/// Called repeatedly on the unread remainder of the input until it returns
/// no hits. `known` holds everything earlier dependency tiers resolved, in
/// coordinates of the full input.
#[async_trait]
pub trait EntityDetector: Send + Sync {
    async fn detect(
        &self,
        text: &str,
        known: &[DetectedEntity],
        search_sub_words: bool,
    ) -> Result<Vec<EntityHit>>;
}

/// Adapts a synchronous closure to [`EntityDetector`].
pub struct FnDetector<F>(pub F);

#[async_trait]
impl<F> EntityDetector for FnDetector<F>
where
    F: Fn(&str, &[DetectedEntity], bool) -> Result<Vec<EntityHit>> + Send + Sync,
{
    async fn detect(
        &self,
        text: &str,
        known: &[DetectedEntity],
        search_sub_words: bool,
    ) -> Result<Vec<EntityHit>> {
        (self.0)(text, known, search_sub_words)
    }
}

#[derive(Clone)]
pub enum Detector {
    /// Regular expression source; `@NAME` placeholders expand to the texts
    /// of already resolved `NAME` entities.
    Regex(String),
    Function(Arc<dyn EntityDetector>),
}

impl Detector {
    pub fn regex(source: impl Into<String>) -> Self {
        Detector::Regex(source.into())
    }

    pub fn function(detector: impl EntityDetector + 'static) -> Self {
        Detector::Function(Arc::new(detector))
    }

    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(&str, &[DetectedEntity], bool) -> Result<Vec<EntityHit>> + Send + Sync + 'static,
    {
        Detector::function(FnDetector(f))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Detector::Regex(_) => "regex",
            Detector::Function(_) => "function",
        }
    }
}

impl fmt::Debug for Detector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Detector::Regex(source) => f.debug_tuple("Regex").field(source).finish(),
            Detector::Function(_) => f.write_str("Function(..)"),
        }
    }
}

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

pub type ValueFn = Arc<dyn Fn(&str) -> Value + Send + Sync>;

/// How a regex match becomes the entity value.
#[derive(Clone)]
pub enum ValueExtractor {
    /// `"@NAME"` takes the value of the `NAME` entity matched by that
    /// placeholder; any other string names a capture group whose text
    /// becomes the value.
    Group(String),
    /// Maps the matched text to a value.
    Function(ValueFn),
}

impl ValueExtractor {
    pub fn group(name: impl Into<String>) -> Self {
        ValueExtractor::Group(name.into())
    }

    pub fn function<F>(f: F) -> Self
    where
        F: Fn(&str) -> Value + Send + Sync + 'static,
    {
        ValueExtractor::Function(Arc::new(f))
    }
}

impl fmt::Debug for ValueExtractor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueExtractor::Group(name) => f.debug_tuple("Group").field(name).finish(),
            ValueExtractor::Function(_) => f.write_str("Function(..)"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DetectorOptions {
    /// Replace matches with `@NAME` in the text returned by `resolve`.
    pub anonymize: bool,
    /// Entity names that must be resolved before this detector runs.
    pub dependencies: Vec<String>,
    /// Hits remove overlapping candidates found by earlier tiers.
    pub clear_overlaps: bool,
    pub match_whole_words: bool,
    pub replace_diacritics: bool,
    pub case_sensitive_regex: bool,
    pub extract_value: Option<ValueExtractor>,
    /// Run a second pass that may report matches inside longer words.
    pub search_sub_words: bool,
}

impl Default for DetectorOptions {
    fn default() -> Self {
        Self {
            anonymize: false,
            dependencies: Vec::new(),
            clear_overlaps: false,
            match_whole_words: true,
            replace_diacritics: true,
            case_sensitive_regex: false,
            extract_value: None,
            search_sub_words: false,
        }
    }
}

impl DetectorOptions {
    pub fn anonymized(mut self) -> Self {
        self.anonymize = true;
        self
    }

    pub fn depends_on<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn clearing_overlaps(mut self) -> Self {
        self.clear_overlaps = true;
        self
    }

    pub fn extract(mut self, extractor: ValueExtractor) -> Self {
        self.extract_value = Some(extractor);
        self
    }

    pub fn with_sub_words(mut self) -> Self {
        self.search_sub_words = true;
        self
    }

    /// Overwrite every field the patch sets.
    pub fn apply(&mut self, patch: DetectorOptionsPatch) {
        if let Some(v) = patch.anonymize {
            self.anonymize = v;
        }
        if let Some(v) = patch.dependencies {
            self.dependencies = v;
        }
        if let Some(v) = patch.clear_overlaps {
            self.clear_overlaps = v;
        }
        if let Some(v) = patch.match_whole_words {
            self.match_whole_words = v;
        }
        if let Some(v) = patch.replace_diacritics {
            self.replace_diacritics = v;
        }
        if let Some(v) = patch.case_sensitive_regex {
            self.case_sensitive_regex = v;
        }
        if let Some(v) = patch.extract_value {
            self.extract_value = v;
        }
        if let Some(v) = patch.search_sub_words {
            self.search_sub_words = v;
        }
    }
}

/// Partial update for [`DetectorOptions`]; `None` leaves a field unchanged.
#[derive(Debug, Clone, Default)]
pub struct DetectorOptionsPatch {
    pub anonymize: Option<bool>,
    pub dependencies: Option<Vec<String>>,
    pub clear_overlaps: Option<bool>,
    pub match_whole_words: Option<bool>,
    pub replace_diacritics: Option<bool>,
    pub case_sensitive_regex: Option<bool>,
    pub extract_value: Option<Option<ValueExtractor>>,
    pub search_sub_words: Option<bool>,
}
