//! Detector registry and per-call resolution.
//!
//! Detectors run in dependency tiers: every detector whose dependencies are
//! resolved runs concurrently with the rest of its tier, and the next tier
//! sees everything found so far. Detector failures are logged and isolated;
//! a call to [`EntityResolver::resolve_entities`] never fails.

use futures::future::join_all;
use parley_core::{DetectedEntity, NluError, Result};
use parley_logging::{DetectionEvent, DetectionEventLogger};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, trace};

use crate::detector::{Detector, DetectorOptions, DetectorOptionsPatch, EntityHit, ValueExtractor};
use crate::overlap::non_overlapping;
use crate::pattern::{CompiledPattern, FoldedText, PatternCache, PatternFlags, PatternMatch, PatternTemplate};

/// Calls one detector may receive per pass over a text.
pub const MAX_DETECTOR_ITERATIONS: usize = 50;

/// Output of [`EntityResolver::resolve`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedText {
    /// Input with anonymized spans replaced by `@NAME`.
    pub text: String,
    pub entities: Vec<DetectedEntity>,
}

struct Registration {
    name: String,
    detector: Detector,
    template: Option<PatternTemplate>,
    options: DetectorOptions,
}

impl Registration {
    /// Declared dependencies plus every placeholder the pattern uses.
    fn dependencies(&self) -> Vec<String> {
        let mut deps = self.options.dependencies.clone();
        if let Some(template) = &self.template {
            for name in template.entities() {
                if !deps.iter().any(|d| d.eq_ignore_ascii_case(&name)) {
                    deps.push(name);
                }
            }
        }
        deps
    }

    fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(NluError::detector_config(&self.name, "detector name is empty"));
        }
        for dep in self.dependencies() {
            if dep.trim().is_empty() {
                return Err(NluError::detector_config(&self.name, "empty dependency name"));
            }
            if dep.eq_ignore_ascii_case(&self.name) {
                return Err(NluError::detector_config(&self.name, "detector depends on itself"));
            }
        }

        let probe = match &self.template {
            Some(template) => Some(template.probe().map_err(|e| NluError::Pattern {
                detector: self.name.clone(),
                message: e.to_string(),
            })?),
            None => None,
        };

        if let Some(ValueExtractor::Group(group)) = &self.options.extract_value {
            let (Some(template), Some(probe)) = (&self.template, &probe) else {
                return Err(NluError::detector_config(
                    &self.name,
                    format!("extractValue group '{group}' needs a regex detector"),
                ));
            };
            let known = if group.starts_with('@') {
                template.has_placeholder(group)
            } else {
                probe.capture_names().flatten().any(|n| n == group)
            };
            if !known {
                return Err(NluError::detector_config(
                    &self.name,
                    format!("extractValue '{group}' does not appear in pattern '{}'", template.source()),
                ));
            }
        }
        Ok(())
    }
}

/// Registry of named entity detectors.
///
/// Registration takes `&mut self`; resolution takes `&self`, so a fully
/// configured resolver can be shared behind an `Arc` by concurrent callers.
pub struct EntityResolver {
    detectors: Vec<Registration>,
    patterns: PatternCache,
    max_iterations: usize,
}

impl Default for EntityResolver {
    fn default() -> Self {
        Self {
            detectors: Vec::new(),
            patterns: PatternCache::new(),
            max_iterations: MAX_DETECTOR_ITERATIONS,
        }
    }
}

impl EntityResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations.max(1);
        self
    }

    /// Register or replace the detector for `name`.
    pub fn set_entity_detector(
        &mut self,
        name: impl Into<String>,
        detector: Detector,
        options: DetectorOptions,
    ) -> Result<()> {
        let name = name.into();
        let template = match &detector {
            Detector::Regex(source) => Some(PatternTemplate::parse(source)),
            Detector::Function(_) => None,
        };
        let registration = Registration {
            name,
            detector,
            template,
            options,
        };
        registration.validate()?;

        debug!(
            detector = %registration.name,
            kind = registration.detector.kind(),
            dependencies = ?registration.dependencies(),
            "Registered entity detector"
        );
        match self.detectors.iter_mut().find(|r| r.name == registration.name) {
            Some(slot) => *slot = registration,
            None => self.detectors.push(registration),
        }
        Ok(())
    }

    /// Overwrite selected options of a registered detector.
    pub fn set_detector_options(&mut self, name: &str, patch: DetectorOptionsPatch) -> Result<()> {
        let slot = self
            .detectors
            .iter_mut()
            .find(|r| r.name == name)
            .ok_or_else(|| NluError::UnknownDetector(name.to_string()))?;
        let previous = slot.options.clone();
        slot.options.apply(patch);
        if let Err(e) = slot.validate() {
            slot.options = previous;
            return Err(e);
        }
        Ok(())
    }

    pub fn has_detector(&self, name: &str) -> bool {
        self.detectors.iter().any(|r| r.name == name)
    }

    pub fn detector_names(&self) -> Vec<&str> {
        self.detectors.iter().map(|r| r.name.as_str()).collect()
    }

    pub fn options(&self, name: &str) -> Option<&DetectorOptions> {
        self.detectors.iter().find(|r| r.name == name).map(|r| &r.options)
    }

    fn is_registered(&self, name: &str) -> bool {
        self.detectors.iter().any(|r| r.name.eq_ignore_ascii_case(name))
    }

    // -----------------------------------------------------------------------
    // Resolution
    // -----------------------------------------------------------------------

    /// Run every detector over `text` and reduce the candidates to a
    /// non-overlapping set ordered by start. `expected` names entity types
    /// that win overlaps.
    pub async fn resolve_entities(&self, text: &str, expected: &[String]) -> Vec<DetectedEntity> {
        let mut pending: Vec<&Registration> = self.detectors.iter().collect();
        let mut resolved: Vec<String> = Vec::new();
        let mut candidates: Vec<DetectedEntity> = Vec::new();

        while !pending.is_empty() {
            let (ready, waiting): (Vec<&Registration>, Vec<&Registration>) =
                pending.into_iter().partition(|r| {
                    r.dependencies().iter().all(|dep| {
                        resolved.iter().any(|name| name.eq_ignore_ascii_case(dep))
                            || !self.is_registered(dep)
                    })
                });
            if ready.is_empty() {
                DetectionEventLogger::log_event(DetectionEvent::DependencyCycle {
                    detectors: waiting.iter().map(|r| r.name.clone()).collect(),
                });
                break;
            }

            let known = &candidates;
            let tier = join_all(ready.iter().map(|r| self.run_detector(r, text, known))).await;

            for (registration, hits) in ready.iter().zip(&tier) {
                if registration.options.clear_overlaps && !hits.is_empty() {
                    candidates.retain(|c| !hits.iter().any(|h| h.overlaps(c)));
                }
            }
            candidates.extend(tier.into_iter().flatten());
            resolved.extend(ready.iter().map(|r| r.name.clone()));
            pending = waiting;
        }

        trace!(candidates = candidates.len(), "Resolving overlaps");
        non_overlapping(candidates, expected, false)
    }

    /// Resolve entities and anonymize the text.
    pub async fn resolve(&self, text: &str, expected: &[String]) -> ResolvedText {
        let entities = self.resolve_entities(text, expected).await;
        let text = self.anonymize(text, &entities);
        ResolvedText { text, entities }
    }

    /// Value of the first `entity` found in `text`, preferring that type in
    /// overlaps.
    pub async fn resolve_entity_value(&self, entity: &str, text: &str) -> Result<Option<Value>> {
        if !self.has_detector(entity) {
            return Err(NluError::UnknownDetector(entity.to_string()));
        }
        let expected = [entity.to_string()];
        Ok(self
            .resolve_entities(text, &expected)
            .await
            .into_iter()
            .find(|e| e.entity == entity)
            .map(|e| e.value))
    }

    /// Replace anonymized spans right to left; a span is replaced once.
    fn anonymize(&self, text: &str, entities: &[DetectedEntity]) -> String {
        let mut spans: Vec<(usize, usize, String)> = entities
            .iter()
            .filter(|e| self.options(&e.entity).is_some_and(|o| o.anonymize))
            .map(|e| (e.start, e.end, format!("@{}", e.entity.to_uppercase())))
            .collect();
        spans.sort_by(|a, b| b.0.cmp(&a.0).then(b.1.cmp(&a.1)));

        let mut out = text.to_string();
        let mut floor = usize::MAX;
        for (start, end, token) in spans {
            if end > floor || end > out.len() {
                continue;
            }
            out.replace_range(start..end, &token);
            floor = start;
        }
        out
    }

    // -----------------------------------------------------------------------
    // Single detector
    // -----------------------------------------------------------------------

    async fn run_detector(
        &self,
        registration: &Registration,
        text: &str,
        known: &[DetectedEntity],
    ) -> Vec<DetectedEntity> {
        let mut found = match self.scan(registration, text, known, false).await {
            Ok(found) => found,
            Err(e) => {
                report(registration, text, e);
                return Vec::new();
            }
        };

        if registration.options.search_sub_words {
            match self.scan(registration, text, known, true).await {
                Ok(sub) => {
                    let nested: Vec<DetectedEntity> = sub
                        .into_iter()
                        .filter(|s| !found.iter().any(|f| f.overlaps(s)))
                        .collect();
                    found.extend(nested);
                }
                Err(e) => {
                    report(registration, text, e);
                    return Vec::new();
                }
            }
        }

        debug!(detector = %registration.name, hits = found.len(), "Detector finished");
        found
    }

    /// Call the detector on successive remainders of `text`.
    async fn scan(
        &self,
        registration: &Registration,
        text: &str,
        known: &[DetectedEntity],
        sub_words: bool,
    ) -> Result<Vec<DetectedEntity>> {
        let compiled = match &registration.template {
            Some(template) => {
                let flags = PatternFlags {
                    whole_words: registration.options.match_whole_words && !sub_words,
                    fold: registration.options.replace_diacritics,
                    case_sensitive: registration.options.case_sensitive_regex,
                };
                let compiled = self.patterns.compile(template, known, flags).map_err(|e| {
                    NluError::Pattern {
                        detector: registration.name.clone(),
                        message: e.to_string(),
                    }
                })?;
                Some(compiled)
            }
            None => None,
        };

        let mut found = Vec::new();
        let mut offset = 0;
        for _ in 0..self.max_iterations {
            let window = &text[offset..];
            if window.is_empty() {
                break;
            }
            let hits = match (&registration.detector, &compiled) {
                (Detector::Function(detector), _) => detector
                    .detect(window, known, sub_words)
                    .await
                    .map_err(NluError::Other)?,
                (Detector::Regex(_), Some(pattern)) => pattern
                    .find(window)
                    .map(|m| regex_hit(registration, pattern, &m, window, known))
                    .into_iter()
                    .collect(),
                (Detector::Regex(_), None) => Vec::new(),
            };
            if hits.is_empty() {
                break;
            }

            let mut furthest = 0;
            for hit in hits {
                if let Some(entity) = normalize_hit(registration, window, hit)? {
                    furthest = furthest.max(entity.end);
                    found.push(entity.shifted(offset));
                }
            }
            if furthest == 0 {
                break;
            }
            offset += furthest;
            let rest = &text[offset..];
            offset += rest.len() - rest.trim_start().len();
        }
        Ok(found)
    }
}

fn report(registration: &Registration, text: &str, error: NluError) {
    let event = match error {
        NluError::DetectorContract { detector, message } => {
            DetectionEvent::ContractViolation { detector, message }
        }
        other => DetectionEvent::DetectorFailed {
            detector: registration.name.clone(),
            error: other.to_string(),
            text: text.to_string(),
        },
    };
    DetectionEventLogger::log_event(event);
}

fn regex_hit(
    registration: &Registration,
    pattern: &CompiledPattern,
    m: &PatternMatch,
    window: &str,
    known: &[DetectedEntity],
) -> EntityHit {
    let matched = &window[m.start..m.end];
    let value = match &registration.options.extract_value {
        None => Value::String(matched.to_string()),
        Some(ValueExtractor::Function(f)) => f(matched),
        Some(ValueExtractor::Group(group)) => match group.strip_prefix('@') {
            Some(entity) => placeholder_value(pattern, m, window, entity, known)
                .unwrap_or_else(|| Value::String(matched.to_string())),
            None => m
                .group(group)
                .map(|(s, e)| Value::String(window[s..e].to_string()))
                .unwrap_or_else(|| Value::String(matched.to_string())),
        },
    };
    EntityHit::span(m.start, m.end).with_value(value)
}

/// Value of the known entity whose text the `@entity` placeholder matched.
fn placeholder_value(
    pattern: &CompiledPattern,
    m: &PatternMatch,
    window: &str,
    entity: &str,
    known: &[DetectedEntity],
) -> Option<Value> {
    let (start, end) = pattern
        .placeholder_groups
        .iter()
        .filter(|(_, name)| name.eq_ignore_ascii_case(entity))
        .find_map(|(group, _)| m.group(group))?;
    let captured = comparable(&window[start..end]);
    known
        .iter()
        .filter(|k| k.entity.eq_ignore_ascii_case(entity))
        .find(|k| comparable(&k.text) == captured)
        .map(|k| k.value.clone())
        .or_else(|| Some(Value::String(window[start..end].to_string())))
}

fn comparable(text: &str) -> String {
    FoldedText::new(&text.to_lowercase()).text
}

fn contract(registration: &Registration, message: String) -> NluError {
    NluError::contract(&registration.name, message)
}

/// Validate a raw hit against `window` and turn it into an entity in window
/// coordinates. Zero-length hits yield `Ok(None)`.
fn normalize_hit(
    registration: &Registration,
    window: &str,
    hit: EntityHit,
) -> Result<Option<DetectedEntity>> {
    let (start, end) = match (hit.start, hit.end, &hit.text) {
        (Some(start), Some(end), _) => {
            if end < start {
                return Err(contract(registration, format!("end {end} precedes start {start}")));
            }
            if end > window.len() {
                return Err(contract(
                    registration,
                    format!("span {start}..{end} exceeds text of length {}", window.len()),
                ));
            }
            if !window.is_char_boundary(start) || !window.is_char_boundary(end) {
                return Err(contract(
                    registration,
                    format!("span {start}..{end} splits a character"),
                ));
            }
            (start, end)
        }
        (_, _, Some(text)) => {
            if text.is_empty() {
                return Ok(None);
            }
            find_case_insensitive(window, text).ok_or_else(|| {
                contract(registration, format!("hit text '{text}' not found in input"))
            })?
        }
        _ => {
            return Err(contract(
                registration,
                "hit has neither text nor start and end".to_string(),
            ))
        }
    };
    if start == end {
        return Ok(None);
    }

    let text = &window[start..end];
    let score = match hit.score {
        Some(s) if s.is_nan() => 0.0,
        Some(s) => s.clamp(0.0, 1.0),
        None => 1.0,
    };
    let value = match (hit.value, &registration.options.extract_value) {
        (Some(value), _) => value,
        (None, Some(ValueExtractor::Function(f))) => f(text),
        (None, _) => Value::String(text.to_string()),
    };
    Ok(Some(DetectedEntity {
        entity: registration.name.clone(),
        value,
        text: text.to_string(),
        start,
        end,
        score,
        alternatives: hit.alternatives,
    }))
}

/// Byte span of the first case-insensitive occurrence of `needle`.
fn find_case_insensitive(haystack: &str, needle: &str) -> Option<(usize, usize)> {
    let same = |a: char, b: char| a == b || a.to_lowercase().eq(b.to_lowercase());
    for (i, _) in haystack.char_indices() {
        let mut rest = haystack[i..].char_indices();
        let mut end = i;
        let matched = needle.chars().all(|n| match rest.next() {
            Some((j, h)) if same(h, n) => {
                end = i + j + h.len_utf8();
                true
            }
            _ => false,
        });
        if matched {
            return Some((i, end));
        }
    }
    None
}
