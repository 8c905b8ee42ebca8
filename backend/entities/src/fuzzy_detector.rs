//! Catalog lookup as an entity detector.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use parley_core::{DetectedEntity, EntityAlternative, NluError};
use parley_fuzzy::{search, FuzzyIndex, MatchCandidate, SearchOptions, WordWindows};

use crate::detector::{Detector, DetectorOptions, EntityDetector, EntityHit};
use crate::resolver::EntityResolver;

/// Finds catalog values of one entity type in free text.
///
/// Windows of consecutive words are searched left to right. The best hit at
/// the first word that yields any is returned. Windows are one word longer
/// than the longest catalog variant so that a leading filler word ("do",
/// "na") can be skipped.
pub struct FuzzyDetector {
    index: Arc<FuzzyIndex>,
    entity: String,
    options: SearchOptions,
}

impl FuzzyDetector {
    pub fn new(index: Arc<FuzzyIndex>, entity: impl Into<String>, options: SearchOptions) -> Self {
        let entity = entity.into();
        let options = SearchOptions {
            entities: Some(vec![entity.clone()]),
            ..options
        };
        Self {
            index,
            entity,
            options,
        }
    }

    pub fn entity(&self) -> &str {
        &self.entity
    }

    fn best_match(&self, text: &str) -> Option<EntityHit> {
        let max_words = self.index.max_word_count() + 1;
        let windows = WordWindows::new(text, max_words);
        let words = windows.words().to_vec();

        let mut best: Option<(MatchCandidate, usize, usize)> = None;
        let mut best_word: Option<usize> = None;
        for (window, offset) in windows {
            if best_word.is_some_and(|w| w != offset) {
                break;
            }
            let Some(top) = search(&self.index, window, &self.options).into_iter().next() else {
                continue;
            };
            let end = offset + window.len();
            // A skipped filler moves the start to the window's second word.
            let start = match top.start {
                Some(_) => words
                    .iter()
                    .map(|&(s, _)| s)
                    .find(|&s| s > offset && s < end)
                    .unwrap_or(offset),
                None => offset,
            };
            best_word = Some(offset);
            if best.as_ref().map_or(true, |(b, _, _)| top.score > b.score) {
                best = Some((top, start, end));
            }
        }

        best.map(|(candidate, start, end)| {
            let alternatives = candidate
                .alternatives
                .into_iter()
                .map(|a| EntityAlternative {
                    value: a.value,
                    score: a.score,
                })
                .collect();
            EntityHit::span(start, end)
                .with_value(candidate.value)
                .with_score(candidate.score)
                .with_alternatives(alternatives)
        })
    }
}

#[async_trait]
impl EntityDetector for FuzzyDetector {
    async fn detect(
        &self,
        text: &str,
        _known: &[DetectedEntity],
        _search_sub_words: bool,
    ) -> Result<Vec<EntityHit>> {
        Ok(self.best_match(text).into_iter().collect())
    }
}

/// Register one [`FuzzyDetector`] per entity name in `index`, each with
/// `detector_options`.
///
/// Fails without registering anything when a detector of the same name
/// already exists.
pub fn register_catalog(
    resolver: &mut EntityResolver,
    index: Arc<FuzzyIndex>,
    search_options: &SearchOptions,
    detector_options: &DetectorOptions,
) -> parley_core::Result<()> {
    let names = index.entity_names();
    if let Some(clash) = names.iter().find(|name| resolver.has_detector(name)) {
        return Err(NluError::detector_config(
            clash.as_str(),
            "catalog entity clashes with an already registered detector",
        ));
    }
    for entity in names {
        let detector = FuzzyDetector::new(Arc::clone(&index), entity.clone(), search_options.clone());
        resolver.set_entity_detector(entity, Detector::function(detector), detector_options.clone())?;
    }
    Ok(())
}
