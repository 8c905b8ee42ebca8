//! Ranked approximate lookup against a [`FuzzyIndex`].

use std::collections::HashMap;

use serde::Serialize;
use serde_json::Value;
use tracing::trace;

use crate::index::{short_array_index, FuzzyIndex};
use crate::levenshtein::multiword_levenshtein;
use crate::normalize::{cleanup, pre_normalize, split_to_ngrams};

/// Results scoring below this are dropped unless the caller overrides it.
pub const DEFAULT_THRESHOLD: f64 = 0.835;

/// Empirically tuned matcher constants. The defaults reproduce the reference
/// rankings; override them only with a test corpus at hand.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchTuning {
    /// Primary score multiplier per recorded alternative, also the per-rank
    /// decay of alternative scores.
    pub collision_penalty: f64,
    /// Candidate n-gram count window, as multiples of the query's count.
    pub min_length_ratio: f64,
    pub max_length_ratio: f64,
    /// Minimum shared-n-gram coverage.
    pub coverage: f64,
    pub fuzzy_multiplier_coverage: f64,
    pub seed: f64,
    pub fuzzy_multiplier_seed: f64,
    pub word_koef: f64,
    /// How far below the primary a different value may score and still be
    /// reported as an alternative.
    pub alternative_window: f64,
}

impl Default for SearchTuning {
    fn default() -> Self {
        Self {
            collision_penalty: 0.9,
            min_length_ratio: 0.6,
            max_length_ratio: 1.5,
            coverage: 0.5,
            fuzzy_multiplier_coverage: 0.6,
            seed: 0.25,
            fuzzy_multiplier_seed: -0.25,
            word_koef: 0.6,
            alternative_window: 0.1,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchOptions {
    pub threshold: f64,
    pub limit: Option<usize>,
    /// De-duplicate by entity and value instead of by entity alone.
    pub keep_multiple_values: bool,
    /// Restrict candidates to these entity types.
    pub entities: Option<Vec<String>>,
    pub tuning: SearchTuning,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            limit: None,
            keep_multiple_values: false,
            entities: None,
            tuning: SearchTuning::default(),
        }
    }
}

impl SearchOptions {
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn for_entity(mut self, entity: impl Into<String>) -> Self {
        self.entities = Some(vec![entity.into()]);
        self
    }
}

/// One ranked search hit.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchCandidate {
    pub entity: String,
    pub value: Value,
    pub score: f64,
    /// Bytes of leading filler skipped in the normalized query.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<usize>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub alternatives: Vec<MatchCandidate>,
}

// ---------------------------------------------------------------------------
// Search
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct Accumulator {
    count: usize,
    idf_sum: f64,
}

struct Scored {
    variant: u32,
    score: f64,
    rel_idf: f64,
    start: Option<usize>,
}

fn round4(x: f64) -> f64 {
    (x * 1e4).round() / 1e4
}

/// Query with a leading 1-3 character word removed, plus the bytes removed.
fn strip_filler(query: &str) -> Option<(&str, usize)> {
    let (first, rest) = query.split_once(' ')?;
    if (1..=3).contains(&first.len()) && !rest.is_empty() {
        Some((rest, first.len() + 1))
    } else {
        None
    }
}

/// Rank catalog values approximately matching `query`.
///
/// Every returned score lies in `[options.threshold, 1]`.
pub fn search(index: &FuzzyIndex, query: &str, options: &SearchOptions) -> Vec<MatchCandidate> {
    let tuning = &options.tuning;
    let query_clean = pre_normalize(query);
    let ngrams = split_to_ngrams(&cleanup(query, index.stemmer()));
    let q = ngrams.len();
    if q == 0 || index.is_empty() {
        return Vec::new();
    }

    // Bucket window, only consulted for bucketed posting lists.
    let lo = short_array_index((tuning.min_length_ratio * q as f64).ceil() as usize);
    let hi = short_array_index((tuning.max_length_ratio * q as f64).floor() as usize);

    let mut order: Vec<u32> = Vec::new();
    let mut acc: HashMap<u32, Accumulator> = HashMap::new();
    for gram in &ngrams {
        let Some(entry) = index.entry(gram) else {
            continue;
        };
        for id in entry.postings.ids_in_range(lo, hi) {
            let slot = acc.entry(id).or_insert_with(|| {
                order.push(id);
                Accumulator::default()
            });
            slot.count += 1;
            slot.idf_sum += entry.idf;
        }
    }

    let (coverage, seed) = if index.has_fuzzy_multiplier() {
        (tuning.fuzzy_multiplier_coverage, tuning.fuzzy_multiplier_seed)
    } else {
        (tuning.coverage, tuning.seed)
    };
    let stripped = strip_filler(&query_clean);

    let mut scored: Vec<Scored> = Vec::new();
    for id in order {
        let Some(slot) = acc.get(&id) else { continue };
        let variant = &index.variants()[id as usize];
        let entry = &index.catalog()[variant.catalog_index as usize];
        if let Some(entities) = &options.entities {
            if !entities.contains(&entry.entity) {
                continue;
            }
        }
        let n = variant.ngram_count as usize;
        if (slot.count * 2) as f64 / ((n + q) as f64) < coverage {
            continue;
        }

        let mut score = multiword_levenshtein(&variant.clean_text, &query_clean, seed, tuning.word_koef);
        let mut start = None;
        if let Some((rest, removed)) = stripped {
            let alt = multiword_levenshtein(&variant.clean_text, rest, seed, tuning.word_koef);
            if alt > score {
                score = alt;
                start = Some(removed);
            }
        }
        let rel_idf = if index.max_idf() > 0.0 {
            (slot.idf_sum / slot.count as f64) / index.max_idf()
        } else {
            1.0
        };
        scored.push(Scored {
            variant: id,
            score,
            rel_idf,
            start,
        });
    }
    if scored.is_empty() {
        return Vec::new();
    }

    let max_score = scored.iter().map(|s| s.score).fold(f64::MIN, f64::max);
    let max_rel_idf = scored.iter().map(|s| s.rel_idf).fold(f64::MIN, f64::max);
    for s in &mut scored {
        let idf_share = if max_rel_idf > 0.0 {
            s.rel_idf / max_rel_idf
        } else {
            0.0
        };
        s.score = round4(s.score + ((1.0 - max_score) / 2.0) * idf_share);
    }
    scored.sort_by(|a, b| b.score.total_cmp(&a.score).then(a.variant.cmp(&b.variant)));

    let results = deduplicate(index, scored, options);
    trace!(query, results = results.len(), "Fuzzy search finished");
    results
}

struct Group {
    primary: MatchCandidate,
    base_score: f64,
    seen: Vec<Value>,
}

fn deduplicate(index: &FuzzyIndex, scored: Vec<Scored>, options: &SearchOptions) -> Vec<MatchCandidate> {
    let tuning = &options.tuning;
    let mut groups: Vec<Group> = Vec::new();
    let mut by_key: HashMap<String, usize> = HashMap::new();

    for s in scored {
        let variant = &index.variants()[s.variant as usize];
        let entry = &index.catalog()[variant.catalog_index as usize];
        let key = if options.keep_multiple_values {
            format!("{}|{}", entry.entity, entry.value)
        } else {
            entry.entity.clone()
        };

        match by_key.get(&key) {
            None => {
                by_key.insert(key, groups.len());
                groups.push(Group {
                    primary: MatchCandidate {
                        entity: entry.entity.clone(),
                        value: entry.value.clone(),
                        score: s.score,
                        start: s.start,
                        alternatives: Vec::new(),
                    },
                    base_score: s.score,
                    seen: vec![entry.value.clone()],
                });
            }
            Some(&slot) => {
                let group = &mut groups[slot];
                if group.seen.contains(&entry.value)
                    || s.score < group.base_score - tuning.alternative_window
                {
                    continue;
                }
                group.seen.push(entry.value.clone());
                group.primary.score *= tuning.collision_penalty;
                group.primary.alternatives.push(MatchCandidate {
                    entity: entry.entity.clone(),
                    value: entry.value.clone(),
                    score: s.score,
                    start: s.start,
                    alternatives: Vec::new(),
                });
            }
        }
    }

    let mut results: Vec<MatchCandidate> = groups
        .into_iter()
        .map(|g| g.primary)
        .filter(|c| c.score >= options.threshold)
        .map(|mut c| {
            c.alternatives.sort_by(|a, b| b.score.total_cmp(&a.score));
            let mut decay = 1.0;
            for alt in &mut c.alternatives {
                decay *= tuning.collision_penalty;
                alt.score *= decay;
            }
            c
        })
        .collect();
    results.sort_by(|a, b| b.score.total_cmp(&a.score));
    if let Some(limit) = options.limit {
        results.truncate(limit);
    }
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{IndexBuilder, Multiplier, Postings};
    use crate::normalize::Stemmer;
    use parley_core::CatalogEntry;
    use serde_json::json;
    use std::sync::Arc;

    const TOWNS: [&str; 14] = [
        "Brno",
        "Brňany",
        "Příbram",
        "Slavkov",
        "Branná",
        "Bezdružice",
        "Srna",
        "Sokolov",
        "Černá",
        "Brandýsek",
        "Brodek",
        "Turnov",
        "Bojkovice",
        "Beroun",
    ];

    fn town_index() -> FuzzyIndex {
        FuzzyIndex::build(TOWNS.iter().map(|t| CatalogEntry::new("town", *t)).collect())
    }

    #[test]
    fn brna_prefers_brno_with_brnany_alternative() {
        let results = search(&town_index(), "brna", &SearchOptions::default());
        assert_eq!(results.len(), 1);
        let top = &results[0];
        assert_eq!(top.entity, "town");
        assert_eq!(top.value, json!("Brno"));
        assert!((top.score - 0.88722).abs() < 1e-9, "score {}", top.score);
        assert_eq!(top.alternatives.len(), 1);
        assert_eq!(top.alternatives[0].value, json!("Brňany"));
        assert!((top.alternatives[0].score - 0.81342).abs() < 1e-9);
    }

    #[test]
    fn scores_respect_threshold() {
        let index = town_index();
        for query in ["brna", "sokolov", "turnow", "beroun", "xyz", "br", "bojkovice u brna"] {
            for threshold in [0.0, 0.5, DEFAULT_THRESHOLD] {
                let options = SearchOptions::default().with_threshold(threshold);
                for hit in search(&index, query, &options) {
                    assert!(hit.score >= threshold && hit.score <= 1.0, "{query}: {}", hit.score);
                }
            }
        }
    }

    #[test]
    fn exact_match_scores_one() {
        let results = search(&town_index(), "Sokolov", &SearchOptions::default());
        assert_eq!(results[0].value, json!("Sokolov"));
        assert_eq!(results[0].score, 1.0);
        assert!(results[0].alternatives.is_empty());
    }

    #[test]
    fn empty_index_and_query_return_nothing() {
        let empty = FuzzyIndex::build(Vec::new());
        assert!(search(&empty, "brno", &SearchOptions::default()).is_empty());
        assert!(search(&town_index(), "  ", &SearchOptions::default()).is_empty());
    }

    #[test]
    fn leading_filler_is_skipped() {
        let results = search(&town_index(), "do Sokolov", &SearchOptions::default());
        assert_eq!(results[0].value, json!("Sokolov"));
        assert_eq!(results[0].start, Some(3));
    }

    #[test]
    fn entity_filter_and_multiple_values() {
        let catalog = vec![
            CatalogEntry::new("town", "Brno"),
            CatalogEntry::new("street", "Brno"),
            CatalogEntry::new("street", "Brněnská"),
        ];
        let index = FuzzyIndex::build(catalog);

        let streets = search(&index, "brno", &SearchOptions::default().for_entity("street"));
        assert_eq!(streets.len(), 1);
        assert_eq!(streets[0].entity, "street");

        let options = SearchOptions {
            keep_multiple_values: true,
            threshold: 0.0,
            ..SearchOptions::default()
        };
        let all = search(&index, "brno", &options);
        assert!(all.iter().all(|c| c.alternatives.is_empty()));
        assert_eq!(all.iter().filter(|c| c.value == json!("Brno")).count(), 2);

        let limited = search(&index, "brno", &options.clone().with_limit(1));
        assert_eq!(limited.len(), 1);
    }

    #[test]
    fn collisions_penalize_primary_and_decay_alternatives() {
        let catalog = ["Brno", "Brna", "Brny"]
            .iter()
            .map(|t| CatalogEntry::new("town", *t))
            .collect();
        let index = FuzzyIndex::build(catalog);

        let results = search(&index, "brnu", &SearchOptions::default().with_threshold(0.0));
        assert_eq!(results.len(), 1);
        let top = &results[0];
        assert_eq!(top.value, json!("Brno"));
        assert!((top.score - 0.986 * 0.9 * 0.9).abs() < 1e-9, "score {}", top.score);
        let alternatives: Vec<(&Value, f64)> =
            top.alternatives.iter().map(|a| (&a.value, a.score)).collect();
        assert_eq!(alternatives.len(), 2);
        assert_eq!(alternatives[0].0, &json!("Brna"));
        assert!((alternatives[0].1 - 0.986 * 0.9).abs() < 1e-9);
        assert_eq!(alternatives[1].0, &json!("Brny"));
        assert!((alternatives[1].1 - 0.986 * 0.81).abs() < 1e-9);

        // Two collisions push the primary below the default threshold.
        assert!(search(&index, "brnu", &SearchOptions::default()).is_empty());
    }

    #[test]
    fn fuzzy_multiplier_tightens_coverage() {
        let catalog = || vec![CatalogEntry::new("town", "Brno")];
        let plain = FuzzyIndex::build(catalog());
        let identity: Multiplier = Arc::new(|text: &str| vec![text.to_string()]);
        let multiplied = IndexBuilder::new().multiplier(identity).build(catalog());

        let loose = search(&plain, "brna", &SearchOptions::default());
        assert_eq!(loose.len(), 1);
        assert_eq!(loose[0].value, json!("Brno"));

        // Half of the n-grams shared passes 0.5 coverage but not 0.6.
        assert!(search(&multiplied, "brna", &SearchOptions::default()).is_empty());
        let exact = search(&multiplied, "brno", &SearchOptions::default());
        assert_eq!(exact[0].score, 1.0);
    }

    #[test]
    fn stemmer_widens_recall() {
        let lemmas: Arc<dyn Stemmer> = Arc::new(|word: &str| match word {
            "brnem" | "brne" => "brno".to_string(),
            other => other.to_string(),
        });
        let catalog = || vec![CatalogEntry::new("town", "Brno")];
        let plain = FuzzyIndex::build(catalog());
        let stemmed = IndexBuilder::new().stemmer(lemmas).build(catalog());

        assert!(search(&plain, "Brnem", &SearchOptions::default()).is_empty());
        let results = search(&stemmed, "Brnem", &SearchOptions::default());
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].value, json!("Brno"));
        assert!((results[0].score - 0.9335).abs() < 1e-9, "score {}", results[0].score);
    }

    #[test]
    fn bucketed_postings_prune_by_length() {
        let catalog = || vec![CatalogEntry::new("town", "Brno"), CatalogEntry::new("town", "Brno venkov")];
        let options = SearchOptions {
            keep_multiple_values: true,
            threshold: 0.0,
            ..SearchOptions::default()
        };

        let flat = search(&FuzzyIndex::build(catalog()), "brno", &options);
        assert_eq!(flat.len(), 2);

        // 11 n-grams sit in bucket 6, outside 2..=4 for a 4 n-gram query.
        let bucketed = IndexBuilder::new().bucket_threshold(1).build(catalog());
        assert!(matches!(bucketed.entry(" br").unwrap().postings, Postings::Bucketed(_)));
        let pruned = search(&bucketed, "brno", &options);
        assert_eq!(pruned.len(), 1);
        assert_eq!(pruned[0].value, json!("Brno"));
        assert_eq!(pruned[0].score, 1.0);
    }
}
