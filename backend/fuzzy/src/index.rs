//! Inverted n-gram index over a catalog.
//!
//! Built once, read-only afterwards. `FuzzyIndex` is `Send + Sync` and is
//! meant to be shared behind an `Arc` by every concurrent query.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parley_core::CatalogEntry;
use tracing::debug;

use crate::normalize::{cleanup, pre_normalize, split_to_ngrams, word_count, Stemmer};

/// Posting lists longer than this are bucketed by candidate length.
pub const BUCKET_THRESHOLD: usize = 5000;

/// Expands one catalog text into its surface forms.
pub type Multiplier = Arc<dyn Fn(&str) -> Vec<String> + Send + Sync>;

/// Bucket of a variant with `ngram_count` n-grams.
pub fn short_array_index(ngram_count: usize) -> usize {
    ngram_count / 2 + 1
}

/// Variant ids sharing one n-gram.
#[derive(Debug, Clone, PartialEq)]
pub enum Postings {
    Flat(Vec<u32>),
    /// Indexed by [`short_array_index`] of the variant's n-gram count.
    Bucketed(Vec<Vec<u32>>),
}

impl Postings {
    pub fn len(&self) -> usize {
        match self {
            Postings::Flat(ids) => ids.len(),
            Postings::Bucketed(buckets) => buckets.iter().map(Vec::len).sum(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Ids whose bucket lies within `lo..=hi`; flat lists are returned whole.
    ///
    /// A bucketed list with only two slots holds a single populated bucket,
    /// which is always read whole.
    pub fn ids_in_range(&self, lo: usize, hi: usize) -> Box<dyn Iterator<Item = u32> + '_> {
        match self {
            Postings::Flat(ids) => Box::new(ids.iter().copied()),
            Postings::Bucketed(buckets) if buckets.len() <= 2 => {
                Box::new(buckets.iter().flatten().copied())
            }
            Postings::Bucketed(buckets) => {
                let hi = hi.min(buckets.len().saturating_sub(1));
                if lo > hi {
                    return Box::new(std::iter::empty());
                }
                Box::new(buckets[lo..=hi].iter().flatten().copied())
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndexEntry {
    pub idf: f64,
    pub postings: Postings,
}

/// One normalized surface form of a catalog entry.
#[derive(Debug, Clone, PartialEq)]
pub struct VariantRecord {
    pub ngram_count: u32,
    pub catalog_index: u32,
    pub clean_text: String,
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Collects build options for a [`FuzzyIndex`].
#[derive(Clone, Default)]
pub struct IndexBuilder {
    stemmer: Option<Arc<dyn Stemmer>>,
    multiplier: Option<Multiplier>,
    bucket_threshold: Option<usize>,
}

impl IndexBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stemmer(mut self, stemmer: Arc<dyn Stemmer>) -> Self {
        self.stemmer = Some(stemmer);
        self
    }

    /// Replace the identity expansion. Any multiplier switches the matcher to
    /// its stricter fuzzy-multiplier constants.
    pub fn multiplier(mut self, multiplier: Multiplier) -> Self {
        self.multiplier = Some(multiplier);
        self
    }

    pub fn bucket_threshold(mut self, threshold: usize) -> Self {
        self.bucket_threshold = Some(threshold);
        self
    }

    pub fn build(self, catalog: Vec<CatalogEntry>) -> FuzzyIndex {
        let bucket_threshold = self.bucket_threshold.unwrap_or(BUCKET_THRESHOLD);
        let stemmer = self.stemmer.as_deref();

        let mut raw: HashMap<String, Vec<u32>> = HashMap::new();
        let mut variants: Vec<VariantRecord> = Vec::new();
        let mut max_word_count = 0;

        for (catalog_index, entry) in catalog.iter().enumerate() {
            let mut seen: Vec<String> = Vec::new();
            for text in entry.texts() {
                let forms = match &self.multiplier {
                    Some(multiplier) => multiplier(&text),
                    None => vec![text],
                };
                for form in forms {
                    let clean_text = pre_normalize(&form);
                    if clean_text.is_empty() || seen.contains(&clean_text) {
                        continue;
                    }
                    max_word_count = max_word_count.max(word_count(&clean_text));

                    let ngrams = split_to_ngrams(&cleanup(&form, stemmer));
                    let variant_id = variants.len() as u32;
                    for gram in &ngrams {
                        raw.entry(gram.clone()).or_default().push(variant_id);
                    }
                    variants.push(VariantRecord {
                        ngram_count: ngrams.len() as u32,
                        catalog_index: catalog_index as u32,
                        clean_text: clean_text.clone(),
                    });
                    seen.push(clean_text);
                }
            }
        }

        let total = raw.len() as f64;
        let mut max_idf: f64 = 0.0;
        let postings: HashMap<String, IndexEntry> = raw
            .into_iter()
            .map(|(gram, ids)| {
                let idf = (total / ids.len() as f64).log10();
                max_idf = max_idf.max(idf);
                let postings = if ids.len() > bucket_threshold {
                    Postings::Bucketed(bucketize(&ids, &variants))
                } else {
                    Postings::Flat(ids)
                };
                (gram, IndexEntry { idf, postings })
            })
            .collect();

        debug!(
            entries = catalog.len(),
            variants = variants.len(),
            ngrams = postings.len(),
            max_idf,
            "Fuzzy index built"
        );

        FuzzyIndex {
            postings,
            variants,
            catalog,
            max_idf,
            max_word_count,
            has_fuzzy_multiplier: self.multiplier.is_some(),
            stemmer: self.stemmer,
        }
    }
}

fn bucketize(ids: &[u32], variants: &[VariantRecord]) -> Vec<Vec<u32>> {
    let mut buckets: Vec<Vec<u32>> = Vec::new();
    for &id in ids {
        let bucket = short_array_index(variants[id as usize].ngram_count as usize);
        if buckets.len() <= bucket {
            buckets.resize_with(bucket + 1, Vec::new);
        }
        buckets[bucket].push(id);
    }
    buckets
}

// ---------------------------------------------------------------------------
// Index
// ---------------------------------------------------------------------------

/// Immutable inverted index: n-gram → posting list, plus variant metadata.
pub struct FuzzyIndex {
    pub(crate) postings: HashMap<String, IndexEntry>,
    pub(crate) variants: Vec<VariantRecord>,
    pub(crate) catalog: Vec<CatalogEntry>,
    pub(crate) max_idf: f64,
    pub(crate) max_word_count: usize,
    pub(crate) has_fuzzy_multiplier: bool,
    pub(crate) stemmer: Option<Arc<dyn Stemmer>>,
}

impl FuzzyIndex {
    /// Build with the identity multiplier and no stemmer.
    pub fn build(catalog: Vec<CatalogEntry>) -> Self {
        IndexBuilder::new().build(catalog)
    }

    pub fn builder() -> IndexBuilder {
        IndexBuilder::new()
    }

    pub fn entry(&self, ngram: &str) -> Option<&IndexEntry> {
        self.postings.get(ngram)
    }

    pub fn variants(&self) -> &[VariantRecord] {
        &self.variants
    }

    pub fn catalog(&self) -> &[CatalogEntry] {
        &self.catalog
    }

    pub fn max_idf(&self) -> f64 {
        self.max_idf
    }

    /// Largest token count of any variant; bounds word-window scans.
    pub fn max_word_count(&self) -> usize {
        self.max_word_count
    }

    pub fn has_fuzzy_multiplier(&self) -> bool {
        self.has_fuzzy_multiplier
    }

    pub fn ngram_count(&self) -> usize {
        self.postings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variants.is_empty()
    }

    /// Distinct entity names, in catalog order.
    pub fn entity_names(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for entry in &self.catalog {
            if !names.contains(&entry.entity) {
                names.push(entry.entity.clone());
            }
        }
        names
    }

    pub(crate) fn stemmer(&self) -> Option<&dyn Stemmer> {
        self.stemmer.as_deref()
    }
}

impl fmt::Debug for FuzzyIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FuzzyIndex")
            .field("entries", &self.catalog.len())
            .field("variants", &self.variants.len())
            .field("ngrams", &self.postings.len())
            .field("max_idf", &self.max_idf)
            .field("max_word_count", &self.max_word_count)
            .field("has_fuzzy_multiplier", &self.has_fuzzy_multiplier)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn towns(names: &[&str]) -> Vec<CatalogEntry> {
        names.iter().map(|n| CatalogEntry::new("town", *n)).collect()
    }

    #[test]
    fn empty_catalog_builds_empty_index() {
        let index = FuzzyIndex::build(Vec::new());
        assert!(index.is_empty());
        assert_eq!(index.ngram_count(), 0);
        assert_eq!(index.max_idf(), 0.0);
    }

    #[test]
    fn idf_reflects_posting_counts() {
        let index = FuzzyIndex::build(towns(&["Brno", "Brňany"]));
        // 8 distinct n-grams; " br" is shared, "rno" is not.
        assert_eq!(index.ngram_count(), 8);
        let shared = index.entry(" br").unwrap();
        let unique = index.entry("rno").unwrap();
        assert!((shared.idf - 4f64.log10()).abs() < 1e-12);
        assert!((unique.idf - 8f64.log10()).abs() < 1e-12);
        assert_eq!(index.max_idf(), unique.idf);
        assert_eq!(shared.postings, Postings::Flat(vec![0, 1]));
    }

    #[test]
    fn identifiers_index_only_synonyms() {
        let catalog = vec![CatalogEntry::new("product", "X-1000").with_synonyms(["kettle"]).identifier()];
        let index = FuzzyIndex::build(catalog);
        assert_eq!(index.variants().len(), 1);
        assert_eq!(index.variants()[0].clean_text, "kettle");
        assert!(index.entry(" x ").is_none());
    }

    #[test]
    fn multiplier_variants_are_deduplicated() {
        let multiplier: Multiplier = Arc::new(|text: &str| {
            vec![text.to_string(), text.to_uppercase(), format!("{text} city")]
        });
        let index = IndexBuilder::new()
            .multiplier(multiplier)
            .build(towns(&["Brno"]));
        assert!(index.has_fuzzy_multiplier());
        let texts: Vec<&str> = index.variants().iter().map(|v| v.clean_text.as_str()).collect();
        assert_eq!(texts, vec!["brno", "brno city"]);
        assert_eq!(index.max_word_count(), 2);
    }

    #[test]
    fn long_posting_lists_are_bucketed() {
        let names = ["ab", "abc", "abcd", "abcde", "abcdef"];
        let index = IndexBuilder::new()
            .bucket_threshold(3)
            .build(towns(&names));
        let entry = index.entry(" ab").unwrap();
        let Postings::Bucketed(buckets) = &entry.postings else {
            panic!("expected bucketed postings");
        };
        assert_eq!(entry.postings.len(), 5);
        for (bucket, ids) in buckets.iter().enumerate() {
            for id in ids {
                let count = index.variants()[*id as usize].ngram_count as usize;
                assert_eq!(short_array_index(count), bucket);
            }
        }
        // "ab" and "abc" land in bucket 2; "abcdef" has 6 n-grams → bucket 4.
        let ids: Vec<u32> = entry.postings.ids_in_range(2, 2).collect();
        assert_eq!(ids, vec![0, 1]);
        let short: Vec<u32> = index.entry("abc").unwrap().postings.ids_in_range(0, 10).collect();
        assert_eq!(short, vec![1, 2, 3, 4]);
    }

    #[test]
    fn single_bucket_lists_ignore_the_range() {
        let catalog = vec![CatalogEntry::new("grade", "A"), CatalogEntry::new("block", "A")];
        let index = IndexBuilder::new().bucket_threshold(1).build(catalog);
        let entry = index.entry(" a ").unwrap();
        assert_eq!(entry.postings, Postings::Bucketed(vec![vec![], vec![0, 1]]));
        let ids: Vec<u32> = entry.postings.ids_in_range(2, 4).collect();
        assert_eq!(ids, vec![0, 1]);
    }
}
