//! `parley-fuzzy` — approximate catalog matching.
//!
//! Provides:
//! - Text normalization and 3-gram tokenization
//! - An immutable inverted n-gram index built from a `CatalogEntry` list
//! - Weighted, numeric-aware Levenshtein similarity
//! - Ranked, de-duplicated fuzzy search with near-tie alternatives
//! - Word-window iteration for scanning free text

pub mod index;
pub mod levenshtein;
pub mod matcher;
pub mod normalize;
pub mod windows;

pub use index::{
    short_array_index, FuzzyIndex, IndexBuilder, IndexEntry, Multiplier, Postings, VariantRecord,
    BUCKET_THRESHOLD,
};
pub use levenshtein::{
    levenshtein, multiword_levenshtein, num_stats, relative_levenshtein, NumStats,
};
pub use matcher::{search, MatchCandidate, SearchOptions, SearchTuning, DEFAULT_THRESHOLD};
pub use normalize::{cleanup, fold_diacritics, pre_normalize, split_to_ngrams, Stemmer};
pub use windows::WordWindows;
