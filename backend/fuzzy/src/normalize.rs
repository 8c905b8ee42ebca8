//! Text normalization and n-gram tokenization.
//!
//! Every catalog variant and every query passes through the same pipeline:
//! lowercase, fold diacritics, collapse anything outside `[a-z0-9]` into
//! single spaces, then cut the result into padded 3-grams.

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Width of the indexing unit.
pub const NGRAM_SIZE: usize = 3;

/// Reduces an inflected word to its stem.
///
/// Stems only ever widen n-gram recall; scoring still runs on the literal
/// text.
pub trait Stemmer: Send + Sync {
    fn stem(&self, word: &str) -> String;
}

impl<F> Stemmer for F
where
    F: Fn(&str) -> String + Send + Sync,
{
    fn stem(&self, word: &str) -> String {
        self(word)
    }
}

/// Strip combining marks after canonical decomposition (`"Brňany"` → `"Brnany"`).
pub fn fold_diacritics(text: &str) -> String {
    text.nfd().filter(|c| !is_combining_mark(*c)).collect()
}

/// Lowercase, fold diacritics, replace every run of non `[a-z0-9]` characters
/// with a single space and trim.
pub fn pre_normalize(word: &str) -> String {
    let folded = fold_diacritics(&word.to_lowercase());
    let mut out = String::with_capacity(folded.len());
    let mut gap = false;
    for c in folded.chars() {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            if gap && !out.is_empty() {
                out.push(' ');
            }
            gap = false;
            out.push(c);
        } else {
            gap = true;
        }
    }
    out
}

/// [`pre_normalize`] and, when a stemmer is given, append every stem that
/// differs from its token as an extra trailing token.
pub fn cleanup(word: &str, stemmer: Option<&dyn Stemmer>) -> String {
    let base = pre_normalize(word);
    let Some(stemmer) = stemmer else {
        return base;
    };

    let stems: Vec<String> = base
        .split(' ')
        .filter_map(|token| {
            let stem = pre_normalize(&stemmer.stem(token));
            (!stem.is_empty() && stem != token).then_some(stem)
        })
        .collect();

    if stems.is_empty() {
        return base;
    }
    let mut out = base;
    for stem in stems {
        out.push(' ');
        out.push_str(&stem);
    }
    out
}

/// Distinct padded 3-grams of `text`, in order of first appearance.
///
/// `"brno"` → `[" br", "brn", "rno", "no "]`.
pub fn split_to_ngrams(text: &str) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }
    let padded: Vec<char> = std::iter::once(' ')
        .chain(text.chars())
        .chain(std::iter::once(' '))
        .collect();
    if padded.len() < NGRAM_SIZE {
        return vec![padded.into_iter().collect()];
    }

    let mut grams: Vec<String> = Vec::with_capacity(padded.len() - NGRAM_SIZE + 1);
    for window in padded.windows(NGRAM_SIZE) {
        let gram: String = window.iter().collect();
        if !grams.contains(&gram) {
            grams.push(gram);
        }
    }
    grams
}

pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pre_normalize_folds_and_collapses() {
        assert_eq!(pre_normalize("  Brňany!! "), "brnany");
        assert_eq!(pre_normalize("Ústí nad Labem"), "usti nad labem");
        assert_eq!(pre_normalize("Frýdek-Místek, CZ"), "frydek mistek cz");
        assert_eq!(pre_normalize("---"), "");
    }

    #[test]
    fn cleanup_appends_distinct_stems() {
        let stemmer = |w: &str| w.trim_end_matches(&['a', 'e', 'u'][..]).to_string();
        assert_eq!(cleanup("Do Brna", Some(&stemmer as &dyn Stemmer)), "do brna brn");
        assert_eq!(cleanup("Brno", Some(&stemmer as &dyn Stemmer)), "brno");
        assert_eq!(cleanup("Brno", None), "brno");
    }

    #[test]
    fn ngrams_are_padded() {
        assert_eq!(split_to_ngrams("brno"), vec![" br", "brn", "rno", "no "]);
        assert_eq!(split_to_ngrams("a"), vec![" a "]);
        assert!(split_to_ngrams("").is_empty());
    }

    #[test]
    fn ngrams_are_distinct() {
        assert_eq!(split_to_ngrams("aaaa"), vec![" aa", "aaa", "aa "]);
    }
}
