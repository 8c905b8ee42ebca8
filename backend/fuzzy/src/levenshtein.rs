//! Edit-distance scoring.
//!
//! The left argument is always the catalog (candidate) text and the right
//! argument the query. The distance itself is symmetric, the derived scores
//! are not: extra words on the query side are penalized, extra words on the
//! candidate side are not.

/// Numeric tokens may differ by at most this share of their length.
pub const NUMERIC_TOLERANCE: f64 = 0.2;
/// Score lost per tolerated numeric edit.
pub const NUMERIC_EDIT_PENALTY: f64 = 0.25;
/// Digit-only edits weigh this much more than letter edits.
pub const NUMERIC_LEV_WEIGHT: usize = 4;
/// Tokens whose digits make up at least this share are numeric.
pub const NUMERIC_DOMINANCE: f64 = 0.5;
/// Penalty per character of length difference in the suffix.
pub const SUFFIX_LENGTH_WEIGHT: f64 = 0.055;
/// Penalty per suffix edit not explained by the length difference.
pub const SUFFIX_EDIT_WEIGHT: f64 = 0.078;
/// Discount when the stems match and a single trailing character differs.
pub const SINGLE_TRAILING_DISCOUNT: f64 = 0.05;
/// Strings shorter than this are scored through [`add_seed`].
pub const SHORT_WORD_LEN: usize = 3;
/// Lowest accumulated score of a numeric token pair in a multiword mean.
pub const NUMERIC_PAIR_FLOOR: f64 = 0.85;

fn min_step(d0: usize, d1: usize, d2: usize, bx: char, ay: char) -> usize {
    if d0 < d1 || d2 < d1 {
        if d0 > d2 {
            d2 + 1
        } else {
            d0 + 1
        }
    } else if bx == ay {
        d1
    } else {
        d1 + 1
    }
}

/// Levenshtein distance over chars.
///
/// Common prefix and suffix are stripped first; the remaining matrix is
/// filled four columns per pass over the row vector.
pub fn levenshtein(left: &str, right: &str) -> usize {
    if left == right {
        return 0;
    }
    let left: Vec<char> = left.chars().collect();
    let right: Vec<char> = right.chars().collect();
    levenshtein_chars(&left, &right)
}

fn levenshtein_chars(left: &[char], right: &[char]) -> usize {
    if left == right {
        return 0;
    }
    let (a, b) = if left.len() > right.len() {
        (right, left)
    } else {
        (left, right)
    };

    let mut la = a.len();
    let mut lb = b.len();
    while la > 0 && a[la - 1] == b[lb - 1] {
        la -= 1;
        lb -= 1;
    }
    let mut offset = 0;
    while offset < la && a[offset] == b[offset] {
        offset += 1;
    }
    la -= offset;
    lb -= offset;

    if la == 0 || lb < 3 {
        return lb;
    }

    let a = &a[offset..offset + la];
    let b = &b[offset..offset + lb];
    let mut costs: Vec<usize> = (1..=la).collect();
    let mut x = 0;
    let mut dd = 0;

    while x + 3 < lb {
        let (bx0, bx1, bx2, bx3) = (b[x], b[x + 1], b[x + 2], b[x + 3]);
        let (mut d0, mut d1, mut d2, mut d3) = (x, x + 1, x + 2, x + 3);
        x += 4;
        dd = x;
        for (cost, &ay) in costs.iter_mut().zip(a) {
            let dy = *cost;
            d0 = min_step(dy, d0, d1, bx0, ay);
            d1 = min_step(d0, d1, d2, bx1, ay);
            d2 = min_step(d1, d2, d3, bx2, ay);
            dd = min_step(d2, d3, dd, bx3, ay);
            *cost = dd;
            d3 = d2;
            d2 = d1;
            d1 = d0;
            d0 = dy;
        }
    }

    while x < lb {
        let bx0 = b[x];
        let mut d0 = x;
        x += 1;
        dd = x;
        for (cost, &ay) in costs.iter_mut().zip(a) {
            let dy = *cost;
            dd = min_step(dy, d0, dd, bx0, ay);
            *cost = dd;
            d0 = dy;
        }
    }

    dd
}

/// Digit statistics of a token pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NumStats {
    /// Weighted distance between the digit-only projections.
    pub num_lev: usize,
    /// Length of the longer digit projection.
    pub num_len: usize,
    /// `num_len` relative to the longer token.
    pub num_rel_len: f64,
}

impl NumStats {
    pub fn is_numeric(&self) -> bool {
        self.num_rel_len >= NUMERIC_DOMINANCE
    }
}

pub fn num_stats(left: &str, right: &str) -> NumStats {
    let digits_left: String = left.chars().filter(char::is_ascii_digit).collect();
    let digits_right: String = right.chars().filter(char::is_ascii_digit).collect();
    let num_len = digits_left.len().max(digits_right.len());
    let max_len = left.chars().count().max(right.chars().count());

    NumStats {
        num_lev: levenshtein(&digits_left, &digits_right) * NUMERIC_LEV_WEIGHT,
        num_len,
        num_rel_len: if max_len == 0 {
            0.0
        } else {
            num_len as f64 / max_len as f64
        },
    }
}

/// Similarity floor for very short strings: `seed` when everything differs,
/// rising linearly to `1` with no edits.
pub fn add_seed(seed: f64, len: usize, edits: usize) -> f64 {
    if len == 0 {
        return 1.0;
    }
    let ratio = (1.0 - edits as f64 / len as f64).max(0.0);
    seed + (1.0 - seed) * ratio
}

fn word_handicap(left: &str, right: &str, word_koef: f64) -> f64 {
    let extra = right
        .split_whitespace()
        .count()
        .saturating_sub(left.split_whitespace().count());
    word_koef.powi(extra as i32)
}

/// Similarity of `left` (candidate) and `right` (query), roughly in `[0, 1]`.
///
/// ```
/// use parley_fuzzy::relative_levenshtein;
///
/// assert_eq!(relative_levenshtein("c1234", "b1234", 0.5, 0.9), 0.75);
/// ```
pub fn relative_levenshtein(left: &str, right: &str, seed: f64, word_koef: f64) -> f64 {
    scored_pair(left, right, seed, word_koef).0
}

/// Returns the pair score and whether the pair is numeric-dominant.
fn scored_pair(left: &str, right: &str, seed: f64, word_koef: f64) -> (f64, bool) {
    let handicap = word_handicap(left, right, word_koef);
    let stats = num_stats(left, right);

    let a: Vec<char> = left.chars().collect();
    let b: Vec<char> = right.chars().collect();
    let max_len = a.len().max(b.len());
    let min_len = a.len().min(b.len());

    if max_len == 0 {
        return (handicap, false);
    }

    if stats.is_numeric() {
        let lev = levenshtein_chars(&a, &b) as f64;
        let score = (1.0 - (lev / (max_len as f64 * NUMERIC_TOLERANCE)) * NUMERIC_EDIT_PENALTY)
            .max(0.0);
        return (score * handicap, true);
    }

    if min_len < SHORT_WORD_LEN {
        let lev = levenshtein_chars(&a, &b);
        let score = add_seed(seed, max_len + stats.num_len, lev + stats.num_lev).clamp(0.0, 1.0);
        return (score * handicap, false);
    }

    // The last char of the shorter word belongs to the suffix, so inflected
    // endings land there.
    let stem_len = min_len - 1;
    let stem_lev = levenshtein_chars(&a[..stem_len], &b[..stem_len]);
    let suffix_lev = levenshtein_chars(&a[stem_len..], &b[stem_len..]);
    let len_diff = a.len().abs_diff(b.len());

    let mut suffix_penalty = len_diff as f64 * SUFFIX_LENGTH_WEIGHT
        + (suffix_lev - len_diff) as f64 * SUFFIX_EDIT_WEIGHT;
    if stem_lev == 0 && suffix_lev == 1 {
        suffix_penalty -= SINGLE_TRAILING_DISCOUNT;
    }
    let suffix_penalty = suffix_penalty.max(0.0);

    let score = (1.0 - stem_lev as f64 / stem_len as f64 - suffix_penalty).clamp(0.0, 1.0);
    (score * handicap, false)
}

/// Word-by-word similarity with positional alignment.
///
/// Numeric pairs are floored at [`NUMERIC_PAIR_FLOOR`] inside the mean, and
/// their own mean multiplies the result, so one wrong number drags the whole
/// phrase down.
pub fn multiword_levenshtein(left: &str, right: &str, seed: f64, word_koef: f64) -> f64 {
    let left_words: Vec<&str> = left.split_whitespace().collect();
    let right_words: Vec<&str> = right.split_whitespace().collect();
    let pairs = left_words.len().max(right_words.len());
    if pairs == 0 {
        return 1.0;
    }

    let mut total = 0.0;
    let mut numeric_total = 0.0;
    let mut numeric_pairs = 0usize;

    for i in 0..pairs {
        let l = left_words.get(i).copied().unwrap_or("");
        let r = right_words.get(i).copied().unwrap_or("");
        let (score, numeric) = scored_pair(l, r, seed, word_koef);
        if numeric {
            numeric_total += score;
            numeric_pairs += 1;
            total += score.max(NUMERIC_PAIR_FLOOR);
        } else {
            total += score;
        }
    }

    let mean = total / pairs as f64;
    if numeric_pairs == 0 {
        mean
    } else {
        mean * (numeric_total / numeric_pairs as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dp(a: &str, b: &str) -> usize {
        let a: Vec<char> = a.chars().collect();
        let b: Vec<char> = b.chars().collect();
        let mut prev: Vec<usize> = (0..=b.len()).collect();
        for i in 1..=a.len() {
            let mut cur = vec![i; b.len() + 1];
            for j in 1..=b.len() {
                let sub = prev[j - 1] + usize::from(a[i - 1] != b[j - 1]);
                cur[j] = sub.min(prev[j] + 1).min(cur[j - 1] + 1);
            }
            prev = cur;
        }
        prev[b.len()]
    }

    #[test]
    fn levenshtein_matches_plain_dynamic_programming() {
        let words = [
            "", "a", "ab", "kitten", "sitting", "saturday", "sunday", "brno", "brna",
            "brnany", "abcabcabc", "cbacbacba", "budova c12", "budova u12", "aaaaab",
        ];
        for a in words {
            for b in words {
                assert_eq!(levenshtein(a, b), dp(a, b), "{a:?} vs {b:?}");
            }
        }
    }

    #[test]
    fn levenshtein_is_symmetric() {
        assert_eq!(levenshtein("kitten", "sitting"), 3);
        assert_eq!(levenshtein("sitting", "kitten"), 3);
        assert_eq!(levenshtein("", "abc"), 3);
    }

    #[test]
    fn numeric_tokens() {
        assert_eq!(relative_levenshtein("c1234", "b1234", 0.5, 0.9), 0.75);
        assert!((relative_levenshtein("c12", "b12", 0.5, 0.9) - 0.5833333333333334).abs() < 1e-12);
        assert_eq!(relative_levenshtein("1234", "9876", 0.5, 0.9), 0.0);
    }

    #[test]
    fn multiword_numeric_gate() {
        let score = multiword_levenshtein("budova u12", "budova c12", 0.5, 0.9);
        assert!((score - 0.5395833333333334).abs() < 1e-12, "{score}");
    }

    #[test]
    fn inflected_endings_are_cheap() {
        assert!((relative_levenshtein("brno", "brna", 0.25, 0.6) - 0.972).abs() < 1e-12);
        assert!((relative_levenshtein("brnany", "brna", 0.25, 0.6) - 0.89).abs() < 1e-12);
        assert_eq!(relative_levenshtein("brno", "brno", 0.25, 0.6), 1.0);
        assert_eq!(relative_levenshtein("abcd", "wxyz", 0.25, 0.6), 0.0);
    }

    #[test]
    fn short_words_use_seed() {
        assert_eq!(relative_levenshtein("ab", "xy", 0.25, 0.6), 0.25);
        assert_eq!(relative_levenshtein("ab", "ab", 0.25, 0.6), 1.0);
    }

    #[test]
    fn extra_query_words_are_penalized() {
        let exact = multiword_levenshtein("praha", "praha", 0.25, 0.6);
        let longer = multiword_levenshtein("praha", "praha centrum", 0.25, 0.6);
        let shorter = multiword_levenshtein("praha centrum", "praha", 0.25, 0.6);
        assert_eq!(exact, 1.0);
        assert!(longer < exact);
        assert!(longer < shorter);
    }

    #[test]
    fn num_stats_flags_numeric_pairs() {
        let stats = num_stats("c1234", "b1234");
        assert_eq!(stats.num_lev, 0);
        assert_eq!(stats.num_len, 4);
        assert!(stats.is_numeric());
        assert!(!num_stats("budova", "budovy").is_numeric());
    }
}
