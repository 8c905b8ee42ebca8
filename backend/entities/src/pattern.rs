//! Regex detector compilation.
//!
//! Pattern sources may contain `@NAME` placeholders. At call time each one is
//! replaced with a named group alternating the texts of the `NAME` entities
//! resolved so far, longest first. Compiled patterns are cached by their
//! rendered source and flags.

use std::fmt;
use std::ops::Range;
use std::sync::Arc;

use moka::sync::Cache;
use parley_core::DetectedEntity;
use parley_fuzzy::fold_diacritics;
use regex::{Regex, RegexBuilder};
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Substituted for a placeholder with no resolved texts; never matches.
pub const NEVER_MATCH: &str = r"\b\B";

/// Group holding the match proper inside the whole-word wrapper.
const MATCH_GROUP: &str = "__m";

/// Rendered patterns kept before the least recently used are evicted.
const CACHE_CAPACITY: u64 = 512;

#[derive(Debug, Clone, PartialEq)]
struct Placeholder {
    name: String,
    range: Range<usize>,
}

/// A pattern source with its placeholders located.
#[derive(Debug, Clone)]
pub struct PatternTemplate {
    source: String,
    placeholders: Vec<Placeholder>,
}

impl PatternTemplate {
    pub fn parse(source: &str) -> Self {
        let bytes = source.as_bytes();
        let mut placeholders = Vec::new();
        let mut i = 0;
        while i < bytes.len() {
            if bytes[i] == b'\\' {
                i += 2;
                continue;
            }
            if bytes[i] == b'@' {
                let start = i + 1;
                let mut end = start;
                while end < bytes.len() && (bytes[end].is_ascii_alphanumeric() || bytes[end] == b'_') {
                    end += 1;
                }
                if end > start && !bytes[start].is_ascii_digit() {
                    placeholders.push(Placeholder {
                        name: source[start..end].to_string(),
                        range: i..end,
                    });
                    i = end;
                    continue;
                }
            }
            i += 1;
        }
        Self {
            source: source.to_string(),
            placeholders,
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Distinct placeholder names in order of appearance.
    pub fn entities(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for p in &self.placeholders {
            if !names.iter().any(|n| n.eq_ignore_ascii_case(&p.name)) {
                names.push(p.name.clone());
            }
        }
        names
    }

    /// `name` with or without the leading `@`.
    pub fn has_placeholder(&self, name: &str) -> bool {
        let name = name.strip_prefix('@').unwrap_or(name);
        self.placeholders.iter().any(|p| p.name.eq_ignore_ascii_case(name))
    }

    /// Expand placeholders against `known`. Returns the source and the
    /// `(group, entity)` pair of every substituted placeholder.
    fn render(&self, known: &[DetectedEntity], fold: bool) -> (String, Vec<(String, String)>) {
        let mut out = String::with_capacity(self.source.len());
        let mut groups = Vec::with_capacity(self.placeholders.len());
        let mut last = 0;
        for (n, p) in self.placeholders.iter().enumerate() {
            out.push_str(&self.source[last..p.range.start]);
            let group = format!("__p{n}");
            out.push_str(&format!("(?P<{group}>{})", alternation(&p.name, known, fold)));
            groups.push((group, p.name.clone()));
            last = p.range.end;
        }
        out.push_str(&self.source[last..]);
        let out = if fold { fold_diacritics(&out) } else { out };
        (out, groups)
    }

    /// Compile with every placeholder empty; validates the source and
    /// exposes its capture group names.
    pub fn probe(&self) -> Result<Regex, regex::Error> {
        let (source, _) = self.render(&[], false);
        Regex::new(&source)
    }
}

fn alternation(name: &str, known: &[DetectedEntity], fold: bool) -> String {
    let mut texts: Vec<String> = Vec::new();
    for entity in known.iter().filter(|e| e.entity.eq_ignore_ascii_case(name)) {
        let text = if fold { fold_diacritics(&entity.text) } else { entity.text.clone() };
        if !text.is_empty() && !texts.contains(&text) {
            texts.push(text);
        }
    }
    if texts.is_empty() {
        return NEVER_MATCH.to_string();
    }
    texts.sort_by(|a, b| b.chars().count().cmp(&a.chars().count()).then_with(|| a.cmp(b)));
    texts.iter().map(|t| regex::escape(t)).collect::<Vec<_>>().join("|")
}

// ---------------------------------------------------------------------------
// Folded subject text
// ---------------------------------------------------------------------------

/// Diacritic-folded copy of a text with a byte offset map back to it.
#[derive(Debug)]
pub struct FoldedText {
    pub text: String,
    offsets: Vec<usize>,
}

impl FoldedText {
    pub fn new(original: &str) -> Self {
        let mut text = String::with_capacity(original.len());
        let mut offsets = Vec::with_capacity(original.len() + 1);
        for (i, c) in original.char_indices() {
            for d in c.nfd().filter(|d| !is_combining_mark(*d)) {
                offsets.extend(std::iter::repeat(i).take(d.len_utf8()));
                text.push(d);
            }
        }
        offsets.push(original.len());
        Self { text, offsets }
    }

    /// Map a byte offset in the folded text to the original.
    pub fn to_original(&self, pos: usize) -> usize {
        self.offsets.get(pos).copied().unwrap_or_else(|| self.offsets.last().copied().unwrap_or(0))
    }
}

// ---------------------------------------------------------------------------
// Compiled patterns
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PatternFlags {
    pub whole_words: bool,
    pub fold: bool,
    pub case_sensitive: bool,
}

/// One match, offsets in the searched text's own coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct PatternMatch {
    pub start: usize,
    pub end: usize,
    /// Participating named groups: `(name, start, end)`.
    pub groups: Vec<(String, usize, usize)>,
}

impl PatternMatch {
    pub fn group(&self, name: &str) -> Option<(usize, usize)> {
        self.groups
            .iter()
            .find(|(n, _, _)| n == name)
            .map(|(_, s, e)| (*s, *e))
    }
}

#[derive(Debug)]
pub struct CompiledPattern {
    regex: Regex,
    /// `(group, entity)` per placeholder occurrence.
    pub placeholder_groups: Vec<(String, String)>,
    flags: PatternFlags,
}

impl CompiledPattern {
    /// First match in `text`.
    pub fn find(&self, text: &str) -> Option<PatternMatch> {
        let folded = self.flags.fold.then(|| FoldedText::new(text));
        let subject = folded.as_ref().map_or(text, |f| f.text.as_str());
        let map = |pos: usize| folded.as_ref().map_or(pos, |f| f.to_original(pos));

        let caps = self.regex.captures(subject)?;
        let whole = if self.flags.whole_words {
            caps.name(MATCH_GROUP)?
        } else {
            caps.get(0)?
        };
        let groups = self
            .regex
            .capture_names()
            .flatten()
            .filter(|name| *name != MATCH_GROUP)
            .filter_map(|name| {
                caps.name(name)
                    .map(|m| (name.to_string(), map(m.start()), map(m.end())))
            })
            .collect();
        Some(PatternMatch {
            start: map(whole.start()),
            end: map(whole.end()),
            groups,
        })
    }
}

/// Compiled patterns keyed by rendered source and flags.
pub struct PatternCache {
    inner: Cache<String, Arc<CompiledPattern>>,
}

impl Default for PatternCache {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for PatternCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PatternCache")
            .field("entries", &self.inner.entry_count())
            .finish()
    }
}

impl PatternCache {
    pub fn new() -> Self {
        Self::with_capacity(CACHE_CAPACITY)
    }

    pub fn with_capacity(capacity: u64) -> Self {
        Self {
            inner: Cache::builder().max_capacity(capacity).build(),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.run_pending_tasks();
        self.inner.entry_count() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn compile(
        &self,
        template: &PatternTemplate,
        known: &[DetectedEntity],
        flags: PatternFlags,
    ) -> Result<Arc<CompiledPattern>, regex::Error> {
        let (mut source, placeholder_groups) = template.render(known, flags.fold);
        if flags.whole_words {
            source = format!(r"(?:^|[^\w])(?P<{MATCH_GROUP}>{source})(?:[^\w]|$)");
        }
        let key = format!(
            "{}{}{}:{source}",
            u8::from(flags.whole_words),
            u8::from(flags.fold),
            u8::from(flags.case_sensitive)
        );

        if let Some(hit) = self.inner.get(&key) {
            return Ok(hit);
        }
        let regex = RegexBuilder::new(&source)
            .case_insensitive(!flags.case_sensitive)
            .build()?;
        let compiled = Arc::new(CompiledPattern {
            regex,
            placeholder_groups,
            flags,
        });
        self.inner.insert(key, Arc::clone(&compiled));
        Ok(compiled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PLAIN: PatternFlags = PatternFlags {
        whole_words: false,
        fold: false,
        case_sensitive: false,
    };

    fn street(text: &str, start: usize) -> DetectedEntity {
        DetectedEntity::new("street", text, text, start, start + text.len())
    }

    #[test]
    fn placeholders_are_located() {
        let t = PatternTemplate::parse(r"@STREET \d+ \@x [a-z]+@[a-z]+ @CITY_2 @STREET");
        assert_eq!(t.entities(), vec!["STREET".to_string(), "CITY_2".to_string()]);
        assert!(t.has_placeholder("@street"));
        assert!(!t.has_placeholder("x"));
    }

    #[test]
    fn placeholders_expand_longest_first() {
        let t = PatternTemplate::parse(r"@STREET \d+");
        let known = [street("Nova", 0), street("Nova Ves", 10), street("nova", 30)];
        let (source, groups) = t.render(&known, false);
        assert_eq!(source, r"(?P<__p0>Nova Ves|Nova|nova) \d+");
        assert_eq!(groups, vec![("__p0".to_string(), "STREET".to_string())]);

        let (empty, _) = t.render(&[], false);
        assert_eq!(empty, format!(r"(?P<__p0>{NEVER_MATCH}) \d+"));
        assert!(t.probe().is_ok());
    }

    #[test]
    fn folded_offsets_map_back() {
        let folded = FoldedText::new("Brňany u Brna");
        assert_eq!(folded.text, "Brnany u Brna");
        assert_eq!(folded.to_original(2), 2);
        assert_eq!(folded.to_original(3), 4);
        assert_eq!(folded.to_original(4), 5);
        assert_eq!(folded.to_original(folded.text.len()), "Brňany u Brna".len());
    }

    #[test]
    fn whole_words_and_folding() {
        let cache = PatternCache::new();
        let t = PatternTemplate::parse("brnany");
        let flags = PatternFlags {
            whole_words: true,
            fold: true,
            case_sensitive: false,
        };
        let p = cache.compile(&t, &[], flags).unwrap();
        let m = p.find("do Brňany!").unwrap();
        assert_eq!((m.start, m.end), (3, 10));
        assert!(p.find("doBrňany").is_none());

        let loose = cache.compile(&t, &[], PLAIN).unwrap();
        assert!(loose.find("doBrnany").is_some());
        assert_eq!(cache.len(), 2);

        let again = cache.compile(&t, &[], flags).unwrap();
        assert!(Arc::ptr_eq(&p, &again));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn cache_stays_bounded() {
        let cache = PatternCache::with_capacity(2);
        for word in ["brno", "beroun", "turnov", "sokolov", "srna"] {
            let p = cache.compile(&PatternTemplate::parse(word), &[], PLAIN).unwrap();
            assert!(p.find(&format!("do {word}")).is_some());
        }
        assert!(cache.len() <= 2);
    }

    #[test]
    fn placeholder_groups_report_offsets() {
        let cache = PatternCache::new();
        let t = PatternTemplate::parse(r"@STREET (?P<no>\d+)");
        let known = [street("Nová", 0)];
        let flags = PatternFlags {
            fold: true,
            ..PLAIN
        };
        let p = cache.compile(&t, &known, flags).unwrap();
        let m = p.find("ulice nová 12").unwrap();
        assert_eq!(m.group("__p0"), Some((6, 11)));
        assert_eq!(m.group("no"), Some((12, 14)));
        assert_eq!((m.start, m.end), (6, 14));
    }
}
