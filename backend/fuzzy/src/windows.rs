/// Restartable iterator over runs of consecutive words.
///
/// Yields `(substring, byte_offset)` for every window of `1..=max_words`
/// words, grouped by start word, longest window first. A word is a maximal
/// run of alphanumeric characters; the substring spans from the first word's
/// start to the last word's end in the original text.
#[derive(Debug, Clone)]
pub struct WordWindows<'a> {
    text: &'a str,
    words: Vec<(usize, usize)>,
    max_words: usize,
    start: usize,
    size: usize,
}

impl<'a> WordWindows<'a> {
    pub fn new(text: &'a str, max_words: usize) -> Self {
        let mut words = Vec::new();
        let mut open: Option<usize> = None;
        for (i, c) in text.char_indices() {
            match (c.is_alphanumeric(), open) {
                (true, None) => open = Some(i),
                (false, Some(s)) => {
                    words.push((s, i));
                    open = None;
                }
                _ => {}
            }
        }
        if let Some(s) = open {
            words.push((s, text.len()));
        }

        let mut windows = Self {
            text,
            words,
            max_words: max_words.max(1),
            start: 0,
            size: 0,
        };
        windows.rewind();
        windows
    }

    /// Byte spans of the words, in order.
    pub fn words(&self) -> &[(usize, usize)] {
        &self.words
    }

    /// Restart from the first word.
    pub fn rewind(&mut self) {
        self.start = 0;
        self.size = self.widest_at(0);
    }

    /// Jump to the first word starting at or after `offset`.
    pub fn skip_to(&mut self, offset: usize) {
        self.start = self.words.partition_point(|&(s, _)| s < offset);
        self.size = self.widest_at(self.start);
    }

    fn widest_at(&self, start: usize) -> usize {
        self.max_words.min(self.words.len().saturating_sub(start))
    }
}

impl<'a> Iterator for WordWindows<'a> {
    type Item = (&'a str, usize);

    fn next(&mut self) -> Option<Self::Item> {
        while self.start < self.words.len() {
            if self.size == 0 {
                self.start += 1;
                self.size = self.widest_at(self.start);
                continue;
            }
            let from = self.words[self.start].0;
            let to = self.words[self.start + self.size - 1].1;
            self.size -= 1;
            return Some((&self.text[from..to], from));
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn longest_window_first_per_start_word() {
        let windows: Vec<_> = WordWindows::new("jedu do Brna", 2).collect();
        assert_eq!(
            windows,
            vec![
                ("jedu do", 0),
                ("jedu", 0),
                ("do Brna", 5),
                ("do", 5),
                ("Brna", 8),
            ]
        );
    }

    #[test]
    fn offsets_are_bytes_over_multibyte_text() {
        let windows: Vec<_> = WordWindows::new("Ústí, Brňany!", 1).collect();
        assert_eq!(windows, vec![("Ústí", 0), ("Brňany", 8)]);
    }

    #[test]
    fn rewind_and_skip() {
        let mut windows = WordWindows::new("a b c", 3);
        assert_eq!(windows.next(), Some(("a b c", 0)));
        windows.skip_to(3);
        assert_eq!(windows.next(), Some(("c", 4)));
        assert_eq!(windows.next(), None);
        windows.rewind();
        assert_eq!(windows.count(), 6);
    }

    #[test]
    fn no_words_no_windows() {
        assert_eq!(WordWindows::new(" , ", 3).count(), 0);
        assert_eq!(WordWindows::new("", 3).count(), 0);
    }
}
