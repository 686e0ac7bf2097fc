//! Streaming delimiter search.
//!
//! [`BoundaryMatcher`] finds a fixed needle in input that arrives in pieces.
//! A needle may start in one chunk and end several chunks later; the matcher
//! carries the length of the partial match between calls so no input needs to
//! be searched twice and at most `needle.len() - 1` bytes of history matter.
//!
//! While no partial match is pending, whole chunks are searched with
//! `memchr::memmem`. Bytes that continue a pending partial match, and the tail
//! of a chunk that did not contain the needle, go through a KMP automaton.

use memchr::memmem::Finder;

/// A stateful matcher for one needle across consecutive chunks.
#[derive(Debug, Clone)]
pub struct BoundaryMatcher {
    needle: Box<[u8]>,
    /// `table[k]` is the length of the longest proper prefix of `needle[..=k]`
    /// that is also its suffix
    table: Box<[usize]>,
    finder: Finder<'static>,
    matched: usize,
}

impl BoundaryMatcher {
    /// Creates a matcher for `needle`.
    ///
    /// # Panics
    ///
    /// Panics if `needle` is empty.
    pub fn new(needle: &[u8]) -> Self {
        assert!(!needle.is_empty(), "needle must not be empty");
        Self {
            needle: needle.into(),
            table: prefix_table(needle),
            finder: Finder::new(needle).into_owned(),
            matched: 0,
        }
    }

    /// Feeds the next chunk.
    ///
    /// Returns the index within `chunk` of the last byte of the first needle
    /// occurrence, which may have started in earlier chunks. After a match the
    /// partial state is reset, so the next call starts a fresh search.
    pub fn find(&mut self, chunk: &[u8]) -> Option<usize> {
        let mut i = 0;

        // continue a partial match left by the previous chunk
        while self.matched > 0 && i < chunk.len() {
            self.advance(chunk[i]);
            if self.matched == self.needle.len() {
                self.matched = 0;
                return Some(i);
            }
            i += 1;
        }

        if i == chunk.len() {
            return None;
        }

        let rest = &chunk[i..];
        if let Some(start) = self.finder.find(rest) {
            return Some(i + start + self.needle.len() - 1);
        }

        // only the last needle.len() - 1 bytes can begin a match spanning into the next chunk
        let tail = rest.len().saturating_sub(self.needle.len() - 1);
        for &b in &rest[tail..] {
            self.advance(b);
        }
        None
    }

    /// Number of trailing bytes of the input seen so far that form a prefix of the needle.
    #[inline]
    pub fn matched(&self) -> usize {
        self.matched
    }

    #[inline]
    pub fn needle(&self) -> &[u8] {
        &self.needle
    }

    /// Forgets any partial match.
    #[inline]
    pub fn reset(&mut self) {
        self.matched = 0;
    }

    fn advance(&mut self, b: u8) {
        while self.matched > 0 && self.needle[self.matched] != b {
            self.matched = self.table[self.matched - 1];
        }
        if self.needle[self.matched] == b {
            self.matched += 1;
        }
    }
}

fn prefix_table(needle: &[u8]) -> Box<[usize]> {
    let mut table = vec![0; needle.len()];
    let mut len = 0;
    for i in 1..needle.len() {
        while len > 0 && needle[i] != needle[len] {
            len = table[len - 1];
        }
        if needle[i] == needle[len] {
            len += 1;
        }
        table[i] = len;
    }
    table.into_boxed_slice()
}
