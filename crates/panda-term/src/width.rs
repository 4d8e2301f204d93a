// SPDX-License-Identifier: MIT
//
// Visible-column width of styled text.
//
// Width is what the terminal cursor advances when the string is printed:
// escape sequences contribute nothing, a tab is three columns, and every
// other code point is exactly one column. That last rule is the contract
// the whole renderer is built on. CJK, emoji and combining marks are
// miscounted on purpose until grapheme-aware width is taken on as a
// separate feature.
//
// Measurements are memoized in a process-wide cache. The render loop asks
// for the width of the same few hundred lines every frame, and most of
// them never change.

use std::collections::HashMap;
use std::sync::{LazyLock, RwLock};

use crate::escape::extract_ansi_code;

/// Columns a tab expands to.
pub const TAB_WIDTH: usize = 3;

/// Default bound on the number of memoized measurements.
pub const DEFAULT_CACHE_CAPACITY: usize = 512;

static GLOBAL: LazyLock<WidthCache> = LazyLock::new(|| WidthCache::new(DEFAULT_CACHE_CAPACITY));

/// Visible columns occupied by `s` when printed.
///
/// Pure printable ASCII bypasses the cache. Everything else goes through
/// the global [`WidthCache`].
///
/// ```
/// use panda_term::width::visible_width;
///
/// assert_eq!(visible_width("\x1b[1;32mbold green\x1b[0m"), 10);
/// assert_eq!(visible_width("a\tb"), 5);
/// ```
#[must_use]
pub fn visible_width(s: &str) -> usize {
    if s.is_empty() {
        return 0;
    }
    if is_printable_ascii(s) {
        return s.len();
    }
    WidthCache::global().measure(s)
}

/// Measure without touching any cache.
#[must_use]
pub fn measure_uncached(s: &str) -> usize {
    let bytes = s.as_bytes();
    let mut width = 0;
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == 0x1b {
            if let Some(code) = extract_ansi_code(s, i) {
                i += code.len();
                continue;
            }
        }
        // `i` always sits on a char boundary: codes are ASCII-delimited.
        let Some(ch) = s[i..].chars().next() else { break };
        width += char_width(ch);
        i += ch.len_utf8();
    }
    width
}

/// Visible width of a single character outside any escape sequence.
#[inline]
#[must_use]
pub const fn char_width(ch: char) -> usize {
    if ch == '\t' { TAB_WIDTH } else { 1 }
}

#[inline]
fn is_printable_ascii(s: &str) -> bool {
    s.bytes().all(|b| (0x20..0x7f).contains(&b))
}

// ─── Cache ───────────────────────────────────────────────────────────────────

/// Bounded memo of string → visible width.
///
/// Reads share the lock; inserts and eviction take it exclusively. When
/// full, an arbitrary entry is evicted to make room. A poisoned lock is
/// recovered rather than propagated: the map holds nothing a panic could
/// leave half-written.
#[derive(Debug)]
pub struct WidthCache {
    entries: RwLock<HashMap<String, usize>>,
    capacity: usize,
}

impl WidthCache {
    /// Create an empty cache holding at most `capacity` entries.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::with_capacity(capacity)),
            capacity: capacity.max(1),
        }
    }

    /// The process-wide cache used by [`visible_width`].
    #[must_use]
    pub fn global() -> &'static Self {
        &GLOBAL
    }

    /// Width of `s`, computed once and remembered.
    pub fn measure(&self, s: &str) -> usize {
        {
            let entries = self
                .entries
                .read()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            if let Some(&w) = entries.get(s) {
                return w;
            }
        }

        let width = measure_uncached(s);

        let mut entries = self
            .entries
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if entries.len() >= self.capacity && !entries.contains_key(s) {
            if let Some(victim) = entries.keys().next().cloned() {
                entries.remove(&victim);
            }
        }
        entries.insert(s.to_owned(), width);
        width
    }

    /// Number of memoized entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }

    /// Whether nothing is memoized yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum number of entries retained.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    // ── Width ───────────────────────────────────────────────────────────

    #[test]
    fn empty_is_zero() {
        assert_eq!(visible_width(""), 0);
    }

    #[test]
    fn plain_ascii() {
        assert_eq!(visible_width("hello"), 5);
    }

    #[test]
    fn sgr_is_zero_width() {
        assert_eq!(visible_width("\x1b[1;32mbold green\x1b[0m"), 10);
    }

    #[test]
    fn tab_is_three_columns() {
        assert_eq!(visible_width("a\tb"), 5);
        assert_eq!(visible_width("\t"), 3);
    }

    #[test]
    fn hyperlink_is_zero_width() {
        let s = "\x1b]8;;https://x.example\x07click\x1b]8;;\x07";
        assert_eq!(visible_width(s), 5);
    }

    #[test]
    fn apc_marker_is_zero_width() {
        assert_eq!(visible_width("ab\x1b_pi:c\x07cd"), 4);
    }

    #[test]
    fn one_column_per_code_point() {
        assert_eq!(visible_width("héllo"), 5);
        assert_eq!(visible_width("日本"), 2);
        assert_eq!(visible_width("─────"), 5);
    }

    #[test]
    fn trailing_sgr_does_not_change_width() {
        for s in ["abc", "\x1b[1mx", "日本", "a\tb"] {
            let with = format!("{s}\x1b[38;5;123m");
            assert_eq!(visible_width(s), visible_width(&with), "{s:?}");
        }
    }

    #[test]
    fn unrecognised_escape_counts() {
        // `ESC x` is not a code; both bytes are visible characters.
        assert_eq!(visible_width("\x1bx"), 2);
    }

    // ── Cache ───────────────────────────────────────────────────────────

    #[test]
    fn cache_remembers() {
        let cache = WidthCache::new(8);
        assert!(cache.is_empty());
        assert_eq!(cache.measure("\x1b[1mab\x1b[0m"), 2);
        assert_eq!(cache.measure("\x1b[1mab\x1b[0m"), 2);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn cache_is_bounded() {
        let cache = WidthCache::new(4);
        for i in 0..20 {
            let s = format!("\x1b[1m{}", "x".repeat(i));
            assert_eq!(cache.measure(&s), i);
        }
        assert_eq!(cache.len(), 4);
        assert_eq!(cache.capacity(), 4);
    }

    #[test]
    fn cache_shared_across_threads() {
        let cache = std::sync::Arc::new(WidthCache::new(16));
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let cache = std::sync::Arc::clone(&cache);
                std::thread::spawn(move || {
                    for i in 0..50 {
                        let s = format!("\x1b[3{t}m{}", "y".repeat(i % 10));
                        assert_eq!(cache.measure(&s), i % 10);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert!(cache.len() <= 16);
    }
}
