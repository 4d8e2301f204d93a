// SPDX-License-Identifier: MIT
//
// Column-accurate slicing of styled lines.
//
// Both routines walk the line one code point at a time, skipping escape
// sequences as zero-width, and keep a running visible column. The subtle
// part is style at the cut: codes that were issued before the window opens
// still govern the first character inside it, so they are carried forward
// and emitted just before that character.
//
// `strict` guards the width invariant. A character whose right edge would
// land past the window end is dropped instead of spilling one column over.

use crate::escape::extract_ansi_code;
use crate::style::AnsiStyleTracker;
use crate::width::char_width;

/// One step of a walk over a styled line.
enum Piece<'a> {
    Code(&'a str),
    Char(char),
}

/// Iterate `line` as alternating escape codes and visible characters.
fn pieces(line: &str) -> impl Iterator<Item = Piece<'_>> {
    let mut i = 0;
    std::iter::from_fn(move || {
        if i >= line.len() {
            return None;
        }
        if let Some(code) = extract_ansi_code(line, i) {
            i += code.len();
            return Some(Piece::Code(code));
        }
        let ch = line[i..].chars().next()?;
        i += ch.len_utf8();
        Some(Piece::Char(ch))
    })
}

/// Cut the visible columns `[start_col, start_col + length)` out of `line`.
///
/// Returns the slice (with the style active at `start_col` restored) and its
/// visible width.
#[must_use]
pub fn slice_with_width(line: &str, start_col: usize, length: usize, strict: bool) -> (String, usize) {
    if length == 0 {
        return (String::new(), 0);
    }
    let end_col = start_col + length;
    let mut out = String::new();
    let mut width = 0;
    let mut col = 0;
    let mut pending = String::new();

    for piece in pieces(line) {
        match piece {
            Piece::Code(code) => {
                if col < start_col {
                    pending.push_str(code);
                } else if col < end_col {
                    out.push_str(code);
                }
            }
            Piece::Char(ch) => {
                let w = char_width(ch);
                let in_range = col >= start_col && col < end_col;
                let fits = !strict || col + w <= end_col;
                if in_range && fits {
                    if !pending.is_empty() {
                        out.push_str(&pending);
                        pending.clear();
                    }
                    out.push(ch);
                    width += w;
                }
                col += w;
                if col >= end_col {
                    break;
                }
            }
        }
    }
    (out, width)
}

/// [`slice_with_width`] without the width.
#[must_use]
pub fn slice_by_column(line: &str, start_col: usize, length: usize, strict: bool) -> String {
    slice_with_width(line, start_col, length, strict).0
}

/// The two pieces of a line either side of an overlay.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Segments {
    pub before: String,
    pub before_width: usize,
    pub after: String,
    pub after_width: usize,
}

/// Extract `[0, before_end)` and `[after_start, after_start + after_len)`
/// from `line` in one pass.
///
/// `after` opens with the style accumulated over everything to its left,
/// including the skipped middle, so it renders exactly as it would have in
/// the full line.
#[must_use]
pub fn extract_segments(
    line: &str,
    before_end: usize,
    after_start: usize,
    after_len: usize,
    strict_after: bool,
) -> Segments {
    let after_end = after_start + after_len;
    let mut seg = Segments::default();
    let mut tracker = AnsiStyleTracker::new();
    let mut pending_before = String::new();
    let mut after_started = false;
    let mut col = 0;

    for piece in pieces(line) {
        match piece {
            Piece::Code(code) => {
                tracker.process(code);
                if col < before_end {
                    pending_before.push_str(code);
                } else if after_started && col < after_end {
                    seg.after.push_str(code);
                }
            }
            Piece::Char(ch) => {
                let w = char_width(ch);
                if col < before_end {
                    if !pending_before.is_empty() {
                        seg.before.push_str(&pending_before);
                        pending_before.clear();
                    }
                    seg.before.push(ch);
                    seg.before_width += w;
                } else if col >= after_start && col < after_end && (!strict_after || col + w <= after_end) {
                    if !after_started {
                        seg.after.push_str(&tracker.active_codes());
                        after_started = true;
                    }
                    seg.after.push(ch);
                    seg.after_width += w;
                }
                col += w;
                let done = if after_len == 0 { col >= before_end } else { col >= after_end };
                if done {
                    break;
                }
            }
        }
    }
    seg
}

// ─── Tests ───────────────────────────────────────────────────────────────────
