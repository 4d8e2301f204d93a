// SPDX-License-Identifier: MIT
//
// Wrapping, truncation and padding of styled text.
//
// Wrapping is word-greedy: a line is split into runs of spaces and runs of
// everything else, escape codes riding along as a prefix of the run that
// follows them. Runs are packed left to right until the next one won't fit.
// A word wider than the whole line is chopped at code-point boundaries.
//
// A wrapped continuation line must look the same as if the original had
// simply been wider, so each one opens with the style active at the break.
// The same holds across hard newlines: style set on one input line carries
// onto the next.

use crate::escape::extract_ansi_code;
use crate::slice::slice_by_column;
use crate::style::{AnsiStyleTracker, update_tracker_from_text};
use crate::width::{char_width, visible_width};

/// Ellipsis used when callers have no preference.
pub const DEFAULT_ELLIPSIS: &str = "...";

// ─── Wrap ────────────────────────────────────────────────────────────────────

/// Wrap `text` to at most `width` visible columns per line.
///
/// Splits on `\n` first. Never returns an empty vector.
///
/// ```
/// use panda_term::wrap::wrap_text_with_ansi;
///
/// assert_eq!(wrap_text_with_ansi("one two three", 7), vec!["one two", "three"]);
/// assert_eq!(wrap_text_with_ansi("", 10), vec![""]);
/// ```
#[must_use]
pub fn wrap_text_with_ansi(text: &str, width: usize) -> Vec<String> {
    if text.is_empty() {
        return vec![String::new()];
    }
    let width = width.max(1);
    let mut out = Vec::new();
    let mut tracker = AnsiStyleTracker::new();

    for input in text.split('\n') {
        let prefix = if out.is_empty() { String::new() } else { tracker.active_codes() };
        out.extend(wrap_single_line(&format!("{prefix}{input}"), width));
        update_tracker_from_text(input, &mut tracker);
    }

    if out.is_empty() {
        out.push(String::new());
    }
    out
}

fn wrap_single_line(line: &str, width: usize) -> Vec<String> {
    if line.is_empty() {
        return vec![String::new()];
    }
    if visible_width(line) <= width {
        return vec![line.to_owned()];
    }

    let mut wrapped = Vec::new();
    let mut tracker = AnsiStyleTracker::new();
    let mut current = String::new();
    let mut current_width = 0;

    for token in tokenize(line) {
        let token_width = visible_width(&token);
        let is_space = token.trim().is_empty();

        if token_width > width && !is_space {
            if !current.is_empty() {
                current.push_str(tracker.line_end_reset());
                wrapped.push(std::mem::take(&mut current));
            }
            let mut broken = break_long_word(&token, width, &mut tracker);
            current = broken.pop().unwrap_or_default();
            current_width = visible_width(&current);
            wrapped.extend(broken);
            continue;
        }

        if current_width + token_width > width && current_width > 0 {
            let mut finished = current.trim_end().to_owned();
            finished.push_str(tracker.line_end_reset());
            wrapped.push(finished);
            current = tracker.active_codes();
            if is_space {
                current_width = 0;
            } else {
                current.push_str(&token);
                current_width = token_width;
            }
        } else {
            current.push_str(&token);
            current_width += token_width;
        }
        update_tracker_from_text(&token, &mut tracker);
    }

    if !current.is_empty() {
        wrapped.push(current);
    }
    if wrapped.is_empty() {
        return vec![String::new()];
    }
    wrapped.into_iter().map(|l| l.trim_end().to_owned()).collect()
}

/// Split into alternating space / non-space runs.
///
/// Escape codes are held back and attached to the front of the next run
/// they precede; codes at the very end join the last run.
fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut pending = String::new();
    let mut in_space = false;
    let mut i = 0;

    while i < text.len() {
        if let Some(code) = extract_ansi_code(text, i) {
            pending.push_str(code);
            i += code.len();
            continue;
        }
        let Some(ch) = text[i..].chars().next() else { break };
        let is_space = ch == ' ';
        if is_space != in_space && !current.is_empty() {
            tokens.push(std::mem::take(&mut current));
        }
        current.push_str(&pending);
        pending.clear();
        in_space = is_space;
        current.push(ch);
        i += ch.len_utf8();
    }

    current.push_str(&pending);
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

/// Chop a word wider than `width` into `width`-sized chunks.
///
/// Every chunk starts with the style active at its first character.
fn break_long_word(word: &str, width: usize, tracker: &mut AnsiStyleTracker) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = tracker.active_codes();
    let mut current_width = 0;
    let mut i = 0;

    while i < word.len() {
        if let Some(code) = extract_ansi_code(word, i) {
            current.push_str(code);
            tracker.process(code);
            i += code.len();
            continue;
        }
        let Some(ch) = word[i..].chars().next() else { break };
        let w = char_width(ch);
        if current_width + w > width && current_width > 0 {
            current.push_str(tracker.line_end_reset());
            lines.push(std::mem::replace(&mut current, tracker.active_codes()));
            current_width = 0;
        }
        current.push(ch);
        current_width += w;
        i += ch.len_utf8();
    }

    if !current.is_empty() {
        lines.push(current);
    }
    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}

// ─── Truncate & Pad ──────────────────────────────────────────────────────────

/// Clip `text` to `max_width` columns, marking the cut with `ellipsis`.
///
/// Text that already fits is returned untouched (padded if `pad`). When the
/// ellipsis alone is at least `max_width` wide, the ellipsis itself is
/// clipped and returned.
#[must_use]
pub fn truncate_to_width(text: &str, max_width: usize, ellipsis: &str, pad: bool) -> String {
    let text_width = visible_width(text);
    if text_width <= max_width {
        if pad {
            return format!("{text}{}", " ".repeat(max_width - text_width));
        }
        return text.to_owned();
    }

    let ellipsis_width = visible_width(ellipsis);
    if max_width <= ellipsis_width {
        return slice_by_column(ellipsis, 0, max_width, true);
    }
    let target = max_width - ellipsis_width;

    let mut kept = String::new();
    let mut kept_width = 0;
    let mut i = 0;
    while i < text.len() {
        if let Some(code) = extract_ansi_code(text, i) {
            kept.push_str(code);
            i += code.len();
            continue;
        }
        let Some(ch) = text[i..].chars().next() else { break };
        let w = char_width(ch);
        if kept_width + w > target {
            break;
        }
        kept.push(ch);
        kept_width += w;
        i += ch.len_utf8();
    }

    let mut out = format!("{kept}\x1b[0m{ellipsis}");
    if pad {
        let w = visible_width(&out);
        out.push_str(&" ".repeat(max_width.saturating_sub(w)));
    }
    out
}

/// Pad `line` with spaces to `width`, then hand the whole row to `paint`.
///
/// `paint` is usually a background-color wrapper.
pub fn apply_background_to_line(line: &str, width: usize, paint: impl Fn(&str) -> String) -> String {
    let padding = width.saturating_sub(visible_width(line));
    paint(&format!("{line}{}", " ".repeat(padding)))
}

// ─── Tests ───────────────────────────────────────────────────────────────────
