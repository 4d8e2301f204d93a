// SPDX-License-Identifier: MIT
//
// ANSI escape sequence generation.
//
// Pure functions that write escape sequences to any `impl Write`. No state,
// no decisions about when to emit; the renderer makes those. This module
// just knows the byte-level encoding of every terminal command the line
// renderer needs.
//
// The renderer never addresses the screen absolutely. Every vertical move is
// relative to the hardware cursor row it tracks, because the frame lives in
// the normal screen buffer and scrolls with the shell's scrollback. Columns
// are the exception: CHA (`ESC [ n G`) is absolute within the current row.
//
// All functions return `io::Result` propagated from the underlying writer.
// In practice they never fail when writing to `OutputBuffer` (backed by a Vec).
use std::io::{self, Write};

// ─── Markers ─────────────────────────────────────────────────────────────────

/// Cursor marker that components embed where the hardware cursor belongs.
///
/// An APC sequence (`ESC _ pi:c BEL`). Terminals that don't understand APC
/// swallow it silently; the pipeline strips it before painting anyway.
pub const CURSOR_MARKER: &str = "\x1b_pi:c\x07";

/// Per-line reset appended to every painted non-image line.
///
/// SGR reset plus an empty OSC 8 hyperlink, so neither a style nor an open
/// hyperlink can bleed into the next row.
pub const SEGMENT_RESET: &str = "\x1b[0m\x1b]8;;\x07";

/// Clear scrollback, clear screen, home the cursor.
pub const CLEAR_ALL: &str = "\x1b[3J\x1b[2J\x1b[H";

/// Begin synchronized output (DEC Private Mode 2026).
pub const SYNC_START: &str = "\x1b[?2026h";

/// End synchronized output.
pub const SYNC_END: &str = "\x1b[?2026l";

/// Erase the entire current line (EL 2).
pub const CLEAR_LINE: &str = "\x1b[2K";

// ─── Cursor ──────────────────────────────────────────────────────────────────

/// Move the cursor up `n` rows (CUU). Nothing is written for `n == 0`.
#[inline]
pub fn cursor_up(w: &mut impl Write, n: usize) -> io::Result<()> {
    if n == 0 {
        return Ok(());
    }
    write!(w, "\x1b[{n}A")
}

/// Move the cursor down `n` rows (CUD). Nothing is written for `n == 0`.
#[inline]
pub fn cursor_down(w: &mut impl Write, n: usize) -> io::Result<()> {
    if n == 0 {
        return Ok(());
    }
    write!(w, "\x1b[{n}B")
}

/// Move the cursor by a signed row delta: negative is up, positive is down.
pub fn move_by(w: &mut impl Write, delta: isize) -> io::Result<()> {
    if delta < 0 {
        cursor_up(w, delta.unsigned_abs())
    } else {
        cursor_down(w, delta.unsigned_abs())
    }
}

/// Move the cursor to an absolute column on the current row (CHA).
///
/// Our columns are 0-indexed; CHA is 1-indexed.
#[inline]
pub fn cursor_column(w: &mut impl Write, col: usize) -> io::Result<()> {
    write!(w, "\x1b[{}G", col + 1)
}

/// Hide the cursor (DECTCEM reset).
#[inline]
pub fn cursor_hide(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[?25l")
}

/// Show the cursor (DECTCEM set).
#[inline]
pub fn cursor_show(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[?25h")
}

// ─── Screen ──────────────────────────────────────────────────────────────────

/// Erase the whole current line. The cursor does not move.
#[inline]
pub fn clear_line(w: &mut impl Write) -> io::Result<()> {
    w.write_all(CLEAR_LINE.as_bytes())
}

/// Erase from the cursor to the end of the screen (ED 0).
#[inline]
pub fn clear_from_cursor(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[J")
}

/// Clear the visible screen and home the cursor.
#[inline]
pub fn clear_screen(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[2J\x1b[H")
}

/// Clear scrollback and screen, then home the cursor.
///
/// Used by full redraws: the previous frame may have scrolled into history,
/// and a width change reflows everything the terminal kept.
#[inline]
pub fn clear_all(w: &mut impl Write) -> io::Result<()> {
    w.write_all(CLEAR_ALL.as_bytes())
}

// ─── Synchronized Output ─────────────────────────────────────────────────────

/// Begin synchronized output (DEC Private Mode 2026).
///
/// Tells the terminal to buffer all subsequent output until [`end_sync`].
/// This prevents partial frame updates from causing visible flicker.
#[inline]
pub fn begin_sync(w: &mut impl Write) -> io::Result<()> {
    w.write_all(SYNC_START.as_bytes())
}

/// End synchronized output; the terminal presents the buffered frame.
#[inline]
pub fn end_sync(w: &mut impl Write) -> io::Result<()> {
    w.write_all(SYNC_END.as_bytes())
}

// ─── Kitty Keyboard Protocol ────────────────────────────────────────────────

/// Ask the terminal for its current Kitty keyboard flags (`CSI ? u`).
///
/// Terminals that implement the protocol answer `CSI ? flags u`; everyone
/// else stays silent.
#[inline]
pub fn query_kitty_keyboard(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[?u")
}

/// Push Kitty keyboard flags.
///
/// Flags 7 = disambiguate (1) + report event types (2) + report alternate
/// keys (4). Event types are what make key-release filtering possible.
#[inline]
pub fn enable_kitty_keyboard(w: &mut impl Write, flags: u8) -> io::Result<()> {
    write!(w, "\x1b[>{flags}u")
}

/// Disable the Kitty keyboard protocol.
///
/// Pops the pushed enhancement (`CSI < u`) and also sends the `CSI > 7 l`
/// form, which some terminals key their reset on.
#[inline]
pub fn disable_kitty_keyboard(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[<u\x1b[>7l")
}

// ─── Bracketed Paste ────────────────────────────────────────────────────────

/// Enable bracketed paste mode (DEC 2004).
///
/// Pasted text is wrapped with `\x1b[200~` / `\x1b[201~`, letting the input
/// demultiplexer deliver a paste as one event instead of a key storm.
#[inline]
pub fn enable_bracketed_paste(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[?2004h")
}

/// Disable bracketed paste mode.
#[inline]
pub fn disable_bracketed_paste(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[?2004l")
}

// ─── Queries & Window ───────────────────────────────────────────────────────

/// Ask for the cell size in pixels (XTWINOPS 16).
///
/// The response is `CSI 6 ; height ; width t`.
#[inline]
pub fn query_cell_size(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[16t")
}

/// Set the window title (OSC 0).
#[inline]
pub fn set_title(w: &mut impl Write, title: &str) -> io::Result<()> {
    write!(w, "\x1b]0;{title}\x07")
}

// ─── Tests ───────────────────────────────────────────────────────────────────
