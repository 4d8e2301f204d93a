// SPDX-License-Identifier: MIT
//
// Hardware cursor placement.
//
// Components mark where the cursor belongs by embedding `CURSOR_MARKER` in
// a line. After compositing, the pipeline pulls the marker out (it must
// never reach the terminal as part of a diffed line) and remembers its
// position. After painting, the cursor manager walks the hardware cursor
// there with relative moves: the renderer never knows the absolute screen
// row, only which frame row the cursor last landed on.

use std::io;

use panda_term::ansi::{self, CURSOR_MARKER};
use panda_term::output::OutputBuffer;
use panda_term::visible_width;

/// A frame position: row index into the frame, visible column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CursorPos {
    pub row: usize,
    pub col: usize,
}

/// Find and strip the cursor marker.
///
/// Only the visible viewport (the last `height` lines) is searched, bottom
/// up; the last marker in reading order wins. Every marker in the frame is
/// removed either way.
pub fn extract_cursor_position(lines: &mut [String], height: usize) -> Option<CursorPos> {
    let viewport_top = lines.len().saturating_sub(height);
    let mut found = None;

    for row in (viewport_top..lines.len()).rev() {
        if let Some(idx) = lines[row].rfind(CURSOR_MARKER) {
            let col = visible_width(&lines[row][..idx]);
            found = Some(CursorPos { row, col });
            break;
        }
    }

    for line in lines.iter_mut() {
        if line.contains(CURSOR_MARKER) {
            *line = line.replace(CURSOR_MARKER, "");
        }
    }
    found
}

/// Tracks where the hardware cursor is, in frame rows.
#[derive(Debug, Default)]
pub struct CursorManager {
    /// Last row of the frame as painted.
    cursor_row: usize,
    /// Row the terminal's cursor actually sits on.
    hardware_row: usize,
    show_hardware_cursor: bool,
}

impl CursorManager {
    #[must_use]
    pub fn new(show_hardware_cursor: bool) -> Self {
        Self {
            show_hardware_cursor,
            ..Self::default()
        }
    }

    #[inline]
    #[must_use]
    pub const fn cursor_row(&self) -> usize {
        self.cursor_row
    }

    #[inline]
    #[must_use]
    pub const fn hardware_row(&self) -> usize {
        self.hardware_row
    }

    #[inline]
    pub const fn set_rows(&mut self, cursor_row: usize, hardware_row: usize) {
        self.cursor_row = cursor_row;
        self.hardware_row = hardware_row;
    }

    #[inline]
    #[must_use]
    pub const fn show_hardware_cursor(&self) -> bool {
        self.show_hardware_cursor
    }

    /// Takes effect at the next [`position`](Self::position).
    pub const fn set_show_hardware_cursor(&mut self, show: bool) {
        self.show_hardware_cursor = show;
    }

    /// Forget everything; the next frame starts from row 0.
    pub const fn reset(&mut self) {
        self.cursor_row = 0;
        self.hardware_row = 0;
    }

    /// Move the cursor to `pos` in a frame of `total_lines` rows.
    ///
    /// No position (or an empty frame) hides the cursor. The row is clamped
    /// into the frame.
    ///
    /// # Errors
    ///
    /// Only if writing into `out` fails.
    pub fn position(
        &mut self,
        pos: Option<CursorPos>,
        total_lines: usize,
        out: &mut OutputBuffer,
    ) -> io::Result<()> {
        let Some(pos) = pos.filter(|_| total_lines > 0) else {
            return ansi::cursor_hide(out);
        };

        let row = pos.row.min(total_lines - 1);
        #[allow(clippy::cast_possible_wrap)] // Frame rows never approach isize::MAX.
        let delta = row as isize - self.hardware_row as isize;
        ansi::move_by(out, delta)?;
        ansi::cursor_column(out, pos.col)?;
        if self.show_hardware_cursor {
            ansi::cursor_show(out)?;
        } else {
            ansi::cursor_hide(out)?;
        }
        self.hardware_row = row;
        Ok(())
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn s(lines: &[&str]) -> Vec<String> {
        lines.iter().map(|l| (*l).to_owned()).collect()
    }

    fn out_str(out: &OutputBuffer) -> String {
        String::from_utf8_lossy(out.as_bytes()).into_owned()
    }

    // ── Extraction ──────────────────────────────────────────────────────

    #[test]
    fn no_marker() {
        let mut lines = s(&["a", "b"]);
        assert_eq!(extract_cursor_position(&mut lines, 10), None);
        assert_eq!(lines, s(&["a", "b"]));
    }

    #[test]
    fn marker_position_and_removal() {
        let mut lines = vec![
            "top".to_owned(),
            format!("\x1b[1m> \x1b[0mab{CURSOR_MARKER}c"),
        ];
        let pos = extract_cursor_position(&mut lines, 10);
        assert_eq!(pos, Some(CursorPos { row: 1, col: 4 }));
        assert_eq!(lines[1], "\x1b[1m> \x1b[0mabc");
    }

    #[test]
    fn last_marker_wins() {
        let mut lines = vec![
            format!("a{CURSOR_MARKER}"),
            format!("{CURSOR_MARKER}x{CURSOR_MARKER}yz"),
        ];
        let pos = extract_cursor_position(&mut lines, 10);
        assert_eq!(pos, Some(CursorPos { row: 1, col: 1 }));
        assert!(lines.iter().all(|l| !l.contains(CURSOR_MARKER)));
    }

    #[test]
    fn marker_above_viewport_ignored() {
        let mut lines = vec![format!("a{CURSOR_MARKER}"), "b".into(), "c".into()];
        assert_eq!(extract_cursor_position(&mut lines, 2), None);
        assert_eq!(lines[0], "a");
    }

    // ── Positioning ─────────────────────────────────────────────────────

    #[test]
    fn hides_without_position() {
        let mut cm = CursorManager::new(true);
        let mut out = OutputBuffer::new();
        cm.position(None, 5, &mut out).unwrap();
        assert_eq!(out_str(&out), "\x1b[?25l");

        out.clear();
        cm.position(Some(CursorPos { row: 0, col: 0 }), 0, &mut out).unwrap();
        assert_eq!(out_str(&out), "\x1b[?25l");
    }

    #[test]
    fn relative_move_then_column() {
        let mut cm = CursorManager::new(false);
        cm.set_rows(4, 4);
        let mut out = OutputBuffer::new();
        cm.position(Some(CursorPos { row: 1, col: 7 }), 5, &mut out).unwrap();
        assert_eq!(out_str(&out), "\x1b[3A\x1b[8G\x1b[?25l");
        assert_eq!(cm.hardware_row(), 1);

        out.clear();
        cm.set_show_hardware_cursor(true);
        cm.position(Some(CursorPos { row: 3, col: 0 }), 5, &mut out).unwrap();
        assert_eq!(out_str(&out), "\x1b[2B\x1b[1G\x1b[?25h");
    }

    #[test]
    fn row_is_clamped() {
        let mut cm = CursorManager::new(true);
        let mut out = OutputBuffer::new();
        cm.position(Some(CursorPos { row: 50, col: 2 }), 3, &mut out).unwrap();
        assert_eq!(out_str(&out), "\x1b[2B\x1b[3G\x1b[?25h");
        assert_eq!(cm.hardware_row(), 2);
    }
}
