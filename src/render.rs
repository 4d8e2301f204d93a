// SPDX-License-Identifier: MIT
//
// Differential line renderer.
//
// The terminal keeps whatever we printed. Each frame, the renderer compares
// the new lines with the previous frame and emits the smallest byte stream
// that turns one into the other: relative cursor moves to the first changed
// row, then erase-and-rewrite of every row up to the last change.
//
// The screen is a window onto a taller buffer. Frames taller than the
// terminal scroll the top rows into scrollback, where no cursor move can
// reach them. The renderer tracks:
//
//   max_lines_rendered     tallest frame painted this session; the
//                          terminal buffer never gets shorter
//   previous_viewport_top  first buffer row visible on screen
//   hardware row           row the terminal's cursor sits on (in the
//                          cursor manager)
//
// A change it cannot reach, a width change, or a shrink of more than a
// screen triggers a full redraw: clear scrollback and screen, print every
// line.
//
// Each paint is bracketed by synchronized-output markers so terminals
// that support them present it atomically.

use std::io;

use panda_term::ansi::{self, SEGMENT_RESET};
use panda_term::output::OutputBuffer;
use panda_term::{is_image_line, visible_width};
use thiserror::Error;

use crate::cursor::CursorManager;

/// A line wider than the terminal, and the frame that carried it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line {line} is {width} columns wide but the terminal is {terminal_width}")]
pub struct LineOverflow {
    /// Frame row of the offending line.
    pub line: usize,
    /// Its visible width.
    pub width: usize,
    pub terminal_width: usize,
    /// The rejected frame, returned for the crash log.
    pub frame: Vec<String>,
}

/// Why a frame was not painted.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error(transparent)]
    Overflow(#[from] LineOverflow),

    /// Encoding into the output buffer failed.
    #[error("failed to encode frame: {0}")]
    Io(#[from] io::Error),
}

/// Inputs of one paint besides the lines themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameParams {
    pub width: usize,
    pub height: usize,
    pub clear_on_shrink: bool,
    pub overlays_visible: bool,
}

/// What a paint did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Paint {
    /// Every line was printed; `clear` when scrollback was wiped first.
    Full { clear: bool },
    /// Rows `first..=last` were rewritten.
    Patch { first: usize, last: usize },
    /// Only trailing rows were erased.
    Truncate { removed: usize },
    /// Nothing changed.
    Unchanged,
}

/// Append the segment reset to every non-image line.
pub fn apply_line_resets(lines: &mut [String]) {
    for line in lines.iter_mut().filter(|l| !is_image_line(l)) {
        line.push_str(SEGMENT_RESET);
    }
}

// ─── Render State ───────────────────────────────────────────────────────────

/// What the terminal holds after the last paint.
#[derive(Debug, Default)]
pub struct RenderState {
    previous_lines: Vec<String>,
    /// 0 until the first paint.
    previous_width: usize,
    max_lines_rendered: usize,
    previous_viewport_top: usize,
    full_redraw_count: usize,
    /// Next paint must clear, set by [`reset`](Self::reset).
    force_clear: bool,
}

impl RenderState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Smallest `(first, last)` range of rows that differ, missing rows
    /// counting as empty. `None` when identical.
    #[must_use]
    pub fn find_changed_line_range(&self, new_lines: &[String]) -> Option<(usize, usize)> {
        let len = self.previous_lines.len().max(new_lines.len());
        let mut range: Option<(usize, usize)> = None;
        for i in 0..len {
            let old = self.previous_lines.get(i).map_or("", String::as_str);
            let new = new_lines.get(i).map_or("", String::as_str);
            if old != new {
                range = Some(range.map_or((i, i), |(first, _)| (first, i)));
            }
        }
        range
    }

    /// First buffer row visible on a `height`-row screen.
    #[inline]
    #[must_use]
    pub const fn viewport_top(&self, height: usize) -> usize {
        self.max_lines_rendered.saturating_sub(height)
    }

    #[must_use]
    pub fn previous_lines(&self) -> &[String] {
        &self.previous_lines
    }

    #[inline]
    #[must_use]
    pub const fn previous_width(&self) -> usize {
        self.previous_width
    }

    #[inline]
    #[must_use]
    pub const fn max_lines_rendered(&self) -> usize {
        self.max_lines_rendered
    }

    #[inline]
    #[must_use]
    pub const fn previous_viewport_top(&self) -> usize {
        self.previous_viewport_top
    }

    /// Full redraws so far, first paint included.
    #[inline]
    #[must_use]
    pub const fn full_redraw_count(&self) -> usize {
        self.full_redraw_count
    }

    /// Forget the screen; the next paint clears and redraws everything.
    pub fn reset(&mut self) {
        self.previous_lines.clear();
        self.previous_width = 0;
        self.max_lines_rendered = 0;
        self.previous_viewport_top = 0;
        self.force_clear = true;
    }
}

// ─── Diff Renderer ──────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct DiffRenderer {
    state: RenderState,
}

impl DiffRenderer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn state(&self) -> &RenderState {
        &self.state
    }

    /// See [`RenderState::reset`].
    pub fn reset(&mut self) {
        self.state.reset();
    }

    /// Paint `lines` into `out`.
    ///
    /// `lines` are final: overlays composited, cursor marker removed,
    /// segment resets applied. The hardware cursor is left on the last row
    /// written; positioning it is the caller's job.
    ///
    /// # Errors
    ///
    /// [`RenderError::Overflow`] when a line to be painted is wider than
    /// `params.width`. Nothing is written and no state changes.
    pub fn render(
        &mut self,
        lines: Vec<String>,
        params: FrameParams,
        cursor: &mut CursorManager,
        out: &mut OutputBuffer,
    ) -> Result<Paint, RenderError> {
        let FrameParams { width, .. } = params;
        let height = params.height.max(1);
        let state = &self.state;
        let width_changed = state.previous_width != 0 && state.previous_width != width;

        if state.force_clear {
            return self.full_render(lines, width, height, true, "forced", cursor, out);
        }
        if state.previous_lines.is_empty() && !width_changed {
            return self.full_render(lines, width, height, false, "first render", cursor, out);
        }
        if width_changed {
            return self.full_render(lines, width, height, true, "width changed", cursor, out);
        }
        if params.clear_on_shrink && lines.len() < state.max_lines_rendered && !params.overlays_visible {
            return self.full_render(lines, width, height, true, "clear on shrink", cursor, out);
        }

        let prev_len = state.previous_lines.len();
        let appended = lines.len() > prev_len;
        let (first, last) = match (state.find_changed_line_range(&lines), appended) {
            (None, false) => {
                self.state.previous_viewport_top = self.state.viewport_top(height);
                return Ok(Paint::Unchanged);
            }
            (None, true) => (prev_len, lines.len() - 1),
            (Some((first, _)), true) => (first, lines.len() - 1),
            (Some(range), false) => range,
        };

        if first >= lines.len() {
            return self.truncate(lines, width, height, cursor, out);
        }

        let viewport_top = self.state.viewport_top(height);
        if first < viewport_top {
            tracing::debug!(target: "render.diff", first, viewport_top, "change_above_viewport");
            return self.full_render(lines, width, height, true, "change above viewport", cursor, out);
        }

        let render_end = last.min(lines.len() - 1);
        let lines = check_widths(lines, first..=render_end, width)?;
        self.patch(lines, first, render_end, width, height, cursor, out)
    }

    #[allow(clippy::too_many_arguments)]
    fn full_render(
        &mut self,
        lines: Vec<String>,
        width: usize,
        height: usize,
        clear: bool,
        reason: &'static str,
        cursor: &mut CursorManager,
        out: &mut OutputBuffer,
    ) -> Result<Paint, RenderError> {
        let rows = 0..=lines.len().saturating_sub(1);
        let lines = check_widths(lines, rows, width)?;

        self.state.full_redraw_count += 1;
        tracing::debug!(
            target: "render.diff",
            reason,
            clear,
            lines = lines.len(),
            previous = self.state.previous_lines.len(),
            count = self.state.full_redraw_count,
            "full_redraw"
        );

        ansi::begin_sync(out)?;
        if clear {
            ansi::clear_all(out)?;
        }
        for (i, line) in lines.iter().enumerate() {
            if i > 0 {
                out.push_str("\r\n");
            }
            out.push_str(line);
        }
        ansi::end_sync(out)?;

        let last_row = lines.len().saturating_sub(1);
        cursor.set_rows(last_row, last_row);

        let state = &mut self.state;
        state.max_lines_rendered = if clear {
            lines.len()
        } else {
            state.max_lines_rendered.max(lines.len())
        };
        state.previous_viewport_top = state.viewport_top(height);
        state.previous_lines = lines;
        state.previous_width = width;
        state.force_clear = false;
        Ok(Paint::Full { clear })
    }

    /// Erase rows past the end of a frame whose remaining rows are
    /// unchanged.
    fn truncate(
        &mut self,
        lines: Vec<String>,
        width: usize,
        height: usize,
        cursor: &mut CursorManager,
        out: &mut OutputBuffer,
    ) -> Result<Paint, RenderError> {
        let prev_len = self.state.previous_lines.len();
        let removed = prev_len - lines.len();
        if removed > height {
            return self.full_render(lines, width, height, true, "shrink beyond one screen", cursor, out);
        }

        // The new last row must be on screen to anchor the erase.
        let viewport_top = self.state.viewport_top(height);
        let target = lines.len().saturating_sub(1);
        if target < viewport_top {
            return self.full_render(lines, width, height, true, "shrink above viewport", cursor, out);
        }

        ansi::begin_sync(out)?;
        ansi::move_by(
            out,
            screen_delta(target, viewport_top, cursor.hardware_row(), self.state.previous_viewport_top),
        )?;
        out.push_str("\r");
        let mut at = target;
        for row in lines.len()..prev_len {
            ansi::cursor_down(out, row.saturating_sub(at))?;
            out.push_str("\r");
            ansi::clear_line(out)?;
            at = row;
        }
        ansi::cursor_up(out, at - target)?;
        ansi::end_sync(out)?;

        tracing::debug!(target: "render.diff", removed, "rows_truncated");
        cursor.set_rows(target, target);
        let state = &mut self.state;
        state.previous_viewport_top = state.viewport_top(height);
        state.previous_lines = lines;
        state.previous_width = width;
        Ok(Paint::Truncate { removed })
    }

    /// Rewrite rows `first..=render_end`, then erase rows the frame lost.
    #[allow(clippy::too_many_arguments)]
    fn patch(
        &mut self,
        lines: Vec<String>,
        first: usize,
        render_end: usize,
        width: usize,
        height: usize,
        cursor: &mut CursorManager,
        out: &mut OutputBuffer,
    ) -> Result<Paint, RenderError> {
        let prev_len = self.state.previous_lines.len();
        let append_start = lines.len() > prev_len && first == prev_len && first > 0;
        let mut viewport_top = self.state.viewport_top(height);
        let mut prev_viewport_top = self.state.previous_viewport_top;
        let mut hardware_row = cursor.hardware_row();

        ansi::begin_sync(out)?;

        // Appending lands one row above `first` and newlines down into it.
        let move_target = if append_start { first - 1 } else { first };
        let prev_viewport_bottom = prev_viewport_top + height - 1;
        if move_target > prev_viewport_bottom {
            let screen_row = hardware_row.saturating_sub(prev_viewport_top).min(height - 1);
            ansi::cursor_down(out, height - 1 - screen_row)?;
            let scroll = move_target - prev_viewport_bottom;
            for _ in 0..scroll {
                out.push_str("\r\n");
            }
            prev_viewport_top += scroll;
            viewport_top += scroll;
            hardware_row = move_target;
            tracing::trace!(target: "render.diff", scroll, "viewport_scrolled");
        }

        ansi::move_by(out, screen_delta(move_target, viewport_top, hardware_row, prev_viewport_top))?;
        out.push_str(if append_start { "\r\n" } else { "\r" });

        for (i, line) in lines.iter().enumerate().take(render_end + 1).skip(first) {
            if i > first {
                out.push_str("\r\n");
            }
            ansi::clear_line(out)?;
            out.push_str(line);
        }

        let mut final_row = render_end;
        if prev_len > lines.len() {
            let last_row = lines.len() - 1;
            if render_end < last_row {
                ansi::cursor_down(out, last_row - render_end)?;
                final_row = last_row;
            }
            let extra = prev_len - lines.len();
            for _ in 0..extra {
                out.push_str("\r\n");
                ansi::clear_line(out)?;
            }
            ansi::cursor_up(out, extra)?;
        }
        ansi::end_sync(out)?;

        tracing::debug!(
            target: "render.diff",
            first,
            last = render_end,
            final_row,
            appended = append_start,
            "patched"
        );

        cursor.set_rows(lines.len().saturating_sub(1), final_row);
        let state = &mut self.state;
        state.max_lines_rendered = state.max_lines_rendered.max(lines.len());
        state.previous_viewport_top = state.viewport_top(height);
        state.previous_lines = lines;
        state.previous_width = width;
        Ok(Paint::Patch {
            first,
            last: render_end,
        })
    }
}

/// Rows to move from the hardware row to `target`, both mapped to screen
/// rows through their viewports.
#[allow(clippy::cast_possible_wrap)] // Screen rows are far below isize::MAX.
const fn screen_delta(target: usize, viewport_top: usize, hardware_row: usize, prev_viewport_top: usize) -> isize {
    target.saturating_sub(viewport_top) as isize - hardware_row.saturating_sub(prev_viewport_top) as isize
}

/// Pass `lines` through if every row in `rows` fits `width`.
fn check_widths(
    lines: Vec<String>,
    rows: std::ops::RangeInclusive<usize>,
    width: usize,
) -> Result<Vec<String>, LineOverflow> {
    let overflow = rows
        .map_while(|row| lines.get(row).map(|line| (row, line)))
        .filter(|(_, line)| !is_image_line(line))
        .map(|(row, line)| (row, visible_width(line)))
        .find(|&(_, line_width)| line_width > width);

    match overflow {
        None => Ok(lines),
        Some((row, line_width)) => {
            tracing::error!(target: "render.diff", row, line_width, width, "line_overflow");
            Err(LineOverflow {
                line: row,
                width: line_width,
                terminal_width: width,
                frame: lines,
            })
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
