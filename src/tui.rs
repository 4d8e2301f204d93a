// SPDX-License-Identifier: MIT
//
// The runtime.
//
// `Tui` owns the terminal, the root container, the overlay stack and the
// render state, and runs one loop:
//
//   wait for an event (or one tick)
//     → dispatch every queued input to the focused component
//     → if a render was requested, paint one frame
//
// Input and resize notifications arrive through callbacks the terminal may
// call from its own threads, so they only enqueue `Event`s. Everything that
// touches components happens on the loop's thread.
//
// A frame goes through a fixed pipeline: render the root, composite
// overlays, extract the cursor marker, append per-line resets, diff against
// the previous frame, place the hardware cursor, write once. A line wider
// than the terminal is fatal: the frame is dumped to the crash log, the
// terminal is restored, and the process panics with the log path.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::time::Duration;

use panda_term::ansi;
use panda_term::input::{find_cell_size_response, is_partial_cell_size};
use panda_term::output::OutputBuffer;
use panda_term::{InputHandler, ResizeHandler, Terminal, is_key_release};

use crate::component::{Component, ComponentRef, Container, same_component};
use crate::config::TuiConfig;
use crate::crash::{CrashReport, default_crash_log_path};
use crate::cursor::{CursorManager, extract_cursor_position};
use crate::error::TuiError;
use crate::layout::OverlayOptions;
use crate::overlay::{OverlayHandle, OverlayManager};
use crate::render::{DiffRenderer, FrameParams, LineOverflow, RenderError, apply_line_resets};
use crate::scheduler::{RenderHandle, RenderScheduler};

/// What the terminal's callbacks hand to the loop.
enum Event {
    Input(String),
    Resize,
}

/// Pixel size of one character cell, as reported by the terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellSize {
    pub width_px: u32,
    pub height_px: u32,
}

/// Ends [`Tui::run`] from anywhere, another thread included.
#[derive(Clone)]
pub struct StopHandle {
    flag: Arc<AtomicBool>,
    render: RenderHandle,
}

impl StopHandle {
    /// Ask the loop to exit after its current iteration.
    pub fn stop(&self) {
        self.flag.store(true, Ordering::Release);
        self.render.request_render(false);
    }

    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

// ─── Tui ────────────────────────────────────────────────────────────────────

pub struct Tui<T: Terminal> {
    terminal: T,
    config: TuiConfig,
    root: Container,
    overlays: Rc<RefCell<OverlayManager>>,
    cursor: CursorManager,
    renderer: DiffRenderer,
    scheduler: RenderScheduler,
    events_tx: Sender<Event>,
    events_rx: Receiver<Event>,
    stop_flag: Arc<AtomicBool>,
    started: bool,
    /// A cell-size query is waiting for its answer.
    cell_size_pending: bool,
    /// Input held back while the answer may still be arriving.
    cell_size_buffer: String,
    cell_size: Option<CellSize>,
    out: OutputBuffer,
}

impl<T: Terminal> Tui<T> {
    /// A stopped runtime with the default configuration.
    pub fn new(terminal: T) -> Self {
        Self::with_config(terminal, TuiConfig::default())
    }

    pub fn with_config(terminal: T, config: TuiConfig) -> Self {
        let (events_tx, events_rx) = mpsc::channel();
        Self {
            terminal,
            cursor: CursorManager::new(config.show_hardware_cursor),
            config,
            root: Container::new(),
            overlays: Rc::new(RefCell::new(OverlayManager::new())),
            renderer: DiffRenderer::new(),
            scheduler: RenderScheduler::new(),
            events_tx,
            events_rx,
            stop_flag: Arc::new(AtomicBool::new(false)),
            started: false,
            cell_size_pending: false,
            cell_size_buffer: String::new(),
            cell_size: None,
            out: OutputBuffer::new(),
        }
    }

    // ── Lifecycle ───────────────────────────────────────────────────────

    /// Start the terminal and queue the first frame.
    ///
    /// # Errors
    ///
    /// Returns [`TuiError::Terminal`] if the terminal cannot start.
    pub fn start(&mut self) -> Result<(), TuiError> {
        if self.started {
            return Ok(());
        }
        let tx = self.events_tx.clone();
        let on_input: InputHandler = Box::new(move |data| {
            let _ = tx.send(Event::Input(data));
        });
        let tx = self.events_tx.clone();
        let on_resize: ResizeHandler = Box::new(move || {
            let _ = tx.send(Event::Resize);
        });
        self.terminal.start(on_input, on_resize)?;

        self.started = true;
        self.stop_flag.store(false, Ordering::Release);
        if let Err(err) = self.terminal.hide_cursor() {
            tracing::warn!(target: "terminal", %err, "hide_cursor_failed");
        }
        tracing::info!(target: "render.pipeline", size = ?self.terminal.size(), "tui_started");
        self.request_render(false);
        Ok(())
    }

    /// Leave the cursor on a fresh row below the last frame, show it, and
    /// stop the terminal. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns [`TuiError::Terminal`] if the terminal cannot be restored.
    pub fn stop(&mut self) -> Result<(), TuiError> {
        if !self.started {
            return Ok(());
        }
        self.started = false;
        self.stop_flag.store(true, Ordering::Release);

        let mut out = OutputBuffer::new();
        let rendered = self.renderer.state().previous_lines().len();
        if rendered > 0 {
            #[allow(clippy::cast_possible_wrap)] // Frame rows never approach isize::MAX.
            let delta = (rendered - 1) as isize - self.cursor.hardware_row() as isize;
            ansi::move_by(&mut out, delta)?;
            out.push_str("\r\n");
        }
        ansi::cursor_show(&mut out)?;
        if let Err(err) = self.terminal.write(out.as_bytes()) {
            tracing::warn!(target: "terminal", %err, "terminal_write_failed");
        }

        self.terminal.stop()?;
        tracing::info!(target: "render.pipeline", full_redraws = self.full_redraws(), "tui_stopped");
        Ok(())
    }

    /// Start, loop until a [`StopHandle`] fires, stop.
    ///
    /// # Errors
    ///
    /// Returns [`TuiError::Terminal`] if the terminal fails to start or stop.
    pub fn run(&mut self) -> Result<(), TuiError> {
        self.start()?;
        while !self.stop_flag.load(Ordering::Acquire) {
            self.run_once(self.config.tick_interval);
        }
        self.stop()
    }

    /// One loop iteration: wait up to `timeout` for an event, dispatch every
    /// queued event, paint if a render is due. Returns whether it painted.
    /// Once a [`StopHandle`] has fired it returns without painting.
    pub fn run_once(&mut self, timeout: Duration) -> bool {
        if let Ok(event) = self.events_rx.recv_timeout(timeout) {
            self.handle_event(event);
        }
        while let Ok(event) = self.events_rx.try_recv() {
            self.handle_event(event);
        }
        if self.stop_flag.load(Ordering::Acquire) {
            tracing::trace!(target: "scheduler", "stop_requested");
            return false;
        }
        let Some(force) = self.scheduler.take() else {
            return false;
        };
        self.do_render(force);
        true
    }

    #[must_use]
    pub const fn is_started(&self) -> bool {
        self.started
    }

    #[must_use]
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            flag: Arc::clone(&self.stop_flag),
            render: self.scheduler.handle(),
        }
    }

    // ── Components ──────────────────────────────────────────────────────

    pub fn add_child(&mut self, child: ComponentRef) {
        self.root.add_child(child);
    }

    pub fn remove_child(&mut self, child: &ComponentRef) -> bool {
        self.root.remove_child(child)
    }

    pub fn insert_child_at(&mut self, index: usize, child: ComponentRef) {
        self.root.insert_child_at(index, child);
    }

    #[must_use]
    pub fn children(&self) -> &[ComponentRef] {
        self.root.children()
    }

    /// Drop every child's cached output.
    pub fn invalidate(&mut self) {
        self.root.invalidate();
    }

    /// Give `component` focus, or clear focus with `None`.
    pub fn set_focus(&mut self, component: Option<ComponentRef>) {
        self.overlays.borrow_mut().focus_mut().set_focus(component);
    }

    #[must_use]
    pub fn focused(&self) -> Option<ComponentRef> {
        self.overlays.borrow().focus().focused()
    }

    // ── Rendering ───────────────────────────────────────────────────────

    /// See [`RenderHandle::request_render`].
    pub fn request_render(&self, force: bool) {
        self.scheduler.handle().request_render(force);
    }

    /// A handle widgets can keep to request frames.
    #[must_use]
    pub fn render_handle(&self) -> RenderHandle {
        self.scheduler.handle()
    }

    pub fn set_show_hardware_cursor(&mut self, show: bool) {
        if self.cursor.show_hardware_cursor() != show {
            self.cursor.set_show_hardware_cursor(show);
            self.request_render(false);
        }
    }

    /// Full redraws painted so far.
    #[must_use]
    pub const fn full_redraws(&self) -> usize {
        self.renderer.state().full_redraw_count()
    }

    // ── Overlays ────────────────────────────────────────────────────────

    /// Show `component` over the frame. It takes focus if it lands on top.
    pub fn show_overlay(&mut self, component: ComponentRef, options: OverlayOptions) -> OverlayHandle {
        let id = self.overlays.borrow_mut().show(component, options);
        self.request_render(false);
        OverlayHandle::new(id, &self.overlays, self.scheduler.handle())
    }

    /// Remove the topmost overlay. `false` when there was none.
    pub fn hide_overlay(&mut self) -> bool {
        let removed = self.overlays.borrow_mut().hide_topmost();
        if removed {
            self.request_render(false);
        }
        removed
    }

    /// Whether any overlay is visible at the current size.
    #[must_use]
    pub fn has_overlay(&self) -> bool {
        self.overlays.borrow().has_visible()
    }

    // ── Terminal ────────────────────────────────────────────────────────

    /// Ask the terminal for its cell size in pixels. Only sent when the
    /// Kitty keyboard protocol is active; the answer is filtered out of the
    /// input stream and invalidates the root.
    pub fn query_cell_size(&mut self) {
        if !self.terminal.is_kitty_protocol_active() {
            return;
        }
        let mut out = OutputBuffer::new();
        if ansi::query_cell_size(&mut out).is_ok() {
            self.cell_size_pending = true;
            self.write_terminal(out.as_bytes());
        }
    }

    /// The last reported cell size.
    #[must_use]
    pub const fn cell_size(&self) -> Option<CellSize> {
        self.cell_size
    }

    #[must_use]
    pub const fn config(&self) -> &TuiConfig {
        &self.config
    }

    #[must_use]
    pub const fn terminal(&self) -> &T {
        &self.terminal
    }

    pub const fn terminal_mut(&mut self) -> &mut T {
        &mut self.terminal
    }

    // ── Input ───────────────────────────────────────────────────────────

    fn handle_event(&mut self, event: Event) {
        match event {
            Event::Input(data) => self.handle_input(data),
            Event::Resize => {
                tracing::debug!(target: "terminal", size = ?self.terminal.size(), "resized");
                self.request_render(false);
            }
        }
    }

    fn handle_input(&mut self, data: String) {
        let data = if self.cell_size_pending {
            match self.filter_cell_size(data) {
                Some(rest) => rest,
                None => return,
            }
        } else {
            data
        };

        let Some(target) = self.input_target() else {
            tracing::trace!(target: "input.keys", "input_dropped_unfocused");
            return;
        };
        if is_key_release(&data) && !target.try_borrow().is_ok_and(|c| c.wants_key_release()) {
            tracing::trace!(target: "input.keys", "key_release_filtered");
            return;
        }

        match target.try_borrow_mut() {
            Ok(mut component) => component.handle_input(&data),
            Err(_) => {
                tracing::warn!(target: "input.keys", "input_target_busy");
                return;
            }
        }
        // Focus may have moved while the target was borrowed.
        self.overlays.borrow_mut().focus_mut().flush_pending();
        self.request_render(false);
    }

    /// The focused component, moved to the topmost visible overlay if the
    /// focused one is an overlay that is no longer on top.
    fn input_target(&self) -> Option<ComponentRef> {
        let mut overlays = self.overlays.borrow_mut();
        let focused = overlays.focus().focused()?;
        if !overlays.contains(&focused) {
            return Some(focused);
        }
        match overlays.topmost_visible() {
            Some(top) if !same_component(&top, &focused) => {
                tracing::debug!(target: "input.keys", "focus_moved_to_topmost_overlay");
                overlays.focus_mut().set_focus(Some(top.clone()));
                Some(top)
            }
            _ => Some(focused),
        }
    }

    /// Pull a cell-size report out of the input stream. Returns what is left
    /// to dispatch, or `None` while the report may still be incomplete.
    fn filter_cell_size(&mut self, data: String) -> Option<String> {
        self.cell_size_buffer.push_str(&data);

        if let Some(found) = find_cell_size_response(&self.cell_size_buffer) {
            let mut rest = std::mem::take(&mut self.cell_size_buffer);
            rest.replace_range(found.start..found.end, "");
            self.cell_size_pending = false;
            self.cell_size = Some(CellSize {
                width_px: found.width_px,
                height_px: found.height_px,
            });
            tracing::debug!(
                target: "input.demux",
                width_px = found.width_px,
                height_px = found.height_px,
                "cell_size_reported"
            );
            self.root.invalidate();
            self.request_render(false);
            return (!rest.is_empty()).then_some(rest);
        }

        if is_partial_cell_size(&self.cell_size_buffer) {
            return None;
        }
        Some(std::mem::take(&mut self.cell_size_buffer))
    }

    // ── Frame pipeline ──────────────────────────────────────────────────

    fn do_render(&mut self, force: bool) {
        if !self.started {
            return;
        }
        if force {
            self.renderer.reset();
            self.cursor.reset();
        }

        let size = self.terminal.size();
        let (width, height) = (size.width(), size.height());
        let mut lines = self.root.render(width);

        self.overlays.borrow_mut().set_size(width, height);
        let overlays_visible = self.overlays.borrow().has_visible();
        if overlays_visible {
            let max_lines = self.renderer.state().max_lines_rendered();
            lines = self.overlays.borrow().composite(lines, width, height, max_lines);
        }

        let cursor_pos = extract_cursor_position(&mut lines, height);
        apply_line_resets(&mut lines);

        let params = FrameParams {
            width,
            height,
            clear_on_shrink: self.config.clear_on_shrink,
            overlays_visible,
        };
        self.out.clear();
        let paint = match self.renderer.render(lines, params, &mut self.cursor, &mut self.out) {
            Ok(paint) => paint,
            Err(RenderError::Overflow(overflow)) => self.fail_overflow(overflow),
            Err(RenderError::Io(err)) => {
                tracing::warn!(target: "render.pipeline", %err, "frame_encode_failed");
                return;
            }
        };

        let total = self.renderer.state().previous_lines().len();
        if let Err(err) = self.cursor.position(cursor_pos, total, &mut self.out) {
            tracing::warn!(target: "render.pipeline", %err, "cursor_position_failed");
        }

        tracing::trace!(target: "render.pipeline", ?paint, bytes = self.out.len(), "frame");
        let out = std::mem::take(&mut self.out);
        self.write_terminal(out.as_bytes());
        self.out = out;
    }

    /// Dump the frame, restore the terminal, and abort.
    fn fail_overflow(&mut self, overflow: LineOverflow) -> ! {
        let crash_log = self
            .config
            .crash_log_path
            .clone()
            .unwrap_or_else(default_crash_log_path);
        let report = CrashReport {
            line: overflow.line,
            width: overflow.width,
            terminal_width: overflow.terminal_width,
            lines: &overflow.frame,
        };
        if let Err(source) = report.write_to(&crash_log) {
            let err = TuiError::CrashLog(source);
            tracing::error!(target: "render.pipeline", %err, "crash_log_failed");
        }

        let err = TuiError::WidthOverflow {
            line: overflow.line,
            width: overflow.width,
            terminal_width: overflow.terminal_width,
            crash_log,
        };
        tracing::error!(target: "render.pipeline", %err, "width_overflow");
        if let Err(stop_err) = self.stop() {
            tracing::error!(target: "terminal", err = %stop_err, "stop_failed");
        }
        panic!("{err}");
    }

    /// Terminal write failures are logged and otherwise ignored.
    fn write_terminal(&mut self, bytes: &[u8]) {
        if bytes.is_empty() {
            return;
        }
        if let Err(err) = self.terminal.write(bytes) {
            tracing::warn!(target: "render.pipeline", %err, "terminal_write_failed");
        }
    }
}

impl<T: Terminal> Drop for Tui<T> {
    fn drop(&mut self) {
        if let Err(err) = self.stop() {
            tracing::warn!(target: "terminal", %err, "stop_on_drop_failed");
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use panda_term::MemoryTerminal;
    use pretty_assertions::assert_eq;

    #[derive(Default)]
    struct Recorder {
        inputs: Vec<String>,
        invalidations: usize,
    }

    impl Component for Recorder {
        fn render(&mut self, _width: usize) -> Vec<String> {
            vec!["rec".to_owned()]
        }

        fn handle_input(&mut self, data: &str) {
            self.inputs.push(data.to_owned());
        }

        fn invalidate(&mut self) {
            self.invalidations += 1;
        }
    }

    fn started() -> (Tui<MemoryTerminal>, Rc<RefCell<Recorder>>) {
        let rec = Rc::new(RefCell::new(Recorder::default()));
        let mut tui = Tui::new(MemoryTerminal::new(20, 5));
        tui.add_child(rec.clone());
        tui.set_focus(Some(rec.clone() as ComponentRef));
        tui.start().unwrap();
        tui.run_once(Duration::ZERO);
        tui.terminal_mut().take_output();
        (tui, rec)
    }

    // ── Cell size ───────────────────────────────────────────────────────

    #[test]
    fn cell_size_query_needs_kitty() {
        let (mut tui, _rec) = started();
        tui.query_cell_size();
        assert_eq!(tui.terminal_mut().take_output(), "");

        tui.terminal_mut().set_kitty_protocol_active(true);
        tui.query_cell_size();
        assert_eq!(tui.terminal_mut().take_output(), "\x1b[16t");
        assert!(tui.cell_size_pending);
    }

    #[test]
    fn cell_size_report_is_swallowed() {
        let (mut tui, rec) = started();
        tui.cell_size_pending = true;

        tui.terminal_mut().send_input("\x1b[6;18;9t");
        tui.run_once(Duration::ZERO);

        assert_eq!(
            tui.cell_size(),
            Some(CellSize {
                width_px: 9,
                height_px: 18
            })
        );
        assert!(!tui.cell_size_pending);
        assert!(rec.borrow().inputs.is_empty());
        assert_eq!(rec.borrow().invalidations, 1);
    }

    #[test]
    fn partial_cell_size_report_waits() {
        let (mut tui, rec) = started();
        tui.cell_size_pending = true;

        assert_eq!(tui.filter_cell_size("\x1b[6;18".to_owned()), None);
        assert_eq!(tui.filter_cell_size(";9t".to_owned()), None);
        assert_eq!(tui.cell_size().map(|c| c.width_px), Some(9));
        assert!(rec.borrow().inputs.is_empty());
    }

    #[test]
    fn unrelated_input_passes_while_waiting() {
        let (mut tui, rec) = started();
        tui.cell_size_pending = true;

        tui.terminal_mut().send_input("x");
        tui.run_once(Duration::ZERO);

        assert_eq!(rec.borrow().inputs, vec!["x".to_owned()]);
        assert!(tui.cell_size_pending);
    }

    // ── Lifecycle ───────────────────────────────────────────────────────

    #[test]
    fn stop_handle_skips_the_next_frame() {
        let (mut tui, _rec) = started();
        let handle = tui.stop_handle();
        assert!(!handle.is_stopped());
        handle.stop();
        assert!(handle.is_stopped());
        assert!(!tui.run_once(Duration::ZERO));
        assert_eq!(tui.terminal_mut().take_output(), "");
    }

    #[test]
    fn stopped_runtime_does_not_paint() {
        let (mut tui, _rec) = started();
        tui.stop().unwrap();
        tui.terminal_mut().take_output();
        tui.request_render(true);
        tui.run_once(Duration::ZERO);
        assert_eq!(tui.terminal_mut().take_output(), "");
    }
}
