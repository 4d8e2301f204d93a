// SPDX-License-Identifier: MIT
//
// End-to-end frames through an in-memory terminal.

use std::cell::RefCell;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::rc::Rc;
use std::time::Duration;

use panda_tui::term::MemoryTerminal;
use panda_tui::term::ansi::{CLEAR_ALL, CURSOR_MARKER, SEGMENT_RESET, SYNC_END, SYNC_START};
use panda_tui::{Component, ComponentRef, Tui, TuiConfig};
use pretty_assertions::assert_eq;

const HIDE: &str = "\x1b[?25l";
const SHOW: &str = "\x1b[?25h";

/// Renders whatever lines it holds; records input.
#[derive(Default)]
struct Lines {
    lines: Vec<String>,
    inputs: Vec<String>,
    key_release: bool,
}

impl Lines {
    fn shared(lines: &[&str]) -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(Self {
            lines: lines.iter().map(|l| (*l).to_owned()).collect(),
            ..Self::default()
        }))
    }
}

impl Component for Lines {
    fn render(&mut self, _width: usize) -> Vec<String> {
        self.lines.clone()
    }

    fn handle_input(&mut self, data: &str) {
        self.inputs.push(data.to_owned());
    }

    fn wants_key_release(&self) -> bool {
        self.key_release
    }
}

fn tui_with(config: TuiConfig, lines: &[&str]) -> (Tui<MemoryTerminal>, Rc<RefCell<Lines>>) {
    let widget = Lines::shared(lines);
    let mut tui = Tui::with_config(MemoryTerminal::new(20, 5), config);
    tui.add_child(widget.clone());
    tui.set_focus(Some(widget.clone() as ComponentRef));
    tui.start().unwrap();
    (tui, widget)
}

/// Started, first frame painted, output drained.
fn painted(lines: &[&str]) -> (Tui<MemoryTerminal>, Rc<RefCell<Lines>>) {
    let (mut tui, widget) = tui_with(TuiConfig::default(), lines);
    assert!(tui.run_once(Duration::ZERO));
    tui.terminal_mut().take_output();
    (tui, widget)
}

fn frame(body: &str) -> String {
    format!("{SYNC_START}{body}{SYNC_END}")
}

// ── Frames ──────────────────────────────────────────────────────────────────

#[test]
fn first_frame_prints_every_line() {
    let (mut tui, _widget) = tui_with(TuiConfig::default(), &["hello", "world"]);
    assert_eq!(tui.terminal_mut().take_output(), HIDE);

    assert!(tui.run_once(Duration::ZERO));
    let expected = frame(&format!("hello{SEGMENT_RESET}\r\nworld{SEGMENT_RESET}")) + HIDE;
    assert_eq!(tui.terminal_mut().take_output(), expected);
    assert_eq!(tui.full_redraws(), 1);
}

#[test]
fn changed_line_is_patched_in_place() {
    let (mut tui, widget) = painted(&["hello", "world"]);

    widget.borrow_mut().lines[1] = "there".to_owned();
    tui.request_render(false);
    assert!(tui.run_once(Duration::ZERO));

    let expected = frame(&format!("\r\x1b[2Kthere{SEGMENT_RESET}")) + HIDE;
    assert_eq!(tui.terminal_mut().take_output(), expected);
    assert_eq!(tui.full_redraws(), 1);
}

#[test]
fn unchanged_frame_only_touches_cursor() {
    let (mut tui, _widget) = painted(&["same"]);
    tui.request_render(false);
    assert!(tui.run_once(Duration::ZERO));
    assert_eq!(tui.terminal_mut().take_output(), HIDE);
}

#[test]
fn no_request_no_frame() {
    let (mut tui, _widget) = painted(&["idle"]);
    assert!(!tui.run_once(Duration::ZERO));
    assert_eq!(tui.terminal_mut().take_output(), "");
}

#[test]
fn requests_coalesce_into_one_frame() {
    let (mut tui, _widget) = painted(&["a"]);
    tui.request_render(false);
    tui.request_render(false);
    tui.request_render(false);
    assert!(tui.run_once(Duration::ZERO));
    assert!(!tui.run_once(Duration::ZERO));
}

#[test]
fn forced_render_clears_everything() {
    let (mut tui, _widget) = painted(&["a", "b"]);
    tui.request_render(true);
    tui.run_once(Duration::ZERO);
    let out = tui.terminal_mut().take_output();
    assert!(out.starts_with(&format!("{SYNC_START}{CLEAR_ALL}a")));
    assert_eq!(tui.full_redraws(), 2);
}

#[test]
fn resize_redraws_from_scratch() {
    let (mut tui, _widget) = painted(&["a", "b"]);
    tui.terminal_mut().resize(30, 5);
    assert!(tui.run_once(Duration::ZERO));
    assert!(tui.terminal_mut().take_output().contains(CLEAR_ALL));
    assert_eq!(tui.full_redraws(), 2);
}

#[test]
fn render_handle_works_across_threads() {
    let (mut tui, _widget) = painted(&["a"]);
    let handle = tui.render_handle();
    std::thread::spawn(move || handle.request_render(false))
        .join()
        .unwrap();
    assert!(tui.run_once(Duration::ZERO));
}

// ── Cursor ──────────────────────────────────────────────────────────────────

#[test]
fn cursor_marker_places_hardware_cursor() {
    let config = TuiConfig {
        show_hardware_cursor: true,
        ..TuiConfig::default()
    };
    let marked = format!("ab{CURSOR_MARKER}c");
    let (mut tui, _widget) = tui_with(config, &["first", marked.as_str()]);
    tui.terminal_mut().take_output();
    tui.run_once(Duration::ZERO);

    let out = tui.terminal_mut().take_output();
    assert!(!out.contains(CURSOR_MARKER));
    assert!(out.contains(&format!("abc{SEGMENT_RESET}")));
    assert!(out.ends_with(&format!("{SYNC_END}\x1b[3G{SHOW}")));
}

#[test]
fn hidden_cursor_still_moves_for_ime() {
    let marked = format!("{CURSOR_MARKER}x");
    let (mut tui, _widget) = tui_with(TuiConfig::default(), &[marked.as_str(), "below"]);
    tui.terminal_mut().take_output();
    tui.run_once(Duration::ZERO);
    assert!(tui.terminal_mut().take_output().ends_with(&format!("\x1b[1A\x1b[1G{HIDE}")));
}

// ── Input ───────────────────────────────────────────────────────────────────

#[test]
fn input_reaches_focused_component_and_renders() {
    let (mut tui, widget) = painted(&["a"]);
    tui.terminal_mut().send_input("x");
    tui.terminal_mut().send_input("\x1b[A");
    assert!(tui.run_once(Duration::ZERO));
    assert_eq!(widget.borrow().inputs, vec!["x".to_owned(), "\x1b[A".to_owned()]);
}

#[test]
fn input_without_focus_is_dropped() {
    let (mut tui, widget) = painted(&["a"]);
    tui.set_focus(None);
    tui.terminal_mut().send_input("x");
    assert!(!tui.run_once(Duration::ZERO));
    assert!(widget.borrow().inputs.is_empty());
}

#[test]
fn key_releases_need_opt_in() {
    let (mut tui, widget) = painted(&["a"]);
    tui.terminal_mut().send_input("\x1b[97;1:3u");
    tui.run_once(Duration::ZERO);
    assert!(widget.borrow().inputs.is_empty());

    widget.borrow_mut().key_release = true;
    tui.terminal_mut().send_input("\x1b[97;1:3u");
    tui.run_once(Duration::ZERO);
    assert_eq!(widget.borrow().inputs, vec!["\x1b[97;1:3u".to_owned()]);
}

#[test]
fn pasted_release_lookalike_is_kept() {
    let (mut tui, widget) = painted(&["a"]);
    let paste = "\x1b[200~a:3u\x1b[201~";
    tui.terminal_mut().send_input(paste);
    tui.run_once(Duration::ZERO);
    assert_eq!(widget.borrow().inputs, vec![paste.to_owned()]);
}

// ── Lifecycle ───────────────────────────────────────────────────────────────

#[test]
fn stop_leaves_cursor_below_frame() {
    let (mut tui, _widget) = painted(&["a", "b", "c"]);
    tui.stop().unwrap();
    assert_eq!(tui.terminal_mut().take_output(), format!("\r\n{SHOW}"));
    assert!(!tui.terminal().is_started());
    assert!(!tui.is_started());
}

#[test]
fn stop_is_idempotent() {
    let (mut tui, _widget) = painted(&["a"]);
    tui.stop().unwrap();
    tui.terminal_mut().take_output();
    tui.stop().unwrap();
    assert_eq!(tui.terminal_mut().take_output(), "");
}

#[test]
fn stop_handle_requests_exit() {
    let (mut tui, _widget) = painted(&["a"]);
    let handle = tui.stop_handle();
    handle.stop();
    assert!(handle.is_stopped());
    assert!(!tui.run_once(Duration::ZERO));
    assert_eq!(tui.terminal_mut().take_output(), "");
}

// ── Width overflow ──────────────────────────────────────────────────────────

#[test]
fn overflowing_line_writes_crash_log_and_panics() {
    let dir = tempfile::tempdir().unwrap();
    let crash_log = dir.path().join("logs").join("crash.log");
    let config = TuiConfig {
        crash_log_path: Some(crash_log.clone()),
        ..TuiConfig::default()
    };
    let wide = "x".repeat(30);
    let (mut tui, _widget) = tui_with(config, &["fine", wide.as_str()]);

    let result = catch_unwind(AssertUnwindSafe(|| tui.run_once(Duration::ZERO)));
    let panic = result.unwrap_err();
    let message = panic
        .downcast_ref::<String>()
        .cloned()
        .unwrap_or_default();
    assert!(message.contains("line 1 is 30 columns wide"));
    assert!(message.contains("crash.log"));

    let log = std::fs::read_to_string(&crash_log).unwrap();
    assert!(log.contains("Terminal width: 20"));
    assert!(log.contains("Line 1 visible width: 30"));
    assert!(log.contains("[0] (w=4) fine"));

    assert!(!tui.is_started());
    assert!(!tui.terminal().is_started());
}
