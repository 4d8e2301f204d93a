// SPDX-License-Identifier: MIT
//
// Overlays through the full runtime: painting, focus, input routing.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use panda_tui::term::MemoryTerminal;
use panda_tui::{
    Anchor, Component, ComponentRef, Focusable, OverlayHandle, OverlayOptions, SizeValue, Tui, same_component,
};
use pretty_assertions::assert_eq;

#[derive(Default)]
struct Widget {
    lines: Vec<String>,
    inputs: Vec<String>,
    focused: bool,
    /// Hides its own overlay on `q`.
    closer: Option<OverlayHandle>,
}

impl Widget {
    fn shared(lines: &[&str]) -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(Self {
            lines: lines.iter().map(|l| (*l).to_owned()).collect(),
            ..Self::default()
        }))
    }
}

impl Component for Widget {
    fn render(&mut self, _width: usize) -> Vec<String> {
        self.lines.clone()
    }

    fn handle_input(&mut self, data: &str) {
        self.inputs.push(data.to_owned());
        if data == "q" {
            if let Some(closer) = &self.closer {
                closer.hide();
            }
        }
    }

    fn as_focusable_mut(&mut self) -> Option<&mut dyn Focusable> {
        Some(self)
    }
}

impl Focusable for Widget {
    fn set_focused(&mut self, focused: bool) {
        self.focused = focused;
    }

    fn is_focused(&self) -> bool {
        self.focused
    }
}

fn top_left(width: usize) -> OverlayOptions {
    OverlayOptions::new()
        .width(SizeValue::Absolute(width))
        .anchor(Anchor::TopLeft)
}

fn setup() -> (Tui<MemoryTerminal>, Rc<RefCell<Widget>>) {
    let base = Widget::shared(&["aaaaaaaaaa", "bbbbbbbbbb"]);
    let mut tui = Tui::new(MemoryTerminal::new(10, 4));
    tui.add_child(base.clone());
    tui.set_focus(Some(base.clone() as ComponentRef));
    tui.start().unwrap();
    tui.run_once(Duration::ZERO);
    tui.terminal_mut().take_output();
    (tui, base)
}

fn is_focused(tui: &Tui<MemoryTerminal>, widget: &Rc<RefCell<Widget>>) -> bool {
    let widget: ComponentRef = widget.clone();
    tui.focused().is_some_and(|f| same_component(&f, &widget))
}

// ── Painting ────────────────────────────────────────────────────────────────

#[test]
fn overlay_is_painted_over_base() {
    let (mut tui, _base) = setup();
    let popup = Widget::shared(&["XY"]);
    tui.show_overlay(popup, top_left(2));
    assert!(tui.has_overlay());

    assert!(tui.run_once(Duration::ZERO));
    let out = tui.terminal_mut().take_output();
    assert!(out.contains("XY"));
    assert!(out.contains("aaaaaaaa"));
}

#[test]
fn hiding_overlay_restores_base_row() {
    let (mut tui, _base) = setup();
    let handle = tui.show_overlay(Widget::shared(&["XY"]), top_left(2));
    tui.run_once(Duration::ZERO);
    tui.terminal_mut().take_output();

    handle.hide();
    assert!(handle.is_hidden());
    assert!(!tui.has_overlay());
    assert!(tui.run_once(Duration::ZERO));
    let out = tui.terminal_mut().take_output();
    assert!(!out.contains("XY"));
    assert!(out.contains("aaaaaaaaaa"));
}

#[test]
fn suppressed_overlay_is_not_painted() {
    let (mut tui, _base) = setup();
    let handle = tui.show_overlay(Widget::shared(&["XY"]), top_left(2));
    handle.set_hidden(true);
    assert!(!tui.has_overlay());
    tui.run_once(Duration::ZERO);
    assert!(!tui.terminal_mut().take_output().contains("XY"));

    handle.set_hidden(false);
    tui.run_once(Duration::ZERO);
    assert!(tui.terminal_mut().take_output().contains("XY"));
}

#[test]
fn hide_overlay_pops_topmost() {
    let (mut tui, _base) = setup();
    let first = tui.show_overlay(Widget::shared(&["1"]), top_left(1));
    let second = tui.show_overlay(Widget::shared(&["2"]), top_left(1));

    assert!(tui.hide_overlay());
    assert!(second.is_hidden());
    assert!(!first.is_hidden());
    assert!(tui.hide_overlay());
    assert!(!tui.hide_overlay());
}

// ── Focus ───────────────────────────────────────────────────────────────────

#[test]
fn overlay_takes_and_returns_focus() {
    let (mut tui, base) = setup();
    let popup = Widget::shared(&["XY"]);
    let handle = tui.show_overlay(popup.clone(), top_left(2));

    assert!(is_focused(&tui, &popup));
    assert!(popup.borrow().focused);
    assert!(!base.borrow().focused);

    tui.terminal_mut().send_input("k");
    tui.run_once(Duration::ZERO);
    assert_eq!(popup.borrow().inputs, vec!["k".to_owned()]);
    assert!(base.borrow().inputs.is_empty());

    handle.hide();
    assert!(is_focused(&tui, &base));
    assert!(base.borrow().focused);
    tui.terminal_mut().send_input("j");
    tui.run_once(Duration::ZERO);
    assert_eq!(base.borrow().inputs, vec!["j".to_owned()]);
}

#[test]
fn overlay_closing_itself_loses_focus() {
    let (mut tui, base) = setup();
    let popup = Widget::shared(&["XY"]);
    let handle = tui.show_overlay(popup.clone(), top_left(2));
    popup.borrow_mut().closer = Some(handle.clone());

    tui.terminal_mut().send_input("q");
    tui.run_once(Duration::ZERO);

    assert!(handle.is_hidden());
    assert!(is_focused(&tui, &base));
    assert!(base.borrow().focused);
    assert!(!popup.borrow().focused);
}

#[test]
fn input_is_rerouted_to_topmost_overlay() {
    let (mut tui, _base) = setup();
    let lower = Widget::shared(&["L"]);
    let upper = Widget::shared(&["U"]);
    tui.show_overlay(lower.clone(), top_left(1));
    tui.show_overlay(upper.clone(), top_left(1));

    tui.set_focus(Some(lower.clone() as ComponentRef));
    tui.terminal_mut().send_input("x");
    tui.run_once(Duration::ZERO);

    assert!(lower.borrow().inputs.is_empty());
    assert_eq!(upper.borrow().inputs, vec!["x".to_owned()]);
    assert!(is_focused(&tui, &upper));
}

#[test]
fn handle_outlives_runtime() {
    let handle = {
        let (mut tui, _base) = setup();
        tui.show_overlay(Widget::shared(&["XY"]), top_left(2))
    };
    handle.hide();
    handle.set_hidden(false);
    assert!(handle.is_hidden());
}
