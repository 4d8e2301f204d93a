// SPDX-License-Identifier: MIT
//
// Overlays.
//
// An overlay is a component painted over the base frame at a resolved box,
// newest on top. The manager owns the stack and the focus manager, because
// every stack change can move focus: showing an overlay focuses it, hiding
// the focused one hands focus to the next visible overlay down, or back to
// whatever held focus before the overlay appeared.
//
// Compositing works on lines. For each visible overlay, every row it
// covers is rebuilt as
//
//   before │ reset │ overlay text │ reset │ after
//
// where `before` and `after` are column slices of the base line, `after`
// re-opened with the style that was active at its first column. Rows
// carrying inline image data are left alone; cutting an image escape
// apart would corrupt it.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use panda_term::ansi::SEGMENT_RESET;
use panda_term::{extract_segments, is_image_line, slice_by_column, slice_with_width, visible_width};

use crate::component::{ComponentRef, same_component};
use crate::focus::FocusManager;
use crate::layout::{OverlayOptions, resolve_overlay_layout};
use crate::scheduler::RenderHandle;

/// Stable identifier of a shown overlay.
pub type OverlayId = u64;

struct OverlayEntry {
    id: OverlayId,
    component: ComponentRef,
    options: OverlayOptions,
    /// Focus holder when the overlay was shown.
    pre_focus: Option<ComponentRef>,
    hidden: bool,
}

// ─── Manager ────────────────────────────────────────────────────────────────

/// The overlay stack and the focus it steers.
#[derive(Default)]
pub struct OverlayManager {
    entries: Vec<OverlayEntry>,
    next_id: OverlayId,
    focus: FocusManager,
    /// Terminal size used by visibility predicates.
    size: (usize, usize),
}

impl OverlayManager {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn focus(&self) -> &FocusManager {
        &self.focus
    }

    pub const fn focus_mut(&mut self) -> &mut FocusManager {
        &mut self.focus
    }

    /// Record the terminal size visibility predicates are evaluated at.
    pub const fn set_size(&mut self, width: usize, height: usize) {
        self.size = (width, height);
    }

    /// Number of entries, hidden ones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Push an overlay; it takes focus if it ends up topmost-visible.
    pub fn show(&mut self, component: ComponentRef, options: OverlayOptions) -> OverlayId {
        let id = self.next_id;
        self.next_id += 1;
        self.entries.push(OverlayEntry {
            id,
            component: component.clone(),
            options,
            pre_focus: self.focus.focused(),
            hidden: false,
        });
        if self.is_topmost_visible(id) {
            self.focus.set_focus(Some(component));
        }
        tracing::debug!(target: "render.overlay", id, depth = self.entries.len(), "overlay_shown");
        id
    }

    /// Remove an overlay. Unknown ids are ignored.
    pub fn hide(&mut self, id: OverlayId) -> bool {
        let Some(index) = self.index_of(id) else {
            return false;
        };
        self.remove_at(index);
        true
    }

    /// Remove the topmost overlay, hidden or not.
    pub fn hide_topmost(&mut self) -> bool {
        if self.entries.is_empty() {
            return false;
        }
        self.remove_at(self.entries.len() - 1);
        true
    }

    /// Suppress or restore an overlay without removing it.
    pub fn set_hidden(&mut self, id: OverlayId, hidden: bool) {
        let Some(index) = self.index_of(id) else {
            return;
        };
        let entry = &mut self.entries[index];
        if entry.hidden == hidden {
            return;
        }
        entry.hidden = hidden;
        let component = entry.component.clone();
        let pre_focus = entry.pre_focus.clone();

        if hidden {
            if self.focus.is_focused(&component) {
                let next = self.topmost_visible().or(pre_focus);
                self.focus.set_focus(next);
            }
        } else if self.is_topmost_visible(id) {
            self.focus.set_focus(Some(component));
        }
        tracing::debug!(target: "render.overlay", id, hidden, "overlay_visibility");
    }

    /// Whether an overlay is hidden. Removed overlays count as hidden.
    #[must_use]
    pub fn is_hidden(&self, id: OverlayId) -> bool {
        self.index_of(id).is_none_or(|i| self.entries[i].hidden)
    }

    /// Whether anything would be painted at the current size.
    #[must_use]
    pub fn has_visible(&self) -> bool {
        self.entries.iter().any(|e| self.entry_visible(e))
    }

    /// The component of the topmost visible overlay.
    #[must_use]
    pub fn topmost_visible(&self) -> Option<ComponentRef> {
        self.entries
            .iter()
            .rev()
            .find(|e| self.entry_visible(e))
            .map(|e| e.component.clone())
    }

    fn entry_visible(&self, entry: &OverlayEntry) -> bool {
        !entry.hidden && entry.options.is_visible_at(self.size.0, self.size.1)
    }

    fn is_topmost_visible(&self, id: OverlayId) -> bool {
        self.entries
            .iter()
            .rev()
            .find(|e| self.entry_visible(e))
            .is_some_and(|e| e.id == id)
    }

    fn index_of(&self, id: OverlayId) -> Option<usize> {
        self.entries.iter().position(|e| e.id == id)
    }

    fn remove_at(&mut self, index: usize) {
        let entry = self.entries.remove(index);
        if self.focus.is_focused(&entry.component) {
            let next = self.topmost_visible().or(entry.pre_focus);
            self.focus.set_focus(next);
        }
        tracing::debug!(target: "render.overlay", id = entry.id, depth = self.entries.len(), "overlay_hidden");
    }

    /// Whether `component` is shown as an overlay (visible or not).
    #[must_use]
    pub fn contains(&self, component: &ComponentRef) -> bool {
        self.entries.iter().any(|e| same_component(&e.component, component))
    }

    // ── Compositing ─────────────────────────────────────────────────────

    /// Paint every visible overlay over `base`.
    ///
    /// The frame is padded with empty lines to at least `max_lines_rendered`
    /// and to the bottom of the lowest overlay, so overlay rows always land
    /// on screen rows.
    #[must_use]
    pub fn composite(
        &self,
        base: Vec<String>,
        width: usize,
        height: usize,
        max_lines_rendered: usize,
    ) -> Vec<String> {
        if !self.has_visible() {
            return base;
        }

        struct Placed {
            lines: Vec<String>,
            row: usize,
            col: usize,
            width: usize,
        }

        let mut placed = Vec::new();
        for entry in self.entries.iter().filter(|e| self.entry_visible(e)) {
            let sizing = resolve_overlay_layout(&entry.options, 0, width, height);
            let Ok(mut component) = entry.component.try_borrow_mut() else {
                tracing::warn!(target: "render.overlay", id = entry.id, "overlay_busy_skipped");
                continue;
            };
            let mut lines = component.render(sizing.width);
            drop(component);
            if let Some(max) = sizing.max_height {
                lines.truncate(max);
            }
            let layout = resolve_overlay_layout(&entry.options, lines.len(), width, height);
            placed.push(Placed {
                lines,
                row: layout.row,
                col: layout.col,
                width: layout.width,
            });
        }

        let lowest = placed.iter().map(|p| p.row + p.lines.len()).max().unwrap_or(0);
        let mut result = base;
        let working_height = result.len().max(max_lines_rendered).max(lowest);
        result.resize(working_height, String::new());
        let viewport_start = working_height.saturating_sub(height);

        for p in &placed {
            for (i, line) in p.lines.iter().enumerate() {
                let idx = viewport_start + p.row + i;
                if let Some(base_line) = result.get_mut(idx) {
                    *base_line = composite_line_at(base_line, line, p.col, p.width, width);
                }
            }
        }

        tracing::trace!(
            target: "render.overlay",
            overlays = placed.len(),
            working_height,
            viewport_start,
            "overlays_composited"
        );
        result
    }
}

/// Paint `overlay` over `base` at `col`, `overlay_width` columns wide, on a
/// `total_width`-column row.
///
/// Image rows are returned unchanged. The result is exactly `total_width`
/// columns unless the base was already narrower and the overlay ends
/// inside it.
#[must_use]
pub fn composite_line_at(
    base: &str,
    overlay: &str,
    col: usize,
    overlay_width: usize,
    total_width: usize,
) -> String {
    if is_image_line(base) {
        return base.to_owned();
    }

    let after_start = col + overlay_width;
    let seg = extract_segments(
        base,
        col,
        after_start,
        total_width.saturating_sub(after_start),
        true,
    );
    let (text, text_width) = slice_with_width(overlay, 0, overlay_width, true);

    let before_pad = col.saturating_sub(seg.before_width);
    let overlay_pad = overlay_width.saturating_sub(text_width);
    let actual_before = col.max(seg.before_width);
    let actual_overlay = overlay_width.max(text_width);
    let after_target = total_width.saturating_sub(actual_before + actual_overlay);
    let after_pad = after_target.saturating_sub(seg.after_width);

    let mut out = String::with_capacity(base.len() + overlay.len() + 32);
    out.push_str(&seg.before);
    out.push_str(&" ".repeat(before_pad));
    out.push_str(SEGMENT_RESET);
    out.push_str(&text);
    out.push_str(&" ".repeat(overlay_pad));
    out.push_str(SEGMENT_RESET);
    out.push_str(&seg.after);
    out.push_str(&" ".repeat(after_pad));

    if visible_width(&out) <= total_width {
        out
    } else {
        slice_by_column(&out, 0, total_width, true)
    }
}

// ─── Handle ─────────────────────────────────────────────────────────────────

/// Controls one shown overlay.
///
/// Every method is a no-op once the overlay was removed or the runtime is
/// gone. Each change requests a render.
#[derive(Clone)]
pub struct OverlayHandle {
    id: OverlayId,
    manager: Weak<RefCell<OverlayManager>>,
    render: RenderHandle,
}

impl OverlayHandle {
    pub(crate) fn new(id: OverlayId, manager: &Rc<RefCell<OverlayManager>>, render: RenderHandle) -> Self {
        Self {
            id,
            manager: Rc::downgrade(manager),
            render,
        }
    }

    #[must_use]
    pub const fn id(&self) -> OverlayId {
        self.id
    }

    /// Remove the overlay and restore focus.
    pub fn hide(&self) {
        if self.with(|m| m.hide(self.id)).unwrap_or(false) {
            self.render.request_render(false);
        }
    }

    /// Suppress (`true`) or restore (`false`) the overlay.
    pub fn set_hidden(&self, hidden: bool) {
        if self.with(|m| m.set_hidden(self.id, hidden)).is_some() {
            self.render.request_render(false);
        }
    }

    /// Whether the overlay is hidden or gone.
    #[must_use]
    pub fn is_hidden(&self) -> bool {
        let Some(manager) = self.manager.upgrade() else {
            return true;
        };
        manager.try_borrow().map_or(true, |m| m.is_hidden(self.id))
    }

    fn with<R>(&self, f: impl FnOnce(&mut OverlayManager) -> R) -> Option<R> {
        let manager = self.manager.upgrade()?;
        let Ok(mut m) = manager.try_borrow_mut() else {
            tracing::warn!(target: "render.overlay", id = self.id, "overlay_handle_busy");
            return None;
        };
        Some(f(&mut m))
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::{Component, Focusable, component};
    use crate::layout::{Anchor, SizeValue};
    use crate::scheduler::RenderScheduler;
    use pretty_assertions::assert_eq;

    const R: &str = SEGMENT_RESET;

    struct Panel {
        lines: Vec<String>,
        focused: bool,
    }

    impl Panel {
        fn new(lines: &[&str]) -> Self {
            Self {
                lines: lines.iter().map(|l| (*l).to_owned()).collect(),
                focused: false,
            }
        }
    }

    impl Component for Panel {
        fn render(&mut self, _width: usize) -> Vec<String> {
            self.lines.clone()
        }

        fn as_focusable_mut(&mut self) -> Option<&mut dyn Focusable> {
            Some(self)
        }
    }

    impl Focusable for Panel {
        fn set_focused(&mut self, focused: bool) {
            self.focused = focused;
        }

        fn is_focused(&self) -> bool {
            self.focused
        }
    }

    fn manager() -> OverlayManager {
        let mut m = OverlayManager::new();
        m.set_size(10, 5);
        m
    }

    // ── Line compositing ────────────────────────────────────────────────

    #[test]
    fn overlay_in_the_middle() {
        let out = composite_line_at("aaaaaaaaaa", "XX", 3, 2, 10);
        assert_eq!(out, format!("aaa{R}XX{R}aaaaa"));
        assert_eq!(visible_width(&out), 10);
    }

    #[test]
    fn short_base_is_padded() {
        let out = composite_line_at("ab", "XX", 4, 3, 10);
        assert_eq!(out, format!("ab  {R}XX {R}   "));
        assert_eq!(visible_width(&out), 10);
    }

    #[test]
    fn after_segment_keeps_style() {
        let out = composite_line_at("\x1b[31mredredred\x1b[0m", "X", 2, 1, 9);
        assert!(out.starts_with("\x1b[31mre"));
        assert!(out.contains(&format!("{R}X{R}\x1b[31mredred")));
    }

    #[test]
    fn wide_overlay_text_is_clipped() {
        let out = composite_line_at("..........", "OVERLAY-TEXT", 0, 4, 10);
        assert_eq!(out, format!("{R}OVER{R}......"));
    }

    #[test]
    fn image_rows_untouched() {
        let base = "\x1b_Gf=100;AAAA\x1b\\";
        assert_eq!(composite_line_at(base, "XX", 0, 2, 10), base);
    }

    // ── Stack & focus ───────────────────────────────────────────────────

    #[test]
    fn show_focuses_and_hide_restores() {
        let mut m = manager();
        let editor = component(Panel::new(&[]));
        m.focus_mut().set_focus(Some(editor.clone()));

        let dialog = component(Panel::new(&["hi"]));
        let id = m.show(dialog.clone(), OverlayOptions::new());
        assert!(m.focus().is_focused(&dialog));
        assert!(m.has_visible());

        assert!(m.hide(id));
        assert!(m.focus().is_focused(&editor));
        assert!(!m.has_visible());
        assert!(!m.hide(id));
    }

    #[test]
    fn hiding_top_focuses_next_visible() {
        let mut m = manager();
        let a = component(Panel::new(&["a"]));
        let b = component(Panel::new(&["b"]));
        m.show(a.clone(), OverlayOptions::new());
        let b_id = m.show(b.clone(), OverlayOptions::new());
        assert!(m.focus().is_focused(&b));

        m.set_hidden(b_id, true);
        assert!(m.is_hidden(b_id));
        assert!(m.focus().is_focused(&a));

        m.set_hidden(b_id, false);
        assert!(m.focus().is_focused(&b));
    }

    #[test]
    fn invisible_overlay_does_not_take_focus() {
        let mut m = manager();
        let wide_only = component(Panel::new(&["x"]));
        m.show(wide_only.clone(), OverlayOptions::new().visible(|w, _| w > 50));
        assert!(!m.focus().is_focused(&wide_only));
        assert!(!m.has_visible());
        assert_eq!(m.len(), 1);
    }

    #[test]
    fn hide_topmost_pops_last() {
        let mut m = manager();
        let a = component(Panel::new(&["a"]));
        m.show(a.clone(), OverlayOptions::new());
        assert!(m.contains(&a));
        assert!(m.hide_topmost());
        assert!(!m.contains(&a));
        assert!(!m.hide_topmost());
        assert!(m.focus().focused().is_none());
    }

    #[test]
    fn unknown_ids_are_ignored() {
        let mut m = manager();
        m.set_hidden(42, true);
        assert!(m.is_hidden(42));
        assert!(!m.hide(42));
    }

    // ── Frame compositing ───────────────────────────────────────────────

    #[test]
    fn composite_without_overlays_is_identity() {
        let m = manager();
        let base = vec!["a".to_owned()];
        assert_eq!(m.composite(base.clone(), 10, 5, 0), base);
    }

    #[test]
    fn composite_places_and_pads() {
        let mut m = manager();
        let o = component(Panel::new(&["XX", "YY"]));
        m.show(
            o,
            OverlayOptions::new()
                .width(SizeValue::Absolute(2))
                .anchor(Anchor::BottomRight),
        );
        let out = m.composite(vec!["line".to_owned()], 10, 5, 3);
        // Working height max(1, 3, 3 + 2) = 5, viewport starts at 0.
        assert_eq!(out.len(), 5);
        assert_eq!(out[0], "line");
        assert_eq!(out[3], format!("        {R}XX{R}"));
        assert_eq!(out[4], format!("        {R}YY{R}"));
    }

    #[test]
    fn composite_respects_max_height() {
        let mut m = manager();
        let o = component(Panel::new(&["1", "2", "3", "4"]));
        m.show(
            o,
            OverlayOptions::new()
                .width(SizeValue::Absolute(1))
                .max_height(SizeValue::Absolute(2))
                .anchor(Anchor::TopLeft),
        );
        let out = m.composite(Vec::new(), 10, 5, 0);
        assert_eq!(out.len(), 2);
        assert!(out[0].contains('1'));
        assert!(out[1].contains('2'));
    }

    #[test]
    fn composite_targets_viewport_rows() {
        let mut m = manager();
        let o = component(Panel::new(&["O"]));
        m.show(
            o,
            OverlayOptions::new()
                .width(SizeValue::Absolute(1))
                .anchor(Anchor::TopLeft),
        );
        let base: Vec<String> = (0..8).map(|i| i.to_string()).collect();
        let out = m.composite(base, 10, 5, 8);
        // Viewport is rows 3..8; the overlay's row 0 is frame row 3.
        assert_eq!(out[2], "2");
        assert!(out[3].contains('O'));
    }

    // ── Handle ──────────────────────────────────────────────────────────

    #[test]
    fn handle_controls_entry_and_requests_render() {
        let shared = Rc::new(RefCell::new(manager()));
        let scheduler = RenderScheduler::new();
        let o = component(Panel::new(&["o"]));
        let id = shared.borrow_mut().show(o, OverlayOptions::new());
        let handle = OverlayHandle::new(id, &shared, scheduler.handle());

        assert!(!handle.is_hidden());
        handle.set_hidden(true);
        assert!(handle.is_hidden());
        assert_eq!(scheduler.take(), Some(false));

        handle.hide();
        assert!(handle.is_hidden());
        assert!(shared.borrow().is_empty());
        assert_eq!(scheduler.take(), Some(false));

        handle.hide();
        assert_eq!(scheduler.take(), None);
    }

    #[test]
    fn handle_outliving_manager_is_inert() {
        let shared = Rc::new(RefCell::new(manager()));
        let scheduler = RenderScheduler::new();
        let handle = OverlayHandle::new(0, &shared, scheduler.handle());
        drop(shared);
        handle.hide();
        handle.set_hidden(false);
        assert!(handle.is_hidden());
        assert_eq!(scheduler.take(), None);
    }
}
