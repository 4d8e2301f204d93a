// SPDX-License-Identifier: MIT
//
// Overlay layout.
//
// Turns an overlay's placement options into a concrete box on the screen:
// a width, a row and column relative to the top of the visible viewport,
// and an optional height cap. The resolver is pure; it is called twice per
// overlay per frame, once with height 0 to learn the width to render at,
// then again with the height the overlay actually rendered.
//
// Order of operations:
//
//   1. margins (negatives become 0) shrink the available area
//   2. width: percent of terminal width, absolute, or min(80, available),
//      raised to min_width, then clamped to [1, available]
//   3. max_height resolved and clamped the same way; caps the height
//   4. row / col: explicit values win, otherwise the anchor picks start,
//      center or end of the available area on each axis
//   5. offsets are added
//   6. the box is clamped back inside the margins

use std::fmt;
use std::rc::Rc;

/// Fallback overlay width when none is given.
pub const DEFAULT_OVERLAY_WIDTH: usize = 80;

// ─── Options ────────────────────────────────────────────────────────────────

/// A length given either in cells or as a percentage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SizeValue {
    Absolute(usize),
    /// 0–100, of the relevant terminal dimension.
    Percent(f64),
}

impl SizeValue {
    /// Parse `"40"` or `"40%"`.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        if let Some(pct) = s.strip_suffix('%') {
            let value: f64 = pct.trim().parse().ok()?;
            return (value.is_finite() && value >= 0.0).then_some(Self::Percent(value));
        }
        s.parse().ok().map(Self::Absolute)
    }

    /// Resolve against `reference` cells.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
    pub fn resolve(self, reference: usize) -> usize {
        match self {
            Self::Absolute(n) => n,
            Self::Percent(p) => ((p * reference as f64) / 100.0).floor().max(0.0) as usize,
        }
    }
}

impl From<usize> for SizeValue {
    fn from(n: usize) -> Self {
        Self::Absolute(n)
    }
}

/// Where an overlay sits when no explicit row/col is given.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Anchor {
    #[default]
    Center,
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
    TopCenter,
    BottomCenter,
    LeftCenter,
    RightCenter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    Start,
    Center,
    End,
}

impl Anchor {
    /// Parse the kebab-case names (`"top-left"`, `"center"`, …).
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "center" => Self::Center,
            "top-left" => Self::TopLeft,
            "top-right" => Self::TopRight,
            "bottom-left" => Self::BottomLeft,
            "bottom-right" => Self::BottomRight,
            "top-center" => Self::TopCenter,
            "bottom-center" => Self::BottomCenter,
            "left-center" => Self::LeftCenter,
            "right-center" => Self::RightCenter,
            _ => return None,
        })
    }

    /// (vertical, horizontal)
    const fn axes(self) -> (Axis, Axis) {
        match self {
            Self::Center => (Axis::Center, Axis::Center),
            Self::TopLeft => (Axis::Start, Axis::Start),
            Self::TopRight => (Axis::Start, Axis::End),
            Self::BottomLeft => (Axis::End, Axis::Start),
            Self::BottomRight => (Axis::End, Axis::End),
            Self::TopCenter => (Axis::Start, Axis::Center),
            Self::BottomCenter => (Axis::End, Axis::Center),
            Self::LeftCenter => (Axis::Center, Axis::Start),
            Self::RightCenter => (Axis::Center, Axis::End),
        }
    }
}

/// Space kept free around an overlay. Negative sides count as 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Margin {
    pub top: isize,
    pub right: isize,
    pub bottom: isize,
    pub left: isize,
}

impl Margin {
    /// The same margin on every side.
    #[must_use]
    pub const fn uniform(n: isize) -> Self {
        Self {
            top: n,
            right: n,
            bottom: n,
            left: n,
        }
    }

    fn clamped(self) -> (usize, usize, usize, usize) {
        (
            self.top.max(0).unsigned_abs(),
            self.right.max(0).unsigned_abs(),
            self.bottom.max(0).unsigned_abs(),
            self.left.max(0).unsigned_abs(),
        )
    }
}

/// Predicate deciding from `(width, height)` whether an overlay shows.
pub type VisibleFn = Rc<dyn Fn(usize, usize) -> bool>;

/// Placement options for an overlay.
#[derive(Clone, Default)]
pub struct OverlayOptions {
    pub width: Option<SizeValue>,
    pub min_width: usize,
    pub max_height: Option<SizeValue>,
    pub anchor: Anchor,
    /// Explicit row; a percentage is of the free vertical space.
    pub row: Option<SizeValue>,
    /// Explicit column; a percentage is of the free horizontal space.
    pub col: Option<SizeValue>,
    pub offset_x: isize,
    pub offset_y: isize,
    pub margin: Margin,
    pub visible: Option<VisibleFn>,
}

impl OverlayOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn width(mut self, width: SizeValue) -> Self {
        self.width = Some(width);
        self
    }

    #[must_use]
    pub fn min_width(mut self, min_width: usize) -> Self {
        self.min_width = min_width;
        self
    }

    #[must_use]
    pub fn max_height(mut self, max_height: SizeValue) -> Self {
        self.max_height = Some(max_height);
        self
    }

    #[must_use]
    pub fn anchor(mut self, anchor: Anchor) -> Self {
        self.anchor = anchor;
        self
    }

    #[must_use]
    pub fn row(mut self, row: SizeValue) -> Self {
        self.row = Some(row);
        self
    }

    #[must_use]
    pub fn col(mut self, col: SizeValue) -> Self {
        self.col = Some(col);
        self
    }

    #[must_use]
    pub fn offset(mut self, x: isize, y: isize) -> Self {
        self.offset_x = x;
        self.offset_y = y;
        self
    }

    #[must_use]
    pub fn margin(mut self, margin: Margin) -> Self {
        self.margin = margin;
        self
    }

    #[must_use]
    pub fn visible(mut self, predicate: impl Fn(usize, usize) -> bool + 'static) -> Self {
        self.visible = Some(Rc::new(predicate));
        self
    }

    /// Evaluate the visibility predicate; no predicate means visible.
    #[must_use]
    pub fn is_visible_at(&self, width: usize, height: usize) -> bool {
        self.visible.as_ref().is_none_or(|f| f(width, height))
    }
}

impl fmt::Debug for OverlayOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OverlayOptions")
            .field("width", &self.width)
            .field("min_width", &self.min_width)
            .field("max_height", &self.max_height)
            .field("anchor", &self.anchor)
            .field("row", &self.row)
            .field("col", &self.col)
            .field("offset_x", &self.offset_x)
            .field("offset_y", &self.offset_y)
            .field("margin", &self.margin)
            .field("visible", &self.visible.is_some())
            .finish()
    }
}

// ─── Resolver ───────────────────────────────────────────────────────────────

/// A resolved overlay box. `row` is relative to the viewport top.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverlayLayout {
    pub width: usize,
    pub row: usize,
    pub col: usize,
    pub max_height: Option<usize>,
}

/// Place an overlay of `overlay_height` rows on a `term_width` ×
/// `term_height` screen.
#[must_use]
pub fn resolve_overlay_layout(
    options: &OverlayOptions,
    overlay_height: usize,
    term_width: usize,
    term_height: usize,
) -> OverlayLayout {
    let (m_top, m_right, m_bottom, m_left) = options.margin.clamped();

    let avail_width = term_width.saturating_sub(m_left + m_right).max(1);
    let avail_height = term_height.saturating_sub(m_top + m_bottom).max(1);

    let mut width = options
        .width
        .map_or_else(|| DEFAULT_OVERLAY_WIDTH.min(avail_width), |w| w.resolve(term_width));
    if options.min_width > 0 {
        width = width.max(options.min_width);
    }
    let width = width.clamp(1, avail_width);

    let max_height = options
        .max_height
        .map(|h| h.resolve(term_height).clamp(1, avail_height));

    let height = max_height.map_or(overlay_height, |max| overlay_height.min(max));

    let (v_axis, h_axis) = options.anchor.axes();
    let free_rows = avail_height.saturating_sub(height);
    let free_cols = avail_width.saturating_sub(width);

    let row = options
        .row
        .map_or_else(|| place(v_axis, m_top, free_rows), |r| explicit(r, m_top, free_rows));
    let col = options
        .col
        .map_or_else(|| place(h_axis, m_left, free_cols), |c| explicit(c, m_left, free_cols));

    let row = offset(row, options.offset_y);
    let col = offset(col, options.offset_x);

    let max_row = term_height.saturating_sub(m_bottom + height).max(m_top);
    let max_col = term_width.saturating_sub(m_right + width).max(m_left);

    OverlayLayout {
        width,
        row: row.clamp(m_top, max_row),
        col: col.clamp(m_left, max_col),
        max_height,
    }
}

const fn place(axis: Axis, margin: usize, free: usize) -> usize {
    match axis {
        Axis::Start => margin,
        Axis::Center => margin + free / 2,
        Axis::End => margin + free,
    }
}

/// An absolute value is a screen position; a percentage picks a point in
/// the free space after the margin.
fn explicit(value: SizeValue, margin: usize, free: usize) -> usize {
    match value {
        SizeValue::Absolute(n) => n,
        SizeValue::Percent(_) => margin + value.resolve(free),
    }
}

const fn offset(base: usize, delta: isize) -> usize {
    if delta < 0 {
        base.saturating_sub(delta.unsigned_abs())
    } else {
        base.saturating_add(delta.unsigned_abs())
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use super::SizeValue::{Absolute, Percent};

    fn layout(options: &OverlayOptions, height: usize) -> OverlayLayout {
        resolve_overlay_layout(options, height, 100, 40)
    }

    // ── Parsing ─────────────────────────────────────────────────────────

    #[test]
    fn size_value_parse() {
        assert_eq!(SizeValue::parse("40"), Some(Absolute(40)));
        assert_eq!(SizeValue::parse("50%"), Some(Percent(50.0)));
        assert_eq!(SizeValue::parse(" 12.5 % "), Some(Percent(12.5)));
        assert_eq!(SizeValue::parse("wide"), None);
        assert_eq!(SizeValue::parse("-5%"), None);
    }

    #[test]
    fn size_value_resolve() {
        assert_eq!(Percent(50.0).resolve(81), 40);
        assert_eq!(Absolute(7).resolve(81), 7);
    }

    #[test]
    fn anchor_parse() {
        assert_eq!(Anchor::parse("bottom-right"), Some(Anchor::BottomRight));
        assert_eq!(Anchor::parse("left-center"), Some(Anchor::LeftCenter));
        assert_eq!(Anchor::parse("middle"), None);
    }

    // ── Width ───────────────────────────────────────────────────────────

    #[test]
    fn default_width_is_capped_at_80() {
        assert_eq!(layout(&OverlayOptions::new(), 10).width, 80);
        let narrow = resolve_overlay_layout(&OverlayOptions::new(), 10, 50, 20);
        assert_eq!(narrow.width, 50);
    }

    #[test]
    fn percent_width_and_min_width() {
        let opts = OverlayOptions::new().width(Percent(25.0));
        assert_eq!(layout(&opts, 1).width, 25);
        let opts = opts.min_width(30);
        assert_eq!(layout(&opts, 1).width, 30);
    }

    #[test]
    fn width_clamped_to_available() {
        let opts = OverlayOptions::new().width(Absolute(500)).margin(Margin::uniform(5));
        assert_eq!(layout(&opts, 1).width, 90);
        let opts = OverlayOptions::new().width(Absolute(0));
        assert_eq!(layout(&opts, 1).width, 1);
    }

    // ── Height ──────────────────────────────────────────────────────────

    #[test]
    fn max_height_caps_effective_height() {
        let opts = OverlayOptions::new()
            .max_height(Percent(25.0))
            .anchor(Anchor::BottomLeft);
        let l = layout(&opts, 30);
        assert_eq!(l.max_height, Some(10));
        assert_eq!(l.row, 30);
    }

    // ── Anchors ─────────────────────────────────────────────────────────

    #[test]
    fn anchors_place_box() {
        let opts = OverlayOptions::new().width(Absolute(20));
        let at = |anchor| {
            let l = layout(&opts.clone().anchor(anchor), 10);
            (l.row, l.col)
        };
        assert_eq!(at(Anchor::Center), (15, 40));
        assert_eq!(at(Anchor::TopLeft), (0, 0));
        assert_eq!(at(Anchor::TopRight), (0, 80));
        assert_eq!(at(Anchor::BottomLeft), (30, 0));
        assert_eq!(at(Anchor::BottomRight), (30, 80));
        assert_eq!(at(Anchor::TopCenter), (0, 40));
        assert_eq!(at(Anchor::BottomCenter), (30, 40));
        assert_eq!(at(Anchor::LeftCenter), (15, 0));
        assert_eq!(at(Anchor::RightCenter), (15, 80));
    }

    #[test]
    fn margins_shift_anchor_points() {
        let opts = OverlayOptions::new()
            .width(Absolute(20))
            .anchor(Anchor::BottomRight)
            .margin(Margin { top: 1, right: 2, bottom: 3, left: 4 });
        let l = layout(&opts, 10);
        assert_eq!((l.row, l.col), (27, 78));
    }

    #[test]
    fn negative_margins_are_zero() {
        let opts = OverlayOptions::new()
            .width(Absolute(20))
            .anchor(Anchor::TopLeft)
            .margin(Margin::uniform(-3));
        let l = layout(&opts, 10);
        assert_eq!((l.row, l.col), (0, 0));
    }

    // ── Explicit positions & offsets ────────────────────────────────────

    #[test]
    fn explicit_row_col_win_over_anchor() {
        let opts = OverlayOptions::new()
            .width(Absolute(10))
            .anchor(Anchor::BottomRight)
            .row(Absolute(3))
            .col(Absolute(7));
        let l = layout(&opts, 5);
        assert_eq!((l.row, l.col), (3, 7));
    }

    #[test]
    fn percent_row_col_use_free_space() {
        let opts = OverlayOptions::new()
            .width(Absolute(20))
            .row(Percent(50.0))
            .col(Percent(100.0));
        let l = layout(&opts, 10);
        assert_eq!((l.row, l.col), (15, 80));
    }

    #[test]
    fn offsets_then_clamp() {
        let opts = OverlayOptions::new()
            .width(Absolute(20))
            .anchor(Anchor::TopLeft)
            .offset(5, 2);
        let l = layout(&opts, 10);
        assert_eq!((l.row, l.col), (2, 5));

        let opts = OverlayOptions::new()
            .width(Absolute(20))
            .anchor(Anchor::TopLeft)
            .offset(-5, -2);
        let l = layout(&opts, 10);
        assert_eq!((l.row, l.col), (0, 0));

        let opts = OverlayOptions::new()
            .width(Absolute(20))
            .anchor(Anchor::BottomRight)
            .offset(50, 50);
        let l = layout(&opts, 10);
        assert_eq!((l.row, l.col), (30, 80));
    }

    #[test]
    fn tall_overlay_pins_to_top_margin() {
        let opts = OverlayOptions::new().margin(Margin::uniform(2));
        let l = resolve_overlay_layout(&opts, 100, 40, 10);
        assert_eq!(l.row, 2);
    }

    // ── Visibility ──────────────────────────────────────────────────────

    #[test]
    fn visibility_predicate() {
        let opts = OverlayOptions::new().visible(|w, _| w >= 60);
        assert!(opts.is_visible_at(80, 24));
        assert!(!opts.is_visible_at(40, 24));
        assert!(OverlayOptions::new().is_visible_at(1, 1));
    }
}
