// SPDX-License-Identifier: MIT
//
// SGR state tracking.
//
// Cutting a styled line in the middle loses whatever SGR codes were issued
// before the cut. The tracker folds those codes into a snapshot (eight
// attribute flags plus a foreground and a background slot) and can emit the
// shortest single `ESC [ … m` that re-establishes the snapshot at the start
// of a fresh fragment.
//
// Colors are stored as the literal parameter tail they arrived with (`31`,
// `38;5;208`, `48;2;10;20;30`), never decoded. The tracker has no opinion
// about palettes; it only needs to replay what it saw.

use bitflags::bitflags;

use crate::escape::{extract_ansi_code, is_sgr};

bitflags! {
    /// Boolean SGR attributes, one bit per on/off code.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
    pub struct StyleFlags: u8 {
        /// SGR 1.
        const BOLD          = 1 << 0;
        /// SGR 2.
        const DIM           = 1 << 1;
        /// SGR 3.
        const ITALIC        = 1 << 2;
        /// SGR 4.
        const UNDERLINE     = 1 << 3;
        /// SGR 5.
        const BLINK         = 1 << 4;
        /// SGR 7.
        const INVERSE       = 1 << 5;
        /// SGR 8.
        const HIDDEN        = 1 << 6;
        /// SGR 9.
        const STRIKETHROUGH = 1 << 7;
    }
}

/// Flag order used when replaying, paired with the SGR code that sets it.
const FLAG_CODES: [(StyleFlags, &str); 8] = [
    (StyleFlags::BOLD, "1"),
    (StyleFlags::DIM, "2"),
    (StyleFlags::ITALIC, "3"),
    (StyleFlags::UNDERLINE, "4"),
    (StyleFlags::BLINK, "5"),
    (StyleFlags::INVERSE, "7"),
    (StyleFlags::HIDDEN, "8"),
    (StyleFlags::STRIKETHROUGH, "9"),
];

/// Accumulated SGR style at some point in a stream of styled text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnsiStyleTracker {
    flags: StyleFlags,
    fg: Option<String>,
    bg: Option<String>,
}

impl AnsiStyleTracker {
    /// A tracker with no active style.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one complete SGR sequence into the snapshot.
    ///
    /// Sequences that are not SGR (`ESC [ … m`) are ignored, as are
    /// parameters that don't parse as integers.
    pub fn process(&mut self, code: &str) {
        if !is_sgr(code) {
            return;
        }
        let params = &code[2..code.len() - 1];
        if params.is_empty() || params == "0" {
            self.reset();
            return;
        }

        let parts: Vec<&str> = params.split(';').collect();
        let mut i = 0;
        while i < parts.len() {
            let Ok(n) = parts[i].parse::<u16>() else {
                i += 1;
                continue;
            };

            if n == 38 || n == 48 {
                let span = match parts.get(i + 1) {
                    Some(&"5") if i + 2 < parts.len() => 3,
                    Some(&"2") if i + 4 < parts.len() => 5,
                    _ => 0,
                };
                if span > 0 {
                    let color = parts[i..i + span].join(";");
                    if n == 38 {
                        self.fg = Some(color);
                    } else {
                        self.bg = Some(color);
                    }
                    i += span;
                    continue;
                }
            }

            self.apply(n, parts[i]);
            i += 1;
        }
    }

    fn apply(&mut self, n: u16, raw: &str) {
        match n {
            0 => self.reset(),
            1 => self.flags.insert(StyleFlags::BOLD),
            2 => self.flags.insert(StyleFlags::DIM),
            3 => self.flags.insert(StyleFlags::ITALIC),
            4 => self.flags.insert(StyleFlags::UNDERLINE),
            5 => self.flags.insert(StyleFlags::BLINK),
            7 => self.flags.insert(StyleFlags::INVERSE),
            8 => self.flags.insert(StyleFlags::HIDDEN),
            9 => self.flags.insert(StyleFlags::STRIKETHROUGH),
            21 => self.flags.remove(StyleFlags::BOLD),
            22 => self.flags.remove(StyleFlags::BOLD | StyleFlags::DIM),
            23 => self.flags.remove(StyleFlags::ITALIC),
            24 => self.flags.remove(StyleFlags::UNDERLINE),
            25 => self.flags.remove(StyleFlags::BLINK),
            27 => self.flags.remove(StyleFlags::INVERSE),
            28 => self.flags.remove(StyleFlags::HIDDEN),
            29 => self.flags.remove(StyleFlags::STRIKETHROUGH),
            39 => self.fg = None,
            49 => self.bg = None,
            30..=37 | 90..=97 => self.fg = Some(raw.to_owned()),
            40..=47 | 100..=107 => self.bg = Some(raw.to_owned()),
            _ => {}
        }
    }

    /// Drop all state.
    pub fn reset(&mut self) {
        self.flags = StyleFlags::empty();
        self.fg = None;
        self.bg = None;
    }

    /// Whether any attribute or color is active.
    #[must_use]
    pub fn has_active(&self) -> bool {
        !self.flags.is_empty() || self.fg.is_some() || self.bg.is_some()
    }

    /// Active boolean attributes.
    #[inline]
    #[must_use]
    pub const fn flags(&self) -> StyleFlags {
        self.flags
    }

    /// Foreground parameter tail, if set.
    #[must_use]
    pub fn fg(&self) -> Option<&str> {
        self.fg.as_deref()
    }

    /// Background parameter tail, if set.
    #[must_use]
    pub fn bg(&self) -> Option<&str> {
        self.bg.as_deref()
    }

    /// One SGR sequence restoring the snapshot, or `""` when nothing is active.
    ///
    /// Parameters are ordered 1, 2, 3, 4, 5, 7, 8, 9, foreground, background.
    #[must_use]
    pub fn active_codes(&self) -> String {
        let mut params: Vec<&str> = FLAG_CODES
            .iter()
            .filter(|(flag, _)| self.flags.contains(*flag))
            .map(|&(_, code)| code)
            .collect();
        params.extend(self.fg.as_deref());
        params.extend(self.bg.as_deref());
        if params.is_empty() {
            return String::new();
        }
        format!("\x1b[{}m", params.join(";"))
    }

    /// Code to emit before a wrapped line ends.
    ///
    /// Only underline needs it: left on, it would run through the padding
    /// the painter adds after the text.
    #[must_use]
    pub fn line_end_reset(&self) -> &'static str {
        if self.flags.contains(StyleFlags::UNDERLINE) {
            "\x1b[24m"
        } else {
            ""
        }
    }
}

/// Feed every SGR sequence found in `text` into `tracker`.
///
/// OSC, APC and non-SGR CSI sequences are skipped.
pub fn update_tracker_from_text(text: &str, tracker: &mut AnsiStyleTracker) {
    let mut i = 0;
    while let Some(off) = text[i..].find('\x1b') {
        let at = i + off;
        if let Some(code) = extract_ansi_code(text, at) {
            tracker.process(code);
            i = at + code.len();
        } else {
            i = at + 1;
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
