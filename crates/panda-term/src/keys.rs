// SPDX-License-Identifier: MIT
//
// Key identification.
//
// Components receive raw input sequences and ask "is this ctrl+c?" rather
// than consuming a decoded event enum. That keeps the demultiplexer dumb
// and lets one key id match every encoding a terminal might use for it:
//
// - legacy VT sequences (`ESC [ A`, `ESC O P`, rxvt `ESC [ a`, …)
// - raw control bytes (`0x03` for ctrl+c)
// - xterm modifyOtherKeys (`ESC [ 27 ; mod ; key ~`)
// - Kitty keyboard protocol (`ESC [ cp ; mod u` and friends)
//
// Some encodings are ambiguous until we know whether the Kitty protocol
// is on. `ESC x` is alt+x in legacy mode but never produced by a Kitty
// terminal, and a bare `\n` is shift+enter under Kitty but enter
// otherwise. The terminal publishes the protocol state into a process-wide
// flag that the matcher consults.
//
// Key ids are `+`-joined, case-insensitive: `"ctrl+shift+right"`,
// `"alt+enter"`, `"pageUp"`, `"f5"`, `"a"`.

use std::sync::atomic::{AtomicBool, Ordering};

use bitflags::bitflags;

// ─── Protocol State ──────────────────────────────────────────────────────────

static KITTY_ACTIVE: AtomicBool = AtomicBool::new(false);

/// Record whether the Kitty keyboard protocol was negotiated.
pub fn set_kitty_protocol_active(active: bool) {
    KITTY_ACTIVE.store(active, Ordering::Relaxed);
}

/// Whether the Kitty keyboard protocol is in effect.
#[must_use]
pub fn is_kitty_protocol_active() -> bool {
    KITTY_ACTIVE.load(Ordering::Relaxed)
}

// ─── Types ───────────────────────────────────────────────────────────────────

bitflags! {
    /// Keyboard modifier flags.
    ///
    /// Matches the Kitty keyboard protocol bitmask (also compatible
    /// with xterm CSI modifier encoding where `param = 1 + bitmask`).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
    pub struct Modifiers: u8 {
        const SHIFT     = 0b0000_0001;
        const ALT       = 0b0000_0010;
        const CTRL      = 0b0000_0100;
        const SUPER     = 0b0000_1000;
        const HYPER     = 0b0001_0000;
        const META      = 0b0010_0000;
        const CAPS_LOCK = 0b0100_0000;
        const NUM_LOCK  = 0b1000_0000;
    }
}

impl Modifiers {
    /// Lock state bits, ignored when matching.
    pub const LOCKS: Self = Self::CAPS_LOCK.union(Self::NUM_LOCK);

    /// Modifiers with the lock bits cleared.
    #[inline]
    #[must_use]
    pub const fn without_locks(self) -> Self {
        self.difference(Self::LOCKS)
    }
}

/// Key press / repeat / release distinction.
///
/// Only terminals speaking the Kitty protocol with event reporting
/// distinguish these. Everything else is a press.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyEventKind {
    #[default]
    Press,
    Repeat,
    Release,
}

/// A key decoded from one of the Kitty-style CSI forms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KittyKey {
    /// Unicode codepoint, or one of the negative [`codepoint`] values for
    /// arrows and editing keys.
    pub codepoint: i32,
    pub shifted_key: Option<i32>,
    /// Key at the same position on a US layout.
    pub base_layout_key: Option<i32>,
    pub modifiers: Modifiers,
    pub event: KeyEventKind,
}

/// Codepoints used for keys without a Unicode character.
pub mod codepoint {
    pub const ESCAPE: i32 = 27;
    pub const TAB: i32 = 9;
    pub const ENTER: i32 = 13;
    pub const SPACE: i32 = 32;
    pub const BACKSPACE: i32 = 127;
    pub const KP_ENTER: i32 = 57414;

    pub const UP: i32 = -1;
    pub const DOWN: i32 = -2;
    pub const RIGHT: i32 = -3;
    pub const LEFT: i32 = -4;

    pub const DELETE: i32 = -10;
    pub const INSERT: i32 = -11;
    pub const PAGE_UP: i32 = -12;
    pub const PAGE_DOWN: i32 = -13;
    pub const HOME: i32 = -14;
    pub const END: i32 = -15;
}

/// Canonical key ids accepted by [`matches_key`].
pub mod key {
    pub const ESCAPE: &str = "escape";
    pub const ENTER: &str = "enter";
    pub const TAB: &str = "tab";
    pub const SPACE: &str = "space";
    pub const BACKSPACE: &str = "backspace";
    pub const DELETE: &str = "delete";
    pub const INSERT: &str = "insert";
    pub const CLEAR: &str = "clear";
    pub const HOME: &str = "home";
    pub const END: &str = "end";
    pub const PAGE_UP: &str = "pageUp";
    pub const PAGE_DOWN: &str = "pageDown";
    pub const UP: &str = "up";
    pub const DOWN: &str = "down";
    pub const LEFT: &str = "left";
    pub const RIGHT: &str = "right";
    pub const F1: &str = "f1";
    pub const F2: &str = "f2";
    pub const F3: &str = "f3";
    pub const F4: &str = "f4";
    pub const F5: &str = "f5";
    pub const F6: &str = "f6";
    pub const F7: &str = "f7";
    pub const F8: &str = "f8";
    pub const F9: &str = "f9";
    pub const F10: &str = "f10";
    pub const F11: &str = "f11";
    pub const F12: &str = "f12";

    /// `ctrl+<key>`.
    #[must_use]
    pub fn ctrl(key: &str) -> String {
        format!("ctrl+{key}")
    }

    /// `alt+<key>`.
    #[must_use]
    pub fn alt(key: &str) -> String {
        format!("alt+{key}")
    }

    /// `shift+<key>`.
    #[must_use]
    pub fn shift(key: &str) -> String {
        format!("shift+{key}")
    }
}

/// Printable symbols that may be used as single-character key ids.
const SYMBOL_KEYS: &str = "`-=[]\\;',./!@#$%^&*()_+|~{}:<>?\"";

// ─── Kitty Parsing ───────────────────────────────────────────────────────────

/// Decode a Kitty CSI-u, modified cursor key, or modified tilde key.
///
/// Forms:
///
/// ```text
/// ESC [ cp [: shifted] [: base] [; mod [: event]] u
/// ESC [ 1 ; mod [: event] (A|B|C|D|H|F)
/// ESC [ n [; mod] [: event] ~          n ∈ {2, 3, 5, 6, 7, 8}
/// ```
#[must_use]
pub fn parse_kitty_sequence(data: &str) -> Option<KittyKey> {
    let body = data.strip_prefix("\x1b[")?.as_bytes();
    let (&last, params) = body.split_last()?;
    match last {
        b'u' => parse_csi_u(params),
        b'A' | b'B' | b'C' | b'D' | b'H' | b'F' => parse_modified_cursor(params, last),
        b'~' => parse_tilde(params),
        _ => None,
    }
}

fn parse_csi_u(params: &[u8]) -> Option<KittyKey> {
    let mut parts = params.split(|&b| b == b';');
    let key_part = parts.next()?;
    let mod_part = parts.next();
    if parts.next().is_some() {
        return None;
    }

    let mut fields = key_part.split(|&b| b == b':');
    let codepoint = parse_num(fields.next()?)?;
    let shifted_key = match fields.next() {
        Some([]) | None => None,
        Some(f) => Some(parse_num(f)?),
    };
    let base_layout_key = match fields.next() {
        Some(f) => Some(parse_num(f)?),
        None => None,
    };
    if fields.next().is_some() {
        return None;
    }

    let (modifiers, event) = match mod_part {
        Some(m) => parse_mod_event(m)?,
        None => (Modifiers::empty(), KeyEventKind::Press),
    };
    Some(KittyKey {
        codepoint,
        shifted_key,
        base_layout_key,
        modifiers,
        event,
    })
}

fn parse_modified_cursor(params: &[u8], last: u8) -> Option<KittyKey> {
    let rest = params.strip_prefix(b"1;")?;
    let (modifiers, event) = parse_mod_event(rest)?;
    let codepoint = match last {
        b'A' => codepoint::UP,
        b'B' => codepoint::DOWN,
        b'C' => codepoint::RIGHT,
        b'D' => codepoint::LEFT,
        b'H' => codepoint::HOME,
        _ => codepoint::END,
    };
    Some(simple_key(codepoint, modifiers, event))
}

fn parse_tilde(params: &[u8]) -> Option<KittyKey> {
    let mut parts = params.split(|&b| b == b';');
    let num_part = parts.next()?;
    let mod_part = parts.next();
    if parts.next().is_some() {
        return None;
    }

    // `N:EV~` without a modifier is also accepted.
    let mut fields = num_part.split(|&b| b == b':');
    let n = parse_num(fields.next()?)?;
    let bare_event = fields.next();

    let codepoint = match n {
        2 => codepoint::INSERT,
        3 => codepoint::DELETE,
        5 => codepoint::PAGE_UP,
        6 => codepoint::PAGE_DOWN,
        7 => codepoint::HOME,
        8 => codepoint::END,
        _ => return None,
    };

    let (modifiers, event) = match (mod_part, bare_event) {
        (Some(m), None) => parse_mod_event(m)?,
        (None, Some(ev)) => (Modifiers::empty(), decode_event(parse_num(ev)?)),
        (None, None) => (Modifiers::empty(), KeyEventKind::Press),
        (Some(_), Some(_)) => return None,
    };
    Some(simple_key(codepoint, modifiers, event))
}

const fn simple_key(codepoint: i32, modifiers: Modifiers, event: KeyEventKind) -> KittyKey {
    KittyKey {
        codepoint,
        shifted_key: None,
        base_layout_key: None,
        modifiers,
        event,
    }
}

/// `mod[:event]`.
fn parse_mod_event(raw: &[u8]) -> Option<(Modifiers, KeyEventKind)> {
    let mut fields = raw.split(|&b| b == b':');
    let m = parse_num(fields.next()?)?;
    let event = match fields.next() {
        Some(ev) => decode_event(parse_num(ev)?),
        None => KeyEventKind::Press,
    };
    if fields.next().is_some() {
        return None;
    }
    Some((decode_modifiers(m), event))
}

/// Decode a CSI modifier parameter (`1 + bitmask`).
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
const fn decode_modifiers(param: i32) -> Modifiers {
    let val = if param > 0 { param - 1 } else { 0 };
    Modifiers::from_bits_retain(val as u8)
}

const fn decode_event(ev: i32) -> KeyEventKind {
    match ev {
        2 => KeyEventKind::Repeat,
        3 => KeyEventKind::Release,
        _ => KeyEventKind::Press,
    }
}

/// Parse a non-empty run of ASCII digits.
fn parse_num(raw: &[u8]) -> Option<i32> {
    if raw.is_empty() || !raw.iter().all(u8::is_ascii_digit) {
        return None;
    }
    raw.iter().try_fold(0i32, |acc, &d| {
        acc.checked_mul(10)?.checked_add(i32::from(d - b'0'))
    })
}

// ─── Release / Repeat ────────────────────────────────────────────────────────

/// Event-type markers as they appear just before the final byte.
const fn event_markers(event: u8) -> [[u8; 3]; 8] {
    let finals = [b'u', b'~', b'A', b'B', b'C', b'D', b'H', b'F'];
    let mut out = [[0; 3]; 8];
    let mut i = 0;
    while i < finals.len() {
        out[i] = [b':', event, finals[i]];
        i += 1;
    }
    out
}

fn has_event_marker(data: &str, event: u8) -> bool {
    if data.contains(crate::input::PASTE_START) {
        return false;
    }
    let bytes = data.as_bytes();
    event_markers(event)
        .iter()
        .any(|m| bytes.windows(3).any(|w| w == m))
}

/// Whether `data` is a Kitty key-release event.
///
/// Paste payloads never count, whatever text they contain.
#[must_use]
pub fn is_key_release(data: &str) -> bool {
    has_event_marker(data, b'3')
}

/// Whether `data` is a Kitty key-repeat event.
#[must_use]
pub fn is_key_repeat(data: &str) -> bool {
    has_event_marker(data, b'2')
}

// ─── Matching ────────────────────────────────────────────────────────────────

/// A key id split into its base key and modifier set.
struct KeyId {
    key: String,
    mods: Modifiers,
}

fn parse_key_id(id: &str) -> Option<KeyId> {
    let lower = id.to_lowercase();
    let parts: Vec<&str> = lower.split('+').collect();
    let key = (*parts.last()?).to_owned();
    if key.is_empty() {
        return None;
    }
    let mut mods = Modifiers::empty();
    for part in &parts[..parts.len() - 1] {
        match *part {
            "shift" => mods |= Modifiers::SHIFT,
            "alt" => mods |= Modifiers::ALT,
            "ctrl" => mods |= Modifiers::CTRL,
            _ => {}
        }
    }
    Some(KeyId { key, mods })
}

/// Does `data` carry a Kitty-style encoding of `expected` with exactly `mods`?
fn matches_kitty(data: &str, expected: i32, mods: Modifiers) -> bool {
    let Some(k) = parse_kitty_sequence(data) else {
        return false;
    };
    if k.modifiers.without_locks() != mods.without_locks() {
        return false;
    }
    if k.codepoint == expected {
        return true;
    }
    // Non-Latin layouts report the US-layout key as `base_layout_key`. Only
    // trust it when the primary codepoint isn't already a Latin letter or
    // known symbol, or ctrl+c on a Dvorak layout would fire for ctrl+i.
    k.base_layout_key == Some(expected) && !is_latin_or_symbol(k.codepoint)
}

fn is_latin_or_symbol(cp: i32) -> bool {
    u32::try_from(cp)
        .ok()
        .and_then(char::from_u32)
        .is_some_and(|c| c.is_ascii_lowercase() || SYMBOL_KEYS.contains(c))
}

/// xterm modifyOtherKeys: `ESC [ 27 ; mod ; key ~`.
fn matches_modify_other_keys(data: &str, expected: i32, mods: Modifiers) -> bool {
    let Some(body) = data.strip_prefix("\x1b[27;").and_then(|s| s.strip_suffix('~')) else {
        return false;
    };
    let mut parts = body.split(';');
    let (Some(m), Some(k), None) = (parts.next(), parts.next(), parts.next()) else {
        return false;
    };
    match (parse_num(m.as_bytes()), parse_num(k.as_bytes())) {
        (Some(m), Some(k)) => k == expected && decode_modifiers(m).without_locks() == mods,
        _ => false,
    }
}

/// Unmodified legacy encodings of named keys.
fn legacy_sequences(key: &str) -> &'static [&'static str] {
    match key {
        "up" => &["\x1b[A", "\x1bOA"],
        "down" => &["\x1b[B", "\x1bOB"],
        "right" => &["\x1b[C", "\x1bOC"],
        "left" => &["\x1b[D", "\x1bOD"],
        "home" => &["\x1b[H", "\x1bOH", "\x1b[1~", "\x1b[7~"],
        "end" => &["\x1b[F", "\x1bOF", "\x1b[4~", "\x1b[8~"],
        "insert" => &["\x1b[2~"],
        "delete" => &["\x1b[3~"],
        "pageup" => &["\x1b[5~", "\x1b[[5~"],
        "pagedown" => &["\x1b[6~", "\x1b[[6~"],
        "clear" => &["\x1b[E", "\x1bOE"],
        "f1" => &["\x1bOP", "\x1b[11~", "\x1b[[A"],
        "f2" => &["\x1bOQ", "\x1b[12~", "\x1b[[B"],
        "f3" => &["\x1bOR", "\x1b[13~", "\x1b[[C"],
        "f4" => &["\x1bOS", "\x1b[14~", "\x1b[[D"],
        "f5" => &["\x1b[15~", "\x1b[[E"],
        "f6" => &["\x1b[17~"],
        "f7" => &["\x1b[18~"],
        "f8" => &["\x1b[19~"],
        "f9" => &["\x1b[20~"],
        "f10" => &["\x1b[21~"],
        "f11" => &["\x1b[23~"],
        "f12" => &["\x1b[24~"],
        _ => &[],
    }
}

/// rxvt-style shift / ctrl encodings of named keys.
fn legacy_modified(key: &str, mods: Modifiers) -> Option<&'static str> {
    let shift = mods == Modifiers::SHIFT;
    let ctrl = mods == Modifiers::CTRL;
    Some(match (key, shift, ctrl) {
        ("up", true, _) => "\x1b[a",
        ("down", true, _) => "\x1b[b",
        ("right", true, _) => "\x1b[c",
        ("left", true, _) => "\x1b[d",
        ("up", _, true) => "\x1bOa",
        ("down", _, true) => "\x1bOb",
        ("right", _, true) => "\x1bOc",
        ("left", _, true) => "\x1bOd",
        ("insert", true, _) => "\x1b[2$",
        ("delete", true, _) => "\x1b[3$",
        ("pageup", true, _) => "\x1b[5$",
        ("pagedown", true, _) => "\x1b[6$",
        ("home", true, _) => "\x1b[7$",
        ("end", true, _) => "\x1b[8$",
        ("insert", _, true) => "\x1b[2^",
        ("delete", _, true) => "\x1b[3^",
        ("pageup", _, true) => "\x1b[5^",
        ("pagedown", _, true) => "\x1b[6^",
        ("home", _, true) => "\x1b[7^",
        ("end", _, true) => "\x1b[8^",
        _ => return None,
    })
}

/// Named keys with a negative codepoint.
fn named_codepoint(key: &str) -> Option<i32> {
    Some(match key {
        "up" => codepoint::UP,
        "down" => codepoint::DOWN,
        "right" => codepoint::RIGHT,
        "left" => codepoint::LEFT,
        "insert" => codepoint::INSERT,
        "delete" => codepoint::DELETE,
        "pageup" => codepoint::PAGE_UP,
        "pagedown" => codepoint::PAGE_DOWN,
        "home" => codepoint::HOME,
        "end" => codepoint::END,
        _ => return None,
    })
}

/// Control byte produced by ctrl+`key` in legacy mode.
fn raw_ctrl_char(key: char) -> Option<char> {
    match key {
        'a'..='z' | '[' | '\\' | ']' | '_' => char::from_u32(u32::from(key) & 0x1f),
        '-' => Some('\x1f'),
        _ => None,
    }
}

/// Whether raw input `data` is the key described by `key_id`.
///
/// ```
/// use panda_term::keys::matches_key;
///
/// assert!(matches_key("\x03", "ctrl+c"));
/// assert!(matches_key("\x1b[1;5C", "ctrl+right"));
/// assert!(!matches_key("\x1b[A", "down"));
/// ```
#[must_use]
pub fn matches_key(data: &str, key_id: &str) -> bool {
    let Some(KeyId { key, mods }) = parse_key_id(key_id) else {
        return false;
    };
    let kitty = is_kitty_protocol_active();
    let shift = mods.contains(Modifiers::SHIFT);
    let alt = mods.contains(Modifiers::ALT);
    let ctrl = mods.contains(Modifiers::CTRL);
    let only = |m: Modifiers| mods == m;

    match key.as_str() {
        "escape" | "esc" => {
            mods.is_empty() && (data == "\x1b" || matches_kitty(data, codepoint::ESCAPE, mods))
        }
        "space" => {
            if !kitty && ((only(Modifiers::CTRL) && data == "\x00") || (only(Modifiers::ALT) && data == "\x1b ")) {
                return true;
            }
            if mods.is_empty() {
                data == " " || matches_kitty(data, codepoint::SPACE, mods)
            } else {
                matches_kitty(data, codepoint::SPACE, mods)
            }
        }
        "tab" => {
            if only(Modifiers::SHIFT) {
                data == "\x1b[Z" || matches_kitty(data, codepoint::TAB, mods)
            } else if mods.is_empty() {
                data == "\t" || matches_kitty(data, codepoint::TAB, mods)
            } else {
                matches_kitty(data, codepoint::TAB, mods)
            }
        }
        "enter" | "return" => matches_enter(data, mods, kitty),
        "backspace" => {
            if only(Modifiers::ALT) {
                data == "\x1b\x7f" || data == "\x1b\x08" || matches_kitty(data, codepoint::BACKSPACE, mods)
            } else if mods.is_empty() {
                data == "\x7f" || data == "\x08" || matches_kitty(data, codepoint::BACKSPACE, mods)
            } else {
                matches_kitty(data, codepoint::BACKSPACE, mods)
            }
        }
        named if named_codepoint(named).is_some() || named == "clear" => {
            if mods.is_empty() && legacy_sequences(named).contains(&data) {
                return true;
            }
            if legacy_modified(named, mods) == Some(data) {
                return true;
            }
            if !kitty && only(Modifiers::ALT) {
                let alt_form = match named {
                    "left" => Some("\x1bb"),
                    "right" => Some("\x1bf"),
                    "up" => Some("\x1bp"),
                    "down" => Some("\x1bn"),
                    _ => None,
                };
                if alt_form == Some(data) {
                    return true;
                }
            }
            named_codepoint(named).is_some_and(|cp| matches_kitty(data, cp, mods))
        }
        f if f.len() >= 2 && f.starts_with('f') && f[1..].bytes().all(|b| b.is_ascii_digit()) => {
            mods.is_empty() && legacy_sequences(f).contains(&data)
        }
        single => {
            let mut chars = single.chars();
            let (Some(c), None) = (chars.next(), chars.next()) else {
                return false;
            };
            if !(c.is_ascii_lowercase() || c.is_ascii_digit() || SYMBOL_KEYS.contains(c)) {
                return false;
            }
            matches_char(data, c, mods, kitty, (shift, alt, ctrl))
        }
    }
}

fn matches_enter(data: &str, mods: Modifiers, kitty: bool) -> bool {
    let kitty_enter = |m| {
        matches_kitty(data, codepoint::ENTER, m)
            || matches_kitty(data, codepoint::KP_ENTER, m)
            || matches_modify_other_keys(data, codepoint::ENTER, m)
    };
    if mods == Modifiers::SHIFT {
        if kitty_enter(mods) {
            return true;
        }
        return kitty && (data == "\x1b\r" || data == "\n");
    }
    if mods == Modifiers::ALT {
        if kitty_enter(mods) {
            return true;
        }
        return !kitty && data == "\x1b\r";
    }
    if mods.is_empty() {
        return data == "\r" || (!kitty && data == "\n") || data == "\x1bOM" || kitty_enter(mods);
    }
    kitty_enter(mods)
}

fn matches_char(data: &str, c: char, mods: Modifiers, kitty: bool, (shift, alt, ctrl): (bool, bool, bool)) -> bool {
    let cp = i32::try_from(u32::from(c)).unwrap_or_default();
    let raw_ctrl = raw_ctrl_char(c);

    if ctrl && alt && !shift && !kitty {
        if let Some(r) = raw_ctrl {
            return is_esc_then(data, r);
        }
    }
    if alt && !ctrl && !shift && !kitty && c.is_ascii_lowercase() && is_esc_then(data, c) {
        return true;
    }
    if ctrl && !shift && !alt {
        if raw_ctrl.is_some_and(|r| is_char(data, r)) {
            return true;
        }
        return matches_kitty(data, cp, mods) || matches_modify_other_keys(data, cp, mods);
    }
    if shift && !ctrl && !alt {
        if c.is_ascii_lowercase() && is_char(data, c.to_ascii_uppercase()) {
            return true;
        }
        return matches_kitty(data, cp, mods);
    }
    if !mods.is_empty() {
        return matches_kitty(data, cp, mods) || matches_modify_other_keys(data, cp, mods);
    }
    is_char(data, c) || matches_kitty(data, cp, mods)
}

/// `data` is exactly the character `c`.
fn is_char(data: &str, c: char) -> bool {
    let mut chars = data.chars();
    chars.next() == Some(c) && chars.next().is_none()
}

/// `data` is exactly ESC followed by `c`.
fn is_esc_then(data: &str, c: char) -> bool {
    data.strip_prefix('\x1b').is_some_and(|rest| is_char(rest, c))
}

// ─── Naming ──────────────────────────────────────────────────────────────────

fn mod_prefix(mods: Modifiers) -> String {
    let mut out = String::new();
    for (flag, name) in [
        (Modifiers::CTRL, "ctrl+"),
        (Modifiers::ALT, "alt+"),
        (Modifiers::SHIFT, "shift+"),
    ] {
        if mods.contains(flag) {
            out.push_str(name);
        }
    }
    out
}

fn kitty_key_name(cp: i32) -> Option<String> {
    let name = match cp {
        codepoint::ESCAPE => "escape",
        codepoint::TAB => "tab",
        codepoint::ENTER | codepoint::KP_ENTER => "enter",
        codepoint::SPACE => "space",
        codepoint::BACKSPACE => "backspace",
        codepoint::DELETE => "delete",
        codepoint::INSERT => "insert",
        codepoint::HOME => "home",
        codepoint::END => "end",
        codepoint::PAGE_UP => "pageUp",
        codepoint::PAGE_DOWN => "pageDown",
        codepoint::UP => "up",
        codepoint::DOWN => "down",
        codepoint::LEFT => "left",
        codepoint::RIGHT => "right",
        other => {
            let c = char::from_u32(u32::try_from(other).ok()?)?;
            if c.is_ascii_lowercase() || c.is_ascii_digit() || SYMBOL_KEYS.contains(c) {
                return Some(c.to_string());
            }
            return None;
        }
    };
    Some(name.to_owned())
}

/// Normalized key id for `data`, if it is a key this module knows.
///
/// Intended for logging and debugging: the result round-trips through
/// [`matches_key`].
#[must_use]
pub fn parse_key(data: &str) -> Option<String> {
    if let Some(k) = parse_kitty_sequence(data) {
        let name = kitty_key_name(k.codepoint)?;
        return Some(format!("{}{name}", mod_prefix(k.modifiers.without_locks())));
    }

    let kitty = is_kitty_protocol_active();
    if kitty && (data == "\x1b\r" || data == "\n") {
        return Some("shift+enter".to_owned());
    }

    let fixed = match data {
        "\x1b" => Some("escape"),
        "\t" => Some("tab"),
        "\r" | "\x1bOM" => Some("enter"),
        "\n" if !kitty => Some("enter"),
        "\x00" => Some("ctrl+space"),
        " " => Some("space"),
        "\x7f" | "\x08" => Some("backspace"),
        "\x1b[Z" => Some("shift+tab"),
        "\x1b\r" if !kitty => Some("alt+enter"),
        "\x1b " => Some("alt+space"),
        "\x1b\x7f" | "\x1b\x08" => Some("alt+backspace"),
        _ => None,
    };
    if let Some(name) = fixed {
        return Some(name.to_owned());
    }

    for name in [
        "up", "down", "left", "right", "home", "end", "insert", "delete", "pageUp", "pageDown", "clear", "f1", "f2",
        "f3", "f4", "f5", "f6", "f7", "f8", "f9", "f10", "f11", "f12",
    ] {
        if legacy_sequences(&name.to_lowercase()).contains(&data) {
            return Some(name.to_owned());
        }
    }

    let mut chars = data.chars();
    match (chars.next(), chars.next(), chars.next()) {
        (Some(c @ '\x01'..='\x1a'), None, _) => char::from_u32(u32::from(c) + 96).map(|l| format!("ctrl+{l}")),
        (Some(c @ ' '..='~'), None, _) => Some(c.to_string()),
        (Some('\x1b'), Some(c @ 'a'..='z'), None) if !kitty => Some(format!("alt+{c}")),
        _ => None,
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
