// SPDX-License-Identifier: MIT
//
// Escape-sequence recognition inside rendered text.
//
// Component output is plain UTF-8 with ANSI sequences interleaved. Every
// column-counting routine walks it with `extract_ansi_code`: when the walk
// lands on ESC, this tells it whether a complete sequence starts there and
// how many bytes it spans, so the caller can treat the whole thing as zero
// columns wide.
//
// Three families are recognised:
//
//   CSI  ESC [ … X    X ∈ { m G K H J }
//   OSC  ESC ] … ST   ST ∈ { BEL, ESC \ }
//   APC  ESC _ … ST
//
// Anything else at an ESC is not a code as far as text measurement is
// concerned, and the ESC byte counts as an ordinary character.

/// String terminator alternatives for OSC and APC.
const BEL: u8 = 0x07;
const ESC: u8 = 0x1b;

/// Kitty graphics protocol APC introducer.
const KITTY_IMAGE: &str = "\x1b_G";
/// iTerm2 inline image OSC introducer.
const ITERM_IMAGE: &str = "\x1b]1337;File=";

/// Recognise a complete escape sequence starting at byte offset `pos`.
///
/// Returns the sequence as a slice of `s` (its byte length is the distance
/// to advance), or `None` when `s[pos]` is not ESC, the introducer is not
/// CSI/OSC/APC, or the terminator never arrives.
///
/// ```
/// use panda_term::escape::extract_ansi_code;
///
/// let s = "\x1b[31mred";
/// assert_eq!(extract_ansi_code(s, 0), Some("\x1b[31m"));
/// assert_eq!(extract_ansi_code(s, 5), None);
/// ```
#[must_use]
pub fn extract_ansi_code(s: &str, pos: usize) -> Option<&str> {
    let bytes = s.as_bytes();
    if bytes.get(pos) != Some(&ESC) {
        return None;
    }
    let end = match *bytes.get(pos + 1)? {
        b'[' => find_csi_end(bytes, pos + 2)?,
        b']' | b'_' => find_string_terminator(bytes, pos + 2)?,
        _ => return None,
    };
    s.get(pos..end)
}

/// Byte offset one past the CSI final byte, scanning from `from`.
fn find_csi_end(bytes: &[u8], from: usize) -> Option<usize> {
    bytes[from..]
        .iter()
        .position(|b| matches!(b, b'm' | b'G' | b'K' | b'H' | b'J'))
        .map(|i| from + i + 1)
}

/// Byte offset one past BEL or `ESC \`, scanning from `from`.
fn find_string_terminator(bytes: &[u8], from: usize) -> Option<usize> {
    let mut i = from;
    while i < bytes.len() {
        match bytes[i] {
            BEL => return Some(i + 1),
            ESC if bytes.get(i + 1) == Some(&b'\\') => return Some(i + 2),
            _ => i += 1,
        }
    }
    None
}

/// Whether `line` carries inline image data (Kitty graphics or iTerm2).
///
/// Image lines are opaque to the renderer: no segment reset is appended,
/// overlays never paint over them, and width checks are skipped.
#[must_use]
pub fn is_image_line(line: &str) -> bool {
    line.contains(KITTY_IMAGE) || line.contains(ITERM_IMAGE)
}

/// Whether `code` is an SGR sequence (`ESC [ … m`).
#[inline]
#[must_use]
pub fn is_sgr(code: &str) -> bool {
    code.starts_with("\x1b[") && code.ends_with('m')
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    // ── CSI ─────────────────────────────────────────────────────────────

    #[test]
    fn sgr_at_start() {
        let s = "\x1b[31mred text";
        let code = extract_ansi_code(s, 0).unwrap();
        assert_eq!(code, "\x1b[31m");
        assert_eq!(code.len(), 5);
    }

    #[test]
    fn csi_cursor_column() {
        assert_eq!(extract_ansi_code("\x1b[12Gx", 0), Some("\x1b[12G"));
    }

    #[test]
    fn csi_without_terminator() {
        assert_eq!(extract_ansi_code("\x1b[31", 0), None);
    }

    #[test]
    fn not_at_escape() {
        assert_eq!(extract_ansi_code("abc", 1), None);
        assert_eq!(extract_ansi_code("abc", 10), None);
    }

    #[test]
    fn lone_escape() {
        assert_eq!(extract_ansi_code("\x1b", 0), None);
        assert_eq!(extract_ansi_code("\x1bx", 0), None);
    }

    #[test]
    fn mid_string_offset() {
        let s = "ab\x1b[1mcd";
        assert_eq!(extract_ansi_code(s, 2), Some("\x1b[1m"));
    }

    // ── OSC / APC ───────────────────────────────────────────────────────

    #[test]
    fn hyperlink_bel_terminated() {
        let s = "\x1b]8;;https://x.example\x07click\x1b]8;;\x07";
        let code = extract_ansi_code(s, 0).unwrap();
        assert_eq!(code, "\x1b]8;;https://x.example\x07");
        assert_eq!(&s[code.len()..code.len() + 5], "click");
    }

    #[test]
    fn osc_st_terminated() {
        let s = "\x1b]0;title\x1b\\rest";
        assert_eq!(extract_ansi_code(s, 0), Some("\x1b]0;title\x1b\\"));
    }

    #[test]
    fn apc_cursor_marker() {
        let s = "ab\x1b_pi:c\x07cd";
        assert_eq!(extract_ansi_code(s, 2), Some("\x1b_pi:c\x07"));
    }

    #[test]
    fn unterminated_osc() {
        assert_eq!(extract_ansi_code("\x1b]0;t", 0), None);
    }

    // ── Images ──────────────────────────────────────────────────────────

    #[test]
    fn image_markers() {
        assert!(is_image_line("x\x1b_Gf=100;AAAA\x1b\\"));
        assert!(is_image_line("\x1b]1337;File=inline=1:AAAA\x07"));
        assert!(!is_image_line("\x1b[31mplain\x1b[0m"));
    }

    #[test]
    fn sgr_predicate() {
        assert!(is_sgr("\x1b[1;31m"));
        assert!(!is_sgr("\x1b[2K"));
        assert!(!is_sgr("\x1b]8;;\x07"));
    }
}
