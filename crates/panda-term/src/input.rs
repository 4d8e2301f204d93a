// SPDX-License-Identifier: MIT
//
// Input demultiplexer.
//
// Stdin delivers bytes in whatever chunks the kernel felt like handing
// over. An arrow key can arrive as `ESC` in one read and `[A` in the next;
// a paste can arrive as forty reads. This module reassembles that stream
// into the units components actually want:
//
// - one complete escape sequence (CSI, OSC, DCS, APC, SS3, meta-key), or
// - one plain character, or
// - one bracketed paste, delivered whole and never escape-scanned.
//
// Unlike a full key parser, nothing here decides what a sequence *means*.
// Components receive the raw sequence string and match it themselves with
// `keys::matches_key`. The only job is finding boundaries.
//
// # Escape ambiguity
//
// A lone `ESC` is either the Escape key or the start of a sequence whose
// tail hasn't arrived. `InputBuffer` keeps it (and any other incomplete
// prefix) pending. The owner calls [`InputBuffer::flush`] after a quiet
// tick to release whatever is still waiting, as-is.

/// Bracketed paste opening delimiter.
pub const PASTE_START: &str = "\x1b[200~";
/// Bracketed paste closing delimiter.
pub const PASTE_END: &str = "\x1b[201~";

const ESC: u8 = 0x1b;
const BEL: u8 = 0x07;

// ─── Classification ──────────────────────────────────────────────────────────

/// How much of an escape sequence a buffer holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceStatus {
    /// The buffer doesn't start with ESC.
    NotEscape,
    /// Starts with ESC, but the terminator hasn't arrived yet.
    Incomplete,
    /// Exactly one complete sequence (or an unrecognised ESC form).
    Complete,
}

/// Classify `data` as a (possibly partial) escape sequence.
///
/// ```
/// use panda_term::input::{SequenceStatus, is_complete_sequence};
///
/// assert_eq!(is_complete_sequence("hello"), SequenceStatus::NotEscape);
/// assert_eq!(is_complete_sequence("\x1b["), SequenceStatus::Incomplete);
/// assert_eq!(is_complete_sequence("\x1b[A"), SequenceStatus::Complete);
/// ```
#[must_use]
pub fn is_complete_sequence(data: &str) -> SequenceStatus {
    let b = data.as_bytes();
    if b.first() != Some(&ESC) {
        return SequenceStatus::NotEscape;
    }
    if b.len() == 1 {
        return SequenceStatus::Incomplete;
    }
    match b[1] {
        b'[' if b.get(2) == Some(&b'M') => complete_if(b.len() >= 6),
        b'[' => csi_status(b),
        b']' => complete_if(ends_with_st(b) || b.last() == Some(&BEL)),
        b'P' | b'_' => complete_if(ends_with_st(b)),
        b'O' => complete_if(b.len() >= 3),
        // Meta-key (`ESC x`) or something we don't know: deliver as-is.
        _ => SequenceStatus::Complete,
    }
}

#[inline]
const fn complete_if(done: bool) -> SequenceStatus {
    if done {
        SequenceStatus::Complete
    } else {
        SequenceStatus::Incomplete
    }
}

/// `ESC \` string terminator at the end, past the introducer.
fn ends_with_st(b: &[u8]) -> bool {
    b.len() >= 4 && b.ends_with(b"\x1b\\")
}

fn csi_status(b: &[u8]) -> SequenceStatus {
    if b.len() < 3 {
        return SequenceStatus::Incomplete;
    }
    let payload = &b[2..];
    let last = payload[payload.len() - 1];
    if !(0x40..=0x7e).contains(&last) {
        return SequenceStatus::Incomplete;
    }
    if payload[0] != b'<' {
        return SequenceStatus::Complete;
    }
    // SGR mouse: `<B;X;Y` then M or m. A final byte in the middle of the
    // groups (a stray `;`-less letter) is not a terminator yet.
    if !matches!(last, b'M' | b'm') {
        return SequenceStatus::Incomplete;
    }
    let groups = &payload[1..payload.len() - 1];
    let valid = groups
        .split(|&c| c == b';')
        .filter(|g| !g.is_empty() && g.iter().all(u8::is_ascii_digit))
        .count()
        == 3
        && groups.iter().filter(|&&c| c == b';').count() == 2;
    complete_if(valid)
}

// ─── Splitting ───────────────────────────────────────────────────────────────

/// Split `buffer` into complete units, returning the unfinished tail.
///
/// Each escape sequence is grown one character at a time until it stops
/// being incomplete. Non-escape text is split per character.
fn extract_complete_sequences(buffer: &str) -> (Vec<String>, &str) {
    let mut out = Vec::new();
    let mut pos = 0;

    while pos < buffer.len() {
        let remaining = &buffer[pos..];
        if remaining.as_bytes()[0] == ESC {
            let end = remaining
                .char_indices()
                .map(|(i, c)| i + c.len_utf8())
                .find(|&end| is_complete_sequence(&remaining[..end]) != SequenceStatus::Incomplete);
            let Some(end) = end else {
                return (out, remaining);
            };
            out.push(remaining[..end].to_owned());
            pos += end;
        } else {
            let Some(ch) = remaining.chars().next() else { break };
            out.push(ch.to_string());
            pos += ch.len_utf8();
        }
    }
    (out, "")
}

// ─── Input Buffer ────────────────────────────────────────────────────────────

/// One delivered unit of input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputChunk {
    /// A complete escape sequence or a single character.
    Sequence(String),
    /// Text between the bracketed-paste delimiters, delimiters removed.
    Paste(String),
}

impl InputChunk {
    /// The string a component receives for this chunk.
    ///
    /// Pastes are re-wrapped in their delimiters so a component can tell
    /// pasted text from typed text.
    #[must_use]
    pub fn into_data(self) -> String {
        match self {
            Self::Sequence(s) => s,
            Self::Paste(p) => format!("{PASTE_START}{p}{PASTE_END}"),
        }
    }
}

/// Rolling reassembly buffer for raw stdin bytes.
#[derive(Debug, Default)]
pub struct InputBuffer {
    /// Decoded text not yet split into units.
    buf: String,
    /// Trailing bytes of a UTF-8 character cut by a read boundary.
    partial_utf8: Vec<u8>,
    /// Inside `PASTE_START … PASTE_END`.
    in_paste: bool,
    paste: String,
}

impl InputBuffer {
    /// An empty buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw bytes and collect every unit that is now complete.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<InputChunk> {
        let text = self.decode(bytes);
        let mut out = Vec::new();
        self.process(&text, &mut out);
        out
    }

    /// Feed already-decoded text.
    pub fn push_str(&mut self, text: &str) -> Vec<InputChunk> {
        let mut out = Vec::new();
        self.process(text, &mut out);
        out
    }

    /// Release anything still pending as a single sequence.
    ///
    /// A lone ESC becomes the Escape key. An unfinished paste is left alone:
    /// the closing delimiter is still expected.
    pub fn flush(&mut self) -> Vec<InputChunk> {
        if self.buf.is_empty() {
            return Vec::new();
        }
        vec![InputChunk::Sequence(std::mem::take(&mut self.buf))]
    }

    /// Whether an incomplete sequence or paste is waiting for more bytes.
    #[must_use]
    pub fn has_pending(&self) -> bool {
        !self.buf.is_empty() || self.in_paste || !self.partial_utf8.is_empty()
    }

    /// Drop everything buffered.
    pub fn clear(&mut self) {
        self.buf.clear();
        self.partial_utf8.clear();
        self.paste.clear();
        self.in_paste = false;
    }

    /// Decode bytes, carrying an incomplete trailing character forward.
    fn decode(&mut self, bytes: &[u8]) -> String {
        let mut data = std::mem::take(&mut self.partial_utf8);
        data.extend_from_slice(bytes);
        let mut out = String::with_capacity(data.len());
        let mut rest = data.as_slice();

        loop {
            match std::str::from_utf8(rest) {
                Ok(s) => {
                    out.push_str(s);
                    break;
                }
                Err(e) => {
                    let (valid, tail) = rest.split_at(e.valid_up_to());
                    out.push_str(&String::from_utf8_lossy(valid));
                    match e.error_len() {
                        None => {
                            self.partial_utf8 = tail.to_vec();
                            break;
                        }
                        Some(n) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            rest = &tail[n..];
                        }
                    }
                }
            }
        }
        out
    }

    fn process(&mut self, text: &str, out: &mut Vec<InputChunk>) {
        if self.in_paste {
            self.paste.push_str(text);
            self.finish_paste(out);
            return;
        }

        self.buf.push_str(text);

        if let Some(start) = self.buf.find(PASTE_START) {
            let before = self.buf[..start].to_owned();
            let after = self.buf[start + PASTE_START.len()..].to_owned();
            self.buf.clear();
            if !before.is_empty() {
                let (seqs, rest) = extract_complete_sequences(&before);
                out.extend(seqs.into_iter().map(InputChunk::Sequence));
                if !rest.is_empty() {
                    out.push(InputChunk::Sequence(rest.to_owned()));
                }
            }
            tracing::trace!(target: "input.demux", "paste_start");
            self.in_paste = true;
            self.paste = after;
            self.finish_paste(out);
            return;
        }

        let (seqs, rest) = extract_complete_sequences(&self.buf);
        let rest = rest.to_owned();
        out.extend(seqs.into_iter().map(InputChunk::Sequence));
        self.buf = rest;
    }

    /// Emit the paste if its closing delimiter has arrived, then continue
    /// with whatever followed it.
    fn finish_paste(&mut self, out: &mut Vec<InputChunk>) {
        let Some(end) = self.paste.find(PASTE_END) else {
            return;
        };
        let content = self.paste[..end].to_owned();
        let remaining = self.paste[end + PASTE_END.len()..].to_owned();
        self.paste.clear();
        self.in_paste = false;
        tracing::trace!(target: "input.demux", len = content.len(), "paste_end");
        out.push(InputChunk::Paste(content));
        if !remaining.is_empty() {
            self.process(&remaining, out);
        }
    }
}

// ─── Terminal Responses ──────────────────────────────────────────────────────

/// Parse a Kitty keyboard flags report, `ESC [ ? flags u`.
#[must_use]
pub fn parse_kitty_flags_response(seq: &str) -> Option<u16> {
    let digits = seq.strip_prefix("\x1b[?")?.strip_suffix('u')?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// A cell-size report located inside a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellSizeResponse {
    /// Byte range of the report within the searched buffer.
    pub start: usize,
    pub end: usize,
    pub height_px: u32,
    pub width_px: u32,
}

/// Find the first `ESC [ 6 ; H ; W t` report in `buffer`.
#[must_use]
pub fn find_cell_size_response(buffer: &str) -> Option<CellSizeResponse> {
    let bytes = buffer.as_bytes();
    let mut i = 0;
    while i + 4 < bytes.len() {
        if bytes[i..].starts_with(b"\x1b[6;") {
            if let Some(found) = cell_size_at(bytes, i) {
                return Some(found);
            }
        }
        i += 1;
    }
    None
}

fn cell_size_at(bytes: &[u8], start: usize) -> Option<CellSizeResponse> {
    let (height, j) = parse_u32_at(bytes, start + 4);
    if bytes.get(j) != Some(&b';') {
        return None;
    }
    let (width, k) = parse_u32_at(bytes, j + 1);
    if bytes.get(k) != Some(&b't') {
        return None;
    }
    Some(CellSizeResponse {
        start,
        end: k + 1,
        height_px: height?,
        width_px: width?,
    })
}

/// Whether `buffer` ends in what may still become a cell-size report.
#[must_use]
pub fn is_partial_cell_size(buffer: &str) -> bool {
    let Some(start) = buffer.rfind("\x1b[6") else {
        return false;
    };
    buffer[start + 1..]
        .bytes()
        .all(|b| b == b'[' || b == b';' || b.is_ascii_digit())
}

/// Parse decimal digits from `start`. Returns `None` when there are none.
fn parse_u32_at(buf: &[u8], start: usize) -> (Option<u32>, usize) {
    let mut val: u32 = 0;
    let mut pos = start;
    while pos < buf.len() && buf[pos].is_ascii_digit() {
        val = val
            .saturating_mul(10)
            .saturating_add(u32::from(buf[pos] - b'0'));
        pos += 1;
    }
    ((pos > start).then_some(val), pos)
}

// ─── Tests ───────────────────────────────────────────────────────────────────
