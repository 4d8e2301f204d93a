// SPDX-License-Identifier: MIT
//
// panda-term: terminal engine for the panda line renderer.
//
// Everything below the component tree lives here: the byte-level ANSI
// vocabulary the renderer speaks, the column algebra that measures and cuts
// styled text without ever losing its SGR state, the input demultiplexer
// that turns a raw stdin byte stream into complete escape sequences, and
// the raw-mode terminal handle that owns the TTY.
//
// Lines are strings, not cell grids. A frame is an ordered list of styled
// lines, and every function in the text modules treats escape sequences as
// zero-width while tracking the visible column of everything else. One
// code point is one column; there is no wide-glyph awareness.

pub mod ansi;
pub mod error;
pub mod escape;
pub mod input;
pub mod keys;
pub mod output;
pub mod reader;
pub mod slice;
pub mod style;
pub mod terminal;
pub mod width;
pub mod wrap;

pub use error::TermError;
pub use escape::{extract_ansi_code, is_image_line};
pub use input::{InputBuffer, InputChunk, SequenceStatus, is_complete_sequence};
pub use keys::{KittyKey, is_key_release, is_key_repeat, matches_key, parse_key, parse_kitty_sequence};
pub use slice::{Segments, extract_segments, slice_by_column, slice_with_width};
pub use style::{AnsiStyleTracker, update_tracker_from_text};
pub use terminal::{InputHandler, MemoryTerminal, ProcessTerminal, ResizeHandler, Size, Terminal};
pub use width::{WidthCache, visible_width};
pub use wrap::{apply_background_to_line, truncate_to_width, wrap_text_with_ansi};
