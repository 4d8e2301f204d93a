// SPDX-License-Identifier: MIT
//
// panda-tui: a component runtime over a differential line renderer.
//
// Components render themselves to lines of styled text at a given width.
// The runtime stacks them in a root container, paints overlays on top,
// and sends the terminal only the rows that changed since the last frame.
// Frames live in the terminal's normal buffer and scroll with the shell,
// so the renderer never addresses the screen absolutely.
//
//   input bytes → panda-term demux → focused component → request_render
//   render → composite overlays → cursor marker → diff → one write
//
// Terminal plumbing (ANSI vocabulary, column algebra, input parsing, raw
// mode) lives in `panda-term`, re-exported here as `term`.

pub mod component;
pub mod config;
pub mod crash;
pub mod cursor;
pub mod error;
pub mod focus;
pub mod layout;
pub mod logging;
pub mod overlay;
pub mod render;
pub mod scheduler;
pub mod tui;

pub use panda_term as term;

pub use component::{Component, ComponentRef, Container, Focusable, component, same_component};
pub use config::TuiConfig;
pub use cursor::CursorPos;
pub use error::TuiError;
pub use focus::FocusManager;
pub use layout::{Anchor, Margin, OverlayLayout, OverlayOptions, SizeValue, resolve_overlay_layout};
pub use overlay::{OverlayHandle, OverlayId, OverlayManager, composite_line_at};
pub use render::{DiffRenderer, FrameParams, LineOverflow, Paint, RenderError, RenderState};
pub use scheduler::{RenderHandle, RenderScheduler};
pub use tui::{CellSize, StopHandle, Tui};
