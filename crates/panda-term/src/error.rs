// SPDX-License-Identifier: MIT
//
// Error type for terminal control.

use std::io;

use thiserror::Error;

/// Failures raised while owning or driving the terminal.
#[derive(Debug, Error)]
pub enum TermError {
    /// `tcgetattr` / `tcsetattr` refused the raw-mode transition.
    #[error("failed to switch raw mode: {0}")]
    RawMode(#[source] io::Error),

    /// A background thread (stdin reader, input demux) could not start.
    #[error("failed to spawn {name} thread: {source}")]
    Spawn {
        name: &'static str,
        #[source]
        source: io::Error,
    },

    /// Writing to or flushing the terminal failed.
    #[error("terminal I/O failed: {0}")]
    Io(#[from] io::Error),
}
