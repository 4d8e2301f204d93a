// SPDX-License-Identifier: MIT
//
// Error type for the component runtime.

use std::io;
use std::path::PathBuf;

use panda_term::TermError;
use thiserror::Error;

/// Failures raised by the render pipeline and its collaborators.
#[derive(Debug, Error)]
pub enum TuiError {
    /// A painted line was wider than the terminal.
    ///
    /// Fatal: the frame cannot be painted without corrupting every row
    /// below it. The crash log at `crash_log` lists the whole frame.
    #[error(
        "rendered line {line} is {width} columns wide but the terminal is {terminal_width} \
         (frame dumped to {})",
        crash_log.display()
    )]
    WidthOverflow {
        line: usize,
        width: usize,
        terminal_width: usize,
        crash_log: PathBuf,
    },

    /// The crash log itself could not be written.
    #[error("failed to write crash log: {0}")]
    CrashLog(#[source] io::Error),

    /// The terminal refused to start or stop.
    #[error(transparent)]
    Terminal(#[from] TermError),

    /// Any other I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}
