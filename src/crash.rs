// SPDX-License-Identifier: MIT
//
// Width-overflow crash log.
//
// A line wider than the terminal wraps, pushes every later row down one,
// and leaves the renderer's idea of the screen permanently wrong. There is
// no recovering from that mid-session, so the pipeline dumps the offending
// frame here before giving up. The file is meant for a human: one header,
// then every line with its measured width.

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use panda_term::visible_width;

/// Crash log file name.
pub const CRASH_LOG_NAME: &str = "panda-crash.log";

/// `$HOME/.panda/panda-crash.log`, or the temp directory when there is no
/// home.
#[must_use]
pub fn default_crash_log_path() -> PathBuf {
    dirs::home_dir().map_or_else(
        || std::env::temp_dir().join(CRASH_LOG_NAME),
        |home| home.join(".panda").join(CRASH_LOG_NAME),
    )
}

/// What went wrong, and the frame it went wrong in.
#[derive(Debug, Clone, Copy)]
pub struct CrashReport<'a> {
    /// Index of the first line that did not fit.
    pub line: usize,
    /// Its measured visible width.
    pub width: usize,
    pub terminal_width: usize,
    pub lines: &'a [String],
}

impl CrashReport<'_> {
    /// The log text.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Crash at {}", Utc::now().to_rfc3339());
        let _ = writeln!(out, "Terminal width: {}", self.terminal_width);
        let _ = writeln!(
            out,
            "Line {} visible width: {}",
            self.line, self.width
        );
        let _ = writeln!(out);
        let _ = writeln!(out, "=== All rendered lines ===");
        for (i, line) in self.lines.iter().enumerate() {
            let _ = writeln!(out, "[{i}] (w={}) {line}", visible_width(line));
        }
        out
    }

    /// Write the log to `path`, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or file cannot be written.
    pub fn write_to(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.render())
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
