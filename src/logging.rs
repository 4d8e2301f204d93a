// SPDX-License-Identifier: MIT
//
// File logging.
//
// Stdout belongs to the renderer, so diagnostics go to a file. Targets in
// use across the workspace:
//
//   render.pipeline  frame lifecycle, strategy choice
//   render.diff      changed ranges, full-redraw reasons
//   render.overlay   overlay stack and compositing
//   input.demux      sequence reassembly, pastes
//   input.keys       dispatch, key-release filtering, focus routing
//   terminal         raw mode, Kitty negotiation, resize
//   scheduler        render requests and coalescing
//
// Filtering follows `RUST_LOG`, e.g. `RUST_LOG=render.diff=debug`.

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;

/// Log file name inside the directory passed to [`init_file_logging`].
pub const LOG_FILE_NAME: &str = "panda.log";

/// Install a global subscriber writing to `<dir>/panda.log`.
///
/// Any previous log file is replaced. Keep the returned guard alive for as
/// long as logging should work; dropping it flushes the writer. Returns
/// `None` when a global subscriber is already installed.
pub fn init_file_logging(dir: &Path) -> Option<WorkerGuard> {
    let log_path = dir.join(LOG_FILE_NAME);
    if log_path.exists() {
        let _ = std::fs::remove_file(&log_path);
    }

    let file_appender = tracing_appender::rolling::never(dir, LOG_FILE_NAME);
    let (writer, guard) = tracing_appender::non_blocking(file_appender);
    match tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(writer)
        .with_ansi(false)
        .try_init()
    {
        Ok(()) => Some(guard),
        // Already installed; dropping the guard shuts our writer down.
        Err(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_init_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let first = init_file_logging(dir.path());
        let second = init_file_logging(dir.path());
        assert!(second.is_none());
        drop(first);
    }
}
