// SPDX-License-Identifier: MIT
//
// Runtime configuration.
//
// The defaults suit an inline prompt-style UI: an 8 ms tick (the render
// loop's wake-up period and the quiet time after which a lone ESC is
// delivered as the Escape key), the hardware cursor hidden, and shrinking
// frames patched in place rather than redrawn.

use std::path::PathBuf;
use std::time::Duration;

/// Environment variable enabling the hardware cursor (`1` / `true`).
pub const ENV_HARDWARE_CURSOR: &str = "PANDA_HARDWARE_CURSOR";

/// Environment variable enabling full redraws on shrink (`1` / `true`).
pub const ENV_CLEAR_ON_SHRINK: &str = "PANDA_CLEAR_ON_SHRINK";

/// Environment variable overriding the tick in milliseconds.
pub const ENV_TICK_MS: &str = "PANDA_TICK_MS";

/// Configuration for a [`Tui`](crate::Tui).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TuiConfig {
    /// Event-loop wake-up period. Default: 8 ms.
    pub tick_interval: Duration,

    /// Show the terminal's own cursor at the cursor marker.
    pub show_hardware_cursor: bool,

    /// Redraw everything when the frame gets shorter than the tallest frame
    /// painted so far (overlays suppress this).
    pub clear_on_shrink: bool,

    /// Where the width-overflow crash log goes. `None` means
    /// `$HOME/.panda/panda-crash.log`.
    pub crash_log_path: Option<PathBuf>,
}

impl Default for TuiConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(8),
            show_hardware_cursor: false,
            clear_on_shrink: false,
            crash_log_path: None,
        }
    }
}

impl TuiConfig {
    /// Defaults with `PANDA_*` environment overrides applied.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Defaults with overrides taken from `lookup`.
    ///
    /// Unparseable or zero tick values are ignored.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        let flag = |name: &str| {
            lookup(name).is_some_and(|v| matches!(v.trim(), "1" | "true" | "yes" | "on"))
        };

        config.show_hardware_cursor = flag(ENV_HARDWARE_CURSOR);
        config.clear_on_shrink = flag(ENV_CLEAR_ON_SHRINK);

        if let Some(ms) = lookup(ENV_TICK_MS).and_then(|v| v.trim().parse::<u64>().ok()) {
            if ms > 0 {
                config.tick_interval = Duration::from_millis(ms);
            }
        }
        config
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn defaults() {
        let config = TuiConfig::default();
        assert_eq!(config.tick_interval, Duration::from_millis(8));
        assert!(!config.show_hardware_cursor);
        assert!(!config.clear_on_shrink);
        assert!(config.crash_log_path.is_none());
    }

    #[test]
    fn empty_environment_is_default() {
        assert_eq!(TuiConfig::from_lookup(lookup(&[])), TuiConfig::default());
    }

    #[test]
    fn flags_from_environment() {
        let config = TuiConfig::from_lookup(lookup(&[
            (ENV_HARDWARE_CURSOR, "1"),
            (ENV_CLEAR_ON_SHRINK, "true"),
            (ENV_TICK_MS, "16"),
        ]));
        assert!(config.show_hardware_cursor);
        assert!(config.clear_on_shrink);
        assert_eq!(config.tick_interval, Duration::from_millis(16));
    }

    #[test]
    fn falsy_and_garbage_values() {
        let config = TuiConfig::from_lookup(lookup(&[
            (ENV_HARDWARE_CURSOR, "0"),
            (ENV_CLEAR_ON_SHRINK, ""),
            (ENV_TICK_MS, "fast"),
        ]));
        assert_eq!(config, TuiConfig::default());
    }

    #[test]
    fn zero_tick_ignored() {
        let config = TuiConfig::from_lookup(lookup(&[(ENV_TICK_MS, "0")]));
        assert_eq!(config.tick_interval, Duration::from_millis(8));
    }
}
