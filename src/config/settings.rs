//! clipkeep - Daemon settings module
//!
//! Runtime settings with their defaults, overridable from the command line

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use once_cell::sync::Lazy;

use crate::clipboard::models::Target;

/// Targets polled every tick to detect that the selection changed.
/// TIMESTAMP is a cheap marker most owners provide; image/png covers
/// owners that only offer image formats.
pub static MONITOR_TARGETS: Lazy<Vec<Target>> =
    Lazy::new(|| vec![Target::Timestamp, Target::ImagePng]);

/// Capture formats preferred once a change is confirmed, richest first
pub static CAPTURE_TARGETS: Lazy<Vec<Target>> = Lazy::new(|| {
    vec![
        Target::GnomeCopiedFiles,
        Target::ImagePng,
        Target::Utf8String,
    ]
});

/// Daemon settings
#[derive(Debug, Clone)]
pub struct Settings {
    /// Path of the history database
    pub history_path: PathBuf,
    /// Path of the unix socket served to clients
    pub socket_path: PathBuf,
    /// Polling interval in milliseconds
    pub poll_interval_ms: u64,
    /// Ephemeral tier capacity
    pub max_ephemeral: usize,
    /// Important tier capacity
    pub max_important: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            history_path: default_history_path(),
            socket_path: default_socket_path(),
            poll_interval_ms: 1000,
            max_ephemeral: 200,
            max_important: 100,
        }
    }
}

impl Settings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// `~/.cache/clipkeep/history.db`, falling back to the working directory
pub fn default_history_path() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("clipkeep")
        .join("history.db")
}

/// `$TMPDIR/clipkeep/clipkeep.sock`
pub fn default_socket_path() -> PathBuf {
    env::temp_dir().join("clipkeep").join("clipkeep.sock")
}
