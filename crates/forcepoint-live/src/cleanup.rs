//! Remove-on-exit guard for the sensor log

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::config::LiveConfig;

/// Deletes a file when dropped
///
/// Held by the runner for the lifetime of the loop, so the log is removed on
/// every orderly exit path, including early returns with an error.
#[derive(Debug)]
pub struct RemoveOnDrop {
    path: Option<PathBuf>,
}

impl RemoveOnDrop {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }

    /// Guard for the configured log, if removal on exit is enabled
    ///
    /// Take it before anything else can fail during start-up.
    pub fn for_config(config: &LiveConfig) -> Option<Self> {
        match &config.log_path {
            Some(path) if config.cleanup_on_exit => Some(Self::new(path)),
            _ => None,
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Keep the file after all
    pub fn disarm(&mut self) -> Option<PathBuf> {
        self.path.take()
    }
}

impl Drop for RemoveOnDrop {
    fn drop(&mut self) {
        let Some(path) = self.path.take() else {
            return;
        };
        match fs::remove_file(&path) {
            Ok(()) => log::info!("removed sensor log {}", path.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => log::warn!("failed to remove {}: {e}", path.display()),
        }
    }
}
