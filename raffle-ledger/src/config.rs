use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::error::Result;

pub const DEFAULT_HOLD_DURATION_SECS: u64 = 600;
pub const DEFAULT_STATE_FILE: &str = "reservations.json";

#[derive(Clone, Debug)]
pub struct LedgerConfig {
    /// `None` keeps every record in memory.
    pub state_dir: Option<PathBuf>,
    pub hold_duration: Duration,
}

impl LedgerConfig {
    pub fn in_memory() -> Self {
        Self {
            state_dir: None,
            hold_duration: Duration::from_secs(DEFAULT_HOLD_DURATION_SECS),
        }
    }

    pub fn persistent(state_dir: PathBuf) -> Self {
        Self {
            state_dir: Some(state_dir),
            ..Self::in_memory()
        }
    }

    pub fn with_hold_duration(mut self, hold_duration: Duration) -> Self {
        self.hold_duration = hold_duration;
        self
    }

    pub fn state_dir(&self) -> Option<&Path> {
        self.state_dir.as_deref()
    }

    pub fn store_path(&self) -> Option<PathBuf> {
        self.state_dir
            .as_ref()
            .map(|dir| dir.join(DEFAULT_STATE_FILE))
    }

    /// Hold window as a chrono duration for deadline arithmetic.
    pub fn hold_window(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.hold_duration)
            .unwrap_or_else(|_| chrono::Duration::seconds(DEFAULT_HOLD_DURATION_SECS as i64))
    }

    pub fn ensure_dirs(&self) -> Result<()> {
        if let Some(dir) = &self.state_dir {
            if !dir.exists() {
                fs::create_dir_all(dir).map_err(crate::error::StoreError::from)?;
            }
        }
        Ok(())
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self::in_memory()
    }
}
