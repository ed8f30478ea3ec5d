use std::path::{Path, PathBuf};

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

pub const CONFIG_FILE: &str = "rifa.toml";
pub const ENV_PREFIX: &str = "RIFA";

/// Runtime knobs layered from `rifa.toml` and `RIFA_*` environment variables.
///
/// Nested keys use a double underscore in the environment, e.g.
/// `RIFA_LEDGER__HOLD_DURATION_SECS=300`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub ledger: LedgerSettings,
    #[serde(default)]
    pub sweeper: SweeperSettings,
    #[serde(default)]
    pub admin: AdminSettings,
    #[serde(default)]
    pub status: StatusSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerSettings {
    /// Unset keeps reservations in memory only.
    #[serde(default)]
    pub state_dir: Option<PathBuf>,
    #[serde(default = "default_hold_duration_secs")]
    pub hold_duration_secs: u64,
}

impl Default for LedgerSettings {
    fn default() -> Self {
        Self {
            state_dir: None,
            hold_duration_secs: default_hold_duration_secs(),
        }
    }
}

fn default_hold_duration_secs() -> u64 {
    600
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweeperSettings {
    #[serde(default = "default_sweep_interval_ms")]
    pub interval_ms: u64,
    #[serde(default = "default_sweeper_label")]
    pub label: String,
}

impl Default for SweeperSettings {
    fn default() -> Self {
        Self {
            interval_ms: default_sweep_interval_ms(),
            label: default_sweeper_label(),
        }
    }
}

fn default_sweep_interval_ms() -> u64 {
    5_000
}

fn default_sweeper_label() -> String {
    "expiry".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminSettings {
    #[serde(default = "default_admin_username")]
    pub username: String,
    #[serde(default = "default_admin_password")]
    pub password: String,
    #[serde(default)]
    pub recovery_email: Option<String>,
}

impl Default for AdminSettings {
    fn default() -> Self {
        Self {
            username: default_admin_username(),
            password: default_admin_password(),
            recovery_email: None,
        }
    }
}

fn default_admin_username() -> String {
    "admin".to_string()
}

fn default_admin_password() -> String {
    "admin123".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusSettings {
    #[serde(default = "default_log_interval_secs")]
    pub log_interval_secs: u64,
}

impl Default for StatusSettings {
    fn default() -> Self {
        Self {
            log_interval_secs: default_log_interval_secs(),
        }
    }
}

fn default_log_interval_secs() -> u64 {
    30
}

impl AppConfig {
    /// Loads `rifa.toml` from the working directory if present, then the environment.
    pub fn load() -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::from(Path::new(CONFIG_FILE)).required(false))
            .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()?;
        Self::finish(settings)
    }

    /// Loads a single required file, ignoring the environment.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::from(path.as_ref()).required(true))
            .build()?;
        Self::finish(settings)
    }

    fn finish(settings: Config) -> Result<Self, ConfigError> {
        let config: Self = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ledger.hold_duration_secs == 0 {
            return Err(ConfigError::Message(
                "ledger.hold_duration_secs must be positive".to_string(),
            ));
        }
        if self.sweeper.interval_ms == 0 {
            return Err(ConfigError::Message(
                "sweeper.interval_ms must be positive".to_string(),
            ));
        }
        if self.admin.username.trim().is_empty() || self.admin.password.is_empty() {
            return Err(ConfigError::Message(
                "admin.username and admin.password are required".to_string(),
            ));
        }
        Ok(())
    }
}
