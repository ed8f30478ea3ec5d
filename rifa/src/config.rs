use std::{path::PathBuf, str::FromStr, time::Duration};

use core_types::config::{AdminSettings, AppConfig};
use expiry_engine::ExpiryEngineConfig;
use raffle_ledger::LedgerConfig;
use thiserror::Error;

const PROD_STATE_DIR: &str = "rifa.state";

/// Deployment target for the binary.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Environment {
    Dev,
    Prod,
}

impl FromStr for Environment {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "dev" => Ok(Environment::Dev),
            "prod" => Ok(Environment::Prod),
            other => Err(ConfigError::UnknownEnvironment {
                value: other.to_string(),
            }),
        }
    }
}

/// Settings resolved for one run of the binary.
#[derive(Clone, Debug)]
pub struct RuntimeConfig {
    pub env: Environment,
    pub ledger: LedgerConfig,
    pub sweeper: ExpiryEngineConfig,
    pub admin: AdminSettings,
    pub status_interval: Duration,
    /// Dev runs start with a demo raffle when none is active.
    pub seed_demo_raffle: bool,
}

impl RuntimeConfig {
    pub fn load(env: Environment) -> Result<Self, ConfigError> {
        let app = AppConfig::load()?;
        Ok(Self::resolve(env, app))
    }

    fn resolve(env: Environment, app: AppConfig) -> Self {
        // dev stays in memory unless a state dir is configured explicitly
        let state_dir = match (env, app.ledger.state_dir) {
            (_, Some(dir)) => Some(dir),
            (Environment::Dev, None) => None,
            (Environment::Prod, None) => Some(PathBuf::from(PROD_STATE_DIR)),
        };
        let ledger = LedgerConfig {
            state_dir,
            hold_duration: Duration::from_secs(app.ledger.hold_duration_secs),
        };
        Self {
            env,
            ledger,
            sweeper: ExpiryEngineConfig {
                label: format!("{}-{}", env_label(env), app.sweeper.label),
                interval: Duration::from_millis(app.sweeper.interval_ms),
            },
            admin: app.admin,
            status_interval: Duration::from_secs(app.status.log_interval_secs.max(1)),
            seed_demo_raffle: env == Environment::Dev,
        }
    }

    pub fn env_label(&self) -> &'static str {
        env_label(self.env)
    }
}

fn env_label(env: Environment) -> &'static str {
    match env {
        Environment::Dev => "dev",
        Environment::Prod => "prod",
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unknown environment '{value}' (expected 'dev' or 'prod')")]
    UnknownEnvironment { value: String },
    #[error("invalid configuration: {0}")]
    Settings(#[from] ::config::ConfigError),
}
