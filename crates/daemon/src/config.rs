//! Daemon configuration
//!
//! Layered with the `config` crate: built-in defaults, then the optional
//! file named by `PROVISIO_CONFIG`, then `PROVISIO_*` environment variables
//! (nested keys use `__`, e.g. `PROVISIO_RPC__PORT=9700`).

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use provisio_api_rpc::RpcServerConfig;
use provisio_core::application::controller::constants::{
    DEFAULT_NOTIFY_TIMEOUT, DEFAULT_SHUTDOWN_GRACE,
};
use provisio_core::application::attempt_executor::DEFAULT_ATTEMPT_TIMEOUT;
use provisio_core::application::{BackoffPolicy, ControllerConfig, ProgressPolicy};
use provisio_core::domain::{RegionInfo, ShapeBounds};
use serde::Deserialize;
use std::time::Duration;

pub const DEFAULT_DB_PATH: &str = "~/.provisio/jobs.db";
pub const CONFIG_PATH_ENV: &str = "PROVISIO_CONFIG";
const ENV_PREFIX: &str = "PROVISIO";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// SQLite database file; `~` is expanded
    pub db_path: String,
    pub rpc: RpcServerConfig,
    pub backend: BackendConfig,
    pub backoff: BackoffPolicy,
    pub attempt_timeout_secs: u64,
    pub notify_timeout_secs: u64,
    pub shutdown_grace_secs: u64,
    pub notifiers: NotifierConfig,
    /// Non-terminal notices; off unless `progress.enabled`
    pub progress: ProgressPolicy,
    pub bounds: ShapeBounds,
    /// Added to, or replacing, the built-in region figures
    pub regions: Vec<RegionInfo>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            db_path: DEFAULT_DB_PATH.to_string(),
            rpc: RpcServerConfig::default(),
            backend: BackendConfig::default(),
            backoff: BackoffPolicy::default(),
            attempt_timeout_secs: DEFAULT_ATTEMPT_TIMEOUT.as_secs(),
            notify_timeout_secs: DEFAULT_NOTIFY_TIMEOUT.as_secs(),
            shutdown_grace_secs: DEFAULT_SHUTDOWN_GRACE.as_secs(),
            notifiers: NotifierConfig::default(),
            progress: ProgressPolicy::default(),
            bounds: ShapeBounds::default(),
            regions: Vec::new(),
        }
    }
}

/// Which provisioning backend the daemon drives
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BackendConfig {
    Simulated {
        #[serde(default)]
        seed: Option<u64>,
        #[serde(default = "default_success_scale")]
        success_scale: f64,
        #[serde(default)]
        latency_ms: u64,
    },
    Subprocess {
        program: String,
        #[serde(default)]
        args: Vec<String>,
        #[serde(default = "default_launcher_timeout_secs")]
        timeout_secs: u64,
    },
}

fn default_success_scale() -> f64 {
    0.05
}

fn default_launcher_timeout_secs() -> u64 {
    DEFAULT_ATTEMPT_TIMEOUT.as_secs()
}

impl Default for BackendConfig {
    fn default() -> Self {
        BackendConfig::Simulated {
            seed: None,
            success_scale: default_success_scale(),
            latency_ms: 0,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NotifierConfig {
    pub webhook_url: Option<String>,
    pub telegram: Option<TelegramConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub chat_id: String,
}

impl EngineConfig {
    /// Load from `PROVISIO_CONFIG` (if set) and the environment
    pub fn load() -> Result<Self> {
        let file = std::env::var(CONFIG_PATH_ENV).ok();
        Self::from_sources(file.as_deref(), Some(Environment::with_prefix(ENV_PREFIX)))
    }

    pub fn from_sources(file: Option<&str>, env: Option<Environment>) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = file {
            let path = shellexpand::tilde(path).into_owned();
            builder = builder.add_source(File::with_name(&path));
        }
        if let Some(env) = env {
            builder = builder.add_source(env.separator("__").try_parsing(true));
        }

        let config: EngineConfig = builder
            .build()
            .context("failed to read configuration")?
            .try_deserialize()
            .context("invalid configuration")?;
        Ok(config)
    }

    pub fn db_path(&self) -> String {
        shellexpand::tilde(&self.db_path).into_owned()
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }

    pub fn controller_config(&self) -> ControllerConfig {
        ControllerConfig {
            backoff: self.backoff.clone(),
            attempt_timeout: Duration::from_secs(self.attempt_timeout_secs),
            notify_timeout: Duration::from_secs(self.notify_timeout_secs),
            bounds: self.bounds,
            progress: self.progress.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::FileFormat;
    use std::collections::HashMap;

    fn from_toml(toml: &str) -> EngineConfig {
        Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = EngineConfig::from_sources(None, None).unwrap();
        assert_eq!(config.rpc.host, "127.0.0.1");
        assert_eq!(config.rpc.port, 9627);
        assert!(config.db_path().ends_with(".provisio/jobs.db"));
        assert!(!config.db_path().starts_with('~'));
        assert!(matches!(config.backend, BackendConfig::Simulated { .. }));
        assert_eq!(config.controller_config().backoff, BackoffPolicy::default());
        assert_eq!(config.shutdown_grace(), DEFAULT_SHUTDOWN_GRACE);
        assert!(!config.controller_config().progress.enabled);
    }

    #[test]
    fn test_file_values() {
        let config = from_toml(
            r#"
            db_path = "/var/lib/provisio/jobs.db"
            attempt_timeout_secs = 60

            [rpc]
            host = "127.0.0.1"
            port = 9700

            [backend]
            kind = "subprocess"
            program = "/usr/local/bin/launch-vm"
            args = ["--profile", "free"]

            [backoff]
            base = 1000
            factor = 2.0
            max = 8000

            [progress]
            enabled = true
            every = 25

            [notifiers.telegram]
            bot_token = "123:abc"
            chat_id = "42"

            [[regions]]
            id = "eu-frankfurt-1"
            name = "Germany Central (Frankfurt)"
            success_rate = 0.5
            latency_ms = [20, 40]
            estimated_time = "2-3 weeks"
            "#,
        );

        assert_eq!(config.db_path(), "/var/lib/provisio/jobs.db");
        assert_eq!(config.rpc.port, 9700);
        assert_eq!(
            config.backend,
            BackendConfig::Subprocess {
                program: "/usr/local/bin/launch-vm".into(),
                args: vec!["--profile".into(), "free".into()],
                timeout_secs: DEFAULT_ATTEMPT_TIMEOUT.as_secs(),
            }
        );
        let controller = config.controller_config();
        assert_eq!(controller.attempt_timeout, Duration::from_secs(60));
        assert_eq!(controller.backoff.base, Duration::from_secs(1));
        assert!(controller.progress.reports_attempt(50));
        assert!(!controller.progress.reports_attempt(10));
        assert_eq!(controller.progress.long_wait, Duration::from_secs(60));
        assert_eq!(config.notifiers.telegram.unwrap().chat_id, "42");
        assert_eq!(config.regions[0].latency_ms, (20, 40));
    }

    #[test]
    fn test_environment_overrides() {
        let env: HashMap<String, String> = [
            ("PROVISIO_RPC__PORT", "9800"),
            ("PROVISIO_NOTIFIERS__WEBHOOK_URL", "http://localhost:8080/hook"),
            ("PROVISIO_SHUTDOWN_GRACE_SECS", "3"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        let config = EngineConfig::from_sources(
            None,
            Some(Environment::with_prefix(ENV_PREFIX).source(Some(env))),
        )
        .unwrap();

        assert_eq!(config.rpc.port, 9800);
        assert_eq!(
            config.notifiers.webhook_url.as_deref(),
            Some("http://localhost:8080/hook")
        );
        assert_eq!(config.shutdown_grace(), Duration::from_secs(3));
    }
}
