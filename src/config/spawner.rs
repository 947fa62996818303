//! Spawner configuration structures.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::core::{AppResult, Base, SpawnMode, SpawnerOptions};
use crate::util::RequestOptions;

/// Serializable spawner configuration. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SpawnerConfig {
    /// Default request parameters merged under every spawn.
    pub base: RequestOptions,
    /// Policy delay in milliseconds.
    pub time: u64,
    /// Built-in mode name.
    pub mode: Option<String>,
    /// Debounce fires immediately on an empty queue.
    pub leading: bool,
    /// Executor single-shot hint.
    pub once: bool,
    /// Executor timeout in milliseconds; zero disables it.
    pub timeout: u64,
    /// Executor continue-on-fail hint.
    pub continue_on_fail: bool,
}

impl SpawnerConfig {
    /// Mode name, defaulting to `default`.
    pub fn mode_name(&self) -> &str {
        self.mode.as_deref().unwrap_or("default")
    }

    /// Validate mode name and timing values.
    pub fn validate(&self) -> Result<(), String> {
        let mode = SpawnMode::from_str(self.mode_name()).map_err(|e| e.to_string())?;
        if matches!(mode, SpawnMode::Interval) && self.time == 0 {
            return Err("interval mode requires time greater than 0".into());
        }
        Ok(())
    }

    /// Parse configuration from a JSON string and validate.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Read configuration from `SPAWNER_*` environment variables, loading a
    /// `.env` file first when present.
    ///
    /// Recognized: `SPAWNER_MODE`, `SPAWNER_TIME_MS`, `SPAWNER_LEADING`,
    /// `SPAWNER_TIMEOUT_MS`, `SPAWNER_ONCE`, `SPAWNER_CONTINUE_ON_FAIL`.
    pub fn from_env() -> AppResult<Self> {
        let _ = dotenvy::dotenv();
        let cfg = Self {
            base: RequestOptions::new(),
            time: env_parse("SPAWNER_TIME_MS")?.unwrap_or_default(),
            mode: env::var("SPAWNER_MODE").ok(),
            leading: env_parse("SPAWNER_LEADING")?.unwrap_or_default(),
            once: env_parse("SPAWNER_ONCE")?.unwrap_or_default(),
            timeout: env_parse("SPAWNER_TIMEOUT_MS")?.unwrap_or_default(),
            continue_on_fail: env_parse("SPAWNER_CONTINUE_ON_FAIL")?.unwrap_or_default(),
        };
        cfg.validate()
            .map_err(anyhow::Error::msg)
            .context("invalid spawner environment")?;
        Ok(cfg)
    }

    /// Convert into runtime options.
    pub fn to_options(&self) -> Result<SpawnerOptions, String> {
        self.validate()?;
        let mode = SpawnMode::from_str(self.mode_name()).map_err(|e| e.to_string())?;
        Ok(SpawnerOptions {
            base: Base::Options(self.base.clone()),
            delay: Duration::from_millis(self.time),
            mode,
            leading: self.leading,
            once: self.once,
            timeout: Duration::from_millis(self.timeout),
            continue_on_fail: self.continue_on_fail,
        })
    }
}

fn env_parse<T>(key: &str) -> AppResult<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .with_context(|| format!("{key} has an invalid value: {raw}")),
        Err(_) => Ok(None),
    }
}
