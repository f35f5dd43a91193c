use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::BaseDirs;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// `version` is required in a config file; every section may be omitted.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ImgcrackConfig {
    pub version: u32,
    #[serde(default)]
    pub attempt: AttemptConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub sources: SourcesConfig,
    #[serde(default)]
    pub mount: MountConfig,
    #[serde(default)]
    pub input: InputConfig,
}

impl Default for ImgcrackConfig {
    fn default() -> Self {
        Self {
            version: 1,
            attempt: AttemptConfig::default(),
            schedule: ScheduleConfig::default(),
            sources: SourcesConfig::default(),
            mount: MountConfig::default(),
            input: InputConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct AttemptConfig {
    pub poll_interval_ms: u64,
    pub kill_grace_ms: u64,
}

impl Default for AttemptConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 50,
            kill_grace_ms: 500,
        }
    }
}

impl AttemptConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn kill_grace(&self) -> Duration {
        Duration::from_millis(self.kill_grace_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ScheduleConfig {
    pub eta_threshold_secs: u64,
    pub default_rate: f64,
    pub window_min_secs: u64,
    pub window_max_secs: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            eta_threshold_secs: 120,
            default_rate: 12.0,
            window_min_secs: 5,
            window_max_secs: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct SourcesConfig {
    pub extension: String,
    pub exact_count_threshold_bytes: u64,
    pub sample_bytes: u64,
    pub fallback_line_length: u64,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            extension: "txt".to_string(),
            exact_count_threshold_bytes: 5_000_000,
            sample_bytes: 1_000_000,
            fallback_line_length: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct MountConfig {
    pub program: String,
    pub volumes_dir: PathBuf,
    pub sweep_with_sudo: bool,
    pub image_extensions: Vec<String>,
}

impl Default for MountConfig {
    fn default() -> Self {
        Self {
            program: "hdiutil".to_string(),
            volumes_dir: PathBuf::from("/Volumes"),
            sweep_with_sudo: true,
            image_extensions: vec![
                "sparsebundle".to_string(),
                "dmg".to_string(),
                "sparseimage".to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct InputConfig {
    pub listener_poll_ms: u64,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            listener_poll_ms: 100,
        }
    }
}

impl InputConfig {
    pub fn listener_poll(&self) -> Duration {
        Duration::from_millis(self.listener_poll_ms)
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not resolve home directory for config path")]
    HomeDirectoryUnavailable,
    #[error("failed to read config at {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid config: {message}")]
    Validation { message: String },
}

pub fn resolve_config_path() -> Result<PathBuf, ConfigError> {
    let base_dirs = BaseDirs::new().ok_or(ConfigError::HomeDirectoryUnavailable)?;
    Ok(base_dirs
        .home_dir()
        .join(".config")
        .join("imgcrack")
        .join("config.toml"))
}

pub fn load_config(path: &Path) -> Result<ImgcrackConfig, ConfigError> {
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let parsed: ImgcrackConfig = toml::from_str(&raw).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    validate_config(&parsed)?;
    Ok(parsed)
}

/// Loads the config at `path`, or built-in defaults when the file is absent.
pub fn load_config_or_default(path: &Path) -> Result<ImgcrackConfig, ConfigError> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "no config file, using defaults");
        return Ok(ImgcrackConfig::default());
    }
    load_config(path)
}

pub fn validate_config(config: &ImgcrackConfig) -> Result<(), ConfigError> {
    let fail = |message: &str| {
        Err(ConfigError::Validation {
            message: message.to_string(),
        })
    };

    if config.version != 1 {
        return fail("version must be 1");
    }
    if config.attempt.poll_interval_ms == 0 {
        return fail("attempt.poll_interval_ms must be greater than 0");
    }
    if config.input.listener_poll_ms == 0 {
        return fail("input.listener_poll_ms must be greater than 0");
    }
    if !(config.schedule.default_rate.is_finite() && config.schedule.default_rate > 0.0) {
        return fail("schedule.default_rate must be a positive number");
    }
    if config.schedule.window_min_secs > config.schedule.window_max_secs {
        return fail("schedule.window_min_secs must not exceed schedule.window_max_secs");
    }
    if config.sources.extension.trim().is_empty() {
        return fail("sources.extension must be non-empty");
    }
    if config.sources.sample_bytes == 0 || config.sources.fallback_line_length == 0 {
        return fail("sources.sample_bytes and sources.fallback_line_length must be greater than 0");
    }
    if config.mount.program.trim().is_empty() {
        return fail("mount.program must be non-empty");
    }
    if config.mount.image_extensions.is_empty()
        || config
            .mount
            .image_extensions
            .iter()
            .any(|extension| extension.trim().is_empty())
    {
        return fail("mount.image_extensions must list at least one non-empty extension");
    }

    Ok(())
}
