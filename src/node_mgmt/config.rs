use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::{defaults, envvars};
use crate::drivers::{Catalog, CatalogError, HardwareVersion, ScanTier};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("could not parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),
    #[error("could not read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("no config file given and {} is not set", envvars::CONFIG_PATH)]
    NoConfigPath,
    #[error("invalid value '{value}' for {var}")]
    InvalidEnv { var: &'static str, value: String },
    #[error("device host must not be empty")]
    MissingHost,
    #[error("scan interval for tier {0:?} must be at least one second")]
    ZeroInterval(ScanTier),
    #[error("{0} must be at least 1")]
    ZeroSetting(&'static str),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

/// Interval in seconds for each scan tier
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct ScanIntervals {
    pub high: u64,
    pub medium: u64,
    pub low: u64,
    pub very_low: u64,
}

impl Default for ScanIntervals {
    fn default() -> Self {
        ScanIntervals {
            high: defaults::SCAN_INTERVAL_HIGH,
            medium: defaults::SCAN_INTERVAL_MEDIUM,
            low: defaults::SCAN_INTERVAL_LOW,
            very_low: defaults::SCAN_INTERVAL_VERY_LOW,
        }
    }
}

impl ScanIntervals {
    pub fn secs(&self, tier: ScanTier) -> u64 {
        match tier {
            ScanTier::High => self.high,
            ScanTier::Medium => self.medium,
            ScanTier::Low => self.low,
            ScanTier::VeryLow => self.very_low,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        match ScanTier::ALL.into_iter().find(|tier| self.secs(*tier) == 0) {
            Some(tier) => Err(ConfigError::ZeroInterval(tier)),
            None => Ok(()),
        }
    }
}

/// Scan intervals plus a version that changes on every reconfiguration
///
/// The poll loop compares versions at tick boundaries to decide whether the
/// schedule must be recomputed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScanTierConfig {
    pub version: u64,
    pub intervals: ScanIntervals,
}

impl ScanTierConfig {
    pub fn new(intervals: ScanIntervals) -> Self {
        ScanTierConfig {
            version: 1,
            intervals,
        }
    }

    pub fn interval(&self, tier: ScanTier) -> Duration {
        Duration::from_secs(self.intervals.secs(tier))
    }

    /// Successor config carrying new intervals
    pub fn next(&self, intervals: ScanIntervals) -> Self {
        ScanTierConfig {
            version: self.version + 1,
            intervals,
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct DeviceConfig {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_unit_id")]
    pub unit_id: u8,
    #[serde(default)]
    pub hardware_version: HardwareVersion,
    #[serde(default)]
    pub scan_intervals: ScanIntervals,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_message_wait_ms")]
    pub message_wait_ms: u64,
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    #[serde(default = "default_stale_after")]
    pub stale_after: u32,
    /// Polls to wait before a contradicting read discards an optimistic write
    #[serde(default)]
    pub reconcile_grace_polls: u32,
    /// Per-entity enable overrides, keyed by register or derived sensor key
    #[serde(default)]
    pub entities: BTreeMap<String, bool>,
}

fn default_port() -> u16 {
    defaults::PORT
}

fn default_unit_id() -> u8 {
    defaults::UNIT_ID
}

fn default_timeout_secs() -> u64 {
    defaults::TIMEOUT.as_secs()
}

fn default_message_wait_ms() -> u64 {
    defaults::MESSAGE_WAIT_MS
}

fn default_failure_threshold() -> u32 {
    defaults::FAILURE_THRESHOLD
}

fn default_stale_after() -> u32 {
    defaults::STALE_AFTER
}

impl DeviceConfig {
    pub fn new(host: &str) -> Self {
        DeviceConfig {
            host: host.to_string(),
            port: defaults::PORT,
            unit_id: defaults::UNIT_ID,
            hardware_version: HardwareVersion::default(),
            scan_intervals: ScanIntervals::default(),
            timeout_secs: default_timeout_secs(),
            message_wait_ms: defaults::MESSAGE_WAIT_MS,
            failure_threshold: defaults::FAILURE_THRESHOLD,
            stale_after: defaults::STALE_AFTER,
            reconcile_grace_polls: 0,
            entities: BTreeMap::new(),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn message_wait(&self) -> Duration {
        Duration::from_millis(self.message_wait_ms)
    }

    pub fn catalog(&self) -> &'static Catalog {
        Catalog::for_version(self.hardware_version)
    }

    /// Effective enabled flag for an entity: explicit override, else the catalog default
    pub fn is_enabled(&self, key: &str, enabled_by_default: bool) -> bool {
        self.entities
            .get(key)
            .copied()
            .unwrap_or(enabled_by_default)
    }

    /// `MARSTEK_HOST` and `MARSTEK_PORT` take precedence over the file
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Ok(host) = std::env::var(envvars::HOST) {
            log::debug!("Overriding host from {}", envvars::HOST);
            self.host = host;
        }
        if let Ok(port) = std::env::var(envvars::PORT) {
            self.port = port.parse().map_err(|_| ConfigError::InvalidEnv {
                var: envvars::PORT,
                value: port.clone(),
            })?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::MissingHost);
        }
        self.scan_intervals.validate()?;
        if self.failure_threshold == 0 {
            return Err(ConfigError::ZeroSetting("failure_threshold"));
        }
        if self.stale_after == 0 {
            return Err(ConfigError::ZeroSetting("stale_after"));
        }

        let catalog = self.catalog();
        if let Some(key) = self.entities.keys().find(|key| !catalog.contains(key)) {
            return Err(CatalogError::UnknownRegister(key.clone()).into());
        }
        Ok(())
    }
}

pub fn from_str(config_raw: &str) -> Result<DeviceConfig, ConfigError> {
    serde_json::from_str::<DeviceConfig>(config_raw).map_err(Into::into)
}

pub fn from_file(path: &Path) -> Result<DeviceConfig, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    from_str(&raw)
}

/// Load from `path`, or from `$MARSTEK_CONFIG` when no path is given, then apply env overrides
pub fn load(path: Option<&Path>) -> Result<DeviceConfig, ConfigError> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => std::env::var_os(envvars::CONFIG_PATH)
            .map(PathBuf::from)
            .ok_or(ConfigError::NoConfigPath)?,
    };
    log::debug!("Loading config from {}", path.display());
    let mut config = from_file(&path)?;
    config.apply_env_overrides()?;
    config.validate()?;
    Ok(config)
}
