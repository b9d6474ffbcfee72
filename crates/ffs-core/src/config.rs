//! Configuration system for FFS.
//!
//! Resolution order: environment variables → config file → defaults.
//!
//! Config file location:
//!   1. $FFS_CONFIG (explicit override)
//!   2. $XDG_CONFIG_HOME/ffs/config.toml
//!   3. ~/.config/ffs/config.toml

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::wire::DEFAULT_NONCE_SEED;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FfsConfig {
    pub transport: TransportConfig,
    pub timing: TimingConfig,
}

/// Which byte channel carries the packets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// TCP, one connection per direction, command-prefixed.
    #[default]
    Socket,
    /// A pair of device files polled with raw reads and writes.
    File,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    pub kind: TransportKind,
    /// Device host for the socket transport.
    pub host: String,
    /// Port serving inbound packets (device → us).
    pub read_port: u16,
    /// Port accepting outbound packets (us → device).
    pub write_port: u16,
    /// Device file read for inbound packets.
    pub read_path: PathBuf,
    /// Device file written with outbound packets.
    pub write_path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Back-off between polls of an idle channel, and between status polls.
    pub poll_interval_ms: u64,
    /// Back-off before resending a frame the device asked to retry.
    pub retry_backoff_ms: u64,
    /// Consecutive "wait" statuses tolerated before a frame is resent.
    pub max_status_waits: u32,
    /// Starting value of the outbound nonce counter.
    pub nonce_seed: u8,
}

// ── Defaults ──────────────────────────────────────────────────────────────────

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            kind: TransportKind::Socket,
            host: "127.0.0.1".to_string(),
            read_port: 9998,
            write_port: 9999,
            read_path: PathBuf::from("/dev/ffs/read"),
            write_path: PathBuf::from("/dev/ffs/write"),
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 25,
            retry_backoff_ms: 125,
            max_status_waits: 8,
            nonce_seed: DEFAULT_NONCE_SEED,
        }
    }
}

impl TimingConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

// ── Path helpers ──────────────────────────────────────────────────────────────

fn config_dir() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_or_home().join(".config"))
        .join("ffs")
}

fn dirs_or_home() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    ReadFailed(PathBuf, std::io::Error),
    #[error("failed to parse {0}: {1}")]
    ParseFailed(PathBuf, toml::de::Error),
    #[error("failed to write {0}: {1}")]
    WriteFailed(PathBuf, std::io::Error),
    #[error("failed to serialize: {0}")]
    SerializeFailed(toml::ser::Error),
}

// ── Loading ───────────────────────────────────────────────────────────────────

impl FfsConfig {
    /// Load config: env vars → file → defaults.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::file_path())
    }

    /// Load from an explicit path (missing file = defaults), then apply env.
    pub fn load_from(path: &std::path::Path) -> Result<Self, ConfigError> {
        let mut config = if path.exists() {
            let text = std::fs::read_to_string(path)
                .map_err(|e| ConfigError::ReadFailed(path.to_path_buf(), e))?;
            toml::from_str(&text).map_err(|e| ConfigError::ParseFailed(path.to_path_buf(), e))?
        } else {
            FfsConfig::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Config file path.
    pub fn file_path() -> PathBuf {
        std::env::var("FFS_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| config_dir().join("config.toml"))
    }

    /// Write default config if none exists. Returns the path.
    pub fn write_default_if_missing() -> Result<PathBuf, ConfigError> {
        let path = Self::file_path();
        if !path.exists() {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
            }
            let text = toml::to_string_pretty(&FfsConfig::default())
                .map_err(ConfigError::SerializeFailed)?;
            std::fs::write(&path, text).map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
        }
        Ok(path)
    }

    /// Apply FFS_* env var overrides.
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(v) = var("FFS_TRANSPORT__KIND") {
            match v.as_str() {
                "socket" => self.transport.kind = TransportKind::Socket,
                "file" => self.transport.kind = TransportKind::File,
                _ => {}
            }
        }
        if let Some(v) = var("FFS_TRANSPORT__HOST") {
            self.transport.host = v;
        }
        if let Some(p) = var("FFS_TRANSPORT__READ_PORT").and_then(|v| v.parse().ok()) {
            self.transport.read_port = p;
        }
        if let Some(p) = var("FFS_TRANSPORT__WRITE_PORT").and_then(|v| v.parse().ok()) {
            self.transport.write_port = p;
        }
        if let Some(v) = var("FFS_TRANSPORT__READ_PATH") {
            self.transport.read_path = PathBuf::from(v);
        }
        if let Some(v) = var("FFS_TRANSPORT__WRITE_PATH") {
            self.transport.write_path = PathBuf::from(v);
        }
        if let Some(ms) = var("FFS_TIMING__POLL_INTERVAL_MS").and_then(|v| v.parse().ok()) {
            self.timing.poll_interval_ms = ms;
        }
        if let Some(ms) = var("FFS_TIMING__RETRY_BACKOFF_MS").and_then(|v| v.parse().ok()) {
            self.timing.retry_backoff_ms = ms;
        }
        if let Some(n) = var("FFS_TIMING__MAX_STATUS_WAITS").and_then(|v| v.parse().ok()) {
            self.timing.max_status_waits = n;
        }
        if let Some(seed) = var("FFS_TIMING__NONCE_SEED").and_then(|v| parse_u8(&v)) {
            self.timing.nonce_seed = seed;
        }
    }
}

/// Decimal or `0x`-prefixed hex.
fn parse_u8(text: &str) -> Option<u8> {
    match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u8::from_str_radix(hex, 16).ok(),
        None => text.parse().ok(),
    }
}
