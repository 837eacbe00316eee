//! TOML-based configuration for the remote parameters service.
//!
//! Reads and writes [`RemoteConfig`] at the platform-appropriate location:
//! - Linux:    `~/.config/remoteparams/config.toml`
//! - macOS:    `~/Library/Application Support/RemoteParams/config.toml`
//! - Windows:  `%APPDATA%\RemoteParams\config.toml`
//!
//! Every field has a serde default so a missing file, or an older file
//! missing newer fields, still produces a working configuration.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The platform config directory could not be determined.
    #[error("could not determine platform config directory")]
    NoPlatformConfigDir,

    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// The config could not be serialized to TOML.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level configuration stored on disk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct RemoteConfig {
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub transport: TransportConfig,
}

/// Identity and logging settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServiceConfig {
    /// Service tag advertised on the local network. Both sides must use
    /// the same tag to find each other.
    #[serde(default = "default_service_tag")]
    pub service_tag: String,
    /// Display name advertised to peers. Empty means "use the hostname".
    #[serde(default)]
    pub display_name: String,
    /// `tracing` log level: `"error"`, `"warn"`, `"info"`, `"debug"`, `"trace"`.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Session timing settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionConfig {
    /// Bounded wait when inviting a discovered peer.
    #[serde(default = "default_invite_timeout_secs")]
    pub invite_timeout_secs: u64,
    /// Delay between a peer reaching Connected and the first registry
    /// push, giving the transport time to finish handshake bookkeeping.
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,
}

/// LAN transport settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TransportConfig {
    /// UDP port used for discovery broadcasts.
    #[serde(default = "default_discovery_port")]
    pub discovery_port: u16,
    /// Interval between announce broadcasts while advertising.
    #[serde(default = "default_announce_interval_ms")]
    pub announce_interval_ms: u64,
}

impl SessionConfig {
    pub fn invite_timeout(&self) -> Duration {
        Duration::from_secs(self.invite_timeout_secs)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

impl TransportConfig {
    pub fn announce_interval(&self) -> Duration {
        Duration::from_millis(self.announce_interval_ms)
    }
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_service_tag() -> String {
    "param-tune".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_invite_timeout_secs() -> u64 {
    10
}
fn default_settle_delay_ms() -> u64 {
    1000
}
fn default_discovery_port() -> u16 {
    37201
}
fn default_announce_interval_ms() -> u64 {
    2000
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            service_tag: default_service_tag(),
            display_name: String::new(),
            log_level: default_log_level(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            invite_timeout_secs: default_invite_timeout_secs(),
            settle_delay_ms: default_settle_delay_ms(),
        }
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            discovery_port: default_discovery_port(),
            announce_interval_ms: default_announce_interval_ms(),
        }
    }
}

// ── Config repository ─────────────────────────────────────────────────────────

/// Resolves the full path to the config file.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] if the base directory
/// cannot be determined from the environment.
pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    platform_config_dir()
        .ok_or(ConfigError::NoPlatformConfigDir)
        .map(|dir| dir.join("config.toml"))
}

/// Loads [`RemoteConfig`] from disk, returning defaults if the file does
/// not yet exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than
/// "not found", and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config() -> Result<RemoteConfig, ConfigError> {
    let path = config_file_path()?;

    match std::fs::read_to_string(&path) {
        Ok(content) => {
            let cfg: RemoteConfig = toml::from_str(&content)?;
            Ok(cfg)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(RemoteConfig::default()),
        Err(e) => Err(ConfigError::Io { path, source: e }),
    }
}

/// Persists `config` to disk, creating the config directory if needed.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system failures or
/// [`ConfigError::Serialize`] if serialization fails.
pub fn save_config(config: &RemoteConfig) -> Result<(), ConfigError> {
    let path = config_file_path()?;

    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|source| ConfigError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(&path, content).map_err(|source| ConfigError::Io {
        path: path.clone(),
        source,
    })?;
    Ok(())
}

/// Resolves the platform config base directory.
fn platform_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA").map(|p| PathBuf::from(p).join("RemoteParams"))
    }

    #[cfg(target_os = "linux")]
    {
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
        Some(base.join("remoteparams"))
    }

    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME").map(|h| {
            PathBuf::from(h)
                .join("Library")
                .join("Application Support")
                .join("RemoteParams")
        })
    }

    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    {
        None
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_has_expected_values() {
        let cfg = RemoteConfig::default();
        assert_eq!(cfg.service.service_tag, "param-tune");
        assert_eq!(cfg.service.log_level, "info");
        assert_eq!(cfg.session.invite_timeout_secs, 10);
        assert_eq!(cfg.session.settle_delay_ms, 1000);
        assert_eq!(cfg.transport.discovery_port, 37201);
    }

    #[test]
    fn test_duration_helpers() {
        let cfg = RemoteConfig::default();
        assert_eq!(cfg.session.invite_timeout(), Duration::from_secs(10));
        assert_eq!(cfg.session.settle_delay(), Duration::from_millis(1000));
        assert_eq!(cfg.transport.announce_interval(), Duration::from_millis(2000));
    }

    #[test]
    fn test_config_round_trips_through_toml() {
        let mut cfg = RemoteConfig::default();
        cfg.service.display_name = "Studio on Pixel".to_string();
        cfg.transport.discovery_port = 40000;

        let toml_str = toml::to_string_pretty(&cfg).expect("serialize");
        let restored: RemoteConfig = toml::from_str(&toml_str).expect("deserialize");

        assert_eq!(cfg, restored);
    }

    #[test]
    fn test_deserialize_empty_toml_uses_defaults() {
        let cfg: RemoteConfig = toml::from_str("").expect("deserialize empty");
        assert_eq!(cfg, RemoteConfig::default());
    }

    #[test]
    fn test_deserialize_partial_section_overrides_defaults() {
        let toml_str = r#"
[session]
settle_delay_ms = 250
"#;
        let cfg: RemoteConfig = toml::from_str(toml_str).expect("deserialize partial");
        assert_eq!(cfg.session.settle_delay_ms, 250);
        // Unspecified fields keep their defaults
        assert_eq!(cfg.session.invite_timeout_secs, 10);
        assert_eq!(cfg.service.service_tag, "param-tune");
    }

    #[test]
    fn test_deserialize_invalid_toml_returns_parse_error() {
        let result: Result<RemoteConfig, toml::de::Error> = toml::from_str("[[[ nope");
        assert!(result.is_err());
    }
}
