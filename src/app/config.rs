use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::app::error::AppError;

pub const MAX_RECENT_SCHEMES: usize = 10;
const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;
const MIN_POLL_INTERVAL_MS: u64 = 100;
const DEFAULT_TIMESTAMP_FORMAT: &str = "%Y/%m/%d %H:%M";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AdbSettings {
    pub command_path: String,
    /// Zero disables the timeout; child processes may then block forever.
    pub command_timeout_secs: u64,
}

impl Default for AdbSettings {
    fn default() -> Self {
        Self {
            command_path: String::new(),
            command_timeout_secs: 0,
        }
    }
}

impl AdbSettings {
    pub fn timeout(&self) -> Option<Duration> {
        if self.command_timeout_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(self.command_timeout_secs))
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeviceSettings {
    pub poll_interval_ms: u64,
    pub auto_start_polling: bool,
}

impl Default for DeviceSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            auto_start_polling: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConsoleSettings {
    pub timestamp_format: String,
}

impl Default for ConsoleSettings {
    fn default() -> Self {
        Self {
            timestamp_format: DEFAULT_TIMESTAMP_FORMAT.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingSettings {
    pub log_level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            log_level: "WARN".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub adb: AdbSettings,
    #[serde(default)]
    pub device: DeviceSettings,
    #[serde(default)]
    pub console: ConsoleSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
    #[serde(default)]
    pub recent_schemes: Vec<String>,
    #[serde(default)]
    pub last_scheme_path: String,
    #[serde(default)]
    pub version: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            adb: AdbSettings::default(),
            device: DeviceSettings::default(),
            console: ConsoleSettings::default(),
            logging: LoggingSettings::default(),
            recent_schemes: Vec::new(),
            last_scheme_path: String::new(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl AppConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.device.poll_interval_ms)
    }

    /// Moves `path` to the front of the recent list and remembers it as the last scheme.
    pub fn remember_scheme(&mut self, path: &Path) {
        let value = path.to_string_lossy().to_string();
        self.recent_schemes.retain(|existing| existing != &value);
        self.recent_schemes.insert(0, value.clone());
        self.recent_schemes.truncate(MAX_RECENT_SCHEMES);
        self.last_scheme_path = value;
    }
}

pub fn config_path() -> PathBuf {
    if let Ok(path) = std::env::var("FIRE_BROADCAST_CONFIG_PATH") {
        return PathBuf::from(path);
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".fire_broadcast_config.json")
}

pub fn backup_config_path(path: &Path) -> PathBuf {
    path.with_extension("backup.json")
}

pub fn load_config() -> Result<AppConfig, AppError> {
    load_config_from_path(&config_path())
}

pub fn save_config(config: &AppConfig) -> Result<(), AppError> {
    let path = config_path();
    save_config_to_path(config, &path, &backup_config_path(&path))
}

pub fn load_config_from_path(path: &Path) -> Result<AppConfig, AppError> {
    if !path.exists() {
        return Ok(AppConfig::default());
    }
    let raw = fs::read_to_string(path)
        .map_err(|err| AppError::system(format!("Failed to read config: {err}"), ""))?;
    let value: serde_json::Value = serde_json::from_str(&raw)
        .map_err(|err| AppError::parse(format!("Failed to parse config: {err}"), ""))?;
    let mut config: AppConfig = serde_json::from_value(value.clone()).unwrap_or_default();
    config = apply_legacy_overrides(config, &value);
    Ok(validate_config(config))
}

pub fn save_config_to_path(
    config: &AppConfig,
    path: &Path,
    backup_path: &Path,
) -> Result<(), AppError> {
    if let Some(parent) = path.parent() {
        let _ = fs::create_dir_all(parent);
    }
    if path.exists() {
        let _ = fs::copy(path, backup_path);
    }
    let payload = serde_json::to_string_pretty(config)
        .map_err(|err| AppError::system(format!("Failed to serialize config: {err}"), ""))?;
    fs::write(path, payload)
        .map_err(|err| AppError::system(format!("Failed to write config: {err}"), ""))?;
    Ok(())
}

fn apply_legacy_overrides(mut config: AppConfig, value: &serde_json::Value) -> AppConfig {
    if let Some(adb_path) = value.get("adb_path").and_then(|v| v.as_str()) {
        config.adb.command_path = adb_path.to_string();
    }
    if let Some(interval) = value.get("refresh_interval_ms").and_then(|v| v.as_u64()) {
        config.device.poll_interval_ms = interval;
    }
    config
}

fn validate_config(mut config: AppConfig) -> AppConfig {
    if config.device.poll_interval_ms < MIN_POLL_INTERVAL_MS {
        config.device.poll_interval_ms = DEFAULT_POLL_INTERVAL_MS;
    }
    if config.console.timestamp_format.trim().is_empty() {
        config.console.timestamp_format = DEFAULT_TIMESTAMP_FORMAT.to_string();
    }
    config.recent_schemes.retain(|path| !path.trim().is_empty());
    config.recent_schemes.truncate(MAX_RECENT_SCHEMES);
    config
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = load_config_from_path(&dir.path().join("absent.json")).expect("load");
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.poll_interval(), Duration::from_millis(1000));
        assert_eq!(config.adb.timeout(), None);
    }

    #[test]
    fn merges_legacy_values() {
        let value = serde_json::json!({
            "adb_path": "/opt/platform-tools/adb",
            "refresh_interval_ms": 2500
        });
        let mut config: AppConfig = serde_json::from_value(value.clone()).unwrap_or_default();
        config = apply_legacy_overrides(config, &value);
        assert_eq!(config.adb.command_path, "/opt/platform-tools/adb");
        assert_eq!(config.device.poll_interval_ms, 2500);
    }

    #[test]
    fn clamps_invalid_values() {
        let mut config = AppConfig::default();
        config.device.poll_interval_ms = 5;
        config.console.timestamp_format = "  ".to_string();
        config.recent_schemes = vec![String::new(), "/tmp/a.json".to_string()];
        let validated = validate_config(config);
        assert_eq!(validated.device.poll_interval_ms, 1000);
        assert_eq!(validated.console.timestamp_format, "%Y/%m/%d %H:%M");
        assert_eq!(validated.recent_schemes, vec!["/tmp/a.json".to_string()]);
    }

    #[test]
    fn save_then_load_round_trips_and_backs_up() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.json");
        let backup = backup_config_path(&path);

        let mut config = AppConfig::default();
        config.adb.command_timeout_secs = 15;
        save_config_to_path(&config, &path, &backup).expect("first save");
        assert!(!backup.exists());

        config.remember_scheme(Path::new("/tmp/scheme.json"));
        save_config_to_path(&config, &path, &backup).expect("second save");
        assert!(backup.exists());

        let loaded = load_config_from_path(&path).expect("load");
        assert_eq!(loaded, config);
        assert_eq!(loaded.adb.timeout(), Some(Duration::from_secs(15)));
    }

    #[test]
    fn remember_scheme_dedupes_and_caps() {
        let mut config = AppConfig::default();
        for index in 0..12 {
            config.remember_scheme(Path::new(&format!("/tmp/{index}.json")));
        }
        config.remember_scheme(Path::new("/tmp/5.json"));
        assert_eq!(config.recent_schemes.len(), MAX_RECENT_SCHEMES);
        assert_eq!(config.recent_schemes[0], "/tmp/5.json");
        assert_eq!(
            config
                .recent_schemes
                .iter()
                .filter(|path| path.as_str() == "/tmp/5.json")
                .count(),
            1
        );
        assert_eq!(config.last_scheme_path, "/tmp/5.json");
    }

    #[test]
    fn rejects_unparseable_config() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").expect("write");
        let err = load_config_from_path(&path).expect_err("expected parse error");
        assert_eq!(err.code, "ERR_PARSE");
    }
}
