// src/settings.rs
//
// Bridge settings, read from bridge.toml.
//
// Lookup order:
//   1. --config <file>
//   2. $XDG_CONFIG_HOME/mqtt-can-bridge/bridge.toml
//   3. built-in defaults
// Command-line flags are applied on top (see cli.rs).

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::io::mqtt::MqttConfig;
use crate::io::socketcan::{is_valid_interface_name, SocketCanConfig};

const APP_DIR: &str = "mqtt-can-bridge";
const SETTINGS_FILE: &str = "bridge.toml";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse settings {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("failed to serialise settings: {0}")]
    Serialise(#[from] toml::ser::Error),
    #[error("invalid settings: {0}")]
    Invalid(String),
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct BridgeSettings {
    /// Conversion table (JSON)
    #[serde(default = "default_table_path")]
    pub table_path: PathBuf,
    /// Directory for log files; stderr only when unset
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
    #[serde(default)]
    pub mqtt: MqttConfig,
    #[serde(default)]
    pub can: SocketCanConfig,
}

fn default_table_path() -> PathBuf {
    PathBuf::from("config").join("conversion.json")
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self {
            table_path: default_table_path(),
            log_dir: None,
            mqtt: MqttConfig::default(),
            can: SocketCanConfig::default(),
        }
    }
}

impl BridgeSettings {
    pub fn from_toml_str(text: &str, origin: &Path) -> Result<Self, SettingsError> {
        toml::from_str(text).map_err(|source| SettingsError::Parse {
            path: origin.to_path_buf(),
            source,
        })
    }

    pub fn to_toml_string(&self) -> Result<String, SettingsError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.mqtt.qos > 2 {
            return Err(SettingsError::Invalid(format!(
                "mqtt.qos must be 0, 1 or 2 (got {})",
                self.mqtt.qos
            )));
        }
        if self.mqtt.port == 0 {
            return Err(SettingsError::Invalid("mqtt.port must not be 0".to_string()));
        }
        if self.mqtt.host.trim().is_empty() {
            return Err(SettingsError::Invalid("mqtt.host is empty".to_string()));
        }
        // 0 disables keep-alive; anything shorter than 5 s floods the broker
        if self.mqtt.keep_alive_secs != 0 && self.mqtt.keep_alive_secs < 5 {
            return Err(SettingsError::Invalid(
                "mqtt.keep_alive_secs must be 0 or at least 5".to_string(),
            ));
        }
        if self.can.interface.is_empty() {
            return Err(SettingsError::Invalid("can.interface is empty".to_string()));
        }
        if !is_valid_interface_name(&self.can.interface) {
            return Err(SettingsError::Invalid(format!(
                "can.interface {:?} is not a valid interface name",
                self.can.interface
            )));
        }
        if self.can.read_timeout_ms == 0 {
            return Err(SettingsError::Invalid("can.read_timeout_ms must not be 0".to_string()));
        }
        Ok(())
    }
}

/// `$XDG_CONFIG_HOME/mqtt-can-bridge/bridge.toml`, if a config dir exists
pub fn default_settings_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_DIR).join(SETTINGS_FILE))
}

/// An explicit path must exist; the default location is optional.
pub fn load_settings(explicit: Option<&Path>) -> Result<BridgeSettings, SettingsError> {
    match explicit {
        Some(path) => read_settings(path),
        None => match default_settings_path() {
            Some(path) if path.exists() => read_settings(&path),
            _ => Ok(BridgeSettings::default()),
        },
    }
}

fn read_settings(path: &Path) -> Result<BridgeSettings, SettingsError> {
    let content = std::fs::read_to_string(path).map_err(|source| SettingsError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    BridgeSettings::from_toml_str(&content, path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let settings = BridgeSettings::default();
        assert_eq!(settings.table_path, PathBuf::from("config/conversion.json"));
        assert_eq!(settings.mqtt.host, "localhost");
        assert_eq!(settings.mqtt.port, 1883);
        assert_eq!(settings.mqtt.qos, 1);
        assert_eq!(settings.can.interface, "can0");
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let text = r#"
table_path = "/etc/bridge/conversion.json"

[mqtt]
host = "broker.local"
qos = 0

[can]
interface = "vcan0"
tunnel = false
"#;
        let settings = BridgeSettings::from_toml_str(text, Path::new("test.toml")).unwrap();
        assert_eq!(settings.table_path, PathBuf::from("/etc/bridge/conversion.json"));
        assert_eq!(settings.mqtt.host, "broker.local");
        assert_eq!(settings.mqtt.port, 1883);
        assert_eq!(settings.mqtt.qos, 0);
        assert_eq!(settings.mqtt.client_id, "cobien-bridge");
        assert_eq!(settings.can.interface, "vcan0");
        assert!(!settings.can.tunnel);
        assert_eq!(settings.log_dir, None);
    }

    #[test]
    fn test_load_explicit_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[mqtt]\nport = 1884").unwrap();
        let settings = load_settings(Some(file.path())).unwrap();
        assert_eq!(settings.mqtt.port, 1884);
    }

    #[test]
    fn test_shipped_example_matches_defaults() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("config").join("bridge.toml");
        let settings = load_settings(Some(&path)).unwrap();
        assert_eq!(settings, BridgeSettings::default());
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_settings(Some(&dir.path().join("absent.toml"))).unwrap_err();
        assert!(matches!(err, SettingsError::Read { .. }));
    }

    #[test]
    fn test_parse_error_names_file() {
        let err = BridgeSettings::from_toml_str("[mqtt\nport = 1", Path::new("broken.toml")).unwrap_err();
        assert!(err.to_string().contains("broken.toml"));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut settings = BridgeSettings::default();
        settings.mqtt.qos = 3;
        assert!(settings.validate().is_err());

        let mut settings = BridgeSettings::default();
        settings.mqtt.port = 0;
        assert!(settings.validate().is_err());

        let mut settings = BridgeSettings::default();
        settings.can.interface = String::new();
        assert!(settings.validate().is_err());

        let mut settings = BridgeSettings::default();
        settings.can.interface = "can0 && true".to_string();
        assert!(settings.validate().is_err());

        let mut settings = BridgeSettings::default();
        settings.mqtt.keep_alive_secs = 2;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_round_trip_through_toml() {
        let mut settings = BridgeSettings::default();
        settings.can.bitrate = Some(500_000);
        settings.log_dir = Some(PathBuf::from("/var/log/bridge"));
        let text = settings.to_toml_string().unwrap();
        let back = BridgeSettings::from_toml_str(&text, Path::new("x.toml")).unwrap();
        assert_eq!(back, settings);
    }

    #[test]
    fn test_password_is_not_printed() {
        let text = "[mqtt]\nusername = \"bridge\"\npassword = \"s3cr3t\"\n";
        let settings = BridgeSettings::from_toml_str(text, Path::new("auth.toml")).unwrap();
        assert_eq!(settings.mqtt.password.as_deref(), Some("s3cr3t"));

        let printed = settings.to_toml_string().unwrap();
        assert!(!printed.contains("s3cr3t"));
        assert!(!printed.contains("password"));
        assert!(printed.contains("username = \"bridge\""));
    }
}
