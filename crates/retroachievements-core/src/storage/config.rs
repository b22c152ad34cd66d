//! TOML-based plugin configuration.
//!
//! Stores:
//! - RetroAchievements user name and web API key
//! - Whether reports are saved to the session log and forwarded to notifiers
//! - The polling interval in minutes
//!
//! Configuration is stored at `<data dir>/plugins/retroachievements.toml`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::data_dir;
use crate::client::Credentials;
use crate::error::ConfigError;

/// How a setting is edited in the host's settings UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingKind {
    Text,
    Bool,
    Integer,
}

/// Description of one setting for the host's settings tab.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingSpec {
    pub key: &'static str,
    pub name: &'static str,
    pub kind: SettingKind,
    pub default: &'static str,
    pub hint: &'static str,
}

/// Plugin configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginConfig {
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub api_key: String,
    /// Save reports as session status updates.
    #[serde(default = "default_true")]
    pub add_status_updates: bool,
    /// Forward reports to notification services.
    #[serde(default = "default_true")]
    pub notify: bool,
    /// Polling interval in minutes.
    #[serde(default = "default_interval")]
    pub interval: u32,
}

pub const SETTINGS_TAB_NAME: &str = "RetroAchievements";

fn default_true() -> bool {
    true
}
fn default_interval() -> u32 {
    5
}

impl Default for PluginConfig {
    fn default() -> Self {
        Self {
            user: String::new(),
            api_key: String::new(),
            add_status_updates: true,
            notify: true,
            interval: default_interval(),
        }
    }
}

impl PluginConfig {
    fn path() -> Result<PathBuf, ConfigError> {
        Ok(data_dir()?.join("plugins").join("retroachievements.toml"))
    }

    /// Load from the data directory, writing defaults if no file exists yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::path()?)
    }

    /// Persist to the data directory.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let cfg: PluginConfig =
                    toml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                        path: path.to_path_buf(),
                        message: e.to_string(),
                    })?;
                cfg.validate()?;
                Ok(cfg)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let cfg = Self::default();
                cfg.save_to(path)?;
                Ok(cfg)
            }
            Err(e) => Err(ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| save_failed(e.to_string()))?;
        }
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))?;
        Ok(())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.interval == 0 {
            return Err(ConfigError::InvalidValue {
                key: "interval".to_string(),
                message: "must be at least 1 minute".to_string(),
            });
        }
        Ok(())
    }

    pub fn credentials(&self) -> Credentials {
        Credentials::new(self.user.clone(), self.api_key.clone())
    }

    /// Get a config value as string.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        match json.get(key)? {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Set a config value from its string form. Does not save.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown or the value does not parse
    /// as the setting's type.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };

        let mut json = serde_json::to_value(&*self).map_err(|e| invalid(e.to_string()))?;
        let obj = json
            .as_object_mut()
            .ok_or_else(|| ConfigError::UnknownKey(key.to_string()))?;
        let existing = obj
            .get(key)
            .ok_or_else(|| ConfigError::UnknownKey(key.to_string()))?;

        let new_value = match existing {
            serde_json::Value::Bool(_) => serde_json::Value::Bool(
                value
                    .trim()
                    .parse::<bool>()
                    .map_err(|_| invalid(format!("cannot parse '{value}' as bool")))?,
            ),
            serde_json::Value::Number(_) => {
                let n = value
                    .trim()
                    .parse::<u32>()
                    .map_err(|_| invalid(format!("cannot parse '{value}' as integer")))?;
                serde_json::Value::Number(n.into())
            }
            _ => serde_json::Value::String(value.to_string()),
        };
        obj.insert(key.to_string(), new_value);

        let updated: PluginConfig =
            serde_json::from_value(json).map_err(|e| invalid(e.to_string()))?;
        updated.validate()?;
        *self = updated;
        Ok(())
    }

    /// Settings shown on the host's settings tab.
    pub fn settings_template() -> Vec<SettingSpec> {
        vec![
            SettingSpec {
                key: "user",
                name: "User name",
                kind: SettingKind::Text,
                default: "",
                hint: "Your RetroAchievements user name",
            },
            SettingSpec {
                key: "api_key",
                name: "API key",
                kind: SettingKind::Text,
                default: "",
                hint: "Your RetroAchievements Web API key",
            },
            SettingSpec {
                key: "add_status_updates",
                name: "Save updates in DB",
                kind: SettingKind::Bool,
                default: "true",
                hint: "If checked, status updates from this plugin will be saved to the database.",
            },
            SettingSpec {
                key: "notify",
                name: "Notify on updates",
                kind: SettingKind::Bool,
                default: "true",
                hint: "If checked, status updates from this plugin will be sent to e.g. Discord.",
            },
            SettingSpec {
                key: "interval",
                name: "Update interval (minutes)",
                kind: SettingKind::Integer,
                default: "5",
                hint: "How often to send updates, in minutes.",
            },
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_roundtrip() {
        let cfg = PluginConfig::default();
        let toml_str = toml::to_string_pretty(&cfg).unwrap();
        let parsed: PluginConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed, cfg);
        assert_eq!(parsed.interval, 5);
        assert!(parsed.notify);
    }

    #[test]
    fn missing_fields_take_defaults() {
        let parsed: PluginConfig = toml::from_str("user = \"alice\"\n").unwrap();
        assert_eq!(parsed.user, "alice");
        assert_eq!(parsed.api_key, "");
        assert!(parsed.add_status_updates);
        assert_eq!(parsed.interval, 5);
    }

    #[test]
    fn load_from_missing_file_writes_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("plugins").join("retroachievements.toml");

        let cfg = PluginConfig::load_from(&path).unwrap();
        assert_eq!(cfg, PluginConfig::default());
        assert!(path.exists());
    }

    #[test]
    fn save_then_load_preserves_values() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("retroachievements.toml");

        let mut cfg = PluginConfig::default();
        cfg.set("user", "alice").unwrap();
        cfg.set("api_key", "k3y").unwrap();
        cfg.set("interval", "10").unwrap();
        cfg.set("notify", "false").unwrap();
        cfg.save_to(&path).unwrap();

        let loaded = PluginConfig::load_from(&path).unwrap();
        assert_eq!(loaded.user, "alice");
        assert_eq!(loaded.interval, 10);
        assert!(!loaded.notify);
        assert_eq!(loaded.credentials(), Credentials::new("alice", "k3y"));
    }

    #[test]
    fn corrupt_file_is_a_load_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("retroachievements.toml");
        std::fs::write(&path, "interval = \"often\"").unwrap();

        assert!(matches!(
            PluginConfig::load_from(&path),
            Err(ConfigError::LoadFailed { .. })
        ));
    }

    #[test]
    fn get_returns_string_for_all_types() {
        let cfg = PluginConfig::default();
        assert_eq!(cfg.get("interval").as_deref(), Some("5"));
        assert_eq!(cfg.get("notify").as_deref(), Some("true"));
        assert_eq!(cfg.get("user").as_deref(), Some(""));
        assert!(cfg.get("missing").is_none());
    }

    #[test]
    fn set_rejects_unknown_key() {
        let mut cfg = PluginConfig::default();
        assert!(matches!(
            cfg.set("colour", "blue"),
            Err(ConfigError::UnknownKey(_))
        ));
    }

    #[test]
    fn set_rejects_invalid_interval() {
        let mut cfg = PluginConfig::default();
        assert!(cfg.set("interval", "soon").is_err());
        assert!(cfg.set("interval", "0").is_err());
        assert!(cfg.set("add_status_updates", "maybe").is_err());
        assert_eq!(cfg, PluginConfig::default());
    }

    #[test]
    fn template_covers_every_setting() {
        let cfg = PluginConfig::default();
        for spec in PluginConfig::settings_template() {
            assert_eq!(cfg.get(spec.key).as_deref(), Some(spec.default), "{}", spec.key);
        }
    }
}
