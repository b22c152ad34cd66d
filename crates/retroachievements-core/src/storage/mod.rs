mod config;
mod state;

pub use config::{PluginConfig, SettingKind, SettingSpec, SETTINGS_TAB_NAME};
pub use state::{PersistedState, StateStore};

use std::path::PathBuf;

use crate::error::ConfigError;

/// Returns `~/.config/gamest-retroachievements[-dev]/` based on GAMEST_ENV.
///
/// Set GAMEST_ENV=dev to use development data directory.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf, ConfigError> {
    let base_dir = dirs::config_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join(".config")))
        .unwrap_or_else(|| PathBuf::from("."));

    let env = std::env::var("GAMEST_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("gamest-retroachievements-dev")
    } else {
        base_dir.join("gamest-retroachievements")
    };

    std::fs::create_dir_all(&dir)
        .map_err(|e| ConfigError::DataDir(format!("{}: {e}", dir.display())))?;
    Ok(dir)
}
