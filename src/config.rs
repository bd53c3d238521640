use crate::importer::ImportOptions;
use crate::settings::Settings;
use eyre::Result;
use std::{fs, path::PathBuf};
use tracing::{debug, warn};

const CONFIG_FILE: &str = "configuration.json";
const DATABASE_FILE: &str = "novels.db";

#[derive(Debug, Clone)]
pub struct Config {
    pub settings: Settings,
    filepath: PathBuf,
}

impl Config {
    /// Load `configuration.json` from the app data directory, writing the
    /// defaults there on first run.
    pub fn new() -> Result<Self> {
        let filepath = get_app_data_prefix()?.join(CONFIG_FILE);
        let existed = filepath.exists();
        let config = Self::load_from(filepath)?;
        if !existed {
            config.save()?;
        }
        Ok(config)
    }

    /// Load configuration from a custom path. A missing file yields defaults.
    pub fn load_from(filepath: PathBuf) -> Result<Self> {
        let mut settings = Settings::default();

        if filepath.exists() {
            let config_str = fs::read_to_string(&filepath)?;
            match serde_json::from_str::<serde_json::Value>(&config_str) {
                Ok(user_config) => {
                    if let Some(user_settings) = user_config.get("Setting") {
                        let user_settings: Settings = serde_json::from_value(user_settings.clone())?;
                        settings.merge(user_settings);
                    }
                }
                Err(err) => {
                    warn!(path = %filepath.display(), "Ignoring unreadable configuration: {err}");
                }
            }
        }
        debug!(path = %filepath.display(), ?settings, "Loaded configuration");

        Ok(Self { settings, filepath })
    }

    pub fn filepath(&self) -> &PathBuf {
        &self.filepath
    }

    /// Save current configuration to file
    pub fn save(&self) -> Result<()> {
        let config_json = serde_json::json!({
            "Setting": self.settings,
        });
        let config_str = serde_json::to_string_pretty(&config_json)?;

        if let Some(parent) = self.filepath.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.filepath, config_str)?;
        Ok(())
    }

    /// Database file, next to the configuration unless overridden.
    pub fn database_path(&self) -> PathBuf {
        match &self.settings.database_file {
            Some(path) => path.clone(),
            None => self
                .filepath
                .parent()
                .map(|dir| dir.join(DATABASE_FILE))
                .unwrap_or_else(|| PathBuf::from(DATABASE_FILE)),
        }
    }

    pub fn import_options(&self) -> ImportOptions {
        ImportOptions {
            encoding: self.settings.encoding.clone(),
        }
    }
}

pub fn get_app_data_prefix() -> Result<PathBuf> {
    if let Some(config_home) = std::env::var_os("XDG_CONFIG_HOME") {
        return Ok(PathBuf::from(config_home).join("novelshelf"));
    } else if let Some(home) = std::env::var_os("HOME") {
        let path = PathBuf::from(home.clone()).join(".config").join("novelshelf");
        if path.exists() {
            return Ok(path);
        } else {
            return Ok(PathBuf::from(home).join(".novelshelf"));
        }
    } else if let Some(user_profile) = std::env::var_os("USERPROFILE") {
        return Ok(PathBuf::from(user_profile).join(".novelshelf"));
    }

    Err(crate::error::Error::AppDataDir.into())
}
