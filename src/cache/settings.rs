//! Persistent user preferences.

use color_eyre::eyre::{Report, Result, WrapErr};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// File name of the settings inside the state directory.
pub const SETTINGS_FILE: &str = "settings.json";

/// Preferences that outlive a session.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(default)]
pub struct Settings {
    pub cache_enabled: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Settings { cache_enabled: true }
    }
}

impl Settings {
    /// Read settings from a JSON file, the defaults are used if it does not exist.
    pub fn read(path: &Path) -> Result<Settings, Report> {
        if !path.exists() {
            return Ok(Settings::default());
        }
        let settings = std::fs::read_to_string(path).wrap_err_with(|| format!("Failed to read file: {path:?}."))?;
        let settings = serde_json::from_str(&settings).wrap_err_with(|| format!("Failed to parse file: {path:?}"))?;
        Ok(settings)
    }

    /// Write settings to a JSON file, creating its parent directory if needed.
    pub fn write(&self, path: &Path) -> Result<(), Report> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)
                    .wrap_err_with(|| format!("Failed to create directory: {parent:?}"))?;
            }
        }
        let mut file = File::create(path).wrap_err_with(|| format!("Failed to create file: {path:?}"))?;
        let output = serde_json::to_string_pretty(self).wrap_err_with(|| format!("Failed to parse: {self:?}"))?;
        file.write_all(format!("{}\n", output).as_bytes())
            .wrap_err_with(|| format!("Failed to write file: {path:?}"))?;
        Ok(())
    }
}
