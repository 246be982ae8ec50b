use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ExtractoError, Result};

const DB_FILE: &str = "extracto.db";

/// User settings, stored as pretty JSON. Fields missing from the file keep
/// their defaults.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub data_dir: PathBuf,
    /// Field separator assumed for CSV statements until the file suggests another.
    pub csv_delimiter: char,
    /// Account used by `import` when `--account` is not given.
    pub default_account: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: home().join("Documents").join("extracto"),
            csv_delimiter: ',',
            default_account: None,
        }
    }
}

fn home() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from("."))
}

/// `$EXTRACTO_CONFIG_DIR`, or `~/.config/extracto`.
fn config_dir() -> PathBuf {
    match std::env::var_os("EXTRACTO_CONFIG_DIR") {
        Some(dir) => PathBuf::from(dir),
        None => home().join(".config").join("extracto"),
    }
}

impl Settings {
    pub fn load() -> Self {
        Self::load_from(&config_dir().join("settings.json"))
    }

    /// A missing file yields the defaults. So does an unreadable one, with a
    /// warning, so a bad edit never locks the user out of the tool.
    pub fn load_from(path: &Path) -> Self {
        let Ok(content) = std::fs::read_to_string(path) else {
            return Self::default();
        };
        serde_json::from_str(&content).unwrap_or_else(|e| {
            warn!(path = %path.display(), error = %e, "ignoring unreadable settings");
            Self::default()
        })
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&config_dir().join("settings.json"))
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| ExtractoError::Settings(e.to_string()))?;
        std::fs::write(path, format!("{json}\n"))?;
        Ok(())
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join(DB_FILE)
    }
}

/// Turn a user-typed directory into an absolute path: `~` expands to the
/// home directory, relative paths hang off the working directory.
pub fn resolve_data_dir(raw: &str) -> Result<PathBuf> {
    let path = match raw.strip_prefix('~') {
        Some(rest) => home().join(rest.trim_start_matches('/')),
        None => PathBuf::from(raw),
    };
    if path.is_absolute() {
        Ok(path)
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}
