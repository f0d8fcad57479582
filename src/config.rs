// Configuration
// Settings read from conboy.toml in the platform config directory.

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::error::{NoteError, Result};
use crate::note::DEFAULT_SIZE;

const QUALIFIER: &str = "org";
const ORGANIZATION: &str = "Conboy";
const APPLICATION: &str = "conboy";
const CONFIG_FILE_NAME: &str = "conboy.toml";
const NOTES_DIR_NAME: &str = "notes";

/// Where notes are kept
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    #[default]
    File,
    Memory,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory holding the `.note` files; platform data dir when unset
    pub notes_dir: Option<PathBuf>,
    pub store: StoreKind,
    /// Seconds without edits before a changed note is saved
    pub autosave_delay_secs: u64,
    pub default_width: i32,
    pub default_height: i32,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            notes_dir: None,
            store: StoreKind::File,
            autosave_delay_secs: 4,
            default_width: DEFAULT_SIZE,
            default_height: DEFAULT_SIZE,
        }
    }
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from(QUALIFIER, ORGANIZATION, APPLICATION)
}

pub fn config_file_path() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
}

impl Config {
    /// Load the configuration from the default location
    pub fn load() -> Config {
        match config_file_path() {
            Some(path) => Config::load_or_default(&path),
            None => Config::default(),
        }
    }

    /// Like `from_path`, but a missing or broken file gives the defaults
    pub fn load_or_default(path: &Path) -> Config {
        if !path.exists() {
            return Config::default();
        }
        match Config::from_path(path) {
            Ok(config) => config,
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "using default configuration");
                Config::default()
            }
        }
    }

    pub fn from_path(path: &Path) -> Result<Config> {
        let contents = fs::read_to_string(path)?;
        toml::from_str(&contents)
            .map_err(|err| NoteError::Config(format!("{}: {err}", path.display())))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let toml = toml::to_string_pretty(self)
            .map_err(|err| NoteError::Config(format!("toml serialization error: {err}")))?;
        fs::write(path, toml)?;
        Ok(())
    }

    pub fn notes_dir(&self) -> PathBuf {
        self.notes_dir
            .clone()
            .or_else(|| project_dirs().map(|dirs| dirs.data_dir().join(NOTES_DIR_NAME)))
            .unwrap_or_else(|| PathBuf::from(NOTES_DIR_NAME))
    }

    pub fn autosave_delay(&self) -> Duration {
        Duration::from_secs(self.autosave_delay_secs)
    }
}
