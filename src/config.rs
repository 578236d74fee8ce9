use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::constants::{DEFAULT_BUSY_TIMEOUT_MS, DEFAULT_DATABASE, DEFAULT_INPUT_DIR, DEFAULT_LOG_DIR};
use crate::error::{Result, StatsError};
use crate::pipeline::storage::{ImportMode, Store};

pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub paths: PathsConfig,
    pub import: ImportConfig,
    pub cleaning: CleaningConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Directory holding the raw `<dataset>.csv` files
    pub input_dir: PathBuf,
    /// Where cleaned files and the removed-rows log go; defaults to `input_dir`
    pub output_dir: Option<PathBuf>,
    pub database: PathBuf,
    pub log_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from(DEFAULT_INPUT_DIR),
            output_dir: None,
            database: PathBuf::from(DEFAULT_DATABASE),
            log_dir: PathBuf::from(DEFAULT_LOG_DIR),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ImportConfig {
    pub mode: ImportMode,
    pub busy_timeout_ms: u64,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            mode: ImportMode::CreateOrReplace,
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CleaningConfig {
    /// Blocking tasks used per dataset; 1 cleans sequentially
    pub workers: usize,
}

impl Default for CleaningConfig {
    fn default() -> Self {
        Self { workers: 1 }
    }
}

impl Config {
    /// Load from `path`. A missing file yields the defaults; a malformed one is an error.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let content = fs::read_to_string(path).map_err(|e| {
                StatsError::Config(format!("Failed to read config file '{}': {}", path.display(), e))
            })?;
            toml::from_str(&content)?
        } else {
            Config::default()
        };
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    fn apply_env(&mut self) {
        if let Ok(dir) = env::var("STATS_INPUT_DIR") {
            self.paths.input_dir = PathBuf::from(dir);
        }
        if let Ok(dir) = env::var("STATS_OUTPUT_DIR") {
            self.paths.output_dir = Some(PathBuf::from(dir));
        }
        if let Ok(db) = env::var("STATS_DATABASE") {
            self.paths.database = PathBuf::from(db);
        }
        if let Ok(dir) = env::var("STATS_LOG_DIR") {
            self.paths.log_dir = PathBuf::from(dir);
        }
    }

    fn validate(&self) -> Result<()> {
        if self.cleaning.workers == 0 {
            return Err(StatsError::Config("cleaning.workers must be at least 1".to_string()));
        }
        Ok(())
    }

    pub fn output_dir(&self) -> &Path {
        self.paths.output_dir.as_deref().unwrap_or(&self.paths.input_dir)
    }

    pub fn store(&self) -> Store {
        Store::new(
            self.paths.database.clone(),
            Duration::from_millis(self.import.busy_timeout_ms),
        )
    }
}
