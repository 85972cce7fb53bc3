//! Layered configuration.
//!
//! Values are merged in order, later layers winning:
//!
//! 1. built-in defaults,
//! 2. a configuration file (TOML, YAML or JSON, picked by extension),
//! 3. environment variables prefixed `TANKOBON_`, with `__` separating
//!    sections from keys (`TANKOBON_STORAGE__READ_ONLY=true`).
//!
//! Without an explicit file, `tankobon.toml` in the platform configuration
//! directory is used if it exists.

pub mod error;

use crate::error::{ErrorKind, Result};
use directories::ProjectDirs;
use exn::ResultExt;
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const ENV_PREFIX: &str = "TANKOBON_";
pub const DEFAULT_FILE_NAME: &str = "tankobon.toml";
pub const DEFAULT_MAX_IMAGE_SIZE: usize = 5 * 1024 * 1024;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub storage: StorageConfig,
    pub uploads: UploadConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite database file; parent directories are created on start.
    pub path: PathBuf,
}
impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./data/tankobon.sqlite"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Root of the `series_<id>/chapter_<number>/page_<n>` tree.
    pub images: PathBuf,
    /// Reject every filesystem mutation (maintenance mode).
    pub read_only: bool,
}
impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            images: PathBuf::from("./data/images"),
            read_only: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    /// Largest accepted page image, in bytes.
    pub max_image_size: usize,
}
impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_image_size: DEFAULT_MAX_IMAGE_SIZE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// `tracing_subscriber::EnvFilter` directives, used when `RUST_LOG` is unset.
    pub level: String,
    pub json: bool,
}
impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl Config {
    /// Platform-specific location of the default configuration file.
    pub fn default_file() -> Option<PathBuf> {
        ProjectDirs::from("", "", "tankobon").map(|dirs| dirs.config_dir().join(DEFAULT_FILE_NAME))
    }

    /// Assemble the layered providers without extracting them.
    ///
    /// An explicit `file` must exist; the default file is optional.
    pub fn figment(file: Option<&Path>) -> Result<Figment> {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        let file = match file {
            Some(path) if !path.is_file() => exn::bail!(ErrorKind::MissingFile(path.to_path_buf())),
            Some(path) => Some(path.to_path_buf()),
            None => Self::default_file().filter(|path| path.is_file()),
        };
        if let Some(path) = file {
            tracing::debug!(path = %path.display(), "Reading configuration file");
            figment = match path.extension().and_then(|e| e.to_str()).map(str::to_ascii_lowercase).as_deref() {
                Some("toml") => figment.merge(Toml::file(&path)),
                Some("yaml" | "yml") => figment.merge(Yaml::file(&path)),
                Some("json") => figment.merge(Json::file(&path)),
                other => exn::bail!(ErrorKind::UnsupportedFormat(other.unwrap_or_default().to_string())),
            };
        }
        Ok(figment.merge(Env::prefixed(ENV_PREFIX).split("__")))
    }

    /// Load, merge and validate the configuration.
    pub fn load(file: Option<&Path>) -> Result<Self> {
        Self::from_figment(Self::figment(file)?)
    }

    pub fn from_figment(figment: Figment) -> Result<Self> {
        let config: Config = figment.extract().or_raise(|| ErrorKind::Load)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.database.path.as_os_str().is_empty() {
            exn::bail!(ErrorKind::Invalid("database.path must not be empty".to_string()));
        }
        if self.storage.images.as_os_str().is_empty() {
            exn::bail!(ErrorKind::Invalid("storage.images must not be empty".to_string()));
        }
        if self.uploads.max_image_size == 0 {
            exn::bail!(ErrorKind::Invalid("uploads.max_image_size must be greater than zero".to_string()));
        }
        Ok(())
    }

    /// The images root as an absolute path, resolved against the working
    /// directory when configured relatively.
    pub fn images_root(&self) -> Result<PathBuf> {
        std::path::absolute(&self.storage.images)
            .or_raise(|| ErrorKind::Invalid(format!("storage.images: {}", self.storage.images.display())))
    }
}
