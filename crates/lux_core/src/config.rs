//! Scene loader configuration.
//!
//! Stored as JSON or TOML, selected by file extension.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::resolver::FileResolver;
use crate::variant::{self, VariantId, DEFAULT_VARIANT};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Serialization error: {0}")]
    Serialize(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Unknown variant \"{0}\"")]
    UnknownVariant(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Format {
    Json,
    Toml,
}

impl Format {
    fn of(path: &Path) -> Result<Self, ConfigError> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Ok(Format::Json),
            Some("toml") => Ok(Format::Toml),
            _ => Err(ConfigError::UnsupportedFormat(path.display().to_string())),
        }
    }
}

/// Settings for building scenes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Variant name, e.g. `"scalar_rgb"`.
    pub variant: String,
    /// Extra directories appended to the file resolver.
    pub search_paths: Vec<PathBuf>,
    /// Fail on properties a plugin did not use.
    pub strict: bool,
    /// Log declared nodes nothing references.
    pub warn_unreferenced: bool,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            variant: DEFAULT_VARIANT.name().to_string(),
            search_paths: Vec::new(),
            strict: false,
            warn_unreferenced: true,
        }
    }
}

impl LoaderConfig {
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let format = Format::of(path)?;
        let contents = std::fs::read_to_string(path)?;
        let config = match format {
            Format::Json => {
                serde_json::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))?
            }
            Format::Toml => toml::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))?,
        };
        log::debug!("loaded loader config from {}", path.display());
        Ok(config)
    }

    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let contents = match Format::of(path)? {
            Format::Json => serde_json::to_string_pretty(self)
                .map_err(|e| ConfigError::Serialize(e.to_string()))?,
            Format::Toml => {
                toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?
            }
        };
        std::fs::write(path, contents)?;
        Ok(())
    }

    pub fn variant_id(&self) -> Result<VariantId, ConfigError> {
        variant::by_name(&self.variant).ok_or_else(|| ConfigError::UnknownVariant(self.variant.clone()))
    }

    /// The default resolver extended with `search_paths`.
    pub fn file_resolver(&self) -> FileResolver {
        let mut resolver = FileResolver::new();
        for path in &self.search_paths {
            resolver.append(path.clone());
        }
        resolver
    }
}
