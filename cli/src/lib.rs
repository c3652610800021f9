use alttext::{Association, ConfigError, GenerationOptions};
use engines::EngineConfig;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error(transparent)]
    SerdeError(#[from] serde_json::Error),
    #[error(transparent)]
    TomlDeError(#[from] toml::de::Error),
    #[error(transparent)]
    TomlSerError(#[from] toml::ser::Error),
    #[error(transparent)]
    IoError(#[from] std::io::Error),
    #[error(transparent)]
    InvalidOptions(#[from] ConfigError),
    #[error("Unsupported file format. Please use .toml or .json files")]
    UnsupportedFileFormat,
}

/// Everything a run needs besides the document: generation options and engines
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(default)]
pub struct RunConfig {
    pub options: GenerationOptions,
    pub engines: EngineConfig,
}

impl RunConfig {
    /// Load RunConfig from a TOML file
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self, CliError> {
        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, CliError> {
        let config: RunConfig = toml::from_str(content)?;
        config.options.validate()?;
        Ok(config)
    }

    /// Load RunConfig from a JSON file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, CliError> {
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self, CliError> {
        let config: RunConfig = serde_json::from_str(content)?;
        config.options.validate()?;
        Ok(config)
    }

    /// Auto-detect file format and load configuration
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, CliError> {
        let path_ref = path.as_ref();
        match path_ref.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Self::from_toml_file(path),
            Some("json") => Self::from_json_file(path),
            _ => Err(CliError::UnsupportedFileFormat),
        }
    }

    /// Apply a JSON object of option overrides on top of the loaded options
    pub fn with_option_overrides(mut self, overrides: &str) -> Result<Self, CliError> {
        let overrides: serde_json::Map<String, serde_json::Value> = serde_json::from_str(overrides)?;
        self.options = self.options.merged_with(&overrides)?;
        Ok(self)
    }

    pub fn to_toml(&self) -> Result<String, CliError> {
        Ok(toml::to_string_pretty(&self)?)
    }

    pub fn to_json(&self) -> Result<String, CliError> {
        Ok(serde_json::to_string_pretty(&self)?)
    }

    pub fn schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(RunConfig)
    }
}

/// Read reviewed associations from a JSON array
pub fn read_associations<P: AsRef<Path>>(path: P) -> Result<Vec<Association>, CliError> {
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

pub fn write_associations<P: AsRef<Path>>(
    path: P,
    associations: &[Association],
) -> Result<(), CliError> {
    fs::write(path, serde_json::to_string_pretty(associations)?)?;
    Ok(())
}
