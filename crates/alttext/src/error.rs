use std::time::Duration;

use strum::{Display, IntoStaticStr};
use thiserror::Error;

/// Pipeline stage an engine call belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum Stage {
    Description,
    Ocr,
    Refinement,
    Ingestion,
}

#[derive(Error, Debug)]
pub enum AltTextError {
    #[error("No document parsed. Use parse_html, parse_epub or parse_file first")]
    NoDocumentLoaded,

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Image not found: {src}")]
    ImageNotFound { src: String },

    #[error("Image element has no src attribute")]
    MissingSource,

    #[error("Unsupported image source '{src}': {reason}")]
    UnsupportedSource { src: String, reason: String },

    #[error("{stage} failed for image '{src}': {error}")]
    Engine {
        stage: Stage,
        src: String,
        #[source]
        error: EngineError,
    },

    #[error("{stage} timed out after {timeout:?} for image '{src}'")]
    Timeout {
        stage: Stage,
        src: String,
        timeout: Duration,
    },

    #[error("Markup error: {0}")]
    Markup(String),

    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Problems with how a pipeline or session was put together
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("A description engine is required")]
    MissingDescriptionEngine,

    #[error("Dataflow version {version} requires a language refiner engine")]
    MissingRefiner { version: u8 },

    #[error("To use {operation}, a language engine must be set")]
    NoLanguageEngine { operation: &'static str },

    #[error("Unknown dataflow version {0}; expected 1 or 2")]
    InvalidVersion(u8),

    #[error("Invalid option '{key}': {message}")]
    InvalidOption { key: String, message: String },
}

/// Failure reported by an external engine
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Request failed: {0}")]
    Request(String),

    #[error("Unexpected response: {0}")]
    InvalidResponse(String),

    #[error("Engine process failed: {0}")]
    Process(String),

    #[error("{engine} does not support {operation}")]
    Unsupported {
        engine: &'static str,
        operation: &'static str,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = AltTextError> = std::result::Result<T, E>;
