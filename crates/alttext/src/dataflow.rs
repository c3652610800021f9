//! The two strategies for turning per-image signals into alt-text.
//!
//! Version 1 labels the raw description and the OCR text and concatenates
//! them. Version 2 hands every signal to a language refiner and returns
//! its single composition unchanged.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use strum::Display;
use tracing::debug;

use crate::{
    error::{AltTextError, ConfigError, EngineError, Result, Stage},
    traits::{Capabilities, EngineSet},
    types::Context,
};

pub const CAPTION_LABEL: &str = "IMAGE CAPTION: ";
pub const OCR_LABEL: &str = "TEXT IN IMAGE: ";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(try_from = "u8", into = "u8")]
pub enum DataflowVersion {
    #[strum(serialize = "v1")]
    V1,
    #[default]
    #[strum(serialize = "v2")]
    V2,
}

impl DataflowVersion {
    pub fn number(self) -> u8 {
        match self {
            Self::V1 => 1,
            Self::V2 => 2,
        }
    }

    /// Engines this strategy cannot run without, beyond the description engine
    pub fn required_capabilities(self) -> Capabilities {
        match self {
            Self::V1 => Capabilities::default(),
            Self::V2 => Capabilities {
                ocr: false,
                refiner: true,
            },
        }
    }

    pub fn check(self, engines: &EngineSet) -> std::result::Result<(), ConfigError> {
        if engines
            .capabilities()
            .satisfies(self.required_capabilities())
        {
            Ok(())
        } else {
            Err(ConfigError::MissingRefiner {
                version: self.number(),
            })
        }
    }
}

impl TryFrom<u8> for DataflowVersion {
    type Error = ConfigError;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::V1),
            2 => Ok(Self::V2),
            other => Err(ConfigError::InvalidVersion(other)),
        }
    }
}

impl From<DataflowVersion> for u8 {
    fn from(version: DataflowVersion) -> Self {
        version.number()
    }
}

/// Signals gathered for one image before any engine runs
#[derive(Debug, Clone, Copy)]
pub struct DataflowInput<'a> {
    pub source: &'a str,
    pub image: &'a [u8],
    pub context: Option<&'a Context>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataflowOutput {
    pub alt: String,
    /// Refined description computed by version 1 when a refiner is present
    pub refined_description: Option<String>,
}

/// Engine calls for a single image, tagged with stage and source on failure
struct EngineCalls<'a> {
    engines: &'a EngineSet,
    source: &'a str,
    timeout: Option<Duration>,
}

impl EngineCalls<'_> {
    async fn call<F>(&self, stage: Stage, call: F) -> Result<String>
    where
        F: Future<Output = std::result::Result<String, EngineError>>,
    {
        debug!(src = %self.source, stage = %stage, "Calling engine");
        let outcome = match self.timeout {
            Some(timeout) => tokio::time::timeout(timeout, call).await.map_err(|_| {
                AltTextError::Timeout {
                    stage,
                    src: self.source.to_string(),
                    timeout,
                }
            })?,
            None => call.await,
        };
        outcome.map_err(|error| AltTextError::Engine {
            stage,
            src: self.source.to_string(),
            error,
        })
    }
}

/// Run the selected strategy for one image
pub async fn run(
    version: DataflowVersion,
    engines: &EngineSet,
    input: DataflowInput<'_>,
    timeout: Option<Duration>,
) -> Result<DataflowOutput> {
    let calls = EngineCalls {
        engines,
        source: input.source,
        timeout,
    };
    match version {
        DataflowVersion::V1 => run_v1(&calls, input).await,
        DataflowVersion::V2 => run_v2(&calls, input).await,
    }
}

async fn run_v1(calls: &EngineCalls<'_>, input: DataflowInput<'_>) -> Result<DataflowOutput> {
    let engines = calls.engines;
    let description = calls
        .call(
            Stage::Description,
            engines
                .description()
                .generate(input.image, input.source, input.context),
        )
        .await?;

    let refined_description = match engines.refiner() {
        Some(refiner) => Some(
            calls
                .call(Stage::Refinement, refiner.refine_description(&description))
                .await?,
        ),
        None => None,
    };

    let mut alt = format!("{}{}", CAPTION_LABEL, description);
    if let Some(ocr) = engines.ocr() {
        let mut chars = calls
            .call(Stage::Ocr, ocr.generate(input.image, input.source, None))
            .await?;
        if let Some(refiner) = engines.refiner() {
            chars = calls
                .call(Stage::Refinement, refiner.refine_ocr(&chars))
                .await?;
        }
        alt.push('\n');
        alt.push_str(OCR_LABEL);
        alt.push_str(&chars);
    }

    Ok(DataflowOutput {
        alt,
        refined_description,
    })
}

async fn run_v2(calls: &EngineCalls<'_>, input: DataflowInput<'_>) -> Result<DataflowOutput> {
    let engines = calls.engines;
    let refiner = engines.refiner().ok_or(ConfigError::MissingRefiner {
        version: DataflowVersion::V2.number(),
    })?;

    let empty = Context::default();
    let context = input.context.unwrap_or(&empty);

    let description = calls
        .call(
            Stage::Description,
            engines
                .description()
                .generate(input.image, input.source, Some(context)),
        )
        .await?;

    let chars = match engines.ocr() {
        Some(ocr) => calls
            .call(Stage::Ocr, ocr.generate(input.image, input.source, None))
            .await?
            .trim()
            .to_string(),
        None => String::new(),
    };
    let ocr_text = (!chars.is_empty()).then_some(chars.as_str());

    let alt = calls
        .call(
            Stage::Refinement,
            refiner.refine(&description, ocr_text, Some(context), None),
        )
        .await?;

    Ok(DataflowOutput {
        alt,
        refined_description: None,
    })
}
