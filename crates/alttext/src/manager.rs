use std::path::{Path, PathBuf};
use std::sync::Arc;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr, VariantNames};
use tracing::{debug, info};

use crate::{
    document::{self, Document, EpubDocument, HtmlDocument},
    error::{AltTextError, ConfigError, Result, Stage},
    pipeline::Pipeline,
    traits::LanguageRefiner,
    types::{Association, ImageRef},
};

#[derive(
    Debug, Clone,
    Serialize, Deserialize, JsonSchema,
    Display, EnumString, VariantNames, IntoStaticStr,
    PartialEq, Eq
)]
#[serde(tag = "type", content = "params")]
#[strum(serialize_all = "snake_case")]
pub enum AltTextCommand {
    /// Generate alt-text for every image with no usable description
    #[serde(rename = "generate_missing")]
    GenerateMissing,

    /// Generate alt-text for every image, replacing existing descriptions
    #[serde(rename = "generate_all")]
    GenerateAll,

    /// Generate alt-text for the named image sources only
    #[serde(rename = "generate_for")]
    GenerateFor {
        #[schemars(length(min = 1))]
        sources: Vec<String>,
    },
}

impl AltTextCommand {
    /// Get the JSON schema for all commands
    pub fn schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(AltTextCommand)
    }

    /// Get a list of all available command names
    pub fn command_names() -> &'static [&'static str] {
        <Self as VariantNames>::VARIANTS
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::GenerateMissing => "Generate alt-text for images whose alt attribute is absent or blank",
            Self::GenerateAll => "Generate alt-text for every image in the document",
            Self::GenerateFor { .. } => "Generate alt-text for the images with the given src values",
        }
    }
}

/// Session over one document: parse, generate, apply, export
pub struct AltTextManager {
    document: Option<Box<dyn Document>>,
    pipeline: Arc<Pipeline>,
}

impl AltTextManager {
    pub fn new(pipeline: Pipeline) -> Self {
        Self::with_shared_pipeline(Arc::new(pipeline))
    }

    pub fn with_shared_pipeline(pipeline: Arc<Pipeline>) -> Self {
        Self {
            document: None,
            pipeline,
        }
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Replace the loaded document
    pub fn load(&mut self, document: impl Document + 'static) {
        self.document = Some(Box::new(document));
    }

    pub fn load_boxed(&mut self, document: Box<dyn Document>) {
        self.document = Some(document);
    }

    pub fn parse_html(&mut self, markup: &str) -> Result<()> {
        self.load(HtmlDocument::parse(markup)?);
        Ok(())
    }

    pub fn parse_epub(&mut self, bytes: &[u8]) -> Result<()> {
        self.load(EpubDocument::from_bytes(bytes)?);
        Ok(())
    }

    /// Parse an HTML or EPUB file, chosen by extension
    pub fn parse_file(&mut self, path: &Path) -> Result<()> {
        self.load_boxed(document::open(path)?);
        info!(path = %path.display(), "Loaded document");
        Ok(())
    }

    pub fn document(&self) -> Result<&dyn Document> {
        self.document
            .as_deref()
            .ok_or(AltTextError::NoDocumentLoaded)
    }

    fn document_mut(&mut self) -> Result<&mut (dyn Document + 'static)> {
        self.document
            .as_deref_mut()
            .ok_or(AltTextError::NoDocumentLoaded)
    }

    pub fn images_missing_description(&self) -> Result<Vec<ImageRef>> {
        Ok(self.document()?.missing_description_images())
    }

    /// Generate associations without touching the document
    pub async fn execute(&self, command: AltTextCommand) -> Result<Vec<Association>> {
        let document = self.document()?;
        let images = match &command {
            AltTextCommand::GenerateMissing => document.missing_description_images(),
            AltTextCommand::GenerateAll => document.all_images(),
            AltTextCommand::GenerateFor { sources } => sources
                .iter()
                .map(|source| document.find_image(source))
                .collect::<Result<Vec<_>>>()?,
        };
        debug!(command = %command, images = images.len(), "Executing command");
        self.pipeline.gen_alt_associations(document, &images).await
    }

    /// Write associations back into the document
    pub fn apply(&mut self, associations: &[Association]) -> Result<Vec<ImageRef>> {
        self.document_mut()?.set_descriptions(associations)
    }

    /// Generate for every image missing a description, then apply the results
    pub async fn remediate(&mut self) -> Result<Vec<Association>> {
        let associations = self.execute(AltTextCommand::GenerateMissing).await?;
        self.apply(&associations)?;
        info!(updated = associations.len(), "Remediated document");
        Ok(associations)
    }

    pub fn export(&self) -> Result<Vec<u8>> {
        self.document()?.export()
    }

    pub fn export_to_file(&self, path: &Path) -> Result<PathBuf> {
        self.document()?.export_to_file(path)
    }

    fn refiner(&self, operation: &'static str) -> Result<&dyn LanguageRefiner> {
        self.pipeline
            .engines()
            .refiner()
            .ok_or(AltTextError::Config(ConfigError::NoLanguageEngine { operation }))
    }

    /// Hand the current document to the language engine for retrieval
    pub async fn ingest(&self) -> Result<bool> {
        let refiner = self.refiner("ingest")?;
        let document = self.document()?;
        let bytes = document.export()?;
        refiner
            .ingest(document.name(), &bytes)
            .await
            .map_err(|error| AltTextError::Engine {
                stage: Stage::Ingestion,
                src: document.name().to_string(),
                error,
            })
    }

    /// Remove the current document from the language engine
    pub async fn degest(&self) -> Result<bool> {
        let refiner = self.refiner("degest")?;
        let document = self.document()?;
        refiner
            .remove(document.name())
            .await
            .map_err(|error| AltTextError::Engine {
                stage: Stage::Ingestion,
                src: document.name().to_string(),
                error,
            })
    }
}
