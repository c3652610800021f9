pub mod batch;
pub mod builder;

use tracing::debug;

use crate::{
    context::ContextExtractor,
    dataflow::{self, DataflowInput, DataflowOutput},
    document::Document,
    error::{AltTextError, ConfigError, Result},
    options::{ExecutionMode, GenerationOptions},
    traits::EngineSet,
    types::{Association, Context, ImageRef, content_hash},
};

/// Engines plus fixed options; generates alt-text for images of any document
#[derive(Debug, Clone)]
pub struct Pipeline {
    engines: EngineSet,
    options: GenerationOptions,
    context: ContextExtractor,
}

impl Pipeline {
    /// Create a new pipeline builder
    pub fn builder() -> builder::PipelineBuilder {
        builder::PipelineBuilder::new()
    }

    /// Fails when the options are invalid or the dataflow version needs an
    /// engine the set does not have
    pub fn new(engines: EngineSet, options: GenerationOptions) -> Result<Self, ConfigError> {
        options.validate()?;
        options.version.check(&engines)?;
        Ok(Self {
            context: ContextExtractor::new(options.max_context_hops),
            engines,
            options,
        })
    }

    /// Same engines, different options
    pub fn with_options(&self, options: GenerationOptions) -> Result<Self, ConfigError> {
        Self::new(self.engines.clone(), options)
    }

    pub fn options(&self) -> &GenerationOptions {
        &self.options
    }

    pub fn engines(&self) -> &EngineSet {
        &self.engines
    }

    pub fn extract_context(&self, document: &dyn Document, image: &ImageRef) -> Context {
        self.context.extract(document, image)
    }

    /// Alt-text for the first image with this `src`
    pub async fn gen_alt_text(&self, document: &dyn Document, source: &str) -> Result<String> {
        let image = document.find_image(source)?;
        let bytes = document.image_bytes(source).await?;
        Ok(self.generate(document, &image, source, &bytes).await?.alt)
    }

    /// Alt-text, and the content hash when `withHash` is set, for one image
    pub async fn gen_association(
        &self,
        document: &dyn Document,
        image: &ImageRef,
    ) -> Result<Association> {
        let source = image.source().ok_or(AltTextError::MissingSource)?;
        let bytes = document.image_bytes(source).await?;
        let output = self.generate(document, image, source, &bytes).await?;

        let mut association = Association::new(source, output.alt);
        association.refined_description = output.refined_description;
        if self.options.with_hash {
            association = association.with_hash(content_hash(&bytes));
        }
        Ok(association)
    }

    async fn generate(
        &self,
        document: &dyn Document,
        image: &ImageRef,
        source: &str,
        bytes: &[u8],
    ) -> Result<DataflowOutput> {
        let context = self
            .options
            .with_context
            .then(|| self.extract_context(document, image));
        debug!(
            src = %source,
            version = %self.options.version,
            has_context = context.as_ref().is_some_and(|c| !c.is_empty()),
            "Generating alt-text"
        );

        dataflow::run(
            self.options.version,
            &self.engines,
            DataflowInput {
                source,
                image: bytes,
                context: context.as_ref(),
            },
            self.options.engine_timeout(),
        )
        .await
    }

    /// Get information about the pipeline configuration
    pub fn info(&self) -> String {
        let capabilities = self.engines.capabilities();
        format!(
            "Pipeline: dataflow {}, ocr {}, refiner {}, context {}, hash {}, {}",
            self.options.version,
            if capabilities.ocr { "on" } else { "off" },
            if capabilities.refiner { "on" } else { "off" },
            if self.options.with_context { "on" } else { "off" },
            if self.options.with_hash { "on" } else { "off" },
            match self.options.execution_mode() {
                ExecutionMode::Sequential => "sequential".to_string(),
                ExecutionMode::Concurrent { limit } =>
                    format!("concurrent (max {})", limit),
            }
        )
    }
}
