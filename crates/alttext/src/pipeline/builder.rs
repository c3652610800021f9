use std::sync::Arc;

use crate::{
    dataflow::DataflowVersion,
    error::ConfigError,
    options::GenerationOptions,
    pipeline::Pipeline,
    traits::{DescriptionEngine, EngineSet, LanguageRefiner, OcrEngine},
};

/// Builder for creating pipelines with a fluent API
pub struct PipelineBuilder {
    description: Option<Arc<dyn DescriptionEngine>>,
    ocr: Option<Arc<dyn OcrEngine>>,
    refiner: Option<Arc<dyn LanguageRefiner>>,
    options: GenerationOptions,
}

impl PipelineBuilder {
    /// Create a new pipeline builder with default options
    pub fn new() -> Self {
        Self {
            description: None,
            ocr: None,
            refiner: None,
            options: GenerationOptions::default(),
        }
    }

    /// Set the description engine (replaces any existing one)
    pub fn description_engine<E>(self, engine: E) -> Self
    where
        E: DescriptionEngine + 'static,
    {
        self.description_engine_shared(Arc::new(engine))
    }

    pub fn description_engine_shared(mut self, engine: Arc<dyn DescriptionEngine>) -> Self {
        self.description = Some(engine);
        self
    }

    /// Set the OCR engine (replaces any existing one)
    pub fn ocr_engine<E>(self, engine: E) -> Self
    where
        E: OcrEngine + 'static,
    {
        self.ocr_engine_shared(Arc::new(engine))
    }

    pub fn ocr_engine_shared(mut self, engine: Arc<dyn OcrEngine>) -> Self {
        self.ocr = Some(engine);
        self
    }

    /// Set the language refiner (replaces any existing one)
    pub fn refiner<R>(self, refiner: R) -> Self
    where
        R: LanguageRefiner + 'static,
    {
        self.refiner_shared(Arc::new(refiner))
    }

    pub fn refiner_shared(mut self, refiner: Arc<dyn LanguageRefiner>) -> Self {
        self.refiner = Some(refiner);
        self
    }

    /// Take every engine from an existing set
    pub fn engines(mut self, engines: EngineSet) -> Self {
        self.description = Some(engines.description_shared());
        self.ocr = engines.ocr_shared();
        self.refiner = engines.refiner_shared();
        self
    }

    /// Replace all options
    pub fn options(mut self, options: GenerationOptions) -> Self {
        self.options = options;
        self
    }

    pub fn version(mut self, version: DataflowVersion) -> Self {
        self.options.version = version;
        self
    }

    pub fn with_context(mut self, enabled: bool) -> Self {
        self.options.with_context = enabled;
        self
    }

    pub fn with_hash(mut self, enabled: bool) -> Self {
        self.options.with_hash = enabled;
        self
    }

    /// Run batches one image at a time
    pub fn sequential(mut self) -> Self {
        self.options.multi_threaded = false;
        self
    }

    /// Run batches concurrently with at most `limit` images in flight
    pub fn concurrent(mut self, limit: usize) -> Self {
        self.options.multi_threaded = true;
        self.options.max_concurrency = limit;
        self
    }

    pub fn engine_timeout_secs(mut self, secs: u64) -> Self {
        self.options.engine_timeout_secs = Some(secs);
        self
    }

    pub fn max_context_hops(mut self, hops: usize) -> Self {
        self.options.max_context_hops = Some(hops);
        self
    }

    /// Build the pipeline, checking up front that the dataflow version has
    /// every engine it needs
    pub fn build(self) -> Result<Pipeline, ConfigError> {
        let description = self
            .description
            .ok_or(ConfigError::MissingDescriptionEngine)?;
        let mut engines = EngineSet::new(description);
        if let Some(ocr) = self.ocr {
            engines = engines.with_ocr(ocr);
        }
        if let Some(refiner) = self.refiner {
            engines = engines.with_refiner(refiner);
        }
        Pipeline::new(engines, self.options)
    }
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}
