use std::sync::Arc;

use async_trait::async_trait;

use crate::{error::EngineError, types::Context};

/// Produces a natural-language description of an image
#[async_trait]
pub trait DescriptionEngine: Send + Sync {
    /// Describe the image, optionally using the text that surrounds it
    async fn generate(
        &self,
        image: &[u8],
        source: &str,
        context: Option<&Context>,
    ) -> Result<String, EngineError>;
}

/// Reads the characters visible in an image
#[async_trait]
pub trait OcrEngine: Send + Sync {
    async fn generate(
        &self,
        image: &[u8],
        source: &str,
        context: Option<&Context>,
    ) -> Result<String, EngineError>;
}

/// Language model used to polish or compose alt-text
#[async_trait]
pub trait LanguageRefiner: Send + Sync {
    /// Refine a raw image description on its own
    async fn refine_description(&self, description: &str) -> Result<String, EngineError>;

    /// Clean up raw OCR output on its own
    async fn refine_ocr(&self, text: &str) -> Result<String, EngineError>;

    /// Compose one alt-text from every signal gathered for an image
    async fn refine(
        &self,
        description: &str,
        ocr_text: Option<&str>,
        context: Option<&Context>,
        caption: Option<&str>,
    ) -> Result<String, EngineError>;

    /// Make a document available for retrieval-augmented refinement
    async fn ingest(&self, name: &str, binary: &[u8]) -> Result<bool, EngineError>;

    /// Forget a previously ingested document
    async fn remove(&self, name: &str) -> Result<bool, EngineError>;
}

/// Which optional engines are present
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
    pub ocr: bool,
    pub refiner: bool,
}

impl Capabilities {
    /// True when every capability in `required` is present here
    pub fn satisfies(&self, required: Capabilities) -> bool {
        (!required.ocr || self.ocr) && (!required.refiner || self.refiner)
    }
}

/// The engines a pipeline drives. Only the description engine is mandatory.
#[derive(Clone)]
pub struct EngineSet {
    description: Arc<dyn DescriptionEngine>,
    ocr: Option<Arc<dyn OcrEngine>>,
    refiner: Option<Arc<dyn LanguageRefiner>>,
}

impl EngineSet {
    pub fn new(description: Arc<dyn DescriptionEngine>) -> Self {
        Self {
            description,
            ocr: None,
            refiner: None,
        }
    }

    pub fn with_ocr(mut self, ocr: Arc<dyn OcrEngine>) -> Self {
        self.ocr = Some(ocr);
        self
    }

    pub fn with_refiner(mut self, refiner: Arc<dyn LanguageRefiner>) -> Self {
        self.refiner = Some(refiner);
        self
    }

    pub fn description(&self) -> &dyn DescriptionEngine {
        self.description.as_ref()
    }

    pub fn ocr(&self) -> Option<&dyn OcrEngine> {
        self.ocr.as_deref()
    }

    pub fn refiner(&self) -> Option<&dyn LanguageRefiner> {
        self.refiner.as_deref()
    }

    pub fn description_shared(&self) -> Arc<dyn DescriptionEngine> {
        Arc::clone(&self.description)
    }

    pub fn ocr_shared(&self) -> Option<Arc<dyn OcrEngine>> {
        self.ocr.clone()
    }

    pub fn refiner_shared(&self) -> Option<Arc<dyn LanguageRefiner>> {
        self.refiner.clone()
    }

    pub fn capabilities(&self) -> Capabilities {
        Capabilities {
            ocr: self.ocr.is_some(),
            refiner: self.refiner.is_some(),
        }
    }
}

impl std::fmt::Debug for EngineSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineSet")
            .field("capabilities", &self.capabilities())
            .finish()
    }
}
