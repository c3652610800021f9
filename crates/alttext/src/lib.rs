//! # Alt-Text Generation Library
//!
//! Finds images without descriptive text in HTML pages and EPUB packages,
//! asks pluggable engines to describe them, and writes the result back.
//!
//! ## Core Features
//!
//! - **Trait-based engines**: description, OCR and language refinement are
//!   capability traits; only the description engine is mandatory
//! - **Two dataflows**: labeled concatenation (v1) or a single refined
//!   composition (v2), checked against the configured engines at build time
//! - **Context extraction**: nearest non-empty text before and after each image
//! - **Bounded batches**: sequential or concurrent generation with a cap on
//!   images in flight and optional per-call timeouts
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use alttext::{AltTextManager, DataflowVersion, Pipeline};
//! # use alttext::{Context, DescriptionEngine, EngineError};
//! # struct Captioner;
//! # #[async_trait::async_trait]
//! # impl DescriptionEngine for Captioner {
//! #     async fn generate(&self, _: &[u8], _: &str, _: Option<&Context>) -> Result<String, EngineError> {
//! #         Ok("A red barn".into())
//! #     }
//! # }
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let pipeline = Pipeline::builder()
//!     .description_engine(Captioner)
//!     .version(DataflowVersion::V1)
//!     .build()?;
//!
//! let mut manager = AltTextManager::new(pipeline);
//! manager.parse_file("book/chapter.html".as_ref())?;
//! let associations = manager.remediate().await?;
//! manager.export_to_file("out/chapter.html".as_ref())?;
//! # Ok(())
//! # }
//! ```

pub mod context;
pub mod dataflow;
pub mod document;
pub mod error;
pub mod manager;
pub mod options;
pub mod pipeline;
pub mod traits;
pub mod types;

#[cfg(test)]
mod testing;

pub use context::ContextExtractor;
pub use dataflow::DataflowVersion;
pub use document::{Document, EpubDocument, HtmlDocument, open};
pub use error::{AltTextError, ConfigError, EngineError, Result, Stage};
pub use manager::{AltTextCommand, AltTextManager};
pub use options::{ExecutionMode, GenerationOptions};
pub use pipeline::{Pipeline, builder::PipelineBuilder};
pub use traits::*;
pub use types::{Association, Context, ImageRef, content_hash};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_pipeline_needs_refiner() {
        let err = Pipeline::builder()
            .description_engine(testing::EchoDescription)
            .build()
            .unwrap_err();
        assert_eq!(err.to_string(), "Dataflow version 2 requires a language refiner engine");
    }

    #[test]
    fn test_pipeline_info() {
        let pipeline = Pipeline::builder()
            .description_engine(testing::EchoDescription)
            .refiner(testing::RecordingRefiner::default())
            .build()
            .unwrap();
        assert_eq!(
            pipeline.info(),
            "Pipeline: dataflow v2, ocr off, refiner on, context on, hash on, concurrent (max 8)"
        );
    }
}
