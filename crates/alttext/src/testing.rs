//! Deterministic engines for unit tests

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use crate::{
    error::EngineError,
    traits::{DescriptionEngine, LanguageRefiner, OcrEngine},
    types::Context,
};

/// Describes every image as `TEST {source}`
pub struct EchoDescription;

#[async_trait]
impl DescriptionEngine for EchoDescription {
    async fn generate(
        &self,
        _image: &[u8],
        source: &str,
        _context: Option<&Context>,
    ) -> Result<String, EngineError> {
        Ok(format!("TEST {}", source))
    }
}

pub struct FailingDescription;

#[async_trait]
impl DescriptionEngine for FailingDescription {
    async fn generate(
        &self,
        _image: &[u8],
        source: &str,
        _context: Option<&Context>,
    ) -> Result<String, EngineError> {
        Err(EngineError::Request(format!("model unavailable for {}", source)))
    }
}

/// Fails only for the given source
pub struct FailOn(pub &'static str);

#[async_trait]
impl DescriptionEngine for FailOn {
    async fn generate(
        &self,
        _image: &[u8],
        source: &str,
        _context: Option<&Context>,
    ) -> Result<String, EngineError> {
        if source == self.0 {
            Err(EngineError::InvalidResponse("empty completion".to_string()))
        } else {
            Ok(format!("TEST {}", source))
        }
    }
}

pub struct SlowDescription(pub Duration);

#[async_trait]
impl DescriptionEngine for SlowDescription {
    async fn generate(
        &self,
        _image: &[u8],
        source: &str,
        _context: Option<&Context>,
    ) -> Result<String, EngineError> {
        tokio::time::sleep(self.0).await;
        Ok(format!("TEST {}", source))
    }
}

/// Tracks the highest number of calls in flight at once
#[derive(Default)]
pub struct ConcurrencyProbe {
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl ConcurrencyProbe {
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DescriptionEngine for ConcurrencyProbe {
    async fn generate(
        &self,
        _image: &[u8],
        source: &str,
        _context: Option<&Context>,
    ) -> Result<String, EngineError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(10)).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(format!("TEST {}", source))
    }
}

/// Describes an image as `{before}|{after}` of the context it was given
pub struct EchoContext;

#[async_trait]
impl DescriptionEngine for EchoContext {
    async fn generate(
        &self,
        _image: &[u8],
        _source: &str,
        context: Option<&Context>,
    ) -> Result<String, EngineError> {
        let context = context.cloned().unwrap_or_default();
        Ok(format!(
            "{}|{}",
            context.before.unwrap_or_default(),
            context.after.unwrap_or_default()
        ))
    }
}

pub struct StaticOcr(pub &'static str);

#[async_trait]
impl OcrEngine for StaticOcr {
    async fn generate(
        &self,
        _image: &[u8],
        _source: &str,
        _context: Option<&Context>,
    ) -> Result<String, EngineError> {
        Ok(self.0.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefineCall {
    pub description: String,
    pub ocr_text: Option<String>,
    pub context: Option<Context>,
    pub caption: Option<String>,
}

/// Wraps its inputs in markers and records `refine` calls and ingested names
#[derive(Default)]
pub struct RecordingRefiner {
    calls: Mutex<Vec<RefineCall>>,
    ingested: Mutex<Vec<String>>,
}

impl RecordingRefiner {
    pub fn refine_calls(&self) -> Vec<RefineCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn ingested(&self) -> Vec<String> {
        self.ingested.lock().unwrap().clone()
    }
}

#[async_trait]
impl LanguageRefiner for RecordingRefiner {
    async fn refine_description(&self, description: &str) -> Result<String, EngineError> {
        Ok(format!("desc({})", description))
    }

    async fn refine_ocr(&self, text: &str) -> Result<String, EngineError> {
        Ok(format!("ocr({})", text))
    }

    async fn refine(
        &self,
        description: &str,
        ocr_text: Option<&str>,
        context: Option<&Context>,
        caption: Option<&str>,
    ) -> Result<String, EngineError> {
        self.calls.lock().unwrap().push(RefineCall {
            description: description.to_string(),
            ocr_text: ocr_text.map(str::to_string),
            context: context.cloned(),
            caption: caption.map(str::to_string),
        });
        Ok(format!("alt({}|{})", description, ocr_text.unwrap_or_default()))
    }

    async fn ingest(&self, name: &str, _binary: &[u8]) -> Result<bool, EngineError> {
        self.ingested.lock().unwrap().push(name.to_string());
        Ok(true)
    }

    async fn remove(&self, name: &str) -> Result<bool, EngineError> {
        let mut ingested = self.ingested.lock().unwrap();
        let before = ingested.len();
        ingested.retain(|n| n != name);
        Ok(ingested.len() != before)
    }
}
