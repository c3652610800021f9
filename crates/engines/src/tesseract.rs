use std::io::Write;
use std::path::PathBuf;

use alttext::{Context, EngineError, OcrEngine};
use async_trait::async_trait;
use tempfile::NamedTempFile;
use tokio::process::Command;
use tracing::debug;

use crate::error::{ProviderError, Result};

/// Reads text from images with a local `tesseract` executable
#[derive(Debug, Clone)]
pub struct TesseractOcr {
    executable: PathBuf,
    language: Option<String>,
}

impl Default for TesseractOcr {
    fn default() -> Self {
        Self {
            executable: PathBuf::from("tesseract"),
            language: None,
        }
    }
}

impl TesseractOcr {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_executable(mut self, executable: impl Into<PathBuf>) -> Self {
        self.executable = executable.into();
        self
    }

    /// Tesseract language code(s), e.g. `eng` or `eng+fra`
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    fn args(&self, input: &std::path::Path) -> Vec<std::ffi::OsString> {
        let mut args = vec![input.as_os_str().to_owned(), "stdout".into()];
        if let Some(language) = &self.language {
            args.push("-l".into());
            args.push(language.into());
        }
        args
    }

    async fn read_text(&self, image: &[u8]) -> Result<String> {
        let mut input = NamedTempFile::new()?;
        input.write_all(image)?;
        input.flush()?;

        debug!(executable = %self.executable.display(), bytes = image.len(), "Running tesseract");
        let output = Command::new(&self.executable)
            .args(self.args(input.path()))
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                ProviderError::Tesseract(format!(
                    "failed to run {}: {}",
                    self.executable.display(),
                    e
                ))
            })?;

        if !output.status.success() {
            return Err(ProviderError::Tesseract(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl OcrEngine for TesseractOcr {
    async fn generate(
        &self,
        image: &[u8],
        _source: &str,
        _context: Option<&Context>,
    ) -> std::result::Result<String, EngineError> {
        Ok(self.read_text(image).await?)
    }
}
