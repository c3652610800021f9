use alttext::EngineError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{provider} returned {status}: {body}")]
    Status {
        provider: &'static str,
        status: u16,
        body: String,
    },

    #[error("{provider} returned no content")]
    EmptyResponse { provider: &'static str },

    #[error("Environment variable {var} holding the API key is not set")]
    MissingApiKey { var: String },

    #[error("Tesseract error: {0}")]
    Tesseract(String),

    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ProviderError>;

impl From<ProviderError> for EngineError {
    fn from(error: ProviderError) -> Self {
        match error {
            ProviderError::Http(e) => EngineError::Request(e.to_string()),
            ProviderError::MissingApiKey { .. } => EngineError::Request(error.to_string()),
            ProviderError::Status { .. } | ProviderError::EmptyResponse { .. } | ProviderError::Json(_) => {
                EngineError::InvalidResponse(error.to_string())
            }
            ProviderError::Tesseract(message) => EngineError::Process(message),
            ProviderError::Io(e) => EngineError::Io(e),
        }
    }
}
