//! Engine adapters for the alt-text pipeline: an OpenAI-compatible vision
//! model for descriptions, chat or PrivateGPT language refiners, and local
//! Tesseract OCR.

pub mod error;
pub mod openai;
pub mod privategpt;
pub mod prompt;
pub mod tesseract;

use std::path::PathBuf;
use std::sync::Arc;

use alttext::{EngineSet, LanguageRefiner};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::info;

pub use error::{ProviderError, Result};
pub use openai::{ChatClient, ChatRefiner, VisionDescriptionEngine};
pub use privategpt::PrivateGptRefiner;
pub use tesseract::TesseractOcr;

/// An OpenAI-compatible chat endpoint
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(default)]
pub struct ChatConfig {
    pub base_url: String,
    pub model: String,
    /// Environment variable holding the API key; `None` sends no credentials
    pub api_key_env: Option<String>,
    pub max_tokens: u32,
    pub temperature: Option<f32>,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key_env: Some("OPENAI_API_KEY".to_string()),
            max_tokens: 300,
            temperature: None,
        }
    }
}

impl ChatConfig {
    pub fn client(&self) -> Result<ChatClient> {
        let mut client =
            ChatClient::new(&self.base_url, &self.model).with_max_tokens(self.max_tokens);
        if let Some(var) = &self.api_key_env {
            let key = std::env::var(var)
                .map_err(|_| ProviderError::MissingApiKey { var: var.clone() })?;
            client = client.with_api_key(key);
        }
        if let Some(temperature) = self.temperature {
            client = client.with_temperature(temperature);
        }
        Ok(client)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(default)]
pub struct TesseractConfig {
    /// Path to the executable; looked up on `PATH` when unset
    pub executable: Option<PathBuf>,
    pub language: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(tag = "provider", rename_all = "snake_case")]
pub enum RefinerConfig {
    Chat(ChatConfig),
    PrivateGpt { base_url: String },
}

/// Which engines to build, as read from a run configuration file
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(default)]
pub struct EngineConfig {
    pub description: ChatConfig,
    pub ocr: Option<TesseractConfig>,
    pub refiner: Option<RefinerConfig>,
}

/// Build every configured engine
pub fn build_engine_set(config: &EngineConfig) -> Result<EngineSet> {
    let description = VisionDescriptionEngine::new(config.description.client()?);
    let mut engines = EngineSet::new(Arc::new(description));

    if let Some(ocr) = &config.ocr {
        let mut tesseract = TesseractOcr::new();
        if let Some(executable) = &ocr.executable {
            tesseract = tesseract.with_executable(executable);
        }
        if let Some(language) = &ocr.language {
            tesseract = tesseract.with_language(language);
        }
        engines = engines.with_ocr(Arc::new(tesseract));
    }

    if let Some(refiner) = &config.refiner {
        let refiner: Arc<dyn LanguageRefiner> = match refiner {
            RefinerConfig::Chat(chat) => Arc::new(ChatRefiner::new(chat.client()?)),
            RefinerConfig::PrivateGpt { base_url } => Arc::new(PrivateGptRefiner::new(base_url)),
        };
        engines = engines.with_refiner(refiner);
    }

    info!(
        model = %config.description.model,
        capabilities = ?engines.capabilities(),
        "Built engine set"
    );
    Ok(engines)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local_chat() -> ChatConfig {
        ChatConfig {
            base_url: "http://localhost:11434/v1".to_string(),
            model: "llava".to_string(),
            api_key_env: None,
            ..ChatConfig::default()
        }
    }

    #[test]
    fn test_build_engine_set_capabilities() {
        let config = EngineConfig {
            description: local_chat(),
            ocr: Some(TesseractConfig::default()),
            refiner: Some(RefinerConfig::PrivateGpt {
                base_url: "http://localhost:8001".to_string(),
            }),
        };
        let engines = build_engine_set(&config).unwrap();
        let capabilities = engines.capabilities();
        assert!(capabilities.ocr);
        assert!(capabilities.refiner);

        let bare = build_engine_set(&EngineConfig {
            description: local_chat(),
            ..EngineConfig::default()
        })
        .unwrap();
        assert_eq!(bare.capabilities(), alttext::Capabilities::default());
    }

    #[test]
    fn test_missing_api_key_env() {
        let config = ChatConfig {
            api_key_env: Some("ALTTEXT_TEST_KEY_THAT_IS_NEVER_SET".to_string()),
            ..ChatConfig::default()
        };
        assert!(matches!(
            config.client(),
            Err(ProviderError::MissingApiKey { .. })
        ));
    }

    #[test]
    fn test_config_from_json() {
        let config: EngineConfig = serde_json::from_str(
            r#"{
                "description": { "model": "gpt-4o", "api_key_env": null },
                "ocr": { "language": "eng" },
                "refiner": { "provider": "private_gpt", "base_url": "http://gpt:8001" }
            }"#,
        )
        .unwrap();
        assert_eq!(config.description.model, "gpt-4o");
        assert_eq!(config.description.base_url, "https://api.openai.com/v1");
        assert_eq!(config.ocr.unwrap().language.as_deref(), Some("eng"));
        assert_eq!(
            config.refiner,
            Some(RefinerConfig::PrivateGpt {
                base_url: "http://gpt:8001".to_string()
            })
        );
    }
}
