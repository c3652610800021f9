use alttext::{Context, DescriptionEngine, EngineError, LanguageRefiner};
use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::STANDARD};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::debug;

use crate::{
    error::{ProviderError, Result},
    prompt,
};

const PROVIDER: &str = "chat completions";

/// Client for an OpenAI-compatible `/chat/completions` endpoint
#[derive(Debug, Clone)]
pub struct ChatClient {
    client: Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
    max_tokens: u32,
    temperature: Option<f32>,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: Value,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

impl ChatClient {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            api_key: None,
            max_tokens: 300,
            temperature: None,
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Send one user message and return the first choice's text
    pub async fn complete(&self, content: Value) -> Result<String> {
        let body = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content,
            }],
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };

        debug!(model = %self.model, base_url = %self.base_url, "Sending chat completion");

        let mut request = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .json(&body);
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key);
        }
        let response = request.send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Status {
                provider: PROVIDER,
                status: status.as_u16(),
                body,
            });
        }

        let response: ChatResponse = response.json().await?;
        first_content(response)
    }

    pub async fn complete_text(&self, prompt: String) -> Result<String> {
        self.complete(Value::String(prompt)).await
    }
}

fn first_content(response: ChatResponse) -> Result<String> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .map(|content| content.trim().to_string())
        .filter(|content| !content.is_empty())
        .ok_or(ProviderError::EmptyResponse { provider: PROVIDER })
}

/// Describes images with a vision-capable chat model
#[derive(Debug, Clone)]
pub struct VisionDescriptionEngine {
    chat: ChatClient,
}

impl VisionDescriptionEngine {
    pub fn new(chat: ChatClient) -> Self {
        Self { chat }
    }
}

/// Multi-part message content with the image inlined as a data URL
pub(crate) fn vision_content(image: &[u8], source: &str, context: Option<&Context>) -> Value {
    let data_url = format!(
        "data:{};base64,{}",
        prompt::mime_type(image, source),
        STANDARD.encode(image)
    );
    json!([
        { "type": "text", "text": prompt::describe(context) },
        { "type": "image_url", "image_url": { "url": data_url } }
    ])
}

#[async_trait]
impl DescriptionEngine for VisionDescriptionEngine {
    async fn generate(
        &self,
        image: &[u8],
        source: &str,
        context: Option<&Context>,
    ) -> std::result::Result<String, EngineError> {
        let content = vision_content(image, source, context);
        Ok(self.chat.complete(content).await?)
    }
}

/// Refines descriptions and composes alt-text with a text chat model.
/// Has no document store, so ingestion is unsupported.
#[derive(Debug, Clone)]
pub struct ChatRefiner {
    chat: ChatClient,
}

impl ChatRefiner {
    pub fn new(chat: ChatClient) -> Self {
        Self { chat }
    }
}

#[async_trait]
impl LanguageRefiner for ChatRefiner {
    async fn refine_description(&self, description: &str) -> std::result::Result<String, EngineError> {
        Ok(self
            .chat
            .complete_text(prompt::refine_description(description))
            .await?)
    }

    async fn refine_ocr(&self, text: &str) -> std::result::Result<String, EngineError> {
        Ok(self.chat.complete_text(prompt::refine_ocr(text)).await?)
    }

    async fn refine(
        &self,
        description: &str,
        ocr_text: Option<&str>,
        context: Option<&Context>,
        caption: Option<&str>,
    ) -> std::result::Result<String, EngineError> {
        let prompt = prompt::compose_alt(description, ocr_text, context, caption);
        Ok(self.chat.complete_text(prompt).await?)
    }

    async fn ingest(&self, _name: &str, _binary: &[u8]) -> std::result::Result<bool, EngineError> {
        Err(EngineError::Unsupported {
            engine: "ChatRefiner",
            operation: "ingest",
        })
    }

    async fn remove(&self, _name: &str) -> std::result::Result<bool, EngineError> {
        Err(EngineError::Unsupported {
            engine: "ChatRefiner",
            operation: "remove",
        })
    }
}
