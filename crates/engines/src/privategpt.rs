use std::collections::HashMap;
use std::sync::Mutex;

use alttext::{Context, EngineError, LanguageRefiner};
use async_trait::async_trait;
use reqwest::{Client, multipart};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{
    error::{ProviderError, Result},
    prompt,
};

const PROVIDER: &str = "PrivateGPT";

/// Language refiner backed by a PrivateGPT server.
///
/// Once a document is ingested, completions are grounded in it.
#[derive(Debug)]
pub struct PrivateGptRefiner {
    client: Client,
    base_url: String,
    /// Doc ids the server assigned to each ingested file name
    documents: Mutex<HashMap<String, Vec<String>>>,
}

#[derive(Serialize)]
struct CompletionRequest {
    prompt: String,
    use_context: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    context_filter: Option<ContextFilter>,
    include_sources: bool,
    stream: bool,
}

#[derive(Serialize)]
struct ContextFilter {
    docs_ids: Vec<String>,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    message: Option<CompletionMessage>,
}

#[derive(Deserialize)]
struct CompletionMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct IngestResponse {
    data: Vec<IngestedDoc>,
}

#[derive(Deserialize)]
struct IngestedDoc {
    doc_id: String,
}

impl PrivateGptRefiner {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            documents: Mutex::new(HashMap::new()),
        }
    }

    fn ingested_ids(&self) -> Vec<String> {
        match self.documents.lock() {
            Ok(documents) => documents.values().flatten().cloned().collect(),
            Err(poisoned) => poisoned.into_inner().values().flatten().cloned().collect(),
        }
    }

    fn completion_request(&self, prompt: String) -> CompletionRequest {
        let ids = self.ingested_ids();
        CompletionRequest {
            prompt,
            use_context: !ids.is_empty(),
            context_filter: (!ids.is_empty()).then_some(ContextFilter { docs_ids: ids }),
            include_sources: false,
            stream: false,
        }
    }

    async fn complete(&self, prompt: String) -> Result<String> {
        let body = self.completion_request(prompt);
        debug!(use_context = body.use_context, "Sending PrivateGPT completion");

        let response = self
            .client
            .post(format!("{}/v1/completions", self.base_url))
            .json(&body)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Status {
                provider: PROVIDER,
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        let response: CompletionResponse = response.json().await?;
        response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message)
            .and_then(|m| m.content)
            .map(|content| content.trim().to_string())
            .filter(|content| !content.is_empty())
            .ok_or(ProviderError::EmptyResponse { provider: PROVIDER })
    }

    async fn ingest_file(&self, name: &str, binary: &[u8]) -> Result<Vec<String>> {
        let part = multipart::Part::bytes(binary.to_vec()).file_name(name.to_string());
        let form = multipart::Form::new().part("file", part);

        let response = self
            .client
            .post(format!("{}/v1/ingest/file", self.base_url))
            .multipart(form)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Status {
                provider: PROVIDER,
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        let response: IngestResponse = response.json().await?;
        Ok(response.data.into_iter().map(|d| d.doc_id).collect())
    }

    async fn delete_doc(&self, doc_id: &str) -> Result<()> {
        let response = self
            .client
            .delete(format!("{}/v1/ingest/{}", self.base_url, doc_id))
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Status {
                provider: PROVIDER,
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }
        Ok(())
    }

    fn record(&self, name: &str, ids: Vec<String>) {
        let mut documents = match self.documents.lock() {
            Ok(documents) => documents,
            Err(poisoned) => poisoned.into_inner(),
        };
        documents.entry(name.to_string()).or_default().extend(ids);
    }

    fn take(&self, name: &str) -> Vec<String> {
        let mut documents = match self.documents.lock() {
            Ok(documents) => documents,
            Err(poisoned) => poisoned.into_inner(),
        };
        documents.remove(name).unwrap_or_default()
    }
}

#[async_trait]
impl LanguageRefiner for PrivateGptRefiner {
    async fn refine_description(&self, description: &str) -> std::result::Result<String, EngineError> {
        Ok(self.complete(prompt::refine_description(description)).await?)
    }

    async fn refine_ocr(&self, text: &str) -> std::result::Result<String, EngineError> {
        Ok(self.complete(prompt::refine_ocr(text)).await?)
    }

    async fn refine(
        &self,
        description: &str,
        ocr_text: Option<&str>,
        context: Option<&Context>,
        caption: Option<&str>,
    ) -> std::result::Result<String, EngineError> {
        let prompt = prompt::compose_alt(description, ocr_text, context, caption);
        Ok(self.complete(prompt).await?)
    }

    async fn ingest(&self, name: &str, binary: &[u8]) -> std::result::Result<bool, EngineError> {
        let ids = self.ingest_file(name, binary).await?;
        info!(name, docs = ids.len(), "Ingested document into PrivateGPT");
        let ingested = !ids.is_empty();
        self.record(name, ids);
        Ok(ingested)
    }

    async fn remove(&self, name: &str) -> std::result::Result<bool, EngineError> {
        let ids = self.take(name);
        if ids.is_empty() {
            return Ok(false);
        }
        for (i, id) in ids.iter().enumerate() {
            if let Err(e) = self.delete_doc(id).await {
                // keep what is still on the server so a later remove can retry
                self.record(name, ids[i..].to_vec());
                return Err(e.into());
            }
        }
        info!(name, docs = ids.len(), "Removed document from PrivateGPT");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_completion_uses_context_only_after_ingest() {
        let refiner = PrivateGptRefiner::new("http://localhost:8001/");
        assert_eq!(refiner.base_url, "http://localhost:8001");

        let request = serde_json::to_value(refiner.completion_request("p".into())).unwrap();
        assert_eq!(request["use_context"], false);
        assert!(request.get("context_filter").is_none());

        refiner.record("book.epub", vec!["a".into(), "b".into()]);
        let request = serde_json::to_value(refiner.completion_request("p".into())).unwrap();
        assert_eq!(request["use_context"], true);
        assert_eq!(request["context_filter"]["docs_ids"], serde_json::json!(["a", "b"]));
    }

    #[test]
    fn test_take_forgets_document() {
        let refiner = PrivateGptRefiner::new("http://localhost:8001");
        refiner.record("book.epub", vec!["a".into()]);
        refiner.record("book.epub", vec!["b".into()]);
        assert_eq!(refiner.take("book.epub"), vec!["a".to_string(), "b".to_string()]);
        assert!(refiner.take("book.epub").is_empty());
    }

    #[tokio::test]
    async fn test_remove_unknown_document_is_a_no_op() {
        let refiner = PrivateGptRefiner::new("http://localhost:1");
        assert!(!refiner.remove("never-ingested.html").await.unwrap());
    }

    #[test]
    fn test_ingest_response_parsing() {
        let response: IngestResponse = serde_json::from_str(
            r#"{ "object": "list", "data": [{ "object": "ingest.document", "doc_id": "d1", "doc_metadata": {} }] }"#,
        )
        .unwrap();
        assert_eq!(response.data[0].doc_id, "d1");
    }
}
