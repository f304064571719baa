use async_trait::async_trait;
use docqa_error::{DocqaError, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::sse::text_delta_stream;
use crate::{ChatModel, EmbedModel, TextStream};

// ========== OpenAI-compatible (covers OpenAI, DeepSeek, local proxies) ==========

#[derive(Clone)]
pub struct OpenAiCompatConfig {
    pub base_url: String,                // e.g. https://api.openai.com
    pub api_key: String,                 // Bearer token
    pub chat_model: String,              // e.g. gpt-4o-mini
    pub embedding_model: Option<String>, // e.g. text-embedding-3-small
}

#[derive(Clone)]
pub struct OpenAiCompatClient {
    http: Client,
    cfg: OpenAiCompatConfig,
}

impl OpenAiCompatClient {
    pub fn new(cfg: OpenAiCompatConfig) -> Self {
        Self {
            http: Client::new(),
            cfg,
        }
    }
}

#[derive(Serialize)]
struct OaiChatReqMsg {
    role: String,
    content: String,
}

#[derive(Serialize)]
struct OaiChatReq {
    model: String,
    messages: Vec<OaiChatReqMsg>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Deserialize)]
struct OaiStreamDelta {
    content: Option<String>,
}

#[derive(Deserialize)]
struct OaiStreamChoice {
    delta: OaiStreamDelta,
}

#[derive(Deserialize)]
struct OaiStreamChunk {
    choices: Vec<OaiStreamChoice>,
}

fn decode_stream_event(data: &str) -> Result<Option<String>> {
    if data.trim() == "[DONE]" {
        return Ok(None);
    }

    let chunk: OaiStreamChunk = serde_json::from_str(data).map_err(|e| DocqaError::LlmService {
        provider: "openai_compat".to_string(),
        message: format!("bad stream frame: {}", e),
    })?;

    let text: String = chunk
        .choices
        .into_iter()
        .filter_map(|c| c.delta.content)
        .collect();

    if text.is_empty() {
        Ok(None)
    } else {
        Ok(Some(text))
    }
}

#[async_trait]
impl ChatModel for OpenAiCompatClient {
    #[instrument(skip(self, prompt))]
    async fn chat_stream(&self, prompt: &str) -> Result<TextStream> {
        let url = format!(
            "{}/v1/chat/completions",
            self.cfg.base_url.trim_end_matches('/')
        );
        let body = OaiChatReq {
            model: self.cfg.chat_model.clone(),
            messages: vec![OaiChatReqMsg {
                role: "user".into(),
                content: prompt.to_string(),
            }],
            stream: true,
            temperature: Some(0.2),
        };

        let resp = self
            .http
            .post(url)
            .bearer_auth(&self.cfg.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| DocqaError::Network {
                operation: "http_request".to_string(),
                message: e.to_string(),
            })?;

        if !resp.status().is_success() {
            let status = resp.status();
            let txt = resp.text().await.unwrap_or_default();
            return Err(DocqaError::LlmService {
                provider: "openai_compat".to_string(),
                message: format!("status={} body={}", status, txt),
            });
        }

        Ok(text_delta_stream(resp, "openai_compat", decode_stream_event))
    }
}

#[derive(Serialize)]
struct OaiEmbedReq {
    model: String,
    input: Vec<String>,
}

#[derive(Deserialize)]
struct OaiEmbedData {
    embedding: Vec<f32>,
}

#[derive(Deserialize)]
struct OaiEmbedResp {
    data: Vec<OaiEmbedData>,
}

#[async_trait]
impl EmbedModel for OpenAiCompatClient {
    #[instrument(skip(self, texts))]
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let model = self
            .cfg
            .embedding_model
            .clone()
            .ok_or_else(|| DocqaError::Configuration {
                key: "embedding_model".to_string(),
                reason: "not configured".to_string(),
            })?;
        let url = format!("{}/v1/embeddings", self.cfg.base_url.trim_end_matches('/'));
        let body = OaiEmbedReq {
            model,
            input: texts.to_vec(),
        };

        let resp = self
            .http
            .post(url)
            .bearer_auth(&self.cfg.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| DocqaError::Network {
                operation: "http_request".to_string(),
                message: e.to_string(),
            })?;

        if !resp.status().is_success() {
            let status = resp.status();
            let txt = resp.text().await.unwrap_or_default();
            return Err(DocqaError::EmbeddingService {
                provider: "openai_compat".to_string(),
                message: format!("status={} body={}", status, txt),
            });
        }

        let data: OaiEmbedResp = resp.json().await.map_err(|e| DocqaError::Network {
            operation: "http_request".to_string(),
            message: e.to_string(),
        })?;

        if data.data.len() != texts.len() {
            return Err(DocqaError::EmbeddingService {
                provider: "openai_compat".to_string(),
                message: format!(
                    "expected {} embeddings, got {}",
                    texts.len(),
                    data.data.len()
                ),
            });
        }

        Ok(data.data.into_iter().map(|d| d.embedding).collect())
    }
}
