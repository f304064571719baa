use async_trait::async_trait;
use docqa_error::{DocqaError, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::sse::text_delta_stream;
use crate::{ChatModel, EmbedModel, TextStream};

// ========== Google Generative Language API (Gemini) ==========

#[derive(Clone)]
pub struct GeminiConfig {
    pub api_url: String, // default https://generativelanguage.googleapis.com
    pub api_key: String,
    pub chat_model: String,              // e.g. gemini-1.5-flash
    pub embedding_model: Option<String>, // e.g. embedding-001
}

#[derive(Clone)]
pub struct GeminiClient {
    http: Client,
    cfg: GeminiConfig,
}

impl GeminiClient {
    pub fn new(cfg: GeminiConfig) -> Self {
        Self {
            http: Client::new(),
            cfg,
        }
    }
}

#[derive(Serialize)]
struct GenPart {
    text: String,
}

#[derive(Serialize)]
struct GenContent {
    role: &'static str,
    parts: Vec<GenPart>,
}

#[derive(Serialize)]
struct GenerateReq {
    contents: Vec<GenContent>,
}

#[derive(Deserialize)]
struct GenRespPart {
    text: Option<String>,
}

#[derive(Deserialize)]
struct GenRespContent {
    parts: Option<Vec<GenRespPart>>,
}

#[derive(Deserialize)]
struct GenRespCandidate {
    content: Option<GenRespContent>,
}

#[derive(Deserialize)]
struct GenerateResp {
    candidates: Option<Vec<GenRespCandidate>>,
}

/// Pull the concatenated text out of one streamed `GenerateContentResponse`.
fn decode_stream_event(data: &str) -> Result<Option<String>> {
    let resp: GenerateResp = serde_json::from_str(data).map_err(|e| DocqaError::LlmService {
        provider: "gemini".to_string(),
        message: format!("bad stream frame: {}", e),
    })?;

    let mut out = String::new();
    for candidate in resp.candidates.unwrap_or_default() {
        let parts = candidate.content.and_then(|c| c.parts).unwrap_or_default();
        for part in parts {
            if let Some(text) = part.text {
                out.push_str(&text);
            }
        }
    }

    if out.is_empty() {
        Ok(None)
    } else {
        Ok(Some(out))
    }
}

#[async_trait]
impl ChatModel for GeminiClient {
    #[instrument(skip(self, prompt))]
    async fn chat_stream(&self, prompt: &str) -> Result<TextStream> {
        let url = format!(
            "{}/v1beta/models/{}:streamGenerateContent?alt=sse&key={}",
            self.cfg.api_url.trim_end_matches('/'),
            self.cfg.chat_model,
            self.cfg.api_key
        );
        let body = GenerateReq {
            contents: vec![GenContent {
                role: "user",
                parts: vec![GenPart {
                    text: prompt.to_string(),
                }],
            }],
        };

        let resp = self
            .http
            .post(url)
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
                provider: "gemini".to_string(),
                message: format!("status={} body={}", status, txt),
            });
        }

        Ok(text_delta_stream(resp, "gemini", decode_stream_event))
    }
}

#[derive(Serialize)]
struct EmbedContentReq {
    model: String,
    content: EmbedReqContent,
}

#[derive(Serialize)]
struct EmbedReqContent {
    parts: Vec<GenPart>,
}

#[derive(Serialize)]
struct BatchEmbedReq {
    requests: Vec<EmbedContentReq>,
}

#[derive(Deserialize)]
struct EmbedRespValues {
    values: Vec<f32>,
}

#[derive(Deserialize)]
struct BatchEmbedResp {
    embeddings: Vec<EmbedRespValues>,
}

#[async_trait]
impl EmbedModel for GeminiClient {
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
        let url = format!(
            "{}/v1beta/models/{}:batchEmbedContents?key={}",
            self.cfg.api_url.trim_end_matches('/'),
            model,
            self.cfg.api_key
        );
        let body = BatchEmbedReq {
            requests: texts
                .iter()
                .map(|text| EmbedContentReq {
                    model: format!("models/{}", model),
                    content: EmbedReqContent {
                        parts: vec![GenPart { text: text.clone() }],
                    },
                })
                .collect(),
        };

        let resp = self
            .http
            .post(url)
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
                provider: "gemini".to_string(),
                message: format!("status={} body={}", status, txt),
            });
        }

        let data: BatchEmbedResp = resp.json().await.map_err(|e| DocqaError::Network {
            operation: "http_request".to_string(),
            message: e.to_string(),
        })?;

        if data.embeddings.len() != texts.len() {
            return Err(DocqaError::EmbeddingService {
                provider: "gemini".to_string(),
                message: format!(
                    "expected {} embeddings, got {}",
                    texts.len(),
                    data.embeddings.len()
                ),
            });
        }

        Ok(data.embeddings.into_iter().map(|e| e.values).collect())
    }
}
