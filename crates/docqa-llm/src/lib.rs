use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

pub mod gemini;
pub mod openai;
pub mod sse;

pub use docqa_error::{DocqaError, Result};
pub use gemini::{GeminiClient, GeminiConfig};
pub use openai::{OpenAiCompatClient, OpenAiCompatConfig};

/// Stream of text deltas from a generative model.
pub type TextStream = BoxStream<'static, Result<String>>;

#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Start a streamed completion for `prompt`. Deltas arrive as they are
    /// produced upstream; the stream ends when generation finishes or fails.
    async fn chat_stream(&self, prompt: &str) -> Result<TextStream>;
}

#[async_trait]
pub trait EmbedModel: Send + Sync {
    /// Embed a batch of texts. The result preserves input order: vector `i`
    /// corresponds to `texts[i]`, and all vectors share one dimensionality.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    async fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed(&[text.to_string()]).await?;
        if vectors.len() != 1 {
            return Err(DocqaError::EmbeddingService {
                provider: "unknown".to_string(),
                message: format!("expected 1 embedding, got {}", vectors.len()),
            });
        }
        Ok(vectors.remove(0))
    }
}

// ========== Provider Factory & Config ==========

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum ChatProviderConfig {
    #[serde(rename = "gemini")]
    Gemini {
        api_url: Option<String>,
        api_key: String,
        model: String,
    },
    #[serde(rename = "openai_compat")]
    OpenAiCompat {
        base_url: String,
        api_key: String,
        model: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum EmbedProviderConfig {
    #[serde(rename = "gemini")]
    Gemini {
        api_url: Option<String>,
        api_key: String,
        model: String,
    },
    #[serde(rename = "openai_compat")]
    OpenAiCompat {
        base_url: String,
        api_key: String,
        model: String,
    },
}

pub struct Providers {
    pub chat: Arc<dyn ChatModel>,
    pub embed: Arc<dyn EmbedModel>,
}

pub fn make_providers(chat: ChatProviderConfig, embed: EmbedProviderConfig) -> Result<Providers> {
    let chat_model: Arc<dyn ChatModel> = match chat {
        ChatProviderConfig::Gemini {
            api_url,
            api_key,
            model,
        } => Arc::new(GeminiClient::new(GeminiConfig {
            api_url: api_url
                .unwrap_or_else(|| "https://generativelanguage.googleapis.com".into()),
            api_key,
            chat_model: model,
            embedding_model: None,
        })),
        ChatProviderConfig::OpenAiCompat {
            base_url,
            api_key,
            model,
        } => Arc::new(OpenAiCompatClient::new(OpenAiCompatConfig {
            base_url,
            api_key,
            chat_model: model,
            embedding_model: None,
        })),
    };

    let embed_model: Arc<dyn EmbedModel> = match embed {
        EmbedProviderConfig::Gemini {
            api_url,
            api_key,
            model,
        } => Arc::new(GeminiClient::new(GeminiConfig {
            api_url: api_url
                .unwrap_or_else(|| "https://generativelanguage.googleapis.com".into()),
            api_key,
            chat_model: String::new(),
            embedding_model: Some(model),
        })),
        EmbedProviderConfig::OpenAiCompat {
            base_url,
            api_key,
            model,
        } => Arc::new(OpenAiCompatClient::new(OpenAiCompatConfig {
            base_url,
            api_key,
            chat_model: String::new(),
            embedding_model: Some(model),
        })),
    };

    Ok(Providers {
        chat: chat_model,
        embed: embed_model,
    })
}
