use std::time::Duration;

use async_trait::async_trait;
use docqa_error::{DocqaError, Result};
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, instrument};

/// One page of parsed output. Page numbers are 1-based as reported by the
/// parsing service.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedPage {
    pub number: i32,
    pub text: String,
}

/// A parsed sub-document. The parsing service may split one upload into
/// several of these; callers must preserve their order.
#[derive(Debug, Clone, Default)]
pub struct ParsedDocument {
    pub pages: Vec<ParsedPage>,
}

impl ParsedDocument {
    pub fn is_empty(&self) -> bool {
        self.pages.iter().all(|p| p.text.trim().is_empty())
    }
}

#[async_trait]
pub trait DocumentParser: Send + Sync {
    /// Extract text from an uploaded file. Errors map to the document
    /// ingestion failing as a whole.
    async fn parse(&self, file_name: &str, data: &[u8]) -> Result<Vec<ParsedDocument>>;
}

// ========== Hosted parsing service (LlamaParse-compatible job API) ==========

#[derive(Debug, Clone)]
pub struct ParserConfig {
    pub base_url: String,
    pub api_key: String,
    /// Seconds between job polls.
    pub poll_interval_secs: u64,
    /// Give up after this many polls.
    pub max_polls: u32,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.cloud.llamaindex.ai".to_string(),
            api_key: String::new(),
            poll_interval_secs: 2,
            max_polls: 150,
        }
    }
}

pub struct HttpParserClient {
    http: Client,
    cfg: ParserConfig,
}

#[derive(Deserialize)]
struct UploadResp {
    id: String,
}

#[derive(Deserialize)]
struct JobStatusResp {
    status: String,
}

#[derive(Deserialize)]
struct ResultPage {
    page: i32,
    #[serde(default)]
    md: String,
}

#[derive(Deserialize)]
struct JobResultResp {
    pages: Vec<ResultPage>,
}

impl HttpParserClient {
    pub fn new(cfg: ParserConfig) -> Self {
        Self {
            http: Client::new(),
            cfg,
        }
    }

    async fn upload(&self, file_name: &str, data: &[u8]) -> Result<String> {
        let url = format!(
            "{}/api/v1/parsing/upload",
            self.cfg.base_url.trim_end_matches('/')
        );
        let part = Part::bytes(data.to_vec()).file_name(file_name.to_string());
        let form = Form::new().part("file", part);

        let resp = self
            .http
            .post(url)
            .bearer_auth(&self.cfg.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| DocqaError::Network {
                operation: "parser_upload".to_string(),
                message: e.to_string(),
            })?;

        if !resp.status().is_success() {
            let status = resp.status();
            let txt = resp.text().await.unwrap_or_default();
            return Err(DocqaError::ParserService {
                message: format!("upload rejected: status={} body={}", status, txt),
            });
        }

        let body: UploadResp = resp.json().await.map_err(|e| DocqaError::ParserService {
            message: format!("bad upload response: {}", e),
        })?;
        Ok(body.id)
    }

    async fn wait_for_job(&self, job_id: &str) -> Result<()> {
        let url = format!(
            "{}/api/v1/parsing/job/{}",
            self.cfg.base_url.trim_end_matches('/'),
            job_id
        );

        for _ in 0..self.cfg.max_polls {
            let resp = self
                .http
                .get(&url)
                .bearer_auth(&self.cfg.api_key)
                .send()
                .await
                .map_err(|e| DocqaError::Network {
                    operation: "parser_poll".to_string(),
                    message: e.to_string(),
                })?;

            if !resp.status().is_success() {
                let status = resp.status();
                let txt = resp.text().await.unwrap_or_default();
                return Err(DocqaError::ParserService {
                    message: format!("poll failed: status={} body={}", status, txt),
                });
            }

            let body: JobStatusResp =
                resp.json().await.map_err(|e| DocqaError::ParserService {
                    message: format!("bad status response: {}", e),
                })?;

            match body.status.as_str() {
                "SUCCESS" => return Ok(()),
                "PENDING" => {
                    debug!(job_id, "parse job still pending");
                    tokio::time::sleep(Duration::from_secs(self.cfg.poll_interval_secs)).await;
                }
                other => {
                    return Err(DocqaError::ParserService {
                        message: format!("parse job ended in state {}", other),
                    });
                }
            }
        }

        Err(DocqaError::ParserService {
            message: format!("parse job {} timed out", job_id),
        })
    }

    async fn fetch_result(&self, job_id: &str) -> Result<ParsedDocument> {
        let url = format!(
            "{}/api/v1/parsing/job/{}/result/json",
            self.cfg.base_url.trim_end_matches('/'),
            job_id
        );

        let resp = self
            .http
            .get(url)
            .bearer_auth(&self.cfg.api_key)
            .send()
            .await
            .map_err(|e| DocqaError::Network {
                operation: "parser_result".to_string(),
                message: e.to_string(),
            })?;

        if !resp.status().is_success() {
            let status = resp.status();
            let txt = resp.text().await.unwrap_or_default();
            return Err(DocqaError::ParserService {
                message: format!("result fetch failed: status={} body={}", status, txt),
            });
        }

        let body: JobResultResp = resp.json().await.map_err(|e| DocqaError::ParserService {
            message: format!("bad result response: {}", e),
        })?;

        Ok(ParsedDocument {
            pages: body
                .pages
                .into_iter()
                .map(|p| ParsedPage {
                    number: p.page,
                    text: p.md,
                })
                .collect(),
        })
    }
}

#[async_trait]
impl DocumentParser for HttpParserClient {
    #[instrument(skip(self, data), fields(bytes = data.len()))]
    async fn parse(&self, file_name: &str, data: &[u8]) -> Result<Vec<ParsedDocument>> {
        let job_id = self.upload(file_name, data).await?;
        debug!(%job_id, "parse job submitted");
        self.wait_for_job(&job_id).await?;
        let doc = self.fetch_result(&job_id).await?;
        Ok(vec![doc])
    }
}
