use serde::{Deserialize, Serialize};
use thiserror::Error;

#[cfg(feature = "axum")]
use axum::{
    http::StatusCode,
    response::{IntoResponse, Json},
};

/// Unified error type for the document QA service.
#[derive(Error, Debug, Clone, Serialize, Deserialize)]
pub enum DocqaError {
    // === business errors ===
    #[error("resource not found: {resource}")]
    NotFound { resource: String },

    #[error("invalid request: {reason}")]
    Validation { reason: String },

    #[error("authentication failed: {message}")]
    Authentication { message: String },

    #[error("document is not ready for chat: {document_id}")]
    NotReady { document_id: String },

    #[error("resource conflict: {details}")]
    Conflict { details: String },

    // === upstream service errors ===
    #[error("parser service error")]
    ParserService { message: String },

    #[error("embedding service error ({provider})")]
    EmbeddingService { provider: String, message: String },

    #[error("LLM service error ({provider})")]
    LlmService { provider: String, message: String },

    #[error("vector store error: {operation} failed")]
    VectorStore { operation: String, message: String },

    // === infrastructure errors ===
    #[error("database error")]
    Database { message: String },

    #[error("file storage error: {operation}")]
    Storage { operation: String, message: String },

    #[error("network error: {operation}")]
    Network { operation: String, message: String },

    #[error("configuration error: {key} - {reason}")]
    Configuration { key: String, reason: String },

    #[error("serialization error: {format}")]
    Serialization { format: String, message: String },

    #[error("internal error: {message}")]
    Internal { message: String },
}

impl DocqaError {
    /// Map to an HTTP status code. Ownership failures are reported as 404,
    /// never 403, so callers cannot probe for foreign documents.
    pub fn to_http_status(&self) -> u16 {
        match self {
            DocqaError::NotFound { .. } => 404,
            DocqaError::Validation { .. } | DocqaError::NotReady { .. } => 400,
            DocqaError::Authentication { .. } => 401,
            DocqaError::Conflict { .. } => 409,
            _ => 500,
        }
    }

    pub fn not_found(resource: impl Into<String>) -> Self {
        DocqaError::NotFound {
            resource: resource.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        DocqaError::Internal {
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, DocqaError>;

// === conversions ===

impl From<serde_json::Error> for DocqaError {
    fn from(err: serde_json::Error) -> Self {
        DocqaError::Serialization {
            format: "json".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<reqwest::Error> for DocqaError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() {
            DocqaError::Network {
                operation: "connect".to_string(),
                message: err.to_string(),
            }
        } else {
            DocqaError::Network {
                operation: "http_request".to_string(),
                message: err.to_string(),
            }
        }
    }
}

impl From<sqlx::Error> for DocqaError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DocqaError::NotFound {
                resource: "row".to_string(),
            },
            other => DocqaError::Database {
                message: other.to_string(),
            },
        }
    }
}

impl From<qdrant_client::QdrantError> for DocqaError {
    fn from(err: qdrant_client::QdrantError) -> Self {
        DocqaError::VectorStore {
            operation: "qdrant_client".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<std::io::Error> for DocqaError {
    fn from(err: std::io::Error) -> Self {
        DocqaError::Storage {
            operation: "io".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<uuid::Error> for DocqaError {
    fn from(err: uuid::Error) -> Self {
        DocqaError::Validation {
            reason: format!("invalid id: {}", err),
        }
    }
}

// Axum integration
#[cfg(feature = "axum")]
impl IntoResponse for DocqaError {
    fn into_response(self) -> axum::response::Response {
        let status = StatusCode::from_u16(self.to_http_status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        // Internal detail stays in the logs, not the response body.
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "request failed");
        }

        let body = serde_json::json!({ "error": self.to_string() });
        (status, Json(body)).into_response()
    }
}
