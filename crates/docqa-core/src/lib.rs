use chrono::{DateTime, Utc};
use docqa_error::DocqaError;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use docqa_error::{DocqaError as Error, Result};

/// Lifecycle of an uploaded document. The only legal transitions are
/// Processing -> Ready and Processing -> Failed; Ready and Failed are
/// terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocumentStatus {
    #[serde(rename = "PROCESSING")]
    Processing,
    #[serde(rename = "READY")]
    Ready,
    #[serde(rename = "FAILED")]
    Failed,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentStatus::Processing => "PROCESSING",
            DocumentStatus::Ready => "READY",
            DocumentStatus::Failed => "FAILED",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "PROCESSING" => Ok(DocumentStatus::Processing),
            "READY" => Ok(DocumentStatus::Ready),
            "FAILED" => Ok(DocumentStatus::Failed),
            other => Err(DocqaError::Validation {
                reason: format!("unknown document status: {}", other),
            }),
        }
    }

    /// The single authoritative transition function. Every status write in
    /// the system goes through here; illegal edges are rejected instead of
    /// silently overwriting state.
    pub fn transition(self, next: DocumentStatus) -> Result<DocumentStatus> {
        match (self, next) {
            (DocumentStatus::Processing, DocumentStatus::Ready)
            | (DocumentStatus::Processing, DocumentStatus::Failed) => Ok(next),
            (from, to) => Err(DocqaError::Conflict {
                details: format!("illegal status transition {} -> {}", from.as_str(), to.as_str()),
            }),
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, DocumentStatus::Processing)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: Uuid,
    pub user_id: Uuid,
    pub file_name: String,
    pub status: DocumentStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageRole {
    #[serde(rename = "user")]
    User,
    #[serde(rename = "ai")]
    Ai,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::User => "user",
            MessageRole::Ai => "ai",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "user" => Ok(MessageRole::User),
            "ai" => Ok(MessageRole::Ai),
            other => Err(DocqaError::Validation {
                reason: format!("unknown message role: {}", other),
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: Uuid,
    pub document_id: Uuid,
    pub role: MessageRole,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    pub query: String,
}

/// One SSE frame of a streamed answer: `data: {"text": "..."}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamFrame {
    pub text: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip() {
        for s in [
            DocumentStatus::Processing,
            DocumentStatus::Ready,
            DocumentStatus::Failed,
        ] {
            assert_eq!(DocumentStatus::parse(s.as_str()).unwrap(), s);
        }
        assert!(DocumentStatus::parse("DONE").is_err());
    }

    #[test]
    fn test_legal_transitions() {
        assert_eq!(
            DocumentStatus::Processing
                .transition(DocumentStatus::Ready)
                .unwrap(),
            DocumentStatus::Ready
        );
        assert_eq!(
            DocumentStatus::Processing
                .transition(DocumentStatus::Failed)
                .unwrap(),
            DocumentStatus::Failed
        );
    }

    #[test]
    fn test_terminal_states_reject_transitions() {
        assert!(DocumentStatus::Ready
            .transition(DocumentStatus::Failed)
            .is_err());
        assert!(DocumentStatus::Failed
            .transition(DocumentStatus::Ready)
            .is_err());
        assert!(DocumentStatus::Ready
            .transition(DocumentStatus::Processing)
            .is_err());
    }

    #[test]
    fn test_stream_frame_wire_shape() {
        let frame = StreamFrame {
            text: "partial".into(),
        };
        assert_eq!(
            serde_json::to_string(&frame).unwrap(),
            r#"{"text":"partial"}"#
        );
    }
}
