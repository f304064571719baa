use std::convert::Infallible;

use axum::{
    extract::{Extension, Multipart, Path, State},
    http::StatusCode,
    response::sse::{Event, Sse},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use docqa_auth::middleware::AuthContext;
use docqa_core::{ChatRequest, DocumentStatus, MessageRole, StreamFrame};
use docqa_error::{DocqaError, Result};
use docqa_llm::TextStream;
use futures::{Stream, StreamExt};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::AppState;

pub fn create_document_routes() -> Router<AppState> {
    Router::new()
        .route("/documents", get(list_documents))
        .route("/documents/:doc_id", get(get_document).delete(delete_document))
        .route("/documents/:doc_id/messages", get(list_messages))
        .route("/documents/:doc_id/chat", post(chat))
        .route("/upload", post(upload))
}

async fn list_documents(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> Result<impl IntoResponse> {
    let documents = state.store.list_documents(auth.user_id).await?;
    Ok(Json(documents))
}

/// Status polling endpoint for uploads running in the background.
async fn get_document(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(doc_id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let document = state.store.get_document(auth.user_id, doc_id).await?;
    Ok(Json(document))
}

async fn list_messages(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(doc_id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    // ownership check doubles as the 404 for unknown ids
    state.store.get_document(auth.user_id, doc_id).await?;
    let messages = state.store.list_messages(doc_id).await?;
    Ok(Json(messages))
}

/// Pull the uploaded PDF out of the multipart body. Clients post it under
/// the `pdf` field; `file` is accepted as an alias.
async fn read_upload(mut multipart: Multipart) -> Result<(String, Vec<u8>)> {
    let mut upload: Option<(String, Vec<u8>)> = None;
    while let Some(field) = multipart.next_field().await.map_err(|e| DocqaError::Validation {
        reason: format!("bad multipart body: {}", e),
    })? {
        if !matches!(field.name(), Some("pdf") | Some("file")) {
            continue;
        }
        let file_name = field
            .file_name()
            .unwrap_or("upload.pdf")
            .to_string();
        let data = field.bytes().await.map_err(|e| DocqaError::Validation {
            reason: format!("could not read pdf field: {}", e),
        })?;
        upload = Some((file_name, data.to_vec()));
        break;
    }

    let (file_name, data) = upload.ok_or_else(|| DocqaError::Validation {
        reason: "missing pdf field".to_string(),
    })?;
    if data.is_empty() {
        return Err(DocqaError::Validation {
            reason: "uploaded file is empty".to_string(),
        });
    }
    if !file_name.to_ascii_lowercase().ends_with(".pdf") {
        return Err(DocqaError::Validation {
            reason: "only PDF uploads are supported".to_string(),
        });
    }
    Ok((file_name, data))
}

async fn upload(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    multipart: Multipart,
) -> Result<impl IntoResponse> {
    let (file_name, data) = read_upload(multipart).await?;

    let document = state.store.create_document(auth.user_id, &file_name).await?;
    state
        .files
        .put(auth.user_id, document.id, &file_name, &data)
        .await?;
    info!(document_id = %document.id, file_name, "upload accepted, ingest queued");

    // Ingest runs in the background; the caller polls GET /documents/:id
    // until the status leaves PROCESSING.
    let ingest = state.ingest.clone();
    let document_id = document.id;
    let user_id = auth.user_id;
    tokio::spawn(async move {
        if let Err(e) = ingest.run(document_id, user_id, &file_name, &data).await {
            error!(%document_id, error = %e, "background ingest failed");
        }
    });

    Ok(Json(document))
}

async fn chat(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(doc_id): Path<Uuid>,
    Json(request): Json<ChatRequest>,
) -> Result<Sse<impl Stream<Item = std::result::Result<Event, Infallible>>>> {
    let query = request.query.trim().to_string();
    if query.is_empty() {
        return Err(DocqaError::Validation {
            reason: "query must not be empty".to_string(),
        });
    }

    let document = state.store.get_document(auth.user_id, doc_id).await?;
    if document.status != DocumentStatus::Ready {
        return Err(DocqaError::NotReady {
            document_id: doc_id.to_string(),
        });
    }

    // The question is durable before generation starts.
    state
        .store
        .add_message(doc_id, MessageRole::User, &query)
        .await?;

    let upstream = state.responder.respond(doc_id, &query).await?;

    let (tx, rx) = tokio::sync::mpsc::channel::<ChatFrame>(16);
    let store = state.store.clone();
    tokio::spawn(async move {
        match pump_chat_stream(upstream, &tx).await {
            Some(answer) if !answer.is_empty() => {
                if let Err(e) = store.add_message(doc_id, MessageRole::Ai, &answer).await {
                    error!(document_id = %doc_id, error = %e, "could not persist ai message");
                }
            }
            Some(_) => {}
            None => {
                info!(document_id = %doc_id, "chat stream ended without a persistable answer");
            }
        }
    });

    Ok(Sse::new(ReceiverStream::new(rx).map(frame_event)))
}

/// One frame of the chat SSE response.
#[derive(Debug, Clone, PartialEq)]
enum ChatFrame {
    /// Partial answer text, delivered as `data: {"text": ...}`.
    Delta(String),
    /// Terminal `event: error` frame for a mid-stream generation failure.
    Failure,
}

fn frame_event(frame: ChatFrame) -> std::result::Result<Event, Infallible> {
    Ok(match frame {
        ChatFrame::Delta(text) => match Event::default().json_data(StreamFrame { text }) {
            Ok(event) => event,
            Err(e) => {
                error!(error = %e, "could not encode stream frame");
                Event::default()
                    .event("error")
                    .data(r#"{"error":"encoding failed"}"#)
            }
        },
        ChatFrame::Failure => Event::default()
            .event("error")
            .data(r#"{"error":"generation failed"}"#),
    })
}

/// Forward model deltas to the SSE channel, accumulating the full answer.
/// Returns the answer only when the stream ends cleanly with the client
/// still connected; a disconnect or a mid-stream failure returns `None` so
/// no partial AI message is ever persisted. A closed channel also drops the
/// upstream stream, which aborts the generation call.
async fn pump_chat_stream(
    mut upstream: TextStream,
    tx: &tokio::sync::mpsc::Sender<ChatFrame>,
) -> Option<String> {
    let mut answer = String::new();
    while let Some(delta) = upstream.next().await {
        match delta {
            Ok(text) => {
                answer.push_str(&text);
                if tx.send(ChatFrame::Delta(text)).await.is_err() {
                    return None;
                }
            }
            Err(e) => {
                error!(error = %e, "generation failed mid-stream");
                let _ = tx.send(ChatFrame::Failure).await;
                return None;
            }
        }
    }
    Some(answer)
}

async fn delete_document(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(doc_id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let document = state.store.get_document(auth.user_id, doc_id).await?;

    state.store.delete_messages(doc_id).await?;

    // Best effort: a stale vector entry is invisible once the document row is
    // gone, so index failures only get logged.
    if let Err(e) = state.index.delete_by_document(doc_id).await {
        warn!(document_id = %doc_id, error = %e, "vector cleanup failed");
    }

    state.store.delete_document(doc_id).await?;
    state.files.delete(auth.user_id, document.id).await?;
    info!(document_id = %doc_id, "document deleted");

    Ok(StatusCode::NO_CONTENT)
}
