use std::sync::Arc;

use async_trait::async_trait;
use docqa_core::DocumentStatus;
use docqa_error::{DocqaError, Result};
use docqa_llm::EmbedModel;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::chunker::TextChunker;
use crate::parser::DocumentParser;
use crate::vector::{ChunkMetadata, ChunkRecord, VectorIndex};

/// Persistence seam for document lifecycle updates. Implementations must
/// route writes through [`DocumentStatus::transition`] so an already-terminal
/// document cannot be moved again.
#[async_trait]
pub trait DocumentStateStore: Send + Sync {
    async fn set_status(&self, document_id: Uuid, status: DocumentStatus) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IngestReport {
    pub sub_documents: usize,
    pub chunks_indexed: usize,
}

/// Parse, chunk, embed, index. One run takes a document from PROCESSING to
/// READY, or to FAILED with any partially written vectors rolled back.
pub struct IngestPipeline {
    parser: Arc<dyn DocumentParser>,
    embedder: Arc<dyn EmbedModel>,
    index: Arc<dyn VectorIndex>,
    state: Arc<dyn DocumentStateStore>,
    chunker: TextChunker,
}

impl IngestPipeline {
    pub fn new(
        parser: Arc<dyn DocumentParser>,
        embedder: Arc<dyn EmbedModel>,
        index: Arc<dyn VectorIndex>,
        state: Arc<dyn DocumentStateStore>,
        chunker: TextChunker,
    ) -> Self {
        Self {
            parser,
            embedder,
            index,
            state,
            chunker,
        }
    }

    #[instrument(skip(self, data), fields(bytes = data.len()))]
    pub async fn run(
        &self,
        document_id: Uuid,
        user_id: Uuid,
        file_name: &str,
        data: &[u8],
    ) -> Result<IngestReport> {
        match self.process(document_id, user_id, file_name, data).await {
            Ok(report) => {
                self.state
                    .set_status(document_id, DocumentStatus::Ready)
                    .await?;
                info!(
                    chunks = report.chunks_indexed,
                    sub_documents = report.sub_documents,
                    "document ready"
                );
                Ok(report)
            }
            Err(e) => {
                error!(error = %e, "ingestion failed");
                // A half-indexed document must not answer questions later.
                if let Err(cleanup) = self.index.delete_by_document(document_id).await {
                    warn!(error = %cleanup, "vector rollback failed");
                }
                if let Err(status) = self
                    .state
                    .set_status(document_id, DocumentStatus::Failed)
                    .await
                {
                    warn!(error = %status, "could not mark document failed");
                }
                Err(e)
            }
        }
    }

    async fn process(
        &self,
        document_id: Uuid,
        user_id: Uuid,
        file_name: &str,
        data: &[u8],
    ) -> Result<IngestReport> {
        let sub_documents = self.parser.parse(file_name, data).await?;
        let sub_count = sub_documents.len();

        // Chunk indices run across sub-documents so keys stay unique within
        // the document.
        let mut next_index = 0usize;
        let mut total = 0usize;
        for sub in &sub_documents {
            let chunks = self.chunker.chunk_pages(&sub.pages);
            if chunks.is_empty() {
                continue;
            }

            let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
            let vectors = self.embedder.embed(&texts).await?;
            if vectors.len() != texts.len() {
                return Err(DocqaError::EmbeddingService {
                    provider: "ingest".to_string(),
                    message: format!(
                        "expected {} embeddings, got {}",
                        texts.len(),
                        vectors.len()
                    ),
                });
            }

            let records: Vec<ChunkRecord> = chunks
                .into_iter()
                .zip(vectors)
                .map(|(chunk, vector)| {
                    let key = ChunkRecord::chunk_key(document_id, next_index);
                    next_index += 1;
                    ChunkRecord {
                        key,
                        vector,
                        metadata: ChunkMetadata {
                            document_id,
                            user_id,
                            page: chunk.page,
                            text: chunk.text,
                        },
                    }
                })
                .collect();

            total += records.len();
            self.index.upsert(records).await?;
        }

        if total == 0 {
            return Err(DocqaError::ParserService {
                message: "no text extracted from document".to_string(),
            });
        }

        Ok(IngestReport {
            sub_documents: sub_count,
            chunks_indexed: total,
        })
    }
}
