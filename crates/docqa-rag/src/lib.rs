pub mod chunker;
pub mod ingest;
pub mod parser;
pub mod qdrant;
pub mod responder;
pub mod vector;

pub use chunker::{ChunkerConfig, PageChunk, TextChunker};
pub use docqa_error::{DocqaError, Result};
pub use ingest::{DocumentStateStore, IngestPipeline, IngestReport};
pub use parser::{DocumentParser, HttpParserClient, ParsedDocument, ParsedPage, ParserConfig};
pub use qdrant::{QdrantIndexConfig, QdrantVectorIndex};
pub use responder::{RagResponder, ResponderConfig};
pub use vector::{
    ChunkMetadata, ChunkRecord, MemoryVectorIndex, RetrievedChunk, VectorIndex,
};

#[cfg(test)]
mod pipeline_tests {
    use std::sync::Arc;

    use docqa_core::DocumentStatus;
    use futures::StreamExt;
    use uuid::Uuid;

    use crate::chunker::{ChunkerConfig, TextChunker};
    use crate::ingest::IngestPipeline;
    use crate::parser::{ParsedDocument, ParsedPage};
    use crate::responder::{RagResponder, ResponderConfig};
    use crate::testing::{FakeChatModel, FakeEmbedModel, FakeParser, RecordingStateStore};
    use crate::vector::MemoryVectorIndex;

    // Upload-to-answer flow against fakes: a three-page document becomes
    // READY with one chunk per page, and asking about page two retrieves
    // that page into the prompt.
    #[tokio::test]
    async fn test_ingest_then_chat_end_to_end() {
        let parser = Arc::new(FakeParser::returning(vec![ParsedDocument {
            pages: vec![
                ParsedPage {
                    number: 1,
                    text: "alpha".to_string(),
                },
                ParsedPage {
                    number: 2,
                    text: "bravo".to_string(),
                },
                ParsedPage {
                    number: 3,
                    text: "charlie".to_string(),
                },
            ],
        }]));
        let embedder = Arc::new(FakeEmbedModel::new(3));
        let index = Arc::new(MemoryVectorIndex::new());
        let state = Arc::new(RecordingStateStore::new());
        let chunker = TextChunker::new(ChunkerConfig::default()).unwrap();

        let pipeline = IngestPipeline::new(
            parser,
            embedder.clone(),
            index.clone(),
            state.clone(),
            chunker,
        );

        let doc = Uuid::new_v4();
        let report = pipeline
            .run(doc, Uuid::new_v4(), "three_pages.pdf", b"%PDF")
            .await
            .unwrap();

        assert_eq!(report.chunks_indexed, 3);
        assert_eq!(state.statuses(doc).await, vec![DocumentStatus::Ready]);

        let chat = Arc::new(FakeChatModel::streaming(vec!["It is ", "on [Page 2]."]));
        let responder = RagResponder::new(
            embedder,
            index,
            chat.clone(),
            ResponderConfig::default(),
        );

        // same text embeds to the same vector, so page two is the top match
        let mut stream = responder.respond(doc, "bravo").await.unwrap();
        let mut answer = String::new();
        while let Some(delta) = stream.next().await {
            answer.push_str(&delta.unwrap());
        }
        assert_eq!(answer, "It is on [Page 2].");

        let prompt = chat.last_prompt().await.unwrap();
        assert!(prompt.starts_with("You are a helpful assistant."));
        assert!(prompt.contains("[Page 2]\nbravo"));
        let best = prompt.find("[Page 2]\nbravo").unwrap();
        assert!(prompt.find("[Page 1]\nalpha").unwrap() > best);
        assert!(prompt.find("[Page 3]\ncharlie").unwrap() > best);
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;
    use docqa_core::DocumentStatus;
    use docqa_error::{DocqaError, Result};
    use docqa_llm::{ChatModel, EmbedModel, TextStream};
    use futures::StreamExt;
    use tokio::sync::RwLock;
    use uuid::Uuid;

    use crate::ingest::DocumentStateStore;
    use crate::parser::{DocumentParser, ParsedDocument};

    pub struct FakeParser {
        result: std::result::Result<Vec<ParsedDocument>, String>,
    }

    impl FakeParser {
        pub fn returning(docs: Vec<ParsedDocument>) -> Self {
            Self { result: Ok(docs) }
        }

        pub fn failing(message: &str) -> Self {
            Self {
                result: Err(message.to_string()),
            }
        }
    }

    #[async_trait]
    impl DocumentParser for FakeParser {
        async fn parse(&self, _file_name: &str, _data: &[u8]) -> Result<Vec<ParsedDocument>> {
            match &self.result {
                Ok(docs) => Ok(docs.clone()),
                Err(message) => Err(DocqaError::ParserService {
                    message: message.clone(),
                }),
            }
        }
    }

    pub struct FakeEmbedModel {
        dim: usize,
        fixed: Option<Vec<f32>>,
    }

    impl FakeEmbedModel {
        /// Deterministic per-text vectors of the given dimensionality.
        pub fn new(dim: usize) -> Self {
            Self { dim, fixed: None }
        }

        /// Always return this exact vector, whatever the input.
        pub fn returning(vector: Vec<f32>) -> Self {
            Self {
                dim: vector.len(),
                fixed: Some(vector),
            }
        }

        fn vector_for(&self, text: &str) -> Vec<f32> {
            if let Some(v) = &self.fixed {
                return v.clone();
            }
            let seed = text.bytes().map(|b| b as usize).sum::<usize>();
            (0..self.dim)
                .map(|i| ((seed + i) % 97) as f32 + 1.0)
                .collect()
        }
    }

    #[async_trait]
    impl EmbedModel for FakeEmbedModel {
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|t| self.vector_for(t)).collect())
        }
    }

    /// Succeeds for the first `n` calls, then errors.
    pub struct FailingEmbedModel {
        succeed_calls: usize,
        calls: AtomicUsize,
    }

    impl FailingEmbedModel {
        pub fn after(succeed_calls: usize) -> Self {
            Self {
                succeed_calls,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl EmbedModel for FailingEmbedModel {
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.succeed_calls {
                Ok(texts.iter().map(|_| vec![1.0, 0.0, 0.0]).collect())
            } else {
                Err(DocqaError::EmbeddingService {
                    provider: "fake".to_string(),
                    message: "quota exhausted".to_string(),
                })
            }
        }
    }

    pub struct FakeChatModel {
        deltas: Vec<String>,
        last_prompt: Arc<RwLock<Option<String>>>,
    }

    impl FakeChatModel {
        pub fn streaming(deltas: Vec<&str>) -> Self {
            Self {
                deltas: deltas.into_iter().map(|s| s.to_string()).collect(),
                last_prompt: Arc::new(RwLock::new(None)),
            }
        }

        pub async fn last_prompt(&self) -> Option<String> {
            self.last_prompt.read().await.clone()
        }
    }

    #[async_trait]
    impl ChatModel for FakeChatModel {
        async fn chat_stream(&self, prompt: &str) -> Result<TextStream> {
            *self.last_prompt.write().await = Some(prompt.to_string());
            let items: Vec<Result<String>> = self.deltas.iter().cloned().map(Ok).collect();
            Ok(futures::stream::iter(items).boxed())
        }
    }

    #[derive(Default)]
    pub struct RecordingStateStore {
        statuses: RwLock<HashMap<Uuid, Vec<DocumentStatus>>>,
    }

    impl RecordingStateStore {
        pub fn new() -> Self {
            Self::default()
        }

        pub async fn statuses(&self, document_id: Uuid) -> Vec<DocumentStatus> {
            self.statuses
                .read()
                .await
                .get(&document_id)
                .cloned()
                .unwrap_or_default()
        }
    }

    #[async_trait]
    impl DocumentStateStore for RecordingStateStore {
        async fn set_status(&self, document_id: Uuid, status: DocumentStatus) -> Result<()> {
            self.statuses
                .write()
                .await
                .entry(document_id)
                .or_default()
                .push(status);
            Ok(())
        }
    }
}
