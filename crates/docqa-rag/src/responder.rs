use std::sync::Arc;

use docqa_error::Result;
use docqa_llm::{ChatModel, EmbedModel, TextStream};
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::vector::{RetrievedChunk, VectorIndex};

#[derive(Debug, Clone, Copy)]
pub struct ResponderConfig {
    pub top_k: u64,
}

impl Default for ResponderConfig {
    fn default() -> Self {
        Self { top_k: 10 }
    }
}

/// Answers a question against one document: embed the query, retrieve the
/// closest chunks of that document, and stream a grounded completion.
pub struct RagResponder {
    embedder: Arc<dyn EmbedModel>,
    index: Arc<dyn VectorIndex>,
    chat: Arc<dyn ChatModel>,
    cfg: ResponderConfig,
}

impl RagResponder {
    pub fn new(
        embedder: Arc<dyn EmbedModel>,
        index: Arc<dyn VectorIndex>,
        chat: Arc<dyn ChatModel>,
        cfg: ResponderConfig,
    ) -> Self {
        Self {
            embedder,
            index,
            chat,
            cfg,
        }
    }

    #[instrument(skip(self, query))]
    pub async fn respond(&self, document_id: Uuid, query: &str) -> Result<TextStream> {
        let query_vector = self.embedder.embed_one(query).await?;
        let matches = self
            .index
            .query(&query_vector, self.cfg.top_k, document_id)
            .await?;
        debug!(matches = matches.len(), "retrieved context chunks");

        let context = build_context(&matches);
        let prompt = grounding_prompt(&context, query);
        self.chat.chat_stream(&prompt).await
    }
}

/// Render retrieved chunks, best match first, each prefixed with its page
/// marker so the model can cite it.
fn build_context(chunks: &[RetrievedChunk]) -> String {
    chunks
        .iter()
        .map(|chunk| match chunk.page {
            Some(page) => format!("[Page {}]\n{}", page, chunk.text),
            None => chunk.text.clone(),
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn grounding_prompt(context: &str, query: &str) -> String {
    format!(
        "You are a helpful assistant. Answer the user's question based ONLY on the provided \
         context from the PDF document.\n\
         You MUST cite the page number for each piece of information you use. Use the format \
         [Page X] for citations. Do not cite wrong page numbers.\n\
         If the context does not contain the answer, state that you cannot find the information \
         in the document. Do not make up answers.\n\n\
         Context:\n\
         ---\n\
         {}\n\
         ---\n\n\
         Question: {}",
        context, query
    )
}
