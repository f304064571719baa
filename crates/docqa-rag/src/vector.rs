use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use docqa_error::Result;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Metadata stored alongside every vector, enough to scope retrieval to one
/// owner's document and to cite the source page.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkMetadata {
    pub document_id: Uuid,
    pub user_id: Uuid,
    pub page: Option<i32>,
    pub text: String,
}

#[derive(Debug, Clone)]
pub struct ChunkRecord {
    /// Human-readable key, `{document_id}-chunk-{index}`.
    pub key: String,
    pub vector: Vec<f32>,
    pub metadata: ChunkMetadata,
}

impl ChunkRecord {
    pub fn chunk_key(document_id: Uuid, index: usize) -> String {
        format!("{}-chunk-{}", document_id, index)
    }

    /// Deterministic point id derived from the chunk key. Re-ingesting the
    /// same document maps each chunk to the same id, so upserts overwrite
    /// instead of duplicating.
    pub fn point_id(key: &str) -> Uuid {
        Uuid::new_v5(&Uuid::NAMESPACE_OID, key.as_bytes())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RetrievedChunk {
    pub document_id: Uuid,
    pub page: Option<i32>,
    pub text: String,
    pub score: f32,
}

#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Insert or overwrite records by their point id.
    async fn upsert(&self, records: Vec<ChunkRecord>) -> Result<()>;

    /// Nearest neighbours of `vector` among chunks belonging to
    /// `document_id`, best first. Chunks of other documents never appear.
    async fn query(
        &self,
        vector: &[f32],
        top_k: u64,
        document_id: Uuid,
    ) -> Result<Vec<RetrievedChunk>>;

    /// Drop every vector belonging to `document_id`.
    async fn delete_by_document(&self, document_id: Uuid) -> Result<()>;
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// In-memory index for tests and single-node development runs.
#[derive(Default)]
pub struct MemoryVectorIndex {
    points: Arc<RwLock<HashMap<Uuid, ChunkRecord>>>,
}

impl MemoryVectorIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.points.read().await.len()
    }

    pub async fn count_for_document(&self, document_id: Uuid) -> usize {
        self.points
            .read()
            .await
            .values()
            .filter(|r| r.metadata.document_id == document_id)
            .count()
    }
}

#[async_trait]
impl VectorIndex for MemoryVectorIndex {
    async fn upsert(&self, records: Vec<ChunkRecord>) -> Result<()> {
        let mut points = self.points.write().await;
        for record in records {
            points.insert(ChunkRecord::point_id(&record.key), record);
        }
        Ok(())
    }

    async fn query(
        &self,
        vector: &[f32],
        top_k: u64,
        document_id: Uuid,
    ) -> Result<Vec<RetrievedChunk>> {
        let points = self.points.read().await;
        let mut scored: Vec<RetrievedChunk> = points
            .values()
            .filter(|r| r.metadata.document_id == document_id)
            .map(|r| RetrievedChunk {
                document_id: r.metadata.document_id,
                page: r.metadata.page,
                text: r.metadata.text.clone(),
                score: cosine_similarity(vector, &r.vector),
            })
            .collect();

        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(top_k as usize);
        Ok(scored)
    }

    async fn delete_by_document(&self, document_id: Uuid) -> Result<()> {
        let mut points = self.points.write().await;
        points.retain(|_, r| r.metadata.document_id != document_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(document_id: Uuid, index: usize, vector: Vec<f32>, text: &str) -> ChunkRecord {
        ChunkRecord {
            key: ChunkRecord::chunk_key(document_id, index),
            vector,
            metadata: ChunkMetadata {
                document_id,
                user_id: Uuid::new_v4(),
                page: Some(1),
                text: text.to_string(),
            },
        }
    }

    #[test]
    fn test_chunk_key_format() {
        let doc = Uuid::parse_str("4b4a4bbc-3cb7-4e26-9543-9b0f1d9a2f00").unwrap();
        assert_eq!(
            ChunkRecord::chunk_key(doc, 7),
            "4b4a4bbc-3cb7-4e26-9543-9b0f1d9a2f00-chunk-7"
        );
    }

    #[test]
    fn test_point_id_is_stable() {
        let key = "4b4a4bbc-3cb7-4e26-9543-9b0f1d9a2f00-chunk-0";
        assert_eq!(ChunkRecord::point_id(key), ChunkRecord::point_id(key));
        assert_ne!(
            ChunkRecord::point_id(key),
            ChunkRecord::point_id("4b4a4bbc-3cb7-4e26-9543-9b0f1d9a2f00-chunk-1")
        );
    }

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 2.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }

    #[tokio::test]
    async fn test_query_scoped_to_document() {
        let index = MemoryVectorIndex::new();
        let doc_a = Uuid::new_v4();
        let doc_b = Uuid::new_v4();

        index
            .upsert(vec![
                record(doc_a, 0, vec![1.0, 0.0], "from a"),
                record(doc_b, 0, vec![1.0, 0.0], "from b"),
            ])
            .await
            .unwrap();

        let hits = index.query(&[1.0, 0.0], 10, doc_a).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].text, "from a");
    }

    #[tokio::test]
    async fn test_query_orders_by_score_and_truncates() {
        let index = MemoryVectorIndex::new();
        let doc = Uuid::new_v4();

        index
            .upsert(vec![
                record(doc, 0, vec![0.0, 1.0], "orthogonal"),
                record(doc, 1, vec![1.0, 0.0], "aligned"),
                record(doc, 2, vec![1.0, 1.0], "diagonal"),
            ])
            .await
            .unwrap();

        let hits = index.query(&[1.0, 0.0], 2, doc).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].text, "aligned");
        assert_eq!(hits[1].text, "diagonal");
    }

    #[tokio::test]
    async fn test_upsert_overwrites_same_key() {
        let index = MemoryVectorIndex::new();
        let doc = Uuid::new_v4();

        index
            .upsert(vec![record(doc, 0, vec![1.0, 0.0], "old")])
            .await
            .unwrap();
        index
            .upsert(vec![record(doc, 0, vec![1.0, 0.0], "new")])
            .await
            .unwrap();

        assert_eq!(index.len().await, 1);
        let hits = index.query(&[1.0, 0.0], 10, doc).await.unwrap();
        assert_eq!(hits[0].text, "new");
    }

    #[tokio::test]
    async fn test_delete_by_document() {
        let index = MemoryVectorIndex::new();
        let doc_a = Uuid::new_v4();
        let doc_b = Uuid::new_v4();

        index
            .upsert(vec![
                record(doc_a, 0, vec![1.0, 0.0], "a0"),
                record(doc_a, 1, vec![0.0, 1.0], "a1"),
                record(doc_b, 0, vec![1.0, 0.0], "b0"),
            ])
            .await
            .unwrap();

        index.delete_by_document(doc_a).await.unwrap();

        assert_eq!(index.count_for_document(doc_a).await, 0);
        assert_eq!(index.count_for_document(doc_b).await, 1);
    }
}
