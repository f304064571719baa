use async_trait::async_trait;
use docqa_error::{DocqaError, Result};
use qdrant_client::qdrant::vectors_config::Config;
use qdrant_client::qdrant::{
    Condition, CreateCollectionBuilder, DeletePointsBuilder, Distance, Filter, PointStruct,
    SearchPointsBuilder, UpsertPointsBuilder, VectorParams, VectorsConfig,
};
use qdrant_client::{Payload, Qdrant};
use serde_json::json;
use tracing::{debug, info};
use uuid::Uuid;

use crate::vector::{ChunkRecord, RetrievedChunk, VectorIndex};

#[derive(Debug, Clone)]
pub struct QdrantIndexConfig {
    pub url: String,
    pub collection: String,
    pub vector_dim: u64,
}

pub struct QdrantVectorIndex {
    client: Qdrant,
    collection: String,
}

impl QdrantVectorIndex {
    /// Connect and make sure the collection exists with a cosine-distance
    /// vector config.
    pub async fn new(cfg: QdrantIndexConfig) -> Result<Self> {
        let client = Qdrant::from_url(&cfg.url).build()?;

        let collections = client.list_collections().await?;
        let exists = collections
            .collections
            .iter()
            .any(|c| c.name == cfg.collection);

        if !exists {
            info!(collection = %cfg.collection, dim = cfg.vector_dim, "creating qdrant collection");
            client
                .create_collection(
                    CreateCollectionBuilder::new(cfg.collection.as_str()).vectors_config(
                        VectorsConfig {
                            config: Some(Config::Params(VectorParams {
                                size: cfg.vector_dim,
                                distance: Distance::Cosine.into(),
                                ..Default::default()
                            })),
                        },
                    ),
                )
                .await?;
        }

        Ok(Self {
            client,
            collection: cfg.collection,
        })
    }

    fn document_filter(document_id: Uuid) -> Filter {
        Filter::must([Condition::matches(
            "document_id",
            document_id.to_string(),
        )])
    }
}

#[async_trait]
impl VectorIndex for QdrantVectorIndex {
    async fn upsert(&self, records: Vec<ChunkRecord>) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        let mut points = Vec::with_capacity(records.len());
        for record in records {
            let payload: Payload = json!({
                "chunk_key": record.key,
                "document_id": record.metadata.document_id.to_string(),
                "user_id": record.metadata.user_id.to_string(),
                "page": record.metadata.page,
                "text": record.metadata.text,
            })
            .try_into()
            .map_err(|e| DocqaError::VectorStore {
                operation: "upsert".to_string(),
                message: format!("bad payload: {}", e),
            })?;

            points.push(PointStruct::new(
                ChunkRecord::point_id(&record.key).to_string(),
                record.vector,
                payload,
            ));
        }

        debug!(count = points.len(), collection = %self.collection, "upserting points");
        self.client
            .upsert_points(UpsertPointsBuilder::new(&self.collection, points))
            .await?;
        Ok(())
    }

    async fn query(
        &self,
        vector: &[f32],
        top_k: u64,
        document_id: Uuid,
    ) -> Result<Vec<RetrievedChunk>> {
        let response = self
            .client
            .search_points(
                SearchPointsBuilder::new(&self.collection, vector.to_vec(), top_k)
                    .filter(Self::document_filter(document_id))
                    .with_payload(true),
            )
            .await?;

        let mut chunks = Vec::with_capacity(response.result.len());
        for point in response.result {
            let text = point
                .payload
                .get("text")
                .and_then(|v| v.as_str())
                .map(|s| s.to_string())
                .unwrap_or_default();
            let page = point
                .payload
                .get("page")
                .and_then(|v| v.as_integer())
                .map(|n| n as i32);
            chunks.push(RetrievedChunk {
                document_id,
                page,
                text,
                score: point.score,
            });
        }
        Ok(chunks)
    }

    async fn delete_by_document(&self, document_id: Uuid) -> Result<()> {
        debug!(%document_id, collection = %self.collection, "deleting points");
        self.client
            .delete_points(
                DeletePointsBuilder::new(&self.collection)
                    .points(Self::document_filter(document_id)),
            )
            .await?;
        Ok(())
    }
}
