use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{error, info, warn};

use crate::embeddings::EmbeddingClient;

/// One span of source text bound for the vector store. Immutable once
/// stored; one chunk maps to exactly one embedding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub chunk_id: String,
    pub text: String,
    pub source: String,
}

/// A retrieved chunk with its similarity score. The orchestrator only
/// consumes the texts; scores are exposed for callers that want them.
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub chunk_id: String,
    pub text: String,
    pub score: f32,
}

/// Vector store adapter over the Qdrant REST API.
#[derive(Clone)]
pub struct VectorStore {
    base_url: String,
    client: reqwest::Client,
    embedding_client: EmbeddingClient,
}

#[derive(Serialize)]
struct CreateCollection {
    vectors: VectorParams,
}

#[derive(Serialize)]
struct VectorParams {
    size: usize,
    distance: String,
}

#[derive(Serialize)]
struct UpsertPoints {
    points: Vec<Point>,
}

#[derive(Serialize)]
struct Point {
    id: u64,
    vector: Vec<f32>,
    payload: HashMap<String, serde_json::Value>,
}

#[derive(Deserialize)]
struct CollectionInfo {
    result: CollectionResult,
}

#[derive(Deserialize)]
struct CollectionResult {
    collections: Vec<Collection>,
}

#[derive(Deserialize)]
struct Collection {
    name: String,
}

impl VectorStore {
    pub fn new(base_url: String, embedding_client: EmbeddingClient) -> Self {
        Self {
            base_url,
            client: reqwest::Client::new(),
            embedding_client,
        }
    }

    /// Create the collection if it does not exist yet, sized to the
    /// embedding model's dimension.
    pub async fn ensure_collection(&self, collection: &str) -> Result<()> {
        if self.collection_exists(collection).await {
            return Ok(());
        }

        let dimension = self.embedding_client.get_dimension().await?;
        info!(collection, dimension, "Creating collection");

        let url = format!("{}/collections/{}", self.base_url, collection);
        let create_req = CreateCollection {
            vectors: VectorParams {
                size: dimension,
                distance: "Cosine".to_string(),
            },
        };

        let response = self.client.put(&url).json(&create_req).send().await?;

        if !response.status().is_success() {
            let error_text = response.text().await?;
            anyhow::bail!("Failed to create collection: {}", error_text);
        }

        Ok(())
    }

    /// Embed and upsert chunks into a collection, creating it if absent.
    /// Upsert is keyed by chunk id, so re-storing the same id with
    /// different text overwrites. Returns false on failure; the error is
    /// logged, never propagated.
    pub async fn store_chunks(&self, chunks: &[Chunk], collection: &str) -> bool {
        match self.try_store_chunks(chunks, collection).await {
            Ok(()) => true,
            Err(e) => {
                error!(collection, error = %e, "Failed to store chunks");
                false
            }
        }
    }

    async fn try_store_chunks(&self, chunks: &[Chunk], collection: &str) -> Result<()> {
        self.ensure_collection(collection).await?;

        let mut points = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            let embedding = self
                .embedding_client
                .embed(&chunk.text)
                .await
                .context("Failed to generate embedding")?;

            let mut payload = HashMap::new();
            payload.insert(
                "chunk_id".to_string(),
                serde_json::json!(chunk.chunk_id.clone()),
            );
            payload.insert("text".to_string(), serde_json::json!(chunk.text.clone()));
            payload.insert(
                "source".to_string(),
                serde_json::json!(chunk.source.clone()),
            );

            points.push(Point {
                id: hash_to_u64(&chunk.chunk_id),
                vector: embedding,
                payload,
            });
        }

        let url = format!("{}/collections/{}/points", self.base_url, collection);
        let response = self
            .client
            .put(&url)
            .json(&UpsertPoints { points })
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await?;
            anyhow::bail!("Failed to upsert points: {}", error_text);
        }

        Ok(())
    }

    /// Nearest-neighbor search; returns chunk texts ordered by
    /// similarity. A nonexistent collection is a recoverable condition:
    /// logged and treated as an empty result set.
    pub async fn retrieve_similar(
        &self,
        query: &str,
        collection: &str,
        top_k: usize,
    ) -> Vec<String> {
        match self.try_retrieve_similar(query, collection, top_k).await {
            Ok(scored) => scored.into_iter().map(|s| s.text).collect(),
            Err(e) => {
                warn!(collection, error = %e, "Similarity search returned nothing");
                Vec::new()
            }
        }
    }

    async fn try_retrieve_similar(
        &self,
        query: &str,
        collection: &str,
        top_k: usize,
    ) -> Result<Vec<ScoredChunk>> {
        let query_embedding = self
            .embedding_client
            .embed(query)
            .await
            .context("Failed to embed query")?;

        let url = format!("{}/collections/{}/points/search", self.base_url, collection);
        let body = serde_json::json!({
            "vector": query_embedding,
            "limit": top_k,
            "with_payload": true
        });

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .context("Failed to send search request")?;

        if !response.status().is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            anyhow::bail!("Search failed: {}", error_text);
        }

        let result: serde_json::Value = response
            .json()
            .await
            .context("Failed to parse search response")?;

        let points = result["result"]
            .as_array()
            .context("Invalid search response format")?;

        let mut scored = Vec::new();
        for point in points {
            let score = point["score"].as_f64().unwrap_or(0.0) as f32;
            let payload = match point["payload"].as_object() {
                Some(p) => p,
                None => continue,
            };

            let chunk_id = payload
                .get("chunk_id")
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .to_string();
            let text = payload
                .get("text")
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .to_string();

            if !text.is_empty() {
                scored.push(ScoredChunk {
                    chunk_id,
                    text,
                    score,
                });
            }
        }

        Ok(scored)
    }

    pub async fn collection_exists(&self, collection: &str) -> bool {
        self.list_collections()
            .await
            .iter()
            .any(|name| name == collection)
    }

    pub async fn delete_collection(&self, collection: &str) {
        let url = format!("{}/collections/{}", self.base_url, collection);
        match self.client.delete(&url).send().await {
            Ok(response) if response.status().is_success() => {
                info!(collection, "Collection deleted");
            }
            Ok(response) => {
                warn!(collection, status = %response.status(), "Failed to delete collection");
            }
            Err(e) => {
                warn!(collection, error = %e, "Failed to delete collection");
            }
        }
    }

    /// All collection names, or empty if the store is unreachable.
    pub async fn list_collections(&self) -> Vec<String> {
        match self.try_list_collections().await {
            Ok(names) => names,
            Err(e) => {
                warn!(error = %e, "Failed to list collections");
                Vec::new()
            }
        }
    }

    async fn try_list_collections(&self) -> Result<Vec<String>> {
        let url = format!("{}/collections", self.base_url);
        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            anyhow::bail!("Failed to list collections: {}", response.status());
        }

        let info: CollectionInfo = response.json().await?;
        Ok(info
            .result
            .collections
            .into_iter()
            .map(|c| c.name)
            .collect())
    }
}

/// Stable numeric point id from a chunk id.
fn hash_to_u64(s: &str) -> u64 {
    use sha2::{Digest, Sha256};

    let mut hasher = Sha256::new();
    hasher.update(s.as_bytes());
    let digest = hasher.finalize();
    u64::from_be_bytes(digest[..8].try_into().unwrap())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn point_ids_are_stable_and_distinct() {
        assert_eq!(hash_to_u64("P001_0"), hash_to_u64("P001_0"));
        assert_ne!(hash_to_u64("P001_0"), hash_to_u64("P001_1"));
    }
}
