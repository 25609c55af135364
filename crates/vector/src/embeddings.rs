use anyhow::{Context, Result, bail};
use serde::Deserialize;
use serde_json::json;

#[derive(Deserialize)]
struct EmbeddingReply {
    embedding: Vec<f32>,
}

/// Embedding generation against Ollama's `/api/embeddings` endpoint.
/// The dimension depends on the configured model, so collection setup
/// probes it instead of hardcoding one.
#[derive(Clone)]
pub struct EmbeddingClient {
    client: reqwest::Client,
    endpoint: String,
    model: String,
}

impl EmbeddingClient {
    pub fn new(base_url: String, model: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: format!("{}/api/embeddings", base_url.trim_end_matches('/')),
            model,
        }
    }

    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&json!({
                "model": self.model,
                "prompt": text,
            }))
            .send()
            .await
            .context("Embedding request failed to send")?;

        let status = response.status();
        if !status.is_success() {
            bail!("Embedding request returned {status}");
        }

        let reply: EmbeddingReply = response
            .json()
            .await
            .context("Embedding response was not valid JSON")?;

        if reply.embedding.is_empty() {
            bail!("Embedding model '{}' returned an empty vector", self.model);
        }
        Ok(reply.embedding)
    }

    /// Embed a short probe text to learn the model's vector dimension.
    pub async fn get_dimension(&self) -> Result<usize> {
        Ok(self.embed("dimension probe").await?.len())
    }
}
