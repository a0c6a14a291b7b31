//! Vector retrieval over the precomputed passage index

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde::Serialize;
use tracing::debug;
use tracing::info;

use crate::config::RetrievalConfig;
use crate::config::Similarity;
use crate::embeddings::Embedder;
use crate::errors::LoiLibreError;
use crate::errors::Result;
use crate::models::Passage;
use crate::models::PassageMeta;

/// Retrieval capability injected into the pipeline.
///
/// Implementations return at most `top_k` passages ordered by descending score.
#[async_trait]
pub trait VectorRetriever: Send + Sync {
    async fn retrieve(&self, query: &str, top_k: usize) -> Result<Vec<Passage>>;
}

/// Retriever backed by a remote index service
pub struct HttpRetriever {
    endpoint: String,
    client: Client,
}

#[derive(Serialize)]
struct RetrieveRequest<'a> {
    query: &'a str,
    top_k: usize,
}

impl HttpRetriever {
    pub fn new(endpoint: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| LoiLibreError::HttpError(e.to_string()))?;

        Ok(Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            client,
        })
    }
}

#[async_trait]
impl VectorRetriever for HttpRetriever {
    async fn retrieve(&self, query: &str, top_k: usize) -> Result<Vec<Passage>> {
        let url = format!("{}/retrieve", self.endpoint);
        debug!("Calling index service: {} (top_k={})", url, top_k);

        let response = self
            .client
            .post(&url)
            .json(&RetrieveRequest { query, top_k })
            .send()
            .await
            .map_err(|e| LoiLibreError::RetrievalUnavailable(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(LoiLibreError::RetrievalUnavailable(format!(
                "Index service error ({status}): {error_text}"
            )));
        }

        let mut passages: Vec<Passage> = response.json().await.map_err(|e| {
            LoiLibreError::RetrievalUnavailable(format!("Failed to parse response: {e}"))
        })?;
        passages.truncate(top_k);
        Ok(passages)
    }
}

/// One entry of the on-disk index
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexedPassage {
    pub content: String,
    #[serde(default)]
    pub meta: PassageMeta,
    pub embedding: Vec<f32>,
}

/// On-disk index file produced by the offline embedding job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexFile {
    #[serde(default)]
    pub model: Option<String>,
    pub passages: Vec<IndexedPassage>,
}

/// Brute-force retriever over an in-memory copy of the index
pub struct EmbeddingIndexRetriever {
    passages: Vec<IndexedPassage>,
    dimension: usize,
    similarity: Similarity,
    embedder: Arc<dyn Embedder>,
}

impl EmbeddingIndexRetriever {
    /// Build from already loaded passages; all embeddings must share one dimension
    pub fn new(
        passages: Vec<IndexedPassage>,
        similarity: Similarity,
        embedder: Arc<dyn Embedder>,
    ) -> Result<Self> {
        let dimension = passages.first().map_or(0, |p| p.embedding.len());
        if let Some((idx, bad)) = passages
            .iter()
            .enumerate()
            .find(|(_, p)| p.embedding.len() != dimension)
        {
            return Err(LoiLibreError::IndexError(format!(
                "passage {idx} has dimension {} but the index uses {dimension}",
                bad.embedding.len()
            )));
        }

        Ok(Self {
            passages,
            dimension,
            similarity,
            embedder,
        })
    }

    /// Load the JSON index file at `path`
    pub fn load<P: AsRef<Path>>(
        path: P,
        similarity: Similarity,
        embedder: Arc<dyn Embedder>,
    ) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            LoiLibreError::IndexError(format!("cannot read {}: {e}", path.display()))
        })?;
        let index: IndexFile = serde_json::from_str(&content)?;

        info!(
            "Loaded {} passages from {} (model: {})",
            index.passages.len(),
            path.display(),
            index.model.as_deref().unwrap_or("unknown")
        );
        Self::new(index.passages, similarity, embedder)
    }

    /// Build from the `[retrieval]` section
    pub fn from_config(config: &RetrievalConfig, embedder: Arc<dyn Embedder>) -> Result<Self> {
        Self::load(&config.index_path, config.similarity, embedder)
    }

    pub fn len(&self) -> usize {
        self.passages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.passages.is_empty()
    }

    fn score(&self, query: &[f32], embedding: &[f32]) -> f32 {
        let dot: f32 = query.iter().zip(embedding).map(|(a, b)| a * b).sum();
        match self.similarity {
            Similarity::Dot => dot,
            Similarity::Cosine => {
                let norm_q = query.iter().map(|v| v * v).sum::<f32>().sqrt();
                let norm_e = embedding.iter().map(|v| v * v).sum::<f32>().sqrt();
                if norm_q == 0.0 || norm_e == 0.0 {
                    0.0
                } else {
                    dot / (norm_q * norm_e)
                }
            }
        }
    }
}

#[async_trait]
impl VectorRetriever for EmbeddingIndexRetriever {
    async fn retrieve(&self, query: &str, top_k: usize) -> Result<Vec<Passage>> {
        if self.passages.is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }

        let query_embedding = self
            .embedder
            .embed(query)
            .await
            .map_err(|e| LoiLibreError::RetrievalUnavailable(e.to_string()))?;

        if query_embedding.len() != self.dimension {
            return Err(LoiLibreError::EmbeddingError(format!(
                "query embedding has dimension {} but the index uses {}",
                query_embedding.len(),
                self.dimension
            )));
        }

        let mut scored: Vec<(usize, f32)> = self
            .passages
            .iter()
            .enumerate()
            .map(|(idx, p)| (idx, self.score(&query_embedding, &p.embedding)))
            .collect();

        // stable sort keeps index order among equal scores
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(top_k);

        debug!(
            "Index search returned {} passages (best score {:?})",
            scored.len(),
            scored.first().map(|s| s.1)
        );

        Ok(scored
            .into_iter()
            .map(|(idx, score)| {
                let indexed = &self.passages[idx];
                Passage {
                    content: indexed.content.clone(),
                    score,
                    meta: indexed.meta.clone(),
                }
            })
            .collect())
    }
}
