//! Query embedding generation
//!
//! Passages are embedded offline when the index is built; at serve time only
//! the user query needs an embedding, produced by a remote provider.

pub mod client;

use async_trait::async_trait;
pub use client::EmbeddingClient;
pub use client::EmbeddingProvider;

use crate::errors::Result;

/// Anything that turns a query into a vector comparable with the index
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}
