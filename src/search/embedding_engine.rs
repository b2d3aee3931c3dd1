use async_trait::async_trait;
use model2vec_rs::model::StaticModel;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::api_connection::{ApiConnectionError, Provider};

pub const DEFAULT_LOCAL_MODEL_ID: &str = "minishlab/potion-base-32M";
pub const DEFAULT_OLLAMA_EMBEDDING_MODEL: &str = "all-minilm";

const EMBED_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("Embedding service call failed: {0}")]
    Service(#[from] ApiConnectionError),
    #[error("Embedding model error: {0}")]
    Model(String),
    #[error("Expected {expected} embeddings, got {actual}")]
    CountMismatch { expected: usize, actual: usize },
    #[error("Embedding dimension mismatch. Expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// Turns texts into fixed-width vectors, one per input, in input order.
#[async_trait]
pub trait EmbeddingService: Send + Sync {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError>;

    /// Identifies the vector space; a cached index built under another model is stale.
    fn model_name(&self) -> &str;
}

/// In-process static embedding model. Encoding runs on the blocking pool.
pub struct EmbeddingEngine {
    model: Arc<StaticModel>,
    model_id: String,
}

impl EmbeddingEngine {
    pub fn new(model_id: &str) -> Result<Self, EmbeddingError> {
        let model = StaticModel::from_pretrained(model_id, None, None, None)
            .map_err(|e| EmbeddingError::Model(format!("failed to load '{}': {}", model_id, e)))?;
        Ok(Self {
            model: Arc::new(model),
            model_id: model_id.to_string(),
        })
    }
}

#[async_trait]
impl EmbeddingService for EmbeddingEngine {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let model = self.model.clone();
        let batch = texts.to_vec();
        let embeddings = tokio::task::spawn_blocking(move || model.encode(&batch))
            .await
            .map_err(|e| EmbeddingError::Model(format!("embedding task join error: {}", e)))?;
        check_count(texts.len(), embeddings.len())?;
        Ok(embeddings)
    }

    fn model_name(&self) -> &str {
        &self.model_id
    }
}

/// Embeddings served over HTTP by an Ollama-compatible endpoint.
pub struct RemoteEmbedder {
    provider: Provider,
    timeout: Duration,
}

impl RemoteEmbedder {
    pub fn new(provider: Provider) -> Self {
        Self {
            provider,
            timeout: EMBED_REQUEST_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl EmbeddingService for RemoteEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let embeddings = self.provider.call_embed(texts, self.timeout).await?;
        check_count(texts.len(), embeddings.len())?;
        Ok(embeddings)
    }

    fn model_name(&self) -> &str {
        self.provider.model()
    }
}

fn check_count(expected: usize, actual: usize) -> Result<(), EmbeddingError> {
    if expected == actual {
        Ok(())
    } else {
        Err(EmbeddingError::CountMismatch { expected, actual })
    }
}
