use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::Path;
use std::sync::{Arc, LazyLock};
use tokio::sync::Mutex;
use tracing::{info, warn};

use super::ann_engine::FlatL2Index;
use super::data_loader::Dataset;
use super::embedding_engine::{EmbeddingError, EmbeddingService};
use super::index_cache::SemanticIndexCache;
use super::{RecipeSummary, RetrievalStrategy};

/// Nearest-row squared L2 distance above which a query counts as unmatched.
pub const DEFAULT_MAX_DISTANCE: f32 = 1.5;

const EMBED_BATCH_SIZE: usize = 64;

/// Only one semantic index is built at a time per process. A constructor that
/// waits here finds the artifact the previous holder wrote.
static BUILD_LOCK: LazyLock<Mutex<()>> = LazyLock::new(|| Mutex::new(()));

/// Meaning-based retrieval over a flat L2 index of recipe embeddings.
pub struct SemanticStrategy {
    dataset: Arc<Dataset>,
    embedder: Arc<dyn EmbeddingService>,
    index: FlatL2Index,
    max_distance: f32,
}

impl SemanticStrategy {
    /// Loads the cached index at `cache_path` when it still describes
    /// `dataset` under the embedder's model, otherwise embeds every recipe,
    /// builds a fresh index and persists it.
    pub async fn open(
        dataset: Arc<Dataset>,
        embedder: Arc<dyn EmbeddingService>,
        cache_path: &Path,
        max_distance: f32,
    ) -> Result<Self> {
        let _guard = BUILD_LOCK.lock().await;

        let model = embedder.model_name().to_string();
        let cached = match SemanticIndexCache::load(cache_path) {
            Ok(cache) if cache.matches(&dataset, &model) => {
                info!(path = ?cache_path, rows = cache.index.len(), "loaded semantic index cache");
                Some(cache.index)
            }
            Ok(cache) => {
                warn!(
                    path = ?cache_path,
                    cached_rows = cache.index.len(),
                    dataset_rows = dataset.len(),
                    cached_model = %cache.embedding_model,
                    "semantic index cache is stale, rebuilding"
                );
                None
            }
            Err(e) if cache_path.exists() => {
                warn!(path = ?cache_path, error = %format!("{:#}", e), "unreadable semantic index cache, rebuilding");
                None
            }
            Err(_) => {
                info!(path = ?cache_path, "no semantic index cache yet, building");
                None
            }
        };

        let index = match cached {
            Some(index) => index,
            None => {
                let index = build_index(&dataset, embedder.as_ref())
                    .await
                    .context("Failed to build semantic index")?;
                let cache = SemanticIndexCache::new(&dataset, &model, index);
                if let Err(e) = cache.save(cache_path) {
                    warn!(path = ?cache_path, error = %format!("{:#}", e), "could not persist semantic index cache");
                }
                cache.index
            }
        };

        Ok(Self {
            dataset,
            embedder,
            index,
            max_distance,
        })
    }

    pub fn index(&self) -> &FlatL2Index {
        &self.index
    }
}

async fn build_index(dataset: &Dataset, embedder: &dyn EmbeddingService) -> Result<FlatL2Index, EmbeddingError> {
    let texts: Vec<String> = dataset
        .records()
        .iter()
        .map(|r| r.searchable_text.clone())
        .collect();

    let mut embeddings: Vec<Vec<f32>> = Vec::with_capacity(texts.len());
    for (i, batch) in texts.chunks(EMBED_BATCH_SIZE).enumerate() {
        let batch_embeddings = embedder.embed(batch).await?;
        if batch_embeddings.len() != batch.len() {
            return Err(EmbeddingError::CountMismatch {
                expected: batch.len(),
                actual: batch_embeddings.len(),
            });
        }
        embeddings.extend(batch_embeddings);
        if (i + 1) % 50 == 0 {
            info!(embedded = embeddings.len(), total = texts.len(), "embedding recipes");
        }
    }

    let dimension = embeddings.first().map_or(0, Vec::len);
    let mut index = FlatL2Index::new(dimension);
    index.add(&embeddings)?;
    info!(rows = index.len(), dimension, model = embedder.model_name(), "built semantic index");
    Ok(index)
}

#[async_trait]
impl RetrievalStrategy for SemanticStrategy {
    async fn search(
        &self,
        query_ingredients: &[String],
        top_n: usize,
    ) -> Result<Vec<RecipeSummary>, EmbeddingError> {
        let query = query_ingredients.join(" ");
        if query.trim().is_empty() || top_n == 0 {
            return Ok(Vec::new());
        }

        let mut embedded = self.embedder.embed(&[query]).await?;
        let query_vector = embedded.pop().ok_or(EmbeddingError::CountMismatch { expected: 1, actual: 0 })?;
        let neighbors = self.index.search(&query_vector, top_n)?;

        match neighbors.first() {
            Some(nearest) if nearest.distance <= self.max_distance => {}
            _ => return Ok(Vec::new()),
        }

        Ok(neighbors
            .into_iter()
            .filter_map(|n| {
                self.dataset
                    .get(n.position)
                    .map(|record| RecipeSummary::from_record(record, n.distance))
            })
            .collect())
    }

    fn name(&self) -> &'static str {
        "semantic"
    }
}
