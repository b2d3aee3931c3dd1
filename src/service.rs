use anyhow::{Context, Result};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

use crate::allergen::{AllergenCatalog, AllergenEngine, SubstitutionCatalog};
use crate::api_connection::{Provider, TextGenerator};
use crate::config::{EmbeddingBackend, GenerationBackend, Settings};
use crate::generation::RecipeGenerator;
use crate::normalizer::normalize_ingredient;
use crate::search::embedding_engine::RemoteEmbedder;
use crate::search::{
    load_recipe_dataset, EmbeddingEngine, EmbeddingError, EmbeddingService, LexicalStrategy,
    RecipeSummary, RetrievalStrategy, SemanticStrategy, StrategyKind,
};

pub const NO_MATCH_MESSAGE: &str = "No match found. You may want to generate a recipe.";

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum SearchOutcome {
    Matches { results: Vec<RecipeSummary> },
    NoMatch { message: &'static str },
}

/// Normalizes every entry and drops the ones that normalize to nothing.
pub fn parse_ingredients<S: AsRef<str>>(raw: &[S]) -> Vec<String> {
    raw.iter()
        .map(|entry| normalize_ingredient(entry.as_ref()))
        .filter(|entry| !entry.is_empty())
        .collect()
}

/// One retrieval strategy and one generator behind the four user operations.
pub struct CookbookService {
    strategy: Box<dyn RetrievalStrategy>,
    generator: RecipeGenerator,
    top_n: usize,
}

impl CookbookService {
    pub fn new(strategy: Box<dyn RetrievalStrategy>, generator: RecipeGenerator, top_n: usize) -> Self {
        Self {
            strategy,
            generator,
            top_n,
        }
    }

    pub async fn from_settings(settings: &Settings) -> Result<Self> {
        let strategy = build_strategy(settings).await?;
        let generator = build_generator(settings)?;
        Ok(Self::new(strategy, generator, settings.top_n))
    }

    pub fn strategy_name(&self) -> &'static str {
        self.strategy.name()
    }

    pub async fn search<S: AsRef<str>>(&self, raw: &[S]) -> Result<SearchOutcome, EmbeddingError> {
        self.search_top(raw, self.top_n).await
    }

    pub async fn search_top<S: AsRef<str>>(&self, raw: &[S], top_n: usize) -> Result<SearchOutcome, EmbeddingError> {
        let query = parse_ingredients(raw);
        let results = self.strategy.search(&query, top_n).await?;
        Ok(if results.is_empty() {
            SearchOutcome::NoMatch {
                message: NO_MATCH_MESSAGE,
            }
        } else {
            SearchOutcome::Matches { results }
        })
    }

    pub fn suggest_substitutes(&self, ingredient: &str) -> Vec<String> {
        self.generator.allergens().suggest(ingredient)
    }
}

pub fn build_embedder(settings: &Settings) -> Result<Arc<dyn EmbeddingService>> {
    let model = settings.embedding_model();
    let embedder: Arc<dyn EmbeddingService> = match settings.embedding_backend {
        EmbeddingBackend::Local => Arc::new(
            EmbeddingEngine::new(model).context("Failed to initialize local embedding model")?,
        ),
        EmbeddingBackend::Ollama => Arc::new(RemoteEmbedder::new(Provider::ollama(&settings.ollama_url, model))),
    };
    Ok(embedder)
}

/// Loads the dataset and builds the configured retrieval strategy.
pub async fn build_strategy(settings: &Settings) -> Result<Box<dyn RetrievalStrategy>> {
    let dataset = Arc::new(load_recipe_dataset(&settings.data_path)?);
    info!(recipes = dataset.len(), path = ?settings.data_path, "loaded recipe dataset");

    let strategy: Box<dyn RetrievalStrategy> = match settings.retrieval_strategy {
        StrategyKind::Lexical => Box::new(LexicalStrategy::new(dataset)),
        StrategyKind::Semantic => {
            let embedder = build_embedder(settings)?;
            Box::new(
                SemanticStrategy::open(
                    dataset,
                    embedder,
                    &settings.embedding_cache_path,
                    settings.semantic_max_distance,
                )
                .await?,
            )
        }
    };
    Ok(strategy)
}

pub fn build_text_generator(settings: &Settings) -> Arc<dyn TextGenerator> {
    let provider = match settings.generation_backend {
        GenerationBackend::Ollama => Provider::ollama(&settings.ollama_url, &settings.model_name),
        GenerationBackend::OpenRouter => Provider::openrouter(&settings.api_key_env_var, &settings.model_name),
    };
    Arc::new(provider)
}

pub fn build_allergen_engine(settings: &Settings) -> Result<AllergenEngine> {
    let substitutions = match &settings.substitution_dict_path {
        Some(path) => {
            let catalog = SubstitutionCatalog::from_json_file(path)?;
            info!(terms = catalog.len(), path = ?path, "loaded substitution catalog");
            Arc::new(catalog)
        }
        None => SubstitutionCatalog::builtin(),
    };
    Ok(AllergenEngine::new(AllergenCatalog::builtin(), substitutions))
}

pub fn build_generator(settings: &Settings) -> Result<RecipeGenerator> {
    Ok(
        RecipeGenerator::new(build_text_generator(settings), build_allergen_engine(settings)?)
            .with_timeouts(settings.generation_timeout, settings.cuisine_timeout),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_drops_entries_that_normalize_to_nothing() {
        assert_eq!(parse_ingredients(&["2 cups of Sugar", "3", " ", "Eggs!"]), vec!["sugar", "eggs"]);
    }

    #[test]
    fn outcomes_serialize_flat() {
        let none = serde_json::to_value(SearchOutcome::NoMatch { message: NO_MATCH_MESSAGE }).unwrap();
        assert_eq!(none["message"], NO_MATCH_MESSAGE);
        let some = serde_json::to_value(SearchOutcome::Matches { results: vec![] }).unwrap();
        assert!(some["results"].as_array().unwrap().is_empty());
    }

    #[test]
    fn custom_substitution_file_replaces_builtin() -> Result<()> {
        let dir = tempfile::TempDir::new()?;
        let path = dir.path().join("subs.json");
        std::fs::write(&path, r#"{"Milk": ["rice milk"]}"#)?;
        let settings = Settings {
            substitution_dict_path: Some(path),
            ..Settings::default()
        };
        let engine = build_allergen_engine(&settings)?;
        assert_eq!(engine.suggest("milk"), vec!["rice milk"]);
        assert!(engine.suggest("butter").is_empty());
        Ok(())
    }
}
