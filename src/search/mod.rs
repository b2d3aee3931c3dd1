pub mod ann_engine;
pub mod data_loader;
pub mod embedding_engine;
pub mod index_cache;
pub mod lexical;
pub mod semantic;

use async_trait::async_trait;
use serde::{Serialize, Serializer};
use std::fmt;

pub use ann_engine::FlatL2Index;
pub use data_loader::{load_recipe_dataset, Dataset, RecipeRecord};
pub use embedding_engine::{EmbeddingEngine, EmbeddingError, EmbeddingService};
pub use index_cache::SemanticIndexCache;
pub use lexical::LexicalStrategy;
pub use semantic::SemanticStrategy;

/// Marker used when a recipe row has no value for an optional field.
pub const UNKNOWN_MARKER: &str = "unknown";

/// Optional recipe metadata that always serializes to text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetadataField {
    Known(String),
    Unknown,
}

impl From<Option<&String>> for MetadataField {
    fn from(value: Option<&String>) -> Self {
        match value {
            Some(text) => MetadataField::Known(text.clone()),
            None => MetadataField::Unknown,
        }
    }
}

impl fmt::Display for MetadataField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetadataField::Known(text) => f.write_str(text),
            MetadataField::Unknown => f.write_str(UNKNOWN_MARKER),
        }
    }
}

impl Serialize for MetadataField {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RecipeSummary {
    pub position: usize,
    pub title: String,
    pub ingredients: Vec<String>,
    pub instructions: Vec<String>,
    pub prep_time: MetadataField,
    pub cook_time: MetadataField,
    pub servings: MetadataField,
    /// Cosine similarity for lexical matches, squared L2 distance for semantic ones.
    pub score: f32,
}

impl RecipeSummary {
    pub fn from_record(record: &RecipeRecord, score: f32) -> Self {
        Self {
            position: record.position,
            title: record.title.clone(),
            ingredients: record.ingredients.clone(),
            instructions: record.instructions.clone(),
            prep_time: record.prep_time.as_ref().into(),
            cook_time: record.cook_time.as_ref().into(),
            servings: record.servings.as_ref().into(),
            score,
        }
    }
}

/// A way of ranking dataset recipes against a list of query ingredients.
///
/// Implementations return matches best first and an empty list, not an
/// error, when nothing clears their relevance threshold.
#[async_trait]
pub trait RetrievalStrategy: Send + Sync {
    async fn search(
        &self,
        query_ingredients: &[String],
        top_n: usize,
    ) -> Result<Vec<RecipeSummary>, EmbeddingError>;

    fn name(&self) -> &'static str;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum StrategyKind {
    Lexical,
    Semantic,
}

impl std::str::FromStr for StrategyKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "lexical" | "tfidf" => Ok(StrategyKind::Lexical),
            "semantic" | "vector" => Ok(StrategyKind::Semantic),
            other => Err(anyhow::anyhow!("Unknown retrieval strategy: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_metadata_serializes_as_unknown() {
        let record = RecipeRecord {
            position: 3,
            title: "Soup".into(),
            ingredients: vec!["water".into()],
            instructions: vec!["Boil.".into()],
            prep_time: Some("5 mins".into()),
            cook_time: None,
            servings: None,
            searchable_text: "water boil".into(),
        };
        let summary = RecipeSummary::from_record(&record, 0.5);
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["prep_time"], "5 mins");
        assert_eq!(json["cook_time"], "unknown");
        assert_eq!(json["servings"], "unknown");
        assert_eq!(json["position"], 3);
    }

    #[test]
    fn parses_strategy_names() {
        assert_eq!("Lexical".parse::<StrategyKind>().unwrap(), StrategyKind::Lexical);
        assert_eq!("vector".parse::<StrategyKind>().unwrap(), StrategyKind::Semantic);
        assert!("hybrid".parse::<StrategyKind>().is_err());
    }
}
