use anyhow::{anyhow, Context, Result};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::search::embedding_engine::{DEFAULT_LOCAL_MODEL_ID, DEFAULT_OLLAMA_EMBEDDING_MODEL};
use crate::search::semantic::DEFAULT_MAX_DISTANCE;
use crate::search::StrategyKind;

pub const DEFAULT_DATA_PATH: &str = "data/recipes.csv";
pub const DEFAULT_EMBEDDING_CACHE_PATH: &str = "data/precomputed_embeddings.bin";
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
pub const DEFAULT_MODEL_NAME: &str = "nous-hermes";
pub const DEFAULT_API_KEY_ENV_VAR: &str = "OPENROUTER_API_KEY";
pub const DEFAULT_TOP_N: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddingBackend {
    /// In-process static model.
    Local,
    Ollama,
}

impl FromStr for EmbeddingBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "local" | "model2vec" => Ok(EmbeddingBackend::Local),
            "ollama" => Ok(EmbeddingBackend::Ollama),
            other => Err(anyhow!("Unknown embedding backend: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationBackend {
    Ollama,
    OpenRouter,
}

impl FromStr for GenerationBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "ollama" => Ok(GenerationBackend::Ollama),
            "openrouter" => Ok(GenerationBackend::OpenRouter),
            other => Err(anyhow!("Unknown generation backend: {}", other)),
        }
    }
}

/// Deployment settings, read once at startup.
#[derive(Debug, Clone)]
pub struct Settings {
    pub data_path: PathBuf,
    pub embedding_cache_path: PathBuf,
    /// JSON `term -> [substitutes]` map replacing the built-in substitutions.
    pub substitution_dict_path: Option<PathBuf>,
    pub ollama_url: String,
    pub model_name: String,
    /// Defaults to the backend's own default model when unset.
    pub embedding_model: Option<String>,
    pub embedding_backend: EmbeddingBackend,
    pub generation_backend: GenerationBackend,
    /// Name of the environment variable holding the OpenRouter key.
    pub api_key_env_var: String,
    pub retrieval_strategy: StrategyKind,
    pub top_n: usize,
    pub semantic_max_distance: f32,
    pub generation_timeout: Duration,
    pub cuisine_timeout: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_path: PathBuf::from(DEFAULT_DATA_PATH),
            embedding_cache_path: PathBuf::from(DEFAULT_EMBEDDING_CACHE_PATH),
            substitution_dict_path: None,
            ollama_url: DEFAULT_OLLAMA_URL.to_string(),
            model_name: DEFAULT_MODEL_NAME.to_string(),
            embedding_model: None,
            embedding_backend: EmbeddingBackend::Local,
            generation_backend: GenerationBackend::Ollama,
            api_key_env_var: DEFAULT_API_KEY_ENV_VAR.to_string(),
            retrieval_strategy: StrategyKind::Lexical,
            top_n: DEFAULT_TOP_N,
            semantic_max_distance: DEFAULT_MAX_DISTANCE,
            generation_timeout: crate::generation::pipeline::DEFAULT_GENERATION_TIMEOUT,
            cuisine_timeout: crate::cuisine::DEFAULT_CUISINE_TIMEOUT,
        }
    }
}

fn parse_var<T>(name: &str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse::<T>()
        .map_err(|e| anyhow!("{}", e))
        .with_context(|| format!("Invalid value for {}: '{}'", name, value))
}

impl Settings {
    /// Loads `.env` if present, then reads the process environment.
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds settings from any variable source. Unset or blank variables
    /// keep their defaults; malformed values are errors.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let mut settings = Settings::default();

        if let Some(v) = var("DATA_PATH") {
            settings.data_path = PathBuf::from(v);
        }
        if let Some(v) = var("EMBEDDING_CACHE_PATH") {
            settings.embedding_cache_path = PathBuf::from(v);
        }
        settings.substitution_dict_path = var("SUBSTITUTION_DICT_PATH").map(PathBuf::from);
        if let Some(v) = var("OLLAMA_URL") {
            settings.ollama_url = v.trim().to_string();
        }
        if let Some(v) = var("MODEL_NAME") {
            settings.model_name = v.trim().to_string();
        }
        settings.embedding_model = var("EMBEDDING_MODEL").map(|v| v.trim().to_string());
        if let Some(v) = var("EMBEDDING_BACKEND") {
            settings.embedding_backend = parse_var("EMBEDDING_BACKEND", &v)?;
        }
        if let Some(v) = var("GENERATION_BACKEND") {
            settings.generation_backend = parse_var("GENERATION_BACKEND", &v)?;
        }
        if let Some(v) = var("API_KEY_ENV_VAR") {
            settings.api_key_env_var = v.trim().to_string();
        }
        if let Some(v) = var("RETRIEVAL_STRATEGY") {
            settings.retrieval_strategy = parse_var("RETRIEVAL_STRATEGY", &v)?;
        }
        if let Some(v) = var("TOP_N") {
            settings.top_n = parse_var("TOP_N", &v)?;
        }
        if let Some(v) = var("SEMANTIC_MAX_DISTANCE") {
            settings.semantic_max_distance = parse_var("SEMANTIC_MAX_DISTANCE", &v)?;
        }
        if let Some(v) = var("GENERATION_TIMEOUT_SECS") {
            settings.generation_timeout = Duration::from_secs(parse_var("GENERATION_TIMEOUT_SECS", &v)?);
        }
        if let Some(v) = var("CUISINE_TIMEOUT_SECS") {
            settings.cuisine_timeout = Duration::from_secs(parse_var("CUISINE_TIMEOUT_SECS", &v)?);
        }
        Ok(settings)
    }

    /// The embedding model identifier for the configured backend.
    pub fn embedding_model(&self) -> &str {
        match (&self.embedding_model, self.embedding_backend) {
            (Some(model), _) => model,
            (None, EmbeddingBackend::Local) => DEFAULT_LOCAL_MODEL_ID,
            (None, EmbeddingBackend::Ollama) => DEFAULT_OLLAMA_EMBEDDING_MODEL,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings(vars: &[(&str, &str)]) -> Result<Settings> {
        let map: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Settings::from_lookup(|name| map.get(name).cloned())
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let s = settings(&[]).unwrap();
        assert_eq!(s.data_path, PathBuf::from(DEFAULT_DATA_PATH));
        assert_eq!(s.top_n, 5);
        assert_eq!(s.retrieval_strategy, StrategyKind::Lexical);
        assert_eq!(s.generation_timeout, Duration::from_secs(30));
        assert_eq!(s.cuisine_timeout, Duration::from_secs(10));
        assert_eq!(s.semantic_max_distance, 1.5);
        assert_eq!(s.embedding_model(), DEFAULT_LOCAL_MODEL_ID);
        assert!(s.substitution_dict_path.is_none());
    }

    #[test]
    fn overrides_are_parsed() {
        let s = settings(&[
            ("RETRIEVAL_STRATEGY", "semantic"),
            ("EMBEDDING_BACKEND", "ollama"),
            ("GENERATION_BACKEND", "OpenRouter"),
            ("TOP_N", " 3 "),
            ("SEMANTIC_MAX_DISTANCE", "0.8"),
            ("CUISINE_TIMEOUT_SECS", "2"),
            ("MODEL_NAME", "llama3"),
            ("DATA_PATH", ""),
        ])
        .unwrap();
        assert_eq!(s.retrieval_strategy, StrategyKind::Semantic);
        assert_eq!(s.embedding_backend, EmbeddingBackend::Ollama);
        assert_eq!(s.generation_backend, GenerationBackend::OpenRouter);
        assert_eq!(s.top_n, 3);
        assert_eq!(s.semantic_max_distance, 0.8);
        assert_eq!(s.cuisine_timeout, Duration::from_secs(2));
        assert_eq!(s.model_name, "llama3");
        assert_eq!(s.data_path, PathBuf::from(DEFAULT_DATA_PATH), "blank keeps the default");
        assert_eq!(s.embedding_model(), DEFAULT_OLLAMA_EMBEDDING_MODEL);
    }

    #[test]
    fn malformed_numbers_are_errors() {
        let err = settings(&[("TOP_N", "many")]).unwrap_err();
        assert!(err.to_string().contains("Invalid value for TOP_N"));
        assert!(settings(&[("RETRIEVAL_STRATEGY", "hybrid")]).is_err());
    }
}
