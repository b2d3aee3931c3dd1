use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

use crate::api_connection::{ApiConnectionError, TextGenerator};
use crate::generation::sanitizer::sanitize;

/// Label used when no specific cuisine could be determined.
pub const FALLBACK_CUISINE: &str = "International";

pub const DEFAULT_CUISINE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackCause {
    Timeout,
    Transport,
    Decode,
    MissingField,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CuisineOutcome {
    Detected(String),
    Fallback(FallbackCause),
}

impl CuisineOutcome {
    pub fn label(&self) -> &str {
        match self {
            CuisineOutcome::Detected(label) => label,
            CuisineOutcome::Fallback(_) => FALLBACK_CUISINE,
        }
    }

    /// The cuisine to style a recipe in, if any. "International" in any
    /// casing is not a styling constraint.
    pub fn as_constraint(&self) -> Option<&str> {
        match self {
            CuisineOutcome::Detected(label) if !label.eq_ignore_ascii_case(FALLBACK_CUISINE) => {
                Some(label)
            }
            _ => None,
        }
    }
}

#[derive(Deserialize)]
struct CuisineReply {
    cuisine: Option<String>,
}

pub fn build_cuisine_prompt(ingredients: &[String]) -> String {
    format!(
        "You are a culinary expert. Given these ingredients:\n{}\n\n\
         Respond with valid JSON only:\n{{ \"cuisine\": string }}\nNo extra text.",
        ingredients.join(", ")
    )
}

/// Asks the model for the single best-fitting cuisine. Never fails: any
/// problem degrades to [`CuisineOutcome::Fallback`] with its cause.
pub async fn classify(
    generator: &dyn TextGenerator,
    ingredients: &[String],
    timeout: Duration,
) -> CuisineOutcome {
    let prompt = build_cuisine_prompt(ingredients);
    let raw = match generator.generate(&prompt, timeout).await {
        Ok(raw) => raw,
        Err(e) => {
            let cause = match &e {
                ApiConnectionError::Timeout(_) => FallbackCause::Timeout,
                ApiConnectionError::Decode(_)
                | ApiConnectionError::SerializationError(_)
                | ApiConnectionError::EmptyResponse => {
                    FallbackCause::Decode
                }
                _ => FallbackCause::Transport,
            };
            warn!(error = %e, ?cause, "cuisine detection failed, using fallback");
            return CuisineOutcome::Fallback(cause);
        }
    };

    let outcome = match serde_json::from_str::<CuisineReply>(&sanitize(&raw)) {
        Err(_) => CuisineOutcome::Fallback(FallbackCause::Decode),
        Ok(CuisineReply { cuisine: Some(label) }) if !label.trim().is_empty() => {
            CuisineOutcome::Detected(label.trim().to_string())
        }
        Ok(_) => CuisineOutcome::Fallback(FallbackCause::MissingField),
    };
    debug!(?outcome, "cuisine detection finished");
    outcome
}
