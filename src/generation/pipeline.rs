use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, instrument};

use super::prompt::{build_prompt, ConstraintSet};
use super::sanitizer::{parse_generated_recipe, GeneratedRecipe, ParseFailure};
use crate::allergen::AllergenEngine;
use crate::api_connection::{ApiConnectionError, TextGenerator};
use crate::cuisine::{self, DEFAULT_CUISINE_TIMEOUT};

pub const DEFAULT_GENERATION_TIMEOUT: Duration = Duration::from_secs(30);

/// Stages of one generation request. They run in declaration order and
/// never go back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Substitute,
    DetermineCuisine,
    BuildPrompt,
    Generate,
    SanitizeParse,
    PostValidate,
    Done,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineStage::Substitute => "substitute",
            PipelineStage::DetermineCuisine => "determine_cuisine",
            PipelineStage::BuildPrompt => "build_prompt",
            PipelineStage::Generate => "generate",
            PipelineStage::SanitizeParse => "sanitize_parse",
            PipelineStage::PostValidate => "post_validate",
            PipelineStage::Done => "done",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("Generation service call failed: {0}")]
    Upstream(#[from] ApiConnectionError),
    #[error("Failed to parse model output as a recipe: {}", .0.message)]
    Parse(ParseFailure),
    #[error("Recipe contains excluded allergens: {}", .categories.join(", "))]
    AllergenViolation {
        categories: Vec<String>,
        recipe: Box<GeneratedRecipe>,
    },
}

/// Everything decided before the model is called.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationPlan {
    /// Ingredients after allergen substitution.
    pub ingredients: Vec<String>,
    pub cuisine: Option<String>,
    pub prompt: String,
}

pub struct RecipeGenerator {
    generator: Arc<dyn TextGenerator>,
    allergens: AllergenEngine,
    generation_timeout: Duration,
    cuisine_timeout: Duration,
}

impl RecipeGenerator {
    pub fn new(generator: Arc<dyn TextGenerator>, allergens: AllergenEngine) -> Self {
        Self {
            generator,
            allergens,
            generation_timeout: DEFAULT_GENERATION_TIMEOUT,
            cuisine_timeout: DEFAULT_CUISINE_TIMEOUT,
        }
    }

    pub fn with_timeouts(mut self, generation: Duration, cuisine: Duration) -> Self {
        self.generation_timeout = generation;
        self.cuisine_timeout = cuisine;
        self
    }

    pub fn allergens(&self) -> &AllergenEngine {
        &self.allergens
    }

    /// Runs the stages up to and including prompt construction.
    pub async fn plan(&self, ingredients: &[String], constraints: &ConstraintSet) -> GenerationPlan {
        let excluded = constraints.excluded_allergens();

        debug!(stage = %PipelineStage::Substitute, excluded = ?excluded);
        let ingredients = if excluded.is_empty() {
            ingredients.to_vec()
        } else {
            self.allergens.substitute(ingredients, &excluded)
        };

        debug!(stage = %PipelineStage::DetermineCuisine);
        let cuisine = match constraints.preferred_cuisine() {
            Some(preferred) => Some(preferred.to_string()),
            None => cuisine::classify(self.generator.as_ref(), &ingredients, self.cuisine_timeout)
                .await
                .as_constraint()
                .map(String::from),
        };

        debug!(stage = %PipelineStage::BuildPrompt, cuisine = ?cuisine);
        let prompt = build_prompt(&ingredients, constraints, cuisine.as_deref(), self.allergens.allergens());

        GenerationPlan {
            ingredients,
            cuisine,
            prompt,
        }
    }

    /// Generates one recipe from `ingredients` under `constraints`.
    #[instrument(skip_all, fields(ingredients = ingredients.len()))]
    pub async fn generate(
        &self,
        ingredients: &[String],
        constraints: &ConstraintSet,
    ) -> Result<GeneratedRecipe, GenerationError> {
        let plan = self.plan(ingredients, constraints).await;

        debug!(stage = %PipelineStage::Generate);
        let raw = self.generator.generate(&plan.prompt, self.generation_timeout).await?;
        debug!(raw = %raw, "model output");

        debug!(stage = %PipelineStage::SanitizeParse);
        let mut recipe = parse_generated_recipe(&raw).map_err(GenerationError::Parse)?;

        debug!(stage = %PipelineStage::PostValidate);
        let excluded = constraints.excluded_allergens();
        let found = self.allergens.detect(&recipe.ingredient_entries(), &excluded);
        if !found.is_empty() {
            return Err(GenerationError::AllergenViolation {
                categories: found.into_iter().collect(),
                recipe: Box::new(recipe),
            });
        }

        debug!(stage = %PipelineStage::Done, title = %recipe.title);
        if plan.cuisine.is_some() {
            recipe.cuisine = plan.cuisine;
        }
        Ok(recipe)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stages_display_as_snake_case() {
        assert_eq!(PipelineStage::DetermineCuisine.to_string(), "determine_cuisine");
        assert_eq!(PipelineStage::Done.to_string(), "done");
    }

    #[test]
    fn violation_message_lists_categories() {
        let err = GenerationError::AllergenViolation {
            categories: vec!["eggs".into(), "milk".into()],
            recipe: Box::new(GeneratedRecipe {
                title: "Flan".into(),
                prep_time: None,
                cook_time: None,
                servings: None,
                ingredients: vec!["egg".into(), "milk".into()],
                instructions: vec![],
                cuisine: None,
            }),
        };
        assert_eq!(err.to_string(), "Recipe contains excluded allergens: eggs, milk");
    }
}
