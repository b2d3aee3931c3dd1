pub mod pipeline;
pub mod prompt;
pub mod sanitizer;

pub use pipeline::{GenerationError, GenerationPlan, PipelineStage, RecipeGenerator};
pub use prompt::{build_prompt, ConstraintSet};
pub use sanitizer::{parse_generated_recipe, sanitize, GeneratedRecipe, ParseFailure};
