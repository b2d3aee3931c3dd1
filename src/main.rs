use anyhow::{anyhow, Result};
use recipe_finder::cli::{parse_args, Command};
use recipe_finder::config::Settings;
use recipe_finder::generation::{ConstraintSet, GenerationError};
use recipe_finder::service::{build_allergen_engine, build_generator, parse_ingredients, CookbookService};
use serde::Serialize;
use serde_json::json;
use std::collections::BTreeMap;
use tracing_subscriber::EnvFilter;

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// JSON body describing a failed generation, mirroring what a caller needs
/// to diagnose it.
fn generation_error_report(err: &GenerationError) -> serde_json::Value {
    match err {
        GenerationError::Upstream(_) => json!({ "error": err.to_string() }),
        GenerationError::Parse(failure) => json!({
            "error": "Failed to parse LLM JSON output.",
            "parse_error": failure.message,
            "sanitized_raw": failure.sanitized_raw,
        }),
        GenerationError::AllergenViolation { categories, recipe } => json!({
            "error": format!("Recipe contains excluded allergens: {}", categories.join(", ")),
            "recipe": recipe,
        }),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = parse_args();
    let mut settings = Settings::from_env()?;

    match cli.command {
        Command::Parse { ingredients } => {
            print_json(&json!({ "parsed_ingredients": parse_ingredients(&ingredients) }))?;
        }
        Command::Search {
            ingredients,
            strategy,
            top_n,
        } => {
            if let Some(strategy) = strategy {
                settings.retrieval_strategy = strategy;
            }
            if let Some(top_n) = top_n {
                settings.top_n = top_n;
            }
            let cookbook = CookbookService::from_settings(&settings).await?;
            tracing::info!(strategy = cookbook.strategy_name(), "searching");
            print_json(&cookbook.search(&ingredients).await?)?;
        }
        Command::Generate {
            ingredients,
            constraints,
            dry_run,
        } => {
            let generator = build_generator(&settings)?;
            let constraints = ConstraintSet::from(constraints);
            if dry_run {
                let plan = generator.plan(&ingredients, &constraints).await;
                print_json(&json!({
                    "ingredients": plan.ingredients,
                    "cuisine": plan.cuisine,
                    "prompt": plan.prompt,
                }))?;
                return Ok(());
            }
            match generator.generate(&ingredients, &constraints).await {
                Ok(recipe) => print_json(&json!({ "recipe": recipe }))?,
                Err(e) => {
                    print_json(&generation_error_report(&e))?;
                    return Err(anyhow!(e));
                }
            }
        }
        Command::Substitute { ingredients, exclude } => {
            let engine = build_allergen_engine(&settings)?;
            if exclude.is_empty() {
                let suggestions: BTreeMap<&str, Vec<String>> = ingredients
                    .iter()
                    .map(|i| (i.as_str(), engine.suggest(i)))
                    .collect();
                print_json(&json!({ "suggestions": suggestions }))?;
            } else {
                print_json(&json!({
                    "original": ingredients,
                    "substituted": engine.substitute(&ingredients, &exclude),
                }))?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use recipe_finder::api_connection::ApiConnectionError;

    #[test]
    fn upstream_failure_is_described_once() {
        let err = GenerationError::Upstream(ApiConnectionError::EmptyResponse);
        let report = generation_error_report(&err);
        let message = report["error"].as_str().unwrap();
        assert_eq!(message, "Generation service call failed: API returned an empty response");
        assert_eq!(message.matches("Generation service call failed").count(), 1);
    }
}
