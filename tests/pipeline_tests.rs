use async_trait::async_trait;
use recipe_finder::allergen::{AllergenEngine, IngredientEntry};
use recipe_finder::api_connection::{ApiConnectionError, TextGenerator};
use recipe_finder::cuisine::DEFAULT_CUISINE_TIMEOUT;
use recipe_finder::generation::pipeline::DEFAULT_GENERATION_TIMEOUT;
use recipe_finder::generation::{ConstraintSet, GenerationError, RecipeGenerator};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Answers cuisine questions and recipe requests from fixed scripts and
/// records every prompt it was given with its timeout.
struct ScriptedGenerator {
    cuisine_reply: Option<&'static str>,
    recipe_reply: Option<&'static str>,
    calls: Mutex<Vec<(String, Duration)>>,
}

impl ScriptedGenerator {
    fn new(cuisine_reply: Option<&'static str>, recipe_reply: Option<&'static str>) -> Arc<Self> {
        Arc::new(Self {
            cuisine_reply,
            recipe_reply,
            calls: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> Vec<(String, Duration)> {
        self.calls.lock().unwrap().clone()
    }

    fn prompts(&self) -> Vec<String> {
        self.calls().into_iter().map(|(prompt, _)| prompt).collect()
    }

    fn timeout_for(&self, cuisine_call: bool) -> Duration {
        self.calls()
            .into_iter()
            .find(|(prompt, _)| prompt.contains("culinary expert") == cuisine_call)
            .map(|(_, timeout)| timeout)
            .expect("call was not made")
    }

    fn recipe_prompt(&self) -> String {
        self.prompts()
            .into_iter()
            .find(|p| !p.contains("culinary expert"))
            .expect("no recipe prompt was sent")
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn generate(&self, prompt: &str, timeout: Duration) -> Result<String, ApiConnectionError> {
        self.calls.lock().unwrap().push((prompt.to_string(), timeout));
        let reply = if prompt.contains("culinary expert") {
            self.cuisine_reply
        } else {
            self.recipe_reply
        };
        reply
            .map(String::from)
            .ok_or_else(|| ApiConnectionError::UnsupportedProvider("scripted failure".to_string()))
    }
}

fn pipeline(generator: &Arc<ScriptedGenerator>) -> RecipeGenerator {
    RecipeGenerator::new(generator.clone(), AllergenEngine::default())
}

fn items(names: &[&str]) -> Vec<String> {
    names.iter().map(|n| n.to_string()).collect()
}

const FENCED_RECIPE: &str = "```json\n{\"title\": \"Garlic Chicken\", \"prep_time\": \"10 minutes\", \"cook_time\": 25, \"servings\": \"2\", \"ingredients\": [\"chicken\", \"garlic\", \"oat drink\"], \"instructions\": \"1. Sear the chicken.\\n2. Add garlic and oat drink.\\n3. Simmer.\"}\n```";

#[tokio::test]
async fn fenced_reply_with_escaped_newlines_parses() {
    let generator = ScriptedGenerator::new(Some("{\"cuisine\": \"French\"}"), Some(FENCED_RECIPE));
    let recipe = pipeline(&generator)
        .generate(&items(&["chicken", "garlic"]), &ConstraintSet::default())
        .await
        .unwrap();

    assert_eq!(recipe.title, "Garlic Chicken");
    assert_eq!(recipe.cook_time.as_deref(), Some("25"));
    assert_eq!(
        recipe.instructions,
        vec!["Sear the chicken.", "Add garlic and oat drink.", "Simmer."]
    );
    assert_eq!(recipe.cuisine.as_deref(), Some("French"));
    assert!(generator.recipe_prompt().contains("Please style the recipe in French cuisine."));
}

#[tokio::test]
async fn excluded_allergen_is_substituted_before_prompting() {
    let generator = ScriptedGenerator::new(Some("{\"cuisine\": \"International\"}"), Some(FENCED_RECIPE));
    let constraints = ConstraintSet {
        excluded_allergens: vec!["milk".into()],
        ..Default::default()
    };
    let recipe = pipeline(&generator)
        .generate(&items(&["chicken", "garlic", "milk"]), &constraints)
        .await
        .unwrap();

    let prompts = generator.prompts();
    assert_eq!(prompts.len(), 2, "one cuisine call, one recipe call");
    assert!(prompts[0].contains("chicken, garlic, oat drink\n"), "cuisine sees substituted list");

    let prompt = generator.recipe_prompt();
    assert!(prompt.contains("Using only these ingredients: chicken, garlic, oat drink, create"));
    let listed = prompt
        .split("Using only these ingredients: ")
        .nth(1)
        .and_then(|rest| rest.split(", create").next())
        .expect("ingredient list is in the prompt");
    assert!(!listed.contains("milk"), "listed: {listed}");

    let engine = AllergenEngine::default();
    let substituted = engine.substitute(&items(&["chicken", "garlic", "milk"]), &["milk"]);
    let entries: Vec<IngredientEntry> = substituted.into_iter().map(IngredientEntry::from).collect();
    assert!(engine.detect(&entries, &["milk"]).is_empty());
    assert!(prompt.contains("Do NOT include any of these allergens or their common forms: milk (milk, cream, butter"));
    assert!(!prompt.contains("Please style"), "International is never a styling constraint");
    assert_eq!(recipe.cuisine, None);
}

#[tokio::test]
async fn allergen_in_generated_recipe_is_rejected_with_the_recipe() {
    let generator = ScriptedGenerator::new(
        Some("{\"cuisine\": \"Italian\"}"),
        Some(r#"{"title": "Buttery Pasta", "ingredients": ["pasta", "Butter"], "instructions": ["Boil.", "Toss."]}"#),
    );
    let constraints = ConstraintSet {
        excluded_allergens: vec!["milk".into(), "eggs".into()],
        ..Default::default()
    };
    let err = pipeline(&generator)
        .generate(&items(&["pasta"]), &constraints)
        .await
        .unwrap_err();

    match err {
        GenerationError::AllergenViolation { categories, recipe } => {
            assert_eq!(categories, vec!["milk"]);
            assert_eq!(recipe.title, "Buttery Pasta");
            assert_eq!(recipe.cuisine, None, "cuisine is attached only on success");
        }
        other => panic!("expected allergen violation, got {:?}", other),
    }
}

#[tokio::test]
async fn preferred_cuisine_skips_classification() {
    let generator = ScriptedGenerator::new(None, Some(FENCED_RECIPE));
    let constraints = ConstraintSet {
        preferred_cuisine: Some("Mexican".into()),
        dietary_preference: Some("high-protein".into()),
        max_cook_minutes: Some(40),
        ..Default::default()
    };
    let recipe = pipeline(&generator)
        .generate(&items(&["chicken"]), &constraints)
        .await
        .unwrap();

    assert_eq!(generator.prompts().len(), 1);
    assert_eq!(recipe.cuisine.as_deref(), Some("Mexican"));
    let prompt = generator.recipe_prompt();
    assert!(prompt.contains("Please style the recipe in Mexican cuisine.\nMake sure the recipe is strictly high-protein.\nCooking time must not exceed 40 minutes."));
}

#[tokio::test]
async fn failed_classification_degrades_to_no_cuisine() {
    let generator = ScriptedGenerator::new(None, Some(FENCED_RECIPE));
    let recipe = pipeline(&generator)
        .generate(&items(&["chicken"]), &ConstraintSet::default())
        .await
        .unwrap();
    assert_eq!(recipe.cuisine, None);
    assert!(!generator.recipe_prompt().contains("Please style"));
}

#[tokio::test]
async fn upstream_failure_is_terminal() {
    let generator = ScriptedGenerator::new(Some("{\"cuisine\": \"Thai\"}"), None);
    let err = pipeline(&generator)
        .generate(&items(&["rice"]), &ConstraintSet::default())
        .await
        .unwrap_err();
    assert!(matches!(err, GenerationError::Upstream(ApiConnectionError::UnsupportedProvider(_))));
}

#[tokio::test]
async fn unparseable_reply_carries_sanitized_text() {
    let generator = ScriptedGenerator::new(Some("{\"cuisine\": \"Thai\"}"), Some("  \"Sorry,\\nI cannot cook.\"  "));
    let err = pipeline(&generator)
        .generate(&items(&["rice"]), &ConstraintSet::default())
        .await
        .unwrap_err();
    match err {
        GenerationError::Parse(failure) => {
            assert_eq!(failure.sanitized_raw, "Sorry,\nI cannot cook.");
            assert!(!failure.message.is_empty());
        }
        other => panic!("expected parse failure, got {:?}", other),
    }
}

#[tokio::test]
async fn plan_exposes_prompt_without_generating() {
    let generator = ScriptedGenerator::new(Some("{\"cuisine\": \"Korean\"}"), None);
    let plan = pipeline(&generator)
        .plan(&items(&["Butter", "kimchi"]), &ConstraintSet {
            excluded_allergens: vec!["milk".into()],
            ..Default::default()
        })
        .await;
    assert_eq!(plan.ingredients, vec!["Olive oil", "kimchi"]);
    assert_eq!(plan.cuisine.as_deref(), Some("Korean"));
    assert!(plan.prompt.contains("Olive oil, kimchi"));
    assert_eq!(generator.prompts().len(), 1, "only the cuisine question was asked");
}

#[tokio::test]
async fn each_call_gets_its_own_timeout() {
    let generator = ScriptedGenerator::new(Some("{\"cuisine\": \"Thai\"}"), Some(FENCED_RECIPE));
    pipeline(&generator)
        .generate(&items(&["rice"]), &ConstraintSet::default())
        .await
        .unwrap();
    assert_eq!(generator.timeout_for(true), DEFAULT_CUISINE_TIMEOUT);
    assert_eq!(generator.timeout_for(false), DEFAULT_GENERATION_TIMEOUT);

    let generator = ScriptedGenerator::new(Some("{\"cuisine\": \"Thai\"}"), Some(FENCED_RECIPE));
    RecipeGenerator::new(generator.clone(), AllergenEngine::default())
        .with_timeouts(Duration::from_secs(90), Duration::from_secs(3))
        .generate(&items(&["rice"]), &ConstraintSet::default())
        .await
        .unwrap();
    assert_eq!(generator.timeout_for(true), Duration::from_secs(3));
    assert_eq!(generator.timeout_for(false), Duration::from_secs(90));
}
