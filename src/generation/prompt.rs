use serde::{Deserialize, Serialize};

use crate::allergen::AllergenCatalog;

const SYNONYMS_PER_ALLERGEN: usize = 6;

const RESPONSE_FORMAT: &str = "Respond with ONLY a single JSON object that begins with '{' and ends with '}'.\n\
Do NOT include any markdown fences (```), bullets, or extra text.\n\n\
The JSON schema:\n\
{\n\
\x20 \"title\": string,\n\
\x20 \"prep_time\": string,\n\
\x20 \"cook_time\": string,\n\
\x20 \"servings\": string,\n\
\x20 \"ingredients\": [list of strings],\n\
\x20 \"instructions\": [list of strings]\n\
}\n";

/// Optional limits on a generated recipe. Empty strings and zero minutes
/// count as not set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConstraintSet {
    #[serde(default)]
    pub dietary_preference: Option<String>,
    #[serde(default, alias = "max_prep_time")]
    pub max_prep_minutes: Option<u32>,
    #[serde(default, alias = "max_cook_time")]
    pub max_cook_minutes: Option<u32>,
    #[serde(default)]
    pub excluded_allergens: Vec<String>,
    #[serde(default)]
    pub preferred_cuisine: Option<String>,
}

fn active_text(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

impl ConstraintSet {
    pub fn dietary_preference(&self) -> Option<&str> {
        active_text(&self.dietary_preference)
    }

    pub fn preferred_cuisine(&self) -> Option<&str> {
        active_text(&self.preferred_cuisine)
    }

    pub fn max_prep_minutes(&self) -> Option<u32> {
        self.max_prep_minutes.filter(|&m| m > 0)
    }

    pub fn max_cook_minutes(&self) -> Option<u32> {
        self.max_cook_minutes.filter(|&m| m > 0)
    }

    /// Excluded categories with blanks removed, in caller order.
    pub fn excluded_allergens(&self) -> Vec<&str> {
        self.excluded_allergens
            .iter()
            .map(|a| a.trim())
            .filter(|a| !a.is_empty())
            .collect()
    }
}

/// One sentence per active constraint: cuisine, diet, prep time, cook time, allergens.
fn constraint_sentences(
    constraints: &ConstraintSet,
    cuisine: Option<&str>,
    catalog: &AllergenCatalog,
) -> Vec<String> {
    let mut sentences = Vec::new();
    if let Some(cuisine) = cuisine.filter(|c| !c.trim().is_empty()) {
        sentences.push(format!("Please style the recipe in {} cuisine.", cuisine));
    }
    if let Some(diet) = constraints.dietary_preference() {
        sentences.push(format!("Make sure the recipe is strictly {}.", diet));
    }
    if let Some(minutes) = constraints.max_prep_minutes() {
        sentences.push(format!("Preparation time must not exceed {} minutes.", minutes));
    }
    if let Some(minutes) = constraints.max_cook_minutes() {
        sentences.push(format!("Cooking time must not exceed {} minutes.", minutes));
    }

    let excluded = constraints.excluded_allergens();
    if !excluded.is_empty() {
        let parts: Vec<String> = excluded
            .iter()
            .map(|category| {
                let synonyms = match catalog.synonyms(category) {
                    Some(synonyms) => synonyms.to_vec(),
                    None => vec![category.to_string()],
                };
                let shown: Vec<&str> = synonyms
                    .iter()
                    .take(SYNONYMS_PER_ALLERGEN)
                    .map(String::as_str)
                    .collect();
                format!("{} ({})", category, shown.join(", "))
            })
            .collect();
        sentences.push(format!(
            "Do NOT include any of these allergens or their common forms: {}",
            parts.join("; ")
        ));
    }
    sentences
}

/// Builds the single generation prompt for `ingredients` under `constraints`.
pub fn build_prompt(
    ingredients: &[String],
    constraints: &ConstraintSet,
    cuisine: Option<&str>,
    catalog: &AllergenCatalog,
) -> String {
    format!(
        "You are a world-renowned chef with over 20 years of experience.\n\
         Using only these ingredients: {}, create a complete, original recipe.\n\
         {}\n\n{}",
        ingredients.join(", "),
        constraint_sentences(constraints, cuisine, catalog).join("\n"),
        RESPONSE_FORMAT
    )
}
