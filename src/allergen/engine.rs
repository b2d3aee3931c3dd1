use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::debug;

use super::catalog::{AllergenCatalog, SubstitutionCatalog};

/// An ingredient as it shows up in model output: either a bare string or an
/// object whose `name` may be missing (read as empty).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IngredientEntry {
    PlainName(String),
    NamedRecord {
        #[serde(default)]
        name: String,
    },
}

impl IngredientEntry {
    pub fn display_name(&self) -> &str {
        match self {
            IngredientEntry::PlainName(name) => name,
            IngredientEntry::NamedRecord { name } => name,
        }
    }
}

impl From<&str> for IngredientEntry {
    fn from(name: &str) -> Self {
        IngredientEntry::PlainName(name.to_string())
    }
}

impl From<String> for IngredientEntry {
    fn from(name: String) -> Self {
        IngredientEntry::PlainName(name)
    }
}

#[derive(Debug, Clone)]
pub struct AllergenEngine {
    allergens: Arc<AllergenCatalog>,
    substitutions: Arc<SubstitutionCatalog>,
}

impl Default for AllergenEngine {
    fn default() -> Self {
        Self::new(AllergenCatalog::builtin(), SubstitutionCatalog::builtin())
    }
}

impl AllergenEngine {
    pub fn new(allergens: Arc<AllergenCatalog>, substitutions: Arc<SubstitutionCatalog>) -> Self {
        Self {
            allergens,
            substitutions,
        }
    }

    pub fn allergens(&self) -> &AllergenCatalog {
        &self.allergens
    }

    /// Reports every requested category with at least one synonym occurring
    /// as a substring of the joined, lowercased ingredient text. Categories
    /// come back spelled the way the caller spelled them.
    pub fn detect<S: AsRef<str>>(
        &self,
        ingredients: &[IngredientEntry],
        excluded_categories: &[S],
    ) -> BTreeSet<String> {
        let mut found = BTreeSet::new();
        if excluded_categories.is_empty() {
            return found;
        }

        let text = ingredients
            .iter()
            .map(IngredientEntry::display_name)
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase();

        for category in excluded_categories {
            let category = category.as_ref();
            let synonyms = self.allergens.synonyms_or_self(category);
            if synonyms.iter().any(|syn| text.contains(syn.as_str())) {
                found.insert(category.to_string());
            }
        }
        found
    }

    /// Swaps every ingredient that trips an excluded category for its first
    /// substitute that trips none. Ingredients without such a substitute are
    /// dropped, never passed through.
    pub fn substitute<S: AsRef<str>>(
        &self,
        ingredients: &[String],
        excluded_categories: &[S],
    ) -> Vec<String> {
        let synonyms: Vec<String> = excluded_categories
            .iter()
            .flat_map(|category| self.allergens.synonyms_or_self(category.as_ref()))
            .collect();

        let mut out = Vec::with_capacity(ingredients.len());
        for ingredient in ingredients {
            let lower = ingredient.to_lowercase();
            if !synonyms.iter().any(|syn| lower.contains(syn.as_str())) {
                out.push(ingredient.clone());
                continue;
            }

            let safe = self.lookup(&lower).and_then(|candidates| {
                candidates.iter().find(|candidate| {
                    let candidate = candidate.to_lowercase();
                    !synonyms.iter().any(|syn| candidate.contains(syn.as_str()))
                })
            });
            match safe {
                Some(replacement) => {
                    let replacement = if starts_uppercase(ingredient) {
                        capitalize(replacement)
                    } else {
                        replacement.clone()
                    };
                    debug!(original = %ingredient, %replacement, "substituted ingredient");
                    out.push(replacement);
                }
                None => debug!(original = %ingredient, "dropped ingredient with no safe substitute"),
            }
        }
        out
    }

    /// All catalog substitutes for one ingredient, preferred first.
    pub fn suggest(&self, ingredient: &str) -> Vec<String> {
        let lower = ingredient.trim().to_lowercase();
        self.lookup(&lower).map(<[String]>::to_vec).unwrap_or_default()
    }

    fn lookup(&self, lower: &str) -> Option<&[String]> {
        self.substitutions.get(lower).or_else(|| {
            lower
                .strip_suffix('s')
                .and_then(|singular| self.substitutions.get(singular))
        })
    }
}

fn starts_uppercase(text: &str) -> bool {
    text.chars().next().is_some_and(char::is_uppercase)
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}
