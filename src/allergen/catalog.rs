use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, LazyLock};

const ALLERGEN_SYNONYMS: &[(&str, &[&str])] = &[
    ("milk", &["milk", "cream", "butter", "yogurt", "cheese", "paneer"]),
    ("eggs", &["egg", "eggs"]),
    ("fish", &["fish", "salmon", "tuna", "cod", "trout", "haddock"]),
    ("shellfish", &["shrimp", "prawn", "crab", "lobster", "oyster", "mussel"]),
    ("peanuts", &["peanut", "peanuts"]),
    (
        "tree nuts",
        &[
            "almond", "almonds", "walnut", "walnuts", "cashew", "cashews", "pecan", "pecans",
            "hazelnut", "hazelnuts", "pistachio", "pistachios", "brazil nut", "brazil nuts",
            "macadamia", "pine nut", "pine nuts",
        ],
    ),
    ("wheat", &["wheat", "whole wheat", "spelt", "bulgur"]),
    ("gluten", &["gluten", "barley", "rye"]),
    ("soy", &["soy", "tofu", "soy sauce", "edamame"]),
    ("sesame", &["sesame", "tahini"]),
    ("mustard", &["mustard"]),
    ("sulfites", &["sulfur dioxide", "sulfite", "sulfites"]),
];

const SUBSTITUTIONS: &[(&str, &[&str])] = &[
    ("egg", &["chia seeds", "flaxseed meal"]),
    ("milk", &["oat drink", "soy beverage", "rice drink"]),
    ("butter", &["olive oil", "coconut oil"]),
    ("honey", &["maple syrup", "agave nectar"]),
    ("cream", &["whipped coconut", "silken tofu"]),
    ("cheese", &["nutritional yeast", "vegan cheese"]),
    ("yogurt", &["cultured coconut", "silken tofu"]),
    ("mayonnaise", &["vegan mayo", "mashed avocado"]),
    ("beef", &["tofu", "tempeh", "jackfruit"]),
    ("chicken", &["tofu", "seitan", "mushrooms"]),
    ("pork", &["tempeh", "jackfruit"]),
    ("fish", &["tofu", "seaweed-seasoned tofu"]),
    ("shellfish", &["hearts of palm", "artichoke hearts"]),
    ("gelatin", &["agar agar"]),
    ("lard", &["vegetable shortening", "coconut oil"]),
    ("whipped cream", &["whipped coconut", "whipped aquafaba"]),
];

static BUILTIN_ALLERGENS: LazyLock<Arc<AllergenCatalog>> =
    LazyLock::new(|| Arc::new(AllergenCatalog::from_table(ALLERGEN_SYNONYMS)));

static BUILTIN_SUBSTITUTIONS: LazyLock<Arc<SubstitutionCatalog>> =
    LazyLock::new(|| Arc::new(SubstitutionCatalog::from_table(SUBSTITUTIONS)));

/// Allergen category -> ordered synonym terms. Category lookup ignores case.
#[derive(Debug, Clone)]
pub struct AllergenCatalog {
    categories: HashMap<String, Vec<String>>,
}

impl AllergenCatalog {
    /// The process-wide built-in catalog.
    pub fn builtin() -> Arc<Self> {
        Arc::clone(&BUILTIN_ALLERGENS)
    }

    pub(crate) fn from_table(table: &[(&str, &[&str])]) -> Self {
        let categories = table
            .iter()
            .map(|(category, synonyms)| {
                (
                    category.to_lowercase(),
                    synonyms.iter().map(|s| s.to_string()).collect(),
                )
            })
            .collect();
        Self { categories }
    }

    pub fn synonyms(&self, category: &str) -> Option<&[String]> {
        self.categories
            .get(&category.to_lowercase())
            .map(Vec::as_slice)
    }

    /// Synonyms for a category, or the lowercased category itself when the
    /// catalog does not know it.
    pub fn synonyms_or_self(&self, category: &str) -> Vec<String> {
        match self.synonyms(category) {
            Some(synonyms) => synonyms.to_vec(),
            None => vec![category.to_lowercase()],
        }
    }
}

/// Lowercase ingredient term -> substitutes, first entry preferred.
#[derive(Debug, Clone)]
pub struct SubstitutionCatalog {
    substitutes: HashMap<String, Vec<String>>,
}

impl SubstitutionCatalog {
    /// The process-wide built-in catalog.
    pub fn builtin() -> Arc<Self> {
        Arc::clone(&BUILTIN_SUBSTITUTIONS)
    }

    pub(crate) fn from_table(table: &[(&str, &[&str])]) -> Self {
        let substitutes = table
            .iter()
            .map(|(term, candidates)| {
                (
                    term.to_lowercase(),
                    candidates.iter().map(|s| s.to_string()).collect(),
                )
            })
            .collect();
        Self { substitutes }
    }

    /// Loads a catalog from a JSON object of `term -> [substitutes]`.
    /// Keys are lowercased; terms with no candidates are dropped.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read substitution catalog at {:?}", path))?;
        let raw: HashMap<String, Vec<String>> = serde_json::from_str(&contents)
            .with_context(|| format!("Substitution catalog at {:?} is not a term -> list map", path))?;
        let substitutes = raw
            .into_iter()
            .filter(|(_, candidates)| !candidates.is_empty())
            .map(|(term, candidates)| (term.trim().to_lowercase(), candidates))
            .collect();
        Ok(Self { substitutes })
    }

    pub fn get(&self, term: &str) -> Option<&[String]> {
        self.substitutes.get(term).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.substitutes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.substitutes.is_empty()
    }
}
