use regex::Regex;
use std::sync::LazyLock;

/// Unit words stripped from ingredient lines. "of" rides along so that
/// "2 cups of sugar" collapses to "sugar".
const UNIT_WORDS: &[&str] = &[
    "cup", "cups", "tablespoon", "tablespoons", "tbsp", "teaspoon", "teaspoons", "tsp",
    "pound", "pounds", "lb", "oz", "ounce", "ounces",
    "grams", "gram", "g", "kg", "ml", "liter", "liters",
    "clove", "cloves", "slice", "slices", "can", "cans", "package", "packages", "pinch", "of",
];

static VULGAR_FRACTIONS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[¼½¾⅐⅑⅒⅓⅔⅕⅖⅗⅘⅙⅚⅛⅜⅝⅞]").expect("Invalid fraction regex"));

/// Standalone integers, decimals and `a/b` fractions.
static QUANTITY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\d+(?:[./]\d+)?\b").expect("Invalid quantity regex"));

static PUNCTUATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w\s]").expect("Invalid punctuation regex"));

static UNITS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"\b(?:{})\b", UNIT_WORDS.join("|"))).expect("Invalid unit regex")
});

/// Turns a free-text ingredient line into canonical lowercase tokens.
///
/// Quantities, vulgar fractions, unit words and punctuation are removed and
/// whitespace is collapsed. Anything that matches none of those patterns is
/// left untouched, so the function never fails and `normalize_ingredient`
/// applied to its own output is a no-op.
pub fn normalize_ingredient(raw: &str) -> String {
    let lowered = raw.to_lowercase();
    let text = VULGAR_FRACTIONS.replace_all(&lowered, " ");
    let text = QUANTITY.replace_all(&text, " ");
    let text = UNITS.replace_all(&text, " ");
    let text = PUNCTUATION.replace_all(&text, "");
    // Deleting punctuation can expose new numbers and unit words ("1,000", "c.u.p").
    let text = QUANTITY.replace_all(&text, " ");
    let text = UNITS.replace_all(&text, " ");
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Builds the retrieval text for a recipe from its ingredient and instruction lines.
pub fn searchable_text(ingredients: &[String], instructions: &[String]) -> String {
    let joined = ingredients
        .iter()
        .chain(instructions.iter())
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(" ");
    normalize_ingredient(&joined)
}
