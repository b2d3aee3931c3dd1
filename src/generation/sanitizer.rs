use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::sync::LazyLock;

use crate::allergen::IngredientEntry;

static LEADING_BULLET: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^[ \t]*-[ \t]*").expect("Invalid bullet regex"));

static STEP_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*(?:step\s*)?\d+[.):]\s*").expect("Invalid step regex"));

const FENCE: &str = "```";

/// A recipe recovered from model output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedRecipe {
    #[serde(alias = "recipe_title", alias = "name")]
    pub title: String,
    #[serde(default, deserialize_with = "loose_text")]
    pub prep_time: Option<String>,
    #[serde(default, deserialize_with = "loose_text")]
    pub cook_time: Option<String>,
    #[serde(default, deserialize_with = "loose_text")]
    pub servings: Option<String>,
    #[serde(deserialize_with = "text_list")]
    pub ingredients: Vec<String>,
    #[serde(deserialize_with = "text_list")]
    pub instructions: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cuisine: Option<String>,
}

impl GeneratedRecipe {
    pub fn ingredient_entries(&self) -> Vec<IngredientEntry> {
        self.ingredients.iter().map(|i| IngredientEntry::from(i.as_str())).collect()
    }
}

/// Model output that could not be coerced into a [`GeneratedRecipe`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParseFailure {
    pub message: String,
    pub sanitized_raw: String,
}

/// Strips formatting artifacts that models wrap around JSON.
///
/// Steps run in order and each is skipped when its precondition fails:
/// trim, unfence, unquote, decode `\n` `\t` `\r` escapes, drop leading
/// hyphen bullets.
pub fn sanitize(raw: &str) -> String {
    let text = raw.trim();
    let text = strip_fence(text);
    let text = strip_wrapping_quotes(&text);
    let text = decode_escapes(&text);
    LEADING_BULLET.replace_all(&text, "").into_owned()
}

fn strip_fence(text: &str) -> String {
    if text.len() < 2 * FENCE.len() || !text.starts_with(FENCE) || !text.ends_with(FENCE) {
        return text.to_string();
    }
    let lines: Vec<&str> = text.lines().collect();
    if lines.len() >= 2 {
        return lines[1..lines.len() - 1].join("\n").trim().to_string();
    }
    let inner = &text[FENCE.len()..text.len() - FENCE.len()];
    let inner = inner.trim_start();
    inner.strip_prefix("json").unwrap_or(inner).trim().to_string()
}

fn strip_wrapping_quotes(text: &str) -> String {
    match text.strip_prefix('"').and_then(|t| t.strip_suffix('"')) {
        Some(inner) => inner.replace("\\\"", "\""),
        None => text.to_string(),
    }
}

fn decode_escapes(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.peek() {
            Some('n') => {
                chars.next();
                out.push('\n');
            }
            Some('t') => {
                chars.next();
                out.push('\t');
            }
            Some('r') => {
                chars.next();
                out.push('\r');
            }
            Some('\\') => {
                chars.next();
                out.push_str("\\\\");
            }
            _ => out.push('\\'),
        }
    }
    out
}

/// Re-escapes raw control characters that sit inside JSON string literals.
fn escape_control_chars_in_strings(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut escaped = false;
    for c in text.chars() {
        if !in_string {
            if c == '"' {
                in_string = true;
            }
            out.push(c);
            continue;
        }
        if escaped {
            escaped = false;
            out.push(c);
            continue;
        }
        match c {
            '\\' => {
                escaped = true;
                out.push(c);
            }
            '"' => {
                in_string = false;
                out.push(c);
            }
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out
}

fn outermost_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (start < end).then(|| &text[start..=end])
}

/// Sanitizes `raw` and decodes one recipe object from it.
///
/// Decoding tries the sanitized text as is, then with control characters
/// inside string literals re-escaped, then only its outermost `{...}` span.
/// The reported message is the one from the first attempt.
pub fn parse_generated_recipe(raw: &str) -> Result<GeneratedRecipe, ParseFailure> {
    let sanitized = sanitize(raw);
    let first_error = match serde_json::from_str::<GeneratedRecipe>(&sanitized) {
        Ok(recipe) => return Ok(recipe),
        Err(e) => e.to_string(),
    };

    let escaped = escape_control_chars_in_strings(&sanitized);
    let mut candidates = vec![escaped.clone()];
    if let Some(span) = outermost_object(&escaped) {
        candidates.push(span.to_string());
    }
    for candidate in candidates {
        if let Ok(recipe) = serde_json::from_str::<GeneratedRecipe>(&candidate) {
            return Ok(recipe);
        }
    }

    Err(ParseFailure {
        message: first_error,
        sanitized_raw: sanitized,
    })
}

fn loose_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s.trim().to_string()).filter(|s| !s.is_empty())),
        Value::Number(n) => Ok(Some(n.to_string())),
        Value::Bool(b) => Ok(Some(b.to_string())),
        other => Err(serde::de::Error::custom(format!(
            "expected text or number, found {}",
            other
        ))),
    }
}

fn text_list<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::Number(n) => Some(Ok(n.to_string())),
                Value::Null => None,
                other => Some(
                    serde_json::from_value::<IngredientEntry>(other)
                        .map(|entry| entry.display_name().trim().to_string())
                        .map_err(<D::Error as serde::de::Error>::custom),
                ),
            })
            .filter(|item| !matches!(item, Ok(s) if s.is_empty()))
            .collect(),
        Value::String(s) => Ok(s
            .lines()
            .map(|line| STEP_NUMBER.replace(line, "").trim().to_string())
            .filter(|line| !line.is_empty())
            .collect()),
        other => Err(serde::de::Error::custom(format!(
            "expected a list or text, found {}",
            other
        ))),
    }
}
