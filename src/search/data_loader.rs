use anyhow::{Context, Result};
use csv::{ReaderBuilder, StringRecord};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::path::Path;

use crate::normalizer::{normalize_ingredient, searchable_text};

const TITLE_COL: &[&str] = &["title", "name"];
const INGREDIENTS_COL: &[&str] = &["ingredients"];
const INSTRUCTIONS_COL: &[&str] = &["instructions", "directions"];
const CLEANED_TEXT_COL: &[&str] = &["cleaned_text"];
const PREP_TIME_COL: &[&str] = &["prep_time", "prep_minutes", "prepTime"];
const COOK_TIME_COL: &[&str] = &["cook_time", "cook_minutes", "cookTime"];
const SERVINGS_COL: &[&str] = &["servings", "yield", "serves"];

#[derive(Debug, Clone, Serialize)]
pub struct RecipeRecord {
    pub position: usize,
    pub title: String,
    pub ingredients: Vec<String>,
    pub instructions: Vec<String>,
    pub prep_time: Option<String>,
    pub cook_time: Option<String>,
    pub servings: Option<String>,
    #[serde(skip)]
    pub searchable_text: String,
}

/// Read-only recipe table. Row positions are the identity that the semantic
/// index hands back, so records are never reordered after loading.
#[derive(Debug)]
pub struct Dataset {
    records: Vec<RecipeRecord>,
    fingerprint: [u8; 32],
}

impl Dataset {
    pub fn from_records(mut records: Vec<RecipeRecord>) -> Self {
        for (position, record) in records.iter_mut().enumerate() {
            record.position = position;
        }
        let fingerprint = fingerprint(&records);
        Self {
            records,
            fingerprint,
        }
    }

    pub fn get(&self, position: usize) -> Option<&RecipeRecord> {
        self.records.get(position)
    }

    pub fn records(&self) -> &[RecipeRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// SHA-256 over the row-ordered titles and searchable texts.
    pub fn fingerprint(&self) -> [u8; 32] {
        self.fingerprint
    }
}

fn fingerprint(records: &[RecipeRecord]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update((records.len() as u64).to_le_bytes());
    for record in records {
        for field in [&record.title, &record.searchable_text] {
            hasher.update((field.len() as u64).to_le_bytes());
            hasher.update(field.as_bytes());
        }
    }
    hasher.finalize().into()
}

fn find_column(headers: &StringRecord, names: &[&str]) -> Option<usize> {
    headers
        .iter()
        .position(|h| names.iter().any(|name| h.trim().eq_ignore_ascii_case(name)))
}

fn required_column(headers: &StringRecord, names: &[&str]) -> Result<usize> {
    find_column(headers, names).ok_or_else(|| anyhow::anyhow!("Column '{}' not found", names[0]))
}

fn optional_text(record: &StringRecord, idx: Option<usize>) -> Option<String> {
    idx.and_then(|i| record.get(i))
        .map(str::trim)
        .filter(|s| !s.is_empty() && !s.eq_ignore_ascii_case("nan"))
        .map(String::from)
}

/// Decodes a list column stored as its textual literal (`['a', 'b']` or
/// `["a", "b"]`). Anything that does not decode becomes a one-element list.
pub fn decode_list_literal(raw: &str) -> Vec<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }
    parse_quoted_list(trimmed).unwrap_or_else(|| vec![trimmed.to_string()])
}

fn parse_quoted_list(text: &str) -> Option<Vec<String>> {
    let inner = text.strip_prefix('[')?.strip_suffix(']')?;
    let mut items = Vec::new();
    let mut chars = inner.chars().peekable();

    loop {
        while chars.next_if(|c| c.is_whitespace()).is_some() {}
        let quote = match chars.next() {
            None => break,
            Some(q @ ('\'' | '"')) => q,
            Some(_) => return None,
        };

        let mut item = String::new();
        loop {
            match chars.next()? {
                '\\' => match chars.next()? {
                    'n' => item.push('\n'),
                    't' => item.push('\t'),
                    other => item.push(other),
                },
                c if c == quote => break,
                c => item.push(c),
            }
        }
        items.push(item);

        while chars.next_if(|c| c.is_whitespace()).is_some() {}
        match chars.next() {
            None => break,
            Some(',') => continue,
            Some(_) => return None,
        }
    }
    Some(items)
}

pub fn load_recipe_dataset(csv_path: &Path) -> Result<Dataset> {
    if !csv_path.exists() {
        return Err(anyhow::anyhow!("Recipe CSV file not found at: {:?}", csv_path));
    }

    let file = std::fs::File::open(csv_path)
        .with_context(|| format!("Failed to open recipe CSV file at {:?}", csv_path))?;
    let mut rdr = ReaderBuilder::new().has_headers(true).flexible(true).from_reader(file);

    let headers = rdr.headers()?.clone();

    let title_idx = required_column(&headers, TITLE_COL)?;
    let ingredients_idx = required_column(&headers, INGREDIENTS_COL)?;
    let instructions_idx = required_column(&headers, INSTRUCTIONS_COL)?;
    let cleaned_idx = find_column(&headers, CLEANED_TEXT_COL);
    let prep_idx = find_column(&headers, PREP_TIME_COL);
    let cook_idx = find_column(&headers, COOK_TIME_COL);
    let servings_idx = find_column(&headers, SERVINGS_COL);

    let mut records = Vec::new();
    for (row_index, result) in rdr.records().enumerate() {
        let record = result.with_context(|| format!("Failed to read record at row index {}", row_index))?;

        let title = record.get(title_idx).unwrap_or_default().trim().to_string();
        let ingredients = decode_list_literal(record.get(ingredients_idx).unwrap_or_default());
        let instructions = decode_list_literal(record.get(instructions_idx).unwrap_or_default());

        let searchable = match optional_text(&record, cleaned_idx) {
            Some(cleaned) => normalize_ingredient(&cleaned),
            None => searchable_text(&ingredients, &instructions),
        };

        records.push(RecipeRecord {
            position: records.len(),
            title,
            ingredients,
            instructions,
            prep_time: optional_text(&record, prep_idx),
            cook_time: optional_text(&record, cook_idx),
            servings: optional_text(&record, servings_idx),
            searchable_text: searchable,
        });
    }

    if records.is_empty() {
        return Err(anyhow::anyhow!("No recipes loaded from {:?}", csv_path));
    }

    Ok(Dataset::from_records(records))
}
