use async_trait::async_trait;
use rayon::prelude::*;
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, LazyLock};
use tracing::info;

use super::data_loader::Dataset;
use super::embedding_engine::EmbeddingError;
use super::{RecipeSummary, RetrievalStrategy};

/// Runs of two or more word characters.
static TOKEN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b\w\w+\b").expect("Invalid token regex"));

/// The standard English stop-word list used by common TF-IDF vectorizers.
const STOP_WORDS: &[&str] = &[
    "a", "about", "above", "across", "after", "afterwards", "again", "against", "all", "almost",
    "alone", "along", "already", "also", "although", "always", "am", "among", "amongst", "amoungst",
    "amount", "an", "and", "another", "any", "anyhow", "anyone", "anything", "anyway", "anywhere",
    "are", "around", "as", "at", "back", "be", "became", "because", "become", "becomes", "becoming",
    "been", "before", "beforehand", "behind", "being", "below", "beside", "besides", "between",
    "beyond", "bill", "both", "bottom", "but", "by", "call", "can", "cannot", "cant", "co", "con",
    "could", "couldnt", "cry", "de", "describe", "detail", "do", "done", "down", "due", "during",
    "each", "eg", "eight", "either", "eleven", "else", "elsewhere", "empty", "enough", "etc",
    "even", "ever", "every", "everyone", "everything", "everywhere", "except", "few", "fifteen",
    "fifty", "fill", "find", "fire", "first", "five", "for", "former", "formerly", "forty", "found",
    "four", "from", "front", "full", "further", "get", "give", "go", "had", "has", "hasnt", "have",
    "he", "hence", "her", "here", "hereafter", "hereby", "herein", "hereupon", "hers", "herself",
    "him", "himself", "his", "how", "however", "hundred", "i", "ie", "if", "in", "inc", "indeed",
    "interest", "into", "is", "it", "its", "itself", "keep", "last", "latter", "latterly", "least",
    "less", "ltd", "made", "many", "may", "me", "meanwhile", "might", "mill", "mine", "more",
    "moreover", "most", "mostly", "move", "much", "must", "my", "myself", "name", "namely",
    "neither", "never", "nevertheless", "next", "nine", "no", "nobody", "none", "noone", "nor",
    "not", "nothing", "now", "nowhere", "of", "off", "often", "on", "once", "one", "only", "onto",
    "or", "other", "others", "otherwise", "our", "ours", "ourselves", "out", "over", "own", "part",
    "per", "perhaps", "please", "put", "rather", "re", "same", "see", "seem", "seemed", "seeming",
    "seems", "serious", "several", "she", "should", "show", "side", "since", "sincere", "six",
    "sixty", "so", "some", "somehow", "someone", "something", "sometime", "sometimes", "somewhere",
    "still", "such", "system", "take", "ten", "than", "that", "the", "their", "them", "themselves",
    "then", "thence", "there", "thereafter", "thereby", "therefore", "therein", "thereupon",
    "these", "they", "thick", "thin", "third", "this", "those", "though", "three", "through",
    "throughout", "thru", "thus", "to", "together", "too", "top", "toward", "towards", "twelve",
    "twenty", "two", "un", "under", "until", "up", "upon", "us", "very", "via", "was", "we", "well",
    "were", "what", "whatever", "when", "whence", "whenever", "where", "whereafter", "whereas",
    "whereby", "wherein", "whereupon", "wherever", "whether", "which", "while", "whither", "who",
    "whoever", "whole", "whom", "whose", "why", "will", "with", "within", "without", "would", "yet",
    "you", "your", "yours", "yourself", "yourselves",
];

static STOP_WORD_SET: LazyLock<HashSet<&'static str>> =
    LazyLock::new(|| STOP_WORDS.iter().copied().collect());

/// Sparse row: (term index, weight), sorted by term index.
type SparseVector = Vec<(usize, f32)>;

fn tokenize(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    TOKEN
        .find_iter(&lowered)
        .map(|m| m.as_str())
        .filter(|t| !STOP_WORD_SET.contains(t))
        .map(String::from)
        .collect()
}

/// Term-frequency / inverse-document-frequency weighting fitted on a fixed corpus.
#[derive(Debug, Clone)]
pub struct TfIdfVectorizer {
    vocabulary: HashMap<String, usize>,
    idf: Vec<f32>,
}

impl TfIdfVectorizer {
    /// Fits vocabulary and smoothed idf on `documents`, returning the
    /// vectorizer and the L2-normalized row for every document.
    pub fn fit_transform(documents: &[&str]) -> (Self, Vec<SparseVector>) {
        let tokenized: Vec<Vec<String>> = documents.par_iter().map(|d| tokenize(d)).collect();

        let mut vocabulary: HashMap<String, usize> = HashMap::new();
        let mut doc_freq: Vec<usize> = Vec::new();
        for tokens in &tokenized {
            let unique: HashSet<&str> = tokens.iter().map(String::as_str).collect();
            for term in unique {
                let next = vocabulary.len();
                let idx = *vocabulary.entry(term.to_string()).or_insert(next);
                if idx == doc_freq.len() {
                    doc_freq.push(0);
                }
                doc_freq[idx] += 1;
            }
        }

        let n = documents.len() as f32;
        let idf = doc_freq
            .iter()
            .map(|&df| ((1.0 + n) / (1.0 + df as f32)).ln() + 1.0)
            .collect();

        let vectorizer = Self { vocabulary, idf };
        let rows = tokenized.par_iter().map(|tokens| vectorizer.weigh(tokens)).collect();
        (vectorizer, rows)
    }

    pub fn transform(&self, text: &str) -> SparseVector {
        self.weigh(&tokenize(text))
    }

    pub fn vocabulary_len(&self) -> usize {
        self.vocabulary.len()
    }

    fn weigh(&self, tokens: &[String]) -> SparseVector {
        let mut counts: HashMap<usize, f32> = HashMap::new();
        for token in tokens {
            if let Some(&idx) = self.vocabulary.get(token) {
                *counts.entry(idx).or_insert(0.0) += 1.0;
            }
        }
        let mut vector: SparseVector = counts
            .into_iter()
            .map(|(idx, tf)| (idx, tf * self.idf[idx]))
            .collect();
        vector.sort_unstable_by_key(|&(idx, _)| idx);

        let norm = vector.iter().map(|(_, w)| w * w).sum::<f32>().sqrt();
        if norm > 0.0 {
            for (_, w) in vector.iter_mut() {
                *w /= norm;
            }
        }
        vector
    }
}

/// Dot product of two index-sorted sparse vectors. Both sides are unit
/// length (or empty), so this is their cosine similarity.
fn sparse_dot(a: &[(usize, f32)], b: &[(usize, f32)]) -> f32 {
    let (mut i, mut j, mut sum) = (0, 0, 0.0);
    while i < a.len() && j < b.len() {
        match a[i].0.cmp(&b[j].0) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                sum += a[i].1 * b[j].1;
                i += 1;
                j += 1;
            }
        }
    }
    sum
}

/// Keyword retrieval: cosine similarity between TF-IDF vectors of the query
/// and of every recipe's searchable text.
pub struct LexicalStrategy {
    dataset: Arc<Dataset>,
    vectorizer: TfIdfVectorizer,
    rows: Vec<SparseVector>,
}

impl LexicalStrategy {
    pub fn new(dataset: Arc<Dataset>) -> Self {
        let documents: Vec<&str> = dataset
            .records()
            .iter()
            .map(|r| r.searchable_text.as_str())
            .collect();
        let (vectorizer, rows) = TfIdfVectorizer::fit_transform(&documents);
        info!(
            recipes = dataset.len(),
            vocabulary = vectorizer.vocabulary_len(),
            "lexical index built"
        );
        Self {
            dataset,
            vectorizer,
            rows,
        }
    }

    /// Ranked (position, score) pairs, best first. Empty when nothing scores above zero.
    /// Scoring runs on the rayon pool; the calling task waits for it.
    pub fn rank(&self, query_ingredients: &[String], top_n: usize) -> Vec<(usize, f32)> {
        let query = self.vectorizer.transform(&query_ingredients.join(" "));
        let scores: Vec<f32> = self.rows.par_iter().map(|row| sparse_dot(&query, row)).collect();

        let best = scores.iter().copied().fold(0.0_f32, f32::max);
        if best <= 0.0 {
            return Vec::new();
        }

        let mut ranked: Vec<(usize, f32)> = scores.into_iter().enumerate().collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranked.truncate(top_n);
        ranked
    }
}

#[async_trait]
impl RetrievalStrategy for LexicalStrategy {
    async fn search(
        &self,
        query_ingredients: &[String],
        top_n: usize,
    ) -> Result<Vec<RecipeSummary>, EmbeddingError> {
        Ok(self
            .rank(query_ingredients, top_n)
            .into_iter()
            .filter_map(|(position, score)| {
                self.dataset
                    .get(position)
                    .map(|record| RecipeSummary::from_record(record, score))
            })
            .collect())
    }

    fn name(&self) -> &'static str {
        "lexical"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::data_loader::RecipeRecord;

    fn dataset(texts: &[(&str, &str)]) -> Arc<Dataset> {
        Arc::new(Dataset::from_records(
            texts
                .iter()
                .map(|(title, text)| RecipeRecord {
                    position: 0,
                    title: title.to_string(),
                    ingredients: text.split(' ').map(String::from).collect(),
                    instructions: vec![],
                    prep_time: None,
                    cook_time: None,
                    servings: None,
                    searchable_text: text.to_string(),
                })
                .collect(),
        ))
    }

    fn query(words: &[&str]) -> Vec<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    #[test]
    fn tokenizer_drops_stop_words_and_single_chars() {
        assert_eq!(tokenize("Add the Garlic and a pinch of salt, x"), vec!["add", "garlic", "pinch", "salt"]);
    }

    #[test]
    fn number_and_position_words_are_stop_words() {
        assert_eq!(
            tokenize("Two eggs on top, fill the side with three full cups of rice"),
            vec!["eggs", "cups", "rice"]
        );
    }

    #[test]
    fn smoothed_idf_matches_reference_formula() {
        let (vectorizer, rows) = TfIdfVectorizer::fit_transform(&["rice beans", "rice"]);
        let rice = vectorizer.vocabulary["rice"];
        let beans = vectorizer.vocabulary["beans"];
        assert!((vectorizer.idf[rice] - 1.0).abs() < 1e-6);
        assert!((vectorizer.idf[beans] - ((3.0_f32 / 2.0).ln() + 1.0)).abs() < 1e-6);
        for row in &rows {
            let norm: f32 = row.iter().map(|(_, w)| w * w).sum();
            assert!((norm - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn best_match_comes_first() {
        let strategy = LexicalStrategy::new(dataset(&[
            ("Cake", "flour sugar butter eggs bake"),
            ("Stir fry", "chicken garlic soy rice wok"),
            ("Garlic bread", "bread garlic butter toast"),
        ]));
        let ranked = strategy.rank(&query(&["chicken", "garlic", "rice"]), 2);
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].0, 1);
        assert_eq!(ranked[1].0, 2);
        assert!(ranked[0].1 > ranked[1].1);
    }

    #[test]
    fn no_overlap_is_empty() {
        let strategy = LexicalStrategy::new(dataset(&[("Cake", "flour sugar butter")]));
        assert!(strategy.rank(&query(&["tamarind"]), 5).is_empty());
        assert!(strategy.rank(&query(&["the", "and"]), 5).is_empty(), "stop words carry no signal");
        assert!(strategy.rank(&[], 5).is_empty());
    }

    #[test]
    fn zero_score_rows_fill_the_tail_once_something_matches() {
        let strategy = LexicalStrategy::new(dataset(&[
            ("Cake", "flour sugar"),
            ("Soup", "leek potato"),
        ]));
        let ranked = strategy.rank(&query(&["potato"]), 5);
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].0, 1);
        assert_eq!(ranked[1].1, 0.0);
    }

    #[tokio::test]
    async fn search_returns_summaries() {
        let strategy = LexicalStrategy::new(dataset(&[("Soup", "leek potato")]));
        let results = strategy.search(&query(&["leek"]), 3).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].title, "Soup");
        assert_eq!(strategy.name(), "lexical");
    }
}
