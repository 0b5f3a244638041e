use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::error::{Error, Result};

static TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\w\w+\b").expect("valid regex"));

/// Sparse row: `(feature index, value)` pairs sorted by index.
pub type SparseVector = Vec<(usize, f64)>;

/// Lower-cased word tokens followed by adjacent-word bigrams.
pub fn tokenize(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    let words: Vec<&str> = TOKEN.find_iter(&lower).map(|m| m.as_str()).collect();

    let mut terms: Vec<String> = words.iter().map(|w| w.to_string()).collect();
    terms.extend(words.windows(2).map(|pair| format!("{} {}", pair[0], pair[1])));
    terms
}

/// TF-IDF over unigrams and bigrams with a capped vocabulary.
#[derive(Debug, Clone)]
pub struct TfidfVectorizer {
    max_features: usize,
    vocabulary: HashMap<String, usize>,
    idf: Vec<f64>,
}

impl TfidfVectorizer {
    pub fn new(max_features: usize) -> Self {
        Self {
            max_features,
            vocabulary: HashMap::new(),
            idf: Vec::new(),
        }
    }

    pub fn vocabulary_size(&self) -> usize {
        self.idf.len()
    }

    /// Keeps the `max_features` terms with the highest total count across the
    /// corpus (ties broken alphabetically) and computes smoothed idf weights.
    pub fn fit<S: AsRef<str>>(&mut self, documents: &[S]) -> Result<()> {
        if documents.is_empty() {
            return Err(Error::Training("cannot fit vectorizer on an empty corpus".to_string()));
        }

        // term -> (corpus count, document frequency)
        let mut stats: BTreeMap<String, (usize, usize)> = BTreeMap::new();
        for doc in documents {
            let terms = tokenize(doc.as_ref());
            for term in &terms {
                stats.entry(term.clone()).or_insert((0, 0)).0 += 1;
            }
            let unique: BTreeSet<String> = terms.into_iter().collect();
            for term in unique {
                if let Some(entry) = stats.get_mut(&term) {
                    entry.1 += 1;
                }
            }
        }

        let mut ranked: Vec<(String, (usize, usize))> = stats.into_iter().collect();
        ranked.sort_by(|a, b| b.1 .0.cmp(&a.1 .0).then_with(|| a.0.cmp(&b.0)));
        ranked.truncate(self.max_features);
        ranked.sort_by(|a, b| a.0.cmp(&b.0));

        let n = documents.len() as f64;
        self.vocabulary = HashMap::with_capacity(ranked.len());
        self.idf = Vec::with_capacity(ranked.len());
        for (index, (term, (_, df))) in ranked.into_iter().enumerate() {
            self.idf.push(((1.0 + n) / (1.0 + df as f64)).ln() + 1.0);
            self.vocabulary.insert(term, index);
        }

        tracing::debug!("Vectorizer fit: {} features from {} documents", self.idf.len(), documents.len());
        Ok(())
    }

    /// Raw term counts scaled by idf, then L2-normalized.
    pub fn transform(&self, text: &str) -> SparseVector {
        let mut counts: BTreeMap<usize, f64> = BTreeMap::new();
        for term in tokenize(text) {
            if let Some(&index) = self.vocabulary.get(&term) {
                *counts.entry(index).or_insert(0.0) += 1.0;
            }
        }

        let mut row: SparseVector = counts
            .into_iter()
            .map(|(index, tf)| (index, tf * self.idf[index]))
            .collect();

        let norm = row.iter().map(|(_, v)| v * v).sum::<f64>().sqrt();
        if norm > 0.0 {
            for (_, v) in row.iter_mut() {
                *v /= norm;
            }
        }
        row
    }
}

impl Default for TfidfVectorizer {
    fn default() -> Self {
        Self::new(5_000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_adds_bigrams() {
        let terms = tokenize("No sleep, a brutal class");
        assert_eq!(
            terms,
            vec!["no", "sleep", "brutal", "class", "no sleep", "sleep brutal", "brutal class"]
        );
    }

    #[test]
    fn test_transform_is_normalized_and_ignores_unknown_terms() {
        let mut vectorizer = TfidfVectorizer::default();
        vectorizer
            .fit(&["brutal exams every week", "chill lectures every week"])
            .unwrap();

        let row = vectorizer.transform("brutal exams and brutal psets");
        let norm: f64 = row.iter().map(|(_, v)| v * v).sum::<f64>().sqrt();
        assert!((norm - 1.0).abs() < 1e-9);

        assert!(vectorizer.transform("entirely unseen words").is_empty());
    }

    #[test]
    fn test_max_features_keeps_most_frequent_terms() {
        let mut vectorizer = TfidfVectorizer::new(1);
        vectorizer.fit(&["exams hard", "exams easy", "exams fine"]).unwrap();
        assert_eq!(vectorizer.vocabulary_size(), 1);
        assert!(!vectorizer.transform("exams").is_empty());
        assert!(vectorizer.transform("hard").is_empty());
    }

    #[test]
    fn test_max_features_ranks_by_corpus_count() {
        // "brutal" appears in one document but three times; "exams" in two.
        let mut vectorizer = TfidfVectorizer::new(1);
        vectorizer.fit(&["brutal brutal brutal", "exams", "exams"]).unwrap();
        assert!(!vectorizer.transform("brutal").is_empty());
        assert!(vectorizer.transform("exams").is_empty());
    }

    #[test]
    fn test_empty_corpus_fails() {
        let mut vectorizer = TfidfVectorizer::default();
        let docs: Vec<String> = Vec::new();
        assert!(matches!(vectorizer.fit(&docs), Err(Error::Training(_))));
    }
}
