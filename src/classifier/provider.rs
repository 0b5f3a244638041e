use serde::{Deserialize, Serialize};

use crate::models::review::Review;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DifficultyLabel {
    Easy,
    Medium,
    Hard,
}

impl DifficultyLabel {
    /// Ordinal score used for aggregation: easy 0, medium 1, hard 2.
    pub fn score(&self) -> u8 {
        match self {
            DifficultyLabel::Easy => 0,
            DifficultyLabel::Medium => 1,
            DifficultyLabel::Hard => 2,
        }
    }
}

impl std::fmt::Display for DifficultyLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DifficultyLabel::Easy => write!(f, "easy"),
            DifficultyLabel::Medium => write!(f, "medium"),
            DifficultyLabel::Hard => write!(f, "hard"),
        }
    }
}

/// Produces bootstrap labels from raw text.
pub trait Labeler: Send + Sync {
    fn label(&self, text: &str) -> DifficultyLabel;
}

/// Assigns a difficulty label at inference time. Shared read-only across the scoring pass.
pub trait Classifier: Send + Sync {
    fn predict(&self, text: &str) -> DifficultyLabel;
    fn name(&self) -> &str;
}

/// Uses a [`Labeler`] directly as the classifier.
pub struct KeywordClassifier<L: Labeler> {
    labeler: L,
}

impl<L: Labeler> KeywordClassifier<L> {
    pub fn new(labeler: L) -> Self {
        Self { labeler }
    }
}

impl<L: Labeler> Classifier for KeywordClassifier<L> {
    fn predict(&self, text: &str) -> DifficultyLabel {
        self.labeler.label(text)
    }

    fn name(&self) -> &str {
        "keyword"
    }
}

/// Labels every review with more than `min_text_length` characters of text.
/// Shorter reviews carry too little signal and are left out entirely.
pub fn bootstrap_corpus<'a>(
    reviews: impl IntoIterator<Item = &'a Review>,
    labeler: &dyn Labeler,
    min_text_length: usize,
) -> Vec<(String, DifficultyLabel)> {
    reviews
        .into_iter()
        .filter(|r| r.has_long_text(min_text_length))
        .map(|r| {
            let text = r.text();
            let label = labeler.label(&text);
            (text, label)
        })
        .collect()
}
