use super::provider::{DifficultyLabel, Labeler};

const HARD_TERMS: &[&str] = &[
    "brutal",
    "insane",
    "killer",
    "impossible",
    "tough",
    "intense",
    "difficult",
    "heavy",
    "crazy",
    "nightmare",
    "death",
    "destroyed",
    "struggled",
    "overwhelming",
    "exhausting",
    "grueling",
    "no sleep",
    "all-nighter",
    "stressful",
    "demanding",
    "rigorous",
    "rough",
    "painful",
    "suffer",
    "hell",
    "hard",
    "challenging",
];

const EASY_TERMS: &[&str] = &[
    "easy",
    "manageable",
    "light",
    "chill",
    "straightforward",
    "fair",
    "doable",
    "simple",
    "reasonable",
    "relaxed",
    "enjoyable",
    "not bad",
    "breeze",
    "smooth",
    "beginner-friendly",
    "gentle",
    "accessible",
    "easiest",
];

/// Counts curated vocabulary hits (case-insensitive substrings, each term at
/// most once). The side with more hits wins; a tie is `Medium`.
pub struct KeywordLabeler {
    hard: Vec<String>,
    easy: Vec<String>,
}

impl KeywordLabeler {
    pub fn new() -> Self {
        Self::with_vocabulary(HARD_TERMS, EASY_TERMS)
    }

    pub fn with_vocabulary(hard: &[&str], easy: &[&str]) -> Self {
        Self {
            hard: hard.iter().map(|t| t.to_lowercase()).collect(),
            easy: easy.iter().map(|t| t.to_lowercase()).collect(),
        }
    }

    pub fn counts(&self, text: &str) -> (usize, usize) {
        let lower = text.to_lowercase();
        let hard = self.hard.iter().filter(|t| lower.contains(t.as_str())).count();
        let easy = self.easy.iter().filter(|t| lower.contains(t.as_str())).count();
        (hard, easy)
    }
}

impl Default for KeywordLabeler {
    fn default() -> Self {
        Self::new()
    }
}

impl Labeler for KeywordLabeler {
    fn label(&self, text: &str) -> DifficultyLabel {
        let (hard, easy) = self.counts(text);
        match hard.cmp(&easy) {
            std::cmp::Ordering::Greater => DifficultyLabel::Hard,
            std::cmp::Ordering::Less => DifficultyLabel::Easy,
            std::cmp::Ordering::Equal => DifficultyLabel::Medium,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyword_labels() {
        let labeler = KeywordLabeler::new();
        assert_eq!(
            labeler.label("Brutal, hardest class ever, no sleep"),
            DifficultyLabel::Hard
        );
        assert_eq!(
            labeler.label("fair and manageable, not bad"),
            DifficultyLabel::Easy
        );
        assert_eq!(
            labeler.label("Lectures cover the textbook chapters"),
            DifficultyLabel::Medium
        );
    }

    #[test]
    fn test_each_term_counts_once() {
        let labeler = KeywordLabeler::new();
        assert_eq!(labeler.counts("tough tough tough but fair"), (1, 1));
        assert_eq!(labeler.label("tough tough tough but fair"), DifficultyLabel::Medium);
    }

    #[test]
    fn test_custom_vocabulary() {
        let labeler = KeywordLabeler::with_vocabulary(&["Proofs"], &["Slides"]);
        assert_eq!(labeler.label("so many proofs"), DifficultyLabel::Hard);
        assert_eq!(labeler.label(""), DifficultyLabel::Medium);
    }
}
