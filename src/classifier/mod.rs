pub mod provider;
pub mod labeler;
pub mod vectorizer;
pub mod logistic;

pub use provider::{bootstrap_corpus, Classifier, DifficultyLabel, KeywordClassifier, Labeler};
pub use labeler::KeywordLabeler;
pub use vectorizer::TfidfVectorizer;
pub use logistic::{LogisticRegression, TextClassifier, TrainingParams};
