pub mod config;
pub mod error;
pub mod models;
pub mod resolution;
pub mod classifier;
pub mod analysis;
pub mod storage;

pub use config::{Config, RankingConfig};
pub use error::{Error, Result};
pub use resolution::{CodeAliases, CourseMatcher, MergeDirective};
pub use classifier::{Classifier, KeywordClassifier, KeywordLabeler, TextClassifier};
pub use analysis::{RankingPipeline, RatingEngine, RecencyWeighter};
pub use storage::Storage;
