pub mod dedup;
pub mod merger;
pub mod matcher;

pub use dedup::{dedupe_reviews, DedupOutcome};
pub use merger::{find_duplicate_names, merge_entities, MergeDirective, MergeOutcome};
pub use matcher::{CodeAliases, CourseMatcher, MatchOutcome, MatchReason, MatchReport};
