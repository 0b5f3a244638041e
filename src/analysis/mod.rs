pub mod recency;
pub mod rating_engine;
pub mod pipeline;

pub use recency::RecencyWeighter;
pub use rating_engine::RatingEngine;
pub use pipeline::{PipelineOutput, RankingPipeline};
