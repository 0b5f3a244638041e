use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};

use crate::config::RankingConfig;

/// Per-entity aggregate statistics. Values are kept at full precision and
/// rounded only when serialized; a missing statistic is `None`, never zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankingRecord {
    pub name: String,
    pub id: u64,
    #[serde(serialize_with = "round2")]
    pub raw_rating: Option<f64>,
    #[serde(serialize_with = "round2")]
    pub weighted_rating: Option<f64>,
    #[serde(serialize_with = "round2")]
    pub bayesian_rating: Option<f64>,
    #[serde(serialize_with = "round2")]
    pub raw_difficulty: Option<f64>,
    #[serde(serialize_with = "round2")]
    pub weighted_difficulty: Option<f64>,
    #[serde(serialize_with = "round2")]
    pub bayesian_difficulty: Option<f64>,
    #[serde(serialize_with = "round1")]
    pub hard_pct: Option<f64>,
    pub review_count: usize,
    pub text_count: usize,
}

pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

fn round2<S: Serializer>(value: &Option<f64>, serializer: S) -> Result<S::Ok, S::Error> {
    match value {
        Some(v) => serializer.serialize_some(&round_to(*v, 2)),
        None => serializer.serialize_none(),
    }
}

fn round1<S: Serializer>(value: &Option<f64>, serializer: S) -> Result<S::Ok, S::Error> {
    match value {
        Some(v) => serializer.serialize_some(&round_to(*v, 1)),
        None => serializer.serialize_none(),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Leaderboards {
    pub hardest: Vec<RankingRecord>,
    pub easiest: Vec<RankingRecord>,
    pub best_rated: Vec<RankingRecord>,
    pub worst_rated: Vec<RankingRecord>,
}

/// One complete ranking pass. Runs are regenerated wholesale, never patched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankingRun {
    pub run_date: DateTime<Utc>,
    pub config: RankingConfig,
    pub global_mean_rating: Option<f64>,
    pub records: Vec<RankingRecord>,
    pub leaderboards: Leaderboards,
}

impl RankingRun {
    pub fn reliable_difficulty_count(&self, config: &RankingConfig) -> usize {
        self.records
            .iter()
            .filter(|r| r.bayesian_difficulty.is_some() && r.text_count >= config.min_reviews_difficulty)
            .count()
    }

    pub fn reliable_rating_count(&self, config: &RankingConfig) -> usize {
        self.records
            .iter()
            .filter(|r| r.bayesian_rating.is_some() && r.review_count >= config.min_reviews_rating)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serialization_rounds_and_keeps_nulls() {
        let record = RankingRecord {
            name: "Operating Systems".to_string(),
            id: 42,
            raw_rating: Some(4.166_666),
            weighted_rating: Some(4.0),
            bayesian_rating: None,
            raw_difficulty: Some(0.0),
            weighted_difficulty: Some(1.234_9),
            bayesian_difficulty: None,
            hard_pct: Some(33.333),
            review_count: 12,
            text_count: 9,
        };

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["raw_rating"], 4.17);
        assert_eq!(json["weighted_difficulty"], 1.23);
        assert_eq!(json["hard_pct"], 33.3);
        assert_eq!(json["raw_difficulty"], 0.0);
        assert!(json["bayesian_rating"].is_null());
        assert!(json["bayesian_difficulty"].is_null());
    }
}
