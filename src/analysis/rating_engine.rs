use chrono::{DateTime, Utc};

use crate::analysis::recency::RecencyWeighter;
use crate::classifier::Classifier;
use crate::config::RankingConfig;
use crate::models::entity::Entity;
use crate::models::ranking::{Leaderboards, RankingRecord, RankingRun};

/// Difficulty has no natural grand mean, so smoothing pulls toward "medium".
pub const GLOBAL_MEAN_DIFFICULTY: f64 = 1.0;

pub struct RatingEngine {
    config: RankingConfig,
    weighter: RecencyWeighter,
}

#[derive(Debug, Clone, Default, PartialEq)]
struct DifficultySignal {
    weighted: Option<f64>,
    raw: Option<f64>,
    hard_pct: Option<f64>,
    text_count: usize,
}

#[derive(Debug, Clone, Default, PartialEq)]
struct RatingSignal {
    weighted: Option<f64>,
    raw: Option<f64>,
}

/// Shrinks `value` toward `m` with confidence constant `c`: `(n*v + c*m) / (n + c)`.
/// A missing value stays missing.
pub fn bayesian_average(value: Option<f64>, n: usize, c: f64, m: f64) -> Option<f64> {
    let value = value?;
    let n = n as f64;
    if n + c <= 0.0 {
        return Some(value);
    }
    Some((n * value + c * m) / (n + c))
}

/// Weighted mean of `(value, weight)` pairs; `None` when there is no weight.
fn weighted_mean(pairs: &[(f64, f64)]) -> Option<f64> {
    let total_weight: f64 = pairs.iter().map(|(_, w)| w).sum();
    if total_weight <= 0.0 {
        return None;
    }
    Some(pairs.iter().map(|(v, w)| v * w).sum::<f64>() / total_weight)
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

impl RatingEngine {
    pub fn new(config: RankingConfig, weighter: RecencyWeighter) -> Self {
        Self { config, weighter }
    }

    pub fn config(&self) -> &RankingConfig {
        &self.config
    }

    /// Mean of every present rating across the corpus.
    pub fn global_mean_rating(&self, entities: &[Entity]) -> Option<f64> {
        let ratings: Vec<f64> = entities
            .iter()
            .flat_map(|e| e.reviews())
            .filter_map(|r| r.rating)
            .map(f64::from)
            .collect();
        mean(&ratings)
    }

    pub fn rank(
        &self,
        entities: &[Entity],
        classifier: &dyn Classifier,
        now: DateTime<Utc>,
    ) -> RankingRun {
        let global_mean_rating = self.global_mean_rating(entities);
        let records = entities
            .iter()
            .map(|e| self.score_entity(e, classifier, global_mean_rating, now))
            .collect();
        self.finish(records, global_mean_rating, now)
    }

    pub fn finish(
        &self,
        records: Vec<RankingRecord>,
        global_mean_rating: Option<f64>,
        now: DateTime<Utc>,
    ) -> RankingRun {
        let leaderboards = build_leaderboards(&records, &self.config);
        RankingRun {
            run_date: now,
            config: self.config.clone(),
            global_mean_rating,
            records,
            leaderboards,
        }
    }

    pub fn score_entity(
        &self,
        entity: &Entity,
        classifier: &dyn Classifier,
        global_mean_rating: Option<f64>,
        now: DateTime<Utc>,
    ) -> RankingRecord {
        let difficulty = self.difficulty_signal(entity, classifier, now);
        let rating = self.rating_signal(entity, now);

        let bayesian_difficulty = bayesian_average(
            difficulty.weighted,
            difficulty.text_count,
            self.config.c_difficulty,
            GLOBAL_MEAN_DIFFICULTY,
        );
        let bayesian_rating = match global_mean_rating {
            Some(m) => bayesian_average(rating.weighted, entity.review_count(), self.config.c_rating, m),
            None => None,
        };

        RankingRecord {
            name: entity.display_name.clone(),
            id: entity.identity,
            raw_rating: rating.raw,
            weighted_rating: rating.weighted,
            bayesian_rating,
            raw_difficulty: difficulty.raw,
            weighted_difficulty: difficulty.weighted,
            bayesian_difficulty,
            hard_pct: difficulty.hard_pct,
            review_count: entity.review_count(),
            text_count: difficulty.text_count,
        }
    }

    fn difficulty_signal(
        &self,
        entity: &Entity,
        classifier: &dyn Classifier,
        now: DateTime<Utc>,
    ) -> DifficultySignal {
        let scored: Vec<(f64, f64)> = entity
            .reviews()
            .iter()
            .filter(|r| r.has_long_text(self.config.min_text_length))
            .map(|r| {
                let score = classifier.predict(&r.text()).score() as f64;
                let weight = self.weighter.weight_at(r.submission_date.as_deref(), now);
                (score, weight)
            })
            .collect();

        if scored.is_empty() {
            return DifficultySignal::default();
        }

        let total_weight: f64 = scored.iter().map(|(_, w)| w).sum();
        let hard_weight: f64 = scored
            .iter()
            .filter(|(s, _)| *s == 2.0)
            .map(|(_, w)| w)
            .sum();
        let hard_pct = (total_weight > 0.0).then(|| hard_weight / total_weight * 100.0);

        let scores: Vec<f64> = scored.iter().map(|(s, _)| *s).collect();

        DifficultySignal {
            weighted: weighted_mean(&scored),
            raw: mean(&scores),
            hard_pct,
            text_count: scored.len(),
        }
    }

    fn rating_signal(&self, entity: &Entity, now: DateTime<Utc>) -> RatingSignal {
        let rated: Vec<(f64, f64)> = entity
            .reviews()
            .iter()
            .filter_map(|r| {
                r.rating.map(|rating| {
                    let weight = self.weighter.weight_at(r.submission_date.as_deref(), now);
                    (f64::from(rating), weight)
                })
            })
            .collect();

        let ratings: Vec<f64> = rated.iter().map(|(r, _)| *r).collect();

        RatingSignal {
            weighted: weighted_mean(&rated),
            raw: mean(&ratings),
        }
    }
}

/// Filters by reliability thresholds, then sorts stably on the smoothed
/// statistic so ties keep input order.
pub fn build_leaderboards(records: &[RankingRecord], config: &RankingConfig) -> Leaderboards {
    let reliable_difficulty: Vec<(f64, &RankingRecord)> = records
        .iter()
        .filter(|r| r.text_count >= config.min_reviews_difficulty)
        .filter_map(|r| r.bayesian_difficulty.map(|d| (d, r)))
        .collect();

    let reliable_rating: Vec<(f64, &RankingRecord)> = records
        .iter()
        .filter(|r| r.review_count >= config.min_reviews_rating)
        .filter_map(|r| r.bayesian_rating.map(|b| (b, r)))
        .collect();

    Leaderboards {
        hardest: top_n(&reliable_difficulty, true, config.top_n),
        easiest: top_n(&reliable_difficulty, false, config.top_n),
        best_rated: top_n(&reliable_rating, true, config.top_n),
        worst_rated: top_n(&reliable_rating, false, config.top_n),
    }
}

fn top_n(keyed: &[(f64, &RankingRecord)], descending: bool, n: usize) -> Vec<RankingRecord> {
    let mut sorted = keyed.to_vec();
    if descending {
        sorted.sort_by(|a, b| b.0.total_cmp(&a.0));
    } else {
        sorted.sort_by(|a, b| a.0.total_cmp(&b.0));
    }
    sorted.into_iter().take(n).map(|(_, r)| r.clone()).collect()
}
