use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;

#[derive(Debug, Clone)]
pub struct Config {
    pub decay_years: f64,
    pub weight_floor: f64,
    pub c_rating: f64,
    pub c_difficulty: f64,
    pub min_reviews_rating: usize,
    pub min_reviews_difficulty: usize,
    pub top_n: usize,
    pub min_text_length: usize,
    pub database_path: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            decay_years: 5.0,
            weight_floor: 0.3,
            c_rating: 20.0,
            c_difficulty: 10.0,
            min_reviews_rating: 10,
            min_reviews_difficulty: 7,
            top_n: 15,
            min_text_length: 20,
            database_path: "reviewrank.db".to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds a config from any key lookup. Unparsable values keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let config = Self {
            decay_years: parse_or(&lookup, "DECAY_YEARS", defaults.decay_years),
            weight_floor: parse_or(&lookup, "WEIGHT_FLOOR", defaults.weight_floor),
            c_rating: parse_or(&lookup, "C_RATING", defaults.c_rating),
            c_difficulty: parse_or(&lookup, "C_DIFFICULTY", defaults.c_difficulty),
            min_reviews_rating: parse_or(&lookup, "MIN_REVIEWS_RATING", defaults.min_reviews_rating),
            min_reviews_difficulty: parse_or(
                &lookup,
                "MIN_REVIEWS_DIFFICULTY",
                defaults.min_reviews_difficulty,
            ),
            top_n: parse_or(&lookup, "TOP_N", defaults.top_n),
            min_text_length: parse_or(&lookup, "MIN_TEXT_LENGTH", defaults.min_text_length),
            database_path: lookup("DATABASE_PATH").unwrap_or(defaults.database_path),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.decay_years > 0.0 && self.decay_years.is_finite()) {
            return Err(Error::Config(format!(
                "DECAY_YEARS must be positive and finite, got {}",
                self.decay_years
            )));
        }
        if !(0.0..=1.0).contains(&self.weight_floor) {
            return Err(Error::Config(format!(
                "WEIGHT_FLOOR must be within [0, 1], got {}",
                self.weight_floor
            )));
        }
        for (name, c) in [("C_RATING", self.c_rating), ("C_DIFFICULTY", self.c_difficulty)] {
            if !(c >= 0.0 && c.is_finite()) {
                return Err(Error::Config(format!(
                    "{} must be a finite non-negative number, got {}",
                    name, c
                )));
            }
        }
        Ok(())
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

/// The subset of [`Config`] the rating engine needs; persisted alongside each run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankingConfig {
    pub c_rating: f64,
    pub c_difficulty: f64,
    pub min_reviews_rating: usize,
    pub min_reviews_difficulty: usize,
    pub top_n: usize,
    pub min_text_length: usize,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for RankingConfig {
    fn from(config: &Config) -> Self {
        Self {
            c_rating: config.c_rating,
            c_difficulty: config.c_difficulty,
            min_reviews_rating: config.min_reviews_rating,
            min_reviews_difficulty: config.min_reviews_difficulty,
            top_n: config.top_n,
            min_text_length: config.min_text_length,
        }
    }
}
