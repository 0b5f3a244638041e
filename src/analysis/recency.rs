use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

use crate::config::Config;

/// Weight given to reviews whose date is missing or unreadable.
pub const NEUTRAL_WEIGHT: f64 = 0.5;

const DAYS_PER_YEAR: f64 = 365.0;

/// Linear recency decay from 1.0 (today) down to `floor` at `decay_years`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecencyWeighter {
    pub decay_years: f64,
    pub floor: f64,
}

impl Default for RecencyWeighter {
    fn default() -> Self {
        Self {
            decay_years: 5.0,
            floor: 0.3,
        }
    }
}

impl From<&Config> for RecencyWeighter {
    fn from(config: &Config) -> Self {
        Self {
            decay_years: config.decay_years,
            floor: config.weight_floor,
        }
    }
}

impl RecencyWeighter {
    pub fn new(decay_years: f64, floor: f64) -> Self {
        Self { decay_years, floor }
    }

    pub fn weight(&self, date: Option<&str>) -> f64 {
        self.weight_at(date, Utc::now())
    }

    pub fn weight_at(&self, date: Option<&str>, now: DateTime<Utc>) -> f64 {
        let Some(raw) = date else {
            return NEUTRAL_WEIGHT;
        };

        match parse_submission_date(raw) {
            Some(submitted) => self.weight_for_date(submitted, now),
            None => {
                tracing::debug!("Unparsable submission date {:?}, using neutral weight", raw);
                NEUTRAL_WEIGHT
            }
        }
    }

    pub fn weight_for_date(&self, submitted: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
        let years_ago = (now - submitted).num_days() as f64 / DAYS_PER_YEAR;

        if years_ago <= 0.0 {
            1.0
        } else if years_ago >= self.decay_years {
            self.floor
        } else {
            1.0 - (years_ago / self.decay_years) * (1.0 - self.floor)
        }
    }
}

/// Accepts RFC 3339 timestamps as well as naive ones, which are read as UTC.
pub fn parse_submission_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }

    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
