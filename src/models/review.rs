use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

pub const MIN_RATING: i64 = 1;
pub const MAX_RATING: i64 = 5;

/// A review as it arrives from a source, before validation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawReview {
    #[serde(default, deserialize_with = "lenient_id")]
    pub review_id: Option<u64>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub submission_date: Option<String>,
    #[serde(default, deserialize_with = "lenient_rating")]
    pub rating: Option<i64>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub content: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub workload: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub course_code: Option<String>,
    #[serde(default, skip_serializing)]
    pub course_header: Option<CourseHeader>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CourseHeader {
    #[serde(default, deserialize_with = "lenient_string")]
    pub course_code: Option<String>,
}

// Scraped fields arrive with inconsistent JSON types. A value of the wrong
// type becomes `None` so one bad field never rejects the whole file.

pub(crate) fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => Some(s),
        _ => None,
    })
}

pub(crate) fn lenient_string_or_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_string(deserializer)?.unwrap_or_default())
}

fn lenient_rating<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        _ => None,
    })
}

fn lenient_id<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_u64(),
        _ => None,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    pub review_id: u64,
    pub submission_date: Option<String>,
    pub rating: Option<u8>,
    pub content: Option<String>,
    pub workload: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub course_code: Option<String>,
}

impl Review {
    /// Content and workload joined by a space, trimmed. Missing parts count as empty.
    pub fn text(&self) -> String {
        let content = self.content.as_deref().unwrap_or("");
        let workload = self.workload.as_deref().unwrap_or("");
        format!("{} {}", content, workload).trim().to_string()
    }

    pub fn has_long_text(&self, min_text_length: usize) -> bool {
        self.text().chars().count() > min_text_length
    }
}

impl RawReview {
    /// Validates the payload. Returns `None` when the review id is missing.
    /// Ratings outside the accepted range are dropped rather than rejected.
    pub fn into_review(self) -> Option<Review> {
        let review_id = self.review_id?;

        let rating = self
            .rating
            .filter(|r| (MIN_RATING..=MAX_RATING).contains(r))
            .map(|r| r as u8);

        if rating.is_none() && self.rating.is_some() {
            tracing::debug!(
                "Review {} has out-of-range rating {:?}, treating as absent",
                review_id,
                self.rating
            );
        }

        let course_code = self
            .course_code
            .or_else(|| self.course_header.and_then(|h| h.course_code));

        Some(Review {
            review_id,
            submission_date: self.submission_date,
            rating,
            content: self.content,
            workload: self.workload,
            course_code,
        })
    }
}

impl From<Review> for RawReview {
    fn from(review: Review) -> Self {
        Self {
            review_id: Some(review.review_id),
            submission_date: review.submission_date,
            rating: review.rating.map(i64::from),
            content: review.content,
            workload: review.workload,
            course_code: review.course_code,
            course_header: None,
        }
    }
}
