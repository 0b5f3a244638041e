use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::review::{lenient_string, lenient_string_or_empty, RawReview, Review};
use crate::resolution::dedup::{dedupe_reviews, union_reviews};

/// A professor or course owning a deduplicated set of reviews.
///
/// Reviews are only reachable through methods that keep ids unique, so
/// `review_count()` always equals the number of distinct review ids.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "EntityRecord", into = "CanonicalRecord")]
pub struct Entity {
    pub identity: u64,
    pub aliases: Vec<u64>,
    pub display_name: String,
    pub kind: EntityKind,
    reviews: Vec<Review>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EntityKind {
    Professor {
        first_name: String,
        last_name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        uni: Option<String>,
    },
    Course {
        course_code: String,
    },
}

impl Entity {
    pub fn new(identity: u64, display_name: impl Into<String>, kind: EntityKind) -> Self {
        Self {
            identity,
            aliases: Vec::new(),
            display_name: display_name.into(),
            kind,
            reviews: Vec::new(),
        }
    }

    pub fn course(identity: u64, course_code: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(
            identity,
            name,
            EntityKind::Course {
                course_code: course_code.into(),
            },
        )
    }

    pub fn professor(
        identity: u64,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
    ) -> Self {
        let first_name = first_name.into();
        let last_name = last_name.into();
        let display_name = format!("{} {}", first_name, last_name).trim().to_string();
        Self::new(
            identity,
            display_name,
            EntityKind::Professor {
                first_name,
                last_name,
                uni: None,
            },
        )
    }

    pub fn with_reviews(mut self, reviews: impl IntoIterator<Item = Review>) -> Self {
        self.add_reviews(reviews);
        self
    }

    /// Adds reviews whose ids are not already present. Returns how many were added.
    pub fn add_reviews(&mut self, reviews: impl IntoIterator<Item = Review>) -> usize {
        let mut seen: HashSet<u64> = self.reviews.iter().map(|r| r.review_id).collect();
        union_reviews(&mut self.reviews, &mut seen, reviews)
    }

    pub fn reviews(&self) -> &[Review] {
        &self.reviews
    }

    pub fn into_reviews(self) -> Vec<Review> {
        self.reviews
    }

    pub fn review_count(&self) -> usize {
        self.reviews.len()
    }

    pub fn course_code(&self) -> Option<&str> {
        match &self.kind {
            EntityKind::Course { course_code } => Some(course_code),
            EntityKind::Professor { .. } => None,
        }
    }

    /// `(last_name, first_name)` for professors.
    pub fn name_key(&self) -> Option<(&str, &str)> {
        match &self.kind {
            EntityKind::Professor {
                first_name,
                last_name,
                ..
            } => Some((last_name, first_name)),
            EntityKind::Course { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CanonicalRecord {
    identity: u64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    aliases: Vec<u64>,
    display_name: String,
    #[serde(flatten)]
    kind: EntityKind,
    #[serde(default)]
    review_count: usize,
    #[serde(default)]
    reviews: Vec<RawReview>,
}

#[derive(Debug, Clone, Deserialize)]
struct SourceCourse {
    course_id: u64,
    #[serde(default, deserialize_with = "lenient_string_or_empty")]
    course_code: String,
    #[serde(default, deserialize_with = "lenient_string_or_empty")]
    name: String,
}

#[derive(Debug, Clone, Deserialize)]
struct SourceProfessor {
    professor_id: u64,
    #[serde(default, deserialize_with = "lenient_string_or_empty")]
    first_name: String,
    #[serde(default, deserialize_with = "lenient_string_or_empty")]
    last_name: String,
    #[serde(default, deserialize_with = "lenient_string")]
    uni: Option<String>,
}

/// Accepted input shapes: the canonical record this crate writes, and the
/// `{"course": ...}` / `{"professor": ...}` records produced by the scraper.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum EntityRecord {
    Canonical(CanonicalRecord),
    Course {
        course: SourceCourse,
        #[serde(default)]
        reviews: Vec<RawReview>,
    },
    Professor {
        professor: SourceProfessor,
        #[serde(default)]
        reviews: Vec<RawReview>,
    },
}

impl From<EntityRecord> for Entity {
    fn from(record: EntityRecord) -> Self {
        let (mut entity, raw) = match record {
            EntityRecord::Canonical(c) => {
                let mut entity = Entity::new(c.identity, c.display_name, c.kind);
                entity.aliases = c.aliases;
                (entity, c.reviews)
            }
            EntityRecord::Course { course, reviews } => (
                Entity::course(course.course_id, course.course_code, course.name),
                reviews,
            ),
            EntityRecord::Professor { professor, reviews } => {
                let mut entity = Entity::professor(
                    professor.professor_id,
                    professor.first_name,
                    professor.last_name,
                );
                if let EntityKind::Professor { uni, .. } = &mut entity.kind {
                    *uni = professor.uni;
                }
                (entity, reviews)
            }
        };

        let outcome = dedupe_reviews(raw);
        if outcome.rejected > 0 {
            tracing::warn!(
                "Entity {}: rejected {} reviews without a review_id",
                entity.identity,
                outcome.rejected
            );
        }
        entity.reviews = outcome.reviews;
        entity
    }
}

impl From<Entity> for CanonicalRecord {
    fn from(entity: Entity) -> Self {
        Self {
            identity: entity.identity,
            aliases: entity.aliases,
            display_name: entity.display_name,
            kind: entity.kind,
            review_count: entity.reviews.len(),
            reviews: entity.reviews.into_iter().map(RawReview::from).collect(),
        }
    }
}
