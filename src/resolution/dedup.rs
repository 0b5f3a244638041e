use std::collections::HashSet;

use crate::models::review::{RawReview, Review};

#[derive(Debug, Clone, Default)]
pub struct DedupOutcome {
    pub reviews: Vec<Review>,
    pub duplicates: usize,
    pub rejected: usize,
}

/// Collapses repeated review ids, keeping the first occurrence in input order.
///
/// Paginated sources repeat spotlighted reviews on every page, so the same id
/// can show up many times in one fetch. Payloads without an id are rejected
/// and counted, never merged.
pub fn dedupe_reviews(raw: impl IntoIterator<Item = RawReview>) -> DedupOutcome {
    let mut outcome = DedupOutcome::default();
    let mut seen = HashSet::new();

    for payload in raw {
        let Some(review) = payload.into_review() else {
            outcome.rejected += 1;
            continue;
        };

        if seen.insert(review.review_id) {
            outcome.reviews.push(review);
        } else {
            outcome.duplicates += 1;
        }
    }

    if outcome.duplicates > 0 {
        tracing::debug!(
            "Dropped {} duplicate reviews, kept {}",
            outcome.duplicates,
            outcome.reviews.len()
        );
    }

    outcome
}

/// Appends reviews whose ids are not in `seen`. Returns the number appended.
pub fn union_reviews(
    existing: &mut Vec<Review>,
    seen: &mut HashSet<u64>,
    incoming: impl IntoIterator<Item = Review>,
) -> usize {
    let before = existing.len();
    for review in incoming {
        if seen.insert(review.review_id) {
            existing.push(review);
        }
    }
    existing.len() - before
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(id: Option<u64>, content: &str) -> RawReview {
        RawReview {
            review_id: id,
            content: Some(content.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_first_occurrence_wins() {
        let input = vec![
            raw(Some(3), "a"),
            raw(Some(1), "b"),
            raw(Some(3), "c"),
            raw(Some(2), "d"),
            raw(Some(1), "e"),
        ];
        let outcome = dedupe_reviews(input);

        let ids: Vec<u64> = outcome.reviews.iter().map(|r| r.review_id).collect();
        assert_eq!(ids, vec![3, 1, 2]);
        assert_eq!(outcome.reviews[0].content.as_deref(), Some("a"));
        assert_eq!(outcome.reviews[1].content.as_deref(), Some("b"));
        assert_eq!(outcome.duplicates, 2);
    }

    #[test]
    fn test_missing_ids_are_rejected() {
        let outcome = dedupe_reviews(vec![raw(None, "x"), raw(Some(1), "y"), raw(None, "z")]);
        assert_eq!(outcome.reviews.len(), 1);
        assert_eq!(outcome.rejected, 2);
    }

    #[test]
    fn test_union_counts_only_new_ids() {
        let first = dedupe_reviews(vec![raw(Some(1), "a"), raw(Some(2), "b")]).reviews;
        let second = dedupe_reviews(vec![raw(Some(2), "b"), raw(Some(4), "c")]).reviews;

        let mut seen: HashSet<u64> = first.iter().map(|r| r.review_id).collect();
        let mut merged = first;
        let added = union_reviews(&mut merged, &mut seen, second);

        assert_eq!(added, 1);
        assert_eq!(merged.len(), 3);
    }
}
