use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;

use crate::error::Result;
use crate::models::catalog::CatalogListing;
use crate::models::entity::Entity;

static COURSE_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d{4}").expect("valid regex"));
static NON_ALPHANUMERIC: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9]").expect("valid regex"));

/// `"COMS W4995"` -> `"4995"`. Department prefixes and section letters are dropped.
pub fn normalize_course_number(code: &str) -> Option<String> {
    COURSE_NUMBER.find(code).map(|m| m.as_str().to_string())
}

pub fn normalize_name(name: &str) -> String {
    NON_ALPHANUMERIC
        .replace_all(&name.to_lowercase(), "")
        .into_owned()
}

fn contains_either(a: &str, b: &str) -> bool {
    !a.is_empty() && !b.is_empty() && (a.contains(b) || b.contains(a))
}

/// Known numbering mismatches between the catalog and the review store,
/// keyed by catalog course number.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CodeAliases {
    map: BTreeMap<String, String>,
}

impl CodeAliases {
    pub fn new<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            map: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn get(&self, number: &str) -> Option<&str> {
        self.map.get(number).map(String::as_str)
    }
}

/// Which rule picked the match. Only `MostReviews` is a guess.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchReason {
    SingleCandidate,
    ExactName,
    Topic,
    PartialName,
    MostReviews,
}

impl MatchReason {
    pub fn is_guess(&self) -> bool {
        matches!(self, MatchReason::MostReviews)
    }
}

impl std::fmt::Display for MatchReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MatchReason::SingleCandidate => write!(f, "single candidate"),
            MatchReason::ExactName => write!(f, "exact name"),
            MatchReason::Topic => write!(f, "topic"),
            MatchReason::PartialName => write!(f, "partial name"),
            MatchReason::MostReviews => write!(f, "most reviews"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MatchOutcome {
    Matched {
        entity_index: usize,
        reason: MatchReason,
        candidate_count: usize,
    },
    Unmatched,
}

#[derive(Debug, Clone, Serialize)]
pub struct MatchedListing {
    pub listing: CatalogListing,
    #[serde(skip)]
    pub entity_index: usize,
    pub identity: u64,
    pub entity_name: String,
    pub reason: MatchReason,
    pub candidate_count: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct MatchReport {
    pub matched: Vec<MatchedListing>,
    pub unmatched: Vec<CatalogListing>,
}

impl MatchReport {
    /// Matched entities in listing order, each identity at most once.
    pub fn selected_entities(&self, store: &[Entity]) -> Vec<Entity> {
        let mut seen = HashSet::new();
        self.matched
            .iter()
            .filter(|m| seen.insert(m.identity))
            .map(|m| store[m.entity_index].clone())
            .collect()
    }

    pub fn guessed(&self) -> impl Iterator<Item = &MatchedListing> {
        self.matched.iter().filter(|m| m.reason.is_guess())
    }
}

pub struct CourseMatcher<'a> {
    store: &'a [Entity],
    by_number: HashMap<String, Vec<usize>>,
    aliases: CodeAliases,
}

impl<'a> CourseMatcher<'a> {
    pub fn new(store: &'a [Entity], aliases: CodeAliases) -> Self {
        let mut by_number: HashMap<String, Vec<usize>> = HashMap::new();
        for (index, entity) in store.iter().enumerate() {
            if let Some(number) = entity.course_code().and_then(normalize_course_number) {
                by_number.entry(number).or_default().push(index);
            }
        }

        Self {
            store,
            by_number,
            aliases,
        }
    }

    fn candidates(&self, listing: &CatalogListing) -> Vec<usize> {
        let Some(number) = normalize_course_number(&listing.code) else {
            return Vec::new();
        };

        let mut search = vec![number.as_str()];
        if let Some(alias) = self.aliases.get(&number) {
            search.push(alias);
        }

        let mut indices: Vec<usize> = search
            .iter()
            .filter_map(|n| self.by_number.get(*n))
            .flatten()
            .copied()
            .collect();
        indices.sort_unstable();
        indices.dedup();
        indices
    }

    pub fn match_listing(&self, listing: &CatalogListing) -> MatchOutcome {
        let candidates = self.candidates(listing);

        let (entity_index, reason) = match candidates.as_slice() {
            [] => return MatchOutcome::Unmatched,
            [only] => (*only, MatchReason::SingleCandidate),
            _ => self.break_tie(listing, &candidates),
        };

        MatchOutcome::Matched {
            entity_index,
            reason,
            candidate_count: candidates.len(),
        }
    }

    fn break_tie(&self, listing: &CatalogListing, candidates: &[usize]) -> (usize, MatchReason) {
        let wanted = normalize_name(&listing.name);
        let names: Vec<(usize, String)> = candidates
            .iter()
            .map(|&i| (i, normalize_name(&self.store[i].display_name)))
            .collect();

        if !wanted.is_empty() {
            if let Some((i, _)) = names.iter().find(|(_, name)| *name == wanted) {
                return (*i, MatchReason::ExactName);
            }
        }

        for topic in &listing.topics {
            let topic = normalize_name(topic);
            if let Some((i, _)) = names.iter().find(|(_, name)| contains_either(&topic, name)) {
                return (*i, MatchReason::Topic);
            }
        }

        if let Some((i, _)) = names.iter().find(|(_, name)| contains_either(&wanted, name)) {
            return (*i, MatchReason::PartialName);
        }

        let mut best = candidates[0];
        for &i in &candidates[1..] {
            if self.store[i].review_count() > self.store[best].review_count() {
                best = i;
            }
        }
        (best, MatchReason::MostReviews)
    }

    pub fn match_catalog(&self, listings: &[CatalogListing]) -> MatchReport {
        let mut report = MatchReport::default();

        for listing in listings {
            match self.match_listing(listing) {
                MatchOutcome::Matched {
                    entity_index,
                    reason,
                    candidate_count,
                } => {
                    let entity = &self.store[entity_index];
                    if reason.is_guess() {
                        tracing::warn!(
                            "{} ({}) matched {} only by review count among {} candidates",
                            listing.code,
                            listing.name,
                            entity.display_name,
                            candidate_count
                        );
                    }
                    report.matched.push(MatchedListing {
                        listing: listing.clone(),
                        entity_index,
                        identity: entity.identity,
                        entity_name: entity.display_name.clone(),
                        reason,
                        candidate_count,
                    });
                }
                MatchOutcome::Unmatched => {
                    tracing::debug!("No reviews found for {} ({})", listing.code, listing.name);
                    report.unmatched.push(listing.clone());
                }
            }
        }

        tracing::info!(
            "Matched {} of {} catalog listings ({} unmatched)",
            report.matched.len(),
            listings.len(),
            report.unmatched.len()
        );

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::review::Review;

    fn review(id: u64) -> Review {
        Review {
            review_id: id,
            submission_date: None,
            rating: None,
            content: None,
            workload: None,
            course_code: None,
        }
    }

    fn course(id: u64, code: &str, name: &str, reviews: u64) -> Entity {
        Entity::course(id, code, name).with_reviews((0..reviews).map(|i| review(id * 1000 + i)))
    }

    #[test]
    fn test_normalization() {
        assert_eq!(normalize_course_number("COMS W4995").as_deref(), Some("4995"));
        assert_eq!(normalize_course_number("CSEE E6868").as_deref(), Some("6868"));
        assert_eq!(normalize_course_number("Seminar"), None);
        assert_eq!(normalize_name("Anonymity & Privacy"), "anonymityprivacy");
    }

    #[test]
    fn test_topic_beats_review_count_fallback() {
        let store = vec![
            course(1, "COMS W4995", "Topics in Deep Learning", 40),
            course(2, "COMS W4995", "Advanced Algorithms", 3),
        ];
        let matcher = CourseMatcher::new(&store, CodeAliases::default());
        let listing = CatalogListing::new("COMS W4995", "Topics in Computer Science")
            .with_topics(["Advanced Algorithms"]);

        assert_eq!(
            matcher.match_listing(&listing),
            MatchOutcome::Matched {
                entity_index: 1,
                reason: MatchReason::Topic,
                candidate_count: 2,
            }
        );
    }

    #[test]
    fn test_precedence_order() {
        let store = vec![
            course(1, "COMS W4111", "Intro to Databases", 10),
            course(2, "COMS W4111", "Databases", 2),
            course(3, "COMS W3157", "Advanced Programming", 8),
        ];
        let matcher = CourseMatcher::new(&store, CodeAliases::default());

        let exact = matcher.match_listing(&CatalogListing::new("COMS W4111", "Databases"));
        assert!(matches!(
            exact,
            MatchOutcome::Matched { entity_index: 1, reason: MatchReason::ExactName, .. }
        ));

        let partial =
            matcher.match_listing(&CatalogListing::new("COMS W4111", "Intro to Databases I"));
        assert!(matches!(
            partial,
            MatchOutcome::Matched { entity_index: 0, reason: MatchReason::PartialName, .. }
        ));

        let single = matcher.match_listing(&CatalogListing::new("COMS W3157", "AP"));
        assert!(matches!(
            single,
            MatchOutcome::Matched { entity_index: 2, reason: MatchReason::SingleCandidate, .. }
        ));

        let fallback = matcher.match_listing(&CatalogListing::new("COMS W4111", "Data Systems"));
        assert!(matches!(
            fallback,
            MatchOutcome::Matched { entity_index: 0, reason: MatchReason::MostReviews, .. }
        ));
    }

    #[test]
    fn test_fallback_ties_keep_store_order() {
        let store = vec![
            course(1, "COMS E6998", "Cloud Computing", 5),
            course(2, "COMS E6998", "Robot Learning", 5),
        ];
        let matcher = CourseMatcher::new(&store, CodeAliases::default());
        let outcome = matcher.match_listing(&CatalogListing::new("COMS E6998", "Quantum"));
        assert!(matches!(
            outcome,
            MatchOutcome::Matched { entity_index: 0, reason: MatchReason::MostReviews, .. }
        ));
    }

    #[test]
    fn test_alias_table_and_unmatched_report() {
        let store = vec![course(7177, "COMS W4995", "Advanced Algorithms", 4)];
        let aliases = CodeAliases::new([("4232", "4995")]);
        let matcher = CourseMatcher::new(&store, aliases);

        let listings = vec![
            CatalogListing::new("COMS W4232", "Advanced Algorithms"),
            CatalogListing::new("COMS E6184", "Anonymity & Privacy"),
            CatalogListing::new("COMS W4232", "Advanced Algorithms"),
        ];
        let report = matcher.match_catalog(&listings);

        assert_eq!(report.matched.len(), 2);
        assert_eq!(report.matched[0].identity, 7177);
        assert_eq!(report.unmatched.len(), 1);
        assert_eq!(report.unmatched[0].code, "COMS E6184");
        assert_eq!(report.selected_entities(&store).len(), 1);
        assert_eq!(report.guessed().count(), 0);
    }
}
