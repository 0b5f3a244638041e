use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::path::Path;

use crate::error::{Error, Result};
use crate::models::entity::{Entity, EntityKind};

/// Hand-curated alias -> primary identity mapping.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MergeDirective {
    map: BTreeMap<u64, u64>,
}

impl MergeDirective {
    pub fn new(pairs: impl IntoIterator<Item = (u64, u64)>) -> Self {
        Self {
            map: pairs.into_iter().collect(),
        }
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let directive: Self = serde_json::from_str(&raw)?;
        tracing::info!(
            "Loaded {} merge decisions from {}",
            directive.len(),
            path.as_ref().display()
        );
        Ok(directive)
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Follows alias chains to the final primary identity. Identities that
    /// are not aliases map to themselves.
    pub fn resolve(&self, identity: u64) -> Result<u64> {
        let mut current = identity;
        let mut visited = HashSet::from([identity]);

        while let Some(&next) = self.map.get(&current) {
            if next == current {
                break;
            }
            if !visited.insert(next) {
                return Err(Error::Config(format!(
                    "Merge directive contains a cycle through identity {}",
                    identity
                )));
            }
            current = next;
        }

        Ok(current)
    }
}

#[derive(Debug, Clone)]
pub struct MergeOutcome {
    pub entities: Vec<Entity>,
    pub merged: usize,
}

/// Collapses entities onto their canonical identities.
///
/// The first entity (in input order) resolving to a canonical id supplies the
/// display metadata; later ones only contribute reviews and alias ids.
/// Professors are ordered by last then first name, courses keep first-seen order.
pub fn merge_entities(entities: Vec<Entity>, directive: &MergeDirective) -> Result<MergeOutcome> {
    if directive.is_empty() {
        tracing::warn!("Merge directive is empty; refusing to merge. Add alias -> primary decisions first.");
        return Err(Error::Config("merge directive is empty".to_string()));
    }

    let source_count = entities.len();
    tracing::info!(
        "Applying {} merge decisions to {} entities",
        directive.len(),
        source_count
    );

    let mut merged: Vec<Entity> = Vec::new();
    let mut slots: HashMap<u64, usize> = HashMap::new();

    for entity in entities {
        let canonical = directive.resolve(entity.identity)?;

        match slots.get(&canonical) {
            Some(&slot) => {
                let survivor = &mut merged[slot];
                survivor.aliases.push(entity.identity);
                survivor.aliases.extend(entity.aliases.iter().copied());
                let added = survivor.add_reviews(entity.into_reviews());
                tracing::debug!("Merged into {}: {} new reviews", canonical, added);
            }
            None => {
                let mut survivor = entity;
                survivor.aliases.push(survivor.identity);
                survivor.identity = canonical;
                slots.insert(canonical, merged.len());
                merged.push(survivor);
            }
        }
    }

    for entity in &mut merged {
        let canonical = entity.identity;
        let aliases: BTreeSet<u64> = entity
            .aliases
            .iter()
            .copied()
            .filter(|&id| id != canonical)
            .collect();
        entity.aliases = aliases.into_iter().collect();
    }

    if merged.iter().all(|e| e.name_key().is_some()) {
        merged.sort_by(|a, b| a.name_key().cmp(&b.name_key()));
    }

    let outcome = MergeOutcome {
        merged: source_count - merged.len(),
        entities: merged,
    };

    let total_reviews: usize = outcome.entities.iter().map(|e| e.review_count()).sum();
    tracing::info!(
        "Merge complete: {} -> {} entities ({} merged), {} reviews",
        source_count,
        outcome.entities.len(),
        outcome.merged,
        total_reviews
    );

    Ok(outcome)
}

#[derive(Debug, Clone, Serialize)]
pub struct DuplicateIdentity {
    pub identity: u64,
    pub uni: Option<String>,
    pub review_count: usize,
    pub courses: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DuplicateNameGroup {
    pub name: String,
    pub identities: Vec<DuplicateIdentity>,
}

/// Professors sharing a full name under different identities, with the course
/// codes each identity was reviewed for. Used to curate a [`MergeDirective`].
pub fn find_duplicate_names(entities: &[Entity]) -> Vec<DuplicateNameGroup> {
    let mut by_name: BTreeMap<String, Vec<DuplicateIdentity>> = BTreeMap::new();

    for entity in entities {
        let EntityKind::Professor { first_name, last_name, uni } = &entity.kind else {
            continue;
        };

        let courses: BTreeSet<String> = entity
            .reviews()
            .iter()
            .filter_map(|r| r.course_code.clone())
            .collect();

        by_name
            .entry(format!("{} {}", first_name, last_name))
            .or_default()
            .push(DuplicateIdentity {
                identity: entity.identity,
                uni: uni.clone(),
                review_count: entity.review_count(),
                courses: courses.into_iter().collect(),
            });
    }

    by_name
        .into_iter()
        .filter(|(_, ids)| ids.len() > 1)
        .map(|(name, identities)| DuplicateNameGroup { name, identities })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::review::Review;

    fn review(id: u64) -> Review {
        Review {
            review_id: id,
            submission_date: None,
            rating: Some(4),
            content: None,
            workload: None,
            course_code: None,
        }
    }

    fn professor(id: u64, first: &str, last: &str, review_ids: &[u64]) -> Entity {
        Entity::professor(id, first, last).with_reviews(review_ids.iter().map(|&i| review(i)))
    }

    #[test]
    fn test_merge_unions_disjoint_reviews() {
        let entities = vec![
            professor(1, "Donald", "Ferguson", &[10, 11, 12]),
            professor(2, "Donald", "Ferguson", &[20, 21, 22, 23]),
            professor(3, "Ada", "Byron", &[30]),
        ];
        let directive = MergeDirective::new([(1, 9), (2, 9)]);

        let outcome = merge_entities(entities, &directive).unwrap();
        assert_eq!(outcome.entities.len(), 2);
        assert_eq!(outcome.merged, 1);

        let survivor = outcome.entities.iter().find(|e| e.identity == 9).unwrap();
        assert_eq!(survivor.review_count(), 7);
        assert_eq!(survivor.aliases, vec![1, 2]);
    }

    #[test]
    fn test_merge_is_idempotent() {
        let entities = vec![
            professor(6653, "Donald", "Ferguson", &[1, 2, 3]),
            professor(13551, "Donald", "Ferguson", &[3, 4]),
            professor(13070, "Jae", "Lee", &[5]),
            professor(13159, "Jae", "Lee", &[6]),
        ];
        let directive = MergeDirective::new([(6653, 13551), (13070, 13159)]);

        let once = merge_entities(entities, &directive).unwrap().entities;
        let twice = merge_entities(once.clone(), &directive).unwrap().entities;

        assert_eq!(
            serde_json::to_string(&once).unwrap(),
            serde_json::to_string(&twice).unwrap()
        );
        assert_eq!(once[0].review_count(), 4);
    }

    #[test]
    fn test_metadata_from_first_source() {
        let mut first = professor(6653, "Donald", "Ferguson", &[1]);
        first.display_name = "Donald F. Ferguson".to_string();
        let second = professor(13551, "Don", "Ferguson", &[2]);

        let directive = MergeDirective::new([(6653, 13551)]);
        let outcome = merge_entities(vec![first, second], &directive).unwrap();

        assert_eq!(outcome.entities.len(), 1);
        assert_eq!(outcome.entities[0].identity, 13551);
        assert_eq!(outcome.entities[0].display_name, "Donald F. Ferguson");
    }

    #[test]
    fn test_empty_directive_is_config_error() {
        let entities = vec![professor(1, "A", "B", &[1])];
        let result = merge_entities(entities, &MergeDirective::default());
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_chains_resolve_and_cycles_fail() {
        let directive = MergeDirective::new([(1, 2), (2, 3)]);
        assert_eq!(directive.resolve(1).unwrap(), 3);
        assert_eq!(directive.resolve(3).unwrap(), 3);
        assert_eq!(directive.resolve(42).unwrap(), 42);

        let cyclic = MergeDirective::new([(1, 2), (2, 1)]);
        assert!(matches!(cyclic.resolve(1), Err(Error::Config(_))));
    }

    #[test]
    fn test_directive_from_json_object() {
        let directive: MergeDirective =
            serde_json::from_str(r#"{"6653": 13551, "13070": 13159}"#).unwrap();
        assert_eq!(directive.len(), 2);
        assert_eq!(directive.resolve(13070).unwrap(), 13159);
    }

    #[test]
    fn test_find_duplicate_names() {
        let mut a = Entity::professor(6653, "Donald", "Ferguson");
        a.add_reviews(vec![Review {
            course_code: Some("COMS W4111".to_string()),
            ..review(1)
        }]);
        let b = professor(13551, "Donald", "Ferguson", &[2, 3]);
        let c = professor(7, "Ada", "Byron", &[4]);

        let groups = find_duplicate_names(&[a, b, c]);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].name, "Donald Ferguson");
        assert_eq!(groups[0].identities.len(), 2);
        assert_eq!(groups[0].identities[0].courses, vec!["COMS W4111".to_string()]);
        assert_eq!(groups[0].identities[1].review_count, 2);
    }
}
