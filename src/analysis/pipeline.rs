use chrono::{DateTime, Utc};
use indicatif::{ProgressBar, ProgressStyle};

use crate::analysis::rating_engine::RatingEngine;
use crate::analysis::recency::RecencyWeighter;
use crate::classifier::{
    bootstrap_corpus, Classifier, DifficultyLabel, KeywordClassifier, KeywordLabeler,
    TextClassifier, TrainingParams,
};
use crate::config::{Config, RankingConfig};
use crate::error::Result;
use crate::models::catalog::CatalogListing;
use crate::models::entity::Entity;
use crate::models::ranking::RankingRun;
use crate::resolution::matcher::{CodeAliases, CourseMatcher, MatchReport};
use crate::resolution::merger::{merge_entities, MergeDirective};

/// Batch pass: merge, match, fit the classifier, score, rank.
pub struct RankingPipeline {
    config: Config,
    directive: Option<MergeDirective>,
    catalog: Option<(Vec<CatalogListing>, CodeAliases)>,
    classifier: Option<Box<dyn Classifier>>,
    training: TrainingParams,
    show_progress: bool,
}

#[derive(Debug)]
pub struct PipelineOutput {
    pub run: RankingRun,
    pub match_report: Option<MatchReport>,
    pub merged: usize,
    pub classifier: String,
}

impl RankingPipeline {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            directive: None,
            catalog: None,
            classifier: None,
            training: TrainingParams::default(),
            show_progress: false,
        }
    }

    pub fn with_merge_directive(mut self, directive: MergeDirective) -> Self {
        self.directive = Some(directive);
        self
    }

    pub fn with_catalog(mut self, listings: Vec<CatalogListing>, aliases: CodeAliases) -> Self {
        self.catalog = Some((listings, aliases));
        self
    }

    /// Skips training and uses the given classifier for every review.
    pub fn with_classifier(mut self, classifier: Box<dyn Classifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    pub fn with_training_params(mut self, params: TrainingParams) -> Self {
        self.training = params;
        self
    }

    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    pub fn run(&self, entities: Vec<Entity>) -> Result<PipelineOutput> {
        self.run_at(entities, Utc::now())
    }

    pub fn run_at(&self, entities: Vec<Entity>, now: DateTime<Utc>) -> Result<PipelineOutput> {
        self.config.validate()?;
        tracing::info!("Loaded {} entities", entities.len());

        // Step 1: Resolve duplicate identities
        let (entities, merged) = match &self.directive {
            Some(directive) => {
                let outcome = merge_entities(entities, directive)?;
                (outcome.entities, outcome.merged)
            }
            None => (entities, 0),
        };

        // Step 2: Align with the catalog, if one was given
        let (entities, match_report) = match &self.catalog {
            Some((listings, aliases)) => {
                let matcher = CourseMatcher::new(&entities, aliases.clone());
                let report = matcher.match_catalog(listings);
                let selected = report.selected_entities(&entities);
                (selected, Some(report))
            }
            None => (entities, None),
        };

        // Step 3: Fit or reuse the difficulty classifier
        let trained: Box<dyn Classifier>;
        let classifier: &dyn Classifier = match &self.classifier {
            Some(injected) => injected.as_ref(),
            None => {
                trained = self.train_classifier(&entities)?;
                trained.as_ref()
            }
        };

        // Step 4: Score every entity, then rank
        let engine = RatingEngine::new(
            RankingConfig::from(&self.config),
            RecencyWeighter::from(&self.config),
        );
        let global_mean_rating = engine.global_mean_rating(&entities);
        match global_mean_rating {
            Some(m) => tracing::info!("Global mean rating: {:.2}", m),
            None => tracing::warn!("No ratings in corpus; rating statistics will be empty"),
        }

        let pb = self.progress_bar(entities.len() as u64);
        let records = entities
            .iter()
            .map(|entity| {
                let record = engine.score_entity(entity, classifier, global_mean_rating, now);
                pb.inc(1);
                record
            })
            .collect();
        pb.finish_and_clear();

        let run = engine.finish(records, global_mean_rating, now);
        tracing::info!(
            "Ranked {} entities ({} reliable for difficulty, {} for rating)",
            run.records.len(),
            run.reliable_difficulty_count(engine.config()),
            run.reliable_rating_count(engine.config())
        );

        Ok(PipelineOutput {
            run,
            match_report,
            merged,
            classifier: classifier.name().to_string(),
        })
    }

    fn train_classifier(&self, entities: &[Entity]) -> Result<Box<dyn Classifier>> {
        let labeler = KeywordLabeler::new();
        let corpus = bootstrap_corpus(
            entities.iter().flat_map(|e| e.reviews()),
            &labeler,
            self.config.min_text_length,
        );

        let count = |label: DifficultyLabel| corpus.iter().filter(|(_, l)| *l == label).count();
        tracing::info!(
            "Bootstrap corpus: {} texts ({} hard, {} medium, {} easy)",
            corpus.len(),
            count(DifficultyLabel::Hard),
            count(DifficultyLabel::Medium),
            count(DifficultyLabel::Easy)
        );

        match TextClassifier::fit(&corpus, &self.training) {
            Ok(classifier) => Ok(Box::new(classifier)),
            Err(e) if !e.is_fatal() => {
                tracing::warn!("Falling back to keyword labels: {}", e);
                Ok(Box::new(KeywordClassifier::new(labeler)))
            }
            Err(e) => Err(e),
        }
    }

    fn progress_bar(&self, len: u64) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }

        let pb = ProgressBar::new(len);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} entities")
        {
            pb.set_style(style.progress_chars("#>-"));
        }
        pb
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::models::review::Review;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 15, 12, 0, 0).unwrap()
    }

    fn review(id: u64, rating: u8, text: &str) -> Review {
        Review {
            review_id: id,
            submission_date: Some((now() - Duration::days(100)).to_rfc3339()),
            rating: Some(rating),
            content: Some(text.to_string()),
            workload: Some("weekly problem sets".to_string()),
            course_code: None,
        }
    }

    fn store() -> Vec<Entity> {
        vec![
            Entity::course(1, "COMS W4995", "Advanced Algorithms").with_reviews(
                (0..8).map(|i| review(100 + i, 4, "brutal and grueling exams, no sleep")),
            ),
            Entity::course(2, "COMS W4995", "Deep Learning").with_reviews(
                (0..12).map(|i| review(200 + i, 5, "chill and relaxed, a total breeze")),
            ),
            Entity::course(3, "COMS W3157", "Advanced Programming")
                .with_reviews((0..10).map(|i| review(300 + i, 3, "lectures follow the slides"))),
            Entity::course(30, "COMS W3157", "Advanced Programming")
                .with_reviews((5..15).map(|i| review(300 + i, 3, "lectures follow the slides"))),
        ]
    }

    #[test]
    fn test_empty_directive_aborts_before_output() {
        let pipeline = RankingPipeline::new(Config::default())
            .with_merge_directive(MergeDirective::default());
        let result = pipeline.run_at(store(), now());
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_merge_match_and_rank() {
        let catalog = vec![
            CatalogListing::new("COMS W4232", "Topics in CS").with_topics(["Advanced Algorithms"]),
            CatalogListing::new("COMS W3157", "Advanced Programming"),
            CatalogListing::new("COMS E6184", "Anonymity & Privacy"),
        ];
        let pipeline = RankingPipeline::new(Config::default())
            .with_merge_directive(MergeDirective::new([(30, 3)]))
            .with_catalog(catalog, CodeAliases::new([("4232", "4995")]))
            .with_classifier(Box::new(KeywordClassifier::new(KeywordLabeler::new())));

        let output = pipeline.run_at(store(), now()).unwrap();
        assert_eq!(output.merged, 1);
        assert_eq!(output.classifier, "keyword");

        let report = output.match_report.unwrap();
        assert_eq!(report.matched.len(), 2);
        assert_eq!(report.unmatched.len(), 1);

        let ids: Vec<u64> = output.run.records.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 3]);

        let ap = &output.run.records[1];
        assert_eq!(ap.review_count, 15);

        let hardest: Vec<u64> = output.run.leaderboards.hardest.iter().map(|r| r.id).collect();
        assert_eq!(hardest, vec![1, 3]);
        let best: Vec<u64> = output.run.leaderboards.best_rated.iter().map(|r| r.id).collect();
        assert_eq!(best, vec![3]);
    }

    #[test]
    fn test_trained_classifier_is_used_by_default() {
        let output = RankingPipeline::new(Config::default())
            .run_at(store(), now())
            .unwrap();
        assert_eq!(output.classifier, "tfidf-logistic");
        assert_eq!(output.run.records.len(), 4);
        assert!(output.match_report.is_none());
    }

    #[test]
    fn test_training_params_cap_features() {
        let params = TrainingParams {
            max_features: 2,
            iterations: 50,
            ..TrainingParams::default()
        };
        let output = RankingPipeline::new(Config::default())
            .with_training_params(params)
            .run_at(store(), now())
            .unwrap();
        assert_eq!(output.classifier, "tfidf-logistic");
        assert_eq!(output.run.records.len(), 4);
    }

    #[test]
    fn test_falls_back_to_keywords_without_long_text() {
        let entities = vec![Entity::course(1, "COMS W1004", "Intro").with_reviews(vec![Review {
            review_id: 1,
            submission_date: None,
            rating: Some(4),
            content: Some("fine".to_string()),
            workload: None,
            course_code: None,
        }])];
        let output = RankingPipeline::new(Config::default())
            .run_at(entities, now())
            .unwrap();
        assert_eq!(output.classifier, "keyword");
        assert_eq!(output.run.records[0].text_count, 0);
    }
}
