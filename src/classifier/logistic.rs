use crate::error::{Error, Result};

use super::provider::{Classifier, DifficultyLabel};
use super::vectorizer::{SparseVector, TfidfVectorizer};

#[derive(Debug, Clone)]
pub struct TrainingParams {
    pub max_features: usize,
    pub iterations: usize,
    pub learning_rate: f64,
    pub l2: f64,
}

impl Default for TrainingParams {
    fn default() -> Self {
        Self {
            max_features: 5_000,
            iterations: 400,
            learning_rate: 2.0,
            l2: 1e-3,
        }
    }
}

/// Multinomial logistic regression trained by full-batch gradient descent.
#[derive(Debug, Clone)]
pub struct LogisticRegression {
    classes: Vec<DifficultyLabel>,
    weights: Vec<Vec<f64>>,
    bias: Vec<f64>,
}

impl LogisticRegression {
    pub fn fit(
        rows: &[SparseVector],
        labels: &[DifficultyLabel],
        dimensions: usize,
        params: &TrainingParams,
    ) -> Result<Self> {
        if rows.is_empty() || rows.len() != labels.len() {
            return Err(Error::Training(format!(
                "need matching non-empty rows and labels, got {} rows and {} labels",
                rows.len(),
                labels.len()
            )));
        }

        let mut classes: Vec<DifficultyLabel> = labels.to_vec();
        classes.sort();
        classes.dedup();

        let k = classes.len();
        let mut model = Self {
            weights: vec![vec![0.0; dimensions]; k],
            bias: vec![0.0; k],
            classes,
        };

        // A single observed class needs no training.
        if k == 1 {
            return Ok(model);
        }

        let targets: Vec<usize> = labels
            .iter()
            .map(|label| model.classes.iter().position(|c| c == label).unwrap_or(0))
            .collect();
        let n = rows.len() as f64;

        for _ in 0..params.iterations {
            let mut grad_w = vec![vec![0.0; dimensions]; k];
            let mut grad_b = vec![0.0; k];

            for (row, &target) in rows.iter().zip(&targets) {
                let probs = model.probabilities(row);
                for (c, p) in probs.iter().enumerate() {
                    let err = p - if c == target { 1.0 } else { 0.0 };
                    grad_b[c] += err;
                    for &(j, v) in row {
                        grad_w[c][j] += err * v;
                    }
                }
            }

            for c in 0..k {
                for (w, g) in model.weights[c].iter_mut().zip(&grad_w[c]) {
                    *w -= params.learning_rate * (g / n + params.l2 * *w);
                }
                model.bias[c] -= params.learning_rate * grad_b[c] / n;
            }
        }

        Ok(model)
    }

    pub fn classes(&self) -> &[DifficultyLabel] {
        &self.classes
    }

    /// Softmax over class scores, in the order of [`Self::classes`].
    pub fn probabilities(&self, row: &SparseVector) -> Vec<f64> {
        let scores: Vec<f64> = self
            .weights
            .iter()
            .zip(&self.bias)
            .map(|(w, b)| b + row.iter().map(|&(j, v)| w[j] * v).sum::<f64>())
            .collect();

        let max = scores.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let exps: Vec<f64> = scores.iter().map(|s| (s - max).exp()).collect();
        let total: f64 = exps.iter().sum();
        exps.into_iter().map(|e| e / total).collect()
    }

    pub fn predict_row(&self, row: &SparseVector) -> DifficultyLabel {
        let probs = self.probabilities(row);
        let mut best = 0;
        for (i, p) in probs.iter().enumerate().skip(1) {
            if *p > probs[best] {
                best = i;
            }
        }
        self.classes[best]
    }
}

/// TF-IDF features feeding a logistic regression, fit on bootstrap labels.
#[derive(Debug, Clone)]
pub struct TextClassifier {
    vectorizer: TfidfVectorizer,
    model: LogisticRegression,
}

impl TextClassifier {
    pub fn fit(corpus: &[(String, DifficultyLabel)], params: &TrainingParams) -> Result<Self> {
        if corpus.is_empty() {
            return Err(Error::Training("bootstrap corpus is empty".to_string()));
        }

        let texts: Vec<&str> = corpus.iter().map(|(t, _)| t.as_str()).collect();
        let labels: Vec<DifficultyLabel> = corpus.iter().map(|(_, l)| *l).collect();

        let mut vectorizer = TfidfVectorizer::new(params.max_features);
        vectorizer.fit(&texts)?;

        let rows: Vec<SparseVector> = texts.iter().map(|t| vectorizer.transform(t)).collect();
        let model = LogisticRegression::fit(&rows, &labels, vectorizer.vocabulary_size(), params)?;

        tracing::info!(
            "Trained difficulty classifier on {} texts ({} features, classes {:?})",
            corpus.len(),
            vectorizer.vocabulary_size(),
            model.classes()
        );

        Ok(Self { vectorizer, model })
    }
}

impl Classifier for TextClassifier {
    fn predict(&self, text: &str) -> DifficultyLabel {
        self.model.predict_row(&self.vectorizer.transform(text))
    }

    fn name(&self) -> &str {
        "tfidf-logistic"
    }
}
