//! Outcome prediction collaborator.
//!
//! The control loop only sees `Model` and `Trainer`. The baseline here is a
//! max-abs scaled logistic regression over the vocabulary vector, trained
//! from the outcome dataset with mirror augmentation: each stored row is a
//! win for its positive side, so its negation is a loss.

use crate::persistence::DatasetStore;
use anyhow::Result;
use arena_core::FeatureVector;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prediction {
    pub left_wins: bool,
    /// Probability that the left side wins
    pub probability: f64,
}

/// Inference over a left-positive / right-negated feature vector.
pub trait Model: Send + Sync {
    fn predict(&self, features: &FeatureVector) -> Prediction;
}

/// A freshly trained model and how it did on held-out rows.
pub struct Training {
    pub model: Arc<dyn Model>,
    pub examples: usize,
    pub holdout_accuracy: Option<f64>,
}

/// Builds a new model from the dataset; the caller swaps it in whole.
pub trait Trainer {
    fn train(&self, store: &DatasetStore) -> Result<Training>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct LinearModel {
    weights: Vec<f64>,
    bias: f64,
    /// Per-column max-abs divisor
    scale: Vec<f64>,
}

impl LinearModel {
    /// Always answers 0.5.
    pub fn neutral(len: usize) -> Self {
        Self {
            weights: vec![0.0; len],
            bias: 0.0,
            scale: vec![1.0; len],
        }
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    fn logit(&self, values: &[f64]) -> f64 {
        self.weights
            .iter()
            .zip(values)
            .zip(&self.scale)
            .map(|((w, x), s)| w * x / s)
            .sum::<f64>()
            + self.bias
    }

    fn probability(&self, values: &[f64]) -> f64 {
        sigmoid(self.logit(values))
    }
}

impl Model for LinearModel {
    fn predict(&self, features: &FeatureVector) -> Prediction {
        let values: Vec<f64> = features.as_slice().iter().map(|&v| f64::from(v)).collect();
        let probability = self.probability(&values);
        Prediction {
            left_wins: probability > 0.5,
            probability,
        }
    }
}

/// Full-batch gradient descent on log loss with L2 regularization
#[derive(Debug, Clone)]
pub struct LogisticTrainer {
    pub epochs: usize,
    pub learning_rate: f64,
    pub l2: f64,
    /// Share of examples held out for the accuracy report
    pub holdout: f64,
    /// Fixed shuffle seed; entropy-seeded when absent
    pub seed: Option<u64>,
}

impl Default for LogisticTrainer {
    fn default() -> Self {
        Self {
            epochs: 300,
            learning_rate: 0.5,
            l2: 1e-4,
            holdout: 0.1,
            seed: None,
        }
    }
}

impl LogisticTrainer {
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    fn fit(&self, examples: &[(Vec<f64>, f64)], len: usize) -> LinearModel {
        let mut scale = vec![1.0f64; len];
        for (x, _) in examples {
            for (s, v) in scale.iter_mut().zip(x) {
                *s = s.max(v.abs());
            }
        }

        let mut model = LinearModel {
            weights: vec![0.0; len],
            bias: 0.0,
            scale,
        };
        if examples.is_empty() {
            return model;
        }

        let n = examples.len() as f64;
        let mut grad = vec![0.0f64; len];

        for _ in 0..self.epochs {
            grad.iter_mut().for_each(|g| *g = 0.0);
            let mut grad_bias = 0.0;

            for (x, y) in examples {
                let err = model.probability(x) - y;
                for ((g, v), s) in grad.iter_mut().zip(x).zip(&model.scale) {
                    *g += err * v / s;
                }
                grad_bias += err;
            }

            for (w, g) in model.weights.iter_mut().zip(&grad) {
                *w -= self.learning_rate * (g / n + self.l2 * *w);
            }
            model.bias -= self.learning_rate * grad_bias / n;
        }

        model
    }
}

impl Trainer for LogisticTrainer {
    fn train(&self, store: &DatasetStore) -> Result<Training> {
        let len = store.vocabulary().len();

        if !store.path().exists() {
            warn!("Dataset {} not found, using a neutral model", store.path().display());
            return Ok(neutral(len));
        }

        let rows = store.load()?;
        if rows.is_empty() {
            warn!("Dataset {} has no rows, using a neutral model", store.path().display());
            return Ok(neutral(len));
        }

        let mut examples: Vec<(Vec<f64>, f64)> = Vec::with_capacity(rows.len() * 2);
        for row in &rows {
            let x: Vec<f64> = row.as_slice().iter().map(|&v| f64::from(v)).collect();
            let mirrored: Vec<f64> = x.iter().map(|v| -v).collect();
            examples.push((x, 1.0));
            examples.push((mirrored, 0.0));
        }

        let mut rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        examples.shuffle(&mut rng);

        let held = ((examples.len() as f64) * self.holdout).round() as usize;
        let held = held.min(examples.len() - 1);
        let (test, train) = examples.split_at(held);

        let model = self.fit(train, len);

        let holdout_accuracy = (!test.is_empty()).then(|| {
            let correct = test
                .iter()
                .filter(|(x, y)| (model.probability(x) > 0.5) == (*y > 0.5))
                .count();
            correct as f64 / test.len() as f64
        });

        match holdout_accuracy {
            Some(acc) => info!(
                "Trained on {} examples, holdout accuracy {:.2}% over {}",
                train.len(),
                acc * 100.0,
                test.len()
            ),
            None => info!("Trained on {} examples, no holdout", train.len()),
        }

        Ok(Training {
            model: Arc::new(model),
            examples: train.len(),
            holdout_accuracy,
        })
    }
}

fn neutral(len: usize) -> Training {
    Training {
        model: Arc::new(LinearModel::neutral(len)),
        examples: 0,
        holdout_accuracy: None,
    }
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

#[cfg(test)]
mod tests {
    use super::*;
    use arena_core::Vocabulary;
    use std::fs;

    fn store(dir: &std::path::Path, content: Option<&str>) -> DatasetStore {
        let path = dir.join("results.csv");
        if let Some(content) = content {
            fs::write(&path, content).unwrap();
        }
        DatasetStore::new(path, Vocabulary::new(["knight", "dog", "ice"]))
    }

    #[test]
    fn test_neutral_model_is_undecided() {
        let p = LinearModel::neutral(3).predict(&FeatureVector::from_values(vec![5, -2, 1]));
        assert_eq!(p.probability, 0.5);
        assert!(!p.left_wins);
    }

    #[test]
    fn test_missing_dataset_gives_neutral_model() {
        let tmp = tempfile::tempdir().unwrap();
        let training = LogisticTrainer::default().train(&store(tmp.path(), None)).unwrap();

        assert_eq!(training.examples, 0);
        assert_eq!(training.holdout_accuracy, None);
        let p = training.model.predict(&FeatureVector::from_values(vec![1, 1, 1]));
        assert_eq!(p.probability, 0.5);
    }

    #[test]
    fn test_header_only_dataset_gives_neutral_model() {
        let tmp = tempfile::tempdir().unwrap();
        let training = LogisticTrainer::default()
            .train(&store(tmp.path(), Some("knight,dog,ice\n")))
            .unwrap();
        assert_eq!(training.examples, 0);
    }

    #[test]
    fn test_learns_winning_label() {
        let tmp = tempfile::tempdir().unwrap();
        // knights always on the winning side
        let mut csv = String::from("knight,dog,ice\n");
        for i in 0..20 {
            csv.push_str(&format!("{},{},{}\n", 1 + i % 4, (i % 3) as i32 - 1, -(i % 2)));
        }

        let training = LogisticTrainer::default()
            .with_seed(7)
            .train(&store(tmp.path(), Some(csv.as_str())))
            .unwrap();

        assert_eq!(training.examples, 36);
        assert!(training.holdout_accuracy.is_some());

        let left = training.model.predict(&FeatureVector::from_values(vec![3, 0, 0]));
        let right = training.model.predict(&FeatureVector::from_values(vec![-3, 0, 0]));
        assert!(left.left_wins && left.probability > 0.5);
        assert!(!right.left_wins && right.probability < 0.5);
    }

    #[test]
    fn test_seeded_training_is_reproducible() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store(tmp.path(), Some("knight,dog,ice\n2,-1,0\n1,0,-2\n3,1,-1\n"));
        let trainer = LogisticTrainer::default().with_seed(42);

        let a = trainer.train(&store).unwrap();
        let b = trainer.train(&store).unwrap();
        let x = FeatureVector::from_values(vec![1, -1, 1]);
        assert_eq!(a.model.predict(&x), b.model.predict(&x));
    }
}
