//! Cross-validated ridge regression scorer
//!
//! For each fold, layer activations of the training presentations are mapped
//! to every neuroid's response with kernel ridge regression (linear kernel,
//! centered, solved by Cholesky). Held-out predictions are pooled across folds
//! and compared to the recordings neuroid by neuroid with Pearson r. The
//! layer's score is the median r across neuroids.

use cortexmap_core::assembly::NeuroidAssembly;
use cortexmap_core::types::LayerId;
use tracing::{debug, warn};

use super::linalg::{median, pearson_correlation, Cholesky};
use super::split::StratifiedKFold;
use super::LayerScorer;
use crate::activations::ActivationMatrix;
use crate::config::{ScorerConfig, TimeAggregation};
use crate::error::{ScoringError, ScoringResult};

/// Default layer scorer
#[derive(Clone, Debug, Default)]
pub struct RidgeRegressionScorer {
    config: ScorerConfig,
}

impl RidgeRegressionScorer {
    /// Create with a configuration
    #[must_use]
    pub fn new(config: ScorerConfig) -> Self {
        Self { config }
    }

    /// Scorer configuration
    #[must_use]
    pub fn config(&self) -> &ScorerConfig {
        &self.config
    }

    fn targets(&self, assembly: &NeuroidAssembly) -> Vec<Vec<f64>> {
        match self.config.time_aggregation {
            TimeAggregation::Mean => assembly.responses_averaged_over_time(),
            TimeAggregation::FirstBin => (0..assembly.presentations().len())
                .map(|p| {
                    (0..assembly.neuroids().len())
                        .map(|n| assembly.value(p, n, 0))
                        .collect()
                })
                .collect(),
        }
    }
}

impl LayerScorer for RidgeRegressionScorer {
    fn score(
        &self,
        layer: &LayerId,
        activations: &ActivationMatrix,
        assembly: &NeuroidAssembly,
        stratification: &str,
    ) -> ScoringResult<f64> {
        let labels = assembly.stratification_labels(stratification)?;
        let targets = self.targets(assembly);

        let features = assembly
            .presentations()
            .iter()
            .map(|p| {
                activations
                    .row_for(&p.image_id)
                    .ok_or_else(|| ScoringError::MissingActivations {
                        image_id: p.image_id.clone(),
                    })
            })
            .collect::<ScoringResult<Vec<&[f64]>>>()?;

        let folds = StratifiedKFold::new(self.config.folds, self.config.seed).split(&labels)?;
        let n = features.len();
        let neuroids = assembly.neuroids().len();

        // predicted[neuroid][presentation]
        let mut predicted = vec![vec![0.0; n]; neuroids];
        for test in &folds {
            let mut held_out = vec![false; n];
            for &t in test {
                held_out[t] = true;
            }
            let train: Vec<usize> = (0..n).filter(|&i| !held_out[i]).collect();

            let fit = RidgeFit::fit(&features, &targets, &train, self.config.ridge_alpha);
            for &t in test {
                for (neuroid, value) in fit.predict(features[t]).into_iter().enumerate() {
                    predicted[neuroid][t] = value;
                }
            }
        }

        let mut flat = 0usize;
        let correlations: Vec<f64> = (0..neuroids)
            .map(|neuroid| {
                let actual: Vec<f64> = targets.iter().map(|row| row[neuroid]).collect();
                if actual.iter().all(|v| (v - actual[0]).abs() < 1e-12) {
                    flat += 1;
                }
                pearson_correlation(&actual, &predicted[neuroid])
            })
            .collect();

        if flat > 0 {
            warn!(layer = %layer, neuroids = flat, "Neuroids with constant responses score 0");
        }

        let score = median(&correlations);
        debug!(layer = %layer, folds = folds.len(), neuroids, score, "Scored layer");
        Ok(score)
    }
}

// ============================================================================
// Kernel ridge fit
// ============================================================================

/// Dual-form ridge solution for one training split
struct RidgeFit {
    feature_mean: Vec<f64>,
    target_mean: Vec<f64>,
    /// Centered training rows
    basis: Vec<Vec<f64>>,
    /// Dual coefficients, `[neuroid][train_row]`
    coefficients: Vec<Vec<f64>>,
}

impl RidgeFit {
    fn fit(features: &[&[f64]], targets: &[Vec<f64>], train: &[usize], alpha: f64) -> Self {
        let units = features.first().map_or(0, |f| f.len());
        let neuroids = targets.first().map_or(0, Vec::len);
        #[allow(clippy::cast_precision_loss)]
        let count = train.len().max(1) as f64;

        let mut feature_mean = vec![0.0; units];
        let mut target_mean = vec![0.0; neuroids];
        for &i in train {
            for (m, x) in feature_mean.iter_mut().zip(features[i]) {
                *m += x / count;
            }
            for (m, y) in target_mean.iter_mut().zip(&targets[i]) {
                *m += y / count;
            }
        }

        let basis: Vec<Vec<f64>> = train
            .iter()
            .map(|&i| features[i].iter().zip(&feature_mean).map(|(x, m)| x - m).collect())
            .collect();

        let k = basis.len();
        let mut gram = vec![0.0; k * k];
        for i in 0..k {
            for j in 0..=i {
                let value = dot(&basis[i], &basis[j]);
                gram[i * k + j] = value;
                gram[j * k + i] = value;
            }
            gram[i * k + i] += alpha;
        }
        let cholesky = Cholesky::factor(&gram, k);

        let coefficients = (0..neuroids)
            .map(|neuroid| {
                let rhs: Vec<f64> = train
                    .iter()
                    .map(|&i| targets[i][neuroid] - target_mean[neuroid])
                    .collect();
                cholesky.solve(&rhs)
            })
            .collect();

        Self {
            feature_mean,
            target_mean,
            basis,
            coefficients,
        }
    }

    fn predict(&self, features: &[f64]) -> Vec<f64> {
        let centered: Vec<f64> = features.iter().zip(&self.feature_mean).map(|(x, m)| x - m).collect();
        let kernel: Vec<f64> = self.basis.iter().map(|b| dot(b, &centered)).collect();

        self.coefficients
            .iter()
            .zip(&self.target_mean)
            .map(|(coef, mean)| mean + dot(coef, &kernel))
            .collect()
    }
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

// ============================================================================
// Tests
// ============================================================================
