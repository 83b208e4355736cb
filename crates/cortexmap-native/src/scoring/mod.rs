//! Layer scoring and selection
//!
//! A fitted commitment scores every candidate layer against reference data
//! with a [`LayerScorer`] and keeps the best one. Scorers are pluggable:
//!
//! - [`RidgeRegressionScorer`]: cross-validated ridge regression (default)
//! - [`FixedScores`]: table lookup for replaying precomputed scores

pub mod linalg;
pub mod ridge;
pub mod split;

use std::collections::HashMap;

use cortexmap_core::assembly::NeuroidAssembly;
use cortexmap_core::types::{LayerId, RegionId};
use serde::Serialize;

use crate::activations::ActivationMatrix;
use crate::error::{ScoringError, ScoringResult};

pub use ridge::RidgeRegressionScorer;
pub use split::StratifiedKFold;

/// Scores how well one layer's activations predict recorded responses
pub trait LayerScorer {
    /// Score `activations` of `layer` against `assembly`. Higher is better.
    ///
    /// # Errors
    ///
    /// Fails if the assembly and activations cannot be aligned or the
    /// stratification key is missing.
    fn score(
        &self,
        layer: &LayerId,
        activations: &ActivationMatrix,
        assembly: &NeuroidAssembly,
        stratification: &str,
    ) -> ScoringResult<f64>;
}

impl<C: LayerScorer + ?Sized> LayerScorer for Box<C> {
    fn score(
        &self,
        layer: &LayerId,
        activations: &ActivationMatrix,
        assembly: &NeuroidAssembly,
        stratification: &str,
    ) -> ScoringResult<f64> {
        (**self).score(layer, activations, assembly, stratification)
    }
}

// ============================================================================
// Fixed Scores
// ============================================================================

/// Scorer returning a precomputed score per layer
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FixedScores {
    scores: HashMap<LayerId, f64>,
}

impl FixedScores {
    /// Create from `(layer, score)` pairs
    pub fn new<I, L>(scores: I) -> Self
    where
        I: IntoIterator<Item = (L, f64)>,
        L: Into<LayerId>,
    {
        Self {
            scores: scores.into_iter().map(|(l, s)| (l.into(), s)).collect(),
        }
    }

    /// Set one layer's score
    #[must_use]
    pub fn with(mut self, layer: impl Into<LayerId>, score: f64) -> Self {
        self.scores.insert(layer.into(), score);
        self
    }
}

impl LayerScorer for FixedScores {
    fn score(
        &self,
        layer: &LayerId,
        _activations: &ActivationMatrix,
        _assembly: &NeuroidAssembly,
        _stratification: &str,
    ) -> ScoringResult<f64> {
        self.scores
            .get(layer)
            .copied()
            .ok_or_else(|| ScoringError::MissingScore { layer: layer.clone() })
    }
}

// ============================================================================
// Selection
// ============================================================================

/// Outcome of fitting one region
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LayerSelection {
    /// Region that was fitted
    pub region: RegionId,
    /// Every candidate's score, in candidate order
    pub scores: Vec<(LayerId, f64)>,
    /// Winning layer
    pub selected: LayerId,
}

impl LayerSelection {
    /// Score of the winning layer
    #[must_use]
    pub fn selected_score(&self) -> Option<f64> {
        self.scores
            .iter()
            .find(|(layer, _)| *layer == self.selected)
            .map(|(_, score)| *score)
    }
}

/// Index of the best score. A later candidate only wins if it beats the
/// current best by more than `tolerance`, so ties go to the earliest
/// candidate. NaN ranks below every number.
#[must_use]
pub fn select_best(scores: &[(LayerId, f64)], tolerance: f64) -> Option<usize> {
    let rank = |s: f64| if s.is_nan() { f64::NEG_INFINITY } else { s };

    let mut best: Option<(usize, f64)> = None;
    for (i, (_, score)) in scores.iter().enumerate() {
        let score = rank(*score);
        match best {
            Some((_, current)) if score <= current + tolerance => {}
            _ => best = Some((i, score)),
        }
    }
    best.map(|(i, _)| i)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn scores(values: &[(&str, f64)]) -> Vec<(LayerId, f64)> {
        values.iter().map(|(l, s)| (LayerId::from(*l), *s)).collect()
    }

    #[test]
    fn test_select_best() {
        let cases: &[(&[(&str, f64)], Option<usize>)] = &[
            (&[("linear", 0.2), ("relu2", 0.5)], Some(1)),
            (&[("linear", 0.5), ("relu2", 0.2)], Some(0)),
            (&[("linear", 0.5), ("relu2", 0.5)], Some(0)),
            (&[("linear", 0.5), ("relu2", 0.5 + 1e-12)], Some(0)),
            (&[("linear", f64::NAN), ("relu2", -0.3)], Some(1)),
            (&[("linear", f64::NAN), ("relu2", f64::NAN)], Some(0)),
            (&[], None),
        ];

        for (input, expected) in cases {
            assert_eq!(select_best(&scores(input), 1e-9), *expected, "input {input:?}");
        }
    }

    #[test]
    fn test_tolerance_widens_ties() {
        let values = scores(&[("a", 0.50), ("b", 0.52)]);
        assert_eq!(select_best(&values, 0.0), Some(1));
        assert_eq!(select_best(&values, 0.05), Some(0));
    }

    #[test]
    fn test_fixed_scores_lookup() {
        let scorer = FixedScores::new([("linear", 0.1)]).with("relu2", 0.9);
        let matrix = ActivationMatrix::new(&LayerId::from("relu2"), Vec::new(), 1, Vec::new()).unwrap();
        let assembly = empty_assembly();

        let relu2 = scorer.score(&LayerId::from("relu2"), &matrix, &assembly, "category_name");
        assert!((relu2.unwrap() - 0.9).abs() < 1e-12);

        let missing = scorer.score(&LayerId::from("conv1"), &matrix, &assembly, "category_name");
        assert!(matches!(missing, Err(ScoringError::MissingScore { .. })));
    }

    #[test]
    fn test_selected_score() {
        let selection = LayerSelection {
            region: RegionId::from("IT"),
            scores: scores(&[("linear", 0.1), ("relu2", 0.7)]),
            selected: LayerId::from("relu2"),
        };
        assert_eq!(selection.selected_score(), Some(0.7));
    }

    fn empty_assembly() -> NeuroidAssembly {
        use cortexmap_core::stimulus::StimulusSet;
        use cortexmap_core::types::TimeWindow;

        NeuroidAssembly::new(
            StimulusSet::builder("empty").build().unwrap(),
            Vec::new(),
            Vec::new(),
            vec![TimeWindow::new(70.0, 170.0).unwrap()],
            Vec::new(),
        )
        .unwrap()
    }
}
