//! Stratified K-fold splitting
//!
//! Presentations are grouped by stratification label, shuffled within each
//! group by a seeded generator, then dealt round-robin into folds. Every
//! label is spread as evenly as possible across folds and the split is
//! reproducible for a given seed.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::error::{ScoringError, ScoringResult};

/// Stratified K-fold splitter
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct StratifiedKFold {
    folds: usize,
    seed: u64,
}

impl StratifiedKFold {
    /// Create a splitter (at least 2 folds)
    #[must_use]
    pub fn new(folds: usize, seed: u64) -> Self {
        Self {
            folds: folds.max(2),
            seed,
        }
    }

    /// Number of folds
    #[inline]
    #[must_use]
    pub fn folds(&self) -> usize {
        self.folds
    }

    /// Test-set indices of each fold. Every index appears in exactly one
    /// fold; indices within a fold are ascending.
    ///
    /// # Errors
    ///
    /// Returns [`ScoringError::TooFewPresentations`] if there are fewer
    /// labels than folds.
    pub fn split(&self, labels: &[String]) -> ScoringResult<Vec<Vec<usize>>> {
        if labels.len() < self.folds {
            return Err(ScoringError::TooFewPresentations {
                got: labels.len(),
                need: self.folds,
            });
        }

        // Groups in order of first appearance
        let mut groups: Vec<(&str, Vec<usize>)> = Vec::new();
        for (i, label) in labels.iter().enumerate() {
            match groups.iter_mut().find(|(l, _)| *l == label.as_str()) {
                Some((_, members)) => members.push(i),
                None => groups.push((label.as_str(), vec![i])),
            }
        }

        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut folds = vec![Vec::new(); self.folds];
        let mut next = 0usize;
        for (_, mut members) in groups {
            members.shuffle(&mut rng);
            for index in members {
                folds[next % self.folds].push(index);
                next += 1;
            }
        }

        for fold in &mut folds {
            fold.sort_unstable();
        }
        Ok(folds)
    }
}

// ============================================================================
// Tests
// ============================================================================
