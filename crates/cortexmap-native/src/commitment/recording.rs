//! Recording model facade
//!
//! Chooses between direct and fitted commitment once, at construction, and
//! exposes both call sets on one type. Calls the chosen strategy does not
//! offer fail with [`CommitmentError::UnsupportedOperation`].

use cortexmap_core::assembly::NeuroidAssembly;
use cortexmap_core::error::{CommitmentError, CommitmentResult};
use cortexmap_core::stimulus::StimulusSet;
use cortexmap_core::table::PredictionTable;
use cortexmap_core::types::{LayerSpec, RegionId};
use tracing::debug;

use super::{Commitment, LayerMappedModel, ModelCommitment, RecordingState};
use crate::activations::ActivationSource;
use crate::config::CommitmentConfig;
use crate::error::CortexResult;
use crate::scoring::{LayerScorer, LayerSelection, RidgeRegressionScorer};

/// How regions get their layers
#[derive(Clone, Debug)]
pub enum RegionCommitmentStrategy<C = RidgeRegressionScorer> {
    /// Regions are committed to explicitly named layers
    Direct,
    /// Regions are committed to the best-scoring candidate
    Fitted {
        /// Candidate layers in preference order
        candidates: LayerSpec,
        /// Scorer ranking the candidates
        scorer: C,
    },
}

impl RegionCommitmentStrategy {
    /// Fitted strategy using the ridge regression scorer from `config`
    #[must_use]
    pub fn fitted(candidates: impl Into<LayerSpec>, config: &CommitmentConfig) -> Self {
        Self::Fitted {
            candidates: candidates.into(),
            scorer: RidgeRegressionScorer::new(config.scorer.clone()),
        }
    }
}

/// Activation model committed to brain regions by either strategy
#[derive(Debug)]
pub enum RecordingModel<S, C = RidgeRegressionScorer> {
    /// Direct commitment
    LayerMapped(LayerMappedModel<S>),
    /// Fitted commitment
    Committed(ModelCommitment<S, C>),
}

impl<S: ActivationSource> RecordingModel<S> {
    /// Build a model with the default scorer type
    ///
    /// # Errors
    ///
    /// See [`RecordingModel::with_strategy`].
    pub fn new(
        identifier: impl Into<String>,
        source: S,
        strategy: RegionCommitmentStrategy,
        config: CommitmentConfig,
    ) -> CortexResult<Self> {
        Self::with_strategy(identifier, source, strategy, config)
    }
}

impl<S: ActivationSource, C: LayerScorer> RecordingModel<S, C> {
    /// Build a model for any scorer type
    ///
    /// # Errors
    ///
    /// Fails if `config` does not validate or a fitted candidate is not a
    /// layer of `source` ([`CommitmentError::InvalidLayer`]).
    pub fn with_strategy(
        identifier: impl Into<String>,
        source: S,
        strategy: RegionCommitmentStrategy<C>,
        config: CommitmentConfig,
    ) -> CortexResult<Self> {
        config.validate()?;
        Ok(match strategy {
            RegionCommitmentStrategy::Direct => Self::LayerMapped(LayerMappedModel::new(identifier, source)),
            RegionCommitmentStrategy::Fitted { candidates, scorer } => {
                Self::Committed(ModelCommitment::with_scorer(identifier, source, candidates, scorer, config)?)
            }
        })
    }

    /// Strategy name, as reported in errors
    #[must_use]
    pub fn strategy(&self) -> &'static str {
        match self {
            Self::LayerMapped(_) => "direct",
            Self::Committed(_) => "fitted",
        }
    }

    /// Model identifier
    #[must_use]
    pub fn identifier(&self) -> &str {
        match self {
            Self::LayerMapped(model) => model.identifier(),
            Self::Committed(model) => model.identifier(),
        }
    }

    /// Current region → layer mapping
    #[must_use]
    pub fn commitment(&self) -> &Commitment {
        match self {
            Self::LayerMapped(model) => model.commitment(),
            Self::Committed(model) => model.commitment(),
        }
    }

    /// Currently recorded regions
    #[must_use]
    pub fn recording(&self) -> &RecordingState {
        match self {
            Self::LayerMapped(model) => model.recording(),
            Self::Committed(model) => model.recording(),
        }
    }

    /// Directly commit `region` to `layers`
    ///
    /// # Errors
    ///
    /// See [`LayerMappedModel::commit`]; fitted models return
    /// [`CommitmentError::UnsupportedOperation`].
    pub fn commit(&mut self, region: impl Into<RegionId>, layers: impl Into<LayerSpec>) -> CommitmentResult<()> {
        let unsupported = self.unsupported("commit");
        match self {
            Self::LayerMapped(model) => model.commit(region, layers),
            Self::Committed(_) => Err(unsupported),
        }
    }

    /// Fit `region` against `assembly`
    ///
    /// # Errors
    ///
    /// See [`ModelCommitment::commit_region`]; direct models return
    /// [`CommitmentError::UnsupportedOperation`].
    pub fn commit_region(
        &mut self,
        region: impl Into<RegionId>,
        assembly: &NeuroidAssembly,
        stratification: &str,
    ) -> CortexResult<&LayerSelection> {
        let unsupported = self.unsupported("commit_region");
        match self {
            Self::LayerMapped(_) => Err(unsupported.into()),
            Self::Committed(model) => model.commit_region(region, assembly, stratification),
        }
    }

    /// Start recording `region`. Direct models ignore `windows`.
    ///
    /// # Errors
    ///
    /// See [`LayerMappedModel::start_recording`] and
    /// [`ModelCommitment::start_recording`].
    pub fn start_recording(&mut self, region: impl Into<RegionId>, windows: &[(f64, f64)]) -> CommitmentResult<()> {
        match self {
            Self::LayerMapped(model) => {
                if !windows.is_empty() {
                    debug!(windows = windows.len(), "Direct commitment ignores time windows");
                }
                model.start_recording(region)
            }
            Self::Committed(model) => model.start_recording(region, windows),
        }
    }

    /// Predictions of every recorded region for `stimuli`
    ///
    /// # Errors
    ///
    /// Fails if the source cannot produce activations for the set.
    pub fn look_at(&self, stimuli: &StimulusSet) -> CortexResult<PredictionTable> {
        match self {
            Self::LayerMapped(model) => model.look_at(stimuli),
            Self::Committed(model) => model.look_at(stimuli),
        }
    }

    fn unsupported(&self, operation: &'static str) -> CommitmentError {
        CommitmentError::UnsupportedOperation {
            operation,
            strategy: self.strategy(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
