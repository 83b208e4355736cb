//! Fitted region commitment
//!
//! The model is built with an ordered list of candidate layers. Committing
//! a region scores every candidate against the region's reference
//! recordings and keeps the single best one; ties go to the candidate
//! listed first. Repeated presentations of an image are averaged before
//! scoring so that no image is seen on both sides of a cross-validation
//! split. Recording attaches time windows to a region and every response is
//! reported once per window.

use std::collections::BTreeMap;

use cortexmap_core::assembly::NeuroidAssembly;
use cortexmap_core::error::{CommitmentError, CommitmentResult};
use cortexmap_core::stimulus::StimulusSet;
use cortexmap_core::table::PredictionTable;
use cortexmap_core::types::{LayerId, LayerSpec, RegionId, TimeWindow};
use tracing::{debug, info};

use super::{predict, validate_layers, validate_region, Commitment, RecordingState};
use crate::activations::ActivationSource;
use crate::config::CommitmentConfig;
use crate::error::{ActivationError, CortexResult};
use crate::scoring::{select_best, LayerScorer, LayerSelection, RidgeRegressionScorer};

/// Activation source whose regions are committed by fitting
#[derive(Debug)]
pub struct ModelCommitment<S, C = RidgeRegressionScorer> {
    identifier: String,
    source: S,
    candidates: Vec<LayerId>,
    scorer: C,
    config: CommitmentConfig,
    commitment: Commitment,
    recording: RecordingState,
    selections: BTreeMap<RegionId, LayerSelection>,
}

impl<S: ActivationSource> ModelCommitment<S> {
    /// Create with the ridge regression scorer configured by
    /// `config.scorer`.
    ///
    /// # Errors
    ///
    /// See [`ModelCommitment::with_scorer`].
    pub fn new(
        identifier: impl Into<String>,
        source: S,
        candidates: impl Into<LayerSpec>,
        config: CommitmentConfig,
    ) -> CortexResult<Self> {
        let scorer = RidgeRegressionScorer::new(config.scorer.clone());
        Self::with_scorer(identifier, source, candidates, scorer, config)
    }
}

impl<S: ActivationSource, C: LayerScorer> ModelCommitment<S, C> {
    /// Create with a custom layer scorer.
    ///
    /// An empty candidate list is accepted here and rejected by
    /// [`ModelCommitment::commit_region`].
    ///
    /// # Errors
    ///
    /// - [`ConfigError::InvalidParameter`](crate::error::ConfigError) if
    ///   `config` does not validate
    /// - [`CommitmentError::InvalidLayer`] if a candidate is not a layer of
    ///   `source`
    pub fn with_scorer(
        identifier: impl Into<String>,
        source: S,
        candidates: impl Into<LayerSpec>,
        scorer: C,
        config: CommitmentConfig,
    ) -> CortexResult<Self> {
        config.validate()?;
        let candidates = candidates.into().layers();
        validate_layers(&source, &candidates)?;

        Ok(Self {
            identifier: identifier.into(),
            source,
            candidates,
            scorer,
            config,
            commitment: Commitment::default(),
            recording: RecordingState::default(),
            selections: BTreeMap::new(),
        })
    }

    /// Model identifier
    #[inline]
    #[must_use]
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Wrapped activation source
    #[inline]
    #[must_use]
    pub fn source(&self) -> &S {
        &self.source
    }

    /// Candidate layers in preference order
    #[inline]
    #[must_use]
    pub fn candidates(&self) -> &[LayerId] {
        &self.candidates
    }

    /// Layer scorer
    #[inline]
    #[must_use]
    pub fn scorer(&self) -> &C {
        &self.scorer
    }

    /// Active configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &CommitmentConfig {
        &self.config
    }

    /// Current region → layer mapping
    #[inline]
    #[must_use]
    pub fn commitment(&self) -> &Commitment {
        &self.commitment
    }

    /// Currently recorded regions and windows
    #[inline]
    #[must_use]
    pub fn recording(&self) -> &RecordingState {
        &self.recording
    }

    /// Scores and winner of the last fit of `region`
    #[must_use]
    pub fn selection(&self, region: &RegionId) -> Option<&LayerSelection> {
        self.selections.get(region)
    }

    /// Select the candidate layer that best predicts `assembly`'s
    /// recordings in `region`, stratifying the fit by the stimulus attribute
    /// `stratification`. Replaces any earlier commitment of the region.
    ///
    /// # Errors
    ///
    /// - [`CommitmentError::InvalidRegion`] for a blank region
    /// - [`CommitmentError::NoLayersAvailable`] with no candidates
    /// - [`CommitmentError::EmptyAssembly`] if `assembly` has no
    ///   presentations or no neuroids in `region`
    /// - activation or scoring failures
    ///
    /// On error the commitment is left unchanged.
    pub fn commit_region(
        &mut self,
        region: impl Into<RegionId>,
        assembly: &NeuroidAssembly,
        stratification: &str,
    ) -> CortexResult<&LayerSelection> {
        let region = region.into();
        validate_region(&region)?;
        if self.candidates.is_empty() {
            return Err(CommitmentError::NoLayersAvailable.into());
        }

        let restricted = assembly.restrict_to_region(&region);
        if restricted.is_empty() {
            return Err(CommitmentError::EmptyAssembly { region }.into());
        }
        let restricted = restricted.average_repetitions();

        let stimuli = restricted.presented_stimuli()?;
        debug!(
            model = %self.identifier,
            region = %region,
            stimuli = stimuli.len(),
            presentations = assembly.presentations().len(),
            neuroids = restricted.neuroids().len(),
            candidates = self.candidates.len(),
            "Fitting region"
        );

        let activations = self.source.activations(&stimuli, &self.candidates)?;
        let mut scores = Vec::with_capacity(self.candidates.len());
        for layer in &self.candidates {
            let matrix = activations
                .get(layer)
                .ok_or_else(|| ActivationError::UnknownLayer { layer: layer.clone() })?;
            let score = self.scorer.score(layer, matrix, &restricted, stratification)?;
            scores.push((layer.clone(), score));
        }

        let best = select_best(&scores, self.config.scorer.tie_tolerance).ok_or(CommitmentError::NoLayersAvailable)?;
        let selected = scores[best].0.clone();
        info!(
            model = %self.identifier,
            region = %region,
            layer = %selected,
            score = scores[best].1,
            "Committed region to best layer"
        );

        self.commitment.insert(region.clone(), vec![selected.clone()]);
        self.selections.insert(
            region.clone(),
            LayerSelection {
                region: region.clone(),
                scores,
                selected,
            },
        );
        Ok(&self.selections[&region])
    }

    /// Start reporting `region` for the given `(start_ms, end_ms)` windows.
    /// An empty list uses the configured default windows and repeated
    /// windows are kept once. Calling again with the same windows has no
    /// effect; different windows replace the old ones.
    ///
    /// # Errors
    ///
    /// - [`CommitmentError::UncommittedRegion`] if `region` was never
    ///   committed
    /// - [`CommitmentError::InvalidWindow`] for the first window with
    ///   `start >= end`
    pub fn start_recording(&mut self, region: impl Into<RegionId>, windows: &[(f64, f64)]) -> CommitmentResult<()> {
        let region = region.into();
        if !self.commitment.is_committed(&region) {
            return Err(CommitmentError::UncommittedRegion { region });
        }

        let requested: Vec<TimeWindow> = if windows.is_empty() {
            self.config.recording.default_time_bins.clone()
        } else {
            windows
                .iter()
                .map(|&pair| TimeWindow::from_pair(pair))
                .collect::<CommitmentResult<_>>()?
        };

        let mut windows: Vec<TimeWindow> = Vec::with_capacity(requested.len());
        for window in requested {
            if !windows.contains(&window) {
                windows.push(window);
            }
        }

        let label = region.to_string();
        let count = windows.len();
        if self.recording.activate(region, windows) {
            info!(model = %self.identifier, region = %label, windows = count, "Started recording");
        }
        Ok(())
    }

    /// Responses of every recorded region's selected layer to `stimuli`,
    /// one row per window
    ///
    /// # Errors
    ///
    /// Fails if the source cannot produce activations for the set.
    pub fn look_at(&self, stimuli: &StimulusSet) -> CortexResult<PredictionTable> {
        predict(&self.source, &self.commitment, &self.recording, stimuli)
    }
}

// ============================================================================
// Tests
// ============================================================================
