//! Direct region → layer mapping
//!
//! Regions are committed to explicitly named layers without any fitting. A
//! region committed to several layers reports all of them.
//!
//! # Example
//!
//! ```rust,ignore
//! let mut model = LayerMappedModel::from_source(network);
//! model.commit("IT", ["linear", "relu2"])?;
//! model.start_recording("IT")?;
//! let table = model.look_at(&stimuli)?;
//! ```

use cortexmap_core::error::{CommitmentError, CommitmentResult};
use cortexmap_core::stimulus::StimulusSet;
use cortexmap_core::table::PredictionTable;
use cortexmap_core::types::{LayerSpec, RegionId};
use tracing::info;

use super::{predict, validate_layers, validate_region, Commitment, RecordingState};
use crate::activations::ActivationSource;
use crate::error::CortexResult;

/// Activation source with directly committed regions
#[derive(Debug)]
pub struct LayerMappedModel<S> {
    identifier: String,
    source: S,
    commitment: Commitment,
    recording: RecordingState,
}

impl<S: ActivationSource> LayerMappedModel<S> {
    /// Wrap `source` under a model identifier. Nothing is committed or
    /// recorded yet.
    #[must_use]
    pub fn new(identifier: impl Into<String>, source: S) -> Self {
        Self {
            identifier: identifier.into(),
            source,
            commitment: Commitment::default(),
            recording: RecordingState::default(),
        }
    }

    /// Wrap `source` using its own identifier
    #[must_use]
    pub fn from_source(source: S) -> Self {
        let identifier = source.identifier().to_owned();
        Self::new(identifier, source)
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

    /// Current region → layer mapping
    #[inline]
    #[must_use]
    pub fn commitment(&self) -> &Commitment {
        &self.commitment
    }

    /// Currently recorded regions
    #[inline]
    #[must_use]
    pub fn recording(&self) -> &RecordingState {
        &self.recording
    }

    /// Map `region` to `layers`, replacing any earlier mapping.
    ///
    /// # Errors
    ///
    /// - [`CommitmentError::InvalidRegion`] for a blank region
    /// - [`CommitmentError::NoLayersAvailable`] for an empty layer list
    /// - [`CommitmentError::InvalidLayer`] for a layer the source lacks
    pub fn commit(&mut self, region: impl Into<RegionId>, layers: impl Into<LayerSpec>) -> CommitmentResult<()> {
        let region = region.into();
        validate_region(&region)?;

        let layers = layers.into().layers();
        if layers.is_empty() {
            return Err(CommitmentError::NoLayersAvailable);
        }
        validate_layers(&self.source, &layers)?;

        info!(
            model = %self.identifier,
            region = %region,
            layers = ?layers,
            "Committed region"
        );
        self.commitment.insert(region, layers);
        Ok(())
    }

    /// Start reporting `region` in subsequent `look_at` calls. Repeating
    /// the call has no further effect.
    ///
    /// # Errors
    ///
    /// Returns [`CommitmentError::UncommittedRegion`] if `region` was never
    /// committed.
    pub fn start_recording(&mut self, region: impl Into<RegionId>) -> CommitmentResult<()> {
        let region = region.into();
        if !self.commitment.is_committed(&region) {
            return Err(CommitmentError::UncommittedRegion { region });
        }

        let label = region.to_string();
        if self.recording.activate(region, Vec::new()) {
            info!(model = %self.identifier, region = %label, "Started recording");
        }
        Ok(())
    }

    /// Responses of every recorded region's committed layers to `stimuli`
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
