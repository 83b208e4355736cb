//! Region commitment
//!
//! A commitment maps brain regions to layers of an [`ActivationSource`]. Two
//! strategies exist:
//!
//! - [`LayerMappedModel`]: regions are mapped to layers directly, no fitting
//! - [`ModelCommitment`]: each region gets the single candidate layer that
//!   best predicts a reference assembly
//!
//! [`RecordingModel`] wraps either one behind a single type, chosen at
//! construction through [`RegionCommitmentStrategy`].
//!
//! Both strategies share the same state: a [`Commitment`] (region → layers)
//! and a [`RecordingState`] (active regions and their time windows). Neither
//! is mutated until every check of the calling operation has passed.

pub mod fitted;
pub mod layer_mapped;
pub mod recording;

use std::collections::BTreeMap;

use cortexmap_core::error::{CommitmentError, CommitmentResult};
use cortexmap_core::stimulus::StimulusSet;
use cortexmap_core::table::{PredictionRow, PredictionTable};
use cortexmap_core::types::{LayerId, RegionId, TimeWindow};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::activations::ActivationSource;
use crate::error::{ActivationError, CortexResult};

pub use fitted::ModelCommitment;
pub use layer_mapped::LayerMappedModel;
pub use recording::{RecordingModel, RegionCommitmentStrategy};

// ============================================================================
// Commitment
// ============================================================================

/// Region → layer mapping
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commitment {
    regions: BTreeMap<RegionId, Vec<LayerId>>,
}

impl Commitment {
    /// Map `region` to `layers`, replacing any previous mapping. Returns the
    /// previous layers.
    pub fn insert(&mut self, region: RegionId, layers: Vec<LayerId>) -> Option<Vec<LayerId>> {
        self.regions.insert(region, layers)
    }

    /// Layers committed for `region`
    #[must_use]
    pub fn layers(&self, region: &RegionId) -> Option<&[LayerId]> {
        self.regions.get(region).map(Vec::as_slice)
    }

    /// True if `region` has been committed
    #[inline]
    #[must_use]
    pub fn is_committed(&self, region: &RegionId) -> bool {
        self.regions.contains_key(region)
    }

    /// Committed regions in order
    pub fn regions(&self) -> impl Iterator<Item = &RegionId> {
        self.regions.keys()
    }

    /// Iterate `(region, layers)` pairs
    pub fn iter(&self) -> impl Iterator<Item = (&RegionId, &[LayerId])> {
        self.regions.iter().map(|(r, l)| (r, l.as_slice()))
    }

    /// Number of committed regions
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.regions.len()
    }

    /// True if nothing is committed
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }
}

// ============================================================================
// Recording State
// ============================================================================

/// Regions currently being recorded, with their time windows. An empty
/// window list means the region is recorded without temporal information.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordingState {
    active: BTreeMap<RegionId, Vec<TimeWindow>>,
}

impl RecordingState {
    /// Mark `region` active with `windows`. Returns `false` if the region
    /// was already active with exactly these windows.
    pub fn activate(&mut self, region: RegionId, windows: Vec<TimeWindow>) -> bool {
        if self.active.get(&region) == Some(&windows) {
            return false;
        }
        self.active.insert(region, windows);
        true
    }

    /// True if `region` is active
    #[inline]
    #[must_use]
    pub fn is_active(&self, region: &RegionId) -> bool {
        self.active.contains_key(region)
    }

    /// Windows attached to `region`
    #[must_use]
    pub fn windows(&self, region: &RegionId) -> Option<&[TimeWindow]> {
        self.active.get(region).map(Vec::as_slice)
    }

    /// Active regions in order
    pub fn regions(&self) -> impl Iterator<Item = &RegionId> {
        self.active.keys()
    }

    /// Iterate `(region, windows)` pairs
    pub fn iter(&self) -> impl Iterator<Item = (&RegionId, &[TimeWindow])> {
        self.active.iter().map(|(r, w)| (r, w.as_slice()))
    }

    /// Number of active regions
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.active.len()
    }

    /// True if no region is active
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }
}

// ============================================================================
// Shared Helpers
// ============================================================================

/// Reject blank region labels
pub(crate) fn validate_region(region: &RegionId) -> CommitmentResult<()> {
    if region.is_blank() {
        return Err(CommitmentError::InvalidRegion);
    }
    Ok(())
}

/// Reject layers the source does not expose
pub(crate) fn validate_layers<S: ActivationSource>(source: &S, layers: &[LayerId]) -> CommitmentResult<()> {
    match layers.iter().find(|l| !source.has_layer(l)) {
        Some(layer) => Err(CommitmentError::InvalidLayer {
            layer: layer.clone(),
            available: source.layers().to_vec(),
        }),
        None => Ok(()),
    }
}

/// Build the prediction table for every active region.
///
/// Rows are ordered by region, then committed layer order, then stimulus
/// order, then window. Regions with no windows produce rows without one;
/// otherwise every response is reported once per window.
pub(crate) fn predict<S: ActivationSource>(
    source: &S,
    commitment: &Commitment,
    recording: &RecordingState,
    stimuli: &StimulusSet,
) -> CortexResult<PredictionTable> {
    let mut table = PredictionTable::new(stimuli.name());
    if stimuli.is_empty() || recording.is_empty() {
        debug!(
            stimulus_set = stimuli.name(),
            stimuli = stimuli.len(),
            regions = recording.len(),
            "Nothing to predict"
        );
        return Ok(table);
    }

    let mut layers: Vec<LayerId> = Vec::new();
    for region in recording.regions() {
        let committed = commitment
            .layers(region)
            .ok_or_else(|| CommitmentError::UncommittedRegion { region: region.clone() })?;
        for layer in committed {
            if !layers.contains(layer) {
                layers.push(layer.clone());
            }
        }
    }

    let activations = source.activations(stimuli, &layers)?;

    for (region, windows) in recording.iter() {
        let slots: Vec<Option<TimeWindow>> = if windows.is_empty() {
            vec![None]
        } else {
            windows.iter().copied().map(Some).collect()
        };

        for layer in commitment.layers(region).unwrap_or_default() {
            let matrix = activations
                .get(layer)
                .ok_or_else(|| ActivationError::UnknownLayer { layer: layer.clone() })?;
            if !matrix.matches(stimuli) {
                return Err(ActivationError::Source {
                    reason: format!("activations of {layer} do not match stimulus set {}", stimuli.name()),
                }
                .into());
            }

            for (image_id, values) in matrix.rows() {
                for window in &slots {
                    table.push(PredictionRow {
                        image_id: image_id.to_owned(),
                        layer: layer.clone(),
                        region: region.clone(),
                        time_window: *window,
                        values: values.to_vec(),
                    });
                }
            }
        }
    }

    debug!(
        stimulus_set = stimuli.name(),
        rows = table.len(),
        layers = layers.len(),
        "Built prediction table"
    );
    Ok(table)
}

// ============================================================================
// Tests
// ============================================================================
