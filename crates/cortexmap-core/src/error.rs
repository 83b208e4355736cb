//! Error types for Cortexmap
//!
//! All errors are raised synchronously by the call that violates a
//! precondition. None of them are transient, so callers never retry.

use std::path::PathBuf;

use thiserror::Error;

use crate::types::{LayerId, RegionId};

// ============================================================================
// Commitment Errors
// ============================================================================

/// Errors from committing regions and controlling recordings
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CommitmentError {
    /// Region label is empty
    #[error("Invalid region: region identifier must not be empty")]
    InvalidRegion,

    /// Referenced layer does not exist on the activation source
    #[error("Invalid layer {layer}: not one of the source's layers {available:?}")]
    InvalidLayer {
        /// Layer that was requested
        layer: LayerId,
        /// Layers the source actually exposes
        available: Vec<LayerId>,
    },

    /// Recording requested for a region that was never committed
    #[error("Region {region} has not been committed")]
    UncommittedRegion {
        /// Offending region
        region: RegionId,
    },

    /// Reference assembly holds no rows for the region being committed
    #[error("Assembly has no recordings for region {region}")]
    EmptyAssembly {
        /// Region being committed
        region: RegionId,
    },

    /// Candidate layer set is empty
    #[error("No candidate layers available for commitment")]
    NoLayersAvailable,

    /// Recording window with start >= end
    #[error("Invalid time window: {start_ms}ms to {end_ms}ms")]
    InvalidWindow {
        /// Window start
        start_ms: f64,
        /// Window end
        end_ms: f64,
    },

    /// Operation not offered by this commitment strategy
    #[error("Operation {operation} is not supported by the {strategy} strategy")]
    UnsupportedOperation {
        /// Operation that was called
        operation: &'static str,
        /// Strategy that rejected it
        strategy: &'static str,
    },
}

// ============================================================================
// Stimulus Errors
// ============================================================================

/// Errors from building stimulus sets and loading stimulus content
#[derive(Error, Debug)]
pub enum StimulusError {
    /// Stimulus set built without a name
    #[error("Stimulus set name must not be empty")]
    MissingName,

    /// Two stimuli share an image id
    #[error("Duplicate image id {image_id} in stimulus set {set}")]
    DuplicateImageId {
        /// Repeated image id
        image_id: String,
        /// Stimulus set name
        set: String,
    },

    /// Image id not present in the set
    #[error("Image id {image_id} not found in stimulus set {set}")]
    UnknownImageId {
        /// Requested image id
        image_id: String,
        /// Stimulus set name
        set: String,
    },

    /// Stimulus file could not be read
    #[error("Failed to read stimulus {path}: {source}")]
    Unreadable {
        /// Path that failed
        path: PathBuf,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },

    /// Stimulus set file could not be opened
    #[error("Stimulus set IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Stimulus set JSON decode failed
    #[error("Stimulus set decode error: {0}")]
    Decode(#[from] serde_json::Error),
}

// ============================================================================
// Assembly Errors
// ============================================================================

/// Errors from constructing and loading neural assemblies
#[derive(Error, Debug)]
pub enum AssemblyError {
    /// Value buffer does not match the declared dimensions
    #[error("Assembly shape mismatch: expected {expected} values, got {got}")]
    ShapeMismatch {
        /// presentations × neuroids × time bins
        expected: usize,
        /// Length of the value buffer
        got: usize,
    },

    /// Assembly declares no time bins
    #[error("Assembly must declare at least one time bin")]
    NoTimeBins,

    /// Presentation references an image missing from the stimulus set
    #[error("Presentation references unknown image id {image_id}")]
    UnknownStimulus {
        /// Missing image id
        image_id: String,
    },

    /// Stratification attribute missing on a stimulus
    #[error("Stimulus {image_id} has no stratification attribute {key}")]
    MissingStratification {
        /// Stratification key
        key: String,
        /// Stimulus lacking the key
        image_id: String,
    },

    /// JSON decode failed
    #[error("Assembly decode error: {0}")]
    Decode(#[from] serde_json::Error),

    /// File could not be opened
    #[error("Assembly IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Stimulus set embedded in the assembly is invalid
    #[error("Assembly stimulus set error: {0}")]
    Stimulus(#[from] StimulusError),
}

/// Result type for commitment operations
pub type CommitmentResult<T> = Result<T, CommitmentError>;

/// Result type for stimulus operations
pub type StimulusResult<T> = Result<T, StimulusError>;

/// Result type for assembly operations
pub type AssemblyResult<T> = Result<T, AssemblyError>;
