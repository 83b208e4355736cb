//! Error types for native processing
//!
//! Activation extraction, layer scoring and configuration errors, plus the
//! [`CortexError`] aggregate returned by the commitment models.

use cortexmap_core::error::{AssemblyError, CommitmentError, StimulusError};
use cortexmap_core::types::LayerId;
use thiserror::Error;

/// Activation extraction errors
#[derive(Error, Debug)]
pub enum ActivationError {
    /// Layer not exposed by the source
    #[error("Activation source has no layer {layer}")]
    UnknownLayer {
        /// Requested layer
        layer: LayerId,
    },

    /// Activation buffer does not match rows × units
    #[error("Activation matrix for {layer}: expected {expected} values, got {got}")]
    ShapeMismatch {
        /// Layer being assembled
        layer: LayerId,
        /// rows × units
        expected: usize,
        /// Actual buffer length
        got: usize,
    },

    /// Stimulus content could not be loaded
    #[error("Stimulus error: {0}")]
    Stimulus(#[from] StimulusError),

    /// Source-specific failure
    #[error("Activation source failed: {reason}")]
    Source {
        /// Error reason
        reason: String,
    },
}

/// Layer scoring errors
#[derive(Error, Debug)]
pub enum ScoringError {
    /// Fewer presentations than cross-validation folds
    #[error("Too few presentations for cross-validation: got {got}, need {need}")]
    TooFewPresentations {
        /// Presentations available
        got: usize,
        /// Presentations required
        need: usize,
    },

    /// Activations lack a presented stimulus
    #[error("No activations for presented image {image_id}")]
    MissingActivations {
        /// Image without activations
        image_id: String,
    },

    /// Fixed score table has no entry for a candidate
    #[error("No score recorded for layer {layer}")]
    MissingScore {
        /// Candidate layer
        layer: LayerId,
    },

    /// Assembly could not provide fitting inputs
    #[error("Assembly error: {0}")]
    Assembly(#[from] AssemblyError),
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Parameter outside its valid range
    #[error("Invalid config parameter {parameter}: {reason}")]
    InvalidParameter {
        /// Parameter name
        parameter: &'static str,
        /// Reason
        reason: String,
    },

    /// Config file could not be read
    #[error("Config IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Config file could not be decoded
    #[error("Config decode error: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Aggregate error for commitment models
#[derive(Error, Debug)]
pub enum CortexError {
    /// Commitment precondition violated
    #[error(transparent)]
    Commitment(#[from] CommitmentError),

    /// Activation extraction failed
    #[error(transparent)]
    Activation(#[from] ActivationError),

    /// Layer scoring failed
    #[error(transparent)]
    Scoring(#[from] ScoringError),

    /// Stimulus handling failed
    #[error(transparent)]
    Stimulus(#[from] StimulusError),

    /// Assembly handling failed
    #[error(transparent)]
    Assembly(#[from] AssemblyError),

    /// Configuration invalid
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl CortexError {
    /// Borrow the commitment error, if that is what this is
    #[must_use]
    pub fn as_commitment(&self) -> Option<&CommitmentError> {
        match self {
            Self::Commitment(err) => Some(err),
            _ => None,
        }
    }
}

/// Result type for activation extraction
pub type ActivationResult<T> = Result<T, ActivationError>;

/// Result type for layer scoring
pub type ScoringResult<T> = Result<T, ScoringError>;

/// Result type for configuration
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Result type for commitment model operations
pub type CortexResult<T> = Result<T, CortexError>;
