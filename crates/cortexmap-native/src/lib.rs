//! Cortexmap Native - activation models committed to brain regions
//!
//! This crate turns a layered activation model into a region-level response
//! model:
//! - Activation extraction from named layers, batched and memoized
//! - Direct region → layer commitment
//! - Fitted commitment that picks the layer best predicting reference
//!   recordings (stratified cross-validated ridge regression)
//! - Recording control and prediction tables
//!
//! # Modules
//!
//! - [`activations`]: Activation sources and the built-in network
//! - [`commitment`]: Direct and fitted commitment models
//! - [`scoring`]: Pluggable layer scoring and selection
//! - [`config`]: Scorer and recording configuration
//! - [`error`]: Error types
//!
//! # Example
//!
//! ```rust
//! use cortexmap_core::StimulusSet;
//! use cortexmap_native::activations::SequentialNetwork;
//! use cortexmap_native::LayerMappedModel;
//!
//! let network = SequentialNetwork::custom(0).unwrap();
//! let mut model = LayerMappedModel::from_source(network);
//! model.commit("IT", ["linear", "relu2"]).unwrap();
//! model.start_recording("IT").unwrap();
//!
//! // Nothing is read for an empty set
//! let empty = StimulusSet::builder("empty").build().unwrap();
//! assert!(model.look_at(&empty).unwrap().is_empty());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod activations;
pub mod commitment;
pub mod config;
pub mod error;
pub mod scoring;

// Re-export key types
pub use activations::{ActivationMatrix, ActivationSource, CachedActivations, SequentialNetwork};
pub use commitment::{
    Commitment, LayerMappedModel, ModelCommitment, RecordingModel, RecordingState, RegionCommitmentStrategy,
};
pub use config::{CommitmentConfig, RecordingConfig, ScorerConfig, TimeAggregation};
pub use error::{ActivationError, ConfigError, CortexError, CortexResult, ScoringError};
pub use scoring::{FixedScores, LayerScorer, LayerSelection, RidgeRegressionScorer};
