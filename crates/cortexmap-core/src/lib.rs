//! Cortexmap Core - data model for region-committed activation models
//!
//! This crate provides the types shared by every part of the Cortexmap
//! workspace: identifiers for regions and layers, stimulus sets, reference
//! neural assemblies and the prediction tables produced by a committed model.
//!
//! # Modules
//!
//! - [`types`]: Region/layer identifiers and recording time windows
//! - [`stimulus`]: Stimulus records and stimulus sets
//! - [`assembly`]: Reference neural-response assemblies
//! - [`table`]: Prediction tables returned by `look_at`
//! - [`error`]: Error types for commitment, stimuli and assemblies
//!
//! # Example
//!
//! ```rust
//! use cortexmap_core::types::{LayerId, RegionId, TimeWindow};
//!
//! let region = RegionId::from("IT");
//! let layer = LayerId::from("relu2");
//! let window = TimeWindow::new(70.0, 170.0).unwrap();
//!
//! assert_eq!(region.as_str(), "IT");
//! assert_eq!(layer.to_string(), "relu2");
//! assert!((window.duration_ms() - 100.0).abs() < 1e-9);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod assembly;
pub mod error;
pub mod stimulus;
pub mod table;
pub mod types;

// Re-export commonly used types at crate root
pub use assembly::{Neuroid, NeuroidAssembly, Presentation};
pub use error::{AssemblyError, CommitmentError, StimulusError};
pub use stimulus::{Stimulus, StimulusSet, StimulusSetBuilder};
pub use table::{PredictionRow, PredictionTable};
pub use types::{LayerId, LayerSpec, RegionId, TimeWindow};
