//! Sequential feed-forward network
//!
//! A minimal deterministic network whose every stage is a named layer. Weights
//! are drawn from a seeded generator with the usual `±1/√fan_in` bound, so two
//! networks built with the same seed produce identical activations.
//!
//! # Example
//!
//! ```rust
//! use cortexmap_native::activations::{ActivationSource, SequentialNetwork};
//!
//! let network = SequentialNetwork::builder("custom", 32)
//!     .conv1d("conv1", 2, 3)
//!     .relu("relu1")
//!     .linear("linear", 8)
//!     .relu("relu2")
//!     .build()
//!     .unwrap();
//!
//! let names: Vec<&str> = network.layers().iter().map(|l| l.as_str()).collect();
//! assert_eq!(names, ["conv1", "relu1", "linear", "relu2"]);
//! ```

use std::collections::HashMap;

use cortexmap_core::stimulus::StimulusSet;
use cortexmap_core::types::LayerId;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use super::preprocess::BytePreprocessor;
use super::{ensure_layers, ActivationMatrix, ActivationSource, LayerActivations};
use crate::error::{ActivationError, ActivationResult};

/// Default stimuli per forward batch
pub const DEFAULT_BATCH_SIZE: usize = 64;

// ============================================================================
// Stages
// ============================================================================

/// One computational stage
#[derive(Clone, Debug, PartialEq)]
pub enum Stage {
    /// Single-input-channel 1-D convolution, no padding, stride 1.
    /// Output is channel-major and already flat.
    Conv1d {
        /// Output channels
        out_channels: usize,
        /// Kernel width
        kernel_size: usize,
        /// `[channel][tap]` weights
        weights: Vec<f64>,
        /// Per-channel bias
        bias: Vec<f64>,
    },
    /// Fully connected layer
    Linear {
        /// Input width
        inputs: usize,
        /// Output width
        outputs: usize,
        /// `[output][input]` weights
        weights: Vec<f64>,
        /// Per-output bias
        bias: Vec<f64>,
    },
    /// Elementwise `max(0, x)`
    Relu,
}

impl Stage {
    /// Output width for a given input width
    #[must_use]
    pub fn output_size(&self, input: usize) -> usize {
        match self {
            Self::Conv1d {
                out_channels,
                kernel_size,
                ..
            } => out_channels * (input + 1).saturating_sub(*kernel_size),
            Self::Linear { outputs, .. } => *outputs,
            Self::Relu => input,
        }
    }

    /// Apply the stage to one input vector
    #[must_use]
    pub fn forward(&self, input: &[f64]) -> Vec<f64> {
        match self {
            Self::Conv1d {
                out_channels,
                kernel_size,
                weights,
                bias,
            } => {
                let positions = (input.len() + 1).saturating_sub(*kernel_size);
                let mut out = Vec::with_capacity(out_channels * positions);
                for c in 0..*out_channels {
                    let kernel = &weights[c * kernel_size..(c + 1) * kernel_size];
                    for j in 0..positions {
                        let acc: f64 = kernel.iter().zip(&input[j..j + kernel_size]).map(|(w, x)| w * x).sum();
                        out.push(acc + bias[c]);
                    }
                }
                out
            }
            Self::Linear {
                inputs,
                outputs,
                weights,
                bias,
            } => (0..*outputs)
                .map(|o| {
                    let row = &weights[o * inputs..(o + 1) * inputs];
                    row.iter().zip(input).map(|(w, x)| w * x).sum::<f64>() + bias[o]
                })
                .collect(),
            Self::Relu => input.iter().map(|x| x.max(0.0)).collect(),
        }
    }
}

// ============================================================================
// Network
// ============================================================================

/// Deterministic feed-forward network with named stages
#[derive(Clone, Debug)]
pub struct SequentialNetwork {
    identifier: String,
    preprocessor: BytePreprocessor,
    stages: Vec<Stage>,
    layers: Vec<LayerId>,
    widths: Vec<usize>,
    batch_size: usize,
}

impl SequentialNetwork {
    /// Start building a network taking `input_size` pooled stimulus values
    #[must_use]
    pub fn builder(identifier: impl Into<String>, input_size: usize) -> SequentialNetworkBuilder {
        SequentialNetworkBuilder {
            identifier: identifier.into(),
            input_size,
            seed: 0,
            batch_size: DEFAULT_BATCH_SIZE,
            specs: Vec::new(),
        }
    }

    /// Small conv → relu → linear → relu network over 224 pooled inputs
    ///
    /// # Errors
    ///
    /// Never fails for the built-in shape; the `Result` mirrors
    /// [`SequentialNetworkBuilder::build`].
    pub fn custom(seed: u64) -> ActivationResult<Self> {
        Self::builder("custom", 224)
            .seed(seed)
            .conv1d("conv1", 2, 3)
            .relu("relu1")
            .linear("linear", 1000)
            .relu("relu2")
            .build()
    }

    /// Output width of a layer
    #[must_use]
    pub fn width(&self, layer: &LayerId) -> Option<usize> {
        self.layers.iter().position(|l| l == layer).map(|i| self.widths[i])
    }

    /// Stimuli per forward batch
    #[inline]
    #[must_use]
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Change the batch size (minimum 1)
    pub fn set_batch_size(&mut self, batch_size: usize) {
        self.batch_size = batch_size.max(1);
    }

    /// Run the network on one input, handing each requested stage output to
    /// `sink` in network order
    fn forward_into(&self, input: Vec<f64>, wanted: &[Option<usize>], sink: &mut [Vec<f64>]) {
        let mut current = input;
        for (stage_index, stage) in self.stages.iter().enumerate() {
            current = stage.forward(&current);
            if let Some(slot) = wanted[stage_index] {
                sink[slot].extend_from_slice(&current);
            }
        }
    }
}

impl ActivationSource for SequentialNetwork {
    fn identifier(&self) -> &str {
        &self.identifier
    }

    fn layers(&self) -> &[LayerId] {
        &self.layers
    }

    fn activations(&self, stimuli: &StimulusSet, layers: &[LayerId]) -> ActivationResult<LayerActivations> {
        ensure_layers(self, layers)?;

        // stage index → output slot
        let wanted: Vec<Option<usize>> = self
            .layers
            .iter()
            .map(|name| layers.iter().position(|l| l == name))
            .collect();
        let mut buffers: Vec<Vec<f64>> = layers
            .iter()
            .map(|l| Vec::with_capacity(stimuli.len() * self.width(l).unwrap_or(0)))
            .collect();

        let ids: Vec<&str> = stimuli.image_ids().collect();
        for (batch_index, batch) in ids.chunks(self.batch_size).enumerate() {
            debug!(
                model = %self.identifier,
                stimulus_set = stimuli.name(),
                batch = batch_index,
                size = batch.len(),
                "Running activation batch"
            );
            for image_id in batch {
                let input = self.preprocessor.load(stimuli, image_id)?;
                self.forward_into(input, &wanted, &mut buffers);
            }
        }

        let image_ids: Vec<String> = ids.iter().map(|id| (*id).to_owned()).collect();
        let mut result = HashMap::with_capacity(layers.len());
        for (layer, data) in layers.iter().zip(buffers) {
            let units = self.width(layer).unwrap_or(0);
            let matrix = ActivationMatrix::new(layer, image_ids.clone(), units, data)?;
            result.insert(layer.clone(), matrix);
        }
        Ok(result)
    }
}

// ============================================================================
// Builder
// ============================================================================

#[derive(Clone, Debug)]
enum StageSpec {
    Conv1d { out_channels: usize, kernel_size: usize },
    Linear { outputs: usize },
    Relu,
}

/// Builder for [`SequentialNetwork`]
#[derive(Clone, Debug)]
pub struct SequentialNetworkBuilder {
    identifier: String,
    input_size: usize,
    seed: u64,
    batch_size: usize,
    specs: Vec<(LayerId, StageSpec)>,
}

impl SequentialNetworkBuilder {
    /// Weight seed
    #[must_use]
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Stimuli per forward batch
    #[must_use]
    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Append a 1-D convolution stage
    #[must_use]
    pub fn conv1d(mut self, name: &str, out_channels: usize, kernel_size: usize) -> Self {
        self.specs.push((
            LayerId::from(name),
            StageSpec::Conv1d {
                out_channels,
                kernel_size,
            },
        ));
        self
    }

    /// Append a fully connected stage
    #[must_use]
    pub fn linear(mut self, name: &str, outputs: usize) -> Self {
        self.specs.push((LayerId::from(name), StageSpec::Linear { outputs }));
        self
    }

    /// Append a ReLU stage
    #[must_use]
    pub fn relu(mut self, name: &str) -> Self {
        self.specs.push((LayerId::from(name), StageSpec::Relu));
        self
    }

    /// Initialize weights and build the network.
    ///
    /// # Errors
    ///
    /// Returns [`ActivationError::Source`] for duplicate layer names, an
    /// empty network, or a stage whose output would be empty.
    pub fn build(self) -> ActivationResult<SequentialNetwork> {
        if self.specs.is_empty() {
            return Err(ActivationError::Source {
                reason: "network has no stages".to_owned(),
            });
        }

        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut width = self.input_size;
        let mut stages = Vec::with_capacity(self.specs.len());
        let mut layers: Vec<LayerId> = Vec::with_capacity(self.specs.len());
        let mut widths = Vec::with_capacity(self.specs.len());

        for (name, spec) in self.specs {
            if layers.contains(&name) {
                return Err(ActivationError::Source {
                    reason: format!("duplicate layer name {name}"),
                });
            }

            let stage = match spec {
                StageSpec::Conv1d {
                    out_channels,
                    kernel_size,
                } => Stage::Conv1d {
                    out_channels,
                    kernel_size,
                    weights: uniform(&mut rng, out_channels * kernel_size, kernel_size),
                    bias: uniform(&mut rng, out_channels, kernel_size),
                },
                StageSpec::Linear { outputs } => Stage::Linear {
                    inputs: width,
                    outputs,
                    weights: uniform(&mut rng, outputs * width, width),
                    bias: uniform(&mut rng, outputs, width),
                },
                StageSpec::Relu => Stage::Relu,
            };

            width = stage.output_size(width);
            if width == 0 {
                return Err(ActivationError::Source {
                    reason: format!("layer {name} produces no outputs"),
                });
            }

            stages.push(stage);
            layers.push(name);
            widths.push(width);
        }

        Ok(SequentialNetwork {
            identifier: self.identifier,
            preprocessor: BytePreprocessor::new(self.input_size),
            stages,
            layers,
            widths,
            batch_size: self.batch_size,
        })
    }
}

/// `count` weights uniform in `±1/√fan_in`
fn uniform(rng: &mut StdRng, count: usize, fan_in: usize) -> Vec<f64> {
    #[allow(clippy::cast_precision_loss)]
    let bound = 1.0 / (fan_in.max(1) as f64).sqrt();
    (0..count).map(|_| rng.gen_range(-bound..bound)).collect()
}

// ============================================================================
// Tests
// ============================================================================
