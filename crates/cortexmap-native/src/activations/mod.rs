//! Activation sources
//!
//! An [`ActivationSource`] is any model with named layers that can produce a
//! response matrix per layer for a batch of stimuli. Commitment models only
//! talk to sources through this trait.
//!
//! - [`network`]: a small deterministic feed-forward network
//! - [`preprocess`]: stimulus bytes → fixed-size network input
//! - [`cache`]: memoizing wrapper keyed by stimulus set name

pub mod cache;
pub mod network;
pub mod preprocess;

use std::collections::HashMap;

use cortexmap_core::stimulus::StimulusSet;
use cortexmap_core::types::LayerId;

use crate::error::{ActivationError, ActivationResult};

pub use cache::CachedActivations;
pub use network::{SequentialNetwork, SequentialNetworkBuilder, Stage};
pub use preprocess::BytePreprocessor;

/// Activations of the requested layers, keyed by layer
pub type LayerActivations = HashMap<LayerId, ActivationMatrix>;

/// Model exposing named layers and their responses to stimuli
pub trait ActivationSource {
    /// Model identifier
    fn identifier(&self) -> &str;

    /// Layers in network order
    fn layers(&self) -> &[LayerId];

    /// True if `layer` is one of [`ActivationSource::layers`]
    fn has_layer(&self, layer: &LayerId) -> bool {
        self.layers().contains(layer)
    }

    /// Responses of `layers` to every stimulus in `stimuli`. Matrix rows
    /// follow stimulus-set order.
    ///
    /// # Errors
    ///
    /// Fails on unknown layers or unreadable stimuli.
    fn activations(&self, stimuli: &StimulusSet, layers: &[LayerId]) -> ActivationResult<LayerActivations>;
}

impl<S: ActivationSource + ?Sized> ActivationSource for Box<S> {
    fn identifier(&self) -> &str {
        (**self).identifier()
    }

    fn layers(&self) -> &[LayerId] {
        (**self).layers()
    }

    fn activations(&self, stimuli: &StimulusSet, layers: &[LayerId]) -> ActivationResult<LayerActivations> {
        (**self).activations(stimuli, layers)
    }
}

// ============================================================================
// Activation Matrix
// ============================================================================

/// Stimuli × units response matrix for one layer
#[derive(Clone, Debug, PartialEq)]
pub struct ActivationMatrix {
    image_ids: Vec<String>,
    units: usize,
    data: Vec<f64>,
}

impl ActivationMatrix {
    /// Create a matrix from row-major data.
    ///
    /// # Errors
    ///
    /// Returns [`ActivationError::ShapeMismatch`] if `data` is not
    /// `image_ids.len() * units` long.
    pub fn new(layer: &LayerId, image_ids: Vec<String>, units: usize, data: Vec<f64>) -> ActivationResult<Self> {
        let expected = image_ids.len() * units;
        if data.len() != expected {
            return Err(ActivationError::ShapeMismatch {
                layer: layer.clone(),
                expected,
                got: data.len(),
            });
        }
        Ok(Self { image_ids, units, data })
    }

    /// Image id of every row
    #[inline]
    #[must_use]
    pub fn image_ids(&self) -> &[String] {
        &self.image_ids
    }

    /// Units per row
    #[inline]
    #[must_use]
    pub fn units(&self) -> usize {
        self.units
    }

    /// Number of rows
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.image_ids.len()
    }

    /// True if the matrix has no rows
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.image_ids.is_empty()
    }

    /// Row by position
    #[inline]
    #[must_use]
    pub fn row(&self, index: usize) -> &[f64] {
        &self.data[index * self.units..(index + 1) * self.units]
    }

    /// Row by image id
    #[must_use]
    pub fn row_for(&self, image_id: &str) -> Option<&[f64]> {
        self.image_ids
            .iter()
            .position(|id| id == image_id)
            .map(|i| self.row(i))
    }

    /// Iterate `(image_id, row)` pairs
    pub fn rows(&self) -> impl Iterator<Item = (&str, &[f64])> {
        self.image_ids
            .iter()
            .enumerate()
            .map(move |(i, id)| (id.as_str(), self.row(i)))
    }

    /// True if rows match `stimuli` one-to-one in order
    #[must_use]
    pub fn matches(&self, stimuli: &StimulusSet) -> bool {
        self.image_ids.len() == stimuli.len()
            && self.image_ids.iter().map(String::as_str).eq(stimuli.image_ids())
    }
}

/// Reject layers the source does not expose
///
/// # Errors
///
/// Returns [`ActivationError::UnknownLayer`] for the first unknown layer.
pub fn ensure_layers<S: ActivationSource + ?Sized>(source: &S, layers: &[LayerId]) -> ActivationResult<()> {
    match layers.iter().find(|layer| !source.has_layer(layer)) {
        Some(layer) => Err(ActivationError::UnknownLayer { layer: layer.clone() }),
        None => Ok(()),
    }
}

// ============================================================================
// Test Support
// ============================================================================

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// In-memory source: unit `u` of layer `l` for stimulus `s` is
    /// `100·l + 10·s + u`. Never reads stimulus files.
    pub(crate) struct StubSource {
        layers: Vec<LayerId>,
    }

    impl StubSource {
        pub(crate) fn new(layers: &[&str]) -> Self {
            Self {
                layers: layers.iter().copied().map(LayerId::from).collect(),
            }
        }
    }

    impl ActivationSource for StubSource {
        fn identifier(&self) -> &str {
            "stub"
        }

        fn layers(&self) -> &[LayerId] {
            &self.layers
        }

        #[allow(clippy::cast_precision_loss)]
        fn activations(&self, stimuli: &StimulusSet, layers: &[LayerId]) -> ActivationResult<LayerActivations> {
            ensure_layers(self, layers)?;
            let ids: Vec<String> = stimuli.image_ids().map(str::to_owned).collect();
            layers
                .iter()
                .map(|layer| -> ActivationResult<(LayerId, ActivationMatrix)> {
                    let l = self.layers.iter().position(|x| x == layer).unwrap_or(0);
                    let data = (0..ids.len())
                        .flat_map(|s| (0..2).map(move |u| (100 * l + 10 * s + u) as f64))
                        .collect();
                    Ok((layer.clone(), ActivationMatrix::new(layer, ids.clone(), 2, data)?))
                })
                .collect()
        }
    }

    /// Set of stimuli whose paths are never opened
    pub(crate) fn stimulus_set(name: &str, ids: &[&str]) -> StimulusSet {
        ids.iter()
            .fold(StimulusSet::builder(name), |b, id| b.stimulus(*id, format!("{id}.png")))
            .build()
            .unwrap()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matrix_shape_check() {
        let layer = LayerId::from("relu2");
        let result = ActivationMatrix::new(&layer, vec!["a".into(), "b".into()], 3, vec![0.0; 5]);
        assert!(matches!(result, Err(ActivationError::ShapeMismatch { expected: 6, got: 5, .. })));
    }

    #[test]
    fn test_matrix_rows() {
        let layer = LayerId::from("relu2");
        let matrix = ActivationMatrix::new(
            &layer,
            vec!["a".into(), "b".into()],
            2,
            vec![1.0, 2.0, 3.0, 4.0],
        )
        .unwrap();

        assert_eq!(matrix.row(1), &[3.0, 4.0]);
        assert_eq!(matrix.row_for("a"), Some(&[1.0, 2.0][..]));
        assert_eq!(matrix.row_for("c"), None);
        assert_eq!(matrix.rows().count(), 2);
    }

    #[test]
    fn test_matrix_matches_stimuli() {
        let layer = LayerId::from("relu2");
        let matrix = ActivationMatrix::new(&layer, vec!["a".into(), "b".into()], 1, vec![0.0, 0.0]).unwrap();

        let same = StimulusSet::builder("s").stimulus("a", "a").stimulus("b", "b").build().unwrap();
        let swapped = StimulusSet::builder("s").stimulus("b", "b").stimulus("a", "a").build().unwrap();

        assert!(matrix.matches(&same));
        assert!(!matrix.matches(&swapped));
    }
}
