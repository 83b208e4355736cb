//! Stored activations
//!
//! Wraps a source and remembers each layer's matrix per stimulus set name, so
//! repeated `look_at` calls on the same set skip the forward pass. A cached
//! matrix is only reused when its rows still match the set's image ids.

use std::cell::RefCell;
use std::collections::HashMap;

use cortexmap_core::stimulus::StimulusSet;
use cortexmap_core::types::LayerId;
use tracing::debug;

use super::{ensure_layers, ActivationMatrix, ActivationSource, LayerActivations};
use crate::error::ActivationResult;

/// Memoizing activation source
#[derive(Debug)]
pub struct CachedActivations<S> {
    inner: S,
    store: RefCell<HashMap<(String, LayerId), ActivationMatrix>>,
}

impl<S: ActivationSource> CachedActivations<S> {
    /// Wrap a source
    #[must_use]
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            store: RefCell::new(HashMap::new()),
        }
    }

    /// Borrow the wrapped source
    #[must_use]
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Number of stored matrices
    #[must_use]
    pub fn stored(&self) -> usize {
        self.store.borrow().len()
    }

    /// Drop every stored matrix
    pub fn clear(&self) {
        self.store.borrow_mut().clear();
    }
}

impl<S: ActivationSource> ActivationSource for CachedActivations<S> {
    fn identifier(&self) -> &str {
        self.inner.identifier()
    }

    fn layers(&self) -> &[LayerId] {
        self.inner.layers()
    }

    fn activations(&self, stimuli: &StimulusSet, layers: &[LayerId]) -> ActivationResult<LayerActivations> {
        ensure_layers(self, layers)?;

        let key = |layer: &LayerId| (stimuli.name().to_owned(), layer.clone());
        let missing: Vec<LayerId> = {
            let store = self.store.borrow();
            layers
                .iter()
                .filter(|&layer| !store.get(&key(layer)).is_some_and(|m| m.matches(stimuli)))
                .cloned()
                .collect()
        };

        if missing.is_empty() {
            debug!(stimulus_set = stimuli.name(), "All requested activations stored");
        } else {
            debug!(
                stimulus_set = stimuli.name(),
                layers = missing.len(),
                "Computing activations not in store"
            );
            let computed = self.inner.activations(stimuli, &missing)?;
            let mut store = self.store.borrow_mut();
            for (layer, matrix) in computed {
                store.insert(key(&layer), matrix);
            }
        }

        let store = self.store.borrow();
        Ok(layers
            .iter()
            .filter_map(|layer| store.get(&key(layer)).map(|m| (layer.clone(), m.clone())))
            .collect())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;

    /// Source returning the stimulus position, counting forward passes
    struct CountingSource {
        layers: Vec<LayerId>,
        calls: Cell<usize>,
    }

    impl ActivationSource for CountingSource {
        fn identifier(&self) -> &str {
            "counting"
        }

        fn layers(&self) -> &[LayerId] {
            &self.layers
        }

        fn activations(&self, stimuli: &StimulusSet, layers: &[LayerId]) -> ActivationResult<LayerActivations> {
            self.calls.set(self.calls.get() + 1);
            let ids: Vec<String> = stimuli.image_ids().map(str::to_owned).collect();
            #[allow(clippy::cast_precision_loss)]
            let data: Vec<f64> = (0..ids.len()).map(|i| i as f64).collect();
            layers
                .iter()
                .map(|l| -> ActivationResult<(LayerId, ActivationMatrix)> {
                    Ok((l.clone(), ActivationMatrix::new(l, ids.clone(), 1, data.clone())?))
                })
                .collect()
        }
    }

    fn source() -> CachedActivations<CountingSource> {
        CachedActivations::new(CountingSource {
            layers: vec![LayerId::from("a"), LayerId::from("b")],
            calls: Cell::new(0),
        })
    }

    fn set(ids: &[&str]) -> StimulusSet {
        ids.iter()
            .fold(StimulusSet::builder("cached"), |b, id| b.stimulus(*id, *id))
            .build()
            .unwrap()
    }

    #[test]
    fn test_second_call_uses_store() {
        let cached = source();
        let stimuli = set(&["x", "y"]);
        let layers = [LayerId::from("a")];

        let first = cached.activations(&stimuli, &layers).unwrap();
        let second = cached.activations(&stimuli, &layers).unwrap();

        assert_eq!(first, second);
        assert_eq!(cached.inner().calls.get(), 1);
        assert_eq!(cached.stored(), 1);
    }

    #[test]
    fn test_only_missing_layers_computed() {
        let cached = source();
        let stimuli = set(&["x"]);

        cached.activations(&stimuli, &[LayerId::from("a")]).unwrap();
        let both = cached
            .activations(&stimuli, &[LayerId::from("a"), LayerId::from("b")])
            .unwrap();

        assert_eq!(both.len(), 2);
        assert_eq!(cached.inner().calls.get(), 2);
        assert_eq!(cached.stored(), 2);
    }

    #[test]
    fn test_changed_set_recomputes() {
        let cached = source();
        let layers = [LayerId::from("a")];

        cached.activations(&set(&["x"]), &layers).unwrap();
        let changed = cached.activations(&set(&["x", "y"]), &layers).unwrap();

        assert_eq!(changed[&layers[0]].len(), 2);
        assert_eq!(cached.inner().calls.get(), 2);
    }

    #[test]
    fn test_clear() {
        let cached = source();
        cached.activations(&set(&["x"]), &[LayerId::from("a")]).unwrap();
        cached.clear();
        assert_eq!(cached.stored(), 0);
    }
}
