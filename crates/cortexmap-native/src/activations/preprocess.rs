//! Stimulus preprocessing
//!
//! Turns raw stimulus bytes into a fixed-length input vector by mean-pooling
//! contiguous byte ranges and scaling to `[0, 1]`. No image decoding is done.

use cortexmap_core::stimulus::StimulusSet;

use crate::error::ActivationResult;

/// Fixed-size byte pooling preprocessor
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct BytePreprocessor {
    input_size: usize,
}

impl BytePreprocessor {
    /// Create a preprocessor producing `input_size` values
    #[must_use]
    pub fn new(input_size: usize) -> Self {
        Self {
            input_size: input_size.max(1),
        }
    }

    /// Output length
    #[inline]
    #[must_use]
    pub fn input_size(&self) -> usize {
        self.input_size
    }

    /// Pool a byte buffer into the input vector. Empty input yields zeros.
    #[must_use]
    pub fn pool(&self, bytes: &[u8]) -> Vec<f64> {
        let n = self.input_size;
        let len = bytes.len();
        if len == 0 {
            return vec![0.0; n];
        }

        (0..n)
            .map(|i| {
                let start = i * len / n;
                let end = ((i + 1) * len / n).max(start + 1).min(len);
                let chunk = &bytes[start..end];
                let sum: f64 = chunk.iter().map(|&b| f64::from(b)).sum();
                #[allow(clippy::cast_precision_loss)]
                let mean = sum / chunk.len() as f64;
                mean / 255.0
            })
            .collect()
    }

    /// Load and pool one stimulus
    ///
    /// # Errors
    ///
    /// Fails if the stimulus is unknown or unreadable.
    pub fn load(&self, stimuli: &StimulusSet, image_id: &str) -> ActivationResult<Vec<f64>> {
        let bytes = stimuli.read_stimulus(image_id)?;
        Ok(self.pool(&bytes))
    }
}

// ============================================================================
// Tests
// ============================================================================
