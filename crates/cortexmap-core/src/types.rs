//! Core identifier and window types
//!
//! Regions and layers are plain strings on the wire; the newtypes keep them
//! from being mixed up in commitment maps and prediction rows.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CommitmentError;

// ============================================================================
// Identifiers
// ============================================================================

/// Anatomical or functional region label (e.g. `"IT"`, `"V4"`)
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RegionId(String);

impl RegionId {
    /// Create a region identifier
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Borrow the region label
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True when the label is empty or only whitespace
    #[inline]
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for RegionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RegionId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl From<String> for RegionId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Named computational stage of an activation source (e.g. `"relu2"`)
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LayerId(String);

impl LayerId {
    /// Create a layer identifier
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Borrow the layer name
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for LayerId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl From<String> for LayerId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Layers named in a commitment: one layer, or an ordered candidate list
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LayerSpec {
    /// A single layer
    Single(LayerId),
    /// Ordered layer list
    Multiple(Vec<LayerId>),
}

impl LayerSpec {
    /// Layers in their given order with repeats removed
    #[must_use]
    pub fn layers(&self) -> Vec<LayerId> {
        match self {
            Self::Single(layer) => vec![layer.clone()],
            Self::Multiple(layers) => {
                let mut unique: Vec<LayerId> = Vec::with_capacity(layers.len());
                for layer in layers {
                    if !unique.contains(layer) {
                        unique.push(layer.clone());
                    }
                }
                unique
            }
        }
    }
}

impl From<&str> for LayerSpec {
    fn from(value: &str) -> Self {
        Self::Single(LayerId::from(value))
    }
}

impl From<LayerId> for LayerSpec {
    fn from(value: LayerId) -> Self {
        Self::Single(value)
    }
}

impl From<Vec<LayerId>> for LayerSpec {
    fn from(value: Vec<LayerId>) -> Self {
        Self::Multiple(value)
    }
}

impl From<Vec<&str>> for LayerSpec {
    fn from(value: Vec<&str>) -> Self {
        Self::Multiple(value.into_iter().map(LayerId::from).collect())
    }
}

impl From<&[&str]> for LayerSpec {
    fn from(value: &[&str]) -> Self {
        Self::Multiple(value.iter().copied().map(LayerId::from).collect())
    }
}

impl<const N: usize> From<[&str; N]> for LayerSpec {
    fn from(value: [&str; N]) -> Self {
        Self::Multiple(value.into_iter().map(LayerId::from).collect())
    }
}

// ============================================================================
// Time Windows
// ============================================================================

/// Half-open recording window in milliseconds after stimulus onset
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TimeWindow {
    /// Window start (ms)
    pub start_ms: f64,
    /// Window end (ms)
    pub end_ms: f64,
}

impl TimeWindow {
    /// Create a validated window.
    ///
    /// # Errors
    ///
    /// Returns [`CommitmentError::InvalidWindow`] when `start_ms >= end_ms`
    /// or either bound is not finite.
    pub fn new(start_ms: f64, end_ms: f64) -> Result<Self, CommitmentError> {
        if !start_ms.is_finite() || !end_ms.is_finite() || start_ms >= end_ms {
            return Err(CommitmentError::InvalidWindow { start_ms, end_ms });
        }
        Ok(Self { start_ms, end_ms })
    }

    /// Build a window from a `(start, end)` pair as accepted by `start_recording`
    ///
    /// # Errors
    ///
    /// Same as [`TimeWindow::new`].
    pub fn from_pair((start_ms, end_ms): (f64, f64)) -> Result<Self, CommitmentError> {
        Self::new(start_ms, end_ms)
    }

    /// Window length in milliseconds
    #[inline]
    #[must_use]
    pub fn duration_ms(&self) -> f64 {
        self.end_ms - self.start_ms
    }

    /// True if `other` shares any instant with this window
    #[must_use]
    pub fn overlaps(&self, other: &TimeWindow) -> bool {
        self.start_ms < other.end_ms && other.start_ms < self.end_ms
    }

    /// Parse a `start:end` string, e.g. `"70:170"`
    ///
    /// # Errors
    ///
    /// Returns [`CommitmentError::InvalidWindow`] when either bound fails to
    /// parse (reported as NaN) or the bounds are out of order.
    pub fn parse(text: &str) -> Result<Self, CommitmentError> {
        let (start, end) = text.split_once(':').unwrap_or((text, ""));
        let start_ms = start.trim().parse::<f64>().unwrap_or(f64::NAN);
        let end_ms = end.trim().parse::<f64>().unwrap_or(f64::NAN);
        Self::new(start_ms, end_ms)
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}ms, {}ms)", self.start_ms, self.end_ms)
    }
}

// ============================================================================
// Tests
// ============================================================================
