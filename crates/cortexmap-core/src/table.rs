//! Prediction tables
//!
//! The only artifact a committed model produces: one row per
//! (stimulus, layer, region[, time window]) combination, carrying the
//! response vector of every unit in that layer.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::types::{LayerId, RegionId, TimeWindow};

/// Single predicted response
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PredictionRow {
    /// Stimulus the response belongs to
    pub image_id: String,
    /// Layer that produced the response
    pub layer: LayerId,
    /// Region the response is reported under
    pub region: RegionId,
    /// Recording window, if the model was asked for one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_window: Option<TimeWindow>,
    /// Unit responses
    pub values: Vec<f64>,
}

/// Tabular result of `look_at`
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PredictionTable {
    /// Name of the stimulus set the predictions were made for
    pub stimulus_set: String,
    rows: Vec<PredictionRow>,
}

impl PredictionTable {
    /// Create an empty table for a stimulus set
    #[must_use]
    pub fn new(stimulus_set: impl Into<String>) -> Self {
        Self {
            stimulus_set: stimulus_set.into(),
            rows: Vec::new(),
        }
    }

    /// Append a row
    pub fn push(&mut self, row: PredictionRow) {
        self.rows.push(row);
    }

    /// All rows in production order
    #[inline]
    #[must_use]
    pub fn rows(&self) -> &[PredictionRow] {
        &self.rows
    }

    /// Number of rows
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// True if no rows were produced
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Distinct values of the `region` column
    #[must_use]
    pub fn regions(&self) -> BTreeSet<RegionId> {
        self.rows.iter().map(|r| r.region.clone()).collect()
    }

    /// Distinct values of the `layer` column
    #[must_use]
    pub fn layers(&self) -> BTreeSet<LayerId> {
        self.rows.iter().map(|r| r.layer.clone()).collect()
    }

    /// Distinct values of the `image_id` column
    #[must_use]
    pub fn image_ids(&self) -> BTreeSet<&str> {
        self.rows.iter().map(|r| r.image_id.as_str()).collect()
    }

    /// Rows reported under `region`
    pub fn for_region<'a>(&'a self, region: &'a RegionId) -> impl Iterator<Item = &'a PredictionRow> {
        self.rows.iter().filter(move |r| &r.region == region)
    }

    /// Serialize to pretty JSON
    ///
    /// # Errors
    ///
    /// Propagates `serde_json` failures (non-finite values serialize as null,
    /// so this only fails on writer errors).
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

impl Extend<PredictionRow> for PredictionTable {
    fn extend<T: IntoIterator<Item = PredictionRow>>(&mut self, iter: T) {
        self.rows.extend(iter);
    }
}

// ============================================================================
// Tests
// ============================================================================
