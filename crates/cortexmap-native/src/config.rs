//! Commitment configuration
//!
//! All settings have defaults; a JSON file may override any subset of them.
//!
//! ```json
//! {
//!   "scorer": { "folds": 5, "ridge_alpha": 10.0 },
//!   "recording": { "default_time_bins": [{ "start_ms": 70.0, "end_ms": 170.0 }] }
//! }
//! ```

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use cortexmap_core::types::TimeWindow;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};

// ============================================================================
// Scorer
// ============================================================================

/// How time bins of the reference assembly are collapsed before fitting
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeAggregation {
    /// Mean over all time bins
    #[default]
    Mean,
    /// Only the first time bin
    FirstBin,
}

/// Layer scorer configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScorerConfig {
    /// Cross-validation folds
    pub folds: usize,
    /// Ridge penalty
    pub ridge_alpha: f64,
    /// Seed for the stratified split
    pub seed: u64,
    /// Scores closer than this are treated as tied
    pub tie_tolerance: f64,
    /// Time-bin collapse applied to the assembly
    pub time_aggregation: TimeAggregation,
}

impl Default for ScorerConfig {
    fn default() -> Self {
        Self {
            folds: 10,
            ridge_alpha: 1.0,
            seed: 0,
            tie_tolerance: 1e-9,
            time_aggregation: TimeAggregation::Mean,
        }
    }
}

impl ScorerConfig {
    /// Check parameter ranges
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidParameter`] for the first bad value.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.folds < 2 {
            return Err(ConfigError::InvalidParameter {
                parameter: "folds",
                reason: format!("need at least 2 folds, got {}", self.folds),
            });
        }
        if !(self.ridge_alpha.is_finite() && self.ridge_alpha > 0.0) {
            return Err(ConfigError::InvalidParameter {
                parameter: "ridge_alpha",
                reason: format!("must be positive, got {}", self.ridge_alpha),
            });
        }
        if !(self.tie_tolerance.is_finite() && self.tie_tolerance >= 0.0) {
            return Err(ConfigError::InvalidParameter {
                parameter: "tie_tolerance",
                reason: format!("must be non-negative, got {}", self.tie_tolerance),
            });
        }
        Ok(())
    }
}

// ============================================================================
// Recording
// ============================================================================

/// Recording configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordingConfig {
    /// Windows used when `start_recording` is given none
    pub default_time_bins: Vec<TimeWindow>,
    /// Stimuli per activation batch
    pub batch_size: usize,
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            default_time_bins: vec![TimeWindow {
                start_ms: 70.0,
                end_ms: 170.0,
            }],
            batch_size: 64,
        }
    }
}

impl RecordingConfig {
    /// Check parameter ranges
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidParameter`] for the first bad value.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.batch_size == 0 {
            return Err(ConfigError::InvalidParameter {
                parameter: "batch_size",
                reason: "must be at least 1".to_owned(),
            });
        }
        if self.default_time_bins.is_empty() {
            return Err(ConfigError::InvalidParameter {
                parameter: "default_time_bins",
                reason: "at least one window is required".to_owned(),
            });
        }
        if let Some(bad) = self
            .default_time_bins
            .iter()
            .find(|w| TimeWindow::new(w.start_ms, w.end_ms).is_err())
        {
            return Err(ConfigError::InvalidParameter {
                parameter: "default_time_bins",
                reason: format!("invalid window {bad}"),
            });
        }
        Ok(())
    }
}

// ============================================================================
// Top Level
// ============================================================================

/// Full commitment configuration
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommitmentConfig {
    /// Layer scoring
    pub scorer: ScorerConfig,
    /// Recording behaviour
    pub recording: RecordingConfig,
}

impl CommitmentConfig {
    /// Load and validate a JSON config file
    ///
    /// # Errors
    ///
    /// Fails on IO, decode or validation errors.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let file = File::open(path)?;
        let config: Self = serde_json::from_reader(BufReader::new(file))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate every section
    ///
    /// # Errors
    ///
    /// Returns the first section error.
    pub fn validate(&self) -> ConfigResult<()> {
        self.scorer.validate()?;
        self.recording.validate()
    }
}

// ============================================================================
// Tests
// ============================================================================
