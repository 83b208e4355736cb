//! Reference neural-response assemblies
//!
//! A [`NeuroidAssembly`] holds recorded responses along three axes:
//! presentations (one per shown stimulus, possibly repeated), neuroids
//! (recording sites, each tagged with a region) and time bins. Values are
//! stored row-major as `[presentation][neuroid][time_bin]`.
//!
//! Assemblies are only used as fitting input when committing a region.

use std::collections::{BTreeSet, HashMap};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AssemblyError, AssemblyResult};
use crate::stimulus::StimulusSet;
use crate::types::{RegionId, TimeWindow};

// ============================================================================
// Axes
// ============================================================================

/// One presentation of a stimulus
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Presentation {
    /// Image shown
    pub image_id: String,
    /// Repetition index of this image
    #[serde(default)]
    pub repetition: u32,
}

/// One recording site
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Neuroid {
    /// Site identifier
    pub neuroid_id: String,
    /// Region the site was recorded in
    pub region: RegionId,
}

/// On-disk representation of an assembly
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AssemblyRecord {
    /// Stimuli the presentations refer to
    pub stimulus_set: StimulusSet,
    /// Presentation axis
    pub presentations: Vec<Presentation>,
    /// Neuroid axis
    pub neuroids: Vec<Neuroid>,
    /// Time-bin axis
    pub time_bins: Vec<TimeWindow>,
    /// Flat values, `[presentation][neuroid][time_bin]`
    pub values: Vec<f64>,
}

// ============================================================================
// Assembly
// ============================================================================

/// Recorded neural responses indexed by presentation, neuroid and time bin
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "AssemblyRecord", into = "AssemblyRecord")]
pub struct NeuroidAssembly {
    stimulus_set: StimulusSet,
    presentations: Vec<Presentation>,
    neuroids: Vec<Neuroid>,
    time_bins: Vec<TimeWindow>,
    values: Vec<f64>,
}

impl NeuroidAssembly {
    /// Create a validated assembly.
    ///
    /// # Errors
    ///
    /// Fails when the value buffer does not match the axes, no time bins are
    /// declared, or a presentation names an image outside `stimulus_set`.
    pub fn new(
        stimulus_set: StimulusSet,
        presentations: Vec<Presentation>,
        neuroids: Vec<Neuroid>,
        time_bins: Vec<TimeWindow>,
        values: Vec<f64>,
    ) -> AssemblyResult<Self> {
        if time_bins.is_empty() {
            return Err(AssemblyError::NoTimeBins);
        }

        let expected = presentations.len() * neuroids.len() * time_bins.len();
        if values.len() != expected {
            return Err(AssemblyError::ShapeMismatch {
                expected,
                got: values.len(),
            });
        }

        if let Some(missing) = presentations
            .iter()
            .find(|p| stimulus_set.position(&p.image_id).is_none())
        {
            return Err(AssemblyError::UnknownStimulus {
                image_id: missing.image_id.clone(),
            });
        }

        Ok(Self {
            stimulus_set,
            presentations,
            neuroids,
            time_bins,
            values,
        })
    }

    /// Load an assembly from JSON, optionally averaging repeated
    /// presentations. Relative stimulus paths resolve against the file's
    /// directory.
    ///
    /// # Errors
    ///
    /// Fails on IO, decode or validation errors.
    pub fn from_json_file<P: AsRef<Path>>(path: P, average_repetition: bool) -> AssemblyResult<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let mut record: AssemblyRecord = serde_json::from_reader(BufReader::new(file))?;

        let base = path.parent().unwrap_or_else(|| Path::new("."));
        record.stimulus_set = record.stimulus_set.resolved_against(base);

        let assembly = Self::try_from(record)?;
        Ok(if average_repetition {
            assembly.average_repetitions()
        } else {
            assembly
        })
    }

    /// Stimulus set the presentations were drawn from
    #[inline]
    #[must_use]
    pub fn stimulus_set(&self) -> &StimulusSet {
        &self.stimulus_set
    }

    /// Presentation axis
    #[inline]
    #[must_use]
    pub fn presentations(&self) -> &[Presentation] {
        &self.presentations
    }

    /// Neuroid axis
    #[inline]
    #[must_use]
    pub fn neuroids(&self) -> &[Neuroid] {
        &self.neuroids
    }

    /// Time-bin axis
    #[inline]
    #[must_use]
    pub fn time_bins(&self) -> &[TimeWindow] {
        &self.time_bins
    }

    /// True if there is nothing to fit against
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.presentations.is_empty() || self.neuroids.is_empty()
    }

    /// Distinct regions covered by the neuroids
    #[must_use]
    pub fn regions(&self) -> BTreeSet<RegionId> {
        self.neuroids.iter().map(|n| n.region.clone()).collect()
    }

    /// Single recorded value
    ///
    /// # Panics
    ///
    /// Panics if any index is out of range.
    #[inline]
    #[must_use]
    pub fn value(&self, presentation: usize, neuroid: usize, time_bin: usize) -> f64 {
        let bins = self.time_bins.len();
        self.values[(presentation * self.neuroids.len() + neuroid) * bins + time_bin]
    }

    /// Keep only neuroids recorded in `region`. The result may be empty.
    #[must_use]
    pub fn restrict_to_region(&self, region: &RegionId) -> Self {
        let keep: Vec<usize> = self
            .neuroids
            .iter()
            .enumerate()
            .filter(|(_, n)| &n.region == region)
            .map(|(i, _)| i)
            .collect();

        let bins = self.time_bins.len();
        let mut values = Vec::with_capacity(self.presentations.len() * keep.len() * bins);
        for p in 0..self.presentations.len() {
            for &n in &keep {
                for t in 0..bins {
                    values.push(self.value(p, n, t));
                }
            }
        }

        Self {
            stimulus_set: self.stimulus_set.clone(),
            presentations: self.presentations.clone(),
            neuroids: keep.iter().map(|&i| self.neuroids[i].clone()).collect(),
            time_bins: self.time_bins.clone(),
            values,
        }
    }

    /// Average repeated presentations of the same image. Images keep the
    /// order of their first presentation; every result has repetition 0.
    #[must_use]
    pub fn average_repetitions(&self) -> Self {
        let mut order: Vec<&str> = Vec::new();
        let mut groups: HashMap<&str, Vec<usize>> = HashMap::new();
        for (i, presentation) in self.presentations.iter().enumerate() {
            let members = groups.entry(presentation.image_id.as_str()).or_default();
            if members.is_empty() {
                order.push(presentation.image_id.as_str());
            }
            members.push(i);
        }

        let bins = self.time_bins.len();
        let stride = self.neuroids.len() * bins;
        let mut values = Vec::with_capacity(order.len() * stride);
        for image_id in &order {
            let members = &groups[image_id];
            #[allow(clippy::cast_precision_loss)]
            let count = members.len() as f64;
            for offset in 0..stride {
                let sum: f64 = members.iter().map(|&p| self.values[p * stride + offset]).sum();
                values.push(sum / count);
            }
        }

        Self {
            stimulus_set: self.stimulus_set.clone(),
            presentations: order
                .iter()
                .map(|id| Presentation {
                    image_id: (*id).to_owned(),
                    repetition: 0,
                })
                .collect(),
            neuroids: self.neuroids.clone(),
            time_bins: self.time_bins.clone(),
            values,
        }
    }

    /// Responses averaged across time bins, `[presentation][neuroid]`
    #[must_use]
    pub fn responses_averaged_over_time(&self) -> Vec<Vec<f64>> {
        let bins = self.time_bins.len();
        #[allow(clippy::cast_precision_loss)]
        let denom = bins as f64;
        (0..self.presentations.len())
            .map(|p| {
                (0..self.neuroids.len())
                    .map(|n| (0..bins).map(|t| self.value(p, n, t)).sum::<f64>() / denom)
                    .collect()
            })
            .collect()
    }

    /// Stratification label of every presentation, read from the stimulus
    /// attribute `key`.
    ///
    /// # Errors
    ///
    /// Returns [`AssemblyError::MissingStratification`] for the first
    /// stimulus lacking the attribute.
    pub fn stratification_labels(&self, key: &str) -> AssemblyResult<Vec<String>> {
        self.presentations
            .iter()
            .map(|p| {
                self.stimulus_set
                    .get(&p.image_id)
                    .and_then(|s| s.attribute(key))
                    .map(str::to_owned)
                    .ok_or_else(|| AssemblyError::MissingStratification {
                        key: key.to_owned(),
                        image_id: p.image_id.clone(),
                    })
            })
            .collect()
    }

    /// Stimulus set restricted to the presented images, in presentation
    /// order (first occurrence)
    ///
    /// # Errors
    ///
    /// Only fails if the assembly invariants were broken.
    pub fn presented_stimuli(&self) -> AssemblyResult<StimulusSet> {
        let mut seen = BTreeSet::new();
        let ids: Vec<&str> = self
            .presentations
            .iter()
            .map(|p| p.image_id.as_str())
            .filter(|id| seen.insert(*id))
            .collect();
        Ok(self.stimulus_set.select(ids)?)
    }
}

impl TryFrom<AssemblyRecord> for NeuroidAssembly {
    type Error = AssemblyError;

    fn try_from(record: AssemblyRecord) -> Result<Self, Self::Error> {
        Self::new(
            record.stimulus_set,
            record.presentations,
            record.neuroids,
            record.time_bins,
            record.values,
        )
    }
}

impl From<NeuroidAssembly> for AssemblyRecord {
    fn from(assembly: NeuroidAssembly) -> Self {
        Self {
            stimulus_set: assembly.stimulus_set,
            presentations: assembly.presentations,
            neuroids: assembly.neuroids,
            time_bins: assembly.time_bins,
            values: assembly.values,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
