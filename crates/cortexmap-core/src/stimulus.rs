//! Stimulus records and stimulus sets
//!
//! A [`StimulusSet`] is an ordered, named collection of stimuli with unique
//! image ids. The name and every stimulus path are required when the set is
//! built; nothing is attached after construction.

use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{StimulusError, StimulusResult};

/// Single stimulus record
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stimulus {
    /// Unique identifier within the owning set
    pub image_id: String,
    /// Location of the stimulus content
    pub path: PathBuf,
    /// Free-form metadata (e.g. `category_name`)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,
}

impl Stimulus {
    /// Look up a metadata attribute
    #[must_use]
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }
}

/// On-disk representation, validated into a [`StimulusSet`]
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StimulusSetRecord {
    /// Set name
    pub name: String,
    /// Stimuli in set order
    pub stimuli: Vec<Stimulus>,
}

/// Named, ordered collection of stimuli
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(try_from = "StimulusSetRecord", into = "StimulusSetRecord")]
pub struct StimulusSet {
    name: String,
    stimuli: Vec<Stimulus>,
    index: HashMap<String, usize>,
}

impl PartialEq for StimulusSet {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.stimuli == other.stimuli
    }
}

impl StimulusSet {
    /// Start building a set with the given name
    #[must_use]
    pub fn builder(name: impl Into<String>) -> StimulusSetBuilder {
        StimulusSetBuilder {
            name: name.into(),
            stimuli: Vec::new(),
        }
    }

    /// Build directly from a list of stimuli.
    ///
    /// # Errors
    ///
    /// Fails on an empty name or a duplicate image id.
    pub fn new(name: impl Into<String>, stimuli: Vec<Stimulus>) -> StimulusResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(StimulusError::MissingName);
        }

        let mut index = HashMap::with_capacity(stimuli.len());
        for (position, stimulus) in stimuli.iter().enumerate() {
            if index.insert(stimulus.image_id.clone(), position).is_some() {
                return Err(StimulusError::DuplicateImageId {
                    image_id: stimulus.image_id.clone(),
                    set: name,
                });
            }
        }

        Ok(Self { name, stimuli, index })
    }

    /// Load a set from JSON. Relative stimulus paths resolve against the
    /// directory containing the file.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be read, decoded or validated.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> StimulusResult<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let set: StimulusSet = serde_json::from_reader(std::io::BufReader::new(file))?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        Ok(set.resolved_against(base))
    }

    /// Rebase relative stimulus paths onto `base`
    #[must_use]
    pub fn resolved_against(mut self, base: &Path) -> Self {
        for stimulus in &mut self.stimuli {
            if stimulus.path.is_relative() {
                stimulus.path = base.join(&stimulus.path);
            }
        }
        self
    }

    /// Set name, used to key stored activations
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of stimuli
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.stimuli.len()
    }

    /// True if the set holds no stimuli
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stimuli.is_empty()
    }

    /// Iterate stimuli in set order
    pub fn iter(&self) -> std::slice::Iter<'_, Stimulus> {
        self.stimuli.iter()
    }

    /// Image ids in set order
    pub fn image_ids(&self) -> impl Iterator<Item = &str> {
        self.stimuli.iter().map(|s| s.image_id.as_str())
    }

    /// Position of an image id within the set
    #[must_use]
    pub fn position(&self, image_id: &str) -> Option<usize> {
        self.index.get(image_id).copied()
    }

    /// Look up a stimulus by image id
    #[must_use]
    pub fn get(&self, image_id: &str) -> Option<&Stimulus> {
        self.position(image_id).map(|i| &self.stimuli[i])
    }

    /// Resolve an image id to its path.
    ///
    /// # Errors
    ///
    /// Returns [`StimulusError::UnknownImageId`] if the id is not in the set.
    pub fn image_path(&self, image_id: &str) -> StimulusResult<&Path> {
        self.get(image_id)
            .map(|s| s.path.as_path())
            .ok_or_else(|| StimulusError::UnknownImageId {
                image_id: image_id.to_owned(),
                set: self.name.clone(),
            })
    }

    /// Read the raw content of a stimulus. The file handle lives only for
    /// the duration of this call.
    ///
    /// # Errors
    ///
    /// Fails for unknown ids and unreadable files.
    pub fn read_stimulus(&self, image_id: &str) -> StimulusResult<Vec<u8>> {
        let path = self.image_path(image_id)?;
        let unreadable = |source| StimulusError::Unreadable {
            path: path.to_path_buf(),
            source,
        };

        let mut file = File::open(path).map_err(unreadable)?;
        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes).map_err(unreadable)?;
        Ok(bytes)
    }

    /// Subset of this set in the given order, keeping the name
    ///
    /// # Errors
    ///
    /// Returns [`StimulusError::UnknownImageId`] for ids outside the set.
    pub fn select<'a, I>(&self, image_ids: I) -> StimulusResult<Self>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut stimuli = Vec::new();
        for image_id in image_ids {
            let stimulus = self.get(image_id).ok_or_else(|| StimulusError::UnknownImageId {
                image_id: image_id.to_owned(),
                set: self.name.clone(),
            })?;
            stimuli.push(stimulus.clone());
        }
        Self::new(self.name.clone(), stimuli)
    }
}

impl<'a> IntoIterator for &'a StimulusSet {
    type Item = &'a Stimulus;
    type IntoIter = std::slice::Iter<'a, Stimulus>;

    fn into_iter(self) -> Self::IntoIter {
        self.stimuli.iter()
    }
}

impl TryFrom<StimulusSetRecord> for StimulusSet {
    type Error = StimulusError;

    fn try_from(record: StimulusSetRecord) -> Result<Self, Self::Error> {
        Self::new(record.name, record.stimuli)
    }
}

impl From<StimulusSet> for StimulusSetRecord {
    fn from(set: StimulusSet) -> Self {
        Self {
            name: set.name,
            stimuli: set.stimuli,
        }
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Builder for [`StimulusSet`]
#[derive(Clone, Debug)]
pub struct StimulusSetBuilder {
    name: String,
    stimuli: Vec<Stimulus>,
}

impl StimulusSetBuilder {
    /// Add a stimulus with no attributes
    #[must_use]
    pub fn stimulus(self, image_id: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        self.stimulus_with(image_id, path, BTreeMap::new())
    }

    /// Add a stimulus carrying metadata attributes
    #[must_use]
    pub fn stimulus_with(
        mut self,
        image_id: impl Into<String>,
        path: impl Into<PathBuf>,
        attributes: BTreeMap<String, String>,
    ) -> Self {
        self.stimuli.push(Stimulus {
            image_id: image_id.into(),
            path: path.into(),
            attributes,
        });
        self
    }

    /// Validate and build the set.
    ///
    /// # Errors
    ///
    /// Fails on an empty name or a duplicate image id.
    pub fn build(self) -> StimulusResult<StimulusSet> {
        StimulusSet::new(self.name, self.stimuli)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_builder_requires_name() {
        let result = StimulusSet::builder("").stimulus("a", "a.jpg").build();
        assert!(matches!(result, Err(StimulusError::MissingName)));
    }

    #[test]
    fn test_duplicate_image_id() {
        let result = StimulusSet::builder("set")
            .stimulus("a", "a.jpg")
            .stimulus("a", "b.jpg")
            .build();
        assert!(matches!(result, Err(StimulusError::DuplicateImageId { .. })));
    }

    #[test]
    fn test_lookup_and_order() {
        let set = StimulusSet::builder("set")
            .stimulus("b", "b.jpg")
            .stimulus("a", "a.jpg")
            .build()
            .unwrap();

        assert_eq!(set.image_ids().collect::<Vec<_>>(), vec!["b", "a"]);
        assert_eq!(set.position("a"), Some(1));
        assert_eq!(set.image_path("b").unwrap(), Path::new("b.jpg"));
        assert!(matches!(set.image_path("c"), Err(StimulusError::UnknownImageId { .. })));
    }

    #[test]
    fn test_read_stimulus() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rgb1.jpg");
        std::fs::File::create(&path).unwrap().write_all(&[1, 2, 3]).unwrap();

        let set = StimulusSet::builder("set").stimulus("test", &path).build().unwrap();
        assert_eq!(set.read_stimulus("test").unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn test_read_missing_file() {
        let set = StimulusSet::builder("set")
            .stimulus("test", "/nonexistent/cortexmap/stimulus.jpg")
            .build()
            .unwrap();
        assert!(matches!(set.read_stimulus("test"), Err(StimulusError::Unreadable { .. })));
    }

    #[test]
    fn test_json_roundtrip_validates() {
        let json = r#"{"name":"s","stimuli":[{"image_id":"x","path":"x.png"},{"image_id":"x","path":"y.png"}]}"#;
        assert!(serde_json::from_str::<StimulusSet>(json).is_err());
    }

    #[test]
    fn test_from_json_file_resolves_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stimuli.json");
        std::fs::write(
            &path,
            r#"{"name":"s","stimuli":[{"image_id":"x","path":"x.png","attributes":{"category_name":"faces"}}]}"#,
        )
        .unwrap();

        let set = StimulusSet::from_json_file(&path).unwrap();
        assert_eq!(set.image_path("x").unwrap(), dir.path().join("x.png"));
        assert_eq!(set.get("x").unwrap().attribute("category_name"), Some("faces"));
    }

    #[test]
    fn test_from_json_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        let missing = StimulusSet::from_json_file(dir.path().join("absent.json"));
        assert!(matches!(missing, Err(StimulusError::Io(_))));

        let path = dir.path().join("broken.json");
        std::fs::write(&path, r#"{"name":"s","stimuli":[{"image_id":"x"}"#).unwrap();
        assert!(matches!(StimulusSet::from_json_file(&path), Err(StimulusError::Decode(_))));
    }
}
