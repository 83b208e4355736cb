//! End-to-end layer selection and region commitment
//!
//! Each case builds a model, commits a region, starts recording and checks
//! that the prediction table reports exactly the expected regions and layers.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs;
use std::path::Path;

use cortexmap_core::{
    CommitmentError, LayerId, Neuroid, NeuroidAssembly, Presentation, RegionId, StimulusSet, TimeWindow,
};
use cortexmap_native::activations::LayerActivations;
use cortexmap_native::error::ActivationResult;
use cortexmap_native::{
    ActivationMatrix, ActivationSource, CommitmentConfig, FixedScores, LayerMappedModel, ModelCommitment,
    RecordingModel, RegionCommitmentStrategy, ScorerConfig, SequentialNetwork,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tempfile::TempDir;

// ============================================================================
// Fixtures
// ============================================================================

/// Write `count` small stimulus files and return their set
fn write_stimuli(dir: &Path, name: &str, count: usize) -> StimulusSet {
    let mut builder = StimulusSet::builder(name);
    for i in 0..count {
        let path = dir.join(format!("img{i}.bin"));
        #[allow(clippy::cast_possible_truncation)]
        let bytes: Vec<u8> = (0..512).map(|b| ((b * (i + 3) + i * 17) % 256) as u8).collect();
        fs::write(&path, bytes).unwrap();

        let category = if i % 2 == 0 { "faces" } else { "cars" };
        let attrs = BTreeMap::from([("category_name".to_owned(), category.to_owned())]);
        builder = builder.stimulus_with(format!("img{i}"), path, attrs);
    }
    builder.build().unwrap()
}

/// Assembly over `stimuli` with one neuroid per `(region, response)` pair
fn assembly(stimuli: &StimulusSet, neuroids: &[(&str, fn(usize) -> f64)]) -> NeuroidAssembly {
    let presentations: Vec<Presentation> = stimuli
        .image_ids()
        .map(|id| Presentation {
            image_id: id.to_owned(),
            repetition: 0,
        })
        .collect();

    let mut values = Vec::with_capacity(presentations.len() * neuroids.len());
    for p in 0..presentations.len() {
        for (_, response) in neuroids {
            values.push(response(p));
        }
    }

    NeuroidAssembly::new(
        stimuli.clone(),
        presentations,
        neuroids
            .iter()
            .enumerate()
            .map(|(i, (region, _))| Neuroid {
                neuroid_id: format!("n{i}"),
                region: RegionId::from(*region),
            })
            .collect(),
        vec![TimeWindow::new(70.0, 170.0).unwrap()],
        values,
    )
    .unwrap()
}

#[allow(clippy::cast_precision_loss)]
fn wave(i: usize) -> f64 {
    (i as f64 * 0.9).sin()
}

fn layers(names: &[&str]) -> BTreeSet<LayerId> {
    names.iter().copied().map(LayerId::from).collect()
}

fn regions(names: &[&str]) -> BTreeSet<RegionId> {
    names.iter().copied().map(RegionId::from).collect()
}

/// Source with an informative `relu2` and a constant `linear`
struct ProbeSource {
    layers: Vec<LayerId>,
}

impl ProbeSource {
    fn new() -> Self {
        Self {
            layers: vec![LayerId::from("linear"), LayerId::from("relu2")],
        }
    }
}

impl ActivationSource for ProbeSource {
    fn identifier(&self) -> &str {
        "probe"
    }

    fn layers(&self) -> &[LayerId] {
        &self.layers
    }

    fn activations(&self, stimuli: &StimulusSet, layers: &[LayerId]) -> ActivationResult<LayerActivations> {
        let ids: Vec<String> = stimuli.image_ids().map(str::to_owned).collect();
        let mut result = HashMap::new();
        for layer in layers {
            let data: Vec<f64> = match layer.as_str() {
                "relu2" => ids
                    .iter()
                    .map(|id| wave(id.trim_start_matches("img").parse().unwrap_or(0)))
                    .collect(),
                _ => vec![1.0; ids.len()],
            };
            result.insert(layer.clone(), ActivationMatrix::new(layer, ids.clone(), 1, data)?);
        }
        Ok(result)
    }
}

/// Source with a one-unit `signal` layer following `wave` and a wide `noise`
/// layer of random features drawn per image
struct ImageIdentitySource {
    layers: Vec<LayerId>,
}

impl ImageIdentitySource {
    const NOISE_UNITS: usize = 64;

    fn new() -> Self {
        Self {
            layers: vec![LayerId::from("signal"), LayerId::from("noise")],
        }
    }
}

impl ActivationSource for ImageIdentitySource {
    fn identifier(&self) -> &str {
        "image-identity"
    }

    fn layers(&self) -> &[LayerId] {
        &self.layers
    }

    fn activations(&self, stimuli: &StimulusSet, layers: &[LayerId]) -> ActivationResult<LayerActivations> {
        let ids: Vec<String> = stimuli.image_ids().map(str::to_owned).collect();
        let index = |id: &str| id.trim_start_matches("img").parse::<usize>().unwrap_or(0);

        let mut result = HashMap::new();
        for layer in layers {
            let matrix = if layer.as_str() == "signal" {
                let data = ids.iter().map(|id| wave(index(id))).collect();
                ActivationMatrix::new(layer, ids.clone(), 1, data)?
            } else {
                let mut data = Vec::with_capacity(ids.len() * Self::NOISE_UNITS);
                for id in &ids {
                    let mut rng = StdRng::seed_from_u64(index(id) as u64);
                    data.extend((0..Self::NOISE_UNITS).map(|_| rng.gen_range(-1.0..1.0)));
                }
                ActivationMatrix::new(layer, ids.clone(), Self::NOISE_UNITS, data)?
            };
            result.insert(layer.clone(), matrix);
        }
        Ok(result)
    }
}

/// IT assembly with `repetitions` presentations per image. Each image's
/// response is `wave` plus a stable per-image offset; repetitions add a
/// shift that cancels on average.
fn repeated_assembly(stimuli: &StimulusSet, repetitions: u32) -> NeuroidAssembly {
    let images = stimuli.len();
    let offsets: Vec<f64> = (0..images)
        .map(|i| StdRng::seed_from_u64(1_000 + i as u64).gen_range(-1.0..1.0) * 0.5)
        .collect();

    let mut presentations = Vec::new();
    let mut values = Vec::new();
    for repetition in 0..repetitions {
        let shift = (f64::from(repetition) - f64::from(repetitions - 1) / 2.0) * 0.05;
        for (i, id) in stimuli.image_ids().enumerate() {
            presentations.push(Presentation {
                image_id: id.to_owned(),
                repetition,
            });
            values.push(wave(i) + offsets[i] + shift);
        }
    }

    NeuroidAssembly::new(
        stimuli.clone(),
        presentations,
        vec![Neuroid {
            neuroid_id: "n0".to_owned(),
            region: RegionId::from("IT"),
        }],
        vec![TimeWindow::new(70.0, 170.0).unwrap()],
        values,
    )
    .unwrap()
}

// ============================================================================
// Direct commitment
// ============================================================================

#[test]
fn test_direct_commitment_reports_committed_layers() {
    let dir = TempDir::new().unwrap();
    let stimuli = write_stimuli(dir.path(), "single", 1);

    // (committed layers, region, expected layers)
    let cases: &[(&[&str], &str, &[&str])] = &[
        (&["linear", "relu2"], "IT", &["linear", "relu2"]),
        (&["relu2"], "IT", &["relu2"]),
        (&["conv1"], "V1", &["conv1"]),
    ];

    for (committed, region, expected) in cases {
        let mut model = LayerMappedModel::from_source(SequentialNetwork::custom(0).unwrap());
        model.commit(*region, committed.to_vec()).unwrap();
        model.start_recording(*region).unwrap();

        let table = model.look_at(&stimuli).unwrap();
        assert_eq!(table.regions(), regions(&[*region]), "case {committed:?}");
        assert_eq!(table.layers(), layers(expected), "case {committed:?}");
        assert_eq!(table.image_ids(), BTreeSet::from(["img0"]));
        assert_eq!(table.stimulus_set, "single");
    }
}

#[test]
fn test_direct_rows_carry_layer_width() {
    let dir = TempDir::new().unwrap();
    let stimuli = write_stimuli(dir.path(), "pair", 2);
    let network = SequentialNetwork::custom(0).unwrap();
    let width = network.width(&LayerId::from("relu2")).unwrap();

    let mut model = LayerMappedModel::from_source(network);
    model.commit("IT", "relu2").unwrap();
    model.start_recording("IT").unwrap();

    let table = model.look_at(&stimuli).unwrap();
    assert_eq!(table.len(), 2);
    assert!(table.rows().iter().all(|r| r.values.len() == width));
    assert!(table.rows().iter().all(|r| r.values.iter().all(|v| *v >= 0.0)));
}

#[test]
fn test_uncommitted_region() {
    let mut model = LayerMappedModel::from_source(SequentialNetwork::custom(0).unwrap());
    model.commit("IT", "relu2").unwrap();

    assert_eq!(
        model.start_recording("V4"),
        Err(CommitmentError::UncommittedRegion {
            region: RegionId::from("V4")
        })
    );
}

#[test]
fn test_recording_idempotent_and_recommit_overwrites() {
    let dir = TempDir::new().unwrap();
    let stimuli = write_stimuli(dir.path(), "single", 1);

    let mut model = LayerMappedModel::from_source(SequentialNetwork::custom(0).unwrap());
    model.commit("IT", ["linear", "relu2"]).unwrap();
    model.start_recording("IT").unwrap();
    let before = model.recording().clone();
    model.start_recording("IT").unwrap();
    assert_eq!(model.recording(), &before);

    model.commit("IT", "relu2").unwrap();
    let table = model.look_at(&stimuli).unwrap();
    assert_eq!(table.layers(), layers(&["relu2"]));
}

#[test]
fn test_multiple_regions_report_union_of_commitments() {
    let dir = TempDir::new().unwrap();
    let stimuli = write_stimuli(dir.path(), "pair", 2);

    let mut model = LayerMappedModel::from_source(SequentialNetwork::custom(0).unwrap());
    model.commit("IT", "relu2").unwrap();
    model.commit("V4", ["conv1", "relu2"]).unwrap();
    model.commit("V1", "conv1").unwrap();
    model.start_recording("IT").unwrap();
    model.start_recording("V4").unwrap();

    let table = model.look_at(&stimuli).unwrap();
    assert_eq!(table.regions(), regions(&["IT", "V4"]));
    assert_eq!(table.layers(), layers(&["conv1", "relu2"]));
    assert_eq!(table.len(), 2 + 2 * 2);

    let layers_of = |region: &str| -> BTreeSet<LayerId> {
        table
            .rows()
            .iter()
            .filter(|r| r.region.as_str() == region)
            .map(|r| r.layer.clone())
            .collect()
    };
    assert_eq!(layers_of("IT"), layers(&["relu2"]));
    assert_eq!(layers_of("V4"), layers(&["conv1", "relu2"]));

    // A layer shared by two regions reports the same responses for both
    let responses = |region: &str| -> Vec<Vec<f64>> {
        table
            .rows()
            .iter()
            .filter(|r| r.region.as_str() == region && r.layer.as_str() == "relu2")
            .map(|r| r.values.clone())
            .collect()
    };
    assert_eq!(responses("IT"), responses("V4"));
}

// ============================================================================
// Fitted commitment
// ============================================================================

#[test]
fn test_fitted_commitment_selects_best_layer() {
    let dir = TempDir::new().unwrap();
    let stimuli = write_stimuli(dir.path(), "reference", 12);
    let reference = assembly(&stimuli, &[("IT", wave), ("IT", |i| wave(i) * 2.0)]);
    let probe = stimuli.select(["img0"]).unwrap();

    // (scores, candidate order, expected layer)
    let cases: &[(&[(&str, f64)], &[&str], &str)] = &[
        (&[("linear", 0.3), ("relu2", 0.7)], &["linear", "relu2"], "relu2"),
        (&[("linear", 0.7), ("relu2", 0.3)], &["linear", "relu2"], "linear"),
        (&[("linear", 0.5), ("relu2", 0.5)], &["linear", "relu2"], "linear"),
        (&[("linear", 0.5), ("relu2", 0.5)], &["relu2", "linear"], "relu2"),
    ];

    for (scores, candidates, expected) in cases {
        let mut model = ModelCommitment::with_scorer(
            "custom",
            SequentialNetwork::custom(0).unwrap(),
            *candidates,
            FixedScores::new(scores.iter().copied()),
            CommitmentConfig::default(),
        )
        .unwrap();

        let selection = model.commit_region("IT", &reference, "category_name").unwrap();
        assert_eq!(selection.selected.as_str(), *expected, "case {scores:?} {candidates:?}");

        model.start_recording("IT", &[(70.0, 170.0)]).unwrap();
        let table = model.look_at(&probe).unwrap();
        assert_eq!(table.regions(), regions(&["IT"]));
        assert_eq!(table.layers(), layers(&[*expected]));
        assert!(table
            .rows()
            .iter()
            .all(|r| r.time_window == Some(TimeWindow::new(70.0, 170.0).unwrap())));
    }
}

#[test]
fn test_ridge_scorer_prefers_informative_layer() {
    let dir = TempDir::new().unwrap();
    let stimuli = write_stimuli(dir.path(), "reference", 24);
    let reference = assembly(&stimuli, &[("IT", wave), ("IT", |i| 1.0 - wave(i)), ("V4", |_| 0.0)]);

    let config = CommitmentConfig {
        scorer: ScorerConfig {
            folds: 4,
            ridge_alpha: 0.01,
            ..ScorerConfig::default()
        },
        ..CommitmentConfig::default()
    };
    let strategy = RegionCommitmentStrategy::fitted(["linear", "relu2"], &config);
    let mut model = RecordingModel::new("probe", ProbeSource::new(), strategy, config).unwrap();

    let selection = model.commit_region("IT", &reference, "category_name").unwrap();
    assert_eq!(selection.selected.as_str(), "relu2");
    assert!(selection.selected_score().unwrap() > 0.9);

    model.start_recording("IT", &[]).unwrap();
    let table = model.look_at(&stimuli).unwrap();
    assert_eq!(table.layers(), layers(&["relu2"]));
    assert_eq!(table.len(), 24);
}

#[test]
fn test_repeated_presentations_do_not_favour_image_identity() {
    let dir = TempDir::new().unwrap();
    let stimuli = write_stimuli(dir.path(), "reference", 24);

    let config = CommitmentConfig {
        scorer: ScorerConfig {
            folds: 4,
            ridge_alpha: 0.01,
            ..ScorerConfig::default()
        },
        ..CommitmentConfig::default()
    };

    for repetitions in [1, 4] {
        let reference = repeated_assembly(&stimuli, repetitions);
        let strategy = RegionCommitmentStrategy::fitted(["noise", "signal"], &config);
        let mut model =
            RecordingModel::new("identity", ImageIdentitySource::new(), strategy, config.clone()).unwrap();

        let selection = model.commit_region("IT", &reference, "category_name").unwrap();
        assert_eq!(selection.selected.as_str(), "signal", "repetitions {repetitions}");
        assert!(selection.selected_score().unwrap() > 0.5, "repetitions {repetitions}");
    }
}

#[test]
fn test_fitted_errors() {
    let dir = TempDir::new().unwrap();
    let stimuli = write_stimuli(dir.path(), "reference", 8);
    let reference = assembly(&stimuli, &[("IT", wave)]);

    let mut model = ModelCommitment::with_scorer(
        "custom",
        SequentialNetwork::custom(0).unwrap(),
        Vec::<&str>::new(),
        FixedScores::default(),
        CommitmentConfig::default(),
    )
    .unwrap();
    let err = model.commit_region("IT", &reference, "category_name").unwrap_err();
    assert_eq!(err.as_commitment(), Some(&CommitmentError::NoLayersAvailable));

    let mut model = ModelCommitment::with_scorer(
        "custom",
        SequentialNetwork::custom(0).unwrap(),
        "relu2",
        FixedScores::new([("relu2", 1.0)]),
        CommitmentConfig::default(),
    )
    .unwrap();
    let err = model.commit_region("V4", &reference, "category_name").unwrap_err();
    assert_eq!(
        err.as_commitment(),
        Some(&CommitmentError::EmptyAssembly {
            region: RegionId::from("V4")
        })
    );

    model.commit_region("IT", &reference, "category_name").unwrap();
    assert!(matches!(
        model.start_recording("IT", &[(170.0, 70.0)]),
        Err(CommitmentError::InvalidWindow { .. })
    ));
}
