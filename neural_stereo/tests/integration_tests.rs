//! End-to-end integration tests.

use burn::backend::{Autodiff, NdArray};
use burn::module::AutodiffModule;
use burn::optim::Optimizer;
use burn::prelude::*;

use neural_stereo::{
    config::{ModelVariant, ShallowStereoNetConfig, TrainingConfig},
    data::{BatchLoader, StereoBatch, SyntheticStereoDataset},
    metrics::{tags, MemorySink},
    nn::{DisparityModel, ShallowStereoNet},
    training::{
        load_metadata, load_model_params, run_training, CheckpointManager, StereoTrainer,
        BEST_DIR, METADATA_FILE,
    },
};
use stereo_core::{BestScoreTracker, SavePolicy, StepCounters};

type TestBackend = Autodiff<NdArray>;
type Model = ShallowStereoNet<TestBackend>;

const HEIGHT: usize = 4;
const WIDTH: usize = 8;

fn make_test_config() -> TrainingConfig {
    TrainingConfig::new(HEIGHT, WIDTH)
        .with_max_disp(16)
        .with_model(ModelVariant::Shallow)
        .with_learning_rate(0.05)
        .with_epochs(2)
}

fn make_model(config: &TrainingConfig) -> Model {
    let device = Default::default();
    ShallowStereoNet::new(&ShallowStereoNetConfig::new(config.max_disp), &device)
}

fn make_trainer(
    config: TrainingConfig,
) -> StereoTrainer<TestBackend, Model, impl Optimizer<Model, TestBackend>> {
    let model = make_model(&config);
    let optimizer = config.optimizer().init::<TestBackend, Model>();
    StereoTrainer::new(model, optimizer, config, Default::default()).unwrap()
}

/// Finest prediction of the evaluation model on a fixed input.
fn finest_output(model: &Model) -> Vec<f32> {
    let device = Default::default();
    let inner = model.valid();
    let left = Tensor::<NdArray, 4>::ones([1, 3, HEIGHT, WIDTH], &device);
    let right = Tensor::<NdArray, 4>::zeros([1, 3, HEIGHT, WIDTH], &device);
    inner
        .forward(left, right)
        .finest()
        .unwrap()
        .to_data()
        .to_vec()
        .unwrap()
}

fn max_abs_diff(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y).abs())
        .fold(0.0, f32::max)
}

#[test]
fn test_invalid_batch_leaves_state_untouched() {
    let mut trainer = make_trainer(make_test_config());
    let invalid = SyntheticStereoDataset::new(1, HEIGHT, WIDTH).with_invalid_indices([0]);
    let loader = BatchLoader::test(invalid, 1, 1, 0).unwrap();
    let batch = loader
        .load_batch::<TestBackend>(0, 1, trainer.device())
        .unwrap();
    let mut sink = MemorySink::new();
    let before = finest_output(trainer.model());

    let out = trainer.train_step(&batch, &mut sink).unwrap();

    assert!(out.is_none());
    assert_eq!(finest_output(trainer.model()), before);
    assert_eq!(trainer.optimizer_steps(), 0);
    assert_eq!(trainer.counters(), StepCounters::new());
    assert!(sink.records().is_empty());

    // A valid batch does move the parameters.
    let valid = BatchLoader::test(SyntheticStereoDataset::new(1, HEIGHT, WIDTH), 1, 1, 0).unwrap();
    let batch = valid
        .load_batch::<TestBackend>(0, 1, trainer.device())
        .unwrap();
    assert!(trainer.train_step(&batch, &mut sink).unwrap().is_some());
    assert!(max_abs_diff(&finest_output(trainer.model()), &before) > 0.0);
    assert_eq!(trainer.optimizer_steps(), 1);
}

#[test]
fn test_nan_loss_still_applies_step() {
    let mut trainer = make_trainer(make_test_config());
    let device = trainer.device().clone();
    let batch = StereoBatch::<TestBackend> {
        left: Tensor::full([1, 3, HEIGHT, WIDTH], f32::NAN, &device),
        right: Tensor::zeros([1, 3, HEIGHT, WIDTH], &device),
        target: Tensor::full([1, HEIGHT, WIDTH], 4.0, &device),
    };
    let mut sink = MemorySink::new();

    let out = trainer.train_step(&batch, &mut sink).unwrap().unwrap();

    assert!(out.loss.is_nan());
    assert!(out.is_nan());
    assert_eq!(out.step, 1);
    assert_eq!(trainer.optimizer_steps(), 1);
    assert_eq!(trainer.counters().train(), 1);
    let losses = sink.series(tags::TRAIN_LOSS);
    assert_eq!(losses.len(), 1);
    assert_eq!(losses[0].0, 1);
    assert!(losses[0].1.is_nan());
}

#[test]
fn test_epoch_average_over_valid_batches_only() {
    let mut trainer = make_trainer(make_test_config());
    let dataset = SyntheticStereoDataset::new(2, HEIGHT, WIDTH).with_invalid_indices([1]);
    let train_loader = BatchLoader::training(dataset.clone(), 1, 2, 42).unwrap();
    let val_loader = BatchLoader::test(dataset, 1, 1, 42).unwrap();
    let mut sink = MemorySink::new();

    let train = trainer.train_epoch(1, &train_loader, &mut sink).unwrap();
    assert_eq!(train.batches, 2);
    assert_eq!(train.valid_iterations(), 1);
    let averages = train.averages.unwrap();
    let losses = sink.series(tags::TRAIN_LOSS);
    assert_eq!(losses.len(), 1);
    assert!((averages.loss - losses[0].1).abs() < 1e-9);

    let val = trainer.validate(1, &val_loader, &mut sink).unwrap();
    assert_eq!(val.batches, 2);
    assert_eq!(val.averages.unwrap().iterations, 1);
    assert_eq!(trainer.counters().train(), 1);
    assert_eq!(trainer.counters().val(), 1);
    assert_eq!(sink.series(tags::TRAIN_EPOCH_EPE).len(), 1);
}

#[test]
fn test_all_invalid_epoch_has_no_averages() {
    let mut trainer = make_trainer(make_test_config());
    let dataset = SyntheticStereoDataset::new(2, HEIGHT, WIDTH).with_invalid_indices([0, 1]);
    let loader = BatchLoader::test(dataset, 1, 1, 0).unwrap();
    let mut sink = MemorySink::new();

    let train = trainer.train_epoch(1, &loader, &mut sink).unwrap();
    let val = trainer.validate(1, &loader, &mut sink).unwrap();

    assert!(train.averages.is_none());
    assert!(val.averages.is_none());
    assert_eq!(val.score(), None);
    assert!(sink.records().is_empty());
}

#[test]
fn test_checkpoint_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let config = make_test_config();
    let mut trainer = make_trainer(config.clone());
    let loader = BatchLoader::test(SyntheticStereoDataset::new(1, HEIGHT, WIDTH), 1, 1, 0).unwrap();
    let mut sink = MemorySink::new();
    trainer.train_epoch(1, &loader, &mut sink).unwrap();

    let manager = CheckpointManager::new(dir.path()).unwrap();
    let metadata = trainer.checkpoint_metadata(1, Some(0.5));
    let snapshot = manager
        .save::<TestBackend, _, _>(trainer.model(), trainer.optimizer(), &metadata, false)
        .unwrap();

    assert_eq!(snapshot, dir.path().join("epoch_1"));
    assert!(snapshot.join("model.mpk").is_file());
    assert!(snapshot.join("optimizer.mpk").is_file());
    assert_eq!(load_metadata(&snapshot).unwrap(), metadata);
    assert!(!dir.path().join(BEST_DIR).exists());

    let steps_before = trainer.optimizer_steps();
    let fresh = make_model(&config);
    let restored =
        load_model_params::<TestBackend, _>(fresh, &snapshot, &Default::default()).unwrap();

    assert!(max_abs_diff(&finest_output(&restored), &finest_output(trainer.model())) < 1e-6);
    assert_eq!(trainer.optimizer_steps(), steps_before);

    // The record file path works as well, with or without extension.
    let by_file = load_model_params::<TestBackend, _>(
        make_model(&config),
        &snapshot.join("model"),
        &Default::default(),
    )
    .unwrap();
    assert!(max_abs_diff(&finest_output(&by_file), &finest_output(trainer.model())) < 1e-6);
}

#[test]
fn test_missing_resume_path_is_not_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let config = make_test_config();
    let model = make_model(&config);
    let before = finest_output(&model);

    let missing = dir.path().join("nope.mpk");
    let model = load_model_params::<TestBackend, _>(model, &missing, &Default::default()).unwrap();
    assert_eq!(finest_output(&model), before);
}

#[test]
fn test_save_policy_file_layout() {
    let dir = tempfile::tempdir().unwrap();
    let trainer = make_trainer(make_test_config());
    let manager = CheckpointManager::new(dir.path()).unwrap();
    let policy = SavePolicy::default();
    let mut best = BestScoreTracker::new();
    best.observe(Some(0.3));

    // Epoch 7 improves: epoch snapshot plus best.
    let is_best = best.observe(Some(0.2));
    assert!(is_best && policy.should_save(7, is_best));
    let metadata = trainer.checkpoint_metadata(7, Some(0.2));
    manager
        .save::<TestBackend, _, _>(trainer.model(), trainer.optimizer(), &metadata, is_best)
        .unwrap();
    assert!(manager.epoch_dir(7).join(METADATA_FILE).is_file());
    assert_eq!(load_metadata(&manager.best_dir()).unwrap().epoch, 7);

    // Epoch 10 does not improve but falls on the interval.
    let is_best = best.observe(Some(0.25));
    assert!(!is_best && policy.should_save(10, is_best));
    let metadata = trainer.checkpoint_metadata(10, Some(0.25));
    manager
        .save::<TestBackend, _, _>(trainer.model(), trainer.optimizer(), &metadata, is_best)
        .unwrap();
    assert!(manager.epoch_dir(10).join("model.mpk").is_file());
    assert_eq!(load_metadata(&manager.best_dir()).unwrap().epoch, 7);

    // Epoch 8 neither improves nor falls on the interval.
    assert!(!policy.should_save(8, best.observe(Some(0.9))));
}

#[test]
fn test_run_training_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let mut trainer = make_trainer(make_test_config().with_lr_decay_epoch(1));
    let train_loader =
        BatchLoader::training(SyntheticStereoDataset::new(3, HEIGHT, WIDTH), 2, 2, 7).unwrap();
    let val_loader =
        BatchLoader::test(SyntheticStereoDataset::new(2, HEIGHT, WIDTH), 1, 1, 7).unwrap();
    let manager = CheckpointManager::new(dir.path()).unwrap();
    let mut sink = MemorySink::new();

    let summary = run_training(&mut trainer, &train_loader, &val_loader, &manager, &mut sink)
        .unwrap();

    assert_eq!(summary.epochs.len(), 2);
    assert_eq!(summary.epochs[0].learning_rate, 0.05);
    assert!((summary.epochs[1].learning_rate - 0.005).abs() < 1e-12);

    // The first scored epoch is always a new best.
    let first = &summary.epochs[0];
    assert!(first.is_best && first.saved);
    assert!(manager.best_dir().join("model.mpk").is_file());
    for report in &summary.epochs {
        assert_eq!(report.saved, manager.epoch_dir(report.epoch).is_dir());
        assert_eq!(report.train.valid_iterations(), 1);
    }

    // One applied step per epoch (3 samples, batch 2, last partial dropped).
    assert_eq!(trainer.optimizer_steps(), 2);
    assert_eq!(trainer.counters().train(), 2);
    assert_eq!(trainer.counters().val(), 4);
    assert_eq!(
        sink.series(tags::VALIDATION_EPOCH_3PX)
            .iter()
            .map(|&(step, _)| step)
            .collect::<Vec<_>>(),
        vec![1, 2]
    );
    assert!(summary.best_score.is_some());
}
