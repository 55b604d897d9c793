//! Train a stereo disparity network.
//!
//! ```text
//! train --crop_height 240 --crop_width 528 --model GANet_deep \
//!       --data_path /data/sceneflow/ --training_list lists/train.list \
//!       --val_list lists/val.list --save_path checkpoint/ --cuda 0
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use burn::config::Config;
use burn::module::AutodiffModule;
use burn::tensor::backend::AutodiffBackend;
use clap::Parser;

use neural_stereo::config::{
    DatasetFlags, DeepStereoNetConfig, ModelVariant, ShallowStereoNetConfig, TrainingConfig,
};
use neural_stereo::data::{get_test_set, get_training_set, BatchLoader, ListDataset};
use neural_stereo::metrics::CsvScalarWriter;
use neural_stereo::nn::{DeepStereoNet, DisparityModel, ShallowStereoNet};
use neural_stereo::training::{load_model_params, run_training, CheckpointManager, StereoTrainer};

/// Command-line options. Boolean-like options take `0` or `1`.
#[derive(Parser, Debug)]
#[command(name = "train", about = "Train a stereo disparity network")]
struct Args {
    /// Crop height.
    #[arg(long = "crop_height")]
    crop_height: usize,

    /// Crop width.
    #[arg(long = "crop_width")]
    crop_width: usize,

    /// Maximum disparity.
    #[arg(long = "max_disp", default_value_t = 192)]
    max_disp: usize,

    /// Resume from a saved snapshot directory or model record.
    #[arg(long, default_value = "")]
    resume: String,

    /// Use the right view for training.
    #[arg(long = "left_right", default_value_t = 0)]
    left_right: u8,

    /// Training batch size.
    #[arg(long = "batchSize", default_value_t = 1)]
    batch_size: usize,

    /// Validation batch size.
    #[arg(long = "testBatchSize", default_value_t = 1)]
    test_batch_size: usize,

    /// Number of epochs to train for.
    #[arg(long = "nEpochs", default_value_t = 100)]
    epochs: usize,

    /// Learning rate.
    #[arg(long, default_value_t = 0.001)]
    lr: f64,

    /// Use the GPU backend.
    #[arg(long, default_value_t = 1)]
    cuda: u8,

    /// Number of data loader threads.
    #[arg(long, default_value_t = 1)]
    threads: usize,

    /// Random seed.
    #[arg(long, default_value_t = 123)]
    seed: u64,

    /// Random shift of the right crop window.
    #[arg(long, default_value_t = 0)]
    shift: usize,

    /// Data root.
    #[arg(long = "data_path", default_value = "/ssd1/zhangfeihu/data/stereo/")]
    data_path: PathBuf,

    /// Training list.
    #[arg(long = "training_list", default_value = "./lists/sceneflow_train.list")]
    training_list: PathBuf,

    /// Validation list.
    #[arg(long = "val_list", default_value = "./lists/sceneflow_test_select.list")]
    val_list: PathBuf,

    /// Location to save snapshots.
    #[arg(long = "save_path", default_value = "./checkpoint/")]
    save_path: PathBuf,

    /// Model to train (GANet11 or GANet_deep).
    #[arg(long, default_value = "GANet_deep")]
    model: String,

    /// Experiment name; scalars go to `logs/<experiment>/`.
    #[arg(long, default_value = "default")]
    experiment: String,

    /// KITTI 2012 dataset.
    #[arg(long, default_value_t = 0)]
    kitti: u8,

    /// KITTI 2015 dataset.
    #[arg(long, default_value_t = 0)]
    kitti2015: u8,

    /// Satellite dataset.
    #[arg(long, default_value_t = 0)]
    satellite: u8,
}

impl Args {
    fn training_config(&self, model: ModelVariant) -> TrainingConfig {
        TrainingConfig::new(self.crop_height, self.crop_width)
            .with_max_disp(self.max_disp)
            .with_batch_size(self.batch_size)
            .with_test_batch_size(self.test_batch_size)
            .with_epochs(self.epochs)
            .with_learning_rate(self.lr)
            .with_seed(self.seed)
            .with_shift(self.shift)
            .with_left_right(self.left_right != 0)
            .with_threads(self.threads)
            .with_model(model)
            .with_dataset(DatasetFlags {
                kitti: self.kitti != 0,
                kitti2015: self.kitti2015 != 0,
                satellite: self.satellite != 0,
            })
    }

    fn resume_path(&self) -> Option<&Path> {
        (!self.resume.is_empty()).then(|| Path::new(&self.resume))
    }
}

/// Everything a run needs besides the model.
struct Run {
    config: TrainingConfig,
    train_loader: BatchLoader<ListDataset>,
    val_loader: BatchLoader<ListDataset>,
    checkpoints: CheckpointManager,
    sink: CsvScalarWriter,
    resume: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    log::info!("{:?}", args);

    let model: ModelVariant = args.model.parse()?;
    let config = args.training_config(model);
    config.validate()?;

    if args.cuda != 0 {
        run_accelerated(&args, config)
    } else {
        run_cpu(&args, config)
    }
}

#[cfg(feature = "wgpu")]
fn run_accelerated(args: &Args, config: TrainingConfig) -> anyhow::Result<()> {
    use burn::backend::wgpu::{Wgpu, WgpuDevice};
    type Accel = burn::backend::Autodiff<Wgpu>;

    launch::<Accel>(args, config, WgpuDevice::default())
}

#[cfg(not(feature = "wgpu"))]
fn run_accelerated(_args: &Args, _config: TrainingConfig) -> anyhow::Result<()> {
    Err(neural_stereo::NeuralStereoError::AcceleratorUnavailable.into())
}

#[cfg(feature = "ndarray")]
fn run_cpu(args: &Args, config: TrainingConfig) -> anyhow::Result<()> {
    use burn::backend::ndarray::{NdArray, NdArrayDevice};
    type Cpu = burn::backend::Autodiff<NdArray>;

    launch::<Cpu>(args, config, NdArrayDevice::Cpu)
}

#[cfg(not(feature = "ndarray"))]
fn run_cpu(_args: &Args, _config: TrainingConfig) -> anyhow::Result<()> {
    Err(neural_stereo::NeuralStereoError::invalid_config("built without the ndarray CPU backend").into())
}

fn launch<B: AutodiffBackend>(
    args: &Args,
    config: TrainingConfig,
    device: B::Device,
) -> anyhow::Result<()> {
    B::seed(&device, config.seed);

    fs::create_dir_all(&args.save_path)
        .with_context(|| format!("creating {}", args.save_path.display()))?;
    let config_path = args.save_path.join("config.json");
    config
        .save(&config_path)
        .with_context(|| format!("writing {}", config_path.display()))?;
    log::info!("Configuration: {}", config);

    log::info!("===> Loading datasets");
    let train_set = get_training_set(
        &args.data_path,
        &args.training_list,
        config.crop_shape(),
        config.left_right,
        config.dataset,
        config.shift,
    )?;
    let test_set = get_test_set(
        &args.data_path,
        &args.val_list,
        config.crop_shape(),
        config.left_right,
        config.dataset,
    )?;
    log::info!(
        "{} training samples, {} validation samples",
        train_set.entries().len(),
        test_set.entries().len()
    );

    let run = Run {
        train_loader: BatchLoader::training(
            train_set,
            config.batch_size,
            config.threads,
            config.seed,
        )?,
        val_loader: BatchLoader::test(test_set, config.test_batch_size, config.threads, config.seed)?,
        checkpoints: CheckpointManager::new(&args.save_path)?,
        sink: CsvScalarWriter::for_experiment("logs", &args.experiment)?,
        resume: args.resume_path().map(Path::to_path_buf),
        config,
    };

    log::info!("===> Building model {}", run.config.model);
    match run.config.model {
        ModelVariant::Shallow => {
            let net = ShallowStereoNetConfig::new(run.config.max_disp);
            let model = ShallowStereoNet::<B>::new(&net, &device);
            fit::<B, _>(model, run, device)
        }
        ModelVariant::Deep => {
            let net = DeepStereoNetConfig::new(run.config.max_disp);
            let model = DeepStereoNet::<B>::new(&net, &device);
            fit::<B, _>(model, run, device)
        }
    }
}

fn fit<B, M>(model: M, mut run: Run, device: B::Device) -> anyhow::Result<()>
where
    B: AutodiffBackend,
    M: AutodiffModule<B> + DisparityModel<B>,
    M::InnerModule: DisparityModel<B::InnerBackend>,
{
    let model = match &run.resume {
        Some(path) => load_model_params(model, path, &device)?,
        None => model,
    };
    log::info!("Model parameters: {}", model.num_params());

    let optimizer = run.config.optimizer().init::<B, M>();
    let mut trainer = StereoTrainer::new(model, optimizer, run.config.clone(), device)?;

    let summary = run_training(
        &mut trainer,
        &run.train_loader,
        &run.val_loader,
        &run.checkpoints,
        &mut run.sink,
    )?;

    match summary.best_score {
        Some(score) => log::info!("Best validation 3px error: {:.4}", score),
        None => log::warn!("No epoch produced a validation score"),
    }
    Ok(())
}
