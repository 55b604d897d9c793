//! Epoch loop: schedule, train, validate, select and save.

use burn::module::AutodiffModule;
use burn::optim::Optimizer;
use burn::tensor::backend::AutodiffBackend;
use stereo_core::BestScoreTracker;

use crate::data::{BatchLoader, StereoDataset};
use crate::error::Result;
use crate::metrics::MetricsSink;
use crate::nn::DisparityModel;

use super::checkpoint::CheckpointManager;
use super::metrics::{EpochSummary, ValidationSummary};
use super::trainer::StereoTrainer;

/// What happened in one epoch of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct EpochReport {
    /// Epoch number (1-based).
    pub epoch: usize,
    /// Learning rate used.
    pub learning_rate: f64,
    /// Training phase.
    pub train: EpochSummary,
    /// Validation phase.
    pub validation: ValidationSummary,
    /// Whether the validation score was a new minimum.
    pub is_best: bool,
    /// Whether a snapshot was written.
    pub saved: bool,
}

/// Outcome of a full run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    /// Per-epoch reports in order.
    pub epochs: Vec<EpochReport>,
    /// Lowest validation score seen.
    pub best_score: Option<f64>,
}

/// Run `config.epochs` epochs, starting from epoch 1.
///
/// Per epoch: set the scheduled learning rate, train, validate, and write a
/// snapshot when the score improved or the epoch falls on the save interval.
pub fn run_training<B, M, O, DT, DV, S>(
    trainer: &mut StereoTrainer<B, M, O>,
    train_loader: &BatchLoader<DT>,
    val_loader: &BatchLoader<DV>,
    checkpoints: &CheckpointManager,
    sink: &mut S,
) -> Result<RunSummary>
where
    B: AutodiffBackend,
    M: AutodiffModule<B> + DisparityModel<B>,
    M::InnerModule: DisparityModel<B::InnerBackend>,
    O: Optimizer<M, B>,
    DT: StereoDataset,
    DV: StereoDataset,
    S: MetricsSink,
{
    let config = trainer.config();
    let epochs = config.epochs;
    let schedule = config.lr_schedule();
    let save_policy = config.save_policy();

    let mut best = BestScoreTracker::new();
    let mut summary = RunSummary::default();

    for epoch in 1..=epochs {
        let learning_rate = schedule.learning_rate(epoch);
        trainer.set_learning_rate(learning_rate);
        log::info!("Epoch {}/{}: learning rate {:e}", epoch, epochs, learning_rate);

        let train = trainer.train_epoch(epoch, train_loader, sink)?;
        let validation = trainer.validate(epoch, val_loader, sink)?;

        let score = validation.score();
        let is_best = best.observe(score);
        let saved = save_policy.should_save(epoch, is_best);
        if saved {
            let metadata = trainer.checkpoint_metadata(epoch, score);
            checkpoints.save::<B, M, O>(trainer.model(), trainer.optimizer(), &metadata, is_best)?;
        }

        summary.epochs.push(EpochReport {
            epoch,
            learning_rate,
            train,
            validation,
            is_best,
            saved,
        });
    }

    sink.flush()?;
    summary.best_score = best.best();
    if let Some(score) = summary.best_score {
        log::info!("Training finished, best 3px error {:.4}", score);
    } else {
        log::warn!("Training finished without a validation score");
    }

    Ok(summary)
}
