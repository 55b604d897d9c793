//! Stereo disparity trainer: training and validation steps.

use burn::module::AutodiffModule;
use burn::optim::{GradientsParams, Optimizer};
use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;
use burn::tensor::ElementConversion;

use stereo_core::{
    end_point_error, three_pixel_error, MaskPolicy, StepCounters, TrainAccumulator,
    ValidationAccumulator,
};

use crate::config::TrainingConfig;
use crate::data::{BatchLoader, StereoBatch, StereoDataset};
use crate::error::{NeuralStereoError, Result};
use crate::loss::{count_valid, masked_mean_abs_error, training_mask, LossComposer};
use crate::metrics::{tags, MetricsSink};
use crate::nn::DisparityModel;

use super::checkpoint::CheckpointMetadata;
use super::metrics::{EpochSummary, TrainStepOutput, ValStepOutput, ValidationSummary};

/// Trainer owning the model, its optimizer and the run-wide step counters.
///
/// Training runs on the autodiff backend `B`. Validation runs on the inner
/// backend through `AutodiffModule::valid`, so no graph is recorded.
pub struct StereoTrainer<B, M, O>
where
    B: AutodiffBackend,
    M: AutodiffModule<B> + DisparityModel<B>,
    M::InnerModule: DisparityModel<B::InnerBackend>,
    O: Optimizer<M, B>,
{
    model: M,
    optimizer: O,
    config: TrainingConfig,
    composer: LossComposer,
    policy: MaskPolicy,
    learning_rate: f64,
    counters: StepCounters,
    optimizer_steps: u64,
    device: B::Device,
}

impl<B, M, O> StereoTrainer<B, M, O>
where
    B: AutodiffBackend,
    M: AutodiffModule<B> + DisparityModel<B>,
    M::InnerModule: DisparityModel<B::InnerBackend>,
    O: Optimizer<M, B>,
{
    /// Create a trainer. The learning rate starts at the configured base rate.
    pub fn new(model: M, optimizer: O, config: TrainingConfig, device: B::Device) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            composer: LossComposer::from_config(&config),
            policy: config.mask_policy(),
            learning_rate: config.learning_rate,
            model,
            optimizer,
            config,
            counters: StepCounters::new(),
            optimizer_steps: 0,
            device,
        })
    }

    /// The model being trained.
    pub fn model(&self) -> &M {
        &self.model
    }

    /// Consume the trainer, returning the model.
    pub fn into_model(self) -> M {
        self.model
    }

    /// The optimizer.
    pub fn optimizer(&self) -> &O {
        &self.optimizer
    }

    /// Training configuration.
    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Global train/validation step counters.
    pub fn counters(&self) -> StepCounters {
        self.counters
    }

    /// Number of optimizer updates applied so far.
    pub fn optimizer_steps(&self) -> u64 {
        self.optimizer_steps
    }

    /// Current learning rate.
    pub fn learning_rate(&self) -> f64 {
        self.learning_rate
    }

    /// Set the learning rate used by subsequent steps.
    pub fn set_learning_rate(&mut self, learning_rate: f64) {
        self.learning_rate = learning_rate;
    }

    /// Device the batches are loaded to.
    pub fn device(&self) -> &B::Device {
        &self.device
    }

    /// Metadata describing the current state, for a snapshot of `epoch`.
    pub fn checkpoint_metadata(&self, epoch: usize, score: Option<f64>) -> CheckpointMetadata {
        CheckpointMetadata {
            epoch,
            score,
            learning_rate: self.learning_rate,
            train_steps: self.counters.train(),
            val_steps: self.counters.val(),
        }
    }

    /// One forward/backward/update cycle.
    ///
    /// Returns `None` without touching the model, the optimizer or the
    /// counters when the batch has no valid ground-truth pixel. A NaN loss is
    /// logged with the full batch state and the update is still applied.
    pub fn train_step<S: MetricsSink>(
        &mut self,
        batch: &StereoBatch<B>,
        sink: &mut S,
    ) -> Result<Option<TrainStepOutput>> {
        let target = batch.target.clone();
        let mask = training_mask(target.clone(), &self.policy);
        let valid_pixels = count_valid(mask.clone());
        log::debug!("train batch: {} valid pixels", valid_pixels);
        if valid_pixels == 0 {
            return Ok(None);
        }

        let predictions = self.model.forward(batch.left.clone(), batch.right.clone());
        let loss = self.composer.compose(&predictions, target.clone(), mask.clone())?;
        let loss_value: f64 = loss.clone().into_scalar().elem();

        if loss_value.is_nan() {
            log::warn!("NaN loss at train step {}", self.counters.train() + 1);
            log::warn!("target: {}", target);
            for (i, map) in predictions.maps().iter().enumerate() {
                log::warn!("disp{}: {}", i, map);
            }
        }

        let heads = predictions.detach().report_heads()?;
        let mut errors = [0.0f64; 3];
        for (error, head) in errors.iter_mut().zip(heads) {
            *error = masked_mean_abs_error(head, target.clone(), mask.clone())
                .into_scalar()
                .elem();
        }

        let grads = GradientsParams::from_grads(loss.backward(), &self.model);
        self.model = self
            .optimizer
            .step(self.learning_rate, self.model.clone(), grads);
        self.optimizer_steps += 1;

        let step = self.counters.next_train();
        sink.add_scalar(tags::TRAIN_LOSS, loss_value, step)?;
        sink.add_scalar(tags::TRAIN_EPE, errors[2], step)?;

        Ok(Some(TrainStepOutput {
            loss: loss_value,
            errors,
            step,
            valid_pixels,
        }))
    }

    /// Train on every batch of `loader` for `epoch` (1-based).
    pub fn train_epoch<D: StereoDataset, S: MetricsSink>(
        &mut self,
        epoch: usize,
        loader: &BatchLoader<D>,
        sink: &mut S,
    ) -> Result<EpochSummary> {
        let device = self.device.clone();
        let num_batches = loader.num_batches();
        let mut accumulator = TrainAccumulator::new();

        for (i, batch) in loader.batches::<B>(epoch, &device).enumerate() {
            let batch = batch?;
            let Some(out) = self.train_step(&batch, sink)? else {
                continue;
            };
            accumulator.add(out.loss, out.errors);
            log::info!(
                "===> Epoch[{}]({}/{}): Loss: {:.4}, Error: ({:.4} {:.4} {:.4})",
                epoch,
                i + 1,
                num_batches,
                out.loss,
                out.errors[0],
                out.errors[1],
                out.errors[2]
            );
        }

        let averages = accumulator.averages();
        match averages {
            Some(avg) => {
                log::info!(
                    "===> Epoch {} Complete: Avg. Loss: {:.4}, Avg. Error: ({:.4} {:.4} {:.4})",
                    epoch,
                    avg.loss,
                    avg.errors[0],
                    avg.errors[1],
                    avg.errors[2]
                );
                sink.add_scalar(tags::TRAIN_EPOCH_EPE, avg.errors[2], epoch as u64)?;
            }
            None => log::warn!(
                "===> Epoch {}: all {} training batches were skipped, no averages",
                epoch,
                num_batches
            ),
        }

        Ok(EpochSummary {
            epoch,
            batches: num_batches,
            averages,
        })
    }

    /// Evaluate one batch with the current parameters.
    pub fn val_step<S: MetricsSink>(
        &mut self,
        batch: &StereoBatch<B::InnerBackend>,
        sink: &mut S,
    ) -> Result<Option<ValStepOutput>> {
        let model = self.model.valid();
        self.evaluate(&model, batch, sink)
    }

    /// Run a full validation pass and write the epoch aggregates.
    ///
    /// The returned summary's [`ValidationSummary::score`] is the average
    /// 3-pixel error used for checkpoint selection.
    pub fn validate<D: StereoDataset, S: MetricsSink>(
        &mut self,
        epoch: usize,
        loader: &BatchLoader<D>,
        sink: &mut S,
    ) -> Result<ValidationSummary> {
        let model = self.model.valid();
        let device = self.device.clone();
        let num_batches = loader.num_batches();
        let mut accumulator = ValidationAccumulator::new();

        for (i, batch) in loader.batches::<B::InnerBackend>(epoch, &device).enumerate() {
            let batch = batch?;
            let Some(out) = self.evaluate(&model, &batch, sink)? else {
                continue;
            };
            accumulator.add(out.epe, out.three_pixel_error);
            log::info!(
                "===> Test({}/{}): Error: ({:.4} {})",
                i + 1,
                num_batches,
                out.epe,
                fmt_optional(out.three_pixel_error)
            );
        }

        let averages = accumulator.averages();
        match averages {
            Some(avg) => {
                log::info!(
                    "===> Test: Avg. Error: ({:.4} {})",
                    avg.epe,
                    fmt_optional(avg.three_pixel_error)
                );
                sink.add_scalar(tags::VALIDATION_EPOCH_EPE, avg.epe, epoch as u64)?;
                if let Some(err) = avg.three_pixel_error {
                    sink.add_scalar(tags::VALIDATION_EPOCH_3PX, err, epoch as u64)?;
                }
            }
            None => log::warn!(
                "===> Test: all {} validation batches were skipped, no score for epoch {}",
                num_batches,
                epoch
            ),
        }

        Ok(ValidationSummary {
            batches: num_batches,
            averages,
        })
    }

    fn evaluate<S: MetricsSink>(
        &mut self,
        model: &M::InnerModule,
        batch: &StereoBatch<B::InnerBackend>,
        sink: &mut S,
    ) -> Result<Option<ValStepOutput>> {
        let target = host_values(batch.target.clone())?;
        let valid_pixels = self.policy.count_valid_training(&target);
        log::debug!("validation batch: {} valid pixels", valid_pixels);
        if valid_pixels == 0 {
            return Ok(None);
        }

        let predictions = model.forward(batch.left.clone(), batch.right.clone());
        let finest = predictions
            .finest()
            .ok_or(NeuralStereoError::PredictionArity { got: 0 })?;
        let prediction = host_values(finest)?;

        let mask = self.policy.training_mask(&target);
        let epe = end_point_error(&prediction, &target, &mask)?.map_or(f64::NAN, f64::from);
        let three_pixel = three_pixel_error(&prediction, &target, &self.policy)?;

        let step = self.counters.next_val();
        sink.add_scalar(tags::VALIDATION_EPE, epe, step)?;
        if let Some(err) = three_pixel {
            sink.add_scalar(tags::VALIDATION_3PX, err, step)?;
        }

        Ok(Some(ValStepOutput {
            epe,
            three_pixel_error: three_pixel,
            step,
            valid_pixels,
        }))
    }
}

/// Copy a tensor to the host as `f32` values.
fn host_values<B: Backend, const D: usize>(tensor: Tensor<B, D>) -> Result<Vec<f32>> {
    tensor
        .into_data()
        .convert::<f32>()
        .to_vec::<f32>()
        .map_err(|e| NeuralStereoError::InvalidData(format!("cannot read tensor: {:?}", e)))
}

fn fmt_optional(value: Option<f64>) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("{:.4}", v))
}
