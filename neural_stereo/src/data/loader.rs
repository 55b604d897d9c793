//! Batch assembly on a worker pool.

use std::sync::Arc;

use burn::prelude::*;
use burn::tensor::TensorData;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rayon::prelude::*;

use crate::error::{NeuralStereoError, Result};

use super::dataset::StereoDataset;
use super::sample::{StereoSample, CHANNELS};

/// A batch of stereo pairs on the device.
#[derive(Debug, Clone)]
pub struct StereoBatch<B: Backend> {
    /// Left images `[batch, 3, height, width]`.
    pub left: Tensor<B, 4>,
    /// Right images `[batch, 3, height, width]`.
    pub right: Tensor<B, 4>,
    /// Ground-truth disparity `[batch, height, width]`.
    pub target: Tensor<B, 3>,
}

impl<B: Backend> StereoBatch<B> {
    /// Stack host samples of identical shape into device tensors.
    pub fn from_samples(samples: &[StereoSample], device: &B::Device) -> Result<Self> {
        let first = samples
            .first()
            .ok_or_else(|| NeuralStereoError::dataset("cannot build an empty batch"))?;
        let [h, w] = first.shape();
        if let Some(other) = samples.iter().find(|s| s.shape() != [h, w]) {
            return Err(NeuralStereoError::InvalidData(format!(
                "batch mixes sample shapes {:?} and {:?}",
                [h, w],
                other.shape()
            )));
        }

        let n = samples.len();
        let mut left = Vec::with_capacity(n * CHANNELS * h * w);
        let mut right = Vec::with_capacity(n * CHANNELS * h * w);
        let mut target = Vec::with_capacity(n * h * w);
        for sample in samples {
            left.extend_from_slice(&sample.left);
            right.extend_from_slice(&sample.right);
            target.extend_from_slice(&sample.disparity);
        }

        Ok(Self {
            left: Tensor::from_data(TensorData::new(left, [n, CHANNELS, h, w]), device),
            right: Tensor::from_data(TensorData::new(right, [n, CHANNELS, h, w]), device),
            target: Tensor::from_data(TensorData::new(target, [n, h, w]), device),
        })
    }

    /// Number of pairs in the batch.
    pub fn len(&self) -> usize {
        self.target.dims()[0]
    }

    /// Whether the batch is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Splits a dataset into batches and loads each batch in parallel.
///
/// Every item gets its own generator seeded from `(seed, epoch, index)`, so an
/// epoch produces the same batches regardless of the number of workers.
pub struct BatchLoader<D: StereoDataset> {
    dataset: Arc<D>,
    batch_size: usize,
    shuffle: bool,
    drop_last: bool,
    seed: u64,
    pool: rayon::ThreadPool,
}

impl<D: StereoDataset> BatchLoader<D> {
    /// Training loader: file order, drops the last partial batch.
    pub fn training(dataset: D, batch_size: usize, threads: usize, seed: u64) -> Result<Self> {
        Self::new(dataset, batch_size, threads, seed, false, true)
    }

    /// Test loader: file order, keeps the last partial batch.
    pub fn test(dataset: D, batch_size: usize, threads: usize, seed: u64) -> Result<Self> {
        Self::new(dataset, batch_size, threads, seed, false, false)
    }

    /// Create a loader with explicit ordering options.
    pub fn new(
        dataset: D,
        batch_size: usize,
        threads: usize,
        seed: u64,
        shuffle: bool,
        drop_last: bool,
    ) -> Result<Self> {
        if batch_size == 0 {
            return Err(NeuralStereoError::invalid_config("batch size must be positive"));
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads.max(1))
            .thread_name(|i| format!("stereo-loader-{}", i))
            .build()
            .map_err(|e| NeuralStereoError::dataset(format!("failed to build loader pool: {}", e)))?;

        Ok(Self {
            dataset: Arc::new(dataset),
            batch_size,
            shuffle,
            drop_last,
            seed,
            pool,
        })
    }

    /// The wrapped dataset.
    pub fn dataset(&self) -> &D {
        &self.dataset
    }

    /// Batch size.
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Number of batches per epoch.
    pub fn num_batches(&self) -> usize {
        let len = self.dataset.len();
        if self.drop_last {
            len / self.batch_size
        } else {
            len.div_ceil(self.batch_size)
        }
    }

    /// Sample order of an epoch.
    pub fn epoch_order(&self, epoch: usize) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.dataset.len()).collect();
        if self.shuffle {
            let mut rng = StdRng::seed_from_u64(mix_seed(self.seed, epoch as u64, u64::MAX));
            order.shuffle(&mut rng);
        }
        order
    }

    /// Load the samples at `indices` in parallel and stack them.
    pub fn load_indices<B: Backend>(
        &self,
        indices: &[usize],
        epoch: usize,
        device: &B::Device,
    ) -> Result<StereoBatch<B>> {
        let dataset = &self.dataset;
        let seed = self.seed;
        let samples = self.pool.install(|| {
            indices
                .par_iter()
                .map(|&index| {
                    let mut rng = StdRng::seed_from_u64(mix_seed(seed, epoch as u64, index as u64));
                    dataset.get(index, &mut rng)
                })
                .collect::<Result<Vec<_>>>()
        })?;

        StereoBatch::from_samples(&samples, device)
    }

    /// Load batch `batch_index` of `epoch`.
    pub fn load_batch<B: Backend>(
        &self,
        batch_index: usize,
        epoch: usize,
        device: &B::Device,
    ) -> Result<StereoBatch<B>> {
        let order = self.epoch_order(epoch);
        let range = self.batch_range(batch_index, order.len())?;
        self.load_indices(&order[range], epoch, device)
    }

    /// Iterate over the batches of `epoch`, loading each on demand.
    pub fn batches<'a, B: Backend>(
        &'a self,
        epoch: usize,
        device: &'a B::Device,
    ) -> impl Iterator<Item = Result<StereoBatch<B>>> + 'a {
        let order = self.epoch_order(epoch);
        (0..self.num_batches()).map(move |b| {
            let range = self.batch_range(b, order.len())?;
            self.load_indices(&order[range], epoch, device)
        })
    }

    fn batch_range(&self, batch_index: usize, len: usize) -> Result<std::ops::Range<usize>> {
        if batch_index >= self.num_batches() {
            return Err(NeuralStereoError::dataset(format!(
                "batch {} out of range for {} batches",
                batch_index,
                self.num_batches()
            )));
        }
        let start = batch_index * self.batch_size;
        Ok(start..(start + self.batch_size).min(len))
    }
}

impl<D: StereoDataset + std::fmt::Debug> std::fmt::Debug for BatchLoader<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchLoader")
            .field("dataset", &self.dataset)
            .field("batch_size", &self.batch_size)
            .field("shuffle", &self.shuffle)
            .field("drop_last", &self.drop_last)
            .field("threads", &self.pool.current_num_threads())
            .finish()
    }
}

/// SplitMix64-style combination of the run seed, epoch and item.
fn mix_seed(seed: u64, epoch: u64, item: u64) -> u64 {
    let mut z = seed
        .wrapping_add(epoch.wrapping_mul(0x9E37_79B9_7F4A_7C15))
        .wrapping_add(item.wrapping_mul(0xBF58_476D_1CE4_E5B9));
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}
