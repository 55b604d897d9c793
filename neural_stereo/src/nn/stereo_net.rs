//! Reference stereo networks.
//!
//! Small convolutional networks that satisfy [`DisparityModel`] with two or three
//! outputs. They let the training loop run end to end; swapping in a full
//! cost-volume network only requires implementing the same trait.

use burn::module::Module;
use burn::nn::conv::{Conv2d, Conv2dConfig};
use burn::nn::{PaddingConfig2d, Relu};
use burn::prelude::*;
use burn::tensor::activation::sigmoid;

use crate::config::{DeepStereoNetConfig, ShallowStereoNetConfig};

use super::model::{DisparityModel, Predictions};

fn conv<B: Backend>(
    channels_in: usize,
    channels_out: usize,
    kernel_size: usize,
    device: &B::Device,
) -> Conv2d<B> {
    Conv2dConfig::new([channels_in, channels_out], [kernel_size, kernel_size])
        .with_padding(PaddingConfig2d::Same)
        .init(device)
}

/// Map a `[batch, 1, h, w]` head output to a bounded `[batch, h, w]` disparity.
fn to_disparity<B: Backend>(head: Tensor<B, 4>, max_disp: f32) -> Tensor<B, 3> {
    let [batch, _, height, width] = head.dims();
    sigmoid(head).mul_scalar(max_disp).reshape([batch, height, width])
}

/// Two-output stereo network.
///
/// Architecture:
/// 1. Concatenate left and right images along channels
/// 2. Shared convolutional stem
/// 3. Coarse head, then one refinement stage and a fine head
#[derive(Module, Debug)]
pub struct ShallowStereoNet<B: Backend> {
    stem: Conv2d<B>,
    refine: Conv2d<B>,
    head_coarse: Conv2d<B>,
    head_fine: Conv2d<B>,
    activation: Relu,
    #[module(skip)]
    max_disp: f32,
}

impl<B: Backend> ShallowStereoNet<B> {
    /// Create a new network from configuration.
    pub fn new(config: &ShallowStereoNetConfig, device: &B::Device) -> Self {
        let f = config.features;
        let k = config.kernel_size;

        Self {
            stem: conv(6, f, k, device),
            refine: conv(f, f, k, device),
            head_coarse: conv(f, 1, k, device),
            head_fine: conv(f, 1, k, device),
            activation: Relu::new(),
            max_disp: config.max_disp as f32,
        }
    }
}

impl<B: Backend> DisparityModel<B> for ShallowStereoNet<B> {
    fn forward(&self, left: Tensor<B, 4>, right: Tensor<B, 4>) -> Predictions<B> {
        let x = Tensor::cat(vec![left, right], 1);
        let features = self.activation.forward(self.stem.forward(x));
        let disp1 = to_disparity(self.head_coarse.forward(features.clone()), self.max_disp);

        let refined = self.activation.forward(self.refine.forward(features));
        let disp2 = to_disparity(self.head_fine.forward(refined), self.max_disp);

        Predictions::new(vec![disp1, disp2])
    }
}

/// Three-output stereo network with two refinement stages.
#[derive(Module, Debug)]
pub struct DeepStereoNet<B: Backend> {
    stem: Conv2d<B>,
    aggregate: Conv2d<B>,
    refine_mid: Conv2d<B>,
    refine_fine: Conv2d<B>,
    heads: Vec<Conv2d<B>>,
    activation: Relu,
    #[module(skip)]
    max_disp: f32,
}

impl<B: Backend> DeepStereoNet<B> {
    /// Create a new network from configuration.
    pub fn new(config: &DeepStereoNetConfig, device: &B::Device) -> Self {
        let f = config.features;
        let k = config.kernel_size;

        Self {
            stem: conv(6, f, k, device),
            aggregate: conv(f, f, k, device),
            refine_mid: conv(f, f, k, device),
            refine_fine: conv(f, f, k, device),
            heads: (0..3).map(|_| conv(f, 1, k, device)).collect(),
            activation: Relu::new(),
            max_disp: config.max_disp as f32,
        }
    }
}

impl<B: Backend> DisparityModel<B> for DeepStereoNet<B> {
    fn forward(&self, left: Tensor<B, 4>, right: Tensor<B, 4>) -> Predictions<B> {
        let x = Tensor::cat(vec![left, right], 1);
        let x = self.activation.forward(self.stem.forward(x));
        let stage0 = self.activation.forward(self.aggregate.forward(x));
        let stage1 = self.activation.forward(self.refine_mid.forward(stage0.clone()));
        let stage2 = self.activation.forward(self.refine_fine.forward(stage1.clone()));

        let maps = [stage0, stage1, stage2]
            .into_iter()
            .zip(&self.heads)
            .map(|(features, head)| to_disparity(head.forward(features), self.max_disp))
            .collect();

        Predictions::new(maps)
    }
}
