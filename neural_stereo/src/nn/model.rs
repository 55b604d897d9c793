//! Model contract shared by all disparity networks.

use burn::module::Module;
use burn::prelude::*;

use crate::error::{NeuralStereoError, Result};

/// A stereo network mapping a rectified image pair to disparity maps.
///
/// Inputs are `[batch, 3, height, width]`. The output is an ordered sequence of
/// `[batch, height, width]` maps, coarse to fine. Two-output and three-output
/// variants exist; consumers dispatch on [`Predictions::len`], never on the
/// concrete model type.
///
/// There is no explicit train/eval switch: the autodiff backend is the
/// training mode, and `AutodiffModule::valid()` yields the evaluation model on
/// the inner backend.
pub trait DisparityModel<B: Backend>: Module<B> {
    /// Run the network on a left/right image pair.
    fn forward(&self, left: Tensor<B, 4>, right: Tensor<B, 4>) -> Predictions<B>;
}

/// Ordered disparity maps produced by one forward pass.
#[derive(Debug, Clone)]
pub struct Predictions<B: Backend> {
    maps: Vec<Tensor<B, 3>>,
}

impl<B: Backend> Predictions<B> {
    /// Wrap maps ordered from coarsest to finest.
    pub fn new(maps: Vec<Tensor<B, 3>>) -> Self {
        Self { maps }
    }

    /// Number of maps.
    pub fn len(&self) -> usize {
        self.maps.len()
    }

    /// Whether no map was produced.
    pub fn is_empty(&self) -> bool {
        self.maps.is_empty()
    }

    /// All maps, coarse to fine.
    pub fn maps(&self) -> &[Tensor<B, 3>] {
        &self.maps
    }

    /// The most refined map.
    pub fn finest(&self) -> Option<Tensor<B, 3>> {
        self.maps.last().cloned()
    }

    /// The three maps reported as per-head errors.
    ///
    /// Two-output models report `[(d1 + d2) / 2, d1, d2]`; the averaged map is
    /// for reporting only and never enters the loss.
    pub fn report_heads(&self) -> Result<[Tensor<B, 3>; 3]> {
        match self.maps.as_slice() {
            [d1, d2] => Ok([
                (d1.clone() + d2.clone()).div_scalar(2.0),
                d1.clone(),
                d2.clone(),
            ]),
            [d0, d1, d2] => Ok([d0.clone(), d1.clone(), d2.clone()]),
            other => Err(NeuralStereoError::PredictionArity { got: other.len() }),
        }
    }

    /// Detach every map from the autodiff graph.
    pub fn detach(self) -> Self {
        Self {
            maps: self.maps.into_iter().map(|m| m.detach()).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    #[test]
    fn test_report_heads_shallow_averages() {
        let device = Default::default();
        let d1 = Tensor::<TestBackend, 3>::full([1, 2, 2], 2.0, &device);
        let d2 = Tensor::<TestBackend, 3>::full([1, 2, 2], 4.0, &device);
        let predictions = Predictions::new(vec![d1, d2]);

        let [d0, _, _] = predictions.report_heads().unwrap();
        let values: Vec<f32> = d0.to_data().to_vec().unwrap();
        assert!(values.iter().all(|&v| (v - 3.0).abs() < 1e-6));
    }

    #[test]
    fn test_report_heads_rejects_single_map() {
        let device = Default::default();
        let d = Tensor::<TestBackend, 3>::zeros([1, 2, 2], &device);
        let predictions = Predictions::new(vec![d]);

        assert!(matches!(
            predictions.report_heads(),
            Err(NeuralStereoError::PredictionArity { got: 1 })
        ));
    }

    #[test]
    fn test_finest_is_last() {
        let device = Default::default();
        let maps = (0..3)
            .map(|i| Tensor::<TestBackend, 3>::full([1, 1, 1], i as f32, &device))
            .collect();
        let predictions = Predictions::new(maps);

        let finest: Vec<f32> = predictions.finest().unwrap().to_data().to_vec().unwrap();
        assert_eq!(finest, vec![2.0]);
    }
}
