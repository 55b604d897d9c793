//! Host-side stereo samples and the crop/flip helpers used by the datasets.

use crate::error::{NeuralStereoError, Result};

/// Number of color channels of the input images.
pub const CHANNELS: usize = 3;

/// One rectified stereo pair with its ground-truth disparity.
///
/// Images are planar CHW (`[3, height, width]`), disparity is `[height, width]`.
/// Unlabeled pixels carry disparity 0.
#[derive(Debug, Clone, PartialEq)]
pub struct StereoSample {
    /// Left image, CHW.
    pub left: Vec<f32>,
    /// Right image, CHW.
    pub right: Vec<f32>,
    /// Left-view disparity, HW.
    pub disparity: Vec<f32>,
    /// Height in pixels.
    pub height: usize,
    /// Width in pixels.
    pub width: usize,
}

impl StereoSample {
    /// Create a sample, checking buffer sizes against the shape.
    pub fn new(
        left: Vec<f32>,
        right: Vec<f32>,
        disparity: Vec<f32>,
        height: usize,
        width: usize,
    ) -> Result<Self> {
        let plane = height * width;
        if left.len() != CHANNELS * plane || right.len() != CHANNELS * plane {
            return Err(NeuralStereoError::InvalidData(format!(
                "image buffers of {} and {} values do not match {}x{}x{}",
                left.len(),
                right.len(),
                CHANNELS,
                height,
                width
            )));
        }
        if disparity.len() != plane {
            return Err(NeuralStereoError::InvalidData(format!(
                "disparity buffer of {} values does not match {}x{}",
                disparity.len(),
                height,
                width
            )));
        }

        Ok(Self {
            left,
            right,
            disparity,
            height,
            width,
        })
    }

    /// Shape as `[height, width]`.
    pub fn shape(&self) -> [usize; 2] {
        [self.height, self.width]
    }

    /// Cut a `[height, width]` window out of the sample.
    ///
    /// The window starts at row `y0`, column `x0` in the left view and at
    /// column `x0 + shift` in the right view. Offsets may be negative or run
    /// past the border; uncovered pixels are zero, which also marks them as
    /// unlabeled. Labeled disparities are increased by `shift` so they stay
    /// consistent with the shifted right window.
    pub fn crop(&self, y0: isize, x0: isize, shift: usize, height: usize, width: usize) -> Self {
        let src = [self.height, self.width];
        let right_x0 = x0 + shift as isize;

        let left = crop_planes(&self.left, CHANNELS, src, y0, x0, height, width);
        let right = crop_planes(&self.right, CHANNELS, src, y0, right_x0, height, width);
        let mut disparity = crop_planes(&self.disparity, 1, src, y0, x0, height, width);
        if shift > 0 {
            for d in disparity.iter_mut().filter(|d| **d > 0.0) {
                *d += shift as f32;
            }
        }

        Self {
            left,
            right,
            disparity,
            height,
            width,
        }
    }

    /// Bottom-right window, zero padded on the top/left when the sample is smaller.
    pub fn crop_bottom_right(&self, height: usize, width: usize) -> Self {
        let y0 = self.height as isize - height as isize;
        let x0 = self.width as isize - width as isize;
        self.crop(y0, x0, 0, height, width)
    }

    /// Swap the views so the network sees the mirrored right view as its left input.
    ///
    /// Both images are flipped horizontally and exchanged; `right_disparity`
    /// (the right view's ground truth, HW) is flipped and becomes the target.
    pub fn mirror_views(self, right_disparity: Vec<f32>) -> Result<Self> {
        let [h, w] = self.shape();
        if right_disparity.len() != h * w {
            return Err(NeuralStereoError::InvalidData(format!(
                "right disparity of {} values does not match {}x{}",
                right_disparity.len(),
                h,
                w
            )));
        }

        Ok(Self {
            left: flip_horizontal(&self.right, CHANNELS, h, w),
            right: flip_horizontal(&self.left, CHANNELS, h, w),
            disparity: flip_horizontal(&right_disparity, 1, h, w),
            height: h,
            width: w,
        })
    }
}

/// Crop `planes` planes of a `[src_h, src_w]` buffer, zero filling outside the source.
pub(crate) fn crop_planes(
    src: &[f32],
    planes: usize,
    [src_h, src_w]: [usize; 2],
    y0: isize,
    x0: isize,
    height: usize,
    width: usize,
) -> Vec<f32> {
    let mut out = vec![0.0; planes * height * width];

    for p in 0..planes {
        let src_plane = &src[p * src_h * src_w..(p + 1) * src_h * src_w];
        let dst_plane = &mut out[p * height * width..(p + 1) * height * width];

        for row in 0..height {
            let sy = y0 + row as isize;
            if sy < 0 || sy >= src_h as isize {
                continue;
            }
            let sy = sy as usize;

            // Column range overlapping the source.
            let first = (-x0).max(0) as usize;
            let last = (src_w as isize - x0).clamp(0, width as isize) as usize;
            if first >= last {
                continue;
            }
            let sx = (x0 + first as isize) as usize;
            let n = last - first;
            dst_plane[row * width + first..row * width + last]
                .copy_from_slice(&src_plane[sy * src_w + sx..sy * src_w + sx + n]);
        }
    }

    out
}

/// Mirror every plane of a planar buffer left to right.
pub(crate) fn flip_horizontal(src: &[f32], planes: usize, height: usize, width: usize) -> Vec<f32> {
    let mut out = src.to_vec();
    if width == 0 {
        return out;
    }
    for row in out.chunks_mut(width).take(planes * height) {
        row.reverse();
    }
    out
}

/// Standardize each channel plane to zero mean and unit variance.
///
/// Constant planes are only centered.
pub(crate) fn normalize_channels(image: &mut [f32], planes: usize) {
    let plane_len = image.len() / planes.max(1);
    if plane_len == 0 {
        return;
    }

    for plane in image.chunks_mut(plane_len) {
        let n = plane.len() as f64;
        let mean = plane.iter().map(|&v| v as f64).sum::<f64>() / n;
        let var = plane.iter().map(|&v| (v as f64 - mean).powi(2)).sum::<f64>() / n;
        let std = var.sqrt();

        for v in plane.iter_mut() {
            let centered = *v as f64 - mean;
            *v = if std > 0.0 { centered / std } else { centered } as f32;
        }
    }
}
