//! Network configuration types.

use burn::config::Config;

/// Configuration for the two-output stereo network.
#[derive(Config, Debug)]
pub struct ShallowStereoNetConfig {
    /// Maximum disparity; predictions are bounded to `[0, max_disp]`.
    pub max_disp: usize,

    /// Feature channels of the hidden convolutions.
    #[config(default = 16)]
    pub features: usize,

    /// Convolution kernel size (odd).
    #[config(default = 3)]
    pub kernel_size: usize,
}

/// Configuration for the three-output stereo network.
#[derive(Config, Debug)]
pub struct DeepStereoNetConfig {
    /// Maximum disparity; predictions are bounded to `[0, max_disp]`.
    pub max_disp: usize,

    /// Feature channels of the hidden convolutions.
    #[config(default = 32)]
    pub features: usize,

    /// Convolution kernel size (odd).
    #[config(default = 3)]
    pub kernel_size: usize,
}
