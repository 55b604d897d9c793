//! Error types for neural_stereo.

use thiserror::Error;

/// Errors that can occur while configuring or running stereo training.
#[derive(Error, Debug)]
pub enum NeuralStereoError {
    /// Invalid configuration.
    #[error("invalid configuration: {message}")]
    InvalidConfig {
        /// Description of the configuration error.
        message: String,
    },

    /// Requested model variant does not exist.
    #[error("no suitable model found: '{name}' (expected GANet11 or GANet_deep)")]
    UnknownModel {
        /// The rejected model name.
        name: String,
    },

    /// Accelerator requested but not available in this build or on this machine.
    #[error("no accelerator available, please run without --cuda")]
    AcceleratorUnavailable,

    /// Model produced an unsupported number of prediction maps.
    #[error("unsupported prediction count: expected 2 or 3 disparity maps, got {got}")]
    PredictionArity {
        /// Number of maps produced.
        got: usize,
    },

    /// Error from the host-side metric code.
    #[error("metric error: {0}")]
    Core(#[from] stereo_core::CoreError),

    /// Filesystem error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Burn recorder failed to save or load a record.
    #[error("recorder error: {0}")]
    Recorder(String),

    /// Checkpoint metadata could not be (de)serialized.
    #[error("metadata error: {0}")]
    Metadata(#[from] serde_json::Error),

    /// Scalar log could not be written.
    #[error("metrics sink error: {0}")]
    Csv(#[from] csv::Error),

    /// Image decoding failed.
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    /// Dataset or loader failure.
    #[error("dataset error: {message}")]
    Dataset {
        /// Description of the failure.
        message: String,
    },

    /// Invalid or corrupted data.
    #[error("invalid data: {0}")]
    InvalidData(String),
}

impl NeuralStereoError {
    /// Shorthand for [`NeuralStereoError::InvalidConfig`].
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Shorthand for [`NeuralStereoError::Dataset`].
    pub fn dataset(message: impl Into<String>) -> Self {
        Self::Dataset {
            message: message.into(),
        }
    }
}

/// Result type for neural_stereo operations.
pub type Result<T> = std::result::Result<T, NeuralStereoError>;
