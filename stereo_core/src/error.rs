//! Error types for stereo_core operations.
//!
//! Provides a simple error enum with no external dependencies.

use core::fmt;

/// Error types that can occur during stereo_core operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoreError {
    /// Two buffers that must describe the same pixels have different lengths.
    LengthMismatch {
        /// Length of the reference buffer (usually the target).
        expected: usize,
        /// Length of the offending buffer.
        got: usize,
    },
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoreError::LengthMismatch { expected, got } => {
                write!(f, "buffer length mismatch: expected {}, got {}", expected, got)
            }
        }
    }
}

impl std::error::Error for CoreError {}

/// Result type for stereo_core operations.
pub type Result<T> = core::result::Result<T, CoreError>;

/// Check that `got` matches `expected` in length.
#[inline]
pub(crate) fn ensure_same_len(expected: usize, got: usize) -> Result<()> {
    if expected == got {
        Ok(())
    } else {
        Err(CoreError::LengthMismatch { expected, got })
    }
}
