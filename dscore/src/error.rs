use thiserror::Error;

use crate::data::trace::TraceFeature;

/// Result type for decay spectroscopy operations.
pub type DecayResult<T> = Result<T, DecayError>;

/// Errors that can occur while processing traces, events and correlations.
///
/// Every variant carries enough context to identify the failing operation
/// and the offending indices, so a failed pipeline run can be diagnosed
/// without re-running it.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DecayError {
    #[error("{op}: window [{lo}, {hi}) not contained in trace of length {len}")]
    WindowOutOfRange {
        op: &'static str,
        lo: isize,
        hi: isize,
        len: usize,
    },

    #[error("{op}: feature {feature} has not been computed on this trace")]
    MissingFeature {
        op: &'static str,
        feature: TraceFeature,
    },

    #[error("invalid filter geometry: rise {rise} samples, gap {gap} samples")]
    InvalidFilterGeometry { rise: usize, gap: usize },

    #[error("input hits not time-ordered: {next} after {prev}")]
    UnsortedInput { prev: u64, next: u64 },

    #[error("pixel ({x}, {y}) outside grid extent ({x_extent}, {y_extent})")]
    PixelOutOfBounds {
        x: usize,
        y: usize,
        x_extent: usize,
        y_extent: usize,
    },

    #[error("calibrated energy already set for channel {channel_id}")]
    CalibrationAlreadySet { channel_id: u32 },
}
