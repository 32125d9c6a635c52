//! Error types for series validation and kernel configuration.

/// Errors from time series validation and elastic kernel construction.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DistanceError {
    /// Returned when an empty slice is provided as a time series.
    #[error("time series must be non-empty")]
    EmptySeries,

    /// Returned when a time series contains NaN, infinity, or negative infinity.
    #[error("time series contains non-finite value at index {index}")]
    NonFiniteValue {
        /// Position of the first non-finite value found.
        index: usize,
    },

    /// Returned when a warping window fraction is negative, above one, or not finite.
    #[error("warping window fraction must be in [0.0, 1.0], got {fraction}")]
    InvalidWindow {
        /// The rejected window fraction.
        fraction: f64,
    },

    /// Returned when a kernel cost parameter is negative or not finite.
    #[error("kernel parameter `{name}` must be finite and non-negative, got {value}")]
    InvalidParameter {
        /// Name of the offending parameter (`g`, `epsilon`, `c`, `lambda`, `nu`).
        name: &'static str,
        /// The rejected value.
        value: f64,
    },
}
