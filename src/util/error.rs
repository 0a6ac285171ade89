//! Error types for shapematch.

use thiserror::Error;

/// Result alias for shapematch operations.
pub type ShapeMatchResult<T> = std::result::Result<T, ShapeMatchError>;

/// Errors that can occur when building templates, matching or persisting.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum ShapeMatchError {
    /// The input data or parameters are invalid.
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),
    /// Image dimensions are zero or overflow.
    #[error("invalid dimensions {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },
    /// Row stride is smaller than one row of pixels.
    #[error("stride {stride} is smaller than row length {row_len}")]
    InvalidStride { row_len: usize, stride: usize },
    /// Backing buffer is too small for the requested view.
    #[error("buffer too small: needed {needed}, got {got}")]
    BufferTooSmall { needed: usize, got: usize },
    /// Channel count is not supported by the operation.
    #[error("unsupported channel count {channels}")]
    UnsupportedChannels { channels: usize },
    /// Image and mask (or two images) disagree on shape.
    #[error("shape mismatch: image {image_width}x{image_height}, mask {mask_width}x{mask_height}")]
    ShapeMismatch {
        image_width: usize,
        image_height: usize,
        mask_width: usize,
        mask_height: usize,
    },
    /// An angle or scale sampling description is invalid.
    #[error("invalid sampling: {reason}")]
    InvalidSampling { reason: &'static str },
    /// A persistence path pattern lacks exactly one `%s` placeholder.
    #[error("path pattern `{pattern}` must contain exactly one `%s`")]
    InvalidPathPattern { pattern: String },
    /// Feature extraction produced no usable point at a pyramid level.
    #[error("insufficient features at pyramid level {level}")]
    InsufficientFeatures { level: usize },
    /// The requested class is not registered.
    #[error("unknown class `{class_id}`")]
    UnknownClass { class_id: String },
    /// The requested template id does not exist within its class.
    #[error("unknown template {template_id} in class `{class_id}`")]
    UnknownTemplate { class_id: String, template_id: usize },
    /// A persisted document disagrees with the detector or its companion file.
    #[error("persistence mismatch for class `{class_id}`: {reason}")]
    PersistenceMismatch { class_id: String, reason: String },
    /// Reading or writing a file failed.
    #[error("i/o error on {path}: {reason}")]
    Io { path: String, reason: String },
    /// A persisted document could not be encoded or decoded.
    #[error("cannot parse {path}: {reason}")]
    Parse { path: String, reason: String },
    /// Loading an image through the `image` crate failed.
    #[error("image i/o error: {reason}")]
    ImageIo { reason: String },
}

impl ShapeMatchError {
    /// Returns true for per-template failures that a bulk training or
    /// loading loop may skip and continue from.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ShapeMatchError::InsufficientFeatures { .. }
                | ShapeMatchError::UnknownClass { .. }
                | ShapeMatchError::UnknownTemplate { .. }
                | ShapeMatchError::PersistenceMismatch { .. }
        )
    }
}
