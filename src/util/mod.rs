//! Shared utility helpers.

pub(crate) mod codec;
pub mod error;
pub(crate) mod math;

pub use error::{ShapeMatchError, ShapeMatchResult};
