//! Candidate ordering and pruning.
//!
//! Includes the deterministic match ordering and per-class box suppression.

pub(crate) mod nms;
pub(crate) mod order;
