//! Low-level building blocks for custom matching pipelines.
//!
//! These expose the individual stages behind `Detector`: orientation
//! quantization, feature selection, template construction and rotation,
//! spreading and response maps, and image warping. Most users should prefer
//! the top-level `Detector` and `PoseEnumerator` types.

pub use crate::feature::{select_features, SelectionParams};
pub use crate::gradient::{bin_of_angle, bin_of_mask, quantize_gradients, QuantizedGradients};
pub use crate::pose::render::{warp_mask_nearest, warp_u8_bilinear};
pub use crate::response::{build_response_pyramid, spread, ResponseMaps, SimilarityTable};
pub use crate::template::{build_templates, rotate_templates, BuildParams};
