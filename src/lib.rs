//! shapematch is a CPU-first shape-based template matcher.
//!
//! Templates are sparse sets of quantized gradient orientations extracted
//! from a training image. Matching spreads the target's orientations,
//! precomputes per-orientation response maps and scores every template with
//! table lookups, coarse to fine over an image pyramid. Rotated templates can
//! be derived geometrically from an extracted one without re-rendering.
//! Optional parallelism is available via the `rayon` feature.

mod candidate;
pub mod detector;
pub mod feature;
pub mod gradient;
pub mod image;
pub mod lowlevel;
pub mod pose;
pub mod response;
pub mod search;
pub mod template;
mod trace;
pub mod util;

pub use detector::{Detector, DetectorConfig, ReadReport, TemplateId};
pub use feature::Feature;
#[cfg(feature = "image-io")]
pub use image::io;
pub use image::pyramid::ImagePyramid;
pub use image::{ImageView, OwnedImage};
pub use pose::{Pose, PoseConfig, PoseDocument, PoseEnumerator, PoseRecord, Sampling};
pub use search::{BoundingBox, Match, MatchConfig};
pub use template::{Point2, Provenance, Template, TemplatePyramid};
pub use util::{ShapeMatchError, ShapeMatchResult};
