//! Pose enumeration for training libraries.
//!
//! A `PoseEnumerator` owns one training image and its mask and produces the
//! cartesian product of sampled scales and angles. Each pose can be rendered
//! into a rotated/scaled image and mask for `Detector::add_template`, or used
//! as the angle argument of `Detector::add_template_rotate`.

pub mod record;
pub mod render;
pub mod sampling;

pub use record::{PoseDocument, PoseRecord};
pub use render::{warp_mask_nearest, warp_u8_bilinear};
pub use sampling::Sampling;

use crate::image::{check_channels, check_mask, ImageView, OwnedImage};
use crate::template::Point2;
use crate::util::{ShapeMatchError, ShapeMatchResult};
use serde::{Deserialize, Serialize};

/// One training pose: rotation in degrees and isotropic scale.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    /// Counter-clockwise rotation in degrees.
    pub angle: f32,
    /// Scale factor, `> 0`.
    pub scale: f32,
}

impl Pose {
    /// Creates a pose.
    pub fn new(angle: f32, scale: f32) -> Self {
        Self { angle, scale }
    }
}

/// Angle and scale sampling of a pose library.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoseConfig {
    /// Rotation samples in degrees.
    pub angles: Sampling,
    /// Scale samples.
    pub scales: Sampling,
}

impl Default for PoseConfig {
    fn default() -> Self {
        Self {
            angles: Sampling::Fixed(0.0),
            scales: Sampling::Fixed(1.0),
        }
    }
}

impl PoseConfig {
    /// Validates both samplings and requires positive scales.
    pub fn validate(&self) -> ShapeMatchResult<()> {
        self.angles.validate()?;
        let scales = self.scales.values()?;
        if scales.iter().any(|&s| s <= 0.0) {
            return Err(ShapeMatchError::InvalidSampling {
                reason: "scales must be > 0",
            });
        }
        Ok(())
    }
}

/// Enumerates and renders poses of one training image.
#[derive(Clone, Debug)]
pub struct PoseEnumerator {
    image: OwnedImage,
    mask: OwnedImage,
}

impl PoseEnumerator {
    /// Creates an enumerator; a missing mask selects the whole image.
    pub fn new(image: ImageView<'_, u8>, mask: Option<ImageView<'_, u8>>) -> ShapeMatchResult<Self> {
        check_channels(image)?;
        let mask = match mask {
            Some(mask) => {
                check_mask(image, mask)?;
                OwnedImage::from_view(mask)?
            }
            None => OwnedImage::new(
                vec![255u8; image.width() * image.height()],
                image.width(),
                image.height(),
            )?,
        };
        Ok(Self {
            image: OwnedImage::from_view(image)?,
            mask,
        })
    }

    /// Training image.
    pub fn image(&self) -> &OwnedImage {
        &self.image
    }

    /// Training mask.
    pub fn mask(&self) -> &OwnedImage {
        &self.mask
    }

    /// Center every pose is rendered about, in image coordinates.
    pub fn center(&self) -> Point2 {
        Point2::new(
            self.image.width() as f32 * 0.5,
            self.image.height() as f32 * 0.5,
        )
    }

    /// Lists poses with scales in the outer loop and angles in the inner one.
    pub fn produce_poses(&self, config: &PoseConfig) -> ShapeMatchResult<Vec<Pose>> {
        config.validate()?;
        let scales = config.scales.values()?;
        let angles = config.angles.angle_values()?;
        let mut poses = Vec::with_capacity(scales.len() * angles.len());
        for &scale in &scales {
            for &angle in &angles {
                poses.push(Pose::new(angle, scale));
            }
        }
        Ok(poses)
    }

    /// Renders the image of a pose (bilinear, zero fill).
    pub fn image_of(&self, pose: &Pose) -> ShapeMatchResult<OwnedImage> {
        warp_u8_bilinear(self.image.view(), pose.angle, pose.scale, 0)
    }

    /// Renders the mask of a pose (nearest neighbour).
    pub fn mask_of(&self, pose: &Pose) -> ShapeMatchResult<OwnedImage> {
        warp_mask_nearest(self.mask.view(), pose.angle, pose.scale)
    }

    /// Renders image and mask of a pose.
    pub fn render(&self, pose: &Pose) -> ShapeMatchResult<(OwnedImage, OwnedImage)> {
        Ok((self.image_of(pose)?, self.mask_of(pose)?))
    }
}

#[cfg(test)]
mod tests {
    use super::{Pose, PoseConfig, PoseEnumerator, Sampling};
    use crate::image::OwnedImage;

    fn enumerator() -> PoseEnumerator {
        let img = OwnedImage::new(vec![50u8; 32 * 24], 32, 24).unwrap();
        PoseEnumerator::new(img.view(), None).unwrap()
    }

    #[test]
    fn poses_iterate_scales_outer_angles_inner() {
        let config = PoseConfig {
            angles: Sampling::range(0.0, 20.0, 10.0),
            scales: Sampling::List(vec![0.5, 1.0]),
        };
        let poses = enumerator().produce_poses(&config).unwrap();
        assert_eq!(
            poses,
            vec![
                Pose::new(0.0, 0.5),
                Pose::new(10.0, 0.5),
                Pose::new(20.0, 0.5),
                Pose::new(0.0, 1.0),
                Pose::new(10.0, 1.0),
                Pose::new(20.0, 1.0),
            ]
        );
    }

    #[test]
    fn full_turn_library_has_one_pose_per_degree() {
        let config = PoseConfig {
            angles: Sampling::range(0.0, 360.0, 1.0),
            scales: Sampling::Fixed(1.0),
        };
        assert_eq!(enumerator().produce_poses(&config).unwrap().len(), 360);
    }

    #[test]
    fn default_mask_covers_image_and_rotates() {
        let shapes = enumerator();
        assert!(shapes.mask().data().iter().all(|&v| v == 255));
        let (img, mask) = shapes.render(&Pose::new(45.0, 1.0)).unwrap();
        assert_eq!((img.width(), img.height()), (32, 24));
        // Rotated corners fall outside the source.
        assert_eq!(mask.data()[0], 0);
        assert_eq!(mask.data()[12 * 32 + 16], 255);
        assert_eq!(shapes.center().x, 16.0);
    }

    #[test]
    fn non_positive_scale_is_rejected() {
        let config = PoseConfig {
            angles: Sampling::Fixed(0.0),
            scales: Sampling::List(vec![1.0, 0.0]),
        };
        assert!(enumerator().produce_poses(&config).is_err());
    }

    #[test]
    fn mismatched_mask_is_rejected() {
        let img = OwnedImage::zeros(8, 8, 3).unwrap();
        let mask = OwnedImage::zeros(8, 7, 1).unwrap();
        assert!(PoseEnumerator::new(img.view(), Some(mask.view())).is_err());
    }
}
