//! Rotation and scaling of training images and masks.
//!
//! Both warps are performed about `cx = w / 2`, `cy = h / 2`, the same center
//! `Detector::add_template_rotate` callers pass for a full-image pose library.
//! Positive angles rotate counter-clockwise as displayed. Each destination
//! pixel `(x, y)` is mapped back to the source with the inverse similarity
//! transform; the output keeps the input dimensions.

use crate::image::{ImageView, OwnedImage};
use crate::util::math::sin_cos_deg;
use crate::util::{ShapeMatchError, ShapeMatchResult};

/// Inverse mapping from destination to source pixel coordinates.
#[derive(Clone, Copy, Debug)]
struct InverseWarp {
    cos_s: f32,
    sin_s: f32,
    cx: f32,
    cy: f32,
}

impl InverseWarp {
    fn new(width: usize, height: usize, angle_deg: f32, scale: f32) -> ShapeMatchResult<Self> {
        if !scale.is_finite() || scale <= 0.0 {
            return Err(ShapeMatchError::InvalidInput("scale must be > 0"));
        }
        if !angle_deg.is_finite() {
            return Err(ShapeMatchError::InvalidInput("angle must be finite"));
        }
        let (sin_a, cos_a) = sin_cos_deg(angle_deg);
        Ok(Self {
            cos_s: cos_a / scale,
            sin_s: sin_a / scale,
            cx: width as f32 * 0.5,
            cy: height as f32 * 0.5,
        })
    }

    #[inline]
    fn source_of(&self, x: usize, y: usize) -> (f32, f32) {
        let dx = x as f32 - self.cx;
        let dy = y as f32 - self.cy;
        (
            self.cos_s * dx - self.sin_s * dy + self.cx,
            self.sin_s * dx + self.cos_s * dy + self.cy,
        )
    }
}

/// Rotates and scales an interleaved image with bilinear sampling.
///
/// Source samples outside the image contribute `fill`, so edges blend into
/// the fill value the way a constant border does.
pub fn warp_u8_bilinear(
    src: ImageView<'_, u8>,
    angle_deg: f32,
    scale: f32,
    fill: u8,
) -> ShapeMatchResult<OwnedImage> {
    let width = src.width();
    let height = src.height();
    let channels = src.channels();
    let warp = InverseWarp::new(width, height, angle_deg, scale)?;
    let mut out = vec![fill; width * height * channels];

    let sample = |x: i64, y: i64, c: usize| -> f32 {
        if x < 0 || y < 0 {
            return fill as f32;
        }
        src.pixel(x as usize, y as usize)
            .and_then(|px| px.get(c))
            .map_or(fill as f32, |&v| v as f32)
    };

    for y in 0..height {
        for x in 0..width {
            let (src_x, src_y) = warp.source_of(x, y);
            if src_x <= -1.0 || src_y <= -1.0 || src_x >= width as f32 || src_y >= height as f32 {
                continue;
            }
            let x0 = src_x.floor();
            let y0 = src_y.floor();
            let fx = src_x - x0;
            let fy = src_y - y0;
            let (x0, y0) = (x0 as i64, y0 as i64);

            let w00 = (1.0 - fx) * (1.0 - fy);
            let w10 = fx * (1.0 - fy);
            let w01 = (1.0 - fx) * fy;
            let w11 = fx * fy;
            let base = (y * width + x) * channels;
            for c in 0..channels {
                let value = sample(x0, y0, c) * w00
                    + sample(x0 + 1, y0, c) * w10
                    + sample(x0, y0 + 1, c) * w01
                    + sample(x0 + 1, y0 + 1, c) * w11;
                out[base + c] = value.round().clamp(0.0, 255.0) as u8;
            }
        }
    }

    OwnedImage::with_channels(out, width, height, channels)
}

/// Rotates and scales a single-channel mask with nearest-neighbour sampling.
///
/// Pixels mapping outside the source become `0`.
pub fn warp_mask_nearest(
    src: ImageView<'_, u8>,
    angle_deg: f32,
    scale: f32,
) -> ShapeMatchResult<OwnedImage> {
    if src.channels() != 1 {
        return Err(ShapeMatchError::UnsupportedChannels {
            channels: src.channels(),
        });
    }
    let width = src.width();
    let height = src.height();
    let warp = InverseWarp::new(width, height, angle_deg, scale)?;
    let mut out = vec![0u8; width * height];

    for y in 0..height {
        for x in 0..width {
            let (src_x, src_y) = warp.source_of(x, y);
            let nx = src_x.round();
            let ny = src_y.round();
            if nx < 0.0 || ny < 0.0 {
                continue;
            }
            if let Some(&v) = src.get(nx as usize, ny as usize) {
                out[y * width + x] = v;
            }
        }
    }

    OwnedImage::new(out, width, height)
}
