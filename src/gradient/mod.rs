//! Gradient orientation quantization.
//!
//! The quantizer smooths the input, takes Sobel derivatives per channel and
//! keeps, per pixel, the channel with the strongest response. Orientations are
//! bucketed into 16 directions and folded to 8 polarity-free bins of 22.5
//! degrees. A pixel above the weak threshold only keeps a bin when at least
//! five of the nine pixels in its 3x3 neighbourhood vote for that bin; this
//! voting is what makes the representation stable under lighting changes and
//! sensor noise.
//!
//! Quantized maps store a one-hot byte `1 << bin`; `0` means "no feature".

pub(crate) mod filter;

use crate::image::{check_channels, check_mask, ImageView};
use crate::util::math::wrap_deg_360;
use crate::util::ShapeMatchResult;
use filter::{convolve_separable, gaussian_kernel, sobel, GAUSSIAN_SIGMA, GAUSSIAN_SIZE};

/// Number of orientation bins.
pub const ORIENTATION_BINS: usize = 8;

/// Minimum number of agreeing votes in a 3x3 neighbourhood.
const NEIGHBOR_VOTES: u8 = 5;

/// Returns the orientation bin of an angle in degrees.
#[inline]
pub fn bin_of_angle(angle_deg: f32) -> u8 {
    let angle = wrap_deg_360(angle_deg);
    ((angle * 16.0 / 360.0) as i32 & 7) as u8
}

/// Returns the bin index encoded in a one-hot quantized byte.
#[inline]
pub fn bin_of_mask(quantized: u8) -> Option<u8> {
    if quantized == 0 {
        None
    } else {
        Some(quantized.trailing_zeros() as u8)
    }
}

/// Dense quantized gradient representation of one image.
#[derive(Clone, Debug)]
pub struct QuantizedGradients {
    width: usize,
    height: usize,
    magnitude: Vec<f32>,
    angle: Vec<f32>,
    quantized: Vec<u8>,
}

impl QuantizedGradients {
    /// Returns the width in pixels.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Returns the height in pixels.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Squared gradient magnitude, row-major.
    pub fn magnitude(&self) -> &[f32] {
        &self.magnitude
    }

    /// Gradient direction in degrees `[0, 360)`, row-major.
    pub fn angle(&self) -> &[f32] {
        &self.angle
    }

    /// One-hot orientation bytes, row-major; `0` marks pixels without a bin.
    pub fn quantized(&self) -> &[u8] {
        &self.quantized
    }

    /// Returns the one-hot orientation at `(x, y)`, `0` outside the image.
    pub fn quantized_at(&self, x: usize, y: usize) -> u8 {
        if x >= self.width || y >= self.height {
            return 0;
        }
        self.quantized[y * self.width + x]
    }
}

/// Quantizes gradient orientations of `image`.
///
/// `weak_threshold` is compared against the gradient magnitude (not squared).
/// When a mask is given, pixels where it is zero carry no orientation.
pub fn quantize_gradients(
    image: ImageView<'_, u8>,
    mask: Option<ImageView<'_, u8>>,
    weak_threshold: f32,
) -> ShapeMatchResult<QuantizedGradients> {
    check_channels(image)?;
    if let Some(mask) = mask {
        check_mask(image, mask)?;
    }

    let width = image.width();
    let height = image.height();
    let channels = image.channels();
    let len = width * height;
    let kernel = gaussian_kernel(GAUSSIAN_SIZE, GAUSSIAN_SIGMA);

    let mut best_dx = vec![0.0f32; len];
    let mut best_dy = vec![0.0f32; len];
    let mut magnitude = vec![0.0f32; len];
    // Alpha carries no shape information.
    let color_channels = channels.min(3);
    for c in 0..color_channels {
        let mut plane = Vec::with_capacity(len);
        for y in 0..height {
            if let Some(row) = image.row(y) {
                plane.extend(row.iter().skip(c).step_by(channels).map(|&v| v as f32));
            }
        }
        let smoothed = convolve_separable(&plane, width, height, &kernel);
        let (dx, dy) = sobel(&smoothed, width, height);
        for i in 0..len {
            let mag = dx[i] * dx[i] + dy[i] * dy[i];
            if mag > magnitude[i] {
                magnitude[i] = mag;
                best_dx[i] = dx[i];
                best_dy[i] = dy[i];
            }
        }
    }

    let angle: Vec<f32> = best_dx
        .iter()
        .zip(&best_dy)
        .map(|(&dx, &dy)| wrap_deg_360(dy.atan2(dx).to_degrees()))
        .collect();
    let buckets: Vec<u8> = angle.iter().map(|&a| bin_of_angle(a)).collect();

    let threshold_sq = weak_threshold * weak_threshold;
    let mut quantized = vec![0u8; len];
    if width >= 3 && height >= 3 {
        for y in 1..height - 1 {
            for x in 1..width - 1 {
                let idx = y * width + x;
                if magnitude[idx] <= threshold_sq {
                    continue;
                }
                if let Some(mask) = mask {
                    if mask.get(x, y).copied().unwrap_or(0) == 0 {
                        continue;
                    }
                }
                let mut histogram = [0u8; ORIENTATION_BINS];
                for ny in y - 1..=y + 1 {
                    let base = ny * width;
                    for nx in x - 1..=x + 1 {
                        histogram[buckets[base + nx] as usize] += 1;
                    }
                }
                let (best_bin, votes) = histogram.iter().enumerate().fold(
                    (0usize, 0u8),
                    |best, (bin, &count)| if count > best.1 { (bin, count) } else { best },
                );
                if votes >= NEIGHBOR_VOTES {
                    quantized[idx] = 1u8 << best_bin;
                }
            }
        }
    }

    Ok(QuantizedGradients {
        width,
        height,
        magnitude,
        angle,
        quantized,
    })
}

#[cfg(test)]
mod tests {
    use super::{bin_of_angle, bin_of_mask, quantize_gradients};
    use crate::image::{ImageView, OwnedImage};

    fn vertical_edge(width: usize, height: usize, edge_x: usize) -> Vec<u8> {
        (0..width * height)
            .map(|i| if i % width >= edge_x { 200 } else { 20 })
            .collect()
    }

    #[test]
    fn bins_fold_opposite_directions() {
        assert_eq!(bin_of_angle(0.0), 0);
        assert_eq!(bin_of_angle(180.0), 0);
        assert_eq!(bin_of_angle(23.0), 1);
        assert_eq!(bin_of_angle(203.0), 1);
        assert_eq!(bin_of_angle(359.0), 7);
        assert_eq!(bin_of_angle(-1.0), 7);
    }

    #[test]
    fn one_hot_bytes_decode_to_bins() {
        assert_eq!(bin_of_mask(0), None);
        assert_eq!(bin_of_mask(1), Some(0));
        assert_eq!(bin_of_mask(1 << 5), Some(5));
    }

    #[test]
    fn vertical_edge_quantizes_to_horizontal_gradient() {
        let data = vertical_edge(24, 16, 12);
        let view = ImageView::from_slice(&data, 24, 16).unwrap();
        let q = quantize_gradients(view, None, 30.0).unwrap();

        assert_eq!(q.quantized_at(12, 8), 1);
        assert_eq!(q.quantized_at(11, 8), 1);
        // Flat regions and the image border carry no orientation.
        assert_eq!(q.quantized_at(3, 8), 0);
        assert_eq!(q.quantized_at(12, 0), 0);
    }

    #[test]
    fn mask_suppresses_orientations() {
        let data = vertical_edge(24, 16, 12);
        let view = ImageView::from_slice(&data, 24, 16).unwrap();
        let mask = OwnedImage::zeros(24, 16, 1).unwrap();
        let q = quantize_gradients(view, Some(mask.view()), 30.0).unwrap();
        assert!(q.quantized().iter().all(|&v| v == 0));
    }

    #[test]
    fn color_input_keeps_strongest_channel() {
        let width = 24;
        let height = 16;
        let mut data = vec![0u8; width * height * 3];
        for y in 0..height {
            for x in 0..width {
                let idx = (y * width + x) * 3;
                // Only the green channel carries a horizontal edge.
                data[idx + 1] = if y >= 8 { 220 } else { 10 };
            }
        }
        let view = ImageView::with_channels(&data, width, height, 3).unwrap();
        let q = quantize_gradients(view, None, 30.0).unwrap();
        // Gradient points down (+y), i.e. 90 degrees, which lands in bin 4.
        assert_eq!(q.quantized_at(10, 8), 1 << 4);
    }

    #[test]
    fn rejects_two_channel_images() {
        let data = vec![0u8; 8 * 8 * 2];
        let view = ImageView::with_channels(&data, 8, 8, 2).unwrap();
        assert!(quantize_gradients(view, None, 30.0).is_err());
    }
}
