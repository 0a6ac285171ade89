//! Image pyramid construction for interleaved `u8` images.
//!
//! Downsampling uses a 2x2 box filter with integer rounding per channel:
//! `dst = ((a + b + c + d) + 2) / 4`. Masks use a conservative rule instead:
//! a destination pixel is set only when all four source pixels are set, so
//! downsampled masks never grow past the object boundary.

use crate::image::{ImageView, OwnedImage};
use crate::util::{ShapeMatchError, ShapeMatchResult};

/// Downsamples an interleaved image by two with a 2x2 box filter.
pub fn downsample_u8(src: ImageView<'_, u8>) -> ShapeMatchResult<OwnedImage> {
    let channels = src.channels();
    let dst_width = src.width() / 2;
    let dst_height = src.height() / 2;
    if dst_width == 0 || dst_height == 0 {
        return Err(ShapeMatchError::InvalidDimensions {
            width: dst_width,
            height: dst_height,
        });
    }

    let mut dst = Vec::with_capacity(dst_width * dst_height * channels);
    for y in 0..dst_height {
        let (row0, row1) = row_pair(src, y)?;
        for x in 0..dst_width {
            let i0 = 2 * x * channels;
            let i1 = i0 + channels;
            for c in 0..channels {
                let sum = u16::from(row0[i0 + c])
                    + u16::from(row0[i1 + c])
                    + u16::from(row1[i0 + c])
                    + u16::from(row1[i1 + c]);
                dst.push(((sum + 2) / 4) as u8);
            }
        }
    }

    OwnedImage::with_channels(dst, dst_width, dst_height, channels)
}

/// Downsamples a single-channel mask by two; a pixel survives only if all
/// four source pixels are non-zero.
pub fn downsample_mask(src: ImageView<'_, u8>) -> ShapeMatchResult<OwnedImage> {
    if src.channels() != 1 {
        return Err(ShapeMatchError::UnsupportedChannels {
            channels: src.channels(),
        });
    }
    let dst_width = src.width() / 2;
    let dst_height = src.height() / 2;
    if dst_width == 0 || dst_height == 0 {
        return Err(ShapeMatchError::InvalidDimensions {
            width: dst_width,
            height: dst_height,
        });
    }

    let mut dst = Vec::with_capacity(dst_width * dst_height);
    for y in 0..dst_height {
        let (row0, row1) = row_pair(src, y)?;
        for x in 0..dst_width {
            let all_set = row0[2 * x] != 0
                && row0[2 * x + 1] != 0
                && row1[2 * x] != 0
                && row1[2 * x + 1] != 0;
            dst.push(if all_set { 255 } else { 0 });
        }
    }

    OwnedImage::new(dst, dst_width, dst_height)
}

fn row_pair<'a>(src: ImageView<'a, u8>, y: usize) -> ShapeMatchResult<(&'a [u8], &'a [u8])> {
    let missing = |row: usize| ShapeMatchError::BufferTooSmall {
        needed: (row + 1).saturating_mul(src.stride()),
        got: src.as_slice().len(),
    };
    let row0 = src.row(y * 2).ok_or_else(|| missing(y * 2))?;
    let row1 = src.row(y * 2 + 1).ok_or_else(|| missing(y * 2 + 1))?;
    Ok((row0, row1))
}

/// Owned image pyramid built from a base level.
pub struct ImagePyramid {
    levels: Vec<OwnedImage>,
}

impl ImagePyramid {
    /// Builds a pyramid with exactly `num_levels` levels.
    ///
    /// Fails with `InvalidDimensions` when the image is too small to be halved
    /// `num_levels - 1` times; a match over fewer levels than configured would
    /// silently change the spreading schedule.
    pub fn build_u8(base: ImageView<'_, u8>, num_levels: usize) -> ShapeMatchResult<Self> {
        let num_levels = num_levels.max(1);
        let mut levels = Vec::with_capacity(num_levels);
        levels.push(OwnedImage::from_view(base)?);
        while levels.len() < num_levels {
            let next = match levels.last() {
                Some(prev) => downsample_u8(prev.view())?,
                None => break,
            };
            levels.push(next);
        }
        Ok(Self { levels })
    }

    /// Returns all pyramid levels (level 0 is the base resolution).
    pub fn levels(&self) -> &[OwnedImage] {
        &self.levels
    }

    /// Returns a view for a specific pyramid level.
    pub fn level(&self, index: usize) -> Option<ImageView<'_, u8>> {
        self.levels.get(index).map(|level| level.view())
    }

    /// Returns the number of levels.
    pub fn len(&self) -> usize {
        self.levels.len()
    }

    /// Returns true when the pyramid has no levels.
    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }
}
