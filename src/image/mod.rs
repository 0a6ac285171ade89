//! Image views, owned buffers and pyramid utilities.
//!
//! `ImageView` is a borrowed 2D view into a 1D buffer with an explicit stride.
//! Pixels are stored interleaved with `channels` elements per pixel; the
//! stride counts elements between the starts of consecutive rows, so a stride
//! larger than `width * channels` represents padded rows. ROI slices are
//! zero-copy views into the same backing slice and retain the original stride.

use crate::util::{ShapeMatchError, ShapeMatchResult};

#[cfg(feature = "image-io")]
pub mod io;
pub mod pyramid;

/// Borrowed 2D image view with interleaved channels and an explicit stride.
#[derive(Copy, Clone, Debug)]
pub struct ImageView<'a, T> {
    data: &'a [T],
    width: usize,
    height: usize,
    channels: usize,
    stride: usize,
}

impl<'a, T> ImageView<'a, T> {
    /// Creates a contiguous single-channel view with `stride == width`.
    pub fn from_slice(data: &'a [T], width: usize, height: usize) -> ShapeMatchResult<Self> {
        Self::new(data, width, height, 1, width)
    }

    /// Creates a contiguous interleaved view with `stride == width * channels`.
    pub fn with_channels(
        data: &'a [T],
        width: usize,
        height: usize,
        channels: usize,
    ) -> ShapeMatchResult<Self> {
        let stride = width
            .checked_mul(channels)
            .ok_or(ShapeMatchError::InvalidDimensions { width, height })?;
        Self::new(data, width, height, channels, stride)
    }

    /// Creates a view with an explicit channel count and stride.
    pub fn new(
        data: &'a [T],
        width: usize,
        height: usize,
        channels: usize,
        stride: usize,
    ) -> ShapeMatchResult<Self> {
        if channels == 0 {
            return Err(ShapeMatchError::UnsupportedChannels { channels });
        }
        let needed = required_len(width, height, channels, stride)?;
        if data.len() < needed {
            return Err(ShapeMatchError::BufferTooSmall {
                needed,
                got: data.len(),
            });
        }
        Ok(Self {
            data,
            width,
            height,
            channels,
            stride,
        })
    }

    /// Returns the image width in pixels.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Returns the image height in pixels.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Returns the number of interleaved channels per pixel.
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Returns the stride in elements between row starts.
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Returns the backing slice including any row padding.
    pub fn as_slice(&self) -> &'a [T] {
        self.data
    }

    /// Returns the pixel at `(x, y)` (all channels) if it is within bounds.
    pub fn pixel(&self, x: usize, y: usize) -> Option<&'a [T]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let start = y
            .checked_mul(self.stride)?
            .checked_add(x.checked_mul(self.channels)?)?;
        self.data.get(start..start + self.channels)
    }

    /// Returns the first-channel element at `(x, y)` if it is within bounds.
    pub fn get(&self, x: usize, y: usize) -> Option<&'a T> {
        self.pixel(x, y).and_then(|px| px.first())
    }

    /// Returns a contiguous slice for row `y` with length `width * channels`.
    pub fn row(&self, y: usize) -> Option<&'a [T]> {
        if y >= self.height {
            return None;
        }
        let start = y.checked_mul(self.stride)?;
        let end = start.checked_add(self.width * self.channels)?;
        self.data.get(start..end)
    }

    /// Returns a zero-copy ROI view into the same backing buffer.
    pub fn roi(
        &self,
        x: usize,
        y: usize,
        width: usize,
        height: usize,
    ) -> ShapeMatchResult<ImageView<'a, T>> {
        if width == 0 || height == 0 {
            return Err(ShapeMatchError::InvalidDimensions { width, height });
        }
        let fits = x
            .checked_add(width)
            .zip(y.checked_add(height))
            .is_some_and(|(end_x, end_y)| end_x <= self.width && end_y <= self.height);
        if !fits {
            return Err(ShapeMatchError::InvalidInput("roi exceeds image bounds"));
        }

        let start = y
            .checked_mul(self.stride)
            .and_then(|v| v.checked_add(x * self.channels))
            .ok_or(ShapeMatchError::InvalidDimensions {
                width: self.width,
                height: self.height,
            })?;
        let data = self
            .data
            .get(start..)
            .ok_or(ShapeMatchError::BufferTooSmall {
                needed: start.saturating_add(1),
                got: self.data.len(),
            })?;

        ImageView::new(data, width, height, self.channels, self.stride)
    }
}

fn required_len(
    width: usize,
    height: usize,
    channels: usize,
    stride: usize,
) -> ShapeMatchResult<usize> {
    if width == 0 || height == 0 {
        return Err(ShapeMatchError::InvalidDimensions { width, height });
    }
    let row_len = width
        .checked_mul(channels)
        .ok_or(ShapeMatchError::InvalidDimensions { width, height })?;
    if stride < row_len {
        return Err(ShapeMatchError::InvalidStride { row_len, stride });
    }
    let needed = (height - 1)
        .checked_mul(stride)
        .and_then(|v| v.checked_add(row_len))
        .ok_or(ShapeMatchError::InvalidDimensions { width, height })?;
    Ok(needed)
}

/// Owned contiguous `u8` image buffer with interleaved channels.
#[derive(Clone, Debug, PartialEq)]
pub struct OwnedImage {
    data: Vec<u8>,
    width: usize,
    height: usize,
    channels: usize,
}

impl OwnedImage {
    /// Creates a single-channel image from a contiguous buffer.
    pub fn new(data: Vec<u8>, width: usize, height: usize) -> ShapeMatchResult<Self> {
        Self::with_channels(data, width, height, 1)
    }

    /// Creates an interleaved image from a contiguous buffer.
    pub fn with_channels(
        data: Vec<u8>,
        width: usize,
        height: usize,
        channels: usize,
    ) -> ShapeMatchResult<Self> {
        if channels == 0 {
            return Err(ShapeMatchError::UnsupportedChannels { channels });
        }
        if width == 0 || height == 0 {
            return Err(ShapeMatchError::InvalidDimensions { width, height });
        }
        let needed = width
            .checked_mul(height)
            .and_then(|v| v.checked_mul(channels))
            .ok_or(ShapeMatchError::InvalidDimensions { width, height })?;
        if data.len() < needed {
            return Err(ShapeMatchError::BufferTooSmall {
                needed,
                got: data.len(),
            });
        }
        if data.len() > needed {
            return Err(ShapeMatchError::InvalidDimensions { width, height });
        }
        Ok(Self {
            data,
            width,
            height,
            channels,
        })
    }

    /// Creates a zero-filled image.
    pub fn zeros(width: usize, height: usize, channels: usize) -> ShapeMatchResult<Self> {
        let len = width
            .checked_mul(height)
            .and_then(|v| v.checked_mul(channels))
            .ok_or(ShapeMatchError::InvalidDimensions { width, height })?;
        Self::with_channels(vec![0u8; len], width, height, channels)
    }

    /// Copies a (possibly strided) view into a contiguous buffer.
    pub fn from_view(view: ImageView<'_, u8>) -> ShapeMatchResult<Self> {
        let row_len = view.width() * view.channels();
        let mut data = Vec::with_capacity(row_len * view.height());
        for y in 0..view.height() {
            let row = view.row(y).ok_or(ShapeMatchError::BufferTooSmall {
                needed: (y + 1) * view.stride(),
                got: view.as_slice().len(),
            })?;
            data.extend_from_slice(row);
        }
        Self::with_channels(data, view.width(), view.height(), view.channels())
    }

    /// Returns a borrowed view of the image.
    pub fn view(&self) -> ImageView<'_, u8> {
        ImageView {
            data: &self.data,
            width: self.width,
            height: self.height,
            channels: self.channels,
            stride: self.width * self.channels,
        }
    }

    /// Returns the image width in pixels.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Returns the image height in pixels.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Returns the number of interleaved channels per pixel.
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Returns the contiguous pixel buffer.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Returns the contiguous pixel buffer for in-place edits.
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Consumes the image and returns its buffer.
    pub fn into_data(self) -> Vec<u8> {
        self.data
    }
}

/// Checks that `mask` is a single-channel plane with the same size as `image`.
pub(crate) fn check_mask(
    image: ImageView<'_, u8>,
    mask: ImageView<'_, u8>,
) -> ShapeMatchResult<()> {
    if mask.channels() != 1 {
        return Err(ShapeMatchError::UnsupportedChannels {
            channels: mask.channels(),
        });
    }
    if mask.width() != image.width() || mask.height() != image.height() {
        return Err(ShapeMatchError::ShapeMismatch {
            image_width: image.width(),
            image_height: image.height(),
            mask_width: mask.width(),
            mask_height: mask.height(),
        });
    }
    Ok(())
}

/// Checks that an image uses one of the channel layouts the quantizer accepts.
pub(crate) fn check_channels(image: ImageView<'_, u8>) -> ShapeMatchResult<()> {
    match image.channels() {
        1 | 3 | 4 => Ok(()),
        channels => Err(ShapeMatchError::UnsupportedChannels { channels }),
    }
}
