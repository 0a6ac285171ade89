//! Convenience helpers for loading images via the `image` crate.
//!
//! Available when the `image-io` feature is enabled.

use crate::image::{ImageView, OwnedImage};
use crate::util::{ShapeMatchError, ShapeMatchResult};
use std::path::Path;

/// Creates a borrowed view from a grayscale image buffer.
pub fn view_from_gray_image(img: &image::GrayImage) -> ShapeMatchResult<ImageView<'_, u8>> {
    ImageView::from_slice(img.as_raw(), img.width() as usize, img.height() as usize)
}

/// Creates a borrowed interleaved view from an RGB image buffer.
pub fn view_from_rgb_image(img: &image::RgbImage) -> ShapeMatchResult<ImageView<'_, u8>> {
    ImageView::with_channels(img.as_raw(), img.width() as usize, img.height() as usize, 3)
}

/// Creates an owned single-channel image from a dynamic image.
pub fn owned_gray_from_dynamic(img: &image::DynamicImage) -> ShapeMatchResult<OwnedImage> {
    let gray = img.to_luma8();
    let (width, height) = (gray.width() as usize, gray.height() as usize);
    OwnedImage::new(gray.into_raw(), width, height)
}

/// Creates an owned three-channel image from a dynamic image.
pub fn owned_rgb_from_dynamic(img: &image::DynamicImage) -> ShapeMatchResult<OwnedImage> {
    let rgb = img.to_rgb8();
    let (width, height) = (rgb.width() as usize, rgb.height() as usize);
    OwnedImage::with_channels(rgb.into_raw(), width, height, 3)
}

fn open<P: AsRef<Path>>(path: P) -> ShapeMatchResult<image::DynamicImage> {
    image::open(path).map_err(|err| ShapeMatchError::ImageIo {
        reason: err.to_string(),
    })
}

/// Loads an image from disk and converts it to a grayscale owned image.
pub fn load_gray_image<P: AsRef<Path>>(path: P) -> ShapeMatchResult<OwnedImage> {
    owned_gray_from_dynamic(&open(path)?)
}

/// Loads an image from disk and converts it to an interleaved RGB image.
pub fn load_rgb_image<P: AsRef<Path>>(path: P) -> ShapeMatchResult<OwnedImage> {
    owned_rgb_from_dynamic(&open(path)?)
}

/// Loads a mask from disk; any non-zero luma value counts as set.
pub fn load_mask<P: AsRef<Path>>(path: P) -> ShapeMatchResult<OwnedImage> {
    let gray = load_gray_image(path)?;
    let (width, height) = (gray.width(), gray.height());
    let data = gray
        .into_data()
        .into_iter()
        .map(|v| if v > 0 { 255 } else { 0 })
        .collect();
    OwnedImage::new(data, width, height)
}
