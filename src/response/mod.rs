//! Spread orientations and per-bin response maps.
//!
//! Spreading ORs every quantized orientation over a `T x T` window so that a
//! template feature still finds its orientation when the object is displaced
//! by less than `T` pixels. Response maps then precompute, for each of the 8
//! template orientations, the similarity against every spread pixel: the
//! matching engine only needs table lookups and additions.

use crate::gradient::{quantize_gradients, QuantizedGradients, ORIENTATION_BINS};
use crate::image::pyramid::ImagePyramid;
use crate::image::ImageView;
use crate::trace::{trace_event, trace_span};
use crate::util::{ShapeMatchError, ShapeMatchResult};

/// Response of an exact orientation match.
pub const EXACT_RESPONSE: u8 = 4;
/// Response of a circularly adjacent orientation.
pub const NEIGHBOR_RESPONSE: u8 = 3;

/// ORs the `t x t` window starting at each pixel (clipped at the border).
pub fn spread(quantized: &[u8], width: usize, height: usize, t: usize) -> Vec<u8> {
    let mut out = vec![0u8; width * height];
    if t == 0 || quantized.len() < width * height {
        return out;
    }
    // Horizontal then vertical pass; OR is separable over a box.
    let mut rows = vec![0u8; width * height];
    for y in 0..height {
        let row = &quantized[y * width..(y + 1) * width];
        for x in 0..width {
            let end = (x + t).min(width);
            rows[y * width + x] = row[x..end].iter().fold(0, |acc, &v| acc | v);
        }
    }
    for y in 0..height {
        let end = (y + t).min(height);
        for x in 0..width {
            let mut acc = 0u8;
            for ny in y..end {
                acc |= rows[ny * width + x];
            }
            out[y * width + x] = acc;
        }
    }
    out
}

/// Similarity between a template orientation and one image orientation bit.
#[inline]
fn bin_similarity(template_bin: usize, image_bin: usize) -> u8 {
    let diff = (template_bin + ORIENTATION_BINS - image_bin) % ORIENTATION_BINS;
    match diff.min(ORIENTATION_BINS - diff) {
        0 => EXACT_RESPONSE,
        1 => NEIGHBOR_RESPONSE,
        _ => 0,
    }
}

/// Lookup table indexed by `[template_bin][spread_byte]`.
pub struct SimilarityTable {
    table: [[u8; 256]; ORIENTATION_BINS],
}

impl SimilarityTable {
    /// Builds the table: best response over the bits set in each byte.
    pub fn new() -> Self {
        let mut table = [[0u8; 256]; ORIENTATION_BINS];
        for (bin, row) in table.iter_mut().enumerate() {
            for (byte, entry) in row.iter_mut().enumerate() {
                *entry = (0..ORIENTATION_BINS)
                    .filter(|&bit| byte & (1 << bit) != 0)
                    .map(|bit| bin_similarity(bin, bit))
                    .max()
                    .unwrap_or(0);
            }
        }
        Self { table }
    }

    /// Returns the response of `template_bin` against a spread byte.
    #[inline]
    pub fn response(&self, template_bin: u8, spread_byte: u8) -> u8 {
        self.table[template_bin as usize % ORIENTATION_BINS][spread_byte as usize]
    }
}

impl Default for SimilarityTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Dense response maps of one pyramid level.
#[derive(Clone, Debug)]
pub struct ResponseMaps {
    width: usize,
    height: usize,
    spread_t: usize,
    maps: Vec<Vec<u8>>,
    exact: Vec<Vec<u8>>,
    strength: Vec<f32>,
}

impl ResponseMaps {
    /// Builds response maps from one-hot quantized orientations.
    pub fn from_quantized(
        quantized: &[u8],
        width: usize,
        height: usize,
        spread_t: usize,
    ) -> ShapeMatchResult<Self> {
        if spread_t == 0 {
            return Err(ShapeMatchError::InvalidInput("spreading factor must be > 0"));
        }
        if quantized.len() != width * height {
            return Err(ShapeMatchError::BufferTooSmall {
                needed: width * height,
                got: quantized.len(),
            });
        }
        let table = SimilarityTable::new();
        let spread_map = spread(quantized, width, height, spread_t);
        let build = |source: &[u8]| -> Vec<Vec<u8>> {
            (0..ORIENTATION_BINS as u8)
                .map(|bin| source.iter().map(|&b| table.response(bin, b)).collect())
                .collect()
        };
        Ok(Self {
            width,
            height,
            spread_t,
            maps: build(&spread_map),
            exact: build(quantized),
            strength: vec![0.0; width * height],
        })
    }

    /// Builds response maps from quantized gradients, keeping the squared
    /// magnitude of oriented pixels as edge strength.
    pub fn from_gradients(grads: &QuantizedGradients, spread_t: usize) -> ShapeMatchResult<Self> {
        let mut maps =
            Self::from_quantized(grads.quantized(), grads.width(), grads.height(), spread_t)?;
        maps.strength = grads
            .magnitude()
            .iter()
            .zip(grads.quantized())
            .map(|(&mag, &q)| if q == 0 { 0.0 } else { mag })
            .collect();
        Ok(maps)
    }

    /// Width of the level in pixels.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Height of the level in pixels.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Spreading factor `T` used for this level.
    pub fn spread_t(&self) -> usize {
        self.spread_t
    }

    /// Spread response of `bin` at `(x, y)`; `0` outside the level.
    #[inline]
    pub fn response(&self, bin: u8, x: usize, y: usize) -> u8 {
        if x >= self.width || y >= self.height {
            return 0;
        }
        self.maps[bin as usize % ORIENTATION_BINS][y * self.width + x]
    }

    /// Unspread response of `bin` at `(x, y)`; `0` outside the level.
    #[inline]
    pub fn exact_response(&self, bin: u8, x: usize, y: usize) -> u8 {
        if x >= self.width || y >= self.height {
            return 0;
        }
        self.exact[bin as usize % ORIENTATION_BINS][y * self.width + x]
    }

    /// Squared gradient magnitude at `(x, y)` where an orientation was kept,
    /// `0` elsewhere.
    #[inline]
    pub fn strength(&self, x: usize, y: usize) -> f32 {
        if x >= self.width || y >= self.height {
            return 0.0;
        }
        self.strength[y * self.width + x]
    }
}

/// Builds one `ResponseMaps` per entry of `spread_factors`, halving the image
/// between levels.
pub fn build_response_pyramid(
    image: ImageView<'_, u8>,
    weak_threshold: f32,
    spread_factors: &[usize],
) -> ShapeMatchResult<Vec<ResponseMaps>> {
    let _span = trace_span!(
        "response_maps",
        width = image.width(),
        height = image.height(),
        levels = spread_factors.len()
    )
    .entered();

    let pyramid = ImagePyramid::build_u8(image, spread_factors.len())?;
    let mut levels = Vec::with_capacity(spread_factors.len());
    for (level, &t) in pyramid.levels().iter().zip(spread_factors) {
        let grads = quantize_gradients(level.view(), None, weak_threshold)?;
        levels.push(ResponseMaps::from_gradients(&grads, t)?);
    }
    trace_event!("response_levels", count = levels.len());
    Ok(levels)
}
