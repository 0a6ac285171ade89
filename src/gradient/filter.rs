//! Separable Gaussian smoothing and 3x3 Sobel derivatives on `f32` planes.
//!
//! Borders use reflect-101 indexing (`dcb|abcd|cba`).

/// Gaussian kernel size used before differentiation.
pub(crate) const GAUSSIAN_SIZE: usize = 7;
/// Gaussian sigma matching the automatic choice for a 7-tap kernel.
pub(crate) const GAUSSIAN_SIGMA: f32 = 1.4;

#[inline]
pub(crate) fn reflect101(i: isize, n: usize) -> usize {
    if n == 1 {
        return 0;
    }
    let n = n as isize;
    let period = 2 * (n - 1);
    let mut i = i.rem_euclid(period);
    if i >= n {
        i = period - i;
    }
    i as usize
}

pub(crate) fn gaussian_kernel(size: usize, sigma: f32) -> Vec<f32> {
    let half = (size / 2) as f32;
    let denom = 2.0 * sigma * sigma;
    let mut kernel: Vec<f32> = (0..size)
        .map(|i| {
            let d = i as f32 - half;
            (-(d * d) / denom).exp()
        })
        .collect();
    let sum: f32 = kernel.iter().sum();
    for w in kernel.iter_mut() {
        *w /= sum;
    }
    kernel
}

/// Smooths a single plane with a separable kernel.
pub(crate) fn convolve_separable(
    src: &[f32],
    width: usize,
    height: usize,
    kernel: &[f32],
) -> Vec<f32> {
    let half = (kernel.len() / 2) as isize;
    let mut tmp = vec![0.0f32; width * height];
    for y in 0..height {
        let row = &src[y * width..(y + 1) * width];
        for x in 0..width {
            let mut acc = 0.0f32;
            for (k, &w) in kernel.iter().enumerate() {
                let sx = reflect101(x as isize + k as isize - half, width);
                acc += w * row[sx];
            }
            tmp[y * width + x] = acc;
        }
    }

    let mut out = vec![0.0f32; width * height];
    for y in 0..height {
        for (k, &w) in kernel.iter().enumerate() {
            let sy = reflect101(y as isize + k as isize - half, height);
            let src_row = &tmp[sy * width..(sy + 1) * width];
            let dst_row = &mut out[y * width..(y + 1) * width];
            for (d, &s) in dst_row.iter_mut().zip(src_row) {
                *d += w * s;
            }
        }
    }
    out
}

/// Computes Sobel derivatives `(dx, dy)` of a plane.
pub(crate) fn sobel(src: &[f32], width: usize, height: usize) -> (Vec<f32>, Vec<f32>) {
    let mut dx = vec![0.0f32; width * height];
    let mut dy = vec![0.0f32; width * height];
    for y in 0..height {
        let ym = reflect101(y as isize - 1, height) * width;
        let y0 = y * width;
        let yp = reflect101(y as isize + 1, height) * width;
        for x in 0..width {
            let xm = reflect101(x as isize - 1, width);
            let xp = reflect101(x as isize + 1, width);

            let gx = (src[ym + xp] - src[ym + xm])
                + 2.0 * (src[y0 + xp] - src[y0 + xm])
                + (src[yp + xp] - src[yp + xm]);
            let gy = (src[yp + xm] - src[ym + xm])
                + 2.0 * (src[yp + x] - src[ym + x])
                + (src[yp + xp] - src[ym + xp]);
            dx[y0 + x] = gx;
            dy[y0 + x] = gy;
        }
    }
    (dx, dy)
}

#[cfg(test)]
mod tests {
    use super::{convolve_separable, gaussian_kernel, reflect101, sobel};

    #[test]
    fn reflect101_mirrors_without_repeating_edge() {
        assert_eq!(reflect101(-1, 5), 1);
        assert_eq!(reflect101(-2, 5), 2);
        assert_eq!(reflect101(5, 5), 3);
        assert_eq!(reflect101(6, 5), 2);
        assert_eq!(reflect101(3, 1), 0);
    }

    #[test]
    fn gaussian_kernel_is_normalized_and_symmetric() {
        let k = gaussian_kernel(7, 1.4);
        let sum: f32 = k.iter().sum();
        assert!((sum - 1.0).abs() < 1e-5);
        assert!((k[0] - k[6]).abs() < 1e-7);
        assert!(k[3] > k[2]);
    }

    #[test]
    fn smoothing_preserves_constant_planes() {
        let src = vec![42.0f32; 6 * 5];
        let out = convolve_separable(&src, 6, 5, &gaussian_kernel(7, 1.4));
        assert!(out.iter().all(|&v| (v - 42.0).abs() < 1e-3));
    }

    #[test]
    fn sobel_responds_to_horizontal_ramp() {
        let width = 5;
        let height = 4;
        let src: Vec<f32> = (0..width * height).map(|i| (i % width) as f32).collect();
        let (dx, dy) = sobel(&src, width, height);
        // Interior pixels see a unit slope weighted by 1 + 2 + 1 over two pixels.
        assert!((dx[width + 2] - 8.0).abs() < 1e-6);
        assert!(dy[width + 2].abs() < 1e-6);
    }
}
