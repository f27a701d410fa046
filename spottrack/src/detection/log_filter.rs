//! Scale-normalised Laplacian-of-Gaussian response.
//!
//! The 2-D LoG is separable into two passes per axis:
//! `∇²(G * I) = g''ₓ(gᵧ(I)) + gₓ(g''ᵧ(I))`, which is O(n×k) instead of
//! O(n×k²). The response is negated and multiplied by σ² so that a bright
//! blob matching the scale gives a positive peak independent of σ, and a flat
//! region gives exactly zero.

use rayon::prelude::*;

use common::Buffer2;

use super::ROWS_PER_CHUNK;

/// 1-D Gaussian kernel of radius `ceil(3σ)`, normalized to sum 1.
pub fn gaussian_kernel_1d(sigma: f32) -> Vec<f32> {
    assert!(sigma > 0.0, "Sigma must be positive");

    let radius = (3.0 * sigma).ceil() as usize;
    let two_sigma_sq = 2.0 * sigma * sigma;
    let mut kernel: Vec<f32> = (0..=2 * radius)
        .map(|i| {
            let x = i as f32 - radius as f32;
            (-x * x / two_sigma_sq).exp()
        })
        .collect();

    let sum: f32 = kernel.iter().sum();
    for v in &mut kernel {
        *v /= sum;
    }
    kernel
}

/// Second derivative of the Gaussian, sampled on the same support.
///
/// Truncation is corrected so the kernel sums to exactly zero and its second
/// moment `Σ x² k(x)` equals 2, matching the continuous operator.
pub fn gaussian_second_derivative_kernel_1d(sigma: f32) -> Vec<f32> {
    let gaussian = gaussian_kernel_1d(sigma);
    let radius = gaussian.len() / 2;
    let sigma_sq = sigma * sigma;

    let mut kernel: Vec<f32> = gaussian
        .iter()
        .enumerate()
        .map(|(i, &g)| {
            let x = i as f32 - radius as f32;
            (x * x - sigma_sq) / (sigma_sq * sigma_sq) * g
        })
        .collect();

    // The Gaussian sums to 1, so subtracting `sum * g` zeroes the total.
    let sum: f32 = kernel.iter().sum();
    for (k, &g) in kernel.iter_mut().zip(&gaussian) {
        *k -= sum * g;
    }

    let second_moment: f32 = kernel
        .iter()
        .enumerate()
        .map(|(i, &k)| {
            let x = i as f32 - radius as f32;
            x * x * k
        })
        .sum();
    if second_moment.abs() > f32::EPSILON {
        let scale = 2.0 / second_moment;
        for k in &mut kernel {
            *k *= scale;
        }
    }
    kernel
}

/// Negated, σ²-normalised LoG response of `pixels` at scale `sigma` (pixels).
pub fn log_response(pixels: &Buffer2<f32>, sigma: f32) -> Buffer2<f32> {
    let (width, height) = pixels.dimensions();
    let gaussian = gaussian_kernel_1d(sigma);
    let second = gaussian_second_derivative_kernel_1d(sigma);

    let mut temp = vec![0.0f32; width * height];
    let mut dxx = vec![0.0f32; width * height];
    convolve_rows_parallel(pixels.pixels(), &mut temp, width, &second);
    convolve_cols_parallel(&temp, &mut dxx, width, height, &gaussian);

    let mut dyy = vec![0.0f32; width * height];
    convolve_rows_parallel(pixels.pixels(), &mut temp, width, &gaussian);
    convolve_cols_parallel(&temp, &mut dyy, width, height, &second);

    let scale = -sigma * sigma;
    dxx.par_iter_mut()
        .zip(dyy.par_iter())
        .for_each(|(xx, &yy)| *xx = scale * (*xx + yy));

    Buffer2::new(width, height, dxx)
}

/// Reflect an out-of-range index back into `0..n` without repeating the edge.
#[inline]
fn mirror(i: isize, n: usize) -> usize {
    if n == 1 {
        return 0;
    }
    let period = 2 * (n as isize - 1);
    let i = i.rem_euclid(period);
    if i < n as isize {
        i as usize
    } else {
        (period - i) as usize
    }
}

fn convolve_rows_parallel(input: &[f32], output: &mut [f32], width: usize, kernel: &[f32]) {
    let radius = kernel.len() / 2;

    output
        .par_chunks_mut(width * ROWS_PER_CHUNK)
        .enumerate()
        .for_each(|(chunk_idx, out_chunk)| {
            let y_start = chunk_idx * ROWS_PER_CHUNK;
            for (local_y, out_row) in out_chunk.chunks_mut(width).enumerate() {
                let y = y_start + local_y;
                let in_row = &input[y * width..(y + 1) * width];
                convolve_row(in_row, out_row, kernel, radius);
            }
        });
}

#[inline]
fn convolve_row(input: &[f32], output: &mut [f32], kernel: &[f32], radius: usize) {
    let width = input.len();
    for (x, out) in output.iter_mut().enumerate() {
        let mut sum = 0.0f32;
        for (k, &kval) in kernel.iter().enumerate() {
            let sx = mirror(x as isize + k as isize - radius as isize, width);
            sum += input[sx] * kval;
        }
        *out = sum;
    }
}

fn convolve_cols_parallel(
    input: &[f32],
    output: &mut [f32],
    width: usize,
    height: usize,
    kernel: &[f32],
) {
    let radius = kernel.len() / 2;

    output
        .par_chunks_mut(width * ROWS_PER_CHUNK)
        .enumerate()
        .for_each(|(chunk_idx, out_chunk)| {
            let y_start = chunk_idx * ROWS_PER_CHUNK;
            for (local_y, out_row) in out_chunk.chunks_mut(width).enumerate() {
                let y = y_start + local_y;
                out_row.fill(0.0);
                for (k, &kval) in kernel.iter().enumerate() {
                    let sy = mirror(y as isize + k as isize - radius as isize, height);
                    let in_row = &input[sy * width..(sy + 1) * width];
                    for (out, &v) in out_row.iter_mut().zip(in_row) {
                        *out += v * kval;
                    }
                }
            }
        });
}
