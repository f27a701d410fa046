//! 3x3 median filter used to suppress isolated hot pixels before detection.

use rayon::prelude::*;

use common::Buffer2;

use super::ROWS_PER_CHUNK;

/// Apply a 3x3 median filter.
///
/// Border pixels use only their in-bounds neighbours. Images narrower or
/// shorter than 3 pixels are returned unchanged.
pub fn median_filter_3x3(pixels: &Buffer2<f32>) -> Buffer2<f32> {
    let (width, height) = pixels.dimensions();
    if width < 3 || height < 3 {
        return pixels.clone();
    }

    let mut output = vec![0.0f32; width * height];
    output
        .par_chunks_mut(width * ROWS_PER_CHUNK)
        .enumerate()
        .for_each(|(chunk_idx, chunk)| {
            let y_start = chunk_idx * ROWS_PER_CHUNK;
            for (local_y, row) in chunk.chunks_mut(width).enumerate() {
                filter_row(pixels, y_start + local_y, row);
            }
        });

    Buffer2::new(width, height, output)
}

fn filter_row(pixels: &Buffer2<f32>, y: usize, output_row: &mut [f32]) {
    let (width, height) = pixels.dimensions();
    let y_range = y.saturating_sub(1)..(y + 2).min(height);

    let mut neighbors = [0.0f32; 9];
    for (x, out) in output_row.iter_mut().enumerate() {
        let x_range = x.saturating_sub(1)..(x + 2).min(width);
        let mut count = 0;
        for ny in y_range.clone() {
            for &value in &pixels.row(ny)[x_range.clone()] {
                neighbors[count] = value;
                count += 1;
            }
        }
        *out = median_of_n(&mut neighbors[..count]);
    }
}

/// Median of a small slice; even lengths average the two middle values.
pub fn median_of_n(values: &mut [f32]) -> f32 {
    let n = values.len();
    if n == 0 {
        return 0.0;
    }
    values.sort_unstable_by(f32::total_cmp);
    if n % 2 == 1 {
        values[n / 2]
    } else {
        (values[n / 2 - 1] + values[n / 2]) * 0.5
    }
}
