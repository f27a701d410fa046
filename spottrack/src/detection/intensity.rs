//! Intensity statistics over a spot's disk on the raw frame.

use glam::DVec2;

use common::Buffer2;

use crate::model::IntensityStats;

/// Statistics over pixels whose centre lies within `radius` of `center`.
///
/// The pixel containing `center` is always part of the disk. Contrast and SNR
/// compare the disk against the annulus `radius < d <= 2 * radius`; both are 0
/// when the comparison is undefined.
pub fn measure(pixels: &Buffer2<f32>, center: DVec2, radius: f64) -> IntensityStats {
    let (width, height) = pixels.dimensions();
    let outer = 2.0 * radius;
    let radius_sq = radius * radius;
    let outer_sq = outer * outer;

    let x_min = (center.x - outer).floor().max(0.0) as usize;
    let y_min = (center.y - outer).floor().max(0.0) as usize;
    let x_max = ((center.x + outer).ceil().max(0.0) as usize).min(width.saturating_sub(1));
    let y_max = ((center.y + outer).ceil().max(0.0) as usize).min(height.saturating_sub(1));
    let own_pixel = (center.x.round(), center.y.round());

    let mut inside: Vec<f64> = Vec::new();
    let mut outside_sum = 0.0;
    let mut outside_count = 0usize;

    for y in y_min..=y_max {
        let row = pixels.row(y);
        for x in x_min..=x_max {
            let value = row[x] as f64;
            let d_sq = DVec2::new(x as f64, y as f64).distance_squared(center);
            if d_sq <= radius_sq || (x as f64, y as f64) == own_pixel {
                inside.push(value);
            } else if d_sq <= outer_sq {
                outside_sum += value;
                outside_count += 1;
            }
        }
    }

    if inside.is_empty() {
        return IntensityStats::default();
    }

    let n = inside.len() as f64;
    let total: f64 = inside.iter().sum();
    let mean = total / n;
    let std = if inside.len() > 1 {
        (inside.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / (n - 1.0)).sqrt()
    } else {
        0.0
    };

    inside.sort_unstable_by(f64::total_cmp);
    let min = inside[0];
    let max = inside[inside.len() - 1];
    let mid = inside.len() / 2;
    let median = if inside.len() % 2 == 1 {
        inside[mid]
    } else {
        0.5 * (inside[mid - 1] + inside[mid])
    };

    let (contrast, snr) = if outside_count > 0 {
        let mean_out = outside_sum / outside_count as f64;
        let contrast = if (mean + mean_out).abs() > f64::EPSILON {
            (mean - mean_out) / (mean + mean_out)
        } else {
            0.0
        };
        let snr = if std > 0.0 { (mean - mean_out) / std } else { 0.0 };
        (contrast, snr)
    } else {
        (0.0, 0.0)
    };

    IntensityStats {
        mean,
        median,
        min,
        max,
        total,
        std,
        contrast,
        snr,
    }
}
