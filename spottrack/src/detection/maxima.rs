//! Local maxima of the response map and their sub-pixel refinement.

use glam::DVec2;

use common::Buffer2;

/// A thresholded local maximum of the response.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Peak {
    pub x: usize,
    pub y: usize,
    pub value: f32,
}

/// Neighbour offsets; the first four precede the centre in raster order.
const NEIGHBORS: [(isize, isize); 8] = [
    (-1, -1),
    (0, -1),
    (1, -1),
    (-1, 0),
    (1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
];

/// Find 8-connected local maxima strictly above `threshold`, in raster order.
///
/// A pixel must be `>=` every in-bounds neighbour and strictly `>` those that
/// precede it in raster order, so a flat plateau yields only its first pixel.
pub fn find_local_maxima(response: &Buffer2<f32>, threshold: f32) -> Vec<Peak> {
    let (width, height) = response.dimensions();
    let mut peaks = Vec::new();

    for y in 0..height {
        for (x, &value) in response.row(y).iter().enumerate() {
            if !(value > threshold) {
                continue;
            }
            if is_local_maximum(response, x, y, value) {
                peaks.push(Peak { x, y, value });
            }
        }
    }

    tracing::trace!(
        "{} local maxima above {} in {}x{} response",
        peaks.len(),
        threshold,
        width,
        height
    );
    peaks
}

#[inline]
fn is_local_maximum(response: &Buffer2<f32>, x: usize, y: usize, value: f32) -> bool {
    NEIGHBORS.iter().enumerate().all(|(i, &(dx, dy))| {
        match response.get(x as isize + dx, y as isize + dy) {
            None => true,
            Some(&n) if i < 4 => value > n,
            Some(&n) => value >= n,
        }
    })
}

/// Sub-pixel position of `peak` from a parabola through each axis.
///
/// Offsets are clamped to half a pixel. An axis is left at the integer
/// position when a neighbour is missing or the curvature is not negative.
pub fn refine_subpixel(response: &Buffer2<f32>, peak: &Peak) -> DVec2 {
    let (x, y) = (peak.x as isize, peak.y as isize);
    let center = peak.value as f64;

    let dx = parabola_offset(response.get(x - 1, y), center, response.get(x + 1, y));
    let dy = parabola_offset(response.get(x, y - 1), center, response.get(x, y + 1));
    DVec2::new(peak.x as f64 + dx, peak.y as f64 + dy)
}

#[inline]
fn parabola_offset(left: Option<&f32>, center: f64, right: Option<&f32>) -> f64 {
    let (Some(&left), Some(&right)) = (left, right) else {
        return 0.0;
    };
    let (left, right) = (left as f64, right as f64);
    let curvature = left - 2.0 * center + right;
    if curvature >= 0.0 {
        return 0.0;
    }
    (0.5 * (left - right) / curvature).clamp(-0.5, 0.5)
}
