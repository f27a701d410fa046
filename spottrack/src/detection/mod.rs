//! Per-frame spot detection.
//!
//! Each frame goes through an optional 3x3 median filter, a scale-normalised
//! Laplacian-of-Gaussian response at the configured radius, thresholded
//! local maxima and optional sub-pixel refinement. Intensity statistics are
//! always measured on the unfiltered frame.

#[cfg(test)]
mod tests;

pub mod intensity;
pub mod log_filter;
pub mod maxima;
pub mod median_filter;

use glam::{DVec2, DVec3};
use rayon::prelude::*;

use common::Buffer2;

use crate::config::{Calibration, DetectorConfig};
use crate::error::ValidationError;
use crate::model::{IntensityStats, Spot, SpotCollection, SpotId};

use self::log_filter::log_response;
use self::maxima::{find_local_maxima, refine_subpixel};
use self::median_filter::median_filter_3x3;

/// Number of rows to process per parallel chunk.
pub(crate) const ROWS_PER_CHUNK: usize = 8;

/// Smallest detection radius, in pixels, the response filter resolves.
pub const MIN_RADIUS_PX: f64 = 0.5;

/// A detection in pixel coordinates, before ids and calibration are applied.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection {
    pub position: DVec2,
    pub quality: f64,
    pub intensity: IntensityStats,
}

/// Laplacian-of-Gaussian spot detector.
#[derive(Debug, Clone)]
pub struct SpotDetector {
    config: DetectorConfig,
    calibration: Calibration,
}

impl SpotDetector {
    pub fn new(config: DetectorConfig, calibration: Calibration) -> Self {
        Self {
            config,
            calibration,
        }
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Detection radius in pixels.
    pub fn radius_px(&self) -> f64 {
        self.config.radius / self.calibration.pixel_width
    }

    /// LoG scale in pixels: `radius_px / sqrt(2)`.
    pub fn sigma_px(&self) -> f32 {
        (self.radius_px() / std::f64::consts::SQRT_2) as f32
    }

    /// Detect spots in every frame of one channel.
    ///
    /// Frames are processed independently and in parallel. Spot ids are
    /// assigned afterwards in frame order, then raster order of the maxima,
    /// starting from 0.
    pub fn detect(&self, frames: &[Buffer2<f32>]) -> Result<SpotCollection, ValidationError> {
        validate_frames(frames)?;
        self.validate_scale(&frames[0])?;

        let per_frame: Vec<Vec<Detection>> = frames
            .par_iter()
            .map(|frame| self.detect_scaled(frame))
            .collect();

        let mut next_id = 0;
        let spots: Vec<Vec<Spot>> = per_frame
            .into_iter()
            .enumerate()
            .map(|(frame, detections)| {
                tracing::debug!("Frame {}: {} spots", frame, detections.len());
                detections
                    .into_iter()
                    .map(|detection| {
                        let spot = self.to_spot(SpotId(next_id), frame, detection);
                        next_id += 1;
                        spot
                    })
                    .collect()
            })
            .collect();

        let spots = SpotCollection::from_frames(spots);
        tracing::info!(
            "Detected {} spots in {} frames (radius {}, threshold {})",
            spots.len(),
            spots.n_frames(),
            self.config.radius,
            self.config.threshold
        );
        Ok(spots)
    }

    /// Detect spots in a single frame, in pixel coordinates.
    pub fn detect_frame(
        &self,
        frame: &Buffer2<f32>,
    ) -> Result<Vec<Detection>, ValidationError> {
        if frame.is_empty() {
            return Err(ValidationError::EmptyFrame { frame: 0 });
        }
        self.validate_scale(frame)?;
        Ok(self.detect_scaled(frame))
    }

    /// The radius must be at least [`MIN_RADIUS_PX`] and no larger than the
    /// frame.
    fn validate_scale(&self, frame: &Buffer2<f32>) -> Result<(), ValidationError> {
        let radius_px = self.radius_px();
        let max = frame.width().max(frame.height()) as f64;
        let sigma = self.sigma_px();
        if !(MIN_RADIUS_PX..=max).contains(&radius_px) || !sigma.is_finite() || sigma <= 0.0 {
            return Err(ValidationError::RadiusOutOfRange {
                radius_px,
                min: MIN_RADIUS_PX,
                max,
            });
        }
        Ok(())
    }

    fn detect_scaled(&self, frame: &Buffer2<f32>) -> Vec<Detection> {
        let response = if self.config.median_filtering {
            log_response(&median_filter_3x3(frame), self.sigma_px())
        } else {
            log_response(frame, self.sigma_px())
        };

        let radius_px = self.radius_px();
        find_local_maxima(&response, self.config.threshold as f32)
            .iter()
            .map(|peak| {
                let position = if self.config.subpixel_localization {
                    refine_subpixel(&response, peak)
                } else {
                    DVec2::new(peak.x as f64, peak.y as f64)
                };
                Detection {
                    position,
                    quality: peak.value as f64,
                    intensity: intensity::measure(frame, position, radius_px),
                }
            })
            .collect()
    }

    fn to_spot(&self, id: SpotId, frame: usize, detection: Detection) -> Spot {
        let position = DVec3::new(
            detection.position.x * self.calibration.pixel_width,
            detection.position.y * self.calibration.pixel_height,
            0.0,
        );
        Spot::new(
            id,
            position,
            frame,
            frame as f64 * self.calibration.frame_interval,
            detection.quality,
            self.config.radius,
            detection.intensity,
        )
    }
}

/// All frames must be non-empty and share the first frame's dimensions.
fn validate_frames(frames: &[Buffer2<f32>]) -> Result<(), ValidationError> {
    let Some(first) = frames.first() else {
        return Err(ValidationError::NoFrames);
    };
    let (expected_width, expected_height) = first.dimensions();

    for (frame, pixels) in frames.iter().enumerate() {
        let (width, height) = pixels.dimensions();
        if pixels.is_empty() {
            return Err(ValidationError::EmptyFrame { frame });
        }
        if (width, height) != (expected_width, expected_height) {
            return Err(ValidationError::FrameSizeMismatch {
                frame,
                width,
                height,
                expected_width,
                expected_height,
            });
        }
    }
    Ok(())
}
