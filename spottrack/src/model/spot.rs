//! Detected spots and the per-run spot pool.

use std::fmt;

use glam::DVec3;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, EnumIter};

/// Spot identity. Ids are dense, start at 0 for each run and equal the
/// spot's index in its [`SpotCollection`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SpotId(pub usize);

impl fmt::Display for SpotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Intensity statistics over the spot's disk on the analyzed channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct IntensityStats {
    pub mean: f64,
    pub median: f64,
    pub min: f64,
    pub max: f64,
    pub total: f64,
    pub std: f64,
    /// `(mean_in - mean_out) / (mean_in + mean_out)` against the surrounding annulus.
    pub contrast: f64,
    /// `(mean_in - mean_out) / std_in`.
    pub snr: f64,
}

/// Numeric spot features usable in filters.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsRefStr, EnumIter,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum SpotFeature {
    Quality,
    PositionX,
    PositionY,
    PositionZ,
    PositionT,
    Frame,
    Radius,
    MeanIntensity,
    MedianIntensity,
    MinIntensity,
    MaxIntensity,
    TotalIntensity,
    StdIntensity,
    Contrast,
    Snr,
}

/// A detected particle at one time point.
///
/// Only the detector creates spots; afterwards only the visibility flag changes.
#[derive(Debug, Clone, PartialEq)]
pub struct Spot {
    pub id: SpotId,
    /// Calibrated position.
    pub position: DVec3,
    pub frame: usize,
    /// `frame * frame_interval`.
    pub time: f64,
    pub quality: f64,
    pub radius: f64,
    pub intensity: IntensityStats,
    visible: bool,
}

impl Spot {
    pub fn new(
        id: SpotId,
        position: DVec3,
        frame: usize,
        time: f64,
        quality: f64,
        radius: f64,
        intensity: IntensityStats,
    ) -> Self {
        Self {
            id,
            position,
            frame,
            time,
            quality,
            radius,
            intensity,
            visible: true,
        }
    }

    #[inline]
    pub fn is_visible(&self) -> bool {
        self.visible
    }

    #[inline]
    pub fn distance_squared(&self, other: &Spot) -> f64 {
        self.position.distance_squared(other.position)
    }

    #[inline]
    pub fn distance(&self, other: &Spot) -> f64 {
        self.position.distance(other.position)
    }

    pub fn feature(&self, feature: SpotFeature) -> f64 {
        match feature {
            SpotFeature::Quality => self.quality,
            SpotFeature::PositionX => self.position.x,
            SpotFeature::PositionY => self.position.y,
            SpotFeature::PositionZ => self.position.z,
            SpotFeature::PositionT => self.time,
            SpotFeature::Frame => self.frame as f64,
            SpotFeature::Radius => self.radius,
            SpotFeature::MeanIntensity => self.intensity.mean,
            SpotFeature::MedianIntensity => self.intensity.median,
            SpotFeature::MinIntensity => self.intensity.min,
            SpotFeature::MaxIntensity => self.intensity.max,
            SpotFeature::TotalIntensity => self.intensity.total,
            SpotFeature::StdIntensity => self.intensity.std,
            SpotFeature::Contrast => self.intensity.contrast,
            SpotFeature::Snr => self.intensity.snr,
        }
    }
}

/// The global spot pool of one run, grouped by frame.
#[derive(Debug, Clone, Default)]
pub struct SpotCollection {
    spots: Vec<Spot>,
    /// `frame_starts[f]..frame_starts[f + 1]` indexes the spots of frame `f`.
    frame_starts: Vec<usize>,
}

impl SpotCollection {
    /// Builds the pool from per-frame spots whose ids were assigned in order.
    pub(crate) fn from_frames(frames: Vec<Vec<Spot>>) -> Self {
        let mut frame_starts = Vec::with_capacity(frames.len() + 1);
        let mut spots = Vec::with_capacity(frames.iter().map(Vec::len).sum());
        frame_starts.push(0);
        for frame_spots in frames {
            spots.extend(frame_spots);
            frame_starts.push(spots.len());
        }
        debug_assert!(spots.iter().enumerate().all(|(i, s)| s.id.0 == i));
        Self {
            spots,
            frame_starts,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.spots.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.spots.is_empty()
    }

    /// Number of frames the collection was built from, including empty ones.
    #[inline]
    pub fn n_frames(&self) -> usize {
        self.frame_starts.len().saturating_sub(1)
    }

    #[inline]
    pub fn get(&self, id: SpotId) -> Option<&Spot> {
        self.spots.get(id.0)
    }

    pub fn frame(&self, frame: usize) -> &[Spot] {
        match (self.frame_starts.get(frame), self.frame_starts.get(frame + 1)) {
            (Some(&start), Some(&end)) => &self.spots[start..end],
            _ => &[],
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Spot> {
        self.spots.iter()
    }

    pub fn iter_visible(&self) -> impl Iterator<Item = &Spot> {
        self.spots.iter().filter(|s| s.visible)
    }

    pub fn count_visible(&self) -> usize {
        self.iter_visible().count()
    }

    pub(crate) fn set_visible(&mut self, id: SpotId, visible: bool) {
        if let Some(spot) = self.spots.get_mut(id.0) {
            spot.visible = visible;
        }
    }
}

impl std::ops::Index<SpotId> for SpotCollection {
    type Output = Spot;

    #[inline]
    fn index(&self, id: SpotId) -> &Spot {
        &self.spots[id.0]
    }
}
