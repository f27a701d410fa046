use std::fmt;

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, EnumIter};

use super::spot::{Spot, SpotId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackId(pub usize);

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Numeric track features usable in filters.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsRefStr, EnumIter,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum TrackFeature {
    /// Path length: the sum of all link lengths.
    TrackDisplacement,
    /// Straight-line distance from the first to the last spot.
    TrackNetDisplacement,
    TrackDuration,
    TrackStart,
    TrackStop,
    NumberSpots,
    NumberGaps,
    LongestGap,
    TrackMeanSpeed,
    TrackMeanQuality,
}

/// Aggregates derived from a track's spots when the track is assembled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackFeatures {
    pub displacement: f64,
    pub net_displacement: f64,
    pub duration: f64,
    pub start: f64,
    pub stop: f64,
    pub n_spots: usize,
    /// Links spanning more than one frame.
    pub n_gaps: usize,
    /// Largest number of frames skipped by a single link.
    pub longest_gap: usize,
    pub mean_speed: f64,
    pub mean_quality: f64,
}

impl TrackFeatures {
    /// `spots` must be in time order.
    pub fn compute(spots: &[&Spot]) -> Self {
        let (Some(first), Some(last)) = (spots.first(), spots.last()) else {
            return Self::default();
        };

        let mut displacement = 0.0;
        let mut n_gaps = 0;
        let mut longest_gap = 0;
        for pair in spots.windows(2) {
            displacement += pair[0].distance(pair[1]);
            let skipped = pair[1].frame - pair[0].frame - 1;
            if skipped > 0 {
                n_gaps += 1;
                longest_gap = longest_gap.max(skipped);
            }
        }

        let duration = last.time - first.time;
        let mean_speed = if duration > 0.0 {
            displacement / duration
        } else {
            0.0
        };

        Self {
            displacement,
            net_displacement: first.distance(last),
            duration,
            start: first.time,
            stop: last.time,
            n_spots: spots.len(),
            n_gaps,
            longest_gap,
            mean_speed,
            mean_quality: spots.iter().map(|s| s.quality).sum::<f64>() / spots.len() as f64,
        }
    }

    pub fn get(&self, feature: TrackFeature) -> f64 {
        match feature {
            TrackFeature::TrackDisplacement => self.displacement,
            TrackFeature::TrackNetDisplacement => self.net_displacement,
            TrackFeature::TrackDuration => self.duration,
            TrackFeature::TrackStart => self.start,
            TrackFeature::TrackStop => self.stop,
            TrackFeature::NumberSpots => self.n_spots as f64,
            TrackFeature::NumberGaps => self.n_gaps as f64,
            TrackFeature::LongestGap => self.longest_gap as f64,
            TrackFeature::TrackMeanSpeed => self.mean_speed,
            TrackFeature::TrackMeanQuality => self.mean_quality,
        }
    }
}

/// A time-ordered, non-branching path of spots.
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    pub id: TrackId,
    pub spots: Vec<SpotId>,
    pub features: TrackFeatures,
    pub(crate) visible: bool,
}

impl Track {
    #[inline]
    pub fn is_visible(&self) -> bool {
        self.visible
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.spots.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.spots.is_empty()
    }

    #[inline]
    pub fn feature(&self, feature: TrackFeature) -> f64 {
        self.features.get(feature)
    }
}
