//! Threshold filters on spot and track features.
//!
//! Filtering never deletes anything: rejected spots and tracks are marked
//! invisible so ids held elsewhere stay valid. Several filters combine with AND.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::model::{Spot, SpotCollection, SpotFeature, Track, TrackFeature, TrackModel};

/// Which side of the threshold survives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Keep {
    /// Keep `value >= threshold`.
    Above,
    /// Keep `value <= threshold`.
    Below,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureFilter<F> {
    pub feature: F,
    pub threshold: f64,
    pub keep: Keep,
}

impl<F> FeatureFilter<F> {
    pub fn above(feature: F, threshold: f64) -> Self {
        Self {
            feature,
            threshold,
            keep: Keep::Above,
        }
    }

    pub fn below(feature: F, threshold: f64) -> Self {
        Self {
            feature,
            threshold,
            keep: Keep::Below,
        }
    }

    /// NaN never passes, whichever side is kept.
    #[inline]
    pub fn accepts(&self, value: f64) -> bool {
        match self.keep {
            Keep::Above => value >= self.threshold,
            Keep::Below => value <= self.threshold,
        }
    }
}

impl<F: AsRef<str>> FeatureFilter<F> {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.threshold.is_nan() {
            return Err(ConfigError::NanThreshold {
                feature: self.feature.as_ref().to_string(),
            });
        }
        Ok(())
    }
}

/// Anything exposing named numeric features.
pub trait Featured<F> {
    fn feature_value(&self, feature: F) -> f64;
}

impl Featured<SpotFeature> for Spot {
    fn feature_value(&self, feature: SpotFeature) -> f64 {
        self.feature(feature)
    }
}

impl Featured<TrackFeature> for Track {
    fn feature_value(&self, feature: TrackFeature) -> f64 {
        self.feature(feature)
    }
}

pub fn passes_all<F: Copy, T: Featured<F>>(item: &T, filters: &[FeatureFilter<F>]) -> bool {
    filters
        .iter()
        .all(|filter| filter.accepts(item.feature_value(filter.feature)))
}

/// Sets each spot's visibility from `filters`; returns the visible count.
pub fn filter_spots(spots: &mut SpotCollection, filters: &[FeatureFilter<SpotFeature>]) -> usize {
    let verdicts: Vec<_> = spots
        .iter()
        .map(|spot| (spot.id, passes_all(spot, filters)))
        .collect();

    let mut visible = 0;
    for (id, keep) in verdicts {
        spots.set_visible(id, keep);
        visible += usize::from(keep);
    }
    tracing::debug!("Spot filters kept {} of {} spots", visible, spots.len());
    visible
}

/// Sets each track's visibility from `filters`; returns the visible count.
pub fn filter_tracks(model: &mut TrackModel, filters: &[FeatureFilter<TrackFeature>]) -> usize {
    let verdicts: Vec<_> = model
        .tracks()
        .iter()
        .map(|track| (track.id, passes_all(track, filters)))
        .collect();

    let mut visible = 0;
    for (id, keep) in verdicts {
        model.set_track_visible(id, keep);
        visible += usize::from(keep);
    }
    tracing::debug!("Track filters kept {} of {} tracks", visible, model.n_tracks(false));
    visible
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::tests::pool;
    use crate::model::{SpotId, TrackId};

    #[test]
    fn test_above_and_below_are_inclusive() {
        let above = FeatureFilter::above(SpotFeature::Quality, 1.0);
        assert!(above.accepts(1.0));
        assert!(above.accepts(2.0));
        assert!(!above.accepts(0.5));
        assert!(!above.accepts(f64::NAN));

        let below = FeatureFilter::below(SpotFeature::Quality, 1.0);
        assert!(below.accepts(1.0));
        assert!(!below.accepts(1.5));
        assert!(!below.accepts(f64::NAN));
    }

    #[test]
    fn test_spot_filters_combine_with_and() {
        // Qualities are 10 + id.
        let mut spots = pool(&[(0, 0.0, 0.0), (0, 5.0, 0.0), (1, 9.0, 0.0), (1, 20.0, 0.0)]);
        let filters = [
            FeatureFilter::above(SpotFeature::Quality, 11.0),
            FeatureFilter::below(SpotFeature::PositionX, 10.0),
        ];
        assert_eq!(filter_spots(&mut spots, &filters), 2);
        let visible: Vec<_> = spots.iter_visible().map(|s| s.id).collect();
        assert_eq!(visible, vec![SpotId(1), SpotId(2)]);
    }

    #[test]
    fn test_refiltering_starts_from_scratch() {
        let mut spots = pool(&[(0, 0.0, 0.0), (1, 0.0, 0.0)]);
        filter_spots(&mut spots, &[FeatureFilter::above(SpotFeature::Quality, 100.0)]);
        assert_eq!(spots.count_visible(), 0);
        assert_eq!(filter_spots(&mut spots, &[]), 2);
    }

    #[test]
    fn test_stricter_thresholds_never_keep_more() {
        let points: Vec<_> = (0..20).map(|i| (i % 4, i as f64, 0.0)).collect();
        let mut previous = usize::MAX;
        for threshold in [0.0, 12.0, 15.0, 22.0, 29.0, 40.0] {
            let mut spots = pool(&points);
            let filters = [FeatureFilter::above(SpotFeature::Quality, threshold)];
            let kept = filter_spots(&mut spots, &filters);
            assert!(kept <= previous);
            previous = kept;
        }
        assert_eq!(previous, 0);
    }

    #[test]
    fn test_track_filter_hides_short_tracks() {
        let spots = pool(&[(0, 0.0, 0.0), (0, 30.0, 0.0), (1, 4.0, 3.0)]);
        let mut model = TrackModel::from_links(spots, &[(SpotId(0), SpotId(2))]).unwrap();
        assert_eq!(model.n_tracks(true), 2);

        let kept = filter_tracks(
            &mut model,
            &[FeatureFilter::above(TrackFeature::TrackDisplacement, 1.0)],
        );
        assert_eq!(kept, 1);
        assert!(model.track(TrackId(0)).unwrap().is_visible());
        assert!(!model.track(TrackId(1)).unwrap().is_visible());
        assert_eq!(model.track_ids(true).collect::<Vec<_>>(), vec![TrackId(0)]);
    }

    #[test]
    fn test_nan_threshold_is_a_config_error() {
        let filter = FeatureFilter::above(TrackFeature::NumberSpots, f64::NAN);
        assert_eq!(
            filter.validate(),
            Err(ConfigError::NanThreshold {
                feature: "NUMBER_SPOTS".to_string()
            })
        );
    }
}
