//! Spots, tracks and the per-run track model.

mod spot;
mod track;
mod track_model;


pub use spot::{IntensityStats, Spot, SpotCollection, SpotFeature, SpotId};
pub use track::{Track, TrackFeature, TrackFeatures, TrackId};
pub use track_model::TrackModel;
