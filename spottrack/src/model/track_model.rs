use std::fmt;

use super::spot::{Spot, SpotCollection, SpotId};
use super::track::{Track, TrackFeatures, TrackId};
use crate::error::ValidationError;

/// Tracks plus the spot pool of one detection and tracking run.
///
/// Every visible spot belongs to exactly one track (possibly a single-spot
/// one); invisible spots belong to none. Each spot has at most one
/// predecessor and at most one successor.
#[derive(Debug, Clone, Default)]
pub struct TrackModel {
    spots: SpotCollection,
    tracks: Vec<Track>,
    predecessor: Vec<Option<SpotId>>,
    successor: Vec<Option<SpotId>>,
    spot_track: Vec<Option<TrackId>>,
}

impl TrackModel {
    /// Assembles tracks from directed `source -> target` links between
    /// visible spots.
    ///
    /// Tracks start at every visible spot without a predecessor, visited in
    /// ascending spot id, and receive ids `0..` in that order.
    pub fn from_links(
        spots: SpotCollection,
        links: &[(SpotId, SpotId)],
    ) -> Result<Self, ValidationError> {
        let n = spots.len();
        let mut predecessor: Vec<Option<SpotId>> = vec![None; n];
        let mut successor: Vec<Option<SpotId>> = vec![None; n];

        for &(source, target) in links {
            let (Some(from), Some(to)) = (spots.get(source), spots.get(target)) else {
                let unknown = if spots.get(source).is_none() {
                    source
                } else {
                    target
                };
                return Err(ValidationError::UnknownSpot { spot: unknown.0 });
            };
            if !from.is_visible() {
                return Err(ValidationError::UnknownSpot { spot: source.0 });
            }
            if !to.is_visible() {
                return Err(ValidationError::UnknownSpot { spot: target.0 });
            }
            if to.frame <= from.frame {
                return Err(ValidationError::BackwardLink {
                    from: source.0,
                    to: target.0,
                });
            }
            if successor[source.0].replace(target).is_some() {
                return Err(ValidationError::Split { spot: source.0 });
            }
            if predecessor[target.0].replace(source).is_some() {
                return Err(ValidationError::Merge { spot: target.0 });
            }
        }

        let mut tracks = Vec::new();
        let mut spot_track = vec![None; n];
        for start in spots.iter_visible() {
            if predecessor[start.id.0].is_some() {
                continue;
            }
            let id = TrackId(tracks.len());
            let mut path = vec![start.id];
            let mut current = start.id;
            while let Some(next) = successor[current.0] {
                path.push(next);
                current = next;
            }
            for spot in &path {
                spot_track[spot.0] = Some(id);
            }
            let members: Vec<&Spot> = path.iter().map(|&s| &spots[s]).collect();
            tracks.push(Track {
                id,
                features: TrackFeatures::compute(&members),
                spots: path,
                visible: true,
            });
        }

        Ok(Self {
            spots,
            tracks,
            predecessor,
            successor,
            spot_track,
        })
    }

    /// A model without links: every visible spot is its own track.
    pub fn unlinked(spots: SpotCollection) -> Self {
        Self::from_links(spots, &[]).unwrap_or_default()
    }

    pub fn spots(&self) -> &SpotCollection {
        &self.spots
    }

    pub fn n_tracks(&self, visible_only: bool) -> usize {
        if visible_only {
            self.tracks.iter().filter(|t| t.visible).count()
        } else {
            self.tracks.len()
        }
    }

    /// Track ids in ascending order.
    pub fn track_ids(&self, visible_only: bool) -> impl Iterator<Item = TrackId> + '_ {
        self.tracks
            .iter()
            .filter(move |t| !visible_only || t.visible)
            .map(|t| t.id)
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn visible_tracks(&self) -> impl Iterator<Item = &Track> {
        self.tracks.iter().filter(|t| t.visible)
    }

    pub fn track(&self, id: TrackId) -> Option<&Track> {
        self.tracks.get(id.0)
    }

    /// Spots of a track in time order; empty for an unknown id.
    pub fn track_spots(&self, id: TrackId) -> impl Iterator<Item = &Spot> {
        self.track(id)
            .map(|t| t.spots.as_slice())
            .unwrap_or_default()
            .iter()
            .map(|&s| &self.spots[s])
    }

    pub fn track_of(&self, spot: SpotId) -> Option<TrackId> {
        self.spot_track.get(spot.0).copied().flatten()
    }

    pub fn predecessor(&self, spot: SpotId) -> Option<SpotId> {
        self.predecessor.get(spot.0).copied().flatten()
    }

    pub fn successor(&self, spot: SpotId) -> Option<SpotId> {
        self.successor.get(spot.0).copied().flatten()
    }

    /// All links as `(source, target)` in ascending source id.
    pub fn links(&self) -> impl Iterator<Item = (SpotId, SpotId)> + '_ {
        self.successor
            .iter()
            .enumerate()
            .filter_map(|(i, next)| next.map(|t| (SpotId(i), t)))
    }

    pub(crate) fn set_track_visible(&mut self, id: TrackId, visible: bool) {
        if let Some(track) = self.tracks.get_mut(id.0) {
            track.visible = visible;
        }
    }
}

impl fmt::Display for TrackModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} spots ({} visible) in {} frames, {} tracks ({} visible), {} links",
            self.spots.len(),
            self.spots.count_visible(),
            self.spots.n_frames(),
            self.n_tracks(false),
            self.n_tracks(true),
            self.links().count()
        )
    }
}
