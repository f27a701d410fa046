//! Trajectory document: visible tracks with their detections, as XML.
//!
//! ```xml
//! <?xml version="1.0" encoding="UTF-8"?>
//! <Tracks nTracks="1" spaceUnits="pixel" frameInterval="1" timeUnits="frame" from="cell_01">
//!   <particle trackId="0" nSpots="2" displacement="1.41">
//!     <detection spotId="0" t="0" x="10" y="10" z="0" quality="12.3" radius="3.5" .../>
//!   </particle>
//! </Tracks>
//! ```
//!
//! The document carries no timestamps so identical models render to
//! identical bytes.

use serde::{Deserialize, Serialize};

use crate::config::Calibration;
use crate::error::ExportError;
use crate::model::{Spot, SpotId, Track, TrackId, TrackModel};

const XML_DECLARATION: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n";
const ROOT: &str = "Tracks";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryDocument {
    #[serde(rename = "@nTracks")]
    pub n_tracks: usize,
    #[serde(rename = "@spaceUnits")]
    pub space_units: String,
    #[serde(rename = "@frameInterval")]
    pub frame_interval: f64,
    #[serde(rename = "@timeUnits")]
    pub time_units: String,
    /// Base name of the source file.
    #[serde(rename = "@from")]
    pub from: String,
    #[serde(rename = "particle", default)]
    pub particles: Vec<ParticleRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticleRecord {
    #[serde(rename = "@trackId")]
    pub track_id: TrackId,
    #[serde(rename = "@nSpots")]
    pub n_spots: usize,
    #[serde(rename = "@displacement")]
    pub displacement: f64,
    #[serde(rename = "detection", default)]
    pub detections: Vec<DetectionRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionRecord {
    #[serde(rename = "@spotId")]
    pub spot_id: SpotId,
    /// Frame index.
    #[serde(rename = "@t")]
    pub t: usize,
    #[serde(rename = "@x")]
    pub x: f64,
    #[serde(rename = "@y")]
    pub y: f64,
    #[serde(rename = "@z")]
    pub z: f64,
    #[serde(rename = "@quality")]
    pub quality: f64,
    #[serde(rename = "@radius")]
    pub radius: f64,
    #[serde(rename = "@meanIntensity")]
    pub mean_intensity: f64,
    #[serde(rename = "@medianIntensity")]
    pub median_intensity: f64,
    #[serde(rename = "@minIntensity")]
    pub min_intensity: f64,
    #[serde(rename = "@maxIntensity")]
    pub max_intensity: f64,
    #[serde(rename = "@totalIntensity")]
    pub total_intensity: f64,
    #[serde(rename = "@stdIntensity")]
    pub std_intensity: f64,
    #[serde(rename = "@contrast")]
    pub contrast: f64,
    #[serde(rename = "@snr")]
    pub snr: f64,
}

impl DetectionRecord {
    fn from_spot(spot: &Spot) -> Self {
        let i = &spot.intensity;
        Self {
            spot_id: spot.id,
            t: spot.frame,
            x: spot.position.x,
            y: spot.position.y,
            z: spot.position.z,
            quality: spot.quality,
            radius: spot.radius,
            mean_intensity: i.mean,
            median_intensity: i.median,
            min_intensity: i.min,
            max_intensity: i.max,
            total_intensity: i.total,
            std_intensity: i.std,
            contrast: i.contrast,
            snr: i.snr,
        }
    }
}

impl ParticleRecord {
    fn from_track(model: &TrackModel, track: &Track) -> Self {
        let detections: Vec<_> = model
            .track_spots(track.id)
            .filter(|s| s.is_visible())
            .map(DetectionRecord::from_spot)
            .collect();
        Self {
            track_id: track.id,
            n_spots: detections.len(),
            displacement: track.features.displacement,
            detections,
        }
    }
}

impl TrajectoryDocument {
    /// Snapshot of the visible tracks of `model`, in ascending track id.
    pub fn from_model(model: &TrackModel, calibration: &Calibration, from: &str) -> Self {
        let particles: Vec<_> = model
            .visible_tracks()
            .map(|track| ParticleRecord::from_track(model, track))
            .collect();
        Self {
            n_tracks: particles.len(),
            space_units: calibration.space_units.clone(),
            frame_interval: calibration.frame_interval,
            time_units: calibration.time_units.clone(),
            from: from.to_string(),
            particles,
        }
    }

    /// Spot ids of every particle, in document order.
    pub fn track_spot_ids(&self) -> Vec<Vec<SpotId>> {
        self.particles
            .iter()
            .map(|p| p.detections.iter().map(|d| d.spot_id).collect())
            .collect()
    }

    /// Consecutive spot pairs of every particle.
    pub fn links(&self) -> Vec<(SpotId, SpotId)> {
        self.particles
            .iter()
            .flat_map(|p| p.detections.windows(2).map(|w| (w[0].spot_id, w[1].spot_id)))
            .collect()
    }

    pub fn to_xml(&self) -> Result<String, ExportError> {
        let body = quick_xml::se::to_string_with_root(ROOT, self)
            .map_err(|e| ExportError::Xml(e.to_string()))?;
        let mut text = String::with_capacity(XML_DECLARATION.len() + body.len() + 1);
        text.push_str(XML_DECLARATION);
        text.push_str(&body);
        text.push('\n');
        Ok(text)
    }

    pub fn from_xml(text: &str) -> Result<Self, ExportError> {
        quick_xml::de::from_str(text).map_err(|e| ExportError::Xml(e.to_string()))
    }
}

/// Render the trajectory document of `model` into memory.
pub fn render_trajectories(
    model: &TrackModel,
    calibration: &Calibration,
    from: &str,
) -> Result<String, ExportError> {
    TrajectoryDocument::from_model(model, calibration, from).to_xml()
}
