//! Statically typed configuration for a batch run.
//!
//! Every recognised option is a field; there is no free-form settings map.
//! All structs deserialize with defaults, so a config file only needs the
//! values it changes. Defaults reproduce the two-channel TIRF deployment the
//! tool was written for.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use common::FileFormat;

use crate::error::ConfigError;
use crate::filter::FeatureFilter;
use crate::model::{SpotFeature, TrackFeature};

// ============================================================================
// Calibration
// ============================================================================

/// Physical size of a pixel and of a time step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Calibration {
    pub pixel_width: f64,
    pub pixel_height: f64,
    pub voxel_depth: f64,
    pub frame_interval: f64,
    pub space_units: String,
    pub time_units: String,
}

impl Default for Calibration {
    fn default() -> Self {
        Self {
            pixel_width: 1.0,
            pixel_height: 1.0,
            voxel_depth: 1.0,
            frame_interval: 1.0,
            space_units: "pixel".to_string(),
            time_units: "frame".to_string(),
        }
    }
}

impl Calibration {
    pub fn validate(&self) -> Result<(), ConfigError> {
        positive("pixel_width", self.pixel_width)?;
        positive("pixel_height", self.pixel_height)?;
        positive("voxel_depth", self.voxel_depth)?;
        positive("frame_interval", self.frame_interval)?;
        Ok(())
    }
}

// ============================================================================
// Detector
// ============================================================================

/// Laplacian-of-Gaussian blob detector settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Expected blob radius, in calibrated units.
    pub radius: f64,
    /// Local maxima of the LoG response must exceed this value.
    pub threshold: f64,
    pub subpixel_localization: bool,
    /// Apply a 3x3 median filter before computing the response.
    pub median_filtering: bool,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            radius: 3.5,
            threshold: 1.0,
            subpixel_localization: true,
            median_filtering: false,
        }
    }
}

impl DetectorConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        positive("radius", self.radius)?;
        if !self.threshold.is_finite() {
            return Err(ConfigError::NotPositive {
                field: "threshold",
                value: self.threshold,
            });
        }
        Ok(())
    }
}

// ============================================================================
// Linker
// ============================================================================

/// Frame-to-frame linking and gap-closing settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkerConfig {
    /// Maximum distance for a link between consecutive frames.
    pub linking_max_distance: f64,
    /// Maximum distance for a link that skips frames.
    pub gap_closing_max_distance: f64,
    /// A spot in frame `t` may link to frames `t + 1 ..= t + max_frame_gap`.
    pub max_frame_gap: usize,
    /// When false, only consecutive frames are linked.
    pub allow_gap_closing: bool,
    /// A link spanning `dt` frames costs `1 + gap_penalty * (dt - 1)` times
    /// its squared length.
    pub gap_penalty: f64,
    /// Scales the cost percentile into the cost of leaving a spot unlinked.
    pub alternative_cost_factor: f64,
    /// Percentile of all candidate link costs used for the no-link cost.
    pub cutoff_percentile: f64,
}

impl Default for LinkerConfig {
    fn default() -> Self {
        Self {
            linking_max_distance: 7.0,
            gap_closing_max_distance: 7.0,
            max_frame_gap: 8,
            allow_gap_closing: true,
            gap_penalty: 0.0,
            alternative_cost_factor: 1.05,
            cutoff_percentile: 0.9,
        }
    }
}

impl LinkerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        non_negative("linking_max_distance", self.linking_max_distance)?;
        non_negative("gap_closing_max_distance", self.gap_closing_max_distance)?;
        non_negative("gap_penalty", self.gap_penalty)?;
        positive("alternative_cost_factor", self.alternative_cost_factor)?;
        if self.max_frame_gap == 0 {
            return Err(ConfigError::ZeroFrameGap);
        }
        if !(self.cutoff_percentile > 0.0 && self.cutoff_percentile <= 1.0) {
            return Err(ConfigError::OutOfUnitRange {
                field: "cutoff_percentile",
                value: self.cutoff_percentile,
            });
        }
        Ok(())
    }

    /// The frame gap actually searched, honoring `allow_gap_closing`.
    pub fn effective_frame_gap(&self) -> usize {
        if self.allow_gap_closing {
            self.max_frame_gap
        } else {
            1
        }
    }

    /// Maximum link distance for a link spanning `frame_delta` frames.
    pub fn max_distance(&self, frame_delta: usize) -> f64 {
        if frame_delta <= 1 {
            self.linking_max_distance
        } else {
            self.gap_closing_max_distance
        }
    }
}

// ============================================================================
// Channel
// ============================================================================

/// Everything needed to analyze and export one channel of a source file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// Human-readable channel name, available as `{label}` in templates.
    pub label: String,
    /// 1-based index of the decoded channel to analyze.
    pub target_channel: usize,
    pub detector: DetectorConfig,
    pub linker: LinkerConfig,
    pub spot_filters: Vec<FeatureFilter<SpotFeature>>,
    pub track_filters: Vec<FeatureFilter<TrackFeature>>,
    /// Trajectory file name template (`{base}`, `{channel}`, `{label}`).
    pub trajectory_file: String,
    /// Feature table file name template (`{base}`, `{channel}`, `{label}`).
    pub feature_table_file: String,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self::for_channel(1, "")
    }
}

impl ChannelConfig {
    pub fn for_channel(target_channel: usize, label: &str) -> Self {
        Self {
            label: label.to_string(),
            target_channel,
            detector: DetectorConfig::default(),
            linker: LinkerConfig::default(),
            spot_filters: vec![FeatureFilter::above(SpotFeature::Quality, 0.0)],
            track_filters: vec![FeatureFilter::above(TrackFeature::TrackDisplacement, 0.0)],
            trajectory_file: "{base}_w{channel}{label}_t1.xml".to_string(),
            feature_table_file: "{base}_channel_{channel}_results.csv".to_string(),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.target_channel == 0 {
            return Err(ConfigError::ZeroTargetChannel);
        }
        self.detector.validate()?;
        self.linker.validate()?;
        for filter in &self.spot_filters {
            filter.validate()?;
        }
        for filter in &self.track_filters {
            filter.validate()?;
        }
        if self.trajectory_file.trim().is_empty() {
            return Err(ConfigError::EmptyTemplate {
                field: "trajectory_file",
            });
        }
        if self.feature_table_file.trim().is_empty() {
            return Err(ConfigError::EmptyTemplate {
                field: "feature_table_file",
            });
        }
        Ok(())
    }

    /// Output paths `(trajectory, feature_table)` for a source file base name.
    pub fn output_paths(&self, output_dir: &Path, base: &str) -> (PathBuf, PathBuf) {
        (
            output_dir.join(self.render(&self.trajectory_file, base)),
            output_dir.join(self.render(&self.feature_table_file, base)),
        )
    }

    fn render(&self, template: &str, base: &str) -> String {
        template
            .replace("{base}", base)
            .replace("{channel}", &self.target_channel.to_string())
            .replace("{label}", &self.label)
    }
}

// ============================================================================
// Batch
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    pub channels: Vec<ChannelConfig>,
    pub calibration: Calibration,
    /// Where exports go; the input directory when unset.
    pub output_dir: Option<PathBuf>,
    /// Process source files concurrently.
    pub parallel: bool,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            channels: vec![
                ChannelConfig::for_channel(1, "Quad-TIRF488"),
                ChannelConfig::for_channel(2, "Quad-TIRF642"),
            ],
            calibration: Calibration::default(),
            output_dir: None,
            parallel: false,
        }
    }
}

impl BatchConfig {
    /// Loads a YAML or JSON config, chosen by file extension.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let load_error = |reason: String| ConfigError::Load {
            path: path.to_path_buf(),
            reason,
        };
        let format = FileFormat::from_path(path).map_err(|e| load_error(e.to_string()))?;
        let text = std::fs::read_to_string(path).map_err(|e| load_error(e.to_string()))?;
        common::deserialize(&text, format).map_err(|e| match std::error::Error::source(&e) {
            Some(source) => load_error(format!("{e}: {source}")),
            None => load_error(e.to_string()),
        })
    }

    pub fn to_text(&self, format: FileFormat) -> Result<String, common::SerdeFormatError> {
        common::serialize(self, format)
    }
}

fn positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::NotPositive { field, value })
    }
}

fn non_negative(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::Negative { field, value })
    }
}
