//! Spottrack - particle detection and trajectory linking for microscopy stacks.
//!
//! Each channel of a time-lapse stack goes through the same pipeline:
//! - Laplacian-of-Gaussian spot detection with sub-pixel refinement
//! - Threshold filters on spot features
//! - Globally optimal frame-to-frame linking with gap closing (sparse LAP)
//! - Threshold filters on track features
//! - Export of a trajectory document (XML) and a per-spot feature table (CSV)
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use spottrack::{BatchConfig, BatchRunner};
//!
//! let runner = BatchRunner::new(BatchConfig::default());
//! let report = runner.run(Path::new("/data/session_01"), None)?;
//! println!("{} channel(s) exported", report.exported_channels());
//! ```

pub mod batch;
pub mod config;
pub mod decode;
pub mod detection;
pub mod error;
pub mod export;
pub mod filter;
pub mod linking;
pub mod model;

// ============================================================================
// Configuration
// ============================================================================

pub use config::{BatchConfig, Calibration, ChannelConfig, DetectorConfig, LinkerConfig};
pub use filter::{FeatureFilter, Keep};

// ============================================================================
// Pipeline
// ============================================================================

pub use batch::{BatchReport, BatchRunner, ChannelOutcome, ChannelReport, FileReport};
pub use decode::{NdDecoder, StackDecoder, StackSource};
pub use detection::SpotDetector;
pub use export::{ExportedFiles, TrajectoryDocument, export_model};
pub use linking::SparseLapLinker;

// ============================================================================
// Model
// ============================================================================

pub use error::{
    BatchError, ChannelError, ConfigError, DecodeError, ExportError, ValidationError,
};
pub use model::{
    Spot, SpotCollection, SpotFeature, SpotId, Track, TrackFeature, TrackId, TrackModel,
};
