//! Error types, one enum per failure class.
//!
//! Every class except [`BatchError`] is recovered at the channel boundary by
//! the batch runner: the channel is reported as failed and the run moves on.

use std::path::PathBuf;

use thiserror::Error;

/// Invalid or missing channel configuration values.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("{field} must be a positive finite number, got {value}")]
    NotPositive { field: &'static str, value: f64 },

    #[error("{field} must be a non-negative finite number, got {value}")]
    Negative { field: &'static str, value: f64 },

    #[error("{field} must be in (0, 1], got {value}")]
    OutOfUnitRange { field: &'static str, value: f64 },

    #[error("max_frame_gap must be at least 1")]
    ZeroFrameGap,

    #[error("target_channel is 1-based and must be at least 1")]
    ZeroTargetChannel,

    #[error("target channel {channel} requested but the source has {available} channel(s)")]
    ChannelOutOfRange { channel: usize, available: usize },

    #[error("output template '{field}' is empty")]
    EmptyTemplate { field: &'static str },

    #[error("filter threshold for {feature} must not be NaN")]
    NanThreshold { feature: String },

    #[error("Failed to read config file '{path}': {reason}")]
    Load { path: PathBuf, reason: String },
}

/// Inconsistent input handed to the detector or the linker.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    #[error("channel contains no frames")]
    NoFrames,

    #[error("frame {frame} is {width}x{height}, expected {expected_width}x{expected_height}")]
    FrameSizeMismatch {
        frame: usize,
        width: usize,
        height: usize,
        expected_width: usize,
        expected_height: usize,
    },

    #[error("frame {frame} is empty")]
    EmptyFrame { frame: usize },

    #[error("detection radius of {radius_px} px is outside [{min}, {max}] px")]
    RadiusOutOfRange { radius_px: f64, min: f64, max: f64 },

    #[error("spot {spot} would get more than one successor")]
    Split { spot: usize },

    #[error("spot {spot} would get more than one predecessor")]
    Merge { spot: usize },

    #[error("link {from} -> {to} does not go forward in time")]
    BackwardLink { from: usize, to: usize },

    #[error("link references unknown spot {spot}")]
    UnknownSpot { spot: usize },

    #[error("assignment solver failed: {0}")]
    Assignment(#[from] crate::linking::lap::LapError),
}

/// Errors raised while opening or reading a source stack.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Failed to read file '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to decode TIFF '{path}': {source}")]
    Tiff {
        path: PathBuf,
        source: tiff::TiffError,
    },

    #[error("Malformed stack descriptor '{path}' at line {line}: {reason}")]
    Descriptor {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    #[error("Unsupported stack '{path}': {reason}")]
    Unsupported { path: PathBuf, reason: String },

    #[error("Channel {channel} of '{path}' has no frames")]
    EmptyChannel { path: PathBuf, channel: usize },
}

/// Errors raised while rendering or writing export files.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Failed to write '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write feature table: {0}")]
    Csv(#[from] csv::Error),

    #[error("Failed to render trajectory document: {0}")]
    Xml(String),
}

/// Failure of a single channel run; carries the class of the failing stage.
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("decoding error: {0}")]
    Decode(#[from] DecodeError),

    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("export error: {0}")]
    Export(#[from] ExportError),
}

/// The only error that aborts a whole batch.
#[derive(Debug, Error)]
pub enum BatchError {
    #[error("Cannot resolve input directory '{path}': {source}")]
    InputDirectory {
        path: PathBuf,
        source: std::io::Error,
    },
}
