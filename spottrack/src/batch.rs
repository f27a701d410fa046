//! Batch orchestration over a directory of source stacks.
//!
//! Each source file is opened once. Every configured channel then runs the
//! full pipeline (detect, filter spots, link, filter tracks, export) on its
//! own; a failure is recorded in the [`BatchReport`] and the run moves on.

use std::path::{Path, PathBuf};

use rayon::prelude::*;

use crate::config::{BatchConfig, ChannelConfig};
use crate::decode::{NdDecoder, StackDecoder, StackSource};
use crate::detection::SpotDetector;
use crate::error::{BatchError, ChannelError, ConfigError};
use crate::export::{ExportedFiles, export_model};
use crate::filter::{filter_spots, filter_tracks};
use crate::linking::SparseLapLinker;

// ============================================================================
// Report
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum ChannelOutcome {
    Exported {
        files: ExportedFiles,
        n_spots: usize,
        n_tracks: usize,
    },
    Failed {
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChannelReport {
    /// 1-based channel index from the config.
    pub channel: usize,
    pub label: String,
    pub outcome: ChannelOutcome,
}

impl ChannelReport {
    pub fn is_exported(&self) -> bool {
        matches!(self.outcome, ChannelOutcome::Exported { .. })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FileReport {
    pub path: PathBuf,
    /// Channel reports, or why the file could not be opened.
    pub outcome: Result<Vec<ChannelReport>, String>,
}

impl FileReport {
    pub fn channels(&self) -> &[ChannelReport] {
        self.outcome.as_deref().unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchReport {
    pub files: Vec<FileReport>,
}

impl BatchReport {
    pub fn exported_channels(&self) -> usize {
        self.files
            .iter()
            .flat_map(|f| f.channels())
            .filter(|c| c.is_exported())
            .count()
    }

    pub fn failed_channels(&self) -> usize {
        self.files
            .iter()
            .flat_map(|f| f.channels())
            .filter(|c| !c.is_exported())
            .count()
    }

    pub fn failed_files(&self) -> usize {
        self.files.iter().filter(|f| f.outcome.is_err()).count()
    }
}

// ============================================================================
// Runner
// ============================================================================

pub struct BatchRunner {
    config: BatchConfig,
    decoder: Box<dyn StackDecoder>,
}

impl BatchRunner {
    /// Runner reading MetaMorph `.nd` stacks.
    pub fn new(config: BatchConfig) -> Self {
        Self::with_decoder(config, Box::new(NdDecoder))
    }

    pub fn with_decoder(config: BatchConfig, decoder: Box<dyn StackDecoder>) -> Self {
        Self { config, decoder }
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Process every source file in `input_dir`.
    ///
    /// Outputs go to `output_dir`, else the configured output directory, else
    /// `input_dir`. Only an unreadable input directory fails the whole run.
    pub fn run(
        &self,
        input_dir: &Path,
        output_dir: Option<&Path>,
    ) -> Result<BatchReport, BatchError> {
        let extensions = self.decoder.extensions();
        let sources = common::file_utils::files_with_extensions(input_dir, extensions)
            .map_err(|source| {
                tracing::error!("Cannot read input directory {}: {}", input_dir.display(), source);
                BatchError::InputDirectory {
                    path: input_dir.to_path_buf(),
                    source,
                }
            })?;

        let output_dir = output_dir
            .or(self.config.output_dir.as_deref())
            .unwrap_or(input_dir);
        if let Err(e) = std::fs::create_dir_all(output_dir) {
            tracing::warn!("Cannot create output directory {}: {}", output_dir.display(), e);
        }
        tracing::info!(
            "Found {} source file(s) in {}, writing to {}",
            sources.len(),
            input_dir.display(),
            output_dir.display()
        );

        let files: Vec<FileReport> = if self.config.parallel {
            sources
                .par_iter()
                .map(|path| self.process_file(path, output_dir))
                .collect()
        } else {
            sources
                .iter()
                .map(|path| self.process_file(path, output_dir))
                .collect()
        };

        let report = BatchReport { files };
        tracing::info!(
            "Analysis complete: {} file(s), {} channel(s) exported, {} failed, {} unreadable",
            report.files.len(),
            report.exported_channels(),
            report.failed_channels(),
            report.failed_files()
        );
        Ok(report)
    }

    fn process_file(&self, path: &Path, output_dir: &Path) -> FileReport {
        tracing::info!("Processing {}", path.display());
        let source = match self.decoder.open(path) {
            Ok(source) => source,
            Err(e) => {
                tracing::warn!("Skipping {}: {}", path.display(), e);
                return FileReport {
                    path: path.to_path_buf(),
                    outcome: Err(e.to_string()),
                };
            }
        };

        let base = common::file_utils::base_name(path);
        let mut channels = Vec::with_capacity(self.config.channels.len());
        // A decoding failure leaves the stack unreliable for the channels after it.
        let mut decode_failure: Option<String> = None;
        for channel in &self.config.channels {
            let outcome = match &decode_failure {
                Some(reason) => ChannelOutcome::Failed {
                    reason: format!("skipped after decoding error: {reason}"),
                },
                None => match self.process_channel(source.as_ref(), channel, &base, output_dir) {
                    Ok(outcome) => outcome,
                    Err(e) => {
                        tracing::warn!(
                            "Channel {} ({}) of {} failed: {}",
                            channel.target_channel,
                            channel.label,
                            path.display(),
                            e
                        );
                        if let ChannelError::Decode(decode) = &e {
                            decode_failure = Some(decode.to_string());
                        }
                        ChannelOutcome::Failed {
                            reason: e.to_string(),
                        }
                    }
                },
            };
            channels.push(ChannelReport {
                channel: channel.target_channel,
                label: channel.label.clone(),
                outcome,
            });
        }

        FileReport {
            path: path.to_path_buf(),
            outcome: Ok(channels),
        }
    }

    fn process_channel(
        &self,
        source: &dyn StackSource,
        channel: &ChannelConfig,
        base: &str,
        output_dir: &Path,
    ) -> Result<ChannelOutcome, ChannelError> {
        let calibration = &self.config.calibration;
        calibration.validate()?;
        channel.validate()?;
        if channel.target_channel > source.channel_count() {
            return Err(ConfigError::ChannelOutOfRange {
                channel: channel.target_channel,
                available: source.channel_count(),
            }
            .into());
        }

        let frames = source.read_channel(channel.target_channel - 1)?;
        tracing::debug!(
            "Channel {} ({}): {} frame(s)",
            channel.target_channel,
            source.channel_name(channel.target_channel - 1),
            frames.len()
        );

        let detector = SpotDetector::new(channel.detector.clone(), calibration.clone());
        let mut spots = detector.detect(&frames)?;
        drop(frames);

        let n_spots = filter_spots(&mut spots, &channel.spot_filters);
        let mut model = SparseLapLinker::new(channel.linker.clone()).link(spots)?;
        let n_tracks = filter_tracks(&mut model, &channel.track_filters);

        let (trajectory_path, table_path) = channel.output_paths(output_dir, base);
        let files = export_model(&model, calibration, base, &trajectory_path, &table_path)?;
        tracing::info!(
            "Channel {} ({}): {} spot(s), {} track(s) -> {}",
            channel.target_channel,
            channel.label,
            n_spots,
            n_tracks,
            files.feature_table.display()
        );

        Ok(ChannelOutcome::Exported {
            files,
            n_spots,
            n_tracks,
        })
    }
}
