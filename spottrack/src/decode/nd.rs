//! MetaMorph `.nd` stacks.
//!
//! The `.nd` file is a small text descriptor of `"Key", value` lines next to
//! the TIFF files holding the pixels:
//!
//! ```text
//! "NDInfoFile", Version 1.0
//! "DoTimelapse", TRUE
//! "NTimePoints", 40
//! "DoStage", FALSE
//! "DoWave", TRUE
//! "NWavelengths", 2
//! "WaveName1", "Quad-TIRF488"
//! "WaveName2", "Quad-TIRF642"
//! "EndFile"
//! ```
//!
//! Frame `t` (1-based) of wave `n` is stored in `<base>_w<n><WaveName>_t<t>.TIF`.
//! Without a timelapse each wave is one multi-page `<base>_w<n><WaveName>.TIF`.

use std::path::{Path, PathBuf};

use common::Buffer2;

use super::tiff_pages::{read_first_page, read_pages};
use super::{StackDecoder, StackSource};
use crate::error::DecodeError;

/// Acquisition layout parsed from an `.nd` descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NdDescriptor {
    pub do_timelapse: bool,
    pub time_points: usize,
    pub do_stage: bool,
    pub stage_positions: usize,
    pub do_wave: bool,
    /// One entry per wavelength; a single unnamed wave when `do_wave` is off.
    pub wave_names: Vec<String>,
    pub do_z_series: bool,
    pub z_steps: usize,
}

impl NdDescriptor {
    /// Parse descriptor text; `path` is only used in error reports.
    pub fn parse(text: &str, path: &Path) -> Result<Self, DecodeError> {
        let mut nd = NdDescriptor::default();
        let mut n_waves = 0usize;
        let mut names: Vec<(usize, String)> = Vec::new();

        for (index, raw) in text.lines().enumerate() {
            let line_no = index + 1;
            let line = raw.trim();
            if line.is_empty() {
                continue;
            }
            let descriptor_error = |reason: String| DecodeError::Descriptor {
                path: path.to_path_buf(),
                line: line_no,
                reason,
            };

            let (key, value) = match line.split_once(',') {
                Some((key, value)) => (unquote(key), unquote(value)),
                None => (unquote(line), ""),
            };
            if key.is_empty() {
                return Err(descriptor_error("missing key".to_string()));
            }

            let flag = || {
                parse_flag(value)
                    .ok_or_else(|| descriptor_error(format!("'{value}' is not TRUE or FALSE")))
            };
            let count = || {
                value
                    .parse::<usize>()
                    .map_err(|_| descriptor_error(format!("'{value}' is not a count")))
            };

            match key {
                "EndFile" => break,
                "DoTimelapse" => nd.do_timelapse = flag()?,
                "NTimePoints" => nd.time_points = count()?,
                "DoStage" => nd.do_stage = flag()?,
                "NStagePositions" => nd.stage_positions = count()?,
                "DoWave" => nd.do_wave = flag()?,
                "NWavelengths" => n_waves = count()?,
                "DoZSeries" => nd.do_z_series = flag()?,
                "NZSteps" => nd.z_steps = count()?,
                _ => {
                    if let Some(number) = key.strip_prefix("WaveName") {
                        let number = number
                            .parse::<usize>()
                            .map_err(|_| descriptor_error(format!("bad wave key '{key}'")))?;
                        names.push((number, value.to_string()));
                    }
                }
            }
        }

        let unsupported = |reason: &str| DecodeError::Unsupported {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        };
        let missing = |reason: &str| DecodeError::Descriptor {
            path: path.to_path_buf(),
            line: 0,
            reason: reason.to_string(),
        };

        if nd.do_stage && nd.stage_positions > 1 {
            return Err(unsupported("multi-position stacks"));
        }
        if nd.do_z_series && nd.z_steps > 1 {
            return Err(unsupported("z-series stacks"));
        }
        if nd.do_timelapse && nd.time_points == 0 {
            return Err(missing("timelapse without NTimePoints"));
        }

        if nd.do_wave {
            if n_waves == 0 {
                return Err(missing("DoWave without NWavelengths"));
            }
            nd.wave_names = (1..=n_waves)
                .map(|n| {
                    names
                        .iter()
                        .find(|(number, _)| *number == n)
                        .map(|(_, name)| name.clone())
                        .ok_or_else(|| missing(&format!("WaveName{n} is missing")))
                })
                .collect::<Result<_, _>>()?;
        } else {
            nd.wave_names = vec![String::new()];
        }
        Ok(nd)
    }

    /// File name stem of one wave (and time point, for timelapses), without
    /// the extension.
    fn stem(&self, base: &str, wave: usize, time_point: Option<usize>) -> String {
        let mut stem = base.to_string();
        if self.do_wave {
            stem.push_str(&format!("_w{}{}", wave + 1, self.wave_names[wave]));
        }
        if self.do_stage {
            stem.push_str("_s1");
        }
        if let Some(t) = time_point {
            stem.push_str(&format!("_t{t}"));
        }
        stem
    }
}

fn unquote(s: &str) -> &str {
    let s = s.trim();
    s.strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(s)
}

fn parse_flag(value: &str) -> Option<bool> {
    if value.eq_ignore_ascii_case("TRUE") {
        Some(true)
    } else if value.eq_ignore_ascii_case("FALSE") {
        Some(false)
    } else {
        None
    }
}

/// Locate `<stem>.TIF`, falling back to `<stem>.tif`.
fn find_tiff(dir: &Path, stem: &str) -> Result<PathBuf, DecodeError> {
    let upper = dir.join(format!("{stem}.TIF"));
    if upper.is_file() {
        return Ok(upper);
    }
    let lower = dir.join(format!("{stem}.tif"));
    if lower.is_file() {
        return Ok(lower);
    }
    Err(DecodeError::Io {
        path: upper,
        source: std::io::Error::new(std::io::ErrorKind::NotFound, "stack file not found"),
    })
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NdDecoder;

impl StackDecoder for NdDecoder {
    fn extensions(&self) -> &[&str] {
        &["nd"]
    }

    fn open(&self, path: &Path) -> Result<Box<dyn StackSource>, DecodeError> {
        let text = std::fs::read_to_string(path).map_err(|source| DecodeError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let descriptor = NdDescriptor::parse(&text, path)?;
        tracing::debug!(
            "Opened {}: {} wave(s), {} time point(s)",
            path.display(),
            descriptor.wave_names.len(),
            descriptor.time_points
        );
        Ok(Box::new(NdStack {
            dir: path.parent().map(Path::to_path_buf).unwrap_or_default(),
            base: common::file_utils::base_name(path),
            path: path.to_path_buf(),
            descriptor,
        }))
    }
}

/// An opened `.nd` stack; pixels are read per channel on demand.
#[derive(Debug)]
pub struct NdStack {
    dir: PathBuf,
    base: String,
    path: PathBuf,
    descriptor: NdDescriptor,
}

impl StackSource for NdStack {
    fn channel_count(&self) -> usize {
        self.descriptor.wave_names.len()
    }

    fn channel_name(&self, channel: usize) -> &str {
        self.descriptor
            .wave_names
            .get(channel)
            .map_or("", String::as_str)
    }

    fn read_channel(&self, channel: usize) -> Result<Vec<Buffer2<f32>>, DecodeError> {
        if channel >= self.channel_count() {
            return Err(DecodeError::EmptyChannel {
                path: self.path.clone(),
                channel: channel + 1,
            });
        }

        let nd = &self.descriptor;
        let frames = if nd.do_timelapse {
            (1..=nd.time_points)
                .map(|t| {
                    let file = find_tiff(&self.dir, &nd.stem(&self.base, channel, Some(t)))?;
                    read_first_page(&file)
                })
                .collect::<Result<Vec<_>, _>>()?
        } else {
            read_pages(&find_tiff(&self.dir, &nd.stem(&self.base, channel, None))?)?
        };

        if frames.is_empty() {
            return Err(DecodeError::EmptyChannel {
                path: self.path.clone(),
                channel: channel + 1,
            });
        }
        Ok(frames)
    }
}
