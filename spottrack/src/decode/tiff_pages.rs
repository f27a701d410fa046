//! Grayscale TIFF pages as `f32` frames.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use tiff::ColorType;
use tiff::decoder::{Decoder, DecodingResult, Limits};

use common::Buffer2;

use crate::error::DecodeError;

/// Read every page of a grayscale TIFF.
pub fn read_pages(path: &Path) -> Result<Vec<Buffer2<f32>>, DecodeError> {
    let mut decoder = open(path)?;
    let mut pages = vec![read_current(&mut decoder, path)?];
    while decoder.more_images() {
        decoder.next_image().map_err(|e| tiff_error(path, e))?;
        pages.push(read_current(&mut decoder, path)?);
    }
    Ok(pages)
}

/// Read only the first page of a TIFF.
pub fn read_first_page(path: &Path) -> Result<Buffer2<f32>, DecodeError> {
    let mut decoder = open(path)?;
    read_current(&mut decoder, path)
}

fn open(path: &Path) -> Result<Decoder<BufReader<File>>, DecodeError> {
    let file = File::open(path).map_err(|source| DecodeError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Decoder::new(BufReader::new(file))
        .map(|decoder| decoder.with_limits(Limits::unlimited()))
        .map_err(|e| tiff_error(path, e))
}

fn read_current(
    decoder: &mut Decoder<BufReader<File>>,
    path: &Path,
) -> Result<Buffer2<f32>, DecodeError> {
    match decoder.colortype().map_err(|e| tiff_error(path, e))? {
        ColorType::Gray(_) => {}
        other => {
            return Err(DecodeError::Unsupported {
                path: path.to_path_buf(),
                reason: format!("only grayscale pages are supported, got {other:?}"),
            });
        }
    }

    let (width, height) = decoder.dimensions().map_err(|e| tiff_error(path, e))?;
    let image = decoder.read_image().map_err(|e| tiff_error(path, e))?;
    let pixels: Vec<f32> = match image {
        DecodingResult::U8(buf) => buf.into_iter().map(f32::from).collect(),
        DecodingResult::U16(buf) => buf.into_iter().map(f32::from).collect(),
        DecodingResult::U32(buf) => buf.into_iter().map(|v| v as f32).collect(),
        DecodingResult::U64(buf) => buf.into_iter().map(|v| v as f32).collect(),
        DecodingResult::I8(buf) => buf.into_iter().map(f32::from).collect(),
        DecodingResult::I16(buf) => buf.into_iter().map(f32::from).collect(),
        DecodingResult::I32(buf) => buf.into_iter().map(|v| v as f32).collect(),
        DecodingResult::I64(buf) => buf.into_iter().map(|v| v as f32).collect(),
        DecodingResult::F16(buf) => buf.into_iter().map(f32::from).collect(),
        DecodingResult::F32(buf) => buf,
        DecodingResult::F64(buf) => buf.into_iter().map(|v| v as f32).collect(),
        _ => {
            return Err(DecodeError::Unsupported {
                path: path.to_path_buf(),
                reason: "unsupported sample format".to_string(),
            });
        }
    };

    let (width, height) = (width as usize, height as usize);
    if pixels.len() != width * height {
        return Err(DecodeError::Unsupported {
            path: path.to_path_buf(),
            reason: format!(
                "page holds {} samples for {}x{} pixels",
                pixels.len(),
                width,
                height
            ),
        });
    }
    Ok(Buffer2::new(width, height, pixels))
}

fn tiff_error(path: &Path, source: tiff::TiffError) -> DecodeError {
    DecodeError::Tiff {
        path: path.to_path_buf(),
        source,
    }
}
