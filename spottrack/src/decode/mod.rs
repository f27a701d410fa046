//! Source stack decoding.
//!
//! A [`StackDecoder`] recognises source files by extension and opens them as
//! a [`StackSource`], which yields the frames of one channel at a time. Pixel
//! data is only loaded by [`StackSource::read_channel`] and is owned by the
//! caller, so dropping it releases the channel.

pub mod nd;
pub mod tiff_pages;

use std::path::Path;

use common::Buffer2;

use crate::error::DecodeError;

pub use nd::{NdDecoder, NdDescriptor};

pub trait StackDecoder: Send + Sync {
    /// Lower-case file extensions this decoder opens, without the dot.
    fn extensions(&self) -> &[&str];

    fn open(&self, path: &Path) -> Result<Box<dyn StackSource>, DecodeError>;
}

pub trait StackSource: Send {
    fn channel_count(&self) -> usize;

    /// Channel name for a 0-based index; empty when the source has none.
    fn channel_name(&self, channel: usize) -> &str;

    /// All frames of a 0-based channel, in time order.
    fn read_channel(&self, channel: usize) -> Result<Vec<Buffer2<f32>>, DecodeError>;
}
