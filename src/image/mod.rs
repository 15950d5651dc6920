//! A minimal in-memory container for the pixels that the EXR pixel codec
//! packs into, and unpacks from, scanline or tile chunks.
//!
//! This is deliberately a thin convenience layer, not a full image-processing
//! library: its only contract with the codec (see `crate::block`) is to hand
//! out a row of samples for a given channel and row index, in the channel
//! order dictated by the header's channel list. Colour conversion, display
//! rendering, and image editing are out of scope; this module only stores and
//! indexes sample buffers.

pub mod simple;
pub mod validate_results;

use crate::math::Vec2;
use crate::meta::attribute::{SampleType, Text};
use half::f16;

/// One channel's worth of flat (non-deep) samples for a single level, stored
/// contiguously in row-major order at the channel's own, possibly subsampled,
/// resolution.
#[derive(Debug, Clone, PartialEq)]
pub enum FlatSamples {
    /// 16-bit float samples.
    F16(Vec<f16>),

    /// 32-bit float samples.
    F32(Vec<f32>),

    /// 32-bit unsigned integer samples.
    U32(Vec<u32>),
}

impl FlatSamples {
    /// The pixel type this storage was built for.
    pub fn sample_type(&self) -> SampleType {
        match self {
            FlatSamples::F16(_) => SampleType::F16,
            FlatSamples::F32(_) => SampleType::F32,
            FlatSamples::U32(_) => SampleType::U32,
        }
    }

    /// Number of samples stored, regardless of their type.
    pub fn len(&self) -> usize {
        match self {
            FlatSamples::F16(v) => v.len(),
            FlatSamples::F32(v) => v.len(),
            FlatSamples::U32(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool { self.len() == 0 }

    /// Allocates zeroed storage of the given type for `sample_count` samples.
    pub fn zeroed(sample_type: SampleType, sample_count: usize) -> Self {
        match sample_type {
            SampleType::F16 => FlatSamples::F16(vec![f16::from_f32(0.0); sample_count]),
            SampleType::F32 => FlatSamples::F32(vec![0.0; sample_count]),
            SampleType::U32 => FlatSamples::U32(vec![0; sample_count]),
        }
    }
}

/// One channel's worth of samples at one resolution level.
///
/// For a deep image, a level additionally carries a `sample_counts` channel
/// (one `u32` count per pixel) alongside every data channel; each data
/// channel's storage then holds the concatenation of all per-pixel sample
/// lists instead of one sample per pixel.
#[derive(Debug, Clone, PartialEq)]
pub struct Channel {
    pub name: Text,
    pub sampling: Vec2<usize>,
    pub samples: FlatSamples,
}

impl Channel {
    pub fn new(name: Text, sampling: Vec2<usize>, samples: FlatSamples) -> Self {
        Self { name, sampling, samples }
    }
}

/// One resolution level of an image part: a fixed-size grid of named channels.
#[derive(Debug, Clone, PartialEq)]
pub struct Level {
    /// Pixel resolution of every channel in this level, before subsampling.
    pub resolution: Vec2<usize>,

    pub channels: Vec<Channel>,

    /// Present only for deep levels: one sample count per pixel.
    pub deep_sample_counts: Option<Vec<u32>>,
}

impl Level {
    pub fn new(resolution: Vec2<usize>, channels: Vec<Channel>) -> Self {
        Self { resolution, channels, deep_sample_counts: None }
    }

    /// Look up a channel by name, as the codec does when it needs to read or
    /// write that channel's row data.
    pub fn channel(&self, name: &str) -> Option<&Channel> {
        self.channels.iter().find(|channel| channel.name.to_string() == name)
    }

    pub fn channel_mut(&mut self, name: &str) -> Option<&mut Channel> {
        self.channels.iter_mut().find(|channel| channel.name.to_string() == name)
    }

    pub fn is_deep(&self) -> bool { self.deep_sample_counts.is_some() }
}

/// One part (layer) of an EXR file: a pyramid of resolution levels addressed
/// by `(level_x, level_y)`. For `ONE_LEVEL` and `MIPMAP` files, `level_x ==
/// level_y` always; for `RIPMAP` files the two indices are independent.
#[derive(Debug, Clone, PartialEq)]
pub struct Image {
    pub data_window: crate::meta::attribute::IntegerBounds,
    levels: Vec<Vec<Level>>, // indexed [level_y][level_x]
}

impl Image {
    pub fn new(data_window: crate::meta::attribute::IntegerBounds, levels: Vec<Vec<Level>>) -> Self {
        Self { data_window, levels }
    }

    /// A single, full-resolution level, as used by `ONE_LEVEL` (non-mipmapped) images.
    pub fn flat(data_window: crate::meta::attribute::IntegerBounds, level: Level) -> Self {
        Self { data_window, levels: vec![vec![level]] }
    }

    /// The level at the given rip-map coordinates. For mipmapped images, pass
    /// the same index for both `level_x` and `level_y`.
    pub fn level(&self, level_x: usize, level_y: usize) -> Option<&Level> {
        self.levels.get(level_y).and_then(|row| row.get(level_x))
    }

    pub fn level_mut(&mut self, level_x: usize, level_y: usize) -> Option<&mut Level> {
        self.levels.get_mut(level_y).and_then(|row| row.get_mut(level_x))
    }

    pub fn level_count_x(&self) -> usize { self.levels.first().map_or(0, |row| row.len()) }
    pub fn level_count_y(&self) -> usize { self.levels.len() }
}
