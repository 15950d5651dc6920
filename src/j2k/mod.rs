//! A JPEG-2000-family codestream codec: tile → resolution → subband →
//! precinct → codeblock, with a reversible (5/3) and an irreversible (9/7)
//! discrete wavelet transform and an MQ-style arithmetic bit-plane coder.
//!
//! This stack shares no on-disk format with the EXR side of this crate, but
//! follows the same shape: a typed header (here, codestream markers) governs
//! a tree of fixed-size coding units that are packed into, and unpacked from,
//! a byte stream through a pluggable entropy coder.

pub mod alloc;
pub mod bitstream;
pub mod block_coder;
pub mod dwt;
pub mod markers;
pub mod packet;
pub mod progression;
pub mod quant;
pub mod resolution;
pub mod subband;
pub mod tag_tree;
pub mod tile;

use crate::error::{Error, Result};

/// One of the five packet orderings a codestream may declare in its COD marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProgressionOrder {
    /// Layer, Resolution, Component, Position.
    Lrcp,
    /// Resolution, Layer, Component, Position.
    Rlcp,
    /// Resolution, Position, Component, Layer.
    Rpcl,
    /// Position, Component, Resolution, Layer.
    Pcrl,
    /// Component, Position, Resolution, Layer.
    Cprl,
}

impl ProgressionOrder {
    pub(crate) fn marker_code(self) -> u8 {
        match self {
            ProgressionOrder::Lrcp => 0,
            ProgressionOrder::Rlcp => 1,
            ProgressionOrder::Rpcl => 2,
            ProgressionOrder::Pcrl => 3,
            ProgressionOrder::Cprl => 4,
        }
    }

    pub(crate) fn from_marker_code(code: u8) -> Result<Self> {
        Ok(match code {
            0 => ProgressionOrder::Lrcp,
            1 => ProgressionOrder::Rlcp,
            2 => ProgressionOrder::Rpcl,
            3 => ProgressionOrder::Pcrl,
            4 => ProgressionOrder::Cprl,
            other => return Err(Error::format(format!("unknown progression order code {}", other))),
        })
    }
}

/// How a tile's coded data is split into tile-parts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TilePartDivision {
    /// One tile-part per tile.
    None,
    /// A new tile-part at every resolution boundary.
    Resolutions,
    /// A new tile-part at every component boundary.
    Components,
    /// A new tile-part at every resolution and every component boundary.
    ResolutionsAndComponents,
}

/// A caller-facing profile hint, imposing extra validation on the rest of `Settings`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Profile {
    None,
    Broadcast,
    Imf,
}

/// The tunable coding parameters a caller can select, mirroring the codestream's
/// own COD/COC/QCD/QCC markers (spec-facing, not a registry of every marker field).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Settings {
    pub progression_order: ProgressionOrder,
    pub reversible: bool,
    pub decomposition_levels: u8,
    pub code_block_log_dims: (u8, u8),
    pub precinct_log_dims: Option<(u8, u8)>,
    pub color_transform: bool,
    pub tile_part_division: TilePartDivision,
    pub request_tlm: bool,
    pub use_sop: bool,
    pub use_eph: bool,
    pub profile: Profile,

    /// When true, a structurally broken tile-part, packet header, or codeblock
    /// is zeroed and skipped (with a diagnostic recorded) instead of aborting
    /// the whole decode. Mirrors the EXR side's `pedantic` flag, inverted.
    pub resilient: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            progression_order: ProgressionOrder::Lrcp,
            reversible: true,
            decomposition_levels: 5,
            code_block_log_dims: (6, 6),
            precinct_log_dims: None,
            color_transform: false,
            tile_part_division: TilePartDivision::None,
            request_tlm: false,
            use_sop: false,
            use_eph: false,
            profile: Profile::None,
            resilient: false,
        }
    }
}

impl Settings {
    /// Validates the combination of settings against the profile hint, per spec §6.7
    /// ("Profile hints impose extra validation, e.g. IMF demands CPRL, 32x32 code
    /// blocks, tile-part divisions at component boundary").
    pub fn validate(&self) -> Result<()> {
        if self.code_block_log_dims.0 as u32 + self.code_block_log_dims.1 as u32 > 12 {
            return Err(Error::invalid("code-block log-dims sum must not exceed 12"));
        }

        if self.code_block_log_dims.0 == 0 || self.code_block_log_dims.1 == 0 {
            return Err(Error::invalid("code-block log-dims must be at least 1"));
        }

        match self.profile {
            Profile::Imf => {
                if self.progression_order != ProgressionOrder::Cprl {
                    return Err(Error::invalid("IMF profile requires CPRL progression"));
                }

                if self.code_block_log_dims != (5, 5) {
                    return Err(Error::invalid("IMF profile requires 32x32 code blocks"));
                }

                if !matches!(self.tile_part_division, TilePartDivision::Components | TilePartDivision::ResolutionsAndComponents) {
                    return Err(Error::invalid("IMF profile requires tile-part division at component boundaries"));
                }
            },
            Profile::Broadcast | Profile::None => {},
        }

        Ok(())
    }
}

/// Per-component coding geometry derived from the SIZ marker (spec §3 "Image geometry").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComponentGeometry {
    pub bit_depth: u8,
    pub signed: bool,
    pub downsampling: (u8, u8),
}

/// The image-level geometry carried by the SIZ marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageGeometry {
    pub image_offset: (u32, u32),
    pub image_extent: (u32, u32),
    pub tile_offset: (u32, u32),
    pub tile_size: (u32, u32),
    pub components: Vec<ComponentGeometry>,
}

impl ImageGeometry {
    /// Width/height of the decoded image for one component, per spec §3:
    /// `ceil((image_extent - image_offset) / downsampling)`.
    pub fn component_size(&self, component: usize) -> Result<(u32, u32)> {
        let comp = self.components.get(component)
            .ok_or_else(|| Error::invalid("component index out of range"))?;

        let width = self.image_extent.0.saturating_sub(self.image_offset.0);
        let height = self.image_extent.1.saturating_sub(self.image_offset.1);

        let div_ceil = |a: u32, b: u32| (a + b - 1) / b;
        Ok((div_ceil(width, comp.downsampling.0 as u32), div_ceil(height, comp.downsampling.1 as u32)))
    }

    pub fn tile_count(&self) -> (u32, u32) {
        let div_ceil = |a: u32, b: u32| if b == 0 { 0 } else { (a + b - 1) / b };
        let width = self.image_extent.0.saturating_sub(self.tile_offset.0);
        let height = self.image_extent.1.saturating_sub(self.tile_offset.1);
        (div_ceil(width, self.tile_size.0), div_ceil(height, self.tile_size.1))
    }
}
