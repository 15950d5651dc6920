//! Tiles and tile-components (spec §3 "Tile", §4.11).
//!
//! A `Tile` owns one `TileComp` per image component; each `TileComp` owns the
//! `Resolution` tree produced by [`crate::j2k::resolution::analyze`] and,
//! once every codeblock has been run through [`crate::j2k::block_coder`],
//! carries their coded bytes too. Grounded on OpenJPH's `ojph_tile.cpp` /
//! `ojph_tile_comp.cpp` split between tile-level and per-component state.

use crate::error::Result;
use crate::j2k::block_coder;
use crate::j2k::quant::SubbandQuant;
use crate::j2k::resolution::{self, Resolution, SubbandParams};
use crate::j2k::subband::Orientation;
use crate::j2k::{Settings, TilePartDivision};

/// Extra magnitude bit-planes reserved above a component's nominal dynamic
/// range to absorb the DWT's own gain, mirroring JPEG2000's guard-bit count
/// (normally carried in the COD marker's `Sgcod` field; fixed here since this
/// engine always reserves the same margin on both the encode and decode side).
pub const GUARD_BITS: u8 = 2;

/// The quantization policy shared by every subband of one component —
/// reversible carries no transmitted step (`exponent = 0`, `mantissa = 0`);
/// irreversible carries a single caller-chosen mantissa applied uniformly
/// (spec §9 Open Question: "DWA quality-level semantics ... exposed as a
/// scalar knob without promising cross-version stability" — the same design
/// choice applies here to J2K's quality mantissa).
#[derive(Debug, Clone, Copy)]
pub struct Quantization {
    pub component_bit_depth: u8,
    pub reversible: bool,
    pub quality_mantissa: u16,
}

impl Quantization {
    pub fn new(component_bit_depth: u8, reversible: bool, quality_mantissa: u16) -> Self {
        Self { component_bit_depth, reversible, quality_mantissa }
    }

    /// Derives one subband's transmitted quant parameters and `Kmax`, per
    /// spec §4.3/§4.8. `Kmax` is always recomputed from `(exponent,
    /// component_bit_depth, orientation)` rather than transmitted separately,
    /// so a decoder that parses the same QCD/QCC marker reaches the same
    /// value (spec §3's invariant: "Kmax is consistent with the value
    /// recoverable from the QCD marker").
    pub fn params(&self, _resolution: u8, orientation: Orientation) -> SubbandParams {
        let quant = SubbandQuant { exponent: 0, mantissa: if self.reversible { 0 } else { self.quality_mantissa } };
        let k_max = quant.k_max(self.component_bit_depth + GUARD_BITS, orientation);
        SubbandParams { quant, k_max }
    }
}

const ORIENTATIONS: [Orientation; 4] = [Orientation::Ll, Orientation::Hl, Orientation::Lh, Orientation::Hh];

/// One component's resolution tree within a tile.
#[derive(Debug, Clone)]
pub struct TileComp {
    pub resolutions: Vec<Resolution>,
}

impl TileComp {
    /// Runs the DWT analysis and entropy-codes every resulting codeblock
    /// (spec §4.9 analysis direction into spec §4.8's `encodeBlock`).
    pub fn analyze(samples: &[i32], width: u32, height: u32, levels: u8, settings: &Settings, quantization: &Quantization) -> Self {
        let params = |r: u8, o: Orientation| quantization.params(r, o);
        let mut resolutions = resolution::analyze(samples, width, height, levels, settings.reversible, settings.code_block_log_dims, &params);

        for res in &mut resolutions {
            let index = res.index;
            for orientation in ORIENTATIONS {
                let k_max = quantization.params(index, orientation).k_max;
                if let Some(subband) = res.subband_mut(orientation) {
                    for cb in &mut subband.codeblocks {
                        cb.coded = Some(block_coder::encode_block(&cb.magnitudes, &cb.signs, cb.width as usize, cb.height as usize, k_max, false));
                    }
                }
            }
        }

        Self { resolutions }
    }

    /// Builds an empty (not-yet-decoded) resolution tree of the given shape,
    /// ready for a packet parser to fill in each codeblock's [`EncodedBlock`]
    /// (spec §4.10's decode direction) before [`Self::decode_codeblocks`] and
    /// [`Self::synthesize`] run.
    ///
    /// [`EncodedBlock`]: crate::j2k::block_coder::EncodedBlock
    pub fn empty(width: u32, height: u32, levels: u8, code_block_log_dims: (u8, u8)) -> Self {
        let params = |_r: u8, _o: Orientation| SubbandParams { quant: SubbandQuant { exponent: 0, mantissa: 0 }, k_max: 0 };
        let zero_samples = vec![0i32; (width * height) as usize];
        let resolutions = resolution::analyze(&zero_samples, width, height, levels, true, code_block_log_dims, &params);
        Self { resolutions }
    }

    /// Runs every codeblock that has coded bytes attached through
    /// [`block_coder::decode_block`], filling in its magnitude/sign buffers
    /// (spec §4.8's `decodeBlock`). Codeblocks left with no coded bytes
    /// (never included in any packet) stay all-zero.
    pub fn decode_codeblocks(&mut self, quantization: &Quantization) -> Result<()> {
        for res in &mut self.resolutions {
            let index = res.index;
            for orientation in ORIENTATIONS {
                let k_max = quantization.params(index, orientation).k_max;
                if let Some(subband) = res.subband_mut(orientation) {
                    for cb in &mut subband.codeblocks {
                        if let Some(encoded) = cb.coded.clone() {
                            let (magnitudes, signs) = block_coder::decode_block(
                                &encoded.coded, encoded.missing_msbs, encoded.num_passes, encoded.pass_lengths,
                                cb.width as usize, cb.height as usize, k_max, false,
                            )?;
                            cb.magnitudes = magnitudes;
                            cb.signs = signs;
                        }
                    }
                }
            }
        }

        Ok(())
    }

    /// Inverse of [`Self::analyze`]'s DWT half: reconstructs this component's
    /// samples from its (already codeblock-decoded) resolution tree.
    pub fn synthesize(&self, levels: u8, settings: &Settings, quantization: &Quantization) -> (Vec<i32>, u32, u32) {
        let params = |r: u8, o: Orientation| quantization.params(r, o);
        resolution::synthesize(&self.resolutions, levels, settings.reversible, &params)
    }

    /// Zeroes every sample in every subband, used by the `resilient` decode
    /// path when a tile-part is truncated mid-stream (spec §8 S5).
    pub fn zero_out(&mut self) {
        for res in &mut self.resolutions {
            for orientation in ORIENTATIONS {
                if let Some(subband) = res.subband_mut(orientation) {
                    for cb in &mut subband.codeblocks {
                        cb.magnitudes.iter_mut().for_each(|m| *m = 0);
                        cb.signs.iter_mut().for_each(|s| *s = false);
                        cb.coded = None;
                    }
                }
            }
        }
    }
}

/// A rectangular image region, composed of one [`TileComp`] per component.
#[derive(Debug, Clone)]
pub struct Tile {
    pub tile_x: u32,
    pub tile_y: u32,
    pub width: u32,
    pub height: u32,
    pub components: Vec<TileComp>,
}

impl Tile {
    pub fn analyze(tile_x: u32, tile_y: u32, width: u32, height: u32, component_samples: &[Vec<i32>], levels: u8, settings: &Settings, quantizations: &[Quantization]) -> Self {
        let components = component_samples.iter().zip(quantizations.iter())
            .map(|(samples, quant)| TileComp::analyze(samples, width, height, levels, settings, quant))
            .collect();

        Self { tile_x, tile_y, width, height, components }
    }

    /// Number of tile-parts a tile is split into under the given division
    /// style (spec §4.11): one per resolution and/or component boundary, or
    /// a single tile-part when undivided.
    pub fn tile_part_count(levels: u8, num_components: usize, division: TilePartDivision) -> usize {
        let resolutions = levels as usize + 1;
        match division {
            TilePartDivision::None => 1,
            TilePartDivision::Resolutions => resolutions,
            TilePartDivision::Components => num_components.max(1),
            TilePartDivision::ResolutionsAndComponents => resolutions * num_components.max(1),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::j2k::ProgressionOrder;

    fn settings() -> Settings {
        Settings { progression_order: ProgressionOrder::Lrcp, reversible: true, decomposition_levels: 2, code_block_log_dims: (5, 5), ..Settings::default() }
    }

    #[test]
    fn tile_round_trips_single_component() {
        let width = 16u32;
        let height = 16u32;
        let samples: Vec<i32> = (0 .. width * height).map(|i| (i % 255) as i32).collect();
        let settings = settings();
        let quant = Quantization::new(8, true, 0);

        let mut tile = Tile::analyze(0, 0, width, height, &[samples.clone()], settings.decomposition_levels, &settings, &[quant]);
        tile.components[0].decode_codeblocks(&quant).unwrap();
        let (decoded, out_w, out_h) = tile.components[0].synthesize(settings.decomposition_levels, &settings, &quant);

        assert_eq!((out_w, out_h), (width, height));
        assert_eq!(decoded, samples);
    }

    #[test]
    fn tile_part_counts_match_division_style() {
        assert_eq!(Tile::tile_part_count(3, 3, TilePartDivision::None), 1);
        assert_eq!(Tile::tile_part_count(3, 3, TilePartDivision::Resolutions), 4);
        assert_eq!(Tile::tile_part_count(3, 3, TilePartDivision::Components), 3);
        assert_eq!(Tile::tile_part_count(3, 3, TilePartDivision::ResolutionsAndComponents), 12);
    }
}
