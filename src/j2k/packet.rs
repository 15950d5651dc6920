//! Precinct packet headers (spec §4.10): the per-precinct, per-layer record
//! of which codeblocks are newly included, how many coding passes and bytes
//! each contributes, and the raw coded bytes that immediately follow.
//!
//! This engine only ever produces a single quality layer, so a packet header
//! only ever needs to say, once per codeblock, whether it is included at all
//! (no repeated per-layer inclusion state to track across calls). The
//! inclusion and missing-MSB fields are still carried through
//! [`crate::j2k::tag_tree::TagTree`], exactly as a multi-layer encoder would,
//! so the header shape generalizes if a caller ever wants more than one
//! layer. Pass-length fields use [`crate::j2k::bitstream::BitWriter::put_gamma`]
//! rather than the standard's explicit `Lblock` growth protocol — both are
//! variable-length codes serving the same purpose, and this crate's entropy
//! coder is already not bitstream-compatible with a reference MQ decoder (see
//! `crate::j2k::block_coder`), so matching the standard's exact code lengths
//! here would not buy interoperability.
//!
//! Grounded on OpenJPH's `ojph_precinct.cpp` (precinct owns one tag tree per
//! subband for inclusion and one for missing MSBs) and `iszak-jpeg2000`'s
//! `jpc::tag_tree` for the encode/decode call shape.

use crate::error::{Error, Result};
use crate::j2k::bitstream::{BitReader, BitWriter};
use crate::j2k::block_coder::EncodedBlock;
use crate::j2k::resolution::Resolution;
use crate::j2k::subband::Orientation;
use crate::j2k::tag_tree::TagTree;

/// A codeblock range, in that subband's own codeblock-grid coordinates, that
/// one precinct contributes from one band. `(x0, y0)` inclusive, `(x1, y1)`
/// exclusive.
pub type BandRange = (Orientation, (u32, u32, u32, u32));

/// One precinct of one resolution: the codeblock ranges it owns from each
/// band that resolution carries. Holds no pointers back into the subbands it
/// ranges over (spec §9's "Cyclic graphs" note) — every packet call is handed
/// the owning [`Resolution`] alongside the `Precinct`.
#[derive(Debug, Clone)]
pub struct Precinct {
    pub resolution_index: u8,
    pub precinct_index: u32,
    pub bands: Vec<BandRange>,
}

/// Splits one resolution's subbands into precincts. With no explicit precinct
/// size (`precinct_log_dims: None`), a resolution is a single precinct
/// covering every codeblock — the common case for this engine's default
/// settings. With an explicit size, every band is partitioned by the same
/// precinct grid, sized in codeblock units against that band's own grid
/// (spec §3 "Subband → Codeblock grid" does not mandate precinct-to-codeblock
/// alignment across orientations; treating every orientation's grid
/// independently is this engine's simplification of that relationship).
pub fn partition_precincts(resolution: &Resolution, precinct_log_dims: Option<(u8, u8)>, code_block_log_dims: (u8, u8)) -> Vec<Precinct> {
    let bands: Vec<(Orientation, &crate::j2k::subband::Subband)> = resolution.subbands().collect();

    let Some((px, py)) = precinct_log_dims else {
        let ranges = bands.iter().map(|&(o, s)| (o, (0, 0, s.codeblocks_wide, s.codeblocks_high()))).collect();
        return vec![Precinct { resolution_index: resolution.index, precinct_index: 0, bands: ranges }];
    };

    let precinct_w_cb = 1u32 << px.saturating_sub(code_block_log_dims.0) as u32;
    let precinct_h_cb = 1u32 << py.saturating_sub(code_block_log_dims.1) as u32;

    let (grid_w, grid_h) = bands.iter()
        .map(|&(_, s)| (s.codeblocks_wide, s.codeblocks_high()))
        .max_by_key(|&(w, h)| w * h)
        .unwrap_or((0, 0));

    if grid_w == 0 || grid_h == 0 {
        return vec![Precinct { resolution_index: resolution.index, precinct_index: 0, bands: Vec::new() }];
    }

    let precincts_x = (grid_w + precinct_w_cb - 1) / precinct_w_cb;
    let precincts_y = (grid_h + precinct_h_cb - 1) / precinct_h_cb;

    let mut out = Vec::with_capacity((precincts_x * precincts_y) as usize);
    for py_i in 0 .. precincts_y {
        for px_i in 0 .. precincts_x {
            let mut ranges = Vec::with_capacity(bands.len());
            for &(orientation, subband) in &bands {
                let x0 = (px_i * precinct_w_cb).min(subband.codeblocks_wide);
                let x1 = ((px_i + 1) * precinct_w_cb).min(subband.codeblocks_wide);
                let y0 = (py_i * precinct_h_cb).min(subband.codeblocks_high());
                let y1 = ((py_i + 1) * precinct_h_cb).min(subband.codeblocks_high());
                ranges.push((orientation, (x0, y0, x1, y1)));
            }
            out.push(Precinct { resolution_index: resolution.index, precinct_index: py_i * precincts_x + px_i, bands: ranges });
        }
    }

    out
}

fn band_extent(range: &(u32, u32, u32, u32)) -> (usize, usize) {
    let (x0, y0, x1, y1) = *range;
    ((x1.saturating_sub(x0)) as usize, (y1.saturating_sub(y0)) as usize)
}

/// Builds this packet's header and appends the raw coded bytes of every
/// newly-included codeblock, returning the finished packet (including SOP/EPH
/// markers if requested). Codeblocks with no coding passes (entirely zero)
/// are left out of the packet altogether — a decoder that never sees them
/// leaves their magnitudes at zero already, so no placeholder needs
/// transmitting (spec §8's 1-byte placeholder rule governs the block coder's
/// own output, not packet inclusion).
pub fn encode_packet(resolution: &Resolution, precinct: &Precinct, use_sop: bool, use_eph: bool, sop_sequence: u16) -> Vec<u8> {
    let mut out = Vec::new();
    if use_sop {
        out.extend_from_slice(&[0xFF, 0x91, 0x00, 0x04]);
        out.extend_from_slice(&sop_sequence.to_be_bytes());
    }

    let mut writer = BitWriter::new();
    let mut included_blocks: Vec<&EncodedBlock> = Vec::new();

    let any_included = precinct.bands.iter().any(|(orientation, range)| {
        let subband = resolution.subband(*orientation).expect("precinct band references a subband the resolution does not carry");
        let (x0, y0, x1, y1) = *range;
        (y0 .. y1).any(|cby| (x0 .. x1).any(|cbx| subband.codeblock(cbx, cby).coded.as_ref().is_some_and(|e| e.num_passes > 0)))
    });

    writer.put_bit(u8::from(any_included));

    if any_included {
        for (orientation, range) in &precinct.bands {
            let (width, height) = band_extent(range);
            if width == 0 || height == 0 { continue; }

            let subband = resolution.subband(*orientation).expect("precinct band references a subband the resolution does not carry");
            let (x0, y0, _, _) = *range;

            let inclusion_values: Vec<u32> = (0 .. height).flat_map(|ly| (0 .. width).map(move |lx| (lx, ly)))
                .map(|(lx, ly)| {
                    let cb = subband.codeblock(x0 + lx as u32, y0 + ly as u32);
                    if cb.coded.as_ref().is_some_and(|e| e.num_passes > 0) { 0 } else { 1 }
                })
                .collect();
            let mut inclusion_tree = TagTree::with_values(width, height, &inclusion_values);

            let msb_values: Vec<u32> = (0 .. height).flat_map(|ly| (0 .. width).map(move |lx| (lx, ly)))
                .map(|(lx, ly)| {
                    let cb = subband.codeblock(x0 + lx as u32, y0 + ly as u32);
                    u32::from(cb.coded.as_ref().map_or(0, |e| e.missing_msbs))
                })
                .collect();
            let mut msb_tree = TagTree::with_values(width, height, &msb_values);

            for ly in 0 .. height {
                for lx in 0 .. width {
                    let cb = subband.codeblock(x0 + lx as u32, y0 + ly as u32);
                    let included = inclusion_tree.encode(&mut writer, lx, ly, 0);
                    if !included { continue; }

                    let encoded = cb.coded.as_ref().expect("tag tree reported inclusion for a codeblock with no coded bytes");
                    msb_tree.encode_value(&mut writer, lx, ly, u32::from(encoded.missing_msbs));
                    writer.put_bit(u8::from(encoded.num_passes == 2));
                    writer.put_gamma(encoded.pass_lengths[0]);
                    if encoded.num_passes == 2 {
                        writer.put_gamma(encoded.pass_lengths[1]);
                    }

                    included_blocks.push(encoded);
                }
            }
        }
    }

    out.extend(writer.into_bytes());
    if use_eph {
        out.extend_from_slice(&[0xFF, 0x92]);
    }

    for encoded in included_blocks {
        out.extend_from_slice(&encoded.coded);
    }

    out
}

/// Parses one packet from `reader` (which must be byte-aligned at the
/// packet's start) and fills in `coded` on every codeblock this precinct
/// declares included, mirroring [`encode_packet`] field for field. Codeblocks
/// left out of the packet are not touched, so a caller starting from
/// [`crate::j2k::tile::TileComp::empty`] ends up with them all-zero.
pub fn decode_packet(reader: &mut BitReader<'_>, resolution: &mut Resolution, precinct: &Precinct) -> Result<()> {
    reader.skip_sop()?;

    let any_included = reader.read_bit()? == 1;
    let mut pending: Vec<(Orientation, u32, u32, u8, [u32; 2])> = Vec::new();

    if any_included {
        for (orientation, range) in &precinct.bands {
            let (width, height) = band_extent(range);
            if width == 0 || height == 0 { continue; }

            let (x0, y0, _, _) = *range;
            let mut inclusion_tree = TagTree::new(width, height);
            let mut msb_tree = TagTree::new(width, height);

            for ly in 0 .. height {
                for lx in 0 .. width {
                    let included = inclusion_tree.decode(reader, lx, ly, 0)?;
                    if !included { continue; }

                    let missing_msbs = msb_tree.decode_value(reader, lx, ly, u8::MAX as u32)? as u8;
                    let num_passes = if reader.read_bit()? == 1 { 2 } else { 1 };
                    let len0 = reader.read_gamma()?;
                    let len1 = if num_passes == 2 { reader.read_gamma()? } else { 0 };

                    pending.push((*orientation, x0 + lx as u32, y0 + ly as u32, num_passes, [len0, len1]));
                }
            }
        }
    }

    reader.align_to_byte();
    reader.skip_eph()?;

    for (orientation, cbx, cby, num_passes, pass_lengths) in pending {
        let total_len = (pass_lengths[0] + pass_lengths[1]) as usize;
        let coded = reader.read_chunk(total_len)?.to_vec();
        let subband = resolution.subband_mut(orientation).ok_or_else(|| Error::corrupt("packet references a subband the resolution does not carry"))?;
        let cb = subband.codeblock_mut(cbx, cby);
        let missing_msbs = cb.coded.as_ref().map_or(0, |e| e.missing_msbs);
        cb.coded = Some(EncodedBlock { num_passes, pass_lengths, missing_msbs, coded });
    }

    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::j2k::block_coder;
    use crate::j2k::quant::SubbandQuant;
    use crate::j2k::resolution::{self, SubbandParams};

    fn params(_r: u8, _o: Orientation) -> SubbandParams {
        SubbandParams { quant: SubbandQuant { exponent: 0, mantissa: 0 }, k_max: 12 }
    }

    fn analyzed_resolution(width: u32, height: u32) -> Resolution {
        let samples: Vec<i32> = (0 .. width * height).map(|i| (i % 97) as i32 - 40).collect();
        let mut resolutions = resolution::analyze(&samples, width, height, 0, true, (3, 3), &params);
        let res = resolutions.pop().unwrap();
        res
    }

    fn code_all_blocks(resolution: &mut Resolution) {
        for orientation in [Orientation::Ll, Orientation::Hl, Orientation::Lh, Orientation::Hh] {
            if let Some(subband) = resolution.subband_mut(orientation) {
                for cb in &mut subband.codeblocks {
                    cb.coded = Some(block_coder::encode_block(&cb.magnitudes, &cb.signs, cb.width as usize, cb.height as usize, 12, false));
                }
            }
        }
    }

    #[test]
    fn single_precinct_packet_round_trips_codeblocks() {
        let mut resolution = analyzed_resolution(24, 24);
        code_all_blocks(&mut resolution);

        let precincts = partition_precincts(&resolution, None, (3, 3));
        assert_eq!(precincts.len(), 1);

        let packet_bytes = encode_packet(&resolution, &precincts[0], false, false, 0);

        let mut decoded = analyzed_resolution(24, 24);
        let mut reader = BitReader::new(&packet_bytes);
        decode_packet(&mut reader, &mut decoded, &precincts[0]).unwrap();

        let original_ll = resolution.subband(Orientation::Ll).unwrap();
        let decoded_ll = decoded.subband(Orientation::Ll).unwrap();
        for (a, b) in original_ll.codeblocks.iter().zip(decoded_ll.codeblocks.iter()) {
            assert_eq!(a.coded.as_ref().map(|e| &e.coded), b.coded.as_ref().map(|e| &e.coded));
        }
    }

    #[test]
    fn sop_and_eph_markers_are_skipped_transparently() {
        let mut resolution = analyzed_resolution(16, 16);
        code_all_blocks(&mut resolution);

        let precincts = partition_precincts(&resolution, None, (3, 3));
        let packet_bytes = encode_packet(&resolution, &precincts[0], true, true, 7);
        assert_eq!(&packet_bytes[0 .. 2], &[0xFF, 0x91]);

        let mut decoded = analyzed_resolution(16, 16);
        let mut reader = BitReader::new(&packet_bytes);
        decode_packet(&mut reader, &mut decoded, &precincts[0]).unwrap();
    }

    #[test]
    fn all_zero_resolution_produces_an_empty_inclusion_bit() {
        let mut resolution = analyzed_resolution(8, 8);
        // Force every codeblock to look all-zero (no coded passes).
        for orientation in [Orientation::Ll, Orientation::Hl, Orientation::Lh, Orientation::Hh] {
            if let Some(subband) = resolution.subband_mut(orientation) {
                for cb in &mut subband.codeblocks {
                    cb.magnitudes.iter_mut().for_each(|m| *m = 0);
                    cb.coded = Some(block_coder::encode_block(&cb.magnitudes, &cb.signs, cb.width as usize, cb.height as usize, 12, false));
                }
            }
        }

        let precincts = partition_precincts(&resolution, None, (3, 3));
        let packet_bytes = encode_packet(&resolution, &precincts[0], false, false, 0);

        let mut reader = BitReader::new(&packet_bytes);
        assert_eq!(reader.read_bit().unwrap(), 0);

        let mut decoded = analyzed_resolution(8, 8);
        let mut reader = BitReader::new(&packet_bytes);
        decode_packet(&mut reader, &mut decoded, &precincts[0]).unwrap();
        for orientation in [Orientation::Ll, Orientation::Hl, Orientation::Lh, Orientation::Hh] {
            if let Some(subband) = decoded.subband(orientation) {
                assert!(subband.codeblocks.iter().all(|cb| cb.coded.is_none()));
            }
        }
    }

    #[test]
    fn explicit_precinct_size_splits_a_resolution_into_several_precincts() {
        let resolution = analyzed_resolution(64, 64);
        let precincts = partition_precincts(&resolution, Some((4, 4)), (3, 3));
        assert!(precincts.len() > 1);
    }
}
