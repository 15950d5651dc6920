//! Codestream top-level: main-header markers, tile-parts, and the
//! encode/decode entry points that drive tile analysis, packet scheduling,
//! and synthesis (spec §4.11, §6.6, §8 S5 "resilient truncated decode").
//!
//! This engine only ever writes one quality layer and treats a tile's
//! component samples as sharing one width/height (spec §9: per-component
//! downsampling is recorded in the SIZ marker for a caller's own component
//! buffers, but is not applied inside the DWT pipeline itself — every
//! component of a tile is coded at the tile's reference-grid resolution,
//! matching `crate::j2k::tile::Tile::analyze`'s single `width`/`height`).
//! Byte layout of every marker segment here is this crate's own — it shares
//! marker *codes* with the T.800 codestream (so a hex dump looks familiar)
//! but not bit-for-bit segment contents, consistent with the codeblock
//! coder (`crate::j2k::block_coder`) already not being MQ-bitstream
//! compatible.
//!
//! Grounded on OpenJPH's `ojph_codestream.cpp` (SOC/SIZ/COD/QCD main header,
//! then SOT/SOD per tile-part, closed by EOC) for the overall shape.

use crate::error::{Diagnostics, Error, Result};
use crate::j2k::bitstream::BitReader;
use crate::j2k::packet::{self, Precinct};
use crate::j2k::progression::{self, PacketCoord};
use crate::j2k::tile::{Quantization, Tile, TileComp};
use crate::j2k::{ComponentGeometry, ImageGeometry, Profile, ProgressionOrder, Settings, TilePartDivision};

pub const SOC: u16 = 0xFF4F;
pub const SIZ: u16 = 0xFF51;
pub const COD: u16 = 0xFF52;
pub const QCD: u16 = 0xFF5C;
pub const TLM: u16 = 0xFF55;
pub const SOT: u16 = 0xFF90;
pub const SOD: u16 = 0xFF93;
pub const EOC: u16 = 0xFFD9;

/// Bytes occupied by one tile-part's framing before its packet payload
/// begins: the SOT marker (2), its length field (2), its 8-byte body, and
/// the SOD marker (2).
const TILE_PART_FRAMING_LEN: usize = 14;

fn write_segment(out: &mut Vec<u8>, marker: u16, body: &[u8]) {
    out.extend_from_slice(&marker.to_be_bytes());
    out.extend_from_slice(&((body.len() + 2) as u16).to_be_bytes());
    out.extend_from_slice(body);
}

fn read_u16(data: &[u8], pos: usize) -> Result<u16> {
    data.get(pos .. pos + 2).map(|b| u16::from_be_bytes([b[0], b[1]])).ok_or_else(|| Error::corrupt("marker read past end of data"))
}

fn read_u32(data: &[u8], pos: usize) -> Result<u32> {
    data.get(pos .. pos + 4).map(|b| u32::from_be_bytes([b[0], b[1], b[2], b[3]])).ok_or_else(|| Error::corrupt("marker read past end of data"))
}

/// Reads one marker segment's header (marker code, its body, and the
/// position immediately after it). `marker` and `next_pos` are only
/// meaningful if the segment actually carries a 16-bit length field — not
/// true of `SOC`/`SOD`/`EOC`, which callers handle separately.
fn read_segment(data: &[u8], pos: usize) -> Result<(u16, &[u8], usize)> {
    let marker = read_u16(data, pos)?;
    let length = read_u16(data, pos + 2)? as usize;
    if length < 2 {
        return Err(Error::corrupt("marker segment length field must be at least 2"));
    }
    let body = data.get(pos + 4 .. pos + 2 + length).ok_or_else(|| Error::corrupt("marker segment length exceeds remaining data"))?;
    Ok((marker, body, pos + 2 + length))
}

fn write_siz(out: &mut Vec<u8>, geometry: &ImageGeometry) {
    let mut body = Vec::new();
    body.extend_from_slice(&0u16.to_be_bytes()); // capability field, unused
    body.extend_from_slice(&geometry.image_extent.0.to_be_bytes());
    body.extend_from_slice(&geometry.image_extent.1.to_be_bytes());
    body.extend_from_slice(&geometry.image_offset.0.to_be_bytes());
    body.extend_from_slice(&geometry.image_offset.1.to_be_bytes());
    body.extend_from_slice(&geometry.tile_size.0.to_be_bytes());
    body.extend_from_slice(&geometry.tile_size.1.to_be_bytes());
    body.extend_from_slice(&geometry.tile_offset.0.to_be_bytes());
    body.extend_from_slice(&geometry.tile_offset.1.to_be_bytes());
    body.extend_from_slice(&(geometry.components.len() as u16).to_be_bytes());
    for component in &geometry.components {
        let ssiz = (u8::from(component.signed) << 7) | (component.bit_depth.saturating_sub(1) & 0x7F);
        body.push(ssiz);
        body.push(component.downsampling.0);
        body.push(component.downsampling.1);
    }
    write_segment(out, SIZ, &body);
}

fn read_siz(body: &[u8]) -> Result<ImageGeometry> {
    let field = |pos: usize| read_u32(body, pos);
    let image_extent = (field(2)?, field(6)?);
    let image_offset = (field(10)?, field(14)?);
    let tile_size = (field(18)?, field(22)?);
    let tile_offset = (field(26)?, field(30)?);
    let num_components = read_u16(body, 34)? as usize;

    let mut components = Vec::with_capacity(num_components);
    for i in 0 .. num_components {
        let base = 36 + i * 3;
        let ssiz = *body.get(base).ok_or_else(|| Error::corrupt("SIZ marker truncated in component table"))?;
        let downsampling = (
            *body.get(base + 1).ok_or_else(|| Error::corrupt("SIZ marker truncated in component table"))?,
            *body.get(base + 2).ok_or_else(|| Error::corrupt("SIZ marker truncated in component table"))?,
        );
        components.push(ComponentGeometry { bit_depth: (ssiz & 0x7F) + 1, signed: ssiz & 0x80 != 0, downsampling });
    }

    Ok(ImageGeometry { image_offset, image_extent, tile_offset, tile_size, components })
}

struct CodFields {
    progression_order: ProgressionOrder,
    reversible: bool,
    decomposition_levels: u8,
    code_block_log_dims: (u8, u8),
    precinct_log_dims: Option<(u8, u8)>,
    color_transform: bool,
    use_sop: bool,
    use_eph: bool,
}

fn write_cod(out: &mut Vec<u8>, settings: &Settings) {
    let precincts_defined = settings.precinct_log_dims.is_some();
    let scod = u8::from(settings.use_sop) | (u8::from(settings.use_eph) << 1) | (u8::from(precincts_defined) << 2);

    let mut body = vec![
        scod,
        settings.progression_order.marker_code(),
        1, // quality layers, fixed at 1
        u8::from(settings.color_transform),
        settings.decomposition_levels,
        settings.code_block_log_dims.0,
        settings.code_block_log_dims.1,
        u8::from(settings.reversible),
    ];

    if let Some((px, py)) = settings.precinct_log_dims {
        body.push((py << 4) | (px & 0x0F));
    }

    write_segment(out, COD, &body);
}

fn read_cod(body: &[u8]) -> Result<CodFields> {
    let get = |i: usize| body.get(i).copied().ok_or_else(|| Error::corrupt("COD marker truncated"));
    let scod = get(0)?;
    let progression_order = ProgressionOrder::from_marker_code(get(1)?)?;
    let color_transform = get(3)? != 0;
    let decomposition_levels = get(4)?;
    let code_block_log_dims = (get(5)?, get(6)?);
    let reversible = get(7)? != 0;

    let precinct_log_dims = if scod & 0b100 != 0 {
        let packed = get(8)?;
        Some((packed & 0x0F, packed >> 4))
    }
    else {
        None
    };

    Ok(CodFields {
        progression_order,
        reversible,
        decomposition_levels,
        code_block_log_dims,
        precinct_log_dims,
        color_transform,
        use_sop: scod & 0b001 != 0,
        use_eph: scod & 0b010 != 0,
    })
}

fn write_qcd(out: &mut Vec<u8>, reversible: bool, quality_mantissa: u16) {
    let body = [u8::from(!reversible), (quality_mantissa >> 8) as u8, (quality_mantissa & 0xFF) as u8];
    write_segment(out, QCD, &body);
}

fn read_qcd(body: &[u8]) -> Result<u16> {
    let hi = *body.get(1).ok_or_else(|| Error::corrupt("QCD marker truncated"))?;
    let lo = *body.get(2).ok_or_else(|| Error::corrupt("QCD marker truncated"))?;
    Ok(u16::from_be_bytes([hi, lo]))
}

fn write_tlm(out: &mut Vec<u8>, tile_part_lengths: &[(u16, u32)]) {
    let mut body = vec![0u8]; // Ztlm index, always the one and only TLM segment
    for &(tile_index, length) in tile_part_lengths {
        body.extend_from_slice(&tile_index.to_be_bytes());
        body.extend_from_slice(&length.to_be_bytes());
    }
    write_segment(out, TLM, &body);
}

struct Sot {
    tile_index: u16,
    payload_len: usize,
    part_index: u8,
}

fn write_sot(block: &mut Vec<u8>, tile_index: u16, part_index: u8, num_parts: u8, payload_len: usize) -> Result<()> {
    let psot = u32::try_from(TILE_PART_FRAMING_LEN + payload_len).map_err(|_| Error::unsupported("tile-part too large to encode its length"))?;
    let mut body = Vec::with_capacity(8);
    body.extend_from_slice(&tile_index.to_be_bytes());
    body.extend_from_slice(&psot.to_be_bytes());
    body.push(part_index);
    body.push(num_parts);
    write_segment(block, SOT, &body);
    block.extend_from_slice(&SOD.to_be_bytes());
    Ok(())
}

fn read_sot(data: &[u8], pos: usize) -> Result<Sot> {
    let (marker, body, _) = read_segment(data, pos)?;
    if marker != SOT {
        return Err(Error::format("expected SOT marker"));
    }
    let tile_index = read_u16(body, 0)?;
    let psot = read_u32(body, 2)? as usize;
    let part_index = *body.get(6).ok_or_else(|| Error::corrupt("SOT marker truncated"))?;
    let payload_len = psot.checked_sub(TILE_PART_FRAMING_LEN).ok_or_else(|| Error::corrupt("SOT marker's Psot shorter than its own framing"))?;

    let sod = read_u16(data, pos + 12)?;
    if sod != SOD {
        return Err(Error::format("expected SOD marker after SOT"));
    }

    Ok(Sot { tile_index, payload_len, part_index })
}

fn tile_rect(geometry: &ImageGeometry, tile_col: u32, tile_row: u32) -> (u32, u32) {
    let x0 = geometry.tile_offset.0 + tile_col * geometry.tile_size.0;
    let y0 = geometry.tile_offset.1 + tile_row * geometry.tile_size.1;
    let x1 = (x0 + geometry.tile_size.0).min(geometry.image_extent.0);
    let y1 = (y0 + geometry.tile_size.1).min(geometry.image_extent.1);
    (x1.saturating_sub(x0), y1.saturating_sub(y0))
}

fn precinct_counts_for(tile: &Tile, settings: &Settings) -> Vec<u32> {
    (0 ..= settings.decomposition_levels)
        .map(|r| {
            let resolution = &tile.components[0].resolutions[r as usize];
            packet::partition_precincts(resolution, settings.precinct_log_dims, settings.code_block_log_dims).len() as u32
        })
        .collect()
}

/// Encodes a full image: one codestream with a SIZ/COD/QCD main header,
/// `SOT`/`SOD`-framed tile-parts in the order `settings.tile_part_division`
/// prescribes, and a trailing `EOC`. `tile_samples[t][c]` holds tile `t`'s
/// component `c` samples, row-major over that tile's reference-grid extent.
pub fn encode(geometry: &ImageGeometry, settings: &Settings, quality_mantissa: u16, tile_samples: &[Vec<Vec<i32>>]) -> Result<Vec<u8>> {
    settings.validate()?;

    let (tiles_x, tiles_y) = geometry.tile_count();
    let tile_count = (tiles_x * tiles_y) as usize;
    if tile_samples.len() != tile_count {
        return Err(Error::invalid("tile_samples length does not match the image's tile grid"));
    }

    let num_components = geometry.components.len() as u16;
    let quantizations: Vec<Quantization> = geometry.components.iter()
        .map(|c| Quantization::new(c.bit_depth, settings.reversible, quality_mantissa))
        .collect();

    let mut out = Vec::new();
    out.extend_from_slice(&SOC.to_be_bytes());
    write_siz(&mut out, geometry);
    write_cod(&mut out, settings);
    write_qcd(&mut out, settings.reversible, quality_mantissa);

    let mut tile_part_blocks: Vec<Vec<u8>> = Vec::new();
    let mut tlm_entries: Vec<(u16, u32)> = Vec::new();

    for tile_row in 0 .. tiles_y {
        for tile_col in 0 .. tiles_x {
            let tile_index = (tile_row * tiles_x + tile_col) as usize;
            let (width, height) = tile_rect(geometry, tile_col, tile_row);
            let samples = &tile_samples[tile_index];
            if samples.len() != geometry.components.len() {
                return Err(Error::invalid("tile_samples entry does not carry one buffer per component"));
            }

            let tile = Tile::analyze(tile_col, tile_row, width, height, samples, settings.decomposition_levels, settings, &quantizations);
            let precinct_counts = precinct_counts_for(&tile, settings);
            let coords = progression::sequence(settings.progression_order, 1, settings.decomposition_levels + 1, num_components, &precinct_counts);
            let parts = progression::split_into_tile_parts(&coords, settings.tile_part_division, settings.decomposition_levels + 1, num_components);

            let num_parts = u8::try_from(parts.len()).map_err(|_| Error::unsupported("tile requires more than 255 tile-parts"))?;

            for (part_index, part_coords) in parts.iter().enumerate() {
                let mut payload = Vec::new();
                for coord in part_coords {
                    let resolution = &tile.components[coord.component as usize].resolutions[coord.resolution as usize];
                    let precincts = packet::partition_precincts(resolution, settings.precinct_log_dims, settings.code_block_log_dims);
                    let Some(precinct) = precincts.get(coord.precinct as usize) else { continue };
                    payload.extend(packet::encode_packet(resolution, precinct, settings.use_sop, settings.use_eph, coord.precinct as u16));
                }

                let mut block = Vec::with_capacity(TILE_PART_FRAMING_LEN + payload.len());
                write_sot(&mut block, tile_index as u16, part_index as u8, num_parts, payload.len())?;
                block.extend(payload);

                tlm_entries.push((tile_index as u16, block.len() as u32));
                tile_part_blocks.push(block);
            }
        }
    }

    if settings.request_tlm {
        write_tlm(&mut out, &tlm_entries);
    }
    for block in &tile_part_blocks {
        out.extend_from_slice(block);
    }
    out.extend_from_slice(&EOC.to_be_bytes());

    Ok(out)
}

/// One decoded tile: its grid position and each component's reconstructed
/// samples (row-major, at the tile's reference-grid extent).
#[derive(Debug, Clone)]
pub struct DecodedTile {
    pub tile_x: u32,
    pub tile_y: u32,
    pub width: u32,
    pub height: u32,
    pub components: Vec<Vec<i32>>,
}

/// The result of [`decode`]: the parsed geometry/coding settings, every
/// tile's reconstructed samples, and any diagnostics recorded while
/// `resilient` was downgrading a structural error instead of aborting.
#[derive(Debug, Clone)]
pub struct DecodedImage {
    pub geometry: ImageGeometry,
    pub settings: Settings,
    pub tiles: Vec<DecodedTile>,
    pub diagnostics: Diagnostics,
}

/// Decodes a full codestream produced by [`encode`]. When `resilient` is
/// true, a broken tile-part, packet header, or codeblock is recorded as a
/// [`crate::error::Diagnostic`] and the remainder of that tile is left
/// zeroed rather than aborting the whole decode (spec §8 S5); when false,
/// the same conditions return an `Err` immediately.
pub fn decode(data: &[u8], resilient: bool) -> Result<DecodedImage> {
    let mut diagnostics = Diagnostics::new();
    let mut pos = 0usize;

    if read_u16(data, pos)? != SOC {
        return Err(Error::format("codestream does not start with SOC"));
    }
    pos += 2;

    let mut geometry: Option<ImageGeometry> = None;
    let mut cod: Option<CodFields> = None;
    let mut quality_mantissa = 0u16;

    loop {
        let marker = read_u16(data, pos)?;
        if marker == SOT {
            break;
        }

        let (marker, body, next_pos) = read_segment(data, pos)?;
        match marker {
            SIZ => geometry = Some(read_siz(body)?),
            COD => cod = Some(read_cod(body)?),
            QCD => quality_mantissa = read_qcd(body)?,
            _ => {}, // TLM and any other main-header segment: skipped via its own length field
        }
        pos = next_pos;
    }

    let geometry = geometry.ok_or_else(|| Error::format("codestream missing SIZ marker"))?;
    let cod = cod.ok_or_else(|| Error::format("codestream missing COD marker"))?;

    let settings = Settings {
        progression_order: cod.progression_order,
        reversible: cod.reversible,
        decomposition_levels: cod.decomposition_levels,
        code_block_log_dims: cod.code_block_log_dims,
        precinct_log_dims: cod.precinct_log_dims,
        color_transform: cod.color_transform,
        tile_part_division: TilePartDivision::None,
        request_tlm: false,
        use_sop: cod.use_sop,
        use_eph: cod.use_eph,
        profile: Profile::None,
        resilient,
    };

    let (tiles_x, tiles_y) = geometry.tile_count();
    let tile_count = (tiles_x * tiles_y) as usize;
    let mut tile_payloads: Vec<Vec<(u8, Vec<u8>)>> = vec![Vec::new(); tile_count];

    'tile_parts: loop {
        if pos + 2 > data.len() {
            diagnostics.record(&Error::format("codestream ended before EOC"));
            break;
        }

        let marker = read_u16(data, pos)?;
        if marker == EOC {
            break;
        }

        if marker != SOT {
            let error = Error::format("expected SOT or EOC marker");
            if resilient {
                diagnostics.record(&error);
                break;
            }
            return Err(error);
        }

        let sot = match read_sot(data, pos) {
            Ok(sot) => sot,
            Err(error) => {
                if resilient {
                    diagnostics.record(&error);
                    break 'tile_parts;
                }
                return Err(error);
            },
        };

        let payload_start = pos + TILE_PART_FRAMING_LEN;
        let payload = match payload_start.checked_add(sot.payload_len).and_then(|end| data.get(payload_start .. end)) {
            Some(slice) => slice,
            None => {
                let error = Error::corrupt("tile-part payload runs past the end of the codestream");
                diagnostics.record(&error);
                if resilient {
                    break 'tile_parts;
                }
                return Err(error);
            },
        };

        if let Some(parts) = tile_payloads.get_mut(sot.tile_index as usize) {
            parts.push((sot.part_index, payload.to_vec()));
        }

        pos = payload_start + payload.len();
    }

    let mut tiles = Vec::with_capacity(tile_count);

    for tile_row in 0 .. tiles_y {
        for tile_col in 0 .. tiles_x {
            let tile_index = (tile_row * tiles_x + tile_col) as usize;
            let (width, height) = tile_rect(&geometry, tile_col, tile_row);

            let mut tile = Tile {
                tile_x: tile_col,
                tile_y: tile_row,
                width,
                height,
                components: geometry.components.iter()
                    .map(|_| TileComp::empty(width, height, settings.decomposition_levels, settings.code_block_log_dims))
                    .collect(),
            };

            let mut parts = tile_payloads[tile_index].clone();
            parts.sort_by_key(|(part_index, _)| *part_index);

            if !parts.is_empty() {
                let tile_bytes: Vec<u8> = parts.into_iter().flat_map(|(_, bytes)| bytes).collect();
                let precinct_counts = precinct_counts_for(&tile, &settings);
                let coords: Vec<PacketCoord> = progression::sequence(
                    settings.progression_order, 1, settings.decomposition_levels + 1, geometry.components.len() as u16, &precinct_counts,
                );

                let mut reader = BitReader::new(&tile_bytes);
                let mut decode_error: Option<Error> = None;

                for coord in &coords {
                    let resolution = &mut tile.components[coord.component as usize].resolutions[coord.resolution as usize];
                    let precincts: Vec<Precinct> = packet::partition_precincts(resolution, settings.precinct_log_dims, settings.code_block_log_dims);
                    let Some(precinct) = precincts.get(coord.precinct as usize) else { continue };

                    if let Err(error) = packet::decode_packet(&mut reader, resolution, precinct) {
                        decode_error = Some(error);
                        break;
                    }
                }

                if let Some(error) = decode_error {
                    diagnostics.record(&error);
                    if !resilient {
                        return Err(error);
                    }
                }
            }

            let mut components = Vec::with_capacity(geometry.components.len());
            for (component_index, component_geometry) in geometry.components.iter().enumerate() {
                let quantization = Quantization::new(component_geometry.bit_depth, settings.reversible, quality_mantissa);
                let component = &mut tile.components[component_index];

                if let Err(error) = component.decode_codeblocks(&quantization) {
                    diagnostics.record(&error);
                    if !resilient {
                        return Err(error);
                    }
                    component.zero_out();
                }

                let (samples, _, _) = component.synthesize(settings.decomposition_levels, &settings, &quantization);
                components.push(samples);
            }

            tiles.push(DecodedTile { tile_x: tile_col, tile_y: tile_row, width, height, components });
        }
    }

    Ok(DecodedImage { geometry, settings, tiles, diagnostics })
}

#[cfg(test)]
mod test {
    use super::*;

    fn geometry(width: u32, height: u32, tile: u32) -> ImageGeometry {
        ImageGeometry {
            image_offset: (0, 0),
            image_extent: (width, height),
            tile_offset: (0, 0),
            tile_size: (tile, tile),
            components: vec![ComponentGeometry { bit_depth: 8, signed: false, downsampling: (1, 1) }],
        }
    }

    fn checkerboard(width: u32, height: u32) -> Vec<i32> {
        (0 .. width * height).map(|i| (i % 253) as i32 - 100).collect()
    }

    #[test]
    fn single_tile_round_trips_through_encode_and_decode() {
        let geometry = geometry(16, 16, 16);
        let settings = Settings { decomposition_levels: 2, code_block_log_dims: (4, 4), ..Settings::default() };
        let samples = checkerboard(16, 16);

        let bytes = encode(&geometry, &settings, 0, &[vec![samples.clone()]]).unwrap();
        assert_eq!(&bytes[0 .. 2], &SOC.to_be_bytes());
        assert_eq!(&bytes[bytes.len() - 2 ..], &EOC.to_be_bytes());

        let decoded = decode(&bytes, false).unwrap();
        assert!(decoded.diagnostics.is_empty());
        assert_eq!(decoded.tiles.len(), 1);
        assert_eq!(decoded.tiles[0].components[0], samples);
    }

    #[test]
    fn multi_tile_image_round_trips_every_tile() {
        let geometry = geometry(24, 16, 12);
        let settings = Settings { decomposition_levels: 1, code_block_log_dims: (4, 4), ..Settings::default() };

        let (tiles_x, tiles_y) = geometry.tile_count();
        let mut tile_samples = Vec::new();
        let mut expected = Vec::new();
        for ty in 0 .. tiles_y {
            for tx in 0 .. tiles_x {
                let (w, h) = tile_rect(&geometry, tx, ty);
                let samples = checkerboard(w, h);
                expected.push(samples.clone());
                tile_samples.push(vec![samples]);
            }
        }

        let bytes = encode(&geometry, &settings, 0, &tile_samples).unwrap();
        let decoded = decode(&bytes, false).unwrap();

        assert_eq!(decoded.tiles.len(), tile_samples.len());
        for (tile, expected_samples) in decoded.tiles.iter().zip(expected.iter()) {
            assert_eq!(&tile.components[0], expected_samples);
        }
    }

    #[test]
    fn tile_part_division_splits_and_still_round_trips() {
        let geometry = geometry(16, 16, 16);
        let settings = Settings {
            decomposition_levels: 2,
            code_block_log_dims: (4, 4),
            tile_part_division: TilePartDivision::Resolutions,
            use_sop: true,
            use_eph: true,
            ..Settings::default()
        };
        let samples = checkerboard(16, 16);

        let bytes = encode(&geometry, &settings, 0, &[vec![samples.clone()]]).unwrap();
        let decoded = decode(&bytes, false).unwrap();
        assert_eq!(decoded.tiles[0].components[0], samples);
    }

    #[test]
    fn request_tlm_emits_a_tlm_segment_before_the_first_tile_part() {
        let geometry = geometry(16, 16, 16);
        let settings = Settings { decomposition_levels: 1, code_block_log_dims: (4, 4), request_tlm: true, ..Settings::default() };
        let samples = checkerboard(16, 16);

        let bytes = encode(&geometry, &settings, 0, &[vec![samples]]).unwrap();
        assert!(bytes.windows(2).any(|w| w == TLM.to_be_bytes()));
    }

    #[test]
    fn truncated_codestream_is_resilient_when_requested() {
        let geometry = geometry(16, 16, 8); // 4 tiles
        let settings = Settings { decomposition_levels: 1, code_block_log_dims: (4, 4), ..Settings::default() };

        let (tiles_x, tiles_y) = geometry.tile_count();
        let mut tile_samples = Vec::new();
        for ty in 0 .. tiles_y {
            for tx in 0 .. tiles_x {
                let (w, h) = tile_rect(&geometry, tx, ty);
                tile_samples.push(vec![checkerboard(w, h)]);
            }
        }

        let bytes = encode(&geometry, &settings, 0, &tile_samples).unwrap();
        let truncated = &bytes[.. bytes.len() * 2 / 3];

        let err = decode(truncated, false);
        assert!(err.is_err());

        let decoded = decode(truncated, true).unwrap();
        assert!(!decoded.diagnostics.is_empty());
        assert_eq!(decoded.tiles.len(), tile_samples.len());
    }
}
