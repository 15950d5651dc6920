//! High-level convenience entry points for reading and writing the first,
//! non-deep layer of an EXR file into an in-memory `Image` pyramid.
//!
//! For multi-part files, deep data, or a custom streaming strategy, use the
//! lower-level `crate::block::Reader` / `crate::block::write_chunks_with` API
//! directly; this module only wires that API together for the common case of
//! "decode every pixel of the first layer into memory" and its inverse.

use super::{Channel, FlatSamples, Image, Level};
use crate::block::{self, ChunksReader, ChunksWriter, UncompressedBlock};
use crate::error::{Error, Result, UnitResult};
use crate::math::{mip_map_resolutions, rip_map_resolutions, Vec2};
use crate::meta::attribute::LevelMode;
use crate::meta::header::{BlockDescription, Header};
use std::io::{Read, Seek, Write};

/// Reads every pixel of the first header's channels into an `Image` pyramid.
/// Deep data is not supported by this convenience reader; use `crate::block`
/// directly for deep files.
pub fn read_first_flat_layer_from_buffered<R: Read + Seek>(read: R, pedantic: bool) -> Result<Image> {
    let reader = block::Reader::read_from_buffered(read, pedantic)?;
    let header = reader.headers().first()
        .ok_or_else(|| Error::invalid("file contains no headers"))?
        .clone();

    if header.deep {
        return Err(Error::unsupported("deep data is not supported by the simple image reader"));
    }

    let mut levels = allocate_levels(&header);

    for block in reader.all_chunks(pedantic)?.sequential_decompressor(pedantic) {
        let block = block?;
        if block.index.layer == 0 {
            insert_block(&header, &mut levels, &block);
        }
    }

    Ok(Image::new(header.data_window(), levels))
}

/// Writes an `Image` pyramid as the single layer of a new EXR file, using the
/// given header for compression, tiling and attribute settings. The header's
/// channel list determines which channels are written and in what order;
/// `image` must carry a matching channel at every level the header expects.
pub fn write_flat_layer_to_buffered<W: Write + Seek>(write: W, header: Header, image: &Image) -> UnitResult {
    let headers = vec![header.clone()];

    block::write_chunks_with(write, headers.clone(), false, |meta, chunk_writer| {
        let blocks = block::enumerate_ordered_header_block_indices(&headers)
            .map(|(index_in_header_increasing_y, block_index)| {
                let level = image.level(block_index.level.x(), block_index.level.y())
                    .ok_or_else(|| Error::invalid("image is missing a mip/rip level present in the header"))?;

                let level_resolution = level.resolution;
                let data = UncompressedBlock::collect_block_data_from_lines(
                    &header.channels, block_index,
                    |line| {
                        let channel = level.channels.get(line.location.channel)
                            .expect("channel index out of range for this level");

                        write_line(channel, level_resolution, line);
                    }
                );

                Ok((index_in_header_increasing_y, UncompressedBlock { index: block_index, data }))
            })
            .collect::<Result<Vec<_>>>()?;

        let mut compressor = chunk_writer.sequential_blocks_compressor(&meta);
        for (index_in_header_increasing_y, block) in blocks {
            compressor.compress_block(index_in_header_increasing_y, block)?;
        }

        Ok(())
    })?;

    Ok(())
}

fn write_line(channel: &Channel, level_resolution: Vec2<usize>, line: crate::block::lines::LineRefMut<'_>) {
    let offset = offset_in_channel(channel, level_resolution, &line.location);
    let count = line.location.sample_count;

    match &channel.samples {
        FlatSamples::F16(values) => {
            line.write_samples_from_slice(&values[offset .. offset + count]).expect("line byte size mismatch");
        },
        FlatSamples::F32(values) => {
            line.write_samples_from_slice(&values[offset .. offset + count]).expect("line byte size mismatch");
        },
        FlatSamples::U32(values) => {
            line.write_samples_from_slice(&values[offset .. offset + count]).expect("line byte size mismatch");
        },
    }
}

/// Index of the first sample of this line within the channel's flat, row-major storage.
fn offset_in_channel(channel: &Channel, level_resolution: Vec2<usize>, location: &crate::block::lines::LineIndex) -> usize {
    let channel_width = (level_resolution.width() + channel.sampling.x() - 1) / channel.sampling.x().max(1);
    let row_index = location.position.y() / channel.sampling.y().max(1);
    let col_index = location.position.x() / channel.sampling.x().max(1);
    row_index * channel_width + col_index
}

fn allocate_levels(header: &Header) -> Vec<Vec<Level>> {
    match header.blocks {
        BlockDescription::ScanLines => {
            vec![vec![allocate_level(header, header.data_size)]]
        },

        BlockDescription::Tiles(tiles) => match tiles.level_mode {
            LevelMode::Singular => vec![vec![allocate_level(header, header.data_size)]],

            LevelMode::MipMap => {
                mip_map_resolutions(tiles.rounding_mode, header.data_size)
                    .map(|(_, size)| vec![allocate_level(header, size)])
                    .collect()
            },

            LevelMode::RipMap => {
                let mut rows: Vec<Vec<Level>> = Vec::new();
                for (index, size) in rip_map_resolutions(tiles.rounding_mode, header.data_size) {
                    while rows.len() <= index.y() { rows.push(Vec::new()); }
                    let row = &mut rows[index.y()];
                    while row.len() <= index.x() { row.push(allocate_level(header, Vec2(0, 0))); }
                    row[index.x()] = allocate_level(header, size);
                }
                rows
            },
        }
    }
}

fn allocate_level(header: &Header, resolution: Vec2<usize>) -> Level {
    let channels = header.channels.list.iter().map(|channel_info| {
        let channel_resolution = channel_info.subsampled_resolution(resolution);
        Channel::new(
            channel_info.name.clone(),
            channel_info.sampling,
            FlatSamples::zeroed(channel_info.sample_type, channel_resolution.area()),
        )
    }).collect();

    Level::new(resolution, channels)
}

fn insert_block(header: &Header, levels: &mut [Vec<Level>], block: &UncompressedBlock) {
    let level = match levels.get_mut(block.index.level.y())
        .and_then(|row| row.get_mut(block.index.level.x()))
    {
        Some(level) => level,
        None => return,
    };

    let level_resolution = level.resolution;

    for line in block.lines(&header.channels) {
        let location = line.location;
        let channel = match level.channels.get_mut(location.channel) {
            Some(channel) => channel,
            None => continue,
        };

        let offset = offset_in_channel(channel, level_resolution, &location);

        match &mut channel.samples {
            FlatSamples::F16(values) => {
                let _ = line.read_samples_into_slice(&mut values[offset .. offset + line.location.sample_count]);
            },
            FlatSamples::F32(values) => {
                let _ = line.read_samples_into_slice(&mut values[offset .. offset + line.location.sample_count]);
            },
            FlatSamples::U32(values) => {
                let _ = line.read_samples_into_slice(&mut values[offset .. offset + line.location.sample_count]);
            },
        }
    }
}
