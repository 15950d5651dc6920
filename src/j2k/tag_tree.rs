//! Tag-tree coding for precinct packet headers (spec §4.10, §8 "Tag-tree
//! monotonicity").
//!
//! A tag tree represents a 2-D array of non-negative integers (one per
//! codeblock in a precinct) as a quadtree where each internal node holds the
//! minimum of its children. Transmitting a node's value costs only the
//! "distance" from what the decoder already knows about that node, which is
//! why the inclusion and missing-MSB fields in a packet header stay small
//! even for precincts with many codeblocks.
//!
//! Grounded on `iszak-jpeg2000`'s `jpc::tag_tree` (same quadtree discipline)
//! and OpenJPH's per-node low-water-mark state (`ojph_precinct.cpp`'s
//! `tag_tree` helper), but reworked as an explicit `low`/`confirmed` state
//! machine per node rather than a bit-accumulator, since that state is what
//! needs to persist across the repeated encode/decode calls one precinct
//! makes (one per codeblock, sharing ancestors).

use crate::j2k::bitstream::{BitReader, BitWriter};
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy)]
struct Node {
    /// The true minimum value at this node (only meaningful on the encode side).
    value: u32,
    /// The lower bound on `value` already established with the peer, via bits
    /// already exchanged.
    low: u32,
    /// Whether `value` itself (not just a lower bound) has been communicated.
    confirmed: bool,
}

impl Node {
    fn new() -> Self {
        Self { value: u32::MAX, low: 0, confirmed: false }
    }
}

#[derive(Debug, Clone)]
struct Level {
    width: usize,
    height: usize,
    nodes: Vec<Node>,
}

/// A tag tree over a `width`×`height` grid of leaves (typically one per
/// codeblock in a precinct's subband).
#[derive(Debug, Clone)]
pub struct TagTree {
    levels: Vec<Level>, // levels[0] = leaves, levels.last() = the 1x1 root
}

impl TagTree {
    /// Builds an empty tree (decode side: leaf values are not yet known).
    pub fn new(width: usize, height: usize) -> Self {
        let mut levels = Vec::new();
        let (mut w, mut h) = (width.max(1), height.max(1));
        loop {
            levels.push(Level { width: w, height: h, nodes: vec![Node::new(); w * h] });
            if w == 1 && h == 1 { break; }
            w = (w + 1) / 2;
            h = (h + 1) / 2;
        }
        Self { levels }
    }

    /// Builds a tree with known leaf values (encode side), propagating the
    /// min upward through every ancestor.
    pub fn with_values(width: usize, height: usize, leaf_values: &[u32]) -> Self {
        let mut tree = Self::new(width, height);
        {
            let leaves = &mut tree.levels[0];
            for (node, &value) in leaves.nodes.iter_mut().zip(leaf_values) {
                node.value = value;
            }
        }

        for level in 0 .. tree.levels.len() - 1 {
            let (lower, upper) = tree.levels.split_at_mut(level + 1);
            let child = &lower[level];
            let parent = &mut upper[0];
            for y in 0 .. parent.height {
                for x in 0 .. parent.width {
                    let mut min = u32::MAX;
                    for dy in 0 .. 2 {
                        for dx in 0 .. 2 {
                            let (cx, cy) = (x * 2 + dx, y * 2 + dy);
                            if cx < child.width && cy < child.height {
                                min = min.min(child.nodes[cy * child.width + cx].value);
                            }
                        }
                    }
                    parent.nodes[y * parent.width + x].value = min;
                }
            }
        }

        tree
    }

    fn path(&self, x: usize, y: usize) -> Vec<(usize, usize)> {
        let mut path = Vec::with_capacity(self.levels.len());
        let (mut cx, mut cy) = (x, y);
        for level in 0 .. self.levels.len() {
            path.push((level, cy * self.levels[level].width + cx));
            cx /= 2;
            cy /= 2;
        }
        path.reverse(); // root first
        path
    }

    /// Encodes whether leaf `(x, y)`'s value is `<= threshold`, writing only
    /// the bits the peer does not already know from previous calls at this or
    /// a lower threshold. Returns that boolean (the inclusion / "value known"
    /// decision).
    pub fn encode(&mut self, writer: &mut BitWriter, x: usize, y: usize, threshold: u32) -> bool {
        for (level, idx) in self.path(x, y) {
            let node = &mut self.levels[level].nodes[idx];
            if node.confirmed { continue; }

            while node.low < node.value && node.low <= threshold {
                writer.put_bit(0);
                node.low += 1;
            }

            if node.low != node.value || node.low > threshold {
                return false;
            }

            writer.put_bit(1);
            node.confirmed = true;
        }

        true
    }

    /// Encodes the exact value of leaf `(x, y)` (used for the missing-MSBs
    /// field, which transmits a count rather than a yes/no).
    pub fn encode_value(&mut self, writer: &mut BitWriter, x: usize, y: usize, value: u32) {
        let confirmed = self.encode(writer, x, y, value);
        debug_assert!(confirmed, "encode_value's threshold must equal the leaf's true value");
    }

    /// Mirrors [`Self::encode`]: decodes whether leaf `(x, y)`'s value is
    /// `<= threshold`.
    pub fn decode(&mut self, reader: &mut BitReader<'_>, x: usize, y: usize, threshold: u32) -> Result<bool> {
        for (level, idx) in self.path(x, y) {
            let node = &mut self.levels[level].nodes[idx];
            if node.confirmed { continue; }

            while !node.confirmed && node.low <= threshold {
                if reader.read_bit()? == 1 {
                    node.value = node.low;
                    node.confirmed = true;
                }
                else {
                    node.low += 1;
                }
            }

            if !node.confirmed {
                return Ok(false);
            }
        }

        Ok(true)
    }

    /// Mirrors [`Self::encode_value`]: recovers the exact value of leaf
    /// `(x, y)` by probing increasing thresholds until it is confirmed.
    pub fn decode_value(&mut self, reader: &mut BitReader<'_>, x: usize, y: usize, max_value: u32) -> Result<u32> {
        for threshold in 0 ..= max_value {
            if self.decode(reader, x, y, threshold)? {
                return Ok(self.levels[0].nodes[y * self.levels[0].width + x].value);
            }
        }

        Err(Error::corrupt("tag tree value exceeded max_value without confirming"))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn round_trips_inclusion_grid() {
        let values = vec![0, 2, 1, 0, 3, 0, 1, 1, 2];
        let mut encoder = TagTree::with_values(3, 3, &values);
        let mut writer = BitWriter::new();

        let mut included = vec![false; 9];
        for y in 0 .. 3 {
            for x in 0 .. 3 {
                included[y * 3 + x] = encoder.encode(&mut writer, x, y, 1);
            }
        }

        let bytes = writer.into_bytes();
        let mut reader = BitReader::new(&bytes);
        let mut decoder = TagTree::new(3, 3);

        for y in 0 .. 3 {
            for x in 0 .. 3 {
                let decoded = decoder.decode(&mut reader, x, y, 1).unwrap();
                assert_eq!(decoded, included[y * 3 + x], "mismatch at ({}, {})", x, y);
                assert_eq!(decoded, values[y * 3 + x] <= 1);
            }
        }
    }

    #[test]
    fn round_trips_exact_values() {
        let values = vec![0u32, 4, 2, 7];
        let mut encoder = TagTree::with_values(2, 2, &values);
        let mut writer = BitWriter::new();

        for y in 0 .. 2 {
            for x in 0 .. 2 {
                encoder.encode_value(&mut writer, x, y, values[y * 2 + x]);
            }
        }

        let bytes = writer.into_bytes();
        let mut reader = BitReader::new(&bytes);
        let mut decoder = TagTree::new(2, 2);

        for y in 0 .. 2 {
            for x in 0 .. 2 {
                let decoded = decoder.decode_value(&mut reader, x, y, 16).unwrap();
                assert_eq!(decoded, values[y * 2 + x]);
            }
        }
    }
}
