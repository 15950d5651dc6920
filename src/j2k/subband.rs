//! Subbands and their codeblock grids (spec §3 "Subband → Codeblock grid",
//! §4.9). Grounded on OpenJPH's `ojph_subband.h`/`.cpp`, but with the
//! subband↔precinct relationship flattened per spec §9: a `Subband` owns a
//! flat `codeblocks` array, and a `Precinct` (see `crate::j2k::packet`) only
//! ever holds `(subband index, codeblock range)` tuples into it — no back
//! pointers.

use crate::j2k::block_coder::EncodedBlock;

/// The four standard 2-D DWT frequency bands. Resolution 0 has only `Ll`;
/// resolutions above 0 have `Hl`/`Lh`/`Hh` (and, under the 1-D DFS variants
/// described in spec §4.9, effectively only one of `Hl`/`Lh` is populated —
/// modelled here by simply omitting the unused orientation's `Subband`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Orientation {
    Ll,
    Hl,
    Lh,
    Hh,
}

impl Orientation {
    /// The nominal dynamic-range gain in bits this orientation contributes,
    /// used by [`crate::j2k::quant`] to derive `Kmax`.
    pub fn gain_bits(self) -> u32 {
        match self {
            Orientation::Ll => 0,
            Orientation::Hl | Orientation::Lh => 1,
            Orientation::Hh => 2,
        }
    }
}

/// One codeblock's nominal-size-clipped rectangle plus its coefficients and
/// (once coded) its entropy-coded bytes. Coordinates are in the subband's own
/// coefficient grid, origin at `(0, 0)`.
#[derive(Debug, Clone)]
pub struct Codeblock {
    pub x0: u32,
    pub y0: u32,
    pub width: u32,
    pub height: u32,

    /// Row-major magnitude buffer, one entry per sample, valid for
    /// `width * height` entries (no stride padding at this level; codeblock
    /// buffers are small and packed tightly, unlike the DWT's line buffers).
    pub magnitudes: Vec<u32>,
    pub signs: Vec<bool>,

    /// Present once the codeblock has been run through the block coder (see
    /// `crate::j2k::block_coder`), either freshly encoded or decoded.
    pub coded: Option<EncodedBlock>,
}

impl Codeblock {
    fn new(x0: u32, y0: u32, width: u32, height: u32) -> Self {
        let count = (width * height) as usize;
        Self { x0, y0, width, height, magnitudes: vec![0; count], signs: vec![false; count], coded: None }
    }
}

/// One frequency band of one resolution, partitioned into a grid of
/// codeblocks of nominal size `2^xcb × 2^ycb` (edge blocks clipped to the
/// subband's extent, per spec §3).
#[derive(Debug, Clone)]
pub struct Subband {
    pub orientation: Orientation,
    /// This subband's extent, in its own coefficient coordinate system.
    pub width: u32,
    pub height: u32,
    pub codeblock_log_dims: (u8, u8),
    pub codeblocks: Vec<Codeblock>,
    /// Number of codeblocks across, used to map `(cbx, cby)` to a flat index.
    pub codeblocks_wide: u32,
}

impl Subband {
    pub fn new(orientation: Orientation, width: u32, height: u32, codeblock_log_dims: (u8, u8)) -> Self {
        let (cb_w, cb_h) = (1u32 << codeblock_log_dims.0, 1u32 << codeblock_log_dims.1);
        let codeblocks_wide = if width == 0 { 0 } else { (width + cb_w - 1) / cb_w };
        let codeblocks_high = if height == 0 { 0 } else { (height + cb_h - 1) / cb_h };

        let mut codeblocks = Vec::with_capacity((codeblocks_wide * codeblocks_high) as usize);
        for cby in 0 .. codeblocks_high {
            for cbx in 0 .. codeblocks_wide {
                let x0 = cbx * cb_w;
                let y0 = cby * cb_h;
                let w = cb_w.min(width - x0);
                let h = cb_h.min(height - y0);
                codeblocks.push(Codeblock::new(x0, y0, w, h));
            }
        }

        Self { orientation, width, height, codeblock_log_dims, codeblocks, codeblocks_wide }
    }

    pub fn codeblocks_high(&self) -> u32 {
        if self.codeblocks_wide == 0 { 0 } else { (self.codeblocks.len() as u32) / self.codeblocks_wide }
    }

    pub fn codeblock(&self, cbx: u32, cby: u32) -> &Codeblock {
        &self.codeblocks[(cby * self.codeblocks_wide + cbx) as usize]
    }

    pub fn codeblock_mut(&mut self, cbx: u32, cby: u32) -> &mut Codeblock {
        &mut self.codeblocks[(cby * self.codeblocks_wide + cbx) as usize]
    }

    /// Loads this subband's coefficients (signed, post-DWT, pre-quantization)
    /// from a dense row-major buffer of `width * height` values into their
    /// owning codeblocks' sign/magnitude buffers.
    pub fn load_coefficients(&mut self, coefficients: &[i32]) {
        debug_assert_eq!(coefficients.len(), (self.width * self.height) as usize);

        for cb in &mut self.codeblocks {
            for row in 0 .. cb.height {
                for col in 0 .. cb.width {
                    let src_x = cb.x0 + col;
                    let src_y = cb.y0 + row;
                    let value = coefficients[(src_y * self.width + src_x) as usize];
                    let dst = (row * cb.width + col) as usize;
                    cb.signs[dst] = value < 0;
                    cb.magnitudes[dst] = value.unsigned_abs();
                }
            }
        }
    }

    /// Inverse of [`Self::load_coefficients`].
    pub fn store_coefficients(&self, coefficients: &mut [i32]) {
        debug_assert_eq!(coefficients.len(), (self.width * self.height) as usize);

        for cb in &self.codeblocks {
            for row in 0 .. cb.height {
                for col in 0 .. cb.width {
                    let dst_x = cb.x0 + col;
                    let dst_y = cb.y0 + row;
                    let src = (row * cb.width + col) as usize;
                    let magnitude = cb.magnitudes[src] as i32;
                    coefficients[(dst_y * self.width + dst_x) as usize] = if cb.signs[src] { -magnitude } else { magnitude };
                }
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn partitions_edge_codeblocks() {
        // 10x10 subband with 4x4 nominal codeblocks clips the last row/column.
        let subband = Subband::new(Orientation::Hl, 10, 10, (2, 2));
        assert_eq!(subband.codeblocks_wide, 3);
        assert_eq!(subband.codeblocks_high(), 3);

        let corner = subband.codeblock(2, 2);
        assert_eq!((corner.width, corner.height), (2, 2));
        assert_eq!((corner.x0, corner.y0), (8, 8));
    }

    #[test]
    fn coefficient_round_trip() {
        let mut subband = Subband::new(Orientation::Ll, 5, 3, (3, 3));
        let input: Vec<i32> = (0 .. 15).map(|i| i - 7).collect();
        subband.load_coefficients(&input);

        let mut output = vec![0; 15];
        subband.store_coefficients(&mut output);
        assert_eq!(input, output);
    }
}
