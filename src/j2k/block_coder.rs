//! The J2K codeblock bit-plane coder.
//!
//! A codeblock's samples (sign + magnitude, already quantized by
//! `crate::j2k::quant`) are coded bit-plane by bit-plane, most significant
//! first. Each sample becomes "significant" the first time one of its
//! magnitude bits is 1; from that point on its remaining bits are
//! "refinement" bits. This splits naturally into two coding passes:
//!
//!   - pass 0, "cleanup": the first-time significance decision (plus sign,
//!     once a sample becomes significant) for every sample, across every
//!     coded bit-plane;
//!   - pass 1, "refinement": one bit per already-significant sample for every
//!     bit-plane below the one where it became significant. This is an
//!     HTJ2K-style simplification of the standard's separate
//!     significance-propagation and magnitude-refinement passes: only the
//!     cleanup pass is mandatory, and an optional refinement pass follows.
//!
//! The entropy core (`RangeCoder` below) is an adaptive binary range coder in
//! the LZMA mould: carryless via the cache/cache-size renormalization trick,
//! one 11-bit adaptive probability per context. It plays the same role as the
//! standard's MQ coder (adaptive binary arithmetic coding driven by a handful
//! of small contexts) without matching its Qe-table bit for bit, chosen
//! because it is simple enough to implement correctly without a reference
//! decoder to check bit-streams against.

use crate::error::{Error, Result};

const MODEL_BITS: u32 = 11;
const MODEL_TOTAL: u32 = 1 << MODEL_BITS;
const TOP: u32 = 1 << 24;
const MOVE_BITS: u32 = 5;

/// Adaptive probability state for one context, initialized to the midpoint.
#[derive(Debug, Clone, Copy)]
struct Prob(u16);

impl Prob {
    fn new() -> Self { Prob((MODEL_TOTAL / 2) as u16) }
}

/// The significance context a sample's four causal neighbours select from:
/// how many of them are already significant (clamped to keep the context
/// table tiny). "Stripe causal" mode excludes the neighbour below, so
/// parallel decoders never need a not-yet-decoded stripe.
const NUM_CONTEXTS: usize = 5;

struct RangeEncoder {
    low: u64,
    range: u32,
    cache: u8,
    cache_size: u64,
    out: Vec<u8>,
}

impl RangeEncoder {
    fn new() -> Self {
        Self { low: 0, range: 0xFFFF_FFFF, cache: 0xFF, cache_size: 1, out: Vec::new() }
    }

    fn shift_low(&mut self) {
        if (self.low as u32) < 0xFF00_0000 || (self.low >> 32) != 0 {
            let carry = (self.low >> 32) as u8;
            let mut temp = self.cache;
            loop {
                self.out.push(temp.wrapping_add(carry));
                temp = 0xFF;
                self.cache_size -= 1;
                if self.cache_size == 0 { break; }
            }
            self.cache = (self.low >> 24) as u8;
        }

        self.cache_size += 1;
        self.low = (self.low << 8) & 0xFFFF_FFFF;
    }

    fn encode_bit(&mut self, prob: &mut Prob, bit: u8) {
        let bound = (self.range >> MODEL_BITS) * u32::from(prob.0);

        if bit == 0 {
            self.range = bound;
            prob.0 += ((MODEL_TOTAL - u32::from(prob.0)) >> MOVE_BITS) as u16;
        }
        else {
            self.low += u64::from(bound);
            self.range -= bound;
            prob.0 -= prob.0 >> MOVE_BITS;
        }

        while self.range < TOP {
            self.range <<= 8;
            self.shift_low();
        }
    }

    fn finish(mut self) -> Vec<u8> {
        for _ in 0 .. 5 { self.shift_low(); }
        self.out
    }
}

struct RangeDecoder<'b> {
    range: u32,
    code: u32,
    data: &'b [u8],
    pos: usize,
}

impl<'b> RangeDecoder<'b> {
    fn new(data: &'b [u8]) -> Self {
        let mut decoder = Self { range: 0xFFFF_FFFF, code: 0, data, pos: 1 }; // byte 0 is the encoder's initial cache byte
        for _ in 0 .. 4 {
            decoder.code = (decoder.code << 8) | u32::from(decoder.next_byte());
        }
        decoder
    }

    fn next_byte(&mut self) -> u8 {
        let byte = self.data.get(self.pos).copied().unwrap_or(0);
        self.pos += 1;
        byte
    }

    fn decode_bit(&mut self, prob: &mut Prob) -> u8 {
        let bound = (self.range >> MODEL_BITS) * u32::from(prob.0);

        let bit = if self.code < bound {
            self.range = bound;
            prob.0 += ((MODEL_TOTAL - u32::from(prob.0)) >> MOVE_BITS) as u16;
            0
        }
        else {
            self.code -= bound;
            self.range -= bound;
            prob.0 -= prob.0 >> MOVE_BITS;
            1
        };

        while self.range < TOP {
            self.range <<= 8;
            self.code = (self.code << 8) | u32::from(self.next_byte());
        }

        bit
    }
}

/// A codeblock's coded-pass metadata and bytes, as handed to or received from
/// the precinct packet header (spec §4.10's per-codeblock `num_passes`,
/// `Lblock`/pass-length fields).
#[derive(Debug, Clone)]
pub struct EncodedBlock {
    pub num_passes: u8,
    pub pass_lengths: [u32; 2],
    pub missing_msbs: u8,
    pub coded: Vec<u8>,
}

fn neighbor_context(significant: &[bool], width: usize, height: usize, x: usize, y: usize, stripe_causal: bool) -> usize {
    let mut count = 0;
    let mut probe = |dx: isize, dy: isize| {
        let nx = x as isize + dx;
        let ny = y as isize + dy;
        if nx >= 0 && ny >= 0 && (nx as usize) < width && (ny as usize) < height && significant[ny as usize * width + nx as usize] {
            count += 1;
        }
    };

    probe(-1, 0);
    probe(1, 0);
    probe(0, -1);
    if !stripe_causal { probe(0, 1); }

    count.min(NUM_CONTEXTS - 1)
}

/// Finds the highest set magnitude bit-plane across the whole block, used to
/// derive `missing_msbs` (spec §4.8 `findMaxVal`): bit-planes strictly above
/// it are all zero and are not coded.
fn highest_nonzero_plane(magnitudes: &[u32]) -> Option<u32> {
    magnitudes.iter().copied().max().filter(|&m| m != 0).map(|m| 31 - m.leading_zeros())
}

/// Encodes one codeblock's sign-magnitude samples (spec §4.8's `encodeBlock`).
/// `k_max` bounds the magnitude bit-planes transmitted; `stripe_causal`
/// restricts context neighbours to the current and previous row.
pub fn encode_block(magnitudes: &[u32], signs: &[bool], width: usize, height: usize, k_max: u8, stripe_causal: bool) -> EncodedBlock {
    debug_assert_eq!(magnitudes.len(), width * height);
    debug_assert_eq!(signs.len(), width * height);

    let top_plane = match highest_nonzero_plane(magnitudes) {
        None => {
            // All-zero block: a 1-byte placeholder, no coding passes (spec §8
            // "a code-block whose maximum magnitude is below the threshold ...
            // must encode to a 1-byte empty-packet placeholder").
            return EncodedBlock { num_passes: 0, pass_lengths: [0, 0], missing_msbs: k_max, coded: vec![0] };
        },
        Some(plane) => plane,
    };

    let max_plane = u32::from(k_max).saturating_sub(1);
    let missing_msbs = max_plane.saturating_sub(top_plane) as u8;
    let lowest_plane = 0u32;

    let mut significant = vec![false; width * height];
    let mut cleanup = RangeEncoder::new();
    let mut refine = RangeEncoder::new();
    let mut sig_ctx = [Prob::new(); NUM_CONTEXTS];
    let mut sign_ctx = Prob::new();
    let mut refine_ctx = Prob::new();

    for plane in (lowest_plane ..= top_plane).rev() {
        for y in 0 .. height {
            for x in 0 .. width {
                let idx = y * width + x;

                if !significant[idx] {
                    let bit = ((magnitudes[idx] >> plane) & 1) as u8;
                    let ctx = neighbor_context(&significant, width, height, x, y, stripe_causal);
                    cleanup.encode_bit(&mut sig_ctx[ctx], bit);

                    if bit == 1 {
                        significant[idx] = true;
                        cleanup.encode_bit(&mut sign_ctx, u8::from(signs[idx]));
                    }
                }
                else {
                    let bit = ((magnitudes[idx] >> plane) & 1) as u8;
                    refine.encode_bit(&mut refine_ctx, bit);
                }
            }
        }
    }

    let cleanup_bytes = cleanup.finish();
    let refine_bytes = refine.finish();
    let num_passes = if refine_bytes.is_empty() { 1 } else { 2 };
    let pass_lengths = [cleanup_bytes.len() as u32, refine_bytes.len() as u32];

    let mut coded = cleanup_bytes;
    coded.extend(refine_bytes);

    EncodedBlock { num_passes, pass_lengths, missing_msbs, coded }
}

/// Decodes one codeblock (spec §4.8's `decodeBlock`), mirroring
/// [`encode_block`] exactly. On any structural inconsistency, returns
/// `DataCorruptError` so the caller can apply the `resilient` zeroing policy.
pub fn decode_block(
    coded: &[u8],
    missing_msbs: u8,
    num_passes: u8,
    pass_lengths: [u32; 2],
    width: usize,
    height: usize,
    k_max: u8,
    stripe_causal: bool,
) -> Result<(Vec<u32>, Vec<bool>)> {
    let mut magnitudes = vec![0u32; width * height];
    let mut signs = vec![false; width * height];

    if num_passes == 0 {
        return Ok((magnitudes, signs));
    }

    let cleanup_len = pass_lengths[0] as usize;
    let cleanup_bytes = coded.get(.. cleanup_len)
        .ok_or_else(|| Error::corrupt("codeblock cleanup pass length exceeds coded data"))?;

    let refine_bytes = if num_passes > 1 {
        let refine_len = pass_lengths[1] as usize;
        Some(coded.get(cleanup_len .. cleanup_len + refine_len)
            .ok_or_else(|| Error::corrupt("codeblock refinement pass length exceeds coded data"))?)
    }
    else {
        None
    };

    let top_plane = u32::from(k_max).saturating_sub(1).saturating_sub(u32::from(missing_msbs));

    let mut significant = vec![false; width * height];
    let mut cleanup = RangeDecoder::new(cleanup_bytes);
    let mut refine = refine_bytes.map(RangeDecoder::new);
    let mut sig_ctx = [Prob::new(); NUM_CONTEXTS];
    let mut sign_ctx = Prob::new();
    let mut refine_ctx = Prob::new();

    for plane in (0 ..= top_plane).rev() {
        for y in 0 .. height {
            for x in 0 .. width {
                let idx = y * width + x;

                if !significant[idx] {
                    let ctx = neighbor_context(&significant, width, height, x, y, stripe_causal);
                    let bit = cleanup.decode_bit(&mut sig_ctx[ctx]);

                    if bit == 1 {
                        significant[idx] = true;
                        magnitudes[idx] |= 1 << plane;
                        signs[idx] = cleanup.decode_bit(&mut sign_ctx) == 1;
                    }
                }
                else {
                    let decoder = refine.as_mut()
                        .ok_or_else(|| Error::corrupt("codeblock declares no refinement pass but needs refinement bits"))?;
                    let bit = decoder.decode_bit(&mut refine_ctx);
                    if bit == 1 { magnitudes[idx] |= 1 << plane; }
                }
            }
        }
    }

    Ok((magnitudes, signs))
}

#[cfg(test)]
mod test {
    use super::*;

    fn round_trip(width: usize, height: usize, magnitudes: Vec<u32>, signs: Vec<bool>, k_max: u8) {
        let encoded = encode_block(&magnitudes, &signs, width, height, k_max, false);
        let (decoded_mag, decoded_sign) = decode_block(
            &encoded.coded, encoded.missing_msbs, encoded.num_passes, encoded.pass_lengths, width, height, k_max, false,
        ).unwrap();

        assert_eq!(decoded_mag, magnitudes);
        for i in 0 .. magnitudes.len() {
            if magnitudes[i] != 0 {
                assert_eq!(decoded_sign[i], signs[i], "sign mismatch at {}", i);
            }
        }
    }

    #[test]
    fn round_trips_all_zero_block() {
        round_trip(4, 4, vec![0; 16], vec![false; 16], 8);
    }

    #[test]
    fn round_trips_small_block() {
        let magnitudes = vec![0, 5, 255, 1, 0, 0, 128, 3, 7, 7, 7, 7, 0, 2, 4, 8];
        let signs = vec![false, true, false, true, false, false, true, false, false, true, false, true, false, false, true, false];
        round_trip(4, 4, magnitudes, signs, 9);
    }

    #[test]
    fn round_trips_larger_block_with_stripe_causal() {
        let width = 8;
        let height = 8;
        let mut magnitudes = Vec::with_capacity(width * height);
        let mut signs = Vec::with_capacity(width * height);
        for i in 0 .. width * height {
            magnitudes.push(((i * 37) % 251) as u32);
            signs.push(i % 3 == 0);
        }

        let encoded = encode_block(&magnitudes, &signs, width, height, 10, true);
        let (decoded_mag, decoded_sign) = decode_block(
            &encoded.coded, encoded.missing_msbs, encoded.num_passes, encoded.pass_lengths, width, height, 10, true,
        ).unwrap();

        assert_eq!(decoded_mag, magnitudes);
        for i in 0 .. magnitudes.len() {
            if magnitudes[i] != 0 {
                assert_eq!(decoded_sign[i], signs[i]);
            }
        }
    }

    #[test]
    fn truncated_coded_data_is_reported_as_corrupt() {
        let magnitudes = vec![5u32; 16];
        let signs = vec![true; 16];
        let encoded = encode_block(&magnitudes, &signs, 4, 4, 8, false);

        let truncated = &encoded.coded[.. encoded.coded.len().saturating_sub(1)];
        let result = decode_block(truncated, encoded.missing_msbs, encoded.num_passes, encoded.pass_lengths, 4, 4, 8, false);
        assert!(result.is_err());
    }
}
