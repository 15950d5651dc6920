//! The discrete wavelet transform (spec §4.9): the reversible 5/3 integer
//! kernel and the irreversible 9/7 real kernel, each as a lifting scheme
//! applied horizontally then vertically to decompose one resolution's LL
//! band into the next resolution's LL/HL/LH/HH.
//!
//! Grounded on OpenJPH's `ojph_resolution.cpp` lifting-step loop shape
//! (alternating horizontal/vertical 1-D passes) and the standard T.800
//! Annex F lifting coefficients. Every lifting step here reads its neighbour
//! samples through the same edge-clamping accessor in both the forward and
//! inverse direction (spec §4.9 "Edge behaviour at the top/bottom of the
//! tile uses symmetric extension"); a lifting step only ever writes one
//! parity class (even or odd) while reading the other, so clamping
//! consistently on both sides of the transform is what makes each step exactly
//! invertible regardless of the boundary convention chosen, not a property of
//! the convention itself.

/// Reads `buf[i]`, clamping `i` into `[0, buf.len() - 1]` — the boundary
/// extension rule shared by every lifting step below.
fn at(buf: &[f64], i: isize) -> f64 {
    let last = buf.len() as isize - 1;
    buf[i.clamp(0, last.max(0)) as usize]
}

fn merge_polyphase(low: &[f64], high: &[f64], len: usize) -> Vec<f64> {
    let mut out = vec![0.0; len];
    for (i, &v) in low.iter().enumerate() { out[2 * i] = v; }
    for (i, &v) in high.iter().enumerate() { out[2 * i + 1] = v; }
    out
}

fn split_polyphase(signal: &[f64]) -> (Vec<f64>, Vec<f64>) {
    let low: Vec<f64> = signal.iter().step_by(2).copied().collect();
    let high: Vec<f64> = signal.iter().skip(1).step_by(2).copied().collect();
    (low, high)
}

/// Applies one real-valued lifting step in place (the 9/7 kernel): for every
/// sample at a position of the given parity, adds `coeff * (left + right)`,
/// where the neighbours are read from a snapshot taken before this step — so
/// a step never reads its own output.
fn lift_step_real(work: &mut [f64], on_odd: bool, coeff: f64) {
    let snapshot = work.to_vec();
    let start = usize::from(on_odd);

    for i in (start .. work.len()).step_by(2) {
        let left = at(&snapshot, i as isize - 1);
        let right = at(&snapshot, i as isize + 1);
        work[i] += coeff * (left + right);
    }
}

/// One integer lifting step for the 5/3 kernel: adds `sign * floor((left +
/// bias + right) / divisor)` to every sample of the given parity.
fn lift_step_integer(work: &mut [f64], on_odd: bool, sign: f64, bias: f64, divisor: f64) {
    let snapshot = work.to_vec();
    let start = usize::from(on_odd);

    for i in (start .. work.len()).step_by(2) {
        let left = at(&snapshot, i as isize - 1);
        let right = at(&snapshot, i as isize + 1);
        work[i] += sign * ((left + right + bias) / divisor).floor();
    }
}

/// Reversible 5/3 forward transform (analysis) of one 1-D line: predict the
/// odd samples from their even neighbours, then update the even samples from
/// the (now predicted) odd neighbours.
pub fn forward_53_1d(signal: &[f64]) -> (Vec<f64>, Vec<f64>) {
    let mut work = signal.to_vec();
    lift_step_integer(&mut work, true, -1.0, 0.0, 2.0);
    lift_step_integer(&mut work, false, 1.0, 2.0, 4.0);
    split_polyphase(&work)
}

/// Inverse of [`forward_53_1d`].
pub fn inverse_53_1d(low: &[f64], high: &[f64], len: usize) -> Vec<f64> {
    let mut work = merge_polyphase(low, high, len);
    lift_step_integer(&mut work, false, -1.0, 2.0, 4.0);
    lift_step_integer(&mut work, true, 1.0, 0.0, 2.0);
    work
}

const LIFT_ALPHA: f64 = -1.586_134_342_059_924;
const LIFT_BETA: f64 = -0.052_980_118_572_961;
const LIFT_GAMMA: f64 = 0.882_911_075_530_934;
const LIFT_DELTA: f64 = 0.443_506_852_043_971;
const LIFT_K: f64 = 1.230_174_104_914_001;

/// Irreversible 9/7 forward transform of one 1-D line: four real-valued
/// lifting steps followed by the `K`/`1/K` scaling normalization.
pub fn forward_97_1d(signal: &[f64]) -> (Vec<f64>, Vec<f64>) {
    let mut work = signal.to_vec();
    lift_step_real(&mut work, true, LIFT_ALPHA);
    lift_step_real(&mut work, false, LIFT_BETA);
    lift_step_real(&mut work, true, LIFT_GAMMA);
    lift_step_real(&mut work, false, LIFT_DELTA);

    let (mut low, mut high) = split_polyphase(&work);
    for v in &mut low { *v /= LIFT_K; }
    for v in &mut high { *v *= LIFT_K; }
    (low, high)
}

/// Inverse of [`forward_97_1d`].
pub fn inverse_97_1d(low: &[f64], high: &[f64], len: usize) -> Vec<f64> {
    let scaled_low: Vec<f64> = low.iter().map(|&v| v * LIFT_K).collect();
    let scaled_high: Vec<f64> = high.iter().map(|&v| v / LIFT_K).collect();
    let mut work = merge_polyphase(&scaled_low, &scaled_high, len);

    lift_step_real(&mut work, false, -LIFT_DELTA);
    lift_step_real(&mut work, true, -LIFT_GAMMA);
    lift_step_real(&mut work, false, -LIFT_BETA);
    lift_step_real(&mut work, true, -LIFT_ALPHA);
    work
}

/// One level of 2-D analysis: splits a `width`×`height` LL band into its
/// four children by running the 1-D transform across rows then down columns.
pub fn analyze_2d(samples: &[f64], width: usize, height: usize, reversible: bool) -> (Vec<f64>, Vec<f64>, Vec<f64>, Vec<f64>) {
    let transform_1d = |line: &[f64]| if reversible { forward_53_1d(line) } else { forward_97_1d(line) };

    let half_w = (width + 1) / 2;
    let width_hi = width / 2;
    let mut rows_low = vec![0.0; half_w * height];
    let mut rows_high = vec![0.0; width_hi * height];

    for y in 0 .. height {
        let row = &samples[y * width .. (y + 1) * width];
        let (low, high) = transform_1d(row);
        rows_low[y * half_w .. (y + 1) * half_w].copy_from_slice(&low);
        rows_high[y * width_hi .. (y + 1) * width_hi].copy_from_slice(&high);
    }

    let half_h = (height + 1) / 2;
    let height_hi = height / 2;

    let mut ll = vec![0.0; half_w * half_h];
    let mut hl = vec![0.0; half_w * height_hi];
    for x in 0 .. half_w {
        let column: Vec<f64> = (0 .. height).map(|y| rows_low[y * half_w + x]).collect();
        let (low, high) = transform_1d(&column);
        for y in 0 .. half_h { ll[y * half_w + x] = low[y]; }
        for y in 0 .. height_hi { hl[y * half_w + x] = high[y]; }
    }

    let mut lh = vec![0.0; width_hi * half_h];
    let mut hh = vec![0.0; width_hi * height_hi];
    for x in 0 .. width_hi {
        let column: Vec<f64> = (0 .. height).map(|y| rows_high[y * width_hi + x]).collect();
        let (low, high) = transform_1d(&column);
        for y in 0 .. half_h { lh[y * width_hi + x] = low[y]; }
        for y in 0 .. height_hi { hh[y * width_hi + x] = high[y]; }
    }

    (ll, hl, lh, hh)
}

/// Inverse of [`analyze_2d`]: reconstructs a `width`×`height` LL band from
/// its four children.
pub fn synthesize_2d(ll: &[f64], hl: &[f64], lh: &[f64], hh: &[f64], width: usize, height: usize, reversible: bool) -> Vec<f64> {
    let transform_1d = |low: &[f64], high: &[f64], len: usize| if reversible { inverse_53_1d(low, high, len) } else { inverse_97_1d(low, high, len) };

    let half_w = (width + 1) / 2;
    let half_h = (height + 1) / 2;
    let width_hi = width / 2;
    let height_hi = height / 2;

    let mut rows_low = vec![0.0; half_w * height];
    for x in 0 .. half_w {
        let low_col: Vec<f64> = (0 .. half_h).map(|y| ll[y * half_w + x]).collect();
        let high_col: Vec<f64> = (0 .. height_hi).map(|y| hl[y * half_w + x]).collect();
        let column = transform_1d(&low_col, &high_col, height);
        for y in 0 .. height { rows_low[y * half_w + x] = column[y]; }
    }

    let mut rows_high = vec![0.0; width_hi * height];
    for x in 0 .. width_hi {
        let low_col: Vec<f64> = (0 .. half_h).map(|y| lh[y * width_hi + x]).collect();
        let high_col: Vec<f64> = (0 .. height_hi).map(|y| hh[y * width_hi + x]).collect();
        let column = transform_1d(&low_col, &high_col, height);
        for y in 0 .. height { rows_high[y * width_hi + x] = column[y]; }
    }

    let mut samples = vec![0.0; width * height];
    for y in 0 .. height {
        let low_row = &rows_low[y * half_w .. (y + 1) * half_w];
        let high_row = &rows_high[y * width_hi .. (y + 1) * width_hi];
        let row = transform_1d(low_row, high_row, width);
        samples[y * width .. (y + 1) * width].copy_from_slice(&row);
    }

    samples
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn reversible_1d_round_trips_exactly() {
        let signal: Vec<f64> = vec![10.0, 20.0, 30.0, 5.0, 7.0, 100.0, 3.0];
        let (low, high) = forward_53_1d(&signal);
        let back = inverse_53_1d(&low, &high, signal.len());
        for (a, b) in signal.iter().zip(back.iter()) {
            assert!((a - b).abs() < 1e-9, "{} != {}", a, b);
        }
    }

    #[test]
    fn reversible_1d_round_trips_even_length() {
        let signal: Vec<f64> = vec![1.0, -2.0, 3.0, -4.0, 5.0, -6.0];
        let (low, high) = forward_53_1d(&signal);
        let back = inverse_53_1d(&low, &high, signal.len());
        for (a, b) in signal.iter().zip(back.iter()) {
            assert!((a - b).abs() < 1e-9, "{} != {}", a, b);
        }
    }

    #[test]
    fn reversible_2d_round_trips_exactly() {
        let width = 8;
        let height = 6;
        let samples: Vec<f64> = (0 .. width * height).map(|i| ((i * 13) % 97) as f64 - 40.0).collect();

        let (ll, hl, lh, hh) = analyze_2d(&samples, width, height, true);
        let back = synthesize_2d(&ll, &hl, &lh, &hh, width, height, true);

        for (a, b) in samples.iter().zip(back.iter()) {
            assert!((a - b).abs() < 1e-6, "{} != {}", a, b);
        }
    }

    #[test]
    fn irreversible_1d_round_trips_approximately() {
        let signal: Vec<f64> = vec![10.0, 20.0, 30.0, 5.0, 7.0, 100.0, 3.0, 42.0];
        let (low, high) = forward_97_1d(&signal);
        let back = inverse_97_1d(&low, &high, signal.len());
        for (a, b) in signal.iter().zip(back.iter()) {
            assert!((a - b).abs() < 1e-6, "{} != {}", a, b);
        }
    }

    #[test]
    fn irreversible_2d_round_trips_approximately() {
        let width = 8;
        let height = 8;
        let samples: Vec<f64> = (0 .. width * height).map(|i| ((i * 7) % 53) as f64).collect();

        let (ll, hl, lh, hh) = analyze_2d(&samples, width, height, false);
        let back = synthesize_2d(&ll, &hl, &lh, &hh, width, height, false);

        for (a, b) in samples.iter().zip(back.iter()) {
            assert!((a - b).abs() < 1e-6, "{} != {}", a, b);
        }
    }
}
