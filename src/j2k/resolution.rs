//! Resolution levels and the DWT cascade that links them (spec §3
//! "Resolution", §4.9). A `Resolution` owns the subbands contributed at its
//! level — only `Ll` at resolution 0, `Hl`/`Lh`/`Hh` above it — plus the
//! pixel extent that resolution reconstructs to. Per spec §9's "Cyclic
//! graphs" note, resolutions are kept in a flat, coarse-to-fine `Vec` owned
//! by the `TileComp` (see `crate::j2k::tile`) rather than as a chain of
//! parent/child pointers; [`analyze`] and [`synthesize`] walk that `Vec` in
//! the two directions instead of following a pointer.
//!
//! Grounded on OpenJPH's `ojph_resolution.cpp`/`.h` (one DWT step per
//! resolution, synthesis walks coarse to fine) but reworked per spec §9's
//! "Arena + indices" / "Cyclic graphs" guidance into owned, indexable `Vec`s.

use crate::j2k::dwt;
use crate::j2k::quant::{self, SubbandQuant};
use crate::j2k::subband::{Orientation, Subband};

/// A resolution's per-subband quantization parameters and derived `Kmax`
/// (spec §4.3/§4.8), as supplied by the caller for every `(resolution,
/// orientation)` pair that resolution actually carries.
#[derive(Debug, Clone, Copy)]
pub struct SubbandParams {
    pub quant: SubbandQuant,
    pub k_max: u8,
}

/// One wavelet decomposition level: the subbands it owns, and the pixel
/// extent it reconstructs to once synthesis folds in its detail bands.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub index: u8,
    pub width: u32,
    pub height: u32,
    pub ll: Option<Subband>,
    pub hl: Option<Subband>,
    pub lh: Option<Subband>,
    pub hh: Option<Subband>,
}

impl Resolution {
    pub fn subband(&self, orientation: Orientation) -> Option<&Subband> {
        match orientation {
            Orientation::Ll => self.ll.as_ref(),
            Orientation::Hl => self.hl.as_ref(),
            Orientation::Lh => self.lh.as_ref(),
            Orientation::Hh => self.hh.as_ref(),
        }
    }

    pub fn subband_mut(&mut self, orientation: Orientation) -> Option<&mut Subband> {
        match orientation {
            Orientation::Ll => self.ll.as_mut(),
            Orientation::Hl => self.hl.as_mut(),
            Orientation::Lh => self.lh.as_mut(),
            Orientation::Hh => self.hh.as_mut(),
        }
    }

    /// Every subband this resolution owns, in a fixed `(Ll, Hl, Lh, Hh)` order.
    pub fn subbands(&self) -> impl Iterator<Item = (Orientation, &Subband)> {
        [
            (Orientation::Ll, self.ll.as_ref()),
            (Orientation::Hl, self.hl.as_ref()),
            (Orientation::Lh, self.lh.as_ref()),
            (Orientation::Hh, self.hh.as_ref()),
        ]
        .into_iter()
        .filter_map(|(o, s)| s.map(|s| (o, s)))
    }
}

fn load_quantized(subband: &mut Subband, coefficients: &[f64], params: SubbandParams, reversible: bool) {
    let signed: Vec<i32> = coefficients.iter().map(|&value| {
        let (sign, magnitude) = quant::to_sign_magnitude(value, params.quant, params.k_max, reversible);
        let magnitude = magnitude as i32;
        if sign { -magnitude } else { magnitude }
    }).collect();

    subband.load_coefficients(&signed);
}

fn store_quantized(subband: &Subband, params: SubbandParams, reversible: bool) -> Vec<f64> {
    let mut signed = vec![0i32; (subband.width * subband.height) as usize];
    subband.store_coefficients(&mut signed);

    signed.iter().map(|&value| {
        let sign = value < 0;
        let magnitude = value.unsigned_abs();
        quant::from_sign_magnitude(sign, magnitude, params.quant, params.k_max, reversible)
    }).collect()
}

/// Splits one stage of the 2-D DWT cascade into its four detail/approximation
/// bands, retaining the pre-split extent (the resolution it belongs to's
/// reconstructed pixel size).
struct Stage {
    hl: Vec<f64>,
    lh: Vec<f64>,
    hh: Vec<f64>,
    width: u32,
    height: u32,
    half_width: u32,
    half_height: u32,
}

/// Decomposes one component's tile samples into `levels + 1` resolutions
/// (index 0 = coarsest, index `levels` = finest), running `levels` stages of
/// 2-D DWT analysis (spec §4.9) and loading each subband's coefficients
/// through quantization into sign-magnitude codeblocks (spec §4.8).
///
/// `params(resolution, orientation)` supplies the quantization/Kmax for every
/// subband the result will contain; it is called once per subband.
pub fn analyze(
    samples: &[i32],
    width: u32,
    height: u32,
    levels: u8,
    reversible: bool,
    code_block_log_dims: (u8, u8),
    params: &dyn Fn(u8, Orientation) -> SubbandParams,
) -> Vec<Resolution> {
    let mut current: Vec<f64> = samples.iter().map(|&v| f64::from(v)).collect();
    let (mut w, mut h) = (width, height);
    let mut stages = Vec::with_capacity(levels as usize);

    for _ in 0 .. levels {
        let (ll, hl, lh, hh) = dwt::analyze_2d(&current, w as usize, h as usize, reversible);
        let half_width = (w + 1) / 2;
        let half_height = (h + 1) / 2;
        stages.push(Stage { hl, lh, hh, width: w, height: h, half_width, half_height });
        current = ll;
        w = half_width;
        h = half_height;
    }

    let mut resolutions = Vec::with_capacity(levels as usize + 1);

    let ll_params = params(0, Orientation::Ll);
    let mut ll_subband = Subband::new(Orientation::Ll, w, h, code_block_log_dims);
    load_quantized(&mut ll_subband, &current, ll_params, reversible);
    resolutions.push(Resolution { index: 0, width: w, height: h, ll: Some(ll_subband), hl: None, lh: None, hh: None });

    for (stage_index, stage) in stages.into_iter().enumerate().rev() {
        let resolution_index = (levels as usize - stage_index) as u8;
        let width_hi = stage.width - stage.half_width;
        let height_hi = stage.height - stage.half_height;

        let mut hl_subband = Subband::new(Orientation::Hl, stage.half_width, height_hi, code_block_log_dims);
        load_quantized(&mut hl_subband, &stage.hl, params(resolution_index, Orientation::Hl), reversible);

        let mut lh_subband = Subband::new(Orientation::Lh, width_hi, stage.half_height, code_block_log_dims);
        load_quantized(&mut lh_subband, &stage.lh, params(resolution_index, Orientation::Lh), reversible);

        let mut hh_subband = Subband::new(Orientation::Hh, width_hi, height_hi, code_block_log_dims);
        load_quantized(&mut hh_subband, &stage.hh, params(resolution_index, Orientation::Hh), reversible);

        resolutions.push(Resolution {
            index: resolution_index,
            width: stage.width,
            height: stage.height,
            ll: None,
            hl: Some(hl_subband),
            lh: Some(lh_subband),
            hh: Some(hh_subband),
        });
    }

    resolutions
}

/// Inverse of [`analyze`]: walks the resolutions coarse to fine, running one
/// 2-D DWT synthesis step per resolution above 0, and returns the
/// reconstructed `(samples, width, height)` at the finest resolution.
pub fn synthesize(
    resolutions: &[Resolution],
    levels: u8,
    reversible: bool,
    params: &dyn Fn(u8, Orientation) -> SubbandParams,
) -> (Vec<i32>, u32, u32) {
    let base = &resolutions[0];
    let mut ll = store_quantized(base.ll.as_ref().expect("resolution 0 must carry an Ll subband"), params(0, Orientation::Ll), reversible);
    let (mut w, mut h) = (base.width, base.height);

    for resolution_index in 1 ..= levels {
        let resolution = &resolutions[resolution_index as usize];
        let hl = store_quantized(resolution.hl.as_ref().expect("resolution > 0 must carry an Hl subband"), params(resolution_index, Orientation::Hl), reversible);
        let lh = store_quantized(resolution.lh.as_ref().expect("resolution > 0 must carry a Lh subband"), params(resolution_index, Orientation::Lh), reversible);
        let hh = store_quantized(resolution.hh.as_ref().expect("resolution > 0 must carry a Hh subband"), params(resolution_index, Orientation::Hh), reversible);

        ll = dwt::synthesize_2d(&ll, &hl, &lh, &hh, resolution.width as usize, resolution.height as usize, reversible);
        w = resolution.width;
        h = resolution.height;
    }

    let samples: Vec<i32> = ll.iter().map(|&v| v.round() as i32).collect();
    (samples, w, h)
}

#[cfg(test)]
mod test {
    use super::*;

    fn uniform_params(_resolution: u8, _orientation: Orientation) -> SubbandParams {
        SubbandParams { quant: SubbandQuant { exponent: 0, mantissa: 0 }, k_max: 24 }
    }

    #[test]
    fn reversible_round_trips_exactly() {
        let width = 16u32;
        let height = 16u32;
        let samples: Vec<i32> = (0 .. width * height).map(|i| (i % 251) as i32 - 120).collect();

        let resolutions = analyze(&samples, width, height, 3, true, (5, 5), &uniform_params);
        assert_eq!(resolutions.len(), 4);

        let (decoded, out_w, out_h) = synthesize(&resolutions, 3, true, &uniform_params);
        assert_eq!((out_w, out_h), (width, height));
        assert_eq!(decoded, samples);
    }

    #[test]
    fn irreversible_round_trips_approximately() {
        let width = 16u32;
        let height = 16u32;
        let samples: Vec<i32> = (0 .. width * height).map(|i| (i % 200) as i32).collect();

        let params = |_res: u8, _o: Orientation| SubbandParams { quant: SubbandQuant { exponent: 0, mantissa: 1024 }, k_max: 26 };
        let resolutions = analyze(&samples, width, height, 2, false, (5, 5), &params);
        let (decoded, out_w, out_h) = synthesize(&resolutions, 2, false, &params);

        assert_eq!((out_w, out_h), (width, height));
        let mut squared_error = 0f64;
        for (a, b) in samples.iter().zip(decoded.iter()) {
            let diff = f64::from(*a - *b);
            squared_error += diff * diff;
        }
        let rmse = (squared_error / samples.len() as f64).sqrt();
        assert!(rmse < 5.0, "rmse too high: {}", rmse);
    }

    #[test]
    fn odd_sized_tile_round_trips() {
        let width = 9u32;
        let height = 7u32;
        let samples: Vec<i32> = (0 .. width * height).map(|i| (i * 3) as i32 - 10).collect();

        let resolutions = analyze(&samples, width, height, 2, true, (4, 4), &uniform_params);
        let (decoded, out_w, out_h) = synthesize(&resolutions, 2, true, &uniform_params);
        assert_eq!((out_w, out_h), (width, height));
        assert_eq!(decoded, samples);
    }
}
