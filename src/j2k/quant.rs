//! Quantization step size / `Kmax` derivation and the sign-magnitude
//! transform samples go through before entering the codeblock coder
//! (spec §4.8, §4.3 QCD/QCC).

use crate::j2k::subband::Orientation;

/// How QCD/QCC encodes the per-subband step sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuantizationStyle {
    /// Reversible path: no step size is transmitted, only one exponent per subband.
    NoQuantization,
    /// Irreversible path, one (exponent, mantissa) pair derived from the LL subband's.
    ScalarDerived,
    /// Irreversible path, one (exponent, mantissa) pair transmitted per subband.
    ScalarExpounded,
}

/// One subband's quantization parameters as transmitted on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubbandQuant {
    pub exponent: u8,
    /// 11-bit mantissa; zero (and unused) for the reversible path.
    pub mantissa: u16,
}

/// The nominal dynamic-range contribution of each orientation relative to the
/// original component's bit depth, used to derive `Kmax` (JPEG2000 Annex E).
fn orientation_gain_bits(orientation: Orientation) -> u32 {
    match orientation {
        Orientation::Ll => 0,
        Orientation::Hl | Orientation::Lh => 1,
        Orientation::Hh => 2,
    }
}

impl SubbandQuant {
    /// Derives the quantization step size (irreversible path only).
    pub fn step_size(self) -> f64 {
        2f64.powi(i32::from(self.exponent)) * (1.0 + f64::from(self.mantissa) / 2048.0)
    }

    /// The maximum magnitude bit-plane index for a component of the given bit
    /// depth at this subband's orientation, per spec §4.3/§4.8.
    pub fn k_max(self, component_bit_depth: u8, orientation: Orientation) -> u8 {
        let range_bits = u32::from(component_bit_depth) + orientation_gain_bits(orientation);
        (range_bits.saturating_sub(u32::from(self.exponent))) as u8
    }
}

/// Converts one subband sample from its native domain (reversible integer,
/// or irreversible real-valued DWT output) into the codeblock's sign-magnitude
/// representation, scaled into the fixed-point range the bit-plane coder
/// expects: `value * (1/step) * 2^(31 - Kmax)` for the irreversible path
/// (spec §4.8), or an unscaled pass-through for the reversible path.
pub fn to_sign_magnitude(value: f64, quant: SubbandQuant, k_max: u8, reversible: bool) -> (bool, u32) {
    let sign = value < 0.0;

    let magnitude = if reversible {
        value.abs().round() as u32
    }
    else {
        let scale = (1.0 / quant.step_size()) * 2f64.powi(31 - i32::from(k_max));
        (value.abs() * scale).round() as u32
    };

    (sign, magnitude)
}

/// Inverse of [`to_sign_magnitude`].
pub fn from_sign_magnitude(sign: bool, magnitude: u32, quant: SubbandQuant, k_max: u8, reversible: bool) -> f64 {
    let value = if reversible {
        f64::from(magnitude)
    }
    else {
        let scale = quant.step_size() / 2f64.powi(31 - i32::from(k_max));
        f64::from(magnitude) * scale
    };

    if sign { -value } else { value }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn reversible_round_trips_exactly() {
        let quant = SubbandQuant { exponent: 0, mantissa: 0 };
        let (sign, magnitude) = to_sign_magnitude(-42.0, quant, 10, true);
        assert_eq!(sign, true);
        assert_eq!(magnitude, 42);

        let back = from_sign_magnitude(sign, magnitude, quant, 10, true);
        assert_eq!(back, -42.0);
    }

    #[test]
    fn irreversible_round_trips_approximately() {
        let quant = SubbandQuant { exponent: 2, mantissa: 512 };
        let k_max = quant.k_max(12, Orientation::Hl);

        let original = 37.5_f64;
        let (sign, magnitude) = to_sign_magnitude(original, quant, k_max, false);
        let back = from_sign_magnitude(sign, magnitude, quant, k_max, false);

        assert!((back - original).abs() < 1.0, "expected {} ~= {}", back, original);
    }
}
