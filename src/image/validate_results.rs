//! Test-only equality helpers for round-trip assertions against lossy codecs.
//!
//! Exact `==` is too strict for compressors (B44, PXR24, DWA) that deliberately
//! discard precision, and not strict enough for NaN (which never compares equal
//! to itself, but a round trip should still preserve "this was NaN"). This
//! module centralizes those quirks so codec unit tests don't hand-roll them.

/// Compare two values that came out of a codec round trip, tolerating the
/// quirks lossy compression introduces. Panics with a descriptive message if
/// the values are not equal enough.
pub trait ValidateResult {
    /// Exact comparison, except that two `NaN`s are always considered equal.
    fn assert_equals_result(&self, result: &Self);

    /// Comparison with a small relative tolerance, for codecs that are allowed
    /// to introduce rounding error (DCT, CSC, zig-zag quantization).
    fn assert_approx_equals_result(&self, result: &Self);
}

impl ValidateResult for f32 {
    fn assert_equals_result(&self, result: &Self) {
        assert!(
            self == result || (self.is_nan() && result.is_nan()),
            "expected {} but found {}", self, result
        );
    }

    fn assert_approx_equals_result(&self, result: &Self) {
        if self.is_nan() && result.is_nan() { return; }

        let tolerance = 1e-3 * self.abs().max(result.abs()).max(1.0);
        assert!(
            (self - result).abs() <= tolerance,
            "expected approximately {} but found {} (tolerance {})", self, result, tolerance
        );
    }
}

impl ValidateResult for &[f32] {
    fn assert_equals_result(&self, result: &Self) {
        assert_eq!(self.len(), result.len(), "slice length mismatch");
        for (expected, actual) in self.iter().zip(result.iter()) {
            expected.assert_equals_result(actual);
        }
    }

    fn assert_approx_equals_result(&self, result: &Self) {
        assert_eq!(self.len(), result.len(), "slice length mismatch");
        for (expected, actual) in self.iter().zip(result.iter()) {
            expected.assert_approx_equals_result(actual);
        }
    }
}
