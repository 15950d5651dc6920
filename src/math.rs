
//! Small math helpers shared across the meta data and pixel codec modules.
//! Level/tile arithmetic is modelled after OpenEXR's `ImfTiledMisc.cpp`.

use std::ops::{Add, Sub, Mul, Div};

/// A generic two-dimensional vector, used for sizes, positions and sampling rates.
/// Access components with `.x()` / `.y()`, or `.width()` / `.height()` when used as a size.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct Vec2<T>(pub T, pub T);

impl<T: Copy> Vec2<T> {
    pub fn x(self) -> T { self.0 }
    pub fn y(self) -> T { self.1 }
    pub fn width(self) -> T { self.0 }
    pub fn height(self) -> T { self.1 }
}

impl Vec2<usize> {
    /// Number of elements in a rectangle of this size.
    pub fn area(self) -> usize { self.0 * self.1 }

    /// Converts both components to `i32`, panicking if either is too large.
    /// Only used where a prior `validate()` call already bounded the value well below `i32::MAX`.
    pub fn to_i32(self) -> Vec2<i32> {
        Vec2(self.0 as i32, self.1 as i32)
    }
}

impl Vec2<i32> {
    pub fn area(self) -> i64 { self.0 as i64 * self.1 as i64 }

    /// Converts both components to `usize`, failing if either is negative.
    pub fn to_usize(self, name: &'static str) -> crate::error::Result<Vec2<usize>> {
        let x = crate::error::i32_to_usize(self.0, name)?;
        let y = crate::error::i32_to_usize(self.1, name)?;
        Ok(Vec2(x, y))
    }
}

impl<T> From<(T, T)> for Vec2<T> {
    fn from((x, y): (T, T)) -> Self { Vec2(x, y) }
}

impl<T: Add<Output = T>> Add for Vec2<T> {
    type Output = Vec2<T>;
    fn add(self, other: Self) -> Self { Vec2(self.0 + other.0, self.1 + other.1) }
}

impl<T: Sub<Output = T>> Sub for Vec2<T> {
    type Output = Vec2<T>;
    fn sub(self, other: Self) -> Self { Vec2(self.0 - other.0, self.1 - other.1) }
}

impl<T: Mul<Output = T> + Copy> Mul<T> for Vec2<T> {
    type Output = Vec2<T>;
    fn mul(self, scalar: T) -> Self { Vec2(self.0 * scalar, self.1 * scalar) }
}

impl<T: Div<Output = T> + Copy> Div<T> for Vec2<T> {
    type Output = Vec2<T>;
    fn div(self, scalar: T) -> Self { Vec2(self.0 / scalar, self.1 / scalar) }
}


/// computes floor(log(x)/log(2))
pub fn floor_log_2(mut number: usize) -> usize {
    debug_assert_ne!(number, 0);

    let mut log = 0;
    while number > 1 {
        log += 1;
        number >>= 1;
    }

    log
}

/// computes ceil(log(x)/log(2))
pub fn ceil_log_2(mut number: usize) -> usize {
    debug_assert_ne!(number, 0);

    let mut log = 0;
    let mut round_up = 0;

    while number > 1 {
        if number & 1 != 0 {
            round_up = 1;
        }

        log += 1;
        number >>= 1;
    }

    log + round_up
}


/// Controls how fractional level sizes are rounded while computing mip/rip pyramids.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum RoundingMode {
    Down, Up,
}

impl RoundingMode {
    pub fn log2(self, number: usize) -> usize {
        match self {
            RoundingMode::Down => floor_log_2(number),
            RoundingMode::Up => ceil_log_2(number),
        }
    }

    pub fn divide(self, dividend: usize, divisor: usize) -> usize {
        match self {
            RoundingMode::Up => (dividend + divisor - 1) / divisor,
            RoundingMode::Down => dividend / divisor,
        }
    }
}

/// Number of tiles needed to cover `full_res` pixels using tiles of `tile_size`.
/// The final tile may be only partially filled.
pub fn compute_tile_count(full_res: usize, tile_size: usize) -> usize {
    RoundingMode::Up.divide(full_res.max(1), tile_size.max(1))
}

/// Number of levels in a mip-map-style pyramid for a single dimension.
pub fn compute_level_count(round: RoundingMode, full_res: usize) -> usize {
    round.log2(full_res.max(1)) + 1
}

/// The resolution of one dimension at a given pyramid level.
pub fn compute_level_size(round: RoundingMode, full_res: usize, level_index: usize) -> usize {
    round.divide(full_res.max(1), 1 << level_index).max(1)
}

/// All resolutions for a rip-map pyramid (independent x and y levels), in row-major (y, x) order.
pub fn rip_map_resolutions(round: RoundingMode, max_resolution: Vec2<usize>) -> impl Iterator<Item=(Vec2<usize>, Vec2<usize>)> {
    let width_levels = compute_level_count(round, max_resolution.x());
    let height_levels = compute_level_count(round, max_resolution.y());

    (0 .. height_levels).flat_map(move |y_level| {
        (0 .. width_levels).map(move |x_level| {
            let width = compute_level_size(round, max_resolution.x(), x_level);
            let height = compute_level_size(round, max_resolution.y(), y_level);
            (Vec2(x_level, y_level), Vec2(width, height))
        })
    })
}

/// All resolutions for a mip-map pyramid (shared level index for x and y).
pub fn mip_map_resolutions(round: RoundingMode, max_resolution: Vec2<usize>) -> impl Iterator<Item=(usize, Vec2<usize>)> {
    let levels = compute_level_count(round, max_resolution.x().max(max_resolution.y()));

    (0 .. levels).map(move |level| {
        let width = compute_level_size(round, max_resolution.x(), level);
        let height = compute_level_size(round, max_resolution.y(), level);
        (level, Vec2(width, height))
    })
}

/// Number of subsampled values covering the index range `min..=max` at the given `sampling` rate.
/// Modelled after OpenEXR's `numSamples` in `ImfMisc.cpp`.
pub fn num_samples(sampling: usize, min: i32, max: i32) -> usize {
    let n = sampling as i32;
    let a1 = if min >= 0 { min } else { min - n + 1 };
    let b1 = if max >= 0 { max } else { max - n + 1 };
    ((b1 / n - a1 / n + 1).max(0)) as usize
}

/// Positive modulo of `x` with respect to a subsampling rate, used to find the first
/// subsampled row or column at or after `x`. Modelled after OpenEXR's `modp` in `ImfMisc.cpp`.
pub fn mod_p(x: i32, sampling: usize) -> i32 {
    let n = sampling as i32;
    if x >= 0 { x % n } else { (x % n + n) % n }
}
