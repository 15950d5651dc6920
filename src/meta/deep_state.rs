//! The `deepImageState` attribute: how a deep image's per-pixel sample lists
//! are sorted and whether they overlap in depth.

use crate::error::{Result, Error, UnitResult};

/// Describes the organization of samples within a deep image.
///
/// Flattening requires `Tidy`; compositing only requires `Sorted`.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
#[repr(u8)]
pub enum DeepImageState {
    /// Samples may be unsorted and may overlap in depth.
    Messy = 0,

    /// Samples are sorted by depth but may still overlap.
    Sorted = 1,

    /// Samples don't overlap, but are not necessarily sorted.
    NonOverlapping = 2,

    /// Sorted by depth and non-overlapping.
    Tidy = 3,
}

impl DeepImageState {
    #[inline]
    pub fn is_sorted(self) -> bool {
        matches!(self, DeepImageState::Sorted | DeepImageState::Tidy)
    }

    #[inline]
    pub fn is_non_overlapping(self) -> bool {
        matches!(self, DeepImageState::NonOverlapping | DeepImageState::Tidy)
    }

    #[inline]
    pub fn is_tidy(self) -> bool {
        self == DeepImageState::Tidy
    }

    /// Is this state at least as organized as `other`?
    pub fn is_at_least(self, other: DeepImageState) -> bool {
        use DeepImageState::*;

        match (self, other) {
            (Tidy, _) => true,
            (_, Tidy) => false,
            (Sorted, Sorted) | (Sorted, Messy) => true,
            (NonOverlapping, NonOverlapping) | (NonOverlapping, Messy) => true,
            (Messy, Messy) => true,
            _ => false,
        }
    }

    #[inline]
    pub fn to_i32(self) -> i32 {
        self as u8 as i32
    }

    pub fn from_i32(value: i32) -> Result<Self> {
        match value {
            0 => Ok(DeepImageState::Messy),
            1 => Ok(DeepImageState::Sorted),
            2 => Ok(DeepImageState::NonOverlapping),
            3 => Ok(DeepImageState::Tidy),
            _ => Err(Error::invalid(format!(
                "invalid deepImageState value: {} (must be 0-3)",
                value
            ))),
        }
    }

    /// Fails unless this state is at least `required`, naming `operation` in the error.
    pub fn require_for_operation(self, operation: &str, required: DeepImageState) -> UnitResult {
        if !self.is_at_least(required) {
            Err(Error::invalid(format!(
                "operation '{}' requires deep image state {:?}, but image is {:?}",
                operation, required, self
            )))
        } else {
            Ok(())
        }
    }
}

impl Default for DeepImageState {
    fn default() -> Self { DeepImageState::Messy }
}

impl std::fmt::Display for DeepImageState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeepImageState::Messy => write!(f, "messy"),
            DeepImageState::Sorted => write!(f, "sorted"),
            DeepImageState::NonOverlapping => write!(f, "non-overlapping"),
            DeepImageState::Tidy => write!(f, "tidy"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_properties() {
        assert!(!DeepImageState::Messy.is_sorted());
        assert!(!DeepImageState::Messy.is_non_overlapping());
        assert!(!DeepImageState::Messy.is_tidy());

        assert!(DeepImageState::Sorted.is_sorted());
        assert!(!DeepImageState::Sorted.is_non_overlapping());
        assert!(!DeepImageState::Sorted.is_tidy());

        assert!(!DeepImageState::NonOverlapping.is_sorted());
        assert!(DeepImageState::NonOverlapping.is_non_overlapping());
        assert!(!DeepImageState::NonOverlapping.is_tidy());

        assert!(DeepImageState::Tidy.is_sorted());
        assert!(DeepImageState::Tidy.is_non_overlapping());
        assert!(DeepImageState::Tidy.is_tidy());
    }

    #[test]
    fn is_at_least_orders_states() {
        assert!(DeepImageState::Tidy.is_at_least(DeepImageState::Messy));
        assert!(DeepImageState::Tidy.is_at_least(DeepImageState::Sorted));
        assert!(DeepImageState::Tidy.is_at_least(DeepImageState::NonOverlapping));
        assert!(DeepImageState::Tidy.is_at_least(DeepImageState::Tidy));

        assert!(DeepImageState::Sorted.is_at_least(DeepImageState::Messy));
        assert!(DeepImageState::Sorted.is_at_least(DeepImageState::Sorted));
        assert!(!DeepImageState::Sorted.is_at_least(DeepImageState::NonOverlapping));
        assert!(!DeepImageState::Sorted.is_at_least(DeepImageState::Tidy));

        assert!(DeepImageState::NonOverlapping.is_at_least(DeepImageState::Messy));
        assert!(!DeepImageState::NonOverlapping.is_at_least(DeepImageState::Sorted));
        assert!(DeepImageState::NonOverlapping.is_at_least(DeepImageState::NonOverlapping));
        assert!(!DeepImageState::NonOverlapping.is_at_least(DeepImageState::Tidy));

        assert!(DeepImageState::Messy.is_at_least(DeepImageState::Messy));
        assert!(!DeepImageState::Messy.is_at_least(DeepImageState::Sorted));
    }

    #[test]
    fn conversion_round_trips() {
        for &state in &[
            DeepImageState::Messy,
            DeepImageState::Sorted,
            DeepImageState::NonOverlapping,
            DeepImageState::Tidy,
        ] {
            let value = state.to_i32();
            assert_eq!(DeepImageState::from_i32(value).unwrap(), state);
        }

        assert!(DeepImageState::from_i32(-1).is_err());
        assert!(DeepImageState::from_i32(4).is_err());
    }

    #[test]
    fn default_is_messy() {
        assert_eq!(DeepImageState::default(), DeepImageState::Messy);
    }

    #[test]
    fn display_names_match_file_format() {
        assert_eq!(format!("{}", DeepImageState::Messy), "messy");
        assert_eq!(format!("{}", DeepImageState::Sorted), "sorted");
        assert_eq!(format!("{}", DeepImageState::NonOverlapping), "non-overlapping");
        assert_eq!(format!("{}", DeepImageState::Tidy), "tidy");
    }

    #[test]
    fn require_for_operation_checks_ordering() {
        assert!(DeepImageState::Tidy.require_for_operation("flatten", DeepImageState::Tidy).is_ok());
        assert!(DeepImageState::Tidy.require_for_operation("composite", DeepImageState::Sorted).is_ok());

        assert!(DeepImageState::Messy.require_for_operation("flatten", DeepImageState::Tidy).is_err());
        assert!(DeepImageState::Messy.require_for_operation("composite", DeepImageState::Sorted).is_err());

        assert!(DeepImageState::Sorted.require_for_operation("composite", DeepImageState::Sorted).is_ok());
        assert!(DeepImageState::Sorted.require_for_operation("flatten", DeepImageState::Tidy).is_err());
    }
}
