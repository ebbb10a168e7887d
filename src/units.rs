//! Converting physical distances into motor steps.

use crate::error::{Error, InvalidDistanceError, NotConfiguredError};

/// The calibration between a physical unit (millimetres, degrees, ...) and
/// motor steps.
///
/// A scale starts out unset. Converting before it has been set fails with a
/// [`NotConfiguredError`]. The value is not validated, so a zero or negative
/// scale is accepted and simply produces zero or reversed step counts. A
/// distance that is not finite once scaled fails with an
/// [`InvalidDistanceError`].
///
/// ```
/// # use vxm::units::Scale;
/// let mut scale = Scale::new();
/// assert!(scale.to_steps(1.0).is_err());
/// scale.set(40.0);
/// assert_eq!(scale.to_steps(2.5).unwrap(), 100);
/// ```
#[derive(Debug, Default, Copy, Clone, PartialEq)]
pub struct Scale {
    steps_per_unit: Option<f64>,
}

impl Scale {
    /// Create an unset scale.
    pub const fn new() -> Self {
        Scale {
            steps_per_unit: None,
        }
    }

    /// Set the number of steps per unit, returning the previous value.
    pub fn set(&mut self, steps_per_unit: f64) -> Option<f64> {
        self.steps_per_unit.replace(steps_per_unit)
    }

    /// The number of steps per unit, if it has been set.
    pub fn get(&self) -> Option<f64> {
        self.steps_per_unit
    }

    /// Convert a distance in units into steps, rounding half away from zero.
    ///
    /// Finite results outside the range of an `i32` saturate.
    #[allow(clippy::cast_possible_truncation)]
    pub fn to_steps(&self, units: f64) -> Result<i32, Error> {
        let steps_per_unit = self.steps_per_unit.ok_or(NotConfiguredError)?;
        let steps = units * steps_per_unit;
        if !steps.is_finite() {
            return Err(InvalidDistanceError::new(units, steps_per_unit).into());
        }
        Ok(steps.round() as i32)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn unset_scale_is_not_configured() {
        let scale = Scale::new();
        assert_eq!(scale.get(), None);
        assert!(scale.to_steps(2.5).unwrap_err().is_not_configured());
    }

    #[test]
    fn converts_and_rounds() {
        let mut scale = Scale::new();
        assert_eq!(scale.set(40.0), None);
        assert_eq!(scale.to_steps(2.5).ok(), Some(100));
        assert_eq!(scale.to_steps(-2.5).ok(), Some(-100));

        scale.set(1.0);
        assert_eq!(scale.to_steps(0.5).ok(), Some(1));
        assert_eq!(scale.to_steps(-0.5).ok(), Some(-1));
        assert_eq!(scale.to_steps(0.49).ok(), Some(0));
    }

    #[test]
    fn any_scale_is_accepted() {
        let mut scale = Scale::new();
        scale.set(0.0);
        assert_eq!(scale.to_steps(12.0).ok(), Some(0));
        assert_eq!(scale.set(-10.0), Some(0.0));
        assert_eq!(scale.to_steps(1.5).ok(), Some(-15));
        scale.set(1e12);
        assert_eq!(scale.to_steps(1.0).ok(), Some(i32::MAX));
        assert_eq!(scale.to_steps(-1.0).ok(), Some(i32::MIN));
    }

    #[test]
    fn non_finite_distances_are_rejected() {
        let mut scale = Scale::new();
        scale.set(40.0);
        for units in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let err = InvalidDistanceError::try_from(scale.to_steps(units).unwrap_err()).unwrap();
            assert!(!err.units().is_finite());
        }
        // A finite distance can overflow once scaled.
        scale.set(f64::MAX);
        assert!(scale.to_steps(10.0).unwrap_err().is_invalid_distance());
        scale.set(f64::NAN);
        assert!(scale.to_steps(1.0).unwrap_err().is_invalid_distance());
    }
}
