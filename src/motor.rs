//! Motor identifiers and travel directions.

use crate::error::{InvalidMotorError, ParseDirectionError};
use std::{fmt, str::FromStr};

/// One of the (up to) four motors attached to a VXM controller.
///
/// Motors are numbered 1 to 4 and each has an axis letter (`X`, `Y`, `Z`,
/// `T`) that is used to query its position. A `Motor` can only hold a valid
/// motor number, so any API that takes a `Motor` can never address a
/// non-existent one.
///
/// APIs on the [`Port`](crate::Port) accept anything that converts into a
/// `Motor`, so plain integers and axis letters can be used directly. Invalid
/// values are rejected with an [`InvalidMotorError`] before anything is sent.
///
/// ```
/// # use vxm::Motor;
/// let motor = Motor::try_from(2).unwrap();
/// assert_eq!(motor.axis(), 'Y');
/// assert_eq!(Motor::try_from('z').unwrap(), Motor::M3);
/// assert!(Motor::try_from(5).is_err());
/// ```
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Motor {
    /// Motor 1, axis `X`.
    M1,
    /// Motor 2, axis `Y`.
    M2,
    /// Motor 3, axis `Z`.
    M3,
    /// Motor 4, axis `T`.
    M4,
}

impl Motor {
    /// All motors, in order.
    pub const ALL: [Motor; 4] = [Motor::M1, Motor::M2, Motor::M3, Motor::M4];

    /// The motor's number, 1 to 4.
    pub const fn number(self) -> u8 {
        match self {
            Motor::M1 => 1,
            Motor::M2 => 2,
            Motor::M3 => 3,
            Motor::M4 => 4,
        }
    }

    /// The motor's axis letter, used to query its position.
    pub const fn axis(self) -> char {
        match self {
            Motor::M1 => 'X',
            Motor::M2 => 'Y',
            Motor::M3 => 'Z',
            Motor::M4 => 'T',
        }
    }

    /// Get the motor for a number, if it is in 1 to 4.
    fn from_number(value: i64) -> Result<Motor, InvalidMotorError> {
        match value {
            1 => Ok(Motor::M1),
            2 => Ok(Motor::M2),
            3 => Ok(Motor::M3),
            4 => Ok(Motor::M4),
            _ => Err(InvalidMotorError::new(value)),
        }
    }
}

impl fmt::Display for Motor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.number())
    }
}

/// Implement `TryFrom<$t> for Motor` for integer types.
macro_rules! impl_try_from_int {
    ($($t:ty),+ $(,)?) => {
        $(
            impl TryFrom<$t> for Motor {
                type Error = InvalidMotorError;
                fn try_from(value: $t) -> Result<Self, Self::Error> {
                    // Values that don't fit in an i64 are certainly invalid.
                    Motor::from_number(i64::try_from(value).unwrap_or(i64::MAX))
                }
            }
        )+
    };
}

impl_try_from_int! { u8, u16, u32, u64, usize, i8, i16, i32, i64, isize }

impl TryFrom<char> for Motor {
    type Error = InvalidMotorError;
    fn try_from(value: char) -> Result<Self, Self::Error> {
        match value.to_ascii_uppercase() {
            'X' => Ok(Motor::M1),
            'Y' => Ok(Motor::M2),
            'Z' => Ok(Motor::M3),
            'T' => Ok(Motor::M4),
            other => Err(InvalidMotorError::new(i64::from(u32::from(other)))),
        }
    }
}

impl From<Motor> for u8 {
    fn from(motor: Motor) -> Self {
        motor.number()
    }
}

/// The direction of travel along an axis.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Towards the negative limit (decreasing position).
    Negative,
    /// Towards the positive limit (increasing position).
    Positive,
}

impl Direction {
    /// The opposite direction.
    #[must_use]
    pub const fn reverse(self) -> Direction {
        match self {
            Direction::Negative => Direction::Positive,
            Direction::Positive => Direction::Negative,
        }
    }

    /// Apply this direction's sign to a magnitude.
    ///
    /// The sign of `steps` is ignored.
    pub fn apply(self, steps: i32) -> i32 {
        let magnitude = steps.saturating_abs();
        match self {
            Direction::Negative => -magnitude,
            Direction::Positive => magnitude,
        }
    }
}

impl FromStr for Direction {
    type Err = ParseDirectionError;

    /// Parse `neg`/`negative`/`-` or `pos`/`positive`/`+`, ignoring case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "neg" | "negative" | "-" => Ok(Direction::Negative),
            "pos" | "positive" | "+" => Ok(Direction::Positive),
            _ => Err(ParseDirectionError::new(s)),
        }
    }
}
