//! Error types.
//!
//! Each error is represented by a unique type that implements [`std::error::Error`].
//! Most APIs return the crate-level [`Error`] enum, which every individual
//! error type converts into, allowing them to be used with `?`:
//!
//! ```
//! use vxm::error::{Error, NotConfiguredError};
//!
//! fn foo() -> Result<(), NotConfiguredError> {
//!     // ...
//! # unimplemented!();
//! }
//!
//! fn bar() -> Result<(), Error> {
//!     foo()?;
//!     // ...
//! # Ok(())
//! }
//! ```
//!
//! The enum can be converted back into the individual error types with
//! [`TryFrom`], or inspected with predicates such as [`Error::is_timeout`].

use crate::ready::ReadyMode;
use std::time::Duration;

/// Implement Error and Display traits for the specified type.
///
/// After the type define the format string and any arguments it should
/// reference after `self =>` (to abide by macro hygiene rules).
macro_rules! impl_error_display {
    (
        $name:path,
        $self:ident =>
        $display:literal
        $(,
            $($arg:expr),+
        )?
    ) => {
        impl std::error::Error for $name {}

        impl std::fmt::Display for $name {
            fn fmt(&$self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(
                    f,
                    $display
                    $(,
                        $($arg),+
                    )?
                )
            }
        }
    };
}

/// Define error enums that contain concrete error types (not other error enums).
///
/// From and TryFrom traits will be implemented for the enum and it's underlying
/// errors. The enum's Display implementation will defer to the underlying errors'
/// Display implementations. A `source` is reported for the underlying error.
///
/// For each variant an `is_<variant>()` predicate is generated.
macro_rules! error_enum {
    (
        $(#[$attr:meta])*
        pub enum $name:ident {
            $(
                $variant:ident($inner:path)
            ),+
            $(,)?
        }
    ) => {
        $(
            #[$attr]
        )*
        #[allow(missing_docs)]
        pub enum $name {
            $(
                $variant($inner)
            ),+
        }

        impl std::error::Error for $name {
            fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
                match self {
                    $(
                        $name::$variant(e) => Some(e)
                    ),+
                }
            }
        }

        // Defer the display to the inner error type
        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match self {
                    $(
                        $name::$variant(e) => std::fmt::Display::fmt(e, f)
                    ),+
                }
            }
        }

        // Allow the enum to be convertible from an infallible error
        impl From<std::convert::Infallible> for $name {
            fn from(other: std::convert::Infallible) -> Self {
                match other {}
            }
        }

        $(
            impl From<$inner> for $name {
                fn from(other: $inner) -> Self {
                    $name::$variant(other)
                }
            }

            impl TryFrom<$name> for $inner {
                type Error = $name;
                fn try_from(other: $name) -> Result<Self, Self::Error> {
                    match other {
                        $name::$variant(value) => Ok(value),
                        #[allow(unreachable_patterns)]
                        value => Err(value)
                    }
                }
            }
        )+

        paste::paste! {
            impl $name {
                $(
                    #[doc = "Whether the error is the `" $variant "` variant."]
                    pub fn [< is_ $variant:snake >](&self) -> bool {
                        matches!(self, $name::$variant(_))
                    }
                )+
            }
        }
    };
}

/// The serial port could not be opened or configured.
///
/// The specified device may be disconnected, already in use by another
/// process, or may not support the requested settings.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct PortUnavailableError(Box<str>);

impl PortUnavailableError {
    /// Create an instance of the error.
    pub(crate) fn new<S: AsRef<str>>(description: S) -> Self {
        PortUnavailableError(Box::from(description.as_ref()))
    }

    /// The description reported by the operating system.
    pub fn description(&self) -> &str {
        &self.0
    }
}

impl From<serialport::Error> for PortUnavailableError {
    fn from(other: serialport::Error) -> Self {
        match other.kind() {
            serialport::ErrorKind::NoDevice => PortUnavailableError::new(format!(
                "device is either disconnected or already in use by another process: {}",
                other.description
            )),
            serialport::ErrorKind::InvalidInput => {
                PortUnavailableError::new(format!("invalid settings: {}", other.description))
            }
            serialport::ErrorKind::Unknown | serialport::ErrorKind::Io(_) => {
                PortUnavailableError::new(other.description)
            }
        }
    }
}

impl_error_display! {
    PortUnavailableError,
    self => "the serial port is unavailable: {}", self.0
}

/// A bounded wait for the controller to become ready exceeded its deadline.
///
/// Any text received before the deadline is discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimeoutError {
    /// How long the wait lasted.
    timeout: Duration,
    /// The strategy that was waiting.
    mode: ReadyMode,
}

impl TimeoutError {
    /// Create an instance of the error.
    pub(crate) fn new(timeout: Duration, mode: ReadyMode) -> Self {
        TimeoutError { timeout, mode }
    }

    /// The timeout that elapsed.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// The ready detection strategy that was in use.
    pub fn mode(&self) -> ReadyMode {
        self.mode
    }
}

impl_error_display! {
    TimeoutError,
    self => "timed out after {:?} waiting for {}", self.timeout, match self.mode {
        ReadyMode::Sentinel => "the ready character",
        ReadyMode::Quiet => "a quiet period",
    }
}

/// A motor number outside of 1 to 4, or an unknown axis letter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InvalidMotorError(i64);

impl InvalidMotorError {
    /// Create an instance of the error.
    pub(crate) fn new(value: i64) -> Self {
        InvalidMotorError(value)
    }

    /// The rejected value.
    ///
    /// For axis letters this is the character's code point.
    pub fn value(&self) -> i64 {
        self.0
    }
}

impl_error_display! {
    InvalidMotorError,
    self => "invalid motor {}: the motor must be 1, 2, 3, or 4", self.0
}

/// A unit conversion was requested before the scale was set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NotConfiguredError;

impl_error_display! {
    NotConfiguredError,
    self => "scale not set: call set_scale(steps_per_unit) first"
}

/// A physical distance could not be converted into a number of steps.
///
/// This happens when the distance, or the distance multiplied by the scale,
/// is infinite or not a number.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InvalidDistanceError {
    units: f64,
    steps_per_unit: f64,
}

impl InvalidDistanceError {
    /// Create an instance of the error.
    pub(crate) fn new(units: f64, steps_per_unit: f64) -> Self {
        InvalidDistanceError {
            units,
            steps_per_unit,
        }
    }

    /// The distance that was rejected.
    pub fn units(&self) -> f64 {
        self.units
    }

    /// The scale in effect.
    pub fn steps_per_unit(&self) -> f64 {
        self.steps_per_unit
    }
}

impl_error_display! {
    InvalidDistanceError,
    self => "cannot move {} units at {} steps per unit", self.units, self.steps_per_unit
}

/// A reply did not contain the expected integer value.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct NoValueError(Box<str>);

impl NoValueError {
    /// Create an instance of the error.
    pub(crate) fn new<S: AsRef<str>>(reply: S) -> Self {
        NoValueError(Box::from(reply.as_ref()))
    }

    /// The reply that could not be parsed.
    pub fn reply(&self) -> &str {
        &self.0
    }
}

impl_error_display! {
    NoValueError,
    self => "reply contained no integer value: {:?}", self.0
}

/// A string could not be parsed into a [`Direction`](crate::Direction).
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct ParseDirectionError(Box<str>);

impl ParseDirectionError {
    /// Create an instance of the error.
    pub(crate) fn new<S: AsRef<str>>(input: S) -> Self {
        ParseDirectionError(Box::from(input.as_ref()))
    }
}

impl_error_display! {
    ParseDirectionError,
    self => "invalid direction {:?}: expected \"neg\" or \"pos\"", self.0
}

/// A string could not be parsed into a [`ReadyMode`].
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct ParseReadyModeError(Box<str>);

impl ParseReadyModeError {
    /// Create an instance of the error.
    pub(crate) fn new<S: AsRef<str>>(input: S) -> Self {
        ParseReadyModeError(Box::from(input.as_ref()))
    }
}

impl_error_display! {
    ParseReadyModeError,
    self => "invalid ready mode {:?}: expected \"char\" or \"silence\"", self.0
}

error_enum! {
    /// Any error returned by this library.
    #[derive(Debug)]
    #[non_exhaustive]
    pub enum Error {
        PortUnavailable(PortUnavailableError),
        Io(std::io::Error),
        Timeout(TimeoutError),
        InvalidMotor(InvalidMotorError),
        NotConfigured(NotConfiguredError),
        InvalidDistance(InvalidDistanceError),
        NoValue(NoValueError),
    }
}

impl Error {
    /// A convenience function for determining if the error is due to a wait
    /// or the transport timing out.
    ///
    /// Unlike [`is_timeout`](Error::is_timeout), transport I/O errors of kind
    /// [`TimedOut`](std::io::ErrorKind::TimedOut) also count.
    pub fn is_any_timeout(&self) -> bool {
        match self {
            Error::Timeout(_) => true,
            Error::Io(e) => e.kind() == std::io::ErrorKind::TimedOut,
            _ => false,
        }
    }
}

impl From<serialport::Error> for Error {
    fn from(other: serialport::Error) -> Self {
        Error::PortUnavailable(other.into())
    }
}

/// Explicitly downgrade a failure to a default value.
///
/// Some operations are liveness checks or courtesy messages whose failure
/// should never interrupt the caller. Rather than silently discarding the
/// error, call sites spell out the fallback and the failure is logged.
///
/// ```
/// use vxm::error::{BestEffort as _, Error};
///
/// let result: Result<bool, Error> = Err(std::io::Error::other("port closed").into());
/// assert!(!result.best_effort(false, "busy check"));
/// ```
pub trait BestEffort<T> {
    /// Return the `Ok` value, or log the error and return `default`.
    ///
    /// `what` names the operation in the log message.
    fn best_effort(self, default: T, what: &str) -> T;
}

impl<T, E: std::fmt::Display> BestEffort<T> for Result<T, E> {
    fn best_effort(self, default: T, what: &str) -> T {
        match self {
            Ok(value) => value,
            Err(e) => {
                log::warn!("{what} failed, continuing anyway: {e}");
                default
            }
        }
    }
}
