//! Types for generating VXM commands.
//!
//! Every command the controller understands is one variant of [`Command`],
//! which knows how to render itself into the wire format. Commands are plain
//! ASCII terminated by a single carriage return.

use crate::{Direction, Motor};
use std::{fmt, io};

/// The byte terminating every command.
pub const CARRIAGE_RETURN: u8 = b'\r';

/// The distance of a relative move.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Distance {
    /// A signed number of steps.
    ///
    /// `Steps(0)` renders the same as `ToLimit(Direction::Positive)`, so the
    /// [`Port`](crate::Port) never sends it.
    Steps(i32),
    /// Move until the limit switch in the given direction is hit.
    ///
    /// The controller encodes this as a zero-length move whose sign picks the
    /// direction (`-0` or `0`).
    ToLimit(Direction),
}

impl fmt::Display for Distance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Distance::Steps(steps) => write!(f, "{steps}"),
            Distance::ToLimit(Direction::Negative) => f.write_str("-0"),
            Distance::ToLimit(Direction::Positive) => f.write_str("0"),
        }
    }
}

impl From<i32> for Distance {
    fn from(steps: i32) -> Self {
        Distance::Steps(steps)
    }
}

/// A VXM command.
///
/// ## Example
///
/// ```
/// # use vxm::{command::{Command, Distance}, Direction, Motor};
/// assert_eq!(Command::SetSpeed { motor: Motor::M1, speed: 800 }.to_string(), "S1M800");
/// assert_eq!(Command::Move { motor: Motor::M2, distance: Distance::Steps(-400) }.to_string(), "I2M-400");
/// assert_eq!(Command::Move { motor: Motor::M1, distance: Distance::ToLimit(Direction::Negative) }.to_string(), "I1M-0");
/// assert_eq!(Command::QueryPosition(Motor::M4).to_string(), "T");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Command {
    /// Enter on-line mode with echo off (`F`).
    Online,
    /// Set a motor's speed, in steps per second (`S{m}M{speed}`).
    SetSpeed {
        /// The motor.
        motor: Motor,
        /// Steps per second.
        speed: u32,
    },
    /// Set a motor's speed at full power (`SA{m}M{speed}`).
    SetSpeedFullPower {
        /// The motor.
        motor: Motor,
        /// Steps per second.
        speed: u32,
    },
    /// Set a motor's acceleration (`A{m}M{accel}`).
    SetAcceleration {
        /// The motor.
        motor: Motor,
        /// The acceleration, 1 to 127.
        acceleration: u32,
    },
    /// Queue a relative move (`I{m}M{distance}`).
    Move {
        /// The motor.
        motor: Motor,
        /// How far to move.
        distance: Distance,
    },
    /// Set the absolute position reference (`IA{m}M{steps}`).
    SetAbsolute {
        /// The motor.
        motor: Motor,
        /// The signed position.
        position: i32,
    },
    /// Declare the current location as absolute zero (`IA{m}M-0`).
    Zero(Motor),
    /// Execute the queued moves (`R`).
    Run,
    /// Decelerate to a stop (`D`).
    Decelerate,
    /// Stop immediately (`K`).
    Kill,
    /// Clear the queued program (`C`).
    Clear,
    /// Query a motor's position (`X`, `Y`, `Z`, or `T`).
    QueryPosition(Motor),
    /// List the queued program (`lst`).
    ListProgram,
    /// Any other command, sent verbatim.
    ///
    /// No characters are escaped. Including a carriage return or other control
    /// characters is the caller's responsibility.
    Raw(String),
}

impl Command {
    /// Write the command, including the terminating carriage return, into the
    /// specified writer.
    pub fn write_into<W: io::Write + ?Sized>(&self, writer: &mut W) -> io::Result<()> {
        write!(writer, "{self}")?;
        writer.write_all(&[CARRIAGE_RETURN])
    }

    /// The command's bytes as they are sent over the wire.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(16);
        // Writing to a Vec cannot fail.
        let _ = self.write_into(&mut buf);
        buf
    }
}

impl fmt::Display for Command {
    /// Format the command without the terminating carriage return.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Online => f.write_str("F"),
            Command::SetSpeed { motor, speed } => write!(f, "S{motor}M{speed}"),
            Command::SetSpeedFullPower { motor, speed } => write!(f, "SA{motor}M{speed}"),
            Command::SetAcceleration {
                motor,
                acceleration,
            } => write!(f, "A{motor}M{acceleration}"),
            Command::Move { motor, distance } => write!(f, "I{motor}M{distance}"),
            Command::SetAbsolute { motor, position } => write!(f, "IA{motor}M{position}"),
            Command::Zero(motor) => write!(f, "IA{motor}M-0"),
            Command::Run => f.write_str("R"),
            Command::Decelerate => f.write_str("D"),
            Command::Kill => f.write_str("K"),
            Command::Clear => f.write_str("C"),
            Command::QueryPosition(motor) => write!(f, "{}", motor.axis()),
            Command::ListProgram => f.write_str("lst"),
            Command::Raw(raw) => f.write_str(raw),
        }
    }
}

impl From<&str> for Command {
    fn from(raw: &str) -> Self {
        Command::Raw(raw.to_string())
    }
}

impl From<String> for Command {
    fn from(raw: String) -> Self {
        Command::Raw(raw)
    }
}

impl From<&Command> for Command {
    fn from(command: &Command) -> Self {
        command.clone()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn wire_format() {
        let m1 = Motor::M1;
        let cases: [(Command, &str); 16] = [
            (Command::Online, "F"),
            (Command::SetSpeed { motor: m1, speed: 500 }, "S1M500"),
            (
                Command::SetSpeedFullPower {
                    motor: Motor::M3,
                    speed: 6000,
                },
                "SA3M6000",
            ),
            (
                Command::SetAcceleration {
                    motor: Motor::M2,
                    acceleration: 10,
                },
                "A2M10",
            ),
            (
                Command::Move {
                    motor: m1,
                    distance: Distance::Steps(2000),
                },
                "I1M2000",
            ),
            (
                Command::Move {
                    motor: Motor::M4,
                    distance: Distance::Steps(-5),
                },
                "I4M-5",
            ),
            (
                Command::Move {
                    motor: m1,
                    distance: Distance::ToLimit(Direction::Negative),
                },
                "I1M-0",
            ),
            (
                Command::Move {
                    motor: m1,
                    distance: Distance::ToLimit(Direction::Positive),
                },
                "I1M0",
            ),
            (
                Command::SetAbsolute {
                    motor: Motor::M2,
                    position: -300,
                },
                "IA2M-300",
            ),
            (Command::Zero(Motor::M2), "IA2M-0"),
            (Command::Run, "R"),
            (Command::Decelerate, "D"),
            (Command::Kill, "K"),
            (Command::Clear, "C"),
            (Command::QueryPosition(Motor::M3), "Z"),
            (Command::ListProgram, "lst"),
        ];
        for (command, expected) in cases {
            assert_eq!(command.to_string(), expected);
        }
    }

    #[test]
    fn write_appends_a_single_carriage_return() {
        assert_eq!(Command::Run.to_bytes(), b"R\r");
        assert_eq!(Command::from("V").to_bytes(), b"V\r");
        assert_eq!(Command::QueryPosition(Motor::M1).to_bytes(), b"X\r");
    }

    #[test]
    fn raw_commands_are_not_escaped() {
        let raw = Command::from("C,I1M400,R\t");
        assert_eq!(raw.to_bytes(), b"C,I1M400,R\t\r");
    }
}
