//! A library for driving Velmex VXM stepper-motor controllers over a serial port.
//!
//! A VXM accepts short ASCII commands terminated by a carriage return and has
//! no acknowledgement protocol. This crate turns that into typed, blocking
//! calls with bounded waits:
//!
//! * [`Port`] owns the serial connection and sends [`Command`](command::Command)s.
//! * Waits for the controller to finish are bounded by a timeout and detect
//!   completion either by a ready character or by a period of silence, see
//!   [`ReadyMode`].
//! * Positions are read back as integers, and physical distances are
//!   converted into steps once a scale is set.
//! * [`Home`] runs the limit-switch homing sequence as a [`Routine`](routine::Routine).
//!
//! ```no_run
//! use vxm::{Direction, Motor, Port};
//! use std::time::Duration;
//!
//! # fn wrapper() -> Result<(), vxm::Error> {
//! let mut port = Port::open_serial("/dev/ttyUSB0")?;
//! port.home(Motor::M1, Direction::Negative, 500, 200, Duration::from_secs(180))?;
//! port.set_scale(400.0); // steps per mm
//! port.move_units(Motor::M1, 12.5)?;
//! port.run(Some(Duration::from_secs(60)))?;
//! println!("X = {}", port.position(Motor::M1, Duration::from_secs(1))?);
//! # Ok(())
//! # }
//! ```
//!
//! Everything is single-threaded and synchronous. All sleeps go through a
//! [`Clock`](clock::Clock), so with the `mock` feature the [`Mock`](backend::Mock)
//! backend and [`MockClock`](clock::MockClock) can run a port in virtual time.

#![cfg_attr(all(doc, feature = "doc_cfg"), feature(doc_cfg))]

pub mod backend;
pub mod clock;
pub mod command;
pub mod error;
pub mod home;
pub mod motor;
pub mod port;
pub mod ready;
pub mod routine;
pub mod units;

pub use error::Error;
pub use home::{Home, HomingState};
pub use motor::{Direction, Motor};
pub use port::Port;
pub use ready::{ReadyConfig, ReadyMode};
