//! Homing a motor against one of its limit switches.
//!
//! Homing is a fixed sequence of steps, each of which must succeed before the
//! next one is attempted:
//!
//! 1. [`SeekingLimit`](HomingState::SeekingLimit): set the homing speed, then
//!    move until the limit switch in the homing direction is hit.
//! 2. [`BackingOff`](HomingState::BackingOff): move a fixed number of steps
//!    back off the switch. Skipped when the backoff is zero.
//! 3. [`Zeroing`](HomingState::Zeroing): declare the current location to be
//!    absolute zero.
//!
//! The sequence ends in [`Done`](HomingState::Done), or in
//! [`Failed`](HomingState::Failed) as soon as any step fails. A failed sequence
//! is never retried or undone.

use crate::{
	backend::{Backend, UNKNOWN_BACKEND_NAME},
	clock::Clock,
	error::Error,
	motor::{Direction, Motor},
	port::Port,
	routine::Routine,
};
use std::time::Duration;

/// The progress of a [`Home`] routine.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum HomingState {
	/// The routine has not started.
	Idle,
	/// Moving towards the limit switch.
	SeekingLimit,
	/// Moving back off the limit switch.
	BackingOff,
	/// Setting the absolute zero.
	Zeroing,
	/// The motor is homed.
	Done,
	/// A step failed and the sequence was aborted.
	Failed,
}

/// A [`Routine`] that homes a motor.
///
/// Build one with [`Home::new`], adjust it with the builder methods, and run
/// it with [`Port::execute`]. [`Port::home`] is a shortcut for the same thing.
///
/// ```no_run
/// # use vxm::{Port, Home, HomingState, Motor, Direction};
/// # use std::time::Duration;
/// # fn wrapper() -> Result<(), vxm::Error> {
/// let mut port = Port::open_serial("/dev/ttyUSB0")?;
/// let mut home = Home::new(Motor::M2)
///     .direction(Direction::Positive)
///     .backoff(400)
///     .timeout(Duration::from_secs(60));
/// match port.execute(&mut home) {
///     Ok(()) => assert_eq!(home.state(), HomingState::Done),
///     Err(e) => println!("homing failed while {:?}: {e}", home.failed_during()),
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
#[must_use = "routines are lazy and do nothing unless consumed"]
pub struct Home {
	motor: Motor,
	direction: Direction,
	speed: u32,
	/// Steps to back off the switch. Only the magnitude is used.
	backoff: i32,
	/// The bound on every wait in the sequence.
	timeout: Duration,
	state: HomingState,
	/// The state that was active when the sequence failed.
	failed_during: Option<HomingState>,
}

impl Home {
	/// The default homing speed, in steps per second.
	pub const DEFAULT_SPEED: u32 = 500;
	/// The default number of steps to back off the limit switch.
	pub const DEFAULT_BACKOFF: i32 = 200;
	/// The default bound on each wait in the sequence.
	pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(180);

	/// Home `motor` towards its negative limit with the default speed,
	/// backoff, and timeout.
	pub fn new(motor: Motor) -> Self {
		Home {
			motor,
			direction: Direction::Negative,
			speed: Home::DEFAULT_SPEED,
			backoff: Home::DEFAULT_BACKOFF,
			timeout: Home::DEFAULT_TIMEOUT,
			state: HomingState::Idle,
			failed_during: None,
		}
	}

	/// Set which limit switch to home against.
	pub fn direction(mut self, direction: Direction) -> Self {
		self.direction = direction;
		self
	}

	/// Set the speed used while seeking the limit, in steps per second.
	pub fn speed(mut self, speed: u32) -> Self {
		self.speed = speed;
		self
	}

	/// Set how many steps to back off the limit switch.
	///
	/// The sign is ignored; the backoff is always away from the switch. With
	/// zero steps, the motor is zeroed on the switch.
	pub fn backoff(mut self, steps: i32) -> Self {
		self.backoff = steps;
		self
	}

	/// Set the bound on each wait in the sequence.
	pub fn timeout(mut self, timeout: Duration) -> Self {
		self.timeout = timeout;
		self
	}

	/// The current state of the sequence.
	pub fn state(&self) -> HomingState {
		self.state
	}

	/// If the last run failed, the step it failed in.
	pub fn failed_during(&self) -> Option<HomingState> {
		self.failed_during
	}

	fn enter(&mut self, name: &str, state: HomingState) {
		log::debug!(
			"{} homing motor {}: {:?} -> {:?}",
			name,
			self.motor,
			self.state,
			state
		);
		self.state = state;
	}

	fn sequence<B, C>(&mut self, port: &mut Port<B, C>, name: &str) -> Result<(), Error>
	where
		B: Backend,
		C: Clock,
	{
		self.enter(name, HomingState::SeekingLimit);
		port.set_speed(self.motor, self.speed)?;
		port.move_to_limit(self.motor, self.direction)?;
		port.run(Some(self.timeout))?;

		if self.backoff != 0 {
			self.enter(name, HomingState::BackingOff);
			let steps = self.direction.reverse().apply(self.backoff);
			port.move_relative(self.motor, steps)?;
			port.run(Some(self.timeout))?;
		}

		self.enter(name, HomingState::Zeroing);
		port.zero(self.motor, self.timeout)?;

		self.enter(name, HomingState::Done);
		Ok(())
	}
}

impl<B: Backend, C: Clock> Routine<Port<B, C>> for Home {
	type Output = ();
	type Error = Error;

	fn run(&mut self, port: &mut Port<B, C>) -> Result<(), Error> {
		let name = port
			.name()
			.unwrap_or_else(|| UNKNOWN_BACKEND_NAME.to_string());
		self.state = HomingState::Idle;
		self.failed_during = None;
		let result = self.sequence(port, &name);
		if let Err(e) = &result {
			self.failed_during = Some(self.state);
			self.enter(&name, HomingState::Failed);
			log::debug!("{} homing motor {} failed: {}", name, self.motor, e);
		}
		result
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::{backend::Mock, clock::MockClock};

	const TIMEOUT: Duration = Duration::from_secs(5);

	fn port() -> Port<Mock, MockClock> {
		let mut port = Port::open_mock();
		port.backend_mut().clear_written();
		port
	}

	#[test]
	fn negative_homing_sequence() {
		let mut port = port();
		port.backend_mut().reply("R", "^");
		port.backend_mut().reply("R", "^");
		port.backend_mut().reply("IA1M-0", "^");
		let mut home = Home::new(Motor::M1).timeout(TIMEOUT);
		port.execute(&mut home).unwrap();
		assert_eq!(home.state(), HomingState::Done);
		assert_eq!(home.failed_during(), None);
		assert_eq!(
			port.backend().written_commands(),
			["S1M500", "I1M-0", "R", "I1M200", "R", "IA1M-0"]
		);
	}

	#[test]
	fn positive_homing_backs_off_in_the_negative_direction() {
		let mut port = port();
		port.backend_mut().reply("R", "^");
		port.backend_mut().reply("R", "^");
		port.backend_mut().reply("IA3M-0", "^");
		port.execute(
			Home::new(Motor::M3)
				.direction(Direction::Positive)
				.speed(900)
				.backoff(-50)
				.timeout(TIMEOUT),
		)
		.unwrap();
		assert_eq!(
			port.backend().written_commands(),
			["S3M900", "I3M0", "R", "I3M-50", "R", "IA3M-0"]
		);
	}

	#[test]
	fn zero_backoff_zeroes_on_the_switch() {
		let mut port = port();
		port.backend_mut().reply("R", "^");
		port.backend_mut().reply("IA1M-0", "^");
		port.home(1, Direction::Negative, 500, 0, TIMEOUT).unwrap();
		assert_eq!(
			port.backend().written_commands(),
			["S1M500", "I1M-0", "R", "IA1M-0"]
		);
	}

	#[test]
	fn seek_timeout_aborts_the_sequence() {
		let mut port = port();
		// The controller never reports that the seek finished.
		let mut home = Home::new(Motor::M1).timeout(TIMEOUT);
		let err = port.execute(&mut home).unwrap_err();
		assert!(err.is_timeout());
		assert_eq!(home.state(), HomingState::Failed);
		assert_eq!(home.failed_during(), Some(HomingState::SeekingLimit));
		assert_eq!(port.backend().written_commands(), ["S1M500", "I1M-0", "R"]);
		assert!(port.clock().elapsed() >= TIMEOUT);
	}

	#[test]
	fn backoff_timeout_skips_zeroing() {
		let mut port = port();
		port.backend_mut().reply("R", "^");
		let mut home = Home::new(Motor::M2).timeout(TIMEOUT);
		let err = port.execute(&mut home).unwrap_err();
		assert!(err.is_timeout());
		assert_eq!(home.failed_during(), Some(HomingState::BackingOff));
		let written = port.backend().written_commands();
		assert_eq!(written, ["S2M500", "I2M-0", "R", "I2M200", "R"]);
	}

	#[test]
	fn transport_errors_abort_the_sequence() {
		let mut port = port();
		port.backend_mut().reply("R", "^");
		port.backend_mut().reply("R", "^");
		port.backend_mut().reply_read_error("IA1M-0", std::io::ErrorKind::BrokenPipe);
		let mut home = Home::new(Motor::M1).timeout(TIMEOUT);
		let err = port.execute(&mut home).unwrap_err();
		assert!(err.is_io());
		assert_eq!(home.failed_during(), Some(HomingState::Zeroing));
	}

	#[test]
	fn homing_runs_again_from_idle() {
		let mut port = port();
		let mut home = Home::new(Motor::M1).timeout(TIMEOUT);
		assert!(port.execute(&mut home).is_err());

		port.backend_mut().reply("R", "^");
		port.backend_mut().reply("R", "^");
		port.backend_mut().reply("IA1M-0", "^");
		port.execute(&mut home).unwrap();
		assert_eq!(home.state(), HomingState::Done);
		assert_eq!(home.failed_during(), None);
	}

	#[test]
	fn homing_routines_compose() {
		let mut port = port();
		for command in ["R", "R", "IA1M-0", "R", "R", "IA2M-0"] {
			port.backend_mut().reply(command, "^");
		}
		port.execute(
			Home::new(Motor::M1)
				.timeout(TIMEOUT)
				.and(Home::new(Motor::M2).timeout(TIMEOUT)),
		)
		.unwrap();
		let written = port.backend().written_commands();
		assert_eq!(written.len(), 12);
		assert_eq!(written[6], "S2M500");
	}
}
