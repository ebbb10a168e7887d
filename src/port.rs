//! Types for opening and using a serial port connected to a VXM controller.

mod options;

#[cfg(any(test, feature = "mock"))]
use crate::{backend::Mock, clock::MockClock};
use crate::{
	backend::{Backend, Serial, UNKNOWN_BACKEND_NAME},
	clock::{Clock, SystemClock},
	command::{Command, Distance},
	error::{BestEffort as _, Error, NoValueError},
	home::Home,
	motor::{Direction, Motor},
	ready::{decode, ReadyConfig, ReadyDetector, ReadyMode},
	routine::Routine,
	units::Scale,
};
pub use options::*;
use std::{io, time::Duration};

/// A session with a VXM controller.
///
/// The port owns the transport to the controller, the scale used for unit
/// conversions, and the configuration used to detect when the controller is
/// ready. When it is created, the port puts the controller into on-line mode
/// (`F`). The transport is closed when the port is dropped.
///
/// A port is parameterized by two types:
///
/// 1. `B`: the type of [`Backend`] used to send/receive bytes.
///    * Use [`open_serial`] to open a serial port (`Port<Serial>`). To
///      customize how the port is opened, or to use a dynamic backend, use the
///      [`OpenSerialOptions`] builder type.
/// 2. `C`: the [`Clock`] used for every wait.
///    * This has a default and can be ignored outside of tests.
///
/// Only one command can be in flight at a time: every command first discards
/// any unread input, so a reply still arriving from a previous command is
/// lost. Share a port between threads only behind a lock held for the whole
/// command.
///
/// ## Example
///
/// ```no_run
/// # use vxm::{Port, Motor};
/// # use std::time::Duration;
/// # fn wrapper() -> Result<(), vxm::Error> {
/// let mut port = Port::open_serial("/dev/ttyUSB0")?;
/// port.set_speed(1, 2000)?;
/// port.move_relative(Motor::M1, 400)?;
/// port.run(Some(Duration::from_secs(10)))?;
/// let position = port.position(1, Duration::from_secs(1))?;
/// # Ok(())
/// # }
/// ```
///
/// [`open_serial`]: Port::open_serial
pub struct Port<B, C = SystemClock> {
	/// The underlying backend
	backend: B,
	/// The source of time for all waits
	clock: C,
	/// Detects when the controller is ready
	detector: ReadyDetector,
	/// The steps per unit
	scale: Scale,
	/// How long to wait before reading an immediate reply
	grace_period: Duration,
	/// The bound on each position read of a busy check
	query_timeout: Duration,
}

impl<B: Backend, C> std::fmt::Debug for Port<B, C> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Port")
			.field("name", &self.backend.name())
			.field("ready", &self.detector.config)
			.field("scale", &self.scale.get())
			.finish_non_exhaustive()
	}
}

impl Port<Serial> {
	/// Open the serial port at the specified path using the default options.
	///
	/// Alternatively, use [`Port::open_serial_options`] to customize how the port is opened.
	///
	/// ## Example
	///
	/// ```rust
	/// # use vxm::Port;
	/// # fn wrapper() -> Result<(), Box<dyn std::error::Error>> {
	/// let mut port = Port::open_serial("/dev/ttyUSB0")?;
	/// // Or equivalently
	/// let mut port = Port::open_serial_options().open("/dev/ttyUSB0")?;
	/// # Ok(())
	/// # }
	/// ```
	pub fn open_serial(path: &str) -> Result<Port<Serial>, Error> {
		OpenSerialOptions::new().open(path)
	}

	/// Get an [`OpenSerialOptions`] to customize how a serial port is opened.
	pub fn open_serial_options() -> OpenSerialOptions {
		OpenSerialOptions::default()
	}
}

#[cfg(any(test, feature = "mock"))]
#[cfg_attr(all(doc, feature = "doc_cfg"), doc(cfg(feature = "mock")))]
impl Port<Mock, MockClock> {
	/// Open a port on a [`Mock`] backend with the default options.
	///
	/// The backend and the port share one [`MockClock`], so every wait runs in
	/// virtual time.
	pub fn open_mock() -> Self {
		let clock = MockClock::new();
		Port::from_parts(Mock::new(clock.clone()), clock, &OpenSerialOptions::new())
	}
}

impl<B: Backend, C: Clock> Port<B, C> {
	/// Create a `Port` and put the controller into on-line mode.
	///
	/// Failing to send the on-line command is logged but otherwise ignored.
	fn from_parts(backend: B, clock: C, options: &OpenSerialOptions) -> Self {
		let mut port = Port {
			backend,
			clock,
			detector: options.detector(),
			scale: Scale::new(),
			grace_period: options.grace(),
			query_timeout: options.busy_query_timeout(),
		};
		port.command(Command::Online)
			.best_effort((), "entering on-line mode");
		port
	}

	/// The backend's name, for log messages.
	fn log_name(&self) -> String {
		self.backend
			.name()
			.unwrap_or_else(|| UNKNOWN_BACKEND_NAME.to_string())
	}

	/// Transmit a command and collect what the controller sends back.
	///
	/// Any unread input is discarded before the command is written. Then:
	///
	/// * if `capture` is `true`, the port sleeps for the
	///   [grace period](Port::grace_period) and reads whatever immediate reply
	///   is available, without blocking for more;
	/// * if `ready_timeout` is `Some`, the port waits until the controller is
	///   ready, as configured by the [ready mode](Port::ready_mode), failing
	///   with a [`TimeoutError`](crate::error::TimeoutError) if it takes
	///   longer than the timeout. Anything captured immediately is included
	///   in the wait.
	///
	/// The trimmed text is returned, which is always empty if neither was
	/// requested.
	///
	/// ## Example
	///
	/// ```rust
	/// # use vxm::{Port, command::Command, backend::Backend};
	/// # use std::time::Duration;
	/// # fn wrapper<B: Backend>(mut port: Port<B>) -> Result<(), vxm::Error> {
	/// // Any string is sent verbatim.
	/// let echo = port.send("V", true, None)?;
	/// // Wait up to a minute for the queued program to finish.
	/// port.send(Command::Run, false, Some(Duration::from_secs(60)))?;
	/// # Ok(())
	/// # }
	/// ```
	pub fn send<T: Into<Command>>(
		&mut self,
		command: T,
		capture: bool,
		ready_timeout: Option<Duration>,
	) -> Result<String, Error> {
		let command = command.into();
		self.backend.clear_input()?;
		log::debug!("{} TX:   {}", self.log_name(), command);
		self.backend.write_all(&command.to_bytes())?;
		self.backend.flush()?;

		let mut received = Vec::new();
		if capture {
			self.clock.sleep(self.grace_period);
			if self.backend.read_available(&mut received)? > 0 {
				log::debug!(
					"{} RECV: {}",
					self.log_name(),
					String::from_utf8_lossy(&received).trim_end()
				);
			}
		}
		match ready_timeout {
			Some(timeout) => {
				self.detector
					.wait(&mut self.backend, &self.clock, timeout, received)
			}
			None => Ok(decode(&received).trim().to_string()),
		}
	}

	/// Transmit a command without reading anything back.
	pub fn command<T: Into<Command>>(&mut self, command: T) -> Result<(), Error> {
		self.send(command, false, None).map(drop)
	}

	/// Transmit a command and return its immediate reply, if any.
	pub fn command_reply<T: Into<Command>>(&mut self, command: T) -> Result<String, Error> {
		self.send(command, true, None)
	}

	/// Wait until the controller is ready, without sending anything.
	///
	/// This is useful after sending a command without waiting, for instance
	/// with [`run(None)`](Port::run).
	pub fn wait_ready(&mut self, timeout: Duration) -> Result<String, Error> {
		self.detector
			.wait(&mut self.backend, &self.clock, timeout, Vec::new())
	}

	/// Send a command that only waits for the controller when a timeout is given.
	fn send_maybe_blocking(
		&mut self,
		command: Command,
		timeout: Option<Duration>,
	) -> Result<String, Error> {
		self.send(command, false, timeout)
	}

	/// Set a motor's speed, in steps per second, returning the immediate reply.
	pub fn set_speed<M>(&mut self, motor: M, speed: u32) -> Result<String, Error>
	where
		M: TryInto<Motor>,
		Error: From<M::Error>,
	{
		let motor = motor.try_into()?;
		self.command_reply(Command::SetSpeed { motor, speed })
	}

	/// Set a motor's speed at full power, returning the immediate reply.
	pub fn set_speed_full_power<M>(&mut self, motor: M, speed: u32) -> Result<String, Error>
	where
		M: TryInto<Motor>,
		Error: From<M::Error>,
	{
		let motor = motor.try_into()?;
		self.command_reply(Command::SetSpeedFullPower { motor, speed })
	}

	/// Set a motor's acceleration, returning the immediate reply.
	pub fn set_acceleration<M>(&mut self, motor: M, acceleration: u32) -> Result<String, Error>
	where
		M: TryInto<Motor>,
		Error: From<M::Error>,
	{
		let motor = motor.try_into()?;
		self.command_reply(Command::SetAcceleration {
			motor,
			acceleration,
		})
	}

	/// Queue a move, returning the immediate reply.
	///
	/// The controller reads a zero-step move as a seek to the positive limit,
	/// so a move of zero steps is not sent and an empty reply is returned.
	fn queue_move(&mut self, motor: Motor, distance: Distance) -> Result<String, Error> {
		if distance == Distance::Steps(0) {
			log::debug!("{} motor {} zero-step move skipped", self.log_name(), motor);
			return Ok(String::new());
		}
		self.command_reply(Command::Move { motor, distance })
	}

	/// Query a motor's position and return the reply as is.
	fn query_position(&mut self, motor: Motor, timeout: Duration) -> Result<String, Error> {
		self.send(Command::QueryPosition(motor), false, Some(timeout))
	}

	/// Queue a relative move of a signed number of steps, returning the
	/// immediate reply.
	///
	/// The move does not start until [`run`](Port::run) is called. A move of
	/// zero steps is not sent, since the controller would read it as a seek
	/// to the positive limit.
	pub fn move_relative<M>(&mut self, motor: M, steps: i32) -> Result<String, Error>
	where
		M: TryInto<Motor>,
		Error: From<M::Error>,
	{
		let motor = motor.try_into()?;
		self.queue_move(motor, Distance::Steps(steps))
	}

	/// Queue a move until the limit switch in `direction` is hit, returning
	/// the immediate reply.
	pub fn move_to_limit<M>(&mut self, motor: M, direction: Direction) -> Result<String, Error>
	where
		M: TryInto<Motor>,
		Error: From<M::Error>,
	{
		let motor = motor.try_into()?;
		self.queue_move(motor, Distance::ToLimit(direction))
	}

	/// Queue a relative move of a physical distance, converted with the
	/// [scale](Port::set_scale).
	///
	/// Fails with a [`NotConfiguredError`](crate::error::NotConfiguredError),
	/// before anything is sent, if the scale has not been set, and with an
	/// [`InvalidDistanceError`](crate::error::InvalidDistanceError) if the
	/// distance is not finite. A distance that rounds to zero steps is not
	/// sent.
	pub fn move_units<M>(&mut self, motor: M, units: f64) -> Result<String, Error>
	where
		M: TryInto<Motor>,
		Error: From<M::Error>,
	{
		let motor = motor.try_into()?;
		let steps = self.scale.to_steps(units)?;
		self.queue_move(motor, Distance::Steps(steps))
	}

	/// Set the motor's absolute position reference, returning the immediate reply.
	pub fn set_absolute<M>(&mut self, motor: M, position: i32) -> Result<String, Error>
	where
		M: TryInto<Motor>,
		Error: From<M::Error>,
	{
		let motor = motor.try_into()?;
		self.command_reply(Command::SetAbsolute { motor, position })
	}

	/// Declare the motor's current location to be absolute zero and wait for
	/// the controller to be ready.
	pub fn zero<M>(&mut self, motor: M, timeout: Duration) -> Result<String, Error>
	where
		M: TryInto<Motor>,
		Error: From<M::Error>,
	{
		let motor = motor.try_into()?;
		self.send(Command::Zero(motor), false, Some(timeout))
	}

	/// Execute the queued moves (`R`).
	///
	/// With a timeout, wait until the controller is ready and return what it
	/// sent. Without one, return immediately.
	pub fn run(&mut self, timeout: Option<Duration>) -> Result<String, Error> {
		self.send_maybe_blocking(Command::Run, timeout)
	}

	/// Decelerate to a stop (`D`).
	///
	/// With a timeout, wait until the controller is ready.
	pub fn stop(&mut self, timeout: Option<Duration>) -> Result<String, Error> {
		self.send_maybe_blocking(Command::Decelerate, timeout)
	}

	/// Stop immediately (`K`).
	///
	/// With a timeout, wait until the controller is ready.
	pub fn kill(&mut self, timeout: Option<Duration>) -> Result<String, Error> {
		self.send_maybe_blocking(Command::Kill, timeout)
	}

	/// Clear the queued program (`C`).
	///
	/// With a timeout, wait until the controller is ready.
	pub fn clear(&mut self, timeout: Option<Duration>) -> Result<String, Error> {
		self.send_maybe_blocking(Command::Clear, timeout)
	}

	/// List the queued program (`lst`).
	pub fn list_program(&mut self, timeout: Duration) -> Result<String, Error> {
		self.send(Command::ListProgram, false, Some(timeout))
	}

	/// Query a motor's position and return the reply as is.
	///
	/// The motor is validated before anything is sent.
	pub fn position_raw<M>(&mut self, motor: M, timeout: Duration) -> Result<String, Error>
	where
		M: TryInto<Motor>,
		Error: From<M::Error>,
	{
		let motor = motor.try_into()?;
		self.query_position(motor, timeout)
	}

	/// Query a motor's position.
	///
	/// The first signed integer in the reply is returned. If the reply has
	/// none, `Ok(None)` is returned.
	pub fn try_position<M>(&mut self, motor: M, timeout: Duration) -> Result<Option<i64>, Error>
	where
		M: TryInto<Motor>,
		Error: From<M::Error>,
	{
		let motor = motor.try_into()?;
		let reply = self.query_position(motor, timeout)?;
		Ok(parse_first_integer(&reply))
	}

	/// Query a motor's position.
	///
	/// The first signed integer in the reply is returned. If the reply has
	/// none, a [`NoValueError`] is returned. Values beyond the range of an
	/// `i64` saturate.
	///
	/// ## Example
	///
	/// ```rust
	/// # use vxm::{Port, backend::Backend};
	/// # use std::time::Duration;
	/// # fn wrapper<B: Backend>(mut port: Port<B>) -> Result<(), vxm::Error> {
	/// // The controller replies "+0000400" for motor 1.
	/// let position = port.position(1, Duration::from_secs(1))?;
	/// assert_eq!(position, 400);
	/// # Ok(())
	/// # }
	/// ```
	pub fn position<M>(&mut self, motor: M, timeout: Duration) -> Result<i64, Error>
	where
		M: TryInto<Motor>,
		Error: From<M::Error>,
	{
		let motor = motor.try_into()?;
		let reply = self.query_position(motor, timeout)?;
		parse_first_integer(&reply).ok_or_else(|| NoValueError::new(reply).into())
	}

	/// Check whether a motor is moving by reading its position twice,
	/// `interval` apart.
	///
	/// A reply without a value counts as position 0. Each read may take up to
	/// the [query timeout](Port::query_timeout).
	pub fn try_is_busy<M>(&mut self, motor: M, interval: Duration) -> Result<bool, Error>
	where
		M: TryInto<Motor>,
		Error: From<M::Error>,
	{
		let motor = motor.try_into()?;
		let timeout = self.query_timeout;
		let first = parse_first_integer(&self.query_position(motor, timeout)?).unwrap_or(0);
		self.clock.sleep(interval);
		let second = parse_first_integer(&self.query_position(motor, timeout)?).unwrap_or(0);
		log::trace!(
			"{} motor {} positions {} and {}",
			self.log_name(),
			motor,
			first,
			second
		);
		Ok(first != second)
	}

	/// Check whether a motor is moving by reading its position twice,
	/// `interval` apart.
	///
	/// This is a heuristic: any failure, including an invalid motor, is logged
	/// and reported as not busy. Use [`try_is_busy`](Port::try_is_busy) to see
	/// the error.
	pub fn is_busy<M>(&mut self, motor: M, interval: Duration) -> bool
	where
		M: TryInto<Motor>,
		Error: From<M::Error>,
	{
		self.try_is_busy(motor, interval)
			.best_effort(false, "busy check")
	}

	/// Home a motor: seek the limit switch in `direction`, back off it by
	/// `backoff` steps, and set the position there to zero.
	///
	/// Every wait is bounded by `timeout`. The first failure aborts the
	/// sequence. See [`Home`] for more control.
	pub fn home<M>(
		&mut self,
		motor: M,
		direction: Direction,
		speed: u32,
		backoff: i32,
		timeout: Duration,
	) -> Result<(), Error>
	where
		M: TryInto<Motor>,
		Error: From<M::Error>,
	{
		let motor = motor.try_into()?;
		self.execute(
			Home::new(motor)
				.direction(direction)
				.speed(speed)
				.backoff(backoff)
				.timeout(timeout),
		)
	}

	/// Run the `routine` with exclusive use of this port, returning the result.
	pub fn execute<R: Routine<Self>>(&mut self, mut routine: R) -> Result<R::Output, R::Error> {
		routine.run(self)
	}

	/// Set the scale, in steps per unit, used by [`move_units`](Port::move_units).
	///
	/// The previous value, if any, is returned.
	pub fn set_scale(&mut self, steps_per_unit: f64) -> Option<f64> {
		self.scale.set(steps_per_unit)
	}

	/// Get the scale, in steps per unit, if it has been set.
	pub fn scale(&self) -> Option<f64> {
		self.scale.get()
	}

	/// Convert a physical distance into steps using the scale.
	pub fn to_steps(&self, units: f64) -> Result<i32, Error> {
		self.scale.to_steps(units)
	}

	/// Set the configuration used to detect when the controller is ready.
	///
	/// It takes effect on the next wait. The previous value is returned.
	pub fn set_ready_config(&mut self, config: ReadyConfig) -> ReadyConfig {
		std::mem::replace(&mut self.detector.config, config)
	}

	/// Get the configuration used to detect when the controller is ready.
	pub fn ready_config(&self) -> ReadyConfig {
		self.detector.config
	}

	/// Set how the port detects that the controller is ready.
	///
	/// The previous value is returned.
	pub fn set_ready_mode(&mut self, mode: ReadyMode) -> ReadyMode {
		std::mem::replace(&mut self.detector.config.mode, mode)
	}

	/// Get how the port detects that the controller is ready.
	pub fn ready_mode(&self) -> ReadyMode {
		self.detector.config.mode
	}

	/// Set the ready character.
	///
	/// The previous value is returned.
	pub fn set_sentinel(&mut self, sentinel: char) -> char {
		std::mem::replace(&mut self.detector.config.sentinel, sentinel)
	}

	/// Get the ready character.
	pub fn sentinel(&self) -> char {
		self.detector.config.sentinel
	}

	/// Set how long the controller must be silent to be considered ready.
	///
	/// The previous value is returned.
	pub fn set_quiet_window(&mut self, window: Duration) -> Duration {
		std::mem::replace(&mut self.detector.config.quiet_window, window)
	}

	/// Get how long the controller must be silent to be considered ready.
	pub fn quiet_window(&self) -> Duration {
		self.detector.config.quiet_window
	}

	/// Set how long to wait for an immediate reply.
	///
	/// The previous value is returned.
	pub fn set_grace_period(&mut self, period: Duration) -> Duration {
		std::mem::replace(&mut self.grace_period, period)
	}

	/// Get how long to wait for an immediate reply.
	pub fn grace_period(&self) -> Duration {
		self.grace_period
	}

	/// Set how long to sleep between polls while waiting for the controller.
	///
	/// The previous value is returned.
	pub fn set_poll_interval(&mut self, interval: Duration) -> Duration {
		std::mem::replace(&mut self.detector.poll_interval, interval)
	}

	/// Get how long to sleep between polls while waiting for the controller.
	pub fn poll_interval(&self) -> Duration {
		self.detector.poll_interval
	}

	/// Set how long each position read of a busy check may take.
	///
	/// The previous value is returned.
	pub fn set_query_timeout(&mut self, timeout: Duration) -> Duration {
		std::mem::replace(&mut self.query_timeout, timeout)
	}

	/// Get how long each position read of a busy check may take.
	pub fn query_timeout(&self) -> Duration {
		self.query_timeout
	}

	/// Set the backend's read timeout and return the old timeout.
	///
	/// If timeout is `None`, reads will block indefinitely.
	pub fn set_read_timeout(
		&mut self,
		timeout: Option<Duration>,
	) -> Result<Option<Duration>, io::Error> {
		let old = self.backend.read_timeout()?;
		self.backend.set_read_timeout(timeout)?;
		Ok(old)
	}

	/// Get the backend's read timeout.
	///
	/// If it is `None`, reads will block indefinitely.
	pub fn read_timeout(&self) -> Result<Option<Duration>, io::Error> {
		self.backend.read_timeout()
	}

	/// Get the "name" of the port's backend.
	///
	/// This is often the path passed to [`Port::open_serial`].
	pub fn name(&self) -> Option<String> {
		self.backend.name()
	}

	/// Get a reference to the backend.
	pub fn backend(&self) -> &B {
		&self.backend
	}

	/// Get a mutable reference to the backend.
	pub fn backend_mut(&mut self) -> &mut B {
		&mut self.backend
	}

	/// Get a reference to the clock.
	pub fn clock(&self) -> &C {
		&self.clock
	}

	/// Consume the port and return the underlying backend.
	///
	/// Any unread input stays in the backend.
	pub fn into_backend(self) -> B {
		self.backend
	}
}

impl<B: Backend> Port<B> {
	/// Create a `Port` for a controller connected through any [`Backend`],
	/// using the default options.
	///
	/// Like the other constructors, this sends the on-line command.
	pub fn from_backend(backend: B) -> Self {
		OpenSerialOptions::new().open_backend(backend)
	}
}

/// Find the first signed integer in `text`.
///
/// The integer is the first run of ASCII digits, including a `+` or `-`
/// immediately before it. Values beyond the range of an `i64` saturate.
fn parse_first_integer(text: &str) -> Option<i64> {
	let bytes = text.as_bytes();
	let start = bytes.iter().position(u8::is_ascii_digit)?;
	let end = bytes[start..]
		.iter()
		.position(|b| !b.is_ascii_digit())
		.map_or(bytes.len(), |len| start + len);
	let start = match start.checked_sub(1).map(|i| bytes[i]) {
		Some(b'+' | b'-') => start - 1,
		_ => start,
	};
	let digits = &text[start..end];
	let saturated = if digits.starts_with('-') {
		i64::MIN
	} else {
		i64::MAX
	};
	Some(digits.parse().unwrap_or(saturated))
}
