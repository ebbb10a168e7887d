//! Detecting when the controller has finished executing a command.
//!
//! The VXM has no acknowledgement protocol. Depending on the firmware mode it
//! either prints a ready character (`^` by default) once it is idle again, or
//! simply stops sending anything. The two [`ReadyMode`]s mirror those
//! behaviours:
//!
//! * [`ReadyMode::Sentinel`]: wait until the ready character is received. The
//!   text received before the last ready character is returned.
//! * [`ReadyMode::Quiet`]: wait until nothing has been received for the quiet
//!   window. All of the text received is returned, which may be empty.
//!
//! In both modes the wait is bounded by a timeout measured from when the wait
//! started. If it elapses, a [`TimeoutError`] is returned and any text received
//! so far is discarded.

use crate::{
	backend::{Backend, UNKNOWN_BACKEND_NAME},
	clock::Clock,
	error::{Error, ParseReadyModeError, TimeoutError},
};
use std::{fmt, str::FromStr, time::Duration};

/// How to tell that the controller is ready for the next command.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ReadyMode {
	/// Wait for the ready character.
	#[default]
	Sentinel,
	/// Wait for a period with no incoming data.
	Quiet,
}

impl FromStr for ReadyMode {
	type Err = ParseReadyModeError;

	/// Parse `char`/`sentinel` or `silence`/`quiet`, ignoring case.
	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.trim().to_ascii_lowercase().as_str() {
			"char" | "sentinel" => Ok(ReadyMode::Sentinel),
			"silence" | "quiet" => Ok(ReadyMode::Quiet),
			_ => Err(ParseReadyModeError::new(s)),
		}
	}
}

impl fmt::Display for ReadyMode {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(match self {
			ReadyMode::Sentinel => "char",
			ReadyMode::Quiet => "silence",
		})
	}
}

/// The configuration used to detect when the controller is ready.
///
/// It is read at the start of every wait, so changes only affect later waits.
///
/// ```
/// # use vxm::ready::{ReadyConfig, ReadyMode};
/// # use std::time::Duration;
/// let config = ReadyConfig::default();
/// assert_eq!(config.mode, ReadyMode::Sentinel);
/// assert_eq!(config.sentinel, '^');
/// assert_eq!(config.quiet_window, Duration::from_millis(150));
/// ```
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct ReadyConfig {
	/// The strategy to use.
	pub mode: ReadyMode,
	/// The character the controller prints when it is ready.
	///
	/// Only used in [`ReadyMode::Sentinel`].
	pub sentinel: char,
	/// How long the controller must be silent to be considered ready.
	///
	/// Only used in [`ReadyMode::Quiet`].
	pub quiet_window: Duration,
}

impl ReadyConfig {
	/// The default ready character.
	pub const DEFAULT_SENTINEL: char = '^';
	/// The default quiet window.
	pub const DEFAULT_QUIET_WINDOW: Duration = Duration::from_millis(150);

	/// The default configuration: wait for `^`.
	pub const fn new() -> Self {
		ReadyConfig {
			mode: ReadyMode::Sentinel,
			sentinel: ReadyConfig::DEFAULT_SENTINEL,
			quiet_window: ReadyConfig::DEFAULT_QUIET_WINDOW,
		}
	}
}

impl Default for ReadyConfig {
	fn default() -> Self {
		ReadyConfig::new()
	}
}

/// Decode received bytes, dropping anything that isn't valid UTF-8.
pub(crate) fn decode(bytes: &[u8]) -> String {
	let mut text = String::with_capacity(bytes.len());
	for chunk in bytes.utf8_chunks() {
		text.push_str(chunk.valid());
	}
	text
}

/// Waits for the controller to become ready, according to a [`ReadyConfig`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) struct ReadyDetector {
	/// The current configuration.
	pub config: ReadyConfig,
	/// How long to sleep when no data is available.
	pub poll_interval: Duration,
}

impl ReadyDetector {
	/// The default time between polls of the backend.
	pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(10);

	/// Wait for the controller to become ready.
	///
	/// `received` holds any bytes the caller already read for the current
	/// command; they are treated as if they were read by this wait.
	pub fn wait<B, C>(
		&self,
		backend: &mut B,
		clock: &C,
		timeout: Duration,
		received: Vec<u8>,
	) -> Result<String, Error>
	where
		B: Backend + ?Sized,
		C: Clock + ?Sized,
	{
		let name = backend_name(backend);
		let mut wait = Wait {
			backend,
			clock,
			name,
			start: clock.now(),
			timeout,
			poll_interval: self.poll_interval,
			buf: received,
		};
		let result = match self.config.mode {
			ReadyMode::Sentinel => wait.until_sentinel(self.config.sentinel),
			ReadyMode::Quiet => wait.until_quiet(self.config.quiet_window),
		};
		match &result {
			Ok(text) => log::trace!(
				"{} ready after {:?}: {:?}",
				wait.name,
				clock.elapsed_since(wait.start),
				text
			),
			Err(e) => log::debug!("{} {}", wait.name, e),
		}
		result
	}
}

/// Get the name to use for the backend in log messages.
fn backend_name<B: Backend + ?Sized>(backend: &B) -> String {
	backend
		.name()
		.unwrap_or_else(|| UNKNOWN_BACKEND_NAME.to_string())
}

/// The state of a single wait.
struct Wait<'a, B: ?Sized, C: ?Sized> {
	backend: &'a mut B,
	clock: &'a C,
	/// The backend's name, for logging.
	name: String,
	/// When the wait started.
	start: std::time::Instant,
	timeout: Duration,
	poll_interval: Duration,
	/// Everything received so far.
	buf: Vec<u8>,
}

impl<B, C> Wait<'_, B, C>
where
	B: Backend + ?Sized,
	C: Clock + ?Sized,
{
	/// The time left before the deadline, or `None` if it has passed.
	fn remaining(&self) -> Option<Duration> {
		let elapsed = self.clock.elapsed_since(self.start);
		if elapsed >= self.timeout {
			None
		} else {
			Some(self.timeout - elapsed)
		}
	}

	/// Read any available bytes, returning how many were read.
	fn poll(&mut self) -> Result<usize, Error> {
		let start = self.buf.len();
		let n = self.backend.read_available(&mut self.buf)?;
		if n > 0 {
			log::debug!(
				"{} RECV: {}",
				self.name,
				String::from_utf8_lossy(&self.buf[start..]).trim_end()
			);
		}
		Ok(n)
	}

	/// Sleep for the poll interval, without sleeping past the deadline.
	fn sleep(&self, remaining: Duration) {
		self.clock.sleep(self.poll_interval.min(remaining));
	}

	fn timeout_error(&self, mode: ReadyMode) -> Error {
		TimeoutError::new(self.timeout, mode).into()
	}

	fn until_sentinel(&mut self, sentinel: char) -> Result<String, Error> {
		let mut check = !self.buf.is_empty();
		loop {
			if check {
				let text = decode(&self.buf);
				if let Some(index) = text.rfind(sentinel) {
					return Ok(text[..index].trim().to_string());
				}
			}
			let Some(remaining) = self.remaining() else {
				return Err(self.timeout_error(ReadyMode::Sentinel));
			};
			check = self.poll()? > 0;
			if !check {
				self.sleep(remaining);
			}
		}
	}

	fn until_quiet(&mut self, quiet_window: Duration) -> Result<String, Error> {
		let mut last_received = self.start;
		loop {
			let Some(remaining) = self.remaining() else {
				return Err(self.timeout_error(ReadyMode::Quiet));
			};
			if self.poll()? > 0 {
				last_received = self.clock.now();
			} else if self.clock.elapsed_since(last_received) >= quiet_window {
				return Ok(decode(&self.buf).trim().to_string());
			} else {
				self.sleep(remaining);
			}
		}
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::{backend::Mock, clock::MockClock};

	const TIMEOUT: Duration = Duration::from_secs(1);

	fn detector(mode: ReadyMode) -> ReadyDetector {
		ReadyDetector {
			config: ReadyConfig {
				mode,
				..ReadyConfig::default()
			},
			poll_interval: ReadyDetector::DEFAULT_POLL_INTERVAL,
		}
	}

	fn mock() -> (Mock, MockClock) {
		let clock = MockClock::new();
		(Mock::new(clock.clone()), clock)
	}

	#[test]
	fn sentinel_returns_text_before_the_sentinel() {
		let (mut backend, clock) = mock();
		backend.append_data_after(Duration::from_millis(40), b"123^");
		let text = detector(ReadyMode::Sentinel)
			.wait(&mut backend, &clock, TIMEOUT, Vec::new())
			.unwrap();
		assert_eq!(text, "123");
		assert!(clock.elapsed() < TIMEOUT);
		assert!(backend.is_empty());

		// Nothing is left over for the next wait.
		let err = detector(ReadyMode::Sentinel)
			.wait(&mut backend, &clock, TIMEOUT, Vec::new())
			.unwrap_err();
		assert!(err.is_timeout());
	}

	#[test]
	fn sentinel_uses_the_last_occurrence() {
		let (mut backend, clock) = mock();
		backend.append_data(b" a^b^ trailing");
		let text = detector(ReadyMode::Sentinel)
			.wait(&mut backend, &clock, TIMEOUT, Vec::new())
			.unwrap();
		assert_eq!(text, "a^b");
	}

	#[test]
	fn sentinel_across_multiple_chunks() {
		let (mut backend, clock) = mock();
		backend.append_data(b"12");
		backend.append_data_after(Duration::from_millis(100), b"34\r\n");
		backend.append_data_after(Duration::from_millis(200), b"^");
		let text = detector(ReadyMode::Sentinel)
			.wait(&mut backend, &clock, TIMEOUT, Vec::new())
			.unwrap();
		assert_eq!(text, "1234");
		assert!(clock.elapsed() >= Duration::from_millis(200));
	}

	#[test]
	fn sentinel_in_previously_received_bytes() {
		let (mut backend, clock) = mock();
		let text = detector(ReadyMode::Sentinel)
			.wait(&mut backend, &clock, TIMEOUT, b"ok^".to_vec())
			.unwrap();
		assert_eq!(text, "ok");
		assert_eq!(clock.elapsed(), Duration::ZERO);
	}

	#[test]
	fn custom_sentinel() {
		let (mut backend, clock) = mock();
		backend.append_data(b"done^>");
		let mut detector = detector(ReadyMode::Sentinel);
		detector.config.sentinel = '>';
		let text = detector
			.wait(&mut backend, &clock, TIMEOUT, Vec::new())
			.unwrap();
		assert_eq!(text, "done^");
	}

	#[test]
	fn sentinel_times_out_at_the_deadline() {
		let (mut backend, clock) = mock();
		backend.append_data(b"no ready character");
		let err = detector(ReadyMode::Sentinel)
			.wait(&mut backend, &clock, TIMEOUT, Vec::new())
			.unwrap_err();
		let err = TimeoutError::try_from(err).unwrap();
		assert_eq!(err.timeout(), TIMEOUT);
		assert_eq!(err.mode(), ReadyMode::Sentinel);
		assert!(clock.elapsed() >= TIMEOUT);
		assert!(clock.elapsed() < TIMEOUT + ReadyDetector::DEFAULT_POLL_INTERVAL);
	}

	#[test]
	fn sentinel_arriving_after_the_deadline_is_too_late() {
		let (mut backend, clock) = mock();
		backend.append_data_after(TIMEOUT + Duration::from_millis(1), b"^");
		let err = detector(ReadyMode::Sentinel)
			.wait(&mut backend, &clock, TIMEOUT, Vec::new())
			.unwrap_err();
		assert!(err.is_timeout());
	}

	#[test]
	fn quiet_returns_after_the_quiet_window() {
		let (mut backend, clock) = mock();
		backend.append_data_after(Duration::from_millis(50), b"ab");
		let text = detector(ReadyMode::Quiet)
			.wait(&mut backend, &clock, TIMEOUT, Vec::new())
			.unwrap();
		assert_eq!(text, "ab");
		assert!(clock.elapsed() >= Duration::from_millis(200));
		assert!(clock.elapsed() < TIMEOUT);
	}

	#[test]
	fn quiet_with_no_data_returns_empty() {
		let (mut backend, clock) = mock();
		let text = detector(ReadyMode::Quiet)
			.wait(&mut backend, &clock, TIMEOUT, Vec::new())
			.unwrap();
		assert_eq!(text, "");
		assert!(clock.elapsed() >= ReadyConfig::DEFAULT_QUIET_WINDOW);
	}

	#[test]
	fn quiet_times_out_on_continuous_data() {
		let (mut backend, clock) = mock();
		for i in 0..40 {
			backend.append_data_after(Duration::from_millis(i * 50), b".");
		}
		let err = detector(ReadyMode::Quiet)
			.wait(&mut backend, &clock, TIMEOUT, Vec::new())
			.unwrap_err();
		let err = TimeoutError::try_from(err).unwrap();
		assert_eq!(err.mode(), ReadyMode::Quiet);
		assert!(clock.elapsed() >= TIMEOUT);
	}

	#[test]
	fn read_errors_are_propagated() {
		let (mut backend, clock) = mock();
		backend.read_error(Some(std::io::Error::new(
			std::io::ErrorKind::BrokenPipe,
			"unplugged",
		)));
		let err = detector(ReadyMode::Quiet)
			.wait(&mut backend, &clock, TIMEOUT, Vec::new())
			.unwrap_err();
		assert!(err.is_io());
	}

	#[test]
	fn decode_drops_invalid_bytes() {
		assert_eq!(decode(b"12\xff3"), "123");
		assert_eq!(decode("µ^".as_bytes()), "µ^");
		// An incomplete character is dropped until the rest arrives.
		assert_eq!(decode(&"µ".as_bytes()[..1]), "");
	}

	#[test]
	fn parse_ready_mode() {
		assert_eq!("char".parse::<ReadyMode>().unwrap(), ReadyMode::Sentinel);
		assert_eq!("Silence".parse::<ReadyMode>().unwrap(), ReadyMode::Quiet);
		assert!("loud".parse::<ReadyMode>().is_err());
		assert_eq!(ReadyMode::Quiet.to_string(), "silence");
	}
}
