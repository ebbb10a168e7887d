//! Types that can exchange (read/write) bytes with a connected controller.
//!
//! The [`Backend`] trait represents all such types.

use std::io;
use std::time::Duration;

use crate::error::BestEffort as _;
use serialport as sp;

#[cfg(windows)]
use sp::COMPort as ExternSerial;
use sp::SerialPort;
#[cfg(unix)]
use sp::TTYPort as ExternSerial;

/// The placeholder name for a backend that doesn't have a name.
pub(crate) const UNKNOWN_BACKEND_NAME: &str = "<unknown backend>";

/// Types that allow reading and writing bytes with a connected controller.
pub trait Backend: io::Read + io::Write {
	/// Set the read timeout.
	///
	/// If timeout is `None`, reads will block indefinitely.
	fn set_read_timeout(&mut self, timeout: Option<Duration>) -> Result<(), io::Error>;

	/// Get the read timeout.
	///
	/// If timeout is `None`, reads will block indefinitely.
	fn read_timeout(&self) -> Result<Option<Duration>, io::Error>;

	/// The number of received bytes that can be read without blocking.
	fn bytes_to_read(&mut self) -> Result<usize, io::Error>;

	/// Discard all received bytes that have not been read yet.
	fn clear_input(&mut self) -> Result<(), io::Error>;

	/// Get the "name" of the backend.
	///
	/// This can be in any format, but should uniquely identify the backend
	/// instance.
	fn name(&self) -> Option<String>;

	/// Append whatever bytes are currently available to `buf` without
	/// blocking for more.
	///
	/// Returns the number of bytes appended, which is 0 if nothing was waiting.
	fn read_available(&mut self, buf: &mut Vec<u8>) -> Result<usize, io::Error> {
		let available = self.bytes_to_read()?;
		if available == 0 {
			return Ok(0);
		}
		let start = buf.len();
		buf.resize(start + available, 0);
		match self.read(&mut buf[start..]) {
			Ok(n) => {
				buf.truncate(start + n);
				Ok(n)
			}
			// The data may have been discarded between the two calls.
			Err(e) if e.kind() == io::ErrorKind::TimedOut => {
				buf.truncate(start);
				Ok(0)
			}
			Err(e) => {
				buf.truncate(start);
				Err(e)
			}
		}
	}
}

impl<C: Backend + ?Sized> Backend for Box<C> {
	fn set_read_timeout(&mut self, timeout: Option<Duration>) -> Result<(), io::Error> {
		(**self).set_read_timeout(timeout)
	}
	fn read_timeout(&self) -> Result<Option<Duration>, io::Error> {
		(**self).read_timeout()
	}
	fn bytes_to_read(&mut self) -> Result<usize, io::Error> {
		(**self).bytes_to_read()
	}
	fn clear_input(&mut self) -> Result<(), io::Error> {
		(**self).clear_input()
	}
	fn name(&self) -> Option<String> {
		(**self).name()
	}
}

impl<C: Backend + ?Sized> Backend for &mut C {
	fn set_read_timeout(&mut self, timeout: Option<Duration>) -> Result<(), io::Error> {
		(**self).set_read_timeout(timeout)
	}
	fn read_timeout(&self) -> Result<Option<Duration>, io::Error> {
		(**self).read_timeout()
	}
	fn bytes_to_read(&mut self) -> Result<usize, io::Error> {
		(**self).bytes_to_read()
	}
	fn clear_input(&mut self) -> Result<(), io::Error> {
		(**self).clear_input()
	}
	fn name(&self) -> Option<String> {
		(**self).name()
	}
}

/// A platform agnostic serial port backend.
//
// The `serialport` crate exposes two platform specific serial ports, `COMPort`
// and `TTYPort` for windows and unix, respectively. Wrapping whichever one is
// chosen at compile time lets consumers use `Serial` everywhere without
// dynamic dispatch or an extra type parameter.
#[derive(Debug)]
pub struct Serial(pub(crate) ExternSerial);

impl io::Read for Serial {
	fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
		self.0.read(buf)
	}
}

impl io::Write for Serial {
	fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
		self.0.write(buf)
	}

	fn flush(&mut self) -> io::Result<()> {
		self.0.flush()
	}
}

impl Backend for Serial {
	fn set_read_timeout(&mut self, timeout: Option<Duration>) -> Result<(), io::Error> {
		// The serialport API does not support infinite timeouts, so simply set
		// the timeout to the largest possible duration if `timeout` is `None`,
		// which is practically infinite.
		Ok(self.0.set_timeout(timeout.unwrap_or(Duration::MAX))?)
	}
	fn read_timeout(&self) -> Result<Option<Duration>, io::Error> {
		Ok(Some(self.0.timeout()))
	}
	fn bytes_to_read(&mut self) -> Result<usize, io::Error> {
		let n = self.0.bytes_to_read()?;
		Ok(usize::try_from(n).unwrap_or(usize::MAX))
	}
	fn clear_input(&mut self) -> Result<(), io::Error> {
		Ok(self.0.clear(sp::ClearBuffer::Input)?)
	}
	fn name(&self) -> Option<String> {
		self.0.name()
	}
}

/// The names of the serial ports on this system, such as `/dev/ttyUSB0` or
/// `COM3`.
///
/// If the ports cannot be enumerated, the failure is logged and the list is
/// empty.
pub fn list_serial_ports() -> Vec<String> {
	sp::available_ports()
		.map(|ports| ports.into_iter().map(|port| port.port_name).collect())
		.best_effort(Vec::new(), "listing serial ports")
}

#[cfg(any(test, feature = "mock"))]
pub use mock::*;

#[cfg(any(test, feature = "mock"))]
mod mock {
	use super::Backend;
	use crate::clock::MockClock;
	use std::{collections::VecDeque, io, time::Duration};

	/// What the [`Mock`] does when a matching command is written.
	#[derive(Debug)]
	enum Action {
		/// Make chunks of data available at the given offsets after the write.
		Data(Vec<(Duration, Vec<u8>)>),
		/// Fail the next read with the given kind of error.
		ReadError(io::ErrorKind),
	}

	/// A mock backend for use in testing.
	///
	/// It has the following features:
	///   * It records all commands written to it.
	///   * Data can be scheduled for reading at points in (virtual) time, using
	///     a [`MockClock`] shared with the port.
	///   * Replies can be scripted so they are scheduled when a specific
	///     command is written. Replies for the same command are used in the
	///     order they were added, and a command without a remaining reply is
	///     met with silence.
	///   * Specific errors can be inserted for calls to `read`, `write`, and
	///     `clear_input`.
	#[cfg_attr(all(doc, feature = "doc_cfg"), doc(cfg(feature = "mock")))]
	#[derive(Debug)]
	pub struct Mock {
		/// The shared virtual clock.
		clock: MockClock,
		/// Data waiting to be read, ordered by the virtual time it arrives.
		incoming: VecDeque<(Duration, Vec<u8>)>,
		/// Scripted reactions to written commands.
		replies: Vec<(Vec<u8>, Action)>,
		/// Every byte written, in order.
		written: Vec<u8>,
		/// The bytes of a command that has not been terminated yet.
		partial_command: Vec<u8>,
		/// The error to surface on the next read, if any. It is only surfaced once.
		read_error: Option<io::Error>,
		/// The error to surface on the next write, if any. It is only surfaced once.
		write_error: Option<io::Error>,
		/// The error to surface on the next clear_input, if any. It is only surfaced once.
		clear_error: Option<io::Error>,
		/// The read timeout, which is ignored.
		ignored_read_timeout: Option<Duration>,
	}

	impl Mock {
		/// Create a new Mock backend that tells time with `clock`.
		pub fn new(clock: MockClock) -> Self {
			Mock {
				clock,
				incoming: VecDeque::new(),
				replies: Vec::new(),
				written: Vec::new(),
				partial_command: Vec::new(),
				read_error: None,
				write_error: None,
				clear_error: None,
				ignored_read_timeout: Some(Duration::ZERO),
			}
		}

		/// Make data available for reading immediately.
		///
		/// The data is not validated in any way.
		pub fn append_data<T: AsRef<[u8]>>(&mut self, bytes: T) {
			self.append_data_after(Duration::ZERO, bytes);
		}

		/// Make data available for reading once `delay` of virtual time has passed.
		pub fn append_data_after<T: AsRef<[u8]>>(&mut self, delay: Duration, bytes: T) {
			let due = self.clock.elapsed() + delay;
			self.schedule(due, bytes.as_ref().to_vec());
		}

		/// When `command` is next written, make `data` available immediately.
		///
		/// `command` excludes the terminating carriage return.
		pub fn reply<T: AsRef<[u8]>>(&mut self, command: &str, data: T) {
			self.reply_chunks(command, [(Duration::ZERO, data)]);
		}

		/// When `command` is next written, make each chunk of data available
		/// once its delay (measured from the write) has passed.
		pub fn reply_chunks<I, T>(&mut self, command: &str, chunks: I)
		where
			I: IntoIterator<Item = (Duration, T)>,
			T: AsRef<[u8]>,
		{
			let chunks = chunks
				.into_iter()
				.map(|(delay, data)| (delay, data.as_ref().to_vec()))
				.collect();
			self.replies
				.push((command.as_bytes().to_vec(), Action::Data(chunks)));
		}

		/// When `command` is next written, fail the following read with an
		/// error of the given kind.
		pub fn reply_read_error(&mut self, command: &str, kind: io::ErrorKind) {
			self.replies
				.push((command.as_bytes().to_vec(), Action::ReadError(kind)));
		}

		/// Every command written so far, without terminating carriage returns.
		pub fn written_commands(&self) -> Vec<String> {
			self.written
				.split(|&b| b == crate::command::CARRIAGE_RETURN)
				.filter(|command| !command.is_empty())
				.map(|command| String::from_utf8_lossy(command).into_owned())
				.collect()
		}

		/// Every byte written so far.
		pub fn written_bytes(&self) -> &[u8] {
			&self.written
		}

		/// Forget all written bytes.
		pub fn clear_written(&mut self) {
			self.written.clear();
		}

		/// Drop all incoming data and scripted replies.
		pub fn clear(&mut self) {
			self.incoming.clear();
			self.replies.clear();
		}

		/// Whether the mock has any data available right now or not.
		pub fn is_empty(&self) -> bool {
			self.available() == 0
		}

		/// Set the error for the next `read`, if any.
		pub fn read_error(&mut self, err: Option<io::Error>) {
			self.read_error = err;
		}

		/// Set the error for the next `write`, if any.
		pub fn write_error(&mut self, err: Option<io::Error>) {
			self.write_error = err;
		}

		/// Set the error for the next `clear_input`, if any.
		pub fn clear_error(&mut self, err: Option<io::Error>) {
			self.clear_error = err;
		}

		/// Insert data so that `incoming` stays ordered by arrival time.
		fn schedule(&mut self, due: Duration, data: Vec<u8>) {
			let index = self.incoming.partition_point(|(at, _)| *at <= due);
			self.incoming.insert(index, (due, data));
		}

		/// The number of bytes that have arrived by now.
		fn available(&self) -> usize {
			let now = self.clock.elapsed();
			self.incoming
				.iter()
				.take_while(|(due, _)| *due <= now)
				.map(|(_, data)| data.len())
				.sum()
		}

		/// Run the scripted reaction, if any, to a command that was just written.
		fn on_command(&mut self, command: &[u8]) {
			let Some(index) = self.replies.iter().position(|(c, _)| c == command) else {
				return;
			};
			let now = self.clock.elapsed();
			match self.replies.remove(index).1 {
				Action::Data(chunks) => {
					for (delay, data) in chunks {
						self.schedule(now + delay, data);
					}
				}
				Action::ReadError(kind) => {
					self.read_error = Some(io::Error::new(kind, "Simulated read error"));
				}
			}
		}
	}

	impl Backend for Mock {
		fn set_read_timeout(&mut self, timeout: Option<Duration>) -> Result<(), io::Error> {
			self.ignored_read_timeout = timeout;
			Ok(())
		}

		fn read_timeout(&self) -> Result<Option<Duration>, io::Error> {
			Ok(self.ignored_read_timeout)
		}

		fn bytes_to_read(&mut self) -> Result<usize, io::Error> {
			// Report a pending error as data so the next read surfaces it.
			if self.read_error.is_some() {
				return Ok(self.available().max(1));
			}
			Ok(self.available())
		}

		fn clear_input(&mut self) -> Result<(), io::Error> {
			if let Some(err) = self.clear_error.take() {
				return Err(err);
			}
			let now = self.clock.elapsed();
			while matches!(self.incoming.front(), Some((due, _)) if *due <= now) {
				self.incoming.pop_front();
			}
			Ok(())
		}

		fn name(&self) -> Option<String> {
			Some(format!("<mock 0x{:x}>", self as *const Mock as usize))
		}
	}

	impl io::Read for Mock {
		fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
			if let Some(err) = self.read_error.take() {
				return Err(err);
			}
			let now = self.clock.elapsed();
			let mut n = 0;
			while n < buf.len() {
				let Some((due, data)) = self.incoming.front_mut() else {
					break;
				};
				if *due > now {
					break;
				}
				let count = data.len().min(buf.len() - n);
				buf[n..n + count].copy_from_slice(&data[..count]);
				data.drain(..count);
				n += count;
				if data.is_empty() {
					self.incoming.pop_front();
				}
			}
			if n == 0 {
				// For a real device, having no data ready would result in a wait
				// and then eventual timeout error. However, as our data is in
				// memory that does not happen here. So simulate that behaviour by
				// returning a timeout error immediately.
				return Err(io::Error::new(
					io::ErrorKind::TimedOut,
					"Simulated timeout error",
				));
			}
			Ok(n)
		}
	}

	impl io::Write for Mock {
		fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
			if let Some(err) = self.write_error.take() {
				return Err(err);
			}
			self.written.extend_from_slice(buf);
			for &byte in buf {
				if byte == crate::command::CARRIAGE_RETURN {
					let command = std::mem::take(&mut self.partial_command);
					self.on_command(&command);
				} else {
					self.partial_command.push(byte);
				}
			}
			Ok(buf.len())
		}

		fn flush(&mut self) -> io::Result<()> {
			Ok(())
		}
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::clock::{Clock as _, MockClock};
	use std::io::Write as _;

	#[test]
	fn read_available_only_returns_data_that_has_arrived() {
		let clock = MockClock::new();
		let mut mock = Mock::new(clock.clone());
		mock.append_data(b"12");
		mock.append_data_after(Duration::from_millis(100), b"3^");

		let mut buf = Vec::new();
		assert_eq!(mock.read_available(&mut buf).unwrap(), 2);
		assert_eq!(mock.read_available(&mut buf).unwrap(), 0);
		clock.sleep(Duration::from_millis(100));
		assert_eq!(mock.read_available(&mut buf).unwrap(), 2);
		assert_eq!(buf, b"123^");
		assert!(mock.is_empty());
	}

	#[test]
	fn clear_input_keeps_data_that_has_not_arrived() {
		let clock = MockClock::new();
		let mut mock = Mock::new(clock.clone());
		mock.append_data(b"stale");
		mock.append_data_after(Duration::from_millis(10), b"fresh");
		mock.clear_input().unwrap();
		assert!(mock.is_empty());
		clock.sleep(Duration::from_millis(10));
		let mut buf = Vec::new();
		mock.read_available(&mut buf).unwrap();
		assert_eq!(buf, b"fresh");
	}

	#[test]
	fn scripted_replies_follow_writes() {
		let clock = MockClock::new();
		let mut mock = Mock::new(clock.clone());
		mock.reply("X", b"100");
		mock.reply("X", b"150");
		mock.write_all(b"X\r").unwrap();
		let mut buf = Vec::new();
		mock.read_available(&mut buf).unwrap();
		assert_eq!(buf, b"100");

		// Split across two writes
		mock.write_all(b"X").unwrap();
		assert!(mock.is_empty());
		mock.write_all(b"\r").unwrap();
		buf.clear();
		mock.read_available(&mut buf).unwrap();
		assert_eq!(buf, b"150");

		// No replies left
		mock.write_all(b"X\r").unwrap();
		assert!(mock.is_empty());
		assert_eq!(mock.written_commands(), ["X", "X", "X"]);
	}

	#[test]
	fn injected_errors_surface_once() {
		let mut mock = Mock::new(MockClock::new());
		mock.read_error(Some(io::Error::new(io::ErrorKind::BrokenPipe, "unplugged")));
		let mut buf = Vec::new();
		let err = mock.read_available(&mut buf).unwrap_err();
		assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
		assert_eq!(mock.read_available(&mut buf).unwrap(), 0);

		mock.write_error(Some(io::Error::new(io::ErrorKind::BrokenPipe, "unplugged")));
		assert!(mock.write_all(b"R\r").is_err());
		assert!(mock.write_all(b"R\r").is_ok());
	}
}
