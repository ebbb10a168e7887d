//! Types defining the different options when opening a port.

use super::Port;
use crate::{
    backend::{Backend, Serial},
    clock::SystemClock,
    error::Error,
    ready::{ReadyConfig, ReadyDetector, ReadyMode},
};
use serialport as sp;
use std::time::Duration;

/// Options for configuring and opening a serial port.
///
/// ## Example
///
/// ```rust
/// # use vxm::{port::OpenSerialOptions, ReadyMode};
/// # use std::time::Duration;
/// # fn wrapper() -> Result<(), Box<dyn std::error::Error>> {
/// let mut port = OpenSerialOptions::new()
///     .ready_mode(ReadyMode::Quiet)
///     .quiet_window(Duration::from_millis(250))
///     .open("/dev/ttyUSB0")?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct OpenSerialOptions {
    /// The custom baud rate
    baud_rate: u32,
    /// The custom serial read timeout
    timeout: Option<Duration>,
    /// How to tell that the controller is ready.
    ready: ReadyConfig,
    /// How long to wait before reading an immediate reply.
    grace_period: Duration,
    /// How long to sleep between polls while waiting.
    poll_interval: Duration,
    /// How long each position read of a busy check may take.
    query_timeout: Duration,
}

impl OpenSerialOptions {
    /// The default baud rate for VXM controllers: 9,600.
    pub const DEFAULT_BAUD_RATE: u32 = 9_600;
    /// The default serial read timeout: 200 ms.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(200);
    /// The default grace period before reading an immediate reply: 30 ms.
    pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_millis(30);
    /// The default time allowed for each position read of a busy check: 1 s.
    pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(1);

    /// Create a blank set of options ready for configuration.
    ///
    /// The port is opened at 9,600 baud with a 200 ms read timeout and waits
    /// for the `^` ready character.
    ///
    /// Equivalent to [`default`](OpenSerialOptions::default).
    pub fn new() -> Self {
        OpenSerialOptions {
            baud_rate: OpenSerialOptions::DEFAULT_BAUD_RATE,
            timeout: Some(OpenSerialOptions::DEFAULT_TIMEOUT),
            ready: ReadyConfig::default(),
            grace_period: OpenSerialOptions::DEFAULT_GRACE_PERIOD,
            poll_interval: ReadyDetector::DEFAULT_POLL_INTERVAL,
            query_timeout: OpenSerialOptions::DEFAULT_QUERY_TIMEOUT,
        }
    }

    /// Set a custom baud rate.
    ///
    /// The default is 9,600.
    pub fn baud_rate(&mut self, baud_rate: u32) -> &mut Self {
        self.baud_rate = baud_rate;
        self
    }

    /// Set a custom read timeout for the serial port.
    ///
    /// If duration is `None`, reads will block indefinitely. The default is 200 ms.
    pub fn timeout(&mut self, duration: Option<Duration>) -> &mut Self {
        self.timeout = duration;
        self
    }

    /// Set how the port detects that the controller is ready.
    ///
    /// The default is [`ReadyMode::Sentinel`].
    pub fn ready_mode(&mut self, mode: ReadyMode) -> &mut Self {
        self.ready.mode = mode;
        self
    }

    /// Set the ready character.
    ///
    /// The default is `^`.
    pub fn sentinel(&mut self, sentinel: char) -> &mut Self {
        self.ready.sentinel = sentinel;
        self
    }

    /// Set how long the controller must be silent to be considered ready.
    ///
    /// The default is 150 ms.
    pub fn quiet_window(&mut self, window: Duration) -> &mut Self {
        self.ready.quiet_window = window;
        self
    }

    /// Set how long to wait for an immediate reply after sending a command.
    ///
    /// The default is 30 ms.
    pub fn grace_period(&mut self, period: Duration) -> &mut Self {
        self.grace_period = period;
        self
    }

    /// Set how long to sleep between polls of the serial port while waiting
    /// for the controller.
    ///
    /// The default is 10 ms.
    pub fn poll_interval(&mut self, interval: Duration) -> &mut Self {
        self.poll_interval = interval;
        self
    }

    /// Set how long each position read of a busy check may take.
    ///
    /// The default is 1 second.
    pub fn query_timeout(&mut self, timeout: Duration) -> &mut Self {
        self.query_timeout = timeout;
        self
    }

    /// Open a [`Serial`] port configured for a VXM at the specified path.
    fn open_serial_port(&self, path: &str) -> Result<Serial, Error> {
        // Due to https://gitlab.com/susurrus/serialport-rs/-/issues/102, the
        // baud rate passed to new is ignored. It must be defined using the
        // baud_rate method below.
        sp::new(path, OpenSerialOptions::DEFAULT_BAUD_RATE)
            .data_bits(sp::DataBits::Eight)
            .parity(sp::Parity::None)
            .flow_control(sp::FlowControl::None)
            .stop_bits(sp::StopBits::One)
            // The serialport API does not support infinite timeouts, so simply
            // set the timeout to the largest possible duration if `timeout` is
            // `None`, which is practically infinite.
            .timeout(self.timeout.unwrap_or(Duration::MAX))
            .baud_rate(self.baud_rate)
            .open_native()
            .map(Serial)
            .map_err(Into::into)
    }

    /// Open the port at the specified path with the custom options.
    pub fn open(&self, path: &str) -> Result<Port<Serial>, Error> {
        Ok(self.open_backend(self.open_serial_port(path)?))
    }

    /// Open the port at the specified path with the custom options.
    ///
    /// The type of the underlying backend is erased via dynamic dispatch,
    /// which does have runtime overhead. [`OpenSerialOptions::open`] should
    /// generally be used instead, except when the type of the underlying
    /// backend may not be known at compile time.
    pub fn open_dyn(&self, path: &str) -> Result<Port<Box<dyn Backend>>, Error> {
        Ok(self.open_backend(Box::new(self.open_serial_port(path)?)))
    }

    /// Create a port that talks to a controller over any [`Backend`], using
    /// these options.
    ///
    /// The baud rate and read timeout are not applied to the backend.
    pub fn open_backend<B: Backend>(&self, backend: B) -> Port<B> {
        Port::from_parts(backend, SystemClock, self)
    }

    pub(super) fn detector(&self) -> ReadyDetector {
        ReadyDetector {
            config: self.ready,
            poll_interval: self.poll_interval,
        }
    }

    pub(super) fn grace(&self) -> Duration {
        self.grace_period
    }

    pub(super) fn busy_query_timeout(&self) -> Duration {
        self.query_timeout
    }
}

impl Default for OpenSerialOptions {
    fn default() -> Self {
        OpenSerialOptions::new()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn defaults() {
        let options = OpenSerialOptions::default();
        assert_eq!(options.baud_rate, 9_600);
        assert_eq!(options.timeout, Some(Duration::from_millis(200)));
        assert_eq!(options.detector().config, ReadyConfig::default());
        assert_eq!(options.grace(), Duration::from_millis(30));
        assert_eq!(options.detector().poll_interval, Duration::from_millis(10));
        assert_eq!(options.busy_query_timeout(), Duration::from_secs(1));
    }

    #[test]
    fn setters_chain() {
        let mut options = OpenSerialOptions::new();
        options
            .baud_rate(19_200)
            .timeout(None)
            .ready_mode(ReadyMode::Quiet)
            .sentinel('>')
            .quiet_window(Duration::from_millis(300))
            .poll_interval(Duration::from_millis(5));
        assert_eq!(options.baud_rate, 19_200);
        assert_eq!(options.timeout, None);
        let detector = options.detector();
        assert_eq!(
            detector.config,
            ReadyConfig {
                mode: ReadyMode::Quiet,
                sentinel: '>',
                quiet_window: Duration::from_millis(300),
            }
        );
        assert_eq!(detector.poll_interval, Duration::from_millis(5));
    }
}
