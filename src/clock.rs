//! Sources of time for the blocking waits.
//!
//! Every wait in this crate polls the backend and sleeps between polls. The
//! [`Clock`] trait is the single place where time is read and sleeps happen,
//! so that tests can substitute a virtual clock and run without real delays.

use std::time::{Duration, Instant};

/// A source of monotonic time that can also sleep.
pub trait Clock {
	/// The current instant.
	fn now(&self) -> Instant;

	/// Block the current thread for `duration`.
	fn sleep(&self, duration: Duration);

	/// The time elapsed since `earlier`.
	fn elapsed_since(&self, earlier: Instant) -> Duration {
		self.now().saturating_duration_since(earlier)
	}
}

impl<C: Clock + ?Sized> Clock for &C {
	fn now(&self) -> Instant {
		(**self).now()
	}
	fn sleep(&self, duration: Duration) {
		(**self).sleep(duration);
	}
}

/// The operating system's clock.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct SystemClock;

impl Clock for SystemClock {
	fn now(&self) -> Instant {
		Instant::now()
	}
	fn sleep(&self, duration: Duration) {
		std::thread::sleep(duration);
	}
}

/// A virtual clock for use in testing.
///
/// Sleeping advances the clock instantly. Clones share the same time, so a
/// clone can be handed to a [`Mock`](crate::backend::Mock) backend to schedule
/// data relative to the port's sleeps.
#[cfg(any(test, feature = "mock"))]
#[cfg_attr(all(doc, feature = "doc_cfg"), doc(cfg(feature = "mock")))]
#[derive(Debug, Clone)]
pub struct MockClock {
	/// The instant the clock was created.
	origin: Instant,
	/// The virtual time elapsed since `origin`.
	elapsed: std::rc::Rc<std::cell::Cell<Duration>>,
}

#[cfg(any(test, feature = "mock"))]
impl MockClock {
	/// Create a new clock starting at the current instant.
	pub fn new() -> Self {
		MockClock {
			origin: Instant::now(),
			elapsed: std::rc::Rc::default(),
		}
	}

	/// The virtual time elapsed since the clock was created.
	pub fn elapsed(&self) -> Duration {
		self.elapsed.get()
	}

	/// Move the clock forward without sleeping.
	pub fn advance(&self, duration: Duration) {
		self.elapsed.set(self.elapsed.get() + duration);
	}
}

#[cfg(any(test, feature = "mock"))]
impl Default for MockClock {
	fn default() -> Self {
		Self::new()
	}
}

#[cfg(any(test, feature = "mock"))]
impl Clock for MockClock {
	fn now(&self) -> Instant {
		self.origin + self.elapsed.get()
	}
	fn sleep(&self, duration: Duration) {
		self.advance(duration);
	}
}
