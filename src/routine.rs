//! The [`Routine`] trait and supporting types.
//!
//! A [`Routine`] is a multi-step operation that needs exclusive access to a
//! resource, usually a [`Port`](crate::Port), for as long as it runs. Homing a
//! motor is the main example: it is a sequence of commands and waits that must
//! not be interleaved with anything else sent to the same controller.
//!
//! [`Routine`]s are lazy and perform no work until their [`run`] method is
//! called, typically through [`Port::execute`](crate::Port::execute):
//!
//! ```no_run
//! # use vxm::{Port, Home, Motor};
//! # fn wrapper() -> Result<(), vxm::Error> {
//! let mut port = Port::open_serial("/dev/ttyUSB0")?;
//! let mut home = Home::new(Motor::M1);
//! port.execute(&mut home)?; // This is where the work actually happens
//! # Ok(())
//! # }
//! ```
//!
//! ## Composing routines
//!
//! [`and`] runs a second routine only if the first succeeds. The resource is
//! inferred from where the composed routine is run.
//!
//! ```no_run
//! # use vxm::{Port, Home, Motor, routine::Routine};
//! # use std::time::Duration;
//! # fn wrapper() -> Result<(), vxm::Error> {
//! # let mut port = Port::open_serial("/dev/ttyUSB0")?;
//! let timeout = Duration::from_secs(30);
//! // Home the X and then the Y axis, stopping at the first failure.
//! port.execute(
//!     Home::new(Motor::M1)
//!         .timeout(timeout)
//!         .and(Home::new(Motor::M2).timeout(timeout)),
//! )?;
//! # Ok(())
//! # }
//! ```
//!
//! [`run`]: Routine::run
//! [`and`]: Routine::and

use std::{fmt, marker::PhantomData};

/// Represents a type that can perform a routine on a mutable resource `R`.
///
/// See the [`module`] level documentation for more details.
///
/// [`module`]: crate::routine
#[must_use = "routines are lazy and do nothing unless consumed"]
pub trait Routine<R> {
	/// The output of the routine
	type Output;
	/// The error returned by the routine
	type Error;

	/// Execute the routine using the provided resource.
	fn run(&mut self, resource: &'_ mut R) -> Result<Self::Output, Self::Error>;

	/// Create a new routine that runs this routine and if it is successful, runs
	/// the `next` routine. If the first routine returns an `Err`, the `next`
	/// routine is not run.
	///
	/// The behaviour is the same as how logical AND (`&&`) evaluates two conditions.
	fn and<T>(self, next: T) -> And<Self, T, R>
	where
		Self: Sized,
		T: Routine<R, Error = Self::Error>,
	{
		And {
			first: self,
			second: next,
			resource: PhantomData,
		}
	}
}

impl<R, T> Routine<R> for &mut T
where
	T: Routine<R> + ?Sized,
{
	type Output = <T as Routine<R>>::Output;
	type Error = <T as Routine<R>>::Error;

	fn run(&mut self, resource: &mut R) -> Result<Self::Output, Self::Error> {
		(*self).run(resource)
	}
}

/// A routine that runs a second routine if the first succeeds.
///
/// See [`Routine::and`].
#[must_use = "routines are lazy and do nothing unless consumed"]
pub struct And<S, T, R> {
	first: S,
	second: T,
	resource: PhantomData<fn(&mut R)>,
}

impl<S: fmt::Debug, T: fmt::Debug, R> fmt::Debug for And<S, T, R> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("And")
			.field("first", &self.first)
			.field("second", &self.second)
			.finish()
	}
}

impl<E, R, S, T> Routine<R> for And<S, T, R>
where
	S: Routine<R, Error = E>,
	T: Routine<R, Error = E>,
{
	type Output = <T as Routine<R>>::Output;
	type Error = E;

	fn run(&mut self, resource: &'_ mut R) -> Result<Self::Output, Self::Error> {
		let _ = self.first.run(resource)?;
		self.second.run(resource)
	}
}
