//! The success/failure value returned by every conversion.
//!
//! [`Outcome`] is distinct from `std::result::Result`: an
//! `Err(Error)` means the call was rejected (bad input, missing
//! credentials), while `Outcome::Failure` is an expected runtime outcome of
//! a call that ran (timeout, HTTP 429, ...).

use crate::error::Error;

/// Either a successful payload or a failure from the [`Error`] taxonomy.
#[derive(Debug, Clone)]
pub enum Outcome<T> {
    Success(T),
    Failure(Error),
}

impl<T> Outcome<T> {
    pub fn success(value: T) -> Self {
        Outcome::Success(value)
    }

    pub fn failure(error: Error) -> Self {
        Outcome::Failure(error)
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Outcome::Failure(_))
    }

    /// The success payload.
    ///
    /// # Panics
    /// On a `Failure`. Check [`Outcome::is_success`] first or use
    /// [`Outcome::ok`].
    #[track_caller]
    pub fn payload(&self) -> &T {
        match self {
            Outcome::Success(value) => value,
            Outcome::Failure(error) => panic!("payload() called on a Failure: {error}"),
        }
    }

    /// The failure error.
    ///
    /// # Panics
    /// On a `Success`.
    #[track_caller]
    pub fn error(&self) -> &Error {
        match self {
            Outcome::Failure(error) => error,
            Outcome::Success(_) => panic!("error() called on a Success"),
        }
    }

    pub fn ok(&self) -> Option<&T> {
        match self {
            Outcome::Success(value) => Some(value),
            Outcome::Failure(_) => None,
        }
    }

    pub fn err(&self) -> Option<&Error> {
        match self {
            Outcome::Success(_) => None,
            Outcome::Failure(error) => Some(error),
        }
    }

    pub fn into_result(self) -> Result<T, Error> {
        self.into()
    }
}

impl<T> From<Result<T, Error>> for Outcome<T> {
    fn from(result: Result<T, Error>) -> Self {
        match result {
            Ok(value) => Outcome::Success(value),
            Err(error) => Outcome::Failure(error),
        }
    }
}

impl<T> From<Outcome<T>> for Result<T, Error> {
    fn from(outcome: Outcome<T>) -> Self {
        match outcome {
            Outcome::Success(value) => Ok(value),
            Outcome::Failure(error) => Err(error),
        }
    }
}
