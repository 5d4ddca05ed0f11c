//! Utilities for error handling
//!
//! Every fault in nickel is fatal to the run that hit it. Instead of
//! aborting the process where the fault is detected, faults are
//! propagated as [Result] up to the driver, which reports one diagnostic
//! line and exits with a nonzero status.

use std::{
    backtrace::{Backtrace, BacktraceStatus},
    fmt::Display,
};

use downcast_rs::{impl_downcast, DowncastSync};
use thiserror::Error;

/// The kinds of errors a run can end with.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The source text could not be parsed
    #[error("syntax error")]
    InvalidInput,
    /// The program refers to something that doesn't exist, or is ill-formed.
    /// Both backends report these identically.
    #[error("invalid program")]
    InvalidProgram,
    /// The generated LLVM module was found to be malformed
    #[error("verification failed")]
    VerificationFailed,
    /// LLVM could not initialize, optimize or execute
    #[error("native backend failure")]
    Backend,
    /// Reading the program or writing its output failed
    #[error("I/O error")]
    Io,
}

/// An error object that can hold any [std::error::Error].
#[derive(Debug)]
pub struct Error {
    /// The kind of error this is
    pub kind: ErrorKind,
    /// The actual error object describing the error
    pub err: Box<dyn NickelError>,
    /// Details of how this error occurred
    pub backtrace: Backtrace,
}

/// A single line: the kind, followed by the cause.
impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind, self.err)
    }
}

pub trait NickelError: std::error::Error + DowncastSync {}

impl<T: std::error::Error + Send + Sync + 'static> NickelError for T {}

impl_downcast!(NickelError);

impl std::error::Error for Error {}

impl Error {
    /// Is the underlying cause of type `T`?
    pub fn is<T: NickelError>(&self) -> bool {
        self.err.is::<T>()
    }

    /// Get the underlying cause, if it's of type `T`.
    pub fn downcast_cause<T: NickelError>(&self) -> Option<&T> {
        self.err.downcast_ref::<T>()
    }

    /// The backtrace, if one was captured (see `RUST_BACKTRACE`).
    pub fn captured_backtrace(&self) -> Option<&Backtrace> {
        (self.backtrace.status() == BacktraceStatus::Captured).then_some(&self.backtrace)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        crate::create_error!(ErrorKind::Io, err)
    }
}

/// Type alias for [std::result::Result] with the error type set to [struct@Error]
pub type Result<T> = std::result::Result<T, Error>;

#[doc(hidden)]
#[derive(Debug, Error)]
#[error("{0}")]
pub struct StringError(pub String);

/// Specify [ErrorKind] and create [struct@Error] from any [std::error::Error] object.
/// To create [Result], use [create_err!](crate::create_err) instead.
/// The macro also accepts [format!] like arguments to create one-off errors.
#[macro_export]
macro_rules! create_error {
    ($kind: expr, $str: literal $($t:tt)*) => {
        $crate::create_error!($kind, $crate::result::StringError(format!($str $($t)*)))
    };
    ($kind: expr, $err: expr) => {
        $crate::result::Error {
            kind: $kind,
            err: Box::new($err),
            backtrace: std::backtrace::Backtrace::capture(),
        }
    };
}

/// Specify [ErrorKind] and create [Result] from any [std::error::Error] object.
/// To create [struct@Error], use [create_error!](crate::create_error) instead.
#[macro_export]
macro_rules! create_err {
    ($kind: expr, $str: literal $($t:tt)*) => {
        $crate::create_err!($kind, $crate::result::StringError(format!($str $($t)*)))
    };
    ($kind: expr, $err: expr) => {
        Err($crate::create_error!($kind, $err))
    };
}

/// Create [ErrorKind::InvalidInput] [struct@Error].
/// ```rust
/// use nickel::{input_error, result::{Error, ErrorKind}};
///
/// let err: Error = input_error!("unexpected {}", "')'");
/// assert_eq!(err.kind, ErrorKind::InvalidInput);
/// assert_eq!(err.err.to_string(), "unexpected ')'");
/// ```
#[macro_export]
macro_rules! input_error {
    ($($t:tt)*) => {
        $crate::create_error!($crate::result::ErrorKind::InvalidInput, $($t)*)
    }
}

/// Create [ErrorKind::InvalidInput] [Result].
#[macro_export]
macro_rules! input_err {
    ($($t:tt)*) => {
        $crate::create_err!($crate::result::ErrorKind::InvalidInput, $($t)*)
    }
}

/// Create [ErrorKind::InvalidProgram] [struct@Error].
#[macro_export]
macro_rules! invalid_program_error {
    ($($t:tt)*) => {
        $crate::create_error!($crate::result::ErrorKind::InvalidProgram, $($t)*)
    }
}

/// Create [ErrorKind::InvalidProgram] [Result].
/// ```rust
/// use thiserror::Error;
/// use nickel::{invalid_program_err, result::{Result, ErrorKind, Error}};
///
/// #[derive(Error, Debug)]
/// #[error("sample error")]
/// pub struct SampleErr;
///
/// assert!(
///     matches!(
///         invalid_program_err!(SampleErr),
///         Result::<()>::Err(Error {
///            kind: ErrorKind::InvalidProgram,
///            err,
///            ..
///         }) if err.is::<SampleErr>()
/// ));
/// ```
#[macro_export]
macro_rules! invalid_program_err {
    ($($t:tt)*) => {
        $crate::create_err!($crate::result::ErrorKind::InvalidProgram, $($t)*)
    }
}

/// Create [ErrorKind::VerificationFailed] [Result].
#[macro_export]
macro_rules! verify_err {
    ($($t:tt)*) => {
        $crate::create_err!($crate::result::ErrorKind::VerificationFailed, $($t)*)
    }
}

/// Create [ErrorKind::Backend] [struct@Error].
#[macro_export]
macro_rules! backend_error {
    ($($t:tt)*) => {
        $crate::create_error!($crate::result::ErrorKind::Backend, $($t)*)
    }
}

/// Create [ErrorKind::Backend] [Result].
#[macro_export]
macro_rules! backend_err {
    ($($t:tt)*) => {
        $crate::create_err!($crate::result::ErrorKind::Backend, $($t)*)
    }
}

#[cfg(test)]
mod tests {
    use thiserror::Error;

    use super::{ErrorKind, Result};

    #[derive(Debug, Error)]
    #[error("something went wrong in {0}")]
    struct SampleErr(&'static str);

    #[test]
    fn one_line_display() {
        let res: Result<()> = invalid_program_err!(SampleErr("fact"));
        let err = res.unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidProgram);
        assert!(err.is::<SampleErr>());
        assert_eq!(
            err.to_string(),
            "invalid program: something went wrong in fact"
        );
        assert!(!err.to_string().contains('\n'));
    }

    #[test]
    fn formatted() {
        let res: Result<()> = backend_err!("engine said {}", 42);
        let err = res.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Backend);
        assert_eq!(err.err.to_string(), "engine said 42");
    }

    #[test]
    fn from_io() {
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe closed");
        let err: super::Error = io.into();
        assert_eq!(err.kind, ErrorKind::Io);
        assert!(err.downcast_cause::<std::io::Error>().is_some());
    }
}
