use std::fmt::Display;

use anyhow::Error;
use judgebox_verdict::Verdict;

/// Exit status of the tools when the judge itself fails.
pub const SYSTEM_ERROR_EXIT_CODE: i32 = Verdict::SystemError.exit_code();

/// Adds methods for failing without panic. Like `expect` but without panic.
pub trait NiceError<T> {
    /// Fail exiting with the system error status if the value is not present. Otherwise return
    /// the content.
    fn nice_unwrap(self) -> T;

    /// Fail exiting with the system error status if the value is not present, printing to stderr
    /// the message. Otherwise return the content.
    fn nice_expect<S: Display + Send + Sync + 'static>(self, mex: S) -> T;
}

/// Print the error and the chain of its causes to stderr.
pub fn print_error(error: &Error) {
    debug!("{:?}", error);
    let mut fail: &dyn std::error::Error = error.as_ref();
    eprintln!("Error: {fail}");
    while let Some(cause) = fail.source() {
        eprintln!("\nCaused by:\n    {cause}");
        fail = cause;
    }
}

impl<T> NiceError<T> for Result<T, Error> {
    fn nice_unwrap(self) -> T {
        match self {
            Ok(x) => x,
            Err(e) => {
                print_error(&e);
                std::process::exit(SYSTEM_ERROR_EXIT_CODE);
            }
        }
    }

    fn nice_expect<S: Display + Send + Sync + 'static>(self, mex: S) -> T {
        match self {
            Ok(x) => x,
            Err(e) => {
                print_error(&e.context(mex));
                std::process::exit(SYSTEM_ERROR_EXIT_CODE);
            }
        }
    }
}
