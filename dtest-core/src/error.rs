use thiserror::Error;

#[derive(Error, Debug)]
pub enum HarnessError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Environment error: {0}")]
    Environment(String),

    #[error("Assertion failed: {0}")]
    Assertion(String),

    #[error("Process error: {0}")]
    Process(String),

    #[error("Client error: {0}")]
    Client(String),

    #[error("Duplicate fixture track: {0}")]
    DuplicateTrack(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),
}

impl HarnessError {
    /// Assertion failures are the only errors a test run recovers from.
    pub fn is_assertion(&self) -> bool {
        matches!(self, HarnessError::Assertion(_))
    }
}

pub type Result<T> = std::result::Result<T, HarnessError>;

/// Return an assertion failure from the enclosing function unless `cond` holds.
///
/// ```
/// # use dtest_core::check;
/// fn queue_len(len: usize) -> dtest_core::error::Result<()> {
///     check!(len == 10, "queue is at proper length (got {len})");
///     Ok(())
/// }
/// assert!(queue_len(10).is_ok());
/// assert!(queue_len(3).unwrap_err().is_assertion());
/// ```
#[macro_export]
macro_rules! check {
    ($cond:expr, $($arg:tt)+) => {
        if !$cond {
            return Err($crate::error::HarnessError::Assertion(format!($($arg)+)));
        }
    };
}
