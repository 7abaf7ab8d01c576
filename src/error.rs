use thiserror::Error;

/// Builds an [`Error::GraphInvariantViolation`] from a format string.
///
/// A violation means a pass or an IR edit broke use/def bookkeeping; callers
/// propagate it and must not keep using the program afterwards.
#[macro_export]
macro_rules! invariant_violation {
    ($msg:expr) => {
        $crate::error::Error::GraphInvariantViolation($msg.to_string())
    };

    ($fmt:expr, $($arg:tt)*) => {
        $crate::error::Error::GraphInvariantViolation(format!($fmt, $($arg)*))
    };
}

/// Every error the registry, the IR and the frontend can return.
#[derive(Debug, Error)]
pub enum Error {
    /// Two passes resolved to the same `namespace::name` identifier.
    #[error("pass '{0}' is already registered")]
    DuplicateRegistration(String),

    /// Lookup of an identifier nobody registered.
    #[error("no pass registered as '{0}'")]
    PassNotFound(String),

    /// A rewrite left (or would leave) the graph with a dangling reference.
    #[error("graph invariant violated: {0}")]
    GraphInvariantViolation(String),

    #[error("parse error at position {position}: {message}")]
    Parse { message: String, position: usize },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
