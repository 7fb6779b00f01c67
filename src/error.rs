use core::fmt;

/// Result alias for `pkgatlas`.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by the map-construction pipeline.
///
/// Two conditions from the pipeline's error taxonomy are deliberately *not*
/// variants here: degenerate geometry (zero radius, zero coordinate range) is
/// handled locally with an epsilon substitute, and a cluster skipped for being
/// below the minimum package count is an informational outcome, not a failure.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// Input was empty.
    EmptyInput,

    /// Vector dimension mismatch.
    DimensionMismatch {
        /// Expected dimension.
        expected: usize,
        /// Found dimension.
        found: usize,
    },

    /// Too few points for the requested neighborhood or cluster size.
    InsufficientData {
        /// Minimum number of points required.
        required: usize,
        /// Number of points provided.
        found: usize,
    },

    /// Invalid parameter value.
    InvalidParameter {
        /// Parameter name.
        name: &'static str,
        /// Error message.
        message: &'static str,
    },

    /// The external labeling collaborator failed.
    ///
    /// Callers in this crate catch this per cluster and substitute a fallback
    /// label; it aborts nothing.
    Labeling(String),

    /// Reading or writing an output artifact failed.
    Io(String),

    /// Generic error with message.
    Other(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::EmptyInput => write!(f, "empty input provided"),
            Error::DimensionMismatch { expected, found } => {
                write!(f, "dimension mismatch: expected {expected}, found {found}")
            }
            Error::InsufficientData { required, found } => {
                write!(
                    f,
                    "insufficient data: need at least {required} points, got {found}"
                )
            }
            Error::InvalidParameter { name, message } => {
                write!(f, "invalid parameter '{name}': {message}")
            }
            Error::Labeling(msg) => write!(f, "labeling failed: {msg}"),
            Error::Io(msg) => write!(f, "artifact i/o failed: {msg}"),
            Error::Other(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

impl From<csv::Error> for Error {
    fn from(err: csv::Error) -> Self {
        Error::Io(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Io(err.to_string())
    }
}
