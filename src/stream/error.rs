//! Stream errors
//!
//! Every fallible operation of the stream layer reports a [`StreamError`].
//! Low-level I/O on a locked stream does not build these directly: it
//! records a fault on the stream and returns [`Faulted`], and the fault is
//! turned into a `StreamError` when the caller releases the stream (see
//! `StreamGuard::release`).

use std::io;

use serde::Serialize;
use thiserror::Error;

use super::encoding::Encoding;

/// Direction a stream is requested for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Input,
    Output,
}

impl Direction {
    pub fn name(self) -> &'static str {
        match self {
            Direction::Input => "input",
            Direction::Output => "output",
        }
    }
}

/// Errors raised by stream operations.
#[derive(Debug, Error)]
pub enum StreamError {
    /// The name or handle does not (or no longer) denote a stream.
    #[error("stream `{stream}` does not exist")]
    NoSuchStream { stream: String },

    #[error("no permission to {} stream `{stream}`", .direction.name())]
    WrongDirection { direction: Direction, stream: String },

    /// Text requested on a binary stream or the other way around.
    #[error("no permission to {} {kind} `{stream}`", .direction.name())]
    WrongKind {
        direction: Direction,
        kind: &'static str,
        stream: String,
    },

    #[error("illegal {} multibyte sequence on `{stream}` at byte {offset}", .encoding.name())]
    Decode {
        stream: String,
        encoding: Encoding,
        offset: u64,
    },

    #[error("no permission to {action} {kind} `{culprit}`{}", suffix(.message))]
    Permission {
        action: &'static str,
        kind: &'static str,
        culprit: String,
        message: Option<String>,
    },

    #[error("timeout in {op} from `{stream}`")]
    Timeout { op: &'static str, stream: String },

    #[error("attempt to read past end of file on `{stream}`")]
    PastEndOfFile { stream: String },

    #[error("I/O error in {op} on `{stream}`: {message}")]
    Io {
        op: &'static str,
        stream: String,
        message: String,
        errno: Option<i32>,
    },

    #[error("domain error: `{value}` is not a valid {domain}{}", suffix(.message))]
    Domain {
        domain: &'static str,
        value: String,
        message: Option<String>,
    },

    #[error("type error: expected {expected}, found `{found}`")]
    Type {
        expected: &'static str,
        found: String,
    },

    #[error("cannot {action} `{target}`: {source}")]
    Open {
        action: &'static str,
        target: String,
        #[source]
        source: io::Error,
    },

    /// Raised by the host's interrupt checkpoint.
    #[error("operation interrupted: {reason}")]
    Cancelled { reason: String },
}

fn suffix(message: &Option<String>) -> String {
    match message {
        Some(m) => format!(" ({m})"),
        None => String::new(),
    }
}

impl StreamError {
    pub(crate) fn domain(
        domain: &'static str,
        value: impl Into<String>,
    ) -> Self {
        StreamError::Domain {
            domain,
            value: value.into(),
            message: None,
        }
    }

    pub(crate) fn permission(
        action: &'static str,
        kind: &'static str,
        culprit: impl Into<String>,
    ) -> Self {
        StreamError::Permission {
            action,
            kind,
            culprit: culprit.into(),
            message: None,
        }
    }

    pub(crate) fn no_such_stream(stream: impl Into<String>) -> Self {
        StreamError::NoSuchStream {
            stream: stream.into(),
        }
    }

    /// Whether this error means the stream is gone.
    pub fn is_existence_error(&self) -> bool {
        matches!(self, StreamError::NoSuchStream { .. })
    }
}

/// Result type of the stream layer.
pub type Result<T, E = StreamError> = std::result::Result<T, E>;

/// Marker returned by low-level operations that recorded a fault on the
/// stream. The details are retrieved by the status check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Faulted;

/// Result of a low-level operation on a locked stream.
pub type IoResult<T> = std::result::Result<T, Faulted>;
