//! Translating recorded faults into errors

use tracing::warn;

use super::core::{FaultKind, StreamGuard};
use super::error::{IoResult, Result, StreamError};

impl StreamGuard<'_> {
    /// Report the recorded fault of the stream, if any.
    ///
    /// Non-sticky faults are cleared once reported. A pending warning is
    /// logged and cleared; it never fails the check.
    pub fn check_status(&mut self) -> Result<()> {
        if let Some(fault) = self.inner.fault.clone() {
            let stream = self.stream.label();
            if !fault.sticky {
                self.inner.fault = None;
            }
            return Err(match fault.kind {
                FaultKind::PastEof => StreamError::PastEndOfFile { stream },
                FaultKind::Timeout { op } => StreamError::Timeout { op, stream },
                FaultKind::Io { op, message, errno } => StreamError::Io {
                    op,
                    stream,
                    message,
                    errno,
                },
                FaultKind::Cancelled { reason } => StreamError::Cancelled { reason },
            });
        }
        if let Some(message) = self.inner.warning.take() {
            warn!(stream = %self.stream.label(), "{message}");
        }
        Ok(())
    }

    /// Unlock the stream and report its status.
    pub fn release(mut self) -> Result<()> {
        self.check_status()
    }

    /// Unlock the stream, turning the outcome of a low-level operation
    /// into a result.
    pub fn finish<T>(
        mut self,
        result: IoResult<T>,
    ) -> Result<T> {
        match result {
            Ok(value) => {
                self.check_status()?;
                Ok(value)
            }
            Err(_) => Err(self.take_error()),
        }
    }

    /// The error for a low-level operation that reported a fault.
    pub(crate) fn take_error(&mut self) -> StreamError {
        match self.check_status() {
            Err(e) => e,
            Ok(()) => StreamError::Io {
                op: "io",
                stream: self.stream.label(),
                message: "operation failed".to_string(),
                errno: None,
            },
        }
    }
}
