//! Waiting for input on several streams

use std::io;

use tracing::trace;

use super::error::{Result, StreamError};
use super::handle::Handle;
use super::registry::Registry;
use super::sys;

/// How long [`Registry::wait_ready`] may block.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WaitTimeout {
    Infinite,
    /// Check and return immediately.
    Poll,
    /// Fractional seconds; zero or negative polls.
    Seconds(f64),
}

impl WaitTimeout {
    /// Milliseconds for `poll(2)`; -1 is infinite.
    pub fn as_millis(self) -> i32 {
        match self {
            WaitTimeout::Infinite => -1,
            WaitTimeout::Poll => 0,
            WaitTimeout::Seconds(s) if s <= 0.0 || s.is_nan() => 0,
            WaitTimeout::Seconds(s) => (s * 1000.0).ceil().min(i32::MAX as f64) as i32,
        }
    }
}

impl Registry {
    /// Wait until some of `handles` have input available.
    ///
    /// If any stream already holds buffered input, those streams are
    /// returned at once without waiting on the others. Otherwise the
    /// descriptors are polled; an interrupted wait runs the host's
    /// interrupt checkpoint and is retried unless that fails. An empty
    /// result means the timeout expired.
    pub fn wait_ready(
        &self,
        handles: &[Handle],
        timeout: WaitTimeout,
    ) -> Result<Vec<Handle>> {
        let mut fds = Vec::with_capacity(handles.len());
        let mut buffered = Vec::new();

        for handle in handles {
            let stream = handle.resolve(false)?;
            let g = stream.lock()?;
            let fd = g.raw_fd().ok_or_else(|| StreamError::domain("file_stream", handle.to_string()))?;
            if g.has_buffered_input() {
                buffered.push(handle.clone());
            }
            drop(g);
            fds.push(fd);
        }
        if !buffered.is_empty() {
            trace!(ready = buffered.len(), "input already buffered");
            return Ok(buffered);
        }

        let ready = loop {
            match sys::poll_readable(&fds, timeout.as_millis()) {
                Ok(ready) => break ready,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => self.host().handle_signals()?,
                Err(e) => {
                    return Err(StreamError::Io {
                        op: "select",
                        stream: handles
                            .iter()
                            .map(|h| h.to_string())
                            .collect::<Vec<_>>()
                            .join(","),
                        message: e.to_string(),
                        errno: e.raw_os_error(),
                    })
                }
            }
        };

        Ok(handles
            .iter()
            .zip(ready)
            .filter(|(_, ready)| *ready)
            .map(|(handle, _)| handle.clone())
            .collect())
    }
}
