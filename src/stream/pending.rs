//! Draining buffered input without blocking

use super::core::StreamGuard;
use super::decode::decode_buffered;
use super::error::{Direction, Result, StreamError};
use super::thread::{StreamSpec, ThreadIo};

/// Longest encoded character: four UTF-8 bytes, a surrogate pair or a
/// `wchar_t`.
const MAX_CHAR_BYTES: usize = 4;

impl StreamGuard<'_> {
    /// Decode the input that is already buffered, without reading from
    /// the device.
    ///
    /// At most `max_pending` bytes are looked at, more only when a single
    /// character does not fit. A multibyte sequence cut off at the end
    /// stays buffered for the next call. An illegal
    /// sequence fails the whole call and leaves buffer, position and
    /// newline state as they were. An empty result at end of file marks
    /// the stream as past end of file.
    pub fn decode_pending(&mut self) -> Result<Vec<u32>> {
        if self.has_error() {
            self.check_status()?;
        }
        if !self.stream.is_input() {
            return Err(StreamError::WrongDirection {
                direction: Direction::Input,
                stream: self.stream.label(),
            });
        }

        let inner = &mut *self.inner;
        let available = inner.rbuf.len() - inner.rpos;
        if available == 0 {
            if inner.at_eof {
                inner.past_eof = true;
            }
            return Ok(Vec::new());
        }

        let start = inner.rpos;
        let offset0 = inner.position.map(|p| p.byte_no).unwrap_or(0);
        let mut window = available.min(inner.max_pending);
        loop {
            let mut newline = inner.newline;
            let mut position = inner.position;
            let decoded = decode_buffered(
                &inner.rbuf[start..start + window],
                inner.encoding,
                inner.text,
                &mut newline,
                position.as_mut(),
            )
            .map_err(|bad| StreamError::Decode {
                stream: self.stream.label(),
                encoding: inner.encoding,
                offset: offset0 + bad.offset as u64,
            })?;

            // A character wider than the window: widen it to one character.
            if decoded.consumed == 0 && window < available.min(MAX_CHAR_BYTES) {
                window = available.min(MAX_CHAR_BYTES);
                continue;
            }
            inner.rpos += decoded.consumed;
            inner.newline = newline;
            inner.position = position;
            return Ok(decoded.codes);
        }
    }
}

impl ThreadIo {
    /// Decode the pending input of a stream.
    pub fn read_pending(
        &self,
        spec: StreamSpec<'_>,
    ) -> Result<Vec<u32>> {
        let stream = self.input_stream(spec, None)?;
        let mut g = stream.lock()?;
        let codes = g.decode_pending()?;
        g.release()?;
        Ok(codes)
    }
}
