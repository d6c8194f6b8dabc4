//! Buffered byte and character I/O on a locked stream
//!
//! Operations here never build a `StreamError`. Failures are recorded as a
//! fault on the stream and reported as [`Faulted`]; the status check turns
//! the fault into an error when the stream is released.

use std::io::{self, SeekFrom};
use std::sync::Arc;

use tracing::trace;

use super::core::{BufferMode, EndOfStream, EofAction, Fault, FaultKind, RepresentationErrors, StreamInner};
use super::decode::{utf8_extra, utf8_lead_bits};
use super::encoding::{detect_bom, EncodedChar, Encoding, Newline};
use super::error::{Faulted, IoResult, StreamError};
use super::position::Position;
use super::sys::{self, RawFd};
use super::transport::ChannelKind;

fn closed() -> io::Error {
    io::Error::new(io::ErrorKind::NotConnected, "stream is closed")
}

impl StreamInner {
    // ------------------------------------------------------------------
    // State
    // ------------------------------------------------------------------

    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    pub fn is_text(&self) -> bool {
        self.text
    }

    pub fn newline(&self) -> Newline {
        self.newline
    }

    pub fn position(&self) -> Option<Position> {
        self.position
    }

    pub fn channel(&self) -> ChannelKind {
        self.kind
    }

    pub fn eof_action(&self) -> EofAction {
        self.eof_action
    }

    pub fn buffering(&self) -> BufferMode {
        self.buffering
    }

    pub fn is_tty(&self) -> bool {
        self.tty
    }

    /// Whether a byte order mark was read or written.
    pub fn has_bom(&self) -> bool {
        self.bom
    }

    /// Bytes read from the device but not yet consumed.
    pub fn buffered(&self) -> &[u8] {
        &self.rbuf[self.rpos..]
    }

    pub fn has_buffered_input(&self) -> bool {
        self.rpos < self.rbuf.len()
    }

    pub fn raw_fd(&self) -> Option<RawFd> {
        self.transport.as_ref().and_then(|t| t.raw_fd())
    }

    /// End-of-stream state without reading from the device.
    pub fn end_of_stream(&self) -> EndOfStream {
        if self.has_buffered_input() || !self.at_eof {
            EndOfStream::Not
        } else if self.past_eof {
            EndOfStream::Past
        } else {
            EndOfStream::At
        }
    }

    // ------------------------------------------------------------------
    // Faults
    // ------------------------------------------------------------------

    pub(crate) fn set_fault(
        &mut self,
        kind: FaultKind,
    ) -> Faulted {
        let sticky = self.sticky_errors && matches!(kind, FaultKind::Io { .. });
        self.fault = Some(Fault { kind, sticky });
        Faulted
    }

    pub(crate) fn set_io_fault(
        &mut self,
        op: &'static str,
        err: io::Error,
    ) -> Faulted {
        self.set_fault(FaultKind::Io {
            op,
            message: err.to_string(),
            errno: err.raw_os_error(),
        })
    }

    /// Record a non-fatal condition, logged by the next status check.
    pub fn set_warning(
        &mut self,
        message: impl Into<String>,
    ) {
        self.warning = Some(message.into());
    }

    pub fn has_error(&self) -> bool {
        self.fault.is_some()
    }

    /// Forget recorded errors and end-of-file state.
    pub fn clear_errors(&mut self) {
        self.fault = None;
        self.warning = None;
        self.at_eof = false;
        self.past_eof = false;
    }

    // ------------------------------------------------------------------
    // Input
    // ------------------------------------------------------------------

    /// Read more bytes from the device into the buffer. Returns the number
    /// of bytes added; 0 means end of file.
    pub fn fill_buffer(&mut self) -> IoResult<usize> {
        if !self.input {
            return Err(self.set_fault(FaultKind::Io {
                op: "read",
                message: "stream is not open for input".to_string(),
                errno: None,
            }));
        }
        if self.rpos > 0 {
            self.rbuf.drain(..self.rpos);
            self.rpos = 0;
        }
        if let Some(timeout) = self.timeout {
            self.wait_readable(timeout.as_millis().min(i32::MAX as u128) as i32)?;
        }

        let start = self.rbuf.len();
        let room = self.buffer_size.saturating_sub(start).max(1);
        self.rbuf.resize(start + room, 0);
        let result = loop {
            let read = match self.transport.as_mut() {
                Some(t) => t.read(&mut self.rbuf[start..]),
                None => Err(closed()),
            };
            match read {
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {
                    if let Err(f) = self.checkpoint() {
                        self.rbuf.truncate(start);
                        return Err(f);
                    }
                }
                other => break other,
            }
        };

        match result {
            Ok(n) => {
                self.rbuf.truncate(start + n);
                if n == 0 {
                    self.at_eof = true;
                } else {
                    self.at_eof = false;
                    self.past_eof = false;
                    self.copy_to_tee(&self.rbuf[start..start + n]);
                }
                trace!(stream = self.id, bytes = n, "buffer filled");
                Ok(n)
            }
            Err(e) => {
                self.rbuf.truncate(start);
                Err(self.set_io_fault("read", e))
            }
        }
    }

    /// Give the host a chance to handle the signal that interrupted a
    /// system call. A failing checkpoint cancels the operation.
    fn checkpoint(&mut self) -> IoResult<()> {
        let host = match self.host.clone() {
            Some(host) => host,
            None => return Ok(()),
        };
        host.handle_signals().map_err(|e| {
            let reason = match e {
                StreamError::Cancelled { reason } => reason,
                other => other.to_string(),
            };
            trace!(stream = self.id, %reason, "read cancelled");
            self.set_fault(FaultKind::Cancelled { reason })
        })
    }

    fn wait_readable(
        &mut self,
        timeout_ms: i32,
    ) -> IoResult<()> {
        let fd = match self.raw_fd() {
            Some(fd) => fd,
            None => return Ok(()),
        };
        loop {
            match sys::poll_readable(&[fd], timeout_ms) {
                Ok(ready) if ready.first().copied().unwrap_or(false) => return Ok(()),
                Ok(_) => return Err(self.set_fault(FaultKind::Timeout { op: "read" })),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => self.checkpoint()?,
                Err(e) => return Err(self.set_io_fault("read", e)),
            }
        }
    }

    /// Read one byte. `Ok(None)` is end of file.
    pub fn get_byte(&mut self) -> IoResult<Option<u8>> {
        loop {
            if self.rpos < self.rbuf.len() {
                let b = self.rbuf[self.rpos];
                self.rpos += 1;
                if let Some(pos) = self.position.as_mut() {
                    pos.byte_no += 1;
                }
                return Ok(Some(b));
            }
            if self.at_eof {
                match self.eof_action {
                    EofAction::Reset => self.at_eof = false,
                    EofAction::EofCode => {
                        self.past_eof = true;
                        return Ok(None);
                    }
                    EofAction::Error => {
                        self.past_eof = true;
                        return Err(self.set_fault(FaultKind::PastEof));
                    }
                }
            }
            if self.fill_buffer()? == 0 {
                return Ok(None);
            }
        }
    }

    /// Look at the next byte without consuming it.
    pub fn peek_byte(&mut self) -> IoResult<Option<u8>> {
        if self.rpos >= self.rbuf.len() && !self.at_eof {
            self.fill_buffer()?;
        }
        Ok(self.rbuf.get(self.rpos).copied())
    }

    /// Push a byte back in front of the buffered input.
    pub fn unget_byte(
        &mut self,
        b: u8,
    ) {
        if self.rpos > 0 {
            self.rpos -= 1;
            self.rbuf[self.rpos] = b;
        } else {
            self.rbuf.insert(0, b);
        }
        if let Some(pos) = self.position.as_mut() {
            pos.byte_no = pos.byte_no.saturating_sub(1);
        }
    }

    /// Read one character in the stream's encoding. `Ok(None)` is end of
    /// file.
    pub fn get_code(&mut self) -> IoResult<Option<u32>> {
        loop {
            let code = match self.read_code()? {
                Some(c) => c,
                None => return Ok(None),
            };
            if code == 0x0D && self.newline.skip_cr(self.text) {
                continue;
            }
            if let Some(pos) = self.position.as_mut() {
                pos.update_char(code);
            }
            return Ok(Some(code));
        }
    }

    fn read_code(&mut self) -> IoResult<Option<u32>> {
        match self.encoding.resolved() {
            Encoding::Utf8 => self.read_utf8(),
            enc @ (Encoding::UnicodeBe | Encoding::UnicodeLe) => self.read_utf16(enc),
            Encoding::Wchar => {
                let mut unit = [0u8; 4];
                for slot in unit.iter_mut() {
                    match self.get_byte()? {
                        Some(b) => *slot = b,
                        None => return Ok(None),
                    }
                }
                Ok(Some(u32::from_ne_bytes(unit)))
            }
            _ => Ok(self.get_byte()?.map(u32::from)),
        }
    }

    fn read_utf8(&mut self) -> IoResult<Option<u32>> {
        let lead = match self.get_byte()? {
            Some(b) => b,
            None => return Ok(None),
        };
        let extra = match utf8_extra(lead) {
            Some(n) => n,
            // Not a lead byte: deliver it as is.
            None => return Ok(Some(lead as u32)),
        };
        let mut code = utf8_lead_bits(lead, extra);
        for _ in 0..extra {
            match self.get_byte()? {
                Some(b) if b & 0xC0 == 0x80 => code = (code << 6) | (b & 0x3F) as u32,
                Some(b) => {
                    self.unget_byte(b);
                    return Ok(Some(lead as u32));
                }
                None => return Ok(Some(lead as u32)),
            }
        }
        Ok(Some(code))
    }

    fn read_unit16(
        &mut self,
        enc: Encoding,
    ) -> IoResult<Option<u32>> {
        let b0 = match self.get_byte()? {
            Some(b) => b,
            None => return Ok(None),
        };
        let b1 = match self.get_byte()? {
            Some(b) => b,
            None => return Ok(None),
        };
        let unit = if enc == Encoding::UnicodeBe {
            u16::from_be_bytes([b0, b1])
        } else {
            u16::from_le_bytes([b0, b1])
        };
        Ok(Some(unit as u32))
    }

    fn read_utf16(
        &mut self,
        enc: Encoding,
    ) -> IoResult<Option<u32>> {
        let hi = match self.read_unit16(enc)? {
            Some(u) => u,
            None => return Ok(None),
        };
        if !(0xD800..0xDC00).contains(&hi) {
            return Ok(Some(hi));
        }
        match self.read_unit16(enc)? {
            Some(lo) if (0xDC00..0xE000).contains(&lo) => {
                Ok(Some(0x10000 + ((hi - 0xD800) << 10) + (lo - 0xDC00)))
            }
            Some(lo) => {
                let bytes = if enc == Encoding::UnicodeBe {
                    (lo as u16).to_be_bytes()
                } else {
                    (lo as u16).to_le_bytes()
                };
                self.unget_byte(bytes[1]);
                self.unget_byte(bytes[0]);
                Ok(Some(hi))
            }
            None => Ok(Some(hi)),
        }
    }

    /// Consume a byte order mark at the start of input.
    ///
    /// With `explicit` set the stream keeps its encoding and a mark is only
    /// consumed if it announces that encoding. Otherwise the encoding
    /// switches to the one announced. Returns whether a mark was found.
    pub fn check_bom(
        &mut self,
        explicit: bool,
    ) -> IoResult<bool> {
        while self.buffered().len() < 3 && !self.at_eof {
            if self.fill_buffer()? == 0 {
                break;
            }
        }
        if let Some((enc, len)) = detect_bom(self.buffered()) {
            if explicit && enc != self.encoding.resolved() {
                return Ok(false);
            }
            self.rpos += len;
            if let Some(pos) = self.position.as_mut() {
                pos.byte_no += len as u64;
            }
            self.encoding = enc;
            self.bom = true;
            return Ok(true);
        }
        Ok(false)
    }

    // ------------------------------------------------------------------
    // Output
    // ------------------------------------------------------------------

    fn emit(
        &mut self,
        bytes: &[u8],
    ) -> IoResult<()> {
        if !self.output {
            return Err(self.set_fault(FaultKind::Io {
                op: "write",
                message: "stream is not open for output".to_string(),
                errno: None,
            }));
        }
        self.wbuf.extend_from_slice(bytes);
        if let Some(pos) = self.position.as_mut() {
            pos.byte_no += bytes.len() as u64;
        }
        self.copy_to_tee(bytes);
        if self.buffering == BufferMode::Unbuffered || self.wbuf.len() >= self.buffer_size {
            self.flush()?;
        }
        Ok(())
    }

    fn copy_to_tee(
        &self,
        bytes: &[u8],
    ) {
        let tee: &Arc<_> = match &self.tee {
            Some(t) if t.id() != self.id => t,
            _ => return,
        };
        if let Ok(mut guard) = tee.lock() {
            let _ = guard.write_bytes(bytes);
        }
    }

    /// Write raw bytes.
    pub fn write_bytes(
        &mut self,
        bytes: &[u8],
    ) -> IoResult<()> {
        self.emit(bytes)
    }

    pub fn put_byte(
        &mut self,
        b: u8,
    ) -> IoResult<()> {
        self.emit(&[b])
    }

    /// Write one character in the stream's encoding.
    pub fn put_code(
        &mut self,
        code: u32,
    ) -> IoResult<()> {
        if code == 0x0A && self.text && self.newline == Newline::Dos {
            self.put_encoded(0x0D)?;
        }
        self.put_encoded(code)?;
        if code == 0x0A && self.buffering == BufferMode::Line {
            self.flush()?;
        }
        Ok(())
    }

    fn put_encoded(
        &mut self,
        code: u32,
    ) -> IoResult<()> {
        let mut bytes = EncodedChar::new();
        if !self.encoding.encode(code, &mut bytes) {
            let escaped = match self.repr_errors {
                RepresentationErrors::Xml => format!("&#{code};"),
                RepresentationErrors::Prolog => format!("\\x{code:X}\\"),
                RepresentationErrors::Error => {
                    return Err(self.set_fault(FaultKind::Io {
                        op: "write",
                        message: format!(
                            "encoding {} cannot represent character {code:#x}",
                            self.encoding
                        ),
                        errno: None,
                    }))
                }
            };
            for c in escaped.chars() {
                self.encoding.encode(c as u32, &mut bytes);
            }
        }
        self.emit(&bytes)?;
        if let Some(pos) = self.position.as_mut() {
            pos.update_char(code);
        }
        Ok(())
    }

    pub fn write_str(
        &mut self,
        text: &str,
    ) -> IoResult<()> {
        for c in text.chars() {
            self.put_code(c as u32)?;
        }
        Ok(())
    }

    /// Write the byte order mark of the stream's encoding, if it has one.
    pub fn write_bom(&mut self) -> IoResult<()> {
        if let Some(bom) = self.encoding.bom() {
            self.emit(bom)?;
            self.bom = true;
        }
        Ok(())
    }

    /// Hand buffered output to the device.
    pub fn flush(&mut self) -> IoResult<()> {
        if self.wbuf.is_empty() {
            return Ok(());
        }
        let data = std::mem::take(&mut self.wbuf);
        let result = match self.transport.as_mut() {
            Some(t) => t.write(&data).and_then(|_| t.flush()),
            None => Err(closed()),
        };
        match result {
            Ok(()) => Ok(()),
            Err(e) => Err(self.set_io_fault("write", e)),
        }
    }

    // ------------------------------------------------------------------
    // Positioning
    // ------------------------------------------------------------------

    /// Logical byte offset, accounting for buffered data.
    pub fn tell(&mut self) -> IoResult<u64> {
        if let Some(pos) = &self.position {
            return Ok(pos.byte_no);
        }
        let pending = self.wbuf.len() as u64;
        let unread = (self.rbuf.len() - self.rpos) as u64;
        let result = match self.transport.as_mut() {
            Some(t) => t.seek(SeekFrom::Current(0)),
            None => Err(closed()),
        };
        match result {
            Ok(off) => Ok((off + pending).saturating_sub(unread)),
            Err(e) => Err(self.set_io_fault("seek", e)),
        }
    }

    /// Move to a new byte offset. Buffered input is discarded and buffered
    /// output is written first.
    pub fn seek(
        &mut self,
        to: SeekFrom,
    ) -> IoResult<u64> {
        self.flush()?;
        let to = match to {
            SeekFrom::Current(delta) => {
                let unread = (self.rbuf.len() - self.rpos) as i64;
                SeekFrom::Current(delta - unread)
            }
            other => other,
        };
        self.rbuf.clear();
        self.rpos = 0;
        let result = match self.transport.as_mut() {
            Some(t) => t.seek(to),
            None => Err(closed()),
        };
        match result {
            Ok(off) => {
                self.at_eof = false;
                self.past_eof = false;
                if let Some(pos) = self.position.as_mut() {
                    pos.byte_no = off;
                    pos.char_no = off;
                    pos.line_pos = 0;
                }
                Ok(off)
            }
            Err(e) => Err(self.set_io_fault("seek", e)),
        }
    }

    /// Size of the underlying device in bytes.
    pub fn size(&mut self) -> IoResult<u64> {
        self.flush()?;
        let result = match self.transport.as_mut() {
            Some(t) => t.size(),
            None => Err(closed()),
        };
        match result {
            Ok(n) => Ok(n),
            Err(e) => Err(self.set_io_fault("size", e)),
        }
    }

    /// Cut the device off at the current position.
    pub fn truncate_here(&mut self) -> IoResult<()> {
        let at = self.tell()?;
        self.flush()?;
        let result = match self.transport.as_mut() {
            Some(t) => t.truncate(at),
            None => Err(closed()),
        };
        match result {
            Ok(()) => Ok(()),
            Err(e) => Err(self.set_io_fault("truncate", e)),
        }
    }

    // ------------------------------------------------------------------
    // Closing
    // ------------------------------------------------------------------

    /// Close and drop the transport.
    pub(crate) fn close_transport(&mut self) -> io::Result<()> {
        match self.transport.take() {
            Some(mut t) => t.close(),
            None => Ok(()),
        }
    }

    /// Take the collected output of an in-memory sink.
    pub(crate) fn take_memory(&mut self) -> IoResult<Vec<u8>> {
        self.flush()?;
        Ok(self
            .transport
            .as_mut()
            .and_then(|t| t.take_contents())
            .unwrap_or_default())
    }
}
