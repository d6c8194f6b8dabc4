//! Opening and closing streams

use std::fmt;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info};

use super::core::{BufferMode, StdRole, Stream, StreamGuard};
use super::encoding::Encoding;
use super::error::{Result, StreamError};
use super::handle::Handle;
use super::options::{BomAction, OpenOptions, Resolved};
use super::position::Position;
use super::registry::Registry;
use super::transport::{FileTransport, LockMode, MemoryTransport, Mode, NullTransport, PipeTransport, Transport};

/// What to open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    File(PathBuf),
    /// A shell command; the stream is connected to its standard input or
    /// output.
    Pipe(String),
}

impl Source {
    pub fn file(path: impl AsRef<Path>) -> Self {
        Source::File(path.as_ref().to_path_buf())
    }

    pub fn pipe(command: &str) -> Self {
        Source::Pipe(command.to_string())
    }
}

impl fmt::Display for Source {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            Source::File(path) => write!(f, "{}", path.display()),
            Source::Pipe(cmd) => write!(f, "pipe({cmd})"),
        }
    }
}

impl Registry {
    /// Open a file or pipe.
    ///
    /// Options are validated before the device is opened. If anything
    /// fails after that, the new stream is closed again before the error
    /// is returned.
    pub fn open(
        &self,
        source: &Source,
        mode: Mode,
        options: &OpenOptions,
    ) -> Result<Arc<Stream>> {
        let resolved = options.resolve(mode, self.default_encoding())?;

        let (transport, filename): (Box<dyn Transport>, Option<String>) = match source {
            Source::File(path) => {
                let target = path.display().to_string();
                let file = FileTransport::open(path, mode).map_err(|source| StreamError::Open {
                    action: "open",
                    target: target.clone(),
                    source,
                })?;
                if options.lock != LockMode::None {
                    file.lock(options.lock, options.wait)
                        .map_err(|source| StreamError::Open {
                            action: "lock",
                            target: target.clone(),
                            source,
                        })?;
                }
                (Box::new(file), Some(target))
            }
            Source::Pipe(command) => {
                let pipe = PipeTransport::spawn(command, mode).map_err(|source| StreamError::Open {
                    action: "open",
                    target: source_name(command),
                    source,
                })?;
                (Box::new(pipe), None)
            }
        };

        let stream = self.create_stream(transport, mode.is_input(), Some(mode), |inner| {
            inner.encoding = resolved.encoding;
            inner.text = resolved.text;
            inner.close_on_abort = options.close_on_abort;
            if mode.is_input() {
                inner.eof_action = options.eof_action;
            } else {
                inner.buffering = options.buffer;
            }
            if let Some(size) = options.buffer_size {
                inner.buffer_size = size;
            }
            if let Some(newline) = options.newline {
                inner.newline = newline;
            }
            if !options.reposition {
                inner.position = None;
                inner.reposition = false;
            }
        });
        if let Some(name) = &filename {
            self.set_filename(&stream, Some(name));
        }

        if let Err(e) = self.prepare_content(&stream, mode, &resolved, options.scripting) {
            let _ = self.close_stream(&stream, true);
            return Err(e);
        }
        if let Some(alias) = &options.alias {
            self.bind_alias(&stream, alias);
        }
        debug!(stream = stream.id(), source = %source, mode = mode.name(), "stream opened");
        Ok(stream)
    }

    /// Byte order mark and scripting-line handling right after opening.
    fn prepare_content(
        &self,
        stream: &Stream,
        mode: Mode,
        resolved: &Resolved,
        scripting: bool,
    ) -> Result<()> {
        let mut g = stream.lock()?;
        match resolved.bom {
            BomAction::Detect { explicit } => {
                g.check_bom(explicit).map_err(|_| g.take_error())?;
            }
            BomAction::Write => {
                let empty = mode == Mode::Write
                    || g.transport.as_mut().and_then(|t| t.size().ok()) == Some(0);
                if empty {
                    g.write_bom().map_err(|_| g.take_error())?;
                }
            }
            BomAction::None => {}
        }
        if scripting && mode.is_input() {
            skip_script_lines(&mut g).map_err(|_| g.take_error())?;
        }
        g.release()
    }

    // ------------------------------------------------------------------
    // Raw channels
    // ------------------------------------------------------------------

    /// Register a stream over an arbitrary transport.
    pub fn open_transport(
        &self,
        transport: Box<dyn Transport>,
        mode: Mode,
        encoding: Encoding,
    ) -> Arc<Stream> {
        self.create_stream(transport, mode.is_input(), Some(mode), |inner| {
            inner.encoding = encoding;
            inner.text = encoding != Encoding::Octet;
        })
    }

    /// An output stream that discards everything written to it, still
    /// counting positions.
    pub fn open_null_stream(&self) -> Arc<Stream> {
        self.create_stream(Box::new(NullTransport), false, Some(Mode::Write), |inner| {
            inner.encoding = Encoding::Utf8;
            inner.buffering = BufferMode::Unbuffered;
        })
    }

    pub fn open_memory_input(
        &self,
        bytes: impl Into<Vec<u8>>,
        encoding: Encoding,
    ) -> Arc<Stream> {
        self.open_transport(Box::new(MemoryTransport::reader(bytes)), Mode::Read, encoding)
    }

    pub fn open_memory_output(
        &self,
        encoding: Encoding,
    ) -> Arc<Stream> {
        self.open_transport(Box::new(MemoryTransport::writer()), Mode::Write, encoding)
    }

    /// Wrap a connected socket as a stream pair.
    #[cfg(unix)]
    pub fn open_socket(
        &self,
        socket: std::os::unix::net::UnixStream,
        encoding: Encoding,
    ) -> Result<Handle> {
        use super::error::Direction;
        use super::transport::SocketTransport;

        let writer = socket.try_clone().map_err(|source| StreamError::Open {
            action: "clone",
            target: "socket".to_string(),
            source,
        })?;
        let input = self.open_transport(
            Box::new(SocketTransport::new(socket, Direction::Input)),
            Mode::Read,
            encoding,
        );
        let output = self.open_transport(
            Box::new(SocketTransport::new(writer, Direction::Output)),
            Mode::Write,
            encoding,
        );
        Handle::pair(input, output)
    }

    // ------------------------------------------------------------------
    // Closing
    // ------------------------------------------------------------------

    /// Close a stream. With `force` all errors are suppressed.
    pub fn close_stream(
        &self,
        stream: &Stream,
        force: bool,
    ) -> Result<()> {
        let guard = match stream.lock() {
            Ok(g) => g,
            Err(_) if force => return Ok(()),
            Err(e) => return Err(e),
        };
        if force {
            guard.force_close();
            Ok(())
        } else {
            guard.close()
        }
    }

    /// Close every stream of a handle. Both sides of a pair are closed
    /// even if the first fails; the first error is reported.
    pub fn close(
        &self,
        handle: &Handle,
        force: bool,
    ) -> Result<()> {
        let mut result = Ok(());
        for stream in handle.streams() {
            let closed = self.close_stream(stream, force);
            if result.is_ok() {
                result = closed;
            }
        }
        result
    }

    /// Close all non-standard streams, or with `all` unset only those
    /// marked close-on-abort. Streams locked by another thread are
    /// skipped.
    pub fn close_files(
        &self,
        all: bool,
    ) {
        for (stream, _) in self.enumerate() {
            if stream.std_role().is_some() {
                continue;
            }
            let guard = match stream.try_lock() {
                Some(g) => g,
                None => continue,
            };
            if all || guard.close_on_abort {
                if !all {
                    info!(stream = %self.describe(&stream), "closed on abort");
                }
                guard.force_close();
            }
        }
    }

    /// Tear down: detach all tees, close every stream and flush the
    /// standard ones.
    pub fn shutdown(&self) {
        for (stream, _) in self.enumerate() {
            if let Some(mut g) = stream.try_lock() {
                g.tee = None;
            }
        }
        self.close_files(true);
        for stream in [self.std_input(), self.std_output(), self.std_error()] {
            if let Some(mut g) = stream.try_lock() {
                let _ = g.flush();
                g.clear_errors();
            }
        }
        debug!("stream registry shut down");
    }

    // ------------------------------------------------------------------
    // Size and position
    // ------------------------------------------------------------------

    /// Truncate the device at the current position.
    pub fn set_end_of_stream(
        &self,
        stream: &Stream,
    ) -> Result<()> {
        let mut g = stream.lock()?;
        if !g.kind.seekable() {
            return Err(StreamError::permission(
                "set_end_of_stream",
                "stream",
                stream.label(),
            ));
        }
        let r = g.truncate_here();
        g.finish(r)
    }

    pub fn stream_size(
        &self,
        stream: &Stream,
    ) -> Result<u64> {
        let mut g = stream.lock()?;
        let r = g.size();
        g.finish(r)
    }

    pub fn flush_output(
        &self,
        stream: &Stream,
    ) -> Result<()> {
        let mut g = stream.lock()?;
        let r = g.flush();
        g.finish(r)
    }

    /// Whether the next read would return end of file. May block to fill
    /// the buffer.
    pub fn at_end_of_stream(
        &self,
        stream: &Stream,
    ) -> Result<bool> {
        let mut g = stream.lock()?;
        let r = g.peek_byte();
        g.finish(r).map(|b| b.is_none())
    }

    /// Move to a byte offset.
    pub fn seek(
        &self,
        stream: &Stream,
        to: SeekFrom,
    ) -> Result<u64> {
        let mut g = stream.lock()?;
        if !g.kind.seekable() {
            return Err(StreamError::permission("reposition", "stream", stream.label()));
        }
        let r = g.seek(to);
        g.finish(r)
    }

    /// Return to a position obtained earlier from the same stream.
    pub fn set_stream_position(
        &self,
        stream: &Stream,
        position: Position,
    ) -> Result<()> {
        let mut g = stream.lock()?;
        if !g.reposition || g.position.is_none() {
            return Err(StreamError::permission("reposition", "stream", stream.label()));
        }
        match g.seek(SeekFrom::Start(position.byte_no)) {
            Ok(_) => {
                g.position = Some(position);
                g.release()
            }
            Err(_) => Err(g.take_error()),
        }
    }

    fn position_of(
        &self,
        stream: &Stream,
    ) -> Result<Position> {
        let g = stream.lock()?;
        g.position
            .ok_or_else(|| StreamError::permission("query_position", "stream", stream.label()))
    }

    pub fn byte_count(
        &self,
        stream: &Stream,
    ) -> Result<u64> {
        Ok(self.position_of(stream)?.byte_no)
    }

    pub fn character_count(
        &self,
        stream: &Stream,
    ) -> Result<u64> {
        Ok(self.position_of(stream)?.char_no)
    }

    pub fn line_count(
        &self,
        stream: &Stream,
    ) -> Result<u64> {
        Ok(self.position_of(stream)?.line_no)
    }

    pub fn line_position(
        &self,
        stream: &Stream,
    ) -> Result<u64> {
        Ok(self.position_of(stream)?.line_pos)
    }

    /// Copy characters from `input` to `output` until end of file or
    /// `limit` characters. Returns the number copied.
    pub fn copy_stream_data(
        &self,
        input: &Stream,
        output: &Stream,
        limit: Option<u64>,
    ) -> Result<u64> {
        if std::ptr::eq(input, output) {
            return Err(StreamError::permission("copy", "stream", input.label()));
        }
        let mut from = input.lock()?;
        let mut to = output.lock()?;
        let mut copied = 0u64;
        while limit.map_or(true, |max| copied < max) {
            match from.get_code() {
                Ok(Some(code)) => {
                    if to.put_code(code).is_err() {
                        break;
                    }
                    copied += 1;
                }
                Ok(None) | Err(_) => break,
            }
        }
        from.check_status()?;
        to.release()?;
        Ok(copied)
    }
}

fn source_name(command: &str) -> String {
    format!("pipe({command})")
}

/// Skip lines starting with `#` at the start of input.
fn skip_script_lines(g: &mut StreamGuard<'_>) -> super::error::IoResult<()> {
    while g.peek_byte()? == Some(b'#') {
        loop {
            match g.get_code()? {
                Some(0x0A) | None => break,
                Some(_) => {}
            }
        }
    }
    Ok(())
}

impl StreamGuard<'_> {
    /// Close the stream.
    ///
    /// Buffered output is flushed first and a flush failure is the result
    /// of the close. The standard streams stay open: input only has its
    /// errors cleared, output and error are flushed.
    pub fn close(mut self) -> Result<()> {
        match self.stream.std_role() {
            Some(StdRole::Input) => {
                self.clear_errors();
                Ok(())
            }
            Some(_) => {
                let _ = self.flush();
                self.check_status()
            }
            None => {
                let flushed = self.flush();
                let status = if flushed.is_err() || self.has_error() {
                    self.check_status()
                } else {
                    Ok(())
                };
                let closed = self.finish_close();
                status.and(closed)
            }
        }
    }

    /// Close the stream ignoring all errors.
    pub fn force_close(mut self) {
        let _ = self.flush();
        self.clear_errors();
        if self.stream.std_role().is_none() {
            let _ = self.finish_close();
        }
    }

    /// Flush and close an in-memory sink, returning what was written.
    pub fn close_capture(mut self) -> Result<Vec<u8>> {
        match self.take_memory() {
            Ok(bytes) => {
                self.finish_close()?;
                Ok(bytes)
            }
            Err(_) => {
                let err = self.take_error();
                let _ = self.finish_close();
                Err(err)
            }
        }
    }

    fn finish_close(mut self) -> Result<()> {
        let stream = self.stream;
        let label = stream.label();
        let closed = self.inner.close_transport();
        self.inner.release_resources();
        stream.mark_erased();
        drop(self);

        if let Some(registry) = stream.registry() {
            registry.free(stream);
        }
        stream.finalize_if_unreferenced();
        debug!(stream = stream.id(), "stream closed");
        closed.map_err(|e| StreamError::Io {
            op: "close",
            stream: label,
            message: e.to_string(),
            errno: e.raw_os_error(),
        })
    }
}
