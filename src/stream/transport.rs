//! Byte transports
//!
//! A [`Transport`] is the device behind a stream: a file, a pipe to a
//! child process, a socket, an in-memory buffer, the null device or one of
//! the process' standard descriptors. Streams own their transport and do
//! all buffering and character handling themselves.

use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

use serde::{Deserialize, Serialize};

#[cfg(unix)]
use super::error::Direction;
use super::sys::{self, RawFd};

/// What kind of device a stream is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    File,
    Pipe,
    Socket,
    Memory,
    Null,
    Std,
}

impl ChannelKind {
    /// Whether the device supports seeking.
    pub fn seekable(self) -> bool {
        matches!(self, ChannelKind::File | ChannelKind::Memory)
    }
}

/// Open mode of a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    Read,
    Write,
    Append,
    Update,
}

impl Mode {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "read" => Some(Mode::Read),
            "write" => Some(Mode::Write),
            "append" => Some(Mode::Append),
            "update" => Some(Mode::Update),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Mode::Read => "read",
            Mode::Write => "write",
            Mode::Append => "append",
            Mode::Update => "update",
        }
    }

    pub fn is_input(self) -> bool {
        self == Mode::Read
    }
}

/// Advisory file lock taken at open time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockMode {
    #[default]
    None,
    Shared,
    Exclusive,
}

impl LockMode {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "none" => Some(LockMode::None),
            "read" | "shared" => Some(LockMode::Shared),
            "write" | "exclusive" => Some(LockMode::Exclusive),
            _ => None,
        }
    }
}

fn unsupported(op: &str) -> io::Error {
    io::Error::new(
        io::ErrorKind::Unsupported,
        format!("{op} is not supported on this stream"),
    )
}

/// The device behind a stream.
pub trait Transport: Send + fmt::Debug {
    fn kind(&self) -> ChannelKind;

    /// Read at most `buf.len()` bytes. `Ok(0)` means end of file.
    fn read(
        &mut self,
        _buf: &mut [u8],
    ) -> io::Result<usize> {
        Err(unsupported("reading"))
    }

    /// Write all of `buf`.
    fn write(
        &mut self,
        _buf: &[u8],
    ) -> io::Result<()> {
        Err(unsupported("writing"))
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }

    fn seek(
        &mut self,
        _pos: SeekFrom,
    ) -> io::Result<u64> {
        Err(unsupported("seeking"))
    }

    fn size(&mut self) -> io::Result<u64> {
        Err(unsupported("size"))
    }

    fn truncate(
        &mut self,
        _len: u64,
    ) -> io::Result<()> {
        Err(unsupported("truncating"))
    }

    /// Release the device. The transport is dropped afterwards.
    fn close(&mut self) -> io::Result<()> {
        self.flush()
    }

    fn raw_fd(&self) -> Option<RawFd> {
        None
    }

    fn is_tty(&self) -> bool {
        self.raw_fd().map(sys::is_tty).unwrap_or(false)
    }

    /// Hand out the collected bytes of an in-memory sink.
    fn take_contents(&mut self) -> Option<Vec<u8>> {
        None
    }
}

// ============================================================================
// Files
// ============================================================================

#[derive(Debug)]
pub struct FileTransport {
    file: File,
    path: PathBuf,
}

impl FileTransport {
    pub fn open(
        path: &Path,
        mode: Mode,
    ) -> io::Result<Self> {
        let mut options = OpenOptions::new();
        match mode {
            Mode::Read => options.read(true),
            Mode::Write => options.write(true).create(true).truncate(true),
            Mode::Append => options.append(true).create(true),
            Mode::Update => options.write(true).create(true),
        };
        let file = options.open(path)?;
        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Lock the file, blocking unless `wait` is false.
    pub fn lock(
        &self,
        mode: LockMode,
        wait: bool,
    ) -> io::Result<()> {
        match self.raw_fd() {
            Some(fd) => sys::flock(fd, mode, wait),
            None => Ok(()),
        }
    }
}

impl Transport for FileTransport {
    fn kind(&self) -> ChannelKind {
        ChannelKind::File
    }

    fn read(
        &mut self,
        buf: &mut [u8],
    ) -> io::Result<usize> {
        self.file.read(buf)
    }

    fn write(
        &mut self,
        buf: &[u8],
    ) -> io::Result<()> {
        self.file.write_all(buf)
    }

    fn seek(
        &mut self,
        pos: SeekFrom,
    ) -> io::Result<u64> {
        self.file.seek(pos)
    }

    fn size(&mut self) -> io::Result<u64> {
        Ok(self.file.metadata()?.len())
    }

    fn truncate(
        &mut self,
        len: u64,
    ) -> io::Result<()> {
        self.file.set_len(len)
    }

    #[cfg(unix)]
    fn raw_fd(&self) -> Option<RawFd> {
        use std::os::unix::io::AsRawFd;
        Some(self.file.as_raw_fd())
    }
}

// ============================================================================
// Pipes
// ============================================================================

/// One end of a pipe to `sh -c <command>`.
#[derive(Debug)]
pub struct PipeTransport {
    command: String,
    child: Child,
    reader: Option<ChildStdout>,
    writer: Option<ChildStdin>,
}

impl PipeTransport {
    pub fn spawn(
        command: &str,
        mode: Mode,
    ) -> io::Result<Self> {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(command);
        match mode {
            Mode::Read => cmd.stdout(Stdio::piped()),
            Mode::Write | Mode::Append => cmd.stdin(Stdio::piped()),
            Mode::Update => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "pipes cannot be opened for update",
                ))
            }
        };
        let mut child = cmd.spawn()?;
        Ok(Self {
            command: command.to_string(),
            reader: child.stdout.take(),
            writer: child.stdin.take(),
            child,
        })
    }

    pub fn command(&self) -> &str {
        &self.command
    }
}

impl Transport for PipeTransport {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Pipe
    }

    fn read(
        &mut self,
        buf: &mut [u8],
    ) -> io::Result<usize> {
        match self.reader.as_mut() {
            Some(r) => r.read(buf),
            None => Err(unsupported("reading")),
        }
    }

    fn write(
        &mut self,
        buf: &[u8],
    ) -> io::Result<()> {
        match self.writer.as_mut() {
            Some(w) => w.write_all(buf),
            None => Err(unsupported("writing")),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.writer.as_mut() {
            Some(w) => w.flush(),
            None => Ok(()),
        }
    }

    fn close(&mut self) -> io::Result<()> {
        let flushed = self.flush();
        self.writer = None;
        self.reader = None;
        self.child.wait()?;
        flushed
    }

    #[cfg(unix)]
    fn raw_fd(&self) -> Option<RawFd> {
        use std::os::unix::io::AsRawFd;
        match (&self.reader, &self.writer) {
            (Some(r), _) => Some(r.as_raw_fd()),
            (None, Some(w)) => Some(w.as_raw_fd()),
            (None, None) => None,
        }
    }
}

// ============================================================================
// Sockets
// ============================================================================

/// One direction of a connected Unix socket. The two halves of a socket
/// pair each own a clone of the socket and shut their direction down on
/// close.
#[cfg(unix)]
#[derive(Debug)]
pub struct SocketTransport {
    socket: std::os::unix::net::UnixStream,
    direction: Direction,
}

#[cfg(unix)]
impl SocketTransport {
    pub fn new(
        socket: std::os::unix::net::UnixStream,
        direction: Direction,
    ) -> Self {
        Self { socket, direction }
    }
}

#[cfg(unix)]
impl Transport for SocketTransport {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Socket
    }

    fn read(
        &mut self,
        buf: &mut [u8],
    ) -> io::Result<usize> {
        self.socket.read(buf)
    }

    fn write(
        &mut self,
        buf: &[u8],
    ) -> io::Result<()> {
        self.socket.write_all(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.socket.flush()
    }

    fn close(&mut self) -> io::Result<()> {
        let how = match self.direction {
            Direction::Input => std::net::Shutdown::Read,
            Direction::Output => std::net::Shutdown::Write,
        };
        self.flush()?;
        match self.socket.shutdown(how) {
            Err(e) if e.kind() != io::ErrorKind::NotConnected => Err(e),
            _ => Ok(()),
        }
    }

    fn raw_fd(&self) -> Option<RawFd> {
        use std::os::unix::io::AsRawFd;
        Some(self.socket.as_raw_fd())
    }
}

// ============================================================================
// Memory
// ============================================================================

/// An in-memory byte buffer.
///
/// A reader can be limited to hand out at most `chunk` bytes per read,
/// which models input arriving in pieces.
#[derive(Debug, Default)]
pub struct MemoryTransport {
    data: Vec<u8>,
    pos: usize,
    chunk: Option<usize>,
}

impl MemoryTransport {
    pub fn reader(data: impl Into<Vec<u8>>) -> Self {
        Self {
            data: data.into(),
            pos: 0,
            chunk: None,
        }
    }

    pub fn chunked(
        data: impl Into<Vec<u8>>,
        chunk: usize,
    ) -> Self {
        Self {
            data: data.into(),
            pos: 0,
            chunk: Some(chunk.max(1)),
        }
    }

    pub fn writer() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> &[u8] {
        &self.data
    }
}

impl Transport for MemoryTransport {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Memory
    }

    fn read(
        &mut self,
        buf: &mut [u8],
    ) -> io::Result<usize> {
        let remaining = self.data.len().saturating_sub(self.pos);
        let mut n = remaining.min(buf.len());
        if let Some(chunk) = self.chunk {
            n = n.min(chunk);
        }
        buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }

    fn write(
        &mut self,
        buf: &[u8],
    ) -> io::Result<()> {
        let end = self.pos + buf.len();
        if self.data.len() < end {
            self.data.resize(end, 0);
        }
        self.data[self.pos..end].copy_from_slice(buf);
        self.pos = end;
        Ok(())
    }

    fn seek(
        &mut self,
        pos: SeekFrom,
    ) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(off) => Some(off),
            SeekFrom::Current(delta) => (self.pos as u64).checked_add_signed(delta),
            SeekFrom::End(delta) => (self.data.len() as u64).checked_add_signed(delta),
        };
        match target {
            Some(off) => {
                self.pos = off as usize;
                Ok(off)
            }
            None => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "seek before start of buffer",
            )),
        }
    }

    fn size(&mut self) -> io::Result<u64> {
        Ok(self.data.len() as u64)
    }

    fn truncate(
        &mut self,
        len: u64,
    ) -> io::Result<()> {
        self.data.resize(len as usize, 0);
        Ok(())
    }

    fn take_contents(&mut self) -> Option<Vec<u8>> {
        self.pos = 0;
        Some(std::mem::take(&mut self.data))
    }
}

// ============================================================================
// Null device
// ============================================================================

/// Reads end of file immediately and discards all output.
#[derive(Debug, Default)]
pub struct NullTransport;

impl Transport for NullTransport {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Null
    }

    fn read(
        &mut self,
        _buf: &mut [u8],
    ) -> io::Result<usize> {
        Ok(0)
    }

    fn write(
        &mut self,
        _buf: &[u8],
    ) -> io::Result<()> {
        Ok(())
    }

    fn seek(
        &mut self,
        _pos: SeekFrom,
    ) -> io::Result<u64> {
        Ok(0)
    }

    fn size(&mut self) -> io::Result<u64> {
        Ok(0)
    }
}

// ============================================================================
// Standard descriptors
// ============================================================================

/// One of the process' standard descriptors.
#[derive(Debug)]
pub enum StdTransport {
    Stdin(io::Stdin),
    Stdout(io::Stdout),
    Stderr(io::Stderr),
}

impl StdTransport {
    pub fn stdin() -> Self {
        StdTransport::Stdin(io::stdin())
    }

    pub fn stdout() -> Self {
        StdTransport::Stdout(io::stdout())
    }

    pub fn stderr() -> Self {
        StdTransport::Stderr(io::stderr())
    }
}

impl Transport for StdTransport {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Std
    }

    fn read(
        &mut self,
        buf: &mut [u8],
    ) -> io::Result<usize> {
        match self {
            StdTransport::Stdin(s) => s.read(buf),
            _ => Err(unsupported("reading")),
        }
    }

    fn write(
        &mut self,
        buf: &[u8],
    ) -> io::Result<()> {
        match self {
            StdTransport::Stdout(s) => s.write_all(buf),
            StdTransport::Stderr(s) => s.write_all(buf),
            StdTransport::Stdin(_) => Err(unsupported("writing")),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            StdTransport::Stdout(s) => s.flush(),
            StdTransport::Stderr(s) => s.flush(),
            StdTransport::Stdin(_) => Ok(()),
        }
    }

    fn raw_fd(&self) -> Option<RawFd> {
        Some(match self {
            StdTransport::Stdin(_) => 0,
            StdTransport::Stdout(_) => 1,
            StdTransport::Stderr(_) => 2,
        })
    }
}
