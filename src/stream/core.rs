//! Streams and stream locking
//!
//! A [`Stream`] is shared through `Arc` by every handle, alias and
//! per-thread slot that refers to it. Its mutable state lives in a
//! [`StreamInner`] behind a mutex; all access goes through a
//! [`StreamGuard`].
//!
//! Lifetime rules:
//!
//! - Handles held by the host count as *references*. A closed stream is
//!   *erased*: lookups fail, but the object stays alive while references
//!   remain.
//! - A stream is *finalized* exactly once, when it is erased and the last
//!   reference goes away, whichever happens last.

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::{Mutex, MutexGuard};
use serde::{Deserialize, Serialize};
use tracing::trace;

use super::encoding::{Encoding, Newline};
use super::error::{Result, StreamError};
use super::host::Host;
use super::position::Position;
use super::registry::Registry;
use super::transport::{ChannelKind, Mode, Transport};
use crate::util::config::StreamConfig;

/// Identity of a stream. Never reused within a registry.
pub type StreamId = u64;

/// The role of one of the three process-wide standard streams.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StdRole {
    Input,
    Output,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum BufferMode {
    #[default]
    #[serde(rename = "full")]
    Full,
    #[serde(rename = "line")]
    Line,
    #[serde(rename = "false")]
    Unbuffered,
}

impl BufferMode {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "full" => Some(BufferMode::Full),
            "line" => Some(BufferMode::Line),
            "false" => Some(BufferMode::Unbuffered),
            _ => None,
        }
    }
}

/// What reading at end of file does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EofAction {
    /// Return end of file, and keep returning it.
    #[default]
    EofCode,
    /// Return end of file once; reading again is an error.
    Error,
    /// Clear the condition and try again (terminals).
    Reset,
}

impl EofAction {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "eof_code" => Some(EofAction::EofCode),
            "error" => Some(EofAction::Error),
            "reset" => Some(EofAction::Reset),
            _ => None,
        }
    }
}

/// Handling of characters the output encoding cannot represent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepresentationErrors {
    #[default]
    Error,
    /// Write `\x<hex>\`.
    Prolog,
    /// Write `&#<decimal>;`.
    Xml,
}

impl RepresentationErrors {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "error" => Some(RepresentationErrors::Error),
            "prolog" => Some(RepresentationErrors::Prolog),
            "xml" => Some(RepresentationErrors::Xml),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamType {
    #[default]
    Text,
    Binary,
}

impl StreamType {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "text" => Some(StreamType::Text),
            "binary" => Some(StreamType::Binary),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EndOfStream {
    Not,
    At,
    Past,
}

/// A recorded, not yet reported, error condition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Fault {
    pub kind: FaultKind,
    /// Sticky faults survive being reported.
    pub sticky: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum FaultKind {
    PastEof,
    Timeout {
        op: &'static str,
    },
    Io {
        op: &'static str,
        message: String,
        errno: Option<i32>,
    },
    /// The host's interrupt checkpoint failed after an interrupted call.
    Cancelled {
        reason: String,
    },
}

// ============================================================================
// Stream
// ============================================================================

pub struct Stream {
    id: StreamId,
    input: bool,
    output: bool,
    std_role: Option<StdRole>,
    inner: Mutex<StreamInner>,
    references: AtomicUsize,
    erased: AtomicBool,
    finalized: AtomicBool,
    finalizations: AtomicUsize,
    registry: Weak<Registry>,
}

impl Stream {
    pub(crate) fn new(
        id: StreamId,
        std_role: Option<StdRole>,
        inner: StreamInner,
        registry: Weak<Registry>,
    ) -> Self {
        Self {
            id,
            input: inner.input,
            output: inner.output,
            std_role,
            inner: Mutex::new(inner),
            references: AtomicUsize::new(0),
            erased: AtomicBool::new(false),
            finalized: AtomicBool::new(false),
            finalizations: AtomicUsize::new(0),
            registry,
        }
    }

    #[inline]
    pub fn id(&self) -> StreamId {
        self.id
    }

    #[inline]
    pub fn is_input(&self) -> bool {
        self.input
    }

    #[inline]
    pub fn is_output(&self) -> bool {
        self.output
    }

    pub fn std_role(&self) -> Option<StdRole> {
        self.std_role
    }

    /// Whether the stream has been closed.
    pub fn is_erased(&self) -> bool {
        self.erased.load(Ordering::SeqCst)
    }

    /// Number of host handles referring to this stream.
    pub fn references(&self) -> usize {
        self.references.load(Ordering::SeqCst)
    }

    /// How often the stream was finalized; 0 or 1.
    pub fn finalizations(&self) -> usize {
        self.finalizations.load(Ordering::SeqCst)
    }

    pub fn registry(&self) -> Option<Arc<Registry>> {
        self.registry.upgrade()
    }

    /// Printable name used in error messages.
    pub fn label(&self) -> String {
        format!("<stream>(#{})", self.id)
    }

    /// Lock the stream for exclusive use.
    ///
    /// Fails with an existence error if the stream was closed, including
    /// when it is closed by another thread while this one waits.
    pub fn lock(&self) -> Result<StreamGuard<'_>> {
        if self.is_erased() {
            return Err(StreamError::no_such_stream(self.label()));
        }
        let inner = self.inner.lock();
        if self.is_erased() {
            return Err(StreamError::no_such_stream(self.label()));
        }
        Ok(StreamGuard {
            stream: self,
            inner,
        })
    }

    /// Lock the stream if that can be done without waiting.
    pub fn try_lock(&self) -> Option<StreamGuard<'_>> {
        if self.is_erased() {
            return None;
        }
        let inner = self.inner.try_lock()?;
        Some(StreamGuard {
            stream: self,
            inner,
        })
    }

    pub(crate) fn acquire_ref(&self) {
        self.references.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn release_ref(&self) {
        if self.references.fetch_sub(1, Ordering::SeqCst) == 1 && self.is_erased() {
            self.finalize();
        }
    }

    /// Mark the stream closed. Called with the stream locked.
    pub(crate) fn mark_erased(&self) {
        self.erased.store(true, Ordering::SeqCst);
    }

    /// Finalize if no handle refers to the stream any more. Called after
    /// the closing thread dropped its lock.
    pub(crate) fn finalize_if_unreferenced(&self) {
        if self.references() == 0 {
            self.finalize();
        }
    }

    fn finalize(&self) {
        if self.finalized.swap(true, Ordering::SeqCst) {
            return;
        }
        self.finalizations.fetch_add(1, Ordering::SeqCst);
        if let Some(mut inner) = self.inner.try_lock() {
            inner.release_resources();
        }
        trace!(stream = self.id, "stream finalized");
    }
}

impl fmt::Debug for Stream {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("Stream")
            .field("id", &self.id)
            .field("input", &self.input)
            .field("output", &self.output)
            .field("std_role", &self.std_role)
            .field("erased", &self.is_erased())
            .field("references", &self.references())
            .finish()
    }
}

// ============================================================================
// StreamInner
// ============================================================================

/// The mutable state of a stream. Only reachable through a [`StreamGuard`].
#[derive(Debug)]
pub struct StreamInner {
    pub(crate) id: StreamId,
    pub(crate) input: bool,
    pub(crate) output: bool,
    pub(crate) mode: Option<Mode>,
    pub(crate) kind: ChannelKind,
    pub(crate) transport: Option<Box<dyn Transport>>,
    pub(crate) rbuf: Vec<u8>,
    pub(crate) rpos: usize,
    pub(crate) wbuf: Vec<u8>,
    pub(crate) buffer_size: usize,
    pub(crate) buffering: BufferMode,
    pub(crate) encoding: Encoding,
    pub(crate) text: bool,
    pub(crate) newline: Newline,
    pub(crate) timeout: Option<Duration>,
    pub(crate) position: Option<Position>,
    pub(crate) eof_action: EofAction,
    pub(crate) at_eof: bool,
    pub(crate) past_eof: bool,
    pub(crate) fault: Option<Fault>,
    pub(crate) warning: Option<String>,
    pub(crate) sticky_errors: bool,
    pub(crate) close_on_abort: bool,
    pub(crate) tty: bool,
    pub(crate) repr_errors: RepresentationErrors,
    pub(crate) bom: bool,
    pub(crate) reposition: bool,
    pub(crate) max_pending: usize,
    pub(crate) tee: Option<Arc<Stream>>,
    /// Interrupt checkpoint for blocking reads.
    pub(crate) host: Option<Arc<dyn Host>>,
}

impl StreamInner {
    pub(crate) fn new(
        id: StreamId,
        transport: Box<dyn Transport>,
        input: bool,
        output: bool,
        config: &StreamConfig,
    ) -> Self {
        let kind = transport.kind();
        let tty = transport.is_tty();
        Self {
            id,
            input,
            output,
            mode: None,
            kind,
            transport: Some(transport),
            rbuf: Vec::new(),
            rpos: 0,
            wbuf: Vec::new(),
            buffer_size: config.buffer_size.max(1),
            buffering: BufferMode::Full,
            encoding: config.default_encoding,
            text: true,
            newline: if input { Newline::Posix } else { config.newline },
            timeout: None,
            position: Some(Position::default()),
            eof_action: if tty { EofAction::Reset } else { EofAction::EofCode },
            at_eof: false,
            past_eof: false,
            fault: None,
            warning: None,
            sticky_errors: !tty,
            close_on_abort: true,
            tty,
            repr_errors: RepresentationErrors::Error,
            bom: false,
            reposition: kind.seekable(),
            max_pending: config.max_pending.max(1),
            tee: None,
            host: None,
        }
    }

    /// Drop buffers, the tee and the transport.
    pub(crate) fn release_resources(&mut self) {
        self.rbuf = Vec::new();
        self.rpos = 0;
        self.wbuf = Vec::new();
        self.tee = None;
        self.transport = None;
    }
}

// ============================================================================
// StreamGuard
// ============================================================================

/// Exclusive access to a locked stream. Dropping the guard unlocks it
/// without looking at recorded errors; use `release` to have them
/// reported.
pub struct StreamGuard<'a> {
    pub(crate) stream: &'a Stream,
    pub(crate) inner: MutexGuard<'a, StreamInner>,
}

impl<'a> StreamGuard<'a> {
    pub fn stream(&self) -> &'a Stream {
        self.stream
    }
}

impl Deref for StreamGuard<'_> {
    type Target = StreamInner;

    fn deref(&self) -> &StreamInner {
        &self.inner
    }
}

impl DerefMut for StreamGuard<'_> {
    fn deref_mut(&mut self) -> &mut StreamInner {
        &mut self.inner
    }
}
