//! Input and output redirection
//!
//! Redirection saves the current stream on a per-thread stack and installs
//! another one. [`InputRedirect`] and [`OutputRedirect`] are scoped guards:
//! finishing them explicitly or dropping them pops the stack exactly once.
//! An output redirect can also capture everything written into a memory
//! sink and hand it back as text or character codes.

use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use tracing::warn;

use super::atom::Atom;
use super::core::Stream;
use super::encoding::Encoding;
use super::error::{Direction, Result, StreamError};
use super::registry::SourceLocation;
use super::thread::{StandardSlot, StreamSpec, ThreadIo};

/// A saved current input.
#[derive(Debug)]
pub struct InputFrame {
    pub(crate) stream: Arc<Stream>,
    pub(crate) kind: Atom,
    pub(crate) source: Option<SourceLocation>,
}

/// A saved current output.
#[derive(Debug)]
pub struct OutputFrame {
    pub(crate) stream: Arc<Stream>,
}

/// One entry of the input context listing.
#[derive(Debug, Clone)]
pub struct InputContext {
    pub kind: Atom,
    pub source: Option<SourceLocation>,
    pub stream: Arc<Stream>,
}

/// The representation captured output is returned in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureKind {
    Atom,
    String,
    Codes,
    /// Codes followed by the given tail.
    CodesWithTail(Vec<u32>),
    Chars,
    CharsWithTail(Vec<char>),
}

/// Captured output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Captured {
    Atom(Atom),
    String(String),
    Codes(Vec<u32>),
    Chars(Vec<char>),
}

fn to_char(code: u32) -> char {
    char::from_u32(code).unwrap_or(char::REPLACEMENT_CHARACTER)
}

impl CaptureKind {
    /// Convert the bytes of a `wchar_t` sink.
    fn materialize(
        self,
        bytes: &[u8],
    ) -> Captured {
        let mut codes: Vec<u32> = bytes
            .chunks_exact(4)
            .map(|c| u32::from_ne_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        match self {
            CaptureKind::Atom => Captured::Atom(Atom::from(codes.into_iter().map(to_char).collect::<String>())),
            CaptureKind::String => Captured::String(codes.into_iter().map(to_char).collect()),
            CaptureKind::Codes => Captured::Codes(codes),
            CaptureKind::CodesWithTail(tail) => {
                codes.extend(tail);
                Captured::Codes(codes)
            }
            CaptureKind::Chars => Captured::Chars(codes.into_iter().map(to_char).collect()),
            CaptureKind::CharsWithTail(tail) => {
                let mut chars: Vec<char> = codes.into_iter().map(to_char).collect();
                chars.extend(tail);
                Captured::Chars(chars)
            }
        }
    }
}

/// Where redirected output goes.
#[derive(Debug, Clone)]
pub enum RedirectTarget<'a> {
    Stream(StreamSpec<'a>),
    Capture(CaptureKind),
}

impl ThreadIo {
    // ------------------------------------------------------------------
    // Stacks
    // ------------------------------------------------------------------

    /// Save the current input and the source location.
    pub fn push_input(
        &mut self,
        kind: &str,
    ) {
        let frame = InputFrame {
            stream: self.current_input(),
            kind: Atom::new(kind),
            source: self.registry.source_location(),
        };
        self.input_stack.push(frame);
    }

    /// Restore the most recently saved input. Returns `false` if nothing
    /// was saved; the current input is then reset to standard input.
    pub fn pop_input(&mut self) -> bool {
        let slot = StandardSlot::CurrentInput as usize;
        match self.input_stack.pop() {
            Some(frame) => {
                let stream = if frame.stream.is_erased() {
                    warn!(stream = %frame.stream.label(), "saved input stream was closed");
                    self.registry.std_input().clone()
                } else {
                    frame.stream
                };
                self.slots[slot] = Some(stream);
                self.registry.set_source_location(frame.source);
                true
            }
            None => {
                self.slots[slot] = Some(self.registry.std_input().clone());
                false
            }
        }
    }

    pub fn push_output(&mut self) {
        let frame = OutputFrame {
            stream: self.current_output(),
        };
        self.output_stack.push(frame);
    }

    /// Restore the most recently saved output. Returns `false` if nothing
    /// was saved; the current output is then reset to standard output.
    pub fn pop_output(&mut self) -> bool {
        let slot = StandardSlot::CurrentOutput as usize;
        match self.output_stack.pop() {
            Some(frame) => {
                let stream = if frame.stream.is_erased() {
                    warn!(stream = %frame.stream.label(), "saved output stream was closed");
                    self.registry.std_output().clone()
                } else {
                    frame.stream
                };
                self.slots[slot] = Some(stream);
                true
            }
            None => {
                self.slots[slot] = Some(self.registry.std_output().clone());
                false
            }
        }
    }

    pub fn input_depth(&self) -> usize {
        self.input_stack.len()
    }

    pub fn output_depth(&self) -> usize {
        self.output_stack.len()
    }

    /// Saved inputs, innermost first.
    pub fn input_context(&self) -> Vec<InputContext> {
        self.input_stack
            .iter()
            .rev()
            .map(|frame| InputContext {
                kind: frame.kind.clone(),
                source: frame.source.clone(),
                stream: frame.stream.clone(),
            })
            .collect()
    }

    pub fn source_location(&self) -> Option<SourceLocation> {
        self.registry.source_location()
    }

    // ------------------------------------------------------------------
    // Scoped redirection
    // ------------------------------------------------------------------

    /// Read from `stream` until the returned guard is finished or dropped.
    pub fn redirect_input(
        &mut self,
        kind: &str,
        stream: Arc<Stream>,
    ) -> Result<InputRedirect<'_>> {
        if !stream.is_input() {
            return Err(StreamError::WrongDirection {
                direction: Direction::Input,
                stream: stream.label(),
            });
        }
        self.push_input(kind);
        self.slots[StandardSlot::CurrentInput as usize] = Some(stream.clone());
        Ok(InputRedirect {
            io: self,
            stream,
            active: true,
        })
    }

    /// Send output to `target`. With `make_current` the target becomes the
    /// current output until the guard is finished or dropped.
    pub fn redirect_output(
        &mut self,
        target: RedirectTarget<'_>,
        make_current: bool,
    ) -> Result<OutputRedirect<'_>> {
        let (sink, capture) = match target {
            RedirectTarget::Stream(spec) => (self.output_stream(spec, None)?, None),
            RedirectTarget::Capture(kind) => {
                (self.registry.open_memory_output(Encoding::Wchar), Some(kind))
            }
        };
        if make_current {
            self.push_output();
            self.slots[StandardSlot::CurrentOutput as usize] = Some(sink.clone());
        }
        Ok(OutputRedirect {
            io: self,
            sink,
            capture,
            redirected: make_current,
            active: true,
        })
    }

    /// Run `f` with output redirected to `target`. On success the
    /// redirect is closed and any capture returned; on failure it is
    /// discarded.
    pub fn with_output_to<T>(
        &mut self,
        target: RedirectTarget<'_>,
        f: impl FnOnce(&mut ThreadIo) -> Result<T>,
    ) -> Result<(T, Option<Captured>)> {
        let mut redirect = self.redirect_output(target, true)?;
        match f(&mut *redirect) {
            Ok(value) => {
                let captured = redirect.close()?;
                Ok((value, captured))
            }
            Err(e) => {
                redirect.discard();
                Err(e)
            }
        }
    }
}

/// Scope of an input redirection.
pub struct InputRedirect<'io> {
    io: &'io mut ThreadIo,
    stream: Arc<Stream>,
    active: bool,
}

impl InputRedirect<'_> {
    pub fn stream(&self) -> &Arc<Stream> {
        &self.stream
    }

    /// Restore the previous input and report the status of the
    /// redirected stream. A stream closed meanwhile is not an error.
    pub fn close(mut self) -> Result<()> {
        self.active = false;
        self.io.pop_input();
        match self.stream.lock() {
            Ok(g) => g.release(),
            Err(e) if e.is_existence_error() => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Restore the previous input, ignoring the redirected stream.
    pub fn discard(mut self) {
        self.active = false;
        self.io.pop_input();
    }
}

impl Deref for InputRedirect<'_> {
    type Target = ThreadIo;

    fn deref(&self) -> &ThreadIo {
        self.io
    }
}

impl DerefMut for InputRedirect<'_> {
    fn deref_mut(&mut self) -> &mut ThreadIo {
        self.io
    }
}

impl Drop for InputRedirect<'_> {
    fn drop(&mut self) {
        if self.active {
            self.active = false;
            self.io.pop_input();
        }
    }
}

/// Scope of an output redirection.
pub struct OutputRedirect<'io> {
    io: &'io mut ThreadIo,
    sink: Arc<Stream>,
    capture: Option<CaptureKind>,
    redirected: bool,
    active: bool,
}

impl OutputRedirect<'_> {
    /// The stream output goes to.
    pub fn sink(&self) -> &Arc<Stream> {
        &self.sink
    }

    /// Finish successfully: restore the previous output and, for a
    /// capture, return what was written.
    pub fn close(mut self) -> Result<Option<Captured>> {
        self.finish(true)
    }

    /// Finish after a failure: restore the previous output and throw any
    /// capture away.
    pub fn discard(mut self) {
        let _ = self.finish(false);
    }

    fn finish(
        &mut self,
        keep: bool,
    ) -> Result<Option<Captured>> {
        if !self.active {
            return Ok(None);
        }
        self.active = false;
        if self.redirected {
            self.io.pop_output();
        }
        match self.capture.take() {
            None => match self.sink.lock() {
                Ok(mut g) => {
                    let r = g.flush();
                    if keep {
                        g.finish(r).map(|_| None)
                    } else {
                        Ok(None)
                    }
                }
                Err(e) if keep => Err(e),
                Err(_) => Ok(None),
            },
            Some(kind) => match self.sink.lock() {
                Ok(g) if keep => {
                    let bytes = g.close_capture()?;
                    Ok(Some(kind.materialize(&bytes)))
                }
                Ok(g) => {
                    g.force_close();
                    Ok(None)
                }
                Err(e) if keep => Err(e),
                Err(_) => Ok(None),
            },
        }
    }
}

impl Deref for OutputRedirect<'_> {
    type Target = ThreadIo;

    fn deref(&self) -> &ThreadIo {
        self.io
    }
}

impl DerefMut for OutputRedirect<'_> {
    fn deref_mut(&mut self) -> &mut ThreadIo {
        self.io
    }
}

impl Drop for OutputRedirect<'_> {
    fn drop(&mut self) {
        let _ = self.finish(false);
    }
}
