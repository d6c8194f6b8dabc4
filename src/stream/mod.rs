//! YaoXiang stream engine
//!
//! Symbolic, reference-counted, thread-safe streams over files, pipes,
//! sockets, memory buffers and the standard descriptors.
//!
//! # Architecture
//!
//! ```text
//! Handle ──► Stream ──lock──► StreamGuard ──► StreamInner ──► Transport
//!              ▲                                  │ tee
//! Registry ────┘ (arena, aliases, contexts)       ▼
//!   ▲                                          protocol stream
//! ThreadIo (standard slots, redirection stacks)
//! ```
//!
//! # Example
//!
//! ```no_run
//! use yaoxiang_stream::stream::{Registry, RedirectTarget, CaptureKind, Captured};
//! use yaoxiang_stream::util::config::StreamConfig;
//!
//! let registry = Registry::new(StreamConfig::default());
//! let mut io = registry.attach_thread();
//! let (_, captured) = io
//!     .with_output_to(RedirectTarget::Capture(CaptureKind::String), |io| {
//!         io.write_output("hello")
//!     })
//!     .unwrap();
//! assert_eq!(captured, Some(Captured::String("hello".to_string())));
//! ```

pub mod atom;
pub mod attributes;
pub mod core;
pub mod decode;
pub mod edinburgh;
pub mod encoding;
pub mod error;
pub mod handle;
pub mod host;
pub mod io;
pub mod lifecycle;
pub mod options;
pub mod pending;
pub mod position;
pub mod property;
pub mod protocol;
pub mod redirect;
pub mod registry;
pub mod status;
pub mod sys;
pub mod thread;
pub mod transport;
pub mod wait;

#[cfg(test)]
mod tests;

pub use atom::Atom;
pub use attributes::StreamAttribute;
pub use self::core::{
    BufferMode, EndOfStream, EofAction, RepresentationErrors, StdRole, Stream, StreamGuard, StreamId,
    StreamInner, StreamType,
};
pub use decode::{decode_buffered, Decoded, IllegalSequence};
pub use encoding::{Encoding, Newline};
pub use error::{Direction, Faulted, IoResult, Result, StreamError};
pub use handle::Handle;
pub use host::{DefaultHost, Host};
pub use lifecycle::Source;
pub use options::{OpenOptions, OptionValue};
pub use position::Position;
pub use property::StreamProperties;
pub use redirect::{CaptureKind, Captured, InputContext, InputRedirect, OutputRedirect, RedirectTarget};
pub use registry::{OpenedBy, Registry, RegistryBuilder, SourceLocation, StreamContext};
pub use thread::{StandardSlot, StreamSpec, ThreadIo};
pub use transport::{
    ChannelKind, FileTransport, LockMode, MemoryTransport, Mode, NullTransport, PipeTransport, StdTransport,
    Transport,
};
pub use wait::WaitTimeout;
