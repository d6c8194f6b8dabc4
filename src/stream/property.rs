//! Stream properties
//!
//! A serializable snapshot of everything that can be asked about a
//! stream.

use serde::Serialize;

use super::atom::Atom;
use super::core::{BufferMode, EndOfStream, EofAction, RepresentationErrors, Stream, StreamGuard, StreamId, StreamType};
use super::encoding::{Encoding, Newline};
use super::error::Result;
use super::position::Position;
use super::registry::{Registry, StreamContext};
use super::sys::{self, RawFd};
use super::transport::{ChannelKind, Mode};

#[derive(Debug, Clone, Serialize)]
pub struct StreamProperties {
    pub id: StreamId,
    pub file_name: Option<Atom>,
    pub mode: Option<Mode>,
    pub input: bool,
    pub output: bool,
    pub aliases: Vec<Atom>,
    pub position: Option<Position>,
    /// Input streams only.
    pub end_of_stream: Option<EndOfStream>,
    pub eof_action: EofAction,
    pub reposition: bool,
    pub close_on_abort: bool,
    #[serde(rename = "type")]
    pub stream_type: StreamType,
    pub file_no: Option<RawFd>,
    pub tty: bool,
    pub bom: bool,
    pub newline: Newline,
    pub encoding: Encoding,
    pub representation_errors: RepresentationErrors,
    pub buffer: BufferMode,
    pub buffer_size: usize,
    /// Seconds; `None` is infinite.
    pub timeout: Option<f64>,
    pub close_on_exec: Option<bool>,
    pub channel: ChannelKind,
}

impl StreamProperties {
    fn capture(
        g: &StreamGuard<'_>,
        context: StreamContext,
    ) -> Self {
        let stream = g.stream();
        let file_no = g.raw_fd();
        Self {
            id: stream.id(),
            file_name: context.filename,
            mode: g.mode,
            input: stream.is_input(),
            output: stream.is_output(),
            aliases: context.aliases.into_vec(),
            position: g.position,
            end_of_stream: stream.is_input().then(|| g.end_of_stream()),
            eof_action: g.eof_action,
            reposition: g.reposition,
            close_on_abort: g.close_on_abort,
            stream_type: if g.text { StreamType::Text } else { StreamType::Binary },
            file_no,
            tty: g.tty,
            bom: g.bom,
            newline: g.newline,
            encoding: g.encoding,
            representation_errors: g.repr_errors,
            buffer: g.buffering,
            buffer_size: g.buffer_size,
            timeout: g.timeout.map(|t| t.as_secs_f64()),
            close_on_exec: file_no.and_then(|fd| sys::close_on_exec(fd).ok()),
            channel: g.kind,
        }
    }
}

impl Registry {
    /// Properties of one stream.
    pub fn properties(
        &self,
        stream: &Stream,
    ) -> Result<StreamProperties> {
        let context = self.context(stream);
        let g = stream.lock()?;
        Ok(StreamProperties::capture(&g, context))
    }

    /// Properties of every open stream. Streams closed while listing are
    /// left out.
    pub fn stream_properties(&self) -> Vec<StreamProperties> {
        self.enumerate()
            .filter_map(|(stream, context)| {
                let g = stream.lock().ok()?;
                Some(StreamProperties::capture(&g, context))
            })
            .collect()
    }
}
