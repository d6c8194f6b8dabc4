//! Changing attributes of an open stream

use std::sync::Arc;
use std::time::Duration;

use super::core::{BufferMode, EofAction, RepresentationErrors, Stream, StreamType};
use super::encoding::{Encoding, Newline};
use super::error::{Result, StreamError};
use super::options::OptionValue;
use super::position::Position;
use super::sys;
use super::thread::{StandardSlot, StreamSpec, ThreadIo};

/// A settable stream attribute.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamAttribute {
    /// A standard alias re-points the thread's slot instead.
    Alias(String),
    Buffer(BufferMode),
    BufferSize(usize),
    EofAction(EofAction),
    Type(StreamType),
    CloseOnAbort(bool),
    RecordPosition(bool),
    LinePosition(u64),
    FileName(Option<String>),
    /// `None` is infinite.
    Timeout(Option<Duration>),
    Tty(bool),
    Encoding(Encoding),
    RepresentationErrors(RepresentationErrors),
    Newline(Newline),
    CloseOnExec(bool),
}

/// Which side of a pair an attribute concerns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Applies {
    Input,
    Output,
    Both,
    /// Refused on a pair.
    Single,
}

impl StreamAttribute {
    /// Parse `name(value)`.
    pub fn parse(
        name: &str,
        value: OptionValue,
    ) -> Result<Self> {
        fn named<T>(
            domain: &'static str,
            value: &OptionValue,
            from_name: impl Fn(&str) -> Option<T>,
        ) -> Result<T> {
            let v = value.atom(domain)?;
            from_name(v).ok_or_else(|| StreamError::domain(domain, v))
        }

        Ok(match name {
            "alias" => StreamAttribute::Alias(value.atom("alias")?.to_string()),
            "buffer" => StreamAttribute::Buffer(named("buffer", &value, BufferMode::from_name)?),
            "buffer_size" => {
                let n = value.integer("buffer_size")?;
                if n < 1 {
                    return Err(StreamError::domain("not_less_than_one", n.to_string()));
                }
                StreamAttribute::BufferSize(n as usize)
            }
            "eof_action" => StreamAttribute::EofAction(named("eof_action", &value, EofAction::from_name)?),
            "type" => StreamAttribute::Type(named("type", &value, StreamType::from_name)?),
            "close_on_abort" => StreamAttribute::CloseOnAbort(value.boolean("close_on_abort")?),
            "record_position" => StreamAttribute::RecordPosition(value.boolean("record_position")?),
            "line_position" => {
                let n = value.integer("line_position")?;
                if n < 0 {
                    return Err(StreamError::domain("not_less_than_zero", n.to_string()));
                }
                StreamAttribute::LinePosition(n as u64)
            }
            "file_name" => StreamAttribute::FileName(Some(value.atom("file_name")?.to_string())),
            "timeout" => match &value {
                OptionValue::Atom(a) if a == "infinite" => StreamAttribute::Timeout(None),
                OptionValue::Int(n) if *n >= 0 => StreamAttribute::Timeout(Some(Duration::from_secs(*n as u64))),
                OptionValue::Float(s) if s.is_finite() && *s >= 0.0 => {
                    StreamAttribute::Timeout(Some(Duration::from_secs_f64(*s)))
                }
                other => {
                    return Err(StreamError::domain("timeout", format!("{other:?}")));
                }
            },
            "tty" => StreamAttribute::Tty(value.boolean("tty")?),
            "encoding" => StreamAttribute::Encoding(named("encoding", &value, Encoding::from_name)?),
            "representation_errors" => StreamAttribute::RepresentationErrors(named(
                "representation_errors",
                &value,
                RepresentationErrors::from_name,
            )?),
            "newline" => StreamAttribute::Newline(named("newline", &value, Newline::from_name)?),
            "close_on_exec" => StreamAttribute::CloseOnExec(value.boolean("close_on_exec")?),
            other => return Err(StreamError::domain("stream_attribute", other)),
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            StreamAttribute::Alias(_) => "alias",
            StreamAttribute::Buffer(_) => "buffer",
            StreamAttribute::BufferSize(_) => "buffer_size",
            StreamAttribute::EofAction(_) => "eof_action",
            StreamAttribute::Type(_) => "type",
            StreamAttribute::CloseOnAbort(_) => "close_on_abort",
            StreamAttribute::RecordPosition(_) => "record_position",
            StreamAttribute::LinePosition(_) => "line_position",
            StreamAttribute::FileName(_) => "file_name",
            StreamAttribute::Timeout(_) => "timeout",
            StreamAttribute::Tty(_) => "tty",
            StreamAttribute::Encoding(_) => "encoding",
            StreamAttribute::RepresentationErrors(_) => "representation_errors",
            StreamAttribute::Newline(_) => "newline",
            StreamAttribute::CloseOnExec(_) => "close_on_exec",
        }
    }

    fn applies(&self) -> Applies {
        match self {
            StreamAttribute::Alias(_) | StreamAttribute::LinePosition(_) => Applies::Single,
            StreamAttribute::EofAction(_) | StreamAttribute::Timeout(_) => Applies::Input,
            StreamAttribute::Buffer(_)
            | StreamAttribute::BufferSize(_)
            | StreamAttribute::RepresentationErrors(_) => Applies::Output,
            _ => Applies::Both,
        }
    }
}

impl ThreadIo {
    /// Change an attribute of a stream. On a pair the attribute is set on
    /// the side(s) it concerns; `alias` and `line_position` are refused.
    pub fn set_stream(
        &mut self,
        spec: StreamSpec<'_>,
        attribute: StreamAttribute,
    ) -> Result<()> {
        if let StreamSpec::Handle(handle) = spec {
            if handle.is_pair() {
                let (input, output) = match attribute.applies() {
                    Applies::Single => {
                        return Err(StreamError::permission(
                            attribute.name(),
                            "stream_pair",
                            handle.to_string(),
                        ))
                    }
                    Applies::Input => (true, false),
                    Applies::Output => (false, true),
                    Applies::Both => (true, true),
                };
                if input {
                    let stream = handle.resolve(false)?;
                    self.apply_attribute(&stream, &attribute)?;
                }
                if output {
                    let stream = handle.resolve(true)?;
                    self.apply_attribute(&stream, &attribute)?;
                }
                return Ok(());
            }
        }
        let stream = self.get_stream(spec, false)?;
        self.apply_attribute(&stream, &attribute)
    }

    fn apply_attribute(
        &mut self,
        stream: &Arc<Stream>,
        attribute: &StreamAttribute,
    ) -> Result<()> {
        match attribute {
            StreamAttribute::Alias(name) => {
                match StandardSlot::from_name(name) {
                    Some(slot) => self.set_slot(slot, Some(stream.clone())),
                    None => self.registry.bind_alias(stream, name),
                }
                return Ok(());
            }
            StreamAttribute::FileName(name) => {
                self.registry.set_filename(stream, name.as_deref());
                return Ok(());
            }
            _ => {}
        }

        let culprit = stream.label();
        let mut g = stream.lock()?;
        match attribute {
            StreamAttribute::Alias(_) | StreamAttribute::FileName(_) => {}
            StreamAttribute::Buffer(mode) => {
                if *mode == BufferMode::Unbuffered {
                    let _ = g.flush();
                }
                g.buffering = *mode;
            }
            StreamAttribute::BufferSize(size) => {
                let _ = g.flush();
                g.buffer_size = *size;
            }
            StreamAttribute::EofAction(action) => g.eof_action = *action,
            StreamAttribute::Type(StreamType::Text) => {
                if !g.text {
                    g.encoding = self.registry.default_encoding();
                    g.text = true;
                }
            }
            StreamAttribute::Type(StreamType::Binary) => {
                g.encoding = Encoding::Octet;
                g.text = false;
            }
            StreamAttribute::CloseOnAbort(on) => g.close_on_abort = *on,
            StreamAttribute::RecordPosition(on) => {
                if *on {
                    if g.position.is_none() {
                        g.position = Some(Position::default());
                    }
                } else {
                    g.position = None;
                }
            }
            StreamAttribute::LinePosition(column) => match g.position.as_mut() {
                Some(pos) => pos.line_pos = *column,
                None => return Err(StreamError::permission("line_position", "stream", culprit)),
            },
            StreamAttribute::Timeout(timeout) => g.timeout = *timeout,
            StreamAttribute::Tty(on) => g.tty = *on,
            StreamAttribute::Encoding(encoding) => {
                let _ = g.flush();
                g.encoding = *encoding;
                g.text = *encoding != Encoding::Octet;
            }
            StreamAttribute::RepresentationErrors(mode) => g.repr_errors = *mode,
            StreamAttribute::Newline(Newline::Detect) if !stream.is_input() => {
                return Err(StreamError::Domain {
                    domain: "newline",
                    value: "detect".to_string(),
                    message: Some("detect is only allowed for input streams".to_string()),
                });
            }
            StreamAttribute::Newline(mode) => g.newline = *mode,
            StreamAttribute::CloseOnExec(on) => {
                let fd = g
                    .raw_fd()
                    .ok_or_else(|| StreamError::permission("close_on_exec", "stream", culprit.clone()))?;
                sys::set_close_on_exec(fd, *on).map_err(|e| StreamError::Permission {
                    action: "close_on_exec",
                    kind: "stream",
                    culprit: culprit.clone(),
                    message: Some(e.to_string()),
                })?;
            }
        }
        g.release()
    }
}
