//! Open options
//!
//! [`OpenOptions`] is the typed form of the option list accepted when a
//! stream is opened. Options can be built directly or parsed from
//! `(name, value)` pairs; everything is validated before any device is
//! touched.

use super::core::{BufferMode, EofAction, StreamType};
use super::encoding::{Encoding, Newline};
use super::error::{Result, StreamError};
use super::transport::{LockMode, Mode};

/// Untyped option value as supplied by a host.
#[derive(Debug, Clone, PartialEq)]
pub enum OptionValue {
    Atom(String),
    Bool(bool),
    Int(i64),
    Float(f64),
}

impl OptionValue {
    pub(crate) fn atom(
        &self,
        name: &'static str,
    ) -> Result<&str> {
        match self {
            OptionValue::Atom(a) => Ok(a),
            other => Err(StreamError::Type {
                expected: "atom",
                found: format!("{name}({other:?})"),
            }),
        }
    }

    pub(crate) fn boolean(
        &self,
        name: &'static str,
    ) -> Result<bool> {
        match self {
            OptionValue::Bool(b) => Ok(*b),
            OptionValue::Atom(a) if a == "true" => Ok(true),
            OptionValue::Atom(a) if a == "false" => Ok(false),
            other => Err(StreamError::Type {
                expected: "bool",
                found: format!("{name}({other:?})"),
            }),
        }
    }

    pub(crate) fn integer(
        &self,
        name: &'static str,
    ) -> Result<i64> {
        match self {
            OptionValue::Int(i) => Ok(*i),
            other => Err(StreamError::Type {
                expected: "integer",
                found: format!("{name}({other:?})"),
            }),
        }
    }
}

impl From<&str> for OptionValue {
    fn from(value: &str) -> Self {
        OptionValue::Atom(value.to_string())
    }
}

impl From<bool> for OptionValue {
    fn from(value: bool) -> Self {
        OptionValue::Bool(value)
    }
}

impl From<f64> for OptionValue {
    fn from(value: f64) -> Self {
        OptionValue::Float(value)
    }
}

impl From<i64> for OptionValue {
    fn from(value: i64) -> Self {
        OptionValue::Int(value)
    }
}

/// Options for opening a file or pipe.
#[derive(Debug, Clone, PartialEq)]
pub struct OpenOptions {
    pub stream_type: StreamType,
    /// Keep position counters and allow repositioning.
    pub reposition: bool,
    pub alias: Option<String>,
    /// Input only.
    pub eof_action: EofAction,
    pub close_on_abort: bool,
    /// Output only.
    pub buffer: BufferMode,
    pub buffer_size: Option<usize>,
    pub lock: LockMode,
    /// Block until the lock is granted.
    pub wait: bool,
    /// `None` uses the registry default.
    pub encoding: Option<Encoding>,
    /// `None` detects on input and writes for implicit UTF-16 output.
    pub bom: Option<bool>,
    /// Skip leading `#` lines (input only).
    pub scripting: bool,
    pub newline: Option<Newline>,
}

impl Default for OpenOptions {
    fn default() -> Self {
        Self {
            stream_type: StreamType::Text,
            reposition: true,
            alias: None,
            eof_action: EofAction::EofCode,
            close_on_abort: true,
            buffer: BufferMode::Full,
            buffer_size: None,
            lock: LockMode::None,
            wait: true,
            encoding: None,
            bom: None,
            scripting: false,
            newline: None,
        }
    }
}

impl OpenOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn binary(mut self) -> Self {
        self.stream_type = StreamType::Binary;
        self
    }

    pub fn encoding(
        mut self,
        encoding: Encoding,
    ) -> Self {
        self.encoding = Some(encoding);
        self
    }

    pub fn bom(
        mut self,
        bom: bool,
    ) -> Self {
        self.bom = Some(bom);
        self
    }

    pub fn alias(
        mut self,
        alias: &str,
    ) -> Self {
        self.alias = Some(alias.to_string());
        self
    }

    pub fn eof_action(
        mut self,
        action: EofAction,
    ) -> Self {
        self.eof_action = action;
        self
    }

    pub fn buffer(
        mut self,
        mode: BufferMode,
    ) -> Self {
        self.buffer = mode;
        self
    }

    pub fn buffer_size(
        mut self,
        size: usize,
    ) -> Self {
        self.buffer_size = Some(size);
        self
    }

    pub fn reposition(
        mut self,
        on: bool,
    ) -> Self {
        self.reposition = on;
        self
    }

    pub fn close_on_abort(
        mut self,
        on: bool,
    ) -> Self {
        self.close_on_abort = on;
        self
    }

    pub fn lock(
        mut self,
        mode: LockMode,
        wait: bool,
    ) -> Self {
        self.lock = mode;
        self.wait = wait;
        self
    }

    pub fn scripting(
        mut self,
        on: bool,
    ) -> Self {
        self.scripting = on;
        self
    }

    pub fn newline(
        mut self,
        mode: Newline,
    ) -> Self {
        self.newline = Some(mode);
        self
    }

    /// Parse an option list. Unknown names and malformed values fail.
    pub fn parse<'a, I>(options: I) -> Result<Self>
    where
        I: IntoIterator<Item = (&'a str, OptionValue)>,
    {
        let mut opts = Self::default();
        for (name, value) in options {
            match name {
                "type" => {
                    let v = value.atom("type")?;
                    opts.stream_type =
                        StreamType::from_name(v).ok_or_else(|| StreamError::domain("type", v))?;
                }
                "reposition" => opts.reposition = value.boolean("reposition")?,
                "alias" => opts.alias = Some(value.atom("alias")?.to_string()),
                "eof_action" => {
                    let v = value.atom("eof_action")?;
                    opts.eof_action =
                        EofAction::from_name(v).ok_or_else(|| StreamError::domain("eof_action", v))?;
                }
                "close_on_abort" => opts.close_on_abort = value.boolean("close_on_abort")?,
                "buffer" => {
                    let v = value.atom("buffer")?;
                    opts.buffer =
                        BufferMode::from_name(v).ok_or_else(|| StreamError::domain("buffer", v))?;
                }
                "buffer_size" => {
                    let n = value.integer("buffer_size")?;
                    if n < 1 {
                        return Err(StreamError::domain("not_less_than_one", n.to_string()));
                    }
                    opts.buffer_size = Some(n as usize);
                }
                "lock" => {
                    let v = value.atom("lock")?;
                    opts.lock = LockMode::from_name(v).ok_or_else(|| StreamError::domain("lock", v))?;
                }
                "wait" => opts.wait = value.boolean("wait")?,
                "encoding" => {
                    let v = value.atom("encoding")?;
                    opts.encoding =
                        Some(Encoding::from_name(v).ok_or_else(|| StreamError::domain("encoding", v))?);
                }
                "bom" => opts.bom = Some(value.boolean("bom")?),
                "scripting" => opts.scripting = value.boolean("scripting")?,
                "newline" => {
                    let v = value.atom("newline")?;
                    opts.newline =
                        Some(Newline::from_name(v).ok_or_else(|| StreamError::domain("newline", v))?);
                }
                other => return Err(StreamError::domain("stream_option", other)),
            }
        }
        Ok(opts)
    }

    /// Check the options against `mode` and work out the encoding and
    /// byte order mark handling.
    pub(crate) fn resolve(
        &self,
        mode: Mode,
        default_encoding: Encoding,
    ) -> Result<Resolved> {
        let binary = self.stream_type == StreamType::Binary;
        let encoding = match self.encoding {
            Some(enc) if binary && enc != Encoding::Octet => {
                return Err(StreamError::Domain {
                    domain: "encoding",
                    value: enc.name().to_string(),
                    message: Some("type(binary) implies encoding(octet)".to_string()),
                })
            }
            Some(enc) => enc,
            None if binary => Encoding::Octet,
            None => default_encoding,
        };
        if self.newline == Some(Newline::Detect) && !mode.is_input() {
            return Err(StreamError::Domain {
                domain: "newline",
                value: "detect".to_string(),
                message: Some("detect is only allowed for input streams".to_string()),
            });
        }

        let explicit = self.encoding.is_some();
        let bom_capable = !binary
            && !(explicit
                && matches!(
                    encoding,
                    Encoding::Octet | Encoding::Ascii | Encoding::IsoLatin1 | Encoding::Wchar
                ));
        let bom = if !bom_capable {
            BomAction::None
        } else if mode.is_input() {
            match self.bom {
                Some(false) => BomAction::None,
                _ => BomAction::Detect { explicit },
            }
        } else {
            let write = match self.bom {
                Some(on) => on,
                None => !explicit && matches!(encoding, Encoding::UnicodeBe | Encoding::UnicodeLe),
            };
            if write && encoding.bom().is_some() {
                BomAction::Write
            } else {
                BomAction::None
            }
        };

        Ok(Resolved {
            encoding,
            text: !binary,
            bom,
        })
    }
}

/// What to do about a byte order mark when opening.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BomAction {
    None,
    /// Consume a leading mark; with `explicit` only one matching the
    /// requested encoding.
    Detect {
        explicit: bool,
    },
    /// Write a mark if the output starts empty.
    Write,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Resolved {
    pub encoding: Encoding,
    pub text: bool,
    pub bom: BomAction,
}
