//! Per-thread stream state
//!
//! Every thread that performs I/O owns a [`ThreadIo`]: six standard slots
//! (the three user streams, current input and output and the protocol
//! stream), the redirection stacks and the prompt state. Slots may point
//! at a stream another thread has closed; such a slot resolves to its
//! fallback the next time it is read.

use std::sync::Arc;

use super::core::{Stream, StreamType};
use super::encoding::Encoding;
use super::error::{Direction, Result, StreamError};
use super::handle::Handle;
use super::redirect::{InputFrame, OutputFrame};
use super::registry::Registry;
use crate::util::config::StreamTypeCheck;

/// The six standard slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StandardSlot {
    UserInput = 0,
    UserOutput = 1,
    UserError = 2,
    CurrentInput = 3,
    CurrentOutput = 4,
    Protocol = 5,
}

impl StandardSlot {
    pub const ALL: [StandardSlot; 6] = [
        StandardSlot::UserInput,
        StandardSlot::UserOutput,
        StandardSlot::UserError,
        StandardSlot::CurrentInput,
        StandardSlot::CurrentOutput,
        StandardSlot::Protocol,
    ];

    pub fn name(self) -> &'static str {
        match self {
            StandardSlot::UserInput => "user_input",
            StandardSlot::UserOutput => "user_output",
            StandardSlot::UserError => "user_error",
            StandardSlot::CurrentInput => "current_input",
            StandardSlot::CurrentOutput => "current_output",
            StandardSlot::Protocol => "protocol",
        }
    }

    /// The slot with this standard alias.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|slot| slot.name() == name)
    }

    #[inline]
    fn index(self) -> usize {
        self as usize
    }
}

/// How a caller names the stream it wants.
#[derive(Debug, Clone, Copy)]
pub enum StreamSpec<'a> {
    /// Current input or output, depending on the direction asked for.
    Current,
    /// `user_input` or `user_output`.
    User,
    /// A standard alias or a registered alias.
    Name(&'a str),
    Handle(&'a Handle),
}

impl StreamSpec<'_> {
    fn describe(&self) -> String {
        match self {
            StreamSpec::Current => "current".to_string(),
            StreamSpec::User => "user".to_string(),
            StreamSpec::Name(name) => name.to_string(),
            StreamSpec::Handle(h) => h.to_string(),
        }
    }
}

pub struct ThreadIo {
    pub(crate) registry: Arc<Registry>,
    pub(crate) slots: [Option<Arc<Stream>>; 6],
    pub(crate) input_stack: Vec<InputFrame>,
    pub(crate) output_stack: Vec<OutputFrame>,
    pub(crate) prompt_next: bool,
}

impl Registry {
    /// Stream state for a new thread, with all slots on the standard
    /// streams.
    pub fn attach_thread(self: &Arc<Self>) -> ThreadIo {
        ThreadIo {
            registry: self.clone(),
            slots: [
                Some(self.std_input().clone()),
                Some(self.std_output().clone()),
                Some(self.std_error().clone()),
                Some(self.std_input().clone()),
                Some(self.std_output().clone()),
                None,
            ],
            input_stack: Vec::new(),
            output_stack: Vec::new(),
            prompt_next: true,
        }
    }
}

impl ThreadIo {
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Where a slot goes when its stream is closed.
    fn fallback(
        &self,
        slot: StandardSlot,
        closed: &Stream,
    ) -> Option<Arc<Stream>> {
        if closed.is_input() {
            Some(self.registry.std_input().clone())
        } else {
            match slot {
                StandardSlot::UserError => Some(self.registry.std_error().clone()),
                StandardSlot::Protocol => None,
                _ => Some(self.registry.std_output().clone()),
            }
        }
    }

    /// The stream in a slot.
    pub fn slot(
        &self,
        slot: StandardSlot,
    ) -> Option<Arc<Stream>> {
        match &self.slots[slot.index()] {
            Some(s) if s.is_erased() => self.fallback(slot, s),
            other => other.clone(),
        }
    }

    pub fn set_slot(
        &mut self,
        slot: StandardSlot,
        stream: Option<Arc<Stream>>,
    ) {
        if slot == StandardSlot::UserInput {
            self.prompt_next = true;
        }
        self.slots[slot.index()] = stream;
    }

    /// Re-point every slot whose stream was closed.
    pub fn repair_slots(&mut self) {
        for slot in StandardSlot::ALL {
            let i = slot.index();
            let closed = match &self.slots[i] {
                Some(s) if s.is_erased() => s.clone(),
                _ => continue,
            };
            self.slots[i] = self.fallback(slot, &closed);
        }
    }

    fn slot_or(
        &self,
        slot: StandardSlot,
        default: &Arc<Stream>,
    ) -> Arc<Stream> {
        self.slot(slot).unwrap_or_else(|| default.clone())
    }

    pub fn current_input(&self) -> Arc<Stream> {
        self.slot_or(StandardSlot::CurrentInput, self.registry.std_input())
    }

    pub fn current_output(&self) -> Arc<Stream> {
        self.slot_or(StandardSlot::CurrentOutput, self.registry.std_output())
    }

    pub fn user_input(&self) -> Arc<Stream> {
        self.slot_or(StandardSlot::UserInput, self.registry.std_input())
    }

    pub fn user_output(&self) -> Arc<Stream> {
        self.slot_or(StandardSlot::UserOutput, self.registry.std_output())
    }

    pub fn user_error(&self) -> Arc<Stream> {
        self.slot_or(StandardSlot::UserError, self.registry.std_error())
    }

    /// Look up a name: standard aliases first, then registered aliases.
    pub fn lookup(
        &self,
        name: &str,
    ) -> Option<Arc<Stream>> {
        match StandardSlot::from_name(name) {
            Some(slot) => self.slot(slot),
            None => self.registry.lookup_alias(name),
        }
    }

    /// Resolve a stream name without direction or type checks.
    pub fn get_stream(
        &self,
        spec: StreamSpec<'_>,
        want_output: bool,
    ) -> Result<Arc<Stream>> {
        let stream = match spec {
            StreamSpec::Current if want_output => self.current_output(),
            StreamSpec::Current => self.current_input(),
            StreamSpec::User if want_output => self.user_output(),
            StreamSpec::User => self.user_input(),
            StreamSpec::Name("user") => return self.get_stream(StreamSpec::User, want_output),
            StreamSpec::Name(name) => self
                .lookup(name)
                .ok_or_else(|| StreamError::no_such_stream(name))?,
            StreamSpec::Handle(handle) => handle.resolve(want_output)?,
        };
        if stream.is_erased() {
            return Err(StreamError::no_such_stream(spec.describe()));
        }
        Ok(stream)
    }

    /// A stream usable for input, optionally of a given type.
    pub fn input_stream(
        &self,
        spec: StreamSpec<'_>,
        want: Option<StreamType>,
    ) -> Result<Arc<Stream>> {
        let stream = self.get_stream(spec, false)?;
        if !stream.is_input() {
            return Err(StreamError::WrongDirection {
                direction: Direction::Input,
                stream: spec.describe(),
            });
        }
        self.check_stream_type(&stream, want, Direction::Input)?;
        Ok(stream)
    }

    /// A stream usable for output, optionally of a given type.
    pub fn output_stream(
        &self,
        spec: StreamSpec<'_>,
        want: Option<StreamType>,
    ) -> Result<Arc<Stream>> {
        let stream = self.get_stream(spec, true)?;
        if !stream.is_output() {
            return Err(StreamError::WrongDirection {
                direction: Direction::Output,
                stream: spec.describe(),
            });
        }
        self.check_stream_type(&stream, want, Direction::Output)?;
        Ok(stream)
    }

    fn check_stream_type(
        &self,
        stream: &Stream,
        want: Option<StreamType>,
        direction: Direction,
    ) -> Result<()> {
        let want = match want {
            Some(w) => w,
            None => return Ok(()),
        };
        let check = self.registry.config().stream_type_check;
        if check == StreamTypeCheck::Off {
            return Ok(());
        }
        let (text, encoding) = {
            let g = stream.lock()?;
            (g.text, g.encoding)
        };
        let ok = match (want, text) {
            (StreamType::Text, true) | (StreamType::Binary, false) => true,
            (StreamType::Text, false) => check == StreamTypeCheck::Loose,
            (StreamType::Binary, true) => {
                check == StreamTypeCheck::Loose
                    && matches!(encoding.resolved(), Encoding::Octet | Encoding::IsoLatin1)
            }
        };
        if ok {
            Ok(())
        } else {
            Err(StreamError::WrongKind {
                direction,
                kind: if text { "text_stream" } else { "binary_stream" },
                stream: self.display_name(stream),
            })
        }
    }

    /// Make `spec` the current input.
    pub fn set_input(
        &mut self,
        spec: StreamSpec<'_>,
    ) -> Result<()> {
        let stream = self.input_stream(spec, None)?;
        self.slots[StandardSlot::CurrentInput.index()] = Some(stream);
        Ok(())
    }

    /// Make `spec` the current output.
    pub fn set_output(
        &mut self,
        spec: StreamSpec<'_>,
    ) -> Result<()> {
        let stream = self.output_stream(spec, None)?;
        self.slots[StandardSlot::CurrentOutput.index()] = Some(stream);
        Ok(())
    }

    /// Name of a stream for printing: its standard alias, its first
    /// alias or its handle text.
    pub fn display_name(
        &self,
        stream: &Stream,
    ) -> String {
        let standard = [
            StandardSlot::UserInput,
            StandardSlot::UserOutput,
            StandardSlot::UserError,
        ];
        for slot in standard {
            if let Some(s) = &self.slots[slot.index()] {
                if std::ptr::eq(Arc::as_ptr(s), stream) {
                    return slot.name().to_string();
                }
            }
        }
        self.registry.describe(stream)
    }

    /// Close a stream by name or handle, then repair the slots.
    pub fn close(
        &mut self,
        spec: StreamSpec<'_>,
        force: bool,
    ) -> Result<()> {
        let result = match spec {
            StreamSpec::Handle(handle) => self.registry.close(handle, force),
            other => {
                let stream = self.get_stream(other, false)?;
                self.registry.close_stream(&stream, force)
            }
        };
        self.repair_slots();
        result
    }

    /// Write text to the current output.
    pub fn write_output(
        &self,
        text: &str,
    ) -> Result<()> {
        let stream = self.current_output();
        let mut g = stream.lock()?;
        let r = g.write_str(text);
        g.finish(r)
    }

    /// Read one character from the current input.
    pub fn read_code(&self) -> Result<Option<u32>> {
        let stream = self.current_input();
        let mut g = stream.lock()?;
        let r = g.get_code();
        g.finish(r)
    }

    /// Whether a prompt should be shown before the next read from the
    /// user input. Reading the flag resets it.
    pub fn take_prompt_request(&mut self) -> bool {
        std::mem::take(&mut self.prompt_next)
    }
}
