//! Edinburgh-style redirection: `see`/`seen`, `tell`/`append`/`told`
//!
//! These name streams by file name. A name is tried as an alias first,
//! then as `user`, then as a file already opened by the same family of
//! operations; only then is the file opened and the previous stream
//! saved.

use std::sync::Arc;

use super::core::Stream;
use super::decode::decode_buffered;
use super::encoding::{Encoding, Newline};
use super::error::{Result, StreamError};
use super::lifecycle::Source;
use super::options::OpenOptions;
use super::thread::{StandardSlot, ThreadIo};
use super::transport::{ChannelKind, Mode};

impl ThreadIo {
    fn existing_for_edinburgh(
        &self,
        name: &str,
        input: bool,
    ) -> Option<Arc<Stream>> {
        if name == "user" {
            return Some(if input {
                self.user_input()
            } else {
                self.user_output()
            });
        }
        if let Some(stream) = self.lookup(name) {
            if (input && stream.is_input()) || (!input && stream.is_output()) {
                return Some(stream);
            }
        }
        self.registry.find_stream_from_file(name, input, !input)
    }

    /// Make `name` the current input, opening it if needed.
    pub fn see(
        &mut self,
        name: &str,
    ) -> Result<()> {
        if let Some(stream) = self.existing_for_edinburgh(name, true) {
            self.set_slot(StandardSlot::CurrentInput, Some(stream));
            return Ok(());
        }
        let stream = self
            .registry
            .open(&Source::file(name), Mode::Read, &OpenOptions::new())?;
        self.registry.mark_opened_by(&stream, true, false);
        self.push_input("see");
        self.set_slot(StandardSlot::CurrentInput, Some(stream));
        Ok(())
    }

    /// Close the current input and restore the saved one.
    pub fn seen(&mut self) -> Result<()> {
        let stream = self.current_input();
        self.pop_input();
        self.registry.close_stream(&stream, false)
    }

    /// Make `name` the current output, truncating a newly opened file.
    pub fn tell(
        &mut self,
        name: &str,
    ) -> Result<()> {
        self.tell_mode(name, Mode::Write)
    }

    /// Make `name` the current output, appending to a newly opened file.
    pub fn append(
        &mut self,
        name: &str,
    ) -> Result<()> {
        self.tell_mode(name, Mode::Append)
    }

    fn tell_mode(
        &mut self,
        name: &str,
        mode: Mode,
    ) -> Result<()> {
        if let Some(stream) = self.existing_for_edinburgh(name, false) {
            self.set_slot(StandardSlot::CurrentOutput, Some(stream));
            return Ok(());
        }
        let stream = self
            .registry
            .open(&Source::file(name), mode, &OpenOptions::new())?;
        self.registry.mark_opened_by(&stream, false, true);
        self.push_output();
        self.set_slot(StandardSlot::CurrentOutput, Some(stream));
        Ok(())
    }

    /// Close the current output and restore the saved one.
    pub fn told(&mut self) -> Result<()> {
        let stream = self.current_output();
        self.pop_output();
        self.registry.close_stream(&stream, false)
    }

    fn edinburgh_name(
        &self,
        stream: &Stream,
        user: &Arc<Stream>,
    ) -> String {
        if std::ptr::eq(Arc::as_ptr(user), stream) {
            return "user".to_string();
        }
        match self.registry.filename(stream) {
            Some(file) => file.to_string(),
            None => self.display_name(stream),
        }
    }

    /// Name of the current input: `user`, its file name or its alias.
    pub fn seeing(&self) -> String {
        self.edinburgh_name(&self.current_input(), &self.user_input())
    }

    /// Name of the current output: `user`, its file name or its alias.
    pub fn telling(&self) -> String {
        self.edinburgh_name(&self.current_output(), &self.user_output())
    }

    /// Start collecting output in memory.
    pub fn tell_string(
        &mut self,
        encoding: Encoding,
    ) {
        let sink = self.registry.open_memory_output(encoding);
        self.push_output();
        self.set_slot(StandardSlot::CurrentOutput, Some(sink));
    }

    /// Stop collecting output started by `tell_string` and return it.
    pub fn told_string(&mut self) -> Result<String> {
        let sink = self.current_output();
        let g = sink.lock()?;
        if g.kind != ChannelKind::Memory || sink.std_role().is_some() {
            return Err(StreamError::permission(
                "told_string",
                "stream",
                self.display_name(&sink),
            ));
        }
        let encoding = g.encoding;
        let bytes = g.close_capture()?;
        self.pop_output();

        let mut newline = Newline::Posix;
        let decoded = decode_buffered(&bytes, encoding, false, &mut newline, None).map_err(|bad| {
            StreamError::Decode {
                stream: sink.label(),
                encoding,
                offset: bad.offset as u64,
            }
        })?;
        Ok(decoded
            .codes
            .into_iter()
            .map(|c| char::from_u32(c).unwrap_or(char::REPLACEMENT_CHARACTER))
            .collect())
    }
}
