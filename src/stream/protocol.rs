//! Session protocol
//!
//! While a protocol stream is open, every byte read from or written to
//! the three user streams is copied to it.

use std::path::Path;
use std::sync::Arc;

use tracing::debug;

use super::core::Stream;
use super::error::Result;
use super::lifecycle::Source;
use super::options::OpenOptions;
use super::thread::{StandardSlot, ThreadIo};
use super::transport::Mode;

impl ThreadIo {
    /// Start recording to `path`, replacing any current protocol.
    pub fn open_protocol(
        &mut self,
        path: &Path,
        append: bool,
    ) -> Result<()> {
        self.no_protocol()?;
        let mode = if append { Mode::Append } else { Mode::Write };
        let options = OpenOptions::new().close_on_abort(false);
        let protocol = self.registry.open(&Source::file(path), mode, &options)?;
        for slot in [
            StandardSlot::UserInput,
            StandardSlot::UserOutput,
            StandardSlot::UserError,
        ] {
            if let Some(stream) = self.slot(slot) {
                let mut g = stream.lock()?;
                g.tee = Some(protocol.clone());
            }
        }
        debug!(path = %path.display(), "protocol started");
        self.set_slot(StandardSlot::Protocol, Some(protocol));
        Ok(())
    }

    /// Stop recording and close the protocol stream.
    ///
    /// Every open stream is checked for a tee to the protocol, not only
    /// the user streams.
    pub fn no_protocol(&mut self) -> Result<()> {
        let protocol = match self.slot(StandardSlot::Protocol) {
            Some(p) => p,
            None => return Ok(()),
        };
        for (stream, _) in self.registry.enumerate() {
            if let Ok(mut g) = stream.lock() {
                if g.tee.as_ref().is_some_and(|t| Arc::ptr_eq(t, &protocol)) {
                    g.tee = None;
                }
            }
        }
        self.set_slot(StandardSlot::Protocol, None);
        debug!("protocol stopped");
        self.registry.close_stream(&protocol, false)
    }

    /// The protocol stream, if recording.
    pub fn protocolling(&self) -> Option<Arc<Stream>> {
        self.slot(StandardSlot::Protocol)
    }

    /// Write raw bytes to the protocol, if recording.
    pub fn protocol(
        &self,
        bytes: &[u8],
    ) -> Result<()> {
        match self.protocolling() {
            Some(protocol) => {
                let mut g = protocol.lock()?;
                let r = g.write_bytes(bytes);
                g.finish(r)
            }
            None => Ok(()),
        }
    }
}
