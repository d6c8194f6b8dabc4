//! The embedding host
//!
//! The stream layer calls back into its host at a few points: to run the
//! interrupt checkpoint when a blocking wait is interrupted by a signal
//! and to ask for the host's preferred text encoding.

use std::fmt;

use super::encoding::Encoding;
use super::error::Result;

pub trait Host: Send + Sync + fmt::Debug {
    /// Interrupt checkpoint. Returning an error aborts the interrupted
    /// operation with that error.
    fn handle_signals(&self) -> Result<()> {
        Ok(())
    }

    /// Encoding for text streams opened without one. `None` defers to the
    /// configuration.
    fn default_encoding(&self) -> Option<Encoding> {
        None
    }
}

/// A host with no signal handling and no encoding preference.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultHost;

impl Host for DefaultHost {}
