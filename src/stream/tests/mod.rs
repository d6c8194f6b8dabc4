//! Stream engine unit tests

use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::stream::transport::{ChannelKind, MemoryTransport, Transport};
use crate::stream::{Host, Registry, StreamError};
use crate::util::config::StreamConfig;

mod attributes;
mod edinburgh;
mod redirect;
mod registry;

/// A registry whose standard streams are in-memory buffers.
pub(super) fn test_registry() -> Arc<Registry> {
    test_registry_with(StreamConfig::default())
}

pub(super) fn test_registry_with(config: StreamConfig) -> Arc<Registry> {
    test_registry_full(config, Arc::new(crate::stream::DefaultHost))
}

/// A registry with in-memory standard streams and a custom host.
pub(super) fn test_registry_with_host(host: Arc<dyn Host>) -> Arc<Registry> {
    test_registry_full(StreamConfig::default(), host)
}

fn test_registry_full(
    config: StreamConfig,
    host: Arc<dyn Host>,
) -> Arc<Registry> {
    Registry::builder()
        .config(config)
        .host(host)
        .standard_streams(
            Box::new(MemoryTransport::reader(Vec::new())),
            Box::new(MemoryTransport::writer()),
            Box::new(MemoryTransport::writer()),
        )
        .build()
}

/// A device on which every write fails.
#[derive(Debug)]
pub(super) struct BrokenTransport;

impl Transport for BrokenTransport {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Pipe
    }

    fn write(
        &mut self,
        _buf: &[u8],
    ) -> io::Result<()> {
        Err(io::Error::new(io::ErrorKind::BrokenPipe, "broken pipe"))
    }
}

/// A host that counts interrupt checkpoints and optionally cancels.
#[derive(Debug, Default)]
pub(super) struct CheckpointHost {
    pub(super) cancel: bool,
    pub(super) calls: AtomicUsize,
}

impl CheckpointHost {
    pub(super) fn cancelling() -> Self {
        Self {
            cancel: true,
            calls: AtomicUsize::new(0),
        }
    }

    pub(super) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Host for CheckpointHost {
    fn handle_signals(&self) -> crate::stream::Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.cancel {
            Err(StreamError::Cancelled {
                reason: "interrupt".to_string(),
            })
        } else {
            Ok(())
        }
    }
}
