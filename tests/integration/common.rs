//! Shared helpers for integration tests

use std::sync::Arc;

use yaoxiang_stream::stream::{MemoryTransport, Registry};
use yaoxiang_stream::util::config::StreamConfig;

/// A registry that never touches the process's standard streams.
pub fn registry_with(config: StreamConfig) -> Arc<Registry> {
    Registry::builder()
        .config(config)
        .standard_streams(
            Box::new(MemoryTransport::reader(Vec::new())),
            Box::new(MemoryTransport::writer()),
            Box::new(MemoryTransport::writer()),
        )
        .build()
}

pub fn registry() -> Arc<Registry> {
    registry_with(StreamConfig::default())
}
