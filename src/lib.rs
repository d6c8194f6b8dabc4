//! YaoXiang Stream Engine
//!
//! Symbolic, reference-counted, thread-safe byte and character streams with
//! aliases, per-thread redirection, pluggable encodings and pending-input
//! decoding.
//!
//! # Example
//!
//! ```no_run
//! use yaoxiang_stream::stream::{Mode, OpenOptions, Registry, Source};
//! use yaoxiang_stream::util::config::StreamConfig;
//!
//! fn main() -> yaoxiang_stream::Result<()> {
//!     let registry = Registry::new(StreamConfig::default());
//!     let stream = registry.open(
//!         &Source::file("out.txt"),
//!         Mode::Write,
//!         &OpenOptions::new().alias("out"),
//!     )?;
//!     let mut guard = stream.lock()?;
//!     let r = guard.write_str("hello\n");
//!     guard.finish(r)?;
//!     registry.close_stream(&stream, false)?;
//!     Ok(())
//! }
//! ```
//!
//! # Crate Features
//!
//! - `debug`: Check alias table consistency when streams are freed

#![doc(html_root_url = "https://docs.rs/yaoxiang-stream")]
#![warn(rust_2018_idioms)]

// Public modules
pub mod stream;

// Utility modules
pub mod util;

// Re-exports
pub use anyhow::{Context, Result};
pub use thiserror::Error;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = "YaoXiang (爻象) stream engine";
