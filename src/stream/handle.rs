//! Host-visible stream handles
//!
//! A [`Handle`] names one stream or an input/output pair. Every live handle
//! holds a reference on each of its streams: cloning acquires, dropping
//! releases.

use std::fmt;
use std::sync::Arc;

use super::core::Stream;
use super::error::{Direction, Result, StreamError};

pub struct Handle {
    read: Option<Arc<Stream>>,
    write: Option<Arc<Stream>>,
}

impl Handle {
    /// Build a handle from its two sides; at least one must be present.
    pub fn new(
        read: Option<Arc<Stream>>,
        write: Option<Arc<Stream>>,
    ) -> Result<Self> {
        if read.is_none() && write.is_none() {
            return Err(StreamError::Type {
                expected: "stream",
                found: "empty handle".to_string(),
            });
        }
        for s in read.iter().chain(write.iter()) {
            s.acquire_ref();
        }
        Ok(Self { read, write })
    }

    /// A handle for a single stream.
    pub fn from_stream(stream: Arc<Stream>) -> Self {
        stream.acquire_ref();
        if stream.is_input() {
            Self {
                read: Some(stream),
                write: None,
            }
        } else {
            Self {
                read: None,
                write: Some(stream),
            }
        }
    }

    /// Combine an input and an output stream into a pair.
    pub fn pair(
        input: Arc<Stream>,
        output: Arc<Stream>,
    ) -> Result<Self> {
        if !input.is_input() {
            return Err(StreamError::WrongDirection {
                direction: Direction::Input,
                stream: input.label(),
            });
        }
        if !output.is_output() {
            return Err(StreamError::WrongDirection {
                direction: Direction::Output,
                stream: output.label(),
            });
        }
        Self::new(Some(input), Some(output))
    }

    pub fn read_side(&self) -> Option<&Arc<Stream>> {
        self.read.as_ref()
    }

    pub fn write_side(&self) -> Option<&Arc<Stream>> {
        self.write.as_ref()
    }

    pub fn is_pair(&self) -> bool {
        self.read.is_some() && self.write.is_some()
    }

    /// The streams behind this handle, read side first.
    pub fn streams(&self) -> impl Iterator<Item = &Arc<Stream>> + '_ {
        self.read.iter().chain(self.write.iter())
    }

    /// The side used for the requested direction. A single-sided handle
    /// answers with its only stream; direction checks are up to the
    /// caller.
    pub fn resolve(
        &self,
        want_output: bool,
    ) -> Result<Arc<Stream>> {
        let side = if want_output {
            self.write.as_ref().or(self.read.as_ref())
        } else {
            self.read.as_ref().or(self.write.as_ref())
        };
        match side {
            Some(s) if !s.is_erased() => Ok(s.clone()),
            _ => Err(StreamError::no_such_stream(self.to_string())),
        }
    }

    /// Separate a pair into single-stream handles.
    pub fn split(&self) -> (Option<Handle>, Option<Handle>) {
        (
            self.read.clone().map(Handle::from_stream),
            self.write.clone().map(Handle::from_stream),
        )
    }

    /// Whether the handle refers to `stream` on either side.
    pub fn refers_to(
        &self,
        stream: &Stream,
    ) -> bool {
        self.streams().any(|s| std::ptr::eq(Arc::as_ptr(s), stream))
    }
}

impl Clone for Handle {
    fn clone(&self) -> Self {
        for s in self.streams() {
            s.acquire_ref();
        }
        Self {
            read: self.read.clone(),
            write: self.write.clone(),
        }
    }
}

impl Drop for Handle {
    fn drop(&mut self) {
        for s in self.read.iter().chain(self.write.iter()) {
            s.release_ref();
        }
    }
}

impl PartialEq for Handle {
    fn eq(
        &self,
        other: &Self,
    ) -> bool {
        fn same(
            a: &Option<Arc<Stream>>,
            b: &Option<Arc<Stream>>,
        ) -> bool {
            match (a, b) {
                (Some(a), Some(b)) => Arc::ptr_eq(a, b),
                (None, None) => true,
                _ => false,
            }
        }
        same(&self.read, &other.read) && same(&self.write, &other.write)
    }
}

impl Eq for Handle {}

impl fmt::Display for Handle {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        let ids: Vec<String> = self.streams().map(|s| format!("#{}", s.id())).collect();
        write!(f, "<stream>({})", ids.join(","))
    }
}

impl fmt::Debug for Handle {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}
