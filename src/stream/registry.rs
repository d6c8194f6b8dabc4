//! The stream registry
//!
//! One [`Registry`] owns every open stream of a process: an arena of
//! streams keyed by id, a context record per stream (aliases, file name,
//! how it was opened), the alias map and the three standard streams.
//!
//! Lock order: a thread may take the table lock while holding a stream
//! lock, never the other way around.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use hashbrown::HashMap;
use indexmap::IndexMap;
use parking_lot::Mutex;
use serde::Serialize;
use smallvec::SmallVec;
use tracing::debug;

use super::atom::Atom;
use super::core::{BufferMode, StdRole, Stream, StreamId, StreamInner};
use super::encoding::{Encoding, Newline};
use super::host::{DefaultHost, Host};
use super::transport::{Mode, StdTransport, Transport};
use crate::util::config::StreamConfig;

/// How a stream was opened by the Edinburgh-style redirection operations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OpenedBy {
    pub see: bool,
    pub tell: bool,
}

/// Side-table metadata of a stream.
#[derive(Debug, Clone, Default)]
pub struct StreamContext {
    /// In binding order; the first alias names the stream.
    pub aliases: SmallVec<[Atom; 2]>,
    pub filename: Option<Atom>,
    pub opened_by: OpenedBy,
}

/// The source currently being loaded, for error locations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceLocation {
    pub file: Atom,
    pub line: u64,
}

#[derive(Default)]
struct Tables {
    streams: IndexMap<StreamId, Arc<Stream>>,
    contexts: HashMap<StreamId, StreamContext>,
    aliases: HashMap<Atom, StreamId>,
    current_source: Option<SourceLocation>,
}

impl Tables {
    /// Context of a registered stream; `None` once the stream is freed.
    fn context_mut(
        &mut self,
        id: StreamId,
    ) -> Option<&mut StreamContext> {
        if !self.streams.contains_key(&id) {
            return None;
        }
        Some(self.contexts.entry(id).or_default())
    }

    /// Remove `name` from the alias map if `owner` holds it.
    fn unbind(
        &mut self,
        owner: StreamId,
        name: &str,
    ) {
        if self.aliases.get(name) == Some(&owner) {
            self.aliases.remove(name);
        }
        if let Some(ctx) = self.contexts.get_mut(&owner) {
            ctx.aliases.retain(|a| a.as_str() != name);
        }
    }

    fn unbind_all(
        &mut self,
        owner: StreamId,
    ) {
        let names = match self.contexts.get_mut(&owner) {
            Some(ctx) => std::mem::take(&mut ctx.aliases),
            None => return,
        };
        for name in names {
            if self.aliases.get(name.as_str()) == Some(&owner) {
                self.aliases.remove(name.as_str());
            }
        }
    }
}

/// Builder for a [`Registry`] with a custom host or standard transports.
pub struct RegistryBuilder {
    config: StreamConfig,
    host: Arc<dyn Host>,
    standard: Option<[Box<dyn Transport>; 3]>,
}

impl RegistryBuilder {
    pub fn config(
        mut self,
        config: StreamConfig,
    ) -> Self {
        self.config = config;
        self
    }

    pub fn host(
        mut self,
        host: Arc<dyn Host>,
    ) -> Self {
        self.host = host;
        self
    }

    /// Use these transports for standard input, output and error instead
    /// of the process descriptors.
    pub fn standard_streams(
        mut self,
        input: Box<dyn Transport>,
        output: Box<dyn Transport>,
        error: Box<dyn Transport>,
    ) -> Self {
        self.standard = Some([input, output, error]);
        self
    }

    pub fn build(self) -> Arc<Registry> {
        let RegistryBuilder {
            mut config,
            host,
            standard,
        } = self;
        if let Some(enc) = host.default_encoding() {
            config.default_encoding = enc;
        }
        let [input, output, error] = match standard {
            Some(transports) => transports,
            None => {
                let input: Box<dyn Transport> = Box::new(StdTransport::stdin());
                let output: Box<dyn Transport> = Box::new(StdTransport::stdout());
                let error: Box<dyn Transport> = Box::new(StdTransport::stderr());
                [input, output, error]
            }
        };

        Arc::new_cyclic(|me: &Weak<Registry>| {
            let make = |id: StreamId, role: StdRole, transport: Box<dyn Transport>| {
                let is_input = role == StdRole::Input;
                let mut inner = StreamInner::new(id, transport, is_input, !is_input, &config);
                inner.mode = Some(if is_input { Mode::Read } else { Mode::Append });
                inner.newline = if is_input { Newline::Detect } else { config.newline };
                inner.sticky_errors = false;
                inner.host = Some(host.clone());
                inner.buffering = match role {
                    StdRole::Input => BufferMode::Full,
                    StdRole::Output if inner.tty => BufferMode::Line,
                    StdRole::Output => BufferMode::Full,
                    StdRole::Error => BufferMode::Unbuffered,
                };
                Arc::new(Stream::new(id, Some(role), inner, me.clone()))
            };
            let standard = [
                make(0, StdRole::Input, input),
                make(1, StdRole::Output, output),
                make(2, StdRole::Error, error),
            ];

            let mut tables = Tables::default();
            for s in &standard {
                tables.streams.insert(s.id(), s.clone());
            }

            Registry {
                tables: Mutex::new(tables),
                standard,
                config,
                host,
                next_id: AtomicU64::new(3),
                me: me.clone(),
            }
        })
    }
}

pub struct Registry {
    tables: Mutex<Tables>,
    standard: [Arc<Stream>; 3],
    config: StreamConfig,
    host: Arc<dyn Host>,
    next_id: AtomicU64,
    me: Weak<Registry>,
}

impl Registry {
    /// A registry over the process' standard descriptors.
    pub fn new(config: StreamConfig) -> Arc<Self> {
        Self::builder().config(config).build()
    }

    pub fn builder() -> RegistryBuilder {
        RegistryBuilder {
            config: StreamConfig::default(),
            host: Arc::new(DefaultHost),
            standard: None,
        }
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    pub fn host(&self) -> &Arc<dyn Host> {
        &self.host
    }

    pub fn default_encoding(&self) -> Encoding {
        self.config.default_encoding
    }

    pub fn std_input(&self) -> &Arc<Stream> {
        &self.standard[0]
    }

    pub fn std_output(&self) -> &Arc<Stream> {
        &self.standard[1]
    }

    pub fn std_error(&self) -> &Arc<Stream> {
        &self.standard[2]
    }

    /// Create and register a stream over `transport`.
    pub(crate) fn create_stream(
        &self,
        transport: Box<dyn Transport>,
        input: bool,
        mode: Option<Mode>,
        configure: impl FnOnce(&mut StreamInner),
    ) -> Arc<Stream> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let mut inner = StreamInner::new(id, transport, input, !input, &self.config);
        inner.mode = mode;
        inner.host = Some(self.host.clone());
        configure(&mut inner);
        let stream = Arc::new(Stream::new(id, None, inner, self.me.clone()));
        self.tables.lock().streams.insert(id, stream.clone());
        debug!(stream = id, "stream registered");
        stream
    }

    /// The registered stream with this id, if still open.
    pub fn get(
        &self,
        id: StreamId,
    ) -> Option<Arc<Stream>> {
        self.tables.lock().streams.get(&id).cloned()
    }

    /// Number of open streams, the standard ones included.
    pub fn len(&self) -> usize {
        self.tables.lock().streams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // ------------------------------------------------------------------
    // Aliases
    // ------------------------------------------------------------------

    /// Bind `name` to `stream`. A previous owner of the name silently
    /// loses it.
    pub fn bind_alias(
        &self,
        stream: &Stream,
        name: &str,
    ) {
        let id = stream.id();
        let mut tables = self.tables.lock();
        if !tables.streams.contains_key(&id) {
            debug!(alias = name, stream = id, "alias on freed stream ignored");
            return;
        }
        if let Some(&owner) = tables.aliases.get(name) {
            if owner == id {
                return;
            }
            tables.unbind(owner, name);
            debug!(alias = name, from = owner, to = id, "alias rebound");
        }
        let atom = Atom::new(name);
        if let Some(ctx) = tables.context_mut(id) {
            ctx.aliases.push(atom.clone());
        }
        tables.aliases.insert(atom, id);
    }

    /// Remove one alias of `stream`, or all of them.
    pub fn unbind_alias(
        &self,
        stream: &Stream,
        name: Option<&str>,
    ) {
        let mut tables = self.tables.lock();
        match name {
            Some(name) => tables.unbind(stream.id(), name),
            None => tables.unbind_all(stream.id()),
        }
    }

    pub fn lookup_alias(
        &self,
        name: &str,
    ) -> Option<Arc<Stream>> {
        let tables = self.tables.lock();
        let id = tables.aliases.get(name)?;
        tables.streams.get(id).cloned()
    }

    pub fn aliases(
        &self,
        stream: &Stream,
    ) -> Vec<Atom> {
        self.tables
            .lock()
            .contexts
            .get(&stream.id())
            .map(|ctx| ctx.aliases.to_vec())
            .unwrap_or_default()
    }

    /// The first alias of `stream`.
    pub fn first_alias(
        &self,
        stream: &Stream,
    ) -> Option<Atom> {
        let tables = self.tables.lock();
        tables.contexts.get(&stream.id())?.aliases.first().cloned()
    }

    // ------------------------------------------------------------------
    // Context
    // ------------------------------------------------------------------

    pub fn set_filename(
        &self,
        stream: &Stream,
        filename: Option<&str>,
    ) {
        let mut tables = self.tables.lock();
        if let Some(ctx) = tables.context_mut(stream.id()) {
            ctx.filename = filename.map(Atom::new);
        }
    }

    pub fn filename(
        &self,
        stream: &Stream,
    ) -> Option<Atom> {
        self.tables
            .lock()
            .contexts
            .get(&stream.id())
            .and_then(|ctx| ctx.filename.clone())
    }

    pub fn context(
        &self,
        stream: &Stream,
    ) -> StreamContext {
        self.tables
            .lock()
            .contexts
            .get(&stream.id())
            .cloned()
            .unwrap_or_default()
    }

    pub(crate) fn mark_opened_by(
        &self,
        stream: &Stream,
        see: bool,
        tell: bool,
    ) {
        let mut tables = self.tables.lock();
        if let Some(ctx) = tables.context_mut(stream.id()) {
            ctx.opened_by.see |= see;
            ctx.opened_by.tell |= tell;
        }
    }

    pub fn source_location(&self) -> Option<SourceLocation> {
        self.tables.lock().current_source.clone()
    }

    pub fn set_source_location(
        &self,
        location: Option<SourceLocation>,
    ) {
        self.tables.lock().current_source = location;
    }

    /// Snapshot of all registered streams and their contexts, in
    /// registration order. Streams opened or closed afterwards do not
    /// affect the snapshot.
    pub fn enumerate(&self) -> impl Iterator<Item = (Arc<Stream>, StreamContext)> {
        let tables = self.tables.lock();
        let snapshot: Vec<_> = tables
            .streams
            .iter()
            .map(|(id, s)| {
                let ctx = tables.contexts.get(id).cloned().unwrap_or_default();
                (s.clone(), ctx)
            })
            .collect();
        snapshot.into_iter()
    }

    /// The first open stream whose file name is `filename` and that was
    /// opened by one of the requested redirection operations.
    pub fn find_stream_from_file(
        &self,
        filename: &str,
        see: bool,
        tell: bool,
    ) -> Option<Arc<Stream>> {
        let tables = self.tables.lock();
        tables.streams.iter().find_map(|(id, s)| {
            let ctx = tables.contexts.get(id)?;
            let named = ctx.filename.as_ref().map(|f| f.as_str()) == Some(filename);
            let opened = (see && ctx.opened_by.see) || (tell && ctx.opened_by.tell);
            (named && opened && !s.is_erased()).then(|| s.clone())
        })
    }

    /// Drop all registry state of a closed stream.
    pub(crate) fn free(
        &self,
        stream: &Stream,
    ) {
        let id = stream.id();
        let mut tables = self.tables.lock();
        tables.unbind_all(id);
        #[cfg(feature = "debug")]
        debug_assert!(
            tables.aliases.values().all(|&owner| owner != id),
            "alias outlived stream {id}"
        );
        if let Some(ctx) = tables.contexts.remove(&id) {
            let loading = match (&ctx.filename, &tables.current_source) {
                (Some(file), Some(src)) => *file == src.file,
                _ => false,
            };
            if loading {
                tables.current_source = None;
            }
        }
        tables.streams.shift_remove(&id);
        debug!(stream = id, "stream freed");
    }

    /// Name of a stream for messages: its first alias, else its handle text.
    pub fn describe(
        &self,
        stream: &Stream,
    ) -> String {
        match self.first_alias(stream) {
            Some(alias) => alias.to_string(),
            None => stream.label(),
        }
    }
}

impl fmt::Debug for Registry {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("Registry")
            .field("streams", &self.len())
            .field("config", &self.config)
            .field("host", &self.host)
            .finish()
    }
}
