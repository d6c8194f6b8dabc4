//! Interned names
//!
//! Aliases, file names and input-context kinds are carried around as
//! [`Atom`]s. Equal names share one allocation from a process-wide table.
//! Cloning an atom registers one more reference to the name and dropping
//! it unregisters that reference; the table entry goes away with the last
//! registration.

use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;

use hashbrown::HashSet;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use serde::{Serialize, Serializer};

static ATOMS: Lazy<Mutex<HashSet<Arc<str>>>> = Lazy::new(|| Mutex::new(HashSet::new()));

/// Stand-in left behind by a dropped atom.
static RELEASED: Lazy<Arc<str>> = Lazy::new(|| Arc::from(""));

/// An interned, cheaply clonable name.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Atom(Arc<str>);

impl Atom {
    /// Intern a name.
    pub fn new(name: &str) -> Self {
        let mut atoms = ATOMS.lock();
        if let Some(text) = atoms.get(name) {
            return Self(text.clone());
        }
        let text: Arc<str> = Arc::from(name);
        atoms.insert(text.clone());
        Self(text)
    }

    /// The text of the atom.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Number of live registrations of this atom.
    pub fn references(&self) -> usize {
        Arc::strong_count(&self.0) - 1
    }

    /// Whether `self` and `other` are the same interned name.
    pub fn same(
        &self,
        other: &Atom,
    ) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Drop for Atom {
    fn drop(&mut self) {
        let mut atoms = ATOMS.lock();
        let text = std::mem::replace(&mut self.0, RELEASED.clone());
        // Only ours and the table's left.
        if Arc::strong_count(&text) == 2 {
            atoms.remove(&*text);
        }
        drop(text);
    }
}

impl Borrow<str> for Atom {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Atom {
    fn from(name: &str) -> Self {
        Atom::new(name)
    }
}

impl From<String> for Atom {
    fn from(name: String) -> Self {
        Atom::new(&name)
    }
}

impl fmt::Display for Atom {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for Atom {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "{:?}", &*self.0)
    }
}

impl Serialize for Atom {
    fn serialize<S: Serializer>(
        &self,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}
