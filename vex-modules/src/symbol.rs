//! Interned names used as binding keys.
//!
//! Grown in-crate the same way `vex-compiler::types::interner::TypeInterner`
//! interns `Type`s: a concurrent map from the textual name to a small
//! `Copy` handle, plus a reverse table for turning handles back into text
//! for diagnostics.

use dashmap::DashMap;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, OnceLock};

/// An interned name. Equality is identity (the wrapped id); hashing is the
/// id's own hash, so `Symbol` is cheap to use as a `HashMap` key.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Symbol(u32);

struct Interner {
    ids: DashMap<Arc<str>, u32>,
    names: Mutex<Vec<Arc<str>>>,
    next: AtomicU32,
}

static INTERNER: OnceLock<Interner> = OnceLock::new();

fn interner() -> &'static Interner {
    INTERNER.get_or_init(|| Interner {
        ids: DashMap::new(),
        names: Mutex::new(Vec::new()),
        next: AtomicU32::new(0),
    })
}

impl Symbol {
    /// Intern `name`, returning the same `Symbol` for equal strings.
    pub fn new(name: &str) -> Self {
        let interner = interner();
        if let Some(id) = interner.ids.get(name) {
            return Symbol(*id);
        }

        // Allocate under the reverse-table lock so two racing inserts of the
        // same new name can't hand out two different ids.
        let mut names = interner.names.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(id) = interner.ids.get(name) {
            return Symbol(*id);
        }
        let id = interner.next.fetch_add(1, Ordering::Relaxed);
        let arc: Arc<str> = Arc::from(name);
        names.push(arc.clone());
        interner.ids.insert(arc, id);
        Symbol(id)
    }

    /// Resolve this symbol back to its text.
    pub fn as_str(&self) -> Arc<str> {
        let names = interner().names.lock().unwrap_or_else(|e| e.into_inner());
        names
            .get(self.0 as usize)
            .cloned()
            .unwrap_or_else(|| Arc::from("<invalid-symbol>"))
    }

    /// True for names beginning with `#`, the hidden/internal-name marker
    /// `module_names` filters out unless `all` is requested.
    pub fn is_hidden(&self) -> bool {
        self.as_str().starts_with('#')
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, ":{}", self.as_str())
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
