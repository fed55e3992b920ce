//! The module: a namespace of bindings plus an ordered `usings` list.
//!
//! Bindings and usings share **one** mutex; binding
//! *contents* are atomics/`RwLock` and may be read without taking it.

use crate::binding::Binding;
use crate::symbol::Symbol;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

/// `Arc<Module>` is used as the module handle throughout the crate, giving
/// callers a stable handle rather than an owning pointer — the closest
/// safe-Rust fit given this crate has no GC of its own to lean on.
pub type ModuleId = Arc<Module>;

/// A module's parent edge. The root of the hierarchy is self-parented in
/// the hierarchy conceptually; representing that literally as a self-referential
/// `Arc` would create an uncollectable reference cycle; `Root` means the
/// same thing without the cycle.
#[derive(Clone)]
pub enum ModuleParent {
    Root,
    Child(Arc<Module>),
}

/// The two tables a module's lock protects together behind one mutex.
#[derive(Default)]
pub(crate) struct ModuleTables {
    pub bindings: HashMap<Symbol, Arc<Binding>>,
    pub usings: Vec<Arc<Module>>,
}

/// Which inheritable knob is being read or written.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Knob {
    OptLevel,
    Compile,
    Infer,
    MaxMethods,
    NoSpecialize,
}

const KNOB_COUNT: usize = 5;
const INHERIT: i64 = -1;

pub struct Module {
    name: Symbol,
    parent: ModuleParent,
    uuid: Mutex<u128>,
    /// `(lo, hi)`; `hi == u64::MAX` means "not yet serialized".
    build_id: Mutex<(u64, u64)>,
    pub(crate) tables: Mutex<ModuleTables>,
    counter: AtomicU32,
    knobs: [AtomicI64; KNOB_COUNT],
    istopmod: AtomicBool,
    /// Marks `Base`: knob-inheritance walks the parent chain but stops
    /// here even though `Base` is not itself the root.
    knob_root: AtomicBool,
}

impl Module {
    fn new_raw(name: Symbol, parent: ModuleParent, build_id_lo: u64) -> Arc<Self> {
        Arc::new(Self {
            name,
            parent,
            uuid: Mutex::new(0),
            build_id: Mutex::new((build_id_lo, u64::MAX)),
            tables: Mutex::new(ModuleTables::default()),
            counter: AtomicU32::new(1),
            knobs: std::array::from_fn(|_| AtomicI64::new(INHERIT)),
            istopmod: AtomicBool::new(false),
            knob_root: AtomicBool::new(false),
        })
    }

    /// Construct a root module (self-parented in spirit; see `ModuleParent::Root`).
    pub fn new_root(name: Symbol, build_id_lo: u64) -> Arc<Self> {
        Self::new_raw(name, ModuleParent::Root, build_id_lo)
    }

    /// Construct a module with an explicit parent.
    pub fn new_child(name: Symbol, parent: Arc<Module>, build_id_lo: u64) -> Arc<Self> {
        Self::new_raw(name, ModuleParent::Child(parent), build_id_lo)
    }

    pub fn name(&self) -> Symbol {
        self.name
    }

    pub fn is_root(&self) -> bool {
        matches!(self.parent, ModuleParent::Root)
    }

    pub fn parent_module(&self) -> Option<Arc<Module>> {
        match &self.parent {
            ModuleParent::Root => None,
            ModuleParent::Child(p) => Some(p.clone()),
        }
    }

    /// The parent chain terminates at a self-parented root. `self`
    /// must be passed in as an `Arc` to hand back a clone of itself.
    pub fn parent_or_self(self_arc: &Arc<Module>) -> Arc<Module> {
        match self_arc.parent_module() {
            Some(p) => p,
            None => self_arc.clone(),
        }
    }

    pub fn uuid(&self) -> u128 {
        *self.uuid.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn set_module_uuid(&self, uuid: u128) {
        *self.uuid.lock().unwrap_or_else(|e| e.into_inner()) = uuid;
    }

    pub fn build_id(&self) -> (u64, u64) {
        *self.build_id.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Records that this module instance has been serialized; the high
    /// word is the serialization metadata word.
    pub fn mark_serialized(&self, hi: u64) {
        self.build_id.lock().unwrap_or_else(|e| e.into_inner()).1 = hi;
    }

    /// Atomically fetch-adds the internal name counter, returning the
    /// value *before* the increment.
    pub fn next_counter(&self) -> u32 {
        self.counter.fetch_add(1, Ordering::AcqRel)
    }

    pub fn is_top_module(&self) -> bool {
        self.istopmod.load(Ordering::Acquire)
    }

    pub fn set_istopmod(&self, flag: bool) {
        self.istopmod.store(flag, Ordering::Release);
    }

    /// Marks this module as the point where inheritable-knob lookup stops
    /// even though it is not the hierarchy root. `Base` is marked this way.
    pub fn mark_knob_root(&self) {
        self.knob_root.store(true, Ordering::Release);
    }

    pub fn is_knob_root(&self) -> bool {
        self.knob_root.load(Ordering::Acquire)
    }

    fn knob_slot(&self, knob: Knob) -> &AtomicI64 {
        &self.knobs[knob as usize]
    }

    /// The raw value set on this module (`-1` if unset/inherited).
    pub fn raw_knob(&self, knob: Knob) -> i64 {
        self.knob_slot(knob).load(Ordering::Acquire)
    }

    pub fn set_knob(&self, knob: Knob, value: i64) {
        self.knob_slot(knob).store(value, Ordering::Release);
    }

    /// Walks the parent chain to resolve an inheritable knob, stopping at
    /// a self-parented root or at a module marked `is_knob_root`.
    pub fn effective_knob(self_arc: &Arc<Module>, knob: Knob) -> i64 {
        let mut current = self_arc.clone();
        loop {
            let raw = current.raw_knob(knob);
            if raw != INHERIT {
                return raw;
            }
            if current.is_root() || current.is_knob_root() {
                return raw;
            }
            current = Module::parent_or_self(&current);
        }
    }

    /// Walk parents looking for `ancestor` (auxiliary query `is_submodule`).
    pub fn is_submodule(self_arc: &Arc<Module>, ancestor: &Arc<Module>) -> bool {
        let mut current = self_arc.clone();
        loop {
            if Arc::ptr_eq(&current, ancestor) {
                return true;
            }
            if current.is_root() {
                return false;
            }
            current = Module::parent_or_self(&current);
        }
    }

    /// Locked lookup of a binding by name, *without* crossing `usings`.
    pub fn get_module_binding(&self, var: Symbol) -> Option<Arc<Binding>> {
        self.tables
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .bindings
            .get(&var)
            .cloned()
    }

    /// Insert a freshly created binding under `var`. Callers are
    /// responsible for having checked there wasn't already one there.
    pub(crate) fn insert_binding(&self, var: Symbol, binding: Arc<Binding>) {
        self.tables
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .bindings
            .insert(var, binding);
    }

    /// Return the binding at `var`, creating an `Unresolved` placeholder
    /// if none exists yet (used by `export`, ambiguity placeholders, and
    /// `get_binding_wr`'s allocate-on-miss path).
    pub(crate) fn get_or_create_binding(&self, var: Symbol) -> Arc<Binding> {
        self.tables
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .bindings
            .entry(var)
            .or_insert_with(Binding::new)
            .clone()
    }

    /// Snapshot of the `usings` list, in insertion order (auxiliary query
    /// `module_usings`).
    pub fn usings_snapshot(&self) -> Vec<Arc<Module>> {
        self.tables
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .usings
            .clone()
    }

    /// All `(name, binding)` pairs currently in the table, for
    /// `module_names` and `clear_implicit_imports`.
    pub fn bindings_snapshot(&self) -> Vec<(Symbol, Arc<Binding>)> {
        self.tables
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .bindings
            .iter()
            .map(|(k, v)| (*k, v.clone()))
            .collect()
    }

    /// Enumerate names visible in this module (auxiliary query
    /// `module_names`). Hidden (`#`-prefixed) and deprecated names are
    /// excluded unless `all` is set. With `all == false`, only exported
    /// names are returned unless `imported` additionally requests
    /// explicitly-imported (but not re-exported) names too.
    pub fn module_names(&self, all: bool, imported: bool) -> Vec<Symbol> {
        let mut out = Vec::new();
        for (name, binding) in self.bindings_snapshot() {
            if !all && name.is_hidden() {
                continue;
            }
            if !all && binding.deprecation().is_deprecated() {
                continue;
            }
            let include = all || binding.is_exported() || (imported && binding.is_imported());
            if include {
                out.push(name);
            }
        }
        out
    }

    /// Drop every binding whose owner isn't itself and which wasn't
    /// explicitly imported. Explicitly
    /// imported and locally-defined (self-owned) bindings survive.
    pub fn clear_implicit_imports(&self) {
        let mut tables = self.tables.lock().unwrap_or_else(|e| e.into_inner());
        tables.bindings.retain(|_, binding| {
            binding.is_self_owned() || binding.is_unresolved() || binding.is_imported()
        });
    }
}

impl fmt::Debug for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Module({})", self.name)
    }
}
