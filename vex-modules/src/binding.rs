//! The binding: the authoritative slot for one global inside one module.
//!
//! `owner` is a tagged variant (`Self | Alias(other) | Unresolved`) rather
//! than a sentinel-bearing pointer — it eliminates a whole class of "is this
//! binding its own owner" sentinel bugs a raw-pointer encoding has to guard
//! against by convention.

use crate::module::Module;
use crate::value::{Value, VexType};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, RwLock};

/// Deprecation level. `0` = not deprecated, `1` = renamed (warn on use),
/// `2` = moved (the value itself is an error-throwing stub).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Deprecation {
    None,
    Renamed,
    Moved,
}

impl Deprecation {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => Deprecation::Renamed,
            2 => Deprecation::Moved,
            _ => Deprecation::None,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            Deprecation::None => 0,
            Deprecation::Renamed => 1,
            Deprecation::Moved => 2,
        }
    }

    pub fn is_deprecated(self) -> bool {
        !matches!(self, Deprecation::None)
    }
}

/// Who is authoritative for a binding's value.
///
/// If a binding is `Alias(b)`, then `b.owner() == SelfOwned` — owners are
/// always fully resolved before being installed as the target of an alias.
/// `resolve_owner` is the only code path that may install a fresh `Alias`,
/// and it always resolves through to a self-owned binding first.
#[derive(Clone)]
pub enum Owner {
    /// This binding is the authoritative source for its name.
    SelfOwned,
    /// Authoritative elsewhere; always points at a `SelfOwned` binding.
    Alias(Arc<Binding>),
    /// Slot exists (e.g. to record an `export`) but ownership undecided.
    Unresolved,
}

impl fmt::Debug for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Owner::SelfOwned => write!(f, "SelfOwned"),
            Owner::Alias(_) => write!(f, "Alias(..)"),
            Owner::Unresolved => write!(f, "Unresolved"),
        }
    }
}

/// A stable `(module, name, binding)` handle. Lazily created per
/// binding the first time something asks for it, then cached on the
/// binding so repeated requests return the identical `Arc`.
pub struct GlobalRef {
    pub module: Arc<Module>,
    pub name: crate::symbol::Symbol,
    pub binding: Arc<Binding>,
}

impl fmt::Debug for GlobalRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GlobalRef({}.{})", self.module.name(), self.name)
    }
}

pub struct Binding {
    pub(crate) value: RwLock<Option<Value>>,
    pub(crate) ty: RwLock<Option<Arc<VexType>>>,
    pub(crate) owner: RwLock<Owner>,
    constp: AtomicBool,
    exportp: AtomicBool,
    imported: AtomicBool,
    deprecated: AtomicU8,
    /// Set only on the self-owned, valueless placeholder `using_resolve`
    /// installs to remember "already warned about this ambiguity". Such a
    /// binding is otherwise a normal self-owned binding, but `resolve_owner`
    /// treats it as unresolved so the ambiguous name stays unresolvable on
    /// every lookup, not just the first.
    ambiguous_guard: AtomicBool,
    globalref: Mutex<Option<Arc<GlobalRef>>>,
}

impl Binding {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            value: RwLock::new(None),
            ty: RwLock::new(None),
            owner: RwLock::new(Owner::Unresolved),
            constp: AtomicBool::new(false),
            exportp: AtomicBool::new(false),
            imported: AtomicBool::new(false),
            deprecated: AtomicU8::new(0),
            ambiguous_guard: AtomicBool::new(false),
            globalref: Mutex::new(None),
        })
    }

    fn rlock<T>(lock: &RwLock<T>) -> std::sync::RwLockReadGuard<'_, T> {
        lock.read().unwrap_or_else(|e| e.into_inner())
    }

    fn wlock<T>(lock: &RwLock<T>) -> std::sync::RwLockWriteGuard<'_, T> {
        lock.write().unwrap_or_else(|e| e.into_inner())
    }

    pub fn value(&self) -> Option<Value> {
        Self::rlock(&self.value).clone()
    }

    pub fn has_value(&self) -> bool {
        Self::rlock(&self.value).is_some()
    }

    pub fn declared_type(&self) -> Option<Arc<VexType>> {
        Self::rlock(&self.ty).clone()
    }

    /// True once `owner` is `SelfOwned` — the authoritative source for this
    /// name.
    pub fn is_self_owned(&self) -> bool {
        matches!(&*Self::rlock(&self.owner), Owner::SelfOwned)
    }

    pub fn is_unresolved(&self) -> bool {
        matches!(&*Self::rlock(&self.owner), Owner::Unresolved)
    }

    pub fn alias_target(&self) -> Option<Arc<Binding>> {
        match &*Self::rlock(&self.owner) {
            Owner::Alias(b) => Some(b.clone()),
            _ => None,
        }
    }

    pub fn owner_snapshot(&self) -> Owner {
        Self::rlock(&self.owner).clone()
    }

    /// Claim this binding as self-owned (`get_binding_wr` step 2).
    pub(crate) fn claim_self(&self) {
        *Self::wlock(&self.owner) = Owner::SelfOwned;
    }

    pub(crate) fn set_alias(&self, target: Arc<Binding>) {
        debug_assert!(
            target.is_self_owned(),
            "alias target must already be self-owned"
        );
        *Self::wlock(&self.owner) = Owner::Alias(target);
    }

    pub fn is_const(&self) -> bool {
        self.constp.load(Ordering::Acquire)
    }

    /// Monotonic: once true, `set_constp` never clears it again.
    pub(crate) fn set_constp(&self) {
        self.constp.store(true, Ordering::Release);
    }

    pub fn is_exported(&self) -> bool {
        self.exportp.load(Ordering::Acquire)
    }

    pub(crate) fn set_exported(&self, exported: bool) {
        self.exportp.store(exported, Ordering::Release);
    }

    pub fn is_imported(&self) -> bool {
        self.imported.load(Ordering::Acquire)
    }

    pub(crate) fn set_imported(&self, imported: bool) {
        self.imported.store(imported, Ordering::Release);
    }

    /// True for the self-owned placeholder `using_resolve` installs to
    /// remember an already-warned-about ambiguity.
    pub fn is_ambiguous_guard(&self) -> bool {
        self.ambiguous_guard.load(Ordering::Acquire)
    }

    pub(crate) fn mark_ambiguous_guard(&self) {
        self.ambiguous_guard.store(true, Ordering::Release);
    }

    pub fn deprecation(&self) -> Deprecation {
        Deprecation::from_u8(self.deprecated.load(Ordering::Acquire))
    }

    pub(crate) fn set_deprecation(&self, level: Deprecation) {
        self.deprecated.store(level.as_u8(), Ordering::Release);
    }

    /// Initialize `ty` to `Universal` if unset (the "unset means universal"
    /// rule), returning the binding's (possibly just-installed) type.
    pub(crate) fn ensure_type_initialized(&self) -> Arc<VexType> {
        {
            if let Some(ty) = Self::rlock(&self.ty).clone() {
                return ty;
            }
        }
        let mut guard = Self::wlock(&self.ty);
        if let Some(ty) = guard.clone() {
            return ty;
        }
        let universal = Arc::new(VexType::Universal);
        *guard = Some(universal.clone());
        universal
    }

    /// Publish `value` unconditionally (release semantics: readers that
    /// observe the new value also observe everything written before this
    /// call.
    pub(crate) fn store_value(&self, value: Value) {
        *Self::wlock(&self.value) = Some(value);
    }

    /// Compare-and-swap `value` from `None` to `Some(value)`. Returns
    /// `true` if this call won the race and installed `value`.
    pub(crate) fn cas_init_value(&self, value: Value) -> bool {
        let mut guard = Self::wlock(&self.value);
        if guard.is_some() {
            return false;
        }
        *guard = Some(value);
        true
    }

    /// Lazily create (or return the cached) `GlobalRef` for this binding,
    /// recording `module`/`name` as the place it was first asked for — see
    /// `resolver::module_of_binding` for why that pin matters.
    pub fn globalref_or_create(
        self: &Arc<Self>,
        module: &Arc<Module>,
        name: crate::symbol::Symbol,
    ) -> Arc<GlobalRef> {
        let mut guard = self.globalref.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(existing) = guard.as_ref() {
            return existing.clone();
        }
        let gref = Arc::new(GlobalRef {
            module: module.clone(),
            name,
            binding: self.clone(),
        });
        *guard = Some(gref.clone());
        gref
    }
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding")
            .field("owner", &self.owner_snapshot())
            .field("const", &self.is_const())
            .field("exported", &self.is_exported())
            .field("imported", &self.is_imported())
            .field("deprecated", &self.deprecation())
            .finish()
    }
}

/// Binding equivalence: same identity, same owner, or both
/// constants holding structurally-equal values. Reflexive, symmetric, and
/// transitive over bindings sharing ownership lineage: two bindings
/// that both alias the same owner are equivalent to each other because
/// each equals that owner by the "same owner" branch below.
pub fn eq_bindings(a: &Arc<Binding>, b: &Arc<Binding>) -> bool {
    if Arc::ptr_eq(a, b) {
        return true;
    }
    let owner_a = resolved_identity(a);
    let owner_b = resolved_identity(b);
    if let (Some(oa), Some(ob)) = (&owner_a, &owner_b) {
        if Arc::ptr_eq(oa, ob) {
            return true;
        }
    }
    if a.is_const() && b.is_const() {
        if let (Some(va), Some(vb)) = (a.value(), b.value()) {
            return va == vb;
        }
    }
    false
}

fn resolved_identity(b: &Arc<Binding>) -> Option<Arc<Binding>> {
    match b.owner_snapshot() {
        Owner::SelfOwned => Some(b.clone()),
        Owner::Alias(target) => Some(target),
        Owner::Unresolved => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn self_owned_binding_reports_i1() {
        let b = Binding::new();
        assert!(b.is_unresolved());
        b.claim_self();
        assert!(b.is_self_owned());
    }

    #[test]
    fn constp_is_monotonic() {
        let b = Binding::new();
        assert!(!b.is_const());
        b.set_constp();
        assert!(b.is_const());
        // nothing in the public API can clear it again
        assert!(b.is_const());
    }

    #[test]
    fn eq_bindings_is_reflexive() {
        let b = Binding::new();
        b.claim_self();
        assert!(eq_bindings(&b, &b));
    }

    #[test]
    fn eq_bindings_same_owner_are_equivalent() {
        let owner = Binding::new();
        owner.claim_self();
        let alias_a = Binding::new();
        alias_a.set_alias(owner.clone());
        let alias_b = Binding::new();
        alias_b.set_alias(owner.clone());
        assert!(eq_bindings(&alias_a, &alias_b));
    }

    #[test]
    fn eq_bindings_equal_constants_are_equivalent() {
        let a = Binding::new();
        a.claim_self();
        a.set_constp();
        a.store_value(Value::Int(7));
        let b = Binding::new();
        b.claim_self();
        b.set_constp();
        b.store_value(Value::Int(7));
        assert!(eq_bindings(&a, &b));

        b.store_value(Value::Int(8));
        assert!(!eq_bindings(&a, &b));
    }

    #[test]
    fn cas_init_value_only_wins_once() {
        let b = Binding::new();
        assert!(b.cas_init_value(Value::Int(1)));
        assert!(!b.cas_init_value(Value::Int(2)));
        assert_eq!(b.value(), Some(Value::Int(1)));
    }
}
