//! Name resolution: `resolve_owner`, `using_resolve`, `import_`, `using`,
//! `export`, plus the auxiliary boolean queries built on top of them
//! (`boundp`, `is_const`, `is_imported`, and friends).

use crate::binding::{eq_bindings, Binding, Owner};
use crate::deprecation::{binding_deprecation_warning, DepWarn};
use crate::diagnostics::WarningSink;
use crate::error::{ModuleError, ModuleResult};
use crate::module::Module;
use crate::symbol::Symbol;
use crate::value::Value;
use std::sync::Arc;

/// `(module identity, name)` — the cycle-detection stack entry.
type StackEntry = (usize, Symbol);

fn module_ptr_id(m: &Arc<Module>) -> usize {
    Arc::as_ptr(m) as usize
}

/// Resolve `(m, var)` to its authoritative, self-owned binding, walking
/// `usings` and promoting the result into an explicit alias as a side
/// effect. Returns `None` if the name is undefined or the lookup
/// detected a cycle or an unresolved ambiguity.
pub fn resolve_owner(m: &Arc<Module>, var: Symbol, sink: &dyn WarningSink) -> Option<Arc<Binding>> {
    let mut stack: Vec<StackEntry> = Vec::new();
    resolve_owner_inner(None, m, var, &mut stack, sink)
}

fn resolve_owner_inner(
    b: Option<Arc<Binding>>,
    m: &Arc<Module>,
    var: Symbol,
    stack: &mut Vec<StackEntry>,
    sink: &dyn WarningSink,
) -> Option<Arc<Binding>> {
    let binding = match b.or_else(|| m.get_module_binding(var)) {
        Some(b) => b,
        None => return resolve_via_usings(m, var, stack, sink),
    };

    match binding.owner_snapshot() {
        // An ambiguity guard is self-owned so it never gets reclaimed or
        // re-warned about, but it must keep reporting as unresolved — the
        // ambiguous name stays unresolvable on every lookup, not just the
        // one that first detected it.
        Owner::SelfOwned if binding.is_ambiguous_guard() => None,
        Owner::SelfOwned => Some(binding),
        Owner::Alias(target) => Some(target),
        Owner::Unresolved => resolve_via_usings(m, var, stack, sink),
    }
}

fn resolve_via_usings(
    m: &Arc<Module>,
    var: Symbol,
    stack: &mut Vec<StackEntry>,
    sink: &dyn WarningSink,
) -> Option<Arc<Binding>> {
    let key = (module_ptr_id(m), var);
    if stack.contains(&key) {
        // The lookup re-entered its own resolution: break the cycle.
        return None;
    }
    stack.push(key);
    let found = using_resolve(m, var, stack, sink);
    stack.pop();

    match found {
        Some((from, owner_binding)) => {
            // Promote the lookup into an explicit (non-explicit-import)
            // binding so future reads are stable.
            import_(m, &from, Some(owner_binding.clone()), var, var, false, sink);
            Some(owner_binding)
        }
        None => None,
    }
}

/// Search `m`'s `usings`, most-recent-first, for an exported binding named
/// `var`, applying the deprecation/ambiguity tie-break rules below.
/// Must be called with `m`'s lock *not* held by the caller across the
/// recursive call into another module's resolution (we take only a
/// snapshot of `usings`, so `m`'s lock is never held during recursion).
fn using_resolve(
    m: &Arc<Module>,
    var: Symbol,
    stack: &mut Vec<StackEntry>,
    sink: &dyn WarningSink,
) -> Option<(Arc<Module>, Arc<Binding>)> {
    let usings = m.usings_snapshot();
    let mut best: Option<(Arc<Module>, Arc<Binding>)> = None;

    for imp in usings.iter().rev() {
        let local = match imp.get_module_binding(var) {
            Some(b) => b,
            None => continue,
        };
        if !local.is_exported() {
            continue;
        }
        let resolved = match resolve_owner_inner(Some(local), imp, var, stack, sink) {
            Some(b) => b,
            None => continue, // broken upstream; try the next using
        };

        best = match best {
            None => Some((imp.clone(), resolved)),
            Some((existing_from, existing)) => {
                if eq_bindings(&existing, &resolved) {
                    Some((existing_from, existing))
                } else {
                    let existing_dep = existing.deprecation().is_deprecated();
                    let new_dep = resolved.deprecation().is_deprecated();
                    match (existing_dep, new_dep) {
                        (true, false) => Some((imp.clone(), resolved)),
                        (false, true) => Some((existing_from, existing)),
                        _ => {
                            sink.warn(&format!(
                                "both {} and {} export \"{}\"; uses of it in module {} must be qualified",
                                existing_from.name(),
                                imp.name(),
                                var,
                                m.name()
                            ));
                            let placeholder = m.get_or_create_binding(var);
                            placeholder.claim_self();
                            placeholder.mark_ambiguous_guard();
                            return None;
                        }
                    }
                }
            }
        };
    }

    best
}

/// `import`/`use` share this, differing only in
/// `explicit`. `b` should already be the fully-resolved,
/// self-owned owner (the caller is expected to have run it through
/// `resolve_owner` first).
pub fn import_(
    to: &Arc<Module>,
    from: &Arc<Module>,
    b: Option<Arc<Binding>>,
    asname: Symbol,
    s: Symbol,
    explicit: bool,
    sink: &dyn WarningSink,
) {
    let b = match b {
        Some(b) => b,
        None => {
            sink.warn(&format!(
                "could not import {}.{} into {}",
                from.name(),
                s,
                to.name()
            ));
            return;
        }
    };

    if b.deprecation().is_deprecated() && !b.has_value() {
        return;
    }
    if b.deprecation().is_deprecated() {
        sink.warn(&format!(
            "importing deprecated binding {}.{} into {}",
            from.name(),
            s,
            to.name()
        ));
    }

    match to.get_module_binding(asname) {
        None => {
            let alias = Binding::new();
            alias.set_alias(b.clone());
            alias.set_imported(explicit);
            alias.set_deprecation(b.deprecation());
            to.insert_binding(asname, alias);
        }
        Some(existing) => {
            if Arc::ptr_eq(&existing, &b) {
                return;
            }
            if eq_bindings(&existing, &b) {
                existing.set_imported(explicit);
                return;
            }
            match existing.owner_snapshot() {
                Owner::Unresolved => {
                    existing.set_alias(b.clone());
                    existing.set_imported(explicit);
                }
                Owner::SelfOwned => {
                    sink.warn(&format!(
                        "import of {asname} into {} conflicts with an existing identifier; ignored",
                        to.name()
                    ));
                }
                Owner::Alias(_) => {
                    sink.warn(&format!(
                        "conflicting import of {asname} into {}; ignored",
                        to.name()
                    ));
                }
            }
        }
    }
}

/// `using to; using from` — makes `from`'s exported names visible in `to`
/// without granting the right to redefine them locally. Lock
/// order is always `to` before `from`.
pub fn using(to: &Arc<Module>, from: &Arc<Module>, sink: &dyn WarningSink) {
    if Arc::ptr_eq(to, from) {
        return;
    }

    let mut to_tables = to.tables.lock().unwrap_or_else(|e| e.into_inner());
    if to_tables.usings.iter().any(|m| Arc::ptr_eq(m, from)) {
        return;
    }

    {
        let from_tables = from.tables.lock().unwrap_or_else(|e| e.into_inner());
        for (name, binding) in from_tables.bindings.iter() {
            if !binding.is_exported() || *name == to.name() {
                continue;
            }
            if let Some(existing) = to_tables.bindings.get(name) {
                if !eq_bindings(existing, binding) {
                    sink.warn(&format!(
                        "using {}.{} in module {} conflicts with an existing identifier",
                        from.name(),
                        name,
                        to.name()
                    ));
                }
            }
        }
    }

    to_tables.usings.push(from.clone());
}

/// Mark `s` as exported from `from`, lazily creating a placeholder
/// binding if it doesn't exist yet.
pub fn export(from: &Arc<Module>, s: Symbol) {
    let binding = from.get_or_create_binding(s);
    binding.set_exported(true);
}

/// "Binding for write": returns the binding to assign through,
/// allocating a fresh self-owned one if `alloc` and none exists.
pub fn get_binding_wr(
    m: &Arc<Module>,
    var: Symbol,
    alloc: bool,
) -> ModuleResult<Option<Arc<Binding>>> {
    match m.get_module_binding(var) {
        Some(b) => match b.owner_snapshot() {
            Owner::SelfOwned => Ok(Some(b)),
            Owner::Unresolved => {
                b.claim_self();
                Ok(Some(b))
            }
            Owner::Alias(_) => {
                if alloc {
                    Err(ModuleError::AssignToImported(var))
                } else {
                    Ok(Some(b))
                }
            }
        },
        None => {
            if alloc {
                let b = m.get_or_create_binding(var);
                b.claim_self();
                Ok(Some(b))
            } else {
                Ok(None)
            }
        }
    }
}

/// Like `get_binding_wr`, but for method definitions: adding a method to
/// an imported *type* is allowed without an explicit import (constructor
/// extension); plain functions still require one.
pub fn get_binding_for_method_def(m: &Arc<Module>, var: Symbol) -> ModuleResult<Arc<Binding>> {
    match m.get_module_binding(var) {
        Some(b) => match b.owner_snapshot() {
            Owner::SelfOwned => Ok(b),
            Owner::Unresolved => {
                b.claim_self();
                Ok(b)
            }
            Owner::Alias(owner) => {
                let owner_is_type = owner.value().map(|v| v.is_type()).unwrap_or(false);
                if !owner_is_type && !b.is_imported() {
                    Err(ModuleError::MethodNotExplicitlyImported(var))
                } else {
                    Ok(b)
                }
            }
        },
        None => {
            let b = m.get_or_create_binding(var);
            b.claim_self();
            Ok(b)
        }
    }
}

// ---- Auxiliary queries -------------------------------------------

pub fn module_exports_p(m: &Arc<Module>, s: Symbol) -> bool {
    m.get_module_binding(s).map(|b| b.is_exported()).unwrap_or(false)
}

pub fn boundp(m: &Arc<Module>, s: Symbol, sink: &dyn WarningSink) -> bool {
    resolve_owner(m, s, sink).map(|b| b.has_value()).unwrap_or(false)
}

pub fn is_const(m: &Arc<Module>, s: Symbol, sink: &dyn WarningSink) -> bool {
    resolve_owner(m, s, sink).map(|b| b.is_const()).unwrap_or(false)
}

pub fn is_imported(m: &Arc<Module>, s: Symbol) -> bool {
    m.get_module_binding(s).map(|b| b.is_imported()).unwrap_or(false)
}

pub fn defines_or_exports_p(m: &Arc<Module>, s: Symbol) -> bool {
    m.get_module_binding(s)
        .map(|b| b.is_self_owned() || b.is_exported())
        .unwrap_or(false)
}

pub fn binding_resolved_p(m: &Arc<Module>, s: Symbol) -> bool {
    m.get_module_binding(s)
        .map(|b| !b.is_unresolved() && !b.is_ambiguous_guard())
        .unwrap_or(false)
}

/// Read-binding-or-error: resolve `var` in `m`, raising `UndefinedVar` if
/// it doesn't exist and surfacing the deprecation warning/error on the way
/// out.
pub fn get_binding_or_error(
    m: &Arc<Module>,
    var: Symbol,
    depwarn: DepWarn,
    sink: &dyn WarningSink,
) -> ModuleResult<Arc<Binding>> {
    let binding = resolve_owner(m, var, sink).ok_or(ModuleError::UndefinedVar(var))?;
    binding_deprecation_warning(m, &binding, var, depwarn, sink)?;
    Ok(binding)
}

/// `get_global`: like `get_binding_or_error`, but returns the current value
/// rather than the binding itself, failing `UndefinedVar` if the binding
/// exists but has never been assigned.
pub fn get_global(
    m: &Arc<Module>,
    var: Symbol,
    depwarn: DepWarn,
    sink: &dyn WarningSink,
) -> ModuleResult<Value> {
    let binding = get_binding_or_error(m, var, depwarn, sink)?;
    binding.value().ok_or(ModuleError::UndefinedVar(var))
}

/// The module a binding's `GlobalRef` was created in, pinned at the moment
/// the ref was first asked for and not updated if the binding is later
/// re-aliased elsewhere.
pub fn module_of_binding(gref: &crate::binding::GlobalRef) -> Arc<Module> {
    gref.module.clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::CollectingSink;
    use crate::value::Value;

    fn sym(s: &str) -> Symbol {
        Symbol::new(s)
    }

    fn export_const(m: &Arc<Module>, name: Symbol, value: Value) {
        let b = get_binding_wr(m, name, true).unwrap().unwrap();
        b.set_constp();
        assert!(b.cas_init_value(value));
        export(m, name);
    }

    #[test]
    fn promotion_creates_stable_alias_without_marking_imported() {
        let a = Module::new_root(sym("PromoA"), 1);
        let c = Module::new_child(sym("PromoC"), a.clone(), 2);
        export_const(&a, sym("y"), Value::Int(1));
        let sink = CollectingSink::new();
        using(&c, &a, &sink);

        let resolved = resolve_owner(&c, sym("y"), &sink).expect("y resolves through using");
        assert!(resolved.is_self_owned());

        let local = c.get_module_binding(sym("y")).expect("promoted alias installed");
        assert!(!local.is_imported());
        assert!(eq_bindings(&local.alias_target().unwrap(), &resolved));
    }

    #[test]
    fn ambiguous_using_warns_once_and_returns_none() {
        let a = Module::new_root(sym("AmbA"), 1);
        let b = Module::new_root(sym("AmbB"), 2);
        let c = Module::new_child(sym("AmbC"), a.clone(), 3);
        export_const(&a, sym("x"), Value::Int(1));
        export_const(&b, sym("x"), Value::Int(2));

        let sink = CollectingSink::new();
        using(&c, &a, &sink);
        using(&c, &b, &sink);

        assert!(resolve_owner(&c, sym("x"), &sink).is_none());
        assert_eq!(sink.count(), 1);
        assert!(sink.messages()[0].contains("both"));

        // Second call must not repeat the warning, and must still report
        // the name as unresolved rather than latching onto the guard
        // placeholder as if it were a real answer.
        assert!(resolve_owner(&c, sym("x"), &sink).is_none());
        assert_eq!(sink.count(), 1);
        assert!(!binding_resolved_p(&c, sym("x")));
        assert!(get_binding_or_error(&c, sym("x"), DepWarn::Warn, &sink).is_err());
    }

    #[test]
    fn cyclic_usings_terminate_with_none() {
        let a = Module::new_root(sym("CycA"), 1);
        let b = Module::new_root(sym("CycB"), 2);
        let sink = CollectingSink::new();
        using(&a, &b, &sink);
        using(&b, &a, &sink);

        assert!(resolve_owner(&a, sym("nope"), &sink).is_none());
    }

    #[test]
    fn using_same_module_twice_is_idempotent() {
        let a = Module::new_root(sym("UseOnceA"), 1);
        let c = Module::new_child(sym("UseOnceC"), a.clone(), 2);
        let sink = CollectingSink::new();
        using(&c, &a, &sink);
        using(&c, &a, &sink);
        assert_eq!(c.usings_snapshot().len(), 1);
    }

    #[test]
    fn import_is_idempotent_on_identical_binding() {
        let a = Module::new_root(sym("ImpA"), 1);
        let c = Module::new_child(sym("ImpC"), a.clone(), 2);
        export_const(&a, sym("y"), Value::Int(5));
        let owner = resolve_owner(&a, sym("y"), &CollectingSink::new()).unwrap();

        let sink = CollectingSink::new();
        import_(&c, &a, Some(owner.clone()), sym("y"), sym("y"), true, &sink);
        import_(&c, &a, Some(owner.clone()), sym("y"), sym("y"), true, &sink);

        assert!(sink.messages().is_empty());
        assert!(is_imported(&c, sym("y")));
    }

    #[test]
    fn module_import_updates_imported_flag_on_reimport() {
        let a = Module::new_root(sym("ReimpA"), 1);
        let c = Module::new_child(sym("ReimpC"), a.clone(), 2);
        export_const(&a, sym("y"), Value::Int(5));
        let owner = resolve_owner(&a, sym("y"), &CollectingSink::new()).unwrap();
        let sink = CollectingSink::new();

        import_(&c, &a, Some(owner.clone()), sym("y"), sym("y"), false, &sink);
        assert!(!is_imported(&c, sym("y")));
        import_(&c, &a, Some(owner.clone()), sym("y"), sym("y"), true, &sink);
        assert!(is_imported(&c, sym("y")));
    }

    #[test]
    fn get_binding_or_error_reports_undefined_var() {
        let m = Module::new_root(sym("UndefM"), 1);
        let sink = CollectingSink::new();
        let err = get_binding_or_error(&m, sym("nope"), DepWarn::Warn, &sink).unwrap_err();
        assert_eq!(err, ModuleError::UndefinedVar(sym("nope")));
    }

    #[test]
    fn get_global_reads_through_usings() {
        let a = Module::new_root(sym("GgA"), 1);
        let c = Module::new_child(sym("GgC"), a.clone(), 2);
        export_const(&a, sym("z"), Value::Int(9));
        let sink = CollectingSink::new();
        using(&c, &a, &sink);
        assert_eq!(
            get_global(&c, sym("z"), DepWarn::Warn, &sink).unwrap(),
            Value::Int(9)
        );
    }

    #[test]
    fn get_global_under_error_depwarn_raises_on_deprecated() {
        let m = Module::new_root(sym("GgDep"), 1);
        let b = get_binding_wr(&m, sym("old"), true).unwrap().unwrap();
        b.store_value(Value::Int(1));
        crate::deprecation::deprecate_binding(&b, crate::binding::Deprecation::Renamed);
        let sink = CollectingSink::new();
        let err = get_global(&m, sym("old"), DepWarn::Error, &sink).unwrap_err();
        assert_eq!(err, ModuleError::DeprecatedUse(sym("old")));
    }

    #[test]
    fn module_of_binding_is_pinned_at_creation() {
        let a = Module::new_root(sym("PinA"), 1);
        let b = get_binding_wr(&a, sym("pinned"), true).unwrap().unwrap();
        let gref = b.globalref_or_create(&a, sym("pinned"));
        assert!(Arc::ptr_eq(&module_of_binding(&gref), &a));
    }
}
