//! Assignment and constant-declaration semantics.

use crate::binding::Binding;
use crate::diagnostics::WarningSink;
use crate::error::{ModuleError, ModuleResult};
use crate::symbol::Symbol;
use crate::value::Value;
use std::sync::Arc;

/// Assign `rhs` to `binding`, enforcing the declared-type constraint and
/// the constant-redefinition rules.
pub fn checked_assignment(
    binding: &Arc<Binding>,
    var: Symbol,
    rhs: Value,
    sink: &dyn WarningSink,
) -> ModuleResult<()> {
    let ty = binding.ensure_type_initialized();
    if !ty.conforms(&rhs) {
        return Err(ModuleError::IncompatibleTypedAssignment(var));
    }

    if binding.is_const() {
        if binding.cas_init_value(rhs.clone()) {
            return Ok(());
        }

        let old = binding
            .value()
            .expect("is_const with a failed CAS implies a value is already present");

        if old == rhs {
            return Ok(());
        }

        if old.type_of() != rhs.type_of() || old.is_type() || old.is_module() || rhs.is_type() || rhs.is_module() {
            return Err(ModuleError::InvalidConstantRedefinition(var));
        }

        sink.warn(&format!("redefinition of constant {var}; may fail"));
        binding.store_value(rhs);
        return Ok(());
    }

    binding.store_value(rhs);
    Ok(())
}

/// Declare `var` in `m` as a freshly-initialized constant (`set_const`).
/// Fails if the binding already holds a value — unlike
/// `checked_assignment`, this never silently accepts a repeat of the same
/// value, even if the value is identical to what's already there.
pub fn set_const(binding: &Arc<Binding>, var: Symbol, val: Value) -> ModuleResult<()> {
    if binding.cas_init_value(val) {
        binding.ensure_type_initialized();
        binding.set_constp();
        Ok(())
    } else {
        Err(ModuleError::InvalidConstantRedefinition(var))
    }
}

/// Mark an existing, self-owned, still-unassigned-or-already-const binding
/// as constant.
pub fn declare_constant(binding: &Arc<Binding>, var: Symbol) -> ModuleResult<()> {
    if !binding.is_self_owned() {
        return Err(ModuleError::InvalidConstantRedefinition(var));
    }
    if binding.has_value() && !binding.is_const() {
        return Err(ModuleError::InvalidConstantRedefinition(var));
    }
    binding.set_constp();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::CollectingSink;

    fn sym(s: &str) -> Symbol {
        Symbol::new(s)
    }

    #[test]
    fn set_const_twice_fails_even_with_same_value() {
        let b = Binding::new();
        b.claim_self();
        assert!(set_const(&b, sym("k"), Value::Int(1)).is_ok());
        assert_eq!(
            set_const(&b, sym("k"), Value::Int(1)),
            Err(ModuleError::InvalidConstantRedefinition(sym("k")))
        );
    }

    #[test]
    fn checked_assignment_on_const_is_idempotent_for_equal_value() {
        let b = Binding::new();
        b.claim_self();
        set_const(&b, sym("k2"), Value::Int(1)).unwrap();
        let sink = CollectingSink::new();
        assert!(checked_assignment(&b, sym("k2"), Value::Int(1), &sink).is_ok());
        assert!(sink.messages().is_empty());
    }

    #[test]
    fn checked_assignment_on_const_with_different_value_warns_and_stores() {
        let b = Binding::new();
        b.claim_self();
        set_const(&b, sym("k3"), Value::Int(1)).unwrap();
        let sink = CollectingSink::new();
        assert!(checked_assignment(&b, sym("k3"), Value::Int(2), &sink).is_ok());
        assert_eq!(sink.count(), 1);
        assert_eq!(b.value(), Some(Value::Int(2)));
    }

    #[test]
    fn checked_assignment_on_const_with_different_type_fails() {
        let b = Binding::new();
        b.claim_self();
        set_const(&b, sym("k4"), Value::Int(1)).unwrap();
        let sink = CollectingSink::new();
        let result = checked_assignment(&b, sym("k4"), Value::Str(Arc::from("x")), &sink);
        assert_eq!(
            result,
            Err(ModuleError::InvalidConstantRedefinition(sym("k4")))
        );
    }

    #[test]
    fn typed_global_rejects_incompatible_value() {
        use crate::value::VexType;
        let b = Binding::new();
        b.claim_self();
        let sink = CollectingSink::new();
        checked_assignment(&b, sym("t"), Value::Int(1), &sink).unwrap();
        *b.ty.write().unwrap() = Some(Arc::new(VexType::Named(sym("Int"))));
        let result = checked_assignment(&b, sym("t"), Value::Str(Arc::from("nope")), &sink);
        assert_eq!(
            result,
            Err(ModuleError::IncompatibleTypedAssignment(sym("t")))
        );
    }

    #[test]
    fn declare_constant_rejects_non_self_owned() {
        let owner = Binding::new();
        owner.claim_self();
        let alias = Binding::new();
        alias.set_alias(owner);
        assert!(declare_constant(&alias, sym("q")).is_err());
    }
}
