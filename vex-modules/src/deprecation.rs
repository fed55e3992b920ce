//! Deprecation flags and the warnings/errors they trigger on use.

use crate::binding::{Binding, Deprecation, Owner};
use crate::diagnostics::WarningSink;
use crate::error::{ModuleError, ModuleResult};
use crate::module::Module;
use crate::symbol::Symbol;
use crate::value::Value;
use std::sync::Arc;

/// The `depwarn` option.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DepWarn {
    Off,
    Warn,
    Error,
}

/// Set a deprecation flag on the *owner* of `binding` — deprecation is a
/// property of the authoritative slot, not of every alias pointing at it.
pub fn deprecate_binding(binding: &Arc<Binding>, flag: Deprecation) {
    let owner = match binding.owner_snapshot() {
        Owner::Alias(target) => target,
        _ => binding.clone(),
    };
    owner.set_deprecation(flag);
}

/// Emit (or escalate to an error) the warning for using a `Renamed`
/// binding. Only fires for `Deprecation::Renamed` (flag == 1); `Moved`
/// bindings (flag == 2) are stubs that error when *called*, not when
/// merely read, so this function has nothing to do for them.
pub fn binding_deprecation_warning(
    module: &Arc<Module>,
    binding: &Arc<Binding>,
    name: Symbol,
    depwarn: DepWarn,
    sink: &dyn WarningSink,
) -> ModuleResult<()> {
    if binding.deprecation() != Deprecation::Renamed {
        return Ok(());
    }

    match depwarn {
        DepWarn::Off => Ok(()),
        DepWarn::Warn => {
            sink.warn(&format!(
                "{} is deprecated{}",
                name,
                binding_dep_message(module, name)
            ));
            Ok(())
        }
        DepWarn::Error => {
            sink.warn(&format!(
                "{} is deprecated{}",
                name,
                binding_dep_message(module, name)
            ));
            Err(ModuleError::DeprecatedUse(name))
        }
    }
}

/// Build the `", use <new> instead."`-shaped suffix for a deprecation
/// warning. Prefers a companion
/// `_dep_message_<name>` string binding if present; otherwise synthesizes
/// from the replacement name the (possibly stub) binding's value itself
/// identifies — a type, module, or generic function's own name, not just
/// its category.
pub fn binding_dep_message(module: &Arc<Module>, name: Symbol) -> String {
    let companion = Symbol::new(&format!("_dep_message_{name}"));
    if let Some(b) = module.get_module_binding(companion) {
        if let Some(Value::Str(s)) = b.value() {
            return s.to_string();
        }
    }

    if let Some(b) = module.get_module_binding(name) {
        if let Some(value) = b.value() {
            let replacement = value
                .dep_message_name()
                .unwrap_or_else(|| "a new name".to_string());
            return format!(", use {replacement} instead.");
        }
    }

    String::new()
}
