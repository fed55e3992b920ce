//! Module, binding, and name-resolution subsystem for the Vex runtime.
//!
//! Every global a running Vex program can see — a function, a constant, a
//! submodule, a typed top-level variable — lives in exactly one module's
//! binding table. This crate owns that table, the `using`/`import` name
//! resolution that lets one module see another's exports, and the
//! constant/typed-global assignment rules that keep redefinition well
//! defined under concurrent access.

pub mod assignment;
pub mod binding;
pub mod deprecation;
pub mod diagnostics;
pub mod error;
pub mod module;
pub mod resolver;
pub mod runtime;
pub mod symbol;
pub mod value;

pub use assignment::{checked_assignment, declare_constant, set_const};
pub use binding::{eq_bindings, Binding, Deprecation, GlobalRef, Owner};
pub use deprecation::{binding_dep_message, binding_deprecation_warning, deprecate_binding, DepWarn};
pub use diagnostics::{CollectingSink, StderrSink, WarningSink};
pub use error::{ModuleError, ModuleResult};
pub use module::{Knob, Module, ModuleId, ModuleParent};
pub use resolver::{
    boundp, defines_or_exports_p, binding_resolved_p, export, get_binding_for_method_def,
    get_binding_or_error, get_binding_wr, get_global, import_, is_const, is_imported,
    module_exports_p, module_of_binding, resolve_owner, using,
};
pub use runtime::{new_module, DepWarnMode, PendingInit, Runtime, RuntimeOptions};
pub use symbol::Symbol;
pub use value::{Value, VexType};
