//! Error kinds raised by the module/binding subsystem.
//!
//! Everything else — ambiguous `using`, conflicting imports, shadowing,
//! deprecated-use-under-warn — is a soft failure: a [`crate::diagnostics::WarningSink`]
//! call plus a `None`/no-op return, never an `Err`.

use crate::symbol::Symbol;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ModuleError {
    #[error("cannot assign a value to imported variable {0}")]
    AssignToImported(Symbol),

    #[error("function {0} must be explicitly imported to be extended")]
    MethodNotExplicitlyImported(Symbol),

    #[error("invalid redefinition of constant {0}")]
    InvalidConstantRedefinition(Symbol),

    #[error("cannot assign an incompatible value to the global {0}")]
    IncompatibleTypedAssignment(Symbol),

    #[error("{0} not defined")]
    UndefinedVar(Symbol),

    #[error("{0} is deprecated")]
    DeprecatedUse(Symbol),
}

pub type ModuleResult<T> = Result<T, ModuleError>;
