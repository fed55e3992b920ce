//! The opaque "value inspection" seam.
//!
//! The resolver and assignment logic only ever need to ask a handful of
//! questions of a runtime value: is it a type, a module, a function, and
//! does it structurally equal some other value. Everything else (actual
//! method dispatch, GC layout, ...) belongs to the evaluator and method
//! table this crate treats as external collaborators, so `Value` stays a
//! thin enum rather than a real object model.

use crate::module::Module;
use crate::symbol::Symbol;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// A runtime value as seen by the module/binding subsystem.
#[derive(Clone)]
pub enum Value {
    Unit,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Arc<str>),
    /// A reference to another module (e.g. the self-binding `new_module`
    /// installs so `using Foo` exposes the name `Foo`).
    Module(Arc<Module>),
    /// A declared type, used both as an ordinary value and as the payload
    /// of a `Binding::ty` constraint.
    Type(Arc<VexType>),
    /// A callable; the method table itself lives in `vex-compiler`, so
    /// this only carries enough identity for diagnostics and `is a
    /// generic function` checks.
    Function(Symbol),
    /// Anything else the GC would otherwise own.
    Opaque(Arc<dyn Any + Send + Sync>),
}

impl Value {
    pub fn is_type(&self) -> bool {
        matches!(self, Value::Type(_))
    }

    pub fn is_module(&self) -> bool {
        matches!(self, Value::Module(_))
    }

    pub fn is_function(&self) -> bool {
        matches!(self, Value::Function(_))
    }

    /// The identifying name to show in a `", use <new> instead."`
    /// deprecation message, for the value kinds that carry one. `None` for
    /// values with no name to point at (e.g. a plain `Int`, or a `Universal`
    /// type).
    pub fn dep_message_name(&self) -> Option<String> {
        match self {
            Value::Type(t) => t.name().map(|s| s.to_string()),
            Value::Module(m) => Some(m.name().to_string()),
            Value::Function(s) => Some(s.to_string()),
            _ => None,
        }
    }

    /// The declared type of this value, for typed-global enforcement.
    pub fn type_of(&self) -> Arc<VexType> {
        match self {
            Value::Unit => Arc::new(VexType::Named(Symbol::new("Nothing"))),
            Value::Bool(_) => Arc::new(VexType::Named(Symbol::new("Bool"))),
            Value::Int(_) => Arc::new(VexType::Named(Symbol::new("Int"))),
            Value::Float(_) => Arc::new(VexType::Named(Symbol::new("Float"))),
            Value::Str(_) => Arc::new(VexType::Named(Symbol::new("String"))),
            Value::Module(_) => Arc::new(VexType::Named(Symbol::new("Module"))),
            Value::Type(_) => Arc::new(VexType::Named(Symbol::new("Type"))),
            Value::Function(_) => Arc::new(VexType::Named(Symbol::new("Function"))),
            Value::Opaque(_) => Arc::new(VexType::Universal),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Unit, Value::Unit) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Module(a), Value::Module(b)) => Arc::ptr_eq(a, b),
            (Value::Type(a), Value::Type(b)) => a == b,
            (Value::Function(a), Value::Function(b)) => a == b,
            (Value::Opaque(a), Value::Opaque(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Unit => write!(f, "()"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Str(s) => write!(f, "{s:?}"),
            Value::Module(m) => write!(f, "<module {}>", m.name()),
            Value::Type(t) => write!(f, "{t:?}"),
            Value::Function(s) => write!(f, "<function {s}>"),
            Value::Opaque(_) => write!(f, "<opaque>"),
        }
    }
}

/// A declared type constraint on a binding. Deliberately shallow: this
/// crate does no type inference (an explicit non-goal), it only needs
/// enough structure to reject an incompatible assignment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum VexType {
    /// "No constraint yet" — matches anything. This is the value an unset
    /// `Binding::ty` is treated as.
    Universal,
    Named(Symbol),
}

impl VexType {
    pub fn conforms(&self, value: &Value) -> bool {
        match self {
            VexType::Universal => true,
            VexType::Named(_) => *self == *value.type_of(),
        }
    }

    /// The type's own name, for deprecation messages pointing at a
    /// replacement type. `Universal` has none.
    pub fn name(&self) -> Option<Symbol> {
        match self {
            VexType::Universal => None,
            VexType::Named(s) => Some(*s),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn universal_type_accepts_anything() {
        assert!(VexType::Universal.conforms(&Value::Int(1)));
        assert!(VexType::Universal.conforms(&Value::Str(Arc::from("x"))));
    }

    #[test]
    fn named_type_rejects_mismatch() {
        let int_ty = VexType::Named(Symbol::new("Int"));
        assert!(int_ty.conforms(&Value::Int(1)));
        assert!(!int_ty.conforms(&Value::Str(Arc::from("x"))));
    }

    #[test]
    fn value_equality_is_structural() {
        assert_eq!(Value::Int(42), Value::Int(42));
        assert_ne!(Value::Int(42), Value::Int(43));
        assert_ne!(Value::Int(1), Value::Str(Arc::from("1")));
    }

    #[test]
    fn dep_message_name_prefers_the_carried_symbol() {
        assert_eq!(
            Value::Function(Symbol::new("new_fn")).dep_message_name(),
            Some("new_fn".to_string())
        );
        assert_eq!(
            Value::Type(Arc::new(VexType::Named(Symbol::new("NewType")))).dep_message_name(),
            Some("NewType".to_string())
        );
        assert_eq!(Value::Int(1).dep_message_name(), None);
        assert_eq!(
            Value::Type(Arc::new(VexType::Universal)).dep_message_name(),
            None
        );
    }
}
