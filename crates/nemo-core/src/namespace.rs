//! Lexical scopes and the variables bound within them.
//!
//! The original interpreter kept three separate lookup tables (globals,
//! user functions, C functions) because a "function" was a different C type
//! from a value. Once [`crate::value::Value`] folds closures and builtins
//! into the value taxonomy, all three collapse into one variable list per
//! scope; `labels` (the original's fourth table, for `goto`-style jumps)
//! stays separate since it binds to AST nodes, not values.

use std::{cell::RefCell, rc::Rc};

use ahash::AHashMap;

use crate::{
    ast::Node,
    errors::{EvalResult, RunError},
    types::Type,
    value::Value,
};

/// One binding: a name, its current value, and whether it was declared
/// `const` (§3 Variable).
#[derive(Debug)]
pub struct Variable {
    pub name: String,
    pub value: RefCell<Value>,
    pub is_const: bool,
}

/// A lexical scope: an append-only chain of parents, each holding its own
/// variable/label/advisory-type tables (§3 Scope).
#[derive(Debug)]
pub struct Scope {
    parent: Option<Rc<Scope>>,
    vars: RefCell<Vec<Rc<Variable>>>,
    types: RefCell<AHashMap<String, Type>>,
    labels: RefCell<Vec<(String, Node)>>,
}

impl Scope {
    /// The outermost scope of an interpreter run; has no parent.
    #[must_use]
    pub fn root() -> Rc<Self> {
        Rc::new(Self {
            parent: None,
            vars: RefCell::new(Vec::new()),
            types: RefCell::new(AHashMap::new()),
            labels: RefCell::new(Vec::new()),
        })
    }

    /// A fresh child scope nested under `self` (entering a block, a
    /// function body, ...).
    #[must_use]
    pub fn child(self: &Rc<Self>) -> Rc<Self> {
        Rc::new(Self {
            parent: Some(Rc::clone(self)),
            vars: RefCell::new(Vec::new()),
            types: RefCell::new(AHashMap::new()),
            labels: RefCell::new(Vec::new()),
        })
    }

    /// Declares a brand-new binding in *this* scope. Shadowing an outer
    /// scope's binding of the same name is fine; redeclaring within the
    /// same scope is a `NameError` (§7).
    pub fn declare(&self, name: &str, value: Value, is_const: bool) -> EvalResult<()> {
        if self.vars.borrow().iter().any(|v| v.name == name) {
            return Err(RunError::name_already_declared(None, name));
        }
        self.vars.borrow_mut().push(Rc::new(Variable { name: name.to_owned(), value: RefCell::new(value), is_const }));
        Ok(())
    }

    /// Finds the nearest binding for `name`, searching outward from `self`
    /// through enclosing scopes.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<Rc<Variable>> {
        if let Some(found) = self.vars.borrow().iter().find(|v| v.name == name) {
            return Some(Rc::clone(found));
        }
        self.parent.as_ref().and_then(|p| p.lookup(name))
    }

    /// Assigns through an existing binding (`NameError` if undeclared or
    /// `const`).
    pub fn assign(&self, name: &str, value: Value) -> EvalResult<()> {
        let var = self.lookup(name).ok_or_else(|| RunError::name_not_found(None, name))?;
        if var.is_const {
            return Err(RunError::name_const(None, name));
        }
        *var.value.borrow_mut() = value;
        Ok(())
    }

    /// Records an advisory type binding for the inferencer. Scoped the same
    /// way as ordinary variables but kept in a separate table since it has
    /// no runtime effect of its own.
    pub fn bind_type(&self, name: &str, ty: Type) {
        self.types.borrow_mut().insert(name.to_owned(), ty);
    }

    #[must_use]
    pub fn lookup_type(&self, name: &str) -> Option<Type> {
        if let Some(ty) = self.types.borrow().get(name) {
            return Some(ty.clone());
        }
        self.parent.as_ref().and_then(|p| p.lookup_type(name))
    }

    /// `label:` — binds a name to the statement it prefixes, for `goto`.
    pub fn define_label(&self, name: &str, target: Node) {
        self.labels.borrow_mut().push((name.to_owned(), target));
    }

    #[must_use]
    pub fn resolve_label(&self, name: &str) -> Option<Node> {
        if let Some((_, node)) = self.labels.borrow().iter().find(|(n, _)| n == name) {
            return Some(node.clone());
        }
        self.parent.as_ref().and_then(|p| p.resolve_label(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    #[test]
    fn child_scope_sees_parent_bindings() {
        let root = Scope::root();
        root.declare("x", Value::new_int(1), false).unwrap();
        let child = root.child();
        assert!(matches!(child.lookup("x").unwrap().value.borrow().clone(), Value::Int(1)));
    }

    #[test]
    fn shadowing_in_child_does_not_affect_parent() {
        let root = Scope::root();
        root.declare("x", Value::new_int(1), false).unwrap();
        let child = root.child();
        child.declare("x", Value::new_int(2), false).unwrap();
        assert!(matches!(child.lookup("x").unwrap().value.borrow().clone(), Value::Int(2)));
        assert!(matches!(root.lookup("x").unwrap().value.borrow().clone(), Value::Int(1)));
    }

    #[test]
    fn redeclaring_in_same_scope_is_a_name_error() {
        let root = Scope::root();
        root.declare("x", Value::new_int(1), false).unwrap();
        let err = root.declare("x", Value::new_int(2), false).unwrap_err();
        assert_eq!(err.kind, crate::errors::ErrorKind::NameError);
    }

    #[test]
    fn assigning_through_const_binding_fails() {
        let root = Scope::root();
        root.declare("x", Value::new_int(1), true).unwrap();
        let err = root.assign("x", Value::new_int(2)).unwrap_err();
        assert_eq!(err.kind, crate::errors::ErrorKind::NameError);
    }

    #[test]
    fn assigning_undeclared_name_fails() {
        let root = Scope::root();
        let err = root.assign("missing", Value::new_int(1)).unwrap_err();
        assert_eq!(err.kind, crate::errors::ErrorKind::NameError);
    }

    #[test]
    fn type_bindings_are_advisory_and_scope_like_variables() {
        let root = Scope::root();
        root.bind_type("x", Type::Int);
        let child = root.child();
        assert_eq!(child.lookup_type("x"), Some(Type::Int));
    }
}
