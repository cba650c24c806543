//! Symbol table & scope.
//!
//! A stack of maps, innermost scope on top. `insert` only ever checks the
//! top scope (nested scopes may shadow an outer binding freely); `lookup`
//! only ever checks the top scope; `probe` walks from the top down and
//! returns the nearest binding, which is what name resolution inside an
//! expression actually wants. Bindings have lexical extent only — once a
//! scope is popped its entries are gone, with no way to recover them.

use crate::common::{Id, Map};
use crate::front::ast::BaseType;

/// A name's binding: a compile-time constant, or a variable addressed
/// through its (already scope-mangled) storage name.
#[derive(Debug, Clone)]
pub struct Binding {
    pub base_type: BaseType,
    pub is_constant: bool,
    /// IR storage name (`@x_3`, `@x` for globals). Unused for constants.
    pub storage_name: Option<Id>,
    /// Present for constants.
    pub const_value: Option<i32>,
    /// True for a plain scalar; arrays are tracked for forward
    /// compatibility but never indexed.
    pub array_dims: Vec<i32>,
}

impl Binding {
    pub fn constant(value: i32) -> Self {
        Binding {
            base_type: BaseType::Int,
            is_constant: true,
            storage_name: None,
            const_value: Some(value),
            array_dims: Vec::new(),
        }
    }

    pub fn variable(storage_name: Id) -> Self {
        Binding {
            base_type: BaseType::Int,
            is_constant: false,
            storage_name: Some(storage_name),
            const_value: None,
            array_dims: Vec::new(),
        }
    }
}

#[derive(Debug, Default)]
pub struct SymbolTable {
    scopes: Vec<Map<Id, Binding>>,
}

impl SymbolTable {
    pub fn new() -> Self {
        SymbolTable { scopes: vec![Map::new()] }
    }

    pub fn enter_scope(&mut self) {
        self.scopes.push(Map::new());
    }

    pub fn exit_scope(&mut self) {
        self.scopes.pop().expect("exit_scope without a matching enter_scope");
    }

    /// Insert into the top scope. Fails (returns `false`, no mutation) if
    /// `name` already exists in that same scope; sibling/ancestor scopes
    /// never block an insert.
    pub fn insert(&mut self, name: Id, binding: Binding) -> bool {
        let top = self.scopes.last_mut().expect("symbol table has no scope");
        if top.contains_key(&name) {
            return false;
        }
        top.insert(name, binding);
        true
    }

    /// Look up `name` in the top scope only.
    pub fn lookup(&self, name: Id) -> Option<&Binding> {
        self.scopes.last().and_then(|s| s.get(&name))
    }

    /// Walk from the innermost scope outward, returning the nearest
    /// binding for `name`.
    pub fn probe(&self, name: Id) -> Option<&Binding> {
        self.scopes.iter().rev().find_map(|s| s.get(&name))
    }

    pub fn depth(&self) -> usize {
        self.scopes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::id;

    #[test]
    fn insert_rejects_same_scope_duplicate() {
        let mut t = SymbolTable::new();
        assert!(t.insert(id("x"), Binding::constant(1)));
        assert!(!t.insert(id("x"), Binding::constant(2)));
    }

    #[test]
    fn nested_scope_shadows_freely() {
        let mut t = SymbolTable::new();
        assert!(t.insert(id("x"), Binding::constant(1)));
        t.enter_scope();
        assert!(t.insert(id("x"), Binding::constant(2)));
        assert_eq!(t.probe(id("x")).unwrap().const_value, Some(2));
        t.exit_scope();
        assert_eq!(t.probe(id("x")).unwrap().const_value, Some(1));
    }

    #[test]
    fn lookup_only_checks_top_scope() {
        let mut t = SymbolTable::new();
        t.insert(id("x"), Binding::constant(1));
        t.enter_scope();
        assert!(t.lookup(id("x")).is_none());
        assert!(t.probe(id("x")).is_some());
    }

    #[test]
    fn binding_unreachable_after_scope_pop() {
        let mut t = SymbolTable::new();
        t.enter_scope();
        t.insert(id("y"), Binding::constant(9));
        t.exit_scope();
        assert!(t.probe(id("y")).is_none());
    }
}
