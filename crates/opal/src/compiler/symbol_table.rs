//! Lexically scoped symbol tables.
//!
//! One table per function being compiled, linked through `outer`. Four
//! binding kinds exist:
//! - Global: defined at the top level, indexed into the VM's globals array
//! - Local: defined inside a function, indexed into the frame's stack window
//! - Builtin: pre-defined host functions, indexed into the builtin table
//! - Free: a binding imported from an enclosing function at resolve time
//!
//! Resolution promotes automatically: the first reference that crosses a
//! function boundary to reach an outer Local (or an outer Free) records the
//! original symbol in `free_symbols` and caches a Free symbol in the current
//! store. The order of `free_symbols` fixes the layout of the closure's
//! free-variable array.

use std::collections::HashMap;

/// The binding kind of a symbol.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SymbolScope {
    Global,
    Local,
    Builtin,
    Free,
}

/// A resolved binding: its name, kind, and scope-relative index.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Symbol {
    pub name: String,
    pub scope: SymbolScope,
    pub index: usize,
}

/// One lexical scope's bindings.
#[derive(Clone, Debug, Default)]
pub struct SymbolTable {
    pub outer: Option<Box<SymbolTable>>,
    store: HashMap<String, Symbol>,
    /// Number of Global/Local definitions made directly in this scope.
    pub num_definitions: usize,
    /// Symbols imported from enclosing scopes, in declaration order. The
    /// enclosing compiler walks this to emit the capture loads that feed
    /// the `Closure` instruction.
    pub free_symbols: Vec<Symbol>,
}

impl SymbolTable {
    /// Create an empty top-level table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a table enclosed in `outer`.
    pub fn enclosed(outer: SymbolTable) -> Self {
        Self {
            outer: Some(Box::new(outer)),
            ..Self::default()
        }
    }

    /// Define a new binding in this scope. The kind is Global at the top
    /// level and Local inside any function. Re-definition shadows.
    pub fn define(&mut self, name: impl Into<String>) -> Symbol {
        let name = name.into();
        let scope = if self.outer.is_none() {
            SymbolScope::Global
        } else {
            SymbolScope::Local
        };
        let symbol = Symbol {
            name: name.clone(),
            scope,
            index: self.num_definitions,
        };
        self.store.insert(name, symbol.clone());
        self.num_definitions += 1;
        symbol
    }

    /// Define a builtin binding with a caller-provided table index.
    pub fn define_builtin(&mut self, index: usize, name: impl Into<String>) -> Symbol {
        let name = name.into();
        let symbol = Symbol {
            name: name.clone(),
            scope: SymbolScope::Builtin,
            index,
        };
        self.store.insert(name, symbol.clone());
        symbol
    }

    /// Resolve a name, searching outward through enclosing scopes.
    ///
    /// A hit in the current store is returned as-is, as are outer hits that
    /// are Global or Builtin (those are addressable from anywhere). An outer
    /// Local or Free crossed a function boundary to get here, so it is
    /// promoted to a Free binding of this scope and cached.
    pub fn resolve(&mut self, name: &str) -> Option<Symbol> {
        if let Some(symbol) = self.store.get(name) {
            return Some(symbol.clone());
        }
        let outer = self.outer.as_mut()?;
        let symbol = outer.resolve(name)?;
        match symbol.scope {
            SymbolScope::Global | SymbolScope::Builtin => Some(symbol),
            SymbolScope::Local | SymbolScope::Free => Some(self.define_free(symbol)),
        }
    }

    fn define_free(&mut self, original: Symbol) -> Symbol {
        let symbol = Symbol {
            name: original.name.clone(),
            scope: SymbolScope::Free,
            index: self.free_symbols.len(),
        };
        self.free_symbols.push(original);
        self.store.insert(symbol.name.clone(), symbol.clone());
        symbol
    }
}
