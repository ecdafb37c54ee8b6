//! Name bindings for the tree-walking evaluator.
//!
//! Environments form a chain: each function call evaluates its body in a
//! fresh environment enclosing the function's defining environment. The
//! chain is shared and mutable (`let` writes into the current link), hence
//! `Rc<RefCell<...>>`. Cycles created by closures that capture their own
//! environment are never collected; that is accepted.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::object::Value;

/// A shared handle to an environment link.
pub type Env = Rc<RefCell<Environment>>;

/// One link in the environment chain.
#[derive(Debug, Default)]
pub struct Environment {
    store: HashMap<String, Value>,
    outer: Option<Env>,
}

impl Environment {
    /// Create a fresh top-level environment.
    pub fn new() -> Env {
        Rc::new(RefCell::new(Environment::default()))
    }

    /// Create an environment enclosing `outer`.
    pub fn enclosed(outer: Env) -> Env {
        Rc::new(RefCell::new(Environment {
            store: HashMap::new(),
            outer: Some(outer),
        }))
    }

    /// Look a name up, walking outward through the chain.
    pub fn get(&self, name: &str) -> Option<Value> {
        if let Some(value) = self.store.get(name) {
            return Some(value.clone());
        }
        self.outer.as_ref().and_then(|outer| outer.borrow().get(name))
    }

    /// Bind a name in this link, shadowing any outer binding.
    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        self.store.insert(name.into(), value);
    }
}
