//! Runtime value types.
//!
//! Opal values live on the VM's operand stack, in the globals array, in the
//! constant pool, and in evaluator environments:
//! - Scalars: Integer, Boolean, Null
//! - Containers: String, Array, Hash
//! - Code: Function (evaluator closure), CompiledFunction, Closure, Builtin
//! - Plumbing: ReturnValue (evaluator-only), Error (in-language error value)
//!
//! Heap-backed variants share their payload through `Arc`, so cloning a
//! value is cheap. Compiled function bodies are immutable once they enter
//! the constant pool and may be shared by any number of closures.

pub mod builtins;
pub mod environment;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::ast::BlockStatement;
use crate::object::environment::Env;

/// A function compiled to bytecode, stored in the constant pool.
#[derive(Debug)]
pub struct CompiledFunction {
    /// The function body's instruction stream.
    pub instructions: Arc<[u8]>,
    /// Number of local slots to reserve, parameters included.
    pub num_locals: usize,
    /// Number of parameters; calls with any other argument count fail.
    pub num_parameters: usize,
}

/// A compiled function paired with its captured free variables.
#[derive(Debug)]
pub struct Closure {
    pub function: Arc<CompiledFunction>,
    /// Captured values, in the declaration order of the function's free
    /// symbols. `GetFree i` reads `free[i]`.
    pub free: Vec<Value>,
}

/// An evaluator function value: parameters, body, and the environment the
/// literal was evaluated in.
#[derive(Debug)]
pub struct Function {
    pub parameters: Vec<String>,
    pub body: BlockStatement,
    pub env: Env,
}

/// A runtime value.
#[derive(Clone, Debug, Default)]
pub enum Value {
    Integer(i64),
    Boolean(bool),
    #[default]
    Null,
    String(Arc<str>),
    Array(Arc<[Value]>),
    Hash(Arc<HashMap<HashKey, Value>>),
    /// Evaluator closure (tree-walking back end only).
    Function(Arc<Function>),
    /// Compiled function body; only ever observed inside the constant pool
    /// and inside closures.
    CompiledFunction(Arc<CompiledFunction>),
    Closure(Arc<Closure>),
    /// Index into the host builtin table.
    Builtin(usize),
    /// Wrapper the evaluator uses to unwind `return` through blocks.
    ReturnValue(Box<Value>),
    /// An in-language error value. Distinct from VM/compiler errors: it
    /// flows through the stack like any other value.
    Error(Arc<str>),
}

/// A hashable key: only integers, booleans and strings may key a hash.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum HashKey {
    Integer(i64),
    Boolean(bool),
    String(Arc<str>),
}

impl HashKey {
    /// Convert a value to a hash key. Returns `None` for unhashable kinds.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Integer(n) => Some(HashKey::Integer(*n)),
            Value::Boolean(b) => Some(HashKey::Boolean(*b)),
            Value::String(s) => Some(HashKey::String(Arc::clone(s))),
            _ => None,
        }
    }
}

impl fmt::Display for HashKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HashKey::Integer(n) => write!(f, "{}", n),
            HashKey::Boolean(b) => write!(f, "{}", b),
            HashKey::String(s) => write!(f, "{}", s),
        }
    }
}

impl Value {
    /// Create a string value.
    pub fn string(s: impl Into<Arc<str>>) -> Self {
        Value::String(s.into())
    }

    /// Create an array value.
    pub fn array(items: impl Into<Arc<[Value]>>) -> Self {
        Value::Array(items.into())
    }

    /// Create an in-language error value.
    pub fn error(message: impl Into<Arc<str>>) -> Self {
        Value::Error(message.into())
    }

    /// Type discriminator used for operator dispatch and error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Integer(_) => "integer",
            Value::Boolean(_) => "boolean",
            Value::Null => "null",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Hash(_) => "hash",
            Value::Function(_) => "function",
            Value::CompiledFunction(_) => "compiled function",
            Value::Closure(_) => "closure",
            Value::Builtin(_) => "builtin",
            Value::ReturnValue(_) => "return value",
            Value::Error(_) => "error",
        }
    }

    /// The truthiness rule: `false` and `null` are not truthy, every other
    /// value is (including `0` and `""`).
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Boolean(false) | Value::Null)
    }

    /// Whether this is an in-language error value.
    pub fn is_error(&self) -> bool {
        matches!(self, Value::Error(_))
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Null, Value::Null) => true,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Hash(a), Value::Hash(b)) => a == b,
            (Value::Function(a), Value::Function(b)) => Arc::ptr_eq(a, b),
            (Value::CompiledFunction(a), Value::CompiledFunction(b)) => Arc::ptr_eq(a, b),
            (Value::Closure(a), Value::Closure(b)) => Arc::ptr_eq(a, b),
            (Value::Builtin(a), Value::Builtin(b)) => a == b,
            (Value::ReturnValue(a), Value::ReturnValue(b)) => a == b,
            (Value::Error(a), Value::Error(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    /// The `inspect()` rendering used by the REPL and by `puts`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(n) => write!(f, "{}", n),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Null => write!(f, "null"),
            Value::String(s) => write!(f, "{}", s),
            Value::Array(items) => {
                let items: Vec<String> = items.iter().map(|v| v.to_string()).collect();
                write!(f, "[{}]", items.join(", "))
            }
            Value::Hash(pairs) => {
                // Entries sorted by key rendering so output is deterministic.
                let mut entries: Vec<String> =
                    pairs.iter().map(|(k, v)| format!("{}: {}", k, v)).collect();
                entries.sort();
                write!(f, "{{{}}}", entries.join(", "))
            }
            Value::Function(function) => {
                write!(
                    f,
                    "fn({}) {{\n{}\n}}",
                    function.parameters.join(", "),
                    function.body
                )
            }
            Value::CompiledFunction(function) => {
                write!(f, "CompiledFunction[{:p}]", Arc::as_ptr(function))
            }
            Value::Closure(closure) => write!(f, "Closure[{:p}]", Arc::as_ptr(closure)),
            Value::Builtin(_) => write!(f, "builtin function"),
            Value::ReturnValue(value) => write!(f, "{}", value),
            Value::Error(message) => write!(f, "ERROR: {}", message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_rendering() {
        assert_eq!(Value::Integer(5).to_string(), "5");
        assert_eq!(Value::Boolean(true).to_string(), "true");
        assert_eq!(Value::Null.to_string(), "null");
        assert_eq!(Value::string("hello").to_string(), "hello");
    }

    #[test]
    fn array_rendering() {
        let array = Value::array(vec![
            Value::Integer(1),
            Value::string("two"),
            Value::Boolean(false),
        ]);
        assert_eq!(array.to_string(), "[1, two, false]");
    }

    #[test]
    fn hash_rendering_is_sorted() {
        let mut pairs = HashMap::new();
        pairs.insert(HashKey::Integer(2), Value::Integer(3));
        pairs.insert(HashKey::Integer(1), Value::Integer(2));
        let hash = Value::Hash(Arc::new(pairs));
        assert_eq!(hash.to_string(), "{1: 2, 2: 3}");
    }

    #[test]
    fn error_rendering() {
        assert_eq!(
            Value::error("unusable as hash key: array").to_string(),
            "ERROR: unusable as hash key: array"
        );
    }

    #[test]
    fn truthiness() {
        assert!(Value::Integer(0).is_truthy());
        assert!(Value::string("").is_truthy());
        assert!(Value::Boolean(true).is_truthy());
        assert!(!Value::Boolean(false).is_truthy());
        assert!(!Value::Null.is_truthy());
    }

    #[test]
    fn structural_equality_for_hashable_kinds() {
        assert_eq!(Value::Integer(5), Value::Integer(5));
        assert_ne!(Value::Integer(5), Value::Integer(6));
        assert_eq!(Value::string("a"), Value::string("a"));
        assert_eq!(Value::Boolean(true), Value::Boolean(true));
        assert_eq!(Value::Null, Value::Null);
        // Mixed kinds never compare equal.
        assert_ne!(Value::Integer(1), Value::Boolean(true));
    }

    #[test]
    fn closures_compare_by_identity() {
        let function = Arc::new(CompiledFunction {
            instructions: Arc::from([] as [u8; 0]),
            num_locals: 0,
            num_parameters: 0,
        });
        let a = Value::Closure(Arc::new(Closure {
            function: Arc::clone(&function),
            free: vec![],
        }));
        let b = Value::Closure(Arc::new(Closure {
            function,
            free: vec![],
        }));
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
    }

    #[test]
    fn hash_keys_from_values() {
        assert_eq!(
            HashKey::from_value(&Value::Integer(1)),
            Some(HashKey::Integer(1))
        );
        assert_eq!(
            HashKey::from_value(&Value::string("k")),
            Some(HashKey::String("k".into()))
        );
        assert_eq!(HashKey::from_value(&Value::array(vec![])), None);
        assert_eq!(HashKey::from_value(&Value::Null), None);
    }

    #[test]
    fn type_names() {
        assert_eq!(Value::Integer(1).type_name(), "integer");
        assert_eq!(Value::array(vec![]).type_name(), "array");
        assert_eq!(Value::Builtin(0).type_name(), "builtin");
    }
}
