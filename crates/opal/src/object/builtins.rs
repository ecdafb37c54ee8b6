//! Host builtin functions.
//!
//! Builtins are addressed by index: the compiler pre-populates its symbol
//! table with one entry per table slot, and both back ends dispatch through
//! the same table. A builtin signals misuse by returning an in-language
//! `Value::Error` — never a VM error — so user code can observe it.

use crate::object::Value;

/// Signature of a host builtin.
pub type BuiltinFn = fn(&[Value]) -> Value;

/// A named builtin slot.
pub struct BuiltinDef {
    pub name: &'static str,
    pub func: BuiltinFn,
}

/// The builtin table. Indexed by the `GetBuiltin` operand; order is part of
/// the compiled-code contract.
pub const BUILTINS: &[BuiltinDef] = &[
    BuiltinDef {
        name: "len",
        func: builtin_len,
    },
    BuiltinDef {
        name: "puts",
        func: builtin_puts,
    },
    BuiltinDef {
        name: "first",
        func: builtin_first,
    },
    BuiltinDef {
        name: "last",
        func: builtin_last,
    },
    BuiltinDef {
        name: "rest",
        func: builtin_rest,
    },
    BuiltinDef {
        name: "push",
        func: builtin_push,
    },
];

/// Look up a builtin's table index by name.
pub fn lookup(name: &str) -> Option<usize> {
    BUILTINS.iter().position(|b| b.name == name)
}

fn wrong_arg_count(got: usize, want: usize) -> Value {
    Value::error(format!(
        "wrong number of arguments. got={}, want={}",
        got, want
    ))
}

fn builtin_len(args: &[Value]) -> Value {
    let [arg] = args else {
        return wrong_arg_count(args.len(), 1);
    };
    match arg {
        Value::String(s) => Value::Integer(s.len() as i64),
        Value::Array(items) => Value::Integer(items.len() as i64),
        other => Value::error(format!(
            "argument to `len` not supported, got {}",
            other.type_name()
        )),
    }
}

fn builtin_puts(args: &[Value]) -> Value {
    for arg in args {
        println!("{}", arg);
    }
    Value::Null
}

fn builtin_first(args: &[Value]) -> Value {
    let [arg] = args else {
        return wrong_arg_count(args.len(), 1);
    };
    match arg {
        Value::Array(items) => items.first().cloned().unwrap_or(Value::Null),
        other => Value::error(format!(
            "argument to `first` must be array, got {}",
            other.type_name()
        )),
    }
}

fn builtin_last(args: &[Value]) -> Value {
    let [arg] = args else {
        return wrong_arg_count(args.len(), 1);
    };
    match arg {
        Value::Array(items) => items.last().cloned().unwrap_or(Value::Null),
        other => Value::error(format!(
            "argument to `last` must be array, got {}",
            other.type_name()
        )),
    }
}

fn builtin_rest(args: &[Value]) -> Value {
    let [arg] = args else {
        return wrong_arg_count(args.len(), 1);
    };
    match arg {
        Value::Array(items) if !items.is_empty() => Value::array(items[1..].to_vec()),
        Value::Array(_) => Value::Null,
        other => Value::error(format!(
            "argument to `rest` must be array, got {}",
            other.type_name()
        )),
    }
}

fn builtin_push(args: &[Value]) -> Value {
    let [array, value] = args else {
        return wrong_arg_count(args.len(), 2);
    };
    match array {
        Value::Array(items) => {
            let mut items = items.to_vec();
            items.push(value.clone());
            Value::array(items)
        }
        other => Value::error(format!(
            "argument to `push` must be array, got {}",
            other.type_name()
        )),
    }
}

/// Invoke a builtin by table index. A `None` return means the index is out
/// of range (never produced by the compiler).
pub fn invoke(index: usize, args: &[Value]) -> Option<Value> {
    BUILTINS.get(index).map(|b| (b.func)(args))
}
