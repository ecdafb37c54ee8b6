//! Tree-walking evaluator.
//!
//! The original back end: walks the AST directly against an environment
//! chain instead of compiling. It is kept alongside the VM as the reference
//! for behavioral equivalence — both back ends must render the same result
//! for the same program.
//!
//! Failures are in-language `Error` values. Evaluating any sub-expression
//! to an error aborts the enclosing form and propagates the error outward;
//! `return` propagates the same way via the `ReturnValue` wrapper, which is
//! unwrapped at function-call and program boundaries.

use std::rc::Rc;
use std::sync::Arc;

use crate::ast::{BlockStatement, Expression, Program, Statement};
use crate::object::environment::{Env, Environment};
use crate::object::{Function, HashKey, Value, builtins};

/// Evaluate a whole program in the given environment.
pub fn eval_program(program: &Program, env: &Env) -> Value {
    let mut result = Value::Null;
    for statement in &program.statements {
        result = eval_statement(statement, env);
        match result {
            Value::ReturnValue(value) => return *value,
            Value::Error(_) => return result,
            _ => {}
        }
    }
    result
}

fn eval_statement(statement: &Statement, env: &Env) -> Value {
    match statement {
        Statement::Expression { expression } => eval_expression(expression, env),
        Statement::Return { value } => {
            let value = eval_expression(value, env);
            if value.is_error() {
                return value;
            }
            Value::ReturnValue(Box::new(value))
        }
        Statement::Let { name, value } => {
            let value = eval_expression(value, env);
            if value.is_error() {
                return value;
            }
            env.borrow_mut().set(name.clone(), value);
            Value::Null
        }
    }
}

fn eval_block(block: &BlockStatement, env: &Env) -> Value {
    let mut result = Value::Null;
    for statement in &block.statements {
        result = eval_statement(statement, env);
        // Return wrappers and errors bubble through nested blocks unopened.
        if matches!(result, Value::ReturnValue(_) | Value::Error(_)) {
            return result;
        }
    }
    result
}

fn eval_expression(expression: &Expression, env: &Env) -> Value {
    match expression {
        Expression::IntegerLiteral(value) => Value::Integer(*value),
        Expression::StringLiteral(value) => Value::string(value.as_str()),
        Expression::Boolean(value) => Value::Boolean(*value),
        Expression::Identifier(name) => eval_identifier(name, env),
        Expression::Prefix { operator, right } => {
            let right = eval_expression(right, env);
            if right.is_error() {
                return right;
            }
            eval_prefix(operator, right)
        }
        Expression::Infix {
            operator,
            left,
            right,
        } => {
            let left = eval_expression(left, env);
            if left.is_error() {
                return left;
            }
            let right = eval_expression(right, env);
            if right.is_error() {
                return right;
            }
            eval_infix(operator, left, right)
        }
        Expression::If {
            condition,
            consequence,
            alternative,
        } => {
            let condition = eval_expression(condition, env);
            if condition.is_error() {
                return condition;
            }
            if condition.is_truthy() {
                eval_block(consequence, env)
            } else if let Some(alternative) = alternative {
                eval_block(alternative, env)
            } else {
                Value::Null
            }
        }
        Expression::FunctionLiteral {
            parameters, body, ..
        } => Value::Function(Arc::new(Function {
            parameters: parameters.clone(),
            body: body.clone(),
            env: Rc::clone(env),
        })),
        Expression::Call {
            function,
            arguments,
        } => {
            let function = eval_expression(function, env);
            if function.is_error() {
                return function;
            }
            let mut args = Vec::with_capacity(arguments.len());
            for argument in arguments {
                let arg = eval_expression(argument, env);
                if arg.is_error() {
                    return arg;
                }
                args.push(arg);
            }
            apply_function(function, args)
        }
        Expression::ArrayLiteral(elements) => {
            let mut items = Vec::with_capacity(elements.len());
            for element in elements {
                let item = eval_expression(element, env);
                if item.is_error() {
                    return item;
                }
                items.push(item);
            }
            Value::array(items)
        }
        Expression::HashLiteral(pairs) => eval_hash_literal(pairs, env),
        Expression::Index { left, index } => {
            let left = eval_expression(left, env);
            if left.is_error() {
                return left;
            }
            let index = eval_expression(index, env);
            if index.is_error() {
                return index;
            }
            eval_index(left, index)
        }
    }
}

fn eval_identifier(name: &str, env: &Env) -> Value {
    if let Some(value) = env.borrow().get(name) {
        return value;
    }
    if let Some(index) = builtins::lookup(name) {
        return Value::Builtin(index);
    }
    Value::error(format!("identifier not found: {}", name))
}

fn eval_prefix(operator: &str, right: Value) -> Value {
    match operator {
        "!" => Value::Boolean(!right.is_truthy()),
        "-" => match right {
            Value::Integer(n) => Value::Integer(n.wrapping_neg()),
            other => Value::error(format!("unknown operator: -{}", other.type_name())),
        },
        other => Value::error(format!("unknown operator: {}{}", other, right.type_name())),
    }
}

fn eval_infix(operator: &str, left: Value, right: Value) -> Value {
    match (&left, &right) {
        (Value::Integer(l), Value::Integer(r)) => eval_integer_infix(operator, *l, *r),
        (Value::String(l), Value::String(r)) if operator == "+" => {
            Value::string(format!("{}{}", l, r))
        }
        _ if operator == "==" => Value::Boolean(left == right),
        _ if operator == "!=" => Value::Boolean(left != right),
        _ if left.type_name() != right.type_name() => Value::error(format!(
            "type mismatch: {} {} {}",
            left.type_name(),
            operator,
            right.type_name()
        )),
        _ => Value::error(format!(
            "unknown operator: {} {} {}",
            left.type_name(),
            operator,
            right.type_name()
        )),
    }
}

fn eval_integer_infix(operator: &str, left: i64, right: i64) -> Value {
    match operator {
        "+" => Value::Integer(left.wrapping_add(right)),
        "-" => Value::Integer(left.wrapping_sub(right)),
        "*" => Value::Integer(left.wrapping_mul(right)),
        "/" => {
            if right == 0 {
                Value::error("division by zero")
            } else {
                Value::Integer(left.wrapping_div(right))
            }
        }
        "<" => Value::Boolean(left < right),
        ">" => Value::Boolean(left > right),
        "==" => Value::Boolean(left == right),
        "!=" => Value::Boolean(left != right),
        other => Value::error(format!("unknown operator: integer {} integer", other)),
    }
}

fn apply_function(function: Value, args: Vec<Value>) -> Value {
    match function {
        Value::Function(function) => {
            if args.len() != function.parameters.len() {
                return Value::error(format!(
                    "wrong number of arguments: want={}, got={}",
                    function.parameters.len(),
                    args.len()
                ));
            }
            let env = Environment::enclosed(Rc::clone(&function.env));
            for (parameter, arg) in function.parameters.iter().zip(args) {
                env.borrow_mut().set(parameter.clone(), arg);
            }
            match eval_block(&function.body, &env) {
                Value::ReturnValue(value) => *value,
                other => other,
            }
        }
        Value::Builtin(index) => match builtins::invoke(index, &args) {
            Some(result) => result,
            None => Value::error(format!("unknown builtin: {}", index)),
        },
        other => Value::error(format!("not a function: {}", other.type_name())),
    }
}

fn eval_hash_literal(pairs: &[(Expression, Expression)], env: &Env) -> Value {
    let mut hash = std::collections::HashMap::with_capacity(pairs.len());
    for (key_expr, value_expr) in pairs {
        let key = eval_expression(key_expr, env);
        if key.is_error() {
            return key;
        }
        let Some(key) = HashKey::from_value(&key) else {
            return Value::error(format!("unusable as hash key: {}", key.type_name()));
        };
        let value = eval_expression(value_expr, env);
        if value.is_error() {
            return value;
        }
        hash.insert(key, value);
    }
    Value::Hash(Arc::new(hash))
}

fn eval_index(left: Value, index: Value) -> Value {
    match (&left, &index) {
        (Value::Array(items), Value::Integer(i)) => usize::try_from(*i)
            .ok()
            .and_then(|i| items.get(i).cloned())
            .unwrap_or(Value::Null),
        (Value::Hash(pairs), _) => match HashKey::from_value(&index) {
            Some(key) => pairs.get(&key).cloned().unwrap_or(Value::Null),
            None => Value::error(format!("unusable as hash key: {}", index.type_name())),
        },
        _ => Value::error(format!(
            "index operator not supported: {}",
            left.type_name()
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    fn eval(input: &str) -> Value {
        let program = parse(input).expect("input should parse");
        eval_program(&program, &Environment::new())
    }

    fn int(n: i64) -> Value {
        Value::Integer(n)
    }

    #[test]
    fn integer_expressions() {
        let cases = [
            ("5", 5),
            ("-5", -5),
            ("5 + 5 + 5 + 5 - 10", 10),
            ("2 * 2 * 2 * 2 * 2", 32),
            ("(5 + 10 * 2 + 15 / 3) * 2 + -10", 50),
        ];
        for (input, expected) in cases {
            assert_eq!(eval(input), int(expected), "input {:?}", input);
        }
    }

    #[test]
    fn boolean_expressions() {
        let cases = [
            ("true", true),
            ("1 < 2", true),
            ("1 > 2", false),
            ("1 == 1", true),
            ("true != false", true),
            ("(1 < 2) == true", true),
            ("!true", false),
            ("!!5", true),
        ];
        for (input, expected) in cases {
            assert_eq!(eval(input), Value::Boolean(expected), "input {:?}", input);
        }
    }

    #[test]
    fn conditionals() {
        assert_eq!(eval("if (true) { 10 }"), int(10));
        assert_eq!(eval("if (false) { 10 }"), Value::Null);
        assert_eq!(eval("if (1 > 2) { 10 } else { 20 }"), int(20));
    }

    #[test]
    fn return_statements() {
        let cases = [
            ("return 10;", 10),
            ("return 10; 9;", 10),
            ("return 2 * 5; 9;", 10),
            ("9; return 2 * 5; 9;", 10),
            // The wrapper must pass through nested blocks unopened.
            ("if (10 > 1) { if (10 > 1) { return 10; } return 1; }", 10),
        ];
        for (input, expected) in cases {
            assert_eq!(eval(input), int(expected), "input {:?}", input);
        }
    }

    #[test]
    fn error_values() {
        let cases = [
            ("5 + true;", "type mismatch: integer + boolean"),
            ("5 + true; 5;", "type mismatch: integer + boolean"),
            ("-true", "unknown operator: -boolean"),
            ("true + false;", "unknown operator: boolean + boolean"),
            ("5; true + false; 5", "unknown operator: boolean + boolean"),
            ("foobar", "identifier not found: foobar"),
            (r#""a" - "b""#, "unknown operator: string - string"),
            ("{[1]: 2}", "unusable as hash key: array"),
            ("1 / 0", "division by zero"),
            ("5[1]", "index operator not supported: integer"),
            ("1(1)", "not a function: integer"),
        ];
        for (input, expected) in cases {
            assert_eq!(eval(input), Value::error(expected), "input {:?}", input);
        }
    }

    #[test]
    fn let_statements() {
        let cases = [
            ("let a = 5; a;", 5),
            ("let a = 5 * 5; a;", 25),
            ("let a = 5; let b = a; b;", 5),
            ("let a = 5; let b = a; let c = a + b + 5; c;", 15),
        ];
        for (input, expected) in cases {
            assert_eq!(eval(input), int(expected), "input {:?}", input);
        }
    }

    #[test]
    fn functions_and_calls() {
        let cases = [
            ("let identity = fn(x) { x; }; identity(5);", 5),
            ("let identity = fn(x) { return x; }; identity(5);", 5),
            ("let double = fn(x) { x * 2; }; double(5);", 10),
            ("let add = fn(x, y) { x + y; }; add(5, 5);", 10),
            ("let add = fn(x, y) { x + y; }; add(5 + 5, add(5, 5));", 20),
            ("fn(x) { x; }(5)", 5),
        ];
        for (input, expected) in cases {
            assert_eq!(eval(input), int(expected), "input {:?}", input);
        }
    }

    #[test]
    fn closures_capture_their_environment() {
        let input = "
            let new_adder = fn(x) { fn(y) { x + y }; };
            let add_two = new_adder(2);
            add_two(3);";
        assert_eq!(eval(input), int(5));
    }

    #[test]
    fn recursive_functions() {
        let input = "
            let count_down = fn(x) { if (x == 0) { 0 } else { count_down(x - 1) } };
            count_down(10);";
        assert_eq!(eval(input), int(0));
    }

    #[test]
    fn string_operations() {
        assert_eq!(eval(r#""hello" + " " + "world""#), Value::string("hello world"));
        assert_eq!(eval(r#""a" == "a""#), Value::Boolean(true));
    }

    #[test]
    fn arrays_and_hashes() {
        assert_eq!(
            eval("[1, 2 * 2, 3 + 3]"),
            Value::array(vec![int(1), int(4), int(6)])
        );
        assert_eq!(eval("[1, 2, 3][1]"), int(2));
        assert_eq!(eval("[1, 2, 3][99]"), Value::Null);
        assert_eq!(eval("{1: 2, 2: 3}[2]"), int(3));
        assert_eq!(eval(r#"{"one": 1}["two"]"#), Value::Null);
    }

    #[test]
    fn builtins_are_shared_with_the_vm() {
        assert_eq!(eval(r#"len("four")"#), int(4));
        assert_eq!(eval("first([7, 8])"), int(7));
        assert_eq!(
            eval("len(1)"),
            Value::error("argument to `len` not supported, got integer")
        );
    }

    #[test]
    fn function_values_render_their_source() {
        let result = eval("fn(x) { x + 2; };");
        assert_eq!(result.to_string(), "fn(x) {\n(x + 2)\n}");
    }
}
