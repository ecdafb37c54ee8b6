//! Opal: a small expression-oriented dynamic language.
//!
//! The crate implements the full pipeline plus two back ends:
//!
//! ```text
//! source → tokens → AST ─┬→ bytecode → VM      (compiler back end)
//!          (lexer) (parser)│   (compiler)
//!                          └→ evaluator        (tree-walking back end)
//! ```
//!
//! # Architecture
//!
//! - `token`, `lexer`, `parser`, `ast`: the front end
//! - `object`: the runtime value model shared by both back ends
//! - `code`: the bytecode instruction set and its binary encoding
//! - `compiler`: AST → bytecode, with lexically scoped symbol tables and
//!   closure conversion
//! - `vm`: the stack machine that executes compiled bytecode
//! - `eval`: the tree-walking evaluator, kept as the behavioral reference
//!
//! # Example
//!
//! ```
//! use opal::{Value, eval};
//!
//! let result = eval("let double = fn(x) { x * 2 }; double(21)").unwrap();
//! assert_eq!(result, Value::Integer(42));
//! ```

pub mod ast;
pub mod code;
pub mod compiler;
pub mod eval;
pub mod lexer;
pub mod object;
pub mod parser;
pub mod token;
pub mod vm;

use std::fmt;

pub use compiler::{Bytecode, CompileError, Compiler};
pub use object::Value;
pub use parser::ParseError;
pub use vm::{Vm, VmError};

/// Any error from the parse → compile → run pipeline.
#[derive(Clone, Debug)]
pub enum EvalError {
    Parse(Vec<ParseError>),
    Compile(CompileError),
    Runtime(VmError),
}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvalError::Parse(errors) => {
                write!(f, "parse error")?;
                for error in errors {
                    write!(f, "\n\t{}", error)?;
                }
                Ok(())
            }
            EvalError::Compile(error) => write!(f, "compile error: {}", error),
            EvalError::Runtime(error) => write!(f, "runtime error: {}", error),
        }
    }
}

impl std::error::Error for EvalError {}

/// Compile `source` to bytecode without running it.
pub fn compile(source: &str) -> Result<Bytecode, EvalError> {
    let program = parser::parse(source).map_err(EvalError::Parse)?;
    let mut compiler = Compiler::new();
    compiler.compile(&program).map_err(EvalError::Compile)?;
    Ok(compiler.bytecode())
}

/// Compile and run `source` on the VM; returns the final expression value.
pub fn eval(source: &str) -> Result<Value, EvalError> {
    let bytecode = compile(source)?;
    let mut vm = Vm::new(bytecode);
    vm.run().map_err(EvalError::Runtime)?;
    Ok(vm.last_popped().clone())
}

/// Run `source` through the tree-walking evaluator instead of the VM.
pub fn interpret(source: &str) -> Result<Value, EvalError> {
    let program = parser::parse(source).map_err(EvalError::Parse)?;
    let env = object::environment::Environment::new();
    Ok(eval::eval_program(&program, &env))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eval_integers() {
        assert_eq!(eval("1 + 2").unwrap(), Value::Integer(3));
    }

    #[test]
    fn eval_strings() {
        assert_eq!(eval(r#""a" + "b""#).unwrap(), Value::string("ab"));
    }

    #[test]
    fn eval_reports_parse_errors() {
        let err = eval("let = 1").unwrap_err();
        assert!(matches!(err, EvalError::Parse(_)), "got {:?}", err);
        assert!(err.to_string().starts_with("parse error"));
    }

    #[test]
    fn eval_reports_compile_errors() {
        let err = eval("missing").unwrap_err();
        assert_eq!(
            err.to_string(),
            "compile error: undefined variable missing"
        );
    }

    #[test]
    fn eval_reports_runtime_errors() {
        let err = eval("1 + true").unwrap_err();
        assert_eq!(
            err.to_string(),
            "runtime error: unsupported types for binary operation: integer boolean"
        );
    }

    #[test]
    fn interpret_matches_eval_on_a_simple_program() {
        let source = "let add = fn(a, b) { a + b }; add(2, 3)";
        assert_eq!(
            eval(source).unwrap().to_string(),
            interpret(source).unwrap().to_string()
        );
    }

    #[test]
    fn compile_exposes_bytecode() {
        let bytecode = compile("1 + 2").unwrap();
        assert!(!bytecode.instructions.is_empty());
        assert_eq!(bytecode.constants.len(), 2);
    }
}
