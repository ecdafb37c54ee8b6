//! Opal REPL - interactive read-eval-print loop.
//!
//! Each submitted line is parsed, compiled against a symbol table and
//! constant pool that persist across submissions, and executed against a
//! persistent globals array, so definitions from earlier lines stay
//! visible. The last popped value of each line is printed.

use rustyline::history::MemHistory;
use rustyline::{Config, Editor};

use opal::compiler::Compiler;
use opal::parser::parse;
use opal::vm::{GLOBALS_SIZE, Vm};
use opal::{CompileError, Value};

const PROMPT: &str = ">> ";

fn main() -> rustyline::Result<()> {
    let mut readline = Editor::<(), _>::with_history(Config::default(), MemHistory::new())?;

    let (mut symbol_table, mut constants) = Compiler::new().into_state();
    let mut globals = vec![Value::Null; GLOBALS_SIZE];

    while let Ok(line) = readline.readline(PROMPT) {
        readline.add_history_entry(line.as_str())?;

        let program = match parse(&line) {
            Ok(program) => program,
            Err(errors) => {
                eprintln!("parse errors:");
                for error in errors {
                    eprintln!("\t{error}");
                }
                continue;
            }
        };

        let mut compiler = Compiler::with_state(symbol_table, constants);
        let compiled: Result<(), CompileError> = compiler.compile(&program);
        let bytecode = compiler.bytecode();
        (symbol_table, constants) = compiler.into_state();

        if let Err(error) = compiled {
            eprintln!("compile error: {error}");
            continue;
        }

        let mut vm = Vm::with_globals(bytecode, globals);
        let outcome = vm.run();
        let value = vm.last_popped().clone();
        globals = vm.into_globals();

        match outcome {
            Ok(()) => println!("{value}"),
            Err(error) => eprintln!("runtime error: {error}"),
        }
    }

    Ok(())
}
