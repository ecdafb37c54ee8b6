//! Opal command-line interpreter.
//!
//! Usage:
//!   opal <file>        Evaluate a file
//!   opal -e <code>     Evaluate a string
//!   opal -d <file>     Disassemble instead of evaluating
//!   opal               Read from stdin

use std::{
    env, fs,
    io::{self, Read},
    process::ExitCode,
};

use opal::code::disassemble;

const USAGE: &str = "\
Usage: opal [OPTIONS] [FILE]

Arguments:
  [FILE]  Opal source file to evaluate

Options:
  -e <CODE>     Evaluate CODE string
  -d, --disasm  Print the compiled bytecode instead of running it
  -h, --help    Print this help message

If no arguments are given, reads from stdin.";

fn read_stdin() -> Result<String, io::Error> {
    let mut buf = String::new();
    io::stdin().read_to_string(&mut buf)?;
    Ok(buf)
}

enum Action {
    Eval(String),
    Disasm(String),
    Help,
}

fn parse_args() -> Result<Action, String> {
    let args: Vec<String> = env::args().skip(1).collect();

    let read_file =
        |file: &String| fs::read_to_string(file).map_err(|e| format!("error reading {file}: {e}"));

    match args.as_slice() {
        [] => Ok(Action::Eval(
            read_stdin().map_err(|e| format!("error reading stdin: {e}"))?,
        )),
        [arg] if arg == "-" => Ok(Action::Eval(
            read_stdin().map_err(|e| format!("error reading stdin: {e}"))?,
        )),
        [arg] if arg == "-h" || arg == "--help" => Ok(Action::Help),
        [flag, code] if flag == "-e" => Ok(Action::Eval(code.clone())),
        [flag] if flag == "-d" || flag == "--disasm" => Ok(Action::Disasm(
            read_stdin().map_err(|e| format!("error reading stdin: {e}"))?,
        )),
        [flag, file] if flag == "-d" || flag == "--disasm" => Ok(Action::Disasm(read_file(file)?)),
        [file] => Ok(Action::Eval(read_file(file)?)),
        _ => Err(USAGE.into()),
    }
}

fn main() -> ExitCode {
    match parse_args() {
        Ok(Action::Help) => {
            println!("{USAGE}");
            ExitCode::SUCCESS
        }
        Ok(Action::Eval(source)) => match opal::eval(&source) {
            Ok(value) => {
                println!("{value}");
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("{e}");
                ExitCode::FAILURE
            }
        },
        Ok(Action::Disasm(source)) => match opal::compile(&source) {
            Ok(bytecode) => {
                print!("{}", disassemble(&bytecode.instructions));
                for (i, constant) in bytecode.constants.iter().enumerate() {
                    println!("CONSTANT {i}: {constant}");
                }
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("{e}");
                ExitCode::FAILURE
            }
        },
        Err(e) => {
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}
