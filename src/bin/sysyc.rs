//! The compiler driver.
//!
//! Command-line dispatch and file I/O only. Parsing, IR lowering and
//! RV32 codegen all live in the library.

use std::process::ExitCode;

use clap::{Parser, ValueEnum};

use sysy::back;
use sysy::front;
use sysy::front::Env;
use sysy::middle;
use sysy::CompileError;

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum Mode {
    #[value(name = "-koopa")]
    Koopa,
    #[value(name = "-riscv")]
    Riscv,
}

#[derive(Debug, Parser)]
#[command(name = "sysyc", version, about = "SysY -> Koopa IR -> RV32 compiler", long_about = None)]
struct Args {
    #[arg(value_enum)]
    mode: Mode,
    input: String,
    #[arg(short = 'o')]
    output: String,
}

fn compile(mode: Mode, source: &str) -> Result<String, CompileError> {
    let ast = front::parse(source)?;
    let mut env = Env::new();
    let ir = front::lower(&ast, &mut env)?;
    match mode {
        Mode::Koopa => Ok(ir),
        Mode::Riscv => {
            let raw = middle::parse(&ir)?;
            back::lower_program(&raw)
        }
    }
}

fn main() -> ExitCode {
    let args = Args::parse();

    let source = match std::fs::read_to_string(&args.input) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("sysyc: cannot read {}: {e}", args.input);
            return ExitCode::FAILURE;
        }
    };

    let output = match compile(args.mode, &source) {
        Ok(text) => text,
        Err(e) => {
            eprintln!("sysyc: {e}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = std::fs::write(&args.output, output) {
        eprintln!("sysyc: cannot write {}: {e}", args.output);
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}
