//! The `quill` command: run a script, or stop after any front-end stage.

use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgGroup, Parser};

use quill_compiler::{compile, CompileError};
use quill_syntax::{lex, offset_to_line_col, parse, print_program, validate, SourceError};
use quill_types::check;
use quill_vm::{RuntimeError, VM};

#[derive(Parser)]
#[command(name = "quill", version, about = "Run Quill programs")]
#[command(group(ArgGroup::new("mode").args(["lex", "parse", "print", "check", "ir"])))]
struct Args {
    /// Stop after lexing and list the tokens
    #[arg(long)]
    lex: bool,

    /// Stop after a syntax-only parse
    #[arg(long)]
    parse: bool,

    /// Parse, then pretty-print the program
    #[arg(long)]
    print: bool,

    /// Stop after semantic checking
    #[arg(long)]
    check: bool,

    /// Compile and list the bytecode instead of running
    #[arg(long)]
    ir: bool,

    /// Script to run; reads standard input when omitted
    script: Option<PathBuf>,
}

enum Failure {
    Source(SourceError),
    Runtime(RuntimeError),
    Internal(CompileError),
    Io(io::Error),
}

impl From<SourceError> for Failure {
    fn from(err: SourceError) -> Self {
        Failure::Source(err)
    }
}

impl From<RuntimeError> for Failure {
    fn from(err: RuntimeError) -> Self {
        Failure::Runtime(err)
    }
}

impl From<CompileError> for Failure {
    fn from(err: CompileError) -> Self {
        Failure::Internal(err)
    }
}

impl From<io::Error> for Failure {
    fn from(err: io::Error) -> Self {
        Failure::Io(err)
    }
}

fn main() -> ExitCode {
    let args = Args::parse();

    let (filename, source) = match load_source(&args.script) {
        Ok(loaded) => loaded,
        Err(err) => {
            eprintln!("error: {}", err);
            return ExitCode::FAILURE;
        }
    };

    match run(&args, &source) {
        Ok(()) => ExitCode::SUCCESS,
        Err(Failure::Source(err)) => {
            err.eprint(&filename, &source);
            ExitCode::FAILURE
        }
        Err(Failure::Runtime(err)) => {
            eprintln!("runtime error: {}", err);
            ExitCode::FAILURE
        }
        Err(Failure::Internal(err)) => {
            eprintln!("internal error: {}", err);
            ExitCode::FAILURE
        }
        Err(Failure::Io(err)) => {
            eprintln!("error: {}", err);
            ExitCode::FAILURE
        }
    }
}

fn load_source(script: &Option<PathBuf>) -> io::Result<(String, String)> {
    match script {
        Some(path) => Ok((path.display().to_string(), fs::read_to_string(path)?)),
        None => {
            let mut source = String::new();
            io::stdin().read_to_string(&mut source)?;
            Ok(("<stdin>".to_string(), source))
        }
    }
}

fn run(args: &Args, source: &str) -> Result<(), Failure> {
    let tokens = lex(source)?;

    if args.lex {
        for (token, span) in &tokens {
            let (line, col) = offset_to_line_col(source, span.start);
            println!("{}:{}: {}", line, col, token);
        }
        return Ok(());
    }

    if args.parse {
        validate(&tokens)?;
        return Ok(());
    }

    let mut program = parse(&tokens)?;

    if args.print {
        print!("{}", print_program(&program));
        return Ok(());
    }

    check(&mut program).map_err(|err| err.to_source_error())?;

    if args.check {
        return Ok(());
    }

    let compiled = compile(&program)?;

    if args.ir {
        print!("{}", compiled.disassemble());
        return Ok(());
    }

    let mut vm = VM::new(compiled.into_templates());
    vm.run()?;
    Ok(())
}
