use std::process::ExitCode;

use warren::{LineSource, Repl, Runtime};

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();
    match args.len() {
        1 => interactive(),
        2 => run_file(&args[1]),
        _ => {
            eprintln!("usage: warren [script]");
            ExitCode::FAILURE
        }
    }
}

/// Runs a script file to completion.
fn run_file(path: &str) -> ExitCode {
    let mut rt = Runtime::new();
    match rt.load_path(path) {
        Ok(result) => {
            rt.release_value(result);
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}

/// Reads expressions interactively, printing each result.
fn interactive() -> ExitCode {
    let mut rt = Runtime::new();
    let mut repl = Repl::new(Box::new(LineSource::new("> ")));
    loop {
        match repl.step(&mut rt) {
            Ok(Some(rendered)) => {
                if !rendered.is_empty() {
                    println!("{rendered}");
                }
            }
            Ok(None) => {
                println!();
                return ExitCode::SUCCESS;
            }
            Err(err) => {
                // Every error is fatal to the program being run; in the
                // interactive loop that means this session's input.
                eprintln!("{err}");
                return ExitCode::FAILURE;
            }
        }
    }
}
