use rusty_radon::config::{locate_stdlib, Config};
use rusty_radon::radon_frontend::{parse, tokenize};
use rusty_radon::treewalk_interpreter::{Interpreter, Value};
use rusty_radon::{logging, RunOutcome};

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::{fs, process};

#[derive(Parser, Debug)]
#[command(name = "radon", version, about = "Interpreter for the Radon language")]
struct Args {
    /// Script to run. Starts a REPL when neither a file nor -c is given.
    file: Option<PathBuf>,

    /// Program text to run instead of a file.
    #[arg(short = 'c', long = "command", conflicts_with = "file")]
    code: Option<String>,

    /// Directory holding the standard library modules.
    #[arg(long, value_name = "DIR")]
    stdlib: Option<PathBuf>,

    /// Raise the log level (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Print the token stream before running.
    #[arg(long)]
    show_tokens: bool,

    /// Print the parsed program before running.
    #[arg(long)]
    show_ast: bool,

    /// Arguments for the program, returned by sys_args().
    #[arg(last = true)]
    args: Vec<String>,
}

fn main() {
    let args = Args::parse();
    logging::init(args.verbose);

    match run_cli(&args) {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("radon: {:#}", e);
            process::exit(1);
        }
    }
}

fn run_cli(args: &Args) -> Result<i32> {
    let config = Config::new(locate_stdlib(args.stdlib.clone())).with_args(args.args.clone());

    match (&args.file, &args.code) {
        (Some(path), _) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            run_source(args, config, &path.display().to_string(), &text, Some(script_dir(path)))
        }
        (None, Some(code)) => run_source(args, config, "<command>", code, None),
        (None, None) => repl(args, config),
    }
}

fn script_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

fn run_source(
    args: &Args,
    config: Config,
    source_name: &str,
    text: &str,
    import_dir: Option<PathBuf>,
) -> Result<i32> {
    if !show_frontend(args, source_name, text) {
        return Ok(1);
    }
    let outcome = rusty_radon::run(source_name, text, None, import_dir, config);
    Ok(report(&outcome))
}

fn report(outcome: &RunOutcome) -> i32 {
    if let Some(error) = &outcome.error {
        eprintln!("{}", error.render_diagnostic());
    }
    outcome.exit_code
}

/// Prints tokens and the AST when asked. Returns false if the text doesn't
/// tokenize or parse, after printing the diagnostic.
fn show_frontend(args: &Args, source_name: &str, text: &str) -> bool {
    if !args.show_tokens && !args.show_ast {
        return true;
    }

    let tokens = match tokenize(source_name, text) {
        Ok(tokens) => tokens,
        Err(e) => {
            eprintln!("{}", e.render());
            return false;
        }
    };
    if args.show_tokens {
        let names: Vec<_> = tokens.iter().map(|t| format!("{:?}", t.token)).collect();
        println!("{}", names.join(" "));
    }
    if args.show_ast {
        match parse(tokens) {
            Ok(ast) => println!("{}", ast.ast_string()),
            Err(e) => {
                eprintln!("{}", e.render());
                return false;
            }
        }
    }
    true
}

fn repl(args: &Args, config: Config) -> Result<i32> {
    let mut interpreter = Interpreter::new(config);
    let stdin = io::stdin();
    let mut line = String::new();

    loop {
        print!("radon > ");
        io::stdout().flush()?;

        line.clear();
        if stdin.lock().read_line(&mut line)? == 0 {
            println!();
            return Ok(0);
        }
        let text = line.trim();
        if text.is_empty() {
            continue;
        }
        if !show_frontend(args, "<stdin>", text) {
            continue;
        }

        let outcome = interpreter.run("<stdin>", text);
        if outcome.should_exit {
            return Ok(outcome.exit_code);
        }
        match (&outcome.error, &outcome.value) {
            (Some(error), _) => eprintln!("{}", error.render_diagnostic()),
            (None, Some(Value::Null)) | (None, None) => {}
            (None, Some(value)) => println!("{}", value.repr()),
        }
    }
}
