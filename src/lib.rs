pub mod config;
pub mod logging;
pub mod radon_frontend;
pub mod treewalk_interpreter;

use config::Config;
use radon_frontend::errors::{LexerError, ParserError};
use treewalk_interpreter::{Context, Interpreter, RuntimeError, Value};

use std::path::PathBuf;
use std::rc::Rc;
use thiserror::Error;

/// Any failure that stops a program: while tokenizing, while parsing, or
/// while running.
#[derive(Debug, Error)]
pub enum RadonError {
    #[error(transparent)]
    Lexer(#[from] LexerError),
    #[error(transparent)]
    Parser(#[from] ParserError),
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

impl RadonError {
    pub fn name(&self) -> &str {
        match self {
            RadonError::Lexer(e) => e.name(),
            RadonError::Parser(e) => e.name(),
            RadonError::Runtime(e) => e.kind.name(),
        }
    }

    /// `Name: details`, the line a diagnostic leads with.
    pub fn headline(&self) -> String {
        match self {
            RadonError::Lexer(e) => format!("{}: {}", e.name(), e),
            RadonError::Parser(e) => format!("{}: {}", e.name(), e),
            RadonError::Runtime(e) => e.to_string(),
        }
    }

    pub fn render_diagnostic(&self) -> String {
        match self {
            RadonError::Lexer(e) => e.render(),
            RadonError::Parser(e) => e.render(),
            RadonError::Runtime(e) => e.render(),
        }
    }
}

#[derive(Debug)]
pub struct RunOutcome {
    pub value: Option<Value>,
    pub error: Option<RadonError>,
    pub should_exit: bool,
    pub exit_code: i32,
}

impl RunOutcome {
    pub(crate) fn finished(value: Value) -> Self {
        RunOutcome {
            value: Some(value),
            error: None,
            should_exit: false,
            exit_code: 0,
        }
    }

    pub(crate) fn exited(code: i32) -> Self {
        RunOutcome {
            value: None,
            error: None,
            should_exit: true,
            exit_code: code,
        }
    }

    pub(crate) fn failed(error: RadonError) -> Self {
        RunOutcome {
            value: None,
            error: Some(error),
            should_exit: false,
            exit_code: 1,
        }
    }
}

/// Runs a whole program in a fresh interpreter. `parent` hangs the program's
/// traceback frames below a caller's, and relative imports resolve against
/// `import_dir`.
pub fn run(
    source_name: &str,
    text: &str,
    parent: Option<Rc<Context>>,
    import_dir: Option<PathBuf>,
    config: Config,
) -> RunOutcome {
    let mut interpreter = Interpreter::new(config);
    interpreter.context = Context::nested(parent, "<program>", import_dir);
    interpreter.run(source_name, text)
}
