use super::context::Context;
use super::value::Value;
use crate::radon_frontend::span::Span;

use std::rc::Rc;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ErrorKind {
    #[error("Illegal operation {0}")]
    IllegalOperation(String),
    #[error("Division by zero")]
    DivisionByZero,
    #[error("'{0}' is not defined")]
    NameNotDefined(String),
    #[error("Cannot reassign constant '{0}'")]
    ConstReassign(String),
    #[error("'{0}' is not defined on {1}")]
    AttributeNotDefined(String, String),
    #[error("{0} too many args passed into {1}")]
    TooManyArgs(usize, String),
    #[error("{0} too few args passed into {1}")]
    TooFewArgs(usize, String),
    #[error("'{0}' is not a parameter of {1}")]
    UnknownKeyword(String, String),
    #[error("Multiple values for argument '{0}' passed into {1}")]
    DuplicateArgument(String, String),
    #[error("{0}")]
    IndexOutOfBounds(String),
    #[error("Key {0} not found")]
    KeyNotFound(String),
    #[error("{0} is not callable")]
    NotCallable(String),
    #[error("{0} is not iterable")]
    NotIterable(String),
    #[error("{0}")]
    TypeMismatch(String),
    #[error("{0}")]
    InvalidValue(String),
    #[error("Module {0} could not be found")]
    ModuleNotFound(String),
    #[error("{0}")]
    InvalidSyntax(String),
    #[error("Circular import of '{0}'")]
    CircularImport(String),
    #[error("Failed to load module '{path}': {reason}")]
    ModuleLoad { path: String, reason: String },
    #[error("{0}")]
    AssertionFailed(String),
    #[error("{1}")]
    Raised(String, String),
    #[error("{0}")]
    Io(String),
    #[error("'{0}' used outside of a {1}")]
    StrayControl(&'static str, &'static str),
    #[error("Maximum call depth of {0} exceeded")]
    CallDepth(usize),
}

impl ErrorKind {
    /// The category shown before the message in a diagnostic.
    pub fn name(&self) -> &str {
        match self {
            ErrorKind::IndexOutOfBounds(_) => "Index Error",
            ErrorKind::KeyNotFound(_) => "Key Error",
            ErrorKind::TypeMismatch(_) => "Type Error",
            ErrorKind::ModuleNotFound(_) => "Module Not Found",
            ErrorKind::InvalidSyntax(_) => "Invalid Syntax",
            ErrorKind::CircularImport(_) | ErrorKind::ModuleLoad { .. } => "Module Error",
            ErrorKind::AssertionFailed(_) => "Assertion Error",
            ErrorKind::Raised(name, _) => name,
            ErrorKind::Io(_) => "IO Error",
            _ => "Runtime Error",
        }
    }

    pub fn illegal_binary(op: &str, lhs: &Value, rhs: &Value) -> Self {
        ErrorKind::IllegalOperation(format!(
            "'{}' between {} and {}",
            op,
            lhs.type_name(),
            rhs.type_name()
        ))
    }

    pub fn illegal_unary(op: &str, value: &Value) -> Self {
        ErrorKind::IllegalOperation(format!("'{}' on {}", op, value.type_name()))
    }
}

/// A runtime failure, stamped with where it happened and the call chain
/// that led there.
#[derive(Debug, Clone, Error)]
#[error("{}: {}", kind.name(), kind)]
pub struct RuntimeError {
    pub kind: ErrorKind,
    pub span: Span,
    pub context: Rc<Context>,
    /// The error that was being handled by a `catch` block when this one
    /// was raised.
    pub previous: Option<Box<RuntimeError>>,
}

impl RuntimeError {
    pub fn new(kind: ErrorKind, span: Span, context: Rc<Context>) -> Self {
        RuntimeError {
            kind,
            span,
            context,
            previous: None,
        }
    }

    pub fn chained(mut self, previous: RuntimeError) -> Self {
        self.previous = Some(Box::new(previous));
        self
    }

    pub fn traceback(&self) -> String {
        let mut frames = vec![];
        let mut span = Some(self.span.clone());
        let mut context = Some(self.context.clone());

        while let Some(ctx) = context {
            if let Some(span) = &span {
                frames.push(format!(
                    "  File {}, line {}, in {}\n",
                    span.source.name, span.start_pos.line_no, ctx.display_name
                ));
            }
            span = ctx.entry.clone();
            context = ctx.parent.clone();
        }

        frames.reverse();
        format!("Traceback (most recent call last):\n{}", frames.concat())
    }

    /// Full diagnostic. A chained error renders the original failure first.
    pub fn render(&self) -> String {
        let own = format!(
            "{}{}: {}\n\n{}",
            self.traceback(),
            self.kind.name(),
            self.kind,
            self.span.underline()
        );

        match &self.previous {
            Some(previous) => format!(
                "{}\n\nDuring the handling of the above error, another error occurred:\n\n{}",
                previous.render(),
                own
            ),
            None => own,
        }
    }
}

/// Everything that can interrupt the evaluation of a node. Each variant is
/// consumed by the construct that owns it: calls take `Return`, loops take
/// `Break` and `Continue`, switches take the fall signals, `try` takes
/// `Error`, and only the driver takes `Exit`.
#[derive(Debug)]
pub enum Signal {
    Error(RuntimeError),
    Return(Value),
    Continue,
    Break,
    Fallthrough,
    Fallout,
    Exit(i32),
}

impl From<RuntimeError> for Signal {
    fn from(error: RuntimeError) -> Self {
        Signal::Error(error)
    }
}

impl Signal {
    /// The error for a loop or switch signal that escaped its construct.
    pub fn stray_control(&self) -> Option<ErrorKind> {
        match self {
            Signal::Continue => Some(ErrorKind::StrayControl("continue", "loop")),
            Signal::Break => Some(ErrorKind::StrayControl("break", "loop or switch")),
            Signal::Fallthrough => Some(ErrorKind::StrayControl("fallthrough", "switch")),
            Signal::Fallout => Some(ErrorKind::StrayControl("fallout", "switch")),
            _ => None,
        }
    }
}

pub type Eval<T = Value> = Result<T, Signal>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::radon_frontend::span::{CodePosition, SourceFile};
    use ::more_asserts::*;

    fn span_on(source: &Rc<SourceFile>, line: usize, start: usize, end: usize) -> Span {
        let offset: usize = source.text.split('\n').take(line - 1).map(|l| l.len() + 1).sum();
        Span::new(
            CodePosition::new(offset + start - 1, line, start),
            CodePosition::new(offset + end - 1, line, end),
            source,
        )
    }

    #[test]
    fn test_traceback_frames() {
        let source = SourceFile::new("main.rn", "fun f() -> 1 / 0\nf()");
        let root = Context::root("<program>", None);
        let call_site = span_on(&source, 2, 1, 4);
        let inner = Context::child(&root, "<function f>", call_site);

        let error = RuntimeError::new(ErrorKind::DivisionByZero, span_on(&source, 1, 12, 17), inner);
        let rendered = error.render();

        assert_eq!(
            rendered,
            "Traceback (most recent call last):\n  \
             File main.rn, line 2, in <program>\n  \
             File main.rn, line 1, in <function f>\n\
             Runtime Error: Division by zero\n\n\
             fun f() -> 1 / 0\n           ^^^^^"
        );
    }

    #[test]
    fn test_chained_render_order() {
        let source = SourceFile::new("main.rn", "x");
        let root = Context::root("<program>", None);
        let first = RuntimeError::new(ErrorKind::DivisionByZero, span_on(&source, 1, 1, 2), root.clone());
        let second = RuntimeError::new(
            ErrorKind::NameNotDefined("y".to_owned()),
            span_on(&source, 1, 1, 2),
            root,
        )
        .chained(first);

        let rendered = second.render();
        let first_at = rendered.find("Division by zero").unwrap();
        let second_at = rendered.find("'y' is not defined").unwrap();
        assert_lt!(first_at, second_at);
        assert!(rendered.contains("During the handling of the above error"));
    }

    #[test]
    fn test_names() {
        assert_eq!(ErrorKind::IndexOutOfBounds(String::new()).name(), "Index Error");
        assert_eq!(
            ErrorKind::Raised("ValueError".to_owned(), "bad".to_owned()).name(),
            "ValueError"
        );
        assert_eq!(ErrorKind::TooFewArgs(1, "<function add>".to_owned()).to_string(),
            "1 too few args passed into <function add>");
    }
}
