use super::span::Span;
use super::token::Token;
use thiserror::Error;

#[derive(Debug, PartialEq, Clone, Error)]
pub enum LexerErrorType {
    #[error("'{0}'")]
    IllegalCharacter(char),
    #[error("{0}")]
    ExpectedCharacter(String),
}

#[derive(Debug, PartialEq, Clone, Error)]
#[error("{error}")]
pub struct LexerError {
    pub span: Span,
    pub error: LexerErrorType,
}

pub type LexerResult<T> = Result<T, LexerError>;

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Item {
    Block,
    Arguments,
    Parameters,
    Array,
    HashMap,
    Subscript,
    Expression,
}

#[derive(Debug, PartialEq, Clone, Error)]
pub enum ParserErrorType {
    #[error("Expected '{0}' to close {1}, got '{2}'")]
    ExpectedClosing(&'static str, Item, Token),
    #[error("Expected '{0}' after {1}, got '{2}'")]
    ExpectedAfter(&'static str, Item, Token),
    #[error("Expected '{0}', got '{1}'")]
    ExpectedToken(&'static str, Token),
    #[error("Expected an expression, got '{0}'")]
    ExpectedExpr(Token),
    #[error("Expected identifier, got '{0}'")]
    ExpectedIdentifier(Token),
    #[error("Expected a module name or \".rn\" path, got '{0}'")]
    ExpectedModule(Token),
    #[error("Expected '=' or 'in' after the loop variable, got '{0}'")]
    ExpectedForForm(Token),
    #[error("Expected '{{' or a statement, got '{0}'")]
    ExpectedBody(Token),
    #[error("Parameter '{0}' must have a default value, as an earlier parameter has one")]
    MissingDefault(String),
    #[error("Invalid assignment target")]
    InvalidAssignTarget,
    #[error("Expected 'case', 'default' or '}}' in switch, got '{0}'")]
    ExpectedCase(Token),
    #[error("Unexpected trailing '{0}' after statements")]
    TrailingTokens(Token),
}

#[derive(Debug, PartialEq, Clone, Error)]
#[error("{error}")]
pub struct ParserError {
    pub span: Span,
    pub error: ParserErrorType,
}

pub type ParserResult<T> = Result<T, ParserError>;

impl std::fmt::Display for Item {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let name = match self {
            Item::Block => "block",
            Item::Arguments => "argument list",
            Item::Parameters => "parameter list",
            Item::Array => "array",
            Item::HashMap => "hashmap",
            Item::Subscript => "subscript",
            Item::Expression => "expression",
        };
        write!(f, "{}", name)
    }
}

impl LexerError {
    pub fn name(&self) -> &'static str {
        match self.error {
            LexerErrorType::IllegalCharacter(_) => "Illegal Character",
            LexerErrorType::ExpectedCharacter(_) => "Expected Character",
        }
    }

    pub fn render(&self) -> String {
        render_static(self.name(), &self.error.to_string(), &self.span)
    }
}

impl ParserError {
    pub fn name(&self) -> &'static str {
        "Invalid Syntax"
    }

    pub fn render(&self) -> String {
        render_static(self.name(), &self.error.to_string(), &self.span)
    }
}

/// Diagnostics for failures that happen before any code runs: no traceback.
fn render_static(name: &str, details: &str, span: &Span) -> String {
    format!(
        "{}: {}\nFile {}, line {}\n\n{}",
        name,
        details,
        span.source.name,
        span.start_pos.line_no,
        span.underline()
    )
}
