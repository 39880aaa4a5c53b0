use super::span::Span;
use std::fmt;

#[derive(Debug, PartialEq, Clone)]
pub enum Token {
    // Literals.
    Int(i64),
    Float(f64),
    String(String),
    Identifier(String),
    Keyword(Keyword),

    // Arithmetic.
    Plus,
    Minus,
    Asterisk,
    Slash,
    DoubleSlash,
    Percent,
    Caret,

    // Assignment family.
    Equals,
    PlusEq,
    MinusEq,
    AsteriskEq,
    SlashEq,
    DoubleSlashEq,
    PercentEq,
    CaretEq,
    PlusPlus,
    MinusMinus,

    // Comparison.
    DoubleEq,
    BangEq,
    LeftAngle,
    LeftAngleEq,
    RightAngle,
    RightAngleEq,

    // Delimiters.
    LeftParen,
    RightParen,
    LeftBracket,
    RightBracket,
    LeftBrace,
    RightBrace,
    Comma,
    Dot,
    Colon,
    Arrow,

    Newline,
    EndOfFile,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Keyword {
    Var,
    Const,
    Static,
    And,
    Or,
    Not,
    If,
    Elif,
    Else,
    For,
    To,
    Step,
    In,
    While,
    Fun,
    Return,
    Continue,
    Break,
    Class,
    Try,
    Catch,
    As,
    Raise,
    Assert,
    Del,
    Import,
    From,
    Include,
    Switch,
    Case,
    Default,
    Fallthrough,
    Fallout,
}

#[derive(Debug, PartialEq, Clone)]
pub struct SpannedToken {
    pub token: Token,
    pub span: Span,
}

impl Keyword {
    /// Maps a scanned identifier onto the reserved-word set.
    pub fn lookup(word: &str) -> Option<Keyword> {
        let keyword = match word {
            "var" => Keyword::Var,
            "const" => Keyword::Const,
            "static" => Keyword::Static,
            "and" => Keyword::And,
            "or" => Keyword::Or,
            "not" => Keyword::Not,
            "if" => Keyword::If,
            "elif" => Keyword::Elif,
            "else" => Keyword::Else,
            "for" => Keyword::For,
            "to" => Keyword::To,
            "step" => Keyword::Step,
            "in" => Keyword::In,
            "while" => Keyword::While,
            "fun" => Keyword::Fun,
            "return" => Keyword::Return,
            "continue" => Keyword::Continue,
            "break" => Keyword::Break,
            "class" => Keyword::Class,
            "try" => Keyword::Try,
            "catch" => Keyword::Catch,
            "as" => Keyword::As,
            "raise" => Keyword::Raise,
            "assert" => Keyword::Assert,
            "del" => Keyword::Del,
            "import" => Keyword::Import,
            "from" => Keyword::From,
            "include" => Keyword::Include,
            "switch" => Keyword::Switch,
            "case" => Keyword::Case,
            "default" => Keyword::Default,
            "fallthrough" => Keyword::Fallthrough,
            "fallout" => Keyword::Fallout,
            _ => return None,
        };
        Some(keyword)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Keyword::Var => "var",
            Keyword::Const => "const",
            Keyword::Static => "static",
            Keyword::And => "and",
            Keyword::Or => "or",
            Keyword::Not => "not",
            Keyword::If => "if",
            Keyword::Elif => "elif",
            Keyword::Else => "else",
            Keyword::For => "for",
            Keyword::To => "to",
            Keyword::Step => "step",
            Keyword::In => "in",
            Keyword::While => "while",
            Keyword::Fun => "fun",
            Keyword::Return => "return",
            Keyword::Continue => "continue",
            Keyword::Break => "break",
            Keyword::Class => "class",
            Keyword::Try => "try",
            Keyword::Catch => "catch",
            Keyword::As => "as",
            Keyword::Raise => "raise",
            Keyword::Assert => "assert",
            Keyword::Del => "del",
            Keyword::Import => "import",
            Keyword::From => "from",
            Keyword::Include => "include",
            Keyword::Switch => "switch",
            Keyword::Case => "case",
            Keyword::Default => "default",
            Keyword::Fallthrough => "fallthrough",
            Keyword::Fallout => "fallout",
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let symbol = match self {
            Token::Int(n) => return write!(f, "{}", n),
            Token::Float(n) => return write!(f, "{:?}", n),
            Token::String(s) => return write!(f, "\"{}\"", s),
            Token::Identifier(name) => return write!(f, "{}", name),
            Token::Keyword(kw) => kw.as_str(),
            Token::Plus => "+",
            Token::Minus => "-",
            Token::Asterisk => "*",
            Token::Slash => "/",
            Token::DoubleSlash => "//",
            Token::Percent => "%",
            Token::Caret => "^",
            Token::Equals => "=",
            Token::PlusEq => "+=",
            Token::MinusEq => "-=",
            Token::AsteriskEq => "*=",
            Token::SlashEq => "/=",
            Token::DoubleSlashEq => "//=",
            Token::PercentEq => "%=",
            Token::CaretEq => "^=",
            Token::PlusPlus => "++",
            Token::MinusMinus => "--",
            Token::DoubleEq => "==",
            Token::BangEq => "!=",
            Token::LeftAngle => "<",
            Token::LeftAngleEq => "<=",
            Token::RightAngle => ">",
            Token::RightAngleEq => ">=",
            Token::LeftParen => "(",
            Token::RightParen => ")",
            Token::LeftBracket => "[",
            Token::RightBracket => "]",
            Token::LeftBrace => "{",
            Token::RightBrace => "}",
            Token::Comma => ",",
            Token::Dot => ".",
            Token::Colon => ":",
            Token::Arrow => "->",
            Token::Newline => "newline",
            Token::EndOfFile => "end of file",
        };
        write!(f, "{}", symbol)
    }
}
