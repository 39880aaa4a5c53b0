use super::cursor::Cursor;
use super::errors::{LexerError, LexerErrorType, LexerResult};
use super::span::{SourceFile, Span};
use super::token::{Keyword, SpannedToken, Token};

use std::rc::Rc;

pub struct Lexer<'src> {
    source: Rc<SourceFile>,
    cursor: Cursor<'src>,
}

/// Tokenizes a whole source, failing on the first lexical error.
pub fn tokenize(source_name: &str, text: &str) -> LexerResult<Vec<SpannedToken>> {
    let source = SourceFile::new(source_name, text);
    tokenize_source(&source)
}

pub fn tokenize_source(source: &Rc<SourceFile>) -> LexerResult<Vec<SpannedToken>> {
    Lexer::new(source, &source.text).tokenize()
}

impl<'src> Lexer<'src> {
    pub fn new(source: &Rc<SourceFile>, text: &'src str) -> Self {
        Lexer {
            source: source.clone(),
            cursor: Cursor::new(text),
        }
    }

    pub fn tokenize(mut self) -> LexerResult<Vec<SpannedToken>> {
        let mut tokens = vec![];

        loop {
            let token = self.next_token()?;
            let at_end = token.token == Token::EndOfFile;
            tokens.push(token);
            if at_end {
                return Ok(tokens);
            }
        }
    }

    /// Returns the next token, skipping whitespace and comments.
    pub fn next_token(&mut self) -> LexerResult<SpannedToken> {
        loop {
            self.cursor.take_while(|ch| ch == ' ' || ch == '\t' || ch == '\r');

            let start_pos = self.cursor.position();
            let token = self.lex_token()?;
            let end_pos = self.cursor.position();

            if let Some(token) = token {
                return Ok(SpannedToken {
                    token,
                    span: Span::new(start_pos, end_pos, &self.source),
                });
            }
        }
    }

    fn error_here(&self, error: LexerErrorType) -> LexerError {
        let pos = self.cursor.position();
        LexerError {
            span: Span::new(pos, pos, &self.source),
            error,
        }
    }

    fn lex_token(&mut self) -> LexerResult<Option<Token>> {
        let start_pos = self.cursor.position();
        let ch = match self.cursor.take() {
            Some(ch) => ch,
            None => return Ok(Some(Token::EndOfFile)),
        };

        let token = match ch {
            '\n' | ';' => Token::Newline,
            '#' => {
                self.skip_comment();
                return Ok(None);
            }
            '\\' => {
                self.cursor.take_while(|ch| ch == ' ' || ch == '\t' || ch == '\r');
                if !self.cursor.take_if('\n') {
                    return Err(self.error_here(LexerErrorType::ExpectedCharacter(
                        "Expected newline after line continuation".to_owned(),
                    )));
                }
                return Ok(None);
            }

            '(' => Token::LeftParen,
            ')' => Token::RightParen,
            '[' => Token::LeftBracket,
            ']' => Token::RightBracket,
            '{' => Token::LeftBrace,
            '}' => Token::RightBrace,
            ',' => Token::Comma,
            '.' => Token::Dot,
            ':' => Token::Colon,

            '+' => {
                if self.cursor.take_if('+') {
                    Token::PlusPlus
                } else {
                    self.look_for_eq_sign(Token::Plus, Token::PlusEq)
                }
            }
            '-' => {
                if self.cursor.take_if('-') {
                    Token::MinusMinus
                } else if self.cursor.take_if('>') {
                    Token::Arrow
                } else {
                    self.look_for_eq_sign(Token::Minus, Token::MinusEq)
                }
            }
            '/' => {
                if self.cursor.take_if('/') {
                    self.look_for_eq_sign(Token::DoubleSlash, Token::DoubleSlashEq)
                } else {
                    self.look_for_eq_sign(Token::Slash, Token::SlashEq)
                }
            }
            '*' => self.look_for_eq_sign(Token::Asterisk, Token::AsteriskEq),
            '%' => self.look_for_eq_sign(Token::Percent, Token::PercentEq),
            '^' => self.look_for_eq_sign(Token::Caret, Token::CaretEq),
            '=' => self.look_for_eq_sign(Token::Equals, Token::DoubleEq),
            '<' => self.look_for_eq_sign(Token::LeftAngle, Token::LeftAngleEq),
            '>' => self.look_for_eq_sign(Token::RightAngle, Token::RightAngleEq),
            '!' => {
                if self.cursor.take_if('=') {
                    Token::BangEq
                } else {
                    return Err(self.error_here(LexerErrorType::ExpectedCharacter(
                        "'=' (after '!')".to_owned(),
                    )));
                }
            }

            '"' => self.lex_string()?,
            _ if ch.is_ascii_digit() => self.lex_number(start_pos.byte_pos),
            _ if is_identifier_start(ch) => self.lex_identifier_or_kw(start_pos.byte_pos),

            _ => {
                return Err(LexerError {
                    span: Span::new(start_pos, self.cursor.position(), &self.source),
                    error: LexerErrorType::IllegalCharacter(ch),
                })
            }
        };

        Ok(Some(token))
    }

    /// Skips a `#` comment. `#!` opens a block comment closed by `!#`.
    /// The newline ending a line comment is left for the next token.
    fn skip_comment(&mut self) {
        if self.cursor.take_if('!') {
            while let Some(ch) = self.cursor.take() {
                if ch == '!' && self.cursor.take_if('#') {
                    return;
                }
            }
        } else {
            self.cursor.take_while(|ch| ch != '\n');
        }
    }

    /// Checks if next char is '='. If so, consume it and return t2.
    /// Otherwise, return t1.
    fn look_for_eq_sign(&mut self, t1: Token, t2: Token) -> Token {
        if self.cursor.take_if('=') {
            t2
        } else {
            t1
        }
    }

    /// Scans up to the closing quote, then decodes escapes.
    fn lex_string(&mut self) -> LexerResult<Token> {
        let mut raw = String::new();
        let mut escaped = false;

        loop {
            let ch = match self.cursor.take() {
                Some(ch) => ch,
                None => {
                    return Err(self.error_here(LexerErrorType::ExpectedCharacter(
                        "'\"' to close string".to_owned(),
                    )))
                }
            };

            if escaped {
                raw.push('\\');
                raw.push(ch);
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                break;
            } else {
                raw.push(ch);
            }
        }

        Ok(Token::String(decode_escapes(&raw)))
    }

    /// Digits with at most one '.'; a second '.' ends the literal.
    fn lex_number(&mut self, start_idx: usize) -> Token {
        self.cursor.take_while(|ch| ch.is_ascii_digit());

        let mut is_float = false;
        if self.cursor.peek() == Some('.') {
            is_float = true;
            self.cursor.take();
            self.cursor.take_while(|ch| ch.is_ascii_digit());
        }

        let scanned = self.cursor.slice_from(start_idx);
        if is_float {
            let text = scanned.trim_end_matches('.');
            Token::Float(text.parse().unwrap_or(0.0))
        } else {
            match scanned.parse() {
                Ok(value) => Token::Int(value),
                Err(_) => Token::Float(scanned.parse().unwrap_or(f64::INFINITY)),
            }
        }
    }

    /// Scan up to end of lexeme and return it as identifier. Checks for keywords.
    fn lex_identifier_or_kw(&mut self, start_idx: usize) -> Token {
        self.cursor.take_while(is_identifier_char);

        let word = self.cursor.slice_from(start_idx);
        match Keyword::lookup(word) {
            Some(keyword) => Token::Keyword(keyword),
            None => Token::Identifier(word.to_owned()),
        }
    }
}

fn decode_escapes(raw: &str) -> String {
    let mut decoded = String::with_capacity(raw.len());
    let mut chars = raw.chars();

    while let Some(ch) = chars.next() {
        if ch != '\\' {
            decoded.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => decoded.push('\n'),
            Some('t') => decoded.push('\t'),
            Some('r') => decoded.push('\r'),
            Some('0') => decoded.push('\0'),
            Some('\\') => decoded.push('\\'),
            Some('"') => decoded.push('"'),
            Some(other) => {
                decoded.push('\\');
                decoded.push(other);
            }
            None => decoded.push('\\'),
        }
    }

    decoded
}

fn is_identifier_start(ch: char) -> bool {
    ch.is_alphabetic() || ch == '_'
}

fn is_identifier_char(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '_'
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<Token> {
        tokenize("<test>", source)
            .unwrap()
            .into_iter()
            .map(|t| t.token)
            .collect()
    }

    #[test]
    fn test_operators() {
        assert_eq!(
            kinds("+= ++ -> // //= == != <= >= -- ^"),
            vec![
                Token::PlusEq,
                Token::PlusPlus,
                Token::Arrow,
                Token::DoubleSlash,
                Token::DoubleSlashEq,
                Token::DoubleEq,
                Token::BangEq,
                Token::LeftAngleEq,
                Token::RightAngleEq,
                Token::MinusMinus,
                Token::Caret,
                Token::EndOfFile,
            ]
        );
    }

    #[test]
    fn test_keywords_and_identifiers() {
        assert_eq!(
            kinds("var total = fun_1"),
            vec![
                Token::Keyword(Keyword::Var),
                Token::Identifier("total".to_owned()),
                Token::Equals,
                Token::Identifier("fun_1".to_owned()),
                Token::EndOfFile,
            ]
        );
    }

    #[test]
    fn test_numbers() {
        assert_eq!(
            kinds("12 3.5 1.2.3"),
            vec![
                Token::Int(12),
                Token::Float(3.5),
                Token::Float(1.2),
                Token::Dot,
                Token::Int(3),
                Token::EndOfFile,
            ]
        );
    }

    #[test]
    fn test_string_escapes() {
        assert_eq!(
            kinds(r#""a\tb\n\"q\"""#),
            vec![Token::String("a\tb\n\"q\"".to_owned()), Token::EndOfFile]
        );
    }

    #[test]
    fn test_newlines_comments_and_continuations() {
        assert_eq!(
            kinds("1; 2 # trailing\n#! block\n comment !# 3 \\\n + 4"),
            vec![
                Token::Int(1),
                Token::Newline,
                Token::Int(2),
                Token::Newline,
                Token::Int(3),
                Token::Plus,
                Token::Int(4),
                Token::EndOfFile,
            ]
        );
    }

    #[test]
    fn test_continuation_requires_newline() {
        let err = tokenize("<test>", "1 \\ 2").unwrap_err();
        assert_eq!(err.name(), "Expected Character");
    }

    #[test]
    fn test_illegal_character_aborts() {
        let err = tokenize("<test>", "var x = 1 @ 2").unwrap_err();
        assert_eq!(err.error, LexerErrorType::IllegalCharacter('@'));
        assert_eq!(err.span.start_pos.column_no, 11);
    }

    #[test]
    fn test_lone_bang() {
        let err = tokenize("<test>", "!x").unwrap_err();
        assert_eq!(err.name(), "Expected Character");
    }

    #[test]
    fn test_spans() {
        let tokens = tokenize("<test>", "ab\n  cd").unwrap();
        let cd = &tokens[2];
        assert_eq!(cd.token, Token::Identifier("cd".to_owned()));
        assert_eq!(cd.span.start_pos.line_no, 2);
        assert_eq!(cd.span.start_pos.column_no, 3);
        assert_eq!(cd.span.extract_string(), Some("cd"));
    }
}
