use super::errors::{Item, ParserError, ParserErrorType, ParserResult};
use super::grammar::{
    AssignTarget, Body, Expr, ExprType, Fixity, FuncInfo, IfCase, Literal, ModuleName, Param,
    Qualifier, SliceInfo, SwitchCase,
};
use super::operator::{BinaryOperator, LogicalOperator, StepOperator, UnaryOperator};
use super::span::{SourceFile, Span};
use super::token::{Keyword, SpannedToken, Token};

use std::rc::Rc;

pub struct Parser {
    tokens: Vec<SpannedToken>,
    index: usize,
}

/// Parses a token stream (as produced by the lexer, ending in EOF) into a
/// statements node.
pub fn parse(tokens: Vec<SpannedToken>) -> ParserResult<Expr> {
    Parser::new(tokens).parse()
}

impl Parser {
    pub fn new(mut tokens: Vec<SpannedToken>) -> Self {
        let needs_eof = tokens
            .last()
            .map_or(true, |t| t.token != Token::EndOfFile);
        if needs_eof {
            let span = match tokens.last() {
                Some(last) => last.span.clone(),
                None => Span::empty(&SourceFile::new("<empty>", "")),
            };
            tokens.push(SpannedToken {
                token: Token::EndOfFile,
                span,
            });
        }

        Parser { tokens, index: 0 }
    }

    pub fn parse(mut self) -> ParserResult<Expr> {
        let program = self.parse_statements()?;

        if !self.check(&Token::EndOfFile) {
            return Err(self.error(ParserErrorType::TrailingTokens(self.token().clone())));
        }

        Ok(program)
    }

    fn current(&self) -> &SpannedToken {
        &self.tokens[self.index]
    }

    fn token(&self) -> &Token {
        &self.current().token
    }

    fn peek_token(&self, distance: usize) -> &Token {
        let idx = std::cmp::min(self.index + distance, self.tokens.len() - 1);
        &self.tokens[idx].token
    }

    fn previous_token(&self) -> &Token {
        &self.tokens[self.index.saturating_sub(1)].token
    }

    fn current_span(&self) -> Span {
        self.current().span.clone()
    }

    fn previous_span(&self) -> Span {
        self.tokens[self.index.saturating_sub(1)].span.clone()
    }

    /// Span from `start` up to the last consumed token.
    fn span_from(&self, start: &Span) -> Span {
        start.extend(&self.previous_span())
    }

    /// Advances the stream. The EOF token is never stepped past.
    fn bump(&mut self) {
        if self.index < self.tokens.len() - 1 {
            self.index += 1;
        }
    }

    fn check(&self, t: &Token) -> bool {
        self.token() == t
    }

    fn check_keyword(&self, keyword: Keyword) -> bool {
        *self.token() == Token::Keyword(keyword)
    }

    fn check_consume(&mut self, t: &Token) -> bool {
        if self.check(t) {
            self.bump();
            return true;
        }
        false
    }

    fn check_consume_keyword(&mut self, keyword: Keyword) -> bool {
        self.check_consume(&Token::Keyword(keyword))
    }

    fn error(&self, error: ParserErrorType) -> ParserError {
        ParserError {
            span: self.current_span(),
            error,
        }
    }

    fn consume(&mut self, expected: Token, symbol: &'static str) -> ParserResult<()> {
        if self.check_consume(&expected) {
            Ok(())
        } else {
            Err(self.error(ParserErrorType::ExpectedToken(symbol, self.token().clone())))
        }
    }

    fn consume_closing(&mut self, expected: Token, symbol: &'static str, item: Item) -> ParserResult<()> {
        self.skip_newlines();
        if self.check_consume(&expected) {
            Ok(())
        } else {
            Err(self.error(ParserErrorType::ExpectedClosing(
                symbol,
                item,
                self.token().clone(),
            )))
        }
    }

    fn skip_newlines(&mut self) -> usize {
        let mut skipped = 0;
        while self.check_consume(&Token::Newline) {
            skipped += 1;
        }
        skipped
    }

    /// Skips newlines only if the first token after them is `keyword`.
    fn skip_newlines_before(&mut self, keyword: Keyword) -> bool {
        let mut idx = self.index;
        while self.tokens[idx].token == Token::Newline {
            idx += 1;
        }
        if self.tokens[idx].token == Token::Keyword(keyword) {
            self.index = idx;
            true
        } else {
            false
        }
    }

    fn at_statements_end(&self) -> bool {
        matches!(self.token(), Token::EndOfFile | Token::RightBrace)
    }

    fn parse_identifier(&mut self) -> ParserResult<String> {
        match self.token().clone() {
            Token::Identifier(name) => {
                self.bump();
                Ok(name)
            }
            other => Err(self.error(ParserErrorType::ExpectedIdentifier(other))),
        }
    }

    /// A newline-separated run of statements.
    fn parse_statements(&mut self) -> ParserResult<Expr> {
        let start = self.current_span();
        let mut stmts = vec![];

        self.skip_newlines();
        if self.at_statements_end() {
            return Ok(Expr::new(ExprType::Statements(stmts), start));
        }

        stmts.push(self.parse_statement()?);
        loop {
            // A statement ending in a block may be followed directly by the next.
            let after_block = self.previous_token() == &Token::RightBrace;
            let newlines = self.skip_newlines();
            if (newlines == 0 && !after_block) || self.at_statements_end() {
                break;
            }
            stmts.push(self.parse_statement()?);
        }

        Ok(Expr::new(ExprType::Statements(stmts), self.span_from(&start)))
    }

    fn parse_statement(&mut self) -> ParserResult<Expr> {
        let start = self.current_span();

        let expr = match self.token() {
            Token::Keyword(Keyword::Return) => {
                self.bump();
                ExprType::Return(self.parse_optional_return_value())
            }
            Token::Keyword(Keyword::Continue) => {
                self.bump();
                ExprType::Continue
            }
            Token::Keyword(Keyword::Break) => {
                self.bump();
                ExprType::Break
            }
            Token::Keyword(Keyword::Fallthrough) => {
                self.bump();
                ExprType::Fallthrough
            }
            Token::Keyword(Keyword::Fallout) => {
                self.bump();
                ExprType::Fallout
            }
            Token::Keyword(Keyword::Try) => self.parse_try()?,
            Token::Keyword(Keyword::Raise) => self.parse_raise()?,
            Token::Keyword(Keyword::Assert) => {
                self.bump();
                let condition = Box::new(self.parse_expression()?);
                let message = if self.check_consume(&Token::Comma) {
                    Some(Box::new(self.parse_expression()?))
                } else {
                    None
                };
                ExprType::Assert(condition, message)
            }
            Token::Keyword(Keyword::Del) => {
                self.bump();
                ExprType::Del(self.parse_identifier()?)
            }
            Token::Keyword(Keyword::Import) => {
                self.bump();
                let module = self.parse_module_name()?;
                let alias = if self.check_consume_keyword(Keyword::As) {
                    Some(self.parse_identifier()?)
                } else {
                    None
                };
                ExprType::Import(module, alias)
            }
            Token::Keyword(Keyword::From) => {
                self.bump();
                let module = self.parse_module_name()?;
                self.consume(Token::Keyword(Keyword::Import), "import")?;
                let mut names = vec![self.parse_identifier()?];
                while self.check_consume(&Token::Comma) {
                    names.push(self.parse_identifier()?);
                }
                ExprType::FromImport(module, names)
            }
            Token::Keyword(Keyword::Switch) => self.parse_switch()?,
            _ => return self.parse_expression(),
        };

        Ok(Expr::new(expr, self.span_from(&start)))
    }

    /// The value of `return` is optional: try the expression grammar and
    /// rewind to a bare return if it does not apply.
    fn parse_optional_return_value(&mut self) -> Option<Box<Expr>> {
        if matches!(
            self.token(),
            Token::Newline | Token::EndOfFile | Token::RightBrace
        ) {
            return None;
        }

        let checkpoint = self.index;
        match self.parse_expression() {
            Ok(expr) => Some(Box::new(expr)),
            Err(_) => {
                self.index = checkpoint;
                None
            }
        }
    }

    fn parse_module_name(&mut self) -> ParserResult<ModuleName> {
        let module = match self.token().clone() {
            Token::Identifier(name) => ModuleName::Named(name),
            Token::String(path) => ModuleName::Path(path),
            other => return Err(self.error(ParserErrorType::ExpectedModule(other))),
        };
        self.bump();
        Ok(module)
    }

    fn parse_try(&mut self) -> ParserResult<ExprType> {
        self.bump();
        let body = Box::new(self.parse_block()?);

        let (catch_var, handler) = if self.skip_newlines_before(Keyword::Catch) {
            self.bump();
            let catch_var = if self.check_consume_keyword(Keyword::As) {
                Some(self.parse_identifier()?)
            } else {
                None
            };
            (catch_var, Some(Box::new(self.parse_block()?)))
        } else {
            (None, None)
        };

        Ok(ExprType::Try {
            body,
            catch_var,
            handler,
        })
    }

    fn parse_raise(&mut self) -> ParserResult<ExprType> {
        self.bump();
        let error_type = self.parse_identifier()?;
        let message = if self.check_consume(&Token::LeftParen) {
            if self.check_consume(&Token::RightParen) {
                None
            } else {
                let message = self.parse_expression()?;
                self.consume_closing(Token::RightParen, ")", Item::Arguments)?;
                Some(Box::new(message))
            }
        } else {
            None
        };
        Ok(ExprType::Raise(error_type, message))
    }

    fn parse_switch(&mut self) -> ParserResult<ExprType> {
        self.bump();
        let subject = Box::new(self.parse_expression()?);
        self.consume(Token::LeftBrace, "{")?;
        self.skip_newlines();

        let mut cases = vec![];
        let mut default = None;
        loop {
            match self.token() {
                Token::Keyword(Keyword::Case) => {
                    self.bump();
                    let value = self.parse_expression()?;
                    let body = self.parse_block()?;
                    cases.push(SwitchCase { value, body });
                }
                Token::Keyword(Keyword::Default) => {
                    self.bump();
                    default = Some(Box::new(self.parse_block()?));
                }
                Token::RightBrace => {
                    self.bump();
                    break;
                }
                other => return Err(self.error(ParserErrorType::ExpectedCase(other.clone()))),
            }
            self.skip_newlines();
        }

        Ok(ExprType::Switch {
            subject,
            cases,
            default,
        })
    }

    pub fn parse_expression(&mut self) -> ParserResult<Expr> {
        let start = self.current_span();

        let expr = match self.token() {
            Token::Keyword(Keyword::Var) => {
                self.bump();
                let target = self.parse_assign_target()?;
                self.consume(Token::Equals, "=")?;
                let value = self.parse_expression()?;
                ExprType::Assign(target, Qualifier::Local, Box::new(value))
            }
            Token::Keyword(Keyword::Const) => {
                self.bump();
                self.check_consume_keyword(Keyword::Var);
                let name = self.parse_identifier()?;
                self.consume(Token::Equals, "=")?;
                let value = self.parse_expression()?;
                ExprType::Assign(AssignTarget::Variable(name), Qualifier::Const, Box::new(value))
            }
            Token::Keyword(Keyword::Static) => {
                self.bump();
                if self.check_keyword(Keyword::Fun) {
                    return self.parse_func_def(Qualifier::Static);
                }
                self.consume(Token::Keyword(Keyword::Var), "var")?;
                let target = self.parse_assign_target()?;
                self.consume(Token::Equals, "=")?;
                let value = self.parse_expression()?;
                ExprType::Assign(target, Qualifier::Static, Box::new(value))
            }
            Token::Keyword(Keyword::Include) => {
                self.bump();
                ExprType::Include(self.parse_module_name()?)
            }
            _ => {
                let expr = self.parse_logic()?;

                if self.check(&Token::Equals) {
                    self.bump();
                    let target = into_assign_target(expr)?;
                    let value = self.parse_expression()?;
                    ExprType::Assign(target, Qualifier::Static, Box::new(value))
                } else if let Some(op) = BinaryOperator::compound_from_token(self.token()) {
                    self.bump();
                    let target = into_assign_target(expr)?;
                    let value = self.parse_expression()?;
                    ExprType::CompoundAssign(target, op, Box::new(value))
                } else {
                    return Ok(expr);
                }
            }
        };

        Ok(Expr::new(expr, self.span_from(&start)))
    }

    fn parse_assign_target(&mut self) -> ParserResult<AssignTarget> {
        let expr = self.parse_call()?;
        into_assign_target(expr)
    }

    fn parse_logic(&mut self) -> ParserResult<Expr> {
        let mut lhs = self.parse_comparison()?;

        while let Some(op) = LogicalOperator::from_token(self.token()) {
            self.bump();
            let rhs = self.parse_comparison()?;
            let span = lhs.span.extend(&rhs.span);
            lhs = Expr::new(ExprType::Logical(op, Box::new(lhs), Box::new(rhs)), span);
        }

        Ok(lhs)
    }

    fn parse_comparison(&mut self) -> ParserResult<Expr> {
        if self.check_keyword(Keyword::Not) {
            let start = self.current_span();
            self.bump();
            let operand = self.parse_comparison()?;
            let span = start.extend(&operand.span);
            return Ok(Expr::new(
                ExprType::Unary(UnaryOperator::LogicalNot, Box::new(operand)),
                span,
            ));
        }

        self.parse_binary_chain(BinaryOperator::comparison_from_token, Self::parse_arith)
    }

    fn parse_arith(&mut self) -> ParserResult<Expr> {
        self.parse_binary_chain(BinaryOperator::additive_from_token, Self::parse_term)
    }

    fn parse_term(&mut self) -> ParserResult<Expr> {
        self.parse_binary_chain(BinaryOperator::multiplicative_from_token, Self::parse_factor)
    }

    /// Left-associative chain of one precedence level.
    fn parse_binary_chain<O, F>(&mut self, operator: O, operand: F) -> ParserResult<Expr>
    where
        O: Fn(&Token) -> Option<BinaryOperator>,
        F: Fn(&mut Parser) -> ParserResult<Expr>,
    {
        let mut lhs = operand(self)?;

        while let Some(op) = operator(self.token()) {
            self.bump();
            let rhs = operand(self)?;
            let span = lhs.span.extend(&rhs.span);
            lhs = Expr::new(ExprType::Binary(op, Box::new(lhs), Box::new(rhs)), span);
        }

        Ok(lhs)
    }

    fn parse_factor(&mut self) -> ParserResult<Expr> {
        let start = self.current_span();

        let unary = match self.token() {
            Token::Minus => Some(UnaryOperator::Negate),
            Token::Plus => Some(UnaryOperator::Plus),
            _ => None,
        };
        if let Some(op) = unary {
            self.bump();
            let operand = self.parse_factor()?;
            let span = start.extend(&operand.span);
            return Ok(Expr::new(ExprType::Unary(op, Box::new(operand)), span));
        }

        if let Some(op) = StepOperator::from_token(self.token()) {
            self.bump();
            let target = self.parse_assign_target()?;
            return Ok(Expr::new(
                ExprType::Step(target, op, Fixity::Prefix),
                self.span_from(&start),
            ));
        }

        self.parse_power()
    }

    /// `^` binds tighter than unary minus on its left and is right-associative.
    fn parse_power(&mut self) -> ParserResult<Expr> {
        let base = self.parse_call()?;

        if self.check_consume(&Token::Caret) {
            let exponent = self.parse_factor()?;
            let span = base.span.extend(&exponent.span);
            return Ok(Expr::new(
                ExprType::Binary(BinaryOperator::Power, Box::new(base), Box::new(exponent)),
                span,
            ));
        }

        Ok(base)
    }

    fn parse_call(&mut self) -> ParserResult<Expr> {
        let mut expr = self.parse_atom()?;

        loop {
            let start = expr.span.clone();
            let next = match self.token() {
                Token::Dot => {
                    self.bump();
                    let name = self.parse_identifier()?;
                    ExprType::Attribute(Box::new(expr), name)
                }
                Token::LeftParen => {
                    self.bump();
                    let (args, kwargs) = self.parse_call_args()?;
                    ExprType::Call(Box::new(expr), args, kwargs)
                }
                Token::LeftBracket => {
                    self.bump();
                    self.parse_subscript(expr)?
                }
                _ => match StepOperator::from_token(self.token()) {
                    Some(op) => {
                        self.bump();
                        ExprType::Step(into_assign_target(expr)?, op, Fixity::Postfix)
                    }
                    None => break,
                },
            };
            expr = Expr::new(next, self.span_from(&start));
        }

        Ok(expr)
    }

    fn parse_call_args(&mut self) -> ParserResult<(Vec<Expr>, Vec<(String, Expr)>)> {
        let mut args = vec![];
        let mut kwargs = vec![];

        self.skip_newlines();
        if self.check_consume(&Token::RightParen) {
            return Ok((args, kwargs));
        }

        loop {
            self.skip_newlines();
            let keyword = match (self.token(), self.peek_token(1)) {
                (Token::Identifier(name), Token::Equals) => Some(name.clone()),
                _ => None,
            };
            match keyword {
                Some(name) => {
                    self.bump();
                    self.bump();
                    kwargs.push((name, self.parse_expression()?));
                }
                None => args.push(self.parse_expression()?),
            }

            self.skip_newlines();
            if !self.check_consume(&Token::Comma) {
                break;
            }
        }

        self.consume_closing(Token::RightParen, ")", Item::Arguments)?;
        Ok((args, kwargs))
    }

    /// `[index]` or a slice with up to three parts: `[start:end:step]`.
    fn parse_subscript(&mut self, target: Expr) -> ParserResult<ExprType> {
        let start = if self.check(&Token::Colon) {
            None
        } else {
            Some(Box::new(self.parse_expression()?))
        };

        if let Some(index) = &start {
            if self.check_consume(&Token::RightBracket) {
                return Ok(ExprType::Index(Box::new(target), index.clone()));
            }
        }

        self.consume(Token::Colon, ":")?;
        let end = if self.check(&Token::Colon) || self.check(&Token::RightBracket) {
            None
        } else {
            Some(Box::new(self.parse_expression()?))
        };
        let step = if self.check_consume(&Token::Colon) && !self.check(&Token::RightBracket) {
            Some(Box::new(self.parse_expression()?))
        } else {
            None
        };
        self.consume_closing(Token::RightBracket, "]", Item::Subscript)?;

        Ok(ExprType::Slice(Box::new(target), SliceInfo { start, end, step }))
    }

    fn parse_atom(&mut self) -> ParserResult<Expr> {
        let start = self.current_span();

        let expr = match self.token().clone() {
            Token::Int(n) => {
                self.bump();
                ExprType::Literal(Literal::Int(n))
            }
            Token::Float(n) => {
                self.bump();
                ExprType::Literal(Literal::Float(n))
            }
            Token::String(s) => {
                self.bump();
                ExprType::Literal(Literal::Str(s))
            }
            Token::Identifier(name) => {
                self.bump();
                ExprType::Variable(name)
            }
            Token::LeftParen => {
                self.bump();
                self.skip_newlines();
                let inner = self.parse_expression()?;
                self.consume_closing(Token::RightParen, ")", Item::Expression)?;
                return Ok(Expr::new(inner.expr, self.span_from(&start)));
            }
            Token::LeftBracket => {
                self.bump();
                ExprType::Array(self.parse_array_items()?)
            }
            Token::LeftBrace => {
                self.bump();
                ExprType::HashMap(self.parse_hashmap_items()?)
            }
            Token::Keyword(Keyword::If) => self.parse_if()?,
            Token::Keyword(Keyword::For) => self.parse_for()?,
            Token::Keyword(Keyword::While) => {
                self.bump();
                let condition = self.parse_expression()?;
                let body = self.parse_body()?;
                ExprType::While(Box::new(condition), body)
            }
            Token::Keyword(Keyword::Fun) => return self.parse_func_def(Qualifier::Local),
            Token::Keyword(Keyword::Class) => {
                self.bump();
                let name = self.parse_identifier()?;
                let body = self.parse_block()?;
                ExprType::ClassDef(name, Box::new(body))
            }
            other => return Err(self.error(ParserErrorType::ExpectedExpr(other))),
        };

        Ok(Expr::new(expr, self.span_from(&start)))
    }

    fn parse_array_items(&mut self) -> ParserResult<Vec<Expr>> {
        let mut items = vec![];
        self.skip_newlines();
        if self.check_consume(&Token::RightBracket) {
            return Ok(items);
        }

        loop {
            self.skip_newlines();
            items.push(self.parse_expression()?);
            self.skip_newlines();
            if !self.check_consume(&Token::Comma) {
                break;
            }
        }

        self.consume_closing(Token::RightBracket, "]", Item::Array)?;
        Ok(items)
    }

    fn parse_hashmap_items(&mut self) -> ParserResult<Vec<(Expr, Expr)>> {
        let mut pairs = vec![];
        self.skip_newlines();
        if self.check_consume(&Token::RightBrace) {
            return Ok(pairs);
        }

        loop {
            self.skip_newlines();
            let key = self.parse_expression()?;
            self.consume(Token::Colon, ":")?;
            self.skip_newlines();
            let value = self.parse_expression()?;
            pairs.push((key, value));
            self.skip_newlines();
            if !self.check_consume(&Token::Comma) {
                break;
            }
        }

        self.consume_closing(Token::RightBrace, "}", Item::HashMap)?;
        Ok(pairs)
    }

    fn parse_block(&mut self) -> ParserResult<Expr> {
        let start = self.current_span();
        self.consume(Token::LeftBrace, "{")?;
        let stmts = self.parse_statements()?;
        self.consume_closing(Token::RightBrace, "}", Item::Block)?;
        Ok(Expr::new(stmts.expr, self.span_from(&start)))
    }

    /// A brace block or a single statement.
    fn parse_body(&mut self) -> ParserResult<Body> {
        if self.check(&Token::LeftBrace) {
            let block = self.parse_block()?;
            return Ok(Body {
                expr: Box::new(block),
                braced: true,
            });
        }

        if matches!(self.token(), Token::Newline | Token::EndOfFile) {
            return Err(self.error(ParserErrorType::ExpectedBody(self.token().clone())));
        }

        Ok(Body {
            expr: Box::new(self.parse_statement()?),
            braced: false,
        })
    }

    /// `if` and its `elif` chain share one case routine; `else` comes last.
    fn parse_if(&mut self) -> ParserResult<ExprType> {
        self.bump();
        let mut cases = vec![self.parse_if_case()?];

        while self.skip_newlines_before(Keyword::Elif) {
            self.bump();
            cases.push(self.parse_if_case()?);
        }

        let else_body = if self.skip_newlines_before(Keyword::Else) {
            self.bump();
            Some(self.parse_body()?)
        } else {
            None
        };

        Ok(ExprType::If(cases, else_body))
    }

    fn parse_if_case(&mut self) -> ParserResult<IfCase> {
        let condition = self.parse_expression()?;
        let body = self.parse_body()?;
        Ok(IfCase { condition, body })
    }

    fn parse_for(&mut self) -> ParserResult<ExprType> {
        self.bump();
        let var = self.parse_identifier()?;

        if self.check_consume(&Token::Equals) {
            let start = Box::new(self.parse_expression()?);
            self.consume(Token::Keyword(Keyword::To), "to")?;
            let end = Box::new(self.parse_expression()?);
            let step = if self.check_consume_keyword(Keyword::Step) {
                Some(Box::new(self.parse_expression()?))
            } else {
                None
            };
            let body = self.parse_body()?;
            Ok(ExprType::For {
                var,
                start,
                end,
                step,
                body,
            })
        } else if self.check_consume_keyword(Keyword::In) {
            let iterable = Box::new(self.parse_expression()?);
            let body = self.parse_body()?;
            Ok(ExprType::ForIn {
                var,
                iterable,
                body,
            })
        } else {
            Err(self.error(ParserErrorType::ExpectedForForm(self.token().clone())))
        }
    }

    fn parse_func_def(&mut self, qualifier: Qualifier) -> ParserResult<Expr> {
        let start = self.current_span();
        self.bump();

        let name = match self.token().clone() {
            Token::Identifier(name) => {
                self.bump();
                Some(name)
            }
            _ => None,
        };

        self.consume(Token::LeftParen, "(")?;
        let params = self.parse_func_params()?;

        let body = if self.check_consume(&Token::Arrow) {
            Body {
                expr: Box::new(self.parse_expression()?),
                braced: false,
            }
        } else if self.check(&Token::LeftBrace) {
            Body {
                expr: Box::new(self.parse_block()?),
                braced: true,
            }
        } else {
            return Err(self.error(ParserErrorType::ExpectedAfter(
                "->' or '{",
                Item::Parameters,
                self.token().clone(),
            )));
        };

        let span = self.span_from(&start);
        let info = FuncInfo {
            name,
            params,
            body,
            span: span.clone(),
        };
        Ok(Expr::new(ExprType::FuncDef(Rc::new(info), qualifier), span))
    }

    /// Once a parameter has a default, every later one needs one too.
    fn parse_func_params(&mut self) -> ParserResult<Vec<Param>> {
        let mut params: Vec<Param> = vec![];
        self.skip_newlines();
        if self.check_consume(&Token::RightParen) {
            return Ok(params);
        }

        loop {
            self.skip_newlines();
            let span = self.current_span();
            let name = self.parse_identifier()?;
            let default = if self.check_consume(&Token::Equals) {
                Some(self.parse_expression()?)
            } else {
                None
            };

            let earlier_default = params.iter().any(|p| p.default.is_some());
            if earlier_default && default.is_none() {
                return Err(ParserError {
                    span,
                    error: ParserErrorType::MissingDefault(name),
                });
            }

            params.push(Param {
                name,
                default,
                span: self.span_from(&span),
            });

            self.skip_newlines();
            if !self.check_consume(&Token::Comma) {
                break;
            }
        }

        self.consume_closing(Token::RightParen, ")", Item::Parameters)?;
        Ok(params)
    }
}

fn into_assign_target(expr: Expr) -> ParserResult<AssignTarget> {
    match expr.expr {
        ExprType::Variable(name) => Ok(AssignTarget::Variable(name)),
        ExprType::Attribute(target, name) => Ok(AssignTarget::Attribute(target, name)),
        ExprType::Index(target, index) => Ok(AssignTarget::Index(target, index)),
        _ => Err(ParserError {
            span: expr.span,
            error: ParserErrorType::InvalidAssignTarget,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::radon_frontend::lexer::tokenize;

    fn parse_source(source: &str) -> ParserResult<Expr> {
        parse(tokenize("<test>", source).unwrap())
    }

    fn ast(source: &str) -> String {
        parse_source(source).unwrap().ast_string()
    }

    #[test]
    fn test_precedence() {
        assert_eq!(ast("var x = 1 + 2 * 3"), "(do (var x (+ 1 (* 2 3))))");
        assert_eq!(ast("-2 ^ 2"), "(do (- (^ 2 2)))");
        assert_eq!(ast("2 ^ 3 ^ 2"), "(do (^ 2 (^ 3 2)))");
        assert_eq!(ast("1 < 2 and not 3 == 4"), "(do (and (< 1 2) (not (== 3 4))))");
        assert_eq!(ast("7 // 2 % 3"), "(do (% (// 7 2) 3))");
    }

    #[test]
    fn test_statements_and_newlines() {
        assert_eq!(ast("\n\n1;2\n\n\n3\n"), "(do 1 2 3)");
        assert_eq!(ast(""), "(do )");
    }

    #[test]
    fn test_assignments() {
        assert_eq!(ast("var this.v = v"), "(do (var this.v v))");
        assert_eq!(ast("x += 2"), "(do (+= x 2))");
        assert_eq!(ast("a[0] = 1"), "(do (static a[0] 1))");
        assert_eq!(ast("const PI = 3.14"), "(do (const PI 3.14))");
        assert_eq!(ast("x++"), "(do (++post x))");
        assert_eq!(ast("--x"), "(do (--pre x))");
    }

    #[test]
    fn test_invalid_target() {
        let err = parse_source("1 + 2 = 3").unwrap_err();
        assert_eq!(err.error, ParserErrorType::InvalidAssignTarget);
    }

    #[test]
    fn test_calls_and_subscripts() {
        assert_eq!(ast("a.b.c(1, k=2)"), "(do (call (get (get a b) c) 1 k=2))");
        assert_eq!(ast("a[1:3]"), "(do (slice a 1 3 _))");
        assert_eq!(ast("a[::2]"), "(do (slice a _ _ 2))");
        assert_eq!(ast("m[\"k\"]"), "(do (index m \"k\"))");
    }

    #[test]
    fn test_literals() {
        assert_eq!(ast("[1, [2]]"), "(do [1 [2]])");
        assert_eq!(ast("{\"a\": 1,\n \"b\": 2}"), "(do {\"a\": 1, \"b\": 2})");
    }

    #[test]
    fn test_if_chain() {
        assert_eq!(
            ast("if x { 1 }\nelif y 2\nelse { 3 }"),
            "(do (if x {(do 1)} y 2 else {(do 3)}))"
        );
    }

    #[test]
    fn test_for_forms() {
        assert_eq!(
            ast("for i = 0 to 10 step 2 { print(i) }"),
            "(do (for i 0 10 step 2 {(do (call print i))}))"
        );
        assert_eq!(ast("for x in xs x"), "(do (for x in xs x))");
        assert!(parse_source("for x of xs {}").is_err());
    }

    #[test]
    fn test_functions() {
        assert_eq!(
            ast("fun add(a, b=10) { return a + b }"),
            "(do (fun add (a b=10) {(do (return (+ a b)))}))"
        );
        assert_eq!(ast("fun (x) -> x * 2"), "(do (fun <anonymous> (x) (* x 2)))");
    }

    #[test]
    fn test_default_order_enforced() {
        let err = parse_source("fun f(a=1, b) {}").unwrap_err();
        assert_eq!(err.error, ParserErrorType::MissingDefault("b".to_owned()));
        assert_eq!(err.span.extract_string(), Some("b"));
    }

    #[test]
    fn test_bare_return_rewinds() {
        assert_eq!(ast("fun f() { return }"), "(do (fun f () {(do (return))}))");
        assert_eq!(ast("fun f() { return\n1 }"), "(do (fun f () {(do (return) 1)}))");
    }

    #[test]
    fn test_try_and_switch() {
        assert_eq!(
            ast("try { 1 / 0 } catch as e { print(e) }"),
            "(do (try (do (/ 1 0)) catch e (do (call print e))))"
        );
        assert_eq!(
            ast("switch x {\n case 1 { fallthrough }\n default { 2 }\n}"),
            "(do (switch x (case 1 (do fallthrough)) (default (do 2))))"
        );
    }

    #[test]
    fn test_modules() {
        assert_eq!(ast("import math as m"), "(do (import math as m))");
        assert_eq!(
            ast("from \"lib.rn\" import a, b"),
            "(do (from \"lib.rn\" import a b))"
        );
        assert_eq!(ast("include math"), "(do (include math))");
    }

    #[test]
    fn test_trailing_tokens() {
        let err = parse_source("1 2").unwrap_err();
        assert_eq!(err.error, ParserErrorType::TrailingTokens(Token::Int(2)));
    }

    #[test]
    fn test_unclosed_block() {
        let err = parse_source("while x { 1").unwrap_err();
        assert!(matches!(err.error, ParserErrorType::ExpectedClosing("}", Item::Block, _)));
    }
}
