// Storyline - Script Execution Story Builder
// Copyright (C) 2024 Zhuo Zhang and Wuqi Zhang
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Recursive-descent parser for scripts.
//!
//! The parser is split across submodules:
//! - [`expr`]: expressions, with precedence climbing for binary operators
//! - [`stmt`]: statements, declarations, functions and classes
//!
//! Only classic scripts are accepted; `import`/`export` declarations are
//! rejected. Automatic semicolon insertion follows the newline rules.

pub mod ast;
pub mod cursor;
mod expr;
pub mod lexer;
pub mod span;
mod stmt;
pub mod token;
pub mod visitor;

pub use ast::*;
pub use span::{LineIndex, Span};
pub use visitor::{walk_statements, Visitor, VisitorAction, Walk};

use lexer::Lexer;
use token::{Keyword, Token, TokenKind};

/// A syntax error, located in the source.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{message} (line {line}, column {column})")]
pub struct ParseError {
    /// What went wrong.
    pub message: String,
    /// Byte offset of the error.
    pub offset: usize,
    /// 1-based line.
    pub line: u32,
    /// 0-based column.
    pub column: u32,
}

impl ParseError {
    /// Creates an error at `offset` in `source`.
    pub fn new(source: &str, offset: usize, message: impl Into<String>) -> Self {
        let (line, column) = LineIndex::new(source).line_col(offset.min(source.len()));
        Self { message: message.into(), offset, line, column }
    }
}

/// Result alias for parser operations.
pub type ParseResult<T> = Result<T, ParseError>;

/// Deepest syntactic nesting accepted before parsing fails with an error.
pub const MAX_NESTING_DEPTH: u32 = 256;

/// What the enclosing function allows.
#[derive(Clone, Copy, Debug, Default)]
struct FunctionContext {
    in_function: bool,
    is_async: bool,
    is_generator: bool,
}

/// Parser state.
pub struct Parser<'src> {
    source: &'src str,
    lexer: Lexer<'src>,
    token: Token,
    prev_end: usize,
    next_node: u32,
    context: FunctionContext,
    depth: u32,
}

impl<'src> Parser<'src> {
    /// Create a parser positioned at the first token of `source`.
    pub fn new(source: &'src str) -> ParseResult<Self> {
        let mut lexer = Lexer::new(source);
        let token = lexer.next_token()?;
        Ok(Self {
            source,
            lexer,
            token,
            prev_end: 0,
            next_node: 0,
            context: FunctionContext::default(),
            depth: 0,
        })
    }

    /// Parse the whole source as a script.
    pub fn parse_program(&mut self) -> ParseResult<Program> {
        let mut body = self.parse_directives()?;
        while !self.token.is_eof() {
            body.push(self.parse_statement_list_item()?);
        }
        Ok(Program { body, span: Span::new(0, self.source.len()) })
    }

    fn node_id(&mut self) -> NodeId {
        let id = NodeId(self.next_node);
        self.next_node += 1;
        id
    }

    /// Consume the current token and return it.
    fn advance(&mut self) -> ParseResult<Token> {
        let next = self.lexer.next_token()?;
        self.prev_end = self.token.span.end;
        Ok(std::mem::replace(&mut self.token, next))
    }

    /// Look at the token after the current one.
    fn peek(&self) -> ParseResult<Token> {
        self.lexer.clone().next_token()
    }

    /// Look `n` tokens past the current one (`peek_nth(1)` is `peek()`).
    fn peek_nth(&self, n: usize) -> ParseResult<Token> {
        let mut lexer = self.lexer.clone();
        let mut token = lexer.next_token()?;
        for _ in 1..n {
            token = lexer.next_token()?;
        }
        Ok(token)
    }

    fn at(&self, kind: &TokenKind) -> bool {
        &self.token.kind == kind
    }

    fn at_keyword(&self, kw: Keyword) -> bool {
        self.token.is_keyword(kw)
    }

    fn eat(&mut self, kind: &TokenKind) -> ParseResult<bool> {
        if self.at(kind) {
            self.advance()?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn eat_keyword(&mut self, kw: Keyword) -> ParseResult<bool> {
        if self.at_keyword(kw) {
            self.advance()?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn expect(&mut self, kind: &TokenKind) -> ParseResult<Token> {
        if self.at(kind) {
            self.advance()
        } else {
            Err(self.error_at_current(format!("expected {kind}")))
        }
    }

    fn expect_keyword(&mut self, kw: Keyword) -> ParseResult<Token> {
        if self.at_keyword(kw) {
            self.advance()
        } else {
            Err(self.error_at_current(format!("expected `{}`", kw.as_str())))
        }
    }

    /// Expect a binding identifier (contextual keywords allowed, reserved words not).
    fn expect_ident(&mut self) -> ParseResult<Ident> {
        match &self.token.kind {
            TokenKind::Ident(name) => {
                let ident = Ident { name: name.clone(), span: self.token.span };
                self.advance()?;
                Ok(ident)
            }
            _ => Err(self.error_at_current("expected identifier")),
        }
    }

    /// Automatic semicolon insertion: accept `;`, or nothing before `}`,
    /// end of input or a line break.
    fn consume_semicolon(&mut self) -> ParseResult<()> {
        if self.eat(&TokenKind::Semi)? {
            return Ok(());
        }
        if matches!(self.token.kind, TokenKind::RBrace | TokenKind::Eof) || self.token.newline_before
        {
            return Ok(());
        }
        Err(self.error_at_current("expected `;`"))
    }

    fn span_from(&self, start: usize) -> Span {
        Span::new(start, self.prev_end.max(start))
    }

    fn error_at_current(&self, message: impl AsRef<str>) -> ParseError {
        ParseError::new(
            self.source,
            self.token.span.start,
            format!("{}, found {}", message.as_ref(), self.token.kind),
        )
    }

    fn error_at(&self, offset: usize, message: impl Into<String>) -> ParseError {
        ParseError::new(self.source, offset, message)
    }

    /// Run `f` inside a function body with the given flags.
    fn with_context<T>(
        &mut self,
        is_async: bool,
        is_generator: bool,
        f: impl FnOnce(&mut Self) -> ParseResult<T>,
    ) -> ParseResult<T> {
        let saved = self.context;
        self.context = FunctionContext { in_function: true, is_async, is_generator };
        let result = f(self);
        self.context = saved;
        result
    }

    /// Run `f` one nesting level deeper, failing once [`MAX_NESTING_DEPTH`]
    /// is reached.
    fn nested<T>(&mut self, f: impl FnOnce(&mut Self) -> ParseResult<T>) -> ParseResult<T> {
        if self.depth >= MAX_NESTING_DEPTH {
            return Err(ParseError::new(self.source, self.token.span.start, "nesting too deep"));
        }
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }

    /// Whether `await` is an operator here (async functions and the top level).
    fn await_allowed(&self) -> bool {
        self.context.is_async || !self.context.in_function
    }
}

/// Parse a script.
pub fn parse(source: &str) -> ParseResult<Program> {
    Parser::new(source)?.parse_program()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_program() {
        let program = parse("  // nothing here\n").unwrap();
        assert!(program.body.is_empty());
    }

    #[test]
    fn test_error_location() {
        let err = parse("let a = 1;\nlet = ;").unwrap_err();
        assert_eq!(err.line, 2);
        assert!(err.to_string().contains("line 2"));
    }

    fn on_large_stack(f: impl FnOnce() + Send + 'static) {
        std::thread::Builder::new().stack_size(64 << 20).spawn(f).unwrap().join().unwrap();
    }

    #[test]
    fn test_deep_nesting_is_an_error() {
        on_large_stack(assert_deep_nesting_is_an_error);
    }

    fn assert_deep_nesting_is_an_error() {
        let depth = 1000;
        let source = format!("let x = {}1{};", "(".repeat(depth), ")".repeat(depth));
        let err = parse(&source).unwrap_err();
        assert!(err.message.contains("nesting too deep"));
        assert_eq!(err.line, 1);

        let source = format!("let x = {}{};", "[".repeat(depth), "]".repeat(depth));
        assert!(parse(&source).unwrap_err().message.contains("nesting too deep"));

        let source = format!("{}{}", "{".repeat(depth), "}".repeat(depth));
        assert!(parse(&source).unwrap_err().message.contains("nesting too deep"));

        let source = format!("x = {}1;", "!".repeat(depth));
        assert!(parse(&source).unwrap_err().message.contains("nesting too deep"));
    }

    #[test]
    fn test_moderate_nesting_is_accepted() {
        let source = format!("let x = {}1{};", "(".repeat(50), ")".repeat(50));
        assert!(parse(&source).is_ok());
    }

    #[test]
    fn test_modules_are_rejected() {
        assert!(parse("import x from 'y';").is_err());
        assert!(parse("export const a = 1;").is_err());
    }
}
