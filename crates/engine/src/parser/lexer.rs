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

//! On-demand lexer.
//!
//! The lexer is pulled one token at a time by the parser. Two constructs cannot
//! be tokenized without syntactic context, so the parser asks for them
//! explicitly: a `/` in operand position is re-scanned as a regular-expression
//! literal, and the `}` closing a template substitution is re-scanned as the
//! next template chunk.

use super::{
    cursor::{Cursor, EOF_CHAR},
    token::{Keyword, Token, TokenKind},
    ParseError,
};

/// Tokenizer over one source text.
#[derive(Debug, Clone)]
pub struct Lexer<'src> {
    source: &'src str,
    cursor: Cursor<'src>,
}

fn is_line_terminator(c: char) -> bool {
    matches!(c, '\n' | '\r' | '\u{2028}' | '\u{2029}')
}

fn is_id_start(c: char) -> bool {
    c == '$' || c == '_' || c.is_alphabetic()
}

fn is_id_continue(c: char) -> bool {
    c == '$' || c == '_' || c == '\u{200c}' || c == '\u{200d}' || c.is_alphanumeric()
}

impl<'src> Lexer<'src> {
    /// Create a lexer at the start of `source`.
    pub fn new(source: &'src str) -> Self {
        Self { source, cursor: Cursor::new(source) }
    }

    /// The current byte offset.
    pub const fn pos(&self) -> usize {
        self.cursor.pos()
    }

    fn error(&self, offset: usize, message: impl Into<String>) -> ParseError {
        ParseError::new(self.source, offset, message)
    }

    /// Skips whitespace and comments, reporting whether a line terminator was crossed.
    fn skip_trivia(&mut self) -> Result<bool, ParseError> {
        let mut newline = false;
        if self.cursor.pos() == 0 && self.cursor.first() == '#' && self.cursor.second() == '!' {
            self.cursor.eat_while(|c| !is_line_terminator(c));
        }
        loop {
            let c = self.cursor.first();
            if self.cursor.is_eof() {
                return Ok(newline);
            }
            if is_line_terminator(c) {
                newline = true;
                self.cursor.bump();
            } else if c.is_whitespace() || c == '\u{feff}' {
                self.cursor.bump();
            } else if c == '/' && self.cursor.second() == '/' {
                self.cursor.eat_while(|c| !is_line_terminator(c));
            } else if c == '/' && self.cursor.second() == '*' {
                let start = self.cursor.pos();
                self.cursor.bump();
                self.cursor.bump();
                loop {
                    if self.cursor.is_eof() {
                        return Err(self.error(start, "unterminated block comment"));
                    }
                    if self.cursor.first() == '*' && self.cursor.second() == '/' {
                        self.cursor.bump();
                        self.cursor.bump();
                        break;
                    }
                    if let Some(c) = self.cursor.bump() {
                        newline |= is_line_terminator(c);
                    }
                }
            } else {
                return Ok(newline);
            }
        }
    }

    /// Lex the next token. `/` is always lexed as division here.
    pub fn next_token(&mut self) -> Result<Token, ParseError> {
        let newline_before = self.skip_trivia()?;
        let start = self.cursor.pos();
        if self.cursor.is_eof() {
            return Ok(Token::new(TokenKind::Eof, self.cursor.span_from(start), newline_before));
        }

        let c = self.cursor.first();
        let kind = if is_id_start(c) {
            self.cursor.eat_while(is_id_continue);
            let text = self.cursor.slice_from(start);
            match Keyword::lookup(text) {
                Some(kw) => TokenKind::Keyword(kw),
                None => TokenKind::Ident(text.to_string()),
            }
        } else if c.is_ascii_digit() || (c == '.' && self.cursor.second().is_ascii_digit()) {
            self.lex_number(start)?
        } else if c == '"' || c == '\'' {
            self.lex_string(start)?
        } else if c == '`' {
            self.cursor.bump();
            self.lex_template_chunk(start)?
        } else if c == '#' && is_id_start(self.cursor.second()) {
            self.cursor.bump();
            self.cursor.eat_while(is_id_continue);
            TokenKind::PrivateName(self.cursor.slice_from(start + 1).to_string())
        } else if c == '\\' {
            return Err(self.error(start, "unicode escapes in identifiers are not supported"));
        } else {
            self.lex_punct(start)?
        };

        Ok(Token::new(kind, self.cursor.span_from(start), newline_before))
    }

    fn lex_number(&mut self, start: usize) -> Result<TokenKind, ParseError> {
        let first = self.cursor.first();
        let second = self.cursor.second().to_ascii_lowercase();
        if first == '0' && matches!(second, 'x' | 'o' | 'b') {
            self.cursor.bump();
            self.cursor.bump();
            self.cursor.eat_while(|c| c.is_ascii_hexdigit() || c == '_');
        } else {
            self.cursor.eat_while(|c| c.is_ascii_digit() || c == '_');
            if self.cursor.first() == '.' {
                self.cursor.bump();
                self.cursor.eat_while(|c| c.is_ascii_digit() || c == '_');
            }
            if matches!(self.cursor.first(), 'e' | 'E') {
                let sign = self.cursor.second();
                if sign.is_ascii_digit()
                    || (matches!(sign, '+' | '-') && self.cursor.third().is_ascii_digit())
                {
                    self.cursor.bump();
                    self.cursor.bump();
                    self.cursor.eat_while(|c| c.is_ascii_digit() || c == '_');
                }
            }
        }
        self.cursor.eat('n');
        if is_id_start(self.cursor.first()) {
            return Err(self.error(self.cursor.pos(), "identifier starts immediately after number"));
        }
        Ok(TokenKind::Num(self.cursor.slice_from(start).to_string()))
    }

    /// Reads one escape sequence (after the backslash) into `out`.
    fn lex_escape(&mut self, out: &mut String) -> Result<(), ParseError> {
        let at = self.cursor.pos();
        let Some(c) = self.cursor.bump() else {
            return Err(self.error(at, "unterminated escape sequence"));
        };
        match c {
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            'b' => out.push('\u{8}'),
            'f' => out.push('\u{c}'),
            'v' => out.push('\u{b}'),
            '0' if !self.cursor.first().is_ascii_digit() => out.push('\0'),
            'x' => {
                let code = self.lex_hex_digits(2, at)?;
                out.push(char::from_u32(code).unwrap_or('\u{fffd}'));
            }
            'u' => {
                let code = if self.cursor.eat('{') {
                    let digits_start = self.cursor.pos();
                    self.cursor.eat_while(|c| c.is_ascii_hexdigit());
                    let digits = self.cursor.slice_from(digits_start);
                    if !self.cursor.eat('}') {
                        return Err(self.error(at, "malformed unicode escape"));
                    }
                    u32::from_str_radix(digits, 16)
                        .map_err(|_| self.error(at, "malformed unicode escape"))?
                } else {
                    self.lex_hex_digits(4, at)?
                };
                out.push(char::from_u32(code).unwrap_or('\u{fffd}'));
            }
            '\r' => {
                self.cursor.eat('\n');
            }
            c if is_line_terminator(c) => {}
            c => out.push(c),
        }
        Ok(())
    }

    fn lex_hex_digits(&mut self, count: usize, at: usize) -> Result<u32, ParseError> {
        let digits_start = self.cursor.pos();
        for _ in 0..count {
            if !self.cursor.first().is_ascii_hexdigit() {
                return Err(self.error(at, "malformed hexadecimal escape"));
            }
            self.cursor.bump();
        }
        u32::from_str_radix(self.cursor.slice_from(digits_start), 16)
            .map_err(|_| self.error(at, "malformed hexadecimal escape"))
    }

    fn lex_string(&mut self, start: usize) -> Result<TokenKind, ParseError> {
        let quote = self.cursor.bump().unwrap_or(EOF_CHAR);
        let mut cooked = String::new();
        loop {
            if self.cursor.is_eof() {
                return Err(self.error(start, "unterminated string literal"));
            }
            match self.cursor.first() {
                c if c == quote => {
                    self.cursor.bump();
                    return Ok(TokenKind::Str(cooked));
                }
                '\\' => {
                    self.cursor.bump();
                    self.lex_escape(&mut cooked)?;
                }
                '\n' | '\r' => return Err(self.error(start, "unterminated string literal")),
                c => {
                    cooked.push(c);
                    self.cursor.bump();
                }
            }
        }
    }

    /// Lexes template text up to and including the next `` ` `` or `${`.
    fn lex_template_chunk(&mut self, start: usize) -> Result<TokenKind, ParseError> {
        let mut cooked = String::new();
        loop {
            if self.cursor.is_eof() {
                return Err(self.error(start, "unterminated template literal"));
            }
            match self.cursor.first() {
                '`' => {
                    self.cursor.bump();
                    return Ok(TokenKind::Template { cooked, tail: true });
                }
                '$' if self.cursor.second() == '{' => {
                    self.cursor.bump();
                    self.cursor.bump();
                    return Ok(TokenKind::Template { cooked, tail: false });
                }
                '\\' => {
                    self.cursor.bump();
                    self.lex_escape(&mut cooked)?;
                }
                c => {
                    cooked.push(c);
                    self.cursor.bump();
                }
            }
        }
    }

    /// Re-scan from the `}` at `start` as the continuation of a template literal.
    pub fn rescan_template(&mut self, start: usize) -> Result<Token, ParseError> {
        self.cursor = Cursor::at(self.source, start);
        if !self.cursor.eat('}') {
            return Err(self.error(start, "expected `}` to close template substitution"));
        }
        let kind = self.lex_template_chunk(start)?;
        Ok(Token::new(kind, self.cursor.span_from(start), false))
    }

    /// Re-scan from the `/` at `start` as a regular-expression literal.
    pub fn rescan_regex(&mut self, start: usize, newline_before: bool) -> Result<Token, ParseError> {
        self.cursor = Cursor::at(self.source, start);
        self.cursor.bump();
        let mut in_class = false;
        loop {
            let c = self.cursor.first();
            if self.cursor.is_eof() || is_line_terminator(c) {
                return Err(self.error(start, "unterminated regular expression"));
            }
            self.cursor.bump();
            match c {
                '\\' => {
                    if is_line_terminator(self.cursor.first()) {
                        return Err(self.error(start, "unterminated regular expression"));
                    }
                    self.cursor.bump();
                }
                '[' => in_class = true,
                ']' => in_class = false,
                '/' if !in_class => break,
                _ => {}
            }
        }
        self.cursor.eat_while(is_id_continue);
        let raw = self.cursor.slice_from(start).to_string();
        Ok(Token::new(TokenKind::Regex(raw), self.cursor.span_from(start), newline_before))
    }

    fn lex_punct(&mut self, start: usize) -> Result<TokenKind, ParseError> {
        use TokenKind::*;

        let c = self.cursor.bump().unwrap_or(EOF_CHAR);
        let kind = match c {
            '{' => LBrace,
            '}' => RBrace,
            '(' => LParen,
            ')' => RParen,
            '[' => LBracket,
            ']' => RBracket,
            ';' => Semi,
            ',' => Comma,
            ':' => Colon,
            '~' => Tilde,
            '.' => {
                if self.cursor.first() == '.' && self.cursor.second() == '.' {
                    self.cursor.bump();
                    self.cursor.bump();
                    Ellipsis
                } else {
                    Dot
                }
            }
            '?' => {
                if self.cursor.first() == '.' && !self.cursor.second().is_ascii_digit() {
                    self.cursor.bump();
                    QuestionDot
                } else if self.cursor.eat('?') {
                    if self.cursor.eat('=') {
                        QuestionQuestionEq
                    } else {
                        QuestionQuestion
                    }
                } else {
                    Question
                }
            }
            '=' => {
                if self.cursor.eat('>') {
                    Arrow
                } else if self.cursor.eat('=') {
                    if self.cursor.eat('=') {
                        EqEqEq
                    } else {
                        EqEq
                    }
                } else {
                    Eq
                }
            }
            '!' => {
                if self.cursor.eat('=') {
                    if self.cursor.eat('=') {
                        NotEqEq
                    } else {
                        NotEq
                    }
                } else {
                    Bang
                }
            }
            '+' => {
                if self.cursor.eat('+') {
                    PlusPlus
                } else if self.cursor.eat('=') {
                    PlusEq
                } else {
                    Plus
                }
            }
            '-' => {
                if self.cursor.eat('-') {
                    MinusMinus
                } else if self.cursor.eat('=') {
                    MinusEq
                } else {
                    Minus
                }
            }
            '*' => {
                if self.cursor.eat('*') {
                    if self.cursor.eat('=') {
                        StarStarEq
                    } else {
                        StarStar
                    }
                } else if self.cursor.eat('=') {
                    StarEq
                } else {
                    Star
                }
            }
            '/' => {
                if self.cursor.eat('=') {
                    SlashEq
                } else {
                    Slash
                }
            }
            '%' => {
                if self.cursor.eat('=') {
                    PercentEq
                } else {
                    Percent
                }
            }
            '<' => {
                if self.cursor.eat('<') {
                    if self.cursor.eat('=') {
                        ShlEq
                    } else {
                        Shl
                    }
                } else if self.cursor.eat('=') {
                    LtEq
                } else {
                    Lt
                }
            }
            '>' => {
                if self.cursor.eat('>') {
                    if self.cursor.eat('>') {
                        if self.cursor.eat('=') {
                            UShrEq
                        } else {
                            UShr
                        }
                    } else if self.cursor.eat('=') {
                        ShrEq
                    } else {
                        Shr
                    }
                } else if self.cursor.eat('=') {
                    GtEq
                } else {
                    Gt
                }
            }
            '&' => {
                if self.cursor.eat('&') {
                    if self.cursor.eat('=') {
                        AmpAmpEq
                    } else {
                        AmpAmp
                    }
                } else if self.cursor.eat('=') {
                    AmpEq
                } else {
                    Amp
                }
            }
            '|' => {
                if self.cursor.eat('|') {
                    if self.cursor.eat('=') {
                        PipePipeEq
                    } else {
                        PipePipe
                    }
                } else if self.cursor.eat('=') {
                    PipeEq
                } else {
                    Pipe
                }
            }
            '^' => {
                if self.cursor.eat('=') {
                    CaretEq
                } else {
                    Caret
                }
            }
            other => return Err(self.error(start, format!("unexpected character {other:?}"))),
        };
        Ok(kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        let mut lexer = Lexer::new(source);
        let mut out = vec![];
        loop {
            let token = lexer.next_token().unwrap();
            if token.is_eof() {
                return out;
            }
            out.push(token.kind);
        }
    }

    #[test]
    fn test_lex_punctuation_longest_match() {
        assert_eq!(
            kinds("a >>>= b ?? c?.d ?.5 ..."),
            vec![
                TokenKind::Ident("a".into()),
                TokenKind::UShrEq,
                TokenKind::Ident("b".into()),
                TokenKind::QuestionQuestion,
                TokenKind::Ident("c".into()),
                TokenKind::QuestionDot,
                TokenKind::Ident("d".into()),
                TokenKind::Question,
                TokenKind::Num(".5".into()),
                TokenKind::Ellipsis,
            ]
        );
    }

    #[test]
    fn test_lex_newline_flag_and_comments() {
        let mut lexer = Lexer::new("a /* x\n */ b // c\n c");
        assert!(!lexer.next_token().unwrap().newline_before);
        assert!(lexer.next_token().unwrap().newline_before);
        assert!(lexer.next_token().unwrap().newline_before);
    }

    #[test]
    fn test_lex_strings_and_numbers() {
        assert_eq!(
            kinds(r#"'a\n' "\u{41}\x42" 0x1F 1e3 10n 1_000"#),
            vec![
                TokenKind::Str("a\n".into()),
                TokenKind::Str("AB".into()),
                TokenKind::Num("0x1F".into()),
                TokenKind::Num("1e3".into()),
                TokenKind::Num("10n".into()),
                TokenKind::Num("1_000".into()),
            ]
        );
        assert!(Lexer::new("'abc").next_token().is_err());
    }

    #[test]
    fn test_rescan_regex_and_template() {
        let source = "/[/]+/g `a${b}c`";
        let mut lexer = Lexer::new(source);
        let slash = lexer.next_token().unwrap();
        assert_eq!(slash.kind, TokenKind::Slash);
        let regex = lexer.rescan_regex(slash.span.start, false).unwrap();
        assert_eq!(regex.kind, TokenKind::Regex("/[/]+/g".into()));

        let head = lexer.next_token().unwrap();
        assert_eq!(head.kind, TokenKind::Template { cooked: "a".into(), tail: false });
        assert_eq!(lexer.next_token().unwrap().kind, TokenKind::Ident("b".into()));
        let rbrace = lexer.next_token().unwrap();
        assert_eq!(rbrace.kind, TokenKind::RBrace);
        let tail = lexer.rescan_template(rbrace.span.start).unwrap();
        assert_eq!(tail.kind, TokenKind::Template { cooked: "c".into(), tail: true });
        assert_eq!(tail.span.end, source.len());
    }
}
