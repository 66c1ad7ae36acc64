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

//! Expression parsing, including the arrow-function and destructuring
//! cover grammars.

use super::{
    ast::*,
    token::{Keyword, TokenKind},
    ParseResult, Parser, Span,
};

fn binary_op(kind: &TokenKind, no_in: bool) -> Option<(BinaryOp, u8)> {
    let op = match kind {
        TokenKind::QuestionQuestion => (BinaryOp::Coalesce, 1),
        TokenKind::PipePipe => (BinaryOp::Or, 2),
        TokenKind::AmpAmp => (BinaryOp::And, 3),
        TokenKind::Pipe => (BinaryOp::BitOr, 4),
        TokenKind::Caret => (BinaryOp::BitXor, 5),
        TokenKind::Amp => (BinaryOp::BitAnd, 6),
        TokenKind::EqEq => (BinaryOp::Eq, 7),
        TokenKind::NotEq => (BinaryOp::NotEq, 7),
        TokenKind::EqEqEq => (BinaryOp::StrictEq, 7),
        TokenKind::NotEqEq => (BinaryOp::StrictNotEq, 7),
        TokenKind::Lt => (BinaryOp::Lt, 8),
        TokenKind::Gt => (BinaryOp::Gt, 8),
        TokenKind::LtEq => (BinaryOp::LtEq, 8),
        TokenKind::GtEq => (BinaryOp::GtEq, 8),
        TokenKind::Keyword(Keyword::Instanceof) => (BinaryOp::Instanceof, 8),
        TokenKind::Keyword(Keyword::In) if !no_in => (BinaryOp::In, 8),
        TokenKind::Shl => (BinaryOp::Shl, 9),
        TokenKind::Shr => (BinaryOp::Shr, 9),
        TokenKind::UShr => (BinaryOp::UShr, 9),
        TokenKind::Plus => (BinaryOp::Add, 10),
        TokenKind::Minus => (BinaryOp::Sub, 10),
        TokenKind::Star => (BinaryOp::Mul, 11),
        TokenKind::Slash => (BinaryOp::Div, 11),
        TokenKind::Percent => (BinaryOp::Rem, 11),
        TokenKind::StarStar => (BinaryOp::Exp, 12),
        _ => return None,
    };
    Some(op)
}

fn assign_op(kind: &TokenKind) -> Option<AssignOp> {
    match kind {
        TokenKind::Eq => Some(AssignOp::Assign),
        TokenKind::PlusEq
        | TokenKind::MinusEq
        | TokenKind::StarEq
        | TokenKind::SlashEq
        | TokenKind::PercentEq
        | TokenKind::StarStarEq
        | TokenKind::ShlEq
        | TokenKind::ShrEq
        | TokenKind::UShrEq
        | TokenKind::AmpEq
        | TokenKind::PipeEq
        | TokenKind::CaretEq
        | TokenKind::AmpAmpEq
        | TokenKind::PipePipeEq
        | TokenKind::QuestionQuestionEq => Some(AssignOp::Compound),
        _ => None,
    }
}

impl Parser<'_> {
    fn expr(&mut self, start: usize, kind: ExprKind) -> Expr {
        let id = self.node_id();
        Expr { id, span: self.span_from(start), kind }
    }

    /// `Expression`: a comma-separated sequence. `no_in` disables the `in`
    /// operator (for-loop heads).
    pub(super) fn parse_expression(&mut self, no_in: bool) -> ParseResult<Expr> {
        let start = self.token.span.start;
        let first = self.parse_assignment(no_in)?;
        if !self.at(&TokenKind::Comma) {
            return Ok(first);
        }
        let mut exprs = vec![first];
        while self.eat(&TokenKind::Comma)? {
            exprs.push(self.parse_assignment(no_in)?);
        }
        Ok(self.expr(start, ExprKind::Sequence(exprs)))
    }

    /// `AssignmentExpression`.
    pub(super) fn parse_assignment(&mut self, no_in: bool) -> ParseResult<Expr> {
        self.nested(|this| this.parse_assignment_inner(no_in))
    }

    fn parse_assignment_inner(&mut self, no_in: bool) -> ParseResult<Expr> {
        let start = self.token.span.start;
        if self.context.is_generator && self.token.is_ident("yield") {
            return self.parse_yield(no_in);
        }

        let left = self.parse_conditional(no_in)?;
        if matches!(left.kind, ExprKind::Arrow(_)) {
            return Ok(left);
        }
        let Some(op) = assign_op(&self.token.kind) else {
            return Ok(left);
        };
        self.advance()?;
        let target = self.to_assign_target(left, op)?;
        let value = self.parse_assignment(no_in)?;
        Ok(self.expr(start, ExprKind::Assign { op, target, value: Box::new(value) }))
    }

    fn parse_yield(&mut self, no_in: bool) -> ParseResult<Expr> {
        let start = self.token.span.start;
        self.advance()?;
        let delegate = !self.token.newline_before && self.eat(&TokenKind::Star)?;
        let ends = self.token.newline_before && !delegate
            || matches!(
                self.token.kind,
                TokenKind::RParen
                    | TokenKind::RBracket
                    | TokenKind::RBrace
                    | TokenKind::Comma
                    | TokenKind::Semi
                    | TokenKind::Colon
                    | TokenKind::Eof
            );
        let arg = if ends { None } else { Some(Box::new(self.parse_assignment(no_in)?)) };
        Ok(self.expr(start, ExprKind::Yield { arg, delegate }))
    }

    fn parse_conditional(&mut self, no_in: bool) -> ParseResult<Expr> {
        let start = self.token.span.start;
        let test = self.parse_binary(1, no_in)?;
        if matches!(test.kind, ExprKind::Arrow(_)) || !self.eat(&TokenKind::Question)? {
            return Ok(test);
        }
        let consequent = self.parse_assignment(false)?;
        self.expect(&TokenKind::Colon)?;
        let alternate = self.parse_assignment(no_in)?;
        Ok(self.expr(
            start,
            ExprKind::Conditional {
                test: Box::new(test),
                consequent: Box::new(consequent),
                alternate: Box::new(alternate),
            },
        ))
    }

    /// Precedence climbing over the binary and logical operators.
    fn parse_binary(&mut self, min_prec: u8, no_in: bool) -> ParseResult<Expr> {
        let start = self.token.span.start;
        let mut left = self.parse_unary()?;
        if matches!(left.kind, ExprKind::Arrow(_)) {
            return Ok(left);
        }
        while let Some((op, prec)) = binary_op(&self.token.kind, no_in) {
            if prec < min_prec {
                break;
            }
            self.advance()?;
            // `**` is right-associative.
            let next_min = if op == BinaryOp::Exp { prec } else { prec + 1 };
            let right = self.nested(|this| this.parse_binary(next_min, no_in))?;
            left = self.expr(
                start,
                ExprKind::Binary { op, left: Box::new(left), right: Box::new(right) },
            );
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> ParseResult<Expr> {
        let start = self.token.span.start;
        let op = match &self.token.kind {
            TokenKind::Bang => Some(UnaryOp::Not),
            TokenKind::Tilde => Some(UnaryOp::BitNot),
            TokenKind::Plus => Some(UnaryOp::Plus),
            TokenKind::Minus => Some(UnaryOp::Minus),
            TokenKind::Keyword(Keyword::Typeof) => Some(UnaryOp::Typeof),
            TokenKind::Keyword(Keyword::Void) => Some(UnaryOp::Void),
            TokenKind::Keyword(Keyword::Delete) => Some(UnaryOp::Delete),
            _ => None,
        };
        if let Some(op) = op {
            self.advance()?;
            let arg = self.nested(Self::parse_unary)?;
            return Ok(self.expr(start, ExprKind::Unary { op, arg: Box::new(arg) }));
        }
        if matches!(self.token.kind, TokenKind::PlusPlus | TokenKind::MinusMinus) {
            let increment = self.at(&TokenKind::PlusPlus);
            self.advance()?;
            let arg = self.nested(Self::parse_unary)?;
            return Ok(self.expr(
                start,
                ExprKind::Update { prefix: true, increment, arg: Box::new(arg) },
            ));
        }
        if self.token.is_ident("await") && self.await_allowed() {
            self.advance()?;
            let arg = self.nested(Self::parse_unary)?;
            return Ok(self.expr(start, ExprKind::Await(Box::new(arg))));
        }

        let expr = self.parse_lhs()?;
        if matches!(self.token.kind, TokenKind::PlusPlus | TokenKind::MinusMinus)
            && !self.token.newline_before
            && !matches!(expr.kind, ExprKind::Arrow(_))
        {
            let increment = self.at(&TokenKind::PlusPlus);
            self.advance()?;
            return Ok(self.expr(
                start,
                ExprKind::Update { prefix: false, increment, arg: Box::new(expr) },
            ));
        }
        Ok(expr)
    }

    /// `LeftHandSideExpression`: `new`, member access, calls, optional
    /// chains and tagged templates.
    pub(super) fn parse_lhs(&mut self) -> ParseResult<Expr> {
        let start = self.token.span.start;
        let expr =
            if self.at_keyword(Keyword::New) { self.parse_new()? } else { self.parse_primary()? };
        self.parse_suffixes(start, expr, true)
    }

    fn parse_new(&mut self) -> ParseResult<Expr> {
        let start = self.token.span.start;
        self.expect_keyword(Keyword::New)?;
        if self.eat(&TokenKind::Dot)? {
            if !self.token.is_ident("target") {
                return Err(self.error_at_current("expected `target`"));
            }
            self.advance()?;
            return Ok(self.expr(start, ExprKind::MetaProperty));
        }
        let callee_start = self.token.span.start;
        let callee =
            if self.at_keyword(Keyword::New) { self.nested(Self::parse_new)? } else { self.parse_primary()? };
        let callee = self.parse_suffixes(callee_start, callee, false)?;
        let args = if self.at(&TokenKind::LParen) { self.parse_arguments()? } else { vec![] };
        Ok(self.expr(start, ExprKind::New { callee: Box::new(callee), args }))
    }

    fn parse_member_name(&mut self) -> ParseResult<MemberProp> {
        let span = self.token.span;
        if let TokenKind::PrivateName(name) = &self.token.kind {
            let ident = Ident { name: name.clone(), span };
            self.advance()?;
            return Ok(MemberProp::Private(ident));
        }
        let Some(name) = self.token.property_name() else {
            return Err(self.error_at_current("expected property name"));
        };
        self.advance()?;
        Ok(MemberProp::Ident(Ident { name, span }))
    }

    fn parse_suffixes(&mut self, start: usize, mut expr: Expr, allow_call: bool) -> ParseResult<Expr> {
        if matches!(expr.kind, ExprKind::Arrow(_)) {
            return Ok(expr);
        }
        loop {
            let kind = match &self.token.kind {
                TokenKind::Dot => {
                    self.advance()?;
                    let property = self.parse_member_name()?;
                    ExprKind::Member { object: Box::new(expr), property, optional: false }
                }
                TokenKind::QuestionDot if allow_call => {
                    self.advance()?;
                    match &self.token.kind {
                        TokenKind::LParen => {
                            let args = self.parse_arguments()?;
                            ExprKind::Call { callee: Box::new(expr), args, optional: true }
                        }
                        TokenKind::LBracket => {
                            self.advance()?;
                            let property = self.parse_expression(false)?;
                            self.expect(&TokenKind::RBracket)?;
                            ExprKind::Member {
                                object: Box::new(expr),
                                property: MemberProp::Computed(Box::new(property)),
                                optional: true,
                            }
                        }
                        _ => {
                            let property = self.parse_member_name()?;
                            ExprKind::Member { object: Box::new(expr), property, optional: true }
                        }
                    }
                }
                TokenKind::LBracket => {
                    self.advance()?;
                    let property = self.parse_expression(false)?;
                    self.expect(&TokenKind::RBracket)?;
                    ExprKind::Member {
                        object: Box::new(expr),
                        property: MemberProp::Computed(Box::new(property)),
                        optional: false,
                    }
                }
                TokenKind::LParen if allow_call => {
                    let args = self.parse_arguments()?;
                    ExprKind::Call { callee: Box::new(expr), args, optional: false }
                }
                TokenKind::Template { .. } => {
                    let (_, exprs) = self.parse_template_parts()?;
                    ExprKind::TaggedTemplate { tag: Box::new(expr), exprs }
                }
                _ => return Ok(expr),
            };
            expr = self.expr(start, kind);
        }
    }

    /// `(a, ...b)` call arguments.
    fn parse_arguments(&mut self) -> ParseResult<Vec<Expr>> {
        self.expect(&TokenKind::LParen)?;
        let mut args = vec![];
        while !self.eat(&TokenKind::RParen)? {
            args.push(self.parse_spread_or_assignment()?);
            if !self.at(&TokenKind::RParen) {
                self.expect(&TokenKind::Comma)?;
            }
        }
        Ok(args)
    }

    fn parse_spread_or_assignment(&mut self) -> ParseResult<Expr> {
        let start = self.token.span.start;
        if self.eat(&TokenKind::Ellipsis)? {
            let arg = self.parse_assignment(false)?;
            return Ok(self.expr(start, ExprKind::Spread(Box::new(arg))));
        }
        self.parse_assignment(false)
    }

    /// Parse a template whose first chunk is the current token. Returns the
    /// cooked chunks and the substitutions.
    fn parse_template_parts(&mut self) -> ParseResult<(Vec<String>, Vec<Expr>)> {
        let mut quasis = vec![];
        let mut exprs = vec![];
        loop {
            let TokenKind::Template { cooked, tail } = &self.token.kind else {
                return Err(self.error_at_current("expected template literal"));
            };
            quasis.push(cooked.clone());
            let tail = *tail;
            self.advance()?;
            if tail {
                return Ok((quasis, exprs));
            }
            exprs.push(self.parse_expression(false)?);
            if !self.at(&TokenKind::RBrace) {
                return Err(self.error_at_current("expected `}` in template literal"));
            }
            let resumed = self.lexer.rescan_template(self.token.span.start)?;
            self.token = resumed;
        }
    }

    fn parse_primary(&mut self) -> ParseResult<Expr> {
        let start = self.token.span.start;
        let span = self.token.span;
        let kind = match &self.token.kind {
            TokenKind::Ident(name) => {
                let name = name.clone();
                return self.parse_ident_or_arrow(name);
            }
            TokenKind::Keyword(kw) => match kw {
                Keyword::This => {
                    self.advance()?;
                    ExprKind::This
                }
                Keyword::Super => {
                    self.advance()?;
                    ExprKind::Super
                }
                Keyword::Null => {
                    self.advance()?;
                    ExprKind::Null
                }
                Keyword::True | Keyword::False => {
                    let value = *kw == Keyword::True;
                    self.advance()?;
                    ExprKind::Bool(value)
                }
                Keyword::Function => {
                    let function = self.parse_function(FunctionKind::Expression)?;
                    ExprKind::Function(Box::new(function))
                }
                Keyword::Class => {
                    let class = self.parse_class(false)?;
                    ExprKind::Class(Box::new(class))
                }
                Keyword::Import => {
                    // `import(...)` and `import.meta`; the call suffix is
                    // parsed by the caller.
                    self.advance()?;
                    if self.eat(&TokenKind::Dot)? {
                        self.parse_member_name()?;
                    } else if !self.at(&TokenKind::LParen) {
                        return Err(self.error_at(start, "module declarations are not supported"));
                    }
                    ExprKind::MetaProperty
                }
                _ => return Err(self.error_at_current("unexpected token")),
            },
            TokenKind::Num(raw) => {
                let raw = raw.clone();
                self.advance()?;
                ExprKind::Num(raw)
            }
            TokenKind::Str(value) => {
                let value = value.clone();
                self.advance()?;
                ExprKind::Str(value)
            }
            TokenKind::Slash | TokenKind::SlashEq => {
                let token = self.lexer.rescan_regex(span.start, self.token.newline_before)?;
                self.token = token;
                let TokenKind::Regex(raw) = &self.token.kind else {
                    return Err(self.error_at(start, "expected regular expression"));
                };
                let raw = raw.clone();
                self.advance()?;
                ExprKind::Regex(raw)
            }
            TokenKind::Template { .. } => {
                let (quasis, exprs) = self.parse_template_parts()?;
                ExprKind::Template { quasis, exprs }
            }
            TokenKind::LBracket => self.parse_array_literal()?,
            TokenKind::LBrace => self.parse_object_literal()?,
            TokenKind::LParen => return self.parse_paren_or_arrow(),
            _ => return Err(self.error_at_current("unexpected token")),
        };
        Ok(self.expr(start, kind))
    }

    fn parse_ident_or_arrow(&mut self, name: String) -> ParseResult<Expr> {
        let start = self.token.span.start;
        let span = self.token.span;
        let next = self.peek()?;

        if name == "async" && !next.newline_before {
            match &next.kind {
                TokenKind::Keyword(Keyword::Function) => {
                    let function = self.parse_function(FunctionKind::Expression)?;
                    return Ok(self.expr(start, ExprKind::Function(Box::new(function))));
                }
                TokenKind::Ident(_) if self.at_async_arrow_param()? => {
                    self.advance()?;
                    let param = Pattern::Ident(self.expect_ident()?);
                    return self.parse_arrow_body(start, vec![param], true);
                }
                TokenKind::LParen => {
                    self.advance()?;
                    let args = self.parse_arguments()?;
                    if self.at(&TokenKind::Arrow) && !self.token.newline_before {
                        let params = self.to_params(args)?;
                        return self.parse_arrow_body(start, params, true);
                    }
                    let id = self.node_id();
                    let callee = Expr { id, span, kind: ExprKind::Ident(name) };
                    return Ok(self.expr(
                        start,
                        ExprKind::Call { callee: Box::new(callee), args, optional: false },
                    ));
                }
                _ => {}
            }
        }

        if next.kind == TokenKind::Arrow && !next.newline_before {
            let param = Pattern::Ident(self.expect_ident()?);
            return self.parse_arrow_body(start, vec![param], false);
        }

        self.advance()?;
        Ok(self.expr(start, ExprKind::Ident(name)))
    }

    /// Whether the token after `async` is a lone arrow parameter.
    fn at_async_arrow_param(&self) -> ParseResult<bool> {
        let after = self.peek_nth(2)?;
        Ok(after.kind == TokenKind::Arrow && !after.newline_before)
    }

    /// `(...)`: either a parenthesized expression or an arrow parameter list.
    fn parse_paren_or_arrow(&mut self) -> ParseResult<Expr> {
        let start = self.token.span.start;
        let items = self.parse_arguments()?;
        if self.at(&TokenKind::Arrow) && !self.token.newline_before {
            let params = self.to_params(items)?;
            return self.parse_arrow_body(start, params, false);
        }
        if items.is_empty() || items.iter().any(|item| matches!(item.kind, ExprKind::Spread(_))) {
            return Err(self.error_at_current("expected `=>`"));
        }
        let inner = if items.len() == 1 {
            items.into_iter().next().ok_or_else(|| self.error_at(start, "empty parentheses"))?
        } else {
            let span = Span::new(items[0].span.start, items[items.len() - 1].span.end);
            let id = self.node_id();
            Expr { id, span, kind: ExprKind::Sequence(items) }
        };
        Ok(self.expr(start, ExprKind::Paren(Box::new(inner))))
    }

    fn parse_arrow_body(
        &mut self,
        start: usize,
        params: Vec<Pattern>,
        is_async: bool,
    ) -> ParseResult<Expr> {
        self.expect(&TokenKind::Arrow)?;
        let body = self.with_context(is_async, false, |p| {
            if p.at(&TokenKind::LBrace) {
                Ok(FunctionBody::Block(p.parse_function_body()?))
            } else {
                Ok(FunctionBody::Expr(Box::new(p.parse_assignment(false)?)))
            }
        })?;
        let id = self.node_id();
        let function = Function {
            id,
            span: self.span_from(start),
            name: None,
            kind: FunctionKind::Arrow,
            params,
            body,
            is_async,
            is_generator: false,
            is_derived_constructor: false,
        };
        Ok(self.expr(start, ExprKind::Arrow(Box::new(function))))
    }

    fn parse_array_literal(&mut self) -> ParseResult<ExprKind> {
        self.expect(&TokenKind::LBracket)?;
        let mut elements = vec![];
        while !self.eat(&TokenKind::RBracket)? {
            if self.eat(&TokenKind::Comma)? {
                elements.push(None);
                continue;
            }
            elements.push(Some(self.parse_spread_or_assignment()?));
            if !self.at(&TokenKind::RBracket) {
                self.expect(&TokenKind::Comma)?;
            }
        }
        Ok(ExprKind::Array(elements))
    }

    fn parse_object_literal(&mut self) -> ParseResult<ExprKind> {
        self.expect(&TokenKind::LBrace)?;
        let mut props = vec![];
        while !self.eat(&TokenKind::RBrace)? {
            props.push(self.parse_object_prop()?);
            if !self.at(&TokenKind::RBrace) {
                self.expect(&TokenKind::Comma)?;
            }
        }
        Ok(ExprKind::Object(props))
    }

    fn parse_object_prop(&mut self) -> ParseResult<Prop> {
        let start = self.token.span.start;
        if self.eat(&TokenKind::Ellipsis)? {
            return Ok(Prop::Spread(self.parse_assignment(false)?));
        }

        let modifiers = self.parse_method_modifiers()?;
        let key_is_name = matches!(self.token.kind, TokenKind::Ident(_));
        let key = self.parse_prop_key()?;

        if self.at(&TokenKind::LParen) {
            let kind = modifiers.accessor.unwrap_or(FunctionKind::Method);
            let function =
                self.parse_method(start, kind, modifiers.is_async, modifiers.is_generator, false)?;
            return Ok(Prop::Method { key, function });
        }
        if !modifiers.is_plain() {
            return Err(self.error_at_current("expected `(`"));
        }
        if self.eat(&TokenKind::Colon)? {
            let value = self.parse_assignment(false)?;
            return Ok(Prop::KeyValue { key, value });
        }
        match key {
            PropKey::Ident(ident) if key_is_name => {
                if self.eat(&TokenKind::Eq)? {
                    let default = self.parse_assignment(false)?;
                    return Ok(Prop::CoverInit { ident, default: Box::new(default) });
                }
                Ok(Prop::Shorthand(ident))
            }
            _ => Err(self.error_at_current("expected `:`")),
        }
    }

    /// Property, method or field key.
    pub(super) fn parse_prop_key(&mut self) -> ParseResult<PropKey> {
        let span = self.token.span;
        let key = match &self.token.kind {
            TokenKind::Str(value) => PropKey::Str(value.clone(), span),
            TokenKind::Num(raw) => PropKey::Num(raw.clone(), span),
            TokenKind::PrivateName(name) => PropKey::Private(Ident { name: name.clone(), span }),
            TokenKind::LBracket => {
                self.advance()?;
                let expr = self.parse_assignment(false)?;
                self.expect(&TokenKind::RBracket)?;
                return Ok(PropKey::Computed(Box::new(expr)));
            }
            _ => match self.token.property_name() {
                Some(name) => PropKey::Ident(Ident { name, span }),
                None => return Err(self.error_at_current("expected property key")),
            },
        };
        self.advance()?;
        Ok(key)
    }

    fn to_params(&self, items: Vec<Expr>) -> ParseResult<Vec<Pattern>> {
        items.into_iter().map(|item| self.to_pattern(item)).collect()
    }

    /// Reinterpret an expression parsed under the cover grammar as a pattern.
    pub(super) fn to_pattern(&self, expr: Expr) -> ParseResult<Pattern> {
        let span = expr.span;
        match expr.kind {
            ExprKind::Ident(name) => Ok(Pattern::Ident(Ident { name, span })),
            ExprKind::Member { .. } => Ok(Pattern::Expr(Box::new(expr))),
            ExprKind::Paren(inner)
                if matches!(inner.kind, ExprKind::Ident(_) | ExprKind::Member { .. }) =>
            {
                self.to_pattern(*inner)
            }
            ExprKind::Spread(inner) => {
                Ok(Pattern::Rest { arg: Box::new(self.to_pattern(*inner)?), span })
            }
            ExprKind::Array(elements) => {
                let elements = elements
                    .into_iter()
                    .map(|element| element.map(|element| self.to_pattern(element)).transpose())
                    .collect::<ParseResult<_>>()?;
                Ok(Pattern::Array { elements, span })
            }
            ExprKind::Object(props) => {
                let props = props
                    .into_iter()
                    .map(|prop| self.prop_to_pattern(prop, span))
                    .collect::<ParseResult<_>>()?;
                Ok(Pattern::Object { props, span })
            }
            ExprKind::Assign { op: AssignOp::Assign, target, value } => {
                let target = match target {
                    AssignTarget::Simple(expr) => self.to_pattern(*expr)?,
                    AssignTarget::Pattern(pattern) => pattern,
                };
                Ok(Pattern::Assign { target: Box::new(target), default: value, span })
            }
            _ => Err(self.error_at(span.start, "invalid destructuring target")),
        }
    }

    fn prop_to_pattern(&self, prop: Prop, span: Span) -> ParseResult<ObjectPatternProp> {
        match prop {
            Prop::KeyValue { key, value } => {
                Ok(ObjectPatternProp::Prop { key, value: self.to_pattern(value)?, shorthand: false })
            }
            Prop::Shorthand(ident) => Ok(ObjectPatternProp::Prop {
                key: PropKey::Ident(ident.clone()),
                value: Pattern::Ident(ident),
                shorthand: true,
            }),
            Prop::CoverInit { ident, default } => {
                let span = Span::new(ident.span.start, default.span.end);
                Ok(ObjectPatternProp::Prop {
                    key: PropKey::Ident(ident.clone()),
                    value: Pattern::Assign { target: Box::new(Pattern::Ident(ident)), default, span },
                    shorthand: true,
                })
            }
            Prop::Spread(expr) => Ok(ObjectPatternProp::Rest(self.to_pattern(expr)?)),
            Prop::Method { .. } => Err(self.error_at(span.start, "invalid destructuring target")),
        }
    }

    fn to_assign_target(&self, expr: Expr, op: AssignOp) -> ParseResult<AssignTarget> {
        if matches!(expr.unparen().kind, ExprKind::Ident(_) | ExprKind::Member { .. }) {
            return Ok(AssignTarget::Simple(Box::new(expr)));
        }
        if op == AssignOp::Assign && matches!(expr.kind, ExprKind::Array(_) | ExprKind::Object(_)) {
            return Ok(AssignTarget::Pattern(self.to_pattern(expr)?));
        }
        Err(self.error_at(expr.span.start, "invalid assignment target"))
    }
}

#[cfg(test)]
mod tests {
    use super::super::parse;
    use super::*;

    fn expr(source: &str) -> Expr {
        let program = parse(source).unwrap();
        match program.body.into_iter().next().map(|stmt| stmt.kind) {
            Some(StmtKind::Expr(expr)) => expr,
            other => panic!("expected expression statement, got {other:?}"),
        }
    }

    #[test]
    fn test_binary_precedence() {
        let e = expr("a + b * c ** d ** e");
        let ExprKind::Binary { op: BinaryOp::Add, right, .. } = e.kind else { panic!() };
        let ExprKind::Binary { op: BinaryOp::Mul, right, .. } = right.kind else { panic!() };
        let ExprKind::Binary { op: BinaryOp::Exp, left, right } = right.kind else { panic!() };
        assert_eq!(left.as_ident(), Some("c"));
        assert!(matches!(right.kind, ExprKind::Binary { op: BinaryOp::Exp, .. }));
    }

    #[test]
    fn test_arrow_forms() {
        for source in ["x => x + 1", "(a, b = 2, ...rest) => {}", "async y => y", "async (z) => z", "() => ({})"] {
            let e = expr(source);
            let ExprKind::Arrow(function) = e.kind else { panic!("{source} is not an arrow") };
            assert_eq!(function.kind, FunctionKind::Arrow);
            assert_eq!(e.span.text(source), source);
        }
        let ExprKind::Arrow(function) = expr("({ a, b: [c] }, d = 1) => a").kind else { panic!() };
        let mut names = vec![];
        for param in &function.params {
            param.bound_names(&mut names);
        }
        assert_eq!(names, vec!["a", "c", "d"]);
    }

    #[test]
    fn test_async_call_is_not_arrow() {
        let e = expr("async(1, 2)");
        assert!(matches!(e.kind, ExprKind::Call { .. }));
    }

    #[test]
    fn test_destructuring_assignment() {
        let e = expr("[a, b] = [b, a]");
        let ExprKind::Assign { target: AssignTarget::Pattern(Pattern::Array { elements, .. }), .. } = e.kind
        else {
            panic!("expected array pattern");
        };
        assert_eq!(elements.len(), 2);
        assert!(parse("1 = 2").is_err());
    }

    #[test]
    fn test_regex_and_templates() {
        let e = expr("`a${ {b: 1}.b }c${ `nested${x}` }d`");
        let ExprKind::Template { quasis, exprs } = e.kind else { panic!() };
        assert_eq!(quasis, vec!["a", "c", "d"]);
        assert_eq!(exprs.len(), 2);

        let e = expr("x = /ab+c/gi.test(s)");
        let ExprKind::Assign { value, .. } = e.kind else { panic!() };
        assert!(matches!(value.kind, ExprKind::Call { .. }));
    }

    #[test]
    fn test_optional_chain_and_new() {
        let e = expr("a?.b.c?.(1)");
        assert!(matches!(e.kind, ExprKind::Call { optional: true, .. }));
        let e = expr("new Foo.Bar(1).baz");
        let ExprKind::Member { object, .. } = e.kind else { panic!() };
        assert!(matches!(object.kind, ExprKind::New { .. }));
    }

    #[test]
    fn test_object_literal_props() {
        let e = expr("({ a, b: 1, [c]: 2, get d() { return 1 }, async *e() {}, ...f, 'g': 3 })");
        let ExprKind::Paren(inner) = e.kind else { panic!() };
        let ExprKind::Object(props) = inner.kind else { panic!() };
        assert_eq!(props.len(), 7);
        assert!(matches!(props[0], Prop::Shorthand(_)));
        assert!(matches!(&props[3], Prop::Method { function, .. } if function.kind == FunctionKind::Getter));
    }

    #[test]
    fn test_yield_only_in_generators() {
        assert!(parse("function* g() { const x = yield 1; yield* g(); }").is_ok());
        // Outside generators `yield` is an ordinary identifier.
        assert!(parse("var yield = 1;").is_ok());
    }
}
