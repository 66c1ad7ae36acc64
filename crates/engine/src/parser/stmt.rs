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

//! Statement, declaration, function and class parsing.

use super::{
    ast::*,
    token::{Keyword, TokenKind},
    ParseResult, Parser, Span,
};

impl Parser<'_> {
    /// Parse a directive prologue (`"use strict";` and friends).
    pub(super) fn parse_directives(&mut self) -> ParseResult<Vec<Stmt>> {
        let mut directives = vec![];
        while matches!(self.token.kind, TokenKind::Str(_)) {
            let next = self.peek()?;
            let ends_statement = matches!(
                next.kind,
                TokenKind::Semi | TokenKind::RBrace | TokenKind::Eof
            ) || next.newline_before;
            if !ends_statement {
                break;
            }
            let start = self.token.span.start;
            let raw = self.token.span.text(self.source).to_string();
            self.advance()?;
            self.consume_semicolon()?;
            let id = self.node_id();
            directives.push(Stmt { id, span: self.span_from(start), kind: StmtKind::Directive(raw) });
        }
        Ok(directives)
    }

    fn at_let_declaration(&self) -> ParseResult<bool> {
        if !self.token.is_ident("let") {
            return Ok(false);
        }
        let next = self.peek()?;
        Ok(matches!(next.kind, TokenKind::Ident(_) | TokenKind::LBracket | TokenKind::LBrace))
    }

    fn at_async_function(&self) -> ParseResult<bool> {
        if !self.token.is_ident("async") {
            return Ok(false);
        }
        let next = self.peek()?;
        Ok(next.is_keyword(Keyword::Function) && !next.newline_before)
    }

    /// Parse a statement or a declaration.
    pub(super) fn parse_statement_list_item(&mut self) -> ParseResult<Stmt> {
        let start = self.token.span.start;
        if self.at_keyword(Keyword::Function) || self.at_async_function()? {
            let function = self.parse_function(FunctionKind::Declaration)?;
            let id = self.node_id();
            return Ok(Stmt {
                id,
                span: self.span_from(start),
                kind: StmtKind::Function(Box::new(function)),
            });
        }
        if self.at_keyword(Keyword::Class) {
            let class = self.parse_class(true)?;
            let id = self.node_id();
            return Ok(Stmt { id, span: self.span_from(start), kind: StmtKind::Class(Box::new(class)) });
        }
        if self.at_keyword(Keyword::Const) || self.at_let_declaration()? {
            let decl = self.parse_var_decl(false)?;
            self.consume_semicolon()?;
            let id = self.node_id();
            return Ok(Stmt { id, span: self.span_from(start), kind: StmtKind::Var(decl) });
        }
        if self.at_keyword(Keyword::Import) {
            let next = self.peek()?;
            if !matches!(next.kind, TokenKind::LParen | TokenKind::Dot) {
                return Err(self.error_at(start, "module declarations are not supported"));
            }
        }
        if self.at_keyword(Keyword::Export) {
            return Err(self.error_at(start, "module declarations are not supported"));
        }
        self.parse_statement()
    }

    /// Parse a statement (declarations other than `var` are not allowed here).
    pub(super) fn parse_statement(&mut self) -> ParseResult<Stmt> {
        self.nested(Self::parse_statement_inner)
    }

    fn parse_statement_inner(&mut self) -> ParseResult<Stmt> {
        let start = self.token.span.start;
        let kind = match &self.token.kind {
            TokenKind::LBrace => StmtKind::Block(self.parse_block()?),
            TokenKind::Semi => {
                self.advance()?;
                StmtKind::Empty
            }
            TokenKind::Keyword(kw) => match kw {
                Keyword::Var => {
                    let decl = self.parse_var_decl(false)?;
                    self.consume_semicolon()?;
                    StmtKind::Var(decl)
                }
                Keyword::If => self.parse_if()?,
                Keyword::For => self.parse_for()?,
                Keyword::While => {
                    self.advance()?;
                    let test = self.parse_paren_expression()?;
                    let body = Box::new(self.parse_statement()?);
                    StmtKind::While { test, body }
                }
                Keyword::Do => {
                    self.advance()?;
                    let body = Box::new(self.parse_statement()?);
                    self.expect_keyword(Keyword::While)?;
                    let test = self.parse_paren_expression()?;
                    // A semicolon is always optional after do-while.
                    self.eat(&TokenKind::Semi)?;
                    StmtKind::DoWhile { body, test }
                }
                Keyword::Return => {
                    if !self.context.in_function {
                        return Err(self.error_at(start, "`return` outside of a function"));
                    }
                    self.advance()?;
                    let arg = if self.at_statement_end() {
                        None
                    } else {
                        Some(self.parse_expression(false)?)
                    };
                    self.consume_semicolon()?;
                    StmtKind::Return(arg)
                }
                Keyword::Break | Keyword::Continue => {
                    let is_break = *kw == Keyword::Break;
                    self.advance()?;
                    let label = match &self.token.kind {
                        TokenKind::Ident(_) if !self.token.newline_before => {
                            Some(self.expect_ident()?)
                        }
                        _ => None,
                    };
                    self.consume_semicolon()?;
                    if is_break {
                        StmtKind::Break(label)
                    } else {
                        StmtKind::Continue(label)
                    }
                }
                Keyword::Throw => {
                    self.advance()?;
                    if self.token.newline_before {
                        return Err(self.error_at_current("illegal newline after `throw`"));
                    }
                    let arg = self.parse_expression(false)?;
                    self.consume_semicolon()?;
                    StmtKind::Throw(arg)
                }
                Keyword::Try => self.parse_try()?,
                Keyword::Switch => self.parse_switch()?,
                Keyword::Debugger => {
                    self.advance()?;
                    self.consume_semicolon()?;
                    StmtKind::Debugger
                }
                Keyword::With => {
                    return Err(self.error_at(start, "`with` statements are not supported"));
                }
                Keyword::Function | Keyword::Class | Keyword::Const => {
                    return Err(self.error_at_current("declaration not allowed here"));
                }
                _ => self.parse_expression_statement()?,
            },
            _ => self.parse_expression_statement()?,
        };
        let id = self.node_id();
        Ok(Stmt { id, span: self.span_from(start), kind })
    }

    fn at_statement_end(&self) -> bool {
        matches!(self.token.kind, TokenKind::Semi | TokenKind::RBrace | TokenKind::Eof)
            || self.token.newline_before
    }

    fn parse_expression_statement(&mut self) -> ParseResult<StmtKind> {
        let expr = self.parse_expression(false)?;
        if let ExprKind::Ident(name) = &expr.kind {
            if self.at(&TokenKind::Colon) {
                self.advance()?;
                let label = Ident { name: name.clone(), span: expr.span };
                let body = if self.at_keyword(Keyword::Function) {
                    self.parse_statement_list_item()?
                } else {
                    self.parse_statement()?
                };
                return Ok(StmtKind::Labeled { label, body: Box::new(body) });
            }
        }
        self.consume_semicolon()?;
        Ok(StmtKind::Expr(expr))
    }

    pub(super) fn parse_paren_expression(&mut self) -> ParseResult<Expr> {
        self.expect(&TokenKind::LParen)?;
        let expr = self.parse_expression(false)?;
        self.expect(&TokenKind::RParen)?;
        Ok(expr)
    }

    /// Parse `{ statements }`.
    pub(super) fn parse_block(&mut self) -> ParseResult<Block> {
        let start = self.token.span.start;
        self.expect(&TokenKind::LBrace)?;
        let mut body = vec![];
        while !self.at(&TokenKind::RBrace) {
            if self.token.is_eof() {
                return Err(self.error_at_current("expected `}`"));
            }
            body.push(self.parse_statement_list_item()?);
        }
        self.advance()?;
        Ok(Block { span: self.span_from(start), body })
    }

    fn parse_if(&mut self) -> ParseResult<StmtKind> {
        self.expect_keyword(Keyword::If)?;
        let test = self.parse_paren_expression()?;
        let consequent = Box::new(self.parse_statement()?);
        let alternate = if self.eat_keyword(Keyword::Else)? {
            Some(Box::new(self.parse_statement()?))
        } else {
            None
        };
        Ok(StmtKind::If { test, consequent, alternate })
    }

    fn parse_for(&mut self) -> ParseResult<StmtKind> {
        self.expect_keyword(Keyword::For)?;
        let is_await = if self.token.is_ident("await") {
            self.advance()?;
            true
        } else {
            false
        };
        self.expect(&TokenKind::LParen)?;

        let mut init = None;
        if !self.at(&TokenKind::Semi) {
            if self.at_keyword(Keyword::Var)
                || self.at_keyword(Keyword::Const)
                || self.at_let_declaration()?
            {
                let decl = self.parse_var_decl(true)?;
                if let Some(stmt) = self.parse_for_in_of(ForHead::Var(decl.clone()), is_await)? {
                    return Ok(stmt);
                }
                init = Some(ForInit::Var(decl));
            } else {
                let expr = self.parse_expression(true)?;
                if self.at_keyword(Keyword::In) || self.token.is_ident("of") {
                    let target = self.to_pattern(expr)?;
                    if let Some(stmt) = self.parse_for_in_of(ForHead::Target(target), is_await)? {
                        return Ok(stmt);
                    }
                    return Err(self.error_at_current("malformed for-in/of head"));
                }
                init = Some(ForInit::Expr(expr));
            }
        }
        if is_await {
            return Err(self.error_at_current("`for await` requires an `of` clause"));
        }

        self.expect(&TokenKind::Semi)?;
        let test = if self.at(&TokenKind::Semi) { None } else { Some(self.parse_expression(false)?) };
        self.expect(&TokenKind::Semi)?;
        let update =
            if self.at(&TokenKind::RParen) { None } else { Some(self.parse_expression(false)?) };
        self.expect(&TokenKind::RParen)?;
        let body = Box::new(self.parse_statement()?);
        Ok(StmtKind::For { init, test, update, body })
    }

    fn parse_for_in_of(&mut self, left: ForHead, is_await: bool) -> ParseResult<Option<StmtKind>> {
        if self.eat_keyword(Keyword::In)? {
            let right = self.parse_expression(false)?;
            self.expect(&TokenKind::RParen)?;
            let body = Box::new(self.parse_statement()?);
            return Ok(Some(StmtKind::ForIn { left, right, body }));
        }
        if self.token.is_ident("of") {
            self.advance()?;
            let right = self.parse_assignment(false)?;
            self.expect(&TokenKind::RParen)?;
            let body = Box::new(self.parse_statement()?);
            return Ok(Some(StmtKind::ForOf { left, right, body, is_await }));
        }
        Ok(None)
    }

    fn parse_try(&mut self) -> ParseResult<StmtKind> {
        self.expect_keyword(Keyword::Try)?;
        let block = self.parse_block()?;
        let handler = if self.eat_keyword(Keyword::Catch)? {
            let param = if self.eat(&TokenKind::LParen)? {
                let param = self.parse_binding_target()?;
                self.expect(&TokenKind::RParen)?;
                Some(param)
            } else {
                None
            };
            let body = self.parse_block()?;
            Some(CatchClause { param, body })
        } else {
            None
        };
        let finalizer =
            if self.eat_keyword(Keyword::Finally)? { Some(self.parse_block()?) } else { None };
        if handler.is_none() && finalizer.is_none() {
            return Err(self.error_at_current("expected `catch` or `finally`"));
        }
        Ok(StmtKind::Try { block, handler, finalizer })
    }

    fn parse_switch(&mut self) -> ParseResult<StmtKind> {
        self.expect_keyword(Keyword::Switch)?;
        let discriminant = self.parse_paren_expression()?;
        self.expect(&TokenKind::LBrace)?;
        let mut cases = vec![];
        while !self.eat(&TokenKind::RBrace)? {
            let test = if self.eat_keyword(Keyword::Case)? {
                Some(self.parse_expression(false)?)
            } else {
                self.expect_keyword(Keyword::Default)?;
                None
            };
            self.expect(&TokenKind::Colon)?;
            let mut consequent = vec![];
            while !self.at_keyword(Keyword::Case)
                && !self.at_keyword(Keyword::Default)
                && !self.at(&TokenKind::RBrace)
            {
                if self.token.is_eof() {
                    return Err(self.error_at_current("expected `}`"));
                }
                consequent.push(self.parse_statement_list_item()?);
            }
            cases.push(SwitchCase { test, consequent });
        }
        Ok(StmtKind::Switch { discriminant, cases })
    }

    /// Parse `var`/`let`/`const` declarators (without the trailing semicolon).
    pub(super) fn parse_var_decl(&mut self, no_in: bool) -> ParseResult<VarDecl> {
        let start = self.token.span.start;
        let kind = if self.eat_keyword(Keyword::Var)? {
            VarKind::Var
        } else if self.eat_keyword(Keyword::Const)? {
            VarKind::Const
        } else if self.token.is_ident("let") {
            self.advance()?;
            VarKind::Let
        } else {
            return Err(self.error_at_current("expected declaration"));
        };

        let mut declarations = vec![];
        loop {
            let target = self.parse_binding_target()?;
            let init = if self.eat(&TokenKind::Eq)? {
                Some(self.parse_assignment(no_in)?)
            } else {
                None
            };
            declarations.push(Declarator { target, init });
            if !self.eat(&TokenKind::Comma)? {
                break;
            }
        }
        Ok(VarDecl { kind, declarations, span: self.span_from(start) })
    }

    /// Parse an identifier, array pattern or object pattern.
    pub(super) fn parse_binding_target(&mut self) -> ParseResult<Pattern> {
        self.nested(Self::parse_binding_target_inner)
    }

    fn parse_binding_target_inner(&mut self) -> ParseResult<Pattern> {
        let start = self.token.span.start;
        match &self.token.kind {
            TokenKind::Ident(_) => Ok(Pattern::Ident(self.expect_ident()?)),
            TokenKind::LBracket => {
                self.advance()?;
                let mut elements = vec![];
                while !self.eat(&TokenKind::RBracket)? {
                    if self.eat(&TokenKind::Comma)? {
                        elements.push(None);
                        continue;
                    }
                    if self.at(&TokenKind::Ellipsis) {
                        elements.push(Some(self.parse_rest_element()?));
                    } else {
                        elements.push(Some(self.parse_binding_element()?));
                    }
                    if !self.at(&TokenKind::RBracket) {
                        self.expect(&TokenKind::Comma)?;
                    }
                }
                Ok(Pattern::Array { elements, span: self.span_from(start) })
            }
            TokenKind::LBrace => {
                self.advance()?;
                let mut props = vec![];
                while !self.eat(&TokenKind::RBrace)? {
                    if self.eat(&TokenKind::Ellipsis)? {
                        props.push(ObjectPatternProp::Rest(self.parse_binding_target()?));
                    } else {
                        let key_token = self.token.clone();
                        let key = self.parse_prop_key()?;
                        if self.eat(&TokenKind::Colon)? {
                            let value = self.parse_binding_element()?;
                            props.push(ObjectPatternProp::Prop { key, value, shorthand: false });
                        } else {
                            let PropKey::Ident(ident) = &key else {
                                return Err(self.error_at_current("expected `:`"));
                            };
                            if !matches!(key_token.kind, TokenKind::Ident(_)) {
                                return Err(self.error_at(ident.span.start, "reserved word as binding"));
                            }
                            let mut value = Pattern::Ident(ident.clone());
                            if self.eat(&TokenKind::Eq)? {
                                let default = self.parse_assignment(false)?;
                                let span = Span::new(ident.span.start, default.span.end);
                                value = Pattern::Assign {
                                    target: Box::new(value),
                                    default: Box::new(default),
                                    span,
                                };
                            }
                            props.push(ObjectPatternProp::Prop { key, value, shorthand: true });
                        }
                    }
                    if !self.at(&TokenKind::RBrace) {
                        self.expect(&TokenKind::Comma)?;
                    }
                }
                Ok(Pattern::Object { props, span: self.span_from(start) })
            }
            _ => Err(self.error_at_current("expected binding pattern")),
        }
    }

    /// A binding target with an optional `= default`.
    pub(super) fn parse_binding_element(&mut self) -> ParseResult<Pattern> {
        let start = self.token.span.start;
        let target = self.parse_binding_target()?;
        if self.eat(&TokenKind::Eq)? {
            let default = self.parse_assignment(false)?;
            return Ok(Pattern::Assign {
                target: Box::new(target),
                default: Box::new(default),
                span: self.span_from(start),
            });
        }
        Ok(target)
    }

    fn parse_rest_element(&mut self) -> ParseResult<Pattern> {
        let start = self.token.span.start;
        self.expect(&TokenKind::Ellipsis)?;
        let arg = self.parse_binding_target()?;
        Ok(Pattern::Rest { arg: Box::new(arg), span: self.span_from(start) })
    }

    /// Parse `(params)`.
    fn parse_params(&mut self) -> ParseResult<Vec<Pattern>> {
        self.expect(&TokenKind::LParen)?;
        let mut params = vec![];
        while !self.eat(&TokenKind::RParen)? {
            if self.at(&TokenKind::Ellipsis) {
                params.push(self.parse_rest_element()?);
                self.expect(&TokenKind::RParen)?;
                break;
            }
            params.push(self.parse_binding_element()?);
            if !self.at(&TokenKind::RParen) {
                self.expect(&TokenKind::Comma)?;
            }
        }
        Ok(params)
    }

    /// Parse `{ directives statements }` as a function body.
    pub(super) fn parse_function_body(&mut self) -> ParseResult<Block> {
        self.nested(Self::parse_function_body_inner)
    }

    fn parse_function_body_inner(&mut self) -> ParseResult<Block> {
        let start = self.token.span.start;
        self.expect(&TokenKind::LBrace)?;
        let mut body = self.parse_directives()?;
        while !self.at(&TokenKind::RBrace) {
            if self.token.is_eof() {
                return Err(self.error_at_current("expected `}`"));
            }
            body.push(self.parse_statement_list_item()?);
        }
        self.advance()?;
        Ok(Block { span: self.span_from(start), body })
    }

    /// Parse `[async] function [*] [name] (params) { body }`.
    pub(super) fn parse_function(&mut self, kind: FunctionKind) -> ParseResult<Function> {
        let start = self.token.span.start;
        let is_async = if self.token.is_ident("async") {
            self.advance()?;
            true
        } else {
            false
        };
        self.expect_keyword(Keyword::Function)?;
        let is_generator = self.eat(&TokenKind::Star)?;
        let name = match &self.token.kind {
            TokenKind::Ident(_) => Some(self.expect_ident()?),
            _ if kind == FunctionKind::Declaration => {
                return Err(self.error_at_current("expected function name"));
            }
            _ => None,
        };
        let (params, body) = self.with_context(is_async, is_generator, |p| {
            let params = p.parse_params()?;
            let body = p.parse_function_body()?;
            Ok((params, body))
        })?;
        let id = self.node_id();
        Ok(Function {
            id,
            span: self.span_from(start),
            name,
            kind,
            params,
            body: FunctionBody::Block(body),
            is_async,
            is_generator,
            is_derived_constructor: false,
        })
    }

    /// Parse the parameter list and body of a method whose key is already consumed.
    pub(super) fn parse_method(
        &mut self,
        start: usize,
        kind: FunctionKind,
        is_async: bool,
        is_generator: bool,
        is_derived_constructor: bool,
    ) -> ParseResult<Function> {
        let (params, body) = self.with_context(is_async, is_generator, |p| {
            let params = p.parse_params()?;
            let body = p.parse_function_body()?;
            Ok((params, body))
        })?;
        let id = self.node_id();
        Ok(Function {
            id,
            span: self.span_from(start),
            name: None,
            kind,
            params,
            body: FunctionBody::Block(body),
            is_async,
            is_generator,
            is_derived_constructor,
        })
    }

    /// Parse a class declaration (`name_required`) or expression.
    pub(super) fn parse_class(&mut self, name_required: bool) -> ParseResult<Class> {
        let start = self.token.span.start;
        self.expect_keyword(Keyword::Class)?;
        let name = match &self.token.kind {
            TokenKind::Ident(_) => Some(self.expect_ident()?),
            _ if name_required => return Err(self.error_at_current("expected class name")),
            _ => None,
        };
        let super_class =
            if self.eat_keyword(Keyword::Extends)? { Some(self.parse_lhs()?) } else { None };
        let derived = super_class.is_some();

        self.expect(&TokenKind::LBrace)?;
        let mut members = vec![];
        while !self.eat(&TokenKind::RBrace)? {
            if self.eat(&TokenKind::Semi)? {
                continue;
            }
            if self.token.is_eof() {
                return Err(self.error_at_current("expected `}`"));
            }
            members.push(self.parse_class_member(derived)?);
        }
        let id = self.node_id();
        Ok(Class { id, span: self.span_from(start), name, super_class, members })
    }

    /// Consume `get`/`set`/`async`/`*` prefixes of a method key. A modifier
    /// word directly followed by the end of a key is the key itself and is
    /// left in place.
    pub(super) fn parse_method_modifiers(&mut self) -> ParseResult<MethodModifiers> {
        let mut modifiers = MethodModifiers::default();
        if self.token.is_ident("async") {
            let next = self.peek()?;
            if !next.newline_before && !ends_member_key(&next.kind) {
                self.advance()?;
                modifiers.is_async = true;
            }
        } else if self.token.is_ident("get") || self.token.is_ident("set") {
            let next = self.peek()?;
            if !ends_member_key(&next.kind) {
                modifiers.accessor = Some(if self.token.is_ident("get") {
                    FunctionKind::Getter
                } else {
                    FunctionKind::Setter
                });
                self.advance()?;
                return Ok(modifiers);
            }
        }
        modifiers.is_generator = self.eat(&TokenKind::Star)?;
        Ok(modifiers)
    }

    fn parse_class_member(&mut self, derived: bool) -> ParseResult<ClassMember> {
        let start = self.token.span.start;
        let mut is_static = false;
        if self.token.is_ident("static") {
            let next = self.peek()?;
            if next.kind == TokenKind::LBrace {
                self.advance()?;
                let body = self.with_context(false, false, |p| p.parse_block())?;
                return Ok(ClassMember::StaticBlock(body));
            }
            if !ends_member_key(&next.kind) {
                self.advance()?;
                is_static = true;
            }
        }

        let modifiers = self.parse_method_modifiers()?;
        let key = self.parse_prop_key()?;

        if self.at(&TokenKind::LParen) {
            let is_constructor =
                !is_static && modifiers.is_plain() && key.name().as_deref() == Some("constructor");
            let kind = match modifiers.accessor {
                Some(kind) => kind,
                None if is_constructor => FunctionKind::Constructor,
                None => FunctionKind::Method,
            };
            let function = self.parse_method(
                start,
                kind,
                modifiers.is_async,
                modifiers.is_generator,
                is_constructor && derived,
            )?;
            return Ok(ClassMember::Method { key, function, is_static });
        }

        if !modifiers.is_plain() {
            return Err(self.error_at_current("expected `(`"));
        }
        let value = if self.eat(&TokenKind::Eq)? {
            Some(self.with_context(false, false, |p| p.parse_assignment(false))?)
        } else {
            None
        };
        self.consume_semicolon()?;
        Ok(ClassMember::Field { key, value, is_static })
    }
}

/// Prefixes of a method key.
#[derive(Clone, Copy, Debug, Default)]
pub(super) struct MethodModifiers {
    pub(super) accessor: Option<FunctionKind>,
    pub(super) is_async: bool,
    pub(super) is_generator: bool,
}

impl MethodModifiers {
    pub(super) const fn is_plain(&self) -> bool {
        self.accessor.is_none() && !self.is_async && !self.is_generator
    }
}

fn ends_member_key(kind: &TokenKind) -> bool {
    matches!(
        kind,
        TokenKind::LParen
            | TokenKind::Eq
            | TokenKind::Semi
            | TokenKind::RBrace
            | TokenKind::Comma
            | TokenKind::Colon
    )
}

#[cfg(test)]
mod tests {
    use super::super::parse;
    use super::*;

    fn kinds(source: &str) -> Vec<&'static str> {
        parse(source).unwrap().body.iter().map(|stmt| stmt.kind.name()).collect()
    }

    #[test]
    fn test_statement_kinds() {
        let source = r#""use strict";
var a = 1;
let [b, c] = [2, 3];
const { d, e: f = 4 } = {};
function g(x, ...rest) { return x; }
class H extends Object { constructor() { super(); } static #p = 1; get q() { return 1; } }
if (a) b; else if (c) d; else { e; }
for (let i = 0; i < 3; i++) {}
for (const k in {}) ;
for (const v of []) {}
while (false) {}
do { a++ } while (a < 3)
try { throw 1 } catch (err) {} finally {}
switch (a) { case 1: break; default: a = 2; }
outer: for (;;) { break outer; }
debugger;"#;
        assert_eq!(
            kinds(source),
            vec![
                "Directive",
                "VariableDeclaration",
                "VariableDeclaration",
                "VariableDeclaration",
                "FunctionDeclaration",
                "ClassDeclaration",
                "IfStatement",
                "ForStatement",
                "ForInStatement",
                "ForOfStatement",
                "WhileStatement",
                "DoWhileStatement",
                "TryStatement",
                "SwitchStatement",
                "LabeledStatement",
                "DebuggerStatement",
            ]
        );
    }

    #[test]
    fn test_statement_spans_include_semicolon() {
        let source = "let a = 1;\na = 2\nfoo()";
        let program = parse(source).unwrap();
        let texts: Vec<_> =
            program.body.iter().map(|stmt| stmt.span.text(source)).collect();
        assert_eq!(texts, vec!["let a = 1;", "a = 2", "foo()"]);
    }

    #[test]
    fn test_let_as_identifier() {
        let program = parse("let = 5; let\n").unwrap();
        assert_eq!(program.body.len(), 2);
        assert!(matches!(program.body[0].kind, StmtKind::Expr(_)));
    }

    #[test]
    fn test_class_member_kinds() {
        let program =
            parse("class A extends B { constructor() {} get x() {} static async *y() {} get() {} z = 1 }")
                .unwrap();
        let StmtKind::Class(class) = &program.body[0].kind else { panic!("expected class") };
        let kinds: Vec<_> = class
            .members
            .iter()
            .map(|member| match member {
                ClassMember::Method { function, .. } => format!("{:?}", function.kind),
                ClassMember::Field { .. } => "Field".to_string(),
                ClassMember::StaticBlock(_) => "StaticBlock".to_string(),
            })
            .collect();
        assert_eq!(kinds, vec!["Constructor", "Getter", "Method", "Method", "Field"]);
        let ClassMember::Method { function, .. } = &class.members[0] else { unreachable!() };
        assert!(function.is_derived_constructor);
    }

    #[test]
    fn test_return_outside_function_is_rejected() {
        assert!(parse("return 1;").is_err());
        assert!(parse("function f() { return }").is_ok());
    }

    #[test]
    fn test_for_in_with_expression_target() {
        let program = parse("for (obj.key in source) {}").unwrap();
        let StmtKind::ForIn { left: ForHead::Target(Pattern::Expr(_)), .. } = &program.body[0].kind
        else {
            panic!("expected member target");
        };
    }
}
