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

//! Scope pass: announces every function scope (and the global one) with
//! `captureLocals`, announces closures with `captureClosure` next to the
//! statement that creates them, and turns concise arrow bodies into blocks
//! with an explicit `return`.

use eyre::Result;
use storyline_common::GLOBAL_SCOPE;

use crate::{
    instrumentation::{
        codegen,
        common::{preceding_hooks, tracer_method},
        modification::{InstrumentAction, InstrumentContent, Tier},
        InstrumentPass, PassContext,
    },
    parser::{
        Function, FunctionBody, NodeId, Program, Span, Stmt, StmtKind, Visitor, VisitorAction,
        Walk,
    },
};

/// Where the closures created by one statement are announced.
#[derive(Debug)]
struct CaptureSite {
    span: Span,
    /// Announce before the statement instead of after it.
    before: bool,
    /// Separator needed between the statement and an announcement after it.
    separator: &'static str,
    /// The statement already has its announcement.
    announced: bool,
    closures: Vec<NodeId>,
}

impl CaptureSite {
    fn for_statement(ctx: &PassContext<'_>, stmts: &[Stmt], index: usize) -> Self {
        let stmt = &stmts[index];
        let before = matches!(stmt.kind, StmtKind::Return(_) | StmtKind::Throw(_));
        let announced = if before {
            preceding_hooks(stmts, index).next() == Some("captureClosure")
        } else {
            stmts.get(index + 1).is_some_and(|next| {
                matches!(&next.kind, StmtKind::Expr(expr) if tracer_method(expr) == Some("captureClosure"))
            })
        };
        let needs_terminator = matches!(
            stmt.kind,
            StmtKind::Expr(_)
                | StmtKind::Var(_)
                | StmtKind::DoWhile { .. }
                | StmtKind::Break(_)
                | StmtKind::Continue(_)
                | StmtKind::Debugger
        ) && !ctx.text(stmt.span).ends_with(';');
        Self {
            span: stmt.span,
            before,
            separator: if needs_terminator { "; " } else { " " },
            announced,
            closures: vec![],
        }
    }

    /// The synthetic `return` of a concise arrow body.
    const fn for_concise_body(span: Span) -> Self {
        Self { span, before: true, separator: "", announced: false, closures: vec![] }
    }
}

/// Inserts scope and closure announcements.
#[derive(Debug)]
pub struct ScopePass<'a> {
    ctx: &'a PassContext<'a>,
    actions: Vec<InstrumentAction>,
    sites: Vec<CaptureSite>,
}

impl<'a> InstrumentPass<'a> for ScopePass<'a> {
    const NAME: &'static str = "scope";

    fn new(ctx: &'a PassContext<'a>) -> Self {
        Self { ctx, actions: vec![], sites: vec![] }
    }

    fn into_actions(self) -> Vec<InstrumentAction> {
        self.actions
    }
}

impl ScopePass<'_> {
    fn announce_closures(&mut self, site: CaptureSite) {
        if site.announced || site.closures.is_empty() {
            return;
        }
        let scopes = site
            .closures
            .iter()
            .filter_map(|id| self.ctx.scopes.get(*id))
            .filter(|scope| !scope.free.is_empty());
        let content = codegen::generate_capture_closures(scopes);
        if content.is_empty() {
            return;
        }
        let action = if site.before {
            InstrumentAction::open(site.span, Tier::Closure, content)
        } else {
            InstrumentAction::close(site.span, Tier::Closure, format!("{}{}", site.separator, content.trim_end()))
        };
        self.actions.push(action);
    }

    /// Location of the global announcement and the separator it needs.
    fn global_prologue(&self, program: &Program) -> (usize, &'static str) {
        let source = self.ctx.source;
        let last_directive = program
            .body
            .iter()
            .take_while(|stmt| matches!(stmt.kind, StmtKind::Directive(_)))
            .last();
        if let Some(directive) = last_directive {
            let separator = if self.ctx.text(directive.span).ends_with(';') { " " } else { "; " };
            return (directive.span.end, separator);
        }
        if source.starts_with("#!") {
            return match source.find('\n') {
                Some(newline) => (newline + 1, ""),
                None => (source.len(), "\n"),
            };
        }
        (0, "")
    }
}

impl Visitor for ScopePass<'_> {
    fn visit_program(&mut self, program: &Program) -> Result<VisitorAction> {
        let announced = program.body.iter().any(|stmt| {
            matches!(&stmt.kind, StmtKind::Expr(expr) if tracer_method(expr) == Some("captureLocals"))
        });
        if !announced {
            let (loc, separator) = self.global_prologue(program);
            let announcement = codegen::generate_capture_locals(GLOBAL_SCOPE, None, &[], &self.ctx.scopes.globals);
            self.actions.push(InstrumentAction::open(
                Span::new(loc, self.ctx.source.len()),
                Tier::Scope,
                format!("{separator}{announcement}"),
            ));
        }
        Ok(VisitorAction::Continue)
    }

    fn visit_statements(&mut self, stmts: &[Stmt]) -> Result<VisitorAction> {
        for (index, stmt) in stmts.iter().enumerate() {
            self.sites.push(CaptureSite::for_statement(self.ctx, stmts, index));
            stmt.walk(self)?;
            if let Some(site) = self.sites.pop() {
                self.announce_closures(site);
            }
        }
        Ok(VisitorAction::SkipSubtree)
    }

    fn visit_function(&mut self, function: &Function) -> Result<VisitorAction> {
        let Some(scope) = self.ctx.scopes.get(function.id) else {
            return Ok(VisitorAction::SkipSubtree);
        };
        if let Some(site) = self.sites.last_mut() {
            site.closures.push(function.id);
        }

        match &function.body {
            FunctionBody::Block(block) => {
                let (content, separator) = self.ctx.body_content(block);
                let announcement = codegen::generate_capture_locals(
                    &scope.scope_id,
                    Some(&scope.parent_id),
                    &scope.params,
                    &scope.locals,
                );
                self.actions.push(InstrumentAction::open(
                    content,
                    Tier::Scope,
                    format!("{separator}{announcement}"),
                ));
            }
            FunctionBody::Expr(body) => {
                let span = body.span;
                let (line, column) = self.ctx.lines.line_col(span.start);
                let announcement = codegen::generate_capture_locals(
                    &scope.scope_id,
                    Some(&scope.parent_id),
                    &scope.params,
                    &scope.locals,
                );
                let step = InstrumentContent::StepHook {
                    line,
                    column,
                    snippet: self.ctx.text(span).to_string(),
                    kind: "ReturnStatement",
                };
                self.actions.extend([
                    InstrumentAction::open(span, Tier::Block, "{ "),
                    InstrumentAction::close(span, Tier::Block, "}"),
                    InstrumentAction::open(span, Tier::Scope, announcement),
                    InstrumentAction::open(span, Tier::Step, step),
                    InstrumentAction::open(span, Tier::Return, "return "),
                    InstrumentAction::close(span, Tier::Return, ";"),
                ]);
                self.sites.push(CaptureSite::for_concise_body(span));
            }
        }
        Ok(VisitorAction::Continue)
    }

    fn post_visit_function(&mut self, function: &Function) -> Result<()> {
        if self.ctx.scopes.get(function.id).is_some() && matches!(function.body, FunctionBody::Expr(_)) {
            if let Some(site) = self.sites.pop() {
                self.announce_closures(site);
            }
        }
        Ok(())
    }
}
