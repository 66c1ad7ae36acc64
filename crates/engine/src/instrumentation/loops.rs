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

//! Loop pass: every loop body becomes a block starting with an
//! `iterateLoop` budget check, and `if`/`else` bodies become blocks so
//! their statements can be stepped.

use eyre::Result;

use crate::{
    instrumentation::{
        common::{frame_arg, is_internal, tracer_method},
        modification::{InstrumentAction, InstrumentContent, LoopBinding, Tier},
        InstrumentPass, PassContext,
    },
    parser::{ForHead, Function, Pattern, Span, Stmt, StmtKind, Visitor, VisitorAction},
};

/// Inserts loop iteration hooks.
#[derive(Debug)]
pub struct LoopPass<'a> {
    ctx: &'a PassContext<'a>,
    actions: Vec<InstrumentAction>,
    function_depth: usize,
}

impl<'a> InstrumentPass<'a> for LoopPass<'a> {
    const NAME: &'static str = "loop";

    fn new(ctx: &'a PassContext<'a>) -> Self {
        Self { ctx, actions: vec![], function_depth: 0 }
    }

    fn into_actions(self) -> Vec<InstrumentAction> {
        self.actions
    }
}

/// The single name a `for-in`/`for-of` head assigns, if it is that simple.
fn loop_binding_name(left: &ForHead) -> Option<&str> {
    let pattern = match left {
        ForHead::Var(decl) if decl.declarations.len() == 1 => &decl.declarations[0].target,
        ForHead::Target(pattern) => pattern,
        ForHead::Var(_) => return None,
    };
    match pattern {
        Pattern::Ident(ident) if !is_internal(&ident.name) => Some(&ident.name),
        _ => None,
    }
}

impl LoopPass<'_> {
    fn instrument_loop(&mut self, stmt: &Stmt, body: &Stmt, binding: Option<&str>) {
        let binding = binding.map(|name| LoopBinding {
            frame: frame_arg(self.function_depth > 0),
            name: name.to_string(),
            line: self.ctx.line(stmt.span.start),
        });
        let hook = InstrumentContent::IterateLoopHook { binding };

        match &body.kind {
            StmtKind::Block(block) => {
                let already_checked = block.body.first().is_some_and(|first| {
                    matches!(&first.kind, StmtKind::Expr(expr) if tracer_method(expr) == Some("iterateLoop"))
                });
                if !already_checked {
                    let content = Span::new(block.span.start + 1, block.span.end - 1);
                    self.actions.push(InstrumentAction::open(content, Tier::Loop, hook));
                }
            }
            _ => {
                self.actions.push(InstrumentAction::open(body.span, Tier::Loop, "{ "));
                self.actions.push(InstrumentAction::open(body.span, Tier::Loop, hook));
                self.actions.push(InstrumentAction::close(body.span, Tier::Loop, " }"));
            }
        }
    }

    fn wrap_in_block(&mut self, body: &Stmt) {
        if !matches!(body.kind, StmtKind::Block(_)) {
            self.actions.push(InstrumentAction::open(body.span, Tier::Loop, "{ "));
            self.actions.push(InstrumentAction::close(body.span, Tier::Loop, " }"));
        }
    }
}

impl Visitor for LoopPass<'_> {
    fn visit_function(&mut self, function: &Function) -> Result<VisitorAction> {
        if self.ctx.scopes.get(function.id).is_none() {
            return Ok(VisitorAction::SkipSubtree);
        }
        self.function_depth += 1;
        Ok(VisitorAction::Continue)
    }

    fn post_visit_function(&mut self, function: &Function) -> Result<()> {
        if self.ctx.scopes.get(function.id).is_some() {
            self.function_depth -= 1;
        }
        Ok(())
    }

    fn visit_stmt(&mut self, stmt: &Stmt) -> Result<VisitorAction> {
        match &stmt.kind {
            StmtKind::While { body, .. }
            | StmtKind::DoWhile { body, .. }
            | StmtKind::For { body, .. } => self.instrument_loop(stmt, body, None),
            StmtKind::ForIn { left, body, .. } | StmtKind::ForOf { left, body, .. } => {
                self.instrument_loop(stmt, body, loop_binding_name(left));
            }
            StmtKind::If { consequent, alternate, .. } => {
                self.wrap_in_block(consequent);
                if let Some(alternate) = alternate {
                    self.wrap_in_block(alternate);
                }
            }
            _ => {}
        }
        Ok(VisitorAction::Continue)
    }
}
