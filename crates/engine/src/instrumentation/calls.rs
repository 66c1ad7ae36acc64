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

//! Function-call pass: wraps function bodies in the enter/try/catch/finally
//! protocol, records the returned value and line through bookkeeping
//! locals, and marks call sites with `beforeCall`.

use std::collections::HashSet;

use eyre::Result;

use crate::{
    instrumentation::{
        codegen,
        common::{callee_root, in_optional_chain, is_internal, is_untraced_callee, tracer_method, RETURN_LINE},
        modification::{InstrumentAction, Tier},
        InstrumentPass, PassContext,
    },
    parser::{
        AssignTarget, Expr, ExprKind, Function, FunctionBody, NodeId, Span, Stmt, StmtKind,
        Visitor, VisitorAction,
    },
};

/// Inserts function wrappers, return capture and call site markers.
#[derive(Debug)]
pub struct CallPass<'a> {
    ctx: &'a PassContext<'a>,
    actions: Vec<InstrumentAction>,
    /// Calls that already sit behind a `beforeCall` marker.
    marked_calls: HashSet<NodeId>,
}

impl<'a> InstrumentPass<'a> for CallPass<'a> {
    const NAME: &'static str = "call";

    fn new(ctx: &'a PassContext<'a>) -> Self {
        Self { ctx, actions: vec![], marked_calls: HashSet::new() }
    }

    fn into_actions(self) -> Vec<InstrumentAction> {
        self.actions
    }
}

/// Whether a returned expression already records itself.
fn captures_return(expr: &Expr) -> bool {
    let ExprKind::Paren(inner) = &expr.kind else {
        return false;
    };
    let ExprKind::Sequence(exprs) = &inner.kind else {
        return false;
    };
    exprs.first().is_some_and(|first| {
        matches!(
            &first.kind,
            ExprKind::Assign { target: AssignTarget::Simple(target), .. } if target.as_ident() == Some(RETURN_LINE)
        )
    })
}

impl CallPass<'_> {
    fn wrap_return(&mut self, value: &Expr, line: u32) {
        if captures_return(value) {
            return;
        }
        self.actions.push(InstrumentAction::open(value.span, Tier::Return, codegen::generate_return_capture_open(line)));
        self.actions.push(InstrumentAction::close(value.span, Tier::Return, codegen::RETURN_CAPTURE_CLOSE));
    }

    fn mark_call(&mut self, call: &Expr) {
        if self.marked_calls.contains(&call.id) {
            return;
        }
        let line = self.ctx.line(call.span.start);
        self.actions.push(InstrumentAction::open(call.span, Tier::Call, codegen::generate_before_call_open(line)));
        self.actions.push(InstrumentAction::close(call.span, Tier::Call, ")"));
    }
}

impl Visitor for CallPass<'_> {
    fn visit_function(&mut self, function: &Function) -> Result<VisitorAction> {
        let Some(scope) = self.ctx.scopes.get(function.id) else {
            return Ok(VisitorAction::SkipSubtree);
        };
        let prologue = codegen::generate_function_prologue(scope);
        let epilogue = codegen::generate_function_epilogue(scope);
        let span = match &function.body {
            FunctionBody::Block(block) => self.ctx.body_content(block).0,
            FunctionBody::Expr(body) => {
                self.wrap_return(body, self.ctx.line(body.span.start));
                body.span
            }
        };
        self.actions.push(InstrumentAction::open(span, Tier::Function, prologue));
        self.actions.push(InstrumentAction::close(span, Tier::Function, epilogue));
        Ok(VisitorAction::Continue)
    }

    fn visit_stmt(&mut self, stmt: &Stmt) -> Result<VisitorAction> {
        if let StmtKind::Return(value) = &stmt.kind {
            let line = self.ctx.line(stmt.span.start);
            match value {
                Some(value) => self.wrap_return(value, line),
                None => {
                    let keyword = Span::new(stmt.span.start, stmt.span.start + "return".len());
                    self.actions.push(InstrumentAction::close(
                        keyword,
                        Tier::Return,
                        codegen::generate_bare_return_capture(line),
                    ));
                }
            }
        }
        Ok(VisitorAction::Continue)
    }

    fn visit_expr(&mut self, expr: &Expr) -> Result<VisitorAction> {
        match &expr.kind {
            ExprKind::Sequence(exprs) => {
                if let [marker, call, ..] = exprs.as_slice() {
                    if tracer_method(marker) == Some("beforeCall") {
                        self.marked_calls.insert(call.id);
                    }
                }
            }
            ExprKind::Call { callee, .. } => {
                if callee_root(callee).is_some_and(is_internal) {
                    return Ok(VisitorAction::SkipSubtree);
                }
                let is_dynamic_import = matches!(callee.kind, ExprKind::MetaProperty);
                if !is_untraced_callee(callee) && !is_dynamic_import && !in_optional_chain(expr) {
                    self.mark_call(expr);
                }
            }
            ExprKind::New { .. } => self.mark_call(expr),
            _ => {}
        }
        Ok(VisitorAction::Continue)
    }
}
