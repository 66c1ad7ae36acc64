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

//! Variable pass: reports writes to plain identifiers and, when enabled,
//! identifier reads. Every hook returns the value it is handed, so the
//! program computes what it did before.

use eyre::Result;

use crate::{
    instrumentation::{
        codegen,
        common::{callee_root, frame_arg, is_internal, is_known_global, tracer_method},
        modification::{InstrumentAction, Tier},
        InstrumentPass, PassContext,
    },
    parser::{
        AssignOp, AssignTarget, Expr, ExprKind, Function, Pattern, UnaryOp, VarDecl, Visitor,
        VisitorAction, Walk,
    },
};

/// Inserts variable write and read hooks.
#[derive(Debug)]
pub struct VariablePass<'a> {
    ctx: &'a PassContext<'a>,
    actions: Vec<InstrumentAction>,
    function_depth: usize,
}

impl<'a> InstrumentPass<'a> for VariablePass<'a> {
    const NAME: &'static str = "variable";

    fn new(ctx: &'a PassContext<'a>) -> Self {
        Self { ctx, actions: vec![], function_depth: 0 }
    }

    fn into_actions(self) -> Vec<InstrumentAction> {
        self.actions
    }
}

/// The traced identifier `expr` names, if any.
fn traced_ident(expr: &Expr) -> Option<&str> {
    expr.unparen().as_ident().filter(|name| !is_internal(name))
}

impl VariablePass<'_> {
    fn frame(&self) -> &'static str {
        frame_arg(self.function_depth > 0)
    }

    /// Wraps `value` so the write of `name` is reported at `line`.
    fn wrap_write(&mut self, value: &Expr, name: &str, line: u32) {
        if tracer_method(value).is_some() {
            return;
        }
        let open = codegen::generate_var_write_open(self.frame(), name);
        self.actions.push(InstrumentAction::open(value.span, Tier::VarWrite, open));
        self.actions.push(InstrumentAction::close(value.span, Tier::VarWrite, codegen::generate_var_write_close(line)));
    }

    fn wrap_read(&mut self, expr: &Expr, name: &str) {
        if !self.ctx.config.trace_reads || is_known_global(name) {
            return;
        }
        self.actions.push(InstrumentAction::open(expr.span, Tier::Read, codegen::generate_var_read_open(name)));
        self.actions.push(InstrumentAction::close(expr.span, Tier::Read, ")"));
    }

    fn walk_all<'e>(&mut self, exprs: impl IntoIterator<Item = &'e Expr>) -> Result<VisitorAction> {
        for expr in exprs {
            expr.walk(self)?;
        }
        Ok(VisitorAction::SkipSubtree)
    }
}

impl Visitor for VariablePass<'_> {
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

    fn visit_var_decl(&mut self, decl: &VarDecl) -> Result<VisitorAction> {
        for declarator in &decl.declarations {
            if let (Pattern::Ident(ident), Some(init)) = (&declarator.target, &declarator.init) {
                if !is_internal(&ident.name) {
                    let line = self.ctx.line(ident.span.start);
                    self.wrap_write(init, &ident.name, line);
                }
            }
        }
        Ok(VisitorAction::Continue)
    }

    fn visit_expr(&mut self, expr: &Expr) -> Result<VisitorAction> {
        let line = self.ctx.line(expr.span.start);
        match &expr.kind {
            ExprKind::Call { callee, args, .. } => {
                if callee_root(callee).is_some_and(is_internal) {
                    return Ok(VisitorAction::SkipSubtree);
                }
                if callee.unparen().as_ident().is_some() {
                    return self.walk_all(args);
                }
            }
            ExprKind::New { callee, args } if callee.unparen().as_ident().is_some() => {
                return self.walk_all(args);
            }
            ExprKind::TaggedTemplate { tag, exprs } if tag.unparen().as_ident().is_some() => {
                return self.walk_all(exprs);
            }
            ExprKind::Unary { op: UnaryOp::Typeof | UnaryOp::Delete, arg } if arg.unparen().as_ident().is_some() => {
                return Ok(VisitorAction::SkipSubtree);
            }
            ExprKind::Assign { op, target: AssignTarget::Simple(target), value } => {
                if let Some(name) = traced_ident(target) {
                    match op {
                        AssignOp::Assign => self.wrap_write(value, name, line),
                        AssignOp::Compound => self.wrap_write(expr, name, line),
                    }
                    return self.walk_all([value.as_ref()]);
                }
            }
            ExprKind::Update { prefix, arg, .. } => {
                if let Some(name) = traced_ident(arg) {
                    if *prefix {
                        self.wrap_write(expr, name, line);
                    } else {
                        let open = codegen::generate_var_update_open(self.frame(), name);
                        self.actions.push(InstrumentAction::open(expr.span, Tier::VarWrite, open));
                        self.actions.push(InstrumentAction::close(
                            expr.span,
                            Tier::VarWrite,
                            codegen::generate_var_update_close(name, line),
                        ));
                    }
                    return Ok(VisitorAction::SkipSubtree);
                }
            }
            ExprKind::Ident(name) if !is_internal(name) => self.wrap_read(expr, name),
            _ => {}
        }
        Ok(VisitorAction::Continue)
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        config::InstrumentConfig,
        instrumentation::{ScopeTable, SourceModifications},
        parser::{parse, LineIndex},
    };

    use super::*;

    fn run_with(source: &str, trace_reads: bool) -> String {
        let program = parse(source).unwrap();
        let lines = LineIndex::new(source);
        let scopes = ScopeTable::analyze(&program, &lines).unwrap();
        let config = InstrumentConfig { trace_reads };
        let ctx = PassContext { source, lines, scopes, config: &config };
        let mut pass = VariablePass::new(&ctx);
        program.walk(&mut pass).unwrap();
        let mut modifications = SourceModifications::new();
        modifications.extend_modifications(pass.into_actions());
        modifications.modify_source(source)
    }

    fn run(source: &str) -> String {
        run_with(source, false)
    }

    #[test]
    fn test_assignment_wraps_right_hand_side() {
        assert_eq!(run("let a = 1, b;\nb = a + 1;"), "let a = __tracer.varWrite(\"global\", \"a\", 1, 1), b;\nb = __tracer.varWrite(\"global\", \"b\", a + 1, 2);");
    }

    #[test]
    fn test_compound_and_updates() {
        assert_eq!(
            run("function f(x) { x += 2; ++x; x--; o.y = 3; }"),
            "function f(x) { __tracer.varWrite(__invocationId, \"x\", x += 2, 1); \
             __tracer.varWrite(__invocationId, \"x\", ++x, 1); \
             __tracer.varUpdate(__invocationId, \"x\", x--, x, 1); o.y = 3; }"
        );
    }

    #[test]
    fn test_chained_assignment() {
        assert_eq!(
            run("a = b = 1"),
            "a = __tracer.varWrite(\"global\", \"a\", b = __tracer.varWrite(\"global\", \"b\", 1, 1), 1)"
        );
    }

    #[test]
    fn test_reads_only_when_enabled() {
        let source = "let y = x + f(x) + typeof z + Math.PI;";
        assert_eq!(run(source), "let y = __tracer.varWrite(\"global\", \"y\", x + f(x) + typeof z + Math.PI, 1);");
        assert_eq!(
            run_with(source, true),
            "let y = __tracer.varWrite(\"global\", \"y\", __tracer.varRead(\"x\", x) + f(__tracer.varRead(\"x\", x)) + typeof z + Math.PI, 1);"
        );
    }

    #[test]
    fn test_instrumented_code_is_untouched() {
        let source = "let a = __tracer.varWrite(\"global\", \"a\", 1, 1);\n__tracer.varWrite(\"global\", \"a\", a += 1, 2);";
        assert_eq!(run_with(source, true), source);
    }
}
