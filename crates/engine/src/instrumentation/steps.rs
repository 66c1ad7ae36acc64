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

//! Statement pass: a `step` hook before every statement of every statement
//! list.

use eyre::Result;

use crate::{
    instrumentation::{
        common::{is_internal_stmt, preceding_hooks},
        modification::{InstrumentAction, InstrumentContent, Tier},
        InstrumentPass, PassContext,
    },
    parser::{Function, Stmt, StmtKind, Visitor, VisitorAction},
};

/// Inserts statement step hooks.
#[derive(Debug)]
pub struct StepPass<'a> {
    ctx: &'a PassContext<'a>,
    actions: Vec<InstrumentAction>,
}

impl<'a> InstrumentPass<'a> for StepPass<'a> {
    const NAME: &'static str = "step";

    fn new(ctx: &'a PassContext<'a>) -> Self {
        Self { ctx, actions: vec![] }
    }

    fn into_actions(self) -> Vec<InstrumentAction> {
        self.actions
    }
}

/// Whether `stmts[index]` gets a step hook.
fn is_steppable(stmts: &[Stmt], index: usize) -> bool {
    let stmt = &stmts[index];
    if matches!(stmt.kind, StmtKind::Directive(_) | StmtKind::Empty) || is_internal_stmt(stmt) {
        return false;
    }
    !preceding_hooks(stmts, index).any(|method| method == "step")
}

impl Visitor for StepPass<'_> {
    fn visit_function(&mut self, function: &Function) -> Result<VisitorAction> {
        if self.ctx.scopes.get(function.id).is_none() {
            return Ok(VisitorAction::SkipSubtree);
        }
        Ok(VisitorAction::Continue)
    }

    fn visit_statements(&mut self, stmts: &[Stmt]) -> Result<VisitorAction> {
        for index in 0..stmts.len() {
            if !is_steppable(stmts, index) {
                continue;
            }
            let stmt = &stmts[index];
            let (line, column) = self.ctx.lines.line_col(stmt.span.start);
            let hook = InstrumentContent::StepHook {
                line,
                column,
                snippet: self.ctx.text(stmt.span).to_string(),
                kind: stmt.kind.name(),
            };
            self.actions.push(InstrumentAction::open(stmt.span, Tier::Step, hook));
        }
        Ok(VisitorAction::Continue)
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        config::InstrumentConfig,
        instrumentation::{ScopeTable, SourceModifications},
        parser::{parse, LineIndex, Walk},
    };

    use super::*;

    fn run(source: &str) -> String {
        let program = parse(source).unwrap();
        let lines = LineIndex::new(source);
        let scopes = ScopeTable::analyze(&program, &lines).unwrap();
        let config = InstrumentConfig::default();
        let ctx = PassContext { source, lines, scopes, config: &config };
        let mut pass = StepPass::new(&ctx);
        program.walk(&mut pass).unwrap();
        let mut modifications = SourceModifications::new();
        modifications.extend_modifications(pass.into_actions());
        modifications.modify_source(source)
    }

    #[test]
    fn test_steps_carry_position_and_kind() {
        assert_eq!(
            run("let a = 1;\n  a++;"),
            "__tracer.step(1, 0, \"let a = 1;\", \"VariableDeclaration\"); let a = 1;\n  \
             __tracer.step(2, 2, \"a++;\", \"ExpressionStatement\"); a++;"
        );
    }

    #[test]
    fn test_skips_directives_console_and_empty() {
        assert_eq!(
            run("'use strict';\nconsole.log(1);;"),
            "'use strict';\nconsole.log(1);;"
        );
    }

    #[test]
    fn test_nested_lists_are_stepped() {
        let out = run("function f() {\n  return 1;\n}");
        assert!(out.starts_with("__tracer.step(1, 0, \"function f() {\\n  return 1;\\n}\", \"FunctionDeclaration\"); "));
        assert!(out.contains("{\n  __tracer.step(2, 2, \"return 1;\", \"ReturnStatement\"); return 1;\n}"));
    }

    #[test]
    fn test_already_stepped_statement_is_skipped() {
        let source = "__tracer.step(1, 0, \"a();\", \"ExpressionStatement\"); a();";
        assert_eq!(run(source), source);
    }
}
