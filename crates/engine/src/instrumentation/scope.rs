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

//! Scope analysis: assigns every instrumented function a scope id and
//! computes its parameters, locals and free variables.

use std::collections::{HashMap, HashSet};

use eyre::Result;
use storyline_common::GLOBAL_SCOPE;
use tracing::trace;

use crate::{
    instrumentation::common::{is_instrumented, is_internal, is_known_global},
    parser::{
        AssignTarget, Class, ClassMember, Expr, ExprKind, Function, FunctionKind, LineIndex,
        MemberProp, NodeId, Pattern, Program, Prop, Stmt, StmtKind, VarDecl, Visitor,
        VisitorAction, Walk,
    },
};

/// The scope of one instrumented function.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FunctionScope {
    /// Scope id, `scope_<n>` in pre-order.
    pub scope_id: String,
    /// Scope id of the nearest enclosing instrumented function, or `global`.
    pub parent_id: String,
    /// Display name.
    pub name: String,
    /// Names bound by the parameter list, in order.
    pub params: Vec<String>,
    /// Names declared in the body.
    pub locals: Vec<String>,
    /// Names referenced but bound in an enclosing scope, in first-reference order.
    pub free: Vec<String>,
    /// 1-based line where the function starts.
    pub start_line: u32,
    /// 1-based line where the function ends.
    pub end_line: u32,
    /// Whether the function has a `this` binding of its own worth reporting.
    pub binds_this: bool,
}

/// Scopes of all instrumented functions of a program.
#[derive(Clone, Debug, Default)]
pub struct ScopeTable {
    functions: HashMap<NodeId, FunctionScope>,
    /// Names declared at the top level.
    pub globals: Vec<String>,
}

impl ScopeTable {
    /// Analyzes `program`. Functions that already announce their scope are
    /// left out of the table.
    pub fn analyze(program: &Program, lines: &LineIndex) -> Result<Self> {
        let mut analyzer = ScopeAnalyzer::new(lines);
        program.walk(&mut analyzer)?;
        Ok(analyzer.table)
    }

    /// The scope of the function with the given id, if it is instrumented.
    pub fn get(&self, function: NodeId) -> Option<&FunctionScope> {
        self.functions.get(&function)
    }

    /// Number of function scopes.
    pub fn len(&self) -> usize {
        self.functions.len()
    }

    /// Whether no function is instrumented.
    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

#[derive(Debug)]
struct Frame {
    /// `None` for functions that are already instrumented.
    scope_id: Option<String>,
    bound: HashSet<String>,
    params: Vec<String>,
    locals: Vec<String>,
    referenced: Vec<String>,
}

impl Frame {
    fn new(scope_id: Option<String>) -> Self {
        Self { scope_id, bound: HashSet::new(), params: vec![], locals: vec![], referenced: vec![] }
    }
}

fn push_unique(names: &mut Vec<String>, name: &str) {
    if !names.iter().any(|existing| existing == name) {
        names.push(name.to_string());
    }
}

/// The function or class an expression evaluates to, if it is one.
fn nameable(expr: &Expr) -> Option<NodeId> {
    match &expr.unparen().kind {
        ExprKind::Function(function) | ExprKind::Arrow(function) => Some(function.id),
        ExprKind::Class(class) => Some(class.id),
        _ => None,
    }
}

struct ScopeAnalyzer<'a> {
    lines: &'a LineIndex,
    frames: Vec<Frame>,
    /// Inferred names for anonymous functions and classes.
    hints: HashMap<NodeId, String>,
    next_scope: usize,
    table: ScopeTable,
}

impl<'a> ScopeAnalyzer<'a> {
    fn new(lines: &'a LineIndex) -> Self {
        Self { lines, frames: vec![], hints: HashMap::new(), next_scope: 0, table: ScopeTable::default() }
    }

    fn frame(&mut self) -> Option<&mut Frame> {
        self.frames.last_mut()
    }

    fn declare(&mut self, name: &str) {
        if is_internal(name) {
            return;
        }
        if let Some(frame) = self.frame() {
            if !frame.params.iter().any(|param| param == name) {
                push_unique(&mut frame.locals, name);
            }
        }
    }

    fn declare_pattern(&mut self, pattern: &Pattern) {
        let mut names = vec![];
        pattern.bound_names(&mut names);
        for name in names {
            self.declare(&name);
        }
    }

    fn reference(&mut self, name: &str) {
        if let Some(frame) = self.frame() {
            push_unique(&mut frame.referenced, name);
        }
    }

    fn reference_pattern(&mut self, pattern: &Pattern) {
        let mut names = vec![];
        pattern.bound_names(&mut names);
        for name in names {
            self.reference(&name);
        }
    }

    fn hint(&mut self, value: &Expr, name: Option<String>) {
        if let (Some(id), Some(name)) = (nameable(value), name) {
            self.hints.entry(id).or_insert(name);
        }
    }

    fn function_name(&self, function: &Function) -> String {
        function
            .name
            .as_ref()
            .map(|ident| ident.name.clone())
            .or_else(|| self.hints.get(&function.id).cloned())
            .unwrap_or_else(|| "anonymous".to_string())
    }
}

impl Visitor for ScopeAnalyzer<'_> {
    fn visit_program(&mut self, _program: &Program) -> Result<VisitorAction> {
        self.frames.push(Frame::new(Some(GLOBAL_SCOPE.to_string())));
        Ok(VisitorAction::Continue)
    }

    fn post_visit_program(&mut self, _program: &Program) -> Result<()> {
        if let Some(global) = self.frames.pop() {
            self.table.globals = global.locals;
        }
        Ok(())
    }

    fn visit_stmt(&mut self, stmt: &Stmt) -> Result<VisitorAction> {
        match &stmt.kind {
            StmtKind::Function(function) => {
                if let Some(name) = &function.name {
                    self.declare(&name.name);
                }
            }
            StmtKind::Class(class) => {
                if let Some(name) = &class.name {
                    self.declare(&name.name);
                }
            }
            StmtKind::Try { handler: Some(handler), .. } => {
                if let Some(param) = &handler.param {
                    self.declare_pattern(param);
                }
            }
            StmtKind::ForIn { left: crate::parser::ForHead::Target(target), .. }
            | StmtKind::ForOf { left: crate::parser::ForHead::Target(target), .. } => {
                self.reference_pattern(target);
            }
            _ => {}
        }
        Ok(VisitorAction::Continue)
    }

    fn visit_var_decl(&mut self, decl: &VarDecl) -> Result<VisitorAction> {
        for declarator in &decl.declarations {
            self.declare_pattern(&declarator.target);
            if let (Pattern::Ident(ident), Some(init)) = (&declarator.target, &declarator.init) {
                self.hint(init, Some(ident.name.clone()));
            }
        }
        Ok(VisitorAction::Continue)
    }

    fn visit_pattern(&mut self, pattern: &Pattern) -> Result<VisitorAction> {
        if let Pattern::Assign { target, default, .. } = pattern {
            if let Pattern::Ident(ident) = target.as_ref() {
                self.hint(default, Some(ident.name.clone()));
            }
        }
        Ok(VisitorAction::Continue)
    }

    fn visit_class(&mut self, class: &Class) -> Result<VisitorAction> {
        let class_name = class
            .name
            .as_ref()
            .map(|ident| ident.name.clone())
            .or_else(|| self.hints.get(&class.id).cloned());
        for member in &class.members {
            match member {
                ClassMember::Method { key, function, .. } => {
                    let name = if function.kind == FunctionKind::Constructor {
                        class_name.clone().or_else(|| Some("constructor".to_string()))
                    } else {
                        key.name()
                    };
                    if let Some(name) = name {
                        self.hints.entry(function.id).or_insert(name);
                    }
                }
                ClassMember::Field { key, value: Some(value), .. } => self.hint(value, key.name()),
                _ => {}
            }
        }
        Ok(VisitorAction::Continue)
    }

    fn visit_expr(&mut self, expr: &Expr) -> Result<VisitorAction> {
        match &expr.kind {
            ExprKind::Ident(name) => self.reference(name),
            ExprKind::Assign { target: AssignTarget::Pattern(pattern), .. } => {
                self.reference_pattern(pattern);
            }
            ExprKind::Assign { target: AssignTarget::Simple(target), value, .. } => {
                let name = match &target.unparen().kind {
                    ExprKind::Ident(name) => Some(name.clone()),
                    ExprKind::Member { property: MemberProp::Ident(ident), .. } => {
                        Some(ident.name.clone())
                    }
                    _ => None,
                };
                self.hint(value, name);
            }
            ExprKind::Object(props) => {
                for prop in props {
                    match prop {
                        Prop::Shorthand(ident) | Prop::CoverInit { ident, .. } => {
                            self.reference(&ident.name);
                        }
                        Prop::KeyValue { key, value } => self.hint(value, key.name()),
                        Prop::Method { key, function } => {
                            if let Some(name) = key.name() {
                                self.hints.entry(function.id).or_insert(name);
                            }
                        }
                        Prop::Spread(_) => {}
                    }
                }
            }
            _ => {}
        }
        Ok(VisitorAction::Continue)
    }

    fn visit_function(&mut self, function: &Function) -> Result<VisitorAction> {
        if is_instrumented(function) {
            self.frames.push(Frame::new(None));
            return Ok(VisitorAction::SkipSubtree);
        }

        self.next_scope += 1;
        let mut frame = Frame::new(Some(format!("scope_{}", self.next_scope)));
        for param in &function.params {
            let mut names = vec![];
            param.bound_names(&mut names);
            for name in names.iter().filter(|name| !is_internal(name)) {
                push_unique(&mut frame.params, name);
            }
        }
        frame.bound.extend(frame.params.iter().cloned());
        if function.kind == FunctionKind::Expression {
            if let Some(name) = &function.name {
                frame.bound.insert(name.name.clone());
            }
        }
        if function.kind != FunctionKind::Arrow {
            frame.bound.insert("arguments".to_string());
        }
        self.frames.push(frame);
        Ok(VisitorAction::Continue)
    }

    fn post_visit_function(&mut self, function: &Function) -> Result<()> {
        let Some(frame) = self.frames.pop() else {
            return Ok(());
        };
        let Some(scope_id) = frame.scope_id else {
            return Ok(());
        };

        let free = frame
            .referenced
            .into_iter()
            .filter(|name| {
                !frame.bound.contains(name)
                    && !frame.locals.contains(name)
                    && !is_internal(name)
                    && !is_known_global(name)
            })
            .collect::<Vec<_>>();
        // What the function closes over, its parent must reach too.
        for name in &free {
            self.reference(name);
        }

        let parent_id = self
            .frames
            .iter()
            .rev()
            .find_map(|frame| frame.scope_id.clone())
            .unwrap_or_else(|| GLOBAL_SCOPE.to_string());
        let scope = FunctionScope {
            scope_id,
            parent_id,
            name: self.function_name(function),
            params: frame.params,
            locals: frame.locals,
            free,
            start_line: self.lines.line(function.span.start),
            end_line: self.lines.line(function.span.end),
            binds_this: function.kind != FunctionKind::Arrow && !function.is_derived_constructor,
        };
        trace!(scope = %scope.scope_id, name = %scope.name, free = ?scope.free, "analyzed function scope");
        self.table.functions.insert(function.id, scope);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    fn analyze(source: &str) -> (ScopeTable, Vec<FunctionScope>) {
        let program = parse(source).unwrap();
        let table = ScopeTable::analyze(&program, &LineIndex::new(source)).unwrap();
        let mut scopes = table.functions.values().cloned().collect::<Vec<_>>();
        scopes.sort_by_key(|scope| scope.scope_id[6..].parse::<usize>().unwrap());
        (table, scopes)
    }

    #[test]
    fn test_counter_scopes() {
        let source = "function createCounter() {\n  let count = 0;\n  return function () {\n    count++;\n    return count;\n  };\n}\nconst counter = createCounter();\n";
        let (table, scopes) = analyze(source);
        assert_eq!(table.globals, vec!["createCounter", "counter"]);
        assert_eq!(scopes.len(), 2);

        let outer = &scopes[0];
        assert_eq!(outer.scope_id, "scope_1");
        assert_eq!(outer.parent_id, "global");
        assert_eq!(outer.name, "createCounter");
        assert_eq!(outer.locals, vec!["count"]);
        assert!(outer.free.is_empty());
        assert_eq!((outer.start_line, outer.end_line), (1, 7));

        let inner = &scopes[1];
        assert_eq!(inner.parent_id, "scope_1");
        assert_eq!(inner.name, "anonymous");
        assert_eq!(inner.free, vec!["count"]);
    }

    #[test]
    fn test_name_inference() {
        let source = "const add = (a, b) => a + b;\nobj.handler = function () {};\nclass Point extends Base { constructor(x) { super(); this.x = x; } norm() {} }\nconst o = { run() {}, go: () => 1 };";
        let (_, scopes) = analyze(source);
        let names = scopes.iter().map(|scope| scope.name.as_str()).collect::<Vec<_>>();
        assert_eq!(names, vec!["add", "handler", "Point", "norm", "run", "go"]);
        assert!(!scopes[0].binds_this);
        assert!(scopes[1].binds_this);
        assert!(!scopes[2].binds_this);
        assert_eq!(scopes[0].params, vec!["a", "b"]);
    }

    #[test]
    fn test_free_variables_propagate_and_skip_globals() {
        let source = "let total = 0;\nfunction outer(items) {\n  items.forEach((item) => { total += item; console.log(Math.max(item, limit)); });\n}";
        let (_, scopes) = analyze(source);
        assert_eq!(scopes[1].free, vec!["total", "limit"]);
        assert_eq!(scopes[0].free, vec!["total", "limit"]);
        assert_eq!(scopes[0].params, vec!["items"]);
    }

    #[test]
    fn test_destructured_params_and_shorthand() {
        let source = "function f({ a, b: [c] }, ...rest) { return { a, d }; }";
        let (_, scopes) = analyze(source);
        assert_eq!(scopes[0].params, vec!["a", "c", "rest"]);
        assert_eq!(scopes[0].free, vec!["d"]);
    }

    #[test]
    fn test_instrumented_function_is_skipped() {
        let source = "function f() { __tracer.captureLocals(\"scope_1\", \"global\", [], []); }\nfunction g() {}";
        let (table, scopes) = analyze(source);
        assert_eq!(table.len(), 1);
        assert_eq!(scopes[0].name, "g");
        assert_eq!(scopes[0].scope_id, "scope_1");
    }
}
