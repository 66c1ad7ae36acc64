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

//! Pre-order AST traversal.
//!
//! A [`Visitor`] gets a `visit_*` call before a node's children are walked
//! and a `post_visit_*` call after. Returning [`VisitorAction::SkipSubtree`]
//! from a `visit_*` hook suppresses the walk into that node's children (the
//! matching `post_visit_*` hook still runs).
//!
//! Statement lists (program body, block bodies, switch cases) are reported
//! through [`Visitor::visit_statements`]. The non-block body of an `if`,
//! `else` or loop is reported as a one-element list, since instrumentation
//! turns it into a block.

use eyre::Result;

use super::ast::*;

/// What the walker should do after a `visit_*` hook.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VisitorAction {
    /// Walk into the children.
    Continue,
    /// Do not walk into the children.
    SkipSubtree,
}

/// Hooks invoked while walking a syntax tree.
#[allow(unused_variables)]
pub trait Visitor {
    /// Called before walking the program.
    fn visit_program(&mut self, program: &Program) -> Result<VisitorAction> {
        Ok(VisitorAction::Continue)
    }

    /// Called after walking the program.
    fn post_visit_program(&mut self, program: &Program) -> Result<()> {
        Ok(())
    }

    /// Called before walking a statement list.
    fn visit_statements(&mut self, stmts: &[Stmt]) -> Result<VisitorAction> {
        Ok(VisitorAction::Continue)
    }

    /// Called after walking a statement list.
    fn post_visit_statements(&mut self, stmts: &[Stmt]) -> Result<()> {
        Ok(())
    }

    /// Called before walking a statement.
    fn visit_stmt(&mut self, stmt: &Stmt) -> Result<VisitorAction> {
        Ok(VisitorAction::Continue)
    }

    /// Called after walking a statement.
    fn post_visit_stmt(&mut self, stmt: &Stmt) -> Result<()> {
        Ok(())
    }

    /// Called before walking a `var`/`let`/`const` declaration.
    fn visit_var_decl(&mut self, decl: &VarDecl) -> Result<VisitorAction> {
        Ok(VisitorAction::Continue)
    }

    /// Called after walking a `var`/`let`/`const` declaration.
    fn post_visit_var_decl(&mut self, decl: &VarDecl) -> Result<()> {
        Ok(())
    }

    /// Called before walking a function.
    fn visit_function(&mut self, function: &Function) -> Result<VisitorAction> {
        Ok(VisitorAction::Continue)
    }

    /// Called after walking a function.
    fn post_visit_function(&mut self, function: &Function) -> Result<()> {
        Ok(())
    }

    /// Called before walking a class.
    fn visit_class(&mut self, class: &Class) -> Result<VisitorAction> {
        Ok(VisitorAction::Continue)
    }

    /// Called after walking a class.
    fn post_visit_class(&mut self, class: &Class) -> Result<()> {
        Ok(())
    }

    /// Called before walking a binding or assignment pattern.
    fn visit_pattern(&mut self, pattern: &Pattern) -> Result<VisitorAction> {
        Ok(VisitorAction::Continue)
    }

    /// Called after walking a binding or assignment pattern.
    fn post_visit_pattern(&mut self, pattern: &Pattern) -> Result<()> {
        Ok(())
    }

    /// Called before walking an expression.
    fn visit_expr(&mut self, expr: &Expr) -> Result<VisitorAction> {
        Ok(VisitorAction::Continue)
    }

    /// Called after walking an expression.
    fn post_visit_expr(&mut self, expr: &Expr) -> Result<()> {
        Ok(())
    }
}

/// A node that can be walked by a [`Visitor`].
pub trait Walk {
    /// Walk this node and its children.
    fn walk<V: Visitor + ?Sized>(&self, visitor: &mut V) -> Result<()>;
}

/// Walk a statement list.
pub fn walk_statements<V: Visitor + ?Sized>(stmts: &[Stmt], visitor: &mut V) -> Result<()> {
    if visitor.visit_statements(stmts)? == VisitorAction::Continue {
        for stmt in stmts {
            stmt.walk(visitor)?;
        }
    }
    visitor.post_visit_statements(stmts)
}

/// Walk the body of an `if`/`else`/loop.
fn walk_body<V: Visitor + ?Sized>(body: &Stmt, visitor: &mut V) -> Result<()> {
    match &body.kind {
        StmtKind::Block(_) => body.walk(visitor),
        _ => walk_statements(std::slice::from_ref(body), visitor),
    }
}

fn walk_prop_key<V: Visitor + ?Sized>(key: &PropKey, visitor: &mut V) -> Result<()> {
    match key {
        PropKey::Computed(expr) => expr.walk(visitor),
        _ => Ok(()),
    }
}

impl Walk for Program {
    fn walk<V: Visitor + ?Sized>(&self, visitor: &mut V) -> Result<()> {
        if visitor.visit_program(self)? == VisitorAction::Continue {
            walk_statements(&self.body, visitor)?;
        }
        visitor.post_visit_program(self)
    }
}

impl Walk for VarDecl {
    fn walk<V: Visitor + ?Sized>(&self, visitor: &mut V) -> Result<()> {
        if visitor.visit_var_decl(self)? == VisitorAction::Continue {
            for declarator in &self.declarations {
                declarator.target.walk(visitor)?;
                if let Some(init) = &declarator.init {
                    init.walk(visitor)?;
                }
            }
        }
        visitor.post_visit_var_decl(self)
    }
}

impl Walk for Stmt {
    fn walk<V: Visitor + ?Sized>(&self, visitor: &mut V) -> Result<()> {
        if visitor.visit_stmt(self)? == VisitorAction::Continue {
            match &self.kind {
                StmtKind::Expr(expr) | StmtKind::Throw(expr) => expr.walk(visitor)?,
                StmtKind::Directive(_)
                | StmtKind::Empty
                | StmtKind::Break(_)
                | StmtKind::Continue(_)
                | StmtKind::Debugger => {}
                StmtKind::Var(decl) => decl.walk(visitor)?,
                StmtKind::Function(function) => function.walk(visitor)?,
                StmtKind::Class(class) => class.walk(visitor)?,
                StmtKind::Return(arg) => {
                    if let Some(arg) = arg {
                        arg.walk(visitor)?;
                    }
                }
                StmtKind::If { test, consequent, alternate } => {
                    test.walk(visitor)?;
                    walk_body(consequent, visitor)?;
                    if let Some(alternate) = alternate {
                        walk_body(alternate, visitor)?;
                    }
                }
                StmtKind::For { init, test, update, body } => {
                    match init {
                        Some(ForInit::Var(decl)) => decl.walk(visitor)?,
                        Some(ForInit::Expr(expr)) => expr.walk(visitor)?,
                        None => {}
                    }
                    if let Some(test) = test {
                        test.walk(visitor)?;
                    }
                    if let Some(update) = update {
                        update.walk(visitor)?;
                    }
                    walk_body(body, visitor)?;
                }
                StmtKind::ForIn { left, right, body } | StmtKind::ForOf { left, right, body, .. } => {
                    match left {
                        ForHead::Var(decl) => decl.walk(visitor)?,
                        ForHead::Target(pattern) => pattern.walk(visitor)?,
                    }
                    right.walk(visitor)?;
                    walk_body(body, visitor)?;
                }
                StmtKind::While { test, body } => {
                    test.walk(visitor)?;
                    walk_body(body, visitor)?;
                }
                StmtKind::DoWhile { body, test } => {
                    walk_body(body, visitor)?;
                    test.walk(visitor)?;
                }
                StmtKind::Block(block) => walk_statements(&block.body, visitor)?,
                StmtKind::Try { block, handler, finalizer } => {
                    walk_statements(&block.body, visitor)?;
                    if let Some(handler) = handler {
                        if let Some(param) = &handler.param {
                            param.walk(visitor)?;
                        }
                        walk_statements(&handler.body.body, visitor)?;
                    }
                    if let Some(finalizer) = finalizer {
                        walk_statements(&finalizer.body, visitor)?;
                    }
                }
                StmtKind::Switch { discriminant, cases } => {
                    discriminant.walk(visitor)?;
                    for case in cases {
                        if let Some(test) = &case.test {
                            test.walk(visitor)?;
                        }
                        walk_statements(&case.consequent, visitor)?;
                    }
                }
                StmtKind::Labeled { body, .. } => body.walk(visitor)?,
            }
        }
        visitor.post_visit_stmt(self)
    }
}

impl Walk for Function {
    fn walk<V: Visitor + ?Sized>(&self, visitor: &mut V) -> Result<()> {
        if visitor.visit_function(self)? == VisitorAction::Continue {
            for param in &self.params {
                param.walk(visitor)?;
            }
            match &self.body {
                FunctionBody::Block(block) => walk_statements(&block.body, visitor)?,
                FunctionBody::Expr(expr) => expr.walk(visitor)?,
            }
        }
        visitor.post_visit_function(self)
    }
}

impl Walk for Class {
    fn walk<V: Visitor + ?Sized>(&self, visitor: &mut V) -> Result<()> {
        if visitor.visit_class(self)? == VisitorAction::Continue {
            if let Some(super_class) = &self.super_class {
                super_class.walk(visitor)?;
            }
            for member in &self.members {
                match member {
                    ClassMember::Method { key, function, .. } => {
                        walk_prop_key(key, visitor)?;
                        function.walk(visitor)?;
                    }
                    ClassMember::Field { key, value, .. } => {
                        walk_prop_key(key, visitor)?;
                        if let Some(value) = value {
                            value.walk(visitor)?;
                        }
                    }
                    ClassMember::StaticBlock(block) => walk_statements(&block.body, visitor)?,
                }
            }
        }
        visitor.post_visit_class(self)
    }
}

impl Walk for Pattern {
    fn walk<V: Visitor + ?Sized>(&self, visitor: &mut V) -> Result<()> {
        if visitor.visit_pattern(self)? == VisitorAction::Continue {
            match self {
                Self::Ident(_) => {}
                Self::Object { props, .. } => {
                    for prop in props {
                        match prop {
                            ObjectPatternProp::Prop { key, value, .. } => {
                                walk_prop_key(key, visitor)?;
                                value.walk(visitor)?;
                            }
                            ObjectPatternProp::Rest(pattern) => pattern.walk(visitor)?,
                        }
                    }
                }
                Self::Array { elements, .. } => {
                    for element in elements.iter().flatten() {
                        element.walk(visitor)?;
                    }
                }
                Self::Assign { target, default, .. } => {
                    target.walk(visitor)?;
                    default.walk(visitor)?;
                }
                Self::Rest { arg, .. } => arg.walk(visitor)?,
                Self::Expr(expr) => expr.walk(visitor)?,
            }
        }
        visitor.post_visit_pattern(self)
    }
}

impl Walk for Expr {
    fn walk<V: Visitor + ?Sized>(&self, visitor: &mut V) -> Result<()> {
        if visitor.visit_expr(self)? == VisitorAction::Continue {
            match &self.kind {
                ExprKind::Ident(_)
                | ExprKind::This
                | ExprKind::Super
                | ExprKind::Null
                | ExprKind::Bool(_)
                | ExprKind::Num(_)
                | ExprKind::Str(_)
                | ExprKind::Regex(_)
                | ExprKind::MetaProperty => {}
                ExprKind::Template { exprs, .. } | ExprKind::Sequence(exprs) => {
                    for expr in exprs {
                        expr.walk(visitor)?;
                    }
                }
                ExprKind::TaggedTemplate { tag, exprs } => {
                    tag.walk(visitor)?;
                    for expr in exprs {
                        expr.walk(visitor)?;
                    }
                }
                ExprKind::Array(elements) => {
                    for element in elements.iter().flatten() {
                        element.walk(visitor)?;
                    }
                }
                ExprKind::Object(props) => {
                    for prop in props {
                        match prop {
                            Prop::KeyValue { key, value } => {
                                walk_prop_key(key, visitor)?;
                                value.walk(visitor)?;
                            }
                            Prop::Shorthand(_) => {}
                            Prop::CoverInit { default, .. } => default.walk(visitor)?,
                            Prop::Method { key, function } => {
                                walk_prop_key(key, visitor)?;
                                function.walk(visitor)?;
                            }
                            Prop::Spread(expr) => expr.walk(visitor)?,
                        }
                    }
                }
                ExprKind::Function(function) | ExprKind::Arrow(function) => {
                    function.walk(visitor)?
                }
                ExprKind::Class(class) => class.walk(visitor)?,
                ExprKind::Unary { arg, .. }
                | ExprKind::Update { arg, .. }
                | ExprKind::Paren(arg)
                | ExprKind::Spread(arg)
                | ExprKind::Await(arg) => arg.walk(visitor)?,
                ExprKind::Binary { left, right, .. } => {
                    left.walk(visitor)?;
                    right.walk(visitor)?;
                }
                ExprKind::Assign { target, value, .. } => {
                    match target {
                        AssignTarget::Simple(expr) => expr.walk(visitor)?,
                        AssignTarget::Pattern(pattern) => pattern.walk(visitor)?,
                    }
                    value.walk(visitor)?;
                }
                ExprKind::Conditional { test, consequent, alternate } => {
                    test.walk(visitor)?;
                    consequent.walk(visitor)?;
                    alternate.walk(visitor)?;
                }
                ExprKind::Call { callee, args, .. } | ExprKind::New { callee, args } => {
                    callee.walk(visitor)?;
                    for arg in args {
                        arg.walk(visitor)?;
                    }
                }
                ExprKind::Member { object, property, .. } => {
                    object.walk(visitor)?;
                    if let MemberProp::Computed(property) = property {
                        property.walk(visitor)?;
                    }
                }
                ExprKind::Yield { arg, .. } => {
                    if let Some(arg) = arg {
                        arg.walk(visitor)?;
                    }
                }
            }
        }
        visitor.post_visit_expr(self)
    }
}
