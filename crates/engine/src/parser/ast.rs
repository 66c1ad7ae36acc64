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

//! Syntax tree for the script subset the instrumenter works on.
//!
//! Every node keeps the byte span it was parsed from; the instrumenter never
//! re-prints the tree, it only inserts text at span boundaries. Statements,
//! expressions and functions additionally carry a [`NodeId`] that is unique
//! within one parse and is used to key per-node bookkeeping.

use derive_more::Display;

use super::Span;

/// Identity of a node within one parse.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Display)]
pub struct NodeId(pub u32);

/// An identifier occurrence.
#[derive(Clone, Debug, PartialEq)]
pub struct Ident {
    /// The name.
    pub name: String,
    /// Where it occurs.
    pub span: Span,
}

/// A whole script.
#[derive(Clone, Debug, PartialEq)]
pub struct Program {
    /// Top-level statements, directives included.
    pub body: Vec<Stmt>,
    /// Span of the whole source.
    pub span: Span,
}

/// A statement.
#[derive(Clone, Debug, PartialEq)]
pub struct Stmt {
    /// Node identity.
    pub id: NodeId,
    /// Span, including a terminating semicolon when one was written.
    pub span: Span,
    /// What kind of statement this is.
    pub kind: StmtKind,
}

/// Statement kinds.
#[derive(Clone, Debug, PartialEq)]
pub enum StmtKind {
    /// An expression statement.
    Expr(Expr),
    /// A string-literal statement in a directive prologue (e.g. `"use strict"`).
    Directive(String),
    /// `var`, `let` or `const`.
    Var(VarDecl),
    /// A function declaration.
    Function(Box<Function>),
    /// A class declaration.
    Class(Box<Class>),
    /// `return`.
    Return(Option<Expr>),
    /// `if`.
    If {
        /// Condition.
        test: Expr,
        /// Then branch.
        consequent: Box<Stmt>,
        /// Else branch.
        alternate: Option<Box<Stmt>>,
    },
    /// C-style `for`.
    For {
        /// Initializer.
        init: Option<ForInit>,
        /// Condition.
        test: Option<Expr>,
        /// Update.
        update: Option<Expr>,
        /// Body.
        body: Box<Stmt>,
    },
    /// `for (... in ...)`.
    ForIn {
        /// Loop binding.
        left: ForHead,
        /// Enumerated object.
        right: Expr,
        /// Body.
        body: Box<Stmt>,
    },
    /// `for (... of ...)` and `for await (... of ...)`.
    ForOf {
        /// Loop binding.
        left: ForHead,
        /// Iterated value.
        right: Expr,
        /// Body.
        body: Box<Stmt>,
        /// Whether this is `for await`.
        is_await: bool,
    },
    /// `while`.
    While {
        /// Condition.
        test: Expr,
        /// Body.
        body: Box<Stmt>,
    },
    /// `do ... while`.
    DoWhile {
        /// Body.
        body: Box<Stmt>,
        /// Condition.
        test: Expr,
    },
    /// A braced block.
    Block(Block),
    /// `;`
    Empty,
    /// `break`, optionally labeled.
    Break(Option<Ident>),
    /// `continue`, optionally labeled.
    Continue(Option<Ident>),
    /// `throw`.
    Throw(Expr),
    /// `try`.
    Try {
        /// Protected block.
        block: Block,
        /// Catch clause.
        handler: Option<CatchClause>,
        /// Finally block.
        finalizer: Option<Block>,
    },
    /// `switch`.
    Switch {
        /// Switched-on value.
        discriminant: Expr,
        /// Cases, in order.
        cases: Vec<SwitchCase>,
    },
    /// `label: stmt`.
    Labeled {
        /// The label.
        label: Ident,
        /// Labeled statement.
        body: Box<Stmt>,
    },
    /// `debugger`.
    Debugger,
}

impl StmtKind {
    /// The conventional (ESTree) name of the statement kind.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Expr(_) => "ExpressionStatement",
            Self::Directive(_) => "Directive",
            Self::Var(_) => "VariableDeclaration",
            Self::Function(_) => "FunctionDeclaration",
            Self::Class(_) => "ClassDeclaration",
            Self::Return(_) => "ReturnStatement",
            Self::If { .. } => "IfStatement",
            Self::For { .. } => "ForStatement",
            Self::ForIn { .. } => "ForInStatement",
            Self::ForOf { .. } => "ForOfStatement",
            Self::While { .. } => "WhileStatement",
            Self::DoWhile { .. } => "DoWhileStatement",
            Self::Block(_) => "BlockStatement",
            Self::Empty => "EmptyStatement",
            Self::Break(_) => "BreakStatement",
            Self::Continue(_) => "ContinueStatement",
            Self::Throw(_) => "ThrowStatement",
            Self::Try { .. } => "TryStatement",
            Self::Switch { .. } => "SwitchStatement",
            Self::Labeled { .. } => "LabeledStatement",
            Self::Debugger => "DebuggerStatement",
        }
    }
}

/// A braced statement list.
#[derive(Clone, Debug, PartialEq)]
pub struct Block {
    /// Span from `{` to `}` inclusive.
    pub span: Span,
    /// Statements.
    pub body: Vec<Stmt>,
}

/// `catch (param) { ... }`.
#[derive(Clone, Debug, PartialEq)]
pub struct CatchClause {
    /// The bound error, if any.
    pub param: Option<Pattern>,
    /// Handler body.
    pub body: Block,
}

/// One `case`/`default` of a switch.
#[derive(Clone, Debug, PartialEq)]
pub struct SwitchCase {
    /// `None` for `default`.
    pub test: Option<Expr>,
    /// Statements under the label.
    pub consequent: Vec<Stmt>,
}

/// Declaration keyword.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VarKind {
    /// `var`
    Var,
    /// `let`
    Let,
    /// `const`
    Const,
}

/// A `var`/`let`/`const` declaration.
#[derive(Clone, Debug, PartialEq)]
pub struct VarDecl {
    /// Declaration keyword.
    pub kind: VarKind,
    /// Declarators, in order.
    pub declarations: Vec<Declarator>,
    /// Span without a trailing semicolon.
    pub span: Span,
}

/// One `target = init` of a declaration.
#[derive(Clone, Debug, PartialEq)]
pub struct Declarator {
    /// Bound pattern.
    pub target: Pattern,
    /// Initializer.
    pub init: Option<Expr>,
}

/// Initializer of a C-style `for`.
#[derive(Clone, Debug, PartialEq)]
pub enum ForInit {
    /// A declaration.
    Var(VarDecl),
    /// An expression.
    Expr(Expr),
}

/// Left-hand side of `for-in`/`for-of`.
#[derive(Clone, Debug, PartialEq)]
pub enum ForHead {
    /// A declaration without initializer.
    Var(VarDecl),
    /// An assignment target.
    Target(Pattern),
}

/// Syntactic origin of a function.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FunctionKind {
    /// `function f() {}` as a statement.
    Declaration,
    /// `function () {}` in expression position.
    Expression,
    /// `() => ...`
    Arrow,
    /// Object or class method.
    Method,
    /// `get` accessor.
    Getter,
    /// `set` accessor.
    Setter,
    /// Class constructor.
    Constructor,
}

/// Body of a function.
#[derive(Clone, Debug, PartialEq)]
pub enum FunctionBody {
    /// A braced body.
    Block(Block),
    /// The concise body of an arrow function.
    Expr(Box<Expr>),
}

/// Any function-like construct.
#[derive(Clone, Debug, PartialEq)]
pub struct Function {
    /// Node identity.
    pub id: NodeId,
    /// Span of the whole function (for methods, from the key on).
    pub span: Span,
    /// Own name (declarations and named expressions).
    pub name: Option<Ident>,
    /// Syntactic origin.
    pub kind: FunctionKind,
    /// Parameters.
    pub params: Vec<Pattern>,
    /// Body.
    pub body: FunctionBody,
    /// `async`.
    pub is_async: bool,
    /// `function*`.
    pub is_generator: bool,
    /// Constructor of a class with an `extends` clause.
    pub is_derived_constructor: bool,
}

/// A class declaration or expression.
#[derive(Clone, Debug, PartialEq)]
pub struct Class {
    /// Node identity.
    pub id: NodeId,
    /// Span.
    pub span: Span,
    /// Own name.
    pub name: Option<Ident>,
    /// `extends` clause.
    pub super_class: Option<Expr>,
    /// Members, in order.
    pub members: Vec<ClassMember>,
}

/// One member of a class body.
#[derive(Clone, Debug, PartialEq)]
pub enum ClassMember {
    /// Method, accessor or constructor.
    Method {
        /// Member key.
        key: PropKey,
        /// The function.
        function: Function,
        /// `static`.
        is_static: bool,
    },
    /// Field declaration.
    Field {
        /// Member key.
        key: PropKey,
        /// Initializer.
        value: Option<Expr>,
        /// `static`.
        is_static: bool,
    },
    /// `static { ... }`.
    StaticBlock(Block),
}

/// Key of a property, method or field.
#[derive(Clone, Debug, PartialEq)]
pub enum PropKey {
    /// Identifier-like name (reserved words allowed).
    Ident(Ident),
    /// `#name`.
    Private(Ident),
    /// String literal key.
    Str(String, Span),
    /// Numeric literal key.
    Num(String, Span),
    /// `[expr]`.
    Computed(Box<Expr>),
}

impl PropKey {
    /// Static name of the key, if it has one.
    pub fn name(&self) -> Option<String> {
        match self {
            Self::Ident(ident) => Some(ident.name.clone()),
            Self::Private(ident) => Some(format!("#{}", ident.name)),
            Self::Str(value, _) | Self::Num(value, _) => Some(value.clone()),
            Self::Computed(_) => None,
        }
    }
}

/// A binding or assignment pattern.
#[derive(Clone, Debug, PartialEq)]
pub enum Pattern {
    /// A plain name.
    Ident(Ident),
    /// `{ a, b: c, ...rest }`.
    Object {
        /// Properties.
        props: Vec<ObjectPatternProp>,
        /// Span.
        span: Span,
    },
    /// `[a, , b, ...rest]`.
    Array {
        /// Elements, holes as `None`.
        elements: Vec<Option<Pattern>>,
        /// Span.
        span: Span,
    },
    /// `target = default`.
    Assign {
        /// Target.
        target: Box<Pattern>,
        /// Default value.
        default: Box<Expr>,
        /// Span.
        span: Span,
    },
    /// `...target`.
    Rest {
        /// Target.
        arg: Box<Pattern>,
        /// Span.
        span: Span,
    },
    /// A member expression target inside a destructuring assignment.
    Expr(Box<Expr>),
}

/// One property of an object pattern.
#[derive(Clone, Debug, PartialEq)]
pub enum ObjectPatternProp {
    /// `key: value` or shorthand `key`.
    Prop {
        /// Property key.
        key: PropKey,
        /// Bound pattern.
        value: Pattern,
        /// Written as shorthand.
        shorthand: bool,
    },
    /// `...rest`.
    Rest(Pattern),
}

impl Pattern {
    /// Span of the pattern.
    pub fn span(&self) -> Span {
        match self {
            Self::Ident(ident) => ident.span,
            Self::Object { span, .. }
            | Self::Array { span, .. }
            | Self::Assign { span, .. }
            | Self::Rest { span, .. } => *span,
            Self::Expr(expr) => expr.span,
        }
    }

    /// Appends every name this pattern binds, in source order.
    pub fn bound_names(&self, out: &mut Vec<String>) {
        match self {
            Self::Ident(ident) => out.push(ident.name.clone()),
            Self::Object { props, .. } => {
                for prop in props {
                    match prop {
                        ObjectPatternProp::Prop { value, .. } => value.bound_names(out),
                        ObjectPatternProp::Rest(pattern) => pattern.bound_names(out),
                    }
                }
            }
            Self::Array { elements, .. } => {
                for element in elements.iter().flatten() {
                    element.bound_names(out);
                }
            }
            Self::Assign { target, .. } => target.bound_names(out),
            Self::Rest { arg, .. } => arg.bound_names(out),
            Self::Expr(_) => {}
        }
    }

    /// The simple identifier this pattern binds, if it is one.
    pub fn as_ident(&self) -> Option<&Ident> {
        match self {
            Self::Ident(ident) => Some(ident),
            _ => None,
        }
    }
}

/// An expression.
#[derive(Clone, Debug, PartialEq)]
pub struct Expr {
    /// Node identity.
    pub id: NodeId,
    /// Span.
    pub span: Span,
    /// What kind of expression this is.
    pub kind: ExprKind,
}

/// Prefix operators.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnaryOp {
    /// `-`
    Minus,
    /// `+`
    Plus,
    /// `!`
    Not,
    /// `~`
    BitNot,
    /// `typeof`
    Typeof,
    /// `void`
    Void,
    /// `delete`
    Delete,
}

/// Binary and logical operators.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinaryOp {
    /// `??`
    Coalesce,
    /// `||`
    Or,
    /// `&&`
    And,
    /// `|`
    BitOr,
    /// `^`
    BitXor,
    /// `&`
    BitAnd,
    /// `==`
    Eq,
    /// `!=`
    NotEq,
    /// `===`
    StrictEq,
    /// `!==`
    StrictNotEq,
    /// `<`
    Lt,
    /// `>`
    Gt,
    /// `<=`
    LtEq,
    /// `>=`
    GtEq,
    /// `instanceof`
    Instanceof,
    /// `in`
    In,
    /// `<<`
    Shl,
    /// `>>`
    Shr,
    /// `>>>`
    UShr,
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `/`
    Div,
    /// `%`
    Rem,
    /// `**`
    Exp,
}

/// Assignment operators.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AssignOp {
    /// `=`
    Assign,
    /// Any compound operator (`+=`, `&&=`, ...).
    Compound,
}

/// Target of an assignment expression.
#[derive(Clone, Debug, PartialEq)]
pub enum AssignTarget {
    /// An identifier or member expression.
    Simple(Box<Expr>),
    /// A destructuring pattern.
    Pattern(Pattern),
}

/// Property of a member expression.
#[derive(Clone, Debug, PartialEq)]
pub enum MemberProp {
    /// `.name`
    Ident(Ident),
    /// `.#name`
    Private(Ident),
    /// `[expr]`
    Computed(Box<Expr>),
}

/// One entry of an object literal.
#[derive(Clone, Debug, PartialEq)]
pub enum Prop {
    /// `key: value`.
    KeyValue {
        /// Key.
        key: PropKey,
        /// Value.
        value: Expr,
    },
    /// `name`.
    Shorthand(Ident),
    /// `name = default`, only valid once the literal is reinterpreted as a pattern.
    CoverInit {
        /// Bound name.
        ident: Ident,
        /// Default value.
        default: Box<Expr>,
    },
    /// Method or accessor.
    Method {
        /// Key.
        key: PropKey,
        /// The function.
        function: Function,
    },
    /// `...expr`.
    Spread(Expr),
}

/// Expression kinds.
#[derive(Clone, Debug, PartialEq)]
pub enum ExprKind {
    /// Identifier reference.
    Ident(String),
    /// `this`
    This,
    /// `super`
    Super,
    /// `null`
    Null,
    /// `true` / `false`
    Bool(bool),
    /// Numeric literal, raw.
    Num(String),
    /// String literal, cooked.
    Str(String),
    /// Regular expression literal, raw.
    Regex(String),
    /// Template literal.
    Template {
        /// Cooked text chunks.
        quasis: Vec<String>,
        /// Substitutions.
        exprs: Vec<Expr>,
    },
    /// Tagged template.
    TaggedTemplate {
        /// Tag.
        tag: Box<Expr>,
        /// Substitutions.
        exprs: Vec<Expr>,
    },
    /// Array literal, holes as `None`.
    Array(Vec<Option<Expr>>),
    /// Object literal.
    Object(Vec<Prop>),
    /// Function expression.
    Function(Box<Function>),
    /// Arrow function.
    Arrow(Box<Function>),
    /// Class expression.
    Class(Box<Class>),
    /// Prefix operator.
    Unary {
        /// Operator.
        op: UnaryOp,
        /// Operand.
        arg: Box<Expr>,
    },
    /// `++`/`--`.
    Update {
        /// Whether the operator comes first.
        prefix: bool,
        /// `true` for `++`.
        increment: bool,
        /// Operand.
        arg: Box<Expr>,
    },
    /// Binary or logical operator.
    Binary {
        /// Operator.
        op: BinaryOp,
        /// Left operand.
        left: Box<Expr>,
        /// Right operand.
        right: Box<Expr>,
    },
    /// Assignment.
    Assign {
        /// Operator class.
        op: AssignOp,
        /// Target.
        target: AssignTarget,
        /// Assigned value.
        value: Box<Expr>,
    },
    /// `test ? consequent : alternate`.
    Conditional {
        /// Condition.
        test: Box<Expr>,
        /// Value when truthy.
        consequent: Box<Expr>,
        /// Value when falsy.
        alternate: Box<Expr>,
    },
    /// Call.
    Call {
        /// Callee.
        callee: Box<Expr>,
        /// Arguments (spread as [`ExprKind::Spread`]).
        args: Vec<Expr>,
        /// Written as `callee?.()`.
        optional: bool,
    },
    /// `new`.
    New {
        /// Constructor.
        callee: Box<Expr>,
        /// Arguments.
        args: Vec<Expr>,
    },
    /// Property access.
    Member {
        /// Object.
        object: Box<Expr>,
        /// Property.
        property: MemberProp,
        /// Written with `?.`.
        optional: bool,
    },
    /// Comma expression.
    Sequence(Vec<Expr>),
    /// Parenthesized expression.
    Paren(Box<Expr>),
    /// `...expr` in arguments or array literals.
    Spread(Box<Expr>),
    /// `yield` / `yield*`.
    Yield {
        /// Operand.
        arg: Option<Box<Expr>>,
        /// `yield*`.
        delegate: bool,
    },
    /// `await`.
    Await(Box<Expr>),
    /// `new.target` or `import.meta`.
    MetaProperty,
}

impl Expr {
    /// The identifier name, if this is an identifier reference.
    pub fn as_ident(&self) -> Option<&str> {
        match &self.kind {
            ExprKind::Ident(name) => Some(name),
            _ => None,
        }
    }

    /// Strips any number of enclosing parentheses.
    pub fn unparen(&self) -> &Self {
        match &self.kind {
            ExprKind::Paren(inner) => inner.unparen(),
            _ => self,
        }
    }
}
