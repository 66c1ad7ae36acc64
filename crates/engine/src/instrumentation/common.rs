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

//! Names and shape checks shared by the instrumentation passes.

use std::collections::HashSet;

use once_cell::sync::Lazy;

use crate::parser::{Expr, ExprKind, Function, FunctionBody, MemberProp, Pattern, Stmt, StmtKind};

/// Binding through which instrumented code reaches the runtime tracer.
pub const TRACER: &str = "__tracer";

/// Local holding the id of the current invocation.
pub const INVOCATION_ID: &str = "__invocationId";

/// Local recording the value a function returns.
pub const RETURN_VALUE: &str = "__returnValue";

/// Local recording the line a function returns from.
pub const RETURN_LINE: &str = "__returnLine";

/// Catch binding of the function wrapper.
pub const ERROR_BINDING: &str = "__error";

/// Every bookkeeping name the instrumenter introduces.
pub const INTERNAL_NAMES: &[&str] = &[TRACER, INVOCATION_ID, RETURN_VALUE, RETURN_LINE, ERROR_BINDING];

/// Callees whose calls are never traced.
const UNTRACED_CALLEES: &[&str] = &["console", "fetch"];

/// Host-provided names that are never reported as reads or free variables.
static KNOWN_GLOBALS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "AggregateError",
        "Array",
        "ArrayBuffer",
        "BigInt",
        "BigInt64Array",
        "BigUint64Array",
        "Boolean",
        "DataView",
        "Date",
        "Error",
        "EvalError",
        "Float32Array",
        "Float64Array",
        "Function",
        "Infinity",
        "Int16Array",
        "Int32Array",
        "Int8Array",
        "Intl",
        "JSON",
        "Map",
        "Math",
        "NaN",
        "Number",
        "Object",
        "Promise",
        "Proxy",
        "RangeError",
        "ReferenceError",
        "Reflect",
        "RegExp",
        "Set",
        "String",
        "Symbol",
        "SyntaxError",
        "TextDecoder",
        "TextEncoder",
        "TypeError",
        "URIError",
        "URL",
        "URLSearchParams",
        "Uint16Array",
        "Uint32Array",
        "Uint8Array",
        "Uint8ClampedArray",
        "WeakMap",
        "WeakRef",
        "WeakSet",
        "arguments",
        "clearInterval",
        "clearTimeout",
        "console",
        "decodeURI",
        "decodeURIComponent",
        "encodeURI",
        "encodeURIComponent",
        "eval",
        "fetch",
        "globalThis",
        "isFinite",
        "isNaN",
        "parseFloat",
        "parseInt",
        "queueMicrotask",
        "setInterval",
        "setTimeout",
        "structuredClone",
        "undefined",
    ]
    .into_iter()
    .collect()
});

/// Whether `name` is instrumentation bookkeeping.
pub fn is_internal(name: &str) -> bool {
    INTERNAL_NAMES.contains(&name)
}

/// Whether `name` is a host global.
pub fn is_known_global(name: &str) -> bool {
    KNOWN_GLOBALS.contains(name)
}

/// The method name if `expr` is a `__tracer.<method>(...)` call.
pub fn tracer_method(expr: &Expr) -> Option<&str> {
    let ExprKind::Call { callee, .. } = &expr.unparen().kind else {
        return None;
    };
    let ExprKind::Member { object, property: MemberProp::Ident(method), .. } = &callee.kind else {
        return None;
    };
    (object.as_ident() == Some(TRACER)).then_some(method.name.as_str())
}

/// The identifier at the root of a member/call chain (`a` for `a.b().c`).
pub fn callee_root(expr: &Expr) -> Option<&str> {
    match &expr.unparen().kind {
        ExprKind::Ident(name) => Some(name),
        ExprKind::Member { object, .. } => callee_root(object),
        ExprKind::Call { callee, .. } => callee_root(callee),
        _ => None,
    }
}

/// Whether calls through `callee` are bookkeeping or console/network plumbing.
pub fn is_untraced_callee(callee: &Expr) -> bool {
    callee_root(callee).is_some_and(|root| is_internal(root) || UNTRACED_CALLEES.contains(&root))
}

/// Whether `expr` sits in an optional chain (`a?.b()`, `a?.()`).
pub fn in_optional_chain(expr: &Expr) -> bool {
    match &expr.kind {
        ExprKind::Call { callee, optional, .. } => *optional || in_optional_chain(callee),
        ExprKind::Member { object, optional, .. } => *optional || in_optional_chain(object),
        _ => false,
    }
}

/// Tracer methods called by the run of hook statements directly before
/// `stmts[index]`, nearest first.
pub fn preceding_hooks(stmts: &[Stmt], index: usize) -> impl Iterator<Item = &str> {
    stmts[..index].iter().rev().map_while(|stmt| match &stmt.kind {
        StmtKind::Expr(expr) => tracer_method(expr),
        _ => None,
    })
}

/// Whether a statement is bookkeeping: a call into the tracer, console or
/// fetch, a declaration of internal names only, a rethrow of an internal
/// binding, or the try/catch/finally wrapper of an instrumented function.
pub fn is_internal_stmt(stmt: &Stmt) -> bool {
    match &stmt.kind {
        StmtKind::Expr(expr) => match &expr.unparen().kind {
            ExprKind::Call { callee, .. } => is_untraced_callee(callee),
            _ => false,
        },
        StmtKind::Var(decl) => {
            let mut names = vec![];
            for declarator in &decl.declarations {
                declarator.target.bound_names(&mut names);
            }
            !names.is_empty() && names.iter().all(|name| is_internal(name))
        }
        StmtKind::Throw(expr) => expr.as_ident().is_some_and(is_internal),
        StmtKind::Try { handler: Some(handler), .. } => {
            matches!(&handler.param, Some(Pattern::Ident(ident)) if ident.name == ERROR_BINDING)
        }
        _ => false,
    }
}

/// Whether `function` already announces its scope, i.e. was instrumented
/// before.
pub fn is_instrumented(function: &Function) -> bool {
    let FunctionBody::Block(block) = &function.body else {
        return false;
    };
    block.body.iter().any(|stmt| {
        matches!(&stmt.kind, StmtKind::Expr(expr) if tracer_method(expr) == Some("captureLocals"))
    })
}

/// The frame id argument for writes made at this nesting level.
pub const fn frame_arg(in_function: bool) -> &'static str {
    if in_function {
        INVOCATION_ID
    } else {
        "\"global\""
    }
}
