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

//! Text of the hooks inserted into instrumented programs.

use itertools::Itertools;

use crate::instrumentation::{
    common::{ERROR_BINDING, INVOCATION_ID, RETURN_LINE, RETURN_VALUE, TRACER},
    modification::LoopBinding,
    scope::FunctionScope,
};

/// Encodes `value` as a JavaScript string literal.
pub fn js_string(value: &str) -> String {
    serde_json::Value::from(value).to_string()
}

/// Encodes `values` as an array of JavaScript string literals.
pub fn js_string_array(values: &[String]) -> String {
    format!("[{}]", values.iter().map(|value| js_string(value)).join(", "))
}

/// Generates a step hook.
pub fn generate_step_hook(line: u32, column: u32, snippet: &str, kind: &str) -> String {
    format!("{TRACER}.step({line}, {column}, {}, {}); ", js_string(snippet), js_string(kind))
}

/// Generates the loop iteration hook, followed by the write of the loop
/// binding when there is one.
pub fn generate_iterate_loop_hook(binding: Option<&LoopBinding>) -> String {
    let mut hook = format!("{TRACER}.iterateLoop(); ");
    if let Some(LoopBinding { frame, name, line }) = binding {
        hook.push_str(&format!("{TRACER}.varWrite({frame}, {}, {name}, {line}); ", js_string(name)));
    }
    hook
}

/// Generates a scope announcement. The global scope has no parent.
pub fn generate_capture_locals(
    scope_id: &str,
    parent_id: Option<&str>,
    params: &[String],
    locals: &[String],
) -> String {
    format!(
        "{TRACER}.captureLocals({}, {}, {}, {}); ",
        js_string(scope_id),
        parent_id.map_or_else(|| "null".to_string(), js_string),
        js_string_array(params),
        js_string_array(locals),
    )
}

/// Generates the announcement of closures created by one statement.
pub fn generate_capture_closures<'a>(scopes: impl IntoIterator<Item = &'a FunctionScope>) -> String {
    scopes
        .into_iter()
        .map(|scope| {
            format!(
                "{TRACER}.captureClosure({TRACER}.nextId(), {}, {}, {}); ",
                js_string(&scope.scope_id),
                js_string(&scope.parent_id),
                js_string_array(&scope.free),
            )
        })
        .collect()
}

/// Generates the function prologue, which opens the `try` closed by
/// [`generate_function_epilogue`].
pub fn generate_function_prologue(scope: &FunctionScope) -> String {
    format!(
        "const {INVOCATION_ID} = {TRACER}.nextId(); let {RETURN_VALUE}, {RETURN_LINE} = null; \
         {TRACER}.enterFunc({INVOCATION_ID}, {}, {}, {}, {}, {}, null, [{}]); try {{ ",
        js_string(&scope.name),
        scope.start_line,
        scope.end_line,
        js_string(&scope.scope_id),
        if scope.binds_this { "this" } else { "undefined" },
        scope.params.join(", "),
    )
}

/// Generates the function epilogue.
pub fn generate_function_epilogue(scope: &FunctionScope) -> String {
    let name = js_string(&scope.name);
    let (start, end) = (scope.start_line, scope.end_line);
    format!(
        " }} catch ({ERROR_BINDING}) {{ {TRACER}.errorFunc(String({ERROR_BINDING}), {INVOCATION_ID}, \
         {name}, {start}, {end}); throw {ERROR_BINDING}; }} finally {{ {TRACER}.exitFunc({INVOCATION_ID}, \
         {name}, {start}, {end}, {}, {RETURN_VALUE}, {RETURN_LINE}); }} ",
        js_string(&scope.scope_id),
    )
}

/// Opening of the return value capture around a returned expression.
///
/// The value sits behind a `0, ` sequence so an anonymous function or class
/// is not named after the capture variable.
pub fn generate_return_capture_open(line: u32) -> String {
    format!("({RETURN_LINE} = {line}, {RETURN_VALUE} = (0, ")
}

/// Closing of [`generate_return_capture_open`].
pub const RETURN_CAPTURE_CLOSE: &str = "))";

/// Return capture appended to a bare `return`.
pub fn generate_bare_return_capture(line: u32) -> String {
    format!(" ({RETURN_LINE} = {line}, {RETURN_VALUE} = undefined)")
}

/// Opening of a variable write hook around the written value.
pub fn generate_var_write_open(frame: &str, name: &str) -> String {
    format!("{TRACER}.varWrite({frame}, {}, ", js_string(name))
}

/// Closing of [`generate_var_write_open`].
pub fn generate_var_write_close(line: u32) -> String {
    format!(", {line})")
}

/// Opening of a postfix update hook; the wrapped expression yields the old value.
pub fn generate_var_update_open(frame: &str, name: &str) -> String {
    format!("{TRACER}.varUpdate({frame}, {}, ", js_string(name))
}

/// Closing of [`generate_var_update_open`], reading the new value back.
pub fn generate_var_update_close(name: &str, line: u32) -> String {
    format!(", {name}, {line})")
}

/// Opening of a read hook.
pub fn generate_var_read_open(name: &str) -> String {
    format!("{TRACER}.varRead({}, ", js_string(name))
}

/// Opening of a call site marker.
pub fn generate_before_call_open(line: u32) -> String {
    format!("({TRACER}.beforeCall({line}), ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_js_string_escapes() {
        assert_eq!(js_string("a \"b\"\n"), r#""a \"b\"\n""#);
        assert_eq!(js_string_array(&["x".into(), "y".into()]), r#"["x", "y"]"#);
        assert_eq!(js_string_array(&[]), "[]");
    }

    #[test]
    fn test_return_capture_hides_anonymous_functions() {
        let captured =
            format!("{}function () {{}}{RETURN_CAPTURE_CLOSE}", generate_return_capture_open(4));
        assert_eq!(captured, "(__returnLine = 4, __returnValue = (0, function () {}))");
    }

    #[test]
    fn test_var_write_hook_leaves_type_to_host() {
        let hook = format!("{}1{}", generate_var_write_open("\"global\"", "a"), generate_var_write_close(3));
        assert_eq!(hook, r#"__tracer.varWrite("global", "a", 1, 3)"#);
    }

    #[test]
    fn test_step_hook() {
        assert_eq!(
            generate_step_hook(3, 2, "let a = 1;", "VariableDeclaration"),
            r#"__tracer.step(3, 2, "let a = 1;", "VariableDeclaration"); "#
        );
    }

    #[test]
    fn test_capture_locals_global_has_null_parent() {
        assert_eq!(
            generate_capture_locals("global", None, &[], &["a".into()]),
            r#"__tracer.captureLocals("global", null, [], ["a"]); "#
        );
    }

    #[test]
    fn test_iterate_loop_with_binding() {
        let binding = LoopBinding { frame: "__invocationId", name: "k".into(), line: 4 };
        assert_eq!(
            generate_iterate_loop_hook(Some(&binding)),
            r#"__tracer.iterateLoop(); __tracer.varWrite(__invocationId, "k", k, 4); "#
        );
    }
}
