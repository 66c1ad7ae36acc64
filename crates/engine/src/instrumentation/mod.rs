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

//! Source instrumentation.
//!
//! A program is parsed once, its function scopes are analyzed, and a fixed
//! sequence of passes records insertions into a [`SourceModifications`]
//! keyed by offsets in the original text. The instrumented program is the
//! original text with every insertion applied, so nothing the passes do not
//! touch is ever re-printed.
//!
//! The passes run in this order:
//!
//! 1. [`loops::LoopPass`]: iteration budget checks and block normalization.
//! 2. [`steps::StepPass`]: a `step` hook before every statement.
//! 3. [`scopes::ScopePass`]: scope announcements, closure captures and concise
//!    arrow normalization.
//! 4. [`variables::VariablePass`]: write and (optionally) read hooks.
//! 5. [`calls::CallPass`]: function prologues/epilogues, return capture and
//!    call site markers.
//!
//! Every pass recognizes what it inserted before, so instrumenting an
//! instrumented program returns it unchanged.

pub mod calls;
pub mod codegen;
pub mod common;
pub mod loops;
pub mod modification;
pub mod scope;
pub mod scopes;
pub mod steps;
pub mod variables;

use thiserror::Error;
use tracing::{debug, warn};

pub use modification::{InstrumentAction, InstrumentContent, SourceModifications, Tier};
pub use scope::{FunctionScope, ScopeTable};

use crate::{
    config::InstrumentConfig,
    parser::{parse, Block, LineIndex, ParseError, Program, Span, StmtKind, Visitor, Walk},
};

/// Errors raised while instrumenting a program.
#[derive(Debug, Error)]
pub enum InstrumentError {
    /// The program does not parse.
    #[error("syntax error: {0}")]
    Parse(#[from] ParseError),
    /// A pass failed.
    #[error("{pass} pass failed: {message}")]
    Pass {
        /// Name of the failing pass.
        pass: &'static str,
        /// What went wrong.
        message: String,
    },
}

impl InstrumentError {
    fn pass(pass: &'static str, err: eyre::Report) -> Self {
        Self::Pass { pass, message: format!("{err:#}") }
    }

    /// Line (1-based) and column (0-based) of the error, when it has a location.
    pub fn location(&self) -> Option<(u32, u32)> {
        match self {
            Self::Parse(err) => Some((err.line, err.column)),
            Self::Pass { .. } => None,
        }
    }
}

/// The result of instrumenting a program.
#[derive(Clone, Debug)]
pub struct InstrumentedProgram {
    /// The instrumented source.
    pub code: String,
    /// Number of instrumented functions.
    pub functions: usize,
    /// Number of insertions applied.
    pub insertions: usize,
}

/// Shared, read-only input of every pass.
#[derive(Debug)]
pub struct PassContext<'a> {
    /// The original source.
    pub source: &'a str,
    /// Line index over `source`.
    pub lines: LineIndex,
    /// Scopes of the instrumented functions.
    pub scopes: ScopeTable,
    /// Instrumentation options.
    pub config: &'a InstrumentConfig,
}

impl PassContext<'_> {
    /// 1-based line of `offset`.
    pub fn line(&self, offset: usize) -> u32 {
        self.lines.line(offset)
    }

    /// Original text covered by `span`.
    pub fn text(&self, span: Span) -> &str {
        span.text(self.source)
    }

    /// The part of a function's block body after its directive prologue,
    /// with the separator required in front of the first insertion there.
    pub fn body_content(&self, block: &Block) -> (Span, &'static str) {
        let end = block.span.end - 1;
        let last_directive = block
            .body
            .iter()
            .take_while(|stmt| matches!(stmt.kind, StmtKind::Directive(_)))
            .last();
        match last_directive {
            Some(directive) => {
                let separator = if self.text(directive.span).ends_with(';') { " " } else { "; " };
                (Span::new(directive.span.end, end), separator)
            }
            None => (Span::new(block.span.start + 1, end), " "),
        }
    }
}

/// A rewrite pass: a visitor collecting insertions.
pub trait InstrumentPass<'a>: Visitor + Sized {
    /// Name used in errors and logs.
    const NAME: &'static str;

    /// Creates the pass.
    fn new(ctx: &'a PassContext<'a>) -> Self;

    /// The insertions collected by the walk.
    fn into_actions(self) -> Vec<InstrumentAction>;
}

fn collect<'a, P: InstrumentPass<'a>>(
    ctx: &'a PassContext<'a>,
    program: &Program,
    modifications: &mut SourceModifications,
) -> Result<(), InstrumentError> {
    let mut pass = P::new(ctx);
    program.walk(&mut pass).map_err(|err| InstrumentError::pass(P::NAME, err))?;
    let actions = pass.into_actions();
    debug!(pass = P::NAME, insertions = actions.len(), "collected modifications");
    modifications.extend_modifications(actions);
    Ok(())
}

/// Stack reserved for the instrumentation worker. Parsing and every pass
/// recurse over the syntax tree, up to [`crate::parser::MAX_NESTING_DEPTH`] levels.
pub const INSTRUMENT_STACK_SIZE: usize = 64 * 1024 * 1024;

/// Instruments `source`.
///
/// The work runs on a dedicated thread with [`INSTRUMENT_STACK_SIZE`] of
/// stack, so deeply nested input fails with a syntax error instead of
/// exhausting the caller's stack.
pub fn instrument(
    source: &str,
    config: &InstrumentConfig,
) -> Result<InstrumentedProgram, InstrumentError> {
    std::thread::scope(|scope| {
        let worker = std::thread::Builder::new()
            .name("storyline-instrument".into())
            .stack_size(INSTRUMENT_STACK_SIZE)
            .spawn_scoped(scope, || instrument_in_place(source, config));
        match worker {
            Ok(handle) => match handle.join() {
                Ok(result) => result,
                Err(panic) => std::panic::resume_unwind(panic),
            },
            Err(err) => {
                warn!(%err, "cannot spawn instrumentation worker, instrumenting in place");
                instrument_in_place(source, config)
            }
        }
    })
}

fn instrument_in_place(
    source: &str,
    config: &InstrumentConfig,
) -> Result<InstrumentedProgram, InstrumentError> {
    let program = parse(source)?;
    let lines = LineIndex::new(source);
    let scopes = ScopeTable::analyze(&program, &lines)
        .map_err(|err| InstrumentError::pass("scope analysis", err))?;
    let ctx = PassContext { source, lines, scopes, config };

    let mut modifications = SourceModifications::new();
    collect::<loops::LoopPass<'_>>(&ctx, &program, &mut modifications)?;
    collect::<steps::StepPass<'_>>(&ctx, &program, &mut modifications)?;
    collect::<scopes::ScopePass<'_>>(&ctx, &program, &mut modifications)?;
    collect::<variables::VariablePass<'_>>(&ctx, &program, &mut modifications)?;
    collect::<calls::CallPass<'_>>(&ctx, &program, &mut modifications)?;

    let code = modifications.modify_source(source);
    debug!(
        functions = ctx.scopes.len(),
        insertions = modifications.len(),
        original = source.len(),
        instrumented = code.len(),
        "instrumented program"
    );
    Ok(InstrumentedProgram { code, functions: ctx.scopes.len(), insertions: modifications.len() })
}

#[cfg(test)]
mod tests {
    use storyline_common::logging::ensure_test_logging;

    use super::*;

    fn instrument_default(source: &str) -> String {
        instrument(source, &InstrumentConfig::default()).unwrap().code
    }

    #[test]
    fn test_global_prologue_and_steps() {
        ensure_test_logging(None);
        let code = instrument_default("let a = 1;\nconsole.log(a);\n");
        assert_eq!(
            code,
            "__tracer.captureLocals(\"global\", null, [], [\"a\"]); __tracer.step(1, 0, \"let a = 1;\", \"VariableDeclaration\"); \
             let a = __tracer.varWrite(\"global\", \"a\", 1, 1);\nconsole.log(a);\n"
        );
    }

    #[test]
    fn test_directive_stays_first() {
        ensure_test_logging(None);
        let code = instrument_default("'use strict'\nx = 1;");
        assert!(code.starts_with("'use strict'; __tracer.captureLocals(\"global\", null, [], []); "));
    }

    #[test]
    fn test_concise_arrow_is_normalized() {
        ensure_test_logging(None);
        let code = instrument_default("const id = (v) => v;");
        let arrow = code.split("=> ").nth(1).unwrap();
        assert!(arrow.starts_with(
            "{ __tracer.captureLocals(\"scope_1\", \"global\", [\"v\"], []); const __invocationId = __tracer.nextId();"
        ));
        assert!(arrow.contains(
            "try { __tracer.step(1, 18, \"v\", \"ReturnStatement\"); return (__returnLine = 1, __returnValue = (0, v)); } catch (__error)"
        ));
        assert!(arrow.ends_with("} }, 1);"));
    }

    #[test]
    fn test_parse_error_has_location() {
        ensure_test_logging(None);
        let err = instrument("let a = ;", &InstrumentConfig::default()).unwrap_err();
        assert!(matches!(err, InstrumentError::Parse(_)));
        assert_eq!(err.location().map(|(line, _)| line), Some(1));
        assert!(err.to_string().starts_with("syntax error"));
    }

    #[test]
    fn test_reinstrumenting_is_identity() {
        ensure_test_logging(None);
        let source = "function fib(n) {\n  if (n < 2) return n;\n  return fib(n - 1) + fib(n - 2);\n}\nfor (let i = 0; i < 3; i++) console.log(fib(i));\n";
        let once = instrument_default(source);
        let twice = instrument_default(&once);
        assert_eq!(once, twice);
    }
}
