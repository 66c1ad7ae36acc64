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

use std::{cmp::Ordering, collections::BTreeMap, fmt::Display};

use crate::{instrumentation::codegen, parser::Span};

/// Nesting rank of an insertion among insertions that share a location and
/// a span. Lower tiers wrap higher ones.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Tier {
    /// Braces turning a single statement or concise body into a block.
    Block,
    /// `captureLocals` announcements.
    Scope,
    /// Function prologue and epilogue.
    Function,
    /// Loop iteration hooks and branch blocks.
    Loop,
    /// Statement step hooks.
    Step,
    /// Closure captures.
    Closure,
    /// Return value capture.
    Return,
    /// Variable write hooks.
    VarWrite,
    /// `beforeCall` wrappers.
    Call,
    /// Variable read hooks.
    Read,
}

/// Which end of its span an insertion belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Side {
    /// Inserted at the start of the span, opening it.
    Open,
    /// Inserted at the end of the span, closing it.
    Close,
}

/// The collections of modifications on a source text.
#[derive(Debug, Default)]
pub struct SourceModifications {
    /// The modifications on the source. The key is the location of the
    /// modification in the original source code.
    modifications: BTreeMap<usize, Vec<InstrumentAction>>,
    next_seq: u64,
}

impl SourceModifications {
    /// Creates an empty set of modifications.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a modification. Insertions at the same location are merged by
    /// [`SourceModifications::modify_source`] so that every opening text
    /// nests inside the closing text of spans that end there.
    pub fn add_modification(&mut self, mut modification: InstrumentAction) {
        modification.seq = self.next_seq;
        self.next_seq += 1;
        self.modifications.entry(modification.loc).or_default().push(modification);
    }

    /// Extends the modifications with the given modifications.
    pub fn extend_modifications(&mut self, modifications: impl IntoIterator<Item = InstrumentAction>) {
        for modification in modifications {
            self.add_modification(modification);
        }
    }

    /// Number of insertions recorded.
    pub fn len(&self) -> usize {
        self.modifications.values().map(Vec::len).sum()
    }

    /// Whether no insertion has been recorded.
    pub fn is_empty(&self) -> bool {
        self.modifications.is_empty()
    }

    /// Modifies the source code with the modifications.
    pub fn modify_source(&self, source: &str) -> String {
        let mut modified_source = source.to_string();
        // Apply the modifications in reverse order to avoid index shifting
        for (loc, actions) in self.modifications.iter().rev() {
            let mut actions = actions.iter().collect::<Vec<_>>();
            actions.sort_by(|a, b| a.cmp_at_location(b));
            let content = actions.iter().map(|action| action.content.to_string()).collect::<String>();
            modified_source.insert_str(*loc, &content);
        }
        modified_source
    }
}

/// An action to instrument the source.
#[derive(Debug, Clone)]
pub struct InstrumentAction {
    /// The offset in the original source at which the content is inserted.
    pub loc: usize,
    /// The code to instrument.
    pub content: InstrumentContent,
    /// Whether the content opens or closes `span`.
    pub side: Side,
    /// The original source range the insertion wraps or precedes.
    pub span: Span,
    /// Nesting rank among insertions with the same span.
    pub tier: Tier,
    seq: u64,
}

impl InstrumentAction {
    /// An insertion at the start of `span`.
    pub fn open(span: Span, tier: Tier, content: impl Into<InstrumentContent>) -> Self {
        Self { loc: span.start, content: content.into(), side: Side::Open, span, tier, seq: 0 }
    }

    /// An insertion at the end of `span`.
    pub fn close(span: Span, tier: Tier, content: impl Into<InstrumentContent>) -> Self {
        Self { loc: span.end, content: content.into(), side: Side::Close, span, tier, seq: 0 }
    }

    /// Rank of the action among all actions at its location: closings of
    /// non-empty spans, then openings of empty spans, then closings of empty
    /// spans, then openings of non-empty spans.
    const fn group(&self) -> u8 {
        match (self.side, self.span.is_empty()) {
            (Side::Close, false) => 0,
            (Side::Open, true) => 1,
            (Side::Close, true) => 2,
            (Side::Open, false) => 3,
        }
    }

    fn cmp_at_location(&self, other: &Self) -> Ordering {
        self.group().cmp(&other.group()).then_with(|| match self.group() {
            // Inner spans close first; among equal spans the later (inner) tier closes first.
            0 => self
                .span
                .len()
                .cmp(&other.span.len())
                .then_with(|| other.tier.cmp(&self.tier))
                .then_with(|| other.seq.cmp(&self.seq)),
            1 => self.tier.cmp(&other.tier).then_with(|| self.seq.cmp(&other.seq)),
            2 => other.tier.cmp(&self.tier).then_with(|| other.seq.cmp(&self.seq)),
            _ => other
                .span
                .len()
                .cmp(&self.span.len())
                .then_with(|| self.tier.cmp(&other.tier))
                .then_with(|| self.seq.cmp(&other.seq)),
        })
    }
}

/// The content to instrument.
#[derive(Debug, Clone)]
pub enum InstrumentContent {
    /// Code inserted as is.
    Plain(String),
    /// A `step` hook announcing the statement about to run.
    StepHook {
        /// 1-based line of the statement.
        line: u32,
        /// 0-based column of the statement.
        column: u32,
        /// Original text of the statement.
        snippet: String,
        /// Statement kind name.
        kind: &'static str,
    },
    /// An `iterateLoop` hook, optionally followed by the write of a
    /// `for-in`/`for-of` binding.
    IterateLoopHook {
        /// The loop binding written at the start of each iteration.
        binding: Option<LoopBinding>,
    },
}

/// The variable a `for-in`/`for-of` loop assigns on every iteration.
#[derive(Debug, Clone)]
pub struct LoopBinding {
    /// Frame id argument.
    pub frame: &'static str,
    /// Bound name.
    pub name: String,
    /// Line of the loop head.
    pub line: u32,
}

impl From<String> for InstrumentContent {
    fn from(content: String) -> Self {
        Self::Plain(content)
    }
}

impl From<&str> for InstrumentContent {
    fn from(content: &str) -> Self {
        Self::Plain(content.to_string())
    }
}

impl Display for InstrumentContent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Plain(content) => write!(f, "{content}"),
            Self::StepHook { line, column, snippet, kind } => {
                write!(f, "{}", codegen::generate_step_hook(*line, *column, snippet, kind))
            }
            Self::IterateLoopHook { binding } => {
                write!(f, "{}", codegen::generate_iterate_loop_hook(binding.as_ref()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nested_spans_at_same_location() {
        // `f(x)` gets a call wrapper over [0, 4) and a read wrapper over [2, 3).
        let source = "f(x)";
        let mut modifications = SourceModifications::new();
        modifications.add_modification(InstrumentAction::open(Span::new(0, 4), Tier::Call, "C("));
        modifications.add_modification(InstrumentAction::close(Span::new(0, 4), Tier::Call, ")"));
        modifications.add_modification(InstrumentAction::open(Span::new(2, 3), Tier::Read, "R("));
        modifications.add_modification(InstrumentAction::close(Span::new(2, 3), Tier::Read, ")"));
        assert_eq!(modifications.modify_source(source), "C(f(R(x)))");
        assert_eq!(modifications.len(), 4);
    }

    #[test]
    fn test_same_span_orders_by_tier() {
        let source = "a = b";
        let span = Span::new(4, 5);
        let mut modifications = SourceModifications::new();
        modifications.add_modification(InstrumentAction::open(span, Tier::Read, "R("));
        modifications.add_modification(InstrumentAction::close(span, Tier::Read, ")"));
        modifications.add_modification(InstrumentAction::open(span, Tier::VarWrite, "W("));
        modifications.add_modification(InstrumentAction::close(span, Tier::VarWrite, ")"));
        assert_eq!(modifications.modify_source(source), "a = W(R(b))");
    }

    #[test]
    fn test_closing_before_opening() {
        let source = "a;b;";
        let mut modifications = SourceModifications::new();
        modifications.add_modification(InstrumentAction::open(Span::new(2, 4), Tier::Step, "<step>"));
        modifications.add_modification(InstrumentAction::close(Span::new(0, 2), Tier::Closure, "<capture>"));
        assert_eq!(modifications.modify_source(source), "a;<capture><step>b;");
    }

    #[test]
    fn test_empty_span_pairs() {
        let source = "{}";
        let span = Span::new(1, 1);
        let mut modifications = SourceModifications::new();
        modifications.add_modification(InstrumentAction::open(span, Tier::Scope, "S"));
        modifications.add_modification(InstrumentAction::open(span, Tier::Function, "F{"));
        modifications.add_modification(InstrumentAction::close(span, Tier::Function, "}F"));
        assert_eq!(modifications.modify_source(source), "{SF{}F}");
    }
}
