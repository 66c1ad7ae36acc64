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

//! Story events: the presentation-ready sequence derived from raw events.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{FrameId, InvocationId, LexicalId, TracedValue};

/// Kind of a lexical scope.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScopeKind {
    /// The top-level program scope.
    Global,
    /// A function body that nothing closes over (yet).
    Function,
    /// A function body kept alive by a closure.
    Closure,
}

/// How a displayed variable is bound, relative to the scope it is shown in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BindingType {
    /// Declared in the global scope.
    Global,
    /// Declared in the displayed scope itself.
    Local,
    /// Declared in a persistent (closed-over) ancestor.
    Closure,
    /// Declared in an ancestor that nothing closes over.
    AncestorNonPersistent,
    /// No declaring scope found.
    Unknown,
}

/// One variable of a [`ScopeView`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariableView {
    /// Variable name.
    pub name: String,
    /// Latest known value.
    #[serde(flatten)]
    pub value: TracedValue,
    /// Binding classification.
    pub binding_type: BindingType,
}

/// Display copy of a lexical scope at one step.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopeView {
    /// Lexical id.
    pub lexical_id: LexicalId,
    /// Scope kind.
    pub kind: ScopeKind,
    /// Display name (function name, or `global`).
    pub name: String,
    /// Defining scope.
    pub parent_id: Option<LexicalId>,
    /// Scope this function closes over, when known.
    pub closure_scope_id: Option<LexicalId>,
    /// The `this` binding of the most recent activation.
    pub this_binding: Option<TracedValue>,
    /// Whether something closes over this scope.
    pub is_persistent: bool,
    /// Variables, sorted by name.
    pub variables: Vec<VariableView>,
}

/// Console stream of a [`StoryEvent::Console`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsoleLevel {
    /// `console.log`
    Log,
    /// `console.warn`
    Warn,
    /// `console.error`
    Error,
}

/// Payload of [`StoryEvent::StepLine`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepLine {
    /// 1-based line.
    pub line: u32,
    /// 0-based column.
    pub col: u32,
    /// Statement source text.
    pub snippet: String,
    /// Statement kind.
    pub statement_kind: Option<String>,
    /// Visible scopes, global first.
    pub scopes: Vec<ScopeView>,
    /// Heap snapshot.
    pub heap: BTreeMap<String, Value>,
    /// Live call stack, outermost first.
    pub call_stack: Vec<FrameId>,
}

/// Payload of [`StoryEvent::Call`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallStory {
    /// Function name.
    pub name: String,
    /// Argument values.
    pub args: Vec<TracedValue>,
    /// Line of the call site.
    pub call_site_line: Option<u32>,
    /// The new activation.
    pub invocation_id: InvocationId,
    /// Lexical scope the function closes over, if any.
    pub closure_parent_id: Option<LexicalId>,
    /// The `this` binding.
    pub this_binding: Option<TracedValue>,
}

/// Payload of [`StoryEvent::Return`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReturnStory {
    /// Function name.
    pub name: String,
    /// Returned value.
    pub return_value: TracedValue,
    /// Line of the `return` taken.
    pub return_line: Option<u32>,
    /// The finishing activation.
    pub invocation_id: InvocationId,
}

/// Payload of [`StoryEvent::Assign`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignStory {
    /// Variable name.
    pub name: String,
    /// New value.
    #[serde(flatten)]
    pub value: TracedValue,
    /// The writing activation (invocation-scoped, not lexical).
    pub scope_id: FrameId,
    /// Line of the write.
    pub line: u32,
}

/// Payload of [`StoryEvent::Console`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsoleStory {
    /// Console stream.
    pub level: ConsoleLevel,
    /// Trimmed text.
    pub message: String,
}

/// Payload of [`StoryEvent::InternalError`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InternalErrorStory {
    /// Position of the offending raw event in the reduced log.
    pub index: usize,
    /// Kind string of the offending raw event.
    pub kind: String,
    /// Failure description.
    pub message: String,
}

/// Payload of [`StoryEvent::Terminated`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TerminatedStory {
    /// Why the run was stopped.
    pub reason: String,
    /// Raw events emitted before the stop.
    pub event_count: usize,
    /// Wall time before the stop.
    pub elapsed_ms: u64,
}

/// A presentation-ready event.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StoryEvent {
    /// A statement is about to run, with a snapshot of visible state.
    StepLine(StepLine),
    /// A function was called.
    Call(CallStory),
    /// A function returned.
    Return(ReturnStory),
    /// A variable was assigned.
    Assign(AssignStory),
    /// Console output.
    Console(ConsoleStory),
    /// A raw event could not be reduced.
    InternalError(InternalErrorStory),
    /// The run was stopped by the safety valve.
    Terminated(TerminatedStory),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_story_event_tags() {
        let event = StoryEvent::Console(ConsoleStory {
            level: ConsoleLevel::Warn,
            message: "careful".into(),
        });
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({"type": "CONSOLE", "payload": {"level": "warn", "message": "careful"}})
        );

        let event = StoryEvent::InternalError(InternalErrorStory {
            index: 4,
            kind: "EXIT_FUNCTION".into(),
            message: "boom".into(),
        });
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "INTERNAL_ERROR");
        assert_eq!(serde_json::from_value::<StoryEvent>(value).unwrap(), event);
    }

    #[test]
    fn test_binding_type_names() {
        assert_eq!(
            serde_json::to_value(BindingType::AncestorNonPersistent).unwrap(),
            json!("ancestor-non-persistent")
        );
        assert_eq!(serde_json::to_value(BindingType::Closure).unwrap(), json!("closure"));
    }
}
