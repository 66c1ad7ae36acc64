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

//! Raw trace events emitted by the runtime tracer.
//!
//! On the wire every event is an envelope `{"type": KIND, "payload": {...}}`.
//! The set of kinds is closed, with one escape hatch: an envelope whose kind is
//! not recognized decodes into [`RawEvent::Unknown`] instead of failing, so that
//! newer producers can be replayed by older reconstructors.

use serde::{de::Error as _, Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use super::{ClosureId, FrameId, InvocationId, LexicalId, TracedValue};

/// `STEP`: a statement is about to execute.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepEvent {
    /// 1-based line of the statement.
    pub line: u32,
    /// 0-based column of the statement.
    pub col: u32,
    /// Verbatim source text of the statement.
    pub snippet: String,
    /// Syntactic kind of the statement (e.g. `VariableDeclaration`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub statement_kind: Option<String>,
}

/// `BEFORE_CALL`: a call expression is about to be evaluated.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BeforeCallEvent {
    /// Line of the call expression.
    pub call_site_line: u32,
}

/// `ENTER_FUNCTION`: an instrumented function body starts executing.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnterFunctionEvent {
    /// Fresh id of this activation.
    pub invocation_id: InvocationId,
    /// Display name of the function.
    pub name: String,
    /// First line of the function.
    pub start_line: u32,
    /// Last line of the function.
    pub end_line: u32,
    /// Lexical scope id assigned to the function body.
    pub scope_id: LexicalId,
    /// The `this` binding, if observable.
    #[serde(default)]
    pub this_binding: Option<TracedValue>,
    /// Line of the call site, as paired by the tracer.
    #[serde(default)]
    pub call_site_line: Option<u32>,
    /// Values of the declared parameters, in declaration order.
    #[serde(default)]
    pub args: Vec<TracedValue>,
}

/// `EXIT_FUNCTION`: an instrumented function body finished, normally or not.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExitFunctionEvent {
    /// Id of the finishing activation.
    pub invocation_id: InvocationId,
    /// Display name of the function.
    pub name: String,
    /// First line of the function.
    pub start_line: u32,
    /// Last line of the function.
    pub end_line: u32,
    /// Lexical scope id assigned to the function body.
    pub scope_id: LexicalId,
    /// The returned value (`undefined` when falling off the end).
    #[serde(default)]
    pub return_value: TracedValue,
    /// Line of the `return` statement taken, if any.
    #[serde(default)]
    pub return_line: Option<u32>,
}

/// `ERROR_FUNCTION`: an error propagates out of an instrumented function.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorFunctionEvent {
    /// Rendered error.
    pub message: String,
    /// Id of the failing activation.
    pub invocation_id: InvocationId,
    /// Display name of the function.
    pub name: String,
    /// First line of the function.
    pub start_line: u32,
    /// Last line of the function.
    pub end_line: u32,
}

/// `LOCALS`: a scope announces itself and the names it declares.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalsEvent {
    /// Lexical id of the announced scope.
    pub scope_id: LexicalId,
    /// Lexical id of the defining scope.
    #[serde(default)]
    pub parent_id: Option<LexicalId>,
    /// Parameter names, in declaration order.
    #[serde(default)]
    pub params: Vec<String>,
    /// Other names declared in the body.
    #[serde(default)]
    pub locals: Vec<String>,
}

/// `CLOSURE`: a function closes over the scope it was defined in.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClosureEvent {
    /// Fresh id of this announcement.
    pub closure_id: ClosureId,
    /// Lexical id of the closing function's own scope.
    pub scope_id: LexicalId,
    /// Lexical id of the scope being closed over.
    pub parent_scope_id: LexicalId,
    /// Free variables of the closing function.
    #[serde(default)]
    pub bindings: Vec<String>,
}

/// `VAR_WRITE`: a variable was assigned.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VarWriteEvent {
    /// The writing activation, or the global frame.
    pub scope_id: FrameId,
    /// Variable name.
    pub name: String,
    /// The new value.
    #[serde(flatten)]
    pub value: TracedValue,
    /// Line of the write.
    pub line: u32,
}

/// `VAR_READ`: a variable was read.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VarReadEvent {
    /// Variable name.
    pub name: String,
    /// The value read.
    #[serde(flatten)]
    pub value: TracedValue,
}

/// `CONSOLE_LOG` / `CONSOLE_WARN` / `CONSOLE_ERROR`: console output.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsoleEvent {
    /// The printed arguments, joined by spaces.
    pub message: String,
}

/// `HEAP_UPDATE`: the latest value of a heap object.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeapUpdateEvent {
    /// Heap object id.
    pub id: String,
    /// Rendered object.
    pub value: Value,
}

/// `UNCAUGHT_ERROR`: an error escaped every instrumented frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UncaughtErrorEvent {
    /// Rendered error.
    pub message: String,
}

/// `EARLY_TERMINATION`: the safety valve stopped the run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EarlyTerminationEvent {
    /// Human-readable reason.
    pub reason: String,
    /// Events emitted before termination.
    pub event_count: usize,
    /// Wall time elapsed before termination.
    pub elapsed_ms: u64,
}

/// `RESOLVE_PROMISE`: a promise settled with a value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvePromiseEvent {
    /// Host-assigned promise id.
    pub promise_id: String,
    /// Settled value.
    #[serde(flatten)]
    pub value: TracedValue,
}

/// `DONE`: the program ran to completion.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DoneEvent {}

macro_rules! raw_events {
    (
        $(
            $(#[$attr:meta])*
            $variant:ident($payload:ty) => $kind:literal
        ),* $(,)?
    ) => {
        /// One fact emitted during instrumented execution.
        #[derive(Clone, Debug, PartialEq)]
        pub enum RawEvent {
            $(
                $(#[$attr])*
                $variant($payload),
            )*
            /// An event kind this build does not interpret.
            Unknown {
                /// The wire kind string.
                kind: String,
                /// The undecoded payload.
                payload: Value,
            },
        }

        impl RawEvent {
            /// The wire kind string of this event.
            pub fn kind(&self) -> &str {
                match self {
                    $(Self::$variant(_) => $kind,)*
                    Self::Unknown { kind, .. } => kind,
                }
            }

            /// Decodes an event from its kind string and payload.
            pub fn from_parts(kind: &str, payload: Value) -> serde_json::Result<Self> {
                match kind {
                    $($kind => Ok(Self::$variant(serde_json::from_value(non_null(payload))?)),)*
                    _ => Ok(Self::Unknown { kind: kind.to_string(), payload }),
                }
            }

            fn payload_value(&self) -> serde_json::Result<Value> {
                match self {
                    $(Self::$variant(payload) => serde_json::to_value(payload),)*
                    Self::Unknown { payload, .. } => Ok(payload.clone()),
                }
            }
        }
    };
}

raw_events! {
    /// A statement is about to execute.
    Step(StepEvent) => "STEP",
    /// A call expression is about to be evaluated.
    BeforeCall(BeforeCallEvent) => "BEFORE_CALL",
    /// A function was entered.
    EnterFunction(EnterFunctionEvent) => "ENTER_FUNCTION",
    /// A function exited.
    ExitFunction(ExitFunctionEvent) => "EXIT_FUNCTION",
    /// An error propagated through a function.
    ErrorFunction(ErrorFunctionEvent) => "ERROR_FUNCTION",
    /// A scope announced its declarations.
    Locals(LocalsEvent) => "LOCALS",
    /// A function closes over its defining scope.
    Closure(ClosureEvent) => "CLOSURE",
    /// A variable was written.
    VarWrite(VarWriteEvent) => "VAR_WRITE",
    /// A variable was read.
    VarRead(VarReadEvent) => "VAR_READ",
    /// `console.log` output.
    ConsoleLog(ConsoleEvent) => "CONSOLE_LOG",
    /// `console.warn` output.
    ConsoleWarn(ConsoleEvent) => "CONSOLE_WARN",
    /// `console.error` output.
    ConsoleError(ConsoleEvent) => "CONSOLE_ERROR",
    /// A heap object changed.
    HeapUpdate(HeapUpdateEvent) => "HEAP_UPDATE",
    /// An error escaped all instrumented frames.
    UncaughtError(UncaughtErrorEvent) => "UNCAUGHT_ERROR",
    /// The program completed normally.
    Done(DoneEvent) => "DONE",
    /// The safety valve stopped the run.
    EarlyTermination(EarlyTerminationEvent) => "EARLY_TERMINATION",
    /// A promise settled.
    ResolvePromise(ResolvePromiseEvent) => "RESOLVE_PROMISE",
}

impl RawEvent {
    /// Whether this event ends a run.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done(_) | Self::UncaughtError(_) | Self::EarlyTermination(_))
    }
}

/// Payload-less envelopes decode as an empty payload object.
fn non_null(payload: Value) -> Value {
    if payload.is_null() {
        Value::Object(Default::default())
    } else {
        payload
    }
}

#[derive(Serialize, Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    payload: Value,
}

impl Serialize for RawEvent {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let payload = self.payload_value().map_err(serde::ser::Error::custom)?;
        Envelope { kind: self.kind().to_string(), payload }.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for RawEvent {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let Envelope { kind, payload } = Envelope::deserialize(deserializer)?;
        Self::from_parts(&kind, payload).map_err(D::Error::custom)
    }
}
