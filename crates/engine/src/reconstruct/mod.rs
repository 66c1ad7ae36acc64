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

//! Trace reconstruction.
//!
//! The [`Reducer`] is a single-pass interpreter over the raw event log. It
//! rebuilds lexical scopes, the invocation stack and the heap, and turns the
//! log into the story a presentation layer plays back. Each event is applied
//! with [`Reducer::apply`], which yields at most one [`StoryEvent`]; a failing
//! event becomes an `INTERNAL_ERROR` story entry and reduction carries on.
//!
//! Sessions reduce a run's whole log once it completes, but the reducer works
//! just as well on a live stream: it never revisits a story event it already
//! produced.

mod dedup;
mod scope;

pub use dedup::{dedup_resolved_promise_values, dedup_resolved_promises};
pub use scope::{LexicalScope, ScopeArena};

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde_json::Value;
use storyline_common::{
    AssignStory, CallStory, ClosureEvent, ConsoleLevel, ConsoleStory, EnterFunctionEvent,
    ExitFunctionEvent, FrameId, InternalErrorStory, InvocationId, LexicalId, LocalsEvent,
    RawEvent, ReturnStory, StepEvent, StepLine, StoryEvent, TerminatedStory, VarWriteEvent,
};
use thiserror::Error;
use tracing::{debug, error, trace, warn};

use crate::instrumentation::common::is_internal;

/// Failure to apply one raw event.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReduceError {
    /// The event could not be decoded.
    #[error("malformed event: {0}")]
    Malformed(String),
    /// An activation was entered twice without exiting.
    #[error("invocation {0} entered while already live")]
    DuplicateInvocation(InvocationId),
    /// An invocation maps to a scope that was never created.
    #[error("invocation {invocation} maps to unknown scope {scope}")]
    MissingScope {
        /// The writing invocation.
        invocation: InvocationId,
        /// Its lexical scope.
        scope: LexicalId,
    },
}

/// Reconstruction state, advanced one raw event at a time.
#[derive(Debug, Clone, PartialEq)]
pub struct Reducer {
    scopes: ScopeArena,
    stack: Vec<FrameId>,
    invocations: HashMap<InvocationId, LexicalId>,
    heap: BTreeMap<String, Value>,
    pending_persistence: BTreeSet<LexicalId>,
    pending_scope: Option<LexicalId>,
    /// Closure scope id announced for a function's lexical scope.
    closure_parents: HashMap<LexicalId, LexicalId>,
    /// Call site lines with the stack depth they were recorded at.
    call_sites: Vec<(u32, usize)>,
    applied: usize,
}

impl Default for Reducer {
    fn default() -> Self {
        Self {
            scopes: ScopeArena::default(),
            stack: vec![FrameId::Global],
            invocations: HashMap::new(),
            heap: BTreeMap::new(),
            pending_persistence: BTreeSet::new(),
            pending_scope: None,
            closure_parents: HashMap::new(),
            call_sites: vec![],
            applied: 0,
        }
    }
}

impl Reducer {
    /// Creates a reducer holding only the global scope.
    pub fn new() -> Self {
        Self::default()
    }

    /// Known lexical scopes.
    pub fn scopes(&self) -> &ScopeArena {
        &self.scopes
    }

    /// The live invocation stack, outermost first.
    pub fn stack(&self) -> &[FrameId] {
        &self.stack
    }

    /// Latest heap contents.
    pub fn heap(&self) -> &BTreeMap<String, Value> {
        &self.heap
    }

    /// Applies the next event, recording a failure as an `INTERNAL_ERROR`.
    pub fn push(&mut self, event: &RawEvent) -> Option<StoryEvent> {
        let index = self.applied;
        self.applied += 1;
        match self.apply(event) {
            Ok(story) => story,
            Err(err) => Some(internal_error(index, event.kind(), err)),
        }
    }

    /// Records a log entry that could not be decoded.
    pub fn push_malformed(&mut self, kind: &str, message: impl Into<String>) -> StoryEvent {
        let index = self.applied;
        self.applied += 1;
        internal_error(index, kind, ReduceError::Malformed(message.into()))
    }

    /// Applies one raw event. On error the state is left as it was.
    pub fn apply(&mut self, event: &RawEvent) -> Result<Option<StoryEvent>, ReduceError> {
        trace!(kind = event.kind(), "reducing event");
        let story = match event {
            RawEvent::HeapUpdate(update) => {
                self.heap.insert(update.id.clone(), update.value.clone());
                None
            }
            RawEvent::BeforeCall(before) => {
                self.call_sites.push((before.call_site_line, self.stack.len()));
                None
            }
            RawEvent::Locals(locals) => {
                self.on_locals(locals);
                None
            }
            RawEvent::Closure(closure) => {
                self.on_closure(closure);
                None
            }
            RawEvent::VarWrite(write) => self.on_var_write(write)?,
            RawEvent::Step(step) => Some(self.on_step(step)),
            RawEvent::EnterFunction(enter) => Some(self.on_enter(enter)?),
            RawEvent::ExitFunction(exit) => Some(self.on_exit(exit)),
            RawEvent::ConsoleLog(console) => Some(console_story(ConsoleLevel::Log, &console.message)),
            RawEvent::ConsoleWarn(console) => Some(console_story(ConsoleLevel::Warn, &console.message)),
            RawEvent::ConsoleError(console) => {
                Some(console_story(ConsoleLevel::Error, &console.message))
            }
            RawEvent::EarlyTermination(terminated) => Some(StoryEvent::Terminated(TerminatedStory {
                reason: terminated.reason.clone(),
                event_count: terminated.event_count,
                elapsed_ms: terminated.elapsed_ms,
            })),
            RawEvent::VarRead(_)
            | RawEvent::ErrorFunction(_)
            | RawEvent::UncaughtError(_)
            | RawEvent::Done(_)
            | RawEvent::ResolvePromise(_) => None,
            RawEvent::Unknown { kind, .. } => {
                debug!(kind, "ignoring unknown event kind");
                None
            }
        };
        Ok(story)
    }

    fn on_locals(&mut self, locals: &LocalsEvent) {
        let names = locals.params.iter().chain(&locals.locals).filter(|name| !is_internal(name));
        if locals.scope_id.is_global() {
            self.scopes.global_mut().declare(names);
            return;
        }

        let persistent = self.pending_persistence.remove(&locals.scope_id);
        let scope = self.scopes.entry(&locals.scope_id, locals.parent_id.as_ref());
        if locals.parent_id.is_some() {
            scope.parent_id = locals.parent_id.clone();
        }
        scope.params = locals.params.iter().filter(|name| !is_internal(name)).cloned().collect();
        scope.declare(names);
        scope.is_persistent |= persistent;

        if let Some(previous) = self.pending_scope.replace(locals.scope_id.clone()) {
            warn!(%previous, next = %locals.scope_id, "scope announced without a matching entry");
        }
    }

    fn on_closure(&mut self, closure: &ClosureEvent) {
        let parent = &closure.parent_scope_id;
        if parent.is_sentinel() {
            warn!(closure = %closure.closure_id, %parent, "closure names an invalid parent scope");
            return;
        }
        self.closure_parents.insert(closure.scope_id.clone(), parent.clone());
        let captured = closure.bindings.iter().filter(|name| !is_internal(name)).cloned();
        self.scopes.entry(&closure.scope_id, Some(parent)).captured.extend(captured);
        match self.scopes.get_mut(parent) {
            Some(scope) => scope.is_persistent = true,
            None => {
                self.pending_persistence.insert(parent.clone());
            }
        }
    }

    fn on_var_write(&mut self, write: &VarWriteEvent) -> Result<Option<StoryEvent>, ReduceError> {
        if is_internal(&write.name) {
            return Ok(None);
        }
        let lexical = match write.scope_id {
            FrameId::Global => LexicalId::global(),
            FrameId::Invocation(invocation) => match self.invocations.get(&invocation) {
                Some(lexical) => lexical.clone(),
                None => {
                    debug!(%invocation, name = write.name, "write from an unmapped invocation");
                    return Ok(None);
                }
            },
        };
        if !self.scopes.contains(&lexical) {
            let invocation = write.scope_id.invocation().unwrap_or_default();
            return Err(ReduceError::MissingScope { invocation, scope: lexical });
        }

        let owner = self.scopes.defining_scope(&lexical, &write.name).map(|scope| scope.id.clone());
        for id in std::iter::once(&lexical).chain(owner.as_ref()) {
            if let Some(scope) = self.scopes.get_mut(id) {
                scope.variables.insert(write.name.clone(), write.value.clone());
            }
        }

        Ok(Some(StoryEvent::Assign(AssignStory {
            name: write.name.clone(),
            value: write.value.clone(),
            scope_id: write.scope_id,
            line: write.line,
        })))
    }

    fn on_step(&self, step: &StepEvent) -> StoryEvent {
        let scopes = self.scopes.visible(&self.stack, |invocation| self.invocations.get(&invocation).cloned());
        StoryEvent::StepLine(StepLine {
            line: step.line,
            col: step.col,
            snippet: step.snippet.clone(),
            statement_kind: step.statement_kind.clone(),
            scopes,
            heap: self.heap.clone(),
            call_stack: self.stack.clone(),
        })
    }

    fn take_call_site(&mut self) -> Option<u32> {
        let depth = self.stack.len();
        while self.call_sites.last().is_some_and(|(_, site_depth)| *site_depth > depth) {
            self.call_sites.pop();
        }
        match self.call_sites.last() {
            Some((_, site_depth)) if *site_depth == depth => self.call_sites.pop().map(|(line, _)| line),
            _ => None,
        }
    }

    fn on_enter(&mut self, enter: &EnterFunctionEvent) -> Result<StoryEvent, ReduceError> {
        let invocation = enter.invocation_id;
        if self.invocations.contains_key(&invocation) {
            return Err(ReduceError::DuplicateInvocation(invocation));
        }

        let call_site_line = self.take_call_site().or(enter.call_site_line);
        let lexical = match self.pending_scope.take() {
            Some(pending) => {
                if pending != enter.scope_id {
                    warn!(%pending, reported = %enter.scope_id, %invocation, "entry scope differs from announced scope");
                }
                pending
            }
            None => enter.scope_id.clone(),
        };

        let closure_parent_id = self.closure_parents.get(&lexical).cloned();
        let scope = self.scopes.entry(&lexical, None);
        scope.name = enter.name.clone();
        scope.closure_scope_id = closure_parent_id.clone();
        scope.this_binding = enter.this_binding.clone();
        for (param, arg) in scope.params.clone().iter().zip(&enter.args) {
            scope.variables.insert(param.clone(), arg.clone());
        }

        self.invocations.insert(invocation, lexical);
        self.stack.push(FrameId::Invocation(invocation));

        Ok(StoryEvent::Call(CallStory {
            name: enter.name.clone(),
            args: enter.args.clone(),
            call_site_line,
            invocation_id: invocation,
            closure_parent_id,
            this_binding: enter.this_binding.clone(),
        }))
    }

    fn on_exit(&mut self, exit: &ExitFunctionEvent) -> StoryEvent {
        let invocation = exit.invocation_id;
        if self.stack.last() == Some(&FrameId::Invocation(invocation)) {
            self.stack.pop();
        } else {
            warn!(%invocation, top = ?self.stack.last(), "exit does not match the innermost invocation");
        }
        self.invocations.remove(&invocation);
        let depth = self.stack.len();
        self.call_sites.retain(|(_, site_depth)| *site_depth <= depth);

        StoryEvent::Return(ReturnStory {
            name: exit.name.clone(),
            return_value: exit.return_value.clone(),
            return_line: exit.return_line,
            invocation_id: invocation,
        })
    }
}

fn console_story(level: ConsoleLevel, message: &str) -> StoryEvent {
    StoryEvent::Console(ConsoleStory { level, message: message.trim().to_string() })
}

fn internal_error(index: usize, kind: &str, err: ReduceError) -> StoryEvent {
    error!(index, kind, error = %err, "failed to reduce event");
    StoryEvent::InternalError(InternalErrorStory {
        index,
        kind: kind.to_string(),
        message: err.to_string(),
    })
}

/// Reduces a decoded raw event log into its story.
pub fn reduce(events: &[RawEvent]) -> Vec<StoryEvent> {
    let mut reducer = Reducer::new();
    events.iter().filter_map(|event| reducer.push(event)).collect()
}

/// Reduces a raw event log still in JSON form. Entries that do not decode
/// become `INTERNAL_ERROR` story events.
pub fn reduce_values(values: impl IntoIterator<Item = Value>) -> Vec<StoryEvent> {
    let mut reducer = Reducer::new();
    let mut stories = vec![];
    for value in values {
        let kind = value.get("type").and_then(Value::as_str).unwrap_or("UNKNOWN").to_string();
        let story = match serde_json::from_value::<RawEvent>(value) {
            Ok(event) => reducer.push(&event),
            Err(err) => Some(reducer.push_malformed(&kind, err.to_string())),
        };
        stories.extend(story);
    }
    stories
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use storyline_common::{
        logging::ensure_test_logging, BeforeCallEvent, BindingType, ClosureId, ConsoleEvent,
        EarlyTerminationEvent, HeapUpdateEvent, TracedValue,
    };

    use super::*;

    fn locals(scope: &str, parent: &str, params: &[&str], names: &[&str]) -> RawEvent {
        RawEvent::Locals(LocalsEvent {
            scope_id: LexicalId::new(scope),
            parent_id: Some(LexicalId::new(parent)),
            params: params.iter().map(|name| name.to_string()).collect(),
            locals: names.iter().map(|name| name.to_string()).collect(),
        })
    }

    fn enter(id: u64, name: &str, scope: &str, args: Vec<TracedValue>) -> RawEvent {
        RawEvent::EnterFunction(EnterFunctionEvent {
            invocation_id: InvocationId(id),
            name: name.into(),
            start_line: 1,
            end_line: 3,
            scope_id: LexicalId::new(scope),
            this_binding: None,
            call_site_line: None,
            args,
        })
    }

    fn exit(id: u64, name: &str, value: Value) -> RawEvent {
        RawEvent::ExitFunction(ExitFunctionEvent {
            invocation_id: InvocationId(id),
            name: name.into(),
            start_line: 1,
            end_line: 3,
            scope_id: LexicalId::new("scope_1"),
            return_value: TracedValue::from_json(value),
            return_line: Some(2),
        })
    }

    fn write(frame: FrameId, name: &str, value: Value) -> RawEvent {
        RawEvent::VarWrite(VarWriteEvent {
            scope_id: frame,
            name: name.into(),
            value: TracedValue::from_json(value),
            line: 2,
        })
    }

    fn step(line: u32) -> RawEvent {
        RawEvent::Step(StepEvent { line, col: 2, snippet: "x;".into(), statement_kind: None })
    }

    #[test]
    fn test_locals_pair_with_following_entry() {
        ensure_test_logging(None);
        let mut reducer = Reducer::new();
        reducer.apply(&locals("scope_1", "global", &["a"], &["b"])).unwrap();
        let story = reducer.apply(&enter(7, "add", "scope_1", vec![TracedValue::from_json(json!(3))])).unwrap();
        let Some(StoryEvent::Call(call)) = story else { panic!("expected a call") };
        assert_eq!(call.invocation_id, InvocationId(7));

        let scope = reducer.scopes().get(&LexicalId::new("scope_1")).unwrap();
        assert_eq!(scope.name, "add");
        assert_eq!(scope.variables["a"], TracedValue::from_json(json!(3)));
        assert!(scope.variables["b"].is_undefined());
        assert_eq!(reducer.stack(), [FrameId::Global, FrameId::Invocation(InvocationId(7))]);
    }

    #[test]
    fn test_internal_names_never_surface() {
        ensure_test_logging(None);
        let mut reducer = Reducer::new();
        reducer.apply(&locals("scope_1", "global", &[], &["__returnValue", "x"])).unwrap();
        reducer.apply(&enter(1, "f", "scope_1", vec![])).unwrap();
        let story = reducer.apply(&write(FrameId::Invocation(InvocationId(1)), "__returnLine", json!(3))).unwrap();
        assert!(story.is_none());
        let scope = reducer.scopes().get(&LexicalId::new("scope_1")).unwrap();
        assert_eq!(scope.variables.keys().collect::<Vec<_>>(), ["x"]);
    }

    #[test]
    fn test_write_from_unmapped_invocation_is_dropped() {
        ensure_test_logging(None);
        let mut reducer = Reducer::new();
        let story = reducer.apply(&write(FrameId::Invocation(InvocationId(9)), "x", json!(1))).unwrap();
        assert!(story.is_none());
    }

    #[test]
    fn test_global_write_emits_assign() {
        ensure_test_logging(None);
        let mut reducer = Reducer::new();
        let story = reducer.apply(&write(FrameId::Global, "total", json!(10))).unwrap();
        let Some(StoryEvent::Assign(assign)) = story else { panic!("expected an assignment") };
        assert_eq!(assign.scope_id, FrameId::Global);
        let global = reducer.scopes().get(&LexicalId::global()).unwrap();
        assert_eq!(global.variables["total"], TracedValue::from_json(json!(10)));
    }

    #[test]
    fn test_closure_before_scope_exists_is_pending() {
        ensure_test_logging(None);
        let mut reducer = Reducer::new();
        reducer
            .apply(&RawEvent::Closure(ClosureEvent {
                closure_id: ClosureId(3),
                scope_id: LexicalId::new("scope_2"),
                parent_scope_id: LexicalId::new("scope_1"),
                bindings: vec!["count".into()],
            }))
            .unwrap();
        reducer.apply(&locals("scope_1", "global", &[], &["count"])).unwrap();
        assert!(reducer.scopes().get(&LexicalId::new("scope_1")).unwrap().is_persistent);
    }

    #[test]
    fn test_closure_with_sentinel_parent_is_ignored() {
        ensure_test_logging(None);
        let mut reducer = Reducer::new();
        let before = reducer.clone();
        for parent in ["undefined", "null", ""] {
            let story = reducer
                .apply(&RawEvent::Closure(ClosureEvent {
                    closure_id: ClosureId(1),
                    scope_id: LexicalId::new("scope_2"),
                    parent_scope_id: LexicalId::new(parent),
                    bindings: vec![],
                }))
                .unwrap();
            assert!(story.is_none());
        }
        assert_eq!(reducer, before);
    }

    #[test]
    fn test_call_site_stack_pairs_with_entry() {
        ensure_test_logging(None);
        let mut reducer = Reducer::new();
        reducer.apply(&RawEvent::BeforeCall(BeforeCallEvent { call_site_line: 12 })).unwrap();
        let Some(StoryEvent::Call(call)) = reducer.apply(&enter(1, "f", "scope_1", vec![])).unwrap() else {
            panic!("expected a call")
        };
        assert_eq!(call.call_site_line, Some(12));
    }

    #[test]
    fn test_mismatched_exit_still_returns() {
        ensure_test_logging(None);
        let mut reducer = Reducer::new();
        reducer.apply(&enter(1, "f", "scope_1", vec![])).unwrap();
        let story = reducer.apply(&exit(5, "g", json!(null))).unwrap();
        assert!(matches!(story, Some(StoryEvent::Return(ret)) if ret.invocation_id == InvocationId(5)));
        assert_eq!(reducer.stack().len(), 2);
    }

    #[test]
    fn test_duplicate_entry_becomes_internal_error() {
        ensure_test_logging(None);
        let events = vec![enter(1, "f", "scope_1", vec![]), enter(1, "f", "scope_1", vec![]), step(4)];
        let stories = reduce(&events);
        assert_eq!(stories.len(), 3);
        let StoryEvent::InternalError(failure) = &stories[1] else { panic!("expected an internal error") };
        assert_eq!(failure.index, 1);
        assert_eq!(failure.kind, "ENTER_FUNCTION");
        assert!(matches!(stories[2], StoryEvent::StepLine(_)));
    }

    #[test]
    fn test_undecodable_values_are_reported_inline() {
        ensure_test_logging(None);
        let stories = reduce_values(vec![
            json!({"type": "STEP", "payload": {"line": "one"}}),
            json!({"type": "FUTURE_KIND", "payload": {}}),
            json!({"type": "CONSOLE_LOG", "payload": {"message": "  hi \n"}}),
        ]);
        assert_eq!(stories.len(), 2);
        assert!(matches!(&stories[0], StoryEvent::InternalError(failure) if failure.kind == "STEP" && failure.index == 0));
        assert!(matches!(&stories[1], StoryEvent::Console(console) if console.message == "hi"));
    }

    #[test]
    fn test_heap_snapshot_is_copied_into_steps() {
        ensure_test_logging(None);
        let stories = reduce(&[
            RawEvent::HeapUpdate(HeapUpdateEvent { id: "obj_1".into(), value: json!({"a": 1}) }),
            step(1),
            RawEvent::HeapUpdate(HeapUpdateEvent { id: "obj_1".into(), value: json!({"a": 2}) }),
            step(2),
        ]);
        let heaps = stories
            .iter()
            .filter_map(|story| match story {
                StoryEvent::StepLine(step) => Some(step.heap["obj_1"].clone()),
                _ => None,
            })
            .collect::<Vec<_>>();
        assert_eq!(heaps, vec![json!({"a": 1}), json!({"a": 2})]);
    }

    #[test]
    fn test_early_termination_and_console() {
        ensure_test_logging(None);
        let stories = reduce(&[
            RawEvent::ConsoleWarn(ConsoleEvent { message: "slow ".into() }),
            RawEvent::EarlyTermination(EarlyTerminationEvent {
                reason: "event budget of 10 events exhausted".into(),
                event_count: 11,
                elapsed_ms: 3,
            }),
        ]);
        assert!(matches!(&stories[0], StoryEvent::Console(c) if c.level == ConsoleLevel::Warn && c.message == "slow"));
        assert!(matches!(&stories[1], StoryEvent::Terminated(t) if t.event_count == 11));
    }

    #[test]
    fn test_read_only_closure_shows_captured_binding() {
        ensure_test_logging(None);
        let mut reducer = Reducer::new();
        reducer.apply(&locals("scope_1", "global", &[], &["count"])).unwrap();
        reducer.apply(&enter(1, "makeReader", "scope_1", vec![])).unwrap();
        reducer.apply(&write(FrameId::Invocation(InvocationId(1)), "count", json!(7))).unwrap();
        reducer
            .apply(&RawEvent::Closure(ClosureEvent {
                closure_id: ClosureId(2),
                scope_id: LexicalId::new("scope_2"),
                parent_scope_id: LexicalId::new("scope_1"),
                bindings: vec!["count".into(), "__tracer".into()],
            }))
            .unwrap();
        reducer.apply(&exit(1, "makeReader", json!("[Function: anonymous]"))).unwrap();
        reducer.apply(&locals("scope_2", "scope_1", &[], &[])).unwrap();
        reducer.apply(&enter(3, "anonymous", "scope_2", vec![])).unwrap();

        let Some(StoryEvent::StepLine(step)) = reducer.apply(&step(3)).unwrap() else {
            panic!("expected a step")
        };
        let inner = &step.scopes[1];
        assert_eq!(inner.lexical_id, LexicalId::new("scope_2"));
        assert_eq!(inner.variables.len(), 1);
        assert_eq!(inner.variables[0].name, "count");
        assert_eq!(inner.variables[0].value, TracedValue::from_json(json!(7)));
        assert_eq!(inner.variables[0].binding_type, BindingType::Closure);
    }

    #[test]
    fn test_underscored_user_names_are_assigned() {
        ensure_test_logging(None);
        let mut reducer = Reducer::new();
        let story = reducer.apply(&write(FrameId::Global, "__total", json!(1))).unwrap();
        assert!(matches!(story, Some(StoryEvent::Assign(assign)) if assign.name == "__total"));
        assert!(reducer.apply(&write(FrameId::Global, "__returnValue", json!(1))).unwrap().is_none());
    }

    #[test]
    fn test_closed_over_write_refreshes_defining_scope() {
        ensure_test_logging(None);
        let mut reducer = Reducer::new();
        reducer.apply(&locals("scope_1", "global", &[], &["count"])).unwrap();
        reducer.apply(&enter(1, "createCounter", "scope_1", vec![])).unwrap();
        reducer
            .apply(&RawEvent::Closure(ClosureEvent {
                closure_id: ClosureId(2),
                scope_id: LexicalId::new("scope_2"),
                parent_scope_id: LexicalId::new("scope_1"),
                bindings: vec!["count".into()],
            }))
            .unwrap();
        reducer.apply(&exit(1, "createCounter", json!("[Function: increment]"))).unwrap();
        reducer.apply(&locals("scope_2", "scope_1", &[], &[])).unwrap();
        reducer.apply(&enter(3, "increment", "scope_2", vec![])).unwrap();
        reducer.apply(&write(FrameId::Invocation(InvocationId(3)), "count", json!(1))).unwrap();

        let Some(StoryEvent::StepLine(step)) = reducer.apply(&step(3)).unwrap() else {
            panic!("expected a step")
        };
        let ids = step.scopes.iter().map(|scope| scope.lexical_id.as_str()).collect::<Vec<_>>();
        assert_eq!(ids, ["global", "scope_2", "scope_1"]);
        let inner = &step.scopes[1];
        assert_eq!(inner.closure_scope_id, Some(LexicalId::new("scope_1")));
        assert_eq!(inner.variables[0].binding_type, BindingType::Closure);
        assert_eq!(step.scopes[2].variables[0].value, TracedValue::from_json(json!(1)));
    }
}
