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

//! Drives the tracer the way instrumented programs do and checks the story
//! rebuilt from the resulting log.

use serde_json::json;
use storyline_common::{BindingType, FrameId, LexicalId, RawEvent, ScopeKind, StoryEvent, TracedValue};
use storyline_engine::{
    dedup_resolved_promises, reduce, NullSink, Reducer, Termination, Tracer, TracerConfig,
};
use tracing::info;

fn scope(id: &str) -> LexicalId {
    LexicalId::new(id)
}

fn num(value: i64) -> TracedValue {
    TracedValue::from_json(json!(value))
}

fn strings(names: &[&str]) -> Vec<String> {
    names.iter().map(|name| name.to_string()).collect()
}

/// Replays the hooks of the instrumented closure-counter program:
///
/// ```text
/// 1 function createCounter() {
/// 2   let count = 0;
/// 3   return function () {
/// 4     count++;
/// 5     return count;
/// 6   };
/// 7 }
/// 8 const counter = createCounter();
/// 9 counter();
/// 10 counter();
/// ```
fn run_counter(tracer: &mut Tracer) {
    tracer.capture_locals(LexicalId::global(), None, vec![], strings(&["createCounter", "counter"]));
    tracer.step(1, 0, "function createCounter() {", Some("FunctionDeclaration"));
    tracer.step(8, 0, "const counter = createCounter();", Some("VariableDeclaration"));
    tracer.before_call(8);

    tracer.capture_locals(scope("scope_1"), Some(LexicalId::global()), vec![], strings(&["count"]));
    let outer = tracer.next_id();
    tracer.enter_func(outer, "createCounter", 1, 7, scope("scope_1"), None, None, vec![]);
    tracer.step(2, 2, "let count = 0;", Some("VariableDeclaration"));
    tracer.var_write(FrameId::Invocation(outer.into()), "count", num(0), 2);
    let closure = tracer.next_id();
    tracer.capture_closure(closure, scope("scope_2"), scope("scope_1"), strings(&["count"]));
    tracer.step(3, 2, "return function () {", Some("ReturnStatement"));
    let inner_fn = TracedValue::function("anonymous");
    tracer.exit_func(outer, "createCounter", 1, 7, scope("scope_1"), inner_fn.clone(), Some(3));
    tracer.var_write(FrameId::Global, "counter", inner_fn, 8);

    for (line, value) in [(9, 1), (10, 2)] {
        tracer.step(line, 0, "counter();", Some("ExpressionStatement"));
        tracer.before_call(line);
        tracer.capture_locals(scope("scope_2"), Some(scope("scope_1")), vec![], vec![]);
        let inner = tracer.next_id();
        tracer.enter_func(inner, "anonymous", 3, 6, scope("scope_2"), None, None, vec![]);
        tracer.step(4, 4, "count++;", Some("ExpressionStatement"));
        tracer.var_update(FrameId::Invocation(inner.into()), "count", num(value - 1), num(value), 4);
        tracer.step(5, 4, "return count;", Some("ReturnStatement"));
        tracer.exit_func(inner, "anonymous", 3, 6, scope("scope_2"), num(value), Some(5));
    }
    tracer.done();
}

fn describe(story: &StoryEvent) -> Option<String> {
    match story {
        StoryEvent::Call(call) => Some(format!("CALL {}", call.name)),
        StoryEvent::Return(ret) => Some(format!("RETURN {}", ret.return_value.display_text())),
        StoryEvent::Assign(assign) => Some(format!("ASSIGN {}={}", assign.name, assign.value.display_text())),
        _ => None,
    }
}

#[test]
fn test_counter_story() {
    storyline_common::logging::ensure_test_logging(None);
    info!("Running test");
    let mut tracer = Tracer::new(TracerConfig::default(), NullSink);
    run_counter(&mut tracer);
    let events = tracer.into_events();

    let enters = events.iter().filter(|event| matches!(event, RawEvent::EnterFunction(_))).count();
    let exits = events.iter().filter(|event| matches!(event, RawEvent::ExitFunction(_))).count();
    assert_eq!(enters, exits);

    let stories = reduce(&events);
    let outline = stories.iter().filter_map(describe).collect::<Vec<_>>();
    assert_eq!(
        outline,
        [
            "CALL createCounter",
            "ASSIGN count=0",
            "RETURN [Function: anonymous]",
            "ASSIGN counter=[Function: anonymous]",
            "CALL anonymous",
            "ASSIGN count=1",
            "RETURN 1",
            "CALL anonymous",
            "ASSIGN count=2",
            "RETURN 2",
        ]
    );

    let Some(StoryEvent::Call(first)) = stories.iter().find(|story| matches!(story, StoryEvent::Call(_))) else {
        panic!("expected a call")
    };
    assert_eq!(first.call_site_line, Some(8));

    let steps = stories
        .iter()
        .filter_map(|story| match story {
            StoryEvent::StepLine(step) => Some(step),
            _ => None,
        })
        .collect::<Vec<_>>();

    // First statement of the first call, before the inner function writes.
    let entering = steps.iter().find(|step| step.line == 4).unwrap();
    let inner = entering.scopes.iter().find(|scope| scope.lexical_id.as_str() == "scope_2").unwrap();
    let count = inner.variables.iter().find(|var| var.name == "count").unwrap();
    assert_eq!(count.binding_type, BindingType::Closure);
    assert_eq!(count.value, num(0));

    // Every step inside an inner call shows `count` closed over.
    for step in steps.iter().filter(|step| matches!(step.line, 4 | 5)) {
        let inner = step.scopes.iter().find(|scope| scope.lexical_id.as_str() == "scope_2").unwrap();
        let count = inner.variables.iter().find(|var| var.name == "count").unwrap();
        assert_eq!(count.binding_type, BindingType::Closure);
    }

    // Inside the second call, after the write.
    let inside = steps.iter().rfind(|step| step.line == 5).unwrap();
    let ids = inside.scopes.iter().map(|scope| scope.lexical_id.as_str()).collect::<Vec<_>>();
    assert_eq!(ids, ["global", "scope_2", "scope_1"]);
    let inner = &inside.scopes[1];
    assert_eq!(inner.closure_scope_id, Some(scope("scope_1")));
    let count = inner.variables.iter().find(|var| var.name == "count").unwrap();
    assert_eq!(count.binding_type, BindingType::Closure);
    assert_eq!(count.value, num(2));
    assert_eq!(inside.call_stack.len(), 2);

    // Back at top level the closed-over scope is still shown.
    let between = steps.iter().find(|step| step.line == 10).unwrap();
    assert_eq!(between.call_stack, [FrameId::Global]);
    let captured = between.scopes.iter().find(|scope| scope.lexical_id.as_str() == "scope_1").unwrap();
    assert_eq!(captured.kind, ScopeKind::Closure);
    assert_eq!(captured.variables[0].value, num(1));
    assert!(between.scopes.iter().all(|scope| scope.lexical_id.as_str() != "scope_2"));

    // Global variables classify as global everywhere.
    let global = &inside.scopes[0];
    let counter = global.variables.iter().find(|var| var.name == "counter").unwrap();
    assert_eq!(counter.binding_type, BindingType::Global);
}

#[test]
fn test_snapshots_have_no_duplicate_scopes() {
    storyline_common::logging::ensure_test_logging(None);
    info!("Running test");
    let mut tracer = Tracer::new(TracerConfig::default(), NullSink);
    run_counter(&mut tracer);
    for story in reduce(tracer.events()) {
        if let StoryEvent::StepLine(step) = story {
            let mut ids = step.scopes.iter().map(|scope| scope.lexical_id.clone()).collect::<Vec<_>>();
            assert_eq!(ids[0], LexicalId::global());
            let total = ids.len();
            ids.sort();
            ids.dedup();
            assert_eq!(ids.len(), total);
        }
    }
}

#[test]
fn test_error_unwinds_every_frame() {
    storyline_common::logging::ensure_test_logging(None);
    info!("Running test");
    let mut tracer = Tracer::new(TracerConfig::default(), NullSink);
    tracer.before_call(5);
    let outer = tracer.next_id();
    tracer.enter_func(outer, "outer", 1, 3, scope("scope_1"), None, None, vec![]);
    tracer.before_call(2);
    let inner = tracer.next_id();
    tracer.enter_func(inner, "inner", 4, 4, scope("scope_2"), None, None, vec![]);
    // The error travels through both catch/finally wrappers.
    tracer.error_func("Error: bottom", inner, "inner", 4, 4);
    tracer.exit_func(inner, "inner", 4, 4, scope("scope_2"), TracedValue::undefined(), None);
    tracer.error_func("Error: bottom", outer, "outer", 1, 3);
    tracer.exit_func(outer, "outer", 1, 3, scope("scope_1"), TracedValue::undefined(), None);
    tracer.uncaught_error("Error: bottom");

    let kinds = tracer.events().iter().map(RawEvent::kind).collect::<Vec<_>>();
    assert_eq!(
        kinds,
        [
            "BEFORE_CALL",
            "ENTER_FUNCTION",
            "BEFORE_CALL",
            "ENTER_FUNCTION",
            "ERROR_FUNCTION",
            "EXIT_FUNCTION",
            "ERROR_FUNCTION",
            "EXIT_FUNCTION",
            "UNCAUGHT_ERROR",
        ]
    );
    assert!(matches!(tracer.termination(), Some(Termination::Uncaught(_))));

    let mut reducer = Reducer::new();
    let stories = tracer.events().iter().filter_map(|event| reducer.push(event)).collect::<Vec<_>>();
    let returns = stories.iter().filter(|story| matches!(story, StoryEvent::Return(_))).count();
    assert_eq!(returns, 2);
    assert!(!stories.iter().any(|story| matches!(story, StoryEvent::InternalError(_))));
    assert_eq!(reducer.stack(), [FrameId::Global]);
}

#[test]
fn test_runaway_loop_terminates_once() {
    storyline_common::logging::ensure_test_logging(None);
    info!("Running test");
    let mut tracer = Tracer::new(TracerConfig { max_events: 20, ..Default::default() }, NullSink);
    let mut iterations = 0;
    while tracer.iterate_loop().is_ok() {
        tracer.step(2, 2, "i++;", Some("ExpressionStatement"));
        iterations += 1;
    }
    assert_eq!(iterations, 21);
    // A caught termination cannot restart the loop.
    assert!(tracer.iterate_loop().is_err());
    tracer.step(3, 0, "after();", None);

    let terminations =
        tracer.events().iter().filter(|event| matches!(event, RawEvent::EarlyTermination(_))).count();
    assert_eq!(terminations, 1);
    assert!(tracer.events().last().unwrap().is_terminal());

    let stories = reduce(tracer.events());
    assert!(matches!(stories.last(), Some(StoryEvent::Terminated(_))));
}

#[test]
fn test_duplicate_promise_resolutions_surface_once() {
    storyline_common::logging::ensure_test_logging(None);
    info!("Running test");
    let mut tracer = Tracer::new(TracerConfig::default(), NullSink);
    tracer.resolve_promise("p1", num(1));
    tracer.step(1, 0, "await p;", None);
    tracer.resolve_promise("p1", num(1));
    tracer.done();

    let events = dedup_resolved_promises(tracer.into_events());
    let kinds = events.iter().map(RawEvent::kind).collect::<Vec<_>>();
    assert_eq!(kinds, ["STEP", "RESOLVE_PROMISE", "DONE"]);
    assert_eq!(dedup_resolved_promises(events.clone()), events);
}
