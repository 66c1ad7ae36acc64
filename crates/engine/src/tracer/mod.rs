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

//! Runtime tracer.
//!
//! The [`Tracer`] is the callback surface an instrumented program drives
//! through its `__tracer` binding. The execution host translates each hook
//! call into the matching method; the tracer turns it into a [`RawEvent`],
//! appends it to the run's log and forwards it, serialized, to an
//! [`EventSink`].
//!
//! The tracer also owns the safety valve of a run. [`Tracer::iterate_loop`]
//! (injected at the top of every loop body) fails once the event or time
//! budget is spent, after emitting a final `EARLY_TERMINATION` event. The
//! host must abort the run when that happens. Once a run has been stopped,
//! by the budget, an uncaught error or the [`KillSwitch`], nothing more is
//! emitted and every later `iterate_loop` call fails again, so user code
//! catching the first failure cannot keep a runaway loop alive.

mod sink;

pub use sink::{ChannelSink, EventSink, NullSink};

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};

use storyline_common::{
    BeforeCallEvent, ClosureEvent, ClosureId, ConsoleEvent, ConsoleLevel, DoneEvent,
    EarlyTerminationEvent, EnterFunctionEvent, ErrorFunctionEvent, ExitFunctionEvent, FrameId,
    HeapUpdateEvent, InvocationId, LexicalId, LocalsEvent, RawEvent, ResolvePromiseEvent,
    StepEvent, TracedValue, UncaughtErrorEvent, VarReadEvent, VarWriteEvent,
};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::TracerConfig;

/// Why a run stopped before completing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Termination {
    /// The run emitted more events than allowed.
    #[error("event budget of {limit} events exhausted")]
    EventBudget {
        /// The configured ceiling.
        limit: usize,
    },
    /// The run took longer than allowed.
    #[error("time budget of {}ms exhausted", limit.as_millis())]
    TimeBudget {
        /// The configured ceiling.
        limit: Duration,
    },
    /// The run was stopped from outside.
    #[error("run stopped")]
    Killed,
    /// An error escaped every instrumented frame.
    #[error("uncaught error: {0}")]
    Uncaught(String),
}

/// Shared flag that stops a run from another thread.
#[derive(Debug, Clone, Default)]
pub struct KillSwitch(Arc<AtomicBool>);

impl KillSwitch {
    /// Requests the run to stop.
    pub fn kill(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether a stop was requested.
    pub fn is_killed(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Per-run tracer context.
pub struct Tracer {
    config: TracerConfig,
    next_id: u64,
    log: Vec<RawEvent>,
    started: Instant,
    /// Pending call site lines with the frame depth they were recorded at.
    call_sites: Vec<(u32, usize)>,
    frames: Vec<InvocationId>,
    sink: Box<dyn EventSink>,
    kill_switch: KillSwitch,
    halted: Option<Termination>,
}

impl std::fmt::Debug for Tracer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tracer")
            .field("config", &self.config)
            .field("next_id", &self.next_id)
            .field("events", &self.log.len())
            .field("frames", &self.frames)
            .field("halted", &self.halted)
            .finish_non_exhaustive()
    }
}

impl Tracer {
    /// Creates a tracer for one run; the clock starts now.
    pub fn new(config: TracerConfig, sink: impl EventSink + 'static) -> Self {
        Self {
            config,
            next_id: 0,
            log: vec![],
            started: Instant::now(),
            call_sites: vec![],
            frames: vec![],
            sink: Box::new(sink),
            kill_switch: KillSwitch::default(),
            halted: None,
        }
    }

    /// A handle that stops this run.
    pub fn kill_switch(&self) -> KillSwitch {
        self.kill_switch.clone()
    }

    /// Every event emitted so far.
    pub fn events(&self) -> &[RawEvent] {
        &self.log
    }

    /// Consumes the tracer, returning its event log.
    pub fn into_events(self) -> Vec<RawEvent> {
        self.log
    }

    /// Why the run stopped, if it did.
    pub fn termination(&self) -> Option<&Termination> {
        self.halted.as_ref()
    }

    /// Wall time since the run started.
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    fn is_halted(&mut self) -> bool {
        if self.halted.is_none() && self.kill_switch.is_killed() {
            debug!("run killed");
            self.halted = Some(Termination::Killed);
        }
        self.halted.is_some()
    }

    fn emit(&mut self, event: RawEvent) {
        if self.is_halted() {
            return;
        }
        match serde_json::to_string(&event) {
            Ok(serialized) => self.sink.forward(serialized),
            Err(err) => warn!(kind = event.kind(), error = %err, "failed to serialize event"),
        }
        self.log.push(event);
    }

    /// Next id of the shared invocation/closure counter.
    pub fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    /// `step(line, col, snippet, kind)`
    pub fn step(&mut self, line: u32, col: u32, snippet: &str, statement_kind: Option<&str>) {
        self.emit(RawEvent::Step(StepEvent {
            line,
            col,
            snippet: snippet.to_string(),
            statement_kind: statement_kind.map(str::to_string),
        }));
    }

    /// `beforeCall(line)`
    pub fn before_call(&mut self, call_site_line: u32) {
        self.call_sites.push((call_site_line, self.frames.len()));
        self.emit(RawEvent::BeforeCall(BeforeCallEvent { call_site_line }));
    }

    /// `captureLocals(scopeId, parentId, params, locals)`
    pub fn capture_locals(
        &mut self,
        scope_id: LexicalId,
        parent_id: Option<LexicalId>,
        params: Vec<String>,
        locals: Vec<String>,
    ) {
        self.emit(RawEvent::Locals(LocalsEvent { scope_id, parent_id, params, locals }));
    }

    /// `captureClosure(closureId, scopeId, parentScopeId, bindings)`
    pub fn capture_closure(
        &mut self,
        closure_id: u64,
        scope_id: LexicalId,
        parent_scope_id: LexicalId,
        bindings: Vec<String>,
    ) {
        self.emit(RawEvent::Closure(ClosureEvent {
            closure_id: ClosureId(closure_id),
            scope_id,
            parent_scope_id,
            bindings,
        }));
    }

    /// `varWrite(frame, name, value, line)`, returning the written value.
    pub fn var_write(&mut self, frame: FrameId, name: &str, value: TracedValue, line: u32) -> TracedValue {
        self.emit(RawEvent::VarWrite(VarWriteEvent {
            scope_id: frame,
            name: name.to_string(),
            value: value.clone(),
            line,
        }));
        value
    }

    /// `varUpdate(frame, name, old, new, line)`: reports the new value of a
    /// postfix update and returns the old one.
    pub fn var_update(
        &mut self,
        frame: FrameId,
        name: &str,
        old: TracedValue,
        new: TracedValue,
        line: u32,
    ) -> TracedValue {
        self.var_write(frame, name, new, line);
        old
    }

    /// `varRead(name, value)`, returning the value.
    pub fn var_read(&mut self, name: &str, value: TracedValue) -> TracedValue {
        self.emit(RawEvent::VarRead(VarReadEvent { name: name.to_string(), value: value.clone() }));
        value
    }

    /// The call site of an activation starting at the current depth. Sites
    /// recorded in frames that already returned are dropped.
    fn take_call_site(&mut self) -> Option<u32> {
        let depth = self.frames.len();
        while self.call_sites.last().is_some_and(|(_, site_depth)| *site_depth > depth) {
            self.call_sites.pop();
        }
        match self.call_sites.last() {
            Some((_, site_depth)) if *site_depth == depth => self.call_sites.pop().map(|(line, _)| line),
            _ => None,
        }
    }

    /// `enterFunc(invocationId, name, startLine, endLine, scopeId, this, callSiteLine, args)`.
    /// A missing call site line is paired with the latest `beforeCall`.
    #[allow(clippy::too_many_arguments)]
    pub fn enter_func(
        &mut self,
        invocation_id: u64,
        name: &str,
        start_line: u32,
        end_line: u32,
        scope_id: LexicalId,
        this_binding: Option<TracedValue>,
        call_site_line: Option<u32>,
        args: Vec<TracedValue>,
    ) {
        let paired = self.take_call_site();
        let invocation_id = InvocationId(invocation_id);
        self.frames.push(invocation_id);
        self.emit(RawEvent::EnterFunction(EnterFunctionEvent {
            invocation_id,
            name: name.to_string(),
            start_line,
            end_line,
            scope_id,
            this_binding,
            call_site_line: call_site_line.or(paired),
            args,
        }));
    }

    /// `exitFunc(invocationId, name, startLine, endLine, scopeId, returnValue, returnLine)`
    #[allow(clippy::too_many_arguments)]
    pub fn exit_func(
        &mut self,
        invocation_id: u64,
        name: &str,
        start_line: u32,
        end_line: u32,
        scope_id: LexicalId,
        return_value: TracedValue,
        return_line: Option<u32>,
    ) {
        let invocation_id = InvocationId(invocation_id);
        if let Some(position) = self.frames.iter().rposition(|frame| *frame == invocation_id) {
            self.frames.truncate(position);
        }
        let depth = self.frames.len();
        self.call_sites.retain(|(_, site_depth)| *site_depth <= depth);
        self.emit(RawEvent::ExitFunction(ExitFunctionEvent {
            invocation_id,
            name: name.to_string(),
            start_line,
            end_line,
            scope_id,
            return_value,
            return_line,
        }));
    }

    /// `errorFunc(message, invocationId, name, startLine, endLine)`
    pub fn error_func(&mut self, message: &str, invocation_id: u64, name: &str, start_line: u32, end_line: u32) {
        self.emit(RawEvent::ErrorFunction(ErrorFunctionEvent {
            message: message.to_string(),
            invocation_id: InvocationId(invocation_id),
            name: name.to_string(),
            start_line,
            end_line,
        }));
    }

    /// `log/warn/error(...args)`: arguments are joined by spaces.
    pub fn console(&mut self, level: ConsoleLevel, args: &[TracedValue]) {
        let message = args.iter().map(TracedValue::display_text).collect::<Vec<_>>().join(" ");
        let event = ConsoleEvent { message };
        self.emit(match level {
            ConsoleLevel::Log => RawEvent::ConsoleLog(event),
            ConsoleLevel::Warn => RawEvent::ConsoleWarn(event),
            ConsoleLevel::Error => RawEvent::ConsoleError(event),
        });
    }

    /// `heapUpdate(id, value)`
    pub fn heap_update(&mut self, id: &str, value: serde_json::Value) {
        self.emit(RawEvent::HeapUpdate(HeapUpdateEvent { id: id.to_string(), value }));
    }

    /// `resolvePromise(promiseId, value)`
    pub fn resolve_promise(&mut self, promise_id: &str, value: TracedValue) {
        self.emit(RawEvent::ResolvePromise(ResolvePromiseEvent { promise_id: promise_id.to_string(), value }));
    }

    /// Reports an error that escaped every instrumented frame and stops the run.
    pub fn uncaught_error(&mut self, message: &str) {
        self.emit(RawEvent::UncaughtError(UncaughtErrorEvent { message: message.to_string() }));
        if self.halted.is_none() {
            self.halted = Some(Termination::Uncaught(message.to_string()));
        }
    }

    /// Reports normal completion.
    pub fn done(&mut self) {
        self.emit(RawEvent::Done(DoneEvent {}));
    }

    /// `iterateLoop()`: fails once the run is over budget or stopped.
    pub fn iterate_loop(&mut self) -> Result<(), Termination> {
        if self.is_halted() {
            return Err(self.halted.clone().unwrap_or(Termination::Killed));
        }

        let event_count = self.log.len();
        let elapsed = self.started.elapsed();
        let termination = if event_count > self.config.max_events {
            Termination::EventBudget { limit: self.config.max_events }
        } else if elapsed > self.config.max_duration {
            Termination::TimeBudget { limit: self.config.max_duration }
        } else {
            return Ok(());
        };

        debug!(%termination, event_count, elapsed_ms = elapsed.as_millis() as u64, "terminating run");
        self.emit(RawEvent::EarlyTermination(EarlyTerminationEvent {
            reason: termination.to_string(),
            event_count,
            elapsed_ms: elapsed.as_millis() as u64,
        }));
        self.halted = Some(termination.clone());
        Err(termination)
    }
}

#[cfg(test)]
mod tests {
    use storyline_common::{logging::ensure_test_logging, ValueType};

    use super::*;

    fn tracer(max_events: usize) -> Tracer {
        ensure_test_logging(None);
        Tracer::new(TracerConfig { max_events, max_duration: Duration::from_secs(60) }, NullSink)
    }

    #[test]
    fn test_ids_are_shared_and_monotonic() {
        let mut tracer = tracer(100);
        assert_eq!(tracer.next_id(), 1);
        assert_eq!(tracer.next_id(), 2);
    }

    #[test]
    fn test_var_write_returns_value() {
        let mut tracer = tracer(100);
        let value = TracedValue::from_json(serde_json::json!([1, 2]));
        let returned = tracer.var_write(FrameId::Global, "xs", value.clone(), 3);
        assert_eq!(returned, value);
        let RawEvent::VarWrite(event) = &tracer.events()[0] else { panic!("expected a write") };
        assert_eq!(event.value.kind, ValueType::Array);
    }

    #[test]
    fn test_var_update_returns_old_value() {
        let mut tracer = tracer(100);
        let old = TracedValue::from_json(serde_json::json!(1));
        let new = TracedValue::from_json(serde_json::json!(2));
        assert_eq!(tracer.var_update(FrameId::Global, "i", old.clone(), new.clone(), 1), old);
        let RawEvent::VarWrite(event) = &tracer.events()[0] else { panic!("expected a write") };
        assert_eq!(event.value, new);
    }

    #[test]
    fn test_call_site_pairing_skips_uninstrumented_callees() {
        let mut tracer = tracer(100);
        tracer.before_call(1); // Math.max(...), never entered
        tracer.before_call(2);
        tracer.enter_func(1, "f", 5, 7, LexicalId::new("scope_1"), None, None, vec![]);
        tracer.before_call(6);
        tracer.exit_func(1, "f", 5, 7, LexicalId::new("scope_1"), TracedValue::undefined(), None);
        tracer.enter_func(2, "g", 8, 9, LexicalId::new("scope_2"), None, None, vec![]);

        let lines = tracer
            .events()
            .iter()
            .filter_map(|event| match event {
                RawEvent::EnterFunction(enter) => Some(enter.call_site_line),
                _ => None,
            })
            .collect::<Vec<_>>();
        assert_eq!(lines, vec![Some(2), Some(1)]);
    }

    #[test]
    fn test_event_budget_terminates_run() {
        let mut tracer = tracer(3);
        for line in 1..=4 {
            tracer.step(line, 0, "x++;", Some("ExpressionStatement"));
        }
        let err = tracer.iterate_loop().unwrap_err();
        assert_eq!(err, Termination::EventBudget { limit: 3 });
        assert!(matches!(tracer.events().last(), Some(RawEvent::EarlyTermination(event)) if event.event_count == 4));

        // Nothing more is recorded, and the loop stays stopped.
        tracer.step(5, 0, "x++;", None);
        tracer.done();
        assert_eq!(tracer.events().len(), 5);
        assert_eq!(tracer.iterate_loop(), Err(Termination::EventBudget { limit: 3 }));
    }

    #[test]
    fn test_time_budget_terminates_run() {
        ensure_test_logging(None);
        let mut tracer =
            Tracer::new(TracerConfig { max_events: 100, max_duration: Duration::ZERO }, NullSink);
        std::thread::sleep(Duration::from_millis(2));
        assert!(matches!(tracer.iterate_loop(), Err(Termination::TimeBudget { .. })));
        assert!(tracer.events()[0].is_terminal());
    }

    #[test]
    fn test_kill_switch_silences_tracer() {
        let mut tracer = tracer(100);
        let kill_switch = tracer.kill_switch();
        tracer.step(1, 0, "a;", None);
        kill_switch.kill();
        tracer.step(2, 0, "b;", None);
        assert_eq!(tracer.events().len(), 1);
        assert_eq!(tracer.iterate_loop(), Err(Termination::Killed));
    }

    #[test]
    fn test_uncaught_error_halts() {
        let mut tracer = tracer(100);
        tracer.uncaught_error("RangeError: Maximum call stack size exceeded");
        tracer.done();
        assert_eq!(tracer.events().len(), 1);
        assert!(matches!(tracer.termination(), Some(Termination::Uncaught(_))));
    }

    #[test]
    fn test_events_are_forwarded_serialized() {
        ensure_test_logging(None);
        let mut tracer = Tracer::new(TracerConfig::default(), Vec::<String>::new());
        tracer.console(
            ConsoleLevel::Log,
            &[TracedValue::from_json(serde_json::json!("count")), TracedValue::from_json(serde_json::json!(2))],
        );
        let RawEvent::ConsoleLog(event) = &tracer.events()[0] else { panic!("expected console output") };
        assert_eq!(event.message, "count 2");
    }
}
