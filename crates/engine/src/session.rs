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

//! Session orchestration.
//!
//! A [`Session`] owns at most one live run. It consumes control messages,
//! instruments submitted code, hands the instrumented program to an
//! [`ExecutionHost`] on a blocking worker, and once the run ends reduces the
//! collected raw events into the messages sent to the presentation layer.

use std::sync::Arc;

use eyre::{Result, WrapErr};
use storyline_common::{ControlMessage, OutboundMessage, RawEvent};
use tokio::{
    sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender},
    task::JoinHandle,
};
use tracing::{debug, error, info, warn};

use crate::{
    config::EngineConfig,
    instrumentation::{instrument, InstrumentedProgram},
    reconstruct::{dedup_resolved_promises, reduce},
    tracer::{ChannelSink, KillSwitch, Termination, Tracer},
};

/// Runs instrumented programs against a [`Tracer`].
///
/// The host binds the tracer's callbacks to the program's `__tracer` object,
/// executes the program and returns once it completes. Any error escaping
/// the program, including the termination raised by `iterateLoop`, must end
/// the run with `Err`.
///
/// Instrumented code calls these hooks:
///
/// | Hook | Tracer method |
/// |---|---|
/// | `step(line, column, text, kind)` | [`Tracer::step`] |
/// | `iterateLoop()` | [`Tracer::iterate_loop`] |
/// | `nextId()` | [`Tracer::next_id`] |
/// | `captureLocals(scope, parent, params, locals)` | [`Tracer::capture_locals`] |
/// | `captureClosure(id, scope, parent, bindings)` | [`Tracer::capture_closure`] |
/// | `varWrite(frame, name, value, line)` | [`Tracer::var_write`] |
/// | `varUpdate(frame, name, old, new, line)` | [`Tracer::var_update`] |
/// | `varRead(name, value)` | [`Tracer::var_read`] |
/// | `beforeCall(line)` | [`Tracer::before_call`] |
/// | `enterFunc(id, name, start, end, scope, this, callSite, args)` | [`Tracer::enter_func`] |
/// | `exitFunc(id, name, start, end, scope, value, line)` | [`Tracer::exit_func`] |
/// | `errorFunc(message, id, name, start, end)` | [`Tracer::error_func`] |
///
/// Value hooks carry no type argument. The host tags each value while
/// converting it into a [`TracedValue`](storyline_common::TracedValue), from
/// the engine's `typeof` or with [`ValueType::infer`](storyline_common::ValueType::infer).
/// Every value hook returns its value unchanged to the program.
pub trait ExecutionHost: Send + Sync + 'static {
    /// Executes `program` to completion.
    fn execute(&self, program: &InstrumentedProgram, tracer: &mut Tracer) -> Result<()>;

    /// Forcibly stops a run that does not reach a loop boundary.
    fn interrupt(&self) {}
}

impl<F> ExecutionHost for F
where
    F: Fn(&InstrumentedProgram, &mut Tracer) -> Result<()> + Send + Sync + 'static,
{
    fn execute(&self, program: &InstrumentedProgram, tracer: &mut Tracer) -> Result<()> {
        self(program, tracer)
    }
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
enum RunOutcome {
    Completed,
    Terminated(Termination),
    Failed(String),
    Killed,
}

struct ActiveRun {
    kill_switch: KillSwitch,
    task: JoinHandle<()>,
}

/// One logical session with the presentation layer.
pub struct Session<H> {
    host: Arc<H>,
    config: EngineConfig,
    outbound: UnboundedSender<OutboundMessage>,
    current: Option<ActiveRun>,
}

impl<H: ExecutionHost> Session<H> {
    /// Creates a session and the receiver of its outbound messages.
    pub fn new(host: H, config: EngineConfig) -> (Self, UnboundedReceiver<OutboundMessage>) {
        let (outbound, receiver) = unbounded_channel();
        (Self { host: Arc::new(host), config, outbound, current: None }, receiver)
    }

    /// The session configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Whether a run is in progress.
    pub fn is_running(&self) -> bool {
        self.current.as_ref().is_some_and(|run| !run.task.is_finished())
    }

    /// Handles a control message in its JSON form. A message that does not
    /// parse is answered with `EXECUTION_ERROR` and changes nothing.
    pub fn handle_text(&mut self, text: &str) {
        match ControlMessage::parse(text) {
            Ok(message) => self.handle(message),
            Err(err) => {
                warn!(error = %err, "rejected malformed control message");
                self.send(OutboundMessage::execution_error(format!("invalid control message: {err}")));
            }
        }
    }

    /// Handles a control message.
    pub fn handle(&mut self, message: ControlMessage) {
        match message {
            ControlMessage::RunCode { code } => self.run(&code),
            ControlMessage::Stop => self.stop(),
        }
    }

    /// Stops the run in progress, if any. A stopped run reports nothing.
    pub fn stop(&mut self) {
        if let Some(run) = self.current.take() {
            if !run.task.is_finished() {
                info!("stopping run in progress");
            }
            run.kill_switch.kill();
            self.host.interrupt();
            run.task.abort();
        }
    }

    /// Starts a run of `code`, stopping the previous one first.
    pub fn run(&mut self, code: &str) {
        self.stop();

        let program = match instrument(code, &self.config.instrument) {
            Ok(program) => program,
            Err(err) => {
                warn!(error = %err, "instrumentation failed");
                self.send(OutboundMessage::execution_error(err.to_string()));
                return;
            }
        };
        debug!(functions = program.functions, insertions = program.insertions, "starting run");

        let (events_tx, events_rx) = unbounded_channel();
        let tracer = Tracer::new(self.config.tracer, ChannelSink::new(events_tx));
        let kill_switch = tracer.kill_switch();
        let task = tokio::spawn(drive_run(
            Arc::clone(&self.host),
            program,
            tracer,
            events_rx,
            self.outbound.clone(),
        ));
        self.current = Some(ActiveRun { kill_switch, task });
    }

    /// Waits for the run in progress to finish reporting.
    pub async fn wait(&mut self) -> Result<()> {
        let Some(run) = self.current.take() else { return Ok(()) };
        match run.task.await {
            Err(err) if err.is_cancelled() => Ok(()),
            result => result.wrap_err("run task failed"),
        }
    }

    fn send(&self, message: OutboundMessage) {
        if self.outbound.send(message).is_err() {
            debug!("outbound receiver dropped");
        }
    }
}

impl<H> Drop for Session<H> {
    fn drop(&mut self) {
        if let Some(run) = self.current.take() {
            run.kill_switch.kill();
            run.task.abort();
        }
    }
}

async fn drive_run<H: ExecutionHost>(
    host: Arc<H>,
    program: InstrumentedProgram,
    tracer: Tracer,
    mut events_rx: UnboundedReceiver<String>,
    outbound: UnboundedSender<OutboundMessage>,
) {
    let kill_switch = tracer.kill_switch();
    let worker = tokio::task::spawn_blocking(move || execute(host.as_ref(), &program, tracer));

    // The sender lives in the tracer, so the channel closes when the worker ends.
    let mut events = vec![];
    while let Some(serialized) = events_rx.recv().await {
        match serde_json::from_str::<RawEvent>(&serialized) {
            Ok(event) => events.push(event),
            Err(err) => warn!(error = %err, "dropping undecodable event"),
        }
    }

    let outcome = match worker.await {
        Ok(outcome) => outcome,
        Err(err) => RunOutcome::Failed(format!("execution host panicked: {err}")),
    };
    if outcome == RunOutcome::Killed || kill_switch.is_killed() {
        debug!("run stopped, discarding {} events", events.len());
        return;
    }

    let events = dedup_resolved_promises(events);
    let stories = reduce(&events);
    info!(events = events.len(), stories = stories.len(), ?outcome, "run finished");

    let mut messages = vec![OutboundMessage::StoryList(stories), OutboundMessage::EventList(events)];
    if let RunOutcome::Failed(message) = outcome {
        messages.push(OutboundMessage::execution_error(message));
    }
    for message in messages {
        if outbound.send(message).is_err() {
            debug!("outbound receiver dropped");
            break;
        }
    }
}

fn execute<H: ExecutionHost>(host: &H, program: &InstrumentedProgram, mut tracer: Tracer) -> RunOutcome {
    let result = host.execute(program, &mut tracer);
    match (result, tracer.termination().cloned()) {
        (_, Some(Termination::Killed)) => RunOutcome::Killed,
        (_, Some(Termination::Uncaught(message))) => RunOutcome::Failed(message),
        (_, Some(termination)) => RunOutcome::Terminated(termination),
        (Ok(()), None) => {
            tracer.done();
            RunOutcome::Completed
        }
        (Err(err), None) => {
            let message = format!("{err:#}");
            error!(error = %message, "uncaught error");
            tracer.uncaught_error(&message);
            RunOutcome::Failed(message)
        }
    }
}
