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

use std::time::Duration;

use eyre::Result;
use storyline_common::{OutboundMessage, RawEvent, StoryEvent, TracedValue};
use storyline_engine::{EngineConfig, InstrumentedProgram, Session, Tracer};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::info;

/// Pretends to execute a program: every run logs one line, `spin` loops
/// until stopped and `boom` throws.
fn scripted_host(program: &InstrumentedProgram, tracer: &mut Tracer) -> Result<()> {
    tracer.step(1, 0, "console.log(\"hi\");", Some("ExpressionStatement"));
    tracer.console(storyline_common::ConsoleLevel::Log, &[TracedValue::from_json("hi".into())]);
    if program.code.contains("spin") {
        loop {
            tracer.iterate_loop()?;
            tracer.step(2, 0, "spin();", Some("ExpressionStatement"));
            std::thread::sleep(Duration::from_millis(1));
        }
    }
    if program.code.contains("boom") {
        eyre::bail!("Error: boom");
    }
    Ok(())
}

fn drain(receiver: &mut UnboundedReceiver<OutboundMessage>) -> Vec<OutboundMessage> {
    std::iter::from_fn(|| receiver.try_recv().ok()).collect()
}

fn kinds(messages: &[OutboundMessage]) -> Vec<&'static str> {
    messages.iter().map(OutboundMessage::kind).collect()
}

#[tokio::test]
async fn test_completed_run_reports_story_and_events() {
    storyline_common::logging::ensure_test_logging(None);
    info!("Running test");
    let (mut session, mut receiver) = Session::new(scripted_host, EngineConfig::default());
    session.handle_text(r#"{"type":"RUN_CODE","code":"console.log(\"hi\");"}"#);
    session.wait().await.unwrap();

    let messages = drain(&mut receiver);
    assert_eq!(kinds(&messages), ["STORY_LIST", "EVENT_LIST"]);
    let OutboundMessage::StoryList(stories) = &messages[0] else { panic!("expected a story") };
    assert!(matches!(&stories[1], StoryEvent::Console(console) if console.message == "hi"));
    let OutboundMessage::EventList(events) = &messages[1] else { panic!("expected events") };
    assert!(matches!(events.last(), Some(RawEvent::Done(_))));
    assert!(!session.is_running());
}

#[tokio::test]
async fn test_uncaught_error_is_reported() {
    storyline_common::logging::ensure_test_logging(None);
    info!("Running test");
    let (mut session, mut receiver) = Session::new(scripted_host, EngineConfig::default());
    session.run("boom();");
    session.wait().await.unwrap();

    let messages = drain(&mut receiver);
    assert_eq!(kinds(&messages), ["STORY_LIST", "EVENT_LIST", "EXECUTION_ERROR"]);
    let OutboundMessage::EventList(events) = &messages[1] else { panic!("expected events") };
    assert!(matches!(events.last(), Some(RawEvent::UncaughtError(error)) if error.message == "Error: boom"));
    assert_eq!(messages[2], OutboundMessage::execution_error("Error: boom"));
}

#[tokio::test]
async fn test_instrumentation_failure_produces_no_events() {
    storyline_common::logging::ensure_test_logging(None);
    info!("Running test");
    let (mut session, mut receiver) = Session::new(scripted_host, EngineConfig::default());
    session.run("let = ;");
    session.wait().await.unwrap();

    let messages = drain(&mut receiver);
    assert_eq!(kinds(&messages), ["EXECUTION_ERROR"]);
    let OutboundMessage::ExecutionError(error) = &messages[0] else { unreachable!() };
    assert!(error.message.starts_with("syntax error"));
}

#[tokio::test]
async fn test_malformed_control_message_changes_nothing() {
    storyline_common::logging::ensure_test_logging(None);
    info!("Running test");
    let (mut session, mut receiver) = Session::new(scripted_host, EngineConfig::default());
    for text in ["not json", r#"{"type":"PAUSE"}"#, r#"{"type":"RUN_CODE"}"#] {
        session.handle_text(text);
    }
    assert!(!session.is_running());
    session.wait().await.unwrap();
    assert_eq!(kinds(&drain(&mut receiver)), ["EXECUTION_ERROR"; 3]);
}

#[tokio::test]
async fn test_event_budget_ends_run_with_terminated_story() {
    storyline_common::logging::ensure_test_logging(None);
    info!("Running test");
    let config = EngineConfig::default().with_max_events(25);
    let (mut session, mut receiver) = Session::new(scripted_host, config);
    session.run("while (true) spin();");
    session.wait().await.unwrap();

    let messages = drain(&mut receiver);
    assert_eq!(kinds(&messages), ["STORY_LIST", "EVENT_LIST"]);
    let OutboundMessage::StoryList(stories) = &messages[0] else { panic!("expected a story") };
    assert!(matches!(stories.last(), Some(StoryEvent::Terminated(_))));
    let OutboundMessage::EventList(events) = &messages[1] else { panic!("expected events") };
    let terminations = events.iter().filter(|event| matches!(event, RawEvent::EarlyTermination(_))).count();
    assert_eq!(terminations, 1);
}

#[tokio::test]
async fn test_new_run_replaces_previous_one() {
    storyline_common::logging::ensure_test_logging(None);
    info!("Running test");
    let config = EngineConfig::default().with_max_duration(Duration::from_secs(30)).with_max_events(1_000_000);
    let (mut session, mut receiver) = Session::new(scripted_host, config);
    session.handle_text(r#"{"type":"RUN_CODE","code":"while (true) spin();"}"#);
    assert!(session.is_running());
    session.handle_text(r#"{"type":"RUN_CODE","code":"console.log(\"hi\");"}"#);
    session.wait().await.unwrap();

    let messages = drain(&mut receiver);
    assert_eq!(kinds(&messages), ["STORY_LIST", "EVENT_LIST"]);
    let OutboundMessage::EventList(events) = &messages[1] else { panic!("expected events") };
    assert!(matches!(events.last(), Some(RawEvent::Done(_))));
}

#[tokio::test]
async fn test_stop_discards_run() {
    storyline_common::logging::ensure_test_logging(None);
    info!("Running test");
    let config = EngineConfig::default().with_max_duration(Duration::from_secs(30)).with_max_events(1_000_000);
    let (mut session, mut receiver) = Session::new(scripted_host, config);
    session.run("while (true) spin();");
    tokio::time::sleep(Duration::from_millis(20)).await;
    session.handle_text(r#"{"type":"STOP"}"#);
    session.wait().await.unwrap();
    assert!(!session.is_running());
    assert!(drain(&mut receiver).is_empty());
}
