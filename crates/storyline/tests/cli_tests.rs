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

use std::fs;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::tempdir;
use tracing::info;

fn storyline() -> Command {
    let mut cmd = Command::cargo_bin("storyline").unwrap();
    cmd.env_remove("STORYLINE_MAX_EVENTS")
        .env_remove("STORYLINE_MAX_DURATION_MS")
        .env_remove("STORYLINE_TRACE_READS");
    cmd
}

#[test]
fn test_help_command() {
    storyline_common::logging::ensure_test_logging(None);
    info!("Testing CLI help command");
    storyline().arg("--help").assert().success().stdout(predicate::str::contains("step-through stories"));
}

#[test]
fn test_version_command() {
    storyline_common::logging::ensure_test_logging(None);
    info!("Running test");
    storyline().arg("--version").assert().success().stdout(predicate::str::contains("storyline"));
}

#[test]
fn test_missing_subcommand() {
    storyline_common::logging::ensure_test_logging(None);
    info!("Running test");
    storyline().assert().failure().stderr(predicate::str::contains("Usage"));
}

#[test]
fn test_instrument_to_stdout() {
    storyline_common::logging::ensure_test_logging(None);
    info!("Running test");
    let dir = tempdir().unwrap();
    let script = dir.path().join("hello.js");
    fs::write(&script, "let greeting = 'hi';\nconsole.log(greeting);\n").unwrap();

    storyline()
        .arg("instrument")
        .arg(&script)
        .assert()
        .success()
        .stdout(predicate::str::starts_with("__tracer.captureLocals(\"global\", null, [], [\"greeting\"]);"))
        .stdout(predicate::str::contains("__tracer.varWrite(\"global\", \"greeting\", 'hi', 1)"))
        .stdout(predicate::str::contains("varRead").not());
}

#[test]
fn test_instrument_with_reads_to_file() {
    storyline_common::logging::ensure_test_logging(None);
    info!("Running test");
    let dir = tempdir().unwrap();
    let script = dir.path().join("reads.js");
    let output = dir.path().join("reads.instrumented.js");
    fs::write(&script, "let a = 1;\nlet b = a;\n").unwrap();

    storyline()
        .env("STORYLINE_TRACE_READS", "true")
        .arg("instrument")
        .arg(&script)
        .arg("--output")
        .arg(&output)
        .assert()
        .success()
        .stdout(predicate::str::is_empty());
    let code = fs::read_to_string(&output).unwrap();
    assert!(code.contains("__tracer.varRead(\"a\", a)"));
}

#[test]
fn test_instrument_reports_syntax_errors() {
    storyline_common::logging::ensure_test_logging(None);
    info!("Running test");
    let dir = tempdir().unwrap();
    let script = dir.path().join("broken.js");
    fs::write(&script, "let ok = 1;\nlet = = 2;\n").unwrap();

    storyline()
        .arg("instrument")
        .arg(&script)
        .assert()
        .failure()
        .stderr(predicate::str::contains("broken.js:2:"))
        .stderr(predicate::str::contains("syntax error"));
}

#[test]
fn test_reduce_event_lines() {
    storyline_common::logging::ensure_test_logging(None);
    info!("Running test");
    let dir = tempdir().unwrap();
    let log = dir.path().join("events.jsonl");
    let events = [
        r#"{"type":"LOCALS","payload":{"scopeId":"global","parentId":null,"params":[],"locals":["x"]}}"#,
        r#"{"type":"STEP","payload":{"line":1,"col":0,"snippet":"x = 1;","statementKind":"ExpressionStatement"}}"#,
        r#"{"type":"VAR_WRITE","payload":{"scopeId":"global","name":"x","value":1,"valueType":"number","line":1}}"#,
        r#"{"type":"RESOLVE_PROMISE","payload":{"promiseId":"p1","value":1,"valueType":"number"}}"#,
        r#"{"type":"RESOLVE_PROMISE","payload":{"promiseId":"p1","value":1,"valueType":"number"}}"#,
        r#"{"type":"CONSOLE_LOG","payload":{"message":"1\n"}}"#,
        r#"{"type":"DONE","payload":{}}"#,
    ];
    fs::write(&log, events.join("\n")).unwrap();

    storyline()
        .arg("reduce")
        .arg(&log)
        .assert()
        .success()
        .stdout(predicate::str::starts_with(r#"{"type":"STORY_LIST","payload":[{"type":"STEP_LINE""#))
        .stdout(predicate::str::contains(
            r#"{"type":"ASSIGN","payload":{"name":"x","value":1,"valueType":"number","scopeId":"global","line":1}}"#,
        ))
        .stdout(predicate::str::contains(r#"{"type":"CONSOLE","payload":{"level":"log","message":"1"}}"#));
}

#[test]
fn test_reduce_reports_malformed_events_inline() {
    storyline_common::logging::ensure_test_logging(None);
    info!("Running test");
    let dir = tempdir().unwrap();
    let log = dir.path().join("events.json");
    fs::write(&log, r#"[{"type":"ENTER_FUNCTION","payload":{"name":42}}, {"type":"DONE"}]"#).unwrap();

    storyline()
        .arg("reduce")
        .arg(&log)
        .arg("--pretty")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"type\": \"INTERNAL_ERROR\""))
        .stdout(predicate::str::contains("\"kind\": \"ENTER_FUNCTION\""));
}

#[test]
fn test_config_reflects_environment() {
    storyline_common::logging::ensure_test_logging(None);
    info!("Running test");
    storyline()
        .env("STORYLINE_MAX_EVENTS", "42")
        .arg("--max-duration-ms")
        .arg("250")
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"max_events\": 42"))
        .stdout(predicate::str::contains("\"max_duration\": 250"))
        .stdout(predicate::str::contains("\"trace_reads\": false"));
}
