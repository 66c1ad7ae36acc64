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

//! Reduce command - rebuild the story of a recorded raw event log

use std::{fs, path::Path};

use eyre::{Result, WrapErr};
use serde_json::Value;
use storyline_common::OutboundMessage;
use storyline_engine::{dedup_resolved_promise_values, reduce_values};

/// Parse a raw event log: a JSON array, or one JSON event per line
pub fn parse_log(text: &str) -> Result<Vec<Value>> {
    let trimmed = text.trim_start();
    if trimmed.starts_with('[') {
        return serde_json::from_str(trimmed).wrap_err("invalid event array");
    }
    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(index, line)| {
            serde_json::from_str(line).wrap_err_with(|| format!("invalid event on line {}", index + 1))
        })
        .collect()
}

/// Reduce the log in `events` and print the resulting `STORY_LIST` message
pub fn reduce_file(events: &Path, pretty: bool) -> Result<()> {
    let text =
        fs::read_to_string(events).wrap_err_with(|| format!("failed to read {}", events.display()))?;
    let values = dedup_resolved_promise_values(parse_log(&text)?);
    let count = values.len();
    let stories = reduce_values(values);
    tracing::info!(events = count, stories = stories.len(), "Reduced event log");

    let message = OutboundMessage::StoryList(stories);
    let json =
        if pretty { serde_json::to_string_pretty(&message)? } else { serde_json::to_string(&message)? };
    println!("{json}");
    Ok(())
}
