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

//! Message protocol between a Storyline session and the presentation layer
//!
//! The presentation layer drives a session with control messages (run some
//! code, stop the current run) and receives the reconstructed story, the raw
//! event log it was built from, and execution errors.

use serde::{Deserialize, Serialize};

use crate::types::{RawEvent, StoryEvent};

/// Control message sent from the presentation layer to a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ControlMessage {
    /// Instrument and execute a script, aborting any run in progress
    RunCode {
        /// Script source text
        code: String,
    },
    /// Abort the run in progress, if any
    Stop,
}

impl ControlMessage {
    /// Parse a control message from its JSON text
    pub fn parse(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }
}

/// Payload of an [`OutboundMessage::ExecutionError`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionErrorPayload {
    /// Error description
    pub message: String,
}

/// Data message sent from a session to the presentation layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OutboundMessage {
    /// The reconstructed story of the last run
    StoryList(Vec<StoryEvent>),
    /// The de-duplicated raw event log of the last run
    EventList(Vec<RawEvent>),
    /// Instrumentation failure, uncaught runtime error, or rejected control message
    ExecutionError(ExecutionErrorPayload),
}

impl OutboundMessage {
    /// Create an execution error message
    pub fn execution_error(message: impl Into<String>) -> Self {
        Self::ExecutionError(ExecutionErrorPayload { message: message.into() })
    }

    /// The wire type string of this message
    pub fn kind(&self) -> &'static str {
        match self {
            Self::StoryList(_) => "STORY_LIST",
            Self::EventList(_) => "EVENT_LIST",
            Self::ExecutionError(_) => "EXECUTION_ERROR",
        }
    }
}
