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

//! Destinations for serialized raw events.

use tokio::sync::mpsc::UnboundedSender;
use tracing::warn;

/// Receives every event the tracer emits, serialized as one JSON envelope.
pub trait EventSink: Send {
    /// Hands one serialized event over.
    fn forward(&mut self, event: String);
}

/// Collects events in memory.
impl EventSink for Vec<String> {
    fn forward(&mut self, event: String) {
        self.push(event);
    }
}

/// Drops every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn forward(&mut self, _event: String) {}
}

/// Relays events over a channel, typically to the task driving a session.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    sender: UnboundedSender<String>,
    closed: bool,
}

impl ChannelSink {
    /// Creates a sink relaying into `sender`.
    pub fn new(sender: UnboundedSender<String>) -> Self {
        Self { sender, closed: false }
    }
}

impl EventSink for ChannelSink {
    fn forward(&mut self, event: String) {
        if self.closed {
            return;
        }
        if self.sender.send(event).is_err() {
            warn!("event receiver dropped, discarding further events");
            self.closed = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use tokio::sync::mpsc::unbounded_channel;

    use super::*;

    #[test]
    fn test_channel_sink_relays_until_closed() {
        let (sender, mut receiver) = unbounded_channel();
        let mut sink = ChannelSink::new(sender);
        sink.forward("a".into());
        assert_eq!(receiver.try_recv().unwrap(), "a");
        drop(receiver);
        sink.forward("b".into());
        assert!(sink.closed);
    }
}
