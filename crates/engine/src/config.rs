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

//! Engine configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default ceiling on the number of events a run may emit.
pub const DEFAULT_MAX_EVENTS: usize = 10_000;

/// Default ceiling on the wall time of a run.
pub const DEFAULT_MAX_DURATION: Duration = Duration::from_millis(1000);

/// Options of the source instrumenter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstrumentConfig {
    /// Wrap identifier reads so they are reported as `VAR_READ` events.
    pub trace_reads: bool,
}

/// Safety valve of the runtime tracer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TracerConfig {
    /// Events a run may emit before it is terminated.
    pub max_events: usize,
    /// Wall time a run may take before it is terminated.
    #[serde(with = "duration_ms")]
    pub max_duration: Duration,
}

impl Default for TracerConfig {
    fn default() -> Self {
        Self { max_events: DEFAULT_MAX_EVENTS, max_duration: DEFAULT_MAX_DURATION }
    }
}

/// Configuration for the Storyline engine.
///
/// Aggregates the instrumenter options and the tracer budget used for every
/// run of a session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Instrumenter options.
    pub instrument: InstrumentConfig,
    /// Tracer budget.
    pub tracer: TracerConfig,
}

impl EngineConfig {
    /// Enable or disable read tracing
    pub fn with_trace_reads(mut self, trace_reads: bool) -> Self {
        self.instrument.trace_reads = trace_reads;
        self
    }

    /// Set the event budget of a run
    pub fn with_max_events(mut self, max_events: usize) -> Self {
        self.tracer.max_events = max_events;
        self
    }

    /// Set the wall time budget of a run
    pub fn with_max_duration(mut self, max_duration: Duration) -> Self {
        self.tracer.max_duration = max_duration;
        self
    }
}

mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub(super) fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert!(!config.instrument.trace_reads);
        assert_eq!(config.tracer.max_events, 10_000);
        assert_eq!(config.tracer.max_duration, Duration::from_secs(1));
    }

    #[test]
    fn test_builders() {
        let config = EngineConfig::default()
            .with_trace_reads(true)
            .with_max_events(5)
            .with_max_duration(Duration::from_millis(20));
        assert!(config.instrument.trace_reads);
        assert_eq!(config.tracer, TracerConfig { max_events: 5, max_duration: Duration::from_millis(20) });
    }

    #[test]
    fn test_serialized_duration_is_millis() {
        let json = serde_json::to_value(TracerConfig::default()).unwrap();
        assert_eq!(json, serde_json::json!({"max_events": 10000, "max_duration": 1000}));
    }
}
