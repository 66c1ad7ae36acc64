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

use storyline_engine::{EngineConfig, InstrumentConfig, TracerConfig};
use tracing::info;

#[test]
fn test_default_config() {
    storyline_common::logging::ensure_test_logging(None);
    info!("Running test");
    let config = EngineConfig::default();

    assert!(!config.instrument.trace_reads);
    assert_eq!(config.tracer.max_events, storyline_engine::DEFAULT_MAX_EVENTS);
    assert_eq!(config.tracer.max_duration, storyline_engine::DEFAULT_MAX_DURATION);
}

#[test]
fn test_config_with_custom_values() {
    storyline_common::logging::ensure_test_logging(None);
    info!("Running test");
    let config = EngineConfig {
        instrument: InstrumentConfig { trace_reads: true },
        tracer: TracerConfig { max_events: 500, max_duration: Duration::from_millis(250) },
    };

    assert!(config.instrument.trace_reads);
    assert_eq!(config.tracer.max_events, 500);
    assert_eq!(config.tracer.max_duration, Duration::from_millis(250));
}

#[test]
fn test_config_serialization() {
    storyline_common::logging::ensure_test_logging(None);
    info!("Running test");
    let config = EngineConfig::default().with_max_duration(Duration::from_millis(1500));
    let json = serde_json::to_value(config).unwrap();

    assert_eq!(json["tracer"]["max_duration"], 1500);
    assert_eq!(serde_json::from_value::<EngineConfig>(json).unwrap(), config);
}
