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

//! Raw log normalization applied before reduction.

use std::collections::HashMap;

use serde_json::Value;
use storyline_common::RawEvent;
use tracing::debug;

/// Keeps only the last `RESOLVE_PROMISE` event of every promise id. Every
/// other event keeps its position.
pub fn dedup_resolved_promises(events: Vec<RawEvent>) -> Vec<RawEvent> {
    keep_last_resolution(events, |event| match event {
        RawEvent::ResolvePromise(resolved) => Some(resolved.promise_id.as_str()),
        _ => None,
    })
}

/// [`dedup_resolved_promises`] over a log still in JSON form.
pub fn dedup_resolved_promise_values(values: Vec<Value>) -> Vec<Value> {
    keep_last_resolution(values, |value| {
        if value.get("type").and_then(Value::as_str) != Some("RESOLVE_PROMISE") {
            return None;
        }
        value.get("payload")?.get("promiseId")?.as_str()
    })
}

fn keep_last_resolution<T>(items: Vec<T>, promise_id: impl Fn(&T) -> Option<&str>) -> Vec<T> {
    let mut last = HashMap::new();
    for (index, item) in items.iter().enumerate() {
        if let Some(id) = promise_id(item) {
            last.insert(id.to_string(), index);
        }
    }

    let before = items.len();
    let kept = items
        .into_iter()
        .enumerate()
        .filter(|(index, item)| promise_id(item).is_none_or(|id| last.get(id) == Some(index)))
        .map(|(_, item)| item)
        .collect::<Vec<_>>();

    if kept.len() != before {
        debug!(dropped = before - kept.len(), "dropped duplicate promise resolutions");
    }
    kept
}
