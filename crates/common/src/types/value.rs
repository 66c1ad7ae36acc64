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

//! Values observed at runtime, as handed over by the execution host.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Coarse type tag attached to every traced value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    /// A number (including NaN and infinities, which travel as strings).
    Number,
    /// A string.
    String,
    /// A boolean.
    Boolean,
    /// A non-array, non-function object.
    Object,
    /// An array.
    Array,
    /// A function or class.
    Function,
    /// `null`.
    Null,
    /// `undefined`.
    #[default]
    Undefined,
    /// Anything else (symbols, bigints, ...).
    Other,
}

impl ValueType {
    /// Infers the type tag from a JSON rendering of a value.
    ///
    /// JSON has no `undefined` or function values, so hosts that can tell those
    /// apart should construct the [`TracedValue`] with an explicit tag instead.
    pub fn infer(value: &Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(_) => Self::Boolean,
            Value::Number(_) => Self::Number,
            Value::String(_) => Self::String,
            Value::Array(_) => Self::Array,
            Value::Object(_) => Self::Object,
        }
    }
}

/// A runtime value together with its type tag.
///
/// Serialized flat as `{"value": ..., "valueType": ...}` so it can be embedded
/// into event payloads with `#[serde(flatten)]`.
#[derive(Clone, Debug, PartialEq, Default, Serialize, Deserialize)]
pub struct TracedValue {
    /// JSON rendering of the value. `undefined` renders as `null`.
    #[serde(default)]
    pub value: Value,
    /// Type tag of the value.
    #[serde(rename = "valueType", default)]
    pub kind: ValueType,
}

impl TracedValue {
    /// Creates a traced value with an explicit type tag.
    pub fn new(value: Value, kind: ValueType) -> Self {
        Self { value, kind }
    }

    /// Creates a traced value, inferring the type tag from the JSON shape.
    pub fn from_json(value: Value) -> Self {
        let kind = ValueType::infer(&value);
        Self { value, kind }
    }

    /// The `undefined` value.
    pub fn undefined() -> Self {
        Self::default()
    }

    /// A function value, rendered by name.
    pub fn function(name: &str) -> Self {
        Self { value: Value::String(format!("[Function: {name}]")), kind: ValueType::Function }
    }

    /// Whether this is `undefined`.
    pub fn is_undefined(&self) -> bool {
        self.kind == ValueType::Undefined
    }

    /// Renders the value the way a console would print it: strings verbatim,
    /// everything else as compact JSON.
    pub fn display_text(&self) -> String {
        match (&self.kind, &self.value) {
            (ValueType::Undefined, _) => "undefined".to_string(),
            (_, Value::String(s)) => s.clone(),
            (_, other) => other.to_string(),
        }
    }
}

impl From<Value> for TracedValue {
    fn from(value: Value) -> Self {
        Self::from_json(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_infer_value_types() {
        assert_eq!(TracedValue::from_json(json!(1)).kind, ValueType::Number);
        assert_eq!(TracedValue::from_json(json!("a")).kind, ValueType::String);
        assert_eq!(TracedValue::from_json(json!([1])).kind, ValueType::Array);
        assert_eq!(TracedValue::from_json(json!({"a": 1})).kind, ValueType::Object);
        assert_eq!(TracedValue::from_json(json!(null)).kind, ValueType::Null);
        assert!(TracedValue::undefined().is_undefined());
    }

    #[test]
    fn test_display_text() {
        assert_eq!(TracedValue::from_json(json!("hi")).display_text(), "hi");
        assert_eq!(TracedValue::from_json(json!({"a": 1})).display_text(), r#"{"a":1}"#);
        assert_eq!(TracedValue::undefined().display_text(), "undefined");
        assert_eq!(TracedValue::function("inc").display_text(), "[Function: inc]");
    }

    #[test]
    fn test_missing_fields_default_to_undefined() {
        let value: TracedValue = serde_json::from_value(json!({})).unwrap();
        assert!(value.is_undefined());
        assert_eq!(value.value, Value::Null);
    }
}
