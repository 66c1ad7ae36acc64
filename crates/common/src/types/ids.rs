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

//! Identifiers shared by the tracer and the reconstructor.
//!
//! Two families of ids exist side by side: *invocation ids* name one live
//! activation of a function and are minted at call time, while *lexical ids*
//! name the (persistent) scope object of a function body and are minted once
//! at instrumentation time.

use std::fmt;

use derive_more::{Display, From};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

/// The sentinel used for the global scope, both as a lexical id and as the
/// bottom frame of the call stack.
pub const GLOBAL_SCOPE: &str = "global";

/// Identifier of one function activation, generated by the tracer's id counter.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, Default, PartialOrd, Ord, Serialize, Deserialize,
)]
#[derive(Display, From)]
#[serde(transparent)]
pub struct InvocationId(pub u64);

/// Identifier of a closure announcement, drawn from the same counter as invocation ids.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, Default, PartialOrd, Ord, Serialize, Deserialize,
)]
#[derive(Display, From)]
#[serde(transparent)]
pub struct ClosureId(pub u64);

/// Identifier of a lexical scope (`"global"` or an instrumenter-assigned `scope_N`).
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[derive(Display, From)]
#[serde(transparent)]
pub struct LexicalId(String);

impl LexicalId {
    /// Creates a lexical id from any string-like value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The lexical id of the global scope.
    pub fn global() -> Self {
        Self(GLOBAL_SCOPE.to_string())
    }

    /// Whether this id names the global scope.
    pub fn is_global(&self) -> bool {
        self.0 == GLOBAL_SCOPE
    }

    /// Whether this id is one of the placeholder values an instrumented program
    /// may produce when the parent scope could not be determined.
    pub fn is_sentinel(&self) -> bool {
        matches!(self.0.as_str(), "" | "undefined" | "null")
    }

    /// Borrows the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for LexicalId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// A frame on the reconstructed call stack, and the scope reference carried by
/// variable writes: either the global sentinel or a live invocation.
///
/// On the wire this is the string `"global"` or the bare invocation number.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FrameId {
    /// The top-level program.
    Global,
    /// A function activation.
    Invocation(InvocationId),
}

impl FrameId {
    /// Returns the invocation id, if this is not the global frame.
    pub fn invocation(&self) -> Option<InvocationId> {
        match self {
            Self::Global => None,
            Self::Invocation(id) => Some(*id),
        }
    }
}

impl From<InvocationId> for FrameId {
    fn from(value: InvocationId) -> Self {
        Self::Invocation(value)
    }
}

impl fmt::Display for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Global => f.write_str(GLOBAL_SCOPE),
            Self::Invocation(id) => write!(f, "{id}"),
        }
    }
}

impl Serialize for FrameId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Global => serializer.serialize_str(GLOBAL_SCOPE),
            Self::Invocation(id) => serializer.serialize_u64(id.0),
        }
    }
}

impl<'de> Deserialize<'de> for FrameId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct FrameIdVisitor;

        impl de::Visitor<'_> for FrameIdVisitor {
            type Value = FrameId;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("\"global\" or a non-negative invocation number")
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<FrameId, E> {
                Ok(FrameId::Invocation(InvocationId(v)))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<FrameId, E> {
                u64::try_from(v)
                    .map(|v| FrameId::Invocation(InvocationId(v)))
                    .map_err(|_| E::custom(format!("negative invocation id {v}")))
            }

            fn visit_f64<E: de::Error>(self, v: f64) -> Result<FrameId, E> {
                // Script hosts hand numbers over as doubles.
                if v >= 0.0 && v.fract() == 0.0 && v <= u64::MAX as f64 {
                    Ok(FrameId::Invocation(InvocationId(v as u64)))
                } else {
                    Err(E::custom(format!("invalid invocation id {v}")))
                }
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<FrameId, E> {
                if v == GLOBAL_SCOPE {
                    return Ok(FrameId::Global);
                }
                v.parse::<u64>()
                    .map(|v| FrameId::Invocation(InvocationId(v)))
                    .map_err(|_| E::custom(format!("unknown scope reference {v:?}")))
            }
        }

        deserializer.deserialize_any(FrameIdVisitor)
    }
}
