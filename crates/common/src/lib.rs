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

//! Storyline Common - Shared functionality for Storyline components
//!
//! This crate provides the event model exchanged between the runtime tracer
//! and the trace reconstructor, the message protocol spoken with the
//! presentation layer, and the logging setup used by every binary.

/// Logging setup and utilities for consistent logging across Storyline components
pub mod logging;
/// Control and data messages exchanged with the presentation layer
pub mod protocol;
/// Raw trace events, story events, identifiers and traced values
pub mod types;

pub use logging::*;
pub use protocol::*;
pub use types::*;
