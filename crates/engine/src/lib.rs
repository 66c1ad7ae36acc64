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

//! Storyline engine: instruments scripts, traces their execution and
//! rebuilds the story of a run.
//!
//! The pipeline runs source → [`instrument`] → instrumented source executed by
//! an [`ExecutionHost`] against a [`Tracer`] → raw events →
//! [`dedup_resolved_promises`] → [`reduce`] → story events. [`Session`] wires
//! the stages together behind the control protocol.

pub mod config;
pub use config::*;

pub mod instrumentation;
pub use instrumentation::{instrument, InstrumentError, InstrumentedProgram};

pub mod parser;

pub mod reconstruct;
pub use reconstruct::*;

pub mod session;
pub use session::*;

pub mod tracer;
pub use tracer::*;
