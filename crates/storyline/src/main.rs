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

//! Storyline - turn script executions into step-through stories
//!
//! Command-line access to the instrumenter and the story reconstructor.

use std::{path::PathBuf, time::Duration};

use clap::{Parser, Subcommand};
use eyre::Result;
use storyline_engine::{EngineConfig, DEFAULT_MAX_DURATION, DEFAULT_MAX_EVENTS};

mod cmd;

/// Command-line interface for Storyline
#[derive(Debug, Parser)]
#[command(name = "storyline")]
#[command(about = "Storyline - turn script executions into step-through stories")]
#[command(version)]
pub struct Cli {
    /// Events a run may emit before it is terminated
    #[arg(long, global = true, env = "STORYLINE_MAX_EVENTS", default_value_t = DEFAULT_MAX_EVENTS)]
    pub max_events: usize,

    /// Milliseconds a run may take before it is terminated
    #[arg(long, global = true, env = "STORYLINE_MAX_DURATION_MS", default_value_t = DEFAULT_MAX_DURATION.as_millis() as u64)]
    pub max_duration_ms: u64,

    /// Report identifier reads as VAR_READ events
    #[arg(long, global = true, env = "STORYLINE_TRACE_READS")]
    pub trace_reads: bool,

    /// Also write logs to a daily rolling file
    #[arg(long, global = true)]
    pub log_file: bool,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Engine configuration assembled from flags and environment
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig::default()
            .with_trace_reads(self.trace_reads)
            .with_max_events(self.max_events)
            .with_max_duration(Duration::from_millis(self.max_duration_ms))
    }
}

/// Available commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Print the instrumented version of a script
    Instrument {
        /// Script to instrument
        file: PathBuf,

        /// Write the result here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Rebuild the story of a recorded raw event log
    Reduce {
        /// Raw event log, as a JSON array or one event per line
        events: PathBuf,

        /// Pretty-print the story
        #[arg(long)]
        pretty: bool,
    },
    /// Print the effective engine configuration
    Config,
}

fn main() -> Result<()> {
    // Load environment variables
    dotenv::dotenv().ok();

    // Parse CLI arguments
    let cli = Cli::parse();

    storyline_common::logging::init_logging("storyline", cli.log_file)?;

    let config = cli.engine_config();
    match &cli.command {
        Commands::Instrument { file, output } => {
            tracing::info!("Instrumenting {}", file.display());
            cmd::instrument_file(file, output.as_deref(), &config)
        }
        Commands::Reduce { events, pretty } => {
            tracing::info!("Reducing {}", events.display());
            cmd::reduce_file(events, *pretty)
        }
        Commands::Config => cmd::show_config(&config),
    }
}
