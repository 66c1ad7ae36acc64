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

//! Instrument command - rewrite a script with tracer hooks

use std::{fs, path::Path};

use eyre::{eyre, Result, WrapErr};
use storyline_engine::{instrument, EngineConfig};

/// Instrument `file`, writing the result to `output` or stdout
pub fn instrument_file(file: &Path, output: Option<&Path>, config: &EngineConfig) -> Result<()> {
    let source = fs::read_to_string(file).wrap_err_with(|| format!("failed to read {}", file.display()))?;

    let program = instrument(&source, &config.instrument).map_err(|err| match err.location() {
        Some((line, column)) => eyre!("{}:{line}:{column}: {err}", file.display()),
        None => eyre!("{}: {err}", file.display()),
    })?;
    tracing::info!(
        functions = program.functions,
        insertions = program.insertions,
        "Instrumented {}",
        file.display()
    );

    match output {
        Some(path) => fs::write(path, &program.code)
            .wrap_err_with(|| format!("failed to write {}", path.display()))?,
        None => print!("{}", program.code),
    }
    Ok(())
}
