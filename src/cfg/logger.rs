// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Logger initialization. The exact line format written to standard error
//! is out of scope (spec §1) — this only wires up `tracing` so the rest of
//! the crate can log through the usual macros.

use anyhow::{Context, Result};
use tracing_subscriber::{EnvFilter, fmt};

/// Maps the CLI's repeated `-v` count to a `tracing` level, `RUST_LOG`
/// always wins when set.
fn level_for_verbosity(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

/// Installs a process-global `tracing` subscriber writing to stderr.
pub fn init_logger(verbosity: u8) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level_for_verbosity(verbosity)));

    fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("{e}"))
        .context("failed to install tracing subscriber")
}
