// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use anyhow::Result;
use rtr_client::cfg::cli::Cli;
use rtr_client::cfg::config::RuntimeConfig;
use rtr_client::cfg::logger::init_logger;
use rtr_client::driver::{Driver, Shutdown};
use tracing::error;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse(std::env::args().skip(1))?;
    init_logger(cli.verbose)?;
    let cfg = RuntimeConfig::from_cli(cli)?;

    let mut driver = Driver::new(cfg);
    match driver.run().await {
        Ok(Shutdown::Interrupted) => {
            eprintln!("interrupted");
            std::process::exit(1);
        },
        Err(e) => {
            error!(error = %e, "fatal error");
            std::process::exit(1);
        },
    }
}
