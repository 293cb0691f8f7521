use std::io::{self, IsTerminal};
use std::process::ExitCode;

use anyhow::{bail, Result};
use clap::Parser;
use log::info;

use branch::{Cli, Config};

#[tokio::main]
async fn main() -> ExitCode {
    match start().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("branch: {err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn start() -> Result<()> {
    let config = Config::try_from(Cli::parse())?;
    if io::stdin().is_terminal() {
        bail!("stdin is a terminal; pipe something in, e.g. `tail -f app.log | branch 'grep ERROR'`");
    }
    branch::logging::init(&config)?;
    info!("starting {} panes", config.panes().len());
    branch::run(config).await?;
    info!("exited cleanly");
    Ok(())
}
