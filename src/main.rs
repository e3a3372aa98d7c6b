//! `jaco`: terminal chat entry point.

use anyhow::{Context, Result};
use jaco::config::{Config, ProviderChain};
use tracing::{error, info};

fn main() -> Result<()> {
    let log_file = jaco::logging::init();
    info!(log_file = ?log_file, "jaco starting");

    let cwd = std::env::current_dir().context("cannot read the working directory")?;
    let chain = ProviderChain::standard(&cwd).context("cannot load configuration sources")?;
    info!(providers = ?chain.names(), "configuration providers");

    let config = Config::resolve(&chain).context("invalid configuration")?;

    if let Err(err) = jaco::app::run(&config) {
        error!(error = %err, "jaco exited with an error");
        return Err(err);
    }
    Ok(())
}
