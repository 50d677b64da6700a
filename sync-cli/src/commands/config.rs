//! Print the effective configuration.

use anyhow::Result;
use peersync_client::Config;

/// Run the config command.
pub fn run(config: &Config) -> Result<()> {
    print!("{}", config.to_toml()?);
    Ok(())
}
