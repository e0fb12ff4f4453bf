//! Print the effective configuration.

use super::ConfigArgs;
use anyhow::Result;

/// Run the config command.
pub fn run(args: &ConfigArgs) -> Result<()> {
    let config = args.load()?;
    print!("{}", config.to_toml()?);
    Ok(())
}
