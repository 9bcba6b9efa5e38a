use std::path::Path;

use clap::Subcommand;
use pomocycle_core::Config;

use super::{config_path, load_or_default};

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Get a config value
    Get {
        /// Config key (e.g. "cycle.meso_count", "server.port")
        key: String,
    },
    /// Set a config value
    Set {
        /// Config key
        key: String,
        /// New value
        value: String,
    },
    /// List all config values
    List,
    /// Reset config to defaults
    Reset,
    /// Write a default config file if none exists
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Print the config file path
    Path,
}

pub fn run(explicit: Option<&Path>, action: ConfigAction) -> Result<(), Box<dyn std::error::Error>> {
    let path = config_path(explicit)?;

    match action {
        ConfigAction::Get { key } => {
            let config = load_or_default(&path)?;
            match config.get(&key) {
                Some(value) => println!("{value}"),
                None => return Err(format!("unknown key: {key}").into()),
            }
        }
        ConfigAction::Set { key, value } => {
            let mut config = load_or_default(&path)?;
            config.set(&key, &value)?;
            config.save_to(&path)?;
            println!("ok");
        }
        ConfigAction::List => {
            let config = load_or_default(&path)?;
            let json = serde_json::to_string_pretty(&config)?;
            println!("{json}");
        }
        ConfigAction::Reset => {
            Config::default().save_to(&path)?;
            println!("config reset to defaults");
        }
        ConfigAction::Init { force } => {
            if path.exists() && !force {
                return Err(format!("{} already exists (use --force)", path.display()).into());
            }
            Config::default().save_to(&path)?;
            println!("{}", path.display());
        }
        ConfigAction::Path => {
            println!("{}", path.display());
        }
    }
    Ok(())
}
