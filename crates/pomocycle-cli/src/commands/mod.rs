pub mod completions;
pub mod config;
pub mod plan;
pub mod run;

use std::path::{Path, PathBuf};

use pomocycle_core::Config;

/// The `--config` path, or the default one under the data directory.
pub fn config_path(explicit: Option<&Path>) -> Result<PathBuf, Box<dyn std::error::Error>> {
    match explicit {
        Some(path) => Ok(path.to_path_buf()),
        None => Ok(Config::path()?),
    }
}

/// Load the config at `path`, or defaults when no file exists yet.
pub fn load_or_default(path: &Path) -> Result<Config, Box<dyn std::error::Error>> {
    if path.exists() {
        Ok(Config::load_from(path)?)
    } else {
        Ok(Config::default())
    }
}
