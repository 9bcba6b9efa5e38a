//! Application configuration.
//!
//! Holds everything the engine needs for its whole lifetime:
//! - Cycle shape (micro band, rests, meso target and count, macro rest)
//! - Planner tunables (jitter, retry budget)
//! - Cue playback (sounds directory, player command)
//! - Status server address
//!
//! Configuration is read from TOML (default `~/.config/pomocycle/config.toml`)
//! or, for any `.json` path, from JSON.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::data_dir;
use crate::error::{ConfigError, ValidationError};
use crate::timer::{CueSounds, IntervalPlanner, MicroBounds, PlannerSettings};

/// Shape of one macro-cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleConfig {
    #[serde(default = "default_micro_base_secs")]
    pub micro_base_secs: u64,
    #[serde(default = "default_micro_offset_secs")]
    pub micro_offset_secs: u64,
    #[serde(default = "default_micro_rest_secs")]
    pub micro_rest_secs: u64,
    #[serde(default = "default_meso_target_mins")]
    pub meso_target_mins: u64,
    #[serde(default = "default_meso_rest_mins")]
    pub meso_rest_mins: u64,
    #[serde(default = "default_meso_count")]
    pub meso_count: u32,
    #[serde(default = "default_macro_rest_mins")]
    pub macro_rest_mins: u64,
}

/// Cue playback configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CueConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Directory the sound file names are resolved against.
    #[serde(default = "default_sounds_dir")]
    pub sounds_dir: PathBuf,
    /// Player command; the sound file path is appended as the last argument.
    /// Empty means cues are only logged.
    #[serde(default)]
    pub player: Vec<String>,
    #[serde(default)]
    pub sounds: CueSounds,
}

/// Status server configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_bind")]
    pub bind: String,
    /// 0 falls back to 8080.
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Seed for the planner's generator. Unset means seeded from entropy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    #[serde(default)]
    pub cycle: CycleConfig,
    #[serde(default)]
    pub planner: PlannerSettings,
    #[serde(default)]
    pub cues: CueConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

/// On-disk format, chosen by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Toml,
    Json,
}

impl ConfigFormat {
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => ConfigFormat::Json,
            _ => ConfigFormat::Toml,
        }
    }
}

/// Longest single duration a config may describe: one day.
const MAX_SECS: u64 = 24 * 60 * 60;
const MAX_MINS: u64 = MAX_SECS / 60;
const MAX_SEARCH_RADIUS: u32 = 1_000;

fn at_most(field: &str, value: u64, max: u64) -> Result<(), ValidationError> {
    if value > max {
        return Err(ValidationError::OutOfRange {
            field: field.into(),
            value,
            max,
        });
    }
    Ok(())
}

// Default functions
fn default_micro_base_secs() -> u64 {
    180
}
fn default_micro_offset_secs() -> u64 {
    60
}
fn default_micro_rest_secs() -> u64 {
    10
}
fn default_meso_target_mins() -> u64 {
    25
}
fn default_meso_rest_mins() -> u64 {
    5
}
fn default_meso_count() -> u32 {
    4
}
fn default_macro_rest_mins() -> u64 {
    20
}
fn default_true() -> bool {
    true
}
fn default_sounds_dir() -> PathBuf {
    PathBuf::from("Sounds")
}
fn default_bind() -> String {
    "0.0.0.0".into()
}
fn default_port() -> u16 {
    8080
}

impl Default for CycleConfig {
    fn default() -> Self {
        Self {
            micro_base_secs: default_micro_base_secs(),
            micro_offset_secs: default_micro_offset_secs(),
            micro_rest_secs: default_micro_rest_secs(),
            meso_target_mins: default_meso_target_mins(),
            meso_rest_mins: default_meso_rest_mins(),
            meso_count: default_meso_count(),
            macro_rest_mins: default_macro_rest_mins(),
        }
    }
}

impl Default for CueConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            sounds_dir: default_sounds_dir(),
            player: Vec::new(),
            sounds: CueSounds::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind: default_bind(),
            port: default_port(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            seed: None,
            cycle: CycleConfig::default(),
            planner: PlannerSettings::default(),
            cues: CueConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

impl CycleConfig {
    pub fn micro_bounds(&self) -> MicroBounds {
        MicroBounds::new(
            self.micro_base_secs,
            self.micro_offset_secs,
            self.micro_rest_secs,
        )
    }

    pub fn micro_rest(&self) -> Duration {
        Duration::from_secs(self.micro_rest_secs)
    }

    pub fn meso_target(&self) -> Duration {
        Duration::from_secs(self.meso_target_mins.saturating_mul(60))
    }

    pub fn meso_rest(&self) -> Duration {
        Duration::from_secs(self.meso_rest_mins.saturating_mul(60))
    }

    pub fn macro_rest(&self) -> Duration {
        Duration::from_secs(self.macro_rest_mins.saturating_mul(60))
    }

    /// Checks every duration fits in a day, the micro band is non-degenerate
    /// and there is at least one meso-group per macro-cycle.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let band_max = self.micro_base_secs.saturating_add(self.micro_offset_secs);
        at_most("cycle.micro_base_secs + cycle.micro_offset_secs", band_max, MAX_SECS)?;
        at_most("cycle.micro_rest_secs", self.micro_rest_secs, MAX_SECS)?;
        at_most("cycle.meso_target_mins", self.meso_target_mins, MAX_MINS)?;
        at_most("cycle.meso_rest_mins", self.meso_rest_mins, MAX_MINS)?;
        at_most("cycle.macro_rest_mins", self.macro_rest_mins, MAX_MINS)?;

        // Both values are at most MAX_SECS here.
        if self.micro_offset_secs >= self.micro_base_secs {
            return Err(ValidationError::DegenerateBound {
                base: self.micro_base_secs,
                offset: self.micro_offset_secs,
                min: self.micro_base_secs as i64 - self.micro_offset_secs as i64,
                max: band_max as i64,
            });
        }
        if self.meso_count == 0 {
            return Err(ValidationError::InvalidValue {
                field: "cycle.meso_count".into(),
                message: "must be at least 1".into(),
            });
        }
        Ok(())
    }
}

impl ServerConfig {
    pub fn effective_port(&self) -> u16 {
        if self.port == 0 {
            default_port()
        } else {
            self.port
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.bind, self.effective_port())
    }
}

impl Config {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        let unknown = || ConfigError::UnknownKey(key.to_string());
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };

        let mut parts = key.split('.').peekable();
        if parts.peek().is_none() || key.is_empty() {
            return Err(unknown());
        }

        let mut current = root;
        while let Some(part) = parts.next() {
            let is_leaf = parts.peek().is_none();
            if is_leaf {
                let obj = current.as_object_mut().ok_or_else(unknown)?;
                let existing = obj.get(part).ok_or_else(unknown)?;

                let new_value = match existing {
                    serde_json::Value::Bool(_) => serde_json::Value::Bool(
                        value
                            .parse::<bool>()
                            .map_err(|e| invalid(e.to_string()))?,
                    ),
                    serde_json::Value::Number(_) => {
                        if let Ok(n) = value.parse::<u64>() {
                            serde_json::Value::Number(n.into())
                        } else {
                            return Err(invalid(format!("cannot parse '{value}' as number")));
                        }
                    }
                    serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                        serde_json::from_str(value).map_err(|e| invalid(e.to_string()))?
                    }
                    serde_json::Value::String(_) => serde_json::Value::String(value.into()),
                    serde_json::Value::Null => serde_json::from_str(value)
                        .unwrap_or_else(|_| serde_json::Value::String(value.into())),
                };

                obj.insert(part.to_string(), new_value);
                return Ok(());
            }

            current = current.get_mut(part).ok_or_else(unknown)?;
        }

        Err(unknown())
    }

    /// Default config path inside [`data_dir`].
    pub fn path() -> Result<PathBuf, ConfigError> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Parse configuration text in the given format. Does not validate.
    pub fn parse(content: &str, format: ConfigFormat) -> Result<Self, ConfigError> {
        match format {
            ConfigFormat::Toml => {
                toml::from_str(content).map_err(|e| ConfigError::ParseFailed(e.to_string()))
            }
            ConfigFormat::Json => {
                serde_json::from_str(content).map_err(|e| ConfigError::ParseFailed(e.to_string()))
            }
        }
    }

    /// Serialize in the given format.
    pub fn render(&self, format: ConfigFormat) -> Result<String, ConfigError> {
        match format {
            ConfigFormat::Toml => {
                toml::to_string_pretty(self).map_err(|e| ConfigError::ParseFailed(e.to_string()))
            }
            ConfigFormat::Json => serde_json::to_string_pretty(self)
                .map_err(|e| ConfigError::ParseFailed(e.to_string())),
        }
    }

    /// Load and validate the config at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing, cannot be parsed, or fails
    /// validation. All of these are fatal at startup.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::LoadFailed {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let cfg = Self::parse(&content, ConfigFormat::from_path(path))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load and validate the config at the default path.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::path()?)
    }

    /// Persist to `path` in the format its extension implies.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let content = self.render(ConfigFormat::from_path(path))?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::SaveFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
        }
        std::fs::write(path, content).map_err(|e| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Persist to the default path.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::path()?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.cycle.validate().map_err(|e| ConfigError::InvalidValue {
            key: "cycle".into(),
            message: e.to_string(),
        })?;
        if self.planner.retry_budget == 0 {
            return Err(ConfigError::InvalidValue {
                key: "planner.retry_budget".into(),
                message: "must be at least 1".into(),
            });
        }
        if self.planner.jitter_secs > MAX_SECS {
            return Err(ConfigError::InvalidValue {
                key: "planner.jitter_secs".into(),
                message: format!("must be at most {MAX_SECS}"),
            });
        }
        if self.planner.search_radius > MAX_SEARCH_RADIUS {
            return Err(ConfigError::InvalidValue {
                key: "planner.search_radius".into(),
                message: format!("must be at most {MAX_SEARCH_RADIUS}"),
            });
        }
        Ok(())
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Set a config value by dot-separated key and revalidate. Does not save.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown, the value cannot be parsed,
    /// or the resulting config is invalid. `self` is untouched on error.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut json = serde_json::to_value(&*self)
            .map_err(|e| ConfigError::ParseFailed(e.to_string()))?;
        if key == "seed" && json.get("seed").is_none() {
            json["seed"] = serde_json::Value::Null;
        }
        Self::set_json_value_by_path(&mut json, key, value)?;
        let updated: Config = serde_json::from_value(json).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        updated.validate()?;
        *self = updated;
        Ok(())
    }

    pub fn planner(&self) -> IntervalPlanner {
        IntervalPlanner::new(self.cycle.micro_bounds(), self.planner)
    }
}
