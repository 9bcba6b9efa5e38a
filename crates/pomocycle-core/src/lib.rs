//! # Pomocycle Core Library
//!
//! This library provides the cycle engine behind the Pomocycle interval
//! timer. The `pomocycle` CLI binary is a thin layer over it that adds a
//! terminal renderer and an HTTP status endpoint.
//!
//! ## Architecture
//!
//! - **Interval Planner**: splits a meso-group's target time into randomized
//!   micro-intervals within a configured band
//! - **Shared Timer State**: lock-free, single-writer record of what is
//!   counting down, readable from any thread
//! - **Cycle Driver**: the macro/meso/micro state machine, run on its own
//!   thread, emitting cues at transitions
//! - **Storage**: TOML/JSON configuration
//!
//! ## Key Components
//!
//! - [`Engine`]: starts the driver thread and hands out readers
//! - [`IntervalPlanner`]: target-seeking interval decomposition
//! - [`StateReader`]: snapshot access for consumers
//! - [`Config`]: application configuration management

pub mod error;
pub mod storage;
pub mod timer;

pub use error::{ConfigError, CoreError, EngineError, ValidationError};
pub use storage::{Config, CycleConfig};
pub use timer::{
    Cue, CueSink, CycleDriver, Engine, EngineHandle, IntervalPlan, IntervalPlanner, StateReader,
    StatusReport, TimerSnapshot,
};
