//! Engine lifecycle.
//!
//! [`Engine::start`] creates the shared timer state, moves the write half
//! into a dedicated `cycle-driver` thread and hands back an
//! [`EngineHandle`] holding the read half. The state lives exactly as long
//! as the engine: it is dropped once the handle is stopped and the driver
//! thread has returned.
//!
//! ## Usage
//!
//! ```ignore
//! let handle = Engine::start(&config, LogCueSink)?;
//! let status = handle.reader().status();
//! handle.stop()?; // returns after the current wait ends
//! ```

use std::thread::{self, JoinHandle};

use rand::SeedableRng;
use rand_pcg::Mcg128Xsl64;

use super::cue::CueSink;
use super::driver::{CycleDriver, ShutdownSignal, Sleeper, ThreadSleeper};
use super::state::{timer_state, StateReader};
use crate::error::{EngineError, Result};
use crate::storage::Config;

pub struct Engine;

impl Engine {
    /// Validate `config` and start the driver on its own thread with real
    /// sleeps.
    pub fn start<S>(config: &Config, sink: S) -> Result<EngineHandle>
    where
        S: CueSink + 'static,
    {
        Self::start_with_sleeper(config, sink, ThreadSleeper)
    }

    pub fn start_with_sleeper<S, Z>(
        config: &Config,
        sink: S,
        sleeper: Z,
    ) -> Result<EngineHandle>
    where
        S: CueSink + 'static,
        Z: Sleeper + 'static,
    {
        config.validate()?;

        let rng = match config.seed {
            Some(seed) => Mcg128Xsl64::seed_from_u64(seed),
            None => Mcg128Xsl64::from_entropy(),
        };
        let (publisher, reader) = timer_state();
        let shutdown = ShutdownSignal::new();
        let mut driver = CycleDriver::new(
            config.cycle.clone(),
            config.planner(),
            publisher,
            sink,
            sleeper,
            rng,
        )
        .with_shutdown(shutdown.clone());

        let thread = thread::Builder::new()
            .name("cycle-driver".into())
            .spawn(move || driver.run())
            .map_err(|e| EngineError::SpawnFailed(e.to_string()))?;

        tracing::info!(seeded = config.seed.is_some(), "engine started");
        Ok(EngineHandle {
            reader,
            shutdown,
            thread: Some(thread),
        })
    }
}

/// Running engine. Dropping the handle requests shutdown without waiting.
#[derive(Debug)]
pub struct EngineHandle {
    reader: StateReader,
    shutdown: ShutdownSignal,
    thread: Option<JoinHandle<EngineError>>,
}

impl EngineHandle {
    pub fn reader(&self) -> StateReader {
        self.reader.clone()
    }

    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.shutdown.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().map_or(true, |t| t.is_finished())
    }

    /// Request shutdown and wait for the driver to finish its current wait.
    pub fn stop(mut self) -> Result<(), EngineError> {
        self.shutdown.request();
        let Some(thread) = self.thread.take() else {
            return Ok(());
        };
        match thread.join() {
            Ok(EngineError::ShutdownRequested) => {
                tracing::info!("engine stopped");
                Ok(())
            }
            Ok(other) => Err(other),
            Err(_) => Err(EngineError::DriverPanicked),
        }
    }
}

impl Drop for EngineHandle {
    fn drop(&mut self) {
        self.shutdown.request();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;
    use crate::timer::cue::RecordingCueSink;
    use std::time::Duration;

    struct ShortSleeper;

    impl Sleeper for ShortSleeper {
        fn sleep(&mut self, _duration: Duration) {
            thread::sleep(Duration::from_millis(1));
        }
    }

    fn quick_config() -> Config {
        let mut config = Config::default();
        config.seed = Some(1);
        config.cycle.micro_base_secs = 25;
        config.cycle.micro_offset_secs = 5;
        config.cycle.micro_rest_secs = 5;
        config.cycle.meso_target_mins = 1;
        config.cycle.meso_count = 2;
        config
    }

    #[test]
    fn invalid_config_does_not_start() {
        let mut config = quick_config();
        config.cycle.micro_offset_secs = 25;
        let err = Engine::start(&config, RecordingCueSink::new()).unwrap_err();
        assert!(matches!(err, CoreError::Config(_)));
    }

    #[test]
    fn engine_runs_cycles_until_stopped() {
        let sink = RecordingCueSink::new();
        let handle =
            Engine::start_with_sleeper(&quick_config(), sink.clone(), ShortSleeper).unwrap();

        let reader = handle.reader();
        let deadline = std::time::Instant::now() + Duration::from_secs(10);
        while sink.count(crate::timer::Cue::MacroRestComplete) < 2 {
            assert!(std::time::Instant::now() < deadline, "engine made no progress");
            let _ = reader.snapshot();
            thread::sleep(Duration::from_millis(5));
        }

        handle.stop().unwrap();
        assert!(!reader.snapshot().in_meso);
    }
}
