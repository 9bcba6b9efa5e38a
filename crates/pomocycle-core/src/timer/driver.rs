//! Cycle driver.
//!
//! Walks the macro → meso → micro hierarchy forever, publishing each wait to
//! the shared timer state before sleeping through it and emitting a cue when
//! it ends.
//!
//! ## State Transitions
//!
//! ```text
//! MacroRunning:
//!   for each meso-group i:
//!     MesoActive(i): Micro(1) [MicroRest] Micro(2) ... Micro(n)
//!     MesoRest         (skipped when i is the last group)
//! MacroRest -> MacroRunning
//! ```
//!
//! Waits are the only suspension points and are never cut short. A
//! [`ShutdownSignal`] is checked before each wait; once raised, the current
//! macro-cycle is abandoned with [`EngineError::ShutdownRequested`].

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;

use super::cue::{Cue, CueSink};
use super::planner::IntervalPlanner;
use super::state::{StatePublisher, StateReader};
use crate::error::EngineError;
use crate::storage::CycleConfig;

/// Pause before starting a fresh macro-cycle after a caught panic.
pub const RESTART_DELAY: Duration = Duration::from_secs(1);

/// Performs the driver's blocking waits.
pub trait Sleeper: Send {
    fn sleep(&mut self, duration: Duration);
}

/// Sleeps the calling thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&mut self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Cooperative stop flag, checked by the driver between waits.
#[derive(Debug, Default, Clone)]
pub struct ShutdownSignal(Arc<AtomicBool>);

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// The macro/meso/micro state machine. Sole owner of the [`StatePublisher`].
pub struct CycleDriver<S, Z, R> {
    cycle: CycleConfig,
    planner: IntervalPlanner,
    publisher: StatePublisher,
    sink: S,
    sleeper: Z,
    rng: R,
    shutdown: ShutdownSignal,
    macro_cycles: u64,
}

impl<S, Z, R> CycleDriver<S, Z, R>
where
    S: CueSink,
    Z: Sleeper,
    R: Rng,
{
    pub fn new(
        cycle: CycleConfig,
        planner: IntervalPlanner,
        publisher: StatePublisher,
        sink: S,
        sleeper: Z,
        rng: R,
    ) -> Self {
        Self {
            cycle,
            planner,
            publisher,
            sink,
            sleeper,
            rng,
            shutdown: ShutdownSignal::new(),
            macro_cycles: 0,
        }
    }

    pub fn with_shutdown(mut self, shutdown: ShutdownSignal) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn reader(&self) -> StateReader {
        self.publisher.reader()
    }

    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.shutdown.clone()
    }

    /// Number of macro-cycles started so far.
    pub fn macro_cycles(&self) -> u64 {
        self.macro_cycles
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sleeper(&self) -> &Z {
        &self.sleeper
    }

    /// Run macro-cycles until shutdown is requested.
    ///
    /// A panic inside one macro-cycle is logged and, after [`RESTART_DELAY`],
    /// a fresh macro-cycle is started. Only a shutdown request ends the loop.
    pub fn run(&mut self) -> EngineError {
        tracing::info!("cycle driver started");
        loop {
            match panic::catch_unwind(AssertUnwindSafe(|| self.run_macro_cycle())) {
                Ok(Ok(())) => {}
                Ok(Err(stop)) => {
                    tracing::info!(reason = %stop, "cycle driver stopping");
                    self.publisher.clear_meso_group();
                    return stop;
                }
                Err(payload) => {
                    tracing::error!(
                        panic = %panic_message(payload.as_ref()),
                        "macro-cycle panicked, starting a fresh one"
                    );
                    self.publisher.clear_meso_group();
                    if !self.shutdown.is_requested() {
                        self.sleeper.sleep(RESTART_DELAY);
                    }
                }
            }
        }
    }

    /// Run one full macro-cycle: every meso-group, then the macro rest.
    pub fn run_macro_cycle(&mut self) -> Result<(), EngineError> {
        self.macro_cycles += 1;
        let count = self.cycle.meso_count;
        tracing::info!(macro_cycle = self.macro_cycles, meso_groups = count, "macro-cycle started");

        for index in 1..=count {
            self.run_meso_group(index, index == count)?;
        }

        tracing::info!(macro_cycle = self.macro_cycles, "macro-cycle complete");
        self.cue(Cue::MacroComplete);

        tracing::info!(rest_mins = self.cycle.macro_rest_mins, "macro rest");
        self.publisher.clear_meso_group();
        self.wait(self.cycle.macro_rest())?;
        self.cue(Cue::MacroRestComplete);
        Ok(())
    }

    fn run_meso_group(&mut self, index: u32, is_last: bool) -> Result<(), EngineError> {
        let plan = self.planner.plan(self.cycle.meso_target(), &mut self.rng);
        self.publisher.publish_meso_group(plan.span());
        tracing::info!(
            group = index,
            of = self.cycle.meso_count,
            intervals = plan.len(),
            span_secs = plan.span_secs(),
            "meso-group started"
        );

        let rest = self.cycle.micro_rest();
        let last = plan.len().saturating_sub(1);
        for (i, duration) in plan.durations().enumerate() {
            tracing::debug!(interval = i + 1, of = plan.len(), secs = duration.as_secs(), "micro-interval");
            self.wait(duration)?;
            self.cue(Cue::MicroComplete);

            if i < last {
                tracing::debug!(secs = rest.as_secs(), "micro rest");
                self.wait(rest)?;
                self.cue(Cue::MicroRestComplete);
            }
        }

        self.publisher.clear_meso_group();

        if is_last {
            tracing::info!(group = index, "last meso-group complete, entering macro rest");
            return Ok(());
        }

        tracing::info!(group = index, "meso-group complete");
        self.cue(Cue::MesoComplete);
        tracing::info!(rest_mins = self.cycle.meso_rest_mins, "meso rest");
        self.wait(self.cycle.meso_rest())?;
        self.cue(Cue::MesoRestComplete);
        Ok(())
    }

    fn wait(&mut self, total: Duration) -> Result<(), EngineError> {
        if self.shutdown.is_requested() {
            return Err(EngineError::ShutdownRequested);
        }
        self.publisher.publish_active_interval(total);
        self.sleeper.sleep(total);
        Ok(())
    }

    fn cue(&mut self, cue: Cue) {
        let sink = &self.sink;
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| sink.emit(cue))) {
            tracing::error!(%cue, panic = %panic_message(payload.as_ref()), "cue sink panicked");
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
