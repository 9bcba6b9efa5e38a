mod cue;
mod driver;
mod engine;
mod planner;
mod state;

pub use cue::{CommandCueSink, Cue, CueSink, CueSounds, LogCueSink, RecordingCueSink};
pub use driver::{CycleDriver, ShutdownSignal, Sleeper, ThreadSleeper, RESTART_DELAY};
pub use engine::{Engine, EngineHandle};
pub use planner::{IntervalPlan, IntervalPlanner, MicroBounds, PlanFit, PlannerSettings};
pub use state::{
    timer_state, SpanReading, StatePublisher, StateReader, StatusReport, TimerSnapshot,
};
