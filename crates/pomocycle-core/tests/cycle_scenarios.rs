//! Integration tests for full macro-cycles driven with instant sleeps.

use std::time::Duration;

use pomocycle_core::timer::{
    timer_state, Cue, CycleDriver, IntervalPlanner, PlannerSettings, RecordingCueSink, Sleeper,
    StateReader, TimerSnapshot,
};
use pomocycle_core::CycleConfig;
use rand::SeedableRng;
use rand_pcg::Mcg128Xsl64;

/// Records every wait along with the state a reader saw while it ran.
struct InstantSleeper {
    reader: StateReader,
    waits: Vec<(Duration, TimerSnapshot)>,
}

impl Sleeper for InstantSleeper {
    fn sleep(&mut self, duration: Duration) {
        self.waits.push((duration, self.reader.snapshot()));
    }
}

fn scenario_cycle(meso_count: u32, meso_rest_mins: u64, macro_rest_mins: u64) -> CycleConfig {
    CycleConfig {
        micro_base_secs: 25,
        micro_offset_secs: 5,
        micro_rest_secs: 5,
        meso_target_mins: 1,
        meso_rest_mins,
        meso_count,
        macro_rest_mins,
    }
}

fn run_one_macro_cycle(
    cycle: CycleConfig,
    seed: u64,
) -> (Vec<Cue>, Vec<(Duration, TimerSnapshot)>) {
    let planner = IntervalPlanner::new(cycle.micro_bounds(), PlannerSettings::default());
    let (publisher, reader) = timer_state();
    let sink = RecordingCueSink::new();
    let mut driver = CycleDriver::new(
        cycle,
        planner,
        publisher,
        sink.clone(),
        InstantSleeper {
            reader,
            waits: Vec::new(),
        },
        Mcg128Xsl64::seed_from_u64(seed),
    );
    driver.run_macro_cycle().unwrap();
    let waits = driver.sleeper().waits.clone();
    (sink.cues(), waits)
}

#[test]
fn scenario_a_single_short_group() {
    for seed in 0..100 {
        let (cues, waits) = run_one_macro_cycle(scenario_cycle(1, 0, 0), seed);

        let micro: Vec<Duration> = waits
            .iter()
            .filter(|(_, snap)| snap.in_meso)
            .map(|(d, _)| *d)
            .step_by(2)
            .collect();
        assert!((2..=5).contains(&micro.len()), "seed {seed}: {micro:?}");
        for d in &micro[..micro.len() - 1] {
            assert!((20..=30).contains(&d.as_secs()), "seed {seed}: {micro:?}");
        }

        let span: Duration = waits
            .iter()
            .filter(|(_, snap)| snap.in_meso)
            .map(|(d, _)| *d)
            .sum();
        assert!((60..=120).contains(&span.as_secs()), "seed {seed}: {span:?}");

        assert_eq!(
            cues.iter().filter(|c| **c == Cue::MicroComplete).count(),
            micro.len()
        );
    }
}

#[test]
fn scenario_b_last_group_skips_meso_rest() {
    let (cues, waits) = run_one_macro_cycle(scenario_cycle(3, 2, 10), 42);

    let meso_rest_completes = cues.iter().filter(|c| **c == Cue::MesoRestComplete).count();
    let meso_completes = cues.iter().filter(|c| **c == Cue::MesoComplete).count();
    assert_eq!(meso_rest_completes, 2);
    assert_eq!(meso_completes, 2);

    // After the third group's final MicroComplete comes MacroComplete directly.
    let tail: Vec<Cue> = cues.iter().rev().take(3).rev().copied().collect();
    assert_eq!(
        tail,
        vec![Cue::MicroComplete, Cue::MacroComplete, Cue::MacroRestComplete]
    );

    let meso_rest_waits = waits
        .iter()
        .filter(|(d, _)| *d == Duration::from_secs(120))
        .count();
    assert_eq!(meso_rest_waits, 2);
    assert_eq!(waits.last().unwrap().0, Duration::from_secs(600));
}

#[test]
fn scenario_c_cue_order_for_single_group() {
    for seed in 0..20 {
        let (cues, _) = run_one_macro_cycle(scenario_cycle(1, 5, 0), seed);

        let micro_count = cues.iter().filter(|c| **c == Cue::MicroComplete).count();
        let mut expected = Vec::new();
        for i in 0..micro_count {
            expected.push(Cue::MicroComplete);
            if i + 1 < micro_count {
                expected.push(Cue::MicroRestComplete);
            }
        }
        expected.push(Cue::MacroComplete);
        expected.push(Cue::MacroRestComplete);

        assert_eq!(cues, expected, "seed {seed}");
        assert!(!cues.contains(&Cue::MesoComplete));
    }
}

#[test]
fn readers_see_meso_group_for_its_whole_span() {
    let (_, waits) = run_one_macro_cycle(scenario_cycle(2, 1, 1), 9);

    let mut saw_group = false;
    for (duration, snap) in &waits {
        assert_eq!(snap.active.total, *duration);
        if snap.in_meso {
            saw_group = true;
            assert!(!snap.meso.total.is_zero());
            assert!(snap.meso.total >= *duration);
        } else {
            assert_eq!(*duration, Duration::from_secs(60));
        }
    }
    assert!(saw_group);
}
