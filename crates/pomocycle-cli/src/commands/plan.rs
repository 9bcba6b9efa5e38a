use std::path::Path;

use clap::Args;
use pomocycle_core::IntervalPlan;
use rand::SeedableRng;
use rand_pcg::Mcg128Xsl64;
use serde::Serialize;

use super::{config_path, load_or_default};

#[derive(Args)]
pub struct PlanArgs {
    /// Number of meso-groups to plan
    #[arg(long, default_value = "1")]
    count: u32,
    /// Seed for the planner (overrides the config seed)
    #[arg(long)]
    seed: Option<u64>,
}

#[derive(Serialize)]
struct GroupPlan {
    group: u32,
    #[serde(flatten)]
    plan: IntervalPlan,
    span_secs: u64,
}

pub fn run(explicit: Option<&Path>, args: PlanArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_or_default(&config_path(explicit)?)?;
    config.validate()?;

    let mut rng = match args.seed.or(config.seed) {
        Some(seed) => Mcg128Xsl64::seed_from_u64(seed),
        None => Mcg128Xsl64::from_entropy(),
    };
    let planner = config.planner();

    let plans: Vec<GroupPlan> = (1..=args.count)
        .map(|group| {
            let plan = planner.plan(config.cycle.meso_target(), &mut rng);
            GroupPlan {
                group,
                span_secs: plan.span_secs(),
                plan,
            }
        })
        .collect();

    println!("{}", serde_json::to_string_pretty(&plans)?);
    Ok(())
}
