//! Interval planner.
//!
//! Decomposes the active time of one meso-group into micro-intervals whose
//! lengths are drawn from a configured band. The planner is target-seeking:
//! it jitters the target upward, picks a feasible interval count, and then
//! searches for a draw whose computed final interval also lands in the band.
//!
//! When no draw within the retry budget fits exactly, the closest miss is
//! returned. Its final interval may sit outside the band by the smallest
//! deviation seen, but it is never shorter than one second.
//!
//! The planner never touches global randomness; callers hand in an
//! [`rand::Rng`], which lets tests drive it with a seeded generator.

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Upper bound on micro-intervals in one plan; one per second of a day.
const MAX_INTERVALS: i64 = 86_400;

/// Tunables for the target-seeking search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannerSettings {
    /// Upper bound of the uniform upward jitter added to the target (seconds).
    #[serde(default = "default_jitter_secs")]
    pub jitter_secs: u64,
    /// Number of draws attempted before falling back to the closest miss.
    #[serde(default = "default_retry_budget")]
    pub retry_budget: u32,
    /// How far either side of the estimated count to look for feasible counts.
    #[serde(default = "default_search_radius")]
    pub search_radius: u32,
}

fn default_jitter_secs() -> u64 {
    60
}
fn default_retry_budget() -> u32 {
    100
}
fn default_search_radius() -> u32 {
    5
}

impl Default for PlannerSettings {
    fn default() -> Self {
        Self {
            jitter_secs: default_jitter_secs(),
            retry_budget: default_retry_budget(),
            search_radius: default_search_radius(),
        }
    }
}

/// The band a single micro-interval is drawn from, plus the rest placed
/// between consecutive micro-intervals. All values in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MicroBounds {
    pub base_secs: i64,
    pub offset_secs: i64,
    pub rest_secs: i64,
}

impl MicroBounds {
    /// Values above `i64::MAX` saturate.
    pub fn new(base_secs: u64, offset_secs: u64, rest_secs: u64) -> Self {
        Self {
            base_secs: saturating_i64(base_secs),
            offset_secs: saturating_i64(offset_secs),
            rest_secs: saturating_i64(rest_secs),
        }
    }

    pub fn min_secs(&self) -> i64 {
        self.base_secs.saturating_sub(self.offset_secs)
    }

    pub fn max_secs(&self) -> i64 {
        self.base_secs.saturating_add(self.offset_secs)
    }

    /// Smallest and largest aggregate span `n` intervals can cover,
    /// interior rests included. Saturates instead of overflowing.
    pub fn span_range(&self, n: i64) -> (i64, i64) {
        let rests = (n - 1).saturating_mul(self.rest_secs);
        (
            n.saturating_mul(self.min_secs()).saturating_add(rests),
            n.saturating_mul(self.max_secs()).saturating_add(rests),
        )
    }

    fn contains(&self, secs: i64) -> bool {
        secs >= self.min_secs() && secs <= self.max_secs()
    }

    /// Distance from `secs` to the nearest edge of the band, zero inside it.
    fn deviation(&self, secs: i64) -> u64 {
        if secs < self.min_secs() {
            self.min_secs().abs_diff(secs)
        } else if secs > self.max_secs() {
            secs.abs_diff(self.max_secs())
        } else {
            0
        }
    }
}

/// How a plan was arrived at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PlanFit {
    /// Every interval, the last included, lies in the band.
    Exact,
    /// Retry budget exhausted; the last interval misses the band by
    /// `deviation_secs`.
    ClosestMiss { deviation_secs: u64 },
    /// Target was zero; a single minimal interval was produced.
    Minimal,
}

/// Micro-interval lengths for one meso-group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntervalPlan {
    durations_secs: Vec<u64>,
    rest_secs: u64,
    target_secs: u64,
    fit: PlanFit,
}

impl IntervalPlan {
    pub fn durations(&self) -> impl Iterator<Item = Duration> + '_ {
        self.durations_secs.iter().map(|s| Duration::from_secs(*s))
    }

    pub fn durations_secs(&self) -> &[u64] {
        &self.durations_secs
    }

    pub fn len(&self) -> usize {
        self.durations_secs.len()
    }

    /// Plans produced by [`IntervalPlanner::plan`] are never empty.
    pub fn is_empty(&self) -> bool {
        self.durations_secs.is_empty()
    }

    pub fn rest(&self) -> Duration {
        Duration::from_secs(self.rest_secs)
    }

    /// The jittered target the plan was fitted against.
    pub fn target_secs(&self) -> u64 {
        self.target_secs
    }

    pub fn fit(&self) -> PlanFit {
        self.fit
    }

    /// Sum of active time, rests excluded.
    pub fn active_secs(&self) -> u64 {
        self.durations_secs
            .iter()
            .fold(0u64, |acc, d| acc.saturating_add(*d))
    }

    /// Active time plus the rests between consecutive intervals.
    pub fn span_secs(&self) -> u64 {
        let gaps = self.durations_secs.len().saturating_sub(1) as u64;
        self.active_secs()
            .saturating_add(gaps.saturating_mul(self.rest_secs))
    }

    pub fn span(&self) -> Duration {
        Duration::from_secs(self.span_secs())
    }
}

/// Target-seeking interval planner.
#[derive(Debug, Clone, Copy)]
pub struct IntervalPlanner {
    bounds: MicroBounds,
    settings: PlannerSettings,
}

impl IntervalPlanner {
    pub fn new(bounds: MicroBounds, settings: PlannerSettings) -> Self {
        Self { bounds, settings }
    }

    pub fn bounds(&self) -> MicroBounds {
        self.bounds
    }

    pub fn settings(&self) -> PlannerSettings {
        self.settings
    }

    /// Plan the micro-intervals of one meso-group whose nominal active time
    /// is `target`.
    pub fn plan<R: Rng + ?Sized>(&self, target: Duration, rng: &mut R) -> IntervalPlan {
        let rest = self.bounds.rest_secs.max(0);
        let target_secs = saturating_i64(target.as_secs());

        if target_secs <= 0 {
            return IntervalPlan {
                durations_secs: vec![self.bounds.min_secs().max(1) as u64],
                rest_secs: rest as u64,
                target_secs: 0,
                fit: PlanFit::Minimal,
            };
        }

        let jitter = saturating_i64(rng.gen_range(0..=self.settings.jitter_secs));
        let actual = target_secs.saturating_add(jitter);

        let n = self.pick_count(actual, rng);
        let (durations, fit) = self.fit_durations(n, actual, rng);

        IntervalPlan {
            durations_secs: durations,
            rest_secs: rest as u64,
            target_secs: actual as u64,
            fit,
        }
    }

    /// Interval counts whose achievable span contains `actual`.
    pub fn feasible_counts(&self, actual: i64) -> Vec<i64> {
        let estimate = self.estimate_count(actual);
        let radius = self.settings.search_radius as i64;
        (estimate.saturating_sub(radius)..=estimate.saturating_add(radius))
            .filter(|n| *n >= 1)
            .filter(|n| {
                let (lo, hi) = self.bounds.span_range(*n);
                actual >= lo && actual <= hi
            })
            .collect()
    }

    fn estimate_count(&self, actual: i64) -> i64 {
        let per_interval = self
            .bounds
            .base_secs
            .saturating_add(self.bounds.rest_secs.max(0))
            .max(1);
        (actual / per_interval).min(MAX_INTERVALS)
    }

    fn pick_count<R: Rng + ?Sized>(&self, actual: i64, rng: &mut R) -> i64 {
        let candidates = self.feasible_counts(actual);
        if candidates.is_empty() {
            let fallback = self.estimate_count(actual).max(1);
            tracing::debug!(actual, fallback, "no feasible interval count, using estimate");
            return fallback;
        }
        candidates[rng.gen_range(0..candidates.len())]
    }

    fn draw<R: Rng + ?Sized>(&self, rng: &mut R) -> i64 {
        let (lo, hi) = (self.bounds.min_secs(), self.bounds.max_secs());
        let secs = if lo <= hi { rng.gen_range(lo..=hi) } else { lo };
        secs.max(1)
    }

    fn fit_durations<R: Rng + ?Sized>(
        &self,
        n: i64,
        actual: i64,
        rng: &mut R,
    ) -> (Vec<u64>, PlanFit) {
        let rest = self.bounds.rest_secs.max(0);
        let interior_rest = (n - 1).saturating_mul(rest);
        let mut best: Option<(u64, Vec<i64>)> = None;

        for _ in 0..self.settings.retry_budget.max(1) {
            let mut attempt: Vec<i64> = (0..n - 1).map(|_| self.draw(rng)).collect();
            let drawn = attempt.iter().fold(0i64, |acc, d| acc.saturating_add(*d));
            let last = actual.saturating_sub(interior_rest).saturating_sub(drawn);
            attempt.push(last);

            if self.bounds.contains(last) {
                return (to_secs(attempt), PlanFit::Exact);
            }

            let deviation = self.bounds.deviation(last);
            if best.as_ref().map_or(true, |(d, _)| deviation < *d) {
                best = Some((deviation, attempt));
            }
        }

        // retry_budget.max(1) guarantees at least one attempt was recorded
        let (deviation_secs, attempt) = best.unwrap_or_else(|| (0, vec![actual]));
        tracing::warn!(
            count = n,
            target_secs = actual,
            deviation_secs,
            "no exact micro-interval plan within retry budget, using closest miss"
        );
        (to_secs(attempt), PlanFit::ClosestMiss { deviation_secs })
    }
}

fn saturating_i64(secs: u64) -> i64 {
    i64::try_from(secs).unwrap_or(i64::MAX)
}

fn to_secs(durations: Vec<i64>) -> Vec<u64> {
    durations.into_iter().map(|d| d.max(1) as u64).collect()
}
