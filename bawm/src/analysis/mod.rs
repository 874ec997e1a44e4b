//! Counter read-out and interpretation
//!
//! - [`Snapshot`] - values of the counter store at one instant
//! - [`classify`] - dominant load of an interval
//! - [`Reporter`] - turns periodic snapshots into interval reports

pub mod load_classifier;
pub mod snapshot;

use std::fmt;
use std::time::{Duration, Instant};

pub use load_classifier::{classify, Classification, LoadClass, Thresholds};
pub use snapshot::Snapshot;

/// One reporting interval: deltas plus their classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadReport {
    pub delta: Snapshot,
    pub elapsed: Duration,
    pub classification: Classification,
}

impl fmt::Display for LoadReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "load={} over {:.1}s [{}]",
            self.classification.load,
            self.elapsed.as_secs_f64(),
            self.delta
        )?;
        if self.classification.parallel_saturated {
            write!(f, " (parallel saturated)")?;
        }
        Ok(())
    }
}

/// Emits a [`LoadReport`] every `every` from snapshots fed at any rate
pub struct Reporter {
    thresholds: Thresholds,
    every: Duration,
    baseline: Option<(Instant, Snapshot)>,
}

impl Reporter {
    #[must_use]
    pub fn new(thresholds: Thresholds, every: Duration) -> Self {
        Self { thresholds, every, baseline: None }
    }

    /// Feed a snapshot taken at `now`
    ///
    /// The first snapshot only sets the baseline. Later ones produce a report
    /// once `every` has passed since the previous report.
    pub fn observe(&mut self, current: Snapshot, now: Instant) -> Option<LoadReport> {
        let Some((since, previous)) = self.baseline else {
            self.baseline = Some((now, current));
            return None;
        };

        let elapsed = now.saturating_duration_since(since);
        if elapsed < self.every {
            return None;
        }

        let delta = current.delta_since(&previous);
        self.baseline = Some((now, current));
        Some(LoadReport { delta, elapsed, classification: classify(&delta, &self.thresholds) })
    }
}
