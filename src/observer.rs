//! Optional stage instrumentation.
//!
//! The pipeline reports each completed stage and its wall-clock duration to a
//! [`StageObserver`]. Timing lives here, around the stage calls, and never inside
//! the transform or embedding code.

use std::fmt;
use std::time::Duration;

/// Pipeline states, in the order they are reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Input decoded.
    Loaded,
    /// Samples scaled to `[0, 1]` and padded to a block multiple.
    Normalized,
    /// Plane split into blocks.
    Partitioned,
    /// Forward transform applied to every block.
    Transformed,
    /// Watermark values added to the selected coefficients.
    Embedded,
    /// Inverse transform applied to every block.
    Inverted,
    /// Blocks copied back into a full plane.
    Reassembled,
    /// Output artifacts encoded to disk.
    Written,
}

impl Stage {
    /// All stages in pipeline order.
    pub const ALL: [Self; 8] = [
        Self::Loaded,
        Self::Normalized,
        Self::Partitioned,
        Self::Transformed,
        Self::Embedded,
        Self::Inverted,
        Self::Reassembled,
        Self::Written,
    ];
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Loaded => "loaded",
            Self::Normalized => "normalized",
            Self::Partitioned => "partitioned",
            Self::Transformed => "transformed",
            Self::Embedded => "embedded",
            Self::Inverted => "inverted",
            Self::Reassembled => "reassembled",
            Self::Written => "written",
        };
        f.pad(name)
    }
}

/// Receives a callback each time a pipeline stage completes.
pub trait StageObserver {
    /// `stage` finished after `elapsed`.
    fn stage_finished(&mut self, stage: Stage, elapsed: Duration);
}

/// Observer that ignores every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl StageObserver for NoopObserver {
    fn stage_finished(&mut self, _stage: Stage, _elapsed: Duration) {}
}

/// Observer that records every stage duration.
#[derive(Debug, Clone, Default)]
pub struct StageTimings {
    entries: Vec<(Stage, Duration)>,
}

impl StageTimings {
    /// Empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Recorded `(stage, duration)` pairs in completion order.
    #[must_use]
    pub fn entries(&self) -> &[(Stage, Duration)] {
        &self.entries
    }

    /// Total duration recorded for a stage, summed over every report of it.
    #[must_use]
    pub fn total(&self, stage: Stage) -> Duration {
        self.entries
            .iter()
            .filter(|(s, _)| *s == stage)
            .map(|(_, d)| *d)
            .sum()
    }
}

impl StageObserver for StageTimings {
    fn stage_finished(&mut self, stage: Stage, elapsed: Duration) {
        tracing::debug!(%stage, elapsed_us = elapsed.as_micros(), "stage finished");
        self.entries.push((stage, elapsed));
    }
}

impl fmt::Display for StageTimings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for stage in Stage::ALL {
            if self.entries.iter().any(|(s, _)| *s == stage) {
                writeln!(f, "{stage:>12}: {}[us]", self.total(stage).as_micros())?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timings_accumulate_per_stage() {
        let mut timings = StageTimings::new();
        timings.stage_finished(Stage::Transformed, Duration::from_micros(10));
        timings.stage_finished(Stage::Embedded, Duration::from_micros(3));
        timings.stage_finished(Stage::Transformed, Duration::from_micros(5));

        assert_eq!(timings.entries().len(), 3);
        assert_eq!(timings.total(Stage::Transformed), Duration::from_micros(15));
        assert_eq!(timings.total(Stage::Written), Duration::ZERO);

        let report = timings.to_string();
        assert!(report.contains("transformed: 15[us]"));
        assert!(!report.contains("written"));
    }

    #[test]
    fn stage_order_matches_pipeline() {
        assert_eq!(Stage::ALL[0], Stage::Loaded);
        assert_eq!(Stage::ALL[7], Stage::Written);
        assert_eq!(Stage::Reassembled.to_string(), "reassembled");
    }
}
