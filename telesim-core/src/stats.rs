use crate::{RunConfig, Shape};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationMicroSeconds, DurationSecondsWithFrac};
use std::fmt;
use std::ops::Index;
use std::time::Duration;

/// Why a dispatch unit recorded a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The payload could not be encoded.
    Serialization,
    /// Connection refused, DNS failure or similar.
    Transport,
    /// The per-request timeout expired.
    Timeout,
    /// The receiver answered with a non-2xx status.
    BadStatus,
}

impl FailureKind {
    pub const ALL: [FailureKind; 4] = [
        FailureKind::Serialization,
        FailureKind::Transport,
        FailureKind::Timeout,
        FailureKind::BadStatus,
    ];

    pub const COUNT: usize = Self::ALL.len();

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            FailureKind::Serialization => "serialization",
            FailureKind::Transport => "transport",
            FailureKind::Timeout => "timeout",
            FailureKind::BadStatus => "bad_status",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Successful sends per payload shape.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShapeCounts(pub [u64; Shape::COUNT]);

impl ShapeCounts {
    pub fn get(&self, shape: Shape) -> u64 {
        self.0[shape.index()]
    }

    pub fn total(&self) -> u64 {
        self.0.iter().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Shape, u64)> + '_ {
        Shape::ALL.into_iter().map(|shape| (shape, self.get(shape)))
    }
}

impl Index<Shape> for ShapeCounts {
    type Output = u64;

    fn index(&self, shape: Shape) -> &u64 {
        &self.0[shape.index()]
    }
}

impl Serialize for ShapeCounts {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(Shape::COUNT))?;
        for (shape, count) in self.iter() {
            map.serialize_entry(shape.name(), &count)?;
        }
        map.end()
    }
}

/// Failures per [`FailureKind`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FailureCounts(pub [u64; FailureKind::COUNT]);

impl FailureCounts {
    pub fn get(&self, kind: FailureKind) -> u64 {
        self.0[kind.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = (FailureKind, u64)> + '_ {
        FailureKind::ALL
            .into_iter()
            .map(|kind| (kind, self.get(kind)))
    }
}

impl Serialize for FailureCounts {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(FailureKind::COUNT))?;
        for (kind, count) in self.iter() {
            map.serialize_entry(kind.name(), &count)?;
        }
        map.end()
    }
}

/// Point-in-time view of the outcome counters.
///
/// Counters are read independently, so a snapshot taken mid-run may be off by
/// the handful of requests completing while it is taken.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OutcomeSnapshot {
    pub sent: u64,
    pub failed: u64,
    pub per_shape: ShapeCounts,
    pub failures: FailureCounts,
}

impl OutcomeSnapshot {
    /// Dispatch units that have finished, successfully or not.
    pub fn completed(&self) -> u64 {
        self.sent + self.failed
    }
}

#[serde_as]
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct LatencySummary {
    #[serde_as(as = "DurationMicroSeconds<u64>")]
    pub p50: Duration,
    #[serde_as(as = "DurationMicroSeconds<u64>")]
    pub p90: Duration,
    #[serde_as(as = "DurationMicroSeconds<u64>")]
    pub p99: Duration,
}

/// Scheduler bookkeeping for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickSummary {
    pub ticks: u64,
    pub dispatched: u64,
    /// Ticks whose launch work took the whole second, so no sleep followed.
    pub overruns: u64,
}

/// Final statistics of a run, built only after every dispatch unit finished.
#[serde_as]
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub dispatched: u64,
    pub sent: u64,
    pub failed: u64,
    pub failures: FailureCounts,
    pub per_shape: ShapeCounts,
    #[serde_as(as = "DurationSecondsWithFrac<f64>")]
    pub elapsed: Duration,
    pub achieved_rate: f64,
    pub ticks: u64,
    pub overrun_ticks: u64,
    pub latency: LatencySummary,
    pub config: RunConfig,
}

impl RunReport {
    pub fn new(
        config: RunConfig,
        ticks: TickSummary,
        outcomes: OutcomeSnapshot,
        latency: LatencySummary,
        elapsed: Duration,
    ) -> Self {
        Self {
            dispatched: ticks.dispatched,
            sent: outcomes.sent,
            failed: outcomes.failed,
            failures: outcomes.failures,
            per_shape: outcomes.per_shape,
            elapsed,
            achieved_rate: achieved_rate(outcomes.sent, elapsed),
            ticks: ticks.ticks,
            overrun_ticks: ticks.overruns,
            latency,
            config,
        }
    }
}

/// Successful sends per second of wall-clock time.
pub fn achieved_rate(sent: u64, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs > 0. {
        sent as f64 / secs
    } else {
        0.
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let elapsed = Duration::from_millis(self.elapsed.as_millis() as u64);
        writeln!(f, "Finished after {}", humantime::format_duration(elapsed))?;
        writeln!(
            f,
            "   Dispatched: {} | Sent: {} | Failed: {}",
            self.dispatched, self.sent, self.failed
        )?;
        writeln!(
            f,
            "   Actual rate: {:.2}/sec (target {}/sec)",
            self.achieved_rate, self.config.rate
        )?;
        if self.overrun_ticks > 0 {
            writeln!(
                f,
                "   Overrun ticks: {} of {}",
                self.overrun_ticks, self.ticks
            )?;
        }
        writeln!(
            f,
            "   Latency: p50={:?}, p90={:?}, p99={:?}",
            self.latency.p50, self.latency.p90, self.latency.p99
        )?;
        for (kind, count) in self.failures.iter().filter(|(_, count)| *count > 0) {
            writeln!(f, "   Failed ({kind}): {count}")?;
        }
        for (shape, count) in self.per_shape.iter() {
            writeln!(f, "   Format {} ({shape}): {count}", shape.index() + 1)?;
        }
        Ok(())
    }
}
