use std::time::Duration;
use tokio::time::Instant;

/// Wall-clock bounds of a run plus the logical second counter.
///
/// Runs on tokio's clock so tests can drive it with a paused runtime.
#[derive(Debug, Clone)]
pub struct RunWindow {
    start: Instant,
    duration: Duration,
    end: Instant,
    second_index: u64,
}

impl RunWindow {
    /// Opens a window starting now.
    pub fn new(duration: Duration) -> Self {
        Self::starting_at(Instant::now(), duration)
    }

    pub fn starting_at(start: Instant, duration: Duration) -> Self {
        Self {
            start,
            duration,
            end: start + duration,
            second_index: 0,
        }
    }

    /// True while the deadline has not been reached.
    pub fn is_open(&self) -> bool {
        Instant::now() < self.end
    }

    /// Moves to the next logical second.
    pub fn advance(&mut self) {
        self.second_index += 1;
    }

    pub fn second_index(&self) -> u64 {
        self.second_index
    }

    pub fn start(&self) -> Instant {
        self.start
    }

    pub fn end(&self) -> Instant {
        self.end
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}
