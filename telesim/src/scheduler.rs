//! Per-second pacing loop.
//!
//! Each tick launches exactly `rate` dispatches and then sleeps for whatever
//! is left of the second. A tick that overruns its second is followed
//! immediately by the next one: there is no catch-up burst, so an overloaded
//! run emits fewer than `rate * seconds` requests.
use crate::window::RunWindow;
use std::num::NonZeroU32;
use telesim_core::{Shape, TickSummary, TICK};
use tokio::time::{sleep, Instant};
#[allow(unused)]
use tracing::{debug, error, info, instrument, trace, warn};

/// One request handed to the dispatch callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dispatch {
    /// Global position in the run: `tick * rate + offset`.
    pub index: u64,
    pub tick: u64,
    /// Position within the tick, `0..rate`.
    pub offset: u32,
    pub shape: Shape,
}

pub struct PacingScheduler {
    rate: NonZeroU32,
}

impl PacingScheduler {
    pub fn new(rate: NonZeroU32) -> Self {
        Self { rate }
    }

    pub fn rate(&self) -> NonZeroU32 {
        self.rate
    }

    /// Drives ticks until `window` closes.
    ///
    /// `dispatch` must only launch work, never wait for it: the loop stalls
    /// for as long as the callback runs.
    #[instrument(name = "scheduler", skip_all, fields(rate = self.rate.get()))]
    pub async fn run<D>(&self, window: &mut RunWindow, mut dispatch: D) -> TickSummary
    where
        D: FnMut(Dispatch),
    {
        let rate = self.rate.get();
        let mut summary = TickSummary::default();

        while window.is_open() {
            let tick_start = Instant::now();
            let tick = window.second_index();

            for offset in 0..rate {
                let index = tick * u64::from(rate) + u64::from(offset);
                dispatch(Dispatch {
                    index,
                    tick,
                    offset,
                    shape: Shape::from_index(index),
                });
            }

            window.advance();
            summary.ticks += 1;
            summary.dispatched += u64::from(rate);

            let elapsed = tick_start.elapsed();
            if elapsed < TICK {
                trace!("Tick {tick} launched in {elapsed:?}");
                sleep(TICK - elapsed).await;
            } else {
                summary.overruns += 1;
                warn!("Tick {tick} took {elapsed:?} to launch {rate} requests; effective rate will fall short.");
            }
        }

        debug!(
            "Window closed after {} ticks, {} dispatched",
            summary.ticks, summary.dispatched
        );
        summary
    }
}
