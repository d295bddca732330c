//! Run driver: owns the window, fans dispatches out to tasks, drains them and
//! builds the final report.
use crate::aggregator::Outcomes;
use crate::error::SimError;
use crate::scheduler::{Dispatch, PacingScheduler};
use crate::sender::{HttpTransport, RequestSender, Transport};
use crate::synth::{dispatch_rng, synthesize};
use crate::window::RunWindow;
use rand::rngs::SmallRng;
use std::sync::Arc;
use std::time::Duration;
use telesim_core::{achieved_rate, RunConfig, RunReport};
use tokio::task::{JoinError, JoinSet};
use tokio::time::{interval, Instant, MissedTickBehavior};
#[allow(unused)]
use tracing::{debug, error, info, instrument, trace, warn, Instrument};

/// A configured run against one endpoint.
pub struct Simulation<T = HttpTransport> {
    config: RunConfig,
    sender: Arc<RequestSender<T>>,
    outcomes: Arc<Outcomes>,
}

impl Simulation<HttpTransport> {
    /// Validates `config` and builds the pooled HTTP transport.
    ///
    /// This is the only point where a run can fail as a whole.
    pub fn new(config: RunConfig) -> Result<Self, SimError> {
        let endpoint = config.validate()?;
        let transport =
            HttpTransport::new(endpoint, config.timeout, config.max_idle_connections)
                .map_err(SimError::Client)?;
        Ok(Self::with_transport(config, transport))
    }
}

impl<T> Simulation<T>
where
    T: Transport + 'static,
{
    pub fn with_transport(config: RunConfig, transport: T) -> Self {
        Self {
            config,
            sender: Arc::new(RequestSender::new(transport)),
            outcomes: Arc::new(Outcomes::new()),
        }
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Live counters, for callers that want their own progress reporting.
    pub fn outcomes(&self) -> Arc<Outcomes> {
        self.outcomes.clone()
    }

    #[instrument(name = "simulation", skip_all, fields(transport = self.sender.transport().name()))]
    pub async fn run(self) -> RunReport {
        let config = self.config;
        info!(
            "Sending {}/sec to {} for {} (up to {} requests)",
            config.rate,
            config.endpoint,
            humantime::format_duration(config.duration),
            config.planned_requests(),
        );

        let mut window = RunWindow::new(config.duration);
        let progress = config.progress_interval.map(|every| {
            tokio::spawn(
                progress_task(self.outcomes.clone(), window.start(), every).in_current_span(),
            )
        });

        let scheduler = PacingScheduler::new(config.rate);
        let mut units = JoinSet::new();
        let ticks = scheduler
            .run(&mut window, |dispatch: Dispatch| {
                // Once per tick: reap finished units so the set tracks only in-flight
                // work, and fold their latencies into the digest.
                if dispatch.offset == 0 {
                    while let Some(res) = units.try_join_next() {
                        log_join(res);
                    }
                    self.outcomes.fold_latencies();
                }

                let rng = dispatch_rng(config.seed, dispatch.index);
                units.spawn(dispatch_unit(
                    self.sender.clone(),
                    self.outcomes.clone(),
                    dispatch,
                    rng,
                ));
            })
            .await;

        info!("Window closed, draining {} in-flight requests", units.len());
        while let Some(res) = units.join_next().await {
            log_join(res);
        }

        if let Some(progress) = progress {
            progress.abort();
        }

        let elapsed = window.elapsed();
        let report = RunReport::new(
            config,
            ticks,
            self.outcomes.snapshot(),
            self.outcomes.latency(),
            elapsed,
        );
        info!(
            "Run complete: sent={} failed={} rate={:.2}/s",
            report.sent, report.failed, report.achieved_rate
        );
        report
    }
}

/// Builds a simulation over HTTP and runs it to completion.
pub async fn run(config: RunConfig) -> Result<RunReport, SimError> {
    Ok(Simulation::new(config)?.run().await)
}

/// Synthesize, send and record a single request.
async fn dispatch_unit<T: Transport>(
    sender: Arc<RequestSender<T>>,
    outcomes: Arc<Outcomes>,
    dispatch: Dispatch,
    mut rng: SmallRng,
) {
    let payload = synthesize(dispatch.shape, &mut rng);

    let start = Instant::now();
    let res = sender.send(&payload).await;
    outcomes.record_latency(start.elapsed());

    match res {
        Ok(()) => outcomes.record_success(dispatch.shape),
        Err(err) => {
            debug!(
                index = dispatch.index,
                shape = %dispatch.shape,
                "Request failed: {err}"
            );
            outcomes.record_failure(err.kind());
        }
    }
}

fn log_join(res: Result<(), JoinError>) {
    if let Err(err) = res {
        error!("Dispatch unit did not complete: {err}");
    }
}

async fn progress_task(outcomes: Arc<Outcomes>, start: Instant, every: Duration) {
    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // NOTE: First tick completes instantly
    ticker.tick().await;

    loop {
        ticker.tick().await;
        let snapshot = outcomes.snapshot();
        info!(
            "Sent={} | Failed={} | Rate={:.2}/s",
            snapshot.sent,
            snapshot.failed,
            achieved_rate(snapshot.sent, start.elapsed())
        );
    }
}
