//! Command-line surface of the `telesim` binary.
use crate::driver::Simulation;
use crate::error::SimError;
use crate::sender::MockTransport;
use clap::Parser;
#[cfg(feature = "metrics")]
use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::time::Duration;
use telesim_core::{RunConfig, RunReport, DEFAULT_ENDPOINT, DEFAULT_MAX_IDLE_CONNECTIONS};

#[derive(Parser, Debug)]
#[command(version, about = "Sends a steady stream of synthetic inverter telemetry to an HTTP endpoint.")]
pub struct Cli {
    /// Destination URL for every POST
    #[arg(short, long, env = "TELESIM_ENDPOINT", default_value = DEFAULT_ENDPOINT)]
    pub endpoint: String,

    /// Requests launched per second
    #[arg(short, long, default_value = "600")]
    pub rate: NonZeroU32,

    /// Total run time, e.g. `90s` or `15m`
    #[arg(short, long, default_value = "15m", value_parser = humantime::parse_duration)]
    pub duration: Duration,

    /// Seed for reproducible payloads
    #[arg(short, long)]
    pub seed: Option<u64>,

    /// Per-request timeout
    #[arg(long, default_value = "3s", value_parser = humantime::parse_duration)]
    pub timeout: Duration,

    /// Maximum idle pooled connections to the endpoint
    #[arg(long, default_value_t = DEFAULT_MAX_IDLE_CONNECTIONS)]
    pub max_idle_connections: usize,

    /// Log a progress line at this interval
    #[arg(short, long, value_parser = humantime::parse_duration)]
    pub progress: Option<Duration>,

    /// Print the final report as JSON
    #[arg(long)]
    pub json: bool,

    /// Exercise the pacing loop without touching the network
    #[arg(long)]
    pub dry_run: bool,

    /// Expose Prometheus metrics on this address
    #[cfg(feature = "metrics")]
    #[arg(long)]
    pub metrics_addr: Option<SocketAddr>,
}

impl Cli {
    pub fn config(&self) -> RunConfig {
        let mut config = RunConfig::new(&self.endpoint)
            .rate(self.rate)
            .duration(self.duration)
            .timeout(self.timeout)
            .max_idle_connections(self.max_idle_connections);
        config.seed = self.seed;
        config.progress_interval = self.progress;
        config
    }

    pub async fn run(&self) -> Result<RunReport, SimError> {
        let config = self.config();
        if self.dry_run {
            config.validate()?;
            let transport = MockTransport::new(reqwest::StatusCode::OK, Duration::ZERO);
            Ok(Simulation::with_transport(config, transport).run().await)
        } else {
            crate::driver::run(config).await
        }
    }
}
