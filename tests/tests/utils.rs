use mock_service::Received;
use std::num::NonZeroU32;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use telesim_core::RunConfig;
use tracing_subscriber::FmtSubscriber;

#[allow(unused)]
pub fn init() {
    static ONCE_LOCK: OnceLock<()> = OnceLock::new();

    ONCE_LOCK.get_or_init(|| {
        let _ = FmtSubscriber::builder()
            .with_env_filter("telesim=debug,mock_service=debug,axum::rejection=trace")
            .try_init();
    });
}

/// Starts a fresh receiver and returns its base URL.
#[allow(unused)]
pub async fn receiver() -> anyhow::Result<(String, Arc<Received>)> {
    init();
    let (addr, received) = mock_service::spawn().await?;
    Ok((format!("http://{addr}"), received))
}

#[allow(unused)]
pub fn config(endpoint: &str, rate: u32, secs: u64) -> RunConfig {
    RunConfig::new(endpoint)
        .rate(NonZeroU32::new(rate).unwrap())
        .duration(Duration::from_secs(secs))
        .seed(1234)
}
