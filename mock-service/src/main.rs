use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("mock_service=info")),
        )
        .init();

    let received = Arc::new(mock_service::Received::default());
    tokio::task::spawn(mock_service::tps_measure_task(received.clone()));

    let addr: SocketAddr = "0.0.0.0:8080".parse()?;
    mock_service::run(addr, received).await
}
