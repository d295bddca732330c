mod utils;
#[allow(unused)]
use utils::*;

use std::time::Duration;
use telesim::Simulation;
use telesim_core::{FailureKind, Shape};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn five_per_second_all_accepted() -> anyhow::Result<()> {
    let (base, received) = receiver().await?;

    let report = telesim::run(config(&format!("{base}/api/data"), 5, 2)).await?;

    assert_eq!(report.ticks, 2);
    assert_eq!(report.dispatched, 10);
    assert_eq!(report.sent, 10);
    assert_eq!(report.failed, 0);
    assert_eq!(report.per_shape.0, [3, 3, 2, 2]);
    assert!(report.achieved_rate > 3. && report.achieved_rate <= 5.5);

    // The receiver decoded every body into the shape it was sent as.
    assert_eq!(received.total(), 10);
    assert_eq!(received.per_shape(), report.per_shape);

    let json = serde_json::to_value(&report)?;
    assert_eq!(json["per_shape"]["current"], 3);
    assert_eq!(json["per_shape"]["unit_conversion"], 2);

    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn server_errors_are_counted_not_retried() -> anyhow::Result<()> {
    let (base, received) = receiver().await?;

    let report = telesim::run(config(&format!("{base}/status/500/api/data"), 5, 2)).await?;

    assert_eq!(report.sent, 0);
    assert_eq!(report.failed, 10);
    assert_eq!(report.failures.get(FailureKind::BadStatus), 10);
    for shape in Shape::ALL {
        assert_eq!(report.per_shape.get(shape), 0);
    }
    // One request per dispatch, no retries.
    assert_eq!(received.total(), 10);
    assert_eq!(received.rejected(), 10);

    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn unreachable_endpoint_keeps_pace() -> anyhow::Result<()> {
    init();
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
        listener.local_addr()?.port()
    };

    let endpoint = format!("http://127.0.0.1:{port}/api/data");
    let report = telesim::run(config(&endpoint, 5, 1)).await?;

    assert_eq!(report.dispatched, 5);
    assert_eq!(report.sent, 0);
    assert_eq!(report.failed, 5);
    assert_eq!(
        report.failures.get(FailureKind::Transport) + report.failures.get(FailureKind::Timeout),
        5
    );

    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn drains_requests_outliving_the_window() -> anyhow::Result<()> {
    let (base, received) = receiver().await?;

    let report = telesim::run(config(&format!("{base}/delay/ms/1500/api/data"), 3, 2)).await?;

    assert_eq!(report.sent, 6);
    assert_eq!(received.total(), 6);
    assert!(report.elapsed >= Duration::from_millis(2_500));

    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn slow_receiver_times_out() -> anyhow::Result<()> {
    let (base, _received) = receiver().await?;

    let config = config(&format!("{base}/delay/ms/2000/api/data"), 2, 1)
        .timeout(Duration::from_millis(300));
    let report = Simulation::new(config)?.run().await;

    assert_eq!(report.sent, 0);
    assert_eq!(report.failures.get(FailureKind::Timeout), 2);

    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn throttled_receiver() -> anyhow::Result<()> {
    let (base, received) = receiver().await?;

    let report = telesim::run(config(&format!("{base}/limited/3/api/data"), 10, 2)).await?;

    assert_eq!(report.sent + report.failed, 20);
    assert!(report.failed > 0);
    assert_eq!(report.failures.get(FailureKind::BadStatus), report.failed);
    assert_eq!(received.rejected(), report.failed);

    Ok(())
}

#[test]
fn invalid_endpoint_is_fatal() {
    let err = Simulation::new(config("localhost:8080/api/data", 1, 1))
        .err()
        .unwrap();
    assert!(err.to_string().contains("Invalid configuration"));
}
