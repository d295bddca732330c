use reqwest::{header::CONTENT_TYPE, Client, StatusCode};
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use telesim_core::{FailureKind, Payload, DEFAULT_IDLE_TIMEOUT};
use thiserror::Error;
use url::Url;

pub type PostFuture<'a> = Pin<Box<dyn Future<Output = Result<StatusCode, SendError>> + Send + 'a>>;

#[derive(Debug, Error)]
pub enum SendError {
    #[error("Payload could not be encoded: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Request timed out")]
    Timeout,

    #[error("Transport error: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("Receiver answered {0}")]
    BadStatus(StatusCode),
}

impl SendError {
    pub fn kind(&self) -> FailureKind {
        match self {
            SendError::Serialization(_) => FailureKind::Serialization,
            SendError::Timeout => FailureKind::Timeout,
            SendError::Transport(_) => FailureKind::Transport,
            SendError::BadStatus(_) => FailureKind::BadStatus,
        }
    }
}

impl From<reqwest::Error> for SendError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SendError::Timeout
        } else {
            SendError::Transport(err)
        }
    }
}

/// Something that can POST an encoded payload to the target endpoint.
///
/// Implementations are shared by every in-flight dispatch unit and must be
/// safe to call concurrently.
pub trait Transport: Send + Sync {
    fn name(&self) -> &'static str;

    /// Posts `body` as `application/json` and returns the response status.
    fn post(&self, body: Vec<u8>) -> PostFuture<'_>;
}

/// Pooled HTTP transport with a bounded per-request timeout.
pub struct HttpTransport {
    client: Client,
    endpoint: Url,
}

impl HttpTransport {
    pub fn new(
        endpoint: Url,
        timeout: Duration,
        max_idle_connections: usize,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(timeout)
            .pool_max_idle_per_host(max_idle_connections)
            .pool_idle_timeout(DEFAULT_IDLE_TIMEOUT)
            .build()?;

        Ok(Self { client, endpoint })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

impl Transport for HttpTransport {
    fn name(&self) -> &'static str {
        "http"
    }

    fn post(&self, body: Vec<u8>) -> PostFuture<'_> {
        Box::pin(async move {
            let response = self
                .client
                .post(self.endpoint.clone())
                .header(CONTENT_TYPE, "application/json")
                .body(body)
                .send()
                .await?;

            let status = response.status();
            // Drain the body so the connection can go back to the pool.
            let _ = response.bytes().await;
            Ok(status)
        })
    }
}

/// Transport that never touches the network: answers `status` after `delay`.
pub struct MockTransport {
    status: StatusCode,
    delay: Duration,
}

impl MockTransport {
    pub fn new(status: StatusCode, delay: Duration) -> Self {
        Self { status, delay }
    }
}

impl Transport for MockTransport {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn post(&self, _body: Vec<u8>) -> PostFuture<'_> {
        Box::pin(async move {
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            Ok(self.status)
        })
    }
}

/// Encodes payloads and classifies what the transport reports.
///
/// Every error is final: nothing is retried here.
pub struct RequestSender<T> {
    transport: T,
}

impl<T: Transport> RequestSender<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub async fn send(&self, payload: &Payload) -> Result<(), SendError> {
        let body = serde_json::to_vec(payload)?;
        let status = self.transport.post(body).await?;

        if status.is_success() {
            Ok(())
        } else {
            Err(SendError::BadStatus(status))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synth::synthesize;
    use rand::{rngs::SmallRng, SeedableRng};
    use std::sync::Mutex;
    use telesim_core::Shape;

    struct RecordingTransport {
        bodies: Mutex<Vec<Vec<u8>>>,
        status: StatusCode,
    }

    impl Transport for RecordingTransport {
        fn name(&self) -> &'static str {
            "recording"
        }

        fn post(&self, body: Vec<u8>) -> PostFuture<'_> {
            self.bodies.lock().unwrap().push(body);
            Box::pin(async move { Ok(self.status) })
        }
    }

    #[tokio::test]
    async fn test_send_encodes_json_body() {
        let sender = RequestSender::new(RecordingTransport {
            bodies: Mutex::new(vec![]),
            status: StatusCode::OK,
        });
        let mut rng = SmallRng::seed_from_u64(3);
        let payload = synthesize(Shape::UnitConversion, &mut rng);

        sender.send(&payload).await.unwrap();

        let bodies = sender.transport().bodies.lock().unwrap();
        assert_eq!(bodies.len(), 1);
        let decoded: Payload = serde_json::from_slice(&bodies[0]).unwrap();
        assert_eq!(decoded, payload);
    }

    #[tokio::test]
    async fn test_classify_status() {
        let mut rng = SmallRng::seed_from_u64(3);
        let payload = synthesize(Shape::Current, &mut rng);

        for status in [StatusCode::OK, StatusCode::CREATED, StatusCode::NO_CONTENT] {
            let sender = RequestSender::new(MockTransport::new(status, Duration::ZERO));
            assert!(sender.send(&payload).await.is_ok());
        }

        for status in [
            StatusCode::MOVED_PERMANENTLY,
            StatusCode::TOO_MANY_REQUESTS,
            StatusCode::INTERNAL_SERVER_ERROR,
        ] {
            let sender = RequestSender::new(MockTransport::new(status, Duration::ZERO));
            let err = sender.send(&payload).await.unwrap_err();
            assert_eq!(err.kind(), FailureKind::BadStatus);
            assert!(matches!(err, SendError::BadStatus(s) if s == status));
        }
    }

    #[tokio::test]
    async fn test_connection_refused_is_transport_failure() {
        // Bind then drop to find a port with nothing listening.
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let endpoint = Url::parse(&format!("http://127.0.0.1:{port}/api/data")).unwrap();
        let transport = HttpTransport::new(endpoint, Duration::from_secs(1), 4).unwrap();
        let sender = RequestSender::new(transport);

        let mut rng = SmallRng::seed_from_u64(5);
        let err = sender
            .send(&synthesize(Shape::Flat, &mut rng))
            .await
            .unwrap_err();
        assert!(
            matches!(err.kind(), FailureKind::Transport | FailureKind::Timeout),
            "{err}"
        );
    }
}
