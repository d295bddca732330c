use std::num::NonZeroU32;
use std::time::Duration;

/// Receiver used when no endpoint is given.
pub const DEFAULT_ENDPOINT: &str = "http://localhost:8080/api/data";

/// Requests launched per wall-clock second when no rate is given.
pub const DEFAULT_RATE: NonZeroU32 = unsafe { NonZeroU32::new_unchecked(600) };

pub const DEFAULT_DURATION: Duration = Duration::from_secs(15 * 60);

/// Per-request timeout handed to the transport.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3);

pub const DEFAULT_MAX_IDLE_CONNECTIONS: usize = 2000;

pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(90);

/// Length of one scheduler tick.
pub const TICK: Duration = Duration::from_secs(1);

/// Probability that a synthesized reading carries a nonzero fault code.
pub const FAULT_PROBABILITY: f64 = 0.1;

/// Largest fault code; nonzero codes are drawn uniformly from `1..=MAX_FAULT_CODE`.
pub const MAX_FAULT_CODE: u8 = 5;
