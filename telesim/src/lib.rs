#![cfg_attr(docsrs, feature(doc_cfg))]
//! Rate-paced synthetic telemetry generator.
//!
//! A [`Simulation`] fires exactly `rate` POST requests every wall-clock second
//! for a fixed duration, each carrying a freshly synthesized payload in one of
//! several JSON shapes, and reports per-outcome and per-shape counts once every
//! request has finished.
//!
//! ```no_run
//! use std::num::NonZeroU32;
//! use std::time::Duration;
//! use telesim::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), SimError> {
//!     let config = RunConfig::new("http://localhost:8080/api/data")
//!         .rate(NonZeroU32::new(600).unwrap())
//!         .duration(Duration::from_secs(60));
//!
//!     let report = telesim::run(config).await?;
//!     println!("{report}");
//!     Ok(())
//! }
//! ```

pub mod aggregator;
pub mod cli;
pub mod driver;
pub mod error;
pub mod scheduler;
pub mod sender;
pub mod synth;
pub mod window;

pub use driver::{run, Simulation};
pub use error::SimError;

pub mod prelude {
    pub use crate::aggregator::Outcomes;
    pub use crate::driver::Simulation;
    pub use crate::error::SimError;
    pub use crate::sender::{HttpTransport, MockTransport, SendError, Transport};

    pub use telesim_core::{Payload, RunConfig, RunReport, Shape};
}
